//! Console system.
//!
//! Provides:
//! - Console variables (cvars) with typed values
//! - Command registration and execution
//! - Command history
//! - Input parsing
//!
//! # Usage
//! ```ignore
//! let mut console = Console::new();
//! console.register_cvar("net_loss", CvarValue::Int(0), "Packet loss %", CvarFlags::ARCHIVE);
//! console.exec("net_loss 10")?;
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};

use anyhow::{anyhow, bail, Context};

/// Console variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum CvarValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl CvarValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            CvarValue::Int(v) => Some(*v),
            CvarValue::Float(v) => Some(*v as i64),
            CvarValue::Bool(v) => Some(i64::from(*v)),
            CvarValue::String(s) => s.parse().ok(),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            CvarValue::Float(v) => Some(*v),
            CvarValue::Int(v) => Some(*v as f64),
            CvarValue::String(s) => s.parse().ok(),
            CvarValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            CvarValue::Bool(v) => *v,
            CvarValue::Int(v) => *v != 0,
            CvarValue::Float(v) => *v != 0.0,
            CvarValue::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        }
    }

    /// Parses `raw` into the same variant as `self`.
    pub fn parse_like(&self, raw: &str) -> anyhow::Result<CvarValue> {
        let raw = raw.trim_matches('"');
        Ok(match self {
            CvarValue::Int(_) => CvarValue::Int(raw.parse().with_context(|| format!("'{raw}' is not an integer"))?),
            CvarValue::Float(_) => {
                CvarValue::Float(raw.parse().with_context(|| format!("'{raw}' is not a number"))?)
            }
            CvarValue::Bool(_) => CvarValue::Bool(match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                other => bail!("'{other}' is not a boolean"),
            }),
            CvarValue::String(_) => CvarValue::String(raw.to_string()),
        })
    }
}

impl std::fmt::Display for CvarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CvarValue::Int(v) => write!(f, "{}", v),
            CvarValue::Float(v) => write!(f, "{}", v),
            CvarValue::String(v) => write!(f, "\"{}\"", v),
            CvarValue::Bool(v) => write!(f, "{}", i32::from(*v)),
        }
    }
}

/// Console variable metadata.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub value: CvarValue,
    pub default: CvarValue,
    pub description: String,
    pub flags: CvarFlags,
}

bitflags::bitflags! {
    /// Cvar flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CvarFlags: u32 {
        const NONE = 0;
        const ARCHIVE = 1 << 0;      // Listed by `cvarlist archive`
        const READ_ONLY = 1 << 1;    // Rejects `set`
        const SERVER_ONLY = 1 << 2;  // Affects the authoritative side
    }
}

impl Default for CvarFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// Command handler function type.
pub type CommandHandler = Box<dyn Fn(&[&str], &mut ConsoleContext<'_>) -> anyhow::Result<()>>;

/// Context passed to command handlers.
pub struct ConsoleContext<'a> {
    /// Output buffer for command responses.
    pub output: Vec<String>,
    cvars: &'a mut BTreeMap<String, Cvar>,
}

impl ConsoleContext<'_> {
    pub fn print(&mut self, msg: impl Into<String>) {
        self.output.push(msg.into());
    }

    pub fn get_cvar(&self, name: &str) -> Option<&Cvar> {
        self.cvars.get(name)
    }

    /// Parses `raw` with the cvar's type and stores it.
    pub fn set_cvar(&mut self, name: &str, raw: &str) -> anyhow::Result<CvarValue> {
        set_parsed(self.cvars, name, raw)
    }
}

fn set_parsed(cvars: &mut BTreeMap<String, Cvar>, name: &str, raw: &str) -> anyhow::Result<CvarValue> {
    let cvar = cvars.get_mut(name).ok_or_else(|| anyhow!("unknown cvar: {name}"))?;
    if cvar.flags.contains(CvarFlags::READ_ONLY) {
        bail!("{name} is read-only");
    }
    let value = cvar.value.parse_like(raw).with_context(|| format!("set {name}"))?;
    cvar.value = value.clone();
    Ok(value)
}

/// The console.
pub struct Console {
    cvars: BTreeMap<String, Cvar>,
    commands: HashMap<String, CommandHandler>,
    history: VecDeque<String>,
    max_history: usize,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("cvars", &self.cvars.len())
            .field("commands", &self.commands.len())
            .field("history", &self.history.len())
            .finish()
    }
}

impl Console {
    pub fn new() -> Self {
        let mut console = Self {
            cvars: BTreeMap::new(),
            commands: HashMap::new(),
            history: VecDeque::new(),
            max_history: 100,
        };

        console.register_builtin_commands();
        console
    }

    fn register_builtin_commands(&mut self) {
        // help [cvar]
        self.register_command("help", |args, ctx| {
            match args.first() {
                None => ctx.print("Commands: help, cvarlist [archive], set <cvar> <value>; type a cvar name to query it"),
                Some(name) => {
                    let line = match ctx.get_cvar(name) {
                        Some(cvar) => format!("{}: {}", cvar.name, cvar.description),
                        None => format!("No help for '{}'", name),
                    };
                    ctx.print(line);
                }
            }
            Ok(())
        });

        // cvarlist [archive]
        self.register_command("cvarlist", |args, ctx| {
            let only_archived = args.first() == Some(&"archive");
            let lines: Vec<String> = ctx
                .cvars
                .values()
                .filter(|cvar| !only_archived || cvar.flags.contains(CvarFlags::ARCHIVE))
                .map(|cvar| format!("  {} = {} (default: {})", cvar.name, cvar.value, cvar.default))
                .collect();
            for line in lines {
                ctx.print(line);
            }
            Ok(())
        });

        // set <cvar> <value>
        self.register_command("set", |args, ctx| {
            if args.len() < 2 {
                bail!("usage: set <cvar> <value>");
            }
            let name = args[0];
            let value = ctx.set_cvar(name, &args[1..].join(" "))?;
            ctx.print(format!("{} = {}", name, value));
            Ok(())
        });
    }

    /// Registers a console variable. Re-registering replaces it.
    pub fn register_cvar(&mut self, name: &str, default: CvarValue, description: &str, flags: CvarFlags) {
        let cvar = Cvar {
            name: name.to_string(),
            value: default.clone(),
            default,
            description: description.to_string(),
            flags,
        };
        self.cvars.insert(name.to_string(), cvar);
    }

    /// Registers a command.
    pub fn register_command<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&[&str], &mut ConsoleContext<'_>) -> anyhow::Result<()> + 'static,
    {
        self.commands.insert(name.to_string(), Box::new(handler));
    }

    /// Executes a console command line and returns its output lines.
    pub fn exec(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            return Ok(Vec::new());
        }

        self.history.push_back(line.to_string());
        if self.history.len() > self.max_history {
            self.history.pop_front();
        }

        let tokens = parse_command_line(line);
        let Some((cmd_name, rest)) = tokens.split_first() else {
            return Ok(Vec::new());
        };
        let args: Vec<&str> = rest.iter().map(|s| s.as_str()).collect();

        let mut ctx = ConsoleContext {
            output: Vec::new(),
            cvars: &mut self.cvars,
        };

        if let Some(handler) = self.commands.get(cmd_name.as_str()) {
            handler(&args, &mut ctx).with_context(|| format!("command '{}'", cmd_name))?;
            return Ok(ctx.output);
        }

        // Typing a cvar name queries it; adding a value sets it.
        let Some(cvar) = ctx.get_cvar(cmd_name) else {
            bail!("unknown command: {}", cmd_name);
        };
        if args.is_empty() {
            let line = format!("{} = {} (default: {})", cvar.name, cvar.value, cvar.default);
            ctx.print(line);
        } else {
            let value = ctx.set_cvar(cmd_name, &args.join(" "))?;
            ctx.print(format!("{} = {}", cmd_name, value));
        }
        Ok(ctx.output)
    }

    /// Gets a cvar value.
    pub fn get_cvar(&self, name: &str) -> Option<CvarValue> {
        self.cvars.get(name).map(|c| c.value.clone())
    }

    /// Sets a cvar value, keeping its type.
    pub fn set_cvar(&mut self, name: &str, value: CvarValue) -> anyhow::Result<()> {
        set_parsed(&mut self.cvars, name, &value_to_raw(&value))?;
        Ok(())
    }

    /// Executed lines, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }
}

fn value_to_raw(value: &CvarValue) -> String {
    match value {
        CvarValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses a command line into tokens, respecting quotes.
pub fn parse_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => {
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
