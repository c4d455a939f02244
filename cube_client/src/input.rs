//! Input handling.
//!
//! In a real client this would integrate with windowing and raw keyboard
//! events. Here input arrives either as console key commands (`+left`,
//! `-jump`, ...) or from a script, and is sampled once per fixed step.

use cube_shared::input::Input;

/// Produces one input sample per fixed step.
pub trait InputSource {
    fn sample(&mut self, time: u32) -> Input;
}

/// Keys held down through `+action` / `-action` commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeldKeys {
    input: Input,
}

impl HeldKeys {
    /// Applies a `+action` or `-action` command.
    ///
    /// Returns false if `command` is not a key command.
    pub fn apply(&mut self, command: &str) -> bool {
        let (pressed, action) = if let Some(action) = command.strip_prefix('+') {
            (true, action)
        } else if let Some(action) = command.strip_prefix('-') {
            (false, action)
        } else {
            return false;
        };
        self.input.set_action(action, pressed)
    }

    pub fn input(&self) -> Input {
        self.input
    }
}

impl InputSource for HeldKeys {
    fn sample(&mut self, _time: u32) -> Input {
        self.input
    }
}

/// Input changes keyed by step time; holds each input until the next change.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    /// `(from_time, input)`, sorted by time.
    changes: Vec<(u32, Input)>,
}

impl ScriptedInput {
    pub fn new(mut changes: Vec<(u32, Input)>) -> Self {
        changes.sort_by_key(|&(t, _)| t);
        Self { changes }
    }

    /// Input active at `time`.
    pub fn at(&self, time: u32) -> Input {
        self.changes
            .iter()
            .take_while(|&&(t, _)| t <= time)
            .last()
            .map(|&(_, input)| input)
            .unwrap_or_default()
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self, time: u32) -> Input {
        self.at(time)
    }
}
