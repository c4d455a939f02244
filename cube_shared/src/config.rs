//! Configuration system.
//!
//! Loads simulation configuration from JSON strings (file IO left to app) and
//! mirrors it into console variables so it can be tweaked at runtime.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::console::{Console, CvarFlags, CvarValue};
use crate::scene::DEFAULT_DT;

/// Which cubes the renderer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    pub render_client: bool,
    pub render_server: bool,
    pub render_proxy: bool,
    pub render_history: bool,
    pub render_smoothed_client: bool,
    pub render_smoothed_proxy: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            render_client: true,
            render_server: false,
            render_proxy: false,
            render_history: false,
            render_smoothed_client: false,
            render_smoothed_proxy: false,
        }
    }
}

/// Simulated round-trip latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Latency {
    #[default]
    None,
    FiftyMs,
    TwoHundredMs,
    TwoSeconds,
}

impl Latency {
    pub const ALL: [Latency; 4] = [
        Latency::None,
        Latency::FiftyMs,
        Latency::TwoHundredMs,
        Latency::TwoSeconds,
    ];

    /// Round-trip time in milliseconds.
    pub fn millis(self) -> u32 {
        match self {
            Latency::None => 0,
            Latency::FiftyMs => 50,
            Latency::TwoHundredMs => 200,
            Latency::TwoSeconds => 2000,
        }
    }

    /// One-way delay in seconds (half the round trip).
    pub fn one_way_secs(self) -> f32 {
        self.millis() as f32 / 1000.0 * 0.5
    }

    /// Cycles to the next setting, wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&l| l == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn from_millis(ms: i64) -> anyhow::Result<Self> {
        match Self::ALL.iter().find(|l| i64::from(l.millis()) == ms) {
            Some(&l) => Ok(l),
            None => bail!("unsupported latency {ms} ms (expected 0, 50, 200 or 2000)"),
        }
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} milliseconds latency", self.millis())
    }
}

impl FromStr for Latency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let ms: i64 = s
            .trim()
            .trim_end_matches("ms")
            .parse()
            .with_context(|| format!("parse latency '{s}'"))?;
        Self::from_millis(ms)
    }
}

/// Simulated packet loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PacketLoss {
    #[default]
    None,
    Five,
    Ten,
    Fifty,
}

impl PacketLoss {
    pub const ALL: [PacketLoss; 4] = [
        PacketLoss::None,
        PacketLoss::Five,
        PacketLoss::Ten,
        PacketLoss::Fifty,
    ];

    pub fn percent(self) -> u32 {
        match self {
            PacketLoss::None => 0,
            PacketLoss::Five => 5,
            PacketLoss::Ten => 10,
            PacketLoss::Fifty => 50,
        }
    }

    /// Drop probability in [0, 1].
    pub fn probability(self) -> f32 {
        self.percent() as f32 / 100.0
    }

    /// Cycles to the next setting, wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&l| l == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn from_percent(percent: i64) -> anyhow::Result<Self> {
        match Self::ALL.iter().find(|l| i64::from(l.percent()) == percent) {
            Some(&l) => Ok(l),
            None => bail!("unsupported packet loss {percent}% (expected 0, 5, 10 or 50)"),
        }
    }
}

impl fmt::Display for PacketLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% packet loss", self.percent())
    }
}

impl FromStr for PacketLoss {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let percent: i64 = s
            .trim()
            .trim_end_matches('%')
            .parse()
            .with_context(|| format!("parse packet loss '{s}'"))?;
        Self::from_percent(percent)
    }
}

/// Root configuration of a client/server session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Fixed simulation step in seconds.
    #[serde(default = "default_dt")]
    pub dt: f32,
    /// Display refresh rate of the real-time loop.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// Fraction of the remaining error removed per smoothing call.
    #[serde(default = "default_tightness")]
    pub tightness: f32,
    #[serde(default)]
    pub view: ViewOptions,
    #[serde(default)]
    pub latency: Latency,
    #[serde(default)]
    pub packet_loss: PacketLoss,
    #[serde(default)]
    pub use_important_moves: bool,
    /// Seed for the simulated packet loss.
    #[serde(default)]
    pub seed: u64,
}

fn default_dt() -> f32 {
    DEFAULT_DT
}

fn default_tick_hz() -> u32 {
    60
}

fn default_tightness() -> f32 {
    0.1
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            tick_hz: default_tick_hz(),
            tightness: default_tightness(),
            view: ViewOptions::default(),
            latency: Latency::default(),
            packet_loss: PacketLoss::default(),
            use_important_moves: false,
            seed: 0,
        }
    }
}

const VIEW_CVARS: [(&str, &str); 6] = [
    ("cl_render_client", "Draw the predicted client cube"),
    ("cl_render_server", "Draw the authoritative server cube"),
    ("cl_render_proxy", "Draw the last received server state"),
    ("cl_render_history", "Draw the client move history"),
    ("cl_render_smoothed_client", "Draw the smoothed client cube"),
    ("cl_render_smoothed_proxy", "Draw the smoothed proxy cube"),
];

impl SimConfig {
    /// Parses config from JSON; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(s).context("parse sim config")?;
        if config.dt.is_nan() || config.dt <= 0.0 {
            bail!("dt must be positive, got {}", config.dt);
        }
        if config.tick_hz == 0 {
            bail!("tick_hz must be positive");
        }
        Ok(config)
    }

    fn view_flags(&self) -> [bool; 6] {
        let v = &self.view;
        [
            v.render_client,
            v.render_server,
            v.render_proxy,
            v.render_history,
            v.render_smoothed_client,
            v.render_smoothed_proxy,
        ]
    }

    /// Every tweakable option as `(name, value, description, flags)`.
    fn cvars(&self) -> Vec<(&'static str, CvarValue, &'static str, CvarFlags)> {
        let mut out: Vec<_> = VIEW_CVARS
            .iter()
            .zip(self.view_flags())
            .map(|(&(name, description), on)| (name, CvarValue::Bool(on), description, CvarFlags::ARCHIVE))
            .collect();
        out.push((
            "net_latency",
            CvarValue::Int(i64::from(self.latency.millis())),
            "Simulated round trip in ms (0, 50, 200, 2000)",
            CvarFlags::ARCHIVE,
        ));
        out.push((
            "net_loss",
            CvarValue::Int(i64::from(self.packet_loss.percent())),
            "Simulated packet loss in percent (0, 5, 10, 50)",
            CvarFlags::ARCHIVE,
        ));
        out.push((
            "sv_important_moves",
            CvarValue::Bool(self.use_important_moves),
            "Replay resent important moves on the server",
            CvarFlags::ARCHIVE | CvarFlags::SERVER_ONLY,
        ));
        out.push((
            "cl_tightness",
            CvarValue::Float(f64::from(self.tightness)),
            "Fraction of error removed per smoothing step",
            CvarFlags::ARCHIVE,
        ));
        out
    }

    /// Registers every tweakable option as a cvar holding the current value.
    pub fn register_cvars(&self, console: &mut Console) {
        for (name, value, description, flags) in self.cvars() {
            console.register_cvar(name, value, description, flags);
        }
    }

    /// Overwrites the registered cvars with the current values.
    pub fn store_cvars(&self, console: &mut Console) -> anyhow::Result<()> {
        for (name, value, _, _) in self.cvars() {
            console.set_cvar(name, value)?;
        }
        Ok(())
    }

    /// Reads the cvars registered by [`SimConfig::register_cvars`] back into
    /// `self`. Unregistered cvars leave their field untouched; on error
    /// `self` is unchanged.
    pub fn apply_cvars(&mut self, console: &Console) -> anyhow::Result<()> {
        let mut next = self.clone();

        let mut flags = next.view_flags();
        for (&(name, _), flag) in VIEW_CVARS.iter().zip(flags.iter_mut()) {
            if let Some(value) = console.get_cvar(name) {
                *flag = value.as_bool();
            }
        }
        let [client, server, proxy, history, smoothed_client, smoothed_proxy] = flags;
        next.view = ViewOptions {
            render_client: client,
            render_server: server,
            render_proxy: proxy,
            render_history: history,
            render_smoothed_client: smoothed_client,
            render_smoothed_proxy: smoothed_proxy,
        };

        if let Some(value) = console.get_cvar("net_latency") {
            let ms = value.as_int().context("net_latency must be a number")?;
            next.latency = Latency::from_millis(ms)?;
        }
        if let Some(value) = console.get_cvar("net_loss") {
            let percent = value.as_int().context("net_loss must be a number")?;
            next.packet_loss = PacketLoss::from_percent(percent)?;
        }
        if let Some(value) = console.get_cvar("sv_important_moves") {
            next.use_important_moves = value.as_bool();
        }
        if let Some(value) = console.get_cvar("cl_tightness") {
            let tightness = value.as_float().context("cl_tightness must be a number")?;
            if !(0.0..=1.0).contains(&tightness) {
                bail!("cl_tightness must be within [0, 1], got {tightness}");
            }
            next.tightness = tightness as f32;
        }

        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partial_json_uses_defaults() {
        let config =
            SimConfig::from_json_str(r#"{"latency":"TwoHundredMs","use_important_moves":true}"#)
                .unwrap();
        assert_eq!(config.latency, Latency::TwoHundredMs);
        assert!(config.use_important_moves);
        assert_eq!(config.dt, 0.01);
        assert_eq!(config.view, ViewOptions::default());
    }

    #[test]
    fn rejects_non_positive_dt() {
        assert!(SimConfig::from_json_str(r#"{"dt":0.0}"#).is_err());
    }

    #[test]
    fn latency_is_half_round_trip() {
        assert_eq!(Latency::None.one_way_secs(), 0.0);
        assert!((Latency::FiftyMs.one_way_secs() - 0.025).abs() < 1e-7);
        assert!((Latency::TwoHundredMs.one_way_secs() - 0.1).abs() < 1e-7);
        assert_eq!(Latency::TwoSeconds.one_way_secs(), 1.0);
    }

    #[test]
    fn settings_cycle_and_wrap() {
        assert_eq!(Latency::TwoSeconds.next(), Latency::None);
        assert_eq!(PacketLoss::None.next(), PacketLoss::Five);
        assert_eq!(PacketLoss::Fifty.next(), PacketLoss::None);
    }

    #[test]
    fn parse_values() {
        assert_eq!("200".parse::<Latency>().unwrap(), Latency::TwoHundredMs);
        assert_eq!("50ms".parse::<Latency>().unwrap(), Latency::FiftyMs);
        assert_eq!("10%".parse::<PacketLoss>().unwrap(), PacketLoss::Ten);
        assert!("30".parse::<PacketLoss>().is_err());
        assert!("fast".parse::<Latency>().is_err());
    }

    #[test]
    fn cvars_round_trip_through_console() {
        let mut console = Console::new();
        let mut config = SimConfig::default();
        config.register_cvars(&mut console);

        console.exec("net_latency 2000").unwrap();
        console.exec("set net_loss 50").unwrap();
        console.exec("cl_render_server 1").unwrap();
        console.exec("sv_important_moves true").unwrap();
        config.apply_cvars(&console).unwrap();

        assert_eq!(config.latency, Latency::TwoSeconds);
        assert_eq!(config.packet_loss, PacketLoss::Fifty);
        assert!(config.view.render_server);
        assert!(config.view.render_client);
        assert!(config.use_important_moves);
    }

    #[test]
    fn invalid_cvar_value_is_an_error() {
        let mut console = Console::new();
        let mut config = SimConfig::default();
        config.register_cvars(&mut console);
        console.exec("net_loss 33").unwrap();
        assert!(config.apply_cvars(&console).is_err());
        assert_eq!(config, SimConfig::default());

        config.store_cvars(&mut console).unwrap();
        assert_eq!(console.get_cvar("net_loss"), Some(CvarValue::Int(0)));
    }
}
