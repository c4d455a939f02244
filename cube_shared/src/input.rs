//! Discrete player input.
//!
//! One sample of the five control flags. Input is the only thing the server
//! actually trusts from a client; see `net::Move`.

use serde::{Deserialize, Serialize};

/// Control flags sampled once per fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Input {
    pub left: bool,
    pub right: bool,
    pub forward: bool,
    pub back: bool,
    pub jump: bool,
}

impl Input {
    /// Returns true if no flag is set.
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }

    /// Sets the flag named by a console-style action (`left`, `jump`, ...).
    ///
    /// Returns false for unknown names.
    pub fn set_action(&mut self, action: &str, pressed: bool) -> bool {
        let flag = match action {
            "left" => &mut self.left,
            "right" => &mut self.right,
            "forward" => &mut self.forward,
            "back" => &mut self.back,
            "jump" => &mut self.jump,
            _ => return false,
        };
        *flag = pressed;
        true
    }
}
