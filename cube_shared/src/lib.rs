//! `cube_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Deterministic: identical inputs give bit-identical cube states.
//! - Clear separation of concerns (math, state, forces, integration, net).
//! - The physics core is synchronous and never reaches for global state.
//! - No `unsafe`.

pub mod config;
pub mod console;
pub mod input;
pub mod integrator;
pub mod math;
pub mod net;
pub mod physics;
pub mod plane;
pub mod render;
pub mod scene;
pub mod state;
pub mod timestep;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::input::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::plane::*;
    pub use crate::render::*;
    pub use crate::scene::*;
    pub use crate::state::*;
    pub use crate::timestep::*;
}
