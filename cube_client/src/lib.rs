//! `cube_client`
//!
//! Client-side systems:
//! - Input sampling (console key commands, scripts)
//! - Prediction with a recorded move history
//! - Reconciliation against authoritative snapshots (snap or smooth)
//! - The in-process session joining client, simulated link and server
//! - A real-time driver for the binary

pub mod history;
pub mod input;
pub mod reconciler;
pub mod runner;
pub mod session;

pub use reconciler::ClientReconciler;
pub use session::Session;
