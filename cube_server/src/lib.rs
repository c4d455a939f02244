//! `cube_server`
//!
//! Server-side systems:
//! - Authoritative cube scene
//! - Receives client `Move`s (current plus important)
//! - Produces `Snapshot`s
//!
//! Transport is left to the caller; see `cube_client::session` for the
//! in-process simulated link.

pub mod server;

pub use server::Server;
