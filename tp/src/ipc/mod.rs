//! Inter-process communication for the planner daemon
//!
//! JSON-over-newline protocol on a Unix Domain Socket: one request line
//! per connection, one response line back. The CLI talks to a running
//! daemon through [`PlannerClient`]; the daemon side is the [`serve`]
//! loop dispatching into the planner service.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::PlannerClient;
pub use listener::{cleanup_socket, create_listener, create_listener_at, serve};
pub use messages::{PlannerMessage, PlannerResponse};

/// Default socket path for daemon IPC
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tripdaemon")
        .join("daemon.sock")
}
