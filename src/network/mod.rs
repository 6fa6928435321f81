//! Network layer for har-replay
//!
//! Serves replayed responses over HTTP/1.1 on a local listener.

mod server;

pub use server::ReplayServer;

/// Graceful shutdown timeout
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5000;
