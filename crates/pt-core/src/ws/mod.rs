//! Streaming connection manager with watchdog, heartbeat and auto-reconnect.

pub mod config;
pub mod connection;
pub mod state;

pub use config::{ConnectionConfig, PingPayload};
pub use connection::StreamConnection;
pub use state::{ConnectionEvent, ConnectionState};
