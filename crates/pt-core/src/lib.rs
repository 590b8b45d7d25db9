//! # pt-core
//!
//! Core crate for the price-tap system, providing:
//!
//! - **Types** (`types`): venues, feeds, the normalized [`PriceUpdate`]
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): [`FeedError`] / [`DecodeError`] via thiserror
//! - **WebSocket** (`ws`): [`StreamConnection`] with watchdog, heartbeat and auto-reconnect
//! - **Dispatch** (`dispatch`): the per-venue message dispatch contract and subscription registry
//! - **Cache** (`cache`): last-value price cache with direct and double-buffer modes
//! - **Signing** (`signer`): HMAC request signatures for authenticated streams
//! - **Time utilities** (`time_util`): wall-clock timestamps
//! - **Logging** (`logging`): tracing-based structured logging
//!
//! [`StreamConnection`]: ws::StreamConnection

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod signer;
pub mod time_util;
pub mod types;
pub mod ws;

pub use error::{DecodeError, FeedError};
// Re-export types at crate root for convenience.
pub use types::*;
