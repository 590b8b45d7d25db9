//! Typed error definitions for the price-tap system.
//!
//! [`FeedError`] covers the transport, protocol, decode and sink failures of
//! the ingestion core. All variants implement `std::error::Error` via
//! `thiserror`, so they integrate with `anyhow::Result` at the application
//! edge.

use thiserror::Error;

/// Errors raised by the ingestion core.
#[derive(Debug, Error)]
pub enum FeedError {
    /// `start()` was called on a connection that is already running.
    #[error("connection is already running")]
    AlreadyRunning,

    /// `start()` was called before a message dispatcher was attached.
    #[error("message dispatcher is not set")]
    HandlerNotSet,

    /// A send was attempted while no socket is open.
    #[error("no connection available")]
    NotConnected,

    /// The connection reached its terminal state.
    #[error("connection is stopped")]
    Stopped,

    /// Dial, handshake, read or write failure on the socket.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Malformed inbound payload.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The venue reported a non-success status in-band.
    #[error("protocol error {code}: {message}")]
    Protocol { code: String, message: String },

    /// Outbound value could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Sink rejected a flushed batch.
    #[error("sink error: {0}")]
    Sink(String),
}

/// Failure to turn a raw frame into a usable JSON value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected payload shape")]
    UnexpectedShape,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value for field `{0}`")]
    InvalidField(&'static str),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(e.to_string())
    }
}
