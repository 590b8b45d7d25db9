//! Venue-specific frame classification, decoupled from the transport.
//!
//! [`StreamConnection`](crate::ws::StreamConnection) is generic over
//! [`MessageDispatcher`]. Venues do not implement the trait by hand; they
//! describe their envelope through [`VenueProtocol`] and get the uniform
//! dispatch algorithm from [`VenueDispatcher`].

mod client;
mod dispatcher;
mod registry;

use std::sync::Arc;

use serde_json::Value;

pub use client::VenueClient;
pub use dispatcher::{Envelope, VenueDispatcher, VenueProtocol};
pub use registry::SubscriptionRegistry;

use crate::error::{DecodeError, FeedError};

/// Catch-all listener for raw frames (`on_message` / `on_error`).
pub type OnReceive = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-subscription callback, handed the decoded envelope. An `Err` is
/// treated like any other dispatch failure (logged, frame dropped).
pub type OnData = Arc<dyn Fn(&Value) -> Result<(), FeedError> + Send + Sync>;

/// Capability set the read loop drives for every inbound frame.
pub trait MessageDispatcher: Send + Sync + 'static {
    /// Classify and route a regular frame.
    fn handle_message(&self, raw: &str) -> Result<(), FeedError>;

    /// Called with the raw frame after `handle_message` failed.
    fn handle_error(&self, raw: &str) -> Result<(), FeedError>;

    /// Heartbeat replies and protocol acks. `Ok(true)` consumes the frame.
    fn handle_special_message(&self, raw: &str) -> Result<bool, FeedError>;

    fn set_listeners(&self, on_message: OnReceive, on_error: OnReceive);

    /// Frames sent on every fresh socket before normal dispatch resumes:
    /// login first (if any), then one subscribe request for all retained keys.
    fn connect_messages(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Decode a raw frame into a JSON value. Never panics.
pub fn decode(raw: &str) -> Result<Value, DecodeError> {
    Ok(serde_json::from_str(raw)?)
}
