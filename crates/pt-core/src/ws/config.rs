//! Connection tunables.
//!
//! A [`ConnectionConfig`] is built once per venue client and never mutated
//! afterwards; the `with_*` methods consume and return the value so the
//! builder chain ends in an immutable config handed to
//! [`StreamConnection::new`](super::StreamConnection::new).

use std::collections::HashMap;
use std::time::Duration;

use crate::error::FeedError;

/// Heartbeat payload format. Varies by exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum PingPayload {
    /// Send a text frame (e.g. OKX/Bitget send `"ping"`).
    Text(String),
    /// Send a JSON object as text (e.g. Bybit `{"op":"ping"}`).
    Json(serde_json::Value),
    /// Use the standard WebSocket ping frame.
    WebSocketPing,
}

impl Default for PingPayload {
    fn default() -> Self {
        Self::Text("ping".into())
    }
}

/// Configuration for a single streaming connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Full WebSocket URL (e.g. `wss://ws.okx.com:8443/ws/v5/public`).
    pub url: String,
    /// Extra HTTP headers for the handshake.
    pub extra_headers: HashMap<String, String>,
    /// Period of the heartbeat loop.
    pub heartbeat_interval: Duration,
    /// Heartbeat frame format.
    pub heartbeat: PingPayload,
    /// Silence threshold before the watchdog reconnects; also the backoff
    /// slept before each re-dial.
    pub reconnect_wait: Duration,
    /// Watchdog tick.
    pub timer_interval: Duration,
    pub auto_reconnect: bool,
    pub heartbeat_enabled: bool,
    /// 0 = unbounded.
    pub max_reconnect_attempts: u32,
    /// Upper bound on dial + handshake.
    pub handshake_timeout: Duration,
}

impl ConnectionConfig {
    /// Defaults: 15 s `"ping"` heartbeat, 30 s reconnect wait, 1 s watchdog
    /// tick, auto-reconnect on, at most 5 reconnect attempts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra_headers: HashMap::new(),
            heartbeat_interval: Duration::from_secs(15),
            heartbeat: PingPayload::default(),
            reconnect_wait: Duration::from_secs(30),
            timer_interval: Duration::from_secs(1),
            auto_reconnect: true,
            heartbeat_enabled: true,
            max_reconnect_attempts: 5,
            handshake_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_heartbeat(mut self, interval: Duration, payload: PingPayload) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat = payload;
        self
    }

    pub fn with_heartbeat_enabled(mut self, enabled: bool) -> Self {
        self.heartbeat_enabled = enabled;
        self
    }

    pub fn with_reconnect_wait(mut self, wait: Duration) -> Self {
        self.reconnect_wait = wait;
        self
    }

    pub fn with_timer_interval(mut self, tick: Duration) -> Self {
        self.timer_interval = tick;
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, max: u32) -> Self {
        self.max_reconnect_attempts = max;
        self
    }

    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = headers;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Check the URL scheme and that every interval is non-zero.
    pub fn validate(&self) -> Result<(), FeedError> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| FeedError::Config(format!("invalid url {}: {e}", self.url)))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(FeedError::Config(format!("unsupported scheme in {}", self.url)));
        }
        if self.timer_interval.is_zero() {
            return Err(FeedError::Config("timer interval must be non-zero".into()));
        }
        if self.reconnect_wait.is_zero() {
            return Err(FeedError::Config("reconnect wait must be non-zero".into()));
        }
        if self.heartbeat_enabled && self.heartbeat_interval.is_zero() {
            return Err(FeedError::Config("heartbeat interval must be non-zero".into()));
        }
        Ok(())
    }
}
