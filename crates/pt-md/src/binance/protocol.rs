//! Binance combined-stream envelope.
//!
//! Data frames arrive as `{"stream": "<name>", "data": ...}`; the stream name
//! is the subscription key. Subscribe acks (`{"result": null, "id": n}`) are
//! consumed as special messages.

use std::sync::atomic::{AtomicU64, Ordering};

use pt_core::Venue;
use pt_core::dispatch::{Envelope, VenueProtocol};
use serde_json::{Value, json};

use crate::json_util::text;

pub struct BinanceProtocol {
    next_id: AtomicU64,
}

impl BinanceProtocol {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1) }
    }

    fn request(&self, method: &str, keys: &[String]) -> String {
        json!({
            "method": method,
            "params": keys,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        })
        .to_string()
    }
}

impl Default for BinanceProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl VenueProtocol for BinanceProtocol {
    type Key = String;

    fn venue(&self) -> Venue {
        Venue::Binance
    }

    fn is_special(&self, raw: &str) -> bool {
        raw == "ping" || (raw.contains("\"result\"") && raw.contains("\"id\""))
    }

    fn classify(&self, value: &Value) -> Envelope<String> {
        if let Some(err) = value.get("error") {
            return Envelope::Error {
                code: text(err.get("code")),
                message: text(err.get("msg")),
            };
        }
        if let Some(stream) = value.get("stream").and_then(Value::as_str) {
            return Envelope::Data(Some(stream.to_string()));
        }
        // Raw `/ws` endpoint: bare event or event array.
        if value.get("e").is_some() || value.is_array() {
            return Envelope::Data(None);
        }
        Envelope::Other
    }

    fn subscribe_request(&self, keys: &[String]) -> String {
        self.request("SUBSCRIBE", keys)
    }

    fn unsubscribe_request(&self, keys: &[String]) -> String {
        self.request("UNSUBSCRIBE", keys)
    }
}
