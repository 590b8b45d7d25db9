//! Bybit v5 public envelope.
//!
//! Data frames carry `topic` (`tickers.BTCUSDT`), which is the subscription
//! key. `success: false` marks a rejected request; `op: "auth"` is the auth
//! ack. Pongs come back either as plain `pong` or as a JSON op reply.

use pt_core::Venue;
use pt_core::dispatch::{Envelope, VenueProtocol};
use serde_json::{Value, json};

use crate::auth::{self, Credentials};
use crate::json_util::text;

/// Ticker topic for `symbol`.
pub fn ticker_topic(symbol: &str) -> String {
    format!("tickers.{symbol}")
}

#[derive(Debug, Default)]
pub struct BybitProtocol {
    credentials: Option<Credentials>,
}

impl BybitProtocol {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }

    fn request(op: &str, keys: &[String]) -> String {
        json!({
            "req_id": uuid::Uuid::new_v4().to_string(),
            "op": op,
            "args": keys,
        })
        .to_string()
    }
}

impl VenueProtocol for BybitProtocol {
    type Key = String;

    fn venue(&self) -> Venue {
        Venue::Bybit
    }

    fn is_special(&self, raw: &str) -> bool {
        raw == "pong" || raw.contains(r#""op":"pong""#) || raw.contains(r#""ret_msg":"pong""#)
    }

    fn classify(&self, value: &Value) -> Envelope<String> {
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            return Envelope::Error {
                code: text(value.get("ret_code")),
                message: text(value.get("ret_msg")),
            };
        }
        if value.get("op").and_then(Value::as_str) == Some("auth") {
            return Envelope::Login;
        }
        if value.get("data").is_some() {
            return Envelope::Data(value.get("topic").and_then(Value::as_str).map(String::from));
        }
        Envelope::Other
    }

    fn subscribe_request(&self, keys: &[String]) -> String {
        Self::request("subscribe", keys)
    }

    fn unsubscribe_request(&self, keys: &[String]) -> String {
        Self::request("unsubscribe", keys)
    }

    fn login_request(&self) -> Option<String> {
        self.credentials.as_ref().map(auth::realtime_auth)
    }
}
