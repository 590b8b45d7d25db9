//! OKX v5 public envelope.
//!
//! Data frames carry `arg: {channel, instId}` and a `data` array. Errors are
//! `event: "error"` or a non-zero `code`; the login ack is `event: "login"`.

use pt_core::Venue;
use pt_core::dispatch::{Envelope, VenueProtocol};
use serde_json::{Value, json};

use crate::auth::{self, Credentials};
use crate::json_util::text;

const LOGIN_PATH: &str = "/users/self/verify";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OkxChannel {
    Tickers,
    FundingRate,
    MarkPrice,
}

impl OkxChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tickers => "tickers",
            Self::FundingRate => "funding-rate",
            Self::MarkPrice => "mark-price",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "tickers" => Some(Self::Tickers),
            "funding-rate" => Some(Self::FundingRate),
            "mark-price" => Some(Self::MarkPrice),
            _ => None,
        }
    }
}

/// One OKX subscription: channel + instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OkxKey {
    pub channel: OkxChannel,
    pub inst_id: String,
}

impl OkxKey {
    pub fn new(channel: OkxChannel, inst_id: impl Into<String>) -> Self {
        Self { channel, inst_id: inst_id.into() }
    }

    fn to_arg(&self) -> Value {
        json!({"channel": self.channel.as_str(), "instId": self.inst_id})
    }
}

#[derive(Debug, Default)]
pub struct OkxProtocol {
    credentials: Option<Credentials>,
}

impl OkxProtocol {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }

    fn request(op: &str, keys: &[OkxKey]) -> String {
        let args: Vec<Value> = keys.iter().map(OkxKey::to_arg).collect();
        json!({"op": op, "args": args}).to_string()
    }
}

impl VenueProtocol for OkxProtocol {
    type Key = OkxKey;

    fn venue(&self) -> Venue {
        Venue::Okx
    }

    fn is_special(&self, raw: &str) -> bool {
        raw == "pong"
    }

    fn classify(&self, value: &Value) -> Envelope<OkxKey> {
        let event = value.get("event").and_then(Value::as_str);
        if event == Some("error") {
            return Envelope::Error {
                code: text(value.get("code")),
                message: text(value.get("msg")),
            };
        }
        let code = text(value.get("code"));
        if !code.is_empty() && code != "0" {
            return Envelope::Error { code, message: text(value.get("msg")) };
        }
        if event == Some("login") {
            return Envelope::Login;
        }
        if value.get("data").is_some() {
            let key = value.get("arg").and_then(|arg| {
                let channel = OkxChannel::from_wire(arg.get("channel")?.as_str()?)?;
                let inst_id = arg.get("instId")?.as_str()?;
                Some(OkxKey::new(channel, inst_id))
            });
            return Envelope::Data(key);
        }
        Envelope::Other
    }

    fn subscribe_request(&self, keys: &[OkxKey]) -> String {
        Self::request("subscribe", keys)
    }

    fn unsubscribe_request(&self, keys: &[OkxKey]) -> String {
        Self::request("unsubscribe", keys)
    }

    fn login_request(&self) -> Option<String> {
        self.credentials.as_ref().map(|c| auth::prehash_login(c, LOGIN_PATH))
    }
}
