//! Bitget v2 public envelope.
//!
//! Data frames carry `arg: {instType, channel, instId}` and a `data` array.
//! Errors are `event: "error"` or a non-zero `code`; the login ack is
//! `event: "login"`. Codes arrive as numbers, so they are compared as text.

use pt_core::Venue;
use pt_core::dispatch::{Envelope, VenueProtocol};
use serde_json::{Value, json};

use crate::auth::{self, Credentials};
use crate::json_util::text;

const LOGIN_PATH: &str = "/user/verify";
pub const TICKER_CHANNEL: &str = "ticker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitgetInstType {
    Spot,
    UsdtFutures,
    CoinFutures,
    UsdcFutures,
}

impl BitgetInstType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "SPOT",
            Self::UsdtFutures => "USDT-FUTURES",
            Self::CoinFutures => "COIN-FUTURES",
            Self::UsdcFutures => "USDC-FUTURES",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "SPOT" => Some(Self::Spot),
            "USDT-FUTURES" => Some(Self::UsdtFutures),
            "COIN-FUTURES" => Some(Self::CoinFutures),
            "USDC-FUTURES" => Some(Self::UsdcFutures),
            _ => None,
        }
    }

    pub fn is_futures(&self) -> bool {
        !matches!(self, Self::Spot)
    }
}

/// One Bitget subscription: product type, channel and instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitgetKey {
    pub inst_type: BitgetInstType,
    pub channel: String,
    pub inst_id: String,
}

impl BitgetKey {
    pub fn ticker(inst_type: BitgetInstType, inst_id: impl Into<String>) -> Self {
        Self { inst_type, channel: TICKER_CHANNEL.into(), inst_id: inst_id.into() }
    }

    fn to_arg(&self) -> Value {
        json!({"instType": self.inst_type.as_str(), "channel": self.channel, "instId": self.inst_id})
    }

    fn from_arg(arg: &Value) -> Option<Self> {
        Some(Self {
            inst_type: BitgetInstType::from_wire(arg.get("instType")?.as_str()?)?,
            channel: arg.get("channel")?.as_str()?.to_string(),
            inst_id: arg.get("instId")?.as_str()?.to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct BitgetProtocol {
    credentials: Option<Credentials>,
}

impl BitgetProtocol {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }

    fn request(op: &str, keys: &[BitgetKey]) -> String {
        let args: Vec<Value> = keys.iter().map(BitgetKey::to_arg).collect();
        json!({"op": op, "args": args}).to_string()
    }
}

impl VenueProtocol for BitgetProtocol {
    type Key = BitgetKey;

    fn venue(&self) -> Venue {
        Venue::Bitget
    }

    fn is_special(&self, raw: &str) -> bool {
        raw == "pong"
    }

    fn classify(&self, value: &Value) -> Envelope<BitgetKey> {
        let event = value.get("event").and_then(Value::as_str);
        let code = text(value.get("code"));
        if event == Some("error") || (!code.is_empty() && code != "0") {
            return Envelope::Error { code, message: text(value.get("msg")) };
        }
        if event == Some("login") {
            return Envelope::Login;
        }
        if value.get("data").is_some() {
            return Envelope::Data(value.get("arg").and_then(BitgetKey::from_arg));
        }
        Envelope::Other
    }

    fn subscribe_request(&self, keys: &[BitgetKey]) -> String {
        Self::request("subscribe", keys)
    }

    fn unsubscribe_request(&self, keys: &[BitgetKey]) -> String {
        Self::request("unsubscribe", keys)
    }

    fn login_request(&self) -> Option<String> {
        self.credentials.as_ref().map(|c| auth::prehash_login(c, LOGIN_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(raw: &str) -> Envelope<BitgetKey> {
        BitgetProtocol::default().classify(&serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn data_key_from_arg() {
        let env = classify(
            r#"{"action":"snapshot","arg":{"instType":"USDT-FUTURES","channel":"ticker","instId":"BTCUSDT"},
                "data":[],"ts":1}"#,
        );
        assert_eq!(env, Envelope::Data(Some(BitgetKey::ticker(BitgetInstType::UsdtFutures, "BTCUSDT"))));
    }

    #[test]
    fn numeric_codes() {
        assert!(matches!(
            classify(r#"{"event":"error","code":30001,"msg":"instType:sp,channel:ticker doesn't exist"}"#),
            Envelope::Error { ref code, .. } if code == "30001"
        ));
        assert_eq!(classify(r#"{"event":"login","code":0,"msg":""}"#), Envelope::Login);
        assert_eq!(
            classify(r#"{"event":"subscribe","arg":{"instType":"SPOT","channel":"ticker","instId":"BTCUSDT"}}"#),
            Envelope::Other
        );
    }

    #[test]
    fn subscribe_shape() {
        let req: Value = serde_json::from_str(
            &BitgetProtocol::default().subscribe_request(&[BitgetKey::ticker(BitgetInstType::Spot, "ETHUSDT")]),
        )
        .unwrap();
        assert_eq!(req["op"], "subscribe");
        assert_eq!(req["args"][0]["instType"], "SPOT");
        assert_eq!(req["args"][0]["channel"], "ticker");
        assert_eq!(req["args"][0]["instId"], "ETHUSDT");
    }
}
