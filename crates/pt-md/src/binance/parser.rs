//! Binance JSON event parser.
//!
//! Routes by the `e` field:
//!
//! - `24hrTicker` / `24hrMiniTicker` → last price (`c`) on the spot or
//!   perpetual feed
//! - `markPriceUpdate` → mark price (`p`) and funding rate (`r`) on the mark
//!   feed
//!
//! The event time `E` is the record timestamp.

use pt_core::{DecodeError, Feed, PriceUpdate, Venue};
use serde_json::Value;
use tracing::debug;

use crate::json_util::{opt_price_field, price_field, str_field, timestamp_field};

/// Which Binance endpoint a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    Spot,
    Futures,
}

impl Market {
    fn ticker_feed(self) -> Feed {
        match self {
            Self::Spot => Feed::Spot,
            Self::Futures => Feed::Perpetual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinanceEvent {
    Ticker,
    MiniTicker,
    MarkPrice,
}

impl BinanceEvent {
    pub fn from_wire(e: &str) -> Option<Self> {
        match e {
            "24hrTicker" => Some(Self::Ticker),
            "24hrMiniTicker" => Some(Self::MiniTicker),
            "markPriceUpdate" => Some(Self::MarkPrice),
            _ => None,
        }
    }
}

/// Parse a combined-stream frame (or a bare event / event array).
///
/// Array streams skip malformed items; a malformed single event is an error.
pub fn parse_message(v: &Value, market: Market) -> Result<Vec<PriceUpdate>, DecodeError> {
    let payload = v.get("data").unwrap_or(v);
    match payload {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| match parse_event(item, market) {
                Ok(update) => update,
                Err(e) => {
                    debug!("skipping binance array item: {e}");
                    None
                }
            })
            .collect()),
        Value::Object(_) => Ok(parse_event(payload, market)?.into_iter().collect()),
        _ => Err(DecodeError::UnexpectedShape),
    }
}

fn parse_event(item: &Value, market: Market) -> Result<Option<PriceUpdate>, DecodeError> {
    let Some(event) = item.get("e").and_then(Value::as_str).and_then(BinanceEvent::from_wire) else {
        return Ok(None);
    };
    let symbol = str_field(item, "s")?;
    let ts = timestamp_field(item, "E")?;

    let update = match event {
        BinanceEvent::Ticker | BinanceEvent::MiniTicker => {
            PriceUpdate::new(Venue::Binance, market.ticker_feed(), symbol, ts).with_last_price(price_field(item, "c")?)
        }
        BinanceEvent::MarkPrice => {
            let mut update =
                PriceUpdate::new(Venue::Binance, Feed::Mark, symbol, ts).with_mark_price(price_field(item, "p")?);
            update.funding_rate = opt_price_field(item, "r")?;
            update
        }
    };
    Ok(Some(update))
}
