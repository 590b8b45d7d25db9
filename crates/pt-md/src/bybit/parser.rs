//! Bybit `tickers.*` parser.
//!
//! Spot tickers are always snapshots. Linear tickers send a snapshot and
//! then partial deltas that only carry the fields that changed, so every
//! price field is optional here; [`TickerMerger`](super::merge::TickerMerger)
//! fills the gaps.

use pt_core::{DecodeError, Feed, PriceUpdate, Venue};
use serde_json::Value;

use crate::json_util::{opt_price_field, str_field, timestamp_field};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Snapshot,
    Delta,
}

impl FrameKind {
    fn from_wire(s: Option<&str>) -> Result<Self, DecodeError> {
        match s {
            None | Some("snapshot") => Ok(Self::Snapshot),
            Some("delta") => Ok(Self::Delta),
            Some(_) => Err(DecodeError::InvalidField("type")),
        }
    }
}

/// Parse one ticker frame into its kind and the (possibly partial) record.
pub fn parse_ticker(v: &Value, feed: Feed) -> Result<(FrameKind, PriceUpdate), DecodeError> {
    let kind = FrameKind::from_wire(v.get("type").and_then(Value::as_str))?;
    let data = v.get("data").ok_or(DecodeError::MissingField("data"))?;
    if !data.is_object() {
        return Err(DecodeError::UnexpectedShape);
    }
    let symbol = str_field(data, "symbol")?;
    let ts = timestamp_field(v, "ts")?;

    let mut update = PriceUpdate::new(Venue::Bybit, feed, symbol, ts);
    update.last_price = opt_price_field(data, "lastPrice")?;
    update.mark_price = opt_price_field(data, "markPrice")?;
    update.funding_rate = opt_price_field(data, "fundingRate")?;

    if kind == FrameKind::Snapshot && update.last_price.is_none() {
        return Err(DecodeError::MissingField("lastPrice"));
    }
    Ok((kind, update))
}
