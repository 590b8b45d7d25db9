//! OKX JSON message parser.
//!
//! Routes by `arg.channel`:
//!
//! - `tickers` → last price (`last`), spot or perpetual by `instType`
//! - `funding-rate` → `fundingRate` on the funding feed
//! - `mark-price` → `markPx` on the mark feed

use pt_core::{DecodeError, Feed, PriceUpdate, Venue};
use serde_json::Value;

use super::protocol::OkxChannel;
use crate::json_util::{price_field, str_field, timestamp_field};

pub fn parse_message(v: &Value) -> Result<Vec<PriceUpdate>, DecodeError> {
    let arg = v.get("arg").ok_or(DecodeError::MissingField("arg"))?;
    let channel = OkxChannel::from_wire(str_field(arg, "channel")?).ok_or(DecodeError::InvalidField("channel"))?;
    let data = v
        .get("data")
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingField("data"))?;
    data.iter().map(|item| parse_item(channel, item)).collect()
}

fn parse_item(channel: OkxChannel, d: &Value) -> Result<PriceUpdate, DecodeError> {
    let inst_id = str_field(d, "instId")?;
    let ts = timestamp_field(d, "ts")?;
    let update = match channel {
        OkxChannel::Tickers => {
            let feed = match d.get("instType").and_then(Value::as_str) {
                Some("SWAP") | Some("FUTURES") => Feed::Perpetual,
                Some(_) => Feed::Spot,
                None => feed_from_inst_id(inst_id),
            };
            PriceUpdate::new(Venue::Okx, feed, inst_id, ts).with_last_price(price_field(d, "last")?)
        }
        OkxChannel::FundingRate => {
            PriceUpdate::new(Venue::Okx, Feed::Funding, inst_id, ts).with_funding_rate(price_field(d, "fundingRate")?)
        }
        OkxChannel::MarkPrice => {
            PriceUpdate::new(Venue::Okx, Feed::Mark, inst_id, ts).with_mark_price(price_field(d, "markPx")?)
        }
    };
    Ok(update)
}

/// Symbols ending in `-SWAP` are perpetuals, otherwise spot.
fn feed_from_inst_id(inst_id: &str) -> Feed {
    if inst_id.ends_with("-SWAP") { Feed::Perpetual } else { Feed::Spot }
}
