//! Bitget `ticker` parser.
//!
//! Spot items carry `lastPr`; futures items additionally carry `markPrice`
//! and `fundingRate`, which are kept on the perpetual record.

use pt_core::{DecodeError, Feed, PriceUpdate, Venue};
use serde_json::Value;

use super::protocol::{BitgetInstType, TICKER_CHANNEL};
use crate::json_util::{opt_price_field, price_field, str_field, timestamp_field};

pub fn parse_message(v: &Value) -> Result<Vec<PriceUpdate>, DecodeError> {
    let arg = v.get("arg").ok_or(DecodeError::MissingField("arg"))?;
    if str_field(arg, "channel")? != TICKER_CHANNEL {
        return Err(DecodeError::InvalidField("channel"));
    }
    let inst_type =
        BitgetInstType::from_wire(str_field(arg, "instType")?).ok_or(DecodeError::InvalidField("instType"))?;
    let feed = if inst_type.is_futures() { Feed::Perpetual } else { Feed::Spot };
    let data = v
        .get("data")
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingField("data"))?;
    data.iter().map(|item| parse_item(feed, item)).collect()
}

fn parse_item(feed: Feed, d: &Value) -> Result<PriceUpdate, DecodeError> {
    let inst_id = str_field(d, "instId")?;
    let ts = timestamp_field(d, "ts")?;
    let mut update = PriceUpdate::new(Venue::Bitget, feed, inst_id, ts).with_last_price(price_field(d, "lastPr")?);
    if feed == Feed::Perpetual {
        update.mark_price = opt_price_field(d, "markPrice")?;
        update.funding_rate = opt_price_field(d, "fundingRate")?;
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Vec<PriceUpdate>, DecodeError> {
        parse_message(&serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn spot_ticker() {
        let raw = r#"{"action":"snapshot","arg":{"instType":"SPOT","channel":"ticker","instId":"ETHUSDT"},
            "data":[{"instId":"ETHUSDT","lastPr":"2200.10","open24h":"2100","ts":"1695702438018"}],
            "ts":1695702438029}"#;
        let u = &parse(raw).unwrap()[0];
        assert_eq!(u.venue, Venue::Bitget);
        assert_eq!(u.feed, Feed::Spot);
        assert_eq!(u.last_price.as_deref(), Some("2200.10"));
        assert_eq!(u.mark_price, None);
        assert_eq!(u.timestamp, "1695702438018");
    }

    #[test]
    fn futures_ticker_keeps_mark_and_funding() {
        let raw = r#"{"action":"snapshot","arg":{"instType":"USDT-FUTURES","channel":"ticker","instId":"BTCUSDT"},
            "data":[{"instId":"BTCUSDT","lastPr":"27000.5","markPrice":"27000.0","fundingRate":"0.000010",
                     "ts":"1695715383021"}]}"#;
        let u = &parse(raw).unwrap()[0];
        assert_eq!(u.feed, Feed::Perpetual);
        assert_eq!(u.mark_price.as_deref(), Some("27000.0"));
        assert_eq!(u.funding_rate.as_deref(), Some("0.000010"));
    }

    #[test]
    fn missing_last_price_is_an_error() {
        let raw = r#"{"arg":{"instType":"SPOT","channel":"ticker","instId":"X"},"data":[{"instId":"X","ts":"1"}]}"#;
        assert!(matches!(parse(raw), Err(DecodeError::MissingField("lastPr"))));
    }
}
