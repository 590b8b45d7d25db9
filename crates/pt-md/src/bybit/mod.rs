//! Bybit market data (venue C): stream definitions.
//!
//! Produces up to 2 [`StreamDef`]s:
//! - Spot (`/v5/public/spot`): `tickers.*` snapshots
//! - Linear (`/v5/public/linear`): `tickers.*` snapshot + deltas carrying
//!   last, mark and funding
//!
//! Linear deltas are merged onto the last snapshot by a stateful callback
//! that captures a [`TickerMerger`], so every cached record is complete.

pub mod merge;
pub mod parser;
pub mod protocol;

use std::sync::Arc;

use anyhow::{Result, bail};
use pt_core::config::VenueConfig;
use pt_core::ws::PingPayload;
use pt_core::{DecodeError, Feed, PriceUpdate};
use serde_json::{Value, json};

use self::merge::TickerMerger;
use self::protocol::{BybitProtocol, ticker_topic};
use crate::FeedCaches;
use crate::auth::Credentials;
use crate::pipeline::{StreamDef, cache_writer};

pub const BYBIT_SPOT_WS_URL: &str = "wss://stream.bybit.com/v5/public/spot";
pub const BYBIT_LINEAR_WS_URL: &str = "wss://stream.bybit.com/v5/public/linear";

/// Build Bybit stream definitions from the venue config.
pub fn build(cfg: &VenueConfig, caches: &FeedCaches) -> Result<Vec<StreamDef<BybitProtocol>>> {
    let ping = PingPayload::Json(json!({"op": "ping"}));
    let mut defs = Vec::new();

    let spot = cfg.spot_symbols();
    if !spot.is_empty() {
        let url = cfg.ws_url.as_deref().unwrap_or(BYBIT_SPOT_WS_URL);
        defs.push(StreamDef {
            label: "bybit_spot".into(),
            connection: cfg.connection_config(url, ping.clone(), true),
            protocol: BybitProtocol::new(Credentials::from_config(cfg)),
            keys: spot.iter().map(|s| ticker_topic(s)).collect(),
            on_data: cache_writer(caches.clone(), make_ticker_parser(Feed::Spot)),
        });
    }

    let futures = cfg.futures_symbols();
    if !futures.is_empty() {
        let url = cfg.ws_url_futures.as_deref().unwrap_or(BYBIT_LINEAR_WS_URL);
        defs.push(StreamDef {
            label: "bybit_linear".into(),
            connection: cfg.connection_config(url, ping, true),
            protocol: BybitProtocol::new(Credentials::from_config(cfg)),
            keys: futures.iter().map(|s| ticker_topic(s)).collect(),
            on_data: cache_writer(caches.clone(), make_ticker_parser(Feed::Perpetual)),
        });
    }

    if defs.is_empty() {
        bail!("bybit: no symbols configured");
    }
    Ok(defs)
}

/// Create a stateful ticker parser that merges deltas onto snapshots.
fn make_ticker_parser(feed: Feed) -> impl Fn(&Value) -> Result<Vec<PriceUpdate>, DecodeError> + Send + Sync + 'static {
    let merger = Arc::new(TickerMerger::new());
    move |v: &Value| {
        let (kind, update) = parser::parse_ticker(v, feed)?;
        Ok(vec![merger.apply(kind, update)])
    }
}
