//! Binance market data (venue A): stream definitions.
//!
//! Produces up to 2 [`StreamDef`]s:
//! - Spot (`stream.binance.com`): mini tickers
//! - Futures (`fstream.binance.com`): tickers + mark price / funding
//!
//! Binance pings the client at the protocol level and tungstenite answers,
//! so no application heartbeat is sent unless `enable_ping` is set.

pub mod parser;
pub mod protocol;
pub mod streams;

use anyhow::{Result, bail};
use pt_core::config::VenueConfig;
use pt_core::ws::PingPayload;

use self::parser::Market;
use self::protocol::BinanceProtocol;
use crate::FeedCaches;
use crate::pipeline::{StreamDef, cache_writer};

pub const SPOT_WS_URL: &str = "wss://stream.binance.com:9443/stream";
pub const FUTURES_WS_URL: &str = "wss://fstream.binance.com/stream";

/// Build Binance stream definitions from the venue config.
pub fn build(cfg: &VenueConfig, caches: &FeedCaches) -> Result<Vec<StreamDef<BinanceProtocol>>> {
    let all = cfg.subscribe_all();
    let mut defs = Vec::new();

    let spot_keys: Vec<String> = if all {
        vec![streams::ALL_MINI_TICKER.to_string()]
    } else {
        cfg.spot_symbols().iter().map(|s| streams::mini_ticker(s)).collect()
    };
    if !spot_keys.is_empty() {
        let url = cfg.ws_url.as_deref().unwrap_or(SPOT_WS_URL);
        defs.push(StreamDef {
            label: "binance_spot".into(),
            connection: cfg.connection_config(url, PingPayload::WebSocketPing, false),
            protocol: BinanceProtocol::new(),
            keys: spot_keys,
            on_data: cache_writer(caches.clone(), |v| parser::parse_message(v, Market::Spot)),
        });
    }

    let futures_keys: Vec<String> = if all {
        vec![streams::ALL_TICKER.to_string(), streams::ALL_MARK_PRICE.to_string()]
    } else {
        cfg.futures_symbols()
            .iter()
            .flat_map(|s| [streams::ticker(s), streams::mark_price(s)])
            .collect()
    };
    if !futures_keys.is_empty() {
        let url = cfg.ws_url_futures.as_deref().unwrap_or(FUTURES_WS_URL);
        defs.push(StreamDef {
            label: "binance_futures".into(),
            connection: cfg.connection_config(url, PingPayload::WebSocketPing, false),
            protocol: BinanceProtocol::new(),
            keys: futures_keys,
            on_data: cache_writer(caches.clone(), |v| parser::parse_message(v, Market::Futures)),
        });
    }

    if defs.is_empty() {
        bail!("binance: no symbols configured and subscribe_all is off");
    }
    Ok(defs)
}
