//! Bitget market data (venue D): stream definitions.
//!
//! One public v2 connection carries `ticker` for both `SPOT` and
//! `USDT-FUTURES` instruments. Bitget uses plain `BTCUSDT` instrument ids.

pub mod parser;
pub mod protocol;

use anyhow::{Result, bail};
use pt_core::config::VenueConfig;
use pt_core::ws::PingPayload;

use self::protocol::{BitgetInstType, BitgetKey, BitgetProtocol};
use crate::FeedCaches;
use crate::auth::Credentials;
use crate::pipeline::{StreamDef, cache_writer};

pub const BITGET_WS_URL: &str = "wss://ws.bitget.com/v2/ws/public";

/// `btc-usdt`, `BTC_USDT` → `BTCUSDT`.
pub fn to_bitget_inst_id(symbol: &str) -> String {
    symbol.chars().filter(|c| *c != '-' && *c != '_').collect::<String>().to_uppercase()
}

/// Build Bitget stream definitions from the venue config.
pub fn build(cfg: &VenueConfig, caches: &FeedCaches) -> Result<Vec<StreamDef<BitgetProtocol>>> {
    let spot = cfg.spot_symbols();
    let futures = cfg.futures_symbols();
    let keys: Vec<BitgetKey> = spot
        .iter()
        .map(|s| BitgetKey::ticker(BitgetInstType::Spot, to_bitget_inst_id(s)))
        .chain(futures.iter().map(|s| BitgetKey::ticker(BitgetInstType::UsdtFutures, to_bitget_inst_id(s))))
        .collect();
    if keys.is_empty() {
        bail!("bitget: no symbols configured");
    }

    let url = cfg.ws_url.as_deref().unwrap_or(BITGET_WS_URL);
    Ok(vec![StreamDef {
        label: "bitget_public".into(),
        connection: cfg.connection_config(url, PingPayload::Text("ping".into()), true),
        protocol: BitgetProtocol::new(Credentials::from_config(cfg)),
        keys,
        on_data: cache_writer(caches.clone(), parser::parse_message),
    }])
}
