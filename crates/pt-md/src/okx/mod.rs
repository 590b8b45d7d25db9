//! OKX market data (venue B): stream definitions.
//!
//! One public connection carries both products:
//! - Spot: `tickers` per instId (`BTC-USDT`)
//! - Swap: `tickers`, `funding-rate`, `mark-price` per instId (`BTC-USDT-SWAP`)

pub mod parser;
pub mod protocol;
pub mod symbols;

use anyhow::{Result, bail};
use pt_core::config::VenueConfig;
use pt_core::ws::PingPayload;

use self::protocol::{OkxChannel, OkxKey, OkxProtocol};
use self::symbols::{to_okx_inst_id, to_okx_swap_inst_id};
use crate::FeedCaches;
use crate::auth::Credentials;
use crate::pipeline::{StreamDef, cache_writer};

pub const OKX_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";

/// Build OKX stream definitions from the venue config.
pub fn build(cfg: &VenueConfig, caches: &FeedCaches) -> Result<Vec<StreamDef<OkxProtocol>>> {
    let mut keys: Vec<OkxKey> = cfg
        .spot_symbols()
        .iter()
        .map(|s| OkxKey::new(OkxChannel::Tickers, to_okx_inst_id(s)))
        .collect();
    for symbol in cfg.futures_symbols() {
        let inst_id = to_okx_swap_inst_id(&symbol);
        keys.push(OkxKey::new(OkxChannel::Tickers, inst_id.clone()));
        keys.push(OkxKey::new(OkxChannel::FundingRate, inst_id.clone()));
        keys.push(OkxKey::new(OkxChannel::MarkPrice, inst_id));
    }
    if keys.is_empty() {
        bail!("okx: no symbols configured");
    }

    let url = cfg.ws_url.as_deref().unwrap_or(OKX_WS_URL);
    Ok(vec![StreamDef {
        label: "okx_public".into(),
        connection: cfg.connection_config(url, PingPayload::Text("ping".into()), true),
        protocol: OkxProtocol::new(Credentials::from_config(cfg)),
        keys,
        on_data: cache_writer(caches.clone(), parser::parse_message),
    }])
}
