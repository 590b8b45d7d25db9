//! Adapter registry: factory for creating venue adapters from config.

use anyhow::Result;
use pt_core::Venue;
use pt_core::config::VenueConfig;

use crate::pipeline::GenericAdapter;
use crate::{FeedCaches, VenueAdapter};

/// Create a [`VenueAdapter`] based on the `exchange` field in the config.
///
/// Each venue module's `build()` produces `StreamDef`s that are fed into
/// [`GenericAdapter`]; parsed records are published into `caches`.
pub fn create_adapter(cfg: &VenueConfig, caches: FeedCaches) -> Result<Box<dyn VenueAdapter>> {
    let venue = cfg.exchange;
    let name = venue.as_str();
    let adapter: Box<dyn VenueAdapter> = match venue {
        Venue::Binance => Box::new(GenericAdapter::new(name, venue, crate::binance::build(cfg, &caches)?)),
        Venue::Okx => Box::new(GenericAdapter::new(name, venue, crate::okx::build(cfg, &caches)?)),
        Venue::Bybit => Box::new(GenericAdapter::new(name, venue, crate::bybit::build(cfg, &caches)?)),
        Venue::Bitget => Box::new(GenericAdapter::new(name, venue, crate::bitget::build(cfg, &caches)?)),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_each_venue() {
        for (exchange, venue) in [
            ("bn", Venue::Binance),
            ("okx", Venue::Okx),
            ("bybit", Venue::Bybit),
            ("bitget", Venue::Bitget),
        ] {
            let cfg: VenueConfig =
                serde_json::from_str(&format!(r#"{{"exchange":"{exchange}","spot_symbols":["BTCUSDT"]}}"#)).unwrap();
            let adapter = create_adapter(&cfg, FeedCaches::new()).unwrap();
            assert_eq!(adapter.venue(), venue);
            assert_eq!(adapter.name(), venue.as_str());
            assert!(!adapter.is_exhausted());
        }
    }

    #[test]
    fn missing_symbols_fail() {
        let cfg: VenueConfig = serde_json::from_str(r#"{"exchange":"okx"}"#).unwrap();
        assert!(create_adapter(&cfg, FeedCaches::new()).is_err());
    }
}
