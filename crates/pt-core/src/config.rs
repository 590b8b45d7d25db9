//! Configuration parsing for the price-tap system.
//!
//! All settings come from a single JSON file: optional logging metadata, the
//! cache mode, and a `venues` array where each entry describes one exchange
//! client.
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "module_name": "price_tap", "log_path": "/tmp/log", "level": "info" },
//!   "cache": { "mode": "batched", "batch_size": 500, "flush_interval_ms": 1000 },
//!   "venues": [{
//!     "exchange": "okx",
//!     "spot_symbols": ["BTC-USDT"],
//!     "futures_symbols": ["BTC-USDT-SWAP"],
//!     "reconnect_wait_sec": 30
//!   }]
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::BatchConfig;
use crate::types::Venue;
use crate::ws::{ConnectionConfig, PingPayload};

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: Option<LoggingConfig>,

    #[serde(default)]
    pub cache: CacheConfig,

    /// One entry per venue client.
    pub venues: Vec<VenueConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    #[default]
    Direct,
    Batched,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub mode: CacheMode,

    /// Pending writes that force a flush (default: 500).
    pub batch_size: Option<usize>,

    /// Periodic flush in milliseconds (default: 1000).
    pub flush_interval_ms: Option<u64>,
}

impl CacheConfig {
    /// A zero flush interval is rejected rather than clamped.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.flush_interval_ms == Some(0) {
            anyhow::bail!("cache.flush_interval_ms must be non-zero");
        }
        Ok(())
    }

    pub fn batch_config(&self) -> BatchConfig {
        let defaults = BatchConfig::default();
        BatchConfig {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            flush_interval: self
                .flush_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.flush_interval),
        }
    }
}

/// A single venue client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    /// `"binance"` (or `"bn"`), `"okx"`, `"bybit"`, `"bitget"`.
    pub exchange: Venue,

    /// Override for the venue's default (spot) endpoint.
    pub ws_url: Option<String>,

    /// Override for the venue's default derivatives endpoint.
    pub ws_url_futures: Option<String>,

    pub api_key: Option<String>,
    pub api_secret_key: Option<String>,
    pub passphrase: Option<String>,

    /// Send the login/auth frame on every connect (requires credentials).
    pub need_login: Option<bool>,

    pub spot_symbols: Option<Vec<String>>,
    pub futures_symbols: Option<Vec<String>>,

    /// Binance only: use the all-market array streams instead of
    /// per-symbol streams.
    pub subscribe_all: Option<bool>,

    /// Heartbeat interval in seconds (default: 15).
    pub ping_interval_sec: Option<u64>,

    /// Silence threshold and re-dial backoff in seconds (default: 30).
    pub reconnect_wait_sec: Option<u64>,

    /// Watchdog tick in seconds (default: 1).
    pub timer_interval_sec: Option<u64>,

    /// 0 = unbounded (default: 5).
    pub max_reconnect_attempts: Option<u32>,

    pub auto_reconnect: Option<bool>,
    pub enable_ping: Option<bool>,

    /// Extra HTTP headers for the WebSocket handshake.
    pub extra_headers: Option<HashMap<String, String>>,
}

impl VenueConfig {
    pub fn spot_symbols(&self) -> Vec<String> {
        self.spot_symbols.clone().unwrap_or_default()
    }

    pub fn futures_symbols(&self) -> Vec<String> {
        self.futures_symbols.clone().unwrap_or_default()
    }

    pub fn subscribe_all(&self) -> bool {
        self.subscribe_all.unwrap_or(false)
    }

    /// `true` only when login is requested and both key and secret are set.
    pub fn wants_login(&self) -> bool {
        self.need_login.unwrap_or(false) && self.api_key.is_some() && self.api_secret_key.is_some()
    }

    /// Build the connection tunables for one endpoint of this venue.
    ///
    /// `ping` is the venue's heartbeat frame; `ping_by_default` decides
    /// whether the heartbeat runs when `enable_ping` is unset.
    pub fn connection_config(&self, url: &str, ping: PingPayload, ping_by_default: bool) -> ConnectionConfig {
        let mut cfg = ConnectionConfig::new(url);
        let interval = self
            .ping_interval_sec
            .map(Duration::from_secs)
            .unwrap_or(cfg.heartbeat_interval);
        cfg = cfg
            .with_heartbeat(interval, ping)
            .with_heartbeat_enabled(self.enable_ping.unwrap_or(ping_by_default));
        if let Some(secs) = self.reconnect_wait_sec {
            cfg = cfg.with_reconnect_wait(Duration::from_secs(secs));
        }
        if let Some(secs) = self.timer_interval_sec {
            cfg = cfg.with_timer_interval(Duration::from_secs(secs));
        }
        if let Some(max) = self.max_reconnect_attempts {
            cfg = cfg.with_max_reconnect_attempts(max);
        }
        if let Some(enabled) = self.auto_reconnect {
            cfg = cfg.with_auto_reconnect(enabled);
        }
        if let Some(headers) = &self.extra_headers {
            cfg = cfg.with_extra_headers(headers.clone());
        }
        cfg
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.cache.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "logging": { "module_name": "price_tap" },
        "cache": { "mode": "batched", "batch_size": 200 },
        "venues": [
            { "exchange": "bn", "spot_symbols": ["BTCUSDT"], "subscribe_all": true },
            { "exchange": "okx", "reconnect_wait_sec": 5, "max_reconnect_attempts": 0,
              "extra_headers": { "X-Client": "pt" } }
        ]
    }"#;

    #[test]
    fn parses_sample_config() {
        let cfg: AppConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.cache.mode, CacheMode::Batched);
        let batch = cfg.cache.batch_config();
        assert_eq!(batch.batch_size, 200);
        assert_eq!(batch.flush_interval, Duration::from_millis(1000));

        assert_eq!(cfg.venues[0].exchange, Venue::Binance);
        assert!(cfg.venues[0].subscribe_all());
        assert_eq!(cfg.venues[1].exchange, Venue::Okx);
        assert!(cfg.venues[1].futures_symbols().is_empty());
    }

    #[test]
    fn cache_defaults_to_direct() {
        let cfg: AppConfig = serde_json::from_str(r#"{ "venues": [] }"#).unwrap();
        assert_eq!(cfg.cache.mode, CacheMode::Direct);
        assert_eq!(cfg.cache.batch_config().batch_size, 500);
    }

    #[test]
    fn connection_config_applies_overrides() {
        let cfg: AppConfig = serde_json::from_str(SAMPLE).unwrap();
        let conn = cfg.venues[1].connection_config("wss://ws.okx.com:8443/ws/v5/public", PingPayload::default(), true);
        assert_eq!(conn.reconnect_wait, Duration::from_secs(5));
        assert_eq!(conn.max_reconnect_attempts, 0);
        assert_eq!(conn.heartbeat_interval, Duration::from_secs(15));
        assert!(conn.heartbeat_enabled);
        assert_eq!(conn.extra_headers.get("X-Client").map(String::as_str), Some("pt"));

        let bn_url = "wss://stream.binance.com:9443/stream";
        let bn = cfg.venues[0].connection_config(bn_url, PingPayload::WebSocketPing, false);
        assert!(!bn.heartbeat_enabled);
    }

    #[test]
    fn login_requires_credentials() {
        let cfg: VenueConfig =
            serde_json::from_str(r#"{ "exchange": "bybit", "need_login": true, "api_key": "k" }"#).unwrap();
        assert!(!cfg.wants_login());
    }

    #[test]
    fn zero_flush_interval_is_rejected() {
        let raw = r#"{ "cache": { "mode": "batched", "flush_interval_ms": 0 }, "venues": [] }"#;
        let cfg: AppConfig = serde_json::from_str(raw).unwrap();
        assert!(cfg.cache.validate().is_err());

        let path = std::env::temp_dir().join(format!("pt-zero-flush-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "cache": { "flush_interval_ms": 0 }, "venues": [] }"#).unwrap();
        let err = load_config(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(err.to_string().contains("flush_interval_ms"));
    }
}
