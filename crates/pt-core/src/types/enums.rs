//! Enumerations used throughout the price-tap system.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Venue identifiers
// ---------------------------------------------------------------------------

/// Supported cryptocurrency exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    #[serde(alias = "bn")]
    Binance,
    Okx,
    Bybit,
    Bitget,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Okx => "okx",
            Self::Bybit => "bybit",
            Self::Bitget => "bitget",
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

/// Which logical feed a price record belongs to.
///
/// Each (venue, feed) pair gets its own cache so that, for example, a mark
/// price frame never overwrites the last traded perpetual price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    /// Spot last-trade tickers.
    Spot,
    /// Perpetual swap tickers (may also carry mark and funding).
    Perpetual,
    /// Mark price stream (may also carry funding).
    Mark,
    /// Funding rate stream.
    Funding,
}

impl Feed {
    pub const ALL: [Feed; 4] = [Feed::Spot, Feed::Perpetual, Feed::Mark, Feed::Funding];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Perpetual => "perpetual",
            Self::Mark => "mark",
            Self::Funding => "funding",
        }
    }
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_accepts_short_binance_alias() {
        let v: Venue = serde_json::from_str(r#""bn""#).unwrap();
        assert_eq!(v, Venue::Binance);
        let v: Venue = serde_json::from_str(r#""bitget""#).unwrap();
        assert_eq!(v, Venue::Bitget);
    }

    #[test]
    fn feed_display_matches_serde_name() {
        for feed in Feed::ALL {
            let json = serde_json::to_string(&feed).unwrap();
            assert_eq!(json, format!("\"{feed}\""));
        }
    }
}
