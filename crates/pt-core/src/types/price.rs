//! The normalized price record every venue adapter produces.

use serde::{Deserialize, Serialize};

use super::enums::{Feed, Venue};

/// Latest market values for one instrument, as reported by one venue feed.
///
/// Prices and rates are kept as the exact decimal strings the venue sent, and
/// `timestamp` is the exchange-supplied event time passed through verbatim.
/// `last_price` is `None` only on mark/funding feeds that carry no trade price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub venue: Venue,
    pub feed: Feed,
    pub last_price: Option<String>,
    pub funding_rate: Option<String>,
    pub mark_price: Option<String>,
    pub timestamp: String,
}

impl PriceUpdate {
    /// Start a record with only the identity fields set.
    pub fn new(venue: Venue, feed: Feed, symbol: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            venue,
            feed,
            last_price: None,
            funding_rate: None,
            mark_price: None,
            timestamp: timestamp.into(),
        }
    }

    pub fn with_last_price(mut self, price: impl Into<String>) -> Self {
        self.last_price = Some(price.into());
        self
    }

    pub fn with_funding_rate(mut self, rate: impl Into<String>) -> Self {
        self.funding_rate = Some(rate.into());
        self
    }

    pub fn with_mark_price(mut self, price: impl Into<String>) -> Self {
        self.mark_price = Some(price.into());
        self
    }

    /// Overlay the fields present in `delta` onto `self`.
    ///
    /// Used for venues that publish partial ticker deltas after a snapshot.
    pub fn merge_from(&mut self, delta: PriceUpdate) {
        if delta.last_price.is_some() {
            self.last_price = delta.last_price;
        }
        if delta.funding_rate.is_some() {
            self.funding_rate = delta.funding_rate;
        }
        if delta.mark_price.is_some() {
            self.mark_price = delta.mark_price;
        }
        self.timestamp = delta.timestamp;
    }
}

impl std::fmt::Display for PriceUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Price({}:{} {} last={} mark={} funding={} ts={})",
            self.venue,
            self.feed,
            self.symbol,
            self.last_price.as_deref().unwrap_or("-"),
            self.mark_price.as_deref().unwrap_or("-"),
            self.funding_rate.as_deref().unwrap_or("-"),
            self.timestamp
        )
    }
}
