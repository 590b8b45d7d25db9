//! Binance stream names.
//!
//! Per-symbol streams use the lowercase symbol (`btcusdt@miniTicker`).

/// All-market mini tickers (spot).
pub const ALL_MINI_TICKER: &str = "!miniTicker@arr";
/// All-market 24h tickers.
pub const ALL_TICKER: &str = "!ticker@arr";
/// All-market mark price + funding rate, 1 s cadence (futures).
pub const ALL_MARK_PRICE: &str = "!markPrice@arr@1s";

pub fn mini_ticker(symbol: &str) -> String {
    format!("{}@miniTicker", symbol.to_lowercase())
}

pub fn ticker(symbol: &str) -> String {
    format!("{}@ticker", symbol.to_lowercase())
}

pub fn mark_price(symbol: &str) -> String {
    format!("{}@markPrice@1s", symbol.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lowercase() {
        assert_eq!(mini_ticker("BTCUSDT"), "btcusdt@miniTicker");
        assert_eq!(ticker("ETHUSDT"), "ethusdt@ticker");
        assert_eq!(mark_price("BTCUSDT"), "btcusdt@markPrice@1s");
    }
}
