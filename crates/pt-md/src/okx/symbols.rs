//! OKX instrument ids (`BTCUSDT` → `BTC-USDT` / `BTC-USDT-SWAP`).

/// Quote currencies recognised when splitting a concatenated symbol.
const QUOTES: [&str; 5] = ["USDT", "USDC", "BTC", "ETH", "DAI"];

/// Spot instId for `symbol`. Input already containing a separator is only
/// normalized (`btc_usdt` → `BTC-USDT`); an unknown quote is kept verbatim.
pub fn to_okx_inst_id(symbol: &str) -> String {
    let upper = symbol.to_uppercase().replace('_', "-");
    if upper.contains('-') {
        return upper;
    }
    QUOTES
        .iter()
        .find_map(|q| upper.strip_suffix(q).filter(|base| !base.is_empty()).map(|base| format!("{base}-{q}")))
        .unwrap_or(upper)
}

/// Perpetual swap instId. Idempotent on ids that already end in `-SWAP`.
pub fn to_okx_swap_inst_id(symbol: &str) -> String {
    let inst_id = to_okx_inst_id(symbol);
    if inst_id.ends_with("-SWAP") { inst_id } else { format!("{inst_id}-SWAP") }
}
