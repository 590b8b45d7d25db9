//! Login frames for authenticated streams.
//!
//! Two schemes:
//!
//! 1. **Prehash login** (OKX, Bitget): `op: login` with `apiKey`,
//!    `passphrase`, a seconds `timestamp` and `sign` = Base64(HMAC-SHA256(
//!    `timestamp + "GET" + path`)).
//! 2. **Realtime auth** (Bybit): `op: auth` with `[apiKey, expires, sign]`
//!    where `expires` is now + 10 s in milliseconds and `sign` is the hex
//!    HMAC-SHA256 of `"GET/realtime" + expires`.

use pt_core::config::VenueConfig;
use pt_core::signer::{PrehashSigner, RealtimeSigner, Signer};
use pt_core::time_util;
use serde_json::json;

/// Validity window of a Bybit auth frame.
const AUTH_EXPIRY_MS: u64 = 10_000;

/// API credentials for one venue.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("api_key", &self.api_key).finish_non_exhaustive()
    }
}

impl Credentials {
    /// `Some` only when the venue asks for login and has key + secret.
    pub fn from_config(cfg: &VenueConfig) -> Option<Self> {
        if !cfg.wants_login() {
            return None;
        }
        Some(Self {
            api_key: cfg.api_key.clone()?,
            secret_key: cfg.api_secret_key.clone()?,
            passphrase: cfg.passphrase.clone().unwrap_or_default(),
        })
    }
}

/// `op: login` frame for OKX (`/users/self/verify`) and Bitget (`/user/verify`).
pub fn prehash_login(creds: &Credentials, path: &str) -> String {
    prehash_login_at(creds, path, &time_util::timestamp_secs_string())
}

fn prehash_login_at(creds: &Credentials, path: &str, timestamp: &str) -> String {
    let sign = PrehashSigner::new(&creds.secret_key).sign("GET", path, "", timestamp);
    json!({
        "op": "login",
        "args": [{
            "apiKey": creds.api_key,
            "passphrase": creds.passphrase,
            "timestamp": timestamp,
            "sign": sign,
        }]
    })
    .to_string()
}

/// `op: auth` frame for Bybit.
pub fn realtime_auth(creds: &Credentials) -> String {
    let expires = time_util::now_ms() + AUTH_EXPIRY_MS;
    let sign = RealtimeSigner::new(&creds.secret_key).sign("GET", "/realtime", "", &expires.to_string());
    json!({
        "req_id": uuid::Uuid::new_v4().to_string(),
        "op": "auth",
        "args": [creds.api_key, expires, sign],
    })
    .to_string()
}
