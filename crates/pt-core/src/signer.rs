//! Request signing for authenticated streams.
//!
//! The ingestion core treats signing as an opaque capability: a venue adapter
//! hands `(method, path, body, timestamp)` to a [`Signer`] and embeds the
//! returned signature in its login frame. Two schemes are provided:
//!
//! 1. [`PrehashSigner`]: Base64(HMAC-SHA256(`timestamp + method + path + body`)),
//!    used by OKX and Bitget.
//! 2. [`RealtimeSigner`]: hex(HMAC-SHA256(`method + path + timestamp`)), used
//!    by Bybit where `timestamp` is the auth expiry in milliseconds.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Produces a venue signature for a login or request payload.
pub trait Signer: Send + Sync {
    fn sign(&self, method: &str, path: &str, body: &str, timestamp: &str) -> String;
}

fn hmac_sha256(secret: &[u8], message: &[u8]) -> Vec<u8> {
    // HMAC-SHA256 accepts keys of any length, so `new_from_slice` cannot fail here.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return Vec::new();
    };
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Body values that mean "no body" in the venue docs.
fn effective_body(body: &str) -> &str {
    if body == "?" { "" } else { body }
}

/// Base64 HMAC-SHA256 over `timestamp + method + path + body`.
#[derive(Clone)]
pub struct PrehashSigner {
    secret: Vec<u8>,
}

impl PrehashSigner {
    pub fn new(secret: &str) -> Self {
        Self { secret: secret.as_bytes().to_vec() }
    }
}

impl Signer for PrehashSigner {
    fn sign(&self, method: &str, path: &str, body: &str, timestamp: &str) -> String {
        let payload = format!("{timestamp}{method}{path}{}", effective_body(body));
        let digest = hmac_sha256(&self.secret, payload.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(digest)
    }
}

/// Lowercase-hex HMAC-SHA256 over `method + path + timestamp`.
#[derive(Clone)]
pub struct RealtimeSigner {
    secret: Vec<u8>,
}

impl RealtimeSigner {
    pub fn new(secret: &str) -> Self {
        Self { secret: secret.as_bytes().to_vec() }
    }
}

impl Signer for RealtimeSigner {
    fn sign(&self, method: &str, path: &str, body: &str, timestamp: &str) -> String {
        let payload = format!("{method}{path}{timestamp}{}", effective_body(body));
        hex::encode(hmac_sha256(&self.secret, payload.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prehash_signature_is_base64_of_32_bytes() {
        let signer = PrehashSigner::new("secret");
        let sig = signer.sign("GET", "/users/self/verify", "", "1538054050");
        // 32 bytes -> 44 base64 chars with padding.
        assert_eq!(sig.len(), 44);
        assert!(sig.ends_with('='));
    }

    #[test]
    fn prehash_ignores_question_mark_body() {
        let signer = PrehashSigner::new("secret");
        assert_eq!(
            signer.sign("GET", "/user/verify", "?", "1"),
            signer.sign("GET", "/user/verify", "", "1"),
        );
    }

    #[test]
    fn realtime_signature_is_lowercase_hex() {
        let signer = RealtimeSigner::new("secret");
        let sig = signer.sign("GET", "/realtime", "", "1700000000000");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let a = RealtimeSigner::new("a").sign("GET", "/realtime", "", "1");
        let b = RealtimeSigner::new("b").sign("GET", "/realtime", "", "1");
        assert_ne!(a, b);
    }
}
