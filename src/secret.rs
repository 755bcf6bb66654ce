//! Goal access secrets for the permanent-QR flow.
//!
//! Secrets are machine-generated, shown to the owner exactly once, and only
//! their SHA-256 digest is stored. Comparison is constant-time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SECRET_BYTES: usize = 12;

/// URL-safe random secret, suitable for embedding in a QR unlock link.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 digest, the only form a secret is ever persisted in.
pub fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

pub fn verify_secret(candidate: &str, stored_digest: &str) -> bool {
    digest(candidate)
        .as_bytes()
        .ct_eq(stored_digest.as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_url_safe_and_distinct() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn digest_round_trip_verifies() {
        let secret = generate_secret();
        let stored = digest(&secret);
        assert!(verify_secret(&secret, &stored));
        assert!(!verify_secret("wrong", &stored));
    }

    #[test]
    fn digest_is_stable_hex() {
        // Known SHA-256 of "abc".
        assert_eq!(
            digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
