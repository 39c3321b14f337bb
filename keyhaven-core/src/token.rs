//! Opaque token generation and fingerprinting.
//!
//! Refresh credentials and share capability tokens are random opaque
//! strings. Only their SHA-256 fingerprint is ever persisted; the raw
//! token exists in the database at no point.

use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a URL-safe opaque token with 256 bits of entropy.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the hex SHA-256 fingerprint of a token.
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
