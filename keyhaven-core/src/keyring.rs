//! Key hierarchy: the server master key wraps per-user keys.
//!
//! Wrapped blob layout is fixed at `nonce(12) || auth_tag(16) || ciphertext(32)`
//! so that master-key rotation is a pure unwrap-rewrap pass over all
//! accounts with no schema change.

use crate::cipher::UserKey;
use crate::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use zeroize::ZeroizeOnDrop;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Total length of a wrapped user key blob.
pub const WRAPPED_KEY_LEN: usize = NONCE_LEN + TAG_LEN + KEY_LEN;

/// The server-held master key.
///
/// Provided by the deployment environment at startup, held in memory for
/// the lifetime of the process, never persisted and never logged.
#[derive(ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; 32],
}

impl MasterKey {
    /// Create a master key from raw bytes
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Decode a master key from standard base64.
    ///
    /// Rejects anything that does not decode to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid base64: {}", e)))?;

        let key: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                got: v.len(),
            }
        })?;

        Ok(Self { key })
    }

    /// Get a reference to the key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// Wrap a per-user key under the master key.
///
/// Each call uses a fresh random nonce, so wrapping the same key twice
/// produces different blobs.
pub fn wrap_user_key(user_key: &UserKey, master_key: &MasterKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(master_key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, user_key.as_bytes().as_ref())
        .map_err(|e| CryptoError::EncryptionFailed(format!("Failed to wrap key: {}", e)))?;

    if ciphertext.len() != KEY_LEN + TAG_LEN {
        return Err(CryptoError::EncryptionFailed(
            "Wrapped key has unexpected length".to_string(),
        ));
    }

    // nonce || auth_tag || ciphertext
    let tag_start = ciphertext.len() - TAG_LEN;
    let mut blob = Vec::with_capacity(WRAPPED_KEY_LEN);
    blob.extend_from_slice(nonce.as_slice());
    blob.extend_from_slice(&ciphertext[tag_start..]);
    blob.extend_from_slice(&ciphertext[..tag_start]);

    Ok(blob)
}

/// Unwrap a per-user key blob with the master key.
///
/// Rejects blobs of the wrong length, tampered blobs, and blobs wrapped
/// under a different master key.
pub fn unwrap_user_key(blob: &[u8], master_key: &MasterKey) -> Result<UserKey> {
    if blob.len() != WRAPPED_KEY_LEN {
        return Err(CryptoError::MalformedBlob);
    }

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&blob[..NONCE_LEN]);
    let auth_tag = &blob[NONCE_LEN..NONCE_LEN + TAG_LEN];
    let ciphertext = &blob[NONCE_LEN + TAG_LEN..];

    let cipher = Aes256Gcm::new(master_key.as_bytes().into());
    let nonce = Nonce::from(nonce_bytes);

    let mut ciphertext_with_tag = ciphertext.to_vec();
    ciphertext_with_tag.extend_from_slice(auth_tag);

    let key_bytes = cipher
        .decrypt(&nonce, ciphertext_with_tag.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let key: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| CryptoError::MalformedBlob)?;

    Ok(UserKey::from_bytes(key))
}
