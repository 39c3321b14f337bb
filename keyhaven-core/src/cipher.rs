//! AES-256-GCM encryption and decryption for vault secrets.
//!
//! Uses AES-256-GCM with:
//! - 256-bit key
//! - 96-bit (12 byte) nonce
//! - 128-bit authentication tag
//! - Each field encrypted with a unique nonce

use crate::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use zeroize::Zeroize;

/// A per-user encryption key used to encrypt that account's secrets.
///
/// The key is wrapped (encrypted) with the server master key and stored
/// on the account row. It is only unwrapped for the duration of a request.
#[derive(Clone)]
pub struct UserKey {
    key: [u8; 32],
}

impl UserKey {
    /// Generate a new random per-user key
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self { key: key.into() }
    }

    /// Create a key from raw bytes (use with caution)
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Get the raw key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl Drop for UserKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// An encrypted field with its nonce and authentication tag.
///
/// The three components are stored together and must always be rewritten
/// together; mixing components from different encryptions fails the
/// authentication check.
#[derive(Debug, Clone)]
pub struct EncryptedField {
    pub ciphertext: Vec<u8>,
    /// Unique nonce for this field (12 bytes)
    pub nonce: [u8; 12],
    /// Authentication tag (16 bytes)
    pub auth_tag: [u8; 16],
}

/// Encrypt a field using AES-256-GCM.
///
/// Each call generates a fresh random nonce. Empty plaintext is valid and
/// round-trips to the empty string.
pub fn encrypt_field(key: &UserKey, plaintext: &str) -> Result<EncryptedField> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let nonce_bytes: [u8; 12] = nonce.into();

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

    // AES-GCM appends the auth tag to the ciphertext
    if ciphertext.len() < 16 {
        return Err(CryptoError::EncryptionFailed(
            "Ciphertext too short - missing auth tag".to_string(),
        ));
    }

    let tag_start = ciphertext.len() - 16;
    let auth_tag: [u8; 16] = ciphertext[tag_start..]
        .try_into()
        .map_err(|_| CryptoError::EncryptionFailed("Invalid auth tag length".to_string()))?;

    Ok(EncryptedField {
        ciphertext: ciphertext[..tag_start].to_vec(),
        nonce: nonce_bytes,
        auth_tag,
    })
}

/// Decrypt a field using AES-256-GCM.
///
/// Returns an error if the authentication tag does not verify, which
/// detects tampering with any of the three stored components.
pub fn decrypt_field(key: &UserKey, field: &EncryptedField) -> Result<String> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from(field.nonce);

    let mut ciphertext_with_tag = field.ciphertext.clone();
    ciphertext_with_tag.extend_from_slice(&field.auth_tag);

    let plaintext = cipher
        .decrypt(&nonce, ciphertext_with_tag.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::DecryptionFailed("Invalid UTF-8".to_string()))
}
