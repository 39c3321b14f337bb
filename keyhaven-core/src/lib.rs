//! Cryptographic core for the KeyHaven credential vault.
//!
//! This crate provides:
//! - AES-256-GCM field encryption/decryption
//! - Master-key wrapping of per-user keys
//! - Opaque token generation and fingerprinting
//! - Argon2id credential hashing
//! - Deterministic secret strength scoring

pub mod cipher;
pub mod keyring;
pub mod password;
pub mod strength;
pub mod token;

pub use cipher::{decrypt_field, encrypt_field, EncryptedField, UserKey};
pub use keyring::{unwrap_user_key, wrap_user_key, MasterKey, WRAPPED_KEY_LEN};
pub use password::{hash_password, verify_password};
pub use strength::strength_score;
pub use token::{fingerprint, generate_token};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Malformed wrapped key blob")]
    MalformedBlob,

    #[error("Authentication failed - data may have been tampered with")]
    AuthenticationFailed,

    #[error("Credential hashing failed: {0}")]
    HashFailed(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
