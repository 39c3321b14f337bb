//! Argon2id credential hashing for account passwords.
//!
//! The time cost is deployment-configurable; memory cost and parallelism
//! use the argon2 crate defaults (64 MiB, 1 lane). Parameters are embedded
//! in the PHC string, so verification works across cost changes.

use crate::{CryptoError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Hash a password with Argon2id at the given time cost.
///
/// Returns a PHC-format string suitable for storage.
pub fn hash_password(password: &str, time_cost: u32) -> Result<String> {
    let params = Params::new(
        Params::DEFAULT_M_COST,
        time_cost.max(1),
        Params::DEFAULT_P_COST,
        None,
    )
    .map_err(|e| CryptoError::HashFailed(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CryptoError::HashFailed(format!("Hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash in constant time.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Passw0rd!", 2).unwrap();
        assert!(verify_password("Passw0rd!", &hash));
        assert!(!verify_password("passw0rd!", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same password", 2).unwrap();
        let b = hash_password("same password", 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not a phc string"));
    }

    #[test]
    fn test_hash_is_phc_format() {
        let hash = hash_password("Passw0rd!", 2).unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }
}
