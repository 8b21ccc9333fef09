//! Argon2id hashing for passwords and one-time codes.
//!
//! Both secrets follow the same rule: only the salted hash is persisted, and
//! comparisons go through the verifier so they are timing-safe.

use anyhow::{Result, anyhow};
use argon2::password_hash::{Error as ArgonError, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use tracing::warn;

/// Hash a secret with a fresh random salt (PHC string format).
///
/// # Errors
/// Returns an error if salt generation or hashing fails.
pub fn hash(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hashed = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash secret: {err}"))?;
    Ok(hashed.to_string())
}

/// Verify a secret against a stored PHC hash.
///
/// A malformed stored hash is treated as a mismatch and logged; callers map
/// mismatches to their own error kind.
#[must_use]
pub fn verify(secret: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("stored hash is not a valid PHC string: {err}");
            return false;
        }
    };

    match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(ArgonError::Password) => false,
        Err(err) => {
            warn!("secret verification failed: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() -> Result<()> {
        let hashed = hash("Senha@123!")?;
        assert!(hashed.starts_with("$argon2id$"));
        assert!(verify("Senha@123!", &hashed));
        assert!(!verify("Senha@123?", &hashed));
        Ok(())
    }

    #[test]
    fn hash_salts_are_unique() -> Result<()> {
        let first = hash("123456")?;
        let second = hash("123456")?;
        assert_ne!(first, second);
        assert!(verify("123456", &first));
        assert!(verify("123456", &second));
        Ok(())
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify("anything", "not-a-phc-string"));
    }
}
