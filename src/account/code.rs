//! One-time numeric codes for email confirmation and password reset.
//!
//! Codes are fixed-length, zero-padded decimal strings drawn from the OS
//! entropy source. Callers hash the plaintext before persisting it and only
//! ship the plaintext inside the outbound email task.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};

/// Generate a random code of exactly `digits` decimal characters.
///
/// # Errors
/// Returns an error if no secure entropy source is available or if `digits`
/// does not fit a decimal bound.
pub fn generate(digits: u32) -> Result<String> {
    let bound = 10u64
        .checked_pow(digits)
        .context("code length too large for a decimal bound")?;

    let mut bytes = [0u8; 8];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("no secure random source available")?;

    let value = u64::from_le_bytes(bytes) % bound;
    Ok(format!("{value:0width$}", width = digits as usize))
}

/// Absolute expiry timestamp `hours` from now.
#[must_use]
pub fn expiry(hours_from_now: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours_from_now)
}

/// Human-readable validity window shipped inside email tasks.
#[must_use]
pub fn window_label(hours: i64) -> String {
    if hours == 1 {
        "1 hour".to_string()
    } else {
        format!("{hours} hours")
    }
}

/// A code is live until the instant after its expiry (strictly `now > expiry`
/// invalidates; `now == expiry` is still valid).
#[must_use]
pub fn expired(expires_at: DateTime<Utc>) -> bool {
    Utc::now() > expires_at
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_pads_to_exact_length() -> Result<()> {
        for _ in 0..32 {
            let code = generate(6)?;
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        Ok(())
    }

    #[test]
    fn generate_supports_other_lengths() -> Result<()> {
        let code = generate(4)?;
        assert_eq!(code.len(), 4);
        let code = generate(8)?;
        assert_eq!(code.len(), 8);
        Ok(())
    }

    #[test]
    fn generate_rejects_oversized_length() {
        assert!(generate(20).is_err());
    }

    #[test]
    fn expiry_is_in_the_future() {
        let expires_at = expiry(2);
        assert!(expires_at > Utc::now());
        assert!(expires_at <= Utc::now() + Duration::hours(2));
    }

    #[test]
    fn expired_is_strict() {
        assert!(!expired(Utc::now() + Duration::minutes(1)));
        assert!(expired(Utc::now() - Duration::seconds(1)));
    }

    #[test]
    fn window_label_pluralizes() {
        assert_eq!(window_label(1), "1 hour");
        assert_eq!(window_label(2), "2 hours");
    }
}
