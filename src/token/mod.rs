//! Signed credential issuance.
//!
//! Successful authentication yields a short-lived access token and a
//! long-lived refresh token. Both are HS256 JWTs carrying the account id
//! inside a structured `sub` claim, each family signed with its own secret so
//! one can never stand in for the other.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_ACCESS_TTL_SECS: i64 = 3_600;
const DEFAULT_REFRESH_TTL_SECS: i64 = 2_592_000;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("token invalid or expired")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// The `sub` claim: object-shaped so more identity fields can ride along
/// later without breaking verifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iat: i64,
    pub exp: i64,
    pub sub: Subject,
}

/// An access/refresh pair as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies the two token families.
#[derive(Clone)]
pub struct CredentialIssuer {
    access_secret: SecretString,
    refresh_secret: SecretString,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl CredentialIssuer {
    #[must_use]
    pub fn new(access_secret: SecretString, refresh_secret: SecretString) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_secs(mut self, secs: i64) -> Self {
        self.access_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_secs(mut self, secs: i64) -> Self {
        self.refresh_ttl_secs = secs;
        self
    }

    /// Issue a fresh access/refresh pair for `account_id`.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if either token cannot be signed.
    pub fn issue_pair(&self, account_id: Uuid) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();
        Ok(TokenPair {
            access_token: self.sign(account_id, now, self.access_ttl_secs, &self.access_secret)?,
            refresh_token: self.sign(
                account_id,
                now,
                self.refresh_ttl_secs,
                &self.refresh_secret,
            )?,
        })
    }

    /// Verify an access token and return the account id it was issued for.
    ///
    /// # Errors
    /// Returns [`TokenError::Invalid`] on bad signature, wrong family, or
    /// expiry.
    pub fn verify_access(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify(token, &self.access_secret)
    }

    /// Verify a refresh token and return the account id it was issued for.
    ///
    /// # Errors
    /// Returns [`TokenError::Invalid`] on bad signature, wrong family, or
    /// expiry.
    pub fn verify_refresh(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify(token, &self.refresh_secret)
    }

    fn sign(
        &self,
        account_id: Uuid,
        issued_at: i64,
        ttl_secs: i64,
        secret: &SecretString,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            iat: issued_at,
            exp: issued_at + ttl_secs,
            sub: Subject { id: account_id },
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
        )
        .map_err(TokenError::Signing)
    }

    fn verify(&self, token: &str, secret: &SecretString) -> Result<Uuid, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            &validation,
        )
        .map_err(TokenError::Invalid)?;
        Ok(data.claims.sub.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new(
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        )
    }

    #[test]
    fn issued_pair_round_trips() -> Result<(), TokenError> {
        let issuer = issuer();
        let id = Uuid::new_v4();
        let pair = issuer.issue_pair(id)?;
        assert_eq!(issuer.verify_access(&pair.access_token)?, id);
        assert_eq!(issuer.verify_refresh(&pair.refresh_token)?, id);
        Ok(())
    }

    #[test]
    fn families_are_not_interchangeable() -> Result<(), TokenError> {
        let issuer = issuer();
        let pair = issuer.issue_pair(Uuid::new_v4())?;
        assert!(issuer.verify_access(&pair.refresh_token).is_err());
        assert!(issuer.verify_refresh(&pair.access_token).is_err());
        Ok(())
    }

    #[test]
    fn wrong_secret_fails_verification() -> Result<(), TokenError> {
        let pair = issuer().issue_pair(Uuid::new_v4())?;
        let other = CredentialIssuer::new(
            SecretString::from("not-the-access-secret"),
            SecretString::from("not-the-refresh-secret"),
        );
        assert!(other.verify_access(&pair.access_token).is_err());
        assert!(other.verify_refresh(&pair.refresh_token).is_err());
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<(), TokenError> {
        let issuer = issuer().with_access_ttl_secs(-120);
        let pair = issuer.issue_pair(Uuid::new_v4())?;
        assert!(matches!(
            issuer.verify_access(&pair.access_token),
            Err(TokenError::Invalid(_))
        ));
        Ok(())
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(issuer().verify_access("not-a-jwt").is_err());
    }

    #[test]
    fn pair_serializes_camel_case() -> Result<(), TokenError> {
        let pair = issuer().issue_pair(Uuid::new_v4())?;
        let json = serde_json::to_value(&pair).map_err(|_| {
            TokenError::Invalid(jsonwebtoken::errors::ErrorKind::InvalidToken.into())
        })?;
        assert!(json.get("accessToken").is_some());
        assert!(json.get("refreshToken").is_some());
        Ok(())
    }
}
