//! Federated identity verification and avatar retrieval.
//!
//! A federated client hands over an identity token minted by the external
//! provider; the verifier exchanges it for a verified profile. Avatar blobs
//! are fetched separately from the profile's photo URL and are always
//! optional.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// The verified identity behind a federated token.
#[derive(Debug, Clone)]
pub struct ExternalProfile {
    pub external_id: String,
    pub email: String,
    pub photo_url: Option<String>,
}

#[async_trait]
pub trait FederationVerifier: Send + Sync {
    /// Exchange an external identity token for a verified profile. `None`
    /// means the token did not verify; transport failures are errors.
    async fn verify(&self, external_token: &str) -> Result<Option<ExternalProfile>>;
}

#[async_trait]
pub trait AvatarFetcher: Send + Sync {
    /// Retrieve an avatar image. `None` when the URL does not yield an image;
    /// transport failures are errors.
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

#[derive(Debug, Deserialize)]
struct TokeninfoResponse {
    sub: String,
    email: String,
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Verifies Google ID tokens through the tokeninfo endpoint.
pub struct GoogleFederationVerifier {
    http: reqwest::Client,
    client_id: String,
}

impl GoogleFederationVerifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(client_id: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build federation client")?;
        Ok(Self { http, client_id })
    }
}

#[async_trait]
impl FederationVerifier for GoogleFederationVerifier {
    async fn verify(&self, external_token: &str) -> Result<Option<ExternalProfile>> {
        if external_token.is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", external_token)])
            .send()
            .await
            .context("federation verification request failed")?;

        // The endpoint answers 4xx for any invalid or expired token.
        if !response.status().is_success() {
            debug!(status = %response.status(), "federated token rejected");
            return Ok(None);
        }

        let info: TokeninfoResponse = response
            .json()
            .await
            .context("federation verification response was not valid JSON")?;

        // The token must have been minted for this application.
        if info.aud.as_deref() != Some(self.client_id.as_str()) {
            debug!("federated token audience mismatch");
            return Ok(None);
        }

        Ok(Some(ExternalProfile {
            external_id: info.sub,
            email: info.email,
            photo_url: info.picture,
        }))
    }
}

/// Downloads avatar images over HTTP.
pub struct HttpAvatarFetcher {
    http: reqwest::Client,
}

impl HttpAvatarFetcher {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build avatar client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl AvatarFetcher for HttpAvatarFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("avatar request failed")?;

        if response.status() != reqwest::StatusCode::OK {
            debug!(status = %response.status(), "avatar not available");
            return Ok(None);
        }

        let is_image = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("image/"));
        if !is_image {
            debug!("avatar response was not an image");
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .context("failed to read avatar body")?;
        Ok(Some(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_token_does_not_verify() -> Result<()> {
        let verifier = GoogleFederationVerifier::new("client-id".to_string())?;
        assert!(verifier.verify("").await?.is_none());
        Ok(())
    }

    #[test]
    fn tokeninfo_response_tolerates_missing_picture() {
        let info: TokeninfoResponse = serde_json::from_str(
            r#"{"sub": "123", "email": "a@example.com", "aud": "client-id"}"#,
        )
        .unwrap();
        assert_eq!(info.sub, "123");
        assert!(info.picture.is_none());
    }
}
