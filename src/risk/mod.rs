//! Bot-risk gate in front of every account operation.
//!
//! Clients submit a challenge token with each request; the verifier scores it
//! through an external service. Scoring failures are indistinguishable from a
//! bot verdict as far as callers are concerned. Development deployments
//! bypass the gate entirely so local clients need no real challenge.

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Deployment environment for the risk gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Dev,
    #[default]
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }
}

/// Challenge material submitted by the client alongside a request.
///
/// Both fields must be present for any verdict other than bot. The siteverify
/// endpoint derives the site key from the server-side secret, so the key is
/// required here for contract completeness but never forwarded.
#[derive(Debug, Clone)]
pub struct RiskProof {
    pub token: String,
    pub site_key: String,
}

#[async_trait]
pub trait RiskVerifier: Send + Sync {
    /// `true` means the caller looks human enough to proceed.
    async fn verify(&self, proof: &RiskProof) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(default)]
    score: Option<f64>,
}

/// reCAPTCHA v3 verifier.
pub struct RecaptchaVerifier {
    http: reqwest::Client,
    secret: SecretString,
    threshold: f64,
    environment: Environment,
}

impl RecaptchaVerifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(secret: SecretString) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build risk verification client")?;
        Ok(Self {
            http,
            secret,
            threshold: DEFAULT_SCORE_THRESHOLD,
            environment: Environment::Production,
        })
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

#[async_trait]
impl RiskVerifier for RecaptchaVerifier {
    async fn verify(&self, proof: &RiskProof) -> Result<bool> {
        // Missing challenge material is a bot verdict, not an error.
        if proof.token.is_empty() || proof.site_key.is_empty() {
            return Ok(false);
        }

        if self.environment.is_dev() {
            return Ok(true);
        }

        let params = [
            ("secret", self.secret.expose_secret()),
            ("response", proof.token.as_str()),
        ];
        let response = self
            .http
            .post(SITEVERIFY_URL)
            .form(&params)
            .send()
            .await
            .context("risk verification request failed")?;

        let verdict: SiteverifyResponse = response
            .json()
            .await
            .context("risk verification response was not valid JSON")?;

        let score = verdict.score.unwrap_or(0.0);
        debug!(success = verdict.success, score, "risk verdict");
        Ok(verdict.success && score >= self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_challenge_material_is_a_bot_verdict() -> Result<()> {
        let verifier = RecaptchaVerifier::new(SecretString::from("secret"))?;
        let proof = RiskProof {
            token: String::new(),
            site_key: "site".to_string(),
        };
        assert!(!verifier.verify(&proof).await?);

        let proof = RiskProof {
            token: "tok".to_string(),
            site_key: String::new(),
        };
        assert!(!verifier.verify(&proof).await?);
        Ok(())
    }

    #[tokio::test]
    async fn dev_environment_bypasses_scoring() -> Result<()> {
        let verifier = RecaptchaVerifier::new(SecretString::from("secret"))?
            .with_environment(Environment::Dev);
        let proof = RiskProof {
            token: "tok".to_string(),
            site_key: "site".to_string(),
        };
        assert!(verifier.verify(&proof).await?);
        Ok(())
    }

    #[tokio::test]
    async fn dev_bypass_still_requires_challenge_material() -> Result<()> {
        let verifier = RecaptchaVerifier::new(SecretString::from("secret"))?
            .with_environment(Environment::Dev);
        let proof = RiskProof {
            token: String::new(),
            site_key: String::new(),
        };
        assert!(!verifier.verify(&proof).await?);
        Ok(())
    }

    #[test]
    fn siteverify_response_tolerates_missing_score() {
        let verdict: SiteverifyResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(verdict.success);
        assert!(verdict.score.is_none());
    }
}
