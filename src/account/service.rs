//! The account service: every lifecycle operation in one place.
//!
//! Operations validate the bot-risk proof first, then run an ordered sequence
//! of checks that short-circuits on the first violation. Rule order is
//! load-bearing: callers observe specific messages per violated rule, so the
//! sequence must not be rearranged. Collaborator errors never leak past this
//! boundary; they are re-raised as one of the three [`AccountError`] kinds.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::code;
use super::config::AccountConfig;
use super::error::AccountError;
use super::model::{NewAccount, NewFederatedAccount, ProfileChanges, ProfileView};
use super::password;
use super::store::{AccountStore, CreateOutcome};
use super::validate;
use crate::federation::{AvatarFetcher, ExternalProfile, FederationVerifier};
use crate::queue::{EmailQueue, EmailTask, EmailTaskKind};
use crate::risk::{RiskProof, RiskVerifier};
use crate::token::{CredentialIssuer, TokenPair};

/// Success payload of the code-issuing operations.
#[derive(Debug, Clone, Serialize)]
pub struct CodeWindow {
    #[serde(rename = "confirmationWindowHours")]
    pub confirmation_window_hours: i64,
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
    pub accepted_terms: bool,
    pub accepted_policy: bool,
}

/// Federated registration input. Email and external id come from the
/// verified profile, not the client.
#[derive(Debug, Clone)]
pub struct FederatedSignupRequest {
    pub external_token: String,
    pub name: String,
    pub lastname: String,
    pub accepted_terms: bool,
    pub accepted_policy: bool,
}

pub struct AccountService {
    store: Arc<dyn AccountStore>,
    risk: Arc<dyn RiskVerifier>,
    federation: Arc<dyn FederationVerifier>,
    avatars: Arc<dyn AvatarFetcher>,
    queue: Arc<dyn EmailQueue>,
    issuer: CredentialIssuer,
    config: AccountConfig,
}

type OpResult<T> = Result<T, AccountError>;

impl AccountService {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        risk: Arc<dyn RiskVerifier>,
        federation: Arc<dyn FederationVerifier>,
        avatars: Arc<dyn AvatarFetcher>,
        queue: Arc<dyn EmailQueue>,
        issuer: CredentialIssuer,
    ) -> Self {
        Self {
            store,
            risk,
            federation,
            avatars,
            queue,
            issuer,
            config: AccountConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: AccountConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a credential account. The account is created unconfirmed with
    /// a live confirmation code, and one confirmation email task is enqueued.
    pub async fn register(&self, proof: &RiskProof, request: RegisterRequest) -> OpResult<CodeWindow> {
        self.ensure_human(proof).await?;

        if !validate::valid_name(&request.name) {
            return Err(AccountError::bad_request("name must be at least 2 characters"));
        }
        if !validate::valid_name(&request.lastname) {
            return Err(AccountError::bad_request(
                "lastname must be at least 2 characters",
            ));
        }
        if !validate::valid_email(&request.email) {
            return Err(AccountError::bad_request("invalid email"));
        }
        if !validate::strong_password(&request.password) {
            return Err(AccountError::bad_request(
                "password must be at least 8 characters with an uppercase letter, a digit, and a symbol",
            ));
        }

        // Duplicate check comes before the terms/policy rules; callers rely
        // on seeing the conflict first.
        let existing = self
            .store
            .find_by_email(&request.email)
            .await
            .map_err(|err| AccountError::internal("could not create account", err))?;
        if existing.is_some() {
            return Err(AccountError::bad_request("email already registered"));
        }

        if !request.accepted_terms {
            return Err(AccountError::bad_request("terms must be accepted"));
        }
        if !request.accepted_policy {
            return Err(AccountError::bad_request("privacy policy must be accepted"));
        }

        let password_hash = password::hash(&request.password)
            .map_err(|err| AccountError::internal("could not create account", err))?;
        let plaintext = code::generate(self.config.code_digits())
            .map_err(|err| AccountError::internal("could not create account", err))?;
        let code_hash = password::hash(&plaintext)
            .map_err(|err| AccountError::internal("could not create account", err))?;

        let outcome = self
            .store
            .create(NewAccount {
                name: request.name.clone(),
                lastname: request.lastname.clone(),
                email: request.email.clone(),
                password_hash,
                code_hash,
                code_expires_at: code::expiry(self.config.code_ttl_hours()),
            })
            .await
            .map_err(|err| AccountError::internal("could not create account", err))?;

        let account_id = match outcome {
            CreateOutcome::Created(id) => id,
            CreateOutcome::DuplicateEmail => {
                return Err(AccountError::bad_request("email already registered"));
            }
        };

        info!(%account_id, "account registered");
        self.enqueue_code_email(
            EmailTaskKind::AccountConfirmation,
            &request.email,
            &request.name,
            &plaintext,
        )
        .await?;

        Ok(self.code_window())
    }

    /// Re-issue a confirmation code for an account that already has a live
    /// code slot.
    pub async fn resend_confirmation(&self, proof: &RiskProof, email: &str) -> OpResult<CodeWindow> {
        self.ensure_human(proof).await?;

        let found = self
            .store
            .find_by_email_with_code(email)
            .await
            .map_err(|err| AccountError::internal("could not issue code", err))?;
        let Some(found) = found else {
            return Err(AccountError::bad_request("no pending code for this account"));
        };
        if found.account.is_federated() {
            return Err(AccountError::bad_request(
                "cannot reset password on a federated account",
            ));
        }

        let plaintext = self.persist_new_code(found.account.id).await?;
        self.enqueue_code_email(
            EmailTaskKind::AccountConfirmation,
            email,
            &found.account.name,
            &plaintext,
        )
        .await?;

        Ok(self.code_window())
    }

    /// Check whether a reset code is still usable without consuming it.
    pub async fn check_reset_code_validity(
        &self,
        proof: &RiskProof,
        email: &str,
        supplied_code: &str,
    ) -> OpResult<()> {
        self.ensure_human(proof).await?;
        self.match_live_code(email, supplied_code)
            .await?
            .ok_or_else(|| AccountError::unauthorized("invalid or expired code"))?;
        Ok(())
    }

    /// Activate the account named by a valid confirmation code. Consumes the
    /// code slot.
    pub async fn confirm_email(
        &self,
        proof: &RiskProof,
        email: &str,
        supplied_code: &str,
    ) -> OpResult<()> {
        self.ensure_human(proof).await?;

        // Format failures and lookup failures map to different kinds here;
        // the check-only path above reports everything as unauthorized.
        if !validate::valid_email(email) {
            return Err(AccountError::unauthorized("invalid email"));
        }
        if !validate::valid_code(supplied_code, self.config.code_digits()) {
            return Err(AccountError::unauthorized("invalid code format"));
        }

        let account_id = self
            .match_live_code(email, supplied_code)
            .await?
            .ok_or_else(|| AccountError::bad_request("invalid or expired code"))?;

        self.store
            .activate(account_id)
            .await
            .map_err(|err| AccountError::internal("could not activate account", err))?;
        info!(%account_id, "account confirmed");
        Ok(())
    }

    /// Issue a password-reset code. The account does not need a pending code.
    pub async fn forgot_password(&self, proof: &RiskProof, email: &str) -> OpResult<CodeWindow> {
        self.ensure_human(proof).await?;

        let account = self
            .store
            .find_by_email(email)
            .await
            .map_err(|err| AccountError::internal("could not issue code", err))?;
        let Some(account) = account else {
            return Err(AccountError::bad_request("account not found"));
        };
        if account.is_federated() {
            return Err(AccountError::bad_request(
                "cannot reset password on a federated account",
            ));
        }

        let plaintext = self.persist_new_code(account.id).await?;
        self.enqueue_code_email(EmailTaskKind::PasswordReset, email, &account.name, &plaintext)
            .await?;

        Ok(self.code_window())
    }

    /// Replace the password named by a valid reset code. Also activates the
    /// account and consumes the code slot.
    pub async fn reset_password(
        &self,
        proof: &RiskProof,
        email: &str,
        supplied_code: &str,
        new_password: &str,
    ) -> OpResult<()> {
        self.ensure_human(proof).await?;

        if !validate::valid_email(email) {
            return Err(AccountError::bad_request("invalid email"));
        }
        if !validate::strong_password(new_password) {
            return Err(AccountError::bad_request(
                "password must be at least 8 characters with an uppercase letter, a digit, and a symbol",
            ));
        }

        let account_id = self
            .match_live_code(email, supplied_code)
            .await?
            .ok_or_else(|| AccountError::bad_request("invalid or expired code"))?;

        let password_hash = password::hash(new_password)
            .map_err(|err| AccountError::internal("could not update password", err))?;
        self.store
            .update_password(account_id, &password_hash)
            .await
            .map_err(|err| AccountError::internal("could not update password", err))?;
        info!(%account_id, "password reset");
        Ok(())
    }

    /// Credential login. Lookup and password failures are deliberately
    /// indistinguishable.
    pub async fn login(
        &self,
        proof: &RiskProof,
        email: &str,
        supplied_password: &str,
    ) -> OpResult<TokenPair> {
        self.ensure_human(proof).await?;

        let account = self
            .store
            .find_by_email(email)
            .await
            .map_err(|err| AccountError::internal("could not authenticate", err))?;
        let Some(account) = account else {
            return Err(AccountError::unauthorized("invalid credentials"));
        };

        // Activity is checked before the password so an unconfirmed caller
        // learns what to do next regardless of what they typed.
        if !account.active {
            return Err(AccountError::unauthorized("must confirm email first"));
        }

        let matches = account
            .password_hash
            .as_deref()
            .is_some_and(|hash| password::verify(supplied_password, hash));
        if !matches {
            return Err(AccountError::unauthorized("invalid credentials"));
        }

        self.touch(account.id).await?;
        self.issue(account.id)
    }

    /// Redeem a refresh token for a new access/refresh pair. Old refresh
    /// tokens are not tracked and stay valid until their own expiry.
    pub async fn refresh_token(&self, proof: &RiskProof, refresh_token: &str) -> OpResult<TokenPair> {
        self.ensure_human(proof).await?;

        if refresh_token.is_empty() {
            return Err(AccountError::unauthorized("refresh token invalid or expired"));
        }
        let account_id = self
            .issuer
            .verify_refresh(refresh_token)
            .map_err(|_| AccountError::unauthorized("refresh token invalid or expired"))?;

        let active = self
            .store
            .is_active(account_id)
            .await
            .map_err(|err| AccountError::internal("could not authenticate", err))?;
        if !active {
            return Err(AccountError::unauthorized("account not authorized"));
        }

        self.issue(account_id)
    }

    /// Liveness ping: updates the last-seen pair.
    pub async fn heartbeat(&self, proof: &RiskProof, account_id: Uuid) -> OpResult<()> {
        self.ensure_human(proof).await?;

        let updated = self
            .store
            .update_last_seen(account_id)
            .await
            .map_err(|err| AccountError::internal("could not update activity", err))?;
        if !updated {
            return Err(AccountError::bad_request("account not found"));
        }
        Ok(())
    }

    /// Create a pre-activated account from a verified federated identity.
    /// Avatar retrieval is best-effort here; a fetch failure never aborts
    /// the signup.
    pub async fn federated_signup(
        &self,
        proof: &RiskProof,
        request: FederatedSignupRequest,
    ) -> OpResult<TokenPair> {
        self.ensure_human(proof).await?;

        let profile = self.verify_external(&request.external_token).await?;

        if !validate::valid_name(&request.name) {
            return Err(AccountError::bad_request("name must be at least 2 characters"));
        }
        if !validate::valid_name(&request.lastname) {
            return Err(AccountError::bad_request(
                "lastname must be at least 2 characters",
            ));
        }

        let existing = self
            .store
            .find_by_email(&profile.email)
            .await
            .map_err(|err| AccountError::internal("could not create account", err))?;
        if existing.is_some() {
            return Err(AccountError::bad_request("email already registered"));
        }

        if !request.accepted_terms {
            return Err(AccountError::bad_request("terms must be accepted"));
        }
        if !request.accepted_policy {
            return Err(AccountError::bad_request("privacy policy must be accepted"));
        }

        let avatar = match &profile.photo_url {
            Some(url) => match self.avatars.fetch(url).await {
                Ok(avatar) => avatar,
                Err(err) => {
                    warn!("avatar fetch failed during signup: {err:#}");
                    None
                }
            },
            None => None,
        };

        let created = self
            .store
            .create_federated(NewFederatedAccount {
                name: request.name,
                lastname: request.lastname,
                email: profile.email,
                external_id: profile.external_id,
                avatar,
            })
            .await
            .map_err(|err| AccountError::internal("could not create account", err))?;
        let Some(account_id) = created else {
            return Err(AccountError::bad_request("email already registered"));
        };

        info!(%account_id, "federated account registered");
        self.issue(account_id)
    }

    /// Federated login. Unlike signup, an avatar fetch failure here is fatal.
    pub async fn federated_login(
        &self,
        proof: &RiskProof,
        external_token: &str,
    ) -> OpResult<TokenPair> {
        self.ensure_human(proof).await?;

        let profile = self.verify_external(external_token).await?;

        let account = self
            .store
            .find_by_external_id(&profile.external_id)
            .await
            .map_err(|err| AccountError::internal("could not authenticate", err))?;
        let Some(account) = account else {
            return Err(AccountError::unauthorized(
                "account does not exist, sign up first",
            ));
        };
        if !account.active {
            return Err(AccountError::unauthorized("account not authorized"));
        }

        if let Some(url) = &profile.photo_url {
            let avatar = self
                .avatars
                .fetch(url)
                .await
                .map_err(|err| AccountError::internal("could not refresh avatar", err))?;
            if let Some(avatar) = avatar {
                self.store
                    .update_avatar(account.id, &avatar)
                    .await
                    .map_err(|err| AccountError::internal("could not refresh avatar", err))?;
            }
        }

        self.touch(account.id).await?;
        self.issue(account.id)
    }

    /// Profile of an authenticated account.
    pub async fn get_profile(&self, account_id: Uuid) -> OpResult<ProfileView> {
        let account = self
            .store
            .find_by_id(account_id)
            .await
            .map_err(|err| AccountError::internal("could not load profile", err))?;
        account
            .as_ref()
            .map(ProfileView::from)
            .ok_or_else(|| AccountError::bad_request("account not found"))
    }

    /// Apply partial profile changes and return the updated view. A supplied
    /// password replaces the login credential; federated accounts have none
    /// to replace and reject the attempt.
    pub async fn update_profile(
        &self,
        account_id: Uuid,
        changes: ProfileChanges,
    ) -> OpResult<ProfileView> {
        if let Some(name) = &changes.name {
            if !validate::valid_name(name) {
                return Err(AccountError::bad_request("name must be at least 2 characters"));
            }
        }
        if let Some(lastname) = &changes.lastname {
            if !validate::valid_name(lastname) {
                return Err(AccountError::bad_request(
                    "lastname must be at least 2 characters",
                ));
            }
        }

        let password_hash = match &changes.password {
            Some(password) => {
                let account = self
                    .store
                    .find_by_id(account_id)
                    .await
                    .map_err(|err| AccountError::internal("could not update profile", err))?
                    .ok_or_else(|| AccountError::bad_request("account not found"))?;
                if account.is_federated() {
                    return Err(AccountError::bad_request(
                        "cannot change password on a federated account",
                    ));
                }
                if !validate::strong_password(password) {
                    return Err(AccountError::bad_request(
                        "password must be at least 8 characters with an uppercase letter, a digit, and a symbol",
                    ));
                }
                Some(
                    password::hash(password)
                        .map_err(|err| AccountError::internal("could not update profile", err))?,
                )
            }
            None => None,
        };

        if !changes.is_empty() {
            self.store
                .update_profile(
                    account_id,
                    changes.name.as_deref(),
                    changes.lastname.as_deref(),
                    password_hash.as_deref(),
                )
                .await
                .map_err(|err| AccountError::internal("could not update profile", err))?;
        }
        self.get_profile(account_id).await
    }

    async fn ensure_human(&self, proof: &RiskProof) -> OpResult<()> {
        // A verifier transport failure is not distinguishable from a bot
        // verdict for callers.
        let human = self.risk.verify(proof).await.unwrap_or_else(|err| {
            warn!("risk verification errored: {err:#}");
            false
        });
        if human {
            Ok(())
        } else {
            Err(AccountError::unauthorized("risk check failed"))
        }
    }

    async fn verify_external(&self, external_token: &str) -> OpResult<ExternalProfile> {
        if external_token.is_empty() {
            return Err(AccountError::unauthorized("invalid identity token"));
        }
        let profile = self.federation.verify(external_token).await.unwrap_or_else(|err| {
            warn!("federation verification errored: {err:#}");
            None
        });
        profile.ok_or_else(|| AccountError::unauthorized("invalid identity token"))
    }

    /// Match a supplied code against the account's live slot. `Ok(None)`
    /// covers missing slot, hash mismatch, and expiry alike.
    async fn match_live_code(&self, email: &str, supplied_code: &str) -> OpResult<Option<Uuid>> {
        let found = self
            .store
            .find_by_email_with_code(email)
            .await
            .map_err(|err| AccountError::internal("could not verify code", err))?;
        let Some(found) = found else {
            return Ok(None);
        };
        if !password::verify(supplied_code, &found.code.code_hash) {
            return Ok(None);
        }
        if code::expired(found.code.expires_at) {
            return Ok(None);
        }
        Ok(Some(found.account.id))
    }

    async fn persist_new_code(&self, account_id: Uuid) -> OpResult<String> {
        let plaintext = code::generate(self.config.code_digits())
            .map_err(|err| AccountError::internal("could not issue code", err))?;
        let code_hash = password::hash(&plaintext)
            .map_err(|err| AccountError::internal("could not issue code", err))?;
        let updated = self
            .store
            .update_code(account_id, &code_hash, code::expiry(self.config.code_ttl_hours()))
            .await
            .map_err(|err| AccountError::internal("could not issue code", err))?;
        if !updated {
            return Err(AccountError::internal_plain("could not issue code"));
        }
        Ok(plaintext)
    }

    async fn enqueue_code_email(
        &self,
        kind: EmailTaskKind,
        email: &str,
        name: &str,
        plaintext: &str,
    ) -> OpResult<()> {
        let task = EmailTask {
            kind,
            email: email.to_string(),
            name: name.to_string(),
            code: plaintext.to_string(),
            duration_label: code::window_label(self.config.code_ttl_hours()),
        };
        self.queue
            .enqueue(&task)
            .await
            .map_err(|err| AccountError::internal("could not enqueue email", err))
    }

    async fn touch(&self, account_id: Uuid) -> OpResult<()> {
        self.store
            .update_last_seen(account_id)
            .await
            .map_err(|err| AccountError::internal("could not update activity", err))?;
        Ok(())
    }

    fn issue(&self, account_id: Uuid) -> OpResult<TokenPair> {
        self.issuer
            .issue_pair(account_id)
            .map_err(|err| AccountError::internal("could not issue credentials", err))
    }

    fn code_window(&self) -> CodeWindow {
        CodeWindow {
            confirmation_window_hours: self.config.code_ttl_hours(),
        }
    }
}
