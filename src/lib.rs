//! # Konto (Account Lifecycle & Authentication Core)
//!
//! `konto` is the account-lifecycle and authentication core of a multi-tenant
//! API. It owns registration, email confirmation, password reset, credential
//! and federated login, token issuance/renewal, and activity tracking.
//!
//! ## Account states
//!
//! Accounts are created `Unconfirmed` (credential path) or pre-activated
//! (federated path) and transition to `Active` exactly once via a time-boxed,
//! single-use numeric code. A second orthogonal slot holds a pending
//! password-reset code; federated accounts never enter that sub-state.
//!
//! ## Side effects
//!
//! Lifecycle transitions enqueue email tasks on a durable FIFO queue and
//! return immediately; a separate long-running worker (`konto-worker`) pops
//! tasks, renders them, and ships them through the configured mailer,
//! reconnecting to the queue transport on failure.
//!
//! The HTTP layer, persistence engine internals, bot-risk scoring, and
//! federated token verification are external collaborators consumed through
//! the traits in [`account::store`], [`risk`], and [`federation`].

pub mod account;
pub mod cli;
pub mod federation;
pub mod mailer;
pub mod queue;
pub mod risk;
pub mod token;
pub mod worker;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
