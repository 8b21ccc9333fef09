//! Domain errors surfaced by the account service.
//!
//! Every operation either returns a small success payload or exactly one of
//! these three kinds. Collaborator failures are caught at the service
//! boundary and re-raised here with a domain message; the underlying cause is
//! attached for logging but never shown to clients.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccountError {
    /// Client-correctable input or business-rule violation.
    #[error("{0}")]
    BadRequest(String),

    /// Authentication, authorization, or risk-check failure. Messages are
    /// deliberately vague to avoid account enumeration.
    #[error("{0}")]
    Unauthorized(String),

    /// Persistence or infrastructure failure; the message is generic and the
    /// cause travels as the error source.
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl AccountError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn internal_plain(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn display_shows_only_the_domain_message() {
        let err = AccountError::internal("could not create account", anyhow!("pg: deadlock"));
        assert_eq!(err.to_string(), "could not create account");
    }

    #[test]
    fn source_is_preserved_for_logging() {
        let err = AccountError::internal("could not create account", anyhow!("pg: deadlock"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("pg: deadlock"));
    }

    #[test]
    fn plain_internal_has_no_source() {
        let err = AccountError::internal_plain("could not issue tokens");
        assert!(std::error::Error::source(&err).is_none());
    }
}
