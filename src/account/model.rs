//! Account records and the payloads exchanged with the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A persisted account row.
///
/// Credential accounts carry a `password_hash` and no `external_id`;
/// federated accounts are the inverse. Both may hold an avatar blob.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub avatar: Option<Vec<u8>>,
    pub terms_accepted_at: DateTime<Utc>,
    pub policy_accepted_at: DateTime<Utc>,
    pub active: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub previous_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Federated accounts have no local password and cannot enter the
    /// password-reset sub-state.
    #[must_use]
    pub fn is_federated(&self) -> bool {
        self.external_id.is_some()
    }
}

/// An account joined with its pending one-time code slot.
#[derive(Debug, Clone)]
pub struct AccountWithCode {
    pub account: Account,
    pub code: PendingCode,
}

/// The single pending code slot of an account. Issuing a new code overwrites
/// whatever was there, regardless of purpose.
#[derive(Debug, Clone)]
pub struct PendingCode {
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Payload for creating a credential account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
    pub code_hash: String,
    pub code_expires_at: DateTime<Utc>,
}

/// Payload for creating a pre-activated federated account.
#[derive(Debug, Clone)]
pub struct NewFederatedAccount {
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub external_id: String,
    pub avatar: Option<Vec<u8>>,
}

/// Profile fields exposed to an authenticated caller. The avatar blob itself
/// is served elsewhere; only its presence is reported here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub federated: bool,
    pub has_avatar: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<&Account> for ProfileView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            lastname: account.lastname.clone(),
            email: account.email.clone(),
            federated: account.is_federated(),
            has_avatar: account.avatar.is_some(),
            last_seen: account.last_seen,
        }
    }
}

/// Mutable profile fields. `None` leaves the current value untouched. The
/// password carries the plaintext; the service hashes it before it reaches
/// the store, and federated accounts reject it outright.
#[derive(Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub password: Option<String>,
}

impl ProfileChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.lastname.is_none() && self.password.is_none()
    }
}

impl std::fmt::Debug for ProfileChanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileChanges")
            .field("name", &self.name)
            .field("lastname", &self.lastname)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
