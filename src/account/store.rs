//! Persistence boundary for accounts and their one-time code slots.
//!
//! The service talks to [`AccountStore`]; [`PgAccountStore`] is the Postgres
//! implementation. Each account owns at most one pending code row, so issuing
//! a new code is an upsert that overwrites the previous slot whatever its
//! purpose was. Multi-step transitions (create-plus-code, activate-plus-clear,
//! reset-plus-activate-plus-clear) are single atomic operations here, never
//! sequenced by the caller.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::model::{Account, AccountWithCode, NewAccount, NewFederatedAccount, PendingCode};

/// Outcome of attempting to create a credential account.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Uuid),
    DuplicateEmail,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Lookup by email, restricted to accounts with a live code slot.
    async fn find_by_email_with_code(&self, email: &str) -> Result<Option<AccountWithCode>>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// `false` for both inactive and missing accounts.
    async fn is_active(&self, id: Uuid) -> Result<bool>;

    /// Insert an unconfirmed account and its pending confirmation code in one
    /// transaction.
    async fn create(&self, account: NewAccount) -> Result<CreateOutcome>;

    /// Insert a pre-activated federated account. Returns `None` when the
    /// email is already taken.
    async fn create_federated(&self, account: NewFederatedAccount) -> Result<Option<Uuid>>;

    /// Overwrite the account's code slot. Returns `false` when the account
    /// does not exist.
    async fn update_code(
        &self,
        account_id: Uuid,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Mark the account active and clear its code slot in one transaction.
    async fn activate(&self, account_id: Uuid) -> Result<()>;

    /// Set a new password hash, activate the account, and clear its code slot
    /// in one transaction.
    async fn update_password(&self, account_id: Uuid, password_hash: &str) -> Result<()>;

    /// Shift `last_seen` into `previous_seen` and stamp `last_seen` with now.
    /// Returns `false` when the account does not exist.
    async fn update_last_seen(&self, account_id: Uuid) -> Result<bool>;

    /// Replace the avatar blob. Returns `false` when the account does not
    /// exist.
    async fn update_avatar(&self, account_id: Uuid, avatar: &[u8]) -> Result<bool>;

    /// Partial profile update; `None` fields keep their current value. The
    /// password arrives already hashed.
    async fn update_profile(
        &self,
        account_id: Uuid,
        name: Option<&str>,
        lastname: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<()>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str = r"
    accounts.id, accounts.name, accounts.lastname, accounts.email,
    accounts.password_hash, accounts.external_id, accounts.avatar,
    accounts.terms_accepted_at, accounts.policy_accepted_at, accounts.active,
    accounts.last_seen, accounts.previous_seen,
    accounts.created_at, accounts.updated_at
";

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        name: row.get("name"),
        lastname: row.get("lastname"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        external_id: row.get("external_id"),
        avatar: row.get("avatar"),
        terms_accepted_at: row.get("terms_accepted_at"),
        policy_accepted_at: row.get("policy_accepted_at"),
        active: row.get("active"),
        last_seen: row.get("last_seen"),
        previous_seen: row.get("previous_seen"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by email")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_by_email_with_code(&self, email: &str) -> Result<Option<AccountWithCode>> {
        let query = format!(
            r"
            SELECT {ACCOUNT_COLUMNS},
                   account_codes.code_hash, account_codes.expires_at
            FROM accounts
            JOIN account_codes ON account_codes.account_id = accounts.id
            WHERE accounts.email = $1
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account with code")?;

        Ok(row.map(|row| AccountWithCode {
            code: PendingCode {
                code_hash: row.get("code_hash"),
                expires_at: row.get("expires_at"),
            },
            account: account_from_row(&row),
        }))
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE external_id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by external id")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by id")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn is_active(&self, id: Uuid) -> Result<bool> {
        let query = "SELECT active FROM accounts WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to check account activity")?;

        Ok(row.is_some_and(|row| row.get("active")))
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        // Account row and confirmation code land together or not at all.
        let mut tx = self.pool.begin().await.context("begin create transaction")?;

        let query = r"
            INSERT INTO accounts
                (name, lastname, email, password_hash,
                 terms_accepted_at, policy_accepted_at, active)
            VALUES ($1, $2, $3, $4, NOW(), NOW(), FALSE)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&account.name)
            .bind(&account.lastname)
            .bind(&account.email)
            .bind(&account.password_hash)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await;

        let account_id: Uuid = match row {
            Ok(row) => row.get("id"),
            Err(err) => {
                if is_unique_violation(&err) {
                    let _ = tx.rollback().await;
                    return Ok(CreateOutcome::DuplicateEmail);
                }
                return Err(err).context("failed to insert account");
            }
        };

        let query = r"
            INSERT INTO account_codes (account_id, code_hash, expires_at)
            VALUES ($1, $2, $3)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .bind(&account.code_hash)
            .bind(account.code_expires_at)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert confirmation code")?;

        tx.commit().await.context("commit create transaction")?;

        Ok(CreateOutcome::Created(account_id))
    }

    async fn create_federated(&self, account: NewFederatedAccount) -> Result<Option<Uuid>> {
        let query = r"
            INSERT INTO accounts
                (name, lastname, email, external_id, avatar,
                 terms_accepted_at, policy_accepted_at, active)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW(), TRUE)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&account.name)
            .bind(&account.lastname)
            .bind(&account.email)
            .bind(&account.external_id)
            .bind(&account.avatar)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(Some(row.get("id"))),
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err).context("failed to insert federated account"),
        }
    }

    async fn update_code(
        &self,
        account_id: Uuid,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let query = r"
            INSERT INTO account_codes (account_id, code_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id)
            DO UPDATE SET code_hash = EXCLUDED.code_hash,
                          expires_at = EXCLUDED.expires_at,
                          created_at = NOW()
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(code_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(result) => Ok(result.rows_affected() == 1),
            // Foreign key violation means the account vanished under us.
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23503") => Ok(false),
            Err(err) => Err(err).context("failed to upsert account code"),
        }
    }

    async fn activate(&self, account_id: Uuid) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin activate transaction")?;

        let query = "UPDATE accounts SET active = TRUE, updated_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to activate account")?;

        let query = "DELETE FROM account_codes WHERE account_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to clear account code")?;

        tx.commit().await.context("commit activate transaction")?;
        Ok(())
    }

    async fn update_password(&self, account_id: Uuid, password_hash: &str) -> Result<()> {
        // A successful reset also proves mailbox ownership, so the account is
        // activated if it was still unconfirmed.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin password transaction")?;

        let query = r"
            UPDATE accounts
            SET password_hash = $2, active = TRUE, updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .bind(password_hash)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to update password")?;

        let query = "DELETE FROM account_codes WHERE account_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to clear account code")?;

        tx.commit().await.context("commit password transaction")?;
        Ok(())
    }

    async fn update_last_seen(&self, account_id: Uuid) -> Result<bool> {
        let query = r"
            UPDATE accounts
            SET previous_seen = last_seen,
                last_seen = NOW(),
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update last seen")?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_avatar(&self, account_id: Uuid, avatar: &[u8]) -> Result<bool> {
        let query = "UPDATE accounts SET avatar = $2, updated_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(avatar)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update avatar")?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_profile(
        &self,
        account_id: Uuid,
        name: Option<&str>,
        lastname: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<()> {
        let query = r"
            UPDATE accounts
            SET name = COALESCE($2, name),
                lastname = COALESCE($3, lastname),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .bind(name)
            .bind(lastname)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update profile")?;
        Ok(())
    }
}
