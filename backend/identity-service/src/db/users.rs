/// User database operations for identity-service
use crate::error::Result;
use crate::models::{Credential, Identity};
use async_trait::async_trait;
use sqlx::PgPool;

/// Result of a write that can collide with the phone number constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T> {
    Applied(T),
    PhoneNumberTaken,
}

/// Persistence contract for accounts
///
/// Uniqueness of `phone_number` is enforced by the store and reported as
/// [`WriteOutcome::PhoneNumberTaken`]; every other failure is an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account and return its id
    async fn create_user(
        &self,
        phone_number: &str,
        full_name: &str,
        password_hash: &str,
    ) -> Result<WriteOutcome<i64>>;

    async fn find_credential_by_phone(&self, phone_number: &str) -> Result<Option<Credential>>;

    async fn find_identity_by_id(&self, id: i64) -> Result<Option<Identity>>;

    /// Overwrite phone number and full name of an existing account
    async fn update_identity(
        &self,
        id: i64,
        phone_number: &str,
        full_name: &str,
    ) -> Result<WriteOutcome<()>>;

    async fn increment_login_count(&self, id: i64) -> Result<()>;
}

/// PostgreSQL-backed [`UserStore`]
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_phone_number_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(
        &self,
        phone_number: &str,
        full_name: &str,
        password_hash: &str,
    ) -> Result<WriteOutcome<i64>> {
        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (phone_number, full_name, password)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(phone_number)
        .bind(full_name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(id) => Ok(WriteOutcome::Applied(id)),
            Err(e) if is_phone_number_conflict(&e) => Ok(WriteOutcome::PhoneNumberTaken),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_credential_by_phone(&self, phone_number: &str) -> Result<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT id, phone_number, password FROM users WHERE phone_number = $1",
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn find_identity_by_id(&self, id: i64) -> Result<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(
            "SELECT id, phone_number, full_name FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn update_identity(
        &self,
        id: i64,
        phone_number: &str,
        full_name: &str,
    ) -> Result<WriteOutcome<()>> {
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET phone_number = $2, full_name = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(phone_number)
        .bind(full_name)
        .execute(&self.pool)
        .await;

        match updated {
            Ok(_) => Ok(WriteOutcome::Applied(())),
            Err(e) if is_phone_number_conflict(&e) => Ok(WriteOutcome::PhoneNumberTaken),
            Err(e) => Err(e.into()),
        }
    }

    async fn increment_login_count(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET total_login = total_login + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
