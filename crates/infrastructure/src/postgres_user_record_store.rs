use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_application::UserRecordStore;
use marquee_core::{AppError, AppResult};
use marquee_domain::{Capability, CapabilitySet, Role, UserRecord, UserRecordDocument};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};
use tracing::debug;

/// PostgreSQL-backed user record store.
///
/// Each record is one row whose `permissions` and `overrides` columns hold the
/// JSON document maps. Every write touches a single row, so per-document
/// atomicity comes from the row lock.
#[derive(Clone)]
pub struct PostgresUserRecordStore {
    pool: PgPool,
}

impl PostgresUserRecordStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRecordRow {
    role: String,
    permissions: Value,
    email: Option<String>,
    overrides: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRecordRow {
    fn into_record(self, subject: &str) -> AppResult<UserRecord> {
        let document = UserRecordDocument {
            role: self.role,
            permissions: json_object(self.permissions, subject, "permissions")?,
            email: self.email,
            overrides: json_object(self.overrides, subject, "overrides")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };

        UserRecord::try_from(document).map_err(|error| {
            AppError::Internal(format!(
                "persisted user record for '{subject}' is invalid: {error}"
            ))
        })
    }
}

fn json_object(value: Value, subject: &str, column: &str) -> AppResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Internal(format!(
            "persisted {column} for '{subject}' is not an object: {other}"
        ))),
    }
}

fn ensure_row_touched(rows_affected: u64, subject: &str) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("no user record for '{subject}'")));
    }

    Ok(())
}

#[async_trait]
impl UserRecordStore for PostgresUserRecordStore {
    async fn get(&self, subject: &str) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecordRow>(
            r#"
            SELECT role, permissions, email, overrides, created_at, updated_at
            FROM user_records
            WHERE subject = $1
            "#,
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user record: {error}")))?;

        row.map(|row| row.into_record(subject)).transpose()
    }

    async fn create(&self, subject: &str, record: &UserRecord) -> AppResult<()> {
        let document = UserRecordDocument::from(record);
        let result = sqlx::query(
            r#"
            INSERT INTO user_records (
                subject,
                role,
                permissions,
                email,
                overrides,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (subject) DO NOTHING
            "#,
        )
        .bind(subject)
        .bind(document.role)
        .bind(Value::Object(document.permissions))
        .bind(document.email)
        .bind(Value::Object(document.overrides))
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create user record: {error}")))?;

        if result.rows_affected() == 0 {
            debug!(subject, "user record create lost to an existing row");
            return Err(AppError::AlreadyExists(format!(
                "user record for '{subject}' already exists"
            )));
        }

        Ok(())
    }

    async fn update_capabilities(
        &self,
        subject: &str,
        capabilities: &CapabilitySet,
        version: u32,
    ) -> AppResult<()> {
        let permissions = UserRecordDocument::encode_permissions(capabilities, version);
        let result = sqlx::query(
            r#"
            UPDATE user_records
            SET permissions = $2, updated_at = now()
            WHERE subject = $1
            "#,
        )
        .bind(subject)
        .bind(Value::Object(permissions))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update user capabilities: {error}"))
        })?;

        ensure_row_touched(result.rows_affected(), subject)
    }

    async fn update_role(
        &self,
        subject: &str,
        role: Role,
        capabilities: &CapabilitySet,
        version: u32,
    ) -> AppResult<()> {
        let permissions = UserRecordDocument::encode_permissions(capabilities, version);
        let result = sqlx::query(
            r#"
            UPDATE user_records
            SET role = $2,
                permissions = $3,
                overrides = '{}'::jsonb,
                updated_at = now()
            WHERE subject = $1
            "#,
        )
        .bind(subject)
        .bind(role.as_str())
        .bind(Value::Object(permissions))
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update user role: {error}")))?;

        ensure_row_touched(result.rows_affected(), subject)
    }

    async fn update_one_capability(
        &self,
        subject: &str,
        capability: Capability,
        value: bool,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_records
            SET permissions = jsonb_set(permissions, ARRAY[$2::text], to_jsonb($3::boolean)),
                overrides = jsonb_set(overrides, ARRAY[$2::text], to_jsonb($3::boolean)),
                updated_at = now()
            WHERE subject = $1
            "#,
        )
        .bind(subject)
        .bind(capability.as_str())
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update user capability: {error}"))
        })?;

        ensure_row_touched(result.rows_affected(), subject)
    }
}
