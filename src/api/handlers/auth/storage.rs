//! Database helpers for users, token revocation, and the email outbox.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;
use crate::api::email::Template;

/// Full user row as the handlers need it.
pub(crate) struct UserRow {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) password_hash: String,
    pub(crate) is_verified: bool,
    pub(crate) otp: Option<String>,
    pub(crate) otp_created_at: Option<DateTime<Utc>>,
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created,
    /// Email already registered; no row was written.
    Conflict,
}

/// Outcome when applying a profile update.
#[derive(Debug)]
pub(crate) enum UpdateOutcome {
    Updated(UserRow),
    /// Requested email is already taken by another account.
    Conflict,
}

impl std::fmt::Debug for UserRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // OTP and password hash stay out of logs.
        f.debug_struct("UserRow")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("is_verified", &self.is_verified)
            .finish_non_exhaustive()
    }
}

const USER_COLUMNS: &str =
    "id, email, full_name, password_hash, is_verified, otp, otp_created_at";

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRow {
    UserRow {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        password_hash: row.get("password_hash"),
        is_verified: row.get("is_verified"),
        otp: row.get("otp"),
        otp_created_at: row.get("otp_created_at"),
    }
}

/// Insert a new unverified user together with its OTP and outbox row.
///
/// The user row, the OTP pair, and the pending notification commit in one
/// transaction, so a duplicate email leaves nothing behind.
pub(super) async fn create_user(
    pool: &PgPool,
    email: &str,
    full_name: &str,
    password_hash: &str,
    otp: &str,
) -> Result<SignupOutcome> {
    let mut tx = pool.begin().await.context("begin signup transaction")?;

    let query = r"
        INSERT INTO users
            (email, full_name, password_hash, otp, otp_created_at)
        VALUES ($1, $2, $3, $4, NOW())
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(full_name)
        .bind(password_hash)
        .bind(otp)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    if let Err(err) = &row {
        if is_unique_violation(err) {
            let _ = tx.rollback().await;
            return Ok(SignupOutcome::Conflict);
        }
    }
    let _user_id: Uuid = row.context("failed to insert user")?.get("id");

    let payload = serde_json::json!({
        "full_name": full_name,
        "otp": otp,
    });
    enqueue_email(&mut tx, email, Template::OtpVerification, &payload).await?;

    tx.commit().await.context("commit signup transaction")?;

    Ok(SignupOutcome::Created)
}

pub(crate) async fn lookup_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>> {
    let query = const_format_lookup("email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(user_from_row))
}

pub(crate) async fn lookup_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRow>> {
    let query = const_format_lookup("id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.as_ref().map(user_from_row))
}

fn const_format_lookup(predicate: &str) -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate} LIMIT 1")
}

/// Flip the account to verified.
///
/// The OTP pair is intentionally left in place; see the OTP handler notes.
pub(super) async fn mark_verified(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET is_verified = TRUE,
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
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark user verified")?;
    Ok(())
}

/// Overwrite the OTP pair and enqueue a fresh delivery, atomically.
pub(super) async fn reissue_otp(
    pool: &PgPool,
    user: &UserRow,
    otp: &str,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin otp reissue transaction")?;

    let query = r"
        UPDATE users
        SET otp = $2,
            otp_created_at = NOW(),
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
        .bind(user.id)
        .bind(otp)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to store reissued otp")?;

    let payload = serde_json::json!({
        "full_name": user.full_name,
        "otp": otp,
    });
    enqueue_email(&mut tx, &user.email, Template::OtpVerification, &payload).await?;

    tx.commit().await.context("commit otp reissue transaction")?;
    Ok(())
}

pub(super) async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
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
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

/// Apply a partial profile update; absent fields keep their current value.
pub(crate) async fn update_account(
    pool: &PgPool,
    id: Uuid,
    full_name: Option<&str>,
    email: Option<&str>,
) -> Result<UpdateOutcome> {
    let query = format!(
        r"
        UPDATE users
        SET full_name = COALESCE($2, full_name),
            email = COALESCE($3, email),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(UpdateOutcome::Updated(user_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::Conflict),
        Err(err) => Err(err).context("failed to update account"),
    }
}

/// Remove the user row. Terminal: the id is never reused and every
/// outstanding access token dies with the row (principal resolution
/// requires a live user).
pub(crate) async fn delete_user(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = "DELETE FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete user")?;
    Ok(())
}

/// Add a refresh token's `jti` to the revocation set.
///
/// `ON CONFLICT DO NOTHING` makes repeated logout calls a no-op success.
/// `expires_at` mirrors the token's own expiry so the set can be pruned.
pub(super) async fn revoke_refresh(
    pool: &PgPool,
    jti: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let query = r"
        INSERT INTO revoked_tokens (jti, expires_at)
        VALUES ($1, $2)
        ON CONFLICT (jti) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(jti)
        .bind(expires_at)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh token")?;
    Ok(())
}

pub(super) async fn is_refresh_revoked(pool: &PgPool, jti: Uuid) -> Result<bool> {
    let query = "SELECT 1 FROM revoked_tokens WHERE jti = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(jti)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check refresh revocation")?;
    Ok(row.is_some())
}

/// Enqueue a notification in the transactional outbox.
pub(super) async fn enqueue_email(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    to_email: &str,
    template: Template,
    payload: &serde_json::Value,
) -> Result<()> {
    let payload_text =
        serde_json::to_string(payload).context("failed to serialize email payload")?;
    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(to_email)
        .bind(template.as_str())
        .bind(payload_text)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_outcome_debug_names() {
        assert_eq!(format!("{:?}", SignupOutcome::Created), "Created");
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn user_row_debug_hides_secrets() {
        let row = UserRow {
            id: Uuid::nil(),
            email: "jo@x.com".to_string(),
            full_name: "Jo".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            is_verified: false,
            otp: Some("A1B2C3".to_string()),
            otp_created_at: None,
        };
        let rendered = format!("{row:?}");
        assert!(rendered.contains("jo@x.com"));
        assert!(!rendered.contains("argon2id"));
        assert!(!rendered.contains("A1B2C3"));
    }

    #[test]
    fn lookup_query_shape() {
        let query = const_format_lookup("email = $1");
        assert!(query.contains("otp_created_at"));
        assert!(query.ends_with("LIMIT 1"));
    }
}
