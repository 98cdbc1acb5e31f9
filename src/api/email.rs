//! Email outbox worker and delivery abstractions.
//!
//! Registration, OTP re-issue, and password-reset flows enqueue rows in
//! `email_outbox` with status `pending`. A background task periodically polls
//! that table, locks a batch via `FOR UPDATE SKIP LOCKED`, renders the row's
//! template into a subject and body, and hands the result to an
//! [`EmailSender`]. The worker then updates the outbox row to `sent` or
//! schedules a retry.
//!
//! This is a lightweight transactional outbox (DB-backed queue): the enqueue
//! happens inside the same transaction that mutates the user record, so a
//! user row and its pending notification stay consistent, while delivery
//! failures retry with exponential backoff and never fail the originating
//! request. The default sender for local dev is [`LogEmailSender`], which
//! logs and returns `Ok(())`.

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

/// A rendered, ready-to-deliver message.
#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the outbox worker.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to schedule a retry.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "email outbox send stub"
        );
        Ok(())
    }
}

/// Outbox templates understood by the worker.
///
/// Rows carry a template name plus a JSON payload; rendering happens at send
/// time so the queue stores structured data rather than prose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Template {
    /// Registration OTP delivery: payload `{full_name, otp}`.
    OtpVerification,
    /// Password-reset link: payload `{reset_url}`.
    PasswordReset,
    /// Reset requested for an unknown address: payload `{register_url}`.
    RegistrationInvite,
}

impl Template {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::OtpVerification => "otp_verification",
            Self::PasswordReset => "password_reset",
            Self::RegistrationInvite => "registration_invite",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "otp_verification" => Some(Self::OtpVerification),
            "password_reset" => Some(Self::PasswordReset),
            "registration_invite" => Some(Self::RegistrationInvite),
            _ => None,
        }
    }
}

/// Render an outbox row into a deliverable message.
///
/// Unknown templates or missing payload fields are hard errors so the row
/// ends up `failed` instead of silently sending an empty email.
fn render(to_email: &str, template: &str, payload_json: &str) -> Result<EmailMessage> {
    let template = Template::parse(template)
        .ok_or_else(|| anyhow!("unknown email template: {template}"))?;
    let payload: serde_json::Value =
        serde_json::from_str(payload_json).context("invalid outbox payload JSON")?;
    let field = |name: &str| -> Result<&str> {
        payload
            .get(name)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow!("outbox payload missing field: {name}"))
    };

    let (subject, body) = match template {
        Template::OtpVerification => (
            "Your registration verification code".to_string(),
            format!(
                "Hello {},\n\nYour verification code is {}. \
                 It expires in 15 minutes.\n",
                field("full_name")?,
                field("otp")?
            ),
        ),
        Template::PasswordReset => (
            "Link to reset your password".to_string(),
            format!(
                "Hello,\n\nPlease use the link below to reset your password:\n{}\n",
                field("reset_url")?
            ),
        ),
        Template::RegistrationInvite => (
            "Registration invitation".to_string(),
            format!(
                "Hello,\n\nIt seems you are not a registered user. \
                 You can register using the link below:\n{}\n",
                field("register_url")?
            ),
        ),
    };

    Ok(EmailMessage {
        to_email: to_email.to_string(),
        subject,
        body,
    })
}

#[derive(Clone, Copy, Debug)]
pub struct OutboxWorkerConfig {
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl OutboxWorkerConfig {
    /// Default worker config: 5s poll interval, 10 messages per batch,
    /// 5 max attempts, and 5s->5m exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    /// Clamp degenerate values so a misconfigured worker still makes progress.
    #[must_use]
    pub fn normalize(self) -> Self {
        let poll_interval = if self.poll_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.poll_interval
        };
        let batch_size = self.batch_size.max(1);
        let max_attempts = self.max_attempts.max(1);
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_secs(1)
        } else {
            self.backoff_base
        };
        let backoff_max = self.backoff_max.max(backoff_base);
        Self {
            poll_interval,
            batch_size,
            max_attempts,
            backoff_base,
            backoff_max,
        }
    }
}

impl Default for OutboxWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that polls and processes the email outbox.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    config: OutboxWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();

        loop {
            if let Err(err) = process_outbox_batch(&pool, sender.as_ref(), &config).await {
                error!("email outbox batch failed: {err}");
            }

            sleep(config.poll_interval).await;
        }
    })
}

async fn process_outbox_batch(
    pool: &PgPool,
    sender: &dyn EmailSender,
    config: &OutboxWorkerConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start email outbox transaction")?;

    // Grab a locked batch so multiple workers can run without double-sending.
    let query = r"
        SELECT id, to_email, template, payload_json::text AS payload_json, attempts
        FROM email_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size).unwrap_or(1))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load email outbox batch")?;

    if rows.is_empty() {
        // Commit even on empty to release locks and keep poll loop consistent.
        tx.commit()
            .await
            .context("failed to commit empty outbox batch")?;
        return Ok(0);
    }

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let attempts = u32::try_from(attempts).unwrap_or(0);
        let to_email: String = row.get("to_email");
        let template: String = row.get("template");
        let payload_json: String = row.get("payload_json");

        let send_result =
            render(&to_email, &template, &payload_json).and_then(|message| sender.send(&message));
        update_outbox_status(&mut tx, id, attempts, send_result, config).await?;
    }

    tx.commit()
        .await
        .context("failed to commit email outbox batch")?;

    Ok(row_count)
}

async fn update_outbox_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: u32,
    send_result: Result<()>,
    config: &OutboxWorkerConfig,
) -> Result<()> {
    // Retry failures with exponential backoff and jitter until max_attempts.
    let next_attempt = attempts.saturating_add(1);
    let next_attempts_i32 = i32::try_from(next_attempt).unwrap_or(i32::MAX);
    match send_result {
        Ok(()) => {
            let query = r"
                UPDATE email_outbox
                SET status = 'sent',
                    attempts = $2,
                    last_error = NULL,
                    sent_at = NOW(),
                    next_attempt_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempts_i32)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to update outbox status to sent")?;
        }
        Err(err) => {
            if next_attempt >= config.max_attempts {
                let query = r"
                    UPDATE email_outbox
                    SET status = 'failed',
                        attempts = $2,
                        last_error = $3,
                        next_attempt_at = NOW()
                    WHERE id = $1
                ";
                let span = info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(next_attempts_i32)
                    .bind(err.to_string())
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to update outbox status to failed")?;
            } else {
                let delay = backoff_delay(next_attempt, config.backoff_base, config.backoff_max);
                let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
                let query = r"
                    UPDATE email_outbox
                    SET status = 'pending',
                        attempts = $2,
                        last_error = $3,
                        next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
                    WHERE id = $1
                ";
                let span = info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(next_attempts_i32)
                    .bind(err.to_string())
                    .bind(delay_ms)
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to update outbox retry schedule")?;
            }
        }
    }

    Ok(())
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}
