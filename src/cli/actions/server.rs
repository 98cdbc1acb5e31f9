use crate::api;
use anyhow::Result;
use secrecy::SecretString;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub signing_secret: SecretString,
    pub frontend_base_url: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub otp_ttl_minutes: i64,
    pub email_outbox_poll_seconds: u64,
    pub email_outbox_batch_size: usize,
    pub email_outbox_max_attempts: u32,
    pub email_outbox_backoff_base_seconds: u64,
    pub email_outbox_backoff_max_seconds: u64,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &self.dsn)
            .field("signing_secret", &"***")
            .field("frontend_base_url", &self.frontend_base_url)
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("reset_token_ttl_seconds", &self.reset_token_ttl_seconds)
            .field("otp_ttl_minutes", &self.otp_ttl_minutes)
            .finish_non_exhaustive()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(
        args.signing_secret,
        args.frontend_base_url,
    )
    .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
    .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
    .with_reset_token_ttl_seconds(args.reset_token_ttl_seconds)
    .with_otp_ttl_minutes(args.otp_ttl_minutes);

    let email_config = api::email::OutboxWorkerConfig::new()
        .with_poll_interval_seconds(args.email_outbox_poll_seconds)
        .with_batch_size(args.email_outbox_batch_size)
        .with_max_attempts(args.email_outbox_max_attempts)
        .with_backoff_base_seconds(args.email_outbox_backoff_base_seconds)
        .with_backoff_max_seconds(args.email_outbox_backoff_max_seconds);

    api::new(args.port, args.dsn, auth_config, email_config).await
}
