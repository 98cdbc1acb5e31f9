//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth::ARG_SIGNING_SECRET;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    crate::cli::commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let signing_secret = matches
        .get_one::<String>(ARG_SIGNING_SECRET)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --signing-secret")?;
    let frontend_base_url = matches
        .get_one::<String>("frontend-base-url")
        .cloned()
        .context("missing argument: --frontend-base-url")?;

    let arg_i64 = |name: &str| matches.get_one::<i64>(name).copied();
    let arg_u64 = |name: &str| matches.get_one::<u64>(name).copied();

    Ok(Action::Server(Args {
        port,
        dsn,
        signing_secret,
        frontend_base_url,
        access_token_ttl_seconds: arg_i64("access-token-ttl-seconds").unwrap_or(1800),
        refresh_token_ttl_seconds: arg_i64("refresh-token-ttl-seconds").unwrap_or(604_800),
        reset_token_ttl_seconds: arg_i64("reset-token-ttl-seconds").unwrap_or(3600),
        otp_ttl_minutes: arg_i64("otp-ttl-minutes").unwrap_or(15),
        email_outbox_poll_seconds: arg_u64("email-outbox-poll-seconds").unwrap_or(5),
        email_outbox_batch_size: matches
            .get_one::<usize>("email-outbox-batch-size")
            .copied()
            .unwrap_or(10),
        email_outbox_max_attempts: matches
            .get_one::<u32>("email-outbox-max-attempts")
            .copied()
            .unwrap_or(5),
        email_outbox_backoff_base_seconds: arg_u64("email-outbox-backoff-base-seconds")
            .unwrap_or(5),
        email_outbox_backoff_max_seconds: arg_u64("email-outbox-backoff-max-seconds")
            .unwrap_or(300),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_secret_required() {
        temp_env::with_vars(
            [
                ("PORTA_SIGNING_SECRET", None::<&str>),
                ("PORTA_DSN", Some("postgres://user@localhost:5432/porta")),
            ],
            || {
                let command = crate::cli::commands::new();
                let result = command.try_get_matches_from(vec!["porta"]);
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn handler_builds_server_args() {
        temp_env::with_vars(
            [
                (
                    "PORTA_SIGNING_SECRET",
                    Some("0123456789abcdef0123456789abcdef"),
                ),
                ("PORTA_DSN", Some("postgres://user@localhost:5432/porta")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["porta"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.port, 8080);
                    assert_eq!(args.otp_ttl_minutes, 15);
                    assert_eq!(args.reset_token_ttl_seconds, 3600);
                }
            },
        );
    }

    #[test]
    fn handler_rejects_short_signing_secret() {
        temp_env::with_vars(
            [
                ("PORTA_SIGNING_SECRET", Some("short")),
                ("PORTA_DSN", Some("postgres://user@localhost:5432/porta")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["porta"]);
                let result = handler(&matches);
                assert!(result.is_err());
            },
        );
    }
}
