use clap::{Arg, Command};

pub const ARG_SIGNING_SECRET: &str = "signing-secret";

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_otp_args(command);
    with_outbox_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_SECRET)
                .long(ARG_SIGNING_SECRET)
                .help("Secret used to sign session and reset tokens")
                .env("PORTA_SIGNING_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for password-reset links")
                .env("PORTA_FRONTEND_BASE_URL")
                .default_value("https://porta.dev"),
        )
        .arg(
            Arg::new("access-token-ttl-seconds")
                .long("access-token-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("PORTA_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-token-ttl-seconds")
                .long("refresh-token-ttl-seconds")
                .help("Refresh token TTL in seconds")
                .env("PORTA_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("reset-token-ttl-seconds")
                .long("reset-token-ttl-seconds")
                .help("Password-reset link TTL in seconds")
                .env("PORTA_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_otp_args(command: Command) -> Command {
    command.arg(
        Arg::new("otp-ttl-minutes")
            .long("otp-ttl-minutes")
            .help("Validity window for registration OTP codes in minutes")
            .env("PORTA_OTP_TTL_MINUTES")
            .default_value("15")
            .value_parser(clap::value_parser!(i64)),
    )
}

fn with_outbox_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("email-outbox-poll-seconds")
                .long("email-outbox-poll-seconds")
                .help("Email outbox poll interval in seconds")
                .env("PORTA_EMAIL_OUTBOX_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-outbox-batch-size")
                .long("email-outbox-batch-size")
                .help("Email outbox batch size per poll")
                .env("PORTA_EMAIL_OUTBOX_BATCH_SIZE")
                .default_value("10")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("email-outbox-max-attempts")
                .long("email-outbox-max-attempts")
                .help("Max attempts before marking an email as failed")
                .env("PORTA_EMAIL_OUTBOX_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("email-outbox-backoff-base-seconds")
                .long("email-outbox-backoff-base-seconds")
                .help("Base delay for email outbox retry backoff")
                .env("PORTA_EMAIL_OUTBOX_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-outbox-backoff-max-seconds")
                .long("email-outbox-backoff-max-seconds")
                .help("Max delay for email outbox retry backoff")
                .env("PORTA_EMAIL_OUTBOX_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;

    #[test]
    fn defaults_apply_without_flags() {
        let command = with_args(Command::new("test"));
        let matches = command.get_matches_from(vec![
            "test",
            "--signing-secret",
            "0123456789abcdef0123456789abcdef",
        ]);
        assert_eq!(
            matches
                .get_one::<i64>("access-token-ttl-seconds")
                .copied(),
            Some(1800)
        );
        assert_eq!(
            matches
                .get_one::<i64>("refresh-token-ttl-seconds")
                .copied(),
            Some(604_800)
        );
        assert_eq!(matches.get_one::<i64>("otp-ttl-minutes").copied(), Some(15));
        assert_eq!(
            matches
                .get_one::<String>("frontend-base-url")
                .map(String::as_str),
            Some("https://porta.dev")
        );
    }
}
