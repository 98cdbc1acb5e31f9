//! Auth configuration and shared state.

use secrecy::{ExposeSecret, SecretString};

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_OTP_TTL_MINUTES: i64 = 15;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_secret: SecretString,
    frontend_base_url: String,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
    otp_ttl_minutes: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(signing_secret: SecretString, frontend_base_url: String) -> Self {
        Self {
            signing_secret,
            frontend_base_url,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            otp_ttl_minutes: DEFAULT_OTP_TTL_MINUTES,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_minutes(mut self, minutes: i64) -> Self {
        self.otp_ttl_minutes = minutes;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn signing_secret(&self) -> &[u8] {
        self.signing_secret.expose_secret().as_bytes()
    }

    pub(super) fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    pub(super) fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    pub(super) fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    pub(super) fn otp_ttl_minutes(&self) -> i64 {
        self.otp_ttl_minutes
    }
}

pub struct AuthState {
    config: AuthConfig,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            "https://porta.dev".to_string(),
        )
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = config();

        assert_eq!(config.frontend_base_url(), "https://porta.dev");
        assert_eq!(
            config.access_token_ttl_seconds(),
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.refresh_token_ttl_seconds(),
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.reset_token_ttl_seconds(),
            DEFAULT_RESET_TOKEN_TTL_SECONDS
        );
        assert_eq!(config.otp_ttl_minutes(), DEFAULT_OTP_TTL_MINUTES);

        let config = config
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(120)
            .with_reset_token_ttl_seconds(30)
            .with_otp_ttl_minutes(5);

        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.refresh_token_ttl_seconds(), 120);
        assert_eq!(config.reset_token_ttl_seconds(), 30);
        assert_eq!(config.otp_ttl_minutes(), 5);
    }

    #[test]
    fn secret_never_appears_in_debug() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
