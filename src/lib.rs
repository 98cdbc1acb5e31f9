//! # Porta (Account Management & Authentication)
//!
//! `porta` is an account-management backend. It handles registration with
//! email OTP verification, credential login with access/refresh token
//! issuance, password reset over signed links, and authenticated
//! self-service (profile update, dashboard, account deletion).
//!
//! ## Verification (OTP)
//!
//! New accounts start unverified. Registration stores a 6-character OTP on
//! the user record and enqueues it for email delivery; submitting the code
//! within a fixed 15-minute window activates the account. Login is blocked
//! until the account is verified.
//!
//! ## Tokens
//!
//! - **Session tokens** are signed JWT pairs (access + refresh). Refresh
//!   tokens are individually revocable: logout stores the token `jti` in a
//!   revocation set checked on every refresh exchange.
//! - **Reset tokens** are never stored. They are derived from current user
//!   state (id, password hash, verification flag) plus an issue timestamp,
//!   so changing the password invalidates every outstanding reset link.
//!
//! ## Enumeration Resistance
//!
//! Login and OTP verification return the same opaque error for unknown
//! accounts and bad credentials. Password-reset requests always acknowledge
//! with the same generic message.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
