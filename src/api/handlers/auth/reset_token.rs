//! Stateless password-reset tokens.
//!
//! A reset token is never persisted. It is an HMAC over the user's id,
//! current password hash, and verification flag, plus the issue timestamp
//! (base36, like the link format users already know from other account
//! systems). Verification recomputes the MAC against current user state, so
//! changing the password (or verifying the account) invalidates every
//! previously issued token for that user.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Clock skew tolerated for tokens stamped slightly in the future.
const MAX_FUTURE_SKEW_SECONDS: i64 = 60;

/// Distinct causes for a rejected reset link.
///
/// Outward responses collapse these to one generic message; the variants
/// exist so logs can tell a tampered link from a stale one.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ResetLinkError {
    /// `uidb64` did not decode to a user id.
    BadUid,
    /// Decoded id has no matching user row.
    UnknownUser,
    /// Token shape or MAC did not match current user state.
    BadSignature,
    /// MAC matched but the issue timestamp is outside the validity window.
    Expired,
}

impl std::fmt::Display for ResetLinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadUid => write!(f, "undecodable uid"),
            Self::UnknownUser => write!(f, "unknown user"),
            Self::BadSignature => write!(f, "bad signature"),
            Self::Expired => write!(f, "expired token"),
        }
    }
}

/// Issue a reset token bound to the user's current credential state.
pub(super) fn make_token(
    secret: &[u8],
    user_id: Uuid,
    password_hash: &str,
    is_verified: bool,
    now: DateTime<Utc>,
) -> String {
    let ts = now.timestamp();
    let mac = compute_mac(secret, user_id, password_hash, is_verified, ts);
    format!("{}-{}", encode_base36(ts), URL_SAFE_NO_PAD.encode(mac))
}

/// Check a reset token against current user state and the validity window.
pub(super) fn check_token(
    secret: &[u8],
    user_id: Uuid,
    password_hash: &str,
    is_verified: bool,
    token: &str,
    now: DateTime<Utc>,
    ttl_seconds: i64,
) -> Result<(), ResetLinkError> {
    let (ts_part, mac_part) = token.split_once('-').ok_or(ResetLinkError::BadSignature)?;
    let ts = decode_base36(ts_part).ok_or(ResetLinkError::BadSignature)?;

    let presented = URL_SAFE_NO_PAD
        .decode(mac_part.as_bytes())
        .map_err(|_| ResetLinkError::BadSignature)?;

    // MAC first: an expired-but-valid token and a forged one must not be
    // distinguishable until the signature check has passed.
    let mut mac = mac_instance(secret, user_id, password_hash, is_verified, ts);
    mac.verify_slice(&presented)
        .map_err(|_| ResetLinkError::BadSignature)?;

    let age = now.timestamp() - ts;
    if age > ttl_seconds || age < -MAX_FUTURE_SKEW_SECONDS {
        return Err(ResetLinkError::Expired);
    }

    Ok(())
}

fn mac_instance(
    secret: &[u8],
    user_id: Uuid,
    password_hash: &str,
    is_verified: bool,
    ts: i64,
) -> HmacSha256 {
    // HMAC keys accept any length; new_from_slice only fails for zero-size
    // output which Sha256 never has.
    let mut mac =
        HmacSha256::new_from_slice(secret).unwrap_or_else(|_| unreachable!("hmac accepts any key"));
    mac.update(user_id.as_bytes());
    mac.update(b"\x00");
    mac.update(password_hash.as_bytes());
    mac.update(b"\x00");
    mac.update(&[u8::from(is_verified)]);
    mac.update(&ts.to_be_bytes());
    mac
}

fn compute_mac(
    secret: &[u8],
    user_id: Uuid,
    password_hash: &str,
    is_verified: bool,
    ts: i64,
) -> Vec<u8> {
    mac_instance(secret, user_id, password_hash, is_verified, ts)
        .finalize()
        .into_bytes()
        .to_vec()
}

fn encode_base36(value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut value = value.unsigned_abs();
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn decode_base36(text: &str) -> Option<i64> {
    if text.is_empty() || text.len() > 13 {
        return None;
    }
    let mut value: i64 = 0;
    for c in text.chars() {
        let digit = c.to_digit(36)?;
        value = value.checked_mul(36)?.checked_add(i64::from(digit))?;
    }
    Some(value)
}
