//! Small helpers for input validation, OTP generation, and password hashing.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng as SaltRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{Rng, rngs::OsRng};
use regex::Regex;
use uuid::Uuid;

/// Alphabet for registration OTP codes.
const OTP_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of registration OTP codes.
pub(super) const OTP_LENGTH: usize = 6;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Password length policy applied at registration and reset.
pub(super) fn valid_password(password: &str) -> bool {
    (4..=40).contains(&password.len())
}

/// Generate a 6-character OTP from uppercase letters and digits.
///
/// Drawn from the OS random source; the raw code is stored on the user row
/// and emailed, then compared verbatim on verification.
pub(super) fn generate_otp() -> String {
    let mut rng = OsRng;
    (0..OTP_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..OTP_CHARSET.len());
            char::from(OTP_CHARSET[idx])
        })
        .collect()
}

/// Hash a password into an Argon2id PHC string for storage.
pub(super) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Verify a password against a stored PHC string.
pub(super) fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Burn roughly the same work as a real verification.
///
/// Called when login hits an unknown email so the response time does not
/// distinguish "no such user" from "wrong password".
pub(super) fn burn_password_hash(password: &str) {
    let _ = hash_password(password);
}

/// Encode a user id for transport in reset links (`uidb64`).
pub(super) fn encode_uid(user_id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string().as_bytes())
}

/// Decode a `uidb64` path segment back into a user id.
pub(super) fn decode_uid(uidb64: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.as_bytes()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    Uuid::parse_str(&text).ok()
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Extract a bearer token from the Authorization header.
pub(super) fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn valid_password_enforces_length_bounds() {
        assert!(!valid_password("abc"));
        assert!(valid_password("abcd"));
        assert!(valid_password(&"a".repeat(40)));
        assert!(!valid_password(&"a".repeat(41)));
    }

    #[test]
    fn generate_otp_shape() {
        let otp = generate_otp();
        assert_eq!(otp.len(), OTP_LENGTH);
        assert!(
            otp.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn generate_otp_varies() {
        // Collisions are possible but vanishingly unlikely across ten draws.
        let codes: std::collections::HashSet<String> = (0..10).map(|_| generate_otp()).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("pw1234").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("pw1234", &hash));
        assert!(!verify_password("pw12345", &hash));
    }

    #[test]
    fn verify_password_rejects_garbage_hash() {
        assert!(!verify_password("pw1234", "not-a-phc-string"));
    }

    #[test]
    fn uid_encoding_round_trips() {
        let id = Uuid::new_v4();
        let encoded = encode_uid(id);
        assert_eq!(decode_uid(&encoded), Some(id));
    }

    #[test]
    fn decode_uid_rejects_invalid_input() {
        assert_eq!(decode_uid("!!!"), None);
        let not_a_uuid = URL_SAFE_NO_PAD.encode(b"hello");
        assert_eq!(decode_uid(&not_a_uuid), None);
    }

    #[test]
    fn extract_bearer_token_variants() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(extract_bearer_token(&headers), None);

        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
