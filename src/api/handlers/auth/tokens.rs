//! Session token pair: signed access/refresh JWTs.
//!
//! Both tokens carry the user id, a unique `jti`, and their own expiry.
//! Access tokens authenticate API calls; refresh tokens are only good for
//! minting new access tokens and can be individually revoked by `jti`
//! (see `storage::revoke_refresh`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SessionClaims {
    /// User id the token was issued to.
    pub(crate) sub: Uuid,
    /// Unique token id; refresh revocation is keyed on this.
    pub(crate) jti: Uuid,
    pub(crate) kind: TokenKind,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

/// Why a presented token was rejected.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TokenError {
    Malformed,
    Expired,
    /// Valid signature but wrong token kind (e.g. refresh used as access).
    WrongKind,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed token"),
            Self::Expired => write!(f, "expired token"),
            Self::WrongKind => write!(f, "wrong token kind"),
        }
    }
}

#[derive(Debug)]
pub(super) struct TokenPair {
    pub(super) access_token: String,
    pub(super) refresh_token: String,
}

/// Sign a single token of the given kind.
pub(super) fn sign(
    secret: &[u8],
    user_id: Uuid,
    kind: TokenKind,
    ttl_seconds: i64,
    now: DateTime<Utc>,
) -> Result<String> {
    let claims = SessionClaims {
        sub: user_id,
        jti: Uuid::new_v4(),
        kind,
        iat: now.timestamp(),
        exp: now.timestamp() + ttl_seconds,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .context("failed to sign session token")
}

/// Issue a fresh access/refresh pair for a successful login.
pub(super) fn issue_pair(
    secret: &[u8],
    user_id: Uuid,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    now: DateTime<Utc>,
) -> Result<TokenPair> {
    Ok(TokenPair {
        access_token: sign(secret, user_id, TokenKind::Access, access_ttl_seconds, now)?,
        refresh_token: sign(secret, user_id, TokenKind::Refresh, refresh_ttl_seconds, now)?,
    })
}

/// Verify signature, expiry, and kind of a presented token.
pub(crate) fn verify(
    secret: &[u8],
    token: &str,
    expected_kind: TokenKind,
) -> Result<SessionClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<SessionClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        })?;

    if data.claims.kind != expected_kind {
        return Err(TokenError::WrongKind);
    }

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn pair_round_trips() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let pair = issue_pair(SECRET, user_id, 1800, 604_800, now).unwrap();

        let access = verify(SECRET, &pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(access.sub, user_id);
        assert_eq!(access.kind, TokenKind::Access);
        assert_eq!(access.exp, now.timestamp() + 1800);

        let refresh = verify(SECRET, &pair.refresh_token, TokenKind::Refresh).unwrap();
        assert_eq!(refresh.sub, user_id);
        assert_eq!(refresh.exp, now.timestamp() + 604_800);

        // Each token gets its own jti.
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let pair = issue_pair(SECRET, Uuid::new_v4(), 1800, 604_800, Utc::now()).unwrap();
        assert_eq!(
            verify(SECRET, &pair.refresh_token, TokenKind::Access),
            Err(TokenError::WrongKind)
        );
        assert_eq!(
            verify(SECRET, &pair.access_token, TokenKind::Refresh),
            Err(TokenError::WrongKind)
        );
    }

    #[test]
    fn expired_token_rejected() {
        let now = Utc::now() - chrono::Duration::seconds(120);
        let token = sign(SECRET, Uuid::new_v4(), TokenKind::Access, 60, now).unwrap();
        assert_eq!(
            verify(SECRET, &token, TokenKind::Access),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = sign(SECRET, Uuid::new_v4(), TokenKind::Access, 60, Utc::now()).unwrap();
        assert_eq!(
            verify(b"another-secret-another-secret-xx", &token, TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            verify(SECRET, "not-a-token", TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }
}
