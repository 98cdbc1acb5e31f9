//! Request-scoped identity resolved from a bearer access token.

use axum::http::{HeaderMap, StatusCode};
use sqlx::PgPool;
use tracing::{error, warn};
use uuid::Uuid;

use super::{
    state::AuthState,
    storage,
    tokens::{self, TokenKind},
    utils::extract_bearer_token,
};

/// The authenticated caller. Handlers receive this instead of reaching
/// for any ambient session state.
#[derive(Debug, Clone)]
pub(crate) struct Principal {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) is_verified: bool,
}

/// Resolve the caller from the Authorization header.
///
/// A token is only as good as the account behind it: a syntactically
/// valid token for a deleted user is rejected the same way as a forged
/// one.
pub(crate) async fn require_auth(
    pool: &PgPool,
    state: &AuthState,
    headers: &HeaderMap,
) -> Result<Principal, (StatusCode, String)> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Missing bearer token".to_string(),
        ));
    };

    let claims = tokens::verify(state.config().signing_secret(), &token, TokenKind::Access)
        .map_err(|err| {
            warn!("Access token rejected: {err}");
            (StatusCode::UNAUTHORIZED, "Invalid access token".to_string())
        })?;

    let user = storage::lookup_user_by_id(pool, claims.sub)
        .await
        .map_err(|err| {
            error!("Failed to lookup user: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        })?;

    let Some(user) = user else {
        warn!(user_id = %claims.sub, "Access token for deleted account");
        return Err((StatusCode::UNAUTHORIZED, "Invalid access token".to_string()));
    };

    Ok(Principal {
        user_id: user.id,
        email: user.email,
        full_name: user.full_name,
        is_verified: user.is_verified,
    })
}
