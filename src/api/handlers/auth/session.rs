//! Refresh token exchange and logout.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    state::AuthState,
    storage,
    tokens::{self, TokenKind},
    types::{LogoutRequest, MessageResponse, RefreshRequest, RefreshResponse},
};

/// Exchange a live refresh token for a new access token.
#[utoipa::path(
    post,
    path = "/auth/token/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Refresh token invalid, expired, or revoked"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn refresh(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body".to_string()).into_response();
    };

    let config = state.config();
    let claims = match tokens::verify(
        config.signing_secret(),
        &payload.refresh_token,
        TokenKind::Refresh,
    ) {
        Ok(claims) => claims,
        Err(err) => {
            warn!("Refresh rejected: {err}");
            return (StatusCode::UNAUTHORIZED, "Invalid refresh token".to_string())
                .into_response();
        }
    };

    match storage::is_refresh_revoked(&pool, claims.jti).await {
        Ok(false) => {}
        Ok(true) => {
            warn!(user_id = %claims.sub, "Refresh with revoked token");
            return (StatusCode::UNAUTHORIZED, "Invalid refresh token".to_string())
                .into_response();
        }
        Err(err) => {
            error!("Failed to check revocation: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    // A token must always be backed by a live account.
    match storage::lookup_user_by_id(&pool, claims.sub).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!(user_id = %claims.sub, "Refresh for deleted account");
            return (StatusCode::UNAUTHORIZED, "Invalid refresh token".to_string())
                .into_response();
        }
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let access_token = match tokens::sign(
        config.signing_secret(),
        claims.sub,
        TokenKind::Access,
        config.access_token_ttl_seconds(),
        Utc::now(),
    ) {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to sign access token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    Json(RefreshResponse { access_token }).into_response()
}

/// Revoke the presented refresh token.
///
/// An invalid or already expired token still yields success; logout is
/// about ending the session, not diagnosing the token.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Session closed", body = MessageResponse),
        (status = 400, description = "Invalid payload"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn logout(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body".to_string()).into_response();
    };

    let config = state.config();
    match tokens::verify(
        config.signing_secret(),
        &payload.refresh_token,
        TokenKind::Refresh,
    ) {
        Ok(claims) => {
            let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
                .unwrap_or_else(Utc::now);
            if let Err(err) = storage::revoke_refresh(&pool, claims.jti, expires_at).await {
                error!("Failed to revoke refresh token: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            info!(user_id = %claims.sub, "Logout revoked refresh token");
        }
        Err(err) => {
            warn!("Logout with unusable token: {err}");
        }
    }

    Json(MessageResponse {
        message: "Logged out successfully.".to_string(),
    })
    .into_response()
}
