//! Login and session pair issuance.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    state::AuthState,
    storage, tokens,
    types::{LoginRequest, LoginResponse},
    utils::{burn_password_hash, normalize_email, verify_password},
};

const GENERIC_LOGIN_ERROR: &str = "Invalid email or password";

/// Authenticate with email and password.
///
/// Unknown email and wrong password yield the same response, and both
/// paths run a password verification so their timing matches.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated, session tokens issued", body = LoginResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Invalid credentials or unverified account"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn login(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body".to_string()).into_response();
    };

    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Email and password are required".to_string(),
        )
            .into_response();
    }

    let email = normalize_email(&payload.email);

    let user = match storage::lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            burn_password_hash(&payload.password);
            warn!("Login attempt for unknown email");
            return (StatusCode::UNAUTHORIZED, GENERIC_LOGIN_ERROR.to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !verify_password(&payload.password, &user.password_hash) {
        warn!(user_id = %user.id, "Login attempt with wrong password");
        return (StatusCode::UNAUTHORIZED, GENERIC_LOGIN_ERROR.to_string()).into_response();
    }

    if !user.is_verified {
        return (
            StatusCode::UNAUTHORIZED,
            "Account is not verified. Check your email for the verification code.".to_string(),
        )
            .into_response();
    }

    let config = state.config();
    let pair = match tokens::issue_pair(
        config.signing_secret(),
        user.id,
        config.access_token_ttl_seconds(),
        config.refresh_token_ttl_seconds(),
        Utc::now(),
    ) {
        Ok(pair) => pair,
        Err(err) => {
            error!("Failed to issue session tokens: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    info!(user_id = %user.id, "Login succeeded");

    Json(LoginResponse {
        full_name: user.full_name,
        email: user.email,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    })
    .into_response()
}
