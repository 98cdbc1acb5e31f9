//! Password reset flow: request a signed link, confirm it, set a new password.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    reset_token::{self, ResetLinkError},
    state::AuthState,
    storage,
    types::{MessageResponse, NewPasswordRequest, PasswordResetRequest, ResetLinkResponse},
    utils::{decode_uid, encode_uid, hash_password, normalize_email, valid_email, valid_password},
};
use crate::api::email::Template;

const GENERIC_LINK_ERROR: &str = "Invalid or expired reset link";

/// Request a reset link by email.
///
/// The response is identical whether or not the address is registered.
/// Unknown addresses get a registration invite instead, matching what the
/// frontend advertises on its reset page.
#[utoipa::path(
    post,
    path = "/auth/password-reset",
    tag = "auth",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset email queued", body = MessageResponse),
        (status = 400, description = "Invalid payload"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn request_reset(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordResetRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body".to_string()).into_response();
    };

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address".to_string()).into_response();
    }

    let config = state.config();
    let base_url = config.frontend_base_url().trim_end_matches('/');

    let outcome = match storage::lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) => {
            let token = reset_token::make_token(
                config.signing_secret(),
                user.id,
                &user.password_hash,
                user.is_verified,
                Utc::now(),
            );
            let reset_url = format!(
                "{base_url}/password-reset/{}/{token}",
                encode_uid(user.id)
            );
            let payload = serde_json::json!({ "reset_url": reset_url });
            enqueue_single(&pool, &email, Template::PasswordReset, &payload).await
        }
        Ok(None) => {
            info!("Reset requested for unregistered email, sending invite");
            let register_url = format!("{base_url}/register");
            let payload = serde_json::json!({ "register_url": register_url });
            enqueue_single(&pool, &email, Template::RegistrationInvite, &payload).await
        }
        Err(err) => Err(err),
    };

    if let Err(err) = outcome {
        error!("Failed to queue reset email: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    Json(MessageResponse {
        message: "If the account exists, a password reset link was sent.".to_string(),
    })
    .into_response()
}

/// Confirm a reset link before the frontend shows the new-password form.
#[utoipa::path(
    get,
    path = "/auth/password-reset/{uidb64}/{token}",
    tag = "auth",
    params(
        ("uidb64" = String, Path, description = "Base64url-encoded user id"),
        ("token" = String, Path, description = "Signed reset token"),
    ),
    responses(
        (status = 200, description = "Link is valid", body = ResetLinkResponse),
        (status = 401, description = "Invalid or expired reset link"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn confirm_reset(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    Path((uidb64, token)): Path<(String, String)>,
) -> Response {
    match validate_link(&pool, &state, &uidb64, &token).await {
        Ok(Some(_)) => Json(ResetLinkResponse {
            success: true,
            message: "Token is valid".to_string(),
            uidb64,
            token,
        })
        .into_response(),
        Ok(None) => (StatusCode::UNAUTHORIZED, GENERIC_LINK_ERROR.to_string()).into_response(),
        Err(err) => {
            error!("Failed to validate reset link: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Set a new password through a valid reset link.
#[utoipa::path(
    patch,
    path = "/auth/password-reset",
    tag = "auth",
    request_body = NewPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Invalid or expired reset link"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn set_new_password(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<NewPasswordRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body".to_string()).into_response();
    };

    if payload.password != payload.password_confirm {
        return (StatusCode::BAD_REQUEST, "Passwords do not match".to_string()).into_response();
    }
    if !valid_password(&payload.password) {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be between 4 and 40 characters".to_string(),
        )
            .into_response();
    }

    let user = match validate_link(&pool, &state, &payload.uidb64, &payload.token).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (StatusCode::UNAUTHORIZED, GENERIC_LINK_ERROR.to_string()).into_response()
        }
        Err(err) => {
            error!("Failed to validate reset link: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // Storing the new hash invalidates the link itself: the MAC covers
    // the hash it was minted against.
    if let Err(err) = storage::update_password(&pool, user.id, &password_hash).await {
        error!("Failed to update password: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    info!(user_id = %user.id, "Password reset completed");

    Json(MessageResponse {
        message: "Password reset successfully.".to_string(),
    })
    .into_response()
}

/// Resolve a link to its user if the uid decodes, the user exists, and the
/// token verifies against current credential state.
///
/// Invalid links collapse to `Ok(None)` outward; the distinct rejection
/// reason only reaches the logs.
async fn validate_link(
    pool: &PgPool,
    state: &AuthState,
    uidb64: &str,
    token: &str,
) -> anyhow::Result<Option<storage::UserRow>> {
    let config = state.config();

    let rejection = match decode_uid(uidb64) {
        None => ResetLinkError::BadUid,
        Some(user_id) => match storage::lookup_user_by_id(pool, user_id).await? {
            None => ResetLinkError::UnknownUser,
            Some(user) => match reset_token::check_token(
                config.signing_secret(),
                user.id,
                &user.password_hash,
                user.is_verified,
                token,
                Utc::now(),
                config.reset_token_ttl_seconds(),
            ) {
                Ok(()) => return Ok(Some(user)),
                Err(err) => err,
            },
        },
    };

    warn!("Reset link rejected: {rejection}");
    Ok(None)
}

async fn enqueue_single(
    pool: &PgPool,
    to_email: &str,
    template: Template,
    payload: &serde_json::Value,
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    storage::enqueue_email(&mut tx, to_email, template, payload).await?;
    tx.commit().await?;
    Ok(())
}
