//! Account registration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use sqlx::PgPool;
use tracing::error;

use super::{
    storage::{self, SignupOutcome},
    types::{AccountSummary, RegisterRequest, RegisterResponse},
    utils::{generate_otp, hash_password, normalize_email, valid_email, valid_password},
};

/// Register a new account and queue its verification code.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification code sent", body = RegisterResponse),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn register(
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body".to_string()).into_response();
    };

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address".to_string()).into_response();
    }
    if payload.full_name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Full name is required".to_string()).into_response();
    }
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

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let otp = generate_otp();
    let full_name = payload.full_name.trim();

    match storage::create_user(&pool, &email, full_name, &password_hash, &otp).await {
        Ok(SignupOutcome::Created) => {
            let body = RegisterResponse {
                data: AccountSummary {
                    full_name: full_name.to_string(),
                    email,
                    is_verified: false,
                },
                message: "Account created. Check your email for the verification code."
                    .to_string(),
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Ok(SignupOutcome::Conflict) => (
            StatusCode::CONFLICT,
            "An account with this email already exists".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to create user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
