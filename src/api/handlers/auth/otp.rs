//! Email verification codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};

use super::{
    state::AuthState,
    storage,
    types::{MessageResponse, ResendOtpRequest, VerifyOtpRequest},
    utils::{generate_otp, normalize_email},
};

const GENERIC_OTP_ERROR: &str = "Invalid or expired OTP.";

/// Pure acceptance check for a submitted code: exact match against the
/// stored code and issued within the validity window. The clock comes in
/// as a parameter so the boundary is testable.
fn otp_accepted(
    stored: Option<&str>,
    created_at: Option<DateTime<Utc>>,
    submitted: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    let fresh = created_at.is_some_and(|created| now - created <= window);
    let matches = stored == Some(submitted);
    matches && fresh
}

/// Verify the emailed code and activate the account.
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    tag = "auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired OTP"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn verify_otp(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body".to_string()).into_response();
    };

    // Field checks come before any lookup so malformed requests never
    // touch the database.
    if payload.email.trim().is_empty() || payload.otp.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Email and OTP are required".to_string(),
        )
            .into_response();
    }

    let email = normalize_email(&payload.email);

    let user = match storage::lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("OTP verification for unknown email");
            return (StatusCode::BAD_REQUEST, GENERIC_OTP_ERROR.to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let window = Duration::minutes(state.config().otp_ttl_minutes());
    let accepted = otp_accepted(
        user.otp.as_deref(),
        user.otp_created_at,
        payload.otp.trim(),
        Utc::now(),
        window,
    );

    if !accepted {
        warn!(user_id = %user.id, "OTP rejected");
        return (StatusCode::BAD_REQUEST, GENERIC_OTP_ERROR.to_string()).into_response();
    }

    // The stored code is left in place after success; it cannot be
    // replayed because verification is idempotent from here on.
    if let Err(err) = storage::mark_verified(&pool, user.id).await {
        error!("Failed to mark user verified: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    Json(MessageResponse {
        message: "Account verified successfully.".to_string(),
    })
    .into_response()
}

/// Issue a fresh code. The response never reveals whether the email exists.
#[utoipa::path(
    post,
    path = "/auth/resend-otp",
    tag = "auth",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "If the account exists, a new code was sent", body = MessageResponse),
        (status = 400, description = "Invalid payload"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn resend_otp(
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<ResendOtpRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body".to_string()).into_response();
    };

    if payload.email.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Email is required".to_string()).into_response();
    }

    let email = normalize_email(&payload.email);

    match storage::lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) if !user.is_verified => {
            let otp = generate_otp();
            if let Err(err) = storage::reissue_otp(&pool, &user, &otp).await {
                error!("Failed to reissue OTP: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
        Ok(Some(_)) => {
            warn!("OTP resend for already verified account");
        }
        Ok(None) => {
            warn!("OTP resend for unknown email");
        }
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    Json(MessageResponse {
        message: "If the account exists, a new verification code was sent.".to_string(),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::AuthConfig;

    fn test_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(AuthConfig::new(
            "0123456789abcdef0123456789abcdef".into(),
            "https://porta.dev".to_string(),
        )))
    }

    #[tokio::test]
    async fn verify_without_body_is_bad_request() {
        let pool = PgPool::connect_lazy("postgres://localhost/porta").unwrap();
        let response = verify_otp(Extension(pool), Extension(test_state()), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_with_blank_fields_is_bad_request() {
        let pool = PgPool::connect_lazy("postgres://localhost/porta").unwrap();
        let request = VerifyOtpRequest {
            email: " ".to_string(),
            otp: String::new(),
        };
        let response =
            verify_otp(Extension(pool), Extension(test_state()), Some(Json(request))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn resend_without_body_is_bad_request() {
        let pool = PgPool::connect_lazy("postgres://localhost/porta").unwrap();
        let response = resend_otp(Extension(pool), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn otp_accepted_within_window() {
        let issued = Utc::now();
        let window = Duration::minutes(15);
        assert!(otp_accepted(
            Some("A1B2C3"),
            Some(issued),
            "A1B2C3",
            issued + Duration::minutes(14),
            window
        ));
        // The window boundary itself is still valid.
        assert!(otp_accepted(
            Some("A1B2C3"),
            Some(issued),
            "A1B2C3",
            issued + window,
            window
        ));
    }

    #[test]
    fn otp_rejected_one_second_past_window() {
        let issued = Utc::now();
        let window = Duration::minutes(15);
        assert!(!otp_accepted(
            Some("A1B2C3"),
            Some(issued),
            "A1B2C3",
            issued + window + Duration::seconds(1),
            window
        ));
    }

    #[test]
    fn otp_rejected_on_mismatch_within_window() {
        let issued = Utc::now();
        let window = Duration::minutes(15);
        assert!(!otp_accepted(
            Some("A1B2C3"),
            Some(issued),
            "ZZZZZZ",
            issued + Duration::minutes(1),
            window
        ));
    }

    #[test]
    fn otp_rejected_without_stored_state() {
        let now = Utc::now();
        let window = Duration::minutes(15);
        assert!(!otp_accepted(None, Some(now), "A1B2C3", now, window));
        assert!(!otp_accepted(Some("A1B2C3"), None, "A1B2C3", now, window));
    }
}
