//! Authenticated account management.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

use super::auth::{
    principal::require_auth,
    storage::{self, UpdateOutcome},
    types::{
        AccountSummary, DashboardResponse, UpdateAccountRequest, UpdateAccountResponse,
    },
    utils::{normalize_email, valid_email},
    AuthState,
};

/// Update the caller's name or email.
#[utoipa::path(
    patch,
    path = "/account",
    tag = "account",
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated", body = UpdateAccountResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 409, description = "Email already taken"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn update(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Option<Json<UpdateAccountRequest>>,
) -> Response {
    let principal = match require_auth(&pool, &state, &headers).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body".to_string()).into_response();
    };

    let full_name = payload
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty());

    if full_name.is_none() && email.is_none() {
        return (StatusCode::BAD_REQUEST, "Nothing to update".to_string()).into_response();
    }
    if let Some(email) = &email {
        if !valid_email(email) {
            return (StatusCode::BAD_REQUEST, "Invalid email address".to_string())
                .into_response();
        }
    }

    match storage::update_account(&pool, principal.user_id, full_name, email.as_deref()).await {
        Ok(UpdateOutcome::Updated(user)) => {
            info!(user_id = %user.id, "Account updated");
            Json(UpdateAccountResponse {
                data: AccountSummary {
                    full_name: user.full_name,
                    email: user.email,
                    is_verified: user.is_verified,
                },
                message: "Account updated successfully.".to_string(),
            })
            .into_response()
        }
        Ok(UpdateOutcome::Conflict) => (
            StatusCode::CONFLICT,
            "An account with this email already exists".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to update account: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Delete the caller's account. Terminal and immediate.
#[utoipa::path(
    delete,
    path = "/account",
    tag = "account",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn delete(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Response {
    let principal = match require_auth(&pool, &state, &headers).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    if let Err(err) = storage::delete_user(&pool, principal.user_id).await {
        error!("Failed to delete account: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    info!(user_id = %principal.user_id, "Account deleted");
    StatusCode::NO_CONTENT.into_response()
}

/// Smoke endpoint returning the caller's profile; proves the token
/// resolves to a live account.
#[utoipa::path(
    get,
    path = "/account/dashboard",
    tag = "account",
    responses(
        (status = 200, description = "Caller profile", body = DashboardResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn dashboard(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Response {
    let principal = match require_auth(&pool, &state, &headers).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    Json(DashboardResponse {
        message: format!("Welcome back, {}.", principal.full_name),
        data: AccountSummary {
            full_name: principal.full_name,
            email: principal.email,
            is_verified: principal.is_verified,
        },
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
    async fn update_without_token_is_unauthorized() {
        let pool = PgPool::connect_lazy("postgres://localhost/porta").unwrap();
        let response = update(
            Extension(pool),
            Extension(test_state()),
            HeaderMap::new(),
            Some(Json(UpdateAccountRequest::default())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dashboard_without_token_is_unauthorized() {
        let pool = PgPool::connect_lazy("postgres://localhost/porta").unwrap();
        let response = dashboard(Extension(pool), Extension(test_state()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_without_token_is_unauthorized() {
        let pool = PgPool::connect_lazy("postgres://localhost/porta").unwrap();
        let response = delete(Extension(pool), Extension(test_state()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
