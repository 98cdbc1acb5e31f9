//! Integration tests against a real Postgres database.
//!
//! Gated on `PORTA_TEST_DSN`: when the variable is unset each test returns
//! early, so the suite is a no-op on machines without a database. Point it
//! at a throwaway database, for example:
//!
//! ```sh
//! PORTA_TEST_DSN=postgres://postgres@localhost:5432/porta_test cargo test
//! ```
//!
//! Schema files from `migrations/` are applied on every run; they are
//! idempotent. Each test works with its own randomly suffixed email so
//! runs do not interfere with each other or with leftover rows.

use anyhow::{Context, Result};
use axum::{
    Extension,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header::CONTENT_TYPE},
};
use porta::api::{self, AuthConfig, AuthState};
use serde_json::{Value, json};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::{env, sync::Arc};
use tower::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: &[&str] = &[
    include_str!("../migrations/20260830000001_users.sql"),
    include_str!("../migrations/20260830000002_revoked_tokens.sql"),
    include_str!("../migrations/20260830000003_email_outbox.sql"),
];

async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(dsn) = env::var("PORTA_TEST_DSN") else {
        eprintln!("PORTA_TEST_DSN not set, skipping");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&dsn)
        .await
        .context("Failed to connect to test database")?;

    for sql in MIGRATIONS {
        sqlx::raw_sql(sql)
            .execute(&pool)
            .await
            .context("Failed to apply schema")?;
    }

    Ok(Some(pool))
}

fn test_app(pool: PgPool) -> axum::Router {
    let state = Arc::new(AuthState::new(AuthConfig::new(
        "integration-signing-secret-0123456789".into(),
        "https://porta.dev".to_string(),
    )));
    let (router, _openapi) = api::router().split_for_parts();
    router.layer(Extension(state)).layer(Extension(pool))
}

fn unique_email(tag: &str) -> String {
    format!("{tag}-{}@example.com", Uuid::new_v4().simple())
}

async fn post_json(app: &axum::Router, path: &str, body: &Value) -> Result<Response<Body>> {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?;
    app.clone().oneshot(request).await.context("request failed")
}

async fn body_bytes(response: Response<Body>) -> Result<Vec<u8>> {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .context("Failed to read response body")?;
    Ok(bytes.to_vec())
}

async fn register(app: &axum::Router, email: &str, password: &str) -> Result<StatusCode> {
    let response = post_json(
        app,
        "/v1/auth/register",
        &json!({
            "full_name": "Jo Integration",
            "email": email,
            "password": password,
            "password_confirm": password,
        }),
    )
    .await?;
    Ok(response.status())
}

async fn stored_otp(pool: &PgPool, email: &str) -> Result<String> {
    let row = sqlx::query("SELECT otp FROM users WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .context("Failed to read stored OTP")?;
    row.get::<Option<String>, _>("otp")
        .context("User has no stored OTP")
}

/// Register, verify via the stored OTP, and log in. Returns the token pair.
async fn login_verified_user(
    app: &axum::Router,
    pool: &PgPool,
    email: &str,
    password: &str,
) -> Result<(String, String)> {
    assert_eq!(register(app, email, password).await?, StatusCode::CREATED);

    let otp = stored_otp(pool, email).await?;
    let response = post_json(
        app,
        "/v1/auth/verify-otp",
        &json!({ "email": email, "otp": otp }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        app,
        "/v1/auth/login",
        &json!({ "email": email, "password": password }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(&body_bytes(response).await?)?;
    let access = body["access_token"]
        .as_str()
        .context("missing access_token")?
        .to_string();
    let refresh = body["refresh_token"]
        .as_str()
        .context("missing refresh_token")?
        .to_string();
    Ok((access, refresh))
}

#[tokio::test]
async fn duplicate_registration_leaves_no_partial_row() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let app = test_app(pool.clone());
    let email = unique_email("dup");

    assert_eq!(register(&app, &email, "pw1234").await?, StatusCode::CREATED);
    assert_eq!(register(&app, &email, "pw1234").await?, StatusCode::CONFLICT);

    let users: i64 = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&pool)
        .await?
        .get("n");
    assert_eq!(users, 1);

    // The rejected signup must not leave a queued notification either:
    // user row and outbox row commit in the same transaction.
    let queued: i64 = sqlx::query("SELECT COUNT(*) AS n FROM email_outbox WHERE to_email = $1")
        .bind(&email)
        .fetch_one(&pool)
        .await?
        .get("n");
    assert_eq!(queued, 1);

    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let app = test_app(pool.clone());
    let email = unique_email("enum");

    assert_eq!(register(&app, &email, "pw1234").await?, StatusCode::CREATED);

    let wrong_password = post_json(
        &app,
        "/v1/auth/login",
        &json!({ "email": email, "password": "not-the-password" }),
    )
    .await?;
    let unknown_email = post_json(
        &app,
        "/v1/auth/login",
        &json!({ "email": unique_email("ghost"), "password": "not-the-password" }),
    )
    .await?;

    // Identical status and identical body for both failure causes.
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_bytes(wrong_password).await?,
        body_bytes(unknown_email).await?
    );

    Ok(())
}

#[tokio::test]
async fn logout_is_idempotent_and_kills_the_refresh_token() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let app = test_app(pool.clone());
    let email = unique_email("logout");

    let (_access, refresh) = login_verified_user(&app, &pool, &email, "pw1234").await?;

    // The refresh token works before logout.
    let response = post_json(
        &app,
        "/v1/auth/token/refresh",
        &json!({ "refresh_token": refresh }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // First and second logout both succeed.
    for _ in 0..2 {
        let response = post_json(
            &app,
            "/v1/auth/logout",
            &json!({ "refresh_token": refresh }),
        )
        .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The token stays unusable after revocation.
    let response = post_json(
        &app,
        "/v1/auth/token/refresh",
        &json!({ "refresh_token": refresh }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn wrong_otp_rejected_then_correct_otp_verifies() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let app = test_app(pool.clone());
    let email = unique_email("otp");

    assert_eq!(register(&app, &email, "pw1234").await?, StatusCode::CREATED);

    let response = post_json(
        &app,
        "/v1/auth/verify-otp",
        &json!({ "email": email, "otp": "WRONG1" }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let otp = stored_otp(&pool, &email).await?;
    let response = post_json(
        &app,
        "/v1/auth/verify-otp",
        &json!({ "email": email, "otp": otp }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let verified: bool = sqlx::query("SELECT is_verified FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&pool)
        .await?
        .get("is_verified");
    assert!(verified);

    Ok(())
}
