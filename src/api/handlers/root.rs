use axum::response::{IntoResponse, Json};
use serde_json::json;

/// Undocumented landing route; useful for quick curl checks.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
