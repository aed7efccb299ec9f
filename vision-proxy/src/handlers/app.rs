use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe. The proxy holds no connections, so being able to answer
/// is the whole check.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "vision-proxy",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
