use axum::{Json, http::StatusCode, response::IntoResponse};

/// Liveness probe: the process is up. Does not verify downstream
/// dependencies.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "healthy" })))
}
