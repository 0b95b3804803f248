use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use dealbrief_infra::record_store::RecordStoreError;

use crate::app::services::SubmitError;

pub fn submit_error_to_response(err: SubmitError) -> axum::response::Response {
    match err {
        SubmitError::Invalid(e) => json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        SubmitError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            e.to_string(),
        ),
        SubmitError::Queue(e) => {
            json_error(StatusCode::BAD_GATEWAY, "enqueue_error", e.to_string())
        }
    }
}

pub fn store_error_to_response(err: RecordStoreError) -> axum::response::Response {
    match err {
        RecordStoreError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("record {id} not found"))
        }
        RecordStoreError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
