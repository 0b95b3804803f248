use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use dealbrief_core::RecordId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_linkedin).get(list_linkedin))
        .route("/:id", get(get_linkedin))
}

pub async fn submit_linkedin(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateLinkedInRequest>,
) -> axum::response::Response {
    let (record, task_id) = match services.submit_linkedin(body.into()).await {
        Ok(v) => v,
        Err(e) => return errors::submit_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(dto::submission_response(
            record.id,
            task_id,
            "linkedin pair queued for analysis",
        )),
    )
        .into_response()
}

pub async fn list_linkedin(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.records().list_linkedin().await {
        Ok(records) => {
            let body: Vec<_> = records.iter().map(dto::linkedin_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_linkedin(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let record_id: RecordId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id");
        }
    };

    match services.records().get_linkedin(record_id).await {
        Ok(Some(rec)) => (StatusCode::OK, Json(dto::linkedin_to_json(&rec))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "linkedin record not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
