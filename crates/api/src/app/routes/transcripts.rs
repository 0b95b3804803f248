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
        .route("/", post(submit_transcript).get(list_transcripts))
        .route("/:id", get(get_transcript))
}

/// Insert a pending record and queue the analysis; returns immediately with
/// the ids to poll, never waiting on the LLM.
pub async fn submit_transcript(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateTranscriptRequest>,
) -> axum::response::Response {
    let (record, task_id) = match services.submit_transcript(body.into()).await {
        Ok(v) => v,
        Err(e) => return errors::submit_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(dto::submission_response(
            record.id,
            task_id,
            &format!(
                "transcript queued for analysis for company {}",
                record.company_name
            ),
        )),
    )
        .into_response()
}

pub async fn list_transcripts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.records().list_transcripts().await {
        Ok(records) => {
            let body: Vec<_> = records.iter().map(dto::transcript_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_transcript(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let record_id: RecordId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id");
        }
    };

    match services.records().get_transcript(record_id).await {
        Ok(Some(rec)) => (StatusCode::OK, Json(dto::transcript_to_json(&rec))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "transcript not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
