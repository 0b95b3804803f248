use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use dealbrief_core::TaskId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/status/:task_id", get(task_status))
        .route("/queue/stats", get(queue_stats))
        .route("/dead-letters", get(dead_letters))
}

/// Queue-side status of a submitted job.
///
/// Always a 200: an unparseable or never-seen id maps to `"unknown"` because
/// a poller may race its own submission.
pub async fn task_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(task_id): Path<String>,
) -> axum::response::Response {
    let parsed: Option<TaskId> = task_id.parse().ok();

    let job = match parsed {
        Some(id) => match services.jobs().get(id) {
            Ok(job) => job,
            Err(e) => {
                return errors::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "queue_error",
                    e.to_string(),
                );
            }
        },
        None => None,
    };

    (StatusCode::OK, Json(dto::task_status_to_json(&task_id, job))).into_response()
}

pub async fn queue_stats(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let queue = match services.queue_stats() {
        Ok(s) => s,
        Err(e) => {
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "queue_error",
                e.to_string(),
            );
        }
    };

    let worker_names = services.worker_names();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "active_tasks": queue.running,
            "scheduled_tasks": queue.scheduled,
            "reserved_tasks": queue.pending,
            "workers_online": worker_names.len(),
            "worker_names": worker_names,
        })),
    )
        .into_response()
}

pub async fn dead_letters(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.jobs().list_dead_letters(100) {
        Ok(entries) => {
            let body: Vec<_> = entries
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "task_id": e.job.id.to_string(),
                        "kind": e.job.kind.type_name(),
                        "attempts": e.job.attempt,
                        "reason": e.reason,
                        "dead_lettered_at": e.dead_lettered_at,
                    })
                })
                .collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "queue_error",
            e.to_string(),
        ),
    }
}
