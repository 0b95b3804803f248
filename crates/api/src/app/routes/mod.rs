use axum::Router;

pub mod linkedin;
pub mod system;
pub mod tasks;
pub mod transcripts;

/// Router for all record and task endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/transcripts", transcripts::router())
        .nest("/linkedin", linkedin::router())
        .nest("/tasks", tasks::router())
}
