//! Request/response DTOs and JSON mapping helpers.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use dealbrief_core::TaskId;
use dealbrief_infra::jobs::{Job, JobStatus};
use dealbrief_records::{LinkedInInsightRecord, NewLinkedInInsight, NewTranscript, TranscriptRecord};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateTranscriptRequest {
    pub company_name: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    /// ISO date, e.g. `2024-01-01`.
    pub date: NaiveDate,
    pub transcript_text: String,
}

impl From<CreateTranscriptRequest> for NewTranscript {
    fn from(req: CreateTranscriptRequest) -> Self {
        Self {
            company_name: req.company_name,
            attendees: req.attendees,
            date: req.date,
            transcript_text: req.transcript_text,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkedInRequest {
    pub linkedin_bio: String,
    pub pitch_deck_content: String,
}

impl From<CreateLinkedInRequest> for NewLinkedInInsight {
    fn from(req: CreateLinkedInRequest) -> Self {
        Self {
            linkedin_bio: req.linkedin_bio,
            pitch_deck_content: req.pitch_deck_content,
        }
    }
}

// -------------------------
// Response mapping
// -------------------------

/// Body for both submission endpoints: the record id, the queue id to poll,
/// and a fixed `"queued"` marker.
pub fn submission_response(record_id: impl ToString, task_id: TaskId, message: &str) -> serde_json::Value {
    json!({
        "id": record_id.to_string(),
        "task_id": task_id.to_string(),
        "status": "queued",
        "message": message,
    })
}

pub fn transcript_to_json(rec: &TranscriptRecord) -> serde_json::Value {
    json!({
        "id": rec.id.to_string(),
        "company_name": rec.company_name,
        "attendees": rec.attendees,
        "date": rec.date,
        "transcript_text": rec.transcript_text,
        "insight_result": rec.insight_result,
        "status": rec.status.as_str(),
        "created_at": rec.created_at,
        "updated_at": rec.updated_at,
    })
}

pub fn linkedin_to_json(rec: &LinkedInInsightRecord) -> serde_json::Value {
    json!({
        "id": rec.id.to_string(),
        "linkedin_bio": rec.linkedin_bio,
        "pitch_deck_content": rec.pitch_deck_content,
        "icebreaker_result": rec.icebreaker_result,
        "status": rec.status.as_str(),
        "created_at": rec.created_at,
        "updated_at": rec.updated_at,
    })
}

/// Map a queue lookup onto the polling contract:
/// queued | running | succeeded | failed | unknown.
///
/// An id the queue has never seen yields `"unknown"` with a 200, never an
/// error; pollers race submission and should just poll again.
pub fn task_status_to_json(task_id: &str, job: Option<Job>) -> serde_json::Value {
    let Some(job) = job else {
        return json!({
            "task_id": task_id,
            "status": "unknown",
            "info": "no job with this id",
        });
    };

    match &job.status {
        // A failed attempt waiting out its backoff is queued again.
        JobStatus::Pending | JobStatus::Failed { .. } => json!({
            "task_id": task_id,
            "status": "queued",
        }),
        JobStatus::Running => json!({
            "task_id": task_id,
            "status": "running",
        }),
        JobStatus::Completed => json!({
            "task_id": task_id,
            "status": "succeeded",
            "result": job.output,
        }),
        JobStatus::DeadLettered { error, attempts } => json!({
            "task_id": task_id,
            "status": "failed",
            "info": error,
            "attempts": attempts,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealbrief_infra::jobs::JobKind;

    #[test]
    fn unknown_task_maps_without_error() {
        let body = task_status_to_json("not-a-real-id", None);
        assert_eq!(body["status"], "unknown");
    }

    #[test]
    fn backoff_wait_reads_as_queued() {
        let mut job = Job::new(JobKind::TranscriptInsight, json!({}));
        job.mark_running();
        job.mark_failed("boom".to_string(), chrono::Utc::now());

        let body = task_status_to_json(&job.id.to_string(), Some(job));
        assert_eq!(body["status"], "queued");
    }
}
