//! The job lifecycle manager: drives a record through its status state
//! machine as the correlated job executes.
//!
//! Contract per attempt:
//! 1. Mark the record `Processing` (idempotent under redelivery; a record
//!    already `Completed` short-circuits as success).
//! 2. One LLM call, selected by the job kind. No internal retry, and no
//!    record-store read; the job payload carries the full input.
//! 3. Success: result and `Completed` written in one atomic store update.
//! 4. Failure: `RetryScheduled` while attempts remain, terminal `Failed`
//!    once they are exhausted; the executor owns the backoff itself.
//!
//! An attempt aborted at the executor's hard time limit never resumes, so
//! the executor reports it through `on_timeout` and the record goes through
//! the same failure path as step 4.
//!
//! Known limitation: a hard worker crash between steps 1 and 3/4 leaves the
//! record `Processing` with no owning job. There is no reaper; recovery is a
//! fresh submission.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use dealbrief_ai::LlmClient;
use dealbrief_core::RecordId;
use dealbrief_records::{RecordKind, RecordStatus, StatusWrite};

use crate::jobs::{Job, JobHandler, JobKind, JobResult};
use crate::record_store::RecordStore;

/// Payload enqueued for a transcript-insight job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptJobPayload {
    pub record_id: RecordId,
    pub company_name: String,
    pub transcript_text: String,
}

/// Payload enqueued for an icebreaker-analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInJobPayload {
    pub record_id: RecordId,
    pub linkedin_bio: String,
    pub pitch_deck_content: String,
}

/// Handler for both job kinds; the sole writer of record status and result
/// after creation.
pub struct JobLifecycle {
    records: Arc<dyn RecordStore>,
    llm: Arc<dyn LlmClient>,
}

impl JobLifecycle {
    pub fn new(records: Arc<dyn RecordStore>, llm: Arc<dyn LlmClient>) -> Self {
        Self { records, llm }
    }

    /// Step 1: claim the record for this attempt.
    ///
    /// Returns `Some(result)` when the attempt should not run at all
    /// (already completed, or the record is unusable).
    async fn begin(&self, kind: RecordKind, record_id: RecordId) -> Option<JobResult> {
        match self
            .records
            .set_status(kind, record_id, RecordStatus::Processing)
            .await
        {
            Ok(write) if write.took_effect() => None,
            Ok(StatusWrite::Superseded(RecordStatus::Completed)) => {
                // Redelivered after a successful attempt: the work is done.
                info!(%record_id, "record already completed; skipping redelivered job");
                Some(JobResult::Success(json!({
                    "record_id": record_id,
                    "status": "completed",
                    "info": "record already completed",
                })))
            }
            Ok(StatusWrite::Superseded(current)) => Some(JobResult::Failure(format!(
                "record {record_id} is {current}; cannot start processing"
            ))),
            Ok(_) => unreachable!("took_effect covers Applied and Idempotent"),
            Err(e) => {
                error!(%record_id, error = %e, "failed to mark record processing");
                Some(JobResult::Failure(e.to_string()))
            }
        }
    }

    /// Both payload shapes carry `record_id` at the top level.
    fn record_ref(job: &Job) -> Option<(RecordKind, RecordId)> {
        let kind = match job.kind {
            JobKind::TranscriptInsight => RecordKind::Transcript,
            JobKind::LinkedInIcebreaker => RecordKind::LinkedInInsight,
        };
        let id = job.payload.get("record_id")?.as_str()?.parse().ok()?;
        Some((kind, id))
    }

    /// Step 4: reflect a failed attempt in the record.
    ///
    /// `RetryScheduled` while attempts remain so pollers can tell a pending
    /// retry apart from a permanent failure; `Failed` is written exactly
    /// once, and is terminal.
    async fn record_failure(&self, kind: RecordKind, record_id: RecordId, job: &Job) {
        let status = if job.retry_policy.should_retry(job.attempt) {
            RecordStatus::RetryScheduled
        } else {
            RecordStatus::Failed
        };

        if let Err(e) = self.records.set_status(kind, record_id, status).await {
            error!(%record_id, status = %status, error = %e, "failed to record attempt failure");
        }
    }

    async fn finish(
        &self,
        kind: RecordKind,
        record_id: RecordId,
        job: &Job,
        llm_outcome: Result<String, dealbrief_ai::LlmError>,
        extra: serde_json::Value,
    ) -> JobResult {
        let text = match llm_outcome {
            Ok(text) => text,
            Err(e) => {
                warn!(%record_id, attempt = job.attempt, error = %e, "inference failed");
                self.record_failure(kind, record_id, job).await;
                return JobResult::Failure(e.to_string());
            }
        };

        match self.records.complete(kind, record_id, &text).await {
            Ok(write) if write.took_effect() => {
                info!(%record_id, attempt = job.attempt, "record completed");
                let mut output = json!({
                    "task_id": job.id,
                    "record_id": record_id,
                    "status": "completed",
                });
                if let (Some(obj), Some(extra)) = (output.as_object_mut(), extra.as_object()) {
                    obj.extend(extra.clone());
                }
                JobResult::Success(output)
            }
            Ok(StatusWrite::Superseded(current)) => JobResult::Failure(format!(
                "record {record_id} moved to {current} during processing"
            )),
            Ok(_) => unreachable!("took_effect covers Applied and Idempotent"),
            Err(e) => {
                error!(%record_id, error = %e, "failed to write completion");
                self.record_failure(kind, record_id, job).await;
                JobResult::Failure(e.to_string())
            }
        }
    }

    async fn run_transcript(&self, job: &Job) -> JobResult {
        let payload: TranscriptJobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(p) => p,
            Err(e) => return JobResult::Failure(format!("malformed transcript payload: {e}")),
        };
        let kind = RecordKind::Transcript;

        if let Some(result) = self.begin(kind, payload.record_id).await {
            return result;
        }

        let outcome = self.llm.transcript_insight(&payload.transcript_text).await;
        self.finish(
            kind,
            payload.record_id,
            job,
            outcome,
            json!({ "company_name": payload.company_name }),
        )
        .await
    }

    async fn run_linkedin(&self, job: &Job) -> JobResult {
        let payload: LinkedInJobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(p) => p,
            Err(e) => return JobResult::Failure(format!("malformed linkedin payload: {e}")),
        };
        let kind = RecordKind::LinkedInInsight;

        if let Some(result) = self.begin(kind, payload.record_id).await {
            return result;
        }

        let outcome = self
            .llm
            .icebreaker_analysis(&payload.linkedin_bio, &payload.pitch_deck_content)
            .await;
        self.finish(kind, payload.record_id, job, outcome, json!({})).await
    }
}

#[async_trait]
impl JobHandler for JobLifecycle {
    async fn handle(&self, job: &Job) -> JobResult {
        match job.kind {
            JobKind::TranscriptInsight => self.run_transcript(job).await,
            JobKind::LinkedInIcebreaker => self.run_linkedin(job).await,
        }
    }

    async fn on_timeout(&self, job: &Job) {
        let Some((kind, record_id)) = Self::record_ref(job) else {
            warn!(task_id = %job.id, "timed-out job payload carries no record id");
            return;
        };
        warn!(%record_id, attempt = job.attempt, "attempt aborted at hard time limit");
        self.record_failure(kind, record_id, job).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use dealbrief_ai::LlmError;
    use dealbrief_records::{NewLinkedInInsight, NewTranscript};

    use crate::jobs::{
        InMemoryJobStore, JobExecutor, JobExecutorConfig, JobStatus, JobStore, RetryPolicy,
    };
    use crate::record_store::InMemoryRecordStore;

    struct OkLlm(&'static str);
    struct FailLlm;
    struct StuckLlm;

    #[async_trait]
    impl LlmClient for OkLlm {
        async fn transcript_insight(&self, _t: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
        async fn icebreaker_analysis(&self, _b: &str, _p: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[async_trait]
    impl LlmClient for FailLlm {
        async fn transcript_insight(&self, _t: &str) -> Result<String, LlmError> {
            Err(LlmError::Request("connection refused".to_string()))
        }
        async fn icebreaker_analysis(&self, _b: &str, _p: &str) -> Result<String, LlmError> {
            Err(LlmError::Request("connection refused".to_string()))
        }
    }

    #[async_trait]
    impl LlmClient for StuckLlm {
        async fn transcript_insight(&self, _t: &str) -> Result<String, LlmError> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }
        async fn icebreaker_analysis(&self, _b: &str, _p: &str) -> Result<String, LlmError> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }
    }

    async fn pending_transcript(store: &InMemoryRecordStore) -> RecordId {
        store
            .insert_transcript(NewTranscript {
                company_name: "Acme".into(),
                attendees: vec!["A".into(), "B".into()],
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                transcript_text: "we talked".into(),
            })
            .await
            .unwrap()
            .id
    }

    fn transcript_job(record_id: RecordId) -> Job {
        Job::new(
            JobKind::TranscriptInsight,
            serde_json::to_value(TranscriptJobPayload {
                record_id,
                company_name: "Acme".into(),
                transcript_text: "we talked".into(),
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn successful_attempt_completes_the_record() {
        let records = Arc::new(InMemoryRecordStore::new());
        let lifecycle = JobLifecycle::new(records.clone(), Arc::new(OkLlm("the insight")));

        let record_id = pending_transcript(&records).await;
        let mut job = transcript_job(record_id);
        job.mark_running();

        let result = lifecycle.handle(&job).await;
        assert!(matches!(result, JobResult::Success(_)));

        let rec = records.get_transcript(record_id).await.unwrap().unwrap();
        assert_eq!(rec.status, RecordStatus::Completed);
        assert_eq!(rec.insight_result.as_deref(), Some("the insight"));
    }

    #[tokio::test]
    async fn failed_attempt_with_retries_left_schedules_retry() {
        let records = Arc::new(InMemoryRecordStore::new());
        let lifecycle = JobLifecycle::new(records.clone(), Arc::new(FailLlm));

        let record_id = pending_transcript(&records).await;
        let mut job = transcript_job(record_id); // default policy: 3 attempts
        job.mark_running();
        assert_eq!(job.attempt, 1);

        let result = lifecycle.handle(&job).await;
        assert!(matches!(result, JobResult::Failure(_)));

        let rec = records.get_transcript(record_id).await.unwrap().unwrap();
        assert_eq!(rec.status, RecordStatus::RetryScheduled);
        assert!(rec.insight_result.is_none());
    }

    #[tokio::test]
    async fn final_failed_attempt_is_permanent() {
        let records = Arc::new(InMemoryRecordStore::new());
        let lifecycle = JobLifecycle::new(records.clone(), Arc::new(FailLlm));

        let record_id = pending_transcript(&records).await;
        let mut job = transcript_job(record_id);
        job.mark_running();
        job.mark_running();
        job.mark_running();
        assert_eq!(job.attempt, 3); // ceiling of the default policy

        let result = lifecycle.handle(&job).await;
        assert!(matches!(result, JobResult::Failure(_)));

        let rec = records.get_transcript(record_id).await.unwrap().unwrap();
        assert_eq!(rec.status, RecordStatus::Failed);
        assert!(rec.insight_result.is_none());
    }

    #[tokio::test]
    async fn redelivery_after_completion_is_a_success_noop() {
        let records = Arc::new(InMemoryRecordStore::new());

        let record_id = pending_transcript(&records).await;
        records
            .set_status(RecordKind::Transcript, record_id, RecordStatus::Processing)
            .await
            .unwrap();
        records
            .complete(RecordKind::Transcript, record_id, "done earlier")
            .await
            .unwrap();

        // FailLlm proves the short-circuit happens before any inference.
        let lifecycle = JobLifecycle::new(records.clone(), Arc::new(FailLlm));
        let mut job = transcript_job(record_id);
        job.mark_running();

        let result = lifecycle.handle(&job).await;
        assert!(matches!(result, JobResult::Success(_)));

        let rec = records.get_transcript(record_id).await.unwrap().unwrap();
        assert_eq!(rec.insight_result.as_deref(), Some("done earlier"));
    }

    fn short_limits() -> JobExecutorConfig {
        JobExecutorConfig {
            hard_time_limit: std::time::Duration::from_millis(20),
            soft_time_limit: std::time::Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn timed_out_final_attempt_fails_the_record() {
        let records = Arc::new(InMemoryRecordStore::new());
        let store = InMemoryJobStore::arc();
        let lifecycle = Arc::new(JobLifecycle::new(records.clone(), Arc::new(StuckLlm)));

        let mut executor = JobExecutor::new(store.clone());
        executor.register_handler(JobKind::TranscriptInsight.type_name(), lifecycle);

        let record_id = pending_transcript(&records).await;
        let job = transcript_job(record_id).with_retry_policy(RetryPolicy::no_retry());
        store.enqueue(job).unwrap();

        let mut claimed = store.claim_next().unwrap().unwrap();
        let err = executor
            .execute_one(&mut claimed, &short_limits())
            .await
            .unwrap_err();
        assert!(err.contains("hard time limit"));
        assert!(matches!(claimed.status, JobStatus::DeadLettered { .. }));

        // The aborted attempt must not leave the record stuck in Processing.
        let rec = records.get_transcript(record_id).await.unwrap().unwrap();
        assert_eq!(rec.status, RecordStatus::Failed);
        assert!(rec.insight_result.is_none());
    }

    #[tokio::test]
    async fn timed_out_attempt_with_retries_left_schedules_retry() {
        let records = Arc::new(InMemoryRecordStore::new());
        let store = InMemoryJobStore::arc();
        let lifecycle = Arc::new(JobLifecycle::new(records.clone(), Arc::new(StuckLlm)));

        let mut executor = JobExecutor::new(store.clone());
        executor.register_handler(JobKind::TranscriptInsight.type_name(), lifecycle);

        let record_id = pending_transcript(&records).await;
        store.enqueue(transcript_job(record_id)).unwrap(); // default policy: 3 attempts

        let mut claimed = store.claim_next().unwrap().unwrap();
        assert!(
            executor
                .execute_one(&mut claimed, &short_limits())
                .await
                .is_err()
        );
        assert!(matches!(claimed.status, JobStatus::Failed { attempt: 1, .. }));

        let rec = records.get_transcript(record_id).await.unwrap().unwrap();
        assert_eq!(rec.status, RecordStatus::RetryScheduled);
    }

    #[tokio::test]
    async fn always_failing_job_is_attempted_exactly_three_times() {
        let records = Arc::new(InMemoryRecordStore::new());
        let store = InMemoryJobStore::arc();
        let lifecycle = Arc::new(JobLifecycle::new(records.clone(), Arc::new(FailLlm)));

        let mut executor = JobExecutor::new(store.clone());
        executor.register_handler(JobKind::LinkedInIcebreaker.type_name(), lifecycle);

        let record_id = records
            .insert_linkedin(NewLinkedInInsight {
                linkedin_bio: "bio".into(),
                pitch_deck_content: "deck".into(),
            })
            .await
            .unwrap()
            .id;

        let job = Job::new(
            JobKind::LinkedInIcebreaker,
            serde_json::to_value(LinkedInJobPayload {
                record_id,
                linkedin_bio: "bio".into(),
                pitch_deck_content: "deck".into(),
            })
            .unwrap(),
        );
        store.enqueue(job).unwrap();
        let config = JobExecutorConfig::default();

        let mut attempts = 0;
        while let Some(mut claimed) = store.claim_next().unwrap() {
            attempts += 1;
            let _ = executor.execute_one(&mut claimed, &config).await;
            // Skip the backoff between attempts; only the count matters here.
            if matches!(claimed.status, JobStatus::Failed { .. }) {
                claimed.scheduled_at = None;
                store.update(&claimed).unwrap();
            }
        }

        assert_eq!(attempts, 3);

        let rec = records.get_linkedin(record_id).await.unwrap().unwrap();
        assert_eq!(rec.status, RecordStatus::Failed);
        assert!(rec.icebreaker_result.is_none());
    }
}
