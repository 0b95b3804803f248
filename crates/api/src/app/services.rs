//! Infrastructure wiring: record store, job queue, executor, LLM client.
//!
//! Every dependency enters through a constructor argument, so tests can wire
//! an in-memory store and a scripted LLM without touching process globals.

use std::sync::Arc;

use dealbrief_ai::{GroqClient, LlmClient};
use dealbrief_core::TaskId;
use dealbrief_infra::jobs::{
    Job, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobKind, JobStats,
    JobStore, JobStoreError, RetryPolicy,
};
use dealbrief_infra::lifecycle::{JobLifecycle, LinkedInJobPayload, TranscriptJobPayload};
use dealbrief_infra::record_store::{InMemoryRecordStore, RecordStore, RecordStoreError};
use dealbrief_records::{
    LinkedInInsightRecord, NewLinkedInInsight, NewTranscript, TranscriptRecord,
};

use crate::config::Config;

#[cfg(feature = "redis")]
use dealbrief_infra::jobs::RedisJobStore;
#[cfg(feature = "redis")]
use dealbrief_infra::record_store::PostgresRecordStore;
#[cfg(feature = "redis")]
use sqlx::PgPool;

/// Errors surfaced by the submission path, mapped to HTTP in `errors.rs`.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("{0}")]
    Invalid(#[from] dealbrief_core::DomainError),
    #[error("record store error: {0}")]
    Store(#[from] RecordStoreError),
    /// Insert succeeded but the enqueue did not; the record stays `Pending`
    /// with no job, and the caller is told to resubmit.
    #[error("job queue error: {0}")]
    Queue(#[from] JobStoreError),
}

pub struct AppServices {
    records: Arc<dyn RecordStore>,
    jobs: Arc<dyn JobStore>,
    llm: Arc<dyn LlmClient>,
    retry_policy: RetryPolicy,
    executor: Option<JobExecutorHandle>,
}

impl AppServices {
    pub fn new(
        records: Arc<dyn RecordStore>,
        jobs: Arc<dyn JobStore>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            records,
            jobs,
            llm,
            retry_policy: RetryPolicy::default(),
            executor: None,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Run a job executor inside this process (in-memory deployments).
    pub fn spawn_executor(&mut self, config: JobExecutorConfig) {
        let lifecycle = Arc::new(JobLifecycle::new(self.records.clone(), self.llm.clone()));

        let mut executor = JobExecutor::new(self.jobs.clone());
        executor.register_handler(JobKind::TranscriptInsight.type_name(), lifecycle.clone());
        executor.register_handler(JobKind::LinkedInIcebreaker.type_name(), lifecycle);

        self.executor = Some(executor.spawn(config));
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    /// Insert a pending record, then enqueue its analysis job.
    ///
    /// Insert failure aborts before anything is queued. Enqueue failure after
    /// a successful insert leaves the record `Pending` with no job; there is
    /// no automatic resubmission.
    pub async fn submit_transcript(
        &self,
        input: NewTranscript,
    ) -> Result<(TranscriptRecord, TaskId), SubmitError> {
        input.validate()?;
        let record = self.records.insert_transcript(input).await?;

        let payload = TranscriptJobPayload {
            record_id: record.id,
            company_name: record.company_name.clone(),
            transcript_text: record.transcript_text.clone(),
        };
        let job = Job::new(
            JobKind::TranscriptInsight,
            serde_json::to_value(payload).map_err(|e| JobStoreError::Storage(e.to_string()))?,
        )
        .with_retry_policy(self.retry_policy.clone());

        let task_id = self.jobs.enqueue(job)?;
        tracing::info!(record_id = %record.id, %task_id, "transcript queued for analysis");
        Ok((record, task_id))
    }

    pub async fn submit_linkedin(
        &self,
        input: NewLinkedInInsight,
    ) -> Result<(LinkedInInsightRecord, TaskId), SubmitError> {
        input.validate()?;
        let record = self.records.insert_linkedin(input).await?;

        let payload = LinkedInJobPayload {
            record_id: record.id,
            linkedin_bio: record.linkedin_bio.clone(),
            pitch_deck_content: record.pitch_deck_content.clone(),
        };
        let job = Job::new(
            JobKind::LinkedInIcebreaker,
            serde_json::to_value(payload).map_err(|e| JobStoreError::Storage(e.to_string()))?,
        )
        .with_retry_policy(self.retry_policy.clone());

        let task_id = self.jobs.enqueue(job)?;
        tracing::info!(record_id = %record.id, %task_id, "linkedin pair queued for analysis");
        Ok((record, task_id))
    }

    pub fn queue_stats(&self) -> Result<JobStats, JobStoreError> {
        self.jobs.stats()
    }

    /// Names of executors running inside this process. Out-of-process
    /// workers are not visible here.
    pub fn worker_names(&self) -> Vec<String> {
        self.executor
            .as_ref()
            .map(|h| vec![h.name().to_string()])
            .unwrap_or_default()
    }
}

/// Build services from process configuration.
pub async fn build_services(config: &Config) -> anyhow::Result<AppServices> {
    if config.use_persistent {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services(config).await;
        }
        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but redis feature not enabled, falling back to in-memory"
            );
        }
    }

    Ok(build_in_memory_services())
}

/// In-memory wiring (dev/test): both stores in-process, executor inline.
fn build_in_memory_services() -> AppServices {
    let records: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
    let jobs: Arc<dyn JobStore> = Arc::new(dealbrief_infra::jobs::InMemoryJobStore::new());
    let llm: Arc<dyn LlmClient> = Arc::new(GroqClient::from_env());

    let mut services = AppServices::new(records, jobs, llm);
    services.spawn_executor(JobExecutorConfig::default().with_name("inline-worker"));
    services
}

/// Persistent wiring: Postgres records, Redis jobs, no inline executor
/// (a separate `dealbrief-worker` process claims the jobs).
#[cfg(feature = "redis")]
async fn build_persistent_services(config: &Config) -> anyhow::Result<AppServices> {
    let pool = PgPool::connect(config.database_url()?).await?;
    let record_store = PostgresRecordStore::new(pool);
    record_store.migrate().await?;

    let jobs = RedisJobStore::new(config.redis_url()?, None)?;

    let records: Arc<dyn RecordStore> = Arc::new(record_store);
    let jobs: Arc<dyn JobStore> = Arc::new(jobs);
    let llm: Arc<dyn LlmClient> = Arc::new(GroqClient::from_env());

    Ok(AppServices::new(records, jobs, llm))
}
