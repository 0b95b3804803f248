//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use dealbrief_core::TaskId;

use super::types::{DeadLetterEntry, Job, JobStatus};

/// Job store abstraction.
pub trait JobStore: Send + Sync {
    /// Enqueue a new job.
    fn enqueue(&self, job: Job) -> Result<TaskId, JobStoreError>;

    /// Get a job by id. Dead-lettered jobs remain visible here so status
    /// lookups can report "failed" instead of "unknown".
    fn get(&self, task_id: TaskId) -> Result<Option<Job>, JobStoreError>;

    /// Update a job.
    fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Claim the next ready job, marking it `Running` and bumping its
    /// attempt counter. Returns None if nothing is claimable.
    fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    /// Move an exhausted job to the dead-letter queue.
    fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError>;

    /// List dead-lettered jobs, oldest first.
    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError>;

    /// Queue statistics for the stats endpoint.
    fn stats(&self) -> Result<JobStats, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(TaskId),
    #[error("job already exists: {0}")]
    AlreadyExists(TaskId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Queue statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStats {
    /// Ready to claim right now.
    pub pending: usize,
    /// Currently executing.
    pub running: usize,
    /// Failed attempts waiting out their backoff.
    pub scheduled: usize,
    pub completed: usize,
    pub dead_lettered: usize,
}

/// In-memory job store for dev and tests (and the default single-process
/// deployment, where the executor runs inside the API process).
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<TaskId, Job>>,
    dead_letters: RwLock<HashMap<TaskId, DeadLetterEntry>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            dead_letters: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<TaskId, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    fn get(&self, task_id: TaskId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.jobs.read().unwrap();
        if let Some(job) = jobs.get(&task_id) {
            return Ok(Some(job.clone()));
        }
        let dls = self.dead_letters.read().unwrap();
        Ok(dls.get(&task_id).map(|e| e.job.clone()))
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(JobStoreError::NotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();

        // Oldest ready job first (FIFO among ready jobs).
        let mut candidates: Vec<_> = jobs
            .values()
            .filter(|j| {
                matches!(j.status, JobStatus::Pending | JobStatus::Failed { .. }) && j.is_ready()
            })
            .collect();
        candidates.sort_by_key(|j| j.created_at);

        if let Some(job) = candidates.first() {
            let task_id = job.id;
            if let Some(job) = jobs.get_mut(&task_id) {
                job.mark_running();
                return Ok(Some(job.clone()));
            }
        }

        Ok(None)
    }

    fn dead_letter(&self, mut job: Job, reason: String) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let mut dls = self.dead_letters.write().unwrap();

        job.status = JobStatus::DeadLettered {
            error: reason.clone(),
            attempts: job.attempt,
        };
        job.updated_at = Utc::now();

        jobs.remove(&job.id);
        dls.insert(job.id, DeadLetterEntry::new(job, reason));

        Ok(())
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let dls = self.dead_letters.read().unwrap();
        let mut result: Vec<_> = dls.values().cloned().collect();
        result.sort_by_key(|e| e.dead_lettered_at);
        result.truncate(limit);
        Ok(result)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        let jobs = self.jobs.read().unwrap();
        let dls = self.dead_letters.read().unwrap();

        let mut stats = JobStats::default();

        for job in jobs.values() {
            match &job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                // A failed job still waiting out its backoff is "scheduled";
                // once ready it counts as claimable.
                JobStatus::Failed { .. } => {
                    if job.is_ready() {
                        stats.pending += 1;
                    } else {
                        stats.scheduled += 1;
                    }
                }
                JobStatus::DeadLettered { .. } => stats.dead_lettered += 1,
            }
        }

        stats.dead_lettered += dls.len();

        Ok(stats)
    }
}

impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    fn enqueue(&self, job: Job) -> Result<TaskId, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, task_id: TaskId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(task_id)
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).update(job)
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next()
    }

    fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError> {
        (**self).dead_letter(job, reason)
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        (**self).list_dead_letters(limit)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        (**self).stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobKind;

    #[test]
    fn enqueue_and_claim() {
        let store = InMemoryJobStore::new();

        let job = Job::new(JobKind::TranscriptInsight, serde_json::json!({}));
        let task_id = store.enqueue(job).unwrap();

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, task_id);
        assert!(matches!(claimed.status, JobStatus::Running));
        assert_eq!(claimed.attempt, 1);

        // No more claimable jobs.
        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let store = InMemoryJobStore::new();
        let job = Job::new(JobKind::TranscriptInsight, serde_json::json!({}));
        store.enqueue(job.clone()).unwrap();
        assert!(matches!(
            store.enqueue(job),
            Err(JobStoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn backoff_delays_claiming() {
        let store = InMemoryJobStore::new();

        let mut job = Job::new(JobKind::LinkedInIcebreaker, serde_json::json!({}));
        job.scheduled_at = Some(Utc::now() + chrono::Duration::seconds(60));
        store.enqueue(job).unwrap();

        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn dead_lettered_job_stays_queryable() {
        let store = InMemoryJobStore::new();

        let job = Job::new(JobKind::TranscriptInsight, serde_json::json!({}));
        let task_id = job.id;
        store.enqueue(job).unwrap();

        let mut claimed = store.claim_next().unwrap().unwrap();
        claimed.mark_failed("boom".to_string(), Utc::now());
        store
            .dead_letter(claimed, "max retries exceeded".to_string())
            .unwrap();

        let fetched = store.get(task_id).unwrap().unwrap();
        assert!(matches!(fetched.status, JobStatus::DeadLettered { .. }));

        let dls = store.list_dead_letters(10).unwrap();
        assert_eq!(dls.len(), 1);
        assert_eq!(dls[0].job.id, task_id);
    }

    #[test]
    fn stats_tracking() {
        let store = InMemoryJobStore::new();

        for _ in 0..5 {
            let job = Job::new(JobKind::TranscriptInsight, serde_json::json!({}));
            store.enqueue(job).unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.pending, 5);

        store.claim_next().unwrap();
        store.claim_next().unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.running, 2);
    }
}
