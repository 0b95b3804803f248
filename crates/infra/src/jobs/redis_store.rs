//! Redis-backed job store (durable, survives process restarts).
//!
//! Layout under a configurable key prefix (default `dealbrief:jobs`):
//!
//! - `{prefix}:job:{task_id}` - serialized [`Job`] (string)
//! - `{prefix}:ready`         - zset of task ids scored by ready time
//! - `{prefix}:running`       - set of task ids currently executing
//! - `{prefix}:completed`     - counter of completed jobs
//! - `{prefix}:dlq`           - hash of task id to serialized dead-letter entry
//!
//! Claiming pops the lowest-scored entry from the ready zset; an entry whose
//! score is still in the future is pushed back and the claim reports empty.
//! With one executor per ready zset the pop-check-push is not racy; running
//! multiple executors against one prefix can double-claim in the window
//! between pop and push-back.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use dealbrief_core::TaskId;

use super::store::{JobStats, JobStore, JobStoreError};
use super::types::{DeadLetterEntry, Job, JobStatus};

const DEFAULT_KEY_PREFIX: &str = "dealbrief:jobs";

#[derive(Debug, Clone)]
pub struct RedisJobStore {
    client: Arc<redis::Client>,
    prefix: String,
}

impl RedisJobStore {
    /// Connect to Redis at `redis_url` (e.g. `redis://localhost:6379`).
    pub fn new(
        redis_url: impl AsRef<str>,
        key_prefix: Option<String>,
    ) -> Result<Self, JobStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| JobStoreError::Storage(format!("redis connection error: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            prefix: key_prefix.unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
        })
    }

    fn conn(&self) -> Result<redis::Connection, JobStoreError> {
        self.client
            .get_connection()
            .map_err(|e| JobStoreError::Storage(format!("redis connection error: {e}")))
    }

    fn job_key(&self, task_id: TaskId) -> String {
        format!("{}:job:{}", self.prefix, task_id)
    }

    fn ready_key(&self) -> String {
        format!("{}:ready", self.prefix)
    }

    fn running_key(&self) -> String {
        format!("{}:running", self.prefix)
    }

    fn completed_key(&self) -> String {
        format!("{}:completed", self.prefix)
    }

    fn dlq_key(&self) -> String {
        format!("{}:dlq", self.prefix)
    }

    /// Ready-time score: when the job may next be claimed, epoch millis.
    fn ready_score(job: &Job) -> f64 {
        job.scheduled_at.unwrap_or(job.created_at).timestamp_millis() as f64
    }

    fn store_job(&self, conn: &mut redis::Connection, job: &Job) -> Result<(), JobStoreError> {
        let payload = serde_json::to_string(job)
            .map_err(|e| JobStoreError::Storage(format!("serialization error: {e}")))?;

        let _: () = redis::cmd("SET")
            .arg(self.job_key(job.id))
            .arg(&payload)
            .query(conn)
            .map_err(|e| JobStoreError::Storage(format!("SET failed: {e}")))?;

        Ok(())
    }

    fn load_job(
        &self,
        conn: &mut redis::Connection,
        task_id: TaskId,
    ) -> Result<Option<Job>, JobStoreError> {
        let payload: Option<String> = redis::cmd("GET")
            .arg(self.job_key(task_id))
            .query(conn)
            .map_err(|e| JobStoreError::Storage(format!("GET failed: {e}")))?;

        match payload {
            Some(p) => serde_json::from_str(&p)
                .map(Some)
                .map_err(|e| JobStoreError::Storage(format!("deserialization error: {e}"))),
            None => Ok(None),
        }
    }

    /// Reflect a job's status in the ready zset and the running set.
    fn index_job(&self, conn: &mut redis::Connection, job: &Job) -> Result<(), JobStoreError> {
        match &job.status {
            JobStatus::Pending | JobStatus::Failed { .. } => {
                let _: () = redis::cmd("ZADD")
                    .arg(self.ready_key())
                    .arg(Self::ready_score(job))
                    .arg(job.id.to_string())
                    .query(conn)
                    .map_err(|e| JobStoreError::Storage(format!("ZADD failed: {e}")))?;
                let _: () = redis::cmd("SREM")
                    .arg(self.running_key())
                    .arg(job.id.to_string())
                    .query(conn)
                    .map_err(|e| JobStoreError::Storage(format!("SREM failed: {e}")))?;
            }
            JobStatus::Running => {
                let _: () = redis::cmd("SADD")
                    .arg(self.running_key())
                    .arg(job.id.to_string())
                    .query(conn)
                    .map_err(|e| JobStoreError::Storage(format!("SADD failed: {e}")))?;
            }
            JobStatus::Completed | JobStatus::DeadLettered { .. } => {
                let _: () = redis::cmd("SREM")
                    .arg(self.running_key())
                    .arg(job.id.to_string())
                    .query(conn)
                    .map_err(|e| JobStoreError::Storage(format!("SREM failed: {e}")))?;
                if matches!(job.status, JobStatus::Completed) {
                    let _: u64 = redis::cmd("INCR")
                        .arg(self.completed_key())
                        .query(conn)
                        .map_err(|e| JobStoreError::Storage(format!("INCR failed: {e}")))?;
                }
            }
        }
        Ok(())
    }
}

impl JobStore for RedisJobStore {
    fn enqueue(&self, job: Job) -> Result<TaskId, JobStoreError> {
        let mut conn = self.conn()?;

        let payload = serde_json::to_string(&job)
            .map_err(|e| JobStoreError::Storage(format!("serialization error: {e}")))?;

        // SET NX rejects a duplicate id without a prior GET round trip.
        let stored: Option<String> = redis::cmd("SET")
            .arg(self.job_key(job.id))
            .arg(&payload)
            .arg("NX")
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("SET NX failed: {e}")))?;
        if stored.is_none() {
            return Err(JobStoreError::AlreadyExists(job.id));
        }

        let _: () = redis::cmd("ZADD")
            .arg(self.ready_key())
            .arg(Self::ready_score(&job))
            .arg(job.id.to_string())
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("ZADD failed: {e}")))?;

        Ok(job.id)
    }

    fn get(&self, task_id: TaskId) -> Result<Option<Job>, JobStoreError> {
        let mut conn = self.conn()?;

        if let Some(job) = self.load_job(&mut conn, task_id)? {
            return Ok(Some(job));
        }

        // Dead-lettered jobs stay queryable so status lookups can report
        // "failed" instead of "unknown".
        let entry: Option<String> = redis::cmd("HGET")
            .arg(self.dlq_key())
            .arg(task_id.to_string())
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("HGET failed: {e}")))?;

        match entry {
            Some(p) => serde_json::from_str::<DeadLetterEntry>(&p)
                .map(|e| Some(e.job))
                .map_err(|e| JobStoreError::Storage(format!("deserialization error: {e}"))),
            None => Ok(None),
        }
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut conn = self.conn()?;

        if self.load_job(&mut conn, job.id)?.is_none() {
            return Err(JobStoreError::NotFound(job.id));
        }

        self.store_job(&mut conn, job)?;
        self.index_job(&mut conn, job)
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut conn = self.conn()?;

        // Pop the earliest-ready entry; push it back if its backoff has not
        // elapsed yet.
        let popped: Vec<(String, f64)> = redis::cmd("ZPOPMIN")
            .arg(self.ready_key())
            .arg(1)
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("ZPOPMIN failed: {e}")))?;

        let Some((id_str, score)) = popped.into_iter().next() else {
            return Ok(None);
        };

        if score > Utc::now().timestamp_millis() as f64 {
            let _: () = redis::cmd("ZADD")
                .arg(self.ready_key())
                .arg(score)
                .arg(&id_str)
                .query(&mut conn)
                .map_err(|e| JobStoreError::Storage(format!("ZADD failed: {e}")))?;
            return Ok(None);
        }

        let task_id = TaskId::from_str(&id_str)
            .map_err(|e| JobStoreError::Storage(format!("corrupt ready entry {id_str}: {e}")))?;

        let Some(mut job) = self.load_job(&mut conn, task_id)? else {
            // Ready entry without a job body; drop it and carry on.
            warn!(%task_id, "ready entry had no job body");
            return Ok(None);
        };

        job.mark_running();
        self.store_job(&mut conn, &job)?;
        self.index_job(&mut conn, &job)?;

        Ok(Some(job))
    }

    fn dead_letter(&self, mut job: Job, reason: String) -> Result<(), JobStoreError> {
        let mut conn = self.conn()?;

        job.status = JobStatus::DeadLettered {
            error: reason.clone(),
            attempts: job.attempt,
        };
        job.updated_at = Utc::now();

        let entry = DeadLetterEntry::new(job, reason);
        let payload = serde_json::to_string(&entry)
            .map_err(|e| JobStoreError::Storage(format!("serialization error: {e}")))?;

        let _: () = redis::cmd("HSET")
            .arg(self.dlq_key())
            .arg(entry.job.id.to_string())
            .arg(&payload)
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("HSET failed: {e}")))?;

        let _: () = redis::cmd("DEL")
            .arg(self.job_key(entry.job.id))
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("DEL failed: {e}")))?;
        let _: () = redis::cmd("ZREM")
            .arg(self.ready_key())
            .arg(entry.job.id.to_string())
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("ZREM failed: {e}")))?;
        let _: () = redis::cmd("SREM")
            .arg(self.running_key())
            .arg(entry.job.id.to_string())
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("SREM failed: {e}")))?;

        Ok(())
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let mut conn = self.conn()?;

        let payloads: Vec<String> = redis::cmd("HVALS")
            .arg(self.dlq_key())
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("HVALS failed: {e}")))?;

        let mut entries = Vec::with_capacity(payloads.len());
        for p in payloads {
            let entry: DeadLetterEntry = serde_json::from_str(&p)
                .map_err(|e| JobStoreError::Storage(format!("deserialization error: {e}")))?;
            entries.push(entry);
        }

        entries.sort_by_key(|e| e.dead_lettered_at);
        entries.truncate(limit);
        Ok(entries)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        let mut conn = self.conn()?;
        let now = Utc::now().timestamp_millis() as f64;

        let pending: usize = redis::cmd("ZCOUNT")
            .arg(self.ready_key())
            .arg("-inf")
            .arg(now)
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("ZCOUNT failed: {e}")))?;

        let scheduled: usize = redis::cmd("ZCOUNT")
            .arg(self.ready_key())
            .arg(format!("({now}"))
            .arg("+inf")
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("ZCOUNT failed: {e}")))?;

        let running: usize = redis::cmd("SCARD")
            .arg(self.running_key())
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("SCARD failed: {e}")))?;

        let completed: Option<usize> = redis::cmd("GET")
            .arg(self.completed_key())
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("GET failed: {e}")))?;

        let dead_lettered: usize = redis::cmd("HLEN")
            .arg(self.dlq_key())
            .query(&mut conn)
            .map_err(|e| JobStoreError::Storage(format!("HLEN failed: {e}")))?;

        Ok(JobStats {
            pending,
            running,
            scheduled,
            completed: completed.unwrap_or(0),
            dead_lettered,
        })
    }
}
