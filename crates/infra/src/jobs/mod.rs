//! Background job system with retry, backoff, and dead-letter handling.
//!
//! ## Design
//!
//! - Jobs carry the full input payload; the worker path never reads the
//!   record store to reconstruct it
//! - Retry policy with capped exponential backoff
//! - Dead-letter queue for jobs that exhaust their attempts
//! - Visibility into job status and queue statistics
//!
//! ## Components
//!
//! - `Job`: the queued unit of work, correlated to exactly one record
//! - `JobStore`: persistence for jobs (in-memory, or Redis behind the
//!   `redis` feature)
//! - `JobExecutor`: polls the store and runs jobs with retry logic

pub mod executor;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;
pub mod types;

pub use executor::{JobExecutor, JobExecutorConfig, JobExecutorHandle, JobHandler};
#[cfg(feature = "redis")]
pub use redis_store::RedisJobStore;
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{BackoffStrategy, DeadLetterEntry, Job, JobKind, JobResult, JobStatus, RetryPolicy};
