//! Standalone worker: claims jobs from Redis and executes them against
//! Postgres. Run one process per desired unit of parallelism.

use std::sync::Arc;

use dealbrief_ai::GroqClient;
use dealbrief_infra::jobs::{JobExecutor, JobExecutorConfig, JobKind, JobStore, RedisJobStore};
use dealbrief_infra::lifecycle::JobLifecycle;
use dealbrief_infra::record_store::{PostgresRecordStore, RecordStore};
use sqlx::PgPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dealbrief_observability::init();

    let config = dealbrief_api::config::Config::from_env()?;

    let pool = PgPool::connect(config.database_url()?).await?;
    let record_store = PostgresRecordStore::new(pool);
    record_store.migrate().await?;

    let records: Arc<dyn RecordStore> = Arc::new(record_store);
    let jobs: Arc<dyn JobStore> = Arc::new(RedisJobStore::new(config.redis_url()?, None)?);
    let llm = Arc::new(GroqClient::from_env());

    let lifecycle = Arc::new(JobLifecycle::new(records, llm));

    let mut executor = JobExecutor::new(jobs);
    executor.register_handler(JobKind::TranscriptInsight.type_name(), lifecycle.clone());
    executor.register_handler(JobKind::LinkedInIcebreaker.type_name(), lifecycle);

    let worker_name =
        std::env::var("WORKER_NAME").unwrap_or_else(|_| "dealbrief-worker".to_string());
    let handle = executor.spawn(JobExecutorConfig::default().with_name(worker_name));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    handle.shutdown().await;

    Ok(())
}
