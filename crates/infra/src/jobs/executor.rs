//! Job executor with retry and backoff logic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::store::JobStore;
use super::types::{Job, JobResult, JobStatus};

/// Handler invoked for each claimed job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> JobResult;

    /// Called after `handle` was aborted at the hard time limit. The aborted
    /// future never resumes, so any external state it was mid-way through
    /// updating must be reconciled here.
    async fn on_timeout(&self, _job: &Job) {}
}

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// How often to poll for new jobs when the queue is empty.
    pub poll_interval: Duration,
    /// Name for logging and the queue-stats endpoint.
    pub name: String,
    /// Hard wall-clock ceiling per attempt; exceeding it fails the attempt.
    pub hard_time_limit: Duration,
    /// Soft ceiling; exceeding it only logs a warning.
    pub soft_time_limit: Duration,
    /// Jobs handled before the per-run counter resets.
    pub max_jobs_per_run: u64,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            name: "job-executor".to_string(),
            hard_time_limit: Duration::from_secs(300),
            soft_time_limit: Duration::from_secs(240),
            max_jobs_per_run: 1000,
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Handle to a spawned executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    name: String,
    shutdown: mpsc::Sender<()>,
    join: Option<tokio::task::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutorHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request graceful shutdown and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(()).await;
        if let Some(j) = self.join.take() {
            let _ = j.await;
        }
    }

    /// Current executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_dead_lettered: u64,
    pub current_running: usize,
    pub uptime_secs: u64,
}

/// Background job executor.
///
/// Polls a job store for ready jobs, executes them one at a time with the
/// registered handlers, and applies retry/dead-letter handling. One job in
/// flight per executor; run several executors for parallelism.
pub struct JobExecutor<S: JobStore> {
    store: S,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl<S: JobStore + 'static> JobExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under a kind name (`"*"` matches any kind).
    pub fn register_handler(&mut self, kind_name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(kind_name.into(), handler);
    }

    fn get_handler(&self, kind_name: &str) -> Option<&Arc<dyn JobHandler>> {
        self.handlers
            .get(kind_name)
            .or_else(|| self.handlers.get("*"))
    }

    /// Spawn the executor loop on the current runtime.
    pub fn spawn(self, config: JobExecutorConfig) -> JobExecutorHandle
    where
        S: Send,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));
        let stats_clone = stats.clone();

        let name = config.name.clone();
        let join = tokio::spawn(async move {
            executor_loop(self, config, shutdown_rx, stats_clone).await;
        });

        JobExecutorHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }

    /// Execute a single already-claimed job (claiming marked it `Running`).
    ///
    /// Applies the hard time limit, persists the outcome, and dead-letters
    /// the job when its attempts are exhausted.
    pub async fn execute_one(
        &self,
        job: &mut Job,
        config: &JobExecutorConfig,
    ) -> Result<(), String> {
        let handler = self
            .get_handler(job.kind.type_name())
            .ok_or_else(|| format!("no handler for job kind: {}", job.kind))?
            .clone();

        let started = Utc::now();
        let clock = Instant::now();

        let result = match tokio::time::timeout(config.hard_time_limit, handler.handle(job)).await {
            Ok(r) => r,
            Err(_) => {
                handler.on_timeout(job).await;
                JobResult::Failure(format!(
                    "attempt exceeded hard time limit of {}s",
                    config.hard_time_limit.as_secs()
                ))
            }
        };

        let elapsed = clock.elapsed();
        if elapsed > config.soft_time_limit {
            warn!(
                task_id = %job.id,
                elapsed_secs = elapsed.as_secs(),
                soft_limit_secs = config.soft_time_limit.as_secs(),
                "job exceeded soft time limit"
            );
        }

        match result {
            JobResult::Success(output) => {
                job.mark_completed(started, output);
                self.store.update(job).map_err(|e| e.to_string())?;
                debug!(task_id = %job.id, "job completed successfully");
                Ok(())
            }
            JobResult::Failure(error) => {
                job.mark_failed(error.clone(), started);
                self.store.update(job).map_err(|e| e.to_string())?;

                if matches!(job.status, JobStatus::DeadLettered { .. }) {
                    warn!(task_id = %job.id, error = %error, "job dead-lettered");
                    self.store
                        .dead_letter(job.clone(), error.clone())
                        .map_err(|e| e.to_string())?;
                }

                Err(error)
            }
        }
    }
}

async fn executor_loop<S: JobStore + 'static>(
    executor: JobExecutor<S>,
    config: JobExecutorConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<ExecutorStats>>,
) {
    info!(executor = %config.name, "job executor started");
    let start_time = Instant::now();
    let mut jobs_this_run: u64 = 0;

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        {
            let mut s = stats.lock().unwrap();
            s.uptime_secs = start_time.elapsed().as_secs();
        }

        if jobs_this_run >= config.max_jobs_per_run {
            info!(
                executor = %config.name,
                jobs = jobs_this_run,
                "job cap reached, resetting run counter"
            );
            jobs_this_run = 0;
        }

        match executor.store.claim_next() {
            Ok(Some(mut job)) => {
                debug!(
                    executor = %config.name,
                    task_id = %job.id,
                    kind = %job.kind,
                    attempt = job.attempt,
                    "claimed job"
                );

                {
                    let mut s = stats.lock().unwrap();
                    s.current_running += 1;
                }

                let result = executor.execute_one(&mut job, &config).await;
                jobs_this_run += 1;

                {
                    let mut s = stats.lock().unwrap();
                    s.current_running = s.current_running.saturating_sub(1);
                    s.jobs_processed += 1;
                    match &result {
                        Ok(()) => s.jobs_succeeded += 1,
                        Err(_) => {
                            s.jobs_failed += 1;
                            if matches!(job.status, JobStatus::DeadLettered { .. }) {
                                s.jobs_dead_lettered += 1;
                            }
                        }
                    }
                }

                if let Err(e) = result {
                    debug!(
                        executor = %config.name,
                        task_id = %job.id,
                        error = %e,
                        status = ?job.status,
                        "job execution failed"
                    );
                }
            }
            Ok(None) => {
                tokio::time::sleep(config.poll_interval).await;
            }
            Err(e) => {
                error!(executor = %config.name, error = %e, "failed to claim job");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }

    info!(executor = %config.name, "job executor stopped");
}
