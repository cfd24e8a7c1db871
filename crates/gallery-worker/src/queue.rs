//! Cleanup queue: worker pool, retry, and submission.
//!
//! Jobs live in memory. A failed job is re-queued after a backoff delay, so
//! delivery is at-least-once for as long as the process runs.
//!
//! Shutdown: [`CleanupQueue::shutdown`] stops the pool from taking new jobs; it
//! does not wait for in-flight jobs.

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use crate::context::CleanupHandler;
use crate::job::CleanupJob;

/// Maximum number of backoff units before retrying a failed job.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Computes backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: u32) -> u64 {
    2_u64
        .saturating_pow(retry_count)
        .min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Clone, Debug)]
pub struct CleanupQueueConfig {
    pub max_workers: usize,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub job_timeout_secs: u64,
    /// Length of one backoff step.
    pub backoff_unit: Duration,
}

impl Default for CleanupQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            max_retries: 5,
            job_timeout_secs: 30,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Snapshot of queue activity since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
}

#[derive(Clone)]
pub struct CleanupQueue {
    job_tx: mpsc::UnboundedSender<CleanupJob>,
    shutdown_tx: mpsc::Sender<()>,
    counters: Arc<Counters>,
}

impl CleanupQueue {
    /// Create the queue and spawn its worker pool on the current runtime.
    pub fn new(config: CleanupQueueConfig, handler: Arc<dyn CleanupHandler>) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let counters = Arc::new(Counters::default());

        tokio::spawn(Self::worker_pool(
            config,
            handler,
            job_rx,
            job_tx.clone(),
            shutdown_rx,
            counters.clone(),
        ));

        Self {
            job_tx,
            shutdown_tx,
            counters,
        }
    }

    /// Hand a job to the worker pool. Never waits on the pool.
    #[tracing::instrument(skip(self, job), fields(job.id = %job.id, picture.id = %job.picture_id))]
    pub fn submit(&self, job: CleanupJob) -> Result<Uuid> {
        let id = job.id;
        let urls = job.urls.len();
        self.job_tx
            .send(job)
            .map_err(|_| anyhow::anyhow!("Cleanup worker pool is not running"))?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        tracing::info!(job_id = %id, urls = urls, "Cleanup job submitted");
        Ok(id)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
        }
    }

    async fn worker_pool(
        config: CleanupQueueConfig,
        handler: Arc<dyn CleanupHandler>,
        mut job_rx: mpsc::UnboundedReceiver<CleanupJob>,
        requeue_tx: mpsc::UnboundedSender<CleanupJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
        counters: Arc<Counters>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            max_retries = config.max_retries,
            "Cleanup worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cleanup worker pool shutting down");
                    break;
                }
                maybe_job = job_rx.recv() => {
                    let Some(job) = maybe_job else { break };
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let handler = handler.clone();
                    let config = config.clone();
                    let requeue_tx = requeue_tx.clone();
                    let counters = counters.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        Self::process_job(job, handler, &config, requeue_tx, &counters).await;
                    });
                }
            }
        }

        tracing::info!("Cleanup worker pool stopped");
    }

    #[tracing::instrument(skip_all, fields(job.id = %job.id, picture.id = %job.picture_id, attempt = job.attempt))]
    async fn process_job(
        mut job: CleanupJob,
        handler: Arc<dyn CleanupHandler>,
        config: &CleanupQueueConfig,
        requeue_tx: mpsc::UnboundedSender<CleanupJob>,
        counters: &Counters,
    ) {
        let timeout = Duration::from_secs(config.job_timeout_secs);
        let error = match tokio::time::timeout(timeout, handler.handle_cleanup(&job)).await {
            Ok(Ok(outcome)) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(?outcome, "Cleanup job completed");
                return;
            }
            Ok(Err(e)) => e,
            Err(_) => anyhow::anyhow!(
                "Cleanup job timed out after {} seconds",
                config.job_timeout_secs
            ),
        };

        if job.attempt >= config.max_retries {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                error = %error,
                attempts = job.attempt + 1,
                urls = ?job.urls,
                "Cleanup job failed after max retries"
            );
            return;
        }

        let backoff = config.backoff_unit * compute_retry_backoff_seconds(job.attempt) as u32;
        job.attempt += 1;
        counters.retried.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            error = %error,
            retry_count = job.attempt,
            backoff_ms = backoff.as_millis() as u64,
            "Cleanup job failed, scheduling retry"
        );

        tokio::spawn(async move {
            sleep(backoff).await;
            if requeue_tx.send(job).is_err() {
                tracing::warn!("Cleanup worker pool stopped before retry could be queued");
            }
        });
    }

    /// Signals the worker pool to stop taking jobs.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating cleanup queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}
