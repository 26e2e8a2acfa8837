//! Background task queue
//!
//! Detached work (locale propagation cycles) is submitted here instead of
//! being spawned ad hoc. A single worker owns every running job, logs job
//! failures and panics, and never reports them back to the submitter.

use crate::error::{SyncError, SyncResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

type Job = Pin<Box<dyn Future<Output = SyncResult<()>> + Send + 'static>>;

enum Command {
    Run { name: String, job: Job },
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Counters describing what the worker has processed so far
#[derive(Debug, Default)]
pub struct QueueStats {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl QueueStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }
}

/// Handle for submitting detached jobs. Cheap to clone.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Command>,
    stats: Arc<QueueStats>,
}

impl TaskQueue {
    /// Start the worker on the current tokio runtime.
    pub fn start() -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(QueueStats::default());
        let worker = tokio::spawn(run_worker(rx, stats.clone()));
        (Self { tx, stats }, worker)
    }

    /// Submit a job. Never blocks and never awaits the job; the job starts
    /// once the worker picks it up, after the caller has moved on.
    pub fn submit<F>(&self, name: impl Into<String>, job: F) -> SyncResult<()>
    where
        F: Future<Output = SyncResult<()>> + Send + 'static,
    {
        let name = name.into();
        self.tx
            .send(Command::Run {
                name: name.clone(),
                job: Box::pin(job),
            })
            .map_err(|_| SyncError::Queue(format!("queue closed, dropped job {}", name)))?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Wait until every job submitted before this call has finished.
    pub async fn flush(&self) -> SyncResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(done_tx))
            .map_err(|_| SyncError::Queue("queue closed".to_string()))?;
        done_rx
            .await
            .map_err(|_| SyncError::Queue("worker stopped before flush completed".to_string()))
    }

    /// Stop accepting jobs, let the queued and running ones finish, and stop
    /// the worker.
    pub async fn shutdown(&self) -> SyncResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(done_tx))
            .map_err(|_| SyncError::Queue("queue already closed".to_string()))?;
        done_rx
            .await
            .map_err(|_| SyncError::Queue("worker stopped before shutdown completed".to_string()))
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Command>, stats: Arc<QueueStats>) {
    let mut jobs: JoinSet<(String, SyncResult<()>)> = JoinSet::new();
    debug!("Task queue worker started");

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Run { name, job }) => {
                    jobs.spawn(async move { (name, job.await) });
                }
                Some(Command::Flush(done)) => {
                    drain(&mut jobs, &stats).await;
                    let _ = done.send(());
                }
                Some(Command::Shutdown(done)) => {
                    rx.close();
                    // Jobs queued before the shutdown request still run.
                    while let Some(command) = rx.recv().await {
                        match command {
                            Command::Run { name, job } => {
                                jobs.spawn(async move { (name, job.await) });
                            }
                            Command::Flush(waiter) | Command::Shutdown(waiter) => {
                                let _ = waiter.send(());
                            }
                        }
                    }
                    drain(&mut jobs, &stats).await;
                    info!("Task queue shut down");
                    let _ = done.send(());
                    return;
                }
                None => {
                    drain(&mut jobs, &stats).await;
                    debug!("Task queue senders dropped, worker exiting");
                    return;
                }
            },
            Some(outcome) = jobs.join_next(), if !jobs.is_empty() => {
                record(outcome, &stats);
            }
        }
    }
}

async fn drain(jobs: &mut JoinSet<(String, SyncResult<()>)>, stats: &QueueStats) {
    while let Some(outcome) = jobs.join_next().await {
        record(outcome, stats);
    }
}

fn record(outcome: Result<(String, SyncResult<()>), JoinError>, stats: &QueueStats) {
    match outcome {
        Ok((name, Ok(()))) => {
            stats.succeeded.fetch_add(1, Ordering::Relaxed);
            debug!("Background job {} finished", name);
        }
        Ok((name, Err(e))) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            error!("Background job {} failed: {}", name, e);
        }
        Err(e) if e.is_panic() => {
            stats.panicked.fetch_add(1, Ordering::Relaxed);
            error!("Background job panicked: {}", e);
        }
        Err(e) => {
            warn!("Background job cancelled: {}", e);
        }
    }
}
