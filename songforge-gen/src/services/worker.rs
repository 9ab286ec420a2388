//! Generation worker loop
//!
//! Claims `song/generate` jobs from the durable queue and drives them through
//! `SongService::process`. Per-job error isolation: one failed song never
//! stops the loop. Benign redelivery outcomes (song already finished, song
//! gone) complete the job; retryable faults hand the job back to the queue's
//! redelivery policy.

use crate::db::jobs::{Job, SqliteJobQueue};
use crate::services::orchestrator::SongService;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct GenerationWorker {
    queue: SqliteJobQueue,
    service: Arc<SongService>,
    poll_interval: Duration,
}

impl GenerationWorker {
    pub fn new(queue: SqliteJobQueue, service: Arc<SongService>, poll_interval: Duration) -> Self {
        Self {
            queue,
            service,
            poll_interval,
        }
    }

    /// Run until cancelled. Sleeps `poll_interval` when the queue is empty.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Generation worker started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.queue.claim_next().await {
                Ok(Some(job)) => self.handle_job(job).await,
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!("Queue claim failed: {}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
        info!("Generation worker stopped");
    }

    /// Process one claimed job and settle it with the queue
    async fn handle_job(&self, job: Job) {
        debug!(job_id = job.id, song_id = %job.song_id, "Processing job");

        let outcome = self.service.process(job.song_id).await;
        let settle = match outcome {
            Ok(song) => {
                debug!(job_id = job.id, status = %song.status, "Job finished");
                self.queue.complete(job.id).await
            }
            Err(e) if e.is_benign_redelivery() => {
                warn!(job_id = job.id, "Benign redelivery outcome: {}", e);
                self.queue.complete(job.id).await
            }
            Err(e) => {
                let retryable = e.is_retryable();
                self.queue.fail(&job, &e.to_string(), retryable).await
            }
        };

        if let Err(e) = settle {
            // The job stays leased; the lease expiry will redeliver it
            error!(job_id = job.id, "Could not settle job with queue: {}", e);
        }
    }
}
