//! Durable job queue over SQLite
//!
//! Implements the `JobQueue` port for enqueueing, plus the worker-side
//! claim/complete/fail operations. Delivery is at-least-once: a claim takes a
//! lease, and a job whose lease expired (worker died mid-processing) becomes
//! claimable again. Failed jobs are redelivered until `max_attempts`, then
//! parked as `failed`.

use crate::error::{GenError, GenResult};
use crate::ports::{JobAck, JobQueue};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Event name carried by generation jobs
pub const GENERATE_EVENT: &str = "song/generate";

/// How long a claimed job stays leased before it may be reclaimed
const LEASE_SECONDS: i64 = 600;

/// A claimed job
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub event: String,
    pub song_id: Uuid,
    pub payload: serde_json::Value,
    pub attempts: i64,
    pub max_attempts: i64,
}

/// `JobQueue` adapter backed by the service's SQLite database
#[derive(Clone)]
pub struct SqliteJobQueue {
    pool: SqlitePool,
    max_attempts: i64,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool, max_attempts: u32) -> Self {
        Self {
            pool,
            max_attempts: i64::from(max_attempts.max(1)),
        }
    }

    /// Claim the oldest deliverable job, if any.
    ///
    /// Deliverable means `pending`, or `running` with an expired lease. The
    /// claim increments `attempts` and renews the lease.
    pub async fn claim_next(&self) -> GenResult<Option<Job>> {
        let now = Utc::now();
        let lease_expiry = now + Duration::seconds(LEASE_SECONDS);

        let mut tx = self.pool.begin().await?;

        let candidate = sqlx::query(
            r#"
            SELECT id FROM jobs
            WHERE status = 'pending'
               OR (status = 'running' AND lease_expires_at < ?)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let job_id: i64 = match candidate {
            Some(row) => row.try_get("id")?,
            None => return Ok(None),
        };

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running', attempts = attempts + 1,
                lease_expires_at = ?, updated_at = ?
            WHERE id = ?
              AND (status = 'pending' OR (status = 'running' AND lease_expires_at < ?))
            "#,
        )
        .bind(lease_expiry)
        .bind(now)
        .bind(job_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Another worker won the claim between SELECT and UPDATE
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT id, event, song_id, payload, attempts, max_attempts FROM jobs WHERE id = ?",
        )
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let song_id_str: String = row.try_get("song_id")?;
        let payload_str: String = row.try_get("payload")?;
        let job = Job {
            id: row.try_get("id")?,
            event: row.try_get("event")?,
            song_id: Uuid::parse_str(&song_id_str)
                .map_err(|e| GenError::Persistence(format!("corrupt job song id: {e}")))?,
            payload: serde_json::from_str(&payload_str)
                .map_err(|e| GenError::Persistence(format!("corrupt job payload: {e}")))?,
            attempts: row.try_get("attempts")?,
            max_attempts: row.try_get("max_attempts")?,
        };

        tracing::debug!(job_id = job.id, song_id = %job.song_id, attempt = job.attempts, "Job claimed");
        Ok(Some(job))
    }

    /// Mark a job done. Also used for benign redelivery outcomes.
    pub async fn complete(&self, job_id: i64) -> GenResult<()> {
        sqlx::query("UPDATE jobs SET status = 'done', updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// Retryable failures go back to `pending` while attempts remain;
    /// everything else is parked as `failed`.
    pub async fn fail(&self, job: &Job, error: &str, retryable: bool) -> GenResult<()> {
        let redeliver = retryable && job.attempts < job.max_attempts;
        let status = if redeliver { "pending" } else { "failed" };

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, lease_expires_at = NULL, last_error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(error)
        .bind(Utc::now())
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        if redeliver {
            tracing::warn!(job_id = job.id, attempt = job.attempts, error, "Job failed, will redeliver");
        } else {
            tracing::error!(job_id = job.id, attempts = job.attempts, error, "Job failed terminally");
        }
        Ok(())
    }

    /// Number of jobs currently deliverable (monitoring hook)
    pub async fn pending_count(&self) -> GenResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM jobs WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn queue_song(&self, song_id: Uuid, payload: &serde_json::Value) -> GenResult<JobAck> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (event, song_id, payload, status, max_attempts, created_at, updated_at)
            VALUES (?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(GENERATE_EVENT)
        .bind(song_id.to_string())
        .bind(payload.to_string())
        .bind(self.max_attempts)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let job_id = result.last_insert_rowid();
        tracing::info!(song_id = %song_id, job_id, "Generation job enqueued");
        Ok(JobAck { job_id })
    }
}
