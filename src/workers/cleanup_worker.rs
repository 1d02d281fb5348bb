//! The periodic cleanup scanner.
//!
//! Every sweep discovers rows whose condition calls for deletion work and
//! enqueues one task per row. Discovery and action are strictly separated:
//! the scanner never mutates anything, so a crash between discovery and
//! handling only delays cleanup; the same rows are rediscovered next
//! sweep.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use sqlx::SqlitePool;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{file::FileStatus, folder::FolderStatus};
use crate::workers::task_queue::{DeletionTask, TaskKind, TaskQueue};

/// Sweep period. The first sweep runs immediately on startup.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(30 * 60);

/// Pending uploads older than this are considered abandoned.
const STALE_UPLOAD_GRACE_HOURS: i64 = 3;

/// Row cap per scan per sweep.
const SCAN_BATCH: i64 = 200;

pub struct CleanupWorker {
    pool: SqlitePool,
    queue: TaskQueue,
}

impl CleanupWorker {
    pub fn new(pool: SqlitePool, queue: TaskQueue) -> Self {
        Self { pool, queue }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(SWEEP_PERIOD);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(enqueued) => {
                            tracing::info!(enqueued, "cleanup sweep finished");
                        }
                        Err(err) => tracing::error!("cleanup sweep failed: {err}"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("cleanup scanner stopped");
    }

    /// One sweep: three bounded scans, oldest rows first, one task each.
    pub async fn sweep_once(&self) -> sqlx::Result<usize> {
        let stale_cutoff = Utc::now() - TimeDelta::hours(STALE_UPLOAD_GRACE_HOURS);

        // abandoned pending uploads and soft-deleted files
        let files: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM files
             WHERE (status = ? AND created_at <= ?) OR status = ?
             ORDER BY created_at LIMIT ?",
        )
        .bind(FileStatus::Pending)
        .bind(stale_cutoff)
        .bind(FileStatus::Deleted)
        .bind(SCAN_BATCH)
        .fetch_all(&self.pool)
        .await?;

        let folders: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM folders WHERE status = ? ORDER BY created_at LIMIT ?",
        )
        .bind(FolderStatus::Deleted)
        .bind(SCAN_BATCH)
        .fetch_all(&self.pool)
        .await?;

        // accounts that never confirmed their email
        let users: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM users WHERE email_confirmed = 0 ORDER BY id LIMIT ?",
        )
        .bind(SCAN_BATCH)
        .fetch_all(&self.pool)
        .await?;

        let tasks = files
            .into_iter()
            .map(|(id,)| DeletionTask::new(id, TaskKind::File))
            .chain(
                folders
                    .into_iter()
                    .map(|(id,)| DeletionTask::new(id, TaskKind::Folder)),
            )
            .chain(
                users
                    .into_iter()
                    .map(|(id,)| DeletionTask::new(id, TaskKind::User)),
            )
            .collect::<Vec<_>>();

        let enqueued = tasks.len();
        for task in tasks {
            self.queue.enqueue(task).await;
        }
        Ok(enqueued)
    }
}
