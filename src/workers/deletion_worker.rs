//! The deletion consumer and its per-entity handlers.
//!
//! Exactly one consumer drains the queue, so handler execution is
//! serialized: two tasks touching overlapping folder subtrees can never
//! race. Each handler runs its own metadata transaction, treats an absent
//! target as already-cleaned, and swallows its failures; a bad task must
//! never stop the loop, and the scanner re-enqueues anything still
//! discoverable.
//!
//! Object-store mutations deliberately run after the metadata commit:
//! metadata is authoritative, and a failed store call costs at worst an
//! orphaned object, never stale metadata.

use std::sync::Arc;

use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::file::{File, FileStatus};
use crate::services::folders_service::collect_folder_tree;
use crate::storage::ObjectStore;
use crate::workers::task_queue::{DeletionTask, TaskKind, TaskReceiver};

pub struct DeletionWorker {
    pool: SqlitePool,
    store: Arc<dyn ObjectStore>,
}

impl DeletionWorker {
    pub fn new(pool: SqlitePool, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, store }
    }

    pub async fn run(self, mut rx: TaskReceiver, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                task = rx.recv() => match task {
                    Some(task) => self.handle(task).await,
                    None => break,
                },
            }
        }
        tracing::info!("deletion worker stopped");
    }

    /// Dispatch one task; failures are logged, never propagated.
    pub async fn handle(&self, task: DeletionTask) {
        let result = match task.kind {
            TaskKind::File => self.handle_file(task.target_id).await,
            TaskKind::Folder => self.handle_folder(task.target_id).await,
            TaskKind::User => self.handle_user(task.target_id).await,
        };

        if let Err(err) = result {
            tracing::error!(
                target_id = %task.target_id,
                kind = ?task.kind,
                "deletion task failed: {err}"
            );
        }
    }

    /// Remove a file row, then clean up its object: abort the multipart
    /// session if the upload never finished, delete the object otherwise.
    async fn handle_file(&self, file_id: Uuid) -> sqlx::Result<()> {
        let mut tx = self.pool.begin().await?;

        let file: Option<File> = sqlx::query_as(
            "SELECT id, name, encrypted_key, key_encrypted_by_root, storage_key, upload_id,
                    status, content_type, size, parent_folder_id, owner_id, created_at
             FROM files WHERE id = ?",
        )
        .bind(file_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(file) = file else {
            tracing::debug!(%file_id, "file already cleaned");
            return Ok(());
        };

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let cleanup = if file.status == FileStatus::Pending {
            self.store
                .abort_multipart(&file.storage_key, &file.upload_id)
                .await
        } else {
            self.store.delete_object(&file.storage_key).await
        };
        if let Err(err) = cleanup {
            // orphaned object; operational reconciliation is out of band
            tracing::warn!(key = %file.storage_key, "object cleanup failed: {err}");
        }

        tracing::info!(%file_id, "file deletion finished");
        Ok(())
    }

    /// Soft-mark every file in the folder's subtree, then remove the
    /// target row (the foreign key cascade takes the descendant folder
    /// rows with it). The marked files are picked up file-by-file in later
    /// sweeps, keeping any single transaction bounded. The ledger was
    /// already settled by the owner-facing delete; no accounting here.
    async fn handle_folder(&self, folder_id: Uuid) -> sqlx::Result<()> {
        let mut tx = self.pool.begin().await?;

        let subtree = collect_folder_tree(&mut *tx, folder_id, false).await?;

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE files SET status = ");
        builder.push_bind(FileStatus::Deleted);
        builder.push(" WHERE parent_folder_id IN (");
        let mut separated = builder.separated(", ");
        for id in &subtree {
            separated.push_bind(*id);
        }
        builder.push(")");
        builder.build().execute(&mut *tx).await?;

        sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(folder_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%folder_id, "folder deletion finished");
        Ok(())
    }

    /// Soft-mark the user's files (not cascaded, so object cleanup must
    /// remain possible once the owner row is gone), then remove the user
    /// row; folders, shared links and ledger rows go with it by cascade.
    async fn handle_user(&self, user_id: Uuid) -> sqlx::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE files SET status = ? WHERE owner_id = ?")
            .bind(FileStatus::Deleted)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%user_id, "user deletion finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{folders_service::FoldersService, usage_service};
    use crate::storage::memory::MemoryStore;
    use crate::test_support::{
        backdate_file, drain_queue, seed_completed_file, seed_folder, seed_pending_file,
        seed_user, test_pool, test_queue,
    };
    use crate::workers::cleanup_worker::CleanupWorker;

    const MIB: i64 = 1024 * 1024;

    fn worker(pool: &SqlitePool, store: &Arc<MemoryStore>) -> DeletionWorker {
        DeletionWorker::new(pool.clone(), store.clone() as Arc<dyn ObjectStore>)
    }

    async fn file_exists(pool: &SqlitePool, id: Uuid) -> bool {
        sqlx::query_as::<_, (Uuid,)>("SELECT id FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .unwrap()
            .is_some()
    }

    #[tokio::test]
    async fn file_handler_is_a_noop_on_absent_rows() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::new());
        let worker = worker(&pool, &store);

        let ghost = DeletionTask::new(Uuid::new_v4(), TaskKind::File);
        worker.handle(ghost).await;
        worker.handle(ghost).await;

        assert!(store.aborted.lock().unwrap().is_empty());
        assert!(store.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_handler_aborts_pending_and_deletes_completed() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::new());
        let worker = worker(&pool, &store);
        let owner = seed_user(&pool, true).await;

        let pending = seed_pending_file(&pool, owner, None, "image/png", MIB).await;
        worker.handle(DeletionTask::new(pending, TaskKind::File)).await;
        assert!(!file_exists(&pool, pending).await);
        assert_eq!(store.aborted.lock().unwrap().len(), 1);

        let completed = seed_completed_file(&pool, owner, None, "image/png", MIB).await;
        worker.handle(DeletionTask::new(completed, TaskKind::File)).await;
        assert!(!file_exists(&pool, completed).await);
        assert_eq!(store.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn folder_handler_marks_subtree_files_and_cascades_rows() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::new());
        let worker = worker(&pool, &store);
        let owner = seed_user(&pool, true).await;

        let root = seed_folder(&pool, owner, None).await;
        let sub = seed_folder(&pool, owner, Some(root)).await;
        let in_root = seed_completed_file(&pool, owner, Some(root), "image/png", MIB).await;
        let in_sub = seed_completed_file(&pool, owner, Some(sub), "video/mp4", MIB).await;
        let elsewhere = seed_completed_file(&pool, owner, None, "image/png", MIB).await;

        worker.handle(DeletionTask::new(root, TaskKind::Folder)).await;

        let folders: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM folders")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(folders.is_empty());

        for id in [in_root, in_sub] {
            let (status,): (FileStatus,) =
                sqlx::query_as("SELECT status FROM files WHERE id = ?")
                    .bind(id)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(status, FileStatus::Deleted);
        }
        let (status,): (FileStatus,) =
            sqlx::query_as("SELECT status FROM files WHERE id = ?")
                .bind(elsewhere)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, FileStatus::Completed);

        // physical cleanup stays deferred to the file sweeps
        assert!(store.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_handler_marks_files_and_cascades_satellites() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::new());
        let worker = worker(&pool, &store);
        let owner = seed_user(&pool, true).await;

        let folder = seed_folder(&pool, owner, None).await;
        let file = seed_completed_file(&pool, owner, Some(folder), "image/png", MIB).await;

        worker.handle(DeletionTask::new(owner, TaskKind::User)).await;

        let users: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(owner)
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(users.is_empty());

        let folders: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM folders")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(folders.is_empty());

        assert!(usage_service::summary(&pool, owner).await.unwrap().is_empty());

        // the file row survives with owner and parent cleared, still
        // reachable by the file sweep for object cleanup
        let (status, owner_id, parent): (FileStatus, Option<Uuid>, Option<Uuid>) =
            sqlx::query_as(
                "SELECT status, owner_id, parent_folder_id FROM files WHERE id = ?",
            )
            .bind(file)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, FileStatus::Deleted);
        assert_eq!(owner_id, None);
        assert_eq!(parent, None);
    }

    /// Owner deletes a folder holding a completed 10 MiB file: the ledger
    /// settles immediately, the handler soft-deletes the file and removes
    /// the folder, and the next sweep finishes the file off.
    #[tokio::test]
    async fn folder_delete_settles_end_to_end() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::new());
        let (queue, mut rx) = test_queue();
        let folders = FoldersService::new(pool.clone(), queue.clone());
        let scanner = CleanupWorker::new(pool.clone(), queue.clone());
        let worker = worker(&pool, &store);
        let owner = seed_user(&pool, true).await;

        let folder = seed_folder(&pool, owner, None).await;
        let file = seed_completed_file(&pool, owner, Some(folder), "image/png", 10 * MIB).await;

        folders.delete_folder(owner, folder).await.unwrap();
        let totals = usage_service::summary(&pool, owner).await.unwrap();
        assert_eq!(
            totals.get(&crate::models::file::ContentCategory::Image),
            Some(&0)
        );

        for task in drain_queue(&mut rx) {
            worker.handle(task).await;
        }

        let folders_left: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM folders")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(folders_left.is_empty());

        // the file is now soft-deleted; the sweep rediscovers it
        scanner.sweep_once().await.unwrap();
        for task in drain_queue(&mut rx) {
            worker.handle(task).await;
        }

        assert!(!file_exists(&pool, file).await);
        assert_eq!(store.deleted.lock().unwrap().len(), 1);
    }

    /// An upload initiated and never completed is reclaimed once it falls
    /// past the staleness window: the session is aborted and the row goes.
    #[tokio::test]
    async fn stale_upload_is_reclaimed_by_the_sweep() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::new());
        let (queue, mut rx) = test_queue();
        let scanner = CleanupWorker::new(pool.clone(), queue.clone());
        let worker = worker(&pool, &store);
        let owner = seed_user(&pool, true).await;

        let stale = seed_pending_file(&pool, owner, None, "image/png", MIB).await;
        backdate_file(&pool, stale, 4).await;

        scanner.sweep_once().await.unwrap();
        for task in drain_queue(&mut rx) {
            worker.handle(task).await;
        }

        assert!(!file_exists(&pool, stale).await);
        assert_eq!(store.aborted.lock().unwrap().len(), 1);
        assert!(store.deleted.lock().unwrap().is_empty());
    }
}
