//! File reads and owner-initiated file deletes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::models::{
    file::{ContentCategory, File, FileStatus},
    shared_link::SharedItemType,
};
use crate::services::folders_service::{collect_folder_tree, fetch_link};
use crate::services::usage_service;
use crate::storage::{ObjectStore, READ_URL_TTL};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: Uuid,
    pub name: String,
    pub encrypted_key: String,
    /// Only present for the owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_encrypted_by_root: Option<String>,
    pub content_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    /// Presigned read URL for the ciphertext payload.
    pub url: String,
}

#[derive(Clone)]
pub struct FilesService {
    pool: SqlitePool,
    store: Arc<dyn ObjectStore>,
}

impl FilesService {
    pub fn new(pool: SqlitePool, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, store }
    }

    /// Fetch a completed file, either as its owner or through a shared
    /// link that covers it.
    pub async fn get_file(
        &self,
        file_id: Uuid,
        viewer_id: Option<Uuid>,
        share_id: Option<Uuid>,
    ) -> ApiResult<FileResponse> {
        if let Some(share_id) = share_id {
            let mut conn = self.pool.acquire().await?;
            let file = fetch_completed_file(&mut conn, file_id).await?;
            let Some(file) = file else {
                return Err(ApiError::Forbidden(
                    "You're not allowed to view this file.".into(),
                ));
            };
            if !share_grants_file(&mut conn, share_id, &file).await? {
                return Err(ApiError::Forbidden(
                    "You're not allowed to view this file.".into(),
                ));
            }
            drop(conn);

            return self.file_response(file, false).await;
        }

        let viewer_id = viewer_id
            .ok_or_else(|| ApiError::Forbidden("You're not allowed to view this file".into()))?;

        let file: Option<File> = sqlx::query_as(
            "SELECT id, name, encrypted_key, key_encrypted_by_root, storage_key, upload_id,
                    status, content_type, size, parent_folder_id, owner_id, created_at
             FROM files WHERE id = ? AND owner_id = ? AND status = ?",
        )
        .bind(file_id)
        .bind(viewer_id)
        .bind(FileStatus::Completed)
        .fetch_optional(&self.pool)
        .await?;

        let file = file.ok_or_else(|| ApiError::NotFound("File not found.".into()))?;
        self.file_response(file, true).await
    }

    /// Owner-initiated file delete: debit the ledger and remove the row in
    /// one transaction, then delete the object best-effort. A failed store
    /// delete leaves an orphaned object, never stale metadata.
    pub async fn delete_file(&self, owner_id: Uuid, file_id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        let file: Option<File> = sqlx::query_as(
            "SELECT id, name, encrypted_key, key_encrypted_by_root, storage_key, upload_id,
                    status, content_type, size, parent_folder_id, owner_id, created_at
             FROM files WHERE id = ? AND owner_id = ? AND status = ?",
        )
        .bind(file_id)
        .bind(owner_id)
        .bind(FileStatus::Completed)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(file) = file else {
            return Err(ApiError::NotFound(
                "File not found or upload was not completed.".into(),
            ));
        };

        let category = ContentCategory::from_mime(&file.content_type);
        usage_service::charge(&mut *tx, owner_id, category, -file.size).await?;

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if let Err(err) = self.store.delete_object(&file.storage_key).await {
            tracing::warn!(
                key = %file.storage_key,
                "object delete failed after metadata removal: {err}"
            );
        }

        Ok(())
    }

    async fn file_response(&self, file: File, is_owner: bool) -> ApiResult<FileResponse> {
        let url = self.store.presign_read(&file.storage_key, READ_URL_TTL).await?;
        Ok(FileResponse {
            id: file.id,
            name: file.name,
            encrypted_key: file.encrypted_key,
            key_encrypted_by_root: is_owner.then_some(file.key_encrypted_by_root),
            content_type: file.content_type,
            size: file.size,
            created_at: file.created_at,
            url,
        })
    }
}

async fn fetch_completed_file(
    conn: &mut SqliteConnection,
    file_id: Uuid,
) -> sqlx::Result<Option<File>> {
    sqlx::query_as(
        "SELECT id, name, encrypted_key, key_encrypted_by_root, storage_key, upload_id,
                status, content_type, size, parent_folder_id, owner_id, created_at
         FROM files WHERE id = ? AND status = ?",
    )
    .bind(file_id)
    .bind(FileStatus::Completed)
    .fetch_optional(&mut *conn)
    .await
}

/// True if the shared link grants read access to this file: either the
/// link targets the file directly, or it targets a folder whose active
/// subtree contains the file's parent.
async fn share_grants_file(
    conn: &mut SqliteConnection,
    share_id: Uuid,
    file: &File,
) -> ApiResult<bool> {
    let Some(link) = fetch_link(conn, share_id).await? else {
        return Ok(false);
    };

    match link.item_type {
        SharedItemType::File => Ok(link.item_id == file.id),
        SharedItemType::Folder => {
            let Some(parent_id) = file.parent_folder_id else {
                return Ok(false);
            };
            let root_active: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM folders WHERE id = ? AND status = ?")
                    .bind(link.item_id)
                    .bind(crate::models::folder::FolderStatus::Active)
                    .fetch_optional(&mut *conn)
                    .await?;
            if root_active.is_none() {
                return Ok(false);
            }

            let tree = collect_folder_tree(conn, link.item_id, true).await?;
            Ok(tree.contains(&parent_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use crate::test_support::{seed_completed_file, seed_folder, seed_user, test_pool};

    const MIB: i64 = 1024 * 1024;

    #[tokio::test]
    async fn owner_read_includes_root_key_and_url() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::new());
        let service = FilesService::new(pool.clone(), store);
        let owner = seed_user(&pool, true).await;
        let file = seed_completed_file(&pool, owner, None, "image/png", MIB).await;

        let resp = service.get_file(file, Some(owner), None).await.unwrap();
        assert!(resp.key_encrypted_by_root.is_some());
        assert!(resp.url.contains("read=1"));

        let err = service.get_file(file, Some(Uuid::new_v4()), None).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = service.get_file(file, None, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn shared_folder_link_reaches_nested_file() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::new());
        let service = FilesService::new(pool.clone(), store);
        let owner = seed_user(&pool, true).await;

        let shared_root = seed_folder(&pool, owner, None).await;
        let nested = seed_folder(&pool, owner, Some(shared_root)).await;
        let inside = seed_completed_file(&pool, owner, Some(nested), "image/png", MIB).await;
        let outside = seed_completed_file(&pool, owner, None, "image/png", MIB).await;

        let share_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO shared_links (id, owner_id, item_id, item_type, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(share_id)
        .bind(owner)
        .bind(shared_root)
        .bind(SharedItemType::Folder)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let resp = service.get_file(inside, None, Some(share_id)).await.unwrap();
        assert!(resp.key_encrypted_by_root.is_none());

        let err = service.get_file(outside, None, Some(share_id)).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn delete_debits_ledger_removes_row_and_object() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::new());
        let service = FilesService::new(pool.clone(), store.clone());
        let owner = seed_user(&pool, true).await;
        let file = seed_completed_file(&pool, owner, None, "video/mp4", 8 * MIB).await;

        service.delete_file(owner, file).await.unwrap();

        let totals = usage_service::summary(&pool, owner).await.unwrap();
        assert_eq!(totals.get(&ContentCategory::Video), Some(&0));

        let remaining: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM files WHERE id = ?")
            .bind(file)
            .fetch_optional(&pool)
            .await
            .unwrap();
        assert!(remaining.is_none());

        assert_eq!(store.deleted.lock().unwrap().len(), 1);

        let err = service.delete_file(owner, file).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
