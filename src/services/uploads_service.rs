//! Multipart upload orchestration.
//!
//! The three-phase protocol: `initiate` reserves a Pending metadata row
//! and hands the client presigned part URLs, the client uploads ciphertext
//! parts straight to the object store, and `complete` finalizes the
//! session and flips the row to Completed. Pending rows never contribute
//! to the usage ledger; the credit happens in the same transaction as the
//! Completed flip. Abandoned sessions are reclaimed by the cleanup
//! scanner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::models::{
    file::{ContentCategory, File, FileStatus},
    folder::FolderStatus,
};
use crate::services::usage_service;
use crate::storage::{CompletedPart, ObjectStore, PART_URL_TTL, part_count};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateUploadRequest {
    /// Filename ciphertext.
    pub file_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub encrypted_key: String,
    pub key_encrypted_by_root: String,
    pub parent_folder_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateUploadResponse {
    pub file_id: Uuid,
    pub upload_id: String,
    pub key: String,
    pub urls: Vec<PresignedPartUrl>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedPartUrl {
    pub part_number: i32,
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub upload_id: String,
    pub key: String,
    pub parts: Vec<CompletedPartDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPartDto {
    pub part_number: i32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCompletedResponse {
    pub id: Uuid,
    pub name: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelUploadRequest {
    pub upload_id: String,
    pub key: String,
}

#[derive(Clone)]
pub struct UploadsService {
    pool: SqlitePool,
    store: Arc<dyn ObjectStore>,
}

impl UploadsService {
    pub fn new(pool: SqlitePool, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, store }
    }

    /// Start a multipart upload: one Pending row, one open session at the
    /// store, `ceil(size / 50 MiB)` presigned part URLs numbered from 1.
    pub async fn initiate(
        &self,
        owner_id: Uuid,
        data: InitiateUploadRequest,
    ) -> ApiResult<InitiateUploadResponse> {
        if data.file_size <= 0 {
            return Err(ApiError::Validation("File size must be greater than zero.".into()));
        }
        if data.file_name.is_empty()
            || data.content_type.is_empty()
            || data.encrypted_key.is_empty()
            || data.key_encrypted_by_root.is_empty()
        {
            return Err(ApiError::Validation(
                "File name, content type and key material are required.".into(),
            ));
        }

        if let Some(parent_id) = data.parent_folder_id {
            let parent: Option<(Uuid,)> = sqlx::query_as(
                "SELECT id FROM folders WHERE id = ? AND owner_id = ? AND status = ?",
            )
            .bind(parent_id)
            .bind(owner_id)
            .bind(FolderStatus::Active)
            .fetch_optional(&self.pool)
            .await?;
            if parent.is_none() {
                return Err(ApiError::NotFound("Parent folder not found.".into()));
            }
        }

        let file_id = Uuid::new_v4();
        let storage_key = format!("{owner_id}/{file_id}");
        let upload_id = self.store.initiate_multipart(&storage_key).await?;

        let file = File {
            id: file_id,
            name: data.file_name,
            encrypted_key: data.encrypted_key,
            key_encrypted_by_root: data.key_encrypted_by_root,
            storage_key,
            upload_id,
            status: FileStatus::Pending,
            content_type: data.content_type,
            size: data.file_size,
            parent_folder_id: data.parent_folder_id,
            owner_id: Some(owner_id),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO files (id, name, encrypted_key, key_encrypted_by_root, storage_key,
                                upload_id, status, content_type, size, parent_folder_id,
                                owner_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(file.id)
        .bind(&file.name)
        .bind(&file.encrypted_key)
        .bind(&file.key_encrypted_by_root)
        .bind(&file.storage_key)
        .bind(&file.upload_id)
        .bind(file.status)
        .bind(&file.content_type)
        .bind(file.size)
        .bind(file.parent_folder_id)
        .bind(file.owner_id)
        .bind(file.created_at)
        .execute(&self.pool)
        .await?;

        let total_parts = part_count(file.size);
        let mut urls = Vec::with_capacity(total_parts as usize);
        for part_number in 1..=total_parts {
            let url = self
                .store
                .presign_part(&file.storage_key, &file.upload_id, part_number, PART_URL_TTL)
                .await?;
            urls.push(PresignedPartUrl { part_number, url });
        }

        Ok(InitiateUploadResponse {
            file_id: file.id,
            upload_id: file.upload_id,
            key: file.storage_key,
            urls,
        })
    }

    /// Finalize a multipart upload.
    ///
    /// The store finalize call runs before the metadata flip: a file is
    /// never marked Completed unless the store confirmed it. On any
    /// failure the row stays Pending; the caller may retry, or the
    /// scanner reclaims it after the staleness window.
    pub async fn complete(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        data: CompleteUploadRequest,
    ) -> ApiResult<UploadCompletedResponse> {
        let file = self.fetch_owned_pending(owner_id, file_id).await?.ok_or_else(|| {
            ApiError::NotFound("File not found or upload already completed.".into())
        })?;

        if file.upload_id != data.upload_id || file.storage_key != data.key {
            return Err(ApiError::Validation(
                "Upload session does not match this file.".into(),
            ));
        }

        // the store requires parts ascending by part number, whatever
        // order the client reported them in
        let mut parts: Vec<CompletedPart> = data
            .parts
            .into_iter()
            .map(|p| CompletedPart {
                part_number: p.part_number,
                etag: p.etag,
            })
            .collect();
        parts.sort_by_key(|p| p.part_number);

        let expected = part_count(file.size);
        let covers_all = parts.len() == expected as usize
            && parts
                .iter()
                .enumerate()
                .all(|(i, p)| p.part_number == i as i32 + 1);
        if !covers_all {
            return Err(ApiError::Validation(format!(
                "Upload must complete with parts 1..{expected} exactly."
            )));
        }

        let uploaded = self
            .store
            .list_parts(&file.storage_key, &file.upload_id)
            .await?;
        tracing::debug!(
            key = %file.storage_key,
            parts = uploaded.len(),
            bytes = uploaded.iter().map(|p| p.size).sum::<i64>(),
            "store confirmed uploaded parts"
        );
        let mut received: Vec<i32> = uploaded.iter().map(|p| p.part_number).collect();
        received.sort_unstable();
        received.dedup();
        if received != (1..=expected).collect::<Vec<_>>() {
            return Err(ApiError::Validation(
                "The object store has not received every part.".into(),
            ));
        }

        self.store
            .complete_multipart(&file.storage_key, &file.upload_id, &parts)
            .await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE files SET status = ? WHERE id = ?")
            .bind(FileStatus::Completed)
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        let category = ContentCategory::from_mime(&file.content_type);
        usage_service::charge(&mut *tx, owner_id, category, file.size).await?;
        tx.commit().await?;

        Ok(UploadCompletedResponse {
            id: file.id,
            name: file.name,
            content_type: file.content_type,
            size: file.size,
            created_at: file.created_at,
        })
    }

    /// Abort an in-progress upload.
    ///
    /// The status check precedes the store call: cancelling a session that
    /// already completed (or was already cancelled) is a metadata no-op.
    pub async fn cancel(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        data: CancelUploadRequest,
    ) -> ApiResult<()> {
        let file: Option<File> = sqlx::query_as(
            "SELECT id, name, encrypted_key, key_encrypted_by_root, storage_key, upload_id,
                    status, content_type, size, parent_folder_id, owner_id, created_at
             FROM files WHERE id = ? AND owner_id = ?",
        )
        .bind(file_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        let file = file.ok_or_else(|| ApiError::NotFound("File not found.".into()))?;
        if file.status != FileStatus::Pending {
            return Ok(());
        }

        if file.upload_id != data.upload_id || file.storage_key != data.key {
            return Err(ApiError::Validation(
                "Upload session does not match this file.".into(),
            ));
        }

        self.store
            .abort_multipart(&file.storage_key, &file.upload_id)
            .await?;

        // marked Deleted rather than removed so the deletion pipeline owns
        // the row's removal, exactly like every other cleanup path
        sqlx::query("UPDATE files SET status = ? WHERE id = ? AND status = ?")
            .bind(FileStatus::Deleted)
            .bind(file_id)
            .bind(FileStatus::Pending)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fetch_owned_pending(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
    ) -> ApiResult<Option<File>> {
        let file = sqlx::query_as(
            "SELECT id, name, encrypted_key, key_encrypted_by_root, storage_key, upload_id,
                    status, content_type, size, parent_folder_id, owner_id, created_at
             FROM files WHERE id = ? AND owner_id = ? AND status = ?",
        )
        .bind(file_id)
        .bind(owner_id)
        .bind(FileStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;
        Ok(file)
    }
}
