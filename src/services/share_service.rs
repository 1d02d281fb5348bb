//! Shared link management.
//!
//! A link is an anonymous read capability over one owned item. Resolution
//! of what a link reaches happens in the file/folder read paths; this
//! service only owns the link rows themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::models::{
    file::FileStatus,
    folder::FolderStatus,
    shared_link::{SharedItemType, SharedLink},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSharedLinkRequest {
    pub item_id: Uuid,
    pub item_type: SharedItemType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedLinkResponse {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_type: SharedItemType,
    pub created_at: DateTime<Utc>,
}

impl From<SharedLink> for SharedLinkResponse {
    fn from(link: SharedLink) -> Self {
        Self {
            id: link.id,
            item_id: link.item_id,
            item_type: link.item_type,
            created_at: link.created_at,
        }
    }
}

#[derive(Clone)]
pub struct ShareService {
    pool: SqlitePool,
}

impl ShareService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Share an owned item. Only completed files and active folders can be
    /// shared.
    pub async fn create(
        &self,
        owner_id: Uuid,
        data: CreateSharedLinkRequest,
    ) -> ApiResult<SharedLinkResponse> {
        let owned = match data.item_type {
            SharedItemType::File => {
                sqlx::query_as::<_, (Uuid,)>(
                    "SELECT id FROM files WHERE id = ? AND owner_id = ? AND status = ?",
                )
                .bind(data.item_id)
                .bind(owner_id)
                .bind(FileStatus::Completed)
                .fetch_optional(&self.pool)
                .await?
            }
            SharedItemType::Folder => {
                sqlx::query_as::<_, (Uuid,)>(
                    "SELECT id FROM folders WHERE id = ? AND owner_id = ? AND status = ?",
                )
                .bind(data.item_id)
                .bind(owner_id)
                .bind(FolderStatus::Active)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        if owned.is_none() {
            return Err(ApiError::NotFound("Item not found.".into()));
        }

        let link = SharedLink {
            id: Uuid::new_v4(),
            owner_id,
            item_id: data.item_id,
            item_type: data.item_type,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO shared_links (id, owner_id, item_id, item_type, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(link.id)
        .bind(link.owner_id)
        .bind(link.item_id)
        .bind(link.item_type)
        .bind(link.created_at)
        .execute(&self.pool)
        .await?;

        Ok(link.into())
    }

    pub async fn list(&self, owner_id: Uuid) -> ApiResult<Vec<SharedLinkResponse>> {
        let links: Vec<SharedLink> = sqlx::query_as(
            "SELECT id, owner_id, item_id, item_type, created_at
             FROM shared_links WHERE owner_id = ? ORDER BY created_at",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links.into_iter().map(Into::into).collect())
    }

    pub async fn delete(&self, owner_id: Uuid, share_id: Uuid) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM shared_links WHERE id = ? AND owner_id = ?")
            .bind(share_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Shared link not found.".into()));
        }
        Ok(())
    }

    /// Public lookup by link id, used by the shared-content endpoint.
    pub async fn get_link(&self, share_id: Uuid) -> ApiResult<SharedLink> {
        let mut conn = self.pool.acquire().await?;
        crate::services::folders_service::fetch_link(&mut conn, share_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Shared link not found.".into()))
    }
}
