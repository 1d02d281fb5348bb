//! Folder operations: create, read (owner or share viewer), root item
//! listing, and the owner-initiated delete that feeds the deletion
//! pipeline.
//!
//! Descendant sets are always resolved with an explicit breadth-first walk
//! over `parent_folder_id`, never a recursive query, never a cache.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, SqliteConnection, SqlitePool, sqlite::Sqlite};
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::models::{
    file::{ContentCategory, File, FileStatus},
    folder::{Folder, FolderStatus},
    shared_link::{SharedItemType, SharedLink},
};
use crate::services::usage_service;
use crate::workers::task_queue::{DeletionTask, TaskKind, TaskQueue};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    /// Folder name ciphertext.
    pub name: String,
    pub encrypted_key: String,
    pub key_encrypted_by_root: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderResponse {
    pub id: Uuid,
    pub name: String,
    pub encrypted_key: String,
    /// Only present for the owner; share viewers unwrap through the
    /// shared folder's key chain instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_encrypted_by_root: Option<String>,
    pub parent_folder_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub children: Vec<ItemResponse>,
}

/// A folder child or root item, tagged for the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ItemResponse {
    #[serde(rename_all = "camelCase")]
    Folder {
        id: Uuid,
        name: String,
        encrypted_key: String,
        created_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    File {
        id: Uuid,
        name: String,
        encrypted_key: String,
        content_type: String,
        size: i64,
        created_at: DateTime<Utc>,
    },
}

impl ItemResponse {
    fn from_folder(folder: Folder) -> Self {
        Self::Folder {
            id: folder.id,
            name: folder.name,
            encrypted_key: folder.encrypted_key,
            created_at: folder.created_at,
        }
    }

    fn from_file(file: File) -> Self {
        Self::File {
            id: file.id,
            name: file.name,
            encrypted_key: file.encrypted_key,
            content_type: file.content_type,
            size: file.size,
            created_at: file.created_at,
        }
    }
}

#[derive(Clone)]
pub struct FoldersService {
    pool: SqlitePool,
    queue: TaskQueue,
}

impl FoldersService {
    pub fn new(pool: SqlitePool, queue: TaskQueue) -> Self {
        Self { pool, queue }
    }

    pub async fn create(&self, owner_id: Uuid, data: CreateFolderRequest) -> ApiResult<FolderResponse> {
        if data.name.is_empty() || data.encrypted_key.is_empty() || data.key_encrypted_by_root.is_empty()
        {
            return Err(ApiError::Validation(
                "Folder name and key material are required.".into(),
            ));
        }

        if let Some(parent_id) = data.parent_id {
            fetch_owned_active_folder(&self.pool, parent_id, owner_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Parent folder not found.".into()))?;
        }

        let folder = Folder {
            id: Uuid::new_v4(),
            name: data.name,
            encrypted_key: data.encrypted_key,
            key_encrypted_by_root: data.key_encrypted_by_root,
            status: FolderStatus::Active,
            parent_folder_id: data.parent_id,
            owner_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO folders (id, name, encrypted_key, key_encrypted_by_root, status,
                                  parent_folder_id, owner_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(folder.id)
        .bind(&folder.name)
        .bind(&folder.encrypted_key)
        .bind(&folder.key_encrypted_by_root)
        .bind(folder.status)
        .bind(folder.parent_folder_id)
        .bind(folder.owner_id)
        .bind(folder.created_at)
        .execute(&self.pool)
        .await?;

        Ok(folder_response(folder, true, Vec::new()))
    }

    /// Fetch a folder with its immediate children, either as the owner or
    /// through a shared link granting access to it.
    pub async fn get_folder(
        &self,
        folder_id: Uuid,
        viewer_id: Option<Uuid>,
        share_id: Option<Uuid>,
    ) -> ApiResult<FolderResponse> {
        if let Some(share_id) = share_id {
            let mut conn = self.pool.acquire().await?;
            if !share_grants_folder(&mut conn, share_id, folder_id).await? {
                return Err(ApiError::Forbidden(
                    "You're not allowed to view this folder.".into(),
                ));
            }

            let folder = fetch_active_folder(&mut conn, folder_id)
                .await?
                .ok_or_else(|| {
                    ApiError::Forbidden("You're not allowed to view this folder.".into())
                })?;
            let children = fetch_children(&mut conn, folder_id).await?;
            return Ok(folder_response(folder, false, children));
        }

        let viewer_id = viewer_id
            .ok_or_else(|| ApiError::Forbidden("You're not allowed to view this folder".into()))?;

        let folder = fetch_owned_active_folder(&self.pool, folder_id, viewer_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Folder not found.".into()))?;

        let mut conn = self.pool.acquire().await?;
        let children = fetch_children(&mut conn, folder_id).await?;
        Ok(folder_response(folder, true, children))
    }

    /// The owner's parentless items: active root folders and completed
    /// files that live outside any folder.
    pub async fn list_root_items(&self, owner_id: Uuid) -> ApiResult<Vec<ItemResponse>> {
        let folders: Vec<Folder> = sqlx::query_as(
            "SELECT id, name, encrypted_key, key_encrypted_by_root, status,
                    parent_folder_id, owner_id, created_at
             FROM folders
             WHERE owner_id = ? AND parent_folder_id IS NULL AND status = ?
             ORDER BY created_at",
        )
        .bind(owner_id)
        .bind(FolderStatus::Active)
        .fetch_all(&self.pool)
        .await?;

        let files: Vec<File> = sqlx::query_as(
            "SELECT id, name, encrypted_key, key_encrypted_by_root, storage_key, upload_id,
                    status, content_type, size, parent_folder_id, owner_id, created_at
             FROM files
             WHERE owner_id = ? AND parent_folder_id IS NULL AND status = ?
             ORDER BY created_at",
        )
        .bind(owner_id)
        .bind(FileStatus::Completed)
        .fetch_all(&self.pool)
        .await?;

        let mut items: Vec<ItemResponse> =
            folders.into_iter().map(ItemResponse::from_folder).collect();
        items.extend(files.into_iter().map(ItemResponse::from_file));
        Ok(items)
    }

    /// Owner-initiated folder delete.
    ///
    /// Synchronously: debit the ledger from a snapshot of the completed
    /// files in the subtree (the user's visible quota must be right
    /// immediately) and soft-mark the target folder, never a descendant.
    /// Everything physical is deferred to the deletion pipeline.
    pub async fn delete_folder(&self, owner_id: Uuid, folder_id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        let folder: Option<Folder> = sqlx::query_as(
            "SELECT id, name, encrypted_key, key_encrypted_by_root, status,
                    parent_folder_id, owner_id, created_at
             FROM folders WHERE id = ? AND owner_id = ? AND status = ?",
        )
        .bind(folder_id)
        .bind(owner_id)
        .bind(FolderStatus::Active)
        .fetch_optional(&mut *tx)
        .await?;

        if folder.is_none() {
            return Err(ApiError::NotFound("Folder not found.".into()));
        }

        let subtree = collect_folder_tree(&mut *tx, folder_id, false).await?;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT content_type, size FROM files WHERE status = ",
        );
        builder.push_bind(FileStatus::Completed);
        builder.push(" AND parent_folder_id IN (");
        let mut separated = builder.separated(", ");
        for id in &subtree {
            separated.push_bind(*id);
        }
        builder.push(")");
        let sub_files: Vec<(String, i64)> =
            builder.build_query_as().fetch_all(&mut *tx).await?;

        let mut size_by_category: HashMap<ContentCategory, i64> = HashMap::new();
        for (content_type, size) in sub_files {
            *size_by_category
                .entry(ContentCategory::from_mime(&content_type))
                .or_insert(0) += size;
        }

        // free space so the user can upload more, before cleanup lands
        for (category, total) in size_by_category {
            usage_service::charge(&mut *tx, owner_id, category, -total).await?;
        }

        sqlx::query("UPDATE folders SET status = ? WHERE id = ?")
            .bind(FolderStatus::Deleted)
            .bind(folder_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.queue
            .enqueue(DeletionTask::new(folder_id, TaskKind::Folder))
            .await;

        Ok(())
    }
}

fn folder_response(folder: Folder, is_owner: bool, children: Vec<ItemResponse>) -> FolderResponse {
    FolderResponse {
        id: folder.id,
        name: folder.name,
        encrypted_key: folder.encrypted_key,
        key_encrypted_by_root: is_owner.then_some(folder.key_encrypted_by_root),
        parent_folder_id: folder.parent_folder_id,
        created_at: folder.created_at,
        children,
    }
}

async fn fetch_owned_active_folder(
    pool: &SqlitePool,
    folder_id: Uuid,
    owner_id: Uuid,
) -> sqlx::Result<Option<Folder>> {
    sqlx::query_as(
        "SELECT id, name, encrypted_key, key_encrypted_by_root, status,
                parent_folder_id, owner_id, created_at
         FROM folders WHERE id = ? AND owner_id = ? AND status = ?",
    )
    .bind(folder_id)
    .bind(owner_id)
    .bind(FolderStatus::Active)
    .fetch_optional(pool)
    .await
}

async fn fetch_active_folder(
    conn: &mut SqliteConnection,
    folder_id: Uuid,
) -> sqlx::Result<Option<Folder>> {
    sqlx::query_as(
        "SELECT id, name, encrypted_key, key_encrypted_by_root, status,
                parent_folder_id, owner_id, created_at
         FROM folders WHERE id = ? AND status = ?",
    )
    .bind(folder_id)
    .bind(FolderStatus::Active)
    .fetch_optional(&mut *conn)
    .await
}

async fn fetch_children(
    conn: &mut SqliteConnection,
    folder_id: Uuid,
) -> sqlx::Result<Vec<ItemResponse>> {
    let folders: Vec<Folder> = sqlx::query_as(
        "SELECT id, name, encrypted_key, key_encrypted_by_root, status,
                parent_folder_id, owner_id, created_at
         FROM folders WHERE parent_folder_id = ? AND status = ? ORDER BY created_at",
    )
    .bind(folder_id)
    .bind(FolderStatus::Active)
    .fetch_all(&mut *conn)
    .await?;

    let files: Vec<File> = sqlx::query_as(
        "SELECT id, name, encrypted_key, key_encrypted_by_root, storage_key, upload_id,
                status, content_type, size, parent_folder_id, owner_id, created_at
         FROM files WHERE parent_folder_id = ? AND status = ? ORDER BY created_at",
    )
    .bind(folder_id)
    .bind(FileStatus::Completed)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: Vec<ItemResponse> = folders.into_iter().map(ItemResponse::from_folder).collect();
    items.extend(files.into_iter().map(ItemResponse::from_file));
    Ok(items)
}

/// Resolve a folder's full descendant set (root included) by walking
/// `parent_folder_id` level by level.
///
/// The visited set guards against a corrupted parent chain forming a
/// cycle; with `active_only` the walk does not descend through deleted
/// folders.
pub(crate) async fn collect_folder_tree(
    conn: &mut SqliteConnection,
    root: Uuid,
    active_only: bool,
) -> sqlx::Result<Vec<Uuid>> {
    let mut seen: HashSet<Uuid> = HashSet::from([root]);
    let mut result = vec![root];
    let mut frontier = vec![root];

    while !frontier.is_empty() {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id FROM folders WHERE parent_folder_id IN (");
        let mut separated = builder.separated(", ");
        for id in &frontier {
            separated.push_bind(*id);
        }
        builder.push(")");
        if active_only {
            builder.push(" AND status = ");
            builder.push_bind(FolderStatus::Active);
        }

        let rows: Vec<(Uuid,)> = builder.build_query_as().fetch_all(&mut *conn).await?;

        frontier = rows
            .into_iter()
            .map(|(id,)| id)
            .filter(|id| seen.insert(*id))
            .collect();
        result.extend(frontier.iter().copied());
    }

    Ok(result)
}

/// True if the shared link grants read access to `folder_id`: the link
/// must target this folder or an ancestor of it, through active folders
/// only.
pub(crate) async fn share_grants_folder(
    conn: &mut SqliteConnection,
    share_id: Uuid,
    folder_id: Uuid,
) -> ApiResult<bool> {
    let Some(link) = fetch_link(conn, share_id).await? else {
        return Ok(false);
    };
    if link.item_type != SharedItemType::Folder {
        return Ok(false);
    }
    if fetch_active_folder(conn, link.item_id).await?.is_none() {
        return Ok(false);
    }

    let tree = collect_folder_tree(conn, link.item_id, true).await?;
    Ok(tree.contains(&folder_id))
}

pub(crate) async fn fetch_link(
    conn: &mut SqliteConnection,
    share_id: Uuid,
) -> sqlx::Result<Option<SharedLink>> {
    sqlx::query_as(
        "SELECT id, owner_id, item_id, item_type, created_at FROM shared_links WHERE id = ?",
    )
    .bind(share_id)
    .fetch_optional(&mut *conn)
    .await
}
