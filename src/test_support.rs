//! Shared fixtures for the in-crate tests: an in-memory metadata store
//! with the real migrations applied, and row seeding helpers.

use chrono::{TimeDelta, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::file::{ContentCategory, FileStatus};
use crate::models::folder::FolderStatus;
use crate::services::usage_service;
use crate::workers::task_queue::{DeletionTask, TaskQueue, TaskReceiver, deletion_queue};

/// Fresh in-memory database with the schema applied. A single connection
/// keeps every query in the test on the same `:memory:` instance.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

pub fn test_queue() -> (TaskQueue, TaskReceiver) {
    deletion_queue()
}

/// Collect everything currently sitting in the queue.
pub fn drain_queue(rx: &mut TaskReceiver) -> Vec<DeletionTask> {
    let mut tasks = Vec::new();
    while let Ok(task) = rx.try_recv() {
        tasks.push(task);
    }
    tasks
}

pub async fn seed_user(pool: &SqlitePool, email_confirmed: bool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, email_confirmed, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(format!("{id}@vault.test"))
        .bind(email_confirmed)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn seed_folder(pool: &SqlitePool, owner_id: Uuid, parent: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO folders (id, name, encrypted_key, key_encrypted_by_root, status,
                              parent_folder_id, owner_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind("folder-ciphertext")
    .bind("ek")
    .bind("rk")
    .bind(FolderStatus::Active)
    .bind(parent)
    .bind(owner_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn seed_file(
    pool: &SqlitePool,
    owner_id: Uuid,
    parent: Option<Uuid>,
    content_type: &str,
    size: i64,
    status: FileStatus,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO files (id, name, encrypted_key, key_encrypted_by_root, storage_key,
                            upload_id, status, content_type, size, parent_folder_id,
                            owner_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind("file-ciphertext")
    .bind("ek")
    .bind("rk")
    .bind(format!("{owner_id}/{id}"))
    .bind(format!("upload-{id}"))
    .bind(status)
    .bind(content_type)
    .bind(size)
    .bind(parent)
    .bind(owner_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn seed_pending_file(
    pool: &SqlitePool,
    owner_id: Uuid,
    parent: Option<Uuid>,
    content_type: &str,
    size: i64,
) -> Uuid {
    seed_file(pool, owner_id, parent, content_type, size, FileStatus::Pending).await
}

/// A completed file, with the ledger credit its completion would have made.
pub async fn seed_completed_file(
    pool: &SqlitePool,
    owner_id: Uuid,
    parent: Option<Uuid>,
    content_type: &str,
    size: i64,
) -> Uuid {
    let id = seed_file(pool, owner_id, parent, content_type, size, FileStatus::Completed).await;

    let mut conn = pool.acquire().await.unwrap();
    usage_service::charge(
        &mut conn,
        owner_id,
        ContentCategory::from_mime(content_type),
        size,
    )
    .await
    .unwrap();

    id
}

/// Shift a file's creation time `hours` into the past.
pub async fn backdate_file(pool: &SqlitePool, file_id: Uuid, hours: i64) {
    sqlx::query("UPDATE files SET created_at = ? WHERE id = ?")
        .bind(Utc::now() - TimeDelta::hours(hours))
        .bind(file_id)
        .execute(pool)
        .await
        .unwrap();
}
