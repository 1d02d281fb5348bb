//! Account data and account deletion.
//!
//! Deletion is asynchronous: the request path only enqueues a User task;
//! the deletion handler soft-marks the files and removes the user row with
//! its cascades.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::models::{file::ContentCategory, user::User};
use crate::services::usage_service;
use crate::workers::task_queue::{DeletionTask, TaskKind, TaskQueue};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
    /// Per-category byte totals from the usage ledger.
    pub storage_usage: HashMap<ContentCategory, i64>,
}

#[derive(Clone)]
pub struct UsersService {
    pool: SqlitePool,
    queue: TaskQueue,
}

impl UsersService {
    pub fn new(pool: SqlitePool, queue: TaskQueue) -> Self {
        Self { pool, queue }
    }

    pub async fn get_account(&self, user_id: Uuid) -> ApiResult<AccountResponse> {
        let user = self.fetch_user(user_id).await?;
        let storage_usage = usage_service::summary(&self.pool, user_id).await?;

        Ok(AccountResponse {
            id: user.id,
            email: user.email,
            email_confirmed: user.email_confirmed,
            created_at: user.created_at,
            storage_usage,
        })
    }

    /// Queue the account for deletion. The caller gets success as soon as
    /// the task is enqueued; cleanup is invisible to them.
    pub async fn delete_account(&self, user_id: Uuid) -> ApiResult<()> {
        self.fetch_user(user_id).await?;
        self.queue
            .enqueue(DeletionTask::new(user_id, TaskKind::User))
            .await;
        Ok(())
    }

    async fn fetch_user(&self, user_id: Uuid) -> ApiResult<User> {
        let user: Option<User> = sqlx::query_as(
            "SELECT id, email, email_confirmed, created_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| ApiError::NotFound("Account not found.".into()))
    }
}
