//! Metadata services.
//!
//! Each service is a thin, cloneable handle over the shared pool, the
//! object store gateway, and the deletion queue; handlers build them per
//! request from [`AppState`].

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::storage::ObjectStore;
use crate::workers::task_queue::TaskQueue;

pub mod files_service;
pub mod folders_service;
pub mod share_service;
pub mod uploads_service;
pub mod usage_service;
pub mod users_service;

use files_service::FilesService;
use folders_service::FoldersService;
use share_service::ShareService;
use uploads_service::UploadsService;
use users_service::UsersService;

/// Shared application state carried by the router.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub store: Arc<dyn ObjectStore>,
    pub queue: TaskQueue,
}

impl AppState {
    pub fn new(pool: SqlitePool, store: Arc<dyn ObjectStore>, queue: TaskQueue) -> Self {
        Self { pool, store, queue }
    }

    pub fn uploads(&self) -> UploadsService {
        UploadsService::new(self.pool.clone(), self.store.clone())
    }

    pub fn files(&self) -> FilesService {
        FilesService::new(self.pool.clone(), self.store.clone())
    }

    pub fn folders(&self) -> FoldersService {
        FoldersService::new(self.pool.clone(), self.queue.clone())
    }

    pub fn users(&self) -> UsersService {
        UsersService::new(self.pool.clone(), self.queue.clone())
    }

    pub fn shares(&self) -> ShareService {
        ShareService::new(self.pool.clone())
    }
}
