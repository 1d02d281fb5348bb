//! Represents a folder, a node in the self-referential container tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A folder in the vault hierarchy.
///
/// Folders form a tree through `parent_folder_id`; the ancestor chain is
/// acyclic and is always resolved by an explicit walk, never cached.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Folder {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Folder name ciphertext (encrypted client-side).
    pub name: String,

    /// Folder key wrapped with the parent folder key (`[ iv | ciphertext ]`).
    pub encrypted_key: String,

    /// Folder key wrapped with the owner's root key (`[ iv | ciphertext ]`).
    pub key_encrypted_by_root: String,

    /// Lifecycle status, stored as a string.
    pub status: FolderStatus,

    /// Parent folder; `None` for a root folder.
    pub parent_folder_id: Option<Uuid>,

    /// Owning user.
    pub owner_id: Uuid,

    /// When the folder was created.
    pub created_at: DateTime<Utc>,
}

/// Folder lifecycle. An owner delete marks the folder `Deleted`; the
/// folder deletion handler later removes the row. There is no way back to
/// `Active`.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FolderStatus {
    Deleted,
    Active,
}
