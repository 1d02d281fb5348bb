//! Represents an encrypted file whose payload lives in the object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single stored file.
///
/// The row is created `Pending` when an upload is initiated and only
/// becomes `Completed` after the multipart session is finalized at the
/// object store. `size` and `content_type` are client-supplied and are
/// trusted only once the file is `Completed`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct File {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Filename ciphertext (encrypted client-side, stored opaquely).
    pub name: String,

    /// File key wrapped with the parent folder key (`[ iv | ciphertext ]`).
    pub encrypted_key: String,

    /// File key wrapped with the owner's root key (`[ iv | ciphertext ]`).
    pub key_encrypted_by_root: String,

    /// Key of the payload in the external object store, unique per file.
    pub storage_key: String,

    /// Multipart upload session id issued by the object store.
    pub upload_id: String,

    /// Lifecycle status, stored as a string.
    pub status: FileStatus,

    /// MIME type as reported by the client.
    pub content_type: String,

    /// Payload size in bytes (ciphertext size).
    pub size: i64,

    /// Parent folder, if any. Cleared when the folder row disappears.
    pub parent_folder_id: Option<Uuid>,

    /// Owner, if any. Cleared when the owner row disappears so the file
    /// row can still drive object-store cleanup.
    pub owner_id: Option<Uuid>,

    /// When the upload was initiated.
    pub created_at: DateTime<Utc>,
}

/// File lifecycle. `Deleted` is terminal; the row is only removed by the
/// file deletion handler.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Deleted,
    Pending,
    Completed,
}

/// Coarse content classification used to partition storage accounting.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl ContentCategory {
    /// Classify a MIME type into a usage category.
    pub fn from_mime(mime: &str) -> Self {
        let leading = mime.split('/').next().unwrap_or("").to_ascii_lowercase();
        match leading.as_str() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "text" => Self::Document,
            "application" => match mime.to_ascii_lowercase().as_str() {
                "application/pdf"
                | "application/msword"
                | "application/rtf"
                | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                    Self::Document
                }
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }
}
