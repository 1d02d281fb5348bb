//! Represents a public share grant for a file or folder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An anonymous read grant.
///
/// The link id itself is the capability: anyone presenting it can read the
/// target item and, for a folder target, everything in its active
/// subtree.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct SharedLink {
    pub id: Uuid,

    pub owner_id: Uuid,

    /// The shared file or folder.
    pub item_id: Uuid,

    pub item_type: SharedItemType,

    pub created_at: DateTime<Utc>,
}

/// What a shared link points at.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SharedItemType {
    File,
    Folder,
}
