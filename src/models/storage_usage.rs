//! Represents the per-owner, per-category storage usage ledger.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::file::ContentCategory;

/// One ledger entry: a running byte total for a (user, category) pair.
///
/// Exactly one entry exists per pair; it is created lazily on the first
/// chargeable event and mutated, never deleted, for the life of the owner.
/// Pending uploads never contribute to a total.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StorageUsage {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    pub user_id: Uuid,

    pub category: ContentCategory,

    /// Running byte total of the user's completed files in this category.
    pub total_size: i64,
}
