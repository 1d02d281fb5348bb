//! Storage usage ledger.
//!
//! One running byte total per (owner, content category). `charge` is the
//! only mutation and always executes on the caller's open transaction,
//! in the same commit as the metadata change that justifies it: upload
//! completion, an owner file delete, or the eager accounting step of an
//! owner folder delete. There is no reconciliation path; co-transactional
//! charging is what keeps the ledger correct.

use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::{file::ContentCategory, storage_usage::StorageUsage};

/// Add `delta` bytes (positive or negative) to the owner's total for a
/// category, creating the ledger row lazily on first use.
pub async fn charge(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    category: ContentCategory,
    delta: i64,
) -> sqlx::Result<()> {
    let entry = StorageUsage {
        id: Uuid::new_v4(),
        user_id,
        category,
        total_size: delta,
    };

    sqlx::query(
        "INSERT INTO storage_usage (id, user_id, category, total_size)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (user_id, category) DO UPDATE SET
             total_size = total_size + excluded.total_size",
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(entry.category)
    .bind(entry.total_size)
    .execute(conn)
    .await?;

    Ok(())
}

/// Per-category byte totals for an owner.
pub async fn summary(
    pool: &SqlitePool,
    user_id: Uuid,
) -> sqlx::Result<HashMap<ContentCategory, i64>> {
    let entries: Vec<StorageUsage> = sqlx::query_as(
        "SELECT id, user_id, category, total_size FROM storage_usage WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(entries
        .into_iter()
        .map(|entry| (entry.category, entry.total_size))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, test_pool};

    #[tokio::test]
    async fn charge_creates_lazily_and_accumulates() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, true).await;

        let mut conn = pool.acquire().await.unwrap();
        charge(&mut conn, owner, ContentCategory::Image, 100).await.unwrap();
        charge(&mut conn, owner, ContentCategory::Image, 50).await.unwrap();
        charge(&mut conn, owner, ContentCategory::Video, 10).await.unwrap();
        charge(&mut conn, owner, ContentCategory::Video, -10).await.unwrap();
        drop(conn);

        let totals = summary(&pool, owner).await.unwrap();
        assert_eq!(totals.get(&ContentCategory::Image), Some(&150));
        assert_eq!(totals.get(&ContentCategory::Video), Some(&0));
        assert_eq!(totals.get(&ContentCategory::Document), None);
    }
}
