//! Represents an account owning vault content.
//!
//! Registration, confirmation and MFA live in the external auth layer;
//! this service only needs the row for ownership, cascades, and the
//! unconfirmed-account sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A vault user.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct User {
    pub id: Uuid,

    pub email: String,

    /// Accounts that never confirm their email are garbage-collected by
    /// the cleanup scanner.
    pub email_confirmed: bool,

    pub created_at: DateTime<Utc>,
}
