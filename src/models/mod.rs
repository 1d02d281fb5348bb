//! Core data models for the encrypted file vault.
//!
//! These entities represent the metadata side of the system: the payloads
//! themselves live in the external object store as client-side-encrypted
//! blobs. They map to database tables via `sqlx::FromRow` and serialize
//! naturally as JSON via `serde`.

pub mod file;
pub mod folder;
pub mod shared_link;
pub mod storage_usage;
pub mod user;
