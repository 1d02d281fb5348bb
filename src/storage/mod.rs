//! Object store gateway.
//!
//! The vault never proxies payload bytes: clients upload ciphertext parts
//! directly to the external store through presigned URLs and the service
//! only drives the multipart protocol. This module is the thin contract
//! over that store; the production implementation lives in [`s3`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod s3;

/// Fixed multipart part size. Uploads of `size` bytes are split into
/// `ceil(size / PART_SIZE_BYTES)` parts numbered from 1.
pub const PART_SIZE_BYTES: i64 = 50 * 1024 * 1024;

/// Lifetime of a presigned part-upload URL.
pub const PART_URL_TTL: Duration = Duration::from_secs(30 * 60);

/// Lifetime of a presigned read URL.
pub const READ_URL_TTL: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store request failed: {0}")]
    Backend(String),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Number of multipart parts needed for a payload of `size` bytes.
pub fn part_count(size: i64) -> i32 {
    ((size + PART_SIZE_BYTES - 1) / PART_SIZE_BYTES) as i32
}

/// One part of a finished upload, as reported by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// One part the store has actually received for an open session.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub part_number: i32,
    pub size: i64,
    pub etag: String,
}

/// Contract over a remote multipart-capable object store.
///
/// `complete_multipart` requires `parts` sorted ascending by part number;
/// callers sort before submission.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn initiate_multipart(&self, key: &str) -> ObjectStoreResult<String>;

    async fn presign_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        ttl: Duration,
    ) -> ObjectStoreResult<String>;

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> ObjectStoreResult<String>;

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> ObjectStoreResult<()>;

    async fn delete_object(&self, key: &str) -> ObjectStoreResult<()>;

    async fn list_parts(&self, key: &str, upload_id: &str) -> ObjectStoreResult<Vec<UploadedPart>>;

    async fn presign_read(&self, key: &str, ttl: Duration) -> ObjectStoreResult<String>;
}

#[cfg(test)]
pub mod memory {
    //! Recording in-memory store used by the service and worker tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Default)]
    pub struct MemoryStore {
        /// Open sessions: (key, upload_id) -> presigned part numbers.
        sessions: Mutex<HashMap<(String, String), Vec<i32>>>,
        /// Keys of finalized objects.
        pub objects: Mutex<Vec<String>>,
        /// Part-number order as received by `complete_multipart`.
        pub completed_orders: Mutex<Vec<Vec<i32>>>,
        pub aborted: Mutex<Vec<(String, String)>>,
        pub deleted: Mutex<Vec<String>>,
        /// When set, `complete_multipart` fails.
        pub fail_complete: AtomicBool,
        next_upload: Mutex<u32>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_next_complete(&self) {
            self.fail_complete.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn initiate_multipart(&self, key: &str) -> ObjectStoreResult<String> {
            let mut counter = self.next_upload.lock().unwrap();
            *counter += 1;
            let upload_id = format!("upload-{counter}");
            self.sessions
                .lock()
                .unwrap()
                .insert((key.to_string(), upload_id.clone()), Vec::new());
            Ok(upload_id)
        }

        async fn presign_part(
            &self,
            key: &str,
            upload_id: &str,
            part_number: i32,
            ttl: Duration,
        ) -> ObjectStoreResult<String> {
            let mut sessions = self.sessions.lock().unwrap();
            let parts = sessions
                .get_mut(&(key.to_string(), upload_id.to_string()))
                .ok_or_else(|| ObjectStoreError::Backend("no such upload session".into()))?;
            parts.push(part_number);
            Ok(format!(
                "https://store.test/{key}?partNumber={part_number}&uploadId={upload_id}&ttl={}",
                ttl.as_secs()
            ))
        }

        async fn complete_multipart(
            &self,
            key: &str,
            upload_id: &str,
            parts: &[CompletedPart],
        ) -> ObjectStoreResult<String> {
            if self.fail_complete.swap(false, Ordering::SeqCst) {
                return Err(ObjectStoreError::Backend("simulated completion failure".into()));
            }
            let mut sessions = self.sessions.lock().unwrap();
            sessions
                .remove(&(key.to_string(), upload_id.to_string()))
                .ok_or_else(|| ObjectStoreError::Backend("no such upload session".into()))?;
            self.completed_orders
                .lock()
                .unwrap()
                .push(parts.iter().map(|p| p.part_number).collect());
            self.objects.lock().unwrap().push(key.to_string());
            Ok(key.to_string())
        }

        async fn abort_multipart(&self, key: &str, upload_id: &str) -> ObjectStoreResult<()> {
            self.sessions
                .lock()
                .unwrap()
                .remove(&(key.to_string(), upload_id.to_string()));
            self.aborted
                .lock()
                .unwrap()
                .push((key.to_string(), upload_id.to_string()));
            Ok(())
        }

        async fn delete_object(&self, key: &str) -> ObjectStoreResult<()> {
            self.objects.lock().unwrap().retain(|k| k != key);
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn list_parts(
            &self,
            key: &str,
            upload_id: &str,
        ) -> ObjectStoreResult<Vec<UploadedPart>> {
            let sessions = self.sessions.lock().unwrap();
            let parts = sessions
                .get(&(key.to_string(), upload_id.to_string()))
                .ok_or_else(|| ObjectStoreError::Backend("no such upload session".into()))?;
            Ok(parts
                .iter()
                .map(|n| UploadedPart {
                    part_number: *n,
                    size: PART_SIZE_BYTES,
                    etag: format!("etag-{n}"),
                })
                .collect())
        }

        async fn presign_read(&self, key: &str, ttl: Duration) -> ObjectStoreResult<String> {
            Ok(format!("https://store.test/{key}?read=1&ttl={}", ttl.as_secs()))
        }
    }

    #[tokio::test]
    async fn part_count_is_ceiling_division() {
        assert_eq!(part_count(1), 1);
        assert_eq!(part_count(PART_SIZE_BYTES), 1);
        assert_eq!(part_count(PART_SIZE_BYTES + 1), 2);
        assert_eq!(part_count(120 * 1024 * 1024), 3);
    }
}
