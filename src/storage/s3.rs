//! S3-compatible gateway implementation.
//!
//! Works against AWS S3 or any S3-compatible endpoint (MinIO, Storj, ...)
//! via path-style addressing and an optional custom endpoint URL. Payload
//! bytes never pass through this process; everything here is control-plane
//! calls and presigning.

use std::time::Duration;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};

use super::{CompletedPart, ObjectStore, ObjectStoreError, ObjectStoreResult, UploadedPart};
use crate::config::S3Config;

/// Gateway over a single bucket of an S3-compatible store.
pub struct S3Gateway {
    client: S3Client,
    bucket: String,
}

impl S3Gateway {
    pub fn new(cfg: &S3Config) -> Self {
        let credentials = Credentials::new(
            cfg.access_key.clone(),
            cfg.secret_key.clone(),
            None,
            None,
            "file-vault",
        );

        let mut builder = S3ConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true);
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: cfg.bucket.clone(),
        }
    }
}

fn backend_error<E, R>(err: SdkError<E, R>) -> ObjectStoreError
where
    E: std::fmt::Debug,
    R: std::fmt::Debug,
{
    ObjectStoreError::Backend(format!("{err:?}"))
}

fn presign_config(ttl: Duration) -> ObjectStoreResult<PresigningConfig> {
    PresigningConfig::expires_in(ttl).map_err(|err| ObjectStoreError::Backend(err.to_string()))
}

#[async_trait]
impl ObjectStore for S3Gateway {
    async fn initiate_multipart(&self, key: &str) -> ObjectStoreResult<String> {
        let resp = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;

        resp.upload_id()
            .map(str::to_owned)
            .ok_or_else(|| ObjectStoreError::Backend("store returned no upload id".into()))
    }

    async fn presign_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        ttl: Duration,
    ) -> ObjectStoreResult<String> {
        let presigned = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(presign_config(ttl)?)
            .await
            .map_err(backend_error)?;

        Ok(presigned.uri().to_string())
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> ObjectStoreResult<String> {
        let parts = parts
            .iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect::<Vec<_>>();

        let resp = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
            .send()
            .await
            .map_err(backend_error)?;

        Ok(resp.key().unwrap_or(key).to_string())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> ObjectStoreResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> ObjectStoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn list_parts(&self, key: &str, upload_id: &str) -> ObjectStoreResult<Vec<UploadedPart>> {
        let resp = self
            .client
            .list_parts()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(resp
            .parts()
            .iter()
            .map(|p| UploadedPart {
                part_number: p.part_number().unwrap_or_default(),
                size: p.size().unwrap_or_default(),
                etag: p.e_tag().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn presign_read(&self, key: &str, ttl: Duration) -> ObjectStoreResult<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config(ttl)?)
            .await
            .map_err(backend_error)?;

        Ok(presigned.uri().to_string())
    }
}
