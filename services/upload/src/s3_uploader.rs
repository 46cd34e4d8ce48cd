use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// User metadata attached to a stored object
pub type ObjectMetadata = HashMap<String, String>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Failed to put object: {0}")]
    PutFailed(String),

    #[error("Multipart upload failed: {0}")]
    MultipartFailed(String),

    #[error("Bucket unavailable: {0}")]
    Unavailable(String),
}

/// Object storage the writer puts audio into
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `payload` under the full object `key`, attaching `metadata` as object-level tags
    async fn put(
        &self,
        key: &str,
        payload: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError>;

    /// Confirm the backing bucket is reachable
    async fn check_ready(&self) -> Result<(), StorageError>;
}

/// S3 uploader for call audio
pub struct S3Uploader {
    client: S3Client,
    bucket: String,
    multipart_threshold_bytes: usize,
    part_size_bytes: usize,
}

impl S3Uploader {
    /// Create a new S3 uploader
    pub async fn new(config: &S3Config) -> anyhow::Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 uploader initialized"
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            multipart_threshold_bytes: config.multipart_threshold_bytes,
            part_size_bytes: config.part_size_bytes.max(1),
        })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Simple single-part upload for small files
    async fn simple_upload(
        &self,
        s3_key: &str,
        payload: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(s3_key)
            .body(ByteStream::from(payload))
            .content_type(content_type)
            .set_metadata(Some(metadata.clone()))
            .send()
            .await
            .map_err(|e| StorageError::PutFailed(DisplayErrorContext(e).to_string()))?;

        Ok(())
    }

    /// Multipart upload for large files
    async fn multipart_upload(
        &self,
        s3_key: &str,
        payload: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let create_response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(s3_key)
            .content_type(content_type)
            .set_metadata(Some(metadata.clone()))
            .send()
            .await
            .map_err(|e| StorageError::MultipartFailed(DisplayErrorContext(e).to_string()))?;

        let upload_id = create_response
            .upload_id()
            .ok_or_else(|| StorageError::MultipartFailed("No upload ID in response".to_string()))?
            .to_string();

        match self.upload_parts(s3_key, &upload_id, payload).await {
            Ok(parts) => {
                let completed_upload = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();

                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(s3_key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed_upload)
                    .send()
                    .await
                    .map_err(|e| {
                        StorageError::MultipartFailed(DisplayErrorContext(e).to_string())
                    })?;

                Ok(())
            }
            Err(e) => {
                // Discard the parts uploaded so far
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(s3_key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        s3_key = %s3_key,
                        error = %DisplayErrorContext(abort_err),
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        s3_key: &str,
        upload_id: &str,
        payload: Bytes,
    ) -> Result<Vec<CompletedPart>, StorageError> {
        let mut completed_parts = Vec::new();
        let mut part_number = 1;
        let mut offset = 0;

        while offset < payload.len() {
            let end = (offset + self.part_size_bytes).min(payload.len());
            let body = ByteStream::from(payload.slice(offset..end));

            let upload_part_response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(s3_key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|e| StorageError::MultipartFailed(DisplayErrorContext(e).to_string()))?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(upload_part_response.e_tag().unwrap_or_default())
                    .build(),
            );

            part_number += 1;
            offset = end;
        }

        Ok(completed_parts)
    }
}

#[async_trait]
impl ObjectStore for S3Uploader {
    #[instrument(skip(self, payload, metadata), fields(key = %key, size_bytes = payload.len()))]
    async fn put(
        &self,
        key: &str,
        payload: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let size_bytes = payload.len();

        debug!(key = %key, "Uploading audio to S3");

        if size_bytes > self.multipart_threshold_bytes {
            self.multipart_upload(key, payload, content_type, metadata)
                .await?;
        } else {
            self.simple_upload(key, payload, content_type, metadata)
                .await?;
        }

        info!(key = %key, size_bytes, "Audio uploaded successfully");

        Ok(())
    }

    async fn check_ready(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(DisplayErrorContext(e).to_string()))?;

        Ok(())
    }
}

/// Content type for an audio file extension, used when the client sent none
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("wav"), "audio/wav");
        assert_eq!(content_type_for("mp3"), "audio/mpeg");
        assert_eq!(content_type_for("mp4"), "audio/mp4");
        assert_eq!(content_type_for("flac"), "audio/flac");
        assert_eq!(content_type_for("WAV"), "application/octet-stream");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::PutFailed("access denied".to_string());
        assert_eq!(err.to_string(), "Failed to put object: access denied");
    }
}
