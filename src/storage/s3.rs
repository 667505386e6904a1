use super::{read_local_file, ObjectStore};
use crate::auth::AuthorizationContext;
use crate::mime::upload_content_type;
use crate::models::SignedUrl;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Region, Client as S3Client};
use chrono::Utc;
use std::path::Path;
use std::time::Duration;

/// S3-compatible backend, e.g. Cloud Storage interoperability with HMAC keys.
///
/// HMAC keys both authorise the calls and sign URLs, so the
/// [`AuthorizationContext`] passed to each operation is not consulted.
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(
        access_key_id: String,
        secret_access_key: String,
        endpoint: String,
        region: String,
        bucket: String,
    ) -> Result<Self> {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "slide-image-placer",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region))
            .endpoint_url(endpoint)
            .load()
            .await;

        // Interop endpoints expect path-style addressing.
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, _auth: &AuthorizationContext, path: &Path, key: &str) -> Result<()> {
        let data = read_local_file(path).await?;
        let content_type = upload_content_type(&data, path);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Error::StorageWrite(format!("Failed to upload {}: {}", key, e)))?;

        Ok(())
    }

    async fn sign_download_url(
        &self,
        _auth: &AuthorizationContext,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl> {
        let presigning_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| Error::InvalidInput(format!("Invalid signed URL ttl: {}", e)))?;
        let now = Utc::now();

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| Error::StorageAuth(format!("Failed to presign {}: {}", key, e)))?;

        SignedUrl::new(presigned.uri().to_string(), now, ttl)
    }

    async fn delete(&self, _auth: &AuthorizationContext, key: &str) -> Result<()> {
        // S3 DELETE succeeds on missing keys; check first so a missing object is reported.
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                Error::StorageWrite(format!(
                    "Object {}/{} is missing or inaccessible: {}",
                    self.bucket, key, e
                ))
            })?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::StorageWrite(format!("Failed to delete {}: {}", key, e)))?;

        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn signs_with_context_key(&self) -> bool {
        false
    }
}
