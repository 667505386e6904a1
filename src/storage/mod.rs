//! Object storage for the temporary image copy
//!
//! Uploads an image to a bucket, signs a short-lived GET URL for it and
//! deletes it again. Google Cloud Storage is the default backend; any
//! S3-compatible endpoint (including GCS interoperability mode) also works.

pub mod gcs;
pub mod mock;
pub mod s3;
pub mod signing;

pub use gcs::GcsClient;
pub use mock::{MockObjectStore, StorageCall};
pub use s3::S3ObjectStore;

use crate::auth::AuthorizationContext;
use crate::models::SignedUrl;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the file at `path` under `key`.
    async fn upload(&self, auth: &AuthorizationContext, path: &Path, key: &str) -> Result<()>;

    /// Sign a GET URL for `key` valid for `ttl`.
    async fn sign_download_url(
        &self,
        auth: &AuthorizationContext,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl>;

    /// Remove `key`. Deleting a missing object is an error.
    async fn delete(&self, auth: &AuthorizationContext, key: &str) -> Result<()>;

    fn bucket(&self) -> &str;

    /// Whether signing uses the private key held by the [`AuthorizationContext`]
    /// rather than credentials owned by the backend.
    fn signs_with_context_key(&self) -> bool {
        true
    }
}

/// Read an image for upload; a missing file is a storage write failure.
pub(crate) async fn read_local_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        Error::StorageWrite(format!("Cannot read {} for upload: {}", path.display(), e))
    })
}
