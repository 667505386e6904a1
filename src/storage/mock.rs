use super::ObjectStore;
use crate::auth::AuthorizationContext;
use crate::models::SignedUrl;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One call made against [`MockObjectStore`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageCall {
    Upload { path: PathBuf, key: String },
    Sign { key: String, ttl: Duration },
    Delete { key: String },
}

#[derive(Clone)]
pub struct MockObjectStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    calls: Arc<Mutex<Vec<StorageCall>>>,
    bucket: String,
    base_url: String,
    upload_delay: Duration,
    fail_uploads: bool,
    backend_signing: bool,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            bucket: "mock-bucket".to_string(),
            base_url: "https://mock-storage.example.com".to_string(),
            upload_delay: Duration::ZERO,
            fail_uploads: false,
            backend_signing: false,
        }
    }

    pub fn with_bucket(mut self, bucket: String) -> Self {
        self.bucket = bucket;
        self
    }

    /// Sleep (on the tokio clock) inside every upload.
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    pub fn with_failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    /// Sign with backend-held keys, like HMAC-signed S3 URLs.
    pub fn with_backend_signing(mut self) -> Self {
        self.backend_signing = true;
        self
    }

    pub fn with_object(self, key: String, content: Vec<u8>) -> Self {
        self.objects.lock().unwrap().insert(key, content);
        self
    }

    pub fn get_calls(&self) -> Vec<StorageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get_delete_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, StorageCall::Delete { .. }))
            .count()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    fn record(&self, call: StorageCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn upload(&self, _auth: &AuthorizationContext, path: &Path, key: &str) -> Result<()> {
        self.record(StorageCall::Upload {
            path: path.to_path_buf(),
            key: key.to_string(),
        });

        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }
        if self.fail_uploads {
            return Err(Error::StorageWrite(format!("Upload of {} refused", key)));
        }

        let data = super::read_local_file(path).await?;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn sign_download_url(
        &self,
        auth: &AuthorizationContext,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl> {
        self.record(StorageCall::Sign {
            key: key.to_string(),
            ttl,
        });
        if !self.backend_signing {
            auth.signer()?;
        }

        SignedUrl::new(
            format!(
                "{}/{}/{}?expires={}",
                self.base_url,
                self.bucket,
                key,
                ttl.as_secs()
            ),
            Utc::now(),
            ttl,
        )
    }

    async fn delete(&self, _auth: &AuthorizationContext, key: &str) -> Result<()> {
        self.record(StorageCall::Delete {
            key: key.to_string(),
        });

        match self.objects.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::StorageWrite(format!("Object {} does not exist", key))),
        }
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn signs_with_context_key(&self) -> bool {
        !self.backend_signing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signing_auth() -> AuthorizationContext {
        AuthorizationContext::from_key_json(
            include_str!("../../tests/fixtures/service_account.json"),
            ["scope"],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_mock_storage_upload_sign_delete() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("cat.png");
        std::fs::write(&image_path, b"png").unwrap();

        let store = MockObjectStore::new();
        let auth = signing_auth();

        store.upload(&auth, &image_path, "cat").await.unwrap();
        assert!(store.contains("cat"));

        let signed = store
            .sign_download_url(&auth, "cat", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            signed.url,
            "https://mock-storage.example.com/mock-bucket/cat?expires=60"
        );

        store.delete(&auth, "cat").await.unwrap();
        assert!(!store.contains("cat"));
        assert_eq!(store.get_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_storage_delete_missing_object_fails() {
        let store = MockObjectStore::new();
        let err = store.delete(&signing_auth(), "ghost").await.unwrap_err();
        assert!(matches!(err, Error::StorageWrite(_)));
        assert_eq!(store.get_delete_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_storage_sign_without_private_key_fails() {
        let store = MockObjectStore::new().with_object("cat".to_string(), vec![1]);
        let auth = AuthorizationContext::from_access_token("ya29.token", ["scope"]);
        let err = store
            .sign_download_url(&auth, "cat", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageAuth(_)));
    }
}
