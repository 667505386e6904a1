use super::signing::{self, SignRequest, DEFAULT_SIGNING_HOST, UNRESERVED};
use super::{read_local_file, ObjectStore};
use crate::auth::AuthorizationContext;
use crate::mime::upload_content_type;
use crate::models::SignedUrl;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use percent_encoding::utf8_percent_encode;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";

/// Cloud Storage JSON API client authorised with OAuth bearer tokens.
pub struct GcsClient {
    client: Client,
    bucket: String,
    base_url: String,
    signing_host: String,
    timeout: Duration,
}

impl GcsClient {
    pub fn new(bucket: String, timeout: Duration) -> Self {
        Self::new_with_client(bucket, timeout, Client::new())
    }

    pub fn new_with_client(bucket: String, timeout: Duration, client: Client) -> Self {
        Self {
            client,
            bucket,
            base_url: DEFAULT_BASE_URL.to_string(),
            signing_host: DEFAULT_SIGNING_HOST.to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            self.bucket,
            utf8_percent_encode(key, UNRESERVED)
        )
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn upload(&self, auth: &AuthorizationContext, path: &Path, key: &str) -> Result<()> {
        let data = read_local_file(path).await?;
        let content_type = upload_content_type(&data, path);
        let token = auth.access_token().await?;

        tracing::debug!(
            "Uploading {} ({} bytes, {}) to gs://{}/{}",
            path.display(),
            data.len(),
            content_type,
            self.bucket,
            key
        );

        let response = self
            .client
            .post(format!(
                "{}/upload/storage/v1/b/{}/o",
                self.base_url, self.bucket
            ))
            .query(&[("uploadType", "media"), ("name", key)])
            .timeout(self.timeout)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send upload request to Cloud Storage: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Cloud Storage upload error (status {}): {}", status, error_text);
            return Err(Error::StorageWrite(format!(
                "Failed to upload {} (status {}): {}",
                key, status, error_text
            )));
        }

        Ok(())
    }

    async fn sign_download_url(
        &self,
        auth: &AuthorizationContext,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl> {
        let signer = auth.signer()?;
        let now = Utc::now();

        let url = signing::sign_url(
            signer,
            &SignRequest {
                host: &self.signing_host,
                bucket: &self.bucket,
                object: key,
                method: "GET",
                ttl,
                timestamp: now,
            },
        )?;

        SignedUrl::new(url, now, ttl)
    }

    async fn delete(&self, auth: &AuthorizationContext, key: &str) -> Result<()> {
        let token = auth.access_token().await?;

        let response = self
            .client
            .delete(self.object_url(key))
            .timeout(self.timeout)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send delete request to Cloud Storage: {}", e);
                e
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::StorageWrite(format!(
                "Object gs://{}/{} does not exist",
                self.bucket, key
            ))),
            status => {
                let error_text = response.text().await?;
                tracing::error!("Cloud Storage delete error (status {}): {}", status, error_text);
                Err(Error::StorageWrite(format!(
                    "Failed to delete {} (status {}): {}",
                    key, status, error_text
                )))
            }
        }
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn make_client(server: &MockServer) -> GcsClient {
        GcsClient::new("slide-images".to_string(), Duration::from_secs(5))
            .with_base_url(server.uri())
    }

    fn token_auth() -> AuthorizationContext {
        AuthorizationContext::from_access_token("ya29.test", ["scope"])
    }

    fn write_image(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let image_path = dir.path().join("cat.png");
        std::fs::write(&image_path, PNG_BYTES).unwrap();
        image_path
    }

    #[tokio::test]
    async fn test_upload_posts_media_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/slide-images/o"))
            .and(query_param("uploadType", "media"))
            .and(query_param("name", "cat"))
            .and(header("authorization", "Bearer ya29.test"))
            .and(header("content-type", "image/png"))
            .and(body_bytes(PNG_BYTES))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "cat", "bucket": "slide-images"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image_path = write_image(&dir);

        make_client(&server)
            .upload(&token_auth(), &image_path, "cat")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_forbidden_is_storage_write_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string("storage.objects.create denied"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image_path = write_image(&dir);

        let err = make_client(&server)
            .upload(&token_auth(), &image_path, "cat")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageWrite(_)));
    }

    #[tokio::test]
    async fn test_upload_missing_file_never_calls_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = make_client(&server)
            .upload(&token_auth(), Path::new("/nonexistent/cat.png"), "cat")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageWrite(_)));
    }

    #[tokio::test]
    async fn test_delete_success_and_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/slide-images/o/cat"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/slide-images/o/dog"))
            .respond_with(ResponseTemplate::new(404).set_body_string("No such object"))
            .mount(&server)
            .await;

        let client = make_client(&server);
        client.delete(&token_auth(), "cat").await.unwrap();

        let err = client.delete(&token_auth(), "dog").await.unwrap_err();
        assert!(matches!(err, Error::StorageWrite(_)));
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_sign_requires_private_key() {
        let client = GcsClient::new("slide-images".to_string(), Duration::from_secs(5));
        let err = client
            .sign_download_url(&token_auth(), "cat", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageAuth(_)));
    }

    #[tokio::test]
    async fn test_sign_with_service_account_key() {
        let auth = AuthorizationContext::from_key_json(
            include_str!("../../tests/fixtures/service_account.json"),
            ["scope"],
        )
        .unwrap();
        let client = GcsClient::new("slide-images".to_string(), Duration::from_secs(5));

        let signed = client
            .sign_download_url(&auth, "cat", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(signed
            .url
            .starts_with("https://storage.googleapis.com/slide-images/cat?"));
        assert!(signed.url.contains("X-Goog-Expires=60"));
        assert!(signed.url.contains("X-Goog-Signature="));
        assert!(signed.expires_at > Utc::now());
    }
}
