//! Orchestration of one upload → sign → place → cleanup run.

use crate::auth::AuthorizationContext;
use crate::models::{Config, ImageReference, PlacementTransform, StorageBackend};
use crate::placement::place_image;
use crate::slides::{PresentationService, SlidesClient};
use crate::storage::{GcsClient, ObjectStore, S3ObjectStore};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Validity of the signed URL handed to Slides.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60);

/// Progress of a run; a failure leaves the run at the last state reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Uploaded,
    UrlSigned,
    Placed,
    CleanedUp,
}

/// One image to place on one page.
#[derive(Debug, Clone)]
pub struct PlacementJob {
    pub image: ImageReference,
    pub page_id: String,
    pub transform: PlacementTransform,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PlacementReport {
    pub object_key: String,
    pub element_id: String,
    pub page_id: String,
    pub replaced_existing: bool,
    pub url_expires_at: DateTime<Utc>,
    /// Time between the signed URL being issued and the object being deleted.
    pub accessible_for: Duration,
}

/// Sequences the storage and Slides calls for a presentation.
pub struct App {
    storage: Box<dyn ObjectStore>,
    slides: Box<dyn PresentationService>,
    presentation_id: String,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub storage: Box<dyn ObjectStore>,
    pub slides: Box<dyn PresentationService>,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(services: AppServices, presentation_id: String) -> Self {
        Self {
            storage: services.storage,
            slides: services.slides,
            presentation_id,
        }
    }

    /// Construct the real storage and Slides clients from configuration.
    ///
    /// `http_client` is shared by both clients; pass the same one to
    /// [`AuthorizationContext::with_http_client`] so token exchanges reuse it.
    pub async fn new(config: &Config, http_client: reqwest::Client) -> Result<Self> {
        let presentation_id = config.require_presentation_id()?.to_string();
        let bucket = config.require_bucket()?.to_string();

        let storage: Box<dyn ObjectStore> = match config.storage_backend {
            StorageBackend::Gcs => {
                info!("Storage backend: Cloud Storage (bucket: {})", bucket);
                Box::new(GcsClient::new_with_client(
                    bucket,
                    config.request_timeout,
                    http_client.clone(),
                ))
            }
            StorageBackend::S3 => {
                info!(
                    "Storage backend: S3-compatible at {} (bucket: {})",
                    config.s3_endpoint, bucket
                );
                let access_key_id = config.s3_access_key_id.clone().ok_or_else(|| {
                    Error::Config("S3_ACCESS_KEY_ID not set".to_string())
                })?;
                let secret_access_key = config.s3_secret_access_key.clone().ok_or_else(|| {
                    Error::Config("S3_SECRET_ACCESS_KEY not set".to_string())
                })?;
                Box::new(
                    S3ObjectStore::new(
                        access_key_id,
                        secret_access_key,
                        config.s3_endpoint.clone(),
                        config.s3_region.clone(),
                        bucket,
                    )
                    .await?,
                )
            }
        };

        let slides = Box::new(SlidesClient::new_with_client(
            config.request_timeout,
            http_client,
        ));

        Ok(Self::with_services(
            AppServices { storage, slides },
            presentation_id,
        ))
    }

    pub fn presentation_id(&self) -> &str {
        &self.presentation_id
    }

    /// Upload, sign, place, then delete the temporary object.
    ///
    /// Any failure stops the run immediately. If placement fails the uploaded
    /// object is left in the bucket; the key is logged so it can be removed.
    pub async fn run(
        &self,
        auth: &AuthorizationContext,
        job: &PlacementJob,
    ) -> Result<PlacementReport> {
        let mut state = PipelineState::Start;
        let result = self.advance(auth, job, &mut state).await;

        if let Err(e) = &result {
            error!(
                "Run for {} failed after state {:?}: {}",
                job.image.file_name(),
                state,
                e
            );
            if matches!(
                state,
                PipelineState::Uploaded | PipelineState::UrlSigned | PipelineState::Placed
            ) {
                warn!(
                    "Temporary object {}/{} was not deleted and may remain in the bucket",
                    self.storage.bucket(),
                    job.image.object_key()
                );
            }
        }
        result
    }

    async fn advance(
        &self,
        auth: &AuthorizationContext,
        job: &PlacementJob,
        state: &mut PipelineState,
    ) -> Result<PlacementReport> {
        let key = job.image.object_key();
        let local_path = job.image.path();

        // Signing happens after upload, so a key that cannot sign would strand the object.
        if self.storage.signs_with_context_key() && !auth.can_sign() {
            return Err(Error::StorageAuth(format!(
                "Credentials for {} cannot sign download URLs; use a service account key file",
                auth.principal()
            )));
        }

        self.storage.upload(auth, &local_path, key).await?;
        *state = PipelineState::Uploaded;
        info!(
            "Uploaded {} to bucket {} as {}",
            local_path.display(),
            self.storage.bucket(),
            key
        );

        let signed = self
            .storage
            .sign_download_url(auth, key, SIGNED_URL_TTL)
            .await?;
        let accessible_since = Instant::now();
        *state = PipelineState::UrlSigned;
        info!("Signed URL generated (expires {})", signed.expires_at);

        let outcome = place_image(
            self.slides.as_ref(),
            auth,
            &self.presentation_id,
            &job.page_id,
            job.image.element_id(),
            &signed.url,
            job.transform,
        )
        .await?;
        *state = PipelineState::Placed;

        self.storage.delete(auth, key).await?;
        let accessible_for = accessible_since.elapsed();
        *state = PipelineState::CleanedUp;
        info!("Deleted {} from bucket {}", key, self.storage.bucket());

        Ok(PlacementReport {
            object_key: key.to_string(),
            element_id: job.image.element_id().to_string(),
            page_id: job.page_id.clone(),
            replaced_existing: outcome.replaced_existing,
            url_expires_at: signed.expires_at,
            accessible_for,
        })
    }
}
