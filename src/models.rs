//! Data models and configuration
//!
//! Defines the request-scoped values that flow through one placement run and
//! the environment-backed configuration of the storage and Slides services.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A local image and the identifier it is published under.
///
/// `file_name` doubles as the bucket object key and the slide element id, so
/// it carries no extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReference {
    folder: PathBuf,
    file_name: String,
    extension: String,
}

impl ImageReference {
    pub fn new(
        folder: impl Into<PathBuf>,
        file_name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Result<Self> {
        let file_name = file_name.into();
        validate_identifier(&file_name)?;

        let extension = extension.into();
        let extension = if extension.is_empty() || extension.starts_with('.') {
            extension
        } else {
            format!(".{}", extension)
        };

        Ok(Self {
            folder: folder.into(),
            file_name,
            extension,
        })
    }

    /// Split an existing image path into folder, stem and extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                Error::InvalidInput(format!("Image path has no file name: {}", path.display()))
            })?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let folder = path.parent().unwrap_or_else(|| Path::new(""));

        Self::new(folder, file_name, extension)
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Local filesystem path of the image.
    pub fn path(&self) -> PathBuf {
        self.folder.join(format!("{}{}", self.file_name, self.extension))
    }

    /// Object key used in the bucket.
    pub fn object_key(&self) -> &str {
        &self.file_name
    }

    /// Element identifier used on the slide.
    pub fn element_id(&self) -> &str {
        &self.file_name
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Image file name must not be empty".to_string(),
        ));
    }
    if let Some(bad) = name.chars().find(|c| matches!(c, '.' | '/' | '\\')) {
        return Err(Error::InvalidInput(format!(
            "Image file name '{}' must not contain '{}' (it is used as an object key and slide element id)",
            name, bad
        )));
    }
    Ok(())
}

/// Scale and offset of a placed image, in EMU (914,400 per inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementTransform {
    scale_x: f64,
    scale_y: f64,
    translate_x: f64,
    translate_y: f64,
}

impl PlacementTransform {
    pub fn new(scale_x: f64, scale_y: f64, translate_x: f64, translate_y: f64) -> Result<Self> {
        let values = [
            ("scaleX", scale_x),
            ("scaleY", scale_y),
            ("translateX", translate_x),
            ("translateY", translate_y),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        if scale_x == 0.0 || scale_y == 0.0 {
            return Err(Error::InvalidInput(
                "scaleX and scaleY must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            scale_x,
            scale_y,
            translate_x,
            translate_y,
        })
    }

    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    pub fn translate_x(&self) -> f64 {
        self.translate_x
    }

    pub fn translate_y(&self) -> f64 {
        self.translate_y
    }
}

impl Default for PlacementTransform {
    fn default() -> Self {
        Self {
            scale_x: 1.8,
            scale_y: 1.8,
            translate_x: 1_100_000.0,
            translate_y: -500_000.0,
        }
    }
}

/// A time-limited GET URL for one object.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl SignedUrl {
    pub fn new(url: String, created_at: DateTime<Utc>, ttl: Duration) -> Result<Self> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::InvalidInput(format!("Signed URL ttl out of range: {}", e)))?;
        Ok(Self {
            url,
            expires_at: created_at + ttl,
        })
    }
}

/// Element ids currently on a slide, fetched right before placement.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    page_id: String,
    element_ids: Vec<String>,
    index: HashSet<String>,
}

impl PageSnapshot {
    pub fn new(page_id: impl Into<String>, element_ids: Vec<String>) -> Self {
        let index = element_ids.iter().cloned().collect();
        Self {
            page_id: page_id.into(),
            element_ids,
            index,
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Element ids in the order the service returned them.
    pub fn element_ids(&self) -> &[String] {
        &self.element_ids
    }

    pub fn contains(&self, element_id: &str) -> bool {
        self.index.contains(element_id)
    }

    pub fn is_empty(&self) -> bool {
        self.element_ids.is_empty()
    }
}

pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/presentations",
    "https://www.googleapis.com/auth/devstorage.read_write",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Gcs,
    S3,
}

impl std::str::FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gcs" | "google" => Ok(Self::Gcs),
            "s3" => Ok(Self::S3),
            other => Err(Error::Config(format!(
                "Unknown STORAGE_BACKEND '{}'. Expected 'gcs' or 's3'",
                other
            ))),
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials_path: Option<PathBuf>,
    pub access_token: Option<String>,
    pub scopes: Vec<String>,
    pub presentation_id: Option<String>,
    pub bucket: Option<String>,
    pub storage_backend: StorageBackend,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let credentials_path = var("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
        let access_token = var("GOOGLE_OAUTH_ACCESS_TOKEN");
        if credentials_path.is_none() && access_token.is_none() {
            return Err(Error::Config(
                "GOOGLE_APPLICATION_CREDENTIALS or GOOGLE_OAUTH_ACCESS_TOKEN must be set"
                    .to_string(),
            ));
        }

        let scopes = match var("GOOGLE_SCOPES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|scope| !scope.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StorageBackend::Gcs,
        };

        let s3_access_key_id = var("S3_ACCESS_KEY_ID");
        let s3_secret_access_key = var("S3_SECRET_ACCESS_KEY");
        if storage_backend == StorageBackend::S3 {
            if s3_access_key_id.is_none() {
                return Err(Error::Config("S3_ACCESS_KEY_ID not set".to_string()));
            }
            if s3_secret_access_key.is_none() {
                return Err(Error::Config("S3_SECRET_ACCESS_KEY not set".to_string()));
            }
        }

        let request_timeout = match var("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                Error::Config(format!("REQUEST_TIMEOUT_SECS must be an integer, got '{}'", raw))
            })?),
            None => Duration::from_secs(30),
        };

        Ok(Self {
            credentials_path,
            access_token,
            scopes,
            presentation_id: var("SLIDES_PRESENTATION_ID"),
            bucket: var("STORAGE_BUCKET"),
            storage_backend,
            s3_endpoint: var("S3_ENDPOINT")
                .unwrap_or_else(|| "https://storage.googleapis.com".to_string()),
            s3_region: var("S3_REGION").unwrap_or_else(|| "auto".to_string()),
            s3_access_key_id,
            s3_secret_access_key,
            request_timeout,
        })
    }

    pub fn require_presentation_id(&self) -> Result<&str> {
        self.presentation_id.as_deref().ok_or_else(|| {
            Error::Config("SLIDES_PRESENTATION_ID not set (or pass --presentation)".to_string())
        })
    }

    pub fn require_bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| Error::Config("STORAGE_BUCKET not set (or pass --bucket)".to_string()))
    }
}
