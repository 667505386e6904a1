//! Credential loading and OAuth2 access tokens
//!
//! Turns a Google key file plus a list of scopes into an
//! [`AuthorizationContext`] that every storage and Slides call receives
//! explicitly.

pub mod key_file;
pub mod signer;
pub mod token;

pub use key_file::{AuthorizedUserKey, KeyFile, ServiceAccountKey};
pub use signer::ServiceAccountSigner;
pub use token::AccessToken;

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::Mutex;

#[derive(Debug)]
enum Credential {
    ServiceAccount {
        signer: ServiceAccountSigner,
        token_uri: String,
    },
    AuthorizedUser(AuthorizedUserKey),
    /// A bearer token issued elsewhere; it is used until it is rejected.
    Static,
}

/// Credential handle plus granted scopes for one invocation.
#[derive(Debug)]
pub struct AuthorizationContext {
    credential: Credential,
    scopes: BTreeSet<String>,
    http: reqwest::Client,
    cached: Mutex<Option<AccessToken>>,
}

impl AuthorizationContext {
    /// Load a `service_account` or `authorized_user` JSON key file.
    pub fn from_key_file<I, S>(path: &Path, scopes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let json = std::fs::read_to_string(path)?;
        let context = Self::from_key_json(&json, scopes)?;
        tracing::info!(
            "Loaded credentials for {} from {}",
            context.principal(),
            path.display()
        );
        Ok(context)
    }

    pub fn from_key_json<I, S>(json: &str, scopes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_file: KeyFile = serde_json::from_str(json)
            .map_err(|e| Error::Auth(format!("Unsupported or malformed key file: {}", e)))?;

        let credential = match key_file {
            KeyFile::ServiceAccount(key) => Credential::ServiceAccount {
                signer: ServiceAccountSigner::from_key(&key)?,
                token_uri: key.token_uri,
            },
            KeyFile::AuthorizedUser(key) => Credential::AuthorizedUser(key),
        };

        Ok(Self {
            credential,
            scopes: collect_scopes(scopes),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    /// Wrap an access token that was minted outside this process.
    pub fn from_access_token<I, S>(token: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            credential: Credential::Static,
            scopes: collect_scopes(scopes),
            http: reqwest::Client::new(),
            cached: Mutex::new(Some(AccessToken {
                token: token.into(),
                expires_at: DateTime::<Utc>::MAX_UTC,
            })),
        }
    }

    /// Use `client` for token exchanges instead of a private one.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Human-readable identity for log lines.
    pub fn principal(&self) -> &str {
        match &self.credential {
            Credential::ServiceAccount { signer, .. } => signer.client_email(),
            Credential::AuthorizedUser(key) => &key.client_id,
            Credential::Static => "pre-issued access token",
        }
    }

    pub fn can_sign(&self) -> bool {
        matches!(self.credential, Credential::ServiceAccount { .. })
    }

    /// Private-key signer for V4 signed URLs.
    pub fn signer(&self) -> Result<&ServiceAccountSigner> {
        match &self.credential {
            Credential::ServiceAccount { signer, .. } => Ok(signer),
            Credential::AuthorizedUser(_) => Err(Error::StorageAuth(
                "authorized_user credentials have no private key; signed URLs need a service account key file"
                    .to_string(),
            )),
            Credential::Static => Err(Error::StorageAuth(
                "a bare access token cannot sign URLs; use a service account key file".to_string(),
            )),
        }
    }

    /// Bearer token for API calls, refreshed when close to expiry.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.token.clone());
            }
        }

        let fresh = match &self.credential {
            Credential::ServiceAccount { signer, token_uri } => {
                let assertion = signer.assertion(&self.scopes, token_uri, Utc::now())?;
                token::exchange_jwt_assertion(&self.http, token_uri, &assertion).await?
            }
            Credential::AuthorizedUser(key) => {
                token::exchange_refresh_token(
                    &self.http,
                    &key.token_uri,
                    &key.client_id,
                    &key.client_secret,
                    &key.refresh_token,
                )
                .await?
            }
            Credential::Static => {
                return Err(Error::Auth("Pre-issued access token has expired".to_string()))
            }
        };

        tracing::debug!(
            "Obtained access token for {} (expires {})",
            self.principal(),
            fresh.expires_at
        );
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

fn collect_scopes<I, S>(scopes: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    scopes.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCOPES: [&str; 2] = [
        "https://www.googleapis.com/auth/presentations",
        "https://www.googleapis.com/auth/devstorage.read_write",
    ];

    fn service_account_json(token_uri: &str) -> String {
        let mut value: serde_json::Value =
            serde_json::from_str(include_str!("../../tests/fixtures/service_account.json"))
                .unwrap();
        value["token_uri"] = serde_json::Value::String(token_uri.to_string());
        value.to_string()
    }

    fn authorized_user_json(token_uri: &str) -> String {
        let mut value: serde_json::Value =
            serde_json::from_str(include_str!("../../tests/fixtures/authorized_user.json"))
                .unwrap();
        value["token_uri"] = serde_json::Value::String(token_uri.to_string());
        value.to_string()
    }

    #[tokio::test]
    async fn test_service_account_token_is_fetched_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("jwt-bearer"))
            .and(body_string_contains("assertion="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.service-token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let context = AuthorizationContext::from_key_json(
            &service_account_json(&format!("{}/token", server.uri())),
            SCOPES,
        )
        .unwrap();

        assert!(context.can_sign());
        assert_eq!(context.access_token().await.unwrap(), "ya29.service-token");
        assert_eq!(context.access_token().await.unwrap(), "ya29.service-token");
    }

    #[tokio::test]
    async fn test_authorized_user_uses_refresh_grant_and_cannot_sign() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.user-token",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let context = AuthorizationContext::from_key_json(
            &authorized_user_json(&format!("{}/token", server.uri())),
            SCOPES,
        )
        .unwrap()
        .with_http_client(reqwest::Client::new());

        assert!(!context.can_sign());
        assert!(matches!(context.signer(), Err(Error::StorageAuth(_))));
        assert_eq!(context.access_token().await.unwrap(), "ya29.user-token");
    }

    #[tokio::test]
    async fn test_token_endpoint_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let context = AuthorizationContext::from_key_json(
            &service_account_json(&format!("{}/token", server.uri())),
            SCOPES,
        )
        .unwrap();

        let err = context.access_token().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let context = AuthorizationContext::from_access_token("ya29.static", SCOPES);
        assert_eq!(context.access_token().await.unwrap(), "ya29.static");
        assert!(context.signer().is_err());
    }

    #[test]
    fn test_scopes_are_deduplicated() {
        let context =
            AuthorizationContext::from_access_token("t", ["scope-b", "scope-a", "scope-b"]);
        assert_eq!(context.scopes().len(), 2);
        assert!(context.has_scope("scope-a"));
        assert!(!context.has_scope("scope-c"));
    }

    #[test]
    fn test_missing_key_file_is_io_error() {
        let err = AuthorizationContext::from_key_file(
            Path::new("/nonexistent/credentials.json"),
            SCOPES,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_loads_key_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("credentials.json");
        std::fs::write(&key_path, service_account_json("https://oauth2.googleapis.com/token"))
            .unwrap();

        let context = AuthorizationContext::from_key_file(&key_path, SCOPES).unwrap();
        assert_eq!(
            context.principal(),
            "slide-placer@slides-test-project.iam.gserviceaccount.com"
        );
    }

    #[test]
    fn test_unknown_key_type_is_auth_error() {
        let err = AuthorizationContext::from_key_json(r#"{"type":"external_account"}"#, SCOPES)
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
