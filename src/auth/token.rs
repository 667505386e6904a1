use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before their reported expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_SKEW_SECS) > now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub(crate) async fn exchange_jwt_assertion(
    client: &Client,
    token_uri: &str,
    assertion: &str,
) -> Result<AccessToken> {
    request_token(
        client,
        token_uri,
        &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)],
    )
    .await
}

pub(crate) async fn exchange_refresh_token(
    client: &Client,
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<AccessToken> {
    request_token(
        client,
        token_uri,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ],
    )
    .await
}

async fn request_token(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<AccessToken> {
    tracing::debug!("Requesting access token from {}", token_uri);

    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to reach token endpoint: {}", e);
            e
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await?;
        tracing::error!("Token endpoint error (status {}): {}", status, error_text);
        return Err(Error::Auth(format!(
            "Token request failed (status {}): {}",
            status, error_text
        )));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::Auth(format!("Failed to parse token response: {}", e)))?;

    Ok(AccessToken {
        token: body.access_token,
        expires_at: Utc::now() + Duration::seconds(body.expires_in.unwrap_or(3600)),
    })
}
