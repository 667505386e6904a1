use super::types::{BatchUpdateRequest, BatchUpdateResponse, EditOperation, Page};
use super::PresentationService;
use crate::auth::AuthorizationContext;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://slides.googleapis.com";

/// Slides REST v1 client.
pub struct SlidesClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl SlidesClient {
    pub fn new(timeout: Duration) -> Self {
        Self::new_with_client(timeout, Client::new())
    }

    pub fn new_with_client(timeout: Duration, client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn check_status(response: Response, action: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let error_text = response.text().await?;
        tracing::error!("Slides API error during {} (status {}): {}", action, status, error_text);
        Err(Error::PresentationEdit(format!(
            "{} failed (status {}): {}",
            action, status, error_text
        )))
    }
}

#[async_trait]
impl PresentationService for SlidesClient {
    async fn page_element_ids(
        &self,
        auth: &AuthorizationContext,
        presentation_id: &str,
        page_id: &str,
    ) -> Result<Vec<String>> {
        let token = auth.access_token().await?;
        let url = format!(
            "{}/v1/presentations/{}/pages/{}",
            self.base_url, presentation_id, page_id
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send page request to Slides: {}", e);
                e
            })?;
        let response = Self::check_status(response, "page read").await?;

        let body = response.text().await?;
        let page: Page = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse Slides page: {}\nBody: {}", e, body);
            Error::PresentationEdit(format!("Failed to parse Slides page: {}", e))
        })?;

        tracing::debug!(
            "Page {} has {} element(s)",
            page.object_id.as_deref().unwrap_or(page_id),
            page.page_elements.len()
        );

        Ok(page
            .page_elements
            .into_iter()
            .map(|element| element.object_id)
            .collect())
    }

    async fn batch_update(
        &self,
        auth: &AuthorizationContext,
        presentation_id: &str,
        operations: &[EditOperation],
    ) -> Result<BatchUpdateResponse> {
        let token = auth.access_token().await?;
        let url = format!(
            "{}/v1/presentations/{}:batchUpdate",
            self.base_url, presentation_id
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .bearer_auth(token)
            .json(&BatchUpdateRequest {
                requests: operations,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send batchUpdate to Slides: {}", e);
                e
            })?;
        let response = Self::check_status(response, "batchUpdate").await?;

        response.json().await.map_err(|e| {
            Error::PresentationEdit(format!("Failed to parse batchUpdate reply: {}", e))
        })
    }
}
