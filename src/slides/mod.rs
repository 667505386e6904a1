//! Google Slides integration
//!
//! Reads the element ids on a page and submits ordered batch edits
//! (delete element, create image) against a presentation.

pub mod client;
pub mod mock;
pub mod types;

pub use client::SlidesClient;
pub use mock::MockPresentationClient;
pub use types::{BatchUpdateResponse, EditOperation, IMAGE_SIDE_EMU};

use crate::auth::AuthorizationContext;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PresentationService: Send + Sync {
    /// Element ids on `page_id`, in page order. Empty pages yield an empty vec.
    async fn page_element_ids(
        &self,
        auth: &AuthorizationContext,
        presentation_id: &str,
        page_id: &str,
    ) -> Result<Vec<String>>;

    /// Apply `operations` atomically and in order.
    async fn batch_update(
        &self,
        auth: &AuthorizationContext,
        presentation_id: &str,
        operations: &[EditOperation],
    ) -> Result<BatchUpdateResponse>;
}
