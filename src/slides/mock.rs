use super::types::{BatchUpdateResponse, EditOperation};
use super::PresentationService;
use crate::auth::AuthorizationContext;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory presentation: page id -> ordered element ids.
///
/// Batches are applied all-or-nothing, and object ids are unique across the
/// whole presentation, as in Slides.
#[derive(Clone)]
pub struct MockPresentationClient {
    pages: Arc<Mutex<HashMap<String, Vec<String>>>>,
    batches: Arc<Mutex<Vec<Vec<EditOperation>>>>,
    page_reads: Arc<Mutex<usize>>,
    batch_delay: Duration,
    fail_batches: bool,
}

impl MockPresentationClient {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(HashMap::new())),
            batches: Arc::new(Mutex::new(Vec::new())),
            page_reads: Arc::new(Mutex::new(0)),
            batch_delay: Duration::ZERO,
            fail_batches: false,
        }
    }

    pub fn with_page(self, page_id: &str, element_ids: &[&str]) -> Self {
        self.pages.lock().unwrap().insert(
            page_id.to_string(),
            element_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    /// Sleep (on the tokio clock) inside every batch update.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    pub fn get_batches(&self) -> Vec<Vec<EditOperation>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn get_page_read_count(&self) -> usize {
        *self.page_reads.lock().unwrap()
    }

    pub fn get_page(&self, page_id: &str) -> Option<Vec<String>> {
        self.pages.lock().unwrap().get(page_id).cloned()
    }

    fn apply(pages: &mut HashMap<String, Vec<String>>, operation: &EditOperation) -> Result<()> {
        match operation {
            EditOperation::DeleteElement(op) => {
                let page = pages
                    .values_mut()
                    .find(|elements| elements.contains(&op.object_id))
                    .ok_or_else(|| {
                        Error::PresentationEdit(format!(
                            "The object ({}) could not be found.",
                            op.object_id
                        ))
                    })?;
                page.retain(|id| id != &op.object_id);
            }
            EditOperation::CreateImage(op) => {
                if pages.values().any(|elements| elements.contains(&op.object_id)) {
                    return Err(Error::PresentationEdit(format!(
                        "The object ID ({}) should be unique among all pages and page elements.",
                        op.object_id
                    )));
                }
                let page_id = &op.element_properties.page_object_id;
                let page = pages.get_mut(page_id).ok_or_else(|| {
                    Error::PresentationEdit(format!("The page ({}) could not be found.", page_id))
                })?;
                page.push(op.object_id.clone());
            }
        }
        Ok(())
    }
}

impl Default for MockPresentationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PresentationService for MockPresentationClient {
    async fn page_element_ids(
        &self,
        _auth: &AuthorizationContext,
        _presentation_id: &str,
        page_id: &str,
    ) -> Result<Vec<String>> {
        *self.page_reads.lock().unwrap() += 1;

        self.pages
            .lock()
            .unwrap()
            .get(page_id)
            .cloned()
            .ok_or_else(|| {
                Error::PresentationEdit(format!("The page ({}) could not be found.", page_id))
            })
    }

    async fn batch_update(
        &self,
        _auth: &AuthorizationContext,
        presentation_id: &str,
        operations: &[EditOperation],
    ) -> Result<BatchUpdateResponse> {
        self.batches.lock().unwrap().push(operations.to_vec());

        if !self.batch_delay.is_zero() {
            tokio::time::sleep(self.batch_delay).await;
        }
        if self.fail_batches {
            return Err(Error::PresentationEdit(
                "Mock batchUpdate rejected".to_string(),
            ));
        }

        let mut pages = self.pages.lock().unwrap();
        let mut staged = pages.clone();
        for operation in operations {
            Self::apply(&mut staged, operation)?;
        }
        *pages = staged;

        Ok(BatchUpdateResponse {
            presentation_id: Some(presentation_id.to_string()),
            replies: vec![serde_json::Value::Object(Default::default()); operations.len()],
        })
    }
}
