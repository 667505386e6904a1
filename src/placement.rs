//! Replace-or-create placement of an image on a slide.
//!
//! An image is identified on its page by an element id. Placing it again
//! deletes the previous element with that id in the same atomic batch, so a
//! page never holds two copies.

use crate::auth::AuthorizationContext;
use crate::models::{PageSnapshot, PlacementTransform};
use crate::slides::{EditOperation, PresentationService};
use crate::Result;
use tracing::info;

/// What a placement did to the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementOutcome {
    pub replaced_existing: bool,
    pub operations: Vec<EditOperation>,
}

/// Build the batch for placing `element_id` given the current page contents.
pub fn plan_placement(
    snapshot: &PageSnapshot,
    element_id: &str,
    image_url: &str,
    transform: PlacementTransform,
) -> Vec<EditOperation> {
    let mut operations = Vec::with_capacity(2);
    if snapshot.contains(element_id) {
        operations.push(EditOperation::delete_element(element_id));
    }
    operations.push(EditOperation::create_image(
        element_id,
        image_url,
        snapshot.page_id(),
        transform,
    ));
    operations
}

/// Read the page, then delete-and-recreate or create the image element.
pub async fn place_image(
    slides: &dyn PresentationService,
    auth: &AuthorizationContext,
    presentation_id: &str,
    page_id: &str,
    element_id: &str,
    image_url: &str,
    transform: PlacementTransform,
) -> Result<PlacementOutcome> {
    let element_ids = slides
        .page_element_ids(auth, presentation_id, page_id)
        .await?;
    let snapshot = PageSnapshot::new(page_id, element_ids);

    let operations = plan_placement(&snapshot, element_id, image_url, transform);
    let replaced_existing = operations.len() > 1;
    if replaced_existing {
        info!(
            "Element {} already on page {}; replacing it",
            element_id, page_id
        );
    }

    slides
        .batch_update(auth, presentation_id, &operations)
        .await?;
    info!(
        "Placed image {} on page {} ({} operation(s))",
        element_id,
        page_id,
        operations.len()
    );

    Ok(PlacementOutcome {
        replaced_existing,
        operations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slides::MockPresentationClient;
    use crate::Error;
    use pretty_assertions::assert_eq;

    fn auth() -> AuthorizationContext {
        AuthorizationContext::from_access_token("ya29.test", ["scope"])
    }

    #[test]
    fn test_plan_on_empty_page_only_creates() {
        let snapshot = PageSnapshot::new("p1", vec![]);
        let operations =
            plan_placement(&snapshot, "cat", "https://u", PlacementTransform::default());

        assert_eq!(operations.len(), 1);
        assert!(matches!(operations[0], EditOperation::CreateImage(_)));
    }

    #[test]
    fn test_plan_deletes_before_creating_existing_id() {
        let snapshot = PageSnapshot::new(
            "p1",
            vec!["title".to_string(), "cat".to_string(), "footer".to_string()],
        );
        let operations =
            plan_placement(&snapshot, "cat", "https://u", PlacementTransform::default());

        assert_eq!(
            operations,
            vec![
                EditOperation::delete_element("cat"),
                EditOperation::create_image(
                    "cat",
                    "https://u",
                    "p1",
                    PlacementTransform::default()
                ),
            ]
        );
    }

    #[test]
    fn test_plan_ignores_similar_ids() {
        let snapshot = PageSnapshot::new("p1", vec!["cat2".to_string(), "my_cat".to_string()]);
        let operations =
            plan_placement(&snapshot, "cat", "https://u", PlacementTransform::default());
        assert_eq!(operations.len(), 1);
    }

    #[tokio::test]
    async fn test_placing_twice_leaves_one_element() {
        let slides = MockPresentationClient::new().with_page("p1", &["title"]);
        let auth = auth();
        let transform = PlacementTransform::default();

        let first = place_image(&slides, &auth, "pres", "p1", "cat", "https://u1", transform)
            .await
            .unwrap();
        let second = place_image(&slides, &auth, "pres", "p1", "cat", "https://u2", transform)
            .await
            .unwrap();

        assert!(!first.replaced_existing);
        assert!(second.replaced_existing);

        let page = slides.get_page("p1").unwrap();
        assert_eq!(page.iter().filter(|id| id.as_str() == "cat").count(), 1);
        assert_eq!(page.len(), 2);

        let batches = slides.get_batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1][0], EditOperation::delete_element("cat"));
    }

    #[tokio::test]
    async fn test_page_read_failure_skips_batch() {
        let slides = MockPresentationClient::new();
        let err = place_image(
            &slides,
            &auth(),
            "pres",
            "missing-page",
            "cat",
            "https://u",
            PlacementTransform::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::PresentationEdit(_)));
        assert!(slides.get_batches().is_empty());
    }
}
