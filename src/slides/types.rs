//! Slides API payloads used by page reads and batch updates.

use crate::models::PlacementTransform;
use serde::{Deserialize, Serialize};

/// Side length of every created image before scaling: 4,000,000 EMU (~4.37 in).
pub const IMAGE_SIDE_EMU: f64 = 4_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "EMU")]
    Emu,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub magnitude: f64,
    pub unit: Unit,
}

impl Dimension {
    pub fn emu(magnitude: f64) -> Self {
        Self {
            magnitude,
            unit: Unit::Emu,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub height: Dimension,
    pub width: Dimension,
}

impl Size {
    pub fn square_emu(side: f64) -> Self {
        Self {
            height: Dimension::emu(side),
            width: Dimension::emu(side),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffineTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub unit: Unit,
}

impl From<PlacementTransform> for AffineTransform {
    fn from(transform: PlacementTransform) -> Self {
        Self {
            scale_x: transform.scale_x(),
            scale_y: transform.scale_y(),
            translate_x: transform.translate_x(),
            translate_y: transform.translate_y(),
            unit: Unit::Emu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementProperties {
    pub page_object_id: String,
    pub size: Size,
    pub transform: AffineTransform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteElement {
    pub object_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateImage {
    pub object_id: String,
    pub url: String,
    pub element_properties: ElementProperties,
}

/// One entry of a `batchUpdate` request, applied in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EditOperation {
    #[serde(rename = "deleteObject")]
    DeleteElement(DeleteElement),
    #[serde(rename = "createImage")]
    CreateImage(CreateImage),
}

impl EditOperation {
    pub fn delete_element(object_id: impl Into<String>) -> Self {
        Self::DeleteElement(DeleteElement {
            object_id: object_id.into(),
        })
    }

    pub fn create_image(
        object_id: impl Into<String>,
        url: impl Into<String>,
        page_object_id: impl Into<String>,
        transform: PlacementTransform,
    ) -> Self {
        Self::CreateImage(CreateImage {
            object_id: object_id.into(),
            url: url.into(),
            element_properties: ElementProperties {
                page_object_id: page_object_id.into(),
                size: Size::square_emu(IMAGE_SIDE_EMU),
                transform: transform.into(),
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct BatchUpdateRequest<'a> {
    pub requests: &'a [EditOperation],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    #[serde(default)]
    pub presentation_id: Option<String>,
    #[serde(default)]
    pub replies: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub page_elements: Vec<PageElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageElement {
    pub object_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_image_wire_format() {
        let transform = PlacementTransform::new(1.8, 1.8, 1_100_000.0, -500_000.0).unwrap();
        let op = EditOperation::create_image("cat", "https://signed", "p1", transform);

        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "createImage": {
                    "objectId": "cat",
                    "url": "https://signed",
                    "elementProperties": {
                        "pageObjectId": "p1",
                        "size": {
                            "height": { "magnitude": 4000000.0, "unit": "EMU" },
                            "width": { "magnitude": 4000000.0, "unit": "EMU" }
                        },
                        "transform": {
                            "scaleX": 1.8,
                            "scaleY": 1.8,
                            "translateX": 1100000.0,
                            "translateY": -500000.0,
                            "unit": "EMU"
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_delete_object_wire_format() {
        let json = serde_json::to_value(EditOperation::delete_element("cat")).unwrap();
        assert_eq!(json, serde_json::json!({ "deleteObject": { "objectId": "cat" } }));
    }

    #[test]
    fn test_page_without_elements_parses() {
        let page: Page = serde_json::from_str(r#"{"objectId":"p1","pageType":"SLIDE"}"#).unwrap();
        assert!(page.page_elements.is_empty());
    }

    #[test]
    fn test_page_elements_keep_order() {
        let page: Page = serde_json::from_str(
            r#"{"objectId":"p1","pageElements":[{"objectId":"b","shape":{}},{"objectId":"a"}]}"#,
        )
        .unwrap();
        let ids: Vec<&str> = page
            .page_elements
            .iter()
            .map(|e| e.object_id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
