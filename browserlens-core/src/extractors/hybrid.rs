//! Hybrid Extractor — the a11y tree with `vision-region` leaves spliced
//! in under canvas/WebGL bounding boxes, §4.3.

use super::a11y;
use super::Extractor;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::model::{Node, Origin, Rect, Role, StateTree};
use crate::page::{A11ySnapshotOptions, PageHandle};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Roles that may anchor a spliced-in vision region, §4.3: "the nearest
/// ancestor whose a11y role is one of region, main, figure, application".
fn is_vision_anchor(role: &Role) -> bool {
    matches!(role, Role::Region | Role::Main | Role::Figure | Role::Application)
}

fn rect_contains(outer: &Rect, inner: &Rect) -> bool {
    outer.x <= inner.x
        && outer.y <= inner.y
        && outer.x + outer.width >= inner.x + inner.width
        && outer.y + outer.height >= inner.y + inner.height
}

/// Opaque handle for a vision region. Implementations that want
/// byte-identity equivalence (§9, Open Question ii) can rely on this
/// being the base64 encoding of the exact bytes returned by the page
/// handle's `screenshot`, so equal bytes always produce equal tokens.
pub(crate) fn vision_token(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Recursively finds the innermost descendant of `node` that is both a
/// qualifying anchor role and whose bounds contain `target`. Falls back
/// to `None` so the caller can splice onto the tree root instead.
fn find_anchor<'a>(node: &'a mut Node, target: &Rect) -> Option<&'a mut Node> {
    for child in node.children.iter_mut() {
        if let Some(found) = find_anchor(child, target) {
            return Some(found);
        }
    }
    if is_vision_anchor(&node.role) && node.bounds.map(|b| rect_contains(&b, target)).unwrap_or(false) {
        Some(node)
    } else {
        None
    }
}

fn vision_leaf(bounds: Rect, token: String) -> Node {
    let mut leaf = Node::new(Role::Other("vision-region".to_string()), Origin::VisionRegion);
    leaf.value = Some(token);
    leaf.bounds = Some(bounds);
    leaf
}

pub struct HybridExtractor;

#[async_trait]
impl Extractor for HybridExtractor {
    async fn extract(&self, page: &dyn PageHandle, config: &SessionConfig) -> Result<StateTree> {
        let raw = page
            .accessibility_snapshot(A11ySnapshotOptions {
                interactive_only: false,
            })
            .await
            .map_err(|e| crate::error::BrowserLensError::PageUnavailable(e.0))?;
        let children = a11y::convert_children(std::slice::from_ref(&raw.root), config.name_length_cap);
        let mut root = Node::new(Role::Document, Origin::A11y).with_children(children);

        let canvases = page
            .canvas_regions()
            .await
            .map_err(|e| crate::error::BrowserLensError::PageUnavailable(e.0))?;

        for canvas_rect in canvases {
            let bytes = page
                .screenshot(Some(canvas_rect))
                .await
                .map_err(|e| crate::error::BrowserLensError::PageUnavailable(e.0))?;
            let leaf = vision_leaf(canvas_rect, vision_token(&bytes));
            match find_anchor(&mut root, &canvas_rect) {
                Some(anchor) => anchor.children.push(leaf),
                None => root.children.push(leaf),
            }
        }

        Ok(StateTree::new(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{RawA11yNode, RawA11yTree};
    use crate::testing::FakePage;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect {
            x,
            y,
            width: w,
            height: h,
        }
    }

    #[tokio::test]
    async fn vision_region_is_spliced_under_the_nearest_qualifying_ancestor() {
        let mut page = FakePage::new("https://x.com/");
        page.a11y_tree = RawA11yTree {
            root: RawA11yNode {
                role: "main".to_string(),
                bounds: Some(rect(0.0, 0.0, 1000.0, 1000.0)),
                children: vec![RawA11yNode {
                    role: "button".to_string(),
                    name: Some("Go".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            },
            interactive_count: 1,
        };
        page.canvases = vec![rect(10.0, 10.0, 200.0, 200.0)];
        page.screenshot_bytes = vec![1, 2, 3, 4];

        let config = SessionConfig::default();
        let tree = HybridExtractor.extract(&page, &config).await.unwrap();

        assert_eq!(tree.root.children[0].role, Role::Main);
        let vision_children: Vec<_> = tree.root.children[0]
            .children
            .iter()
            .filter(|c| c.origin == Origin::VisionRegion)
            .collect();
        assert_eq!(vision_children.len(), 1);
        assert_eq!(vision_children[0].value, Some(BASE64.encode([1, 2, 3, 4])));
    }

    #[tokio::test]
    async fn vision_region_falls_back_to_root_when_no_anchor_contains_it() {
        let mut page = FakePage::new("https://x.com/");
        page.a11y_tree = RawA11yTree {
            root: RawA11yNode {
                role: "presentation".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        page.canvases = vec![rect(0.0, 0.0, 50.0, 50.0)];
        let config = SessionConfig::default();
        let tree = HybridExtractor.extract(&page, &config).await.unwrap();

        assert_eq!(tree.root.children.len(), 1);
        assert_eq!(tree.root.children[0].origin, Origin::VisionRegion);
    }

    #[tokio::test]
    async fn byte_identical_screenshots_produce_byte_identical_tokens() {
        let mut page = FakePage::new("https://x.com/");
        page.canvases = vec![rect(0.0, 0.0, 50.0, 50.0), rect(100.0, 0.0, 50.0, 50.0)];
        page.screenshot_bytes = vec![9, 9, 9];
        let config = SessionConfig::default();
        let tree = HybridExtractor.extract(&page, &config).await.unwrap();

        let tokens: Vec<_> = tree
            .root
            .children
            .iter()
            .map(|c| c.value.clone())
            .collect();
        assert_eq!(tokens[0], tokens[1]);
    }
}
