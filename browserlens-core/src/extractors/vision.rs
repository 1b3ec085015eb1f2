//! Vision Extractor — a single `vision-region` leaf carrying the
//! full-page screenshot, with no semantic children, §4.3.

use super::Extractor;
use super::hybrid::vision_token;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::model::{Node, Origin, Rect, Role, StateTree};
use crate::page::PageHandle;
use async_trait::async_trait;

pub struct VisionExtractor;

#[async_trait]
impl Extractor for VisionExtractor {
    async fn extract(&self, page: &dyn PageHandle, _config: &SessionConfig) -> Result<StateTree> {
        let (width, height) = page
            .viewport_size()
            .await
            .map_err(|e| crate::error::BrowserLensError::PageUnavailable(e.0))?;
        let bytes = page
            .screenshot(None)
            .await
            .map_err(|e| crate::error::BrowserLensError::PageUnavailable(e.0))?;

        let mut leaf = Node::new(Role::Other("vision-region".to_string()), Origin::VisionRegion);
        leaf.value = Some(vision_token(&bytes));
        leaf.bounds = Some(Rect {
            x: 0.0,
            y: 0.0,
            width,
            height,
        });

        // Only the injected leaf carries `Origin::VisionRegion` — the
        // synthetic root has neither bounds nor a vision payload, so
        // tagging it VisionRegion too would violate invariant 3 (§3).
        let root = Node::new(Role::Document, Origin::Dom).with_children(vec![leaf]);
        Ok(StateTree::new(root))
    }
}
