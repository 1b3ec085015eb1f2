//! Test-only `PageHandle` double shared across unit-test modules.

#![cfg(test)]

use crate::model::Rect;
use crate::page::{
    A11ySnapshotOptions, DomWalkOptions, MutationSummary, PageError, PageHandle, PageResult,
    RawA11yTree, RawDom,
};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct FakePage {
    pub selector_counts: Mutex<std::collections::HashMap<String, usize>>,
    pub a11y_tree: RawA11yTree,
    pub dom: RawDom,
    pub screenshot_bytes: Vec<u8>,
    pub mutations: MutationSummary,
    pub page_url: String,
    pub fail_accessibility: bool,
    pub canvases: Vec<Rect>,
    pub viewport: (f64, f64),
}

impl FakePage {
    pub fn new(url: impl Into<String>) -> Self {
        let _ = tracing_subscriber::fmt::try_init();
        Self {
            page_url: url.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn query_selector_all_count(&self, selector: &str) -> PageResult<usize> {
        Ok(*self
            .selector_counts
            .lock()
            .unwrap()
            .get(selector)
            .unwrap_or(&0))
    }

    async fn accessibility_snapshot(&self, _opts: A11ySnapshotOptions) -> PageResult<RawA11yTree> {
        if self.fail_accessibility {
            return Err(PageError("simulated accessibility failure".into()));
        }
        Ok(self.a11y_tree.clone())
    }

    async fn dom_walk(&self, _opts: DomWalkOptions) -> PageResult<RawDom> {
        Ok(self.dom.clone())
    }

    async fn screenshot(&self, _rect: Option<Rect>) -> PageResult<Vec<u8>> {
        Ok(self.screenshot_bytes.clone())
    }

    async fn observe_mutations(&self, _ms: u64) -> PageResult<MutationSummary> {
        Ok(self.mutations)
    }

    async fn url(&self) -> PageResult<String> {
        Ok(self.page_url.clone())
    }

    async fn canvas_regions(&self) -> PageResult<Vec<Rect>> {
        Ok(self.canvases.clone())
    }

    async fn viewport_size(&self) -> PageResult<(f64, f64)> {
        let (w, h) = self.viewport;
        if w == 0.0 && h == 0.0 {
            Ok((1280.0, 720.0))
        } else {
            Ok((w, h))
        }
    }
}
