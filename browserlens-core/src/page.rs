//! The `PageHandle` external interface, §6. Out of scope per spec.md §1:
//! the concrete browser driver (headless_chrome, CDP, whatever) lives
//! outside this crate and implements this trait.

use crate::model::Rect;
use async_trait::async_trait;

pub type PageResult<T> = std::result::Result<T, PageError>;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct PageError(pub String);

#[derive(Debug, Clone, Default)]
pub struct A11ySnapshotOptions {
    pub interactive_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DomWalkOptions {
    pub max_text_len: usize,
}

/// One node of the browser's raw accessibility dump, pre-normalization.
#[derive(Debug, Clone, Default)]
pub struct RawA11yNode {
    pub role: String,
    pub name: Option<String>,
    pub value: Option<String>,
    /// Boolean accessibility properties as reported by the browser, e.g.
    /// `("disabled", true)`, `("focused", true)`.
    pub properties: Vec<(String, bool)>,
    /// Numeric level, meaningful for headings and tree items.
    pub level: Option<i32>,
    pub bounds: Option<Rect>,
    pub children: Vec<RawA11yNode>,
}

#[derive(Debug, Clone, Default)]
pub struct RawA11yTree {
    pub root: RawA11yNode,
    pub interactive_count: usize,
}

/// One node of a raw, un-pruned DOM walk.
#[derive(Debug, Clone, Default)]
pub struct RawDomNode {
    pub tag: String,
    pub role: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    pub text: Option<String>,
    pub visible: bool,
    pub interactive: bool,
    pub data_attrs: Vec<(String, String)>,
    /// Boolean DOM/ARIA state properties, same vocabulary as
    /// `RawA11yNode::properties` (`disabled`, `checked`, ...).
    pub properties: Vec<(String, bool)>,
    pub level: Option<i32>,
    pub bounds: Option<Rect>,
    pub children: Vec<RawDomNode>,
}

#[derive(Debug, Clone, Default)]
pub struct RawDom {
    pub root: RawDomNode,
    pub interactive_count: usize,
    pub node_count: usize,
    pub max_depth: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MutationSummary {
    pub total_mutations: usize,
    pub interactive_subtree_mutations: usize,
}

/// The browser driver's surface, as consumed by the signal probe and
/// extractors. Implementations must not mutate page state.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn query_selector_all_count(&self, selector: &str) -> PageResult<usize>;
    async fn accessibility_snapshot(&self, opts: A11ySnapshotOptions) -> PageResult<RawA11yTree>;
    async fn dom_walk(&self, opts: DomWalkOptions) -> PageResult<RawDom>;
    async fn screenshot(&self, rect: Option<Rect>) -> PageResult<Vec<u8>>;
    async fn observe_mutations(&self, ms: u64) -> PageResult<MutationSummary>;
    async fn url(&self) -> PageResult<String>;

    /// Bounding rectangles of canvas/WebGL surfaces on the page, used by
    /// the hybrid extractor to place `vision-region` leaves (§4.3).
    async fn canvas_regions(&self) -> PageResult<Vec<Rect>>;

    /// Full-page viewport dimensions, used to bound the vision
    /// extractor's single `vision-region` leaf.
    async fn viewport_size(&self) -> PageResult<(f64, f64)>;
}
