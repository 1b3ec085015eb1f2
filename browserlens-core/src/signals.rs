//! C1 — Signal Probe: collects cheap structural signals from a page
//! handle without mutating page state, §4.1.

use crate::model::{PageKind, Signals};
use crate::page::{A11ySnapshotOptions, DomWalkOptions, PageHandle};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct CachedSignals {
    signals: Signals,
    fetched_at: Instant,
}

/// Per-session LRU signal cache keyed by `url_origin` (§3, §5). Never
/// shared across sessions — cross-session sharing would leak staleness
/// between agent conversations that happen to visit the same origin.
pub struct SignalCache {
    inner: LruCache<String, CachedSignals>,
}

impl SignalCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: LruCache::new(cap),
        }
    }

    pub fn get_fresh(&mut self, origin: &str, ttl: Duration) -> Option<Signals> {
        let entry = self.inner.get(origin)?;
        if entry.fetched_at.elapsed() < ttl {
            Some(entry.signals.clone())
        } else {
            None
        }
    }

    pub fn put(&mut self, origin: String, signals: Signals) {
        self.inner.put(
            origin,
            CachedSignals {
                signals,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

/// Extracts `scheme://host[:port]` from a page URL, used as the cache key.
pub fn url_origin(raw_url: &str) -> String {
    match url::Url::parse(raw_url) {
        Ok(u) => {
            let scheme = u.scheme();
            let host = u.host_str().unwrap_or("");
            match u.port() {
                Some(p) => format!("{scheme}://{host}:{p}"),
                None => format!("{scheme}://{host}"),
            }
        }
        Err(_) => raw_url.to_string(),
    }
}

/// Fixed rule table classifying `page_kind` from URL path segments, §4.1
/// step 5. Left intentionally simple per Open Question (iii) in §9.
fn classify_page_kind(raw_url: &str) -> PageKind {
    let path = url::Url::parse(raw_url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();

    const FORM_HINTS: &[&str] = &["login", "signin", "signup", "register", "checkout", "form"];
    const DASHBOARD_HINTS: &[&str] = &["dashboard", "admin", "console", "analytics", "app"];
    const DOCUMENT_HINTS: &[&str] = &["docs", "article", "blog", "wiki", "help"];
    const LISTING_HINTS: &[&str] = &["search", "results", "list", "catalog", "products", "feed"];

    if FORM_HINTS.iter().any(|h| path.contains(h)) {
        PageKind::Form
    } else if DASHBOARD_HINTS.iter().any(|h| path.contains(h)) {
        PageKind::Dashboard
    } else if DOCUMENT_HINTS.iter().any(|h| path.contains(h)) {
        PageKind::Document
    } else if LISTING_HINTS.iter().any(|h| path.contains(h)) {
        PageKind::Listing
    } else {
        PageKind::Unknown
    }
}

pub struct SignalProbe;

impl SignalProbe {
    /// Runs the full probe sequence of §4.1. Each sub-probe is isolated:
    /// a failure in one is replaced by its own conservative default
    /// rather than failing the whole `Signals` record. `snapshot_ttl` and
    /// `dynamic_probe` come from `SessionConfig` by default, but the
    /// orchestrator may override them per call (§6, `observe` options).
    pub async fn probe(
        page: &dyn PageHandle,
        snapshot_ttl: Duration,
        dynamic_probe: bool,
        cache: &mut SignalCache,
        force_refresh: bool,
    ) -> Signals {
        let url = match page.url().await {
            Ok(u) => u,
            Err(e) => {
                warn!("signal probe: url() failed, using conservative defaults: {}", e);
                return Signals::conservative_default("unknown".to_string());
            }
        };
        let origin = url_origin(&url);

        if !force_refresh {
            if let Some(cached) = cache.get_fresh(&origin, snapshot_ttl) {
                debug!("signal probe: cache hit for origin {}", origin);
                return cached;
            }
        }

        let has_canvas = match page
            .query_selector_all_count("canvas, [data-webgl], canvas[class*='webgl']")
            .await
        {
            Ok(n) => n > 0,
            Err(e) => {
                warn!("signal probe: canvas sweep failed, assuming canvas present: {}", e);
                true
            }
        };

        let a11y = page.accessibility_snapshot(A11ySnapshotOptions::default()).await;
        let dom = page.dom_walk(DomWalkOptions::default()).await;

        let a11y_interactive = match &a11y {
            Ok(tree) => tree.interactive_count as f64,
            Err(e) => {
                warn!("signal probe: accessibility snapshot failed: {}", e);
                0.0
            }
        };
        let (dom_interactive, dom_node_count, dom_max_depth) = match &dom {
            Ok(d) => (d.interactive_count as f64, d.node_count, d.max_depth),
            Err(e) => {
                warn!("signal probe: dom walk failed, assuming unbounded DOM: {}", e);
                (1.0, usize::MAX, 0)
            }
        };

        let a11y_coverage = if a11y.is_err() {
            0.0
        } else {
            (a11y_interactive / dom_interactive.max(1.0)).clamp(0.0, 1.0)
        };

        let dynamic_ratio = if dynamic_probe {
            match page.observe_mutations(500).await {
                Ok(summary) if summary.total_mutations > 0 => Some(
                    (summary.interactive_subtree_mutations as f64
                        / summary.total_mutations as f64)
                        .clamp(0.0, 1.0),
                ),
                Ok(_) => Some(0.0),
                Err(e) => {
                    warn!("signal probe: mutation sample failed, skipping: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let page_kind = classify_page_kind(&url);

        let signals = Signals {
            has_canvas,
            a11y_coverage,
            dom_node_count,
            dom_max_depth,
            dynamic_ratio,
            page_kind,
            url_origin: origin.clone(),
        };

        cache.put(origin, signals.clone());
        signals
    }
}
