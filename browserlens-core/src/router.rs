//! C2 — Representation Router: a pure, side-effect-free decision
//! procedure mapping `Signals` to a `RepresentationKind`, §4.2.

use crate::config::SessionConfig;
use crate::model::Signals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepresentationKind {
    A11y,
    DistilledDom,
    Hybrid,
    Vision,
}

/// The three configurable thresholds the default decision table reads.
/// `0.2` in rule 4 has no matching config option (§6) and is a fixed
/// constant.
#[derive(Debug, Clone, Copy)]
pub struct RouterThresholds {
    pub a11y_full_threshold: f64,
    pub dom_node_cap: usize,
    pub hybrid_min_coverage: f64,
}

impl From<&SessionConfig> for RouterThresholds {
    fn from(config: &SessionConfig) -> Self {
        Self {
            a11y_full_threshold: config.a11y_full_threshold,
            dom_node_cap: config.dom_node_cap,
            hybrid_min_coverage: config.hybrid_min_coverage,
        }
    }
}

const VISION_COVERAGE_CEILING: f64 = 0.2;

/// The default decision table, evaluated top-to-bottom; first match wins.
pub fn default_decision(signals: &Signals, t: &RouterThresholds) -> RepresentationKind {
    if signals.has_canvas && signals.a11y_coverage < t.hybrid_min_coverage {
        return RepresentationKind::Hybrid;
    }
    if signals.a11y_coverage >= t.a11y_full_threshold {
        return RepresentationKind::A11y;
    }
    if signals.dom_node_count < t.dom_node_cap && signals.a11y_coverage >= t.hybrid_min_coverage {
        return RepresentationKind::DistilledDom;
    }
    if signals.a11y_coverage < VISION_COVERAGE_CEILING && signals.dom_node_count >= t.dom_node_cap {
        return RepresentationKind::Vision;
    }
    RepresentationKind::Hybrid
}

/// A pluggable, pure capability object over the router's fixed
/// signature (§4.2, §9 design notes: "expose as a capability object
/// rather than inheritance").
pub struct Router {
    decide: Box<dyn Fn(&Signals, &RouterThresholds) -> RepresentationKind + Send + Sync>,
}

impl Router {
    pub fn new(
        decide: impl Fn(&Signals, &RouterThresholds) -> RepresentationKind + Send + Sync + 'static,
    ) -> Self {
        Self {
            decide: Box::new(decide),
        }
    }

    pub fn route(&self, signals: &Signals, thresholds: &RouterThresholds) -> RepresentationKind {
        (self.decide)(signals, thresholds)
    }
}

impl Default for Router {
    fn default() -> Self {
        Router::new(default_decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PageKind;

    fn signals(has_canvas: bool, a11y_coverage: f64, dom_node_count: usize) -> Signals {
        Signals {
            has_canvas,
            a11y_coverage,
            dom_node_count,
            dom_max_depth: 1,
            dynamic_ratio: None,
            page_kind: PageKind::Unknown,
            url_origin: "https://x.com".to_string(),
        }
    }

    fn thresholds() -> RouterThresholds {
        RouterThresholds {
            a11y_full_threshold: 0.8,
            dom_node_cap: 2000,
            hybrid_min_coverage: 0.5,
        }
    }

    #[test]
    fn canvas_with_low_coverage_routes_hybrid() {
        let kind = default_decision(&signals(true, 0.3, 5000), &thresholds());
        assert_eq!(kind, RepresentationKind::Hybrid);
    }

    #[test]
    fn high_coverage_routes_a11y_even_with_canvas() {
        // Canvas rule only fires below hybrid_min_coverage; 0.9 clears it.
        let kind = default_decision(&signals(true, 0.9, 500), &thresholds());
        assert_eq!(kind, RepresentationKind::A11y);
    }

    #[test]
    fn small_dom_with_mid_coverage_routes_distilled_dom() {
        let kind = default_decision(&signals(false, 0.6, 1500), &thresholds());
        assert_eq!(kind, RepresentationKind::DistilledDom);
    }

    #[test]
    fn large_dom_with_low_coverage_routes_vision() {
        let kind = default_decision(&signals(false, 0.1, 5000), &thresholds());
        assert_eq!(kind, RepresentationKind::Vision);
    }

    #[test]
    fn mid_coverage_large_dom_falls_through_to_hybrid() {
        let kind = default_decision(&signals(false, 0.3, 5000), &thresholds());
        assert_eq!(kind, RepresentationKind::Hybrid);
    }

    #[test]
    fn custom_router_overrides_default_decision() {
        let router = Router::new(|_signals, _t| RepresentationKind::Vision);
        let kind = router.route(&signals(false, 0.9, 10), &thresholds());
        assert_eq!(kind, RepresentationKind::Vision);
    }
}
