//! C8 — Orchestrator: the one public entry point, §4.8. Wires the
//! signal probe, router, extractors, reference manager, differ, and
//! filter into the `observe()` step protocol and tracks the session's
//! `FRESH` / `DIFFING` / `RECOVERING` state machine.

use crate::config::SessionConfig;
use crate::differ;
use crate::differ::{CauseHint, Delta, UnchangedSummary};
use crate::error::{BrowserLensError, Result};
use crate::extractors::{a11y::A11yExtractor, dom::DomExtractor, hybrid::HybridExtractor, vision::VisionExtractor, Extractor};
use crate::filter;
use crate::model::StateTree;
use crate::page::PageHandle;
use crate::refs::RefManager;
use crate::router::RouterThresholds;
use crate::signals::{SignalCache, SignalProbe};
use crate::snapshot::SnapshotStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

const SIGNAL_PROBE_BUDGET: Duration = Duration::from_millis(600);
const EXTRACTOR_BUDGET: Duration = Duration::from_millis(2000);
const DIFF_BUDGET: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Fresh,
    Diffing,
    Recovering,
}

/// Per-call overrides for `Session::observe`, §6.
#[derive(Default)]
pub struct ObserveOptions<'a> {
    pub force_full: bool,
    pub dynamic_probe: Option<bool>,
    pub filters: Option<&'a [crate::filter::FilterPredicate]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    Full {
        tree: StateTree,
        refs: BTreeMap<String, RefIdentity>,
    },
    Delta {
        delta: Delta,
        refs: BTreeMap<String, RefIdentity>,
        unchanged_summary: UnchangedSummary,
        cause_hint: Option<CauseHint>,
    },
}

/// The `@eN → identity tuple` entry in an observation's always-present
/// `refs` map, §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefIdentity {
    pub role: String,
    pub name: String,
}

/// One BrowserLens session. Owns everything the step protocol needs:
/// the signal cache, ref manager, and last-committed snapshot. Not
/// `Clone` — a session is a single mutable resource, §5.
pub struct Session {
    config: SessionConfig,
    cache: SignalCache,
    refs: RefManager,
    snapshot: SnapshotStore,
    state: SessionState,
    busy: AtomicBool,
    last_url_origin: Option<String>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let cache = SignalCache::new(config.signal_cache_capacity);
        let refs = RefManager::new(config.ref_session_cap);
        Ok(Self {
            config,
            cache,
            refs,
            snapshot: SnapshotStore::new(),
            state: SessionState::Fresh,
            busy: AtomicBool::new(false),
            last_url_origin: None,
        })
    }

    /// Clears the snapshot and ref table, returning the session to
    /// `FRESH`, §6.
    pub fn reset(&mut self) {
        self.snapshot.clear();
        self.cache.clear();
        self.refs = RefManager::new(self.config.ref_session_cap);
        self.state = SessionState::Fresh;
        self.last_url_origin = None;
    }

    pub async fn observe(&mut self, page: &dyn PageHandle, options: ObserveOptions<'_>) -> Result<Observation> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(BrowserLensError::ConcurrentObservation);
        }
        let result = self.observe_inner(page, options).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn observe_inner(&mut self, page: &dyn PageHandle, options: ObserveOptions<'_>) -> Result<Observation> {
        let dynamic_probe = options.dynamic_probe.unwrap_or(self.config.dynamic_probe);
        let filters = options.filters.unwrap_or(&self.config.filters);

        let signals = match tokio::time::timeout(
            SIGNAL_PROBE_BUDGET,
            SignalProbe::probe(page, self.config.snapshot_ttl, dynamic_probe, &mut self.cache, false),
        )
        .await
        {
            Ok(signals) => signals,
            Err(_) => {
                warn!("phase timed out: signal_probe exceeded {}ms", SIGNAL_PROBE_BUDGET.as_millis());
                self.state = SessionState::Recovering;
                return Err(BrowserLensError::ExtractionTimeout {
                    phase: "signal_probe",
                    budget_ms: SIGNAL_PROBE_BUDGET.as_millis() as u64,
                });
            }
        };

        let thresholds = RouterThresholds::from(&self.config);
        let kind = self.config.router.route(&signals, &thresholds);
        let extractor: &dyn Extractor = match kind {
            crate::router::RepresentationKind::A11y => &A11yExtractor,
            crate::router::RepresentationKind::DistilledDom => &DomExtractor,
            crate::router::RepresentationKind::Hybrid => &HybridExtractor,
            crate::router::RepresentationKind::Vision => &VisionExtractor,
        };

        let mut new_tree = match tokio::time::timeout(EXTRACTOR_BUDGET, extractor.extract(page, &self.config)).await {
            Ok(Ok(tree)) => tree,
            // §7: PageUnavailable leaves the session unchanged — only a
            // timed-out phase forces RECOVERING.
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!("phase timed out: extractor exceeded {}ms", EXTRACTOR_BUDGET.as_millis());
                self.state = SessionState::Recovering;
                return Err(BrowserLensError::ExtractionTimeout {
                    phase: "extractor",
                    budget_ms: EXTRACTOR_BUDGET.as_millis() as u64,
                });
            }
        };

        let old_tree = self.snapshot.get();
        let assignment = self.refs.assign(&mut new_tree, old_tree);

        let force_full = options.force_full
            || old_tree.is_none()
            || assignment.compacted
            || self.state == SessionState::Recovering;

        let observation = if force_full {
            let refs = build_refs_map(&new_tree);
            info!("observation complete: full ({:?})", kind);
            Observation::Full { tree: new_tree.clone(), refs }
        } else {
            let old = old_tree.expect("full path taken when old_tree is None");
            let outcome = assignment
                .outcome
                .as_ref()
                .expect("outcome present whenever old_tree is Some");

            let diff_result = tokio::time::timeout(DIFF_BUDGET, async {
                let mut delta = differ::build_delta(old, &new_tree, outcome);
                filter::apply(&mut delta, filters, &new_tree, Some(old));
                delta
            })
            .await;

            let mut delta = match diff_result {
                Ok(delta) => delta,
                Err(_) => {
                    warn!("phase timed out: diff exceeded {}ms", DIFF_BUDGET.as_millis());
                    self.state = SessionState::Recovering;
                    return Err(BrowserLensError::ExtractionTimeout {
                        phase: "diff",
                        budget_ms: DIFF_BUDGET.as_millis() as u64,
                    });
                }
            };

            let old_origin = self.last_url_origin.as_deref().unwrap_or_default();
            delta.cause_hint = differ::infer_cause_hint(&delta, old_origin, &signals.url_origin);
            let refs = build_refs_map(&new_tree);
            info!("observation complete: delta ({:?})", kind);
            Observation::Delta {
                unchanged_summary: delta.unchanged_summary.clone(),
                cause_hint: delta.cause_hint,
                delta,
                refs,
            }
        };

        self.snapshot.put(new_tree);
        self.state = SessionState::Diffing;
        self.last_url_origin = Some(signals.url_origin);
        Ok(observation)
    }
}

fn build_refs_map(tree: &StateTree) -> BTreeMap<String, RefIdentity> {
    fn walk(node: &crate::model::Node, out: &mut BTreeMap<String, RefIdentity>) {
        if let Some(r) = node.node_ref {
            out.insert(
                r.to_string(),
                RefIdentity {
                    role: node.role.as_str().to_string(),
                    name: node.name.clone(),
                },
            );
        }
        for child in &node.children {
            walk(child, out);
        }
    }
    let mut out = BTreeMap::new();
    walk(&tree.root, &mut out);
    out
}
