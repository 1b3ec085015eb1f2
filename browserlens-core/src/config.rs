use crate::error::{BrowserLensError, Result};
use crate::filter::FilterPredicate;
use crate::router::Router;
use std::time::Duration;

/// Tunables enumerated in the external-interfaces section of the design
/// doc. Defaults match the spec's defaults exactly.
pub struct SessionConfig {
    pub a11y_full_threshold: f64,
    pub dom_node_cap: usize,
    pub hybrid_min_coverage: f64,
    pub name_length_cap: usize,
    pub ref_session_cap: u32,
    pub snapshot_ttl: Duration,
    pub signal_cache_capacity: usize,
    pub dynamic_probe: bool,
    pub filters: Vec<FilterPredicate>,
    pub router: Router,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            a11y_full_threshold: 0.8,
            dom_node_cap: 2000,
            hybrid_min_coverage: 0.5,
            name_length_cap: 200,
            ref_session_cap: 65535,
            snapshot_ttl: Duration::from_millis(600_000),
            signal_cache_capacity: 64,
            dynamic_probe: false,
            filters: crate::filter::default_filters(),
            router: Router::default(),
        }
    }
}

impl SessionConfig {
    /// Validates thresholds at session-creation time. Mirrors the
    /// `ConfigurationError` kind from the design doc's error policy.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.a11y_full_threshold) {
            return Err(BrowserLensError::Configuration(format!(
                "a11y_full_threshold must be within [0,1], got {}",
                self.a11y_full_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.hybrid_min_coverage) {
            return Err(BrowserLensError::Configuration(format!(
                "hybrid_min_coverage must be within [0,1], got {}",
                self.hybrid_min_coverage
            )));
        }
        if self.hybrid_min_coverage > self.a11y_full_threshold {
            return Err(BrowserLensError::Configuration(
                "hybrid_min_coverage cannot exceed a11y_full_threshold".to_string(),
            ));
        }
        if self.dom_node_cap == 0 {
            return Err(BrowserLensError::Configuration(
                "dom_node_cap must be positive".to_string(),
            ));
        }
        if self.ref_session_cap == 0 {
            return Err(BrowserLensError::Configuration(
                "ref_session_cap must be positive".to_string(),
            ));
        }
        if self.name_length_cap == 0 {
            return Err(BrowserLensError::Configuration(
                "name_length_cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
