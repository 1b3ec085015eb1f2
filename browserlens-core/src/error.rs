use thiserror::Error;

/// Error kinds surfaced by the core, one variant per the error policy in
/// the design doc. `RefOverflow` has no variant here: it is handled
/// internally by the reference manager via compaction and a forced full
/// emission, and is never surfaced to the caller.
#[derive(Error, Debug)]
pub enum BrowserLensError {
    #[error("page handle error: {0}")]
    PageUnavailable(String),

    #[error("extraction timed out after {budget_ms}ms in phase {phase}")]
    ExtractionTimeout { phase: &'static str, budget_ms: u64 },

    #[error("tree differ invariant violated: {0}")]
    DiffFailure(String),

    #[error("observe() called while a previous observation on this session was still running")]
    ConcurrentObservation,

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BrowserLensError>;
