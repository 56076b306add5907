use thiserror::Error;

/// Error kinds surfaced by the core across all verbs in the external
/// interface. `ConfigurationGap` never escapes the scheduler: callers only
/// ever see it logged and converted into a per-service-line skip decision.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("opportunity or timeline row not found: {0}")]
    NotFound(String),

    #[error("opportunity {0} has no decision date")]
    MissingDecisionDate(String),

    #[error("scheduling produced zero total FTE for opportunity {0}; nothing persisted")]
    ZeroEffortTimeline(String),

    #[error("invalid resource status: {0}")]
    InvalidStatus(String),

    #[error("invalid bucket granularity: {0}")]
    InvalidBucket(String),

    #[error("configuration gap for service line {service_line} at stage {stage}: {reason}")]
    ConfigurationGap {
        service_line: String,
        stage: String,
        reason: String,
    },

    #[error("no timeline rows matched the given filter for opportunity {0}")]
    NoMatchingRows(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
