//! Domain errors surfaced by the orchestrator.

use uuid::Uuid;

/// Errors that escalate to the caller. Per-case and per-batch failures are
/// recorded in results, never raised through this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The sweep config cannot produce any work (empty models/questions,
    /// zero iterations). Rejected before an execution record is created.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The durable store is unavailable or rejected an operation.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The distributed dispatcher is unreachable or rejected the enqueue.
    #[error("dispatch failure: {0}")]
    Dispatch(String),

    #[error("execution not found: {0}")]
    NotFound(Uuid),
}

impl Error {
    pub fn persistence(e: impl std::fmt::Display) -> Self {
        Error::Persistence(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
