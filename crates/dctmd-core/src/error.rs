//! Error taxonomy for dctmd-core.
//!
//! Evaluation itself never fails; only catalog loading and the sync paths
//! that talk to storage can.

use dctmd_state::{ResultId, StorageError};

/// Errors produced while loading or validating a diagnosis catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("duplicate diagnosis id: {id}")]
    DuplicateId { id: String },

    #[error("diagnosis {id} names unknown parent {parent}")]
    UnknownParent { id: String, parent: String },

    #[error("diagnosis {id} is its own parent")]
    SelfParent { id: String },

    #[error("diagnosis {id} has parent {parent}, which is itself a subtype")]
    NestedSubtype { id: String, parent: String },
}

/// Errors surfaced by the sync engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A decision edit failed at the store; the cached row was restored.
    #[error("decision for {id} rejected, local change rolled back: {source}")]
    DecisionRejected {
        id: ResultId,
        #[source]
        source: StorageError,
    },

    #[error("result cache lock poisoned")]
    CachePoisoned,
}

impl SyncError {
    /// Whether the caller can reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Storage(e) | SyncError::DecisionRejected { source: e, .. } => {
                matches!(e, StorageError::Unavailable(_) | StorageError::Backend(_))
            }
            SyncError::CachePoisoned => false,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
