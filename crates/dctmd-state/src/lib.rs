//! dctmd-state: SurrealDB Backend for DC/TMD diagnosis results
//!
//! This crate is the persistence layer for computed diagnosis statuses and
//! the practitioner decisions layered on top of them.
//!
//! ## Key Components
//!
//! - `DiagnosisResultStore`: the async persistence contract
//! - `SurrealResultStore`: SurrealDB implementation (memory, file or cloud)
//! - `MemoryResultStore`: in-memory fake with failure injection for tests
//! - `CloudConfig`: connection settings read from the environment

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
pub mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::{connect_cloud, connect_from_env, connect_in_memory, connect_url, CloudConfig};
pub use storage_traits::{
    ComputedRow, CriterionStatus, DecisionUpdate, DiagnosisId, DiagnosisResultStore,
    PatientRecordId, PersistedDiagnosisResult, PractitionerDecision, Region, ResultId, Side,
    StorageResult,
};
pub use surreal_store::SurrealResultStore;

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
