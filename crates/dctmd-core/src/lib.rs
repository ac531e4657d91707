//! dctmd-core: DC/TMD criteria evaluation and decision sync
//!
//! Turns questionnaire answers and examination findings into per-diagnosis,
//! per-location statuses, and keeps them synchronised with a store of
//! practitioner decisions without ever overwriting those decisions.
//!
//! ## Pipeline
//!
//! raw inputs → [`map_criteria_data`] → [`evaluate_all`] → [`flatten`] →
//! [`location_statuses`] / [`positive_groups`] → [`display`].
//!
//! [`SyncEngine`] persists the evaluation; [`RecomputeCoordinator`] debounces
//! and supersedes recomputes per patient.

pub mod aggregation;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod criteria;
pub mod display;
pub mod error;
pub mod evaluator;
pub mod hierarchy;
pub mod mapper;
pub mod obs;
pub mod status;
pub mod sync;
pub mod telemetry;

pub use dctmd_state::{
    ComputedRow, CriterionStatus, DecisionUpdate, DiagnosisId, DiagnosisResultStore,
    PatientRecordId, PersistedDiagnosisResult, PractitionerDecision, Region, ResultId, Side,
};

pub use aggregation::{
    group_by_location, location_statuses, positive_groups, LocationGroup, LocationStatus,
    PositiveGroup,
};
pub use catalog::{DiagnosisCatalog, DiagnosisDefinition, Requires};
pub use config::SyncConfig;
pub use coordinator::{RecomputeCoordinator, SourceDataChanged};
pub use criteria::{
    evaluate_criterion, CriterionEvaluator, CriterionNode, CriterionResult, LeafExpectation,
    LocationContext, TreeEvaluator,
};
pub use display::{DecisionView, DiagnosisSummary, DisplayStatus};
pub use error::{CatalogError, Result, SyncError};
pub use evaluator::{evaluate_all, evaluate_all_with, CriteriaLocationResult, DiagnosisEvaluationResult};
pub use hierarchy::{flatten, DiagnosisHierarchy};
pub use mapper::{map_criteria_data, DataBag, SqAnswers};
pub use status::{aggregate_status, effective_status};
pub use sync::{build_rows, SyncEngine};
pub use telemetry::init_tracing;
