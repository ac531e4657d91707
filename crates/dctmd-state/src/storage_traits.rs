//! Storage trait definitions for persisted diagnosis results
//!
//! `DiagnosisResultStore` is the persistence collaborator contract:
//! - `upsert_computed`: batched upsert that only ever touches `computed_status`
//! - `update_decision`: single-row practitioner decision edit by primary key
//! - `query`: every persisted row for a patient record
//! - `delete_for_patient`: cascading removal when a patient record goes away
//!
//! The location vocabulary (`Side`, `Region`) and `CriterionStatus` live here
//! because they are part of every persisted row. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Location vocabulary
// ---------------------------------------------------------------------------

/// Anatomical side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Evaluation order.
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    /// Display order: right before left.
    pub const DISPLAY_ORDER: [Side; 2] = [Side::Right, Side::Left];

    /// Key used for this side inside examination and questionnaire data.
    pub fn data_key(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }

    /// Position in [`Side::DISPLAY_ORDER`].
    pub fn display_rank(&self) -> usize {
        match self {
            Side::Right => 0,
            Side::Left => 1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.data_key())
    }
}

/// Anatomical region a diagnosis can apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Temporalis,
    Masseter,
    Tmj,
    OtherMasticatory,
    NonMasticatory,
}

impl Region {
    /// Fixed display sequence.
    pub const ALL: [Region; 5] = [
        Region::Temporalis,
        Region::Masseter,
        Region::Tmj,
        Region::OtherMasticatory,
        Region::NonMasticatory,
    ];

    /// Key used for this region inside examination data.
    pub fn data_key(&self) -> &'static str {
        match self {
            Region::Temporalis => "temporalis",
            Region::Masseter => "masseter",
            Region::Tmj => "tmj",
            Region::OtherMasticatory => "otherMast",
            Region::NonMasticatory => "nonMast",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Region::Temporalis => "temporalis",
            Region::Masseter => "masseter",
            Region::Tmj => "TMJ",
            Region::OtherMasticatory => "other masticatory muscles",
            Region::NonMasticatory => "non-masticatory muscles",
        }
    }

    /// Position in [`Region::ALL`].
    pub fn display_rank(&self) -> usize {
        match self {
            Region::Temporalis => 0,
            Region::Masseter => 1,
            Region::Tmj => 2,
            Region::OtherMasticatory => 3,
            Region::NonMasticatory => 4,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.data_key())
    }
}

/// Three-valued criterion outcome. `Pending` means "not enough data yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionStatus {
    Positive,
    Negative,
    Pending,
}

impl CriterionStatus {
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Pending => "pending",
        }
    }
}

impl std::fmt::Display for CriterionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A clinician's manual override. Absence (`None`) means "not decided".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PractitionerDecision {
    Confirmed,
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of the patient record that owns an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientRecordId(pub String);

impl PatientRecordId {
    pub fn new(id: impl Into<String>) -> Self {
        PatientRecordId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PatientRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog identifier of a diagnosis (e.g. `"myalgia"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagnosisId(pub String);

impl DiagnosisId {
    pub fn new(id: impl Into<String>) -> Self {
        DiagnosisId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DiagnosisId {
    fn from(s: &str) -> Self {
        DiagnosisId(s.to_string())
    }
}

impl std::fmt::Display for DiagnosisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of a persisted row.
///
/// Derived from the uniqueness key (patient record, diagnosis, side, region)
/// as a SHA-256 hex digest, so the same key always maps to the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultId(String);

impl ResultId {
    pub fn for_key(
        patient_record_id: &PatientRecordId,
        diagnosis_id: &DiagnosisId,
        side: Side,
        region: Region,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(patient_record_id.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(diagnosis_id.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(side.data_key().as_bytes());
        hasher.update(b"\0");
        hasher.update(region.data_key().as_bytes());
        ResultId(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ResultId {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidId { id: s });
        }
        Ok(ResultId(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ResultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// What a recomputation contributes to the store: the key and the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedRow {
    pub patient_record_id: PatientRecordId,
    pub diagnosis_id: DiagnosisId,
    pub side: Side,
    pub region: Region,
    pub computed_status: CriterionStatus,
}

impl ComputedRow {
    pub fn result_id(&self) -> ResultId {
        ResultId::for_key(
            &self.patient_record_id,
            &self.diagnosis_id,
            self.side,
            self.region,
        )
    }
}

/// A durable, decision-aware diagnosis row.
///
/// `computed_status` always reflects the latest recomputation. The four
/// practitioner fields only change through [`DiagnosisResultStore::update_decision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedDiagnosisResult {
    pub id: ResultId,
    pub patient_record_id: PatientRecordId,
    pub diagnosis_id: DiagnosisId,
    pub side: Side,
    pub region: Region,
    pub computed_status: CriterionStatus,
    pub practitioner_decision: Option<PractitionerDecision>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl PersistedDiagnosisResult {
    /// A freshly created row: computed, undecided.
    pub fn from_computed(row: &ComputedRow) -> Self {
        Self {
            id: row.result_id(),
            patient_record_id: row.patient_record_id.clone(),
            diagnosis_id: row.diagnosis_id.clone(),
            side: row.side,
            region: row.region,
            computed_status: row.computed_status,
            practitioner_decision: None,
            decided_by: None,
            decided_at: None,
            note: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.practitioner_decision == Some(PractitionerDecision::Confirmed)
    }
}

/// Practitioner field values written by a decision edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionUpdate {
    pub practitioner_decision: Option<PractitionerDecision>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl DecisionUpdate {
    /// Stamp `decided_by`/`decided_at` for a decision, or clear them when
    /// the decision is cleared. The note is always written as given.
    pub fn new(
        decision: Option<PractitionerDecision>,
        user_id: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        match decision {
            Some(d) => Self {
                practitioner_decision: Some(d),
                decided_by: Some(user_id.to_string()),
                decided_at: Some(now),
                note,
            },
            None => Self {
                practitioner_decision: None,
                decided_by: None,
                decided_at: None,
                note,
            },
        }
    }

    /// Overwrite the practitioner fields of `row`. `computed_status` is untouched.
    pub fn apply_to(&self, row: &mut PersistedDiagnosisResult) {
        row.practitioner_decision = self.practitioner_decision;
        row.decided_by = self.decided_by.clone();
        row.decided_at = self.decided_at;
        row.note = self.note.clone();
    }
}

// ---------------------------------------------------------------------------
// DiagnosisResultStore
// ---------------------------------------------------------------------------

/// Persistence collaborator for diagnosis results.
///
/// Guarantees:
/// - At most one row per (patient record, diagnosis, side, region).
/// - `upsert_computed` creates missing rows undecided and, for existing rows,
///   updates `computed_status` only.
/// - Each row's upsert/update is applied atomically; concurrent decision edits
///   on the same row are last-write-wins.
#[async_trait]
pub trait DiagnosisResultStore: Send + Sync {
    /// Batched upsert keyed on (patient record, diagnosis, side, region).
    async fn upsert_computed(&self, rows: &[ComputedRow]) -> StorageResult<()>;

    /// Write practitioner fields for one row. Returns `NotFound` if absent.
    async fn update_decision(
        &self,
        id: &ResultId,
        update: DecisionUpdate,
    ) -> StorageResult<PersistedDiagnosisResult>;

    /// All rows for a patient record, ordered by diagnosis id, side, region.
    async fn query(
        &self,
        patient_record_id: &PatientRecordId,
    ) -> StorageResult<Vec<PersistedDiagnosisResult>>;

    /// Remove every row for a patient record, returning how many were removed.
    async fn delete_for_patient(&self, patient_record_id: &PatientRecordId)
        -> StorageResult<u64>;
}

/// Canonical ordering used by `query` implementations.
pub fn sort_rows(rows: &mut [PersistedDiagnosisResult]) {
    rows.sort_by(|a, b| {
        a.diagnosis_id
            .cmp(&b.diagnosis_id)
            .then(a.side.cmp(&b.side))
            .then(a.region.cmp(&b.region))
    });
}
