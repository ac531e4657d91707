//! Schema definitions for dctmd SurrealDB tables
//!
//! Tables:
//! - diagnosis_results: one row per (patient record, diagnosis, side, region)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::{
    ComputedRow, CriterionStatus, DecisionUpdate, DiagnosisId, PatientRecordId,
    PersistedDiagnosisResult, PractitionerDecision, Region, ResultId, Side, StorageResult,
};

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

/// Key and computed status, as written by the recompute upsert.
///
/// Deliberately carries no practitioner fields: merging this into an existing
/// record can only ever change `computed_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedRecord {
    pub row_key: String,
    pub patient_record_id: String,
    pub diagnosis_id: String,
    pub side: Side,
    pub region: Region,
    pub computed_status: CriterionStatus,
}

impl From<&ComputedRow> for ComputedRecord {
    fn from(row: &ComputedRow) -> Self {
        Self {
            row_key: row.result_id().as_str().to_string(),
            patient_record_id: row.patient_record_id.as_str().to_string(),
            diagnosis_id: row.diagnosis_id.as_str().to_string(),
            side: row.side,
            region: row.region,
            computed_status: row.computed_status,
        }
    }
}

/// Practitioner fields, as written by a decision edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub practitioner_decision: Option<PractitionerDecision>,
    pub decided_by: Option<String>,
    #[serde(with = "surreal_datetime_opt")]
    pub decided_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl From<DecisionUpdate> for DecisionRecord {
    fn from(update: DecisionUpdate) -> Self {
        Self {
            practitioner_decision: update.practitioner_decision,
            decided_by: update.decided_by,
            decided_at: update.decided_at,
            note: update.note,
        }
    }
}

/// Full `diagnosis_results` row as read back from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisResultRecord {
    pub row_key: String,
    pub patient_record_id: String,
    pub diagnosis_id: String,
    pub side: Side,
    pub region: Region,
    pub computed_status: CriterionStatus,
    #[serde(default)]
    pub practitioner_decision: Option<PractitionerDecision>,
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
}

impl DiagnosisResultRecord {
    pub fn into_result(self) -> StorageResult<PersistedDiagnosisResult> {
        Ok(PersistedDiagnosisResult {
            id: ResultId::try_from(self.row_key)?,
            patient_record_id: PatientRecordId(self.patient_record_id),
            diagnosis_id: DiagnosisId(self.diagnosis_id),
            side: self.side,
            region: self.region,
            computed_status: self.computed_status,
            practitioner_decision: self.practitioner_decision,
            decided_by: self.decided_by,
            decided_at: self.decided_at,
            note: self.note,
        })
    }
}
