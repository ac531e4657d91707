//! SurrealDB-backed DiagnosisResultStore implementation
//!
//! Uses `schema::ComputedRecord`, `schema::DecisionRecord` and
//! `schema::DiagnosisResultRecord` for persistence, converting to/from
//! `storage_traits` types at the boundary. Record ids are the row's
//! [`ResultId`], so the uniqueness key doubles as the primary key.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::handle::{self, CloudConfig};
use crate::schema::{ComputedRecord, DecisionRecord, DiagnosisResultRecord};
use crate::storage_traits::{
    sort_rows, ComputedRow, DecisionUpdate, DiagnosisResultStore, PatientRecordId,
    PersistedDiagnosisResult, ResultId, StorageResult,
};
use crate::StorageError;

/// Upsert every computed row inside one transaction. `MERGE` with a payload
/// that has no practitioner fields leaves those fields untouched on
/// existing records and absent on new ones.
const UPSERT_COMPUTED_SQL: &str = r#"
    BEGIN TRANSACTION;
    FOR $row IN $rows {
        UPSERT type::thing('diagnosis_results', $row.row_key) MERGE $row;
    };
    COMMIT TRANSACTION;
"#;

const UPDATE_DECISION_SQL: &str =
    "UPDATE type::thing('diagnosis_results', $rid) MERGE $decision RETURN AFTER";

const QUERY_SQL: &str = "SELECT * FROM diagnosis_results WHERE patient_record_id = $pid";

const DELETE_SQL: &str =
    "DELETE diagnosis_results WHERE patient_record_id = $pid RETURN BEFORE";

/// SurrealDB-backed implementation of [`DiagnosisResultStore`].
#[derive(Clone)]
pub struct SurrealResultStore {
    db: Surreal<Any>,
}

impl SurrealResultStore {
    /// Wrap an already connected and migrated database.
    pub fn from_db(db: Surreal<Any>) -> Self {
        Self { db }
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        let db = handle::connect_in_memory().await?;
        info!("SurrealResultStore connected (in-memory)");
        Ok(Self { db })
    }

    /// Connect to SurrealDB Cloud.
    pub async fn connect(config: &CloudConfig) -> crate::Result<Self> {
        let db = handle::connect_cloud(config).await?;
        Ok(Self { db })
    }

    /// Create from environment variables.
    ///
    /// Uses the env-var chain of [`handle::connect_from_env`].
    pub async fn from_env() -> crate::Result<Self> {
        let db = handle::connect_from_env().await?;
        Ok(Self { db })
    }

    fn backend(err: surrealdb::Error) -> StorageError {
        StorageError::Backend(err.to_string())
    }
}

#[async_trait]
impl DiagnosisResultStore for SurrealResultStore {
    async fn upsert_computed(&self, rows: &[ComputedRow]) -> StorageResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let records: Vec<ComputedRecord> = rows.iter().map(ComputedRecord::from).collect();
        debug!(rows = records.len(), "upserting computed diagnosis rows");

        self.db
            .query(UPSERT_COMPUTED_SQL)
            .bind(("rows", records))
            .await
            .map_err(Self::backend)?
            .check()
            .map_err(Self::backend)?;

        Ok(())
    }

    async fn update_decision(
        &self,
        id: &ResultId,
        update: DecisionUpdate,
    ) -> StorageResult<PersistedDiagnosisResult> {
        debug!(result_id = %id.short(), "updating practitioner decision");

        let mut res = self
            .db
            .query(UPDATE_DECISION_SQL)
            .bind(("rid", id.as_str().to_string()))
            .bind(("decision", DecisionRecord::from(update)))
            .await
            .map_err(Self::backend)?;

        let rows: Vec<DiagnosisResultRecord> = res.take(0).map_err(Self::backend)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound {
                id: id.as_str().to_string(),
            })?
            .into_result()
    }

    async fn query(
        &self,
        patient_record_id: &PatientRecordId,
    ) -> StorageResult<Vec<PersistedDiagnosisResult>> {
        let mut res = self
            .db
            .query(QUERY_SQL)
            .bind(("pid", patient_record_id.as_str().to_string()))
            .await
            .map_err(Self::backend)?;

        let records: Vec<DiagnosisResultRecord> = res.take(0).map_err(Self::backend)?;
        let mut rows = records
            .into_iter()
            .map(DiagnosisResultRecord::into_result)
            .collect::<StorageResult<Vec<_>>>()?;
        sort_rows(&mut rows);
        Ok(rows)
    }

    async fn delete_for_patient(
        &self,
        patient_record_id: &PatientRecordId,
    ) -> StorageResult<u64> {
        let mut res = self
            .db
            .query(DELETE_SQL)
            .bind(("pid", patient_record_id.as_str().to_string()))
            .await
            .map_err(Self::backend)?;

        let removed: Vec<DiagnosisResultRecord> = res.take(0).map_err(Self::backend)?;
        info!(
            patient_record_id = %patient_record_id,
            removed = removed.len(),
            "deleted diagnosis results for patient record"
        );
        Ok(removed.len() as u64)
    }
}
