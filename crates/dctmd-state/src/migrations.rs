//! SurrealDB schema migrations and initialization
//!
//! Sets up the `diagnosis_results` table with its uniqueness constraint and
//! lookup indexes.

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all dctmd tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing dctmd SurrealDB schema");

    init_diagnosis_results_table(db).await?;

    info!("dctmd schema initialization complete");
    Ok(())
}

/// Initialize `diagnosis_results` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE diagnosis_results {
///   row_key:               STRING (record id, sha256 of the uniqueness key)
///   patient_record_id:     STRING (indexed)
///   diagnosis_id:          STRING
///   side:                  STRING (left | right)
///   region:                STRING
///   computed_status:       STRING (positive | negative | pending)
///   practitioner_decision: STRING? (confirmed)
///   decided_by:            STRING?
///   decided_at:            DATETIME?
///   note:                  STRING?
/// }
/// ```
///
/// Constraints:
/// - `(patient_record_id, diagnosis_id, side, region)` is unique
/// - recompute upserts only write `computed_status` on existing rows
///   (enforced by the MERGE payload in `SurrealResultStore`)
async fn init_diagnosis_results_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing diagnosis_results table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS diagnosis_results SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete FULL;

        -- One row per patient record, diagnosis and location
        DEFINE INDEX IF NOT EXISTS idx_result_key ON TABLE diagnosis_results
            COLUMNS patient_record_id, diagnosis_id, side, region UNIQUE;

        -- Row key mirrors the record id
        DEFINE INDEX IF NOT EXISTS idx_row_key ON TABLE diagnosis_results COLUMNS row_key UNIQUE;

        -- Fetch and cascade-delete by patient record
        DEFINE INDEX IF NOT EXISTS idx_patient_record_id ON TABLE diagnosis_results
            COLUMNS patient_record_id;
    "#;

    db.query(sql)
        .await
        .and_then(|response| response.check())
        .map_err(|e| StateError::SchemaSetup(format!("diagnosis_results: {e}")))?;
    info!("✓ diagnosis_results table initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_traits::{ComputedRow, CriterionStatus, DiagnosisId, PatientRecordId};
    use crate::storage_traits::{DiagnosisResultStore, Region, Side};
    use crate::SurrealResultStore;

    async fn raw_db() -> Surreal<Any> {
        let db = surrealdb::engine::any::connect("mem://").await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_init_schema_parses_and_is_idempotent() {
        let db = raw_db().await;
        init_schema(&db).await.unwrap();
        init_schema(&db).await.unwrap();
    }

    #[tokio::test]
    async fn test_unique_key_index_rejects_second_record() {
        let db = raw_db().await;
        init_schema(&db).await.unwrap();

        let insert = |row_key: &str| {
            format!(
                "CREATE diagnosis_results CONTENT {{ row_key: '{row_key}', patient_record_id: 'p1', \
                 diagnosis_id: 'myalgia', side: 'left', region: 'masseter' }}"
            )
        };
        db.query(insert("a")).await.unwrap().check().unwrap();
        let second = db.query(insert("b")).await.unwrap().check();
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_store_constructs_and_persists() {
        let store = SurrealResultStore::in_memory().await.unwrap();
        let pid = PatientRecordId::new("p1");
        store
            .upsert_computed(&[ComputedRow {
                patient_record_id: pid.clone(),
                diagnosis_id: DiagnosisId::from("arthralgia"),
                side: Side::Left,
                region: Region::Tmj,
                computed_status: CriterionStatus::Positive,
            }])
            .await
            .unwrap();
        assert_eq!(store.query(&pid).await.unwrap().len(), 1);
    }
}
