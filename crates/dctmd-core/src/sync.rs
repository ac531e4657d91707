//! Synchronisation between recomputed statuses and persisted decisions.
//!
//! [`SyncEngine`] owns a per-patient shadow copy of the persisted rows.
//! Recomputation only ever writes `computed_status`; decision edits are
//! applied to the shadow copy before the store call and restored verbatim
//! when the store rejects them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, Instrument};

use crate::catalog::DiagnosisCatalog;
use crate::criteria::{CriterionEvaluator, TreeEvaluator};
use crate::error::{Result, SyncError};
use crate::evaluator::{evaluate_all_with, DiagnosisEvaluationResult};
use crate::mapper::{map_criteria_data, SqAnswers};
use crate::obs;
use crate::{
    ComputedRow, DecisionUpdate, DiagnosisResultStore, PatientRecordId, PersistedDiagnosisResult,
    PractitionerDecision, ResultId,
};

type Cache = HashMap<PatientRecordId, Vec<PersistedDiagnosisResult>>;

/// One computed row per (diagnosis, side, region) location result.
pub fn build_rows(
    patient_record_id: &PatientRecordId,
    results: &[DiagnosisEvaluationResult],
) -> Vec<ComputedRow> {
    results
        .iter()
        .flat_map(|r| {
            r.location_results.iter().map(move |l| ComputedRow {
                patient_record_id: patient_record_id.clone(),
                diagnosis_id: r.diagnosis_id.clone(),
                side: l.side,
                region: l.region,
                computed_status: l.status,
            })
        })
        .collect()
}

/// Evaluation plus conflict-preserving persistence for one store.
pub struct SyncEngine<S> {
    store: Arc<S>,
    catalog: Arc<DiagnosisCatalog>,
    evaluator: Arc<dyn CriterionEvaluator + Send + Sync>,
    cache: RwLock<Cache>,
}

impl<S: DiagnosisResultStore> SyncEngine<S> {
    pub fn new(store: Arc<S>, catalog: Arc<DiagnosisCatalog>) -> Self {
        Self {
            store,
            catalog,
            evaluator: Arc::new(TreeEvaluator),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Swap in an externally supplied criterion evaluator.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn CriterionEvaluator + Send + Sync>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn catalog(&self) -> &DiagnosisCatalog {
        &self.catalog
    }

    /// Map and evaluate without touching the store.
    pub fn evaluate(
        &self,
        patient_record_id: &PatientRecordId,
        sq_answers: &SqAnswers,
        examination_data: &Value,
    ) -> Vec<DiagnosisEvaluationResult> {
        let _span = obs::PatientSpan::enter(patient_record_id.as_str());
        let data = map_criteria_data(sq_answers, examination_data);
        let results = evaluate_all_with(self.evaluator.as_ref(), &self.catalog, &data);
        debug!(diagnoses = results.len(), "evaluated catalog");
        results
    }

    /// Evaluate, upsert computed statuses, then refresh the shadow copy.
    ///
    /// Safe to repeat with identical inputs. Practitioner fields are never
    /// written by this path.
    pub async fn recompute_and_persist(
        &self,
        patient_record_id: &PatientRecordId,
        sq_answers: &SqAnswers,
        examination_data: &Value,
    ) -> Result<Vec<DiagnosisEvaluationResult>> {
        let pid = patient_record_id.as_str();
        let started = Instant::now();
        let results = self.evaluate(patient_record_id, sq_answers, examination_data);
        let rows = build_rows(patient_record_id, &results);

        let outcome = async {
            obs::emit_recompute_started(pid, results.len());
            self.store.upsert_computed(&rows).await?;
            let persisted = self.store.query(patient_record_id).await?;
            self.write_cache()?
                .insert(patient_record_id.clone(), persisted);
            Ok::<_, SyncError>(())
        }
        .instrument(obs::patient_span(pid))
        .await;

        match outcome {
            Ok(()) => {
                let positive = rows.iter().filter(|r| r.computed_status.is_positive()).count();
                obs::emit_recompute_finished(
                    pid,
                    rows.len(),
                    positive,
                    started.elapsed().as_millis() as u64,
                );
                Ok(results)
            }
            Err(e) => {
                obs::emit_recompute_failed(pid, &e);
                Err(e)
            }
        }
    }

    /// Set or clear the practitioner decision on one row.
    ///
    /// The shadow copy is changed before the store is awaited. On failure the
    /// pre-call row is restored exactly and `DecisionRejected` is returned.
    pub async fn update_decision(
        &self,
        result_id: &ResultId,
        decision: Option<PractitionerDecision>,
        user_id: &str,
        note: Option<String>,
    ) -> Result<PersistedDiagnosisResult> {
        let update = DecisionUpdate::new(decision, user_id, note, Utc::now());

        let previous = {
            let mut cache = self.write_cache()?;
            let before = find_row_mut(&mut cache, result_id).map(|row| {
                let before = row.clone();
                update.apply_to(row);
                before
            });
            before
        };

        match self.store.update_decision(result_id, update).await {
            Ok(stored) => {
                let mut cache = self.write_cache()?;
                match find_row_mut(&mut cache, result_id) {
                    Some(row) => *row = stored.clone(),
                    None => {
                        let rows = cache.entry(stored.patient_record_id.clone()).or_default();
                        rows.push(stored.clone());
                        dctmd_state::storage_traits::sort_rows(rows);
                    }
                }
                obs::emit_decision_applied(
                    result_id.as_str(),
                    decision.map(|_| "confirmed"),
                    user_id,
                );
                Ok(stored)
            }
            Err(source) => {
                if let Some(before) = previous {
                    let mut cache = self.write_cache()?;
                    if let Some(row) = find_row_mut(&mut cache, result_id) {
                        *row = before;
                    }
                }
                obs::emit_decision_rolled_back(result_id.as_str(), &source);
                Err(SyncError::DecisionRejected {
                    id: result_id.clone(),
                    source,
                })
            }
        }
    }

    /// Current rows from the store; also refreshes the shadow copy.
    pub async fn fetch_results(
        &self,
        patient_record_id: &PatientRecordId,
    ) -> Result<Vec<PersistedDiagnosisResult>> {
        let rows = self.store.query(patient_record_id).await?;
        self.write_cache()?
            .insert(patient_record_id.clone(), rows.clone());
        Ok(rows)
    }

    /// Shadow copy for a patient, without a store round trip. Empty if the
    /// patient has not been synced or fetched yet.
    pub fn cached_results(
        &self,
        patient_record_id: &PatientRecordId,
    ) -> Result<Vec<PersistedDiagnosisResult>> {
        Ok(self
            .read_cache()?
            .get(patient_record_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Delete every row for a patient and drop its shadow copy.
    pub async fn purge_patient(&self, patient_record_id: &PatientRecordId) -> Result<u64> {
        let removed = self.store.delete_for_patient(patient_record_id).await?;
        self.write_cache()?.remove(patient_record_id);
        debug!(patient_record_id = %patient_record_id, removed, "purged patient rows");
        Ok(removed)
    }

    fn read_cache(&self) -> Result<RwLockReadGuard<'_, Cache>> {
        self.cache.read().map_err(|_| SyncError::CachePoisoned)
    }

    fn write_cache(&self) -> Result<RwLockWriteGuard<'_, Cache>> {
        self.cache.write().map_err(|_| SyncError::CachePoisoned)
    }
}

fn find_row_mut<'a>(cache: &'a mut Cache, id: &ResultId) -> Option<&'a mut PersistedDiagnosisResult> {
    cache
        .values_mut()
        .flat_map(|rows| rows.iter_mut())
        .find(|row| &row.id == id)
}
