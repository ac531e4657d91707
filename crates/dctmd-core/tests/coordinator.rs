//! Recompute coalescing: debounce, supersede, per-patient independence.
//!
//! All tests run on a paused clock so debounce windows and store latency
//! are deterministic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dctmd_core::{
    CriterionStatus, DiagnosisCatalog, DiagnosisResultStore, PatientRecordId, RecomputeCoordinator,
    SourceDataChanged, SqAnswers, SyncConfig, SyncEngine,
};
use dctmd_state::fakes::MemoryResultStore;
use dctmd_state::storage_traits::{ComputedRow, DecisionUpdate, PersistedDiagnosisResult, ResultId};
use dctmd_state::StorageResult;
use serde_json::{json, Value};

const DEBOUNCE: Duration = Duration::from_millis(300);

fn coordinator<S: DiagnosisResultStore + 'static>(store: Arc<S>) -> RecomputeCoordinator<S> {
    let engine = SyncEngine::new(store, Arc::new(DiagnosisCatalog::reference()));
    RecomputeCoordinator::new(Arc::new(engine), SyncConfig::default().with_debounce(DEBOUNCE))
}

fn change(patient: &str, sq1: &str) -> SourceDataChanged {
    let sq_answers: SqAnswers = [
        ("SQ1".to_string(), json!(sq1)),
        ("SQ4_A".to_string(), json!("yes")),
    ]
    .into_iter()
    .collect();
    SourceDataChanged {
        patient_record_id: PatientRecordId::new(patient),
        sq_answers,
        examination_data: right_temporalis_pain(),
    }
}

fn right_temporalis_pain() -> Value {
    json!({
        "e1": { "pain": { "right": { "temporalis": true } } },
        "e9": { "right": { "temporalis": { "familiarPain": "yes" } } }
    })
}

fn myalgia_status(batch: &[ComputedRow]) -> CriterionStatus {
    batch
        .iter()
        .find(|r| r.diagnosis_id.as_str() == "myalgia" && r.region == dctmd_core::Region::Temporalis
            && r.side == dctmd_core::Side::Right)
        .map(|r| r.computed_status)
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn rapid_changes_persist_only_latest_snapshot() {
    let store = Arc::new(MemoryResultStore::new());
    let c = coordinator(Arc::clone(&store));

    c.notify(change("p-1", "no"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    c.notify(change("p-1", "yes"));

    c.flush(&PatientRecordId::new("p-1")).await;

    assert_eq!(store.upsert_calls(), 1);
    let batches = store.upserted_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(myalgia_status(&batches[0]), CriterionStatus::Positive);
}

#[tokio::test(start_paused = true)]
async fn in_flight_recompute_is_aborted_by_newer_change() {
    let store = Arc::new(MemoryResultStore::with_latency(Duration::from_millis(500)));
    let c = coordinator(Arc::clone(&store));

    c.notify(change("p-1", "no"));
    // Past the debounce window: the first upsert is now waiting on the store.
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
    assert_eq!(store.upsert_calls(), 1);

    c.notify(change("p-1", "yes"));
    c.flush(&PatientRecordId::new("p-1")).await;

    assert_eq!(store.upsert_calls(), 2);
    let batches = store.upserted_batches();
    assert_eq!(batches.len(), 1, "superseded upsert must never land");
    assert_eq!(myalgia_status(&batches[0]), CriterionStatus::Positive);
}

#[tokio::test(start_paused = true)]
async fn change_during_flush_still_supersedes_in_flight_recompute() {
    let store = Arc::new(MemoryResultStore::with_latency(Duration::from_millis(500)));
    let c = Arc::new(coordinator(Arc::clone(&store)));
    let pid = PatientRecordId::new("p-1");

    c.notify(change("p-1", "no"));
    let flushing = {
        let c = Arc::clone(&c);
        let pid = pid.clone();
        tokio::spawn(async move { c.flush(&pid).await })
    };

    tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
    assert_eq!(store.upsert_calls(), 1);
    assert!(!flushing.is_finished());

    c.notify(change("p-1", "yes"));
    flushing.await.unwrap();
    assert!(store.upserted_batches().is_empty());

    c.flush(&pid).await;
    assert_eq!(store.upsert_calls(), 2);
    let batches = store.upserted_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(myalgia_status(&batches[0]), CriterionStatus::Positive);
}

#[tokio::test(start_paused = true)]
async fn patients_are_independent() {
    let store = Arc::new(MemoryResultStore::new());
    let c = coordinator(Arc::clone(&store));

    c.notify(change("p-1", "yes"));
    c.notify(change("p-2", "no"));
    c.flush_all().await;

    assert_eq!(store.upsert_calls(), 2);
    let p1 = c.engine().cached_results(&PatientRecordId::new("p-1")).unwrap();
    let p2 = c.engine().cached_results(&PatientRecordId::new("p-2")).unwrap();
    assert!(!p1.is_empty());
    assert_eq!(p1.len(), p2.len());
    assert!(p1.iter().any(|r| r.computed_status == CriterionStatus::Positive));
    assert!(p2.iter().all(|r| r.computed_status != CriterionStatus::Positive));
}

/// Store that fails every upsert and counts attempts.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryResultStore,
    attempts: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl DiagnosisResultStore for FlakyStore {
    async fn upsert_computed(&self, _rows: &[ComputedRow]) -> StorageResult<()> {
        self.attempts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Err(dctmd_state::StorageError::Unavailable("connection reset".into()))
    }

    async fn update_decision(
        &self,
        id: &ResultId,
        update: DecisionUpdate,
    ) -> StorageResult<PersistedDiagnosisResult> {
        self.inner.update_decision(id, update).await
    }

    async fn query(&self, pid: &PatientRecordId) -> StorageResult<Vec<PersistedDiagnosisResult>> {
        self.inner.query(pid).await
    }

    async fn delete_for_patient(&self, pid: &PatientRecordId) -> StorageResult<u64> {
        self.inner.delete_for_patient(pid).await
    }
}

#[tokio::test(start_paused = true)]
async fn failures_are_swallowed_and_retried_by_next_change() {
    let store = Arc::new(FlakyStore::default());
    let c = coordinator(Arc::clone(&store));

    c.notify(change("p-1", "yes"));
    c.flush(&PatientRecordId::new("p-1")).await;
    c.notify(change("p-1", "yes"));
    c.flush(&PatientRecordId::new("p-1")).await;

    assert_eq!(store.attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert!(c
        .engine()
        .cached_results(&PatientRecordId::new("p-1"))
        .unwrap()
        .is_empty());
}
