//! In-memory fake for the result store (testing only)
//!
//! `MemoryResultStore` satisfies the `DiagnosisResultStore` contract without
//! any external dependencies. It can also inject failures and latency so sync
//! behaviour (rollback, supersede) can be exercised deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory result store backed by a `HashMap<ResultId, row>`.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    rows: Mutex<HashMap<ResultId, PersistedDiagnosisResult>>,
    latency: Option<Duration>,
    fail_upserts: AtomicBool,
    fail_decisions: AtomicBool,
    upsert_calls: AtomicUsize,
    upserted: Mutex<Vec<Vec<ComputedRow>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every store call sleeps for `latency` before touching the rows.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Make subsequent `upsert_computed` calls fail with `Unavailable`.
    pub fn set_fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `update_decision` calls fail with `Unavailable`.
    pub fn set_fail_decisions(&self, fail: bool) {
        self.fail_decisions.store(fail, Ordering::SeqCst);
    }

    /// Number of `upsert_computed` calls that reached the store.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Batches applied by `upsert_computed`, oldest first.
    pub fn upserted_batches(&self) -> Vec<Vec<ComputedRow>> {
        self.upserted
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }

    fn lock_rows(&self) -> StorageResult<MutexGuard<'_, HashMap<ResultId, PersistedDiagnosisResult>>> {
        self.rows
            .lock()
            .map_err(|e| StorageError::Backend(format!("row lock poisoned: {e}")))
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DiagnosisResultStore for MemoryResultStore {
    async fn upsert_computed(&self, rows: &[ComputedRow]) -> StorageResult<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected upsert failure".into()));
        }

        let mut stored = self.lock_rows()?;
        for row in rows {
            stored
                .entry(row.result_id())
                .and_modify(|existing| existing.computed_status = row.computed_status)
                .or_insert_with(|| PersistedDiagnosisResult::from_computed(row));
        }
        drop(stored);

        if let Ok(mut batches) = self.upserted.lock() {
            batches.push(rows.to_vec());
        }
        Ok(())
    }

    async fn update_decision(
        &self,
        id: &ResultId,
        update: DecisionUpdate,
    ) -> StorageResult<PersistedDiagnosisResult> {
        self.simulate_latency().await;

        if self.fail_decisions.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "injected decision failure".into(),
            ));
        }

        let mut stored = self.lock_rows()?;
        let row = stored.get_mut(id).ok_or_else(|| StorageError::NotFound {
            id: id.as_str().to_string(),
        })?;
        update.apply_to(row);
        Ok(row.clone())
    }

    async fn query(
        &self,
        patient_record_id: &PatientRecordId,
    ) -> StorageResult<Vec<PersistedDiagnosisResult>> {
        self.simulate_latency().await;

        let stored = self.lock_rows()?;
        let mut rows: Vec<PersistedDiagnosisResult> = stored
            .values()
            .filter(|r| &r.patient_record_id == patient_record_id)
            .cloned()
            .collect();
        sort_rows(&mut rows);
        Ok(rows)
    }

    async fn delete_for_patient(
        &self,
        patient_record_id: &PatientRecordId,
    ) -> StorageResult<u64> {
        self.simulate_latency().await;

        let mut stored = self.lock_rows()?;
        let before = stored.len();
        stored.retain(|_, r| &r.patient_record_id != patient_record_id);
        Ok((before - stored.len()) as u64)
    }
}
