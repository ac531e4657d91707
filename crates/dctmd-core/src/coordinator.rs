//! Debounced, superseding recompute scheduling.
//!
//! Every [`SourceDataChanged`] for a patient aborts whatever recompute is
//! still outstanding for that patient (debouncing or in flight) and
//! schedules a fresh one with the new snapshot. Only the latest snapshot is
//! ever persisted, including while a caller is flushing. Patients are
//! independent of each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use crate::config::SyncConfig;
use crate::mapper::SqAnswers;
use crate::obs;
use crate::sync::SyncEngine;
use crate::{DiagnosisResultStore, PatientRecordId};

/// Questionnaire or examination data for a patient changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDataChanged {
    pub patient_record_id: PatientRecordId,
    pub sq_answers: SqAnswers,
    pub examination_data: Value,
}

/// Outstanding recompute for one patient. `done` closes when the task
/// completes or is aborted.
struct PendingRecompute {
    abort: AbortHandle,
    done: watch::Receiver<()>,
}

impl PendingRecompute {
    fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    async fn wait(mut done: watch::Receiver<()>) {
        // Nothing is ever sent; this returns once the sender is dropped.
        while done.changed().await.is_ok() {}
    }
}

/// Per-patient recompute scheduler in front of a [`SyncEngine`].
pub struct RecomputeCoordinator<S: DiagnosisResultStore + 'static> {
    engine: Arc<SyncEngine<S>>,
    config: SyncConfig,
    tasks: Mutex<HashMap<PatientRecordId, PendingRecompute>>,
}

impl<S: DiagnosisResultStore + 'static> RecomputeCoordinator<S> {
    pub fn new(engine: Arc<SyncEngine<S>>, config: SyncConfig) -> Self {
        Self {
            engine,
            config,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine<S>> {
        &self.engine
    }

    /// Schedule a recompute for the event's patient, superseding any
    /// outstanding one. Does not block; must be called inside a tokio runtime.
    pub fn notify(&self, event: SourceDataChanged) {
        let patient = event.patient_record_id.clone();
        let engine = Arc::clone(&self.engine);
        let debounce = self.config.debounce;

        let mut tasks = self.lock_tasks();
        if let Some(previous) = tasks.remove(&patient) {
            if !previous.is_finished() {
                previous.abort.abort();
                obs::emit_superseded(patient.as_str());
            }
        }
        tasks.retain(|_, pending| !pending.is_finished());

        let (done_tx, done) = watch::channel(());
        let task = tokio::spawn(async move {
            let _done = done_tx;
            tokio::time::sleep(debounce).await;
            // Failures are logged by the engine; the next change retries.
            let _ = engine
                .recompute_and_persist(
                    &event.patient_record_id,
                    &event.sq_answers,
                    &event.examination_data,
                )
                .await;
        });
        tasks.insert(
            patient,
            PendingRecompute {
                abort: task.abort_handle(),
                done,
            },
        );
    }

    /// Wait until the patient's task current at call time completes or is
    /// superseded. The task stays registered, so a later change can still
    /// abort it.
    pub async fn flush(&self, patient_record_id: &PatientRecordId) {
        let done = self
            .lock_tasks()
            .get(patient_record_id)
            .map(|pending| pending.done.clone());
        if let Some(done) = done {
            PendingRecompute::wait(done).await;
            debug!(patient_record_id = %patient_record_id, "recompute flushed");
        }
    }

    /// Wait for every task outstanding at call time.
    pub async fn flush_all(&self) {
        let waiting: Vec<_> = self
            .lock_tasks()
            .values()
            .map(|pending| PendingRecompute::wait(pending.done.clone()))
            .collect();
        futures::future::join_all(waiting).await;
    }

    /// Number of patients with a recompute still outstanding.
    pub fn pending(&self) -> usize {
        self.lock_tasks()
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Abort every outstanding recompute.
    pub fn shutdown(&self) {
        let mut tasks = self.lock_tasks();
        for (_, pending) in tasks.drain() {
            pending.abort.abort();
        }
    }

    /// Feed events from a channel into [`notify`](Self::notify) until the
    /// sending side closes.
    pub fn subscribe(self: Arc<Self>, mut events: mpsc::Receiver<SourceDataChanged>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.notify(event);
            }
            debug!("source data channel closed");
        })
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<PatientRecordId, PendingRecompute>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: DiagnosisResultStore + 'static> Drop for RecomputeCoordinator<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
