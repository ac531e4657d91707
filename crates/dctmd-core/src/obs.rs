//! Structured observability hooks for sync lifecycle events.
//!
//! This module provides:
//! - Patient-scoped tracing spans via the `PatientSpan` RAII guard
//! - Emission functions for recompute, decision and coordinator events
//!
//! Events are emitted at `info!` level, failures and rollbacks at `warn!`.
//! For JSON output, pass `json = true` to [`crate::init_tracing`].

use tracing::{info, warn};

/// Span tagged with the patient record id.
///
/// Attach it to futures with `tracing::Instrument`; [`PatientSpan`] is for
/// synchronous code only, since an entered span must not cross an `.await`.
pub fn patient_span(patient_record_id: &str) -> tracing::Span {
    tracing::info_span!("dctmd.patient", patient_record_id = %patient_record_id)
}

/// RAII guard that enters a patient-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = PatientSpan::enter("patient-42");
/// // every event below carries patient_record_id = "patient-42"
/// ```
pub struct PatientSpan {
    _span: tracing::span::EnteredSpan,
}

impl PatientSpan {
    pub fn enter(patient_record_id: &str) -> Self {
        Self {
            _span: patient_span(patient_record_id).entered(),
        }
    }
}

/// Emit event: recompute started for a patient.
pub fn emit_recompute_started(patient_record_id: &str, diagnoses: usize) {
    info!(
        event = "sync.recompute_started",
        patient_record_id = %patient_record_id,
        diagnoses = diagnoses,
    );
}

/// Emit event: recompute persisted `rows` rows, `positive` of them positive.
pub fn emit_recompute_finished(
    patient_record_id: &str,
    rows: usize,
    positive: usize,
    duration_ms: u64,
) {
    info!(
        event = "sync.recompute_finished",
        patient_record_id = %patient_record_id,
        rows = rows,
        positive = positive,
        duration_ms = duration_ms,
    );
}

/// Emit event: recompute failed (warning level). The next trigger retries.
pub fn emit_recompute_failed(patient_record_id: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "sync.recompute_failed",
        patient_record_id = %patient_record_id,
        error = %error,
    );
}

/// Emit event: a practitioner decision was stored.
pub fn emit_decision_applied(result_id: &str, decision: Option<&str>, user_id: &str) {
    info!(
        event = "sync.decision_applied",
        result_id = %result_id,
        decision = decision.unwrap_or("cleared"),
        user_id = %user_id,
    );
}

/// Emit event: a decision edit failed and the cached row was restored.
pub fn emit_decision_rolled_back(result_id: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "sync.decision_rolled_back",
        result_id = %result_id,
        error = %error,
    );
}

/// Emit event: an outstanding recompute was aborted by a newer change.
pub fn emit_superseded(patient_record_id: &str) {
    info!(event = "coordinator.superseded", patient_record_id = %patient_record_id);
}
