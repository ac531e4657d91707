//! Display-facing views over evaluation results and persisted rows.
//!
//! Rendering is plain text, one row per line, for terminals and logs.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregation::LocationStatus;
use crate::catalog::DiagnosisCatalog;
use crate::evaluator::DiagnosisEvaluationResult;
use crate::{
    CriterionStatus, DiagnosisId, PersistedDiagnosisResult, PractitionerDecision, Region, ResultId,
    Side,
};

const LABEL_WIDTH: usize = 34;

/// Human-readable location, e.g. "Right temporalis".
pub fn location_label(side: Side, region: Region) -> String {
    format!("{} {}", side.label(), region.label())
}

// ── Diagnosis summaries ──

/// One line of the diagnosis list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisSummary {
    pub diagnosis_id: DiagnosisId,
    pub name: String,
    pub status: CriterionStatus,
    pub positive_locations: Vec<String>,
}

/// Summaries for (typically flattened) results. Names come from the catalog,
/// falling back to the id.
pub fn summarize(
    results: &[DiagnosisEvaluationResult],
    catalog: &DiagnosisCatalog,
) -> Vec<DiagnosisSummary> {
    results
        .iter()
        .map(|r| DiagnosisSummary {
            diagnosis_id: r.diagnosis_id.clone(),
            name: catalog
                .get(&r.diagnosis_id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| r.diagnosis_id.to_string()),
            status: r.status,
            positive_locations: r
                .positive_locations
                .iter()
                .map(|&(side, region)| location_label(side, region))
                .collect(),
        })
        .collect()
}

pub fn render_summaries(summaries: &[DiagnosisSummary]) -> String {
    let mut out = String::new();
    for s in summaries {
        let _ = write!(out, "{:<LABEL_WIDTH$} {:<9}", s.name, s.status.as_str());
        if !s.positive_locations.is_empty() {
            let _ = write!(out, " {}", s.positive_locations.join(", "));
        }
        out.push('\n');
    }
    out
}

pub fn render_location_statuses(statuses: &[LocationStatus]) -> String {
    let mut out = String::new();
    for s in statuses {
        let _ = writeln!(
            out,
            "{:<LABEL_WIDTH$} {}",
            location_label(s.side, s.region),
            s.status.as_str()
        );
    }
    out
}

// ── Decision-aware rows ──

/// Status shown to the clinician: a confirmation overrides the computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Confirmed,
    Positive,
    Negative,
    Pending,
}

impl DisplayStatus {
    pub fn resolve(computed: CriterionStatus, decision: Option<PractitionerDecision>) -> Self {
        match (decision, computed) {
            (Some(PractitionerDecision::Confirmed), _) => DisplayStatus::Confirmed,
            (None, CriterionStatus::Positive) => DisplayStatus::Positive,
            (None, CriterionStatus::Negative) => DisplayStatus::Negative,
            (None, CriterionStatus::Pending) => DisplayStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStatus::Confirmed => "confirmed",
            DisplayStatus::Positive => "positive",
            DisplayStatus::Negative => "negative",
            DisplayStatus::Pending => "pending",
        }
    }
}

/// A persisted row merged with the live evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionView {
    pub result_id: ResultId,
    pub diagnosis_id: DiagnosisId,
    pub side: Side,
    pub region: Region,
    /// Live status when the diagnosis was evaluated, otherwise the stored one.
    pub computed_status: CriterionStatus,
    /// False when the live status differs from what is stored.
    pub in_sync: bool,
    pub practitioner_decision: Option<PractitionerDecision>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub display_status: DisplayStatus,
}

pub fn decision_views(
    rows: &[PersistedDiagnosisResult],
    results: &[DiagnosisEvaluationResult],
) -> Vec<DecisionView> {
    rows.iter()
        .map(|row| {
            let live = results
                .iter()
                .find(|r| r.diagnosis_id == row.diagnosis_id)
                .and_then(|r| r.location(row.side, row.region))
                .map(|l| l.status);
            let computed_status = live.unwrap_or(row.computed_status);
            DecisionView {
                result_id: row.id.clone(),
                diagnosis_id: row.diagnosis_id.clone(),
                side: row.side,
                region: row.region,
                computed_status,
                in_sync: computed_status == row.computed_status,
                practitioner_decision: row.practitioner_decision,
                decided_by: row.decided_by.clone(),
                decided_at: row.decided_at,
                note: row.note.clone(),
                display_status: DisplayStatus::resolve(computed_status, row.practitioner_decision),
            }
        })
        .collect()
}

pub fn render_decisions(views: &[DecisionView]) -> String {
    let mut out = String::new();
    for v in views {
        let label = format!("{} @ {}", v.diagnosis_id, location_label(v.side, v.region));
        let _ = write!(
            out,
            "{}  {:<LABEL_WIDTH$} {:<9}",
            v.result_id.short(),
            label,
            v.display_status.as_str()
        );
        if let Some(by) = &v.decided_by {
            let _ = write!(out, " by {by}");
        }
        if let Some(note) = &v.note {
            let _ = write!(out, " \"{note}\"");
        }
        if !v.in_sync {
            out.push_str(" (unsynced)");
        }
        out.push('\n');
    }
    out
}
