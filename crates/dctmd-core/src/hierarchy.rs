//! Parent/subtype flattening for display.

use std::collections::{HashMap, HashSet};

use crate::evaluator::DiagnosisEvaluationResult;
use crate::DiagnosisId;

/// Static child → parent lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosisHierarchy {
    parents: HashMap<DiagnosisId, DiagnosisId>,
}

impl DiagnosisHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (DiagnosisId, DiagnosisId)>,
    {
        Self {
            parents: pairs.into_iter().collect(),
        }
    }

    pub fn with_child(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.parents
            .insert(DiagnosisId::new(child), DiagnosisId::new(parent));
        self
    }

    pub fn parent_of(&self, child: &DiagnosisId) -> Option<&DiagnosisId> {
        self.parents.get(child)
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Collapse parent/subtype families into one flat list.
///
/// A parent is replaced by its positive subtypes (in input order) when it
/// has any, and emitted alone otherwise. Subtypes never appear at their own
/// position unless their parent is missing from `results`.
pub fn flatten(
    results: &[DiagnosisEvaluationResult],
    hierarchy: &DiagnosisHierarchy,
) -> Vec<DiagnosisEvaluationResult> {
    let present: HashSet<&DiagnosisId> = results.iter().map(|r| &r.diagnosis_id).collect();
    let mut out = Vec::with_capacity(results.len());

    for result in results {
        if let Some(parent) = hierarchy.parent_of(&result.diagnosis_id) {
            if present.contains(parent) {
                continue;
            }
            out.push(result.clone());
            continue;
        }

        let positive_subtypes: Vec<&DiagnosisEvaluationResult> = results
            .iter()
            .filter(|r| hierarchy.parent_of(&r.diagnosis_id) == Some(&result.diagnosis_id))
            .filter(|r| r.status.is_positive())
            .collect();

        if positive_subtypes.is_empty() {
            out.push(result.clone());
        } else {
            out.extend(positive_subtypes.into_iter().cloned());
        }
    }

    out
}
