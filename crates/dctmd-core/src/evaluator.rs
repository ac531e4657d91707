//! Catalog-wide diagnosis evaluation.
//!
//! For every diagnosis the anamnesis tree is evaluated once, side
//! independent. The examination tree is then evaluated at each
//! (side, region) the diagnosis declares, and each location's status is the
//! [`effective_status`] of the two. The overall status is the
//! [`aggregate_status`] of all location statuses.

use serde::{Deserialize, Serialize};

use crate::catalog::{DiagnosisCatalog, DiagnosisDefinition};
use crate::criteria::{CriterionEvaluator, CriterionResult, LocationContext, TreeEvaluator};
use crate::mapper::DataBag;
use crate::status::{aggregate_status, effective_status};
use crate::{CriterionStatus, DiagnosisId, Region, Side};

/// One (side, region) of one diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaLocationResult {
    pub side: Side,
    pub region: Region,
    /// Effective status: anamnesis and examination combined.
    pub status: CriterionStatus,
    pub examination_status: CriterionStatus,
    pub examination_result: CriterionResult,
}

/// Derived, in-memory result for one diagnosis. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisEvaluationResult {
    pub diagnosis_id: DiagnosisId,
    pub anamnesis_status: CriterionStatus,
    pub anamnesis_result: CriterionResult,
    pub location_results: Vec<CriteriaLocationResult>,
    pub positive_locations: Vec<(Side, Region)>,
    pub status: CriterionStatus,
}

impl DiagnosisEvaluationResult {
    pub fn location(&self, side: Side, region: Region) -> Option<&CriteriaLocationResult> {
        self.location_results
            .iter()
            .find(|l| l.side == side && l.region == region)
    }

    fn refresh_derived(&mut self, has_regions: bool) {
        self.positive_locations = self
            .location_results
            .iter()
            .filter(|l| l.status.is_positive())
            .map(|l| (l.side, l.region))
            .collect();
        self.status = if has_regions {
            aggregate_status(self.location_results.iter().map(|l| l.status))
        } else {
            self.anamnesis_status
        };
    }

    #[cfg(test)]
    pub(crate) fn bare(diagnosis_id: DiagnosisId, status: CriterionStatus) -> Self {
        use crate::criteria::ResultKind;
        Self {
            diagnosis_id,
            anamnesis_status: status,
            anamnesis_result: CriterionResult {
                id: "anamnesis".into(),
                label: None,
                kind: ResultKind::And,
                status,
                resolved_path: None,
                children: Vec::new(),
            },
            location_results: Vec::new(),
            positive_locations: Vec::new(),
            status,
        }
    }
}

/// Evaluate every diagnosis in `catalog` with the reference evaluator.
pub fn evaluate_all(catalog: &DiagnosisCatalog, data: &DataBag) -> Vec<DiagnosisEvaluationResult> {
    evaluate_all_with(&TreeEvaluator, catalog, data)
}

/// Evaluate every diagnosis in `catalog`, in catalog order.
pub fn evaluate_all_with(
    evaluator: &dyn CriterionEvaluator,
    catalog: &DiagnosisCatalog,
    data: &DataBag,
) -> Vec<DiagnosisEvaluationResult> {
    let mut results: Vec<DiagnosisEvaluationResult> = catalog
        .iter()
        .map(|def| evaluate_diagnosis(evaluator, def, data))
        .collect();
    apply_requirements(catalog, &mut results);
    results
}

/// Evaluate one diagnosis without cross-diagnosis requirements.
pub fn evaluate_diagnosis(
    evaluator: &dyn CriterionEvaluator,
    def: &DiagnosisDefinition,
    data: &DataBag,
) -> DiagnosisEvaluationResult {
    let anamnesis_result =
        evaluator.evaluate(&def.anamnesis, data, LocationContext::diagnosis_level());
    let anamnesis_status = anamnesis_result.status;

    let mut location_results = Vec::with_capacity(Side::ALL.len() * def.regions.len());
    for side in Side::ALL {
        for region in Region::ALL {
            if !def.applies_to(region) {
                continue;
            }
            let examination_result =
                evaluator.evaluate(&def.examination, data, LocationContext::at(side, region));
            let examination_status = examination_result.status;
            location_results.push(CriteriaLocationResult {
                side,
                region,
                status: effective_status(anamnesis_status, examination_status),
                examination_status,
                examination_result,
            });
        }
    }

    let mut result = DiagnosisEvaluationResult {
        diagnosis_id: def.id.clone(),
        anamnesis_status,
        anamnesis_result,
        location_results,
        positive_locations: Vec::new(),
        status: anamnesis_status,
    };
    result.refresh_derived(!def.regions.is_empty());
    result
}

/// Combine each dependent diagnosis with the overall status of the
/// diagnoses it requires. Uses pre-requirement statuses, one level deep.
fn apply_requirements(catalog: &DiagnosisCatalog, results: &mut [DiagnosisEvaluationResult]) {
    let base: Vec<(DiagnosisId, CriterionStatus)> = results
        .iter()
        .map(|r| (r.diagnosis_id.clone(), r.status))
        .collect();

    for (def, result) in catalog.iter().zip(results.iter_mut()) {
        let Some(requires) = &def.requires else {
            continue;
        };
        let known: Vec<CriterionStatus> = requires
            .any_of
            .iter()
            .filter_map(|id| base.iter().find(|(d, _)| d == id).map(|(_, s)| *s))
            .collect();
        let requirement = if known.is_empty() {
            CriterionStatus::Pending
        } else {
            aggregate_status(known)
        };

        if def.regions.is_empty() {
            result.anamnesis_status = effective_status(result.anamnesis_status, requirement);
        }
        for location in &mut result.location_results {
            location.status = effective_status(location.status, requirement);
        }
        result.refresh_derived(!def.regions.is_empty());
    }
}
