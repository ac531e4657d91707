//! Per-location display signals and positive-diagnosis groupings.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::DiagnosisCatalog;
use crate::evaluator::DiagnosisEvaluationResult;
use crate::status::{aggregate_status, effective_status};
use crate::{CriterionStatus, DiagnosisId, Region, Side};

/// Combined status of every diagnosis at one (side, region).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStatus {
    pub side: Side,
    pub region: Region,
    pub status: CriterionStatus,
}

/// One positive diagnosis at one location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositiveGroup {
    pub diagnosis_id: DiagnosisId,
    pub side: Side,
    pub region: Region,
}

/// All positive diagnoses at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationGroup {
    pub side: Side,
    pub region: Region,
    pub diagnoses: Vec<DiagnosisId>,
}

/// Every (side, region) in display order: regions first, right before left.
pub fn display_locations() -> impl Iterator<Item = (Side, Region)> {
    Region::ALL
        .into_iter()
        .flat_map(|region| Side::DISPLAY_ORDER.into_iter().map(move |side| (side, region)))
}

/// One display status per location.
///
/// Each applicable diagnosis contributes `effective_status(anamnesis,
/// location)`; contributions are joined with [`aggregate_status`].
/// Locations no diagnosis applies to are omitted.
pub fn location_statuses(
    results: &[DiagnosisEvaluationResult],
    catalog: &DiagnosisCatalog,
) -> Vec<LocationStatus> {
    display_locations()
        .filter_map(|(side, region)| {
            let contributions: Vec<CriterionStatus> = results
                .iter()
                .filter(|r| {
                    catalog
                        .get(&r.diagnosis_id)
                        .map_or(true, |def| def.applies_to(region))
                })
                .filter_map(|r| {
                    r.location(side, region)
                        .map(|l| effective_status(r.anamnesis_status, l.status))
                })
                .collect();
            if contributions.is_empty() {
                return None;
            }
            Some(LocationStatus {
                side,
                region,
                status: aggregate_status(contributions),
            })
        })
        .collect()
}

/// Display status at one location, if any diagnosis applies there.
pub fn status_at(statuses: &[LocationStatus], side: Side, region: Region) -> Option<CriterionStatus> {
    statuses
        .iter()
        .find(|s| s.side == side && s.region == region)
        .map(|s| s.status)
}

/// Positive (diagnosis, side, region) triples.
///
/// Only diagnoses with positive overall status contribute, at their positive
/// locations. Ordered by region, then side (right first), then input order.
pub fn positive_groups(results: &[DiagnosisEvaluationResult]) -> Vec<PositiveGroup> {
    let mut seen = HashSet::new();
    let mut groups: Vec<(usize, PositiveGroup)> = Vec::new();

    for (index, result) in results.iter().enumerate() {
        if !result.status.is_positive() {
            continue;
        }
        for &(side, region) in &result.positive_locations {
            let group = PositiveGroup {
                diagnosis_id: result.diagnosis_id.clone(),
                side,
                region,
            };
            if seen.insert(group.clone()) {
                groups.push((index, group));
            }
        }
    }

    groups.sort_by_key(|(index, g)| (g.region.display_rank(), g.side.display_rank(), *index));
    groups.into_iter().map(|(_, g)| g).collect()
}

/// Group positive triples per location, keeping their order.
pub fn group_by_location(groups: &[PositiveGroup]) -> Vec<LocationGroup> {
    let mut out: Vec<LocationGroup> = Vec::new();
    for g in groups {
        match out
            .iter_mut()
            .find(|l| l.side == g.side && l.region == g.region)
        {
            Some(location) => location.diagnoses.push(g.diagnosis_id.clone()),
            None => out.push(LocationGroup {
                side: g.side,
                region: g.region,
                diagnoses: vec![g.diagnosis_id.clone()],
            }),
        }
    }
    out
}
