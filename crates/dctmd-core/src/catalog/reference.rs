//! Built-in DC/TMD Axis I reference catalog.
//!
//! An approximation of the published decision trees, expressed against the
//! data-bag layout produced by [`crate::mapper::map_criteria_data`]. Validate
//! against the authoritative catalog before clinical use.
//!
//! Examination paths used here:
//!
//! | path                                   | value      |
//! |----------------------------------------|------------|
//! | `e1.pain.{side}.{region}`              | bool       |
//! | `e1.headache.{side}.temporalis`        | bool       |
//! | `e4.{side}.{region}.familiarPain`      | `yes`/`no` |
//! | `e4.{side}.temporalis.familiarHeadache`| `yes`/`no` |
//! | `e4.maxAssisted`                       | mm         |
//! | `e5.{side}.{region}.familiarPain`      | `yes`/`no` |
//! | `e6.{side}.click` / `.crepitus`        | bool       |
//! | `e7.{side}.click` / `.crepitus`        | bool       |
//! | `e9.{side}.{region}.familiarPain`      | `yes`/`no` |
//! | `e9.{side}.{region}.spreadingPain`     | `yes`/`no` |
//! | `e9.{side}.{region}.referredPain`      | `yes`/`no` |
//! | `e9.{side}.temporalis.familiarHeadache`| `yes`/`no` |

use serde_json::json;

use super::{DiagnosisCatalog, DiagnosisDefinition, Requires};
use crate::criteria::{CriterionNode, LeafExpectation};
use crate::{DiagnosisId, Region};

/// Opening (mm) below which a closed lock counts as limiting.
const LIMITED_OPENING_MM: f64 = 40.0;

fn answer(id: &str, path: &str, expected: &str) -> CriterionNode {
    CriterionNode::leaf(
        id,
        path,
        LeafExpectation::Equals {
            value: json!(expected),
        },
    )
}

fn sq_yes(item: &str) -> CriterionNode {
    answer(&item.to_lowercase(), &format!("sq.{item}"), "yes")
}

fn sq_no(item: &str) -> CriterionNode {
    answer(&item.to_lowercase(), &format!("sq.{item}"), "no")
}

fn flag(id: &str, path: &str) -> CriterionNode {
    CriterionNode::leaf(id, path, LeafExpectation::IsTrue)
}

/// The office-use side marking for `item` covers the current side.
fn marked_side(item: &str) -> CriterionNode {
    flag(
        &format!("{}_side", item.to_lowercase()),
        &format!("sq.{item}_side.{{side}}"),
    )
}

fn any_sq_yes(id: &str, items: &[&str]) -> CriterionNode {
    CriterionNode::or(id, items.iter().map(|i| sq_yes(i)).collect())
}

fn pain_history() -> CriterionNode {
    CriterionNode::and(
        "pain_history",
        vec![
            sq_yes("SQ1").labelled("Pain in a masticatory structure"),
            any_sq_yes("pain_modified", &["SQ4_A", "SQ4_B", "SQ4_C", "SQ4_D"])
                .labelled("Pain modified by jaw movement, function or parafunction"),
        ],
    )
    .labelled("Pain history")
}

fn familiar_pain_on_provocation() -> CriterionNode {
    CriterionNode::and(
        "pain_exam",
        vec![
            flag("pain_location", "e1.pain.{side}.{region}")
                .labelled("Examiner confirmed pain location"),
            CriterionNode::or(
                "familiar_pain",
                vec![
                    answer("e4_familiar", "e4.{side}.{region}.familiarPain", "yes"),
                    answer("e9_familiar", "e9.{side}.{region}.familiarPain", "yes"),
                ],
            )
            .labelled("Familiar pain on opening or palpation"),
        ],
    )
}

fn palpation_pattern(spreading: &str, referred: &str) -> CriterionNode {
    CriterionNode::and(
        "palpation_pattern",
        vec![
            answer("e9_familiar", "e9.{side}.{region}.familiarPain", "yes"),
            answer("e9_spreading", "e9.{side}.{region}.spreadingPain", spreading),
            answer("e9_referred", "e9.{side}.{region}.referredPain", referred),
        ],
    )
}

fn joint_noise(kind: &str) -> CriterionNode {
    CriterionNode::or(
        &format!("{kind}_noise"),
        vec![
            flag(&format!("e6_{kind}"), &format!("e6.{{side}}.{kind}")),
            flag(&format!("e7_{kind}"), &format!("e7.{{side}}.{kind}")),
        ],
    )
}

fn closed_lock_history() -> CriterionNode {
    CriterionNode::and("closed_lock_history", vec![sq_yes("SQ9"), sq_yes("SQ10")])
        .labelled("Jaw locked limiting eating")
}

fn diagnosis(
    id: &str,
    name: &str,
    anamnesis: CriterionNode,
    examination: CriterionNode,
    regions: &[Region],
) -> DiagnosisDefinition {
    DiagnosisDefinition {
        id: DiagnosisId::from(id),
        name: name.to_string(),
        anamnesis,
        examination,
        regions: regions.to_vec(),
        requires: None,
        parent: None,
    }
}

fn subtype(mut def: DiagnosisDefinition, parent: &str) -> DiagnosisDefinition {
    def.parent = Some(DiagnosisId::from(parent));
    def
}

/// Build the reference catalog.
pub fn reference_catalog() -> DiagnosisCatalog {
    use Region::*;

    let myalgia_regions = [Temporalis, Masseter, OtherMasticatory];
    let subtype_regions = [Temporalis, Masseter];

    let mut headache = diagnosis(
        "headache_attributed_to_tmd",
        "Headache attributed to TMD",
        CriterionNode::and(
            "headache_history",
            vec![
                sq_yes("SQ5").labelled("Headache in the temple area"),
                any_sq_yes("headache_modified", &["SQ7_A", "SQ7_B", "SQ7_C", "SQ7_D"]),
            ],
        ),
        CriterionNode::and(
            "headache_exam",
            vec![
                flag("headache_location", "e1.headache.{side}.temporalis"),
                CriterionNode::or(
                    "familiar_headache",
                    vec![
                        answer("e4_headache", "e4.{side}.temporalis.familiarHeadache", "yes"),
                        answer("e9_headache", "e9.{side}.temporalis.familiarHeadache", "yes"),
                    ],
                ),
            ],
        ),
        &[Temporalis],
    );
    headache.requires = Some(Requires {
        any_of: vec![DiagnosisId::from("myalgia"), DiagnosisId::from("arthralgia")],
    });

    let diagnoses = vec![
        diagnosis(
            "myalgia",
            "Myalgia",
            pain_history(),
            familiar_pain_on_provocation(),
            &myalgia_regions,
        ),
        subtype(
            diagnosis(
                "local_myalgia",
                "Local myalgia",
                pain_history(),
                palpation_pattern("no", "no"),
                &subtype_regions,
            ),
            "myalgia",
        ),
        subtype(
            diagnosis(
                "myofascial_pain",
                "Myofascial pain",
                pain_history(),
                palpation_pattern("yes", "no"),
                &subtype_regions,
            ),
            "myalgia",
        ),
        subtype(
            diagnosis(
                "myofascial_pain_with_referral",
                "Myofascial pain with referral",
                pain_history(),
                CriterionNode::and(
                    "palpation_pattern",
                    vec![
                        answer("e9_familiar", "e9.{side}.{region}.familiarPain", "yes"),
                        answer("e9_referred", "e9.{side}.{region}.referredPain", "yes"),
                    ],
                ),
                &subtype_regions,
            ),
            "myalgia",
        ),
        diagnosis(
            "arthralgia",
            "Arthralgia",
            pain_history(),
            CriterionNode::and(
                "pain_exam",
                vec![
                    flag("pain_location", "e1.pain.{side}.tmj"),
                    CriterionNode::or(
                        "familiar_pain",
                        vec![
                            answer("e4_familiar", "e4.{side}.tmj.familiarPain", "yes"),
                            answer("e5_familiar", "e5.{side}.tmj.familiarPain", "yes"),
                            answer("e9_familiar", "e9.{side}.tmj.familiarPain", "yes"),
                        ],
                    ),
                ],
            ),
            &[Tmj],
        ),
        headache,
        diagnosis(
            "disc_displacement_with_reduction",
            "Disc displacement with reduction",
            sq_yes("SQ8").labelled("TMJ noise"),
            CriterionNode::and("ddwr_exam", vec![marked_side("SQ8"), joint_noise("click")]),
            &[Tmj],
        ),
        diagnosis(
            "ddwr_intermittent_locking",
            "Disc displacement with reduction, with intermittent locking",
            CriterionNode::and("intermittent_lock_history", vec![sq_yes("SQ11"), sq_no("SQ12")]),
            CriterionNode::and("ddwr_il_exam", vec![marked_side("SQ11"), joint_noise("click")]),
            &[Tmj],
        ),
        diagnosis(
            "ddwor_limited_opening",
            "Disc displacement without reduction, with limited opening",
            closed_lock_history(),
            CriterionNode::and(
                "ddwor_limited_exam",
                vec![
                    marked_side("SQ9"),
                    CriterionNode::leaf(
                        "max_assisted_opening",
                        "e4.maxAssisted",
                        LeafExpectation::Below {
                            limit: LIMITED_OPENING_MM,
                        },
                    ),
                ],
            ),
            &[Tmj],
        ),
        diagnosis(
            "ddwor_without_limited_opening",
            "Disc displacement without reduction, without limited opening",
            closed_lock_history(),
            CriterionNode::and(
                "ddwor_unlimited_exam",
                vec![
                    marked_side("SQ9"),
                    CriterionNode::leaf(
                        "max_assisted_opening",
                        "e4.maxAssisted",
                        LeafExpectation::AtLeast {
                            min: LIMITED_OPENING_MM,
                        },
                    ),
                ],
            ),
            &[Tmj],
        ),
        diagnosis(
            "degenerative_joint_disease",
            "Degenerative joint disease",
            sq_yes("SQ8").labelled("TMJ noise"),
            CriterionNode::and("djd_exam", vec![marked_side("SQ8"), joint_noise("crepitus")]),
            &[Tmj],
        ),
        diagnosis(
            "subluxation",
            "Subluxation",
            CriterionNode::and("subluxation_history", vec![sq_yes("SQ13"), sq_yes("SQ14")]),
            marked_side("SQ13"),
            &[Tmj],
        ),
    ];

    // Validated in catalog::tests::test_reference_catalog_is_valid.
    DiagnosisCatalog { diagnoses }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{evaluate_criterion, LocationContext};
    use crate::mapper::{map_criteria_data, SqAnswers};
    use crate::{CriterionStatus, Side};

    #[test]
    fn test_only_myalgia_family_has_parents() {
        let catalog = reference_catalog();
        let children: Vec<&str> = catalog
            .iter()
            .filter(|d| d.parent.is_some())
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(
            children,
            vec!["local_myalgia", "myofascial_pain", "myofascial_pain_with_referral"]
        );
    }

    #[test]
    fn test_subtype_regions_within_parent() {
        let catalog = reference_catalog();
        for d in catalog.iter() {
            if let Some(parent) = &d.parent {
                let parent = catalog.get(parent).unwrap();
                assert!(d.regions.iter().all(|r| parent.applies_to(*r)), "{}", d.id);
            }
        }
    }

    #[test]
    fn test_ddwr_exam_uses_office_marking() {
        let catalog = reference_catalog();
        let ddwr = catalog
            .get(&DiagnosisId::from("disc_displacement_with_reduction"))
            .unwrap();

        let sq: SqAnswers = [
            ("SQ8".to_string(), json!("yes")),
            ("SQ8_office".to_string(), json!({ "R": true })),
        ]
        .into_iter()
        .collect();
        let exam = json!({
            "e6": { "right": { "click": true }, "left": { "click": true } }
        });
        let data = map_criteria_data(&sq, &exam);

        let right = evaluate_criterion(
            &ddwr.examination,
            &data,
            LocationContext::at(Side::Right, Region::Tmj),
        );
        let left = evaluate_criterion(
            &ddwr.examination,
            &data,
            LocationContext::at(Side::Left, Region::Tmj),
        );
        assert_eq!(right.status, CriterionStatus::Positive);
        assert_eq!(left.status, CriterionStatus::Negative);
    }
}
