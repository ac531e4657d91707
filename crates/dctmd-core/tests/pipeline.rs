//! End-to-end evaluation pipeline: map → evaluate → flatten → aggregate.

use dctmd_core::aggregation::status_at;
use dctmd_core::display::{render_location_statuses, summarize};
use dctmd_core::{
    evaluate_all, flatten, location_statuses, map_criteria_data, positive_groups, CriterionNode,
    CriterionStatus, DiagnosisCatalog, DiagnosisDefinition, DiagnosisEvaluationResult,
    DiagnosisId, LeafExpectation, Region, Side, SqAnswers,
};
use serde_json::{json, Value};

fn answers(pairs: &[(&str, Value)]) -> SqAnswers {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn find<'a>(results: &'a [DiagnosisEvaluationResult], id: &str) -> &'a DiagnosisEvaluationResult {
    results
        .iter()
        .find(|r| r.diagnosis_id.as_str() == id)
        .unwrap_or_else(|| panic!("no result for {id}"))
}

#[test]
fn history_alone_is_pending_but_neighbour_positive_wins_aggregate() {
    let sq1 = || CriterionNode::leaf("sq1", "sq.SQ1", LeafExpectation::Equals { value: json!("yes") });
    let catalog = DiagnosisCatalog::new(vec![
        DiagnosisDefinition {
            id: DiagnosisId::from("needs_exam"),
            name: "Needs exam".into(),
            anamnesis: sq1(),
            examination: CriterionNode::leaf(
                "fp",
                "e9.{side}.{region}.familiarPain",
                LeafExpectation::Equals { value: json!("yes") },
            ),
            regions: vec![Region::Temporalis],
            requires: None,
            parent: None,
        },
        DiagnosisDefinition {
            id: DiagnosisId::from("history_only"),
            name: "History only".into(),
            anamnesis: sq1(),
            examination: CriterionNode::and("no_exam", vec![]),
            regions: vec![Region::Temporalis],
            requires: None,
            parent: None,
        },
    ])
    .unwrap();

    let data = map_criteria_data(&answers(&[("SQ1", json!("yes"))]), &json!({}));
    let results = evaluate_all(&catalog, &data);

    let needs_exam = find(&results, "needs_exam");
    assert_eq!(needs_exam.anamnesis_status, CriterionStatus::Positive);
    for location in &needs_exam.location_results {
        assert_eq!(location.examination_status, CriterionStatus::Pending);
        assert_eq!(location.status, CriterionStatus::Pending);
    }
    assert_eq!(needs_exam.status, CriterionStatus::Pending);

    let statuses = location_statuses(&results, &catalog);
    for side in Side::ALL {
        assert_eq!(
            status_at(&statuses, side, Region::Temporalis),
            Some(CriterionStatus::Positive)
        );
    }
    assert!(render_location_statuses(&statuses).contains("Right temporalis"));
}

#[test]
fn referral_subtype_replaces_myalgia_after_flattening() {
    let catalog = DiagnosisCatalog::reference();
    let sq = answers(&[("SQ1", json!("yes")), ("SQ4_A", json!("yes"))]);
    let exam = json!({
        "e1": { "pain": { "right": { "temporalis": true } } },
        "e9": { "right": { "temporalis": {
            "familiarPain": "yes",
            "spreadingPain": "no",
            "referredPain": "yes"
        } } }
    });
    let results = evaluate_all(&catalog, &map_criteria_data(&sq, &exam));

    assert_eq!(find(&results, "myalgia").status, CriterionStatus::Positive);
    assert_eq!(
        find(&results, "myofascial_pain_with_referral").status,
        CriterionStatus::Positive
    );
    assert_ne!(find(&results, "local_myalgia").status, CriterionStatus::Positive);

    let flat = flatten(&results, &catalog.hierarchy());
    let ids: Vec<&str> = flat.iter().map(|r| r.diagnosis_id.as_str()).collect();
    assert_eq!(ids[0], "myofascial_pain_with_referral");
    for hidden in ["myalgia", "local_myalgia", "myofascial_pain"] {
        assert!(!ids.contains(&hidden), "{hidden} should be flattened away");
    }
    assert_eq!(flat.len(), catalog.len() - 3);

    let summaries = summarize(&flat, &catalog);
    assert_eq!(summaries[0].name, "Myofascial pain with referral");
    assert_eq!(summaries[0].positive_locations, vec!["Right temporalis"]);

    let groups = positive_groups(&flat);
    assert_eq!(groups.len(), 1);
    assert_eq!((groups[0].side, groups[0].region), (Side::Right, Region::Temporalis));
}

#[test]
fn myalgia_without_positive_subtype_stays() {
    let catalog = DiagnosisCatalog::reference();
    let sq = answers(&[("SQ1", json!("yes")), ("SQ4_B", json!("yes"))]);
    // Familiar pain on opening only: no palpation pattern for the subtypes.
    let exam = json!({
        "e1": { "pain": { "left": { "masseter": true } } },
        "e4": { "left": { "masseter": { "familiarPain": "yes" } } }
    });
    let results = evaluate_all(&catalog, &map_criteria_data(&sq, &exam));
    let flat = flatten(&results, &catalog.hierarchy());
    assert_eq!(flat[0].diagnosis_id.as_str(), "myalgia");
    assert_eq!(flat[0].positive_locations, vec![(Side::Left, Region::Masseter)]);
}

#[test]
fn office_marking_limits_disc_displacement_to_marked_side() {
    let catalog = DiagnosisCatalog::reference();
    let sq = answers(&[("SQ8", json!("yes")), ("SQ8_office", json!({ "R": true }))]);
    let exam = json!({
        "e6": { "left": { "click": true }, "right": { "click": true } }
    });
    let data = map_criteria_data(&sq, &exam);
    assert_eq!(
        data.get_path("sq.SQ8_side"),
        Some(&json!({ "left": false, "right": true }))
    );

    let results = evaluate_all(&catalog, &data);
    let ddwr = find(&results, "disc_displacement_with_reduction");
    assert_eq!(ddwr.positive_locations, vec![(Side::Right, Region::Tmj)]);
    assert_eq!(ddwr.status, CriterionStatus::Positive);
}

#[test]
fn negative_side_question_emits_no_marking() {
    let sq = answers(&[("SQ8", json!("no")), ("SQ8_office", json!({ "R": true }))]);
    let data = map_criteria_data(&sq, &json!({}));
    assert!(data.get_path("sq.SQ8_side").is_none());
}

#[test]
fn headache_requires_a_painful_tmd_diagnosis() {
    let catalog = DiagnosisCatalog::reference();
    let headache_exam = json!({
        "e1": { "headache": { "right": { "temporalis": true } } },
        "e4": { "right": { "temporalis": { "familiarHeadache": "yes" } } }
    });

    let without_pain = answers(&[
        ("SQ1", json!("no")),
        ("SQ5", json!("yes")),
        ("SQ7_A", json!("yes")),
    ]);
    let results = evaluate_all(&catalog, &map_criteria_data(&without_pain, &headache_exam));
    let headache = find(&results, "headache_attributed_to_tmd");
    assert_eq!(headache.anamnesis_status, CriterionStatus::Positive);
    assert_eq!(headache.status, CriterionStatus::Negative);
    assert!(headache.positive_locations.is_empty());

    let with_pain = answers(&[
        ("SQ1", json!("yes")),
        ("SQ4_A", json!("yes")),
        ("SQ5", json!("yes")),
        ("SQ7_A", json!("yes")),
    ]);
    let mut exam = headache_exam;
    exam["e1"]["pain"] = json!({ "right": { "temporalis": true } });
    exam["e9"] = json!({ "right": { "temporalis": { "familiarPain": "yes" } } });
    let results = evaluate_all(&catalog, &map_criteria_data(&with_pain, &exam));
    assert_eq!(find(&results, "myalgia").status, CriterionStatus::Positive);
    let headache = find(&results, "headache_attributed_to_tmd");
    assert_eq!(headache.status, CriterionStatus::Positive);
    assert_eq!(headache.positive_locations, vec![(Side::Right, Region::Temporalis)]);
}

#[test]
fn missing_exam_keeps_everything_pending_or_negative() {
    let catalog = DiagnosisCatalog::reference();
    let results = evaluate_all(&catalog, &map_criteria_data(&SqAnswers::new(), &json!({})));
    assert!(results.iter().all(|r| r.status != CriterionStatus::Positive));
    assert!(positive_groups(&results).is_empty());
}
