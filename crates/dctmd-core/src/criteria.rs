//! Criterion trees and their three-valued evaluation.
//!
//! A [`CriterionNode`] is either a leaf that checks one data-bag path, or an
//! `and`/`or` composite over ordered children. Evaluation produces an
//! isomorphic [`CriterionResult`] tree. Nothing here fails: an absent or
//! malformed value resolves to `pending`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mapper::DataBag;
use crate::{CriterionStatus, Region, Side};

/// Placeholder substituted with [`Side::data_key`].
pub const SIDE_PLACEHOLDER: &str = "{side}";
/// Placeholder substituted with [`Region::data_key`].
pub const REGION_PLACEHOLDER: &str = "{region}";

// ---------------------------------------------------------------------------
// Tree shape
// ---------------------------------------------------------------------------

/// What a leaf expects of the value at its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeafExpectation {
    /// Equal to `value`. Strings compare case-insensitively.
    Equals { value: Value },
    /// Equal to any of `values`.
    OneOf { values: Vec<Value> },
    /// Boolean `true`.
    IsTrue,
    /// Number `>= min`.
    AtLeast { min: f64 },
    /// Number `< limit`.
    Below { limit: f64 },
    /// Object or array with at least one `true` member.
    AnyTrue,
}

/// One node of a diagnosis criterion tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriterionNode {
    Leaf {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        path: String,
        expect: LeafExpectation,
    },
    And {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        children: Vec<CriterionNode>,
    },
    Or {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        children: Vec<CriterionNode>,
    },
}

impl CriterionNode {
    pub fn leaf(id: impl Into<String>, path: impl Into<String>, expect: LeafExpectation) -> Self {
        CriterionNode::Leaf {
            id: id.into(),
            label: None,
            path: path.into(),
            expect,
        }
    }

    pub fn and(id: impl Into<String>, children: Vec<CriterionNode>) -> Self {
        CriterionNode::And {
            id: id.into(),
            label: None,
            children,
        }
    }

    pub fn or(id: impl Into<String>, children: Vec<CriterionNode>) -> Self {
        CriterionNode::Or {
            id: id.into(),
            label: None,
            children,
        }
    }

    /// Attach a human-readable label.
    pub fn labelled(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            CriterionNode::Leaf { label, .. }
            | CriterionNode::And { label, .. }
            | CriterionNode::Or { label, .. } => *label = Some(text.into()),
        }
        self
    }

    pub fn id(&self) -> &str {
        match self {
            CriterionNode::Leaf { id, .. }
            | CriterionNode::And { id, .. }
            | CriterionNode::Or { id, .. } => id,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            CriterionNode::Leaf { label, .. }
            | CriterionNode::And { label, .. }
            | CriterionNode::Or { label, .. } => label.as_deref(),
        }
    }

    /// All leaf paths in the tree, placeholders unexpanded.
    pub fn leaf_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            CriterionNode::Leaf { path, .. } => out.push(path),
            CriterionNode::And { children, .. } | CriterionNode::Or { children, .. } => {
                for child in children {
                    child.collect_paths(out);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Which kind of node produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Leaf,
    And,
    Or,
}

/// Evaluated criterion tree, isomorphic to the [`CriterionNode`] it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: ResultKind,
    pub status: CriterionStatus,
    /// Leaf path after placeholder substitution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CriterionResult>,
}

/// Location a tree is evaluated at. Diagnosis-level trees use the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationContext {
    pub side: Option<Side>,
    pub region: Option<Region>,
}

impl LocationContext {
    pub fn diagnosis_level() -> Self {
        Self::default()
    }

    pub fn at(side: Side, region: Region) -> Self {
        Self {
            side: Some(side),
            region: Some(region),
        }
    }

    /// Substitute placeholders. `None` if a placeholder has no value here.
    pub fn resolve(&self, path: &str) -> Option<String> {
        let mut resolved = path.to_string();
        if resolved.contains(SIDE_PLACEHOLDER) {
            resolved = resolved.replace(SIDE_PLACEHOLDER, self.side?.data_key());
        }
        if resolved.contains(REGION_PLACEHOLDER) {
            resolved = resolved.replace(REGION_PLACEHOLDER, self.region?.data_key());
        }
        Some(resolved)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluates one criterion tree against a data bag.
///
/// This is the seam where an externally supplied catalog evaluator plugs in;
/// [`TreeEvaluator`] is the reference implementation.
pub trait CriterionEvaluator {
    fn evaluate(&self, node: &CriterionNode, data: &DataBag, ctx: LocationContext)
        -> CriterionResult;
}

/// Reference three-valued evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeEvaluator;

impl CriterionEvaluator for TreeEvaluator {
    fn evaluate(
        &self,
        node: &CriterionNode,
        data: &DataBag,
        ctx: LocationContext,
    ) -> CriterionResult {
        evaluate_criterion(node, data, ctx)
    }
}

/// Evaluate `node` against `data` at `ctx`.
pub fn evaluate_criterion(
    node: &CriterionNode,
    data: &DataBag,
    ctx: LocationContext,
) -> CriterionResult {
    match node {
        CriterionNode::Leaf {
            id,
            label,
            path,
            expect,
        } => {
            let resolved = ctx.resolve(path);
            let status = resolved
                .as_deref()
                .and_then(|p| data.get_path(p))
                .map(|value| check_leaf(expect, value))
                .unwrap_or(CriterionStatus::Pending);
            CriterionResult {
                id: id.clone(),
                label: label.clone(),
                kind: ResultKind::Leaf,
                status,
                resolved_path: resolved,
                children: Vec::new(),
            }
        }
        CriterionNode::And {
            id,
            label,
            children,
        } => {
            let children: Vec<CriterionResult> = children
                .iter()
                .map(|c| evaluate_criterion(c, data, ctx))
                .collect();
            CriterionResult {
                id: id.clone(),
                label: label.clone(),
                kind: ResultKind::And,
                status: all_of(children.iter().map(|c| c.status)),
                resolved_path: None,
                children,
            }
        }
        CriterionNode::Or {
            id,
            label,
            children,
        } => {
            let children: Vec<CriterionResult> = children
                .iter()
                .map(|c| evaluate_criterion(c, data, ctx))
                .collect();
            CriterionResult {
                id: id.clone(),
                label: label.clone(),
                kind: ResultKind::Or,
                status: any_of(children.iter().map(|c| c.status)),
                resolved_path: None,
                children,
            }
        }
    }
}

/// Three-valued AND: negative if any negative, else pending if any pending.
fn all_of(statuses: impl Iterator<Item = CriterionStatus>) -> CriterionStatus {
    let mut saw_pending = false;
    for status in statuses {
        match status {
            CriterionStatus::Negative => return CriterionStatus::Negative,
            CriterionStatus::Pending => saw_pending = true,
            CriterionStatus::Positive => {}
        }
    }
    if saw_pending {
        CriterionStatus::Pending
    } else {
        CriterionStatus::Positive
    }
}

/// Three-valued OR: positive if any positive, else pending if any pending.
fn any_of(statuses: impl Iterator<Item = CriterionStatus>) -> CriterionStatus {
    let mut saw_pending = false;
    for status in statuses {
        match status {
            CriterionStatus::Positive => return CriterionStatus::Positive,
            CriterionStatus::Pending => saw_pending = true,
            CriterionStatus::Negative => {}
        }
    }
    if saw_pending {
        CriterionStatus::Pending
    } else {
        CriterionStatus::Negative
    }
}

fn from_bool(b: bool) -> CriterionStatus {
    if b {
        CriterionStatus::Positive
    } else {
        CriterionStatus::Negative
    }
}

fn check_leaf(expect: &LeafExpectation, value: &Value) -> CriterionStatus {
    if value.is_null() {
        return CriterionStatus::Pending;
    }
    match expect {
        LeafExpectation::Equals { value: expected } => match comparable(expected, value) {
            Some(eq) => from_bool(eq),
            None => CriterionStatus::Pending,
        },
        LeafExpectation::OneOf { values } => {
            let mut comparable_any = false;
            for expected in values {
                match comparable(expected, value) {
                    Some(true) => return CriterionStatus::Positive,
                    Some(false) => comparable_any = true,
                    None => {}
                }
            }
            if comparable_any {
                CriterionStatus::Negative
            } else {
                CriterionStatus::Pending
            }
        }
        LeafExpectation::IsTrue => value
            .as_bool()
            .map(from_bool)
            .unwrap_or(CriterionStatus::Pending),
        LeafExpectation::AtLeast { min } => value
            .as_f64()
            .map(|n| from_bool(n >= *min))
            .unwrap_or(CriterionStatus::Pending),
        LeafExpectation::Below { limit } => value
            .as_f64()
            .map(|n| from_bool(n < *limit))
            .unwrap_or(CriterionStatus::Pending),
        LeafExpectation::AnyTrue => {
            let members: Vec<&Value> = match value {
                Value::Object(map) => map.values().collect(),
                Value::Array(items) => items.iter().collect(),
                _ => return CriterionStatus::Pending,
            };
            if members.iter().any(|m| m.as_bool() == Some(true)) {
                CriterionStatus::Positive
            } else if !members.is_empty() && members.iter().all(|m| m.is_boolean()) {
                CriterionStatus::Negative
            } else {
                CriterionStatus::Pending
            }
        }
    }
}

/// Equality when both sides have the same JSON type, `None` otherwise.
fn comparable(expected: &Value, actual: &Value) -> Option<bool> {
    match (expected, actual) {
        (Value::String(a), Value::String(b)) => Some(a.eq_ignore_ascii_case(b)),
        (Value::Number(a), Value::Number(b)) => Some(a.as_f64() == b.as_f64()),
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{map_criteria_data, SqAnswers};
    use serde_json::json;
    use CriterionStatus::*;

    fn bag(exam: Value) -> DataBag {
        let sq: SqAnswers = [("SQ1".to_string(), json!("yes")), ("SQ3".to_string(), json!("no"))]
            .into_iter()
            .collect();
        map_criteria_data(&sq, &exam)
    }

    fn yes(id: &str, path: &str) -> CriterionNode {
        CriterionNode::leaf(id, path, LeafExpectation::Equals { value: json!("yes") })
    }

    fn eval(node: &CriterionNode, data: &DataBag) -> CriterionStatus {
        evaluate_criterion(node, data, LocationContext::diagnosis_level()).status
    }

    #[test]
    fn test_leaf_equals() {
        let data = bag(json!({}));
        assert_eq!(eval(&yes("a", "sq.SQ1"), &data), Positive);
        assert_eq!(eval(&yes("b", "sq.SQ3"), &data), Negative);
        assert_eq!(eval(&yes("c", "sq.SQ99"), &data), Pending);
    }

    #[test]
    fn test_leaf_equals_is_case_insensitive() {
        let data = bag(json!({ "e0": "YES" }));
        assert_eq!(eval(&yes("a", "e0"), &data), Positive);
    }

    #[test]
    fn test_leaf_type_mismatch_is_pending() {
        let data = bag(json!({ "e0": 3, "flag": "true" }));
        assert_eq!(eval(&yes("a", "e0"), &data), Pending);
        assert_eq!(
            eval(&CriterionNode::leaf("b", "flag", LeafExpectation::IsTrue), &data),
            Pending
        );
    }

    #[test]
    fn test_leaf_null_is_pending() {
        let data = bag(json!({ "e0": null }));
        assert_eq!(
            eval(&CriterionNode::leaf("a", "e0", LeafExpectation::IsTrue), &data),
            Pending
        );
    }

    #[test]
    fn test_leaf_at_least() {
        let data = bag(json!({ "e4": { "opening": 38 } }));
        let node = |min| CriterionNode::leaf("a", "e4.opening", LeafExpectation::AtLeast { min });
        assert_eq!(eval(&node(40.0), &data), Negative);
        assert_eq!(eval(&node(38.0), &data), Positive);

        let below = CriterionNode::leaf("b", "e4.opening", LeafExpectation::Below { limit: 40.0 });
        assert_eq!(eval(&below, &data), Positive);
    }

    #[test]
    fn test_leaf_one_of() {
        let data = bag(json!({ "e6": "click" }));
        let node = CriterionNode::leaf(
            "a",
            "e6",
            LeafExpectation::OneOf {
                values: vec![json!("crepitus"), json!("click")],
            },
        );
        assert_eq!(eval(&node, &data), Positive);
        let miss = CriterionNode::leaf(
            "b",
            "e6",
            LeafExpectation::OneOf {
                values: vec![json!("crepitus")],
            },
        );
        assert_eq!(eval(&miss, &data), Negative);
    }

    #[test]
    fn test_leaf_any_true() {
        let data = bag(json!({
            "hit": { "a": false, "b": true },
            "miss": { "a": false, "b": false },
            "partial": { "a": false, "b": null },
            "empty": {},
        }));
        let node = |p: &str| CriterionNode::leaf("x", p, LeafExpectation::AnyTrue);
        assert_eq!(eval(&node("hit"), &data), Positive);
        assert_eq!(eval(&node("miss"), &data), Negative);
        assert_eq!(eval(&node("partial"), &data), Pending);
        assert_eq!(eval(&node("empty"), &data), Pending);
    }

    #[test]
    fn test_and_three_valued() {
        let data = bag(json!({}));
        let and = |children| CriterionNode::and("and", children);
        assert_eq!(eval(&and(vec![yes("a", "sq.SQ1"), yes("b", "sq.SQ3")]), &data), Negative);
        assert_eq!(eval(&and(vec![yes("a", "sq.SQ1"), yes("b", "sq.SQ99")]), &data), Pending);
        assert_eq!(eval(&and(vec![yes("a", "sq.SQ1")]), &data), Positive);
        assert_eq!(eval(&and(vec![yes("a", "sq.SQ99"), yes("b", "sq.SQ3")]), &data), Negative);
        assert_eq!(eval(&and(vec![]), &data), Positive);
    }

    #[test]
    fn test_or_three_valued() {
        let data = bag(json!({}));
        let or = |children| CriterionNode::or("or", children);
        assert_eq!(eval(&or(vec![yes("a", "sq.SQ3"), yes("b", "sq.SQ1")]), &data), Positive);
        assert_eq!(eval(&or(vec![yes("a", "sq.SQ3"), yes("b", "sq.SQ99")]), &data), Pending);
        assert_eq!(eval(&or(vec![yes("a", "sq.SQ3")]), &data), Negative);
        assert_eq!(eval(&or(vec![]), &data), Negative);
    }

    #[test]
    fn test_result_tree_is_isomorphic() {
        let data = bag(json!({}));
        let node = CriterionNode::and(
            "root",
            vec![yes("a", "sq.SQ1"), CriterionNode::or("inner", vec![yes("b", "sq.SQ3")])],
        )
        .labelled("History");
        let result = evaluate_criterion(&node, &data, LocationContext::diagnosis_level());
        assert_eq!(result.label.as_deref(), Some("History"));
        assert_eq!(result.kind, ResultKind::And);
        assert_eq!(result.children.len(), 2);
        assert_eq!(result.children[1].id, "inner");
        assert_eq!(result.children[1].children[0].status, Negative);
    }

    #[test]
    fn test_placeholders_resolve_per_location() {
        let data = bag(json!({ "e9": { "right": { "masseter": { "familiarPain": "yes" } } } }));
        let node = yes("fp", "e9.{side}.{region}.familiarPain");

        let right = evaluate_criterion(&node, &data, LocationContext::at(Side::Right, Region::Masseter));
        assert_eq!(right.status, Positive);
        assert_eq!(right.resolved_path.as_deref(), Some("e9.right.masseter.familiarPain"));

        let left = evaluate_criterion(&node, &data, LocationContext::at(Side::Left, Region::Masseter));
        assert_eq!(left.status, Pending);
    }

    #[test]
    fn test_placeholder_without_context_is_pending() {
        let data = bag(json!({}));
        let node = yes("fp", "e9.{side}.temporalis");
        let result = evaluate_criterion(&node, &data, LocationContext::diagnosis_level());
        assert_eq!(result.status, Pending);
        assert_eq!(result.resolved_path, None);
    }

    #[test]
    fn test_node_serde_shape() {
        let node: CriterionNode = serde_json::from_value(json!({
            "kind": "and",
            "id": "root",
            "children": [
                { "kind": "leaf", "id": "sq1", "path": "sq.SQ1", "expect": { "type": "equals", "value": "yes" } },
                { "kind": "leaf", "id": "open", "path": "e4.opening", "expect": { "type": "at_least", "min": 40 } }
            ]
        }))
        .unwrap();
        assert_eq!(node.leaf_paths(), vec!["sq.SQ1", "e4.opening"]);
    }
}
