//! Criteria data mapping.
//!
//! Merges questionnaire answers and examination form values into one
//! path-addressable [`DataBag`]. Pure and total: every input maps to a bag.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

/// Flat questionnaire answers, question id → answer.
pub type SqAnswers = BTreeMap<String, Value>;

/// Namespace questionnaire answers are placed under.
pub const SQ_NAMESPACE: &str = "sq";

/// Answer value that counts as "yes".
pub const AFFIRMATIVE: &str = "yes";

/// Questionnaire items that carry an office-use side marking.
pub const OFFICE_USE_SIDE_ITEMS: [&str; 7] =
    ["SQ8", "SQ9", "SQ10", "SQ11", "SQ12", "SQ13", "SQ14"];

/// Suffix of the answer key holding an item's office-use marking.
pub const OFFICE_SUFFIX: &str = "_office";

/// Suffix of the derived per-side entry.
pub const SIDE_SUFFIX: &str = "_side";

/// Path-addressable evaluation input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataBag(Map<String, Value>);

impl DataBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a dot-separated path. Numeric segments index into arrays.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Build the data bag for criteria evaluation.
///
/// Examination data keeps its own top-level keys. Questionnaire answers go
/// under `sq` (merged into an examination `sq` section if there is one), together with a derived `<item>_side` entry for every
/// office-use item answered affirmatively.
pub fn map_criteria_data(sq_answers: &SqAnswers, examination: &Value) -> DataBag {
    let mut bag = DataBag::new();

    if let Value::Object(sections) = examination {
        for (key, value) in sections {
            bag.insert(key.clone(), value.clone());
        }
    }

    // An examination section named `sq` is merged into; answers win per key.
    let mut sq = match bag.0.remove(SQ_NAMESPACE) {
        Some(Value::Object(section)) => section,
        Some(other) => {
            warn!(section = %other, "non-object examination section `sq` replaced by answers");
            Map::new()
        }
        None => Map::new(),
    };
    for (key, value) in sq_answers {
        if let Some(previous) = sq.insert(key.clone(), value.clone()) {
            warn!(key = %key, previous = %previous, "questionnaire answer overrides examination value");
        }
    }

    for item in OFFICE_USE_SIDE_ITEMS {
        if let Some(side) = side_marking(sq_answers, item) {
            sq.insert(format!("{item}{SIDE_SUFFIX}"), side);
        }
    }

    bag.insert(SQ_NAMESPACE, Value::Object(sq));
    bag
}

fn is_affirmative(answer: Option<&Value>) -> bool {
    matches!(answer, Some(Value::String(s)) if s.eq_ignore_ascii_case(AFFIRMATIVE))
}

/// `{left, right}` for an office-use item, or `None` when the item's answer
/// is not affirmative.
fn side_marking(sq_answers: &SqAnswers, item: &str) -> Option<Value> {
    if !is_affirmative(sq_answers.get(item)) {
        return None;
    }

    let marking = sq_answers.get(&format!("{item}{OFFICE_SUFFIX}"));
    let flag = |key: &str| {
        marking
            .and_then(|m| m.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let (r, l, dnk) = (flag("R"), flag("L"), flag("DNK"));

    if !(r || l || dnk) {
        // No usable marking: the item does not constrain the side.
        return Some(json!({ "left": true, "right": true }));
    }

    Some(json!({ "left": l || dnk, "right": r || dnk }))
}
