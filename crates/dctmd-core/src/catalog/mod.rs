//! Diagnosis catalog: definitions, loading and validation.
//!
//! A catalog is an ordered list of [`DiagnosisDefinition`]s. Order matters:
//! evaluation results, flattening and positive groupings all follow it.

mod reference;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::criteria::CriterionNode;
use crate::error::CatalogError;
use crate::hierarchy::DiagnosisHierarchy;
use crate::{DiagnosisId, Region};

pub use reference::reference_catalog;

/// Cross-diagnosis constraint: at least one of the listed diagnoses must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requires {
    pub any_of: Vec<DiagnosisId>,
}

/// One diagnosis as supplied by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisDefinition {
    pub id: DiagnosisId,
    pub name: String,
    /// Side-independent history criteria.
    pub anamnesis: CriterionNode,
    /// Location-specific criteria; paths may use `{side}` and `{region}`.
    pub examination: CriterionNode,
    /// Regions this diagnosis can be located at.
    pub regions: Vec<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requires>,
    /// Set for subtypes: the id of the parent diagnosis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<DiagnosisId>,
}

impl DiagnosisDefinition {
    pub fn applies_to(&self, region: Region) -> bool {
        self.regions.contains(&region)
    }
}

/// Validated, ordered set of diagnosis definitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DiagnosisCatalog {
    diagnoses: Vec<DiagnosisDefinition>,
}

impl DiagnosisCatalog {
    /// Validate and wrap definitions.
    ///
    /// Rejects duplicate ids, unknown or self parents, and subtypes of
    /// subtypes (the hierarchy is one level deep).
    pub fn new(diagnoses: Vec<DiagnosisDefinition>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for d in &diagnoses {
            if !seen.insert(d.id.clone()) {
                return Err(CatalogError::DuplicateId {
                    id: d.id.to_string(),
                });
            }
        }

        for d in &diagnoses {
            let Some(parent) = &d.parent else { continue };
            if parent == &d.id {
                return Err(CatalogError::SelfParent {
                    id: d.id.to_string(),
                });
            }
            let parent_def = diagnoses.iter().find(|p| &p.id == parent).ok_or_else(|| {
                CatalogError::UnknownParent {
                    id: d.id.to_string(),
                    parent: parent.to_string(),
                }
            })?;
            if parent_def.parent.is_some() {
                return Err(CatalogError::NestedSubtype {
                    id: d.id.to_string(),
                    parent: parent.to_string(),
                });
            }
        }

        Ok(Self { diagnoses })
    }

    /// Parse a JSON array of definitions.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let diagnoses: Vec<DiagnosisDefinition> = serde_json::from_str(json)?;
        Self::new(diagnoses)
    }

    /// Read a JSON catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The built-in reference catalog.
    pub fn reference() -> Self {
        reference_catalog()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosisDefinition> {
        self.diagnoses.iter()
    }

    pub fn get(&self, id: &DiagnosisId) -> Option<&DiagnosisDefinition> {
        self.diagnoses.iter().find(|d| &d.id == id)
    }

    pub fn len(&self) -> usize {
        self.diagnoses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnoses.is_empty()
    }

    /// Child → parent lookup built from the `parent` fields.
    pub fn hierarchy(&self) -> DiagnosisHierarchy {
        DiagnosisHierarchy::from_pairs(
            self.diagnoses
                .iter()
                .filter_map(|d| d.parent.clone().map(|p| (d.id.clone(), p))),
        )
    }
}
