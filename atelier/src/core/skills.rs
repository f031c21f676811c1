//! Skill catalog.
//!
//! Catalog membership is the sole gate for run creation. Declared input types
//! are informational: runs are not checked against them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A named capability with declared accepted and produced content types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSpec {
    pub name: String,
    pub version: String,
    pub input_types: Vec<String>,
    pub output_types: Vec<String>,
}

impl SkillSpec {
    pub fn new(name: &str, version: &str, input_types: &[&str], output_types: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            input_types: input_types.iter().map(|t| t.to_string()).collect(),
            output_types: output_types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Immutable name -> spec registry, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillCatalog {
    skills: BTreeMap<String, SkillSpec>,
}

impl SkillCatalog {
    /// Build a catalog, rejecting duplicate names and repeated type tags.
    pub fn new(specs: impl IntoIterator<Item = SkillSpec>) -> Result<Self, Error> {
        let mut skills = BTreeMap::new();
        for spec in specs {
            check_unique_tags(&spec.name, "input_types", &spec.input_types)?;
            check_unique_tags(&spec.name, "output_types", &spec.output_types)?;
            if skills.contains_key(&spec.name) {
                return Err(Error::InvalidInput(format!(
                    "duplicate skill '{}' in catalog",
                    spec.name
                )));
            }
            skills.insert(spec.name.clone(), spec);
        }
        Ok(Self { skills })
    }

    /// Default skills plus `extra` entries.
    pub fn with_extra(extra: impl IntoIterator<Item = SkillSpec>) -> Result<Self, Error> {
        Self::new(default_skills().into_iter().chain(extra))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&SkillSpec> {
        self.skills.get(name)
    }

    /// Specs in name order.
    pub fn iter(&self) -> impl Iterator<Item = &SkillSpec> {
        self.skills.values()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl Default for SkillCatalog {
    fn default() -> Self {
        let skills = default_skills()
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        Self { skills }
    }
}

/// Skills shipped with every catalog.
pub fn default_skills() -> Vec<SkillSpec> {
    vec![
        SkillSpec::new("ppt_revise", "0.1", &["pptx", "pdf", "text"], &["pptx"]),
        SkillSpec::new(
            "doc_analyze",
            "0.1",
            &["pdf", "pptx", "xlsx", "text"],
            &["text"],
        ),
    ]
}

fn check_unique_tags(skill: &str, field: &str, tags: &[String]) -> Result<(), Error> {
    for (idx, tag) in tags.iter().enumerate() {
        if tags[..idx].contains(tag) {
            return Err(Error::InvalidInput(format!(
                "skill '{skill}' lists '{tag}' twice in {field}"
            )));
        }
    }
    Ok(())
}
