//! Fixed per-exam subject distributions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::GenerationError;

/// One (subject, count) slice of a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub subject: String,
    pub count: usize,
}

impl Partition {
    pub fn new(subject: impl Into<String>, count: usize) -> Self {
        Self { subject: subject.into(), count }
    }
}

/// Ordered partitions whose counts sum to `total_questions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBlueprint", rename_all = "camelCase")]
pub struct Blueprint {
    total_questions: usize,
    distribution: Vec<Partition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlueprint {
    total_questions: usize,
    distribution: Vec<Partition>,
}

impl TryFrom<RawBlueprint> for Blueprint {
    type Error = String;

    fn try_from(raw: RawBlueprint) -> Result<Self, Self::Error> {
        Blueprint::new(raw.total_questions, raw.distribution)
    }
}

impl Blueprint {
    /// Checked constructor: at least one partition, no empty subject, no zero count,
    /// no repeated subject, counts summing to the total.
    pub fn new(total_questions: usize, distribution: Vec<Partition>) -> Result<Self, String> {
        if distribution.is_empty() {
            return Err("blueprint has no partitions".to_string());
        }
        for (i, part) in distribution.iter().enumerate() {
            if part.subject.trim().is_empty() {
                return Err(format!("partition {} has an empty subject", i));
            }
            if part.count == 0 {
                return Err(format!("partition '{}' has a zero count", part.subject));
            }
            if distribution[..i].iter().any(|earlier| earlier.subject == part.subject) {
                return Err(format!("subject '{}' appears twice", part.subject));
            }
        }
        let sum: usize = distribution.iter().map(|p| p.count).sum();
        if sum != total_questions {
            return Err(format!(
                "partition counts sum to {} but the total is {}",
                sum, total_questions
            ));
        }
        Ok(Self { total_questions, distribution })
    }

    /// Total taken from the partitions.
    pub fn from_distribution(distribution: Vec<Partition>) -> Result<Self, String> {
        let total = distribution.iter().map(|p| p.count).sum();
        Self::new(total, distribution)
    }

    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.distribution
    }
}

/// Blueprints keyed by exam identifier. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlueprintRegistry {
    blueprints: BTreeMap<String, Blueprint>,
}

// Built-in tables are checked by `standard_blueprints_are_valid`.
fn standard_blueprint(parts: &[(&str, usize)]) -> Blueprint {
    let distribution: Vec<Partition> =
        parts.iter().map(|(subject, count)| Partition::new(*subject, *count)).collect();
    Blueprint {
        total_questions: distribution.iter().map(|p| p.count).sum(),
        distribution,
    }
}

impl BlueprintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in exam patterns.
    pub fn standard() -> Self {
        Self::new()
            .with(
                "SSC CGL",
                standard_blueprint(&[
                    ("Quantitative Aptitude", 25),
                    ("Reasoning", 25),
                    ("General Awareness", 25),
                    ("English Comprehension", 25),
                ]),
            )
            .with(
                "SSC CHSL",
                standard_blueprint(&[
                    ("English Language", 30),
                    ("Reasoning", 30),
                    ("Quantitative Aptitude", 20),
                    ("General Awareness", 20),
                ]),
            )
            .with(
                "Railway Group D",
                standard_blueprint(&[
                    ("General Science", 40),
                    ("Mathematics", 25),
                    ("General Intelligence & Reasoning", 25),
                    ("General Awareness & Current Affairs", 10),
                ]),
            )
    }

    /// Parse `{"<exam>": {"totalQuestions": N, "distribution": [...]}, ...}`.
    pub fn from_json(json: &str) -> Result<Self, GenerationError> {
        let registry: Self = serde_json::from_str(json)
            .map_err(|e| GenerationError::Configuration(format!("invalid blueprint file: {}", e)))?;
        debug!(count = registry.len(), "Parsed blueprint registry");
        Ok(registry)
    }

    pub fn from_file(path: &Path) -> Result<Self, GenerationError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            GenerationError::Configuration(format!("cannot read blueprints from {}: {}", path.display(), e))
        })?;
        let registry = Self::from_json(&json)?;
        info!(path = %path.display(), count = registry.len(), "Loaded blueprints");
        Ok(registry)
    }

    pub fn with(mut self, exam: impl Into<String>, blueprint: Blueprint) -> Self {
        self.blueprints.insert(exam.into(), blueprint);
        self
    }

    pub fn get(&self, exam: &str) -> Option<&Blueprint> {
        self.blueprints.get(exam)
    }

    /// Like [`BlueprintRegistry::get`], for callers that name an exam explicitly.
    pub fn require(&self, exam: &str) -> Result<&Blueprint, GenerationError> {
        self.get(exam).ok_or_else(|| GenerationError::UnknownBlueprint(exam.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Blueprint)> {
        self.blueprints.iter().map(|(exam, blueprint)| (exam.as_str(), blueprint))
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }
}
