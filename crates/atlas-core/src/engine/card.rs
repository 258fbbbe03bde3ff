use super::config;
use super::validation::ValidationSummary;
use crate::core::models::composition::Composition;
use crate::core::models::elements;
use crate::core::models::health::Health;
use crate::core::models::outcome::SimulationOutcome;
use crate::core::scoring::{ScoreBreakdown, ScoreInput};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const STRUCTURE_FILE: &str = "structure.xyz";
pub const SUMMARY_FILE: &str = "summary.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const LOG_FILE: &str = "log.txt";

pub const METRICS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "@molecule")]
    Molecule,
    #[serde(rename = "@cluster")]
    Cluster,
    #[serde(rename = "@gas")]
    Gas,
    #[serde(rename = "@bulk")]
    Bulk,
}

impl Domain {
    /// Infers the simulation domain from the composition's size and makeup.
    ///
    /// Small systems dominated by noble-gas atoms are clusters; everything else is
    /// bucketed by atom count alone.
    pub fn infer(composition: &Composition) -> Self {
        let n = composition.total_atoms();
        match n {
            0 | 1 => Domain::Molecule,
            2..=10 => {
                let noble: u32 = composition
                    .iter()
                    .filter(|(symbol, _)| elements::is_noble_gas(symbol))
                    .map(|(_, count)| count)
                    .sum();
                if noble * 2 > n {
                    Domain::Cluster
                } else {
                    Domain::Molecule
                }
            }
            11..=100 => Domain::Gas,
            _ => Domain::Bulk,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Molecule => "@molecule",
            Domain::Cluster => "@cluster",
            Domain::Gas => "@gas",
            Domain::Bulk => "@bulk",
        }
    }

    pub fn bare_name(&self) -> &'static str {
        self.as_str().trim_start_matches('@')
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Stable,
    Novel,
    HighPriority,
    Converged,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Stable => "stable",
            Tag::Novel => "novel",
            Tag::HighPriority => "high_priority",
            Tag::Converged => "converged",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "stable" => Some(Tag::Stable),
            "novel" => Some(Tag::Novel),
            "high_priority" => Some(Tag::HighPriority),
            "converged" => Some(Tag::Converged),
            _ => None,
        }
    }

    /// Tags follow from already-computed fields only.
    pub fn derive(
        outcome: &SimulationOutcome,
        is_novel: bool,
        score: f64,
        health: Health,
        high_priority_threshold: f64,
    ) -> Vec<Tag> {
        let mut tags = Vec::with_capacity(4);
        if outcome.stable {
            tags.push(Tag::Stable);
        }
        if is_novel {
            tags.push(Tag::Novel);
        }
        if score > high_priority_threshold {
            tags.push(Tag::HighPriority);
        }
        if health == Health::Converged {
            tags.push(Tag::Converged);
        }
        tags
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub schema_version: u32,
    pub energy: f64,
    pub energy_per_atom: f64,
    pub max_force: f64,
    pub converged: bool,
    pub stable: bool,
    pub total_charge: f64,
    pub iterations: u32,
}

impl RunMetrics {
    pub fn new(outcome: &SimulationOutcome, atom_count: u32) -> Self {
        Self {
            schema_version: METRICS_SCHEMA_VERSION,
            energy: outcome.energy,
            energy_per_atom: outcome.energy / f64::from(atom_count.max(1)),
            max_force: outcome.max_force,
            converged: outcome.converged,
            stable: outcome.stable,
            total_charge: outcome.total_charge,
            iterations: outcome.iterations,
        }
    }

    pub fn outcome(&self) -> SimulationOutcome {
        SimulationOutcome {
            energy: self.energy,
            max_force: self.max_force,
            converged: self.converged,
            stable: self.stable,
            total_charge: self.total_charge,
            iterations: self.iterations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsFile {
    #[serde(flatten)]
    pub metrics: RunMetrics,
    pub score_breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPaths {
    pub structure_xyz: String,
    pub summary_json: String,
    pub metrics_json: String,
    pub log_txt: String,
}

impl Default for CardPaths {
    fn default() -> Self {
        Self {
            structure_xyz: STRUCTURE_FILE.to_string(),
            summary_json: SUMMARY_FILE.to_string(),
            metrics_json: METRICS_FILE.to_string(),
            log_txt: LOG_FILE.to_string(),
        }
    }
}

/// Immutable record of one simulation. Corrections are new cards, never edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCard {
    pub run_id: String,
    pub title: String,
    pub formula: String,
    pub composition: Composition,
    pub domain: Domain,
    pub size: u32,
    pub model: String,
    pub score: f64,
    pub health: Health,
    pub timestamp: DateTime<Utc>,
    pub metrics: RunMetrics,
    pub validation: ValidationSummary,
    pub paths: CardPaths,
    pub tags: Vec<Tag>,
    pub generation_method: String,
    pub score_breakdown: ScoreBreakdown,
}

impl RunCard {
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// Reconstructs the scorer input from the card alone, so a catalog can be rescored
    /// without rerunning any simulation.
    pub fn score_input(&self) -> ScoreInput<'_> {
        ScoreInput {
            atom_count: self.size,
            composition: &self.composition,
            total_charge: self.metrics.total_charge,
            health: self.health,
            converged: self.metrics.converged,
            bounded: self.metrics.stable,
            has_long_range: config::is_long_range_model(&self.model),
        }
    }

    pub fn tag_list(&self) -> String {
        self.tags
            .iter()
            .map(Tag::as_str)
            .collect::<Vec<_>>()
            .join(";")
    }
}

pub fn card_title(formula: &str, domain: Domain) -> String {
    format!("{formula}@{}", domain.bare_name())
}

/// `run_<UTC timestamp with microseconds>_<4 hex digits>`: lexicographic order follows
/// creation time, the suffix separates runs created in the same microsecond.
pub fn generate_run_id<R: Rng>(timestamp: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: u16 = rng.r#gen();
    format!("run_{}_{suffix:04x}", timestamp.format("%Y%m%dT%H%M%S_%6f"))
}
