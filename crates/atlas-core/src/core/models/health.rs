use super::outcome::SimulationOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Max force below which a converged, stable run counts as `Converged`.
pub const CONVERGED_FORCE_LIMIT: f64 = 0.01;
/// Max force below which a negative-energy run counts as `Bounded`.
pub const BOUNDED_FORCE_LIMIT: f64 = 0.1;
/// Absolute energy above which a run is `Exploded`.
pub const EXPLODED_ENERGY_LIMIT: f64 = 1e6;
/// Max force above which a run is `Exploded`.
pub const EXPLODED_FORCE_LIMIT: f64 = 10.0;

/// Categorical outcome of a simulation.
///
/// The four bands are evaluated in declaration order and are mutually exclusive by
/// construction: every outcome maps to exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Converged,
    Bounded,
    Exploded,
    Invalid,
}

impl Health {
    /// Assigns the health band of a simulation outcome.
    pub fn determine(outcome: &SimulationOutcome) -> Self {
        if outcome.converged && outcome.stable && outcome.max_force < CONVERGED_FORCE_LIMIT {
            Health::Converged
        } else if outcome.energy < 0.0 && outcome.max_force < BOUNDED_FORCE_LIMIT {
            Health::Bounded
        } else if outcome.energy.abs() > EXPLODED_ENERGY_LIMIT
            || outcome.max_force > EXPLODED_FORCE_LIMIT
        {
            Health::Exploded
        } else {
            Health::Invalid
        }
    }

    /// Maps a free-form label onto a health band. Anything other than the four
    /// canonical names (case-insensitive) is treated as `Invalid`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "converged" => Health::Converged,
            "bounded" => Health::Bounded,
            "exploded" => Health::Exploded,
            _ => Health::Invalid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Converged => "converged",
            Health::Bounded => "bounded",
            Health::Exploded => "exploded",
            Health::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
