use serde::{Deserialize, Serialize};

/// Scalar results of one simulation, as reported by the engine.
///
/// The physics that produced these numbers is out of scope; the pipeline treats them
/// as already-computed facts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationOutcome {
    /// Final energy in kcal/mol.
    pub energy: f64,
    /// Largest per-atom force magnitude in kcal/(mol·Å).
    pub max_force: f64,
    pub converged: bool,
    pub stable: bool,
    /// Net charge of the system in elementary charge units.
    #[serde(default)]
    pub total_charge: f64,
    /// Optimizer iterations, when the engine reports them.
    #[serde(default)]
    pub iterations: u32,
}

impl SimulationOutcome {
    pub fn stability_label(&self) -> &'static str {
        if self.stable { "stable" } else { "unstable" }
    }
}
