//! Invocation contract with the external simulation engine.
//!
//! The engine is an opaque executable. It receives a formula and run parameters on the
//! command line, writes the final geometry to `--output`, and prints diagnostics. This
//! module only describes the request and the observed result; spawning the process is
//! left to the caller.

use super::coverage::{GridPoint, RunConfiguration};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRequest {
    pub formula: String,
    pub seed: u64,
    pub temperature: f64,
    pub density: f64,
    pub steps: u32,
    pub output: PathBuf,
    /// Grid point the run was scheduled for; not passed to the engine.
    pub point: GridPoint,
}

impl SimulationRequest {
    /// Builds the request for a scheduled run, writing into `output_dir`.
    pub fn from_configuration(config: &RunConfiguration, output_dir: &Path) -> Self {
        Self {
            formula: config.formula.clone(),
            seed: config.seed,
            temperature: config.temperature,
            density: config.density,
            steps: config.steps,
            output: output_dir.join(format!("gap_fill_{}.xyz", config.seed)),
            point: config.point(),
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        vec![
            "--formula".to_string(),
            self.formula.clone(),
            "--seed".to_string(),
            self.seed.to_string(),
            "--temp".to_string(),
            self.temperature.to_string(),
            "--density".to_string(),
            self.density.to_string(),
            "--steps".to_string(),
            self.steps.to_string(),
            "--output".to_string(),
            self.output.display().to_string(),
        ]
    }

    /// Shell-ready command line reproducing this run.
    pub fn command_line(&self, engine: &Path) -> String {
        let mut parts = vec![engine.display().to_string()];
        parts.extend(self.to_args());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationResult {
    /// Negated signal number when the process was killed by a signal; `None` when no
    /// status was observed.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl SimulationResult {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}
