use crate::core::scoring::{ScoringConfig, ScoringMode, ScoringWeights};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

pub const DEFAULT_SCALE_CENTERS: [f64; 6] = [2.0, 5.0, 10.0, 20.0, 50.0, 100.0];
pub const DEFAULT_MODEL: &str = "LJ+Coulomb";
/// Models whose cost grows with long-range pair interactions.
pub const LONG_RANGE_MODELS: [&str; 2] = ["LJ+Coulomb", "UFF"];

pub fn is_long_range_model(model: &str) -> bool {
    LONG_RANGE_MODELS.contains(&model)
}

/// `n` evenly spaced values from `start` to `end`, both inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub scale_centers: Vec<f64>,
    pub temperature_centers: Vec<f64>,
    pub density_centers: Vec<f64>,
    pub sparse_threshold: u32,
    pub mismatch_threshold: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            scale_centers: DEFAULT_SCALE_CENTERS.to_vec(),
            temperature_centers: linspace(50.0, 500.0, 10),
            density_centers: linspace(0.001, 0.1, 10),
            sparse_threshold: 10,
            mismatch_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    pub root: PathBuf,
    pub model: String,
    /// Cards scoring strictly above this get the `high_priority` tag.
    pub high_priority_threshold: f64,
}

impl CatalogConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            model: DEFAULT_MODEL.to_string(),
            high_priority_threshold: 80.0,
        }
    }

    pub fn has_long_range(&self) -> bool {
        is_long_range_model(&self.model)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub engine: PathBuf,
    pub steps: u32,
    pub timeout: Duration,
    /// Extra attempts granted to runs that timed out. Other failures are never retried.
    pub max_retries: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            engine: PathBuf::from("./build/meso-sim"),
            steps: 1000,
            timeout: Duration::from_secs(60),
            max_retries: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub scoring: ScoringConfig,
    pub grid: GridConfig,
    pub catalog: CatalogConfig,
    pub simulation: SimulationConfig,
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    root: Option<PathBuf>,
    model: Option<String>,
    high_priority_threshold: Option<f64>,
    weights: Option<ScoringWeights>,
    scoring_mode: Option<ScoringMode>,
    use_classification: Option<bool>,
    grid: Option<GridConfig>,
    sparse_threshold: Option<u32>,
    mismatch_threshold: Option<f64>,
    engine: Option<PathBuf>,
    steps: Option<u32>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, path: PathBuf) -> Self {
        self.root = Some(path);
        self
    }
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
    pub fn high_priority_threshold(mut self, threshold: f64) -> Self {
        self.high_priority_threshold = Some(threshold);
        self
    }
    pub fn weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = Some(weights);
        self
    }
    pub fn scoring_mode(mut self, mode: ScoringMode) -> Self {
        self.scoring_mode = Some(mode);
        self
    }
    pub fn use_classification(mut self, enabled: bool) -> Self {
        self.use_classification = Some(enabled);
        self
    }
    pub fn grid(mut self, grid: GridConfig) -> Self {
        self.grid = Some(grid);
        self
    }
    pub fn sparse_threshold(mut self, threshold: u32) -> Self {
        self.sparse_threshold = Some(threshold);
        self
    }
    pub fn mismatch_threshold(mut self, threshold: f64) -> Self {
        self.mismatch_threshold = Some(threshold);
        self
    }
    pub fn engine(mut self, path: PathBuf) -> Self {
        self.engine = Some(path);
        self
    }
    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = Some(steps);
        self
    }
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let root = self.root.ok_or(ConfigError::MissingParameter("root"))?;

        let mut catalog = CatalogConfig::new(root);
        if let Some(model) = self.model {
            if model.trim().is_empty() {
                return Err(invalid("model", "must not be empty"));
            }
            catalog.model = model;
        }
        if let Some(threshold) = self.high_priority_threshold {
            catalog.high_priority_threshold = finite("high_priority_threshold", threshold)?;
        }

        let defaults = ScoringConfig::default();
        let scoring = ScoringConfig {
            weights: self.weights.unwrap_or(defaults.weights),
            mode: self.scoring_mode.unwrap_or(defaults.mode),
            use_classification: self
                .use_classification
                .unwrap_or(defaults.use_classification),
        };
        validate_weights(&scoring.weights)?;

        let mut grid = self.grid.unwrap_or_default();
        if let Some(threshold) = self.sparse_threshold {
            grid.sparse_threshold = threshold;
        }
        if let Some(threshold) = self.mismatch_threshold {
            grid.mismatch_threshold = threshold;
        }
        validate_grid(&grid)?;

        let mut simulation = SimulationConfig::default();
        if let Some(engine) = self.engine {
            simulation.engine = engine;
        }
        if let Some(steps) = self.steps {
            if steps == 0 {
                return Err(invalid("steps", "must be at least 1"));
            }
            simulation.steps = steps;
        }
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(invalid("timeout", "must be positive"));
            }
            simulation.timeout = timeout;
        }
        if let Some(retries) = self.max_retries {
            simulation.max_retries = retries;
        }

        Ok(PipelineConfig {
            scoring,
            grid,
            catalog,
            simulation,
        })
    }
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

fn finite(parameter: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(parameter, format!("{value} is not finite")))
    }
}

fn validate_weights(w: &ScoringWeights) -> Result<(), ConfigError> {
    if w.sigma1 <= 0.0 || w.sigma2 <= 0.0 {
        return Err(invalid("weights", "gaussian widths must be positive"));
    }
    let all = [
        w.mu1,
        w.mu2,
        w.a,
        w.b,
        w.k_charge,
        w.alpha_metal,
        w.beta_diversity,
        w.lambda_cost,
    ];
    if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(invalid(
            "weights",
            "coefficients must be finite and non-negative",
        ));
    }
    Ok(())
}

fn validate_grid(grid: &GridConfig) -> Result<(), ConfigError> {
    let axes: [(&'static str, &[f64]); 3] = [
        ("scale_centers", &grid.scale_centers),
        ("temperature_centers", &grid.temperature_centers),
        ("density_centers", &grid.density_centers),
    ];
    for (name, centers) in axes {
        if centers.is_empty() {
            return Err(invalid(name, "axis needs at least one bin center"));
        }
        if centers.windows(2).any(|w| w[0] >= w[1]) || centers.iter().any(|c| !c.is_finite()) {
            return Err(invalid(name, "bin centers must be finite and strictly increasing"));
        }
    }
    finite("mismatch_threshold", grid.mismatch_threshold)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_includes_both_endpoints() {
        let t = linspace(50.0, 500.0, 10);
        assert_eq!(t.len(), 10);
        assert_eq!(t[0], 50.0);
        assert!((t[9] - 500.0).abs() < 1e-9);
        assert!((t[1] - 100.0).abs() < 1e-9);
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert!(linspace(1.0, 2.0, 0).is_empty());
    }

    #[test]
    fn build_requires_a_root() {
        let result = PipelineConfigBuilder::new().build();
        assert_eq!(result, Err(ConfigError::MissingParameter("root")));
    }

    #[test]
    fn build_fills_documented_defaults() {
        let config = PipelineConfigBuilder::new()
            .root(PathBuf::from("/tmp/atlas"))
            .build()
            .unwrap();
        assert_eq!(config.grid.sparse_threshold, 10);
        assert_eq!(config.grid.mismatch_threshold, 0.5);
        assert_eq!(config.grid.scale_centers, DEFAULT_SCALE_CENTERS.to_vec());
        assert_eq!(config.catalog.model, DEFAULT_MODEL);
        assert_eq!(config.catalog.high_priority_threshold, 80.0);
        assert!(config.catalog.has_long_range());
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.simulation.max_retries, 1);
    }

    #[test]
    fn build_applies_overrides() {
        let config = PipelineConfigBuilder::new()
            .root(PathBuf::from("/tmp/atlas"))
            .model("LJ")
            .sparse_threshold(3)
            .scoring_mode(ScoringMode::Uniform)
            .use_classification(false)
            .steps(250)
            .build()
            .unwrap();
        assert!(!config.catalog.has_long_range());
        assert_eq!(config.grid.sparse_threshold, 3);
        assert_eq!(config.scoring.mode, ScoringMode::Uniform);
        assert!(!config.scoring.use_classification);
        assert_eq!(config.simulation.steps, 250);
    }

    #[test]
    fn build_rejects_unordered_axes_and_bad_weights() {
        let grid = GridConfig {
            scale_centers: vec![10.0, 5.0],
            ..GridConfig::default()
        };
        let err = PipelineConfigBuilder::new()
            .root(PathBuf::from("/tmp"))
            .grid(grid)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "scale_centers",
                ..
            }
        ));

        let weights = ScoringWeights {
            sigma1: 0.0,
            ..ScoringWeights::default()
        };
        let err = PipelineConfigBuilder::new()
            .root(PathBuf::from("/tmp"))
            .weights(weights)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { parameter: "weights", .. }));
    }
}
