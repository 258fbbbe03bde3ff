use crate::error::{CliError, Result};
use mesoatlas::core::scoring::{ScoringMode, ScoringWeights};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileWeightsConfig {
    pub mu1: Option<f64>,
    pub mu2: Option<f64>,
    pub sigma1: Option<f64>,
    pub sigma2: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub k_charge: Option<f64>,
    pub alpha_metal: Option<f64>,
    pub beta_diversity: Option<f64>,
    pub lambda_cost: Option<f64>,
}

impl FileWeightsConfig {
    /// Overlays the values present in the file onto `base`.
    pub fn apply(&self, base: ScoringWeights) -> ScoringWeights {
        ScoringWeights {
            mu1: self.mu1.unwrap_or(base.mu1),
            mu2: self.mu2.unwrap_or(base.mu2),
            sigma1: self.sigma1.unwrap_or(base.sigma1),
            sigma2: self.sigma2.unwrap_or(base.sigma2),
            a: self.a.unwrap_or(base.a),
            b: self.b.unwrap_or(base.b),
            k_charge: self.k_charge.unwrap_or(base.k_charge),
            alpha_metal: self.alpha_metal.unwrap_or(base.alpha_metal),
            beta_diversity: self.beta_diversity.unwrap_or(base.beta_diversity),
            lambda_cost: self.lambda_cost.unwrap_or(base.lambda_cost),
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Option<f64>> {
        Some(match name {
            "mu1" => &mut self.mu1,
            "mu2" => &mut self.mu2,
            "sigma1" => &mut self.sigma1,
            "sigma2" => &mut self.sigma2,
            "a" => &mut self.a,
            "b" => &mut self.b,
            "k-charge" => &mut self.k_charge,
            "alpha-metal" => &mut self.alpha_metal,
            "beta-diversity" => &mut self.beta_diversity,
            "lambda-cost" => &mut self.lambda_cost,
            _ => return None,
        })
    }
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileScoringConfig {
    pub mode: Option<ScoringMode>,
    pub use_classification: Option<bool>,
    #[serde(default)]
    pub weights: FileWeightsConfig,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCoverageConfig {
    pub scale_centers: Option<Vec<f64>>,
    pub temperature_centers: Option<Vec<f64>>,
    pub density_centers: Option<Vec<f64>>,
    pub sparse_threshold: Option<u32>,
    pub mismatch_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCatalogConfig {
    pub root: Option<PathBuf>,
    pub model: Option<String>,
    pub high_priority_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileEngineConfig {
    pub path: Option<PathBuf>,
    pub steps: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub jobs: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub scoring: Option<FileScoringConfig>,
    pub coverage: Option<FileCoverageConfig>,
    pub catalog: Option<FileCatalogConfig>,
    pub engine: Option<FileEngineConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_parses_with_kebab_case_keys() {
        let config = FileConfig::from_toml(
            r#"
            [scoring]
            mode = "uniform"
            use-classification = false

            [scoring.weights]
            k-charge = 1.5
            lambda-cost = 0.02

            [coverage]
            scale-centers = [2.0, 10.0]
            sparse-threshold = 4

            [catalog]
            model = "UFF"
            high-priority-threshold = 70.0

            [engine]
            path = "/opt/meso-sim"
            timeout-secs = 30
            "#,
        )
        .unwrap();

        let scoring = config.scoring.unwrap();
        assert_eq!(scoring.mode, Some(ScoringMode::Uniform));
        assert_eq!(scoring.use_classification, Some(false));
        assert_eq!(scoring.weights.k_charge, Some(1.5));
        assert_eq!(config.coverage.unwrap().scale_centers, Some(vec![2.0, 10.0]));
        assert_eq!(config.catalog.unwrap().model.as_deref(), Some("UFF"));
        assert_eq!(config.engine.unwrap().timeout_secs, Some(30));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml("[scoring]\nweight = 2.0\n").is_err());
        assert!(FileConfig::from_toml("[telemetry]\nenabled = true\n").is_err());
    }

    #[test]
    fn weights_overlay_only_present_values() {
        let file = FileWeightsConfig {
            mu1: Some(10.0),
            ..Default::default()
        };
        let weights = file.apply(ScoringWeights::default());
        assert_eq!(weights.mu1, 10.0);
        assert_eq!(weights.mu2, ScoringWeights::default().mu2);
    }
}
