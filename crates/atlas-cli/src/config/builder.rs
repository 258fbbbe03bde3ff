use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::ConfigArgs;
use crate::data::DataManager;
use crate::error::{CliError, Result};
use crate::utils::parser::{self, ParseError, SetValue};
use mesoatlas::core::scoring::{ScoringMode, ScoringWeights};
use mesoatlas::engine::config::{self as core_config, GridConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Values a subcommand may pass on its own command line. They take precedence over
/// `--set`, the config file and the defaults, in that order.
#[derive(Debug, Default, Clone)]
pub struct CommandOverrides {
    pub engine: Option<PathBuf>,
    pub steps: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub jobs: Option<usize>,
}

pub fn build_config(
    args: &ConfigArgs,
    overrides: &CommandOverrides,
    data_manager: &DataManager,
) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let catalog_file = file_config.catalog.take().unwrap_or_default();
    let root = args
        .root
        .clone()
        .or(catalog_file.root)
        .unwrap_or_else(|| data_manager.get_data_path().to_path_buf());

    let scoring_file = file_config.scoring.take().unwrap_or_default();
    let weights = scoring_file.weights.apply(ScoringWeights::default());

    let coverage_file = file_config.coverage.take().unwrap_or_default();
    let grid_defaults = GridConfig::default();
    let grid = GridConfig {
        scale_centers: coverage_file
            .scale_centers
            .unwrap_or(grid_defaults.scale_centers),
        temperature_centers: coverage_file
            .temperature_centers
            .unwrap_or(grid_defaults.temperature_centers),
        density_centers: coverage_file
            .density_centers
            .unwrap_or(grid_defaults.density_centers),
        sparse_threshold: coverage_file
            .sparse_threshold
            .unwrap_or(grid_defaults.sparse_threshold),
        mismatch_threshold: coverage_file
            .mismatch_threshold
            .unwrap_or(grid_defaults.mismatch_threshold),
    };

    let engine_file = file_config.engine.take().unwrap_or_default();
    let jobs = overrides.jobs.or(engine_file.jobs).unwrap_or(defaults.jobs);
    if jobs == 0 {
        return Err(CliError::Config("`jobs` must be at least 1".to_string()));
    }

    let mut builder = core_config::PipelineConfigBuilder::new()
        .root(root.clone())
        .weights(weights)
        .grid(grid);

    if let Some(mode) = scoring_file.mode {
        builder = builder.scoring_mode(mode);
    }
    if let Some(enabled) = scoring_file.use_classification {
        builder = builder.use_classification(enabled);
    }
    if let Some(model) = catalog_file.model {
        builder = builder.model(model);
    }
    if let Some(threshold) = catalog_file.high_priority_threshold {
        builder = builder.high_priority_threshold(threshold);
    }
    if let Some(engine) = overrides.engine.clone().or(engine_file.path) {
        builder = builder.engine(engine);
    }
    if let Some(steps) = overrides.steps.or(engine_file.steps) {
        builder = builder.steps(steps);
    }
    if let Some(secs) = overrides.timeout_secs.or(engine_file.timeout_secs) {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(retries) = engine_file.max_retries {
        builder = builder.max_retries(retries);
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        root,
        jobs,
        core_config,
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let set = parser::parse_set_value(kv_pair).map_err(config_error)?;
        apply_one(&mut config, &set).map_err(config_error)?;
    }
    Ok(config)
}

fn apply_one(config: &mut FileConfig, set: &SetValue<'_>) -> std::result::Result<(), ParseError> {
    if let Some(name) = set.key.strip_prefix("scoring.weights.") {
        let scoring = config.scoring.get_or_insert_with(Default::default);
        let field = scoring
            .weights
            .field_mut(name)
            .ok_or_else(|| ParseError::UnknownKey(set.key.to_string()))?;
        *field = Some(set.parse("float")?);
        return Ok(());
    }

    match set.key {
        "scoring.mode" => {
            let mode = match set.value {
                "weighted" => ScoringMode::Weighted,
                "uniform" => ScoringMode::Uniform,
                _ => {
                    return Err(ParseError::InvalidValue {
                        key: set.key.to_string(),
                        value: set.value.to_string(),
                        expected: "scoring mode (weighted|uniform)",
                    });
                }
            };
            config.scoring.get_or_insert_with(Default::default).mode = Some(mode);
        }
        "scoring.use-classification" => {
            config
                .scoring
                .get_or_insert_with(Default::default)
                .use_classification = Some(set.parse("boolean")?);
        }
        "coverage.scale-centers" => {
            config
                .coverage
                .get_or_insert_with(Default::default)
                .scale_centers = Some(set.parse_list()?);
        }
        "coverage.temperature-centers" => {
            config
                .coverage
                .get_or_insert_with(Default::default)
                .temperature_centers = Some(set.parse_list()?);
        }
        "coverage.density-centers" => {
            config
                .coverage
                .get_or_insert_with(Default::default)
                .density_centers = Some(set.parse_list()?);
        }
        "coverage.sparse-threshold" => {
            config
                .coverage
                .get_or_insert_with(Default::default)
                .sparse_threshold = Some(set.parse("integer")?);
        }
        "coverage.mismatch-threshold" => {
            config
                .coverage
                .get_or_insert_with(Default::default)
                .mismatch_threshold = Some(set.parse("float")?);
        }
        "catalog.model" => {
            config.catalog.get_or_insert_with(Default::default).model =
                Some(set.value.to_string());
        }
        "catalog.high-priority-threshold" => {
            config
                .catalog
                .get_or_insert_with(Default::default)
                .high_priority_threshold = Some(set.parse("float")?);
        }
        "engine.path" => {
            config.engine.get_or_insert_with(Default::default).path =
                Some(PathBuf::from(set.value));
        }
        "engine.steps" => {
            config.engine.get_or_insert_with(Default::default).steps = Some(set.parse("integer")?);
        }
        "engine.timeout-secs" => {
            config
                .engine
                .get_or_insert_with(Default::default)
                .timeout_secs = Some(set.parse("integer")?);
        }
        "engine.max-retries" => {
            config
                .engine
                .get_or_insert_with(Default::default)
                .max_retries = Some(set.parse("integer")?);
        }
        "engine.jobs" => {
            config.engine.get_or_insert_with(Default::default).jobs = Some(set.parse("integer")?);
        }
        _ => return Err(ParseError::UnknownKey(set.key.to_string())),
    }
    Ok(())
}

fn config_error(e: ParseError) -> CliError {
    CliError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    static DATA_ROOT: Lazy<TempDir> = Lazy::new(|| tempdir().expect("create temp dir"));

    fn manager() -> DataManager {
        DataManager::with_custom_path(DATA_ROOT.path())
    }

    fn set(values: &[&str]) -> ConfigArgs {
        ConfigArgs {
            set_values: values.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_fill_everything_and_root_comes_from_the_data_manager() {
        let app = build_config(&ConfigArgs::default(), &CommandOverrides::default(), &manager())
            .expect("build ok");

        assert_eq!(app.root, DATA_ROOT.path());
        assert_eq!(app.core_config.catalog.root, DATA_ROOT.path());
        assert_eq!(app.jobs, DefaultsConfig::default().jobs);
        assert_eq!(app.core_config.grid, GridConfig::default());
        assert_eq!(app.core_config.scoring.weights, ScoringWeights::default());
        assert_eq!(app.core_config.scoring.mode, ScoringMode::Weighted);
    }

    #[test]
    fn file_values_are_merged() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("atlas.toml");
        fs::write(
            &cfg_path,
            r#"
            [scoring]
            mode = "uniform"

            [scoring.weights]
            alpha-metal = 0.2

            [coverage]
            scale-centers = [4.0, 8.0]
            sparse-threshold = 2

            [catalog]
            model = "LJ"

            [engine]
            steps = 500
            timeout-secs = 5
            max-retries = 0
            jobs = 3
            "#,
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(cfg_path),
            ..Default::default()
        };
        let app = build_config(&args, &CommandOverrides::default(), &manager()).expect("build ok");
        let cfg = app.core_config;

        assert_eq!(cfg.scoring.mode, ScoringMode::Uniform);
        assert_eq!(cfg.scoring.weights.alpha_metal, 0.2);
        assert_eq!(cfg.grid.scale_centers, vec![4.0, 8.0]);
        assert_eq!(cfg.grid.sparse_threshold, 2);
        assert!(!cfg.catalog.has_long_range());
        assert_eq!(cfg.simulation.steps, 500);
        assert_eq!(cfg.simulation.timeout, Duration::from_secs(5));
        assert_eq!(cfg.simulation.max_retries, 0);
        assert_eq!(app.jobs, 3);
    }

    #[test]
    fn command_line_beats_set_values_which_beat_the_file() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("atlas.toml");
        fs::write(&cfg_path, "[engine]\nsteps = 500\ntimeout-secs = 5\n").unwrap();

        let args = ConfigArgs {
            root: Some(dir.path().join("out")),
            config: Some(cfg_path),
            set_values: vec!["engine.steps=700".to_string(), "engine.timeout-secs=9".to_string()],
        };
        let overrides = CommandOverrides {
            steps: Some(900),
            ..Default::default()
        };

        let app = build_config(&args, &overrides, &manager()).expect("build ok");
        assert_eq!(app.root, dir.path().join("out"));
        assert_eq!(app.core_config.simulation.steps, 900);
        assert_eq!(app.core_config.simulation.timeout, Duration::from_secs(9));
    }

    #[test]
    fn set_values_cover_every_section() {
        let args = set(&[
            "scoring.mode=uniform",
            "scoring.use-classification=false",
            "scoring.weights.k-charge=1.5",
            "coverage.density-centers=0.01,0.05",
            "coverage.mismatch-threshold=0.25",
            "catalog.high-priority-threshold=60",
            "engine.path=/opt/meso-sim",
        ]);
        let app = build_config(&args, &CommandOverrides::default(), &manager()).expect("build ok");
        let cfg = app.core_config;

        assert_eq!(cfg.scoring.mode, ScoringMode::Uniform);
        assert!(!cfg.scoring.use_classification);
        assert_eq!(cfg.scoring.weights.k_charge, 1.5);
        assert_eq!(cfg.grid.density_centers, vec![0.01, 0.05]);
        assert_eq!(cfg.grid.mismatch_threshold, 0.25);
        assert_eq!(cfg.catalog.high_priority_threshold, 60.0);
        assert_eq!(cfg.simulation.engine, PathBuf::from("/opt/meso-sim"));
    }

    #[test]
    fn unknown_keys_and_bad_values_are_config_errors() {
        for bad in [
            "scoring.weights.gamma=1",
            "engine.color=red",
            "scoring.mode=greedy",
            "engine.steps=many",
            "no-separator",
        ] {
            let result = build_config(&set(&[bad]), &CommandOverrides::default(), &manager());
            assert!(matches!(result, Err(CliError::Config(_))), "{bad} should fail");
        }
    }

    #[test]
    fn invalid_core_values_surface_from_the_builder() {
        let result = build_config(
            &set(&["coverage.scale-centers=10,5"]),
            &CommandOverrides::default(),
            &manager(),
        );
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("scale_centers")));

        let overrides = CommandOverrides {
            jobs: Some(0),
            ..Default::default()
        };
        let result = build_config(&ConfigArgs::default(), &overrides, &manager());
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
