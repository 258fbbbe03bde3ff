use crate::cli::{CheckArgs, ConfigArgs};
use crate::config::file::FileConfig;
use crate::config::{CommandOverrides, build_config};
use crate::data::DataManager;
use crate::error::{CliError, Result};
use mesoatlas::core::classification::Classifier;
use mesoatlas::engine::catalog::Catalog;
use mesoatlas::engine::config::PipelineConfigBuilder;
use mesoatlas::engine::consistency::{self, ChangeReport};
use mesoatlas::engine::error::EngineError;
use tracing::{info, warn};

/// Score changes listed in the rescoring summary.
const LISTED_CHANGES: usize = 10;

pub async fn run(args: CheckArgs, config_args: &ConfigArgs) -> Result<()> {
    let data_manager = DataManager::new()?;
    let app = build_config(config_args, &CommandOverrides::default(), &data_manager)?;
    let catalog = Catalog::open(app.core_config.catalog.clone()).map_err(EngineError::from)?;
    let classifier = Classifier::new();

    let violations = consistency::check_catalog(catalog.cards(), &classifier, &app.core_config.scoring);
    println!(
        "Checked {} card(s): {} invariant violation(s)",
        catalog.len(),
        violations.len()
    );
    for violation in &violations {
        warn!("{}", violation);
        println!("  ✗ {violation}");
    }

    if let Some(path) = &args.weights {
        let scoring_file = FileConfig::from_file(path)?.scoring.unwrap_or_default();
        let current = app.core_config.scoring;
        let alternative = PipelineConfigBuilder::new()
            .root(app.root.clone())
            .weights(scoring_file.weights.apply(current.weights))
            .scoring_mode(scoring_file.mode.unwrap_or(current.mode))
            .use_classification(
                scoring_file
                    .use_classification
                    .unwrap_or(current.use_classification),
            )
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?
            .scoring;

        info!("Rescoring catalog under {:?}", path);
        let report = consistency::rescore(catalog.cards(), &classifier, alternative);
        print_changes(&report);
    }

    if !violations.is_empty() {
        return Err(CliError::InvariantViolations(violations.len()));
    }
    Ok(())
}

fn print_changes(report: &ChangeReport) {
    println!(
        "\nRescored {} card(s): {} score change(s), {} reclassified",
        report.total,
        report.score_changes.len(),
        report.reclassified.len()
    );
    let mut changes: Vec<_> = report.score_changes.iter().collect();
    changes.sort_by(|a, b| b.delta().abs().total_cmp(&a.delta().abs()));
    for change in changes.iter().take(LISTED_CHANGES) {
        println!(
            "  {:<14} {:>7.2} -> {:>7.2} ({:+.2})  {}",
            change.formula,
            change.old_score,
            change.new_score,
            change.delta(),
            change.run_id
        );
    }
    for run_id in &report.reclassified {
        println!("  reclassified: {run_id}");
    }
    for violation in &report.invariant_breaks {
        println!("  ✗ {violation}");
    }
    if report.is_clean() {
        println!("  No invariant breaks under the alternative weights.");
    }
}
