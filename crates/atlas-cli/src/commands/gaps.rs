use crate::cli::{ConfigArgs, GapsArgs};
use crate::config::defaults::DefaultsConfig;
use crate::config::{CommandOverrides, build_config};
use crate::data::DataManager;
use crate::error::Result;
use mesoatlas::engine::coverage::CoverageGrid;
use mesoatlas::engine::error::EngineError;
use mesoatlas::workflows::gap_fill::COVERAGE_DIR;
use tracing::info;

pub async fn run(args: GapsArgs, config_args: &ConfigArgs) -> Result<()> {
    let data_manager = DataManager::new()?;
    let app = build_config(config_args, &CommandOverrides::default(), &data_manager)?;
    let limit = args.limit.unwrap_or(DefaultsConfig::default().gap_limit);

    let mut grid = CoverageGrid::load_or_new(&app.root.join(COVERAGE_DIR), &app.core_config.grid)
        .map_err(EngineError::from)?;
    let gaps = grid.identify_gaps();
    let report = grid.to_report();
    info!(gaps = gaps.len(), runs = report.total_runs, "Identified coverage gaps");

    println!(
        "Coverage: {:.1}% of {} cells ({} runs recorded)",
        report.coverage_percentage, report.grid_size, report.total_runs
    );
    println!(
        "Gaps: {} ({} sparse, {} high mismatch)",
        gaps.len(),
        report.sparse_cells,
        report.high_mismatch_cells
    );
    if gaps.is_empty() {
        return Ok(());
    }

    println!(
        "\n  {:<14} {:>8} {:>10} {:>10} {:>6} {:>9}  flags",
        "cell", "scale", "temp (K)", "density", "runs", "mismatch"
    );
    for gap in gaps.iter().take(limit) {
        let (i, j, k) = gap.key;
        let mut flags = Vec::new();
        if gap.sparse {
            flags.push("sparse");
        }
        if gap.high_mismatch {
            flags.push("mismatch");
        }
        println!(
            "  {:<14} {:>8.1} {:>10.1} {:>10.4} {:>6} {:>9.3}  {}",
            format!("({i},{j},{k})"),
            gap.center.scale,
            gap.center.temperature,
            gap.center.density,
            gap.n_runs,
            gap.max_mismatch,
            flags.join(",")
        );
    }
    if gaps.len() > limit {
        println!("  ... and {} more", gaps.len() - limit);
    }
    Ok(())
}
