use crate::cli::{ConfigArgs, FillArgs};
use crate::config::{CommandOverrides, build_config};
use crate::data::DataManager;
use crate::error::{CliError, Result};
use crate::lookup::{self, CompoundClient};
use crate::runner::{BatchContext, BatchRunner, lock_context};
use crate::utils::progress::CliProgressHandler;
use mesoatlas::engine::catalog::Catalog;
use mesoatlas::engine::coverage::CoverageGrid;
use mesoatlas::engine::error::EngineError;
use mesoatlas::engine::failure::FailureLog;
use mesoatlas::engine::progress::ProgressReporter;
use mesoatlas::engine::simulation::SimulationRequest;
use mesoatlas::engine::validation::LookupCache;
use mesoatlas::workflows::gap_fill::{self, COVERAGE_DIR, FAILURES_DIR, RUNS_DIR};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::info;

pub async fn run(args: FillArgs, config_args: &ConfigArgs) -> Result<()> {
    if args.runs == 0 {
        return Err(CliError::Argument("`--runs` must be at least 1".to_string()));
    }

    let data_manager = DataManager::new()?;
    let overrides = CommandOverrides {
        engine: args.engine.clone(),
        steps: args.steps,
        timeout_secs: args.timeout,
        jobs: args.jobs,
    };
    let app = build_config(config_args, &overrides, &data_manager)?;
    let config = &app.core_config;

    if !config.simulation.engine.is_file() {
        return Err(CliError::Argument(format!(
            "Simulation engine not found: {}",
            config.simulation.engine.display()
        )));
    }

    let mut grid = CoverageGrid::load_or_new(&app.root.join(COVERAGE_DIR), &config.grid)
        .map_err(EngineError::from)?;
    let plan = gap_fill::plan(
        &mut grid,
        args.runs,
        config.simulation.steps,
        &mut rand::thread_rng(),
    );
    if plan.runs.is_empty() {
        println!("No coverage gaps to fill.");
        return Ok(());
    }
    println!(
        "Targeting {} gap(s) with {} run(s) on {} worker(s).",
        plan.gaps.len(),
        plan.runs.len(),
        app.jobs
    );

    let runs_dir = app.root.join(RUNS_DIR);
    std::fs::create_dir_all(&runs_dir)?;
    let requests: Vec<SimulationRequest> = plan
        .runs
        .iter()
        .map(|run| SimulationRequest::from_configuration(run, &runs_dir))
        .collect();

    info!("Resolving compound lookups for the scheduled formulas...");
    let mut cache = LookupCache::load(&lookup::cache_dir(&app.root))?;
    let client = if args.offline {
        None
    } else {
        Some(CompoundClient::new()?)
    };
    let formulas: BTreeSet<&str> = requests.iter().map(|r| r.formula.as_str()).collect();
    let mut lookups = HashMap::new();
    for formula in formulas {
        let response = lookup::resolve(&mut cache, client.as_ref(), formula).await;
        lookups.insert(formula.to_string(), response);
    }
    cache.flush()?;

    let catalog = Catalog::open(config.catalog.clone()).map_err(EngineError::from)?;
    let cards_before = catalog.len();
    let context = Arc::new(Mutex::new(BatchContext {
        grid,
        catalog,
        failures: FailureLog::new(),
    }));

    let progress_handler = CliProgressHandler::new();
    let reporter = Arc::new(ProgressReporter::with_callback(
        progress_handler.get_callback(),
    ));
    let runner = BatchRunner::new(
        config.simulation.clone(),
        config.scoring,
        app.jobs,
        lookups,
    );
    let tally = runner.run(requests, context.clone(), reporter.clone()).await;

    let mut guard = lock_context(&context);
    let ctx = &mut *guard;
    let outcome = tokio::task::block_in_place(|| {
        gap_fill::finish(&mut ctx.grid, &ctx.failures, &app.root, &reporter)
    })?;

    println!(
        "\nBatch: {} succeeded, {} failed, {} retried attempt(s), {} skipped",
        tally.succeeded, tally.failed, tally.retries, tally.skipped
    );
    println!(
        "Catalog: {} new card(s), {} total",
        ctx.catalog.len() - cards_before,
        ctx.catalog.len()
    );
    println!(
        "Coverage: {:.1}% of {} cells, success rate {:.1}%",
        outcome.coverage.coverage_percentage,
        outcome.coverage.grid_size,
        outcome.failures.success_rate * 100.0
    );
    for (category, stats) in &outcome.failures.failures_by_category {
        println!(
            "  {:<14} {:>4} ({:.1}%)",
            category.as_str(),
            stats.count,
            stats.percentage
        );
    }
    println!(
        "Reports written to {} and {}",
        app.root.join(COVERAGE_DIR).display(),
        app.root.join(FAILURES_DIR).display()
    );
    Ok(())
}
