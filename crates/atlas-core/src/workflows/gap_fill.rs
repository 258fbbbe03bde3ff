use super::discover::{self, DiscoveryInput};
use crate::core::classification::Classifier;
use crate::core::io::diagnostics::{parse_diagnostics, reported_energy};
use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::XyzFile;
use crate::core::models::outcome::SimulationOutcome;
use crate::core::scoring::ScoringConfig;
use crate::engine::card::RunCard;
use crate::engine::catalog::Catalog;
use crate::engine::coverage::{CoverageGrid, CoverageReport, Gap, RunConfiguration, schedule_runs};
use crate::engine::error::EngineError;
use crate::engine::failure::{Failure, FailureLog, FailureReport};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::simulation::{SimulationRequest, SimulationResult};
use crate::engine::validation::LookupResponse;
use rand::Rng;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

pub const GENERATION_METHOD: &str = "gap_fill";
/// Directory under the output root holding the coverage report.
pub const COVERAGE_DIR: &str = "coverage";
/// Directory under the output root holding the failure analysis.
pub const FAILURES_DIR: &str = "failures";
/// Directory under the output root where the engine writes structures.
pub const RUNS_DIR: &str = "runs";

#[derive(Debug, Clone)]
pub struct GapFillPlan {
    pub gaps: Vec<Gap>,
    pub runs: Vec<RunConfiguration>,
}

/// Refreshes mismatches, lists the gaps and schedules `n_runs` configurations over them.
#[instrument(skip_all, name = "gap_fill_plan")]
pub fn plan<R: Rng>(grid: &mut CoverageGrid, n_runs: usize, steps: u32, rng: &mut R) -> GapFillPlan {
    let gaps = grid.identify_gaps();
    let runs = schedule_runs(&gaps, n_runs, steps, rng);
    info!(gaps = gaps.len(), runs = runs.len(), "Planned gap-fill batch");
    GapFillPlan { gaps, runs }
}

/// Mutable state a batch threads through every finished run.
pub struct BatchState<'a> {
    pub grid: &'a mut CoverageGrid,
    pub catalog: &'a mut Catalog,
    pub failures: &'a mut FailureLog,
}

#[derive(Debug, Clone)]
pub enum RunDisposition {
    /// Successful run whose structure was turned into a card.
    Cataloged(Box<RunCard>),
    /// Successful run without a structure file; only the grid was updated.
    Recorded(SimulationOutcome),
    Failed(Box<Failure>),
}

impl RunDisposition {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunDisposition::Failed(_))
    }
}

/// Folds one finished run into the grid, the failure log and, when it produced a
/// structure, the catalog.
///
/// A zero exit counts as a success only when the engine reported a finite energy and
/// any structure it wrote was read and cataloged. Anything short of that is recorded
/// as a failure, so malformed output never reaches the energy statistics.
#[instrument(skip_all, name = "gap_fill_ingest", fields(seed = request.seed))]
pub fn ingest(
    state: &mut BatchState<'_>,
    classifier: &Classifier,
    scoring: &ScoringConfig,
    request: &SimulationRequest,
    result: &SimulationResult,
    engine: &Path,
    lookup: &LookupResponse,
) -> Result<RunDisposition, EngineError> {
    state.grid.key_for(request.point)?;
    let failed = || Failure::new(request, result, engine);

    if !result.succeeded() {
        return Ok(reject(state, request, failed()));
    }
    let energy = match reported_energy(&result.stdout) {
        Some(energy) if energy.is_finite() => energy,
        Some(_) => return Ok(reject(state, request, failed())),
        None => {
            let failure = failed().with_reason("No final energy in engine diagnostics");
            return Ok(reject(state, request, failure));
        }
    };

    if !request.output.exists() {
        debug!(path = %request.output.display(), "No structure written; grid updated only");
        accept(state, request, energy)?;
        return Ok(RunDisposition::Recorded(parse_diagnostics(&result.stdout)));
    }

    let structure = match XyzFile::read_from_path(&request.output)
        .map_err(EngineError::from)
        .and_then(|s| discover::check_structure(&s, Some(&request.formula)).map(|_| s))
    {
        Ok(structure) => structure,
        Err(e) => {
            let failure = failed().with_reason(format!("Unusable structure output: {e}"));
            return Ok(reject(state, request, failure));
        }
    };

    let discovered = discover::run(
        state.catalog,
        classifier,
        scoring,
        DiscoveryInput {
            structure: &structure,
            diagnostics: &result.stdout,
            lookup,
            generation_method: GENERATION_METHOD,
            requested_formula: Some(&request.formula),
        },
        &ProgressReporter::new(),
    );
    match discovered {
        Ok(discovered) => {
            accept(state, request, energy)?;
            Ok(RunDisposition::Cataloged(Box::new(discovered.card)))
        }
        Err(e) => {
            let failure = failed().with_reason(format!("Run could not be cataloged: {e}"));
            Ok(reject(state, request, failure))
        }
    }
}

fn accept(
    state: &mut BatchState<'_>,
    request: &SimulationRequest,
    energy: f64,
) -> Result<(), EngineError> {
    state.grid.record_success(request.point, energy)?;
    state.failures.record_success();
    Ok(())
}

// The point was checked against the grid on entry.
fn reject(
    state: &mut BatchState<'_>,
    request: &SimulationRequest,
    failure: Failure,
) -> RunDisposition {
    if let Err(e) = state.grid.record_failure(request.point) {
        warn!(error = %e, "Failed run lies outside the grid");
    }
    let failure = state.failures.record_failure(failure);
    warn!(category = %failure.category, reason = %failure.reason, "Run failed");
    RunDisposition::Failed(Box::new(failure.clone()))
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub coverage: CoverageReport,
    pub failures: FailureReport,
}

/// Closes a batch: recomputes mismatches once, then writes the coverage report and
/// the failure analysis under `root`.
#[instrument(skip_all, name = "gap_fill_finish")]
pub fn finish(
    grid: &mut CoverageGrid,
    failures: &FailureLog,
    root: &Path,
    reporter: &ProgressReporter,
) -> Result<BatchOutcome, EngineError> {
    reporter.report(Progress::BatchFinish {
        succeeded: failures.total_runs() - failures.failures().len() as u64,
        failed: failures.failures().len() as u64,
    });
    reporter.phase("Saving Reports", || -> Result<BatchOutcome, EngineError> {
        grid.compute_mismatches();
        grid.save(&root.join(COVERAGE_DIR))?;
        let failure_report = failures.save(&root.join(FAILURES_DIR))?;
        let coverage = grid.to_report();
        info!(
            coverage = coverage.coverage_percentage,
            success_rate = failure_report.success_rate,
            "Gap-fill batch complete"
        );
        Ok(BatchOutcome {
            coverage,
            failures: failure_report,
        })
    })
}
