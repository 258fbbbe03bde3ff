use crate::error::{CliError, Result};
use mesoatlas::core::classification::Classifier;
use mesoatlas::core::scoring::ScoringConfig;
use mesoatlas::engine::catalog::Catalog;
use mesoatlas::engine::config::SimulationConfig;
use mesoatlas::engine::coverage::CoverageGrid;
use mesoatlas::engine::failure::{self, FailureLog};
use mesoatlas::engine::progress::{Progress, ProgressReporter};
use mesoatlas::engine::simulation::{SimulationRequest, SimulationResult};
use mesoatlas::engine::validation::LookupResponse;
use mesoatlas::workflows::gap_fill::{self, BatchState, RunDisposition};
use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Everything a batch mutates. Runs fold into it one at a time behind a mutex.
pub struct BatchContext {
    pub grid: CoverageGrid,
    pub catalog: Catalog,
    pub failures: FailureLog,
}

/// Locks the batch context, recovering it if a run panicked while holding the lock.
pub fn lock_context(context: &Mutex<BatchContext>) -> MutexGuard<'_, BatchContext> {
    context.lock().unwrap_or_else(|poisoned| {
        warn!("A run panicked while recording; continuing with the batch state as left");
        poisoned.into_inner()
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchTally {
    pub succeeded: u64,
    pub failed: u64,
    pub cataloged: u64,
    /// Extra attempts spent on retried timeouts.
    pub retries: u64,
    /// Runs never started because the batch was interrupted.
    pub skipped: u64,
}

/// Runs the engine once. Launch errors and timeouts are reported in the result rather
/// than as `Err`; the process is killed when the deadline passes.
pub async fn execute(request: &SimulationRequest, engine: &Path, timeout: Duration) -> SimulationResult {
    let started = Instant::now();
    let mut command = Command::new(engine);
    command
        .args(request.to_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Keeps terminal SIGINT away from the engine; only the batch's own handler sees it.
    #[cfg(unix)]
    command.process_group(0);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return SimulationResult {
                stderr: format!("Failed to launch engine {}: {e}", engine.display()),
                duration: started.elapsed(),
                ..Default::default()
            };
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => SimulationResult {
            exit_code: exit_code(&output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
            duration: started.elapsed(),
        },
        Ok(Err(e)) => SimulationResult {
            stderr: format!("Failed to collect engine output: {e}"),
            duration: started.elapsed(),
            ..Default::default()
        },
        Err(_) => SimulationResult {
            timed_out: true,
            duration: started.elapsed(),
            ..Default::default()
        },
    }
}

fn exit_code(status: &ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(-signal);
        }
    }
    status.code()
}

/// Runs the engine, retrying timed-out attempts up to `max_retries` times. Returns the
/// last result and the number of attempts made.
pub async fn execute_with_retries(
    request: &SimulationRequest,
    simulation: &SimulationConfig,
) -> (SimulationResult, u32) {
    let mut attempts = 0;
    loop {
        let result = execute(request, &simulation.engine, simulation.timeout).await;
        attempts += 1;
        if result.succeeded() {
            return (result, attempts);
        }
        let category = failure::classify(&result);
        if !failure::should_retry(category, attempts, simulation.max_retries) {
            return (result, attempts);
        }
        debug!(seed = request.seed, attempts, %category, "Retrying run");
    }
}

/// Dispatches a batch of engine runs with bounded concurrency.
pub struct BatchRunner {
    simulation: SimulationConfig,
    scoring: ScoringConfig,
    jobs: usize,
    lookups: Arc<HashMap<String, LookupResponse>>,
    cancel: Arc<AtomicBool>,
}

impl BatchRunner {
    /// `lookups` holds the database answer for every requested formula; runs whose
    /// formula is absent are validated as unknown.
    pub fn new(
        simulation: SimulationConfig,
        scoring: ScoringConfig,
        jobs: usize,
        lookups: HashMap<String, LookupResponse>,
    ) -> Self {
        Self {
            simulation,
            scoring,
            jobs: jobs.max(1),
            lookups: Arc::new(lookups),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag stops new runs from starting; in-flight runs finish normally.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Runs every request and folds it into `context`. Every started run is drained
    /// before returning, so the context always reflects each run that finished.
    pub async fn run(
        &self,
        requests: Vec<SimulationRequest>,
        context: Arc<Mutex<BatchContext>>,
        reporter: Arc<ProgressReporter<'static>>,
    ) -> BatchTally {
        let total = requests.len();
        reporter.report(Progress::BatchStart {
            total_runs: total as u64,
        });
        info!(runs = total, jobs = self.jobs, engine = %self.simulation.engine.display(), "Starting batch");

        let interrupt = {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received; waiting for in-flight runs to finish");
                    cancel.store(true, Ordering::SeqCst);
                }
            })
        };

        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut tasks = JoinSet::new();
        let mut tally = BatchTally::default();

        for (index, request) in requests.into_iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                error!("Run scheduler closed; no further runs will start");
                tally.skipped = (total - index) as u64;
                break;
            };
            if self.cancel.load(Ordering::SeqCst) {
                tally.skipped = (total - index) as u64;
                break;
            }

            let simulation = self.simulation.clone();
            let scoring = self.scoring;
            let lookups = self.lookups.clone();
            let context = context.clone();
            let reporter = reporter.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let (result, attempts) = execute_with_retries(&request, &simulation).await;
                let ingested = tokio::task::spawn_blocking(move || {
                    let lookup = lookups
                        .get(&request.formula)
                        .cloned()
                        .unwrap_or_else(|| LookupResponse::Error("not resolved".to_string()));
                    let mut guard = lock_context(&context);
                    let ctx = &mut *guard;
                    let mut state = BatchState {
                        grid: &mut ctx.grid,
                        catalog: &mut ctx.catalog,
                        failures: &mut ctx.failures,
                    };
                    gap_fill::ingest(
                        &mut state,
                        &Classifier::new(),
                        &scoring,
                        &request,
                        &result,
                        &simulation.engine,
                        &lookup,
                    )
                    .map_err(CliError::from)
                })
                .await
                .map_err(|e| CliError::Other(e.into()))
                .and_then(|r| r);

                let success = matches!(&ingested, Ok(d) if d.is_success());
                reporter.report(Progress::RunFinished {
                    run: index as u64,
                    success,
                });
                (attempts, ingested)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            tally.fold(joined);
        }
        interrupt.abort();

        if tally.skipped > 0 {
            warn!(skipped = tally.skipped, "Batch interrupted before all runs started");
        }
        info!(
            succeeded = tally.succeeded,
            failed = tally.failed,
            cataloged = tally.cataloged,
            retries = tally.retries,
            "Batch finished"
        );
        tally
    }
}

type RunOutcome = (u32, Result<RunDisposition>);

impl BatchTally {
    fn fold(&mut self, joined: std::result::Result<RunOutcome, JoinError>) {
        let (attempts, ingested) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Run task aborted: {}", e);
                self.failed += 1;
                return;
            }
        };
        self.retries += u64::from(attempts.saturating_sub(1));
        match ingested {
            Ok(RunDisposition::Cataloged(card)) => {
                debug!(run_id = %card.run_id, "Run cataloged");
                self.succeeded += 1;
                self.cataloged += 1;
            }
            Ok(RunDisposition::Recorded(_)) => self.succeeded += 1,
            Ok(RunDisposition::Failed(_)) => self.failed += 1,
            Err(e) => {
                error!("Failed to record run: {}", e);
                self.failed += 1;
            }
        }
    }
}
