//! Bucketing of failed simulation runs and the batch failure report.

use super::simulation::{SimulationRequest, SimulationResult};
use super::storage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use tracing::{debug, info};

pub const FAILURE_REPORT_FILE: &str = "failure_analysis.json";

const REASON_LIMIT: usize = 200;
const MESSAGE_LIMIT: usize = 500;
/// Reasons sharing this many leading characters are grouped together in the report.
const REASON_GROUP_PREFIX: usize = 100;
const TOP_REASONS: usize = 5;
const SAMPLE_REPROS: usize = 3;
/// Exit codes produced by SIGKILL (as a negative status or 128+9) and `timeout(1)`.
const TIMEOUT_EXIT_CODES: [i32; 3] = [-9, 124, 137];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Numerical,
    Physics,
    OutOfDomain,
    Convergence,
    Timeout,
    Unknown,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 6] = [
        FailureCategory::Numerical,
        FailureCategory::Physics,
        FailureCategory::OutOfDomain,
        FailureCategory::Convergence,
        FailureCategory::Timeout,
        FailureCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Numerical => "numerical",
            FailureCategory::Physics => "physics",
            FailureCategory::OutOfDomain => "out_of_domain",
            FailureCategory::Convergence => "convergence",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Unknown => "unknown",
        }
    }

    pub fn is_retryable(&self) -> bool {
        *self == FailureCategory::Timeout
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static PATTERNS: Lazy<Vec<(FailureCategory, Regex)>> = Lazy::new(|| {
    let table: [(FailureCategory, &[&str]); 5] = [
        (
            FailureCategory::Numerical,
            &[
                r"\b(nan|inf|infinity)\b|overflow|underflow",
                r"timestep.*too.*large",
                r"numerical.*unstable",
                r"division.*by.*zero",
                r"sqrt.*negative",
            ],
        ),
        (
            FailureCategory::Physics,
            &[
                r"clash|explosion|overlap",
                r"unphysical.*bond",
                r"energy.*diverged",
                r"force.*too.*large",
                r"invalid.*geometry",
            ],
        ),
        (
            FailureCategory::OutOfDomain,
            &[
                r"unknown.*element",
                r"unsupported.*composition",
                r"atom.*count.*exceeded",
                r"too.*many.*atoms",
                r"invalid.*formula",
            ],
        ),
        (
            FailureCategory::Convergence,
            &[
                r"failed.*converge",
                r"max.*iterations",
                r"optimizer.*failed",
                r"gradient.*exploded",
            ],
        ),
        (
            FailureCategory::Timeout,
            &[r"timeout|time.*limit|killed", r"walltime.*exceeded"],
        ),
    ];
    table
        .into_iter()
        .flat_map(|(category, patterns)| {
            patterns.iter().map(move |p| {
                let regex = Regex::new(&format!("(?i){p}")).expect("Invalid failure pattern");
                (category, regex)
            })
        })
        .collect()
});

/// Buckets a failed run. Timeouts are recognized by exit status first; otherwise the
/// first category with a matching pattern wins.
pub fn classify(result: &SimulationResult) -> FailureCategory {
    if result.timed_out
        || result
            .exit_code
            .is_some_and(|code| TIMEOUT_EXIT_CODES.contains(&code))
    {
        return FailureCategory::Timeout;
    }
    let text = result.combined_output();
    PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(&text))
        .map(|(category, _)| *category)
        .unwrap_or(FailureCategory::Unknown)
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// First line mentioning an error, else the first non-empty line.
pub fn extract_reason(message: &str, category: FailureCategory) -> String {
    const KEYWORDS: [&str; 4] = ["error", "failed", "exception", "abort"];
    let lines = || message.lines().map(str::trim).filter(|l| !l.is_empty());

    lines()
        .find(|line| {
            let lower = line.to_ascii_lowercase();
            KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .or_else(|| lines().next())
        .map(|line| truncate(line, REASON_LIMIT))
        .unwrap_or_else(|| format!("{category} (no specific reason extracted)"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub category: FailureCategory,
    pub reason: String,
    pub seed: u64,
    pub formula: String,
    pub temperature: f64,
    pub density: f64,
    pub steps: u32,
    pub exit_code: Option<i32>,
    pub error_message: String,
    pub minimal_repro: String,
}

impl Failure {
    pub fn new(request: &SimulationRequest, result: &SimulationResult, engine: &Path) -> Self {
        let category = classify(result);
        let message = if result.timed_out {
            format!("Timeout after {:.1}s\n{}", result.duration.as_secs_f64(), result.stderr)
        } else {
            result.combined_output()
        };
        Self {
            category,
            reason: extract_reason(&message, category),
            seed: request.seed,
            formula: request.formula.clone(),
            temperature: request.temperature,
            density: request.density,
            steps: request.steps,
            exit_code: result.exit_code,
            error_message: truncate(&message, MESSAGE_LIMIT),
            minimal_repro: request.command_line(engine),
        }
    }

    /// Replaces the extracted reason, for runs that exited cleanly but left output that
    /// could not be used.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = truncate(&reason.into(), REASON_LIMIT);
        self
    }
}

/// Whether a failure earns another attempt. Only timeouts are retried.
pub fn should_retry(category: FailureCategory, attempts_so_far: u32, max_retries: u32) -> bool {
    category.is_retryable() && attempts_so_far <= max_retries
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub total_runs: u64,
    pub total_failures: u64,
    pub success_rate: f64,
    pub failures_by_category: BTreeMap<FailureCategory, CategoryStats>,
    pub top_reasons: BTreeMap<FailureCategory, Vec<(String, usize)>>,
    pub minimal_repros: BTreeMap<FailureCategory, Vec<String>>,
}

#[derive(Debug, Default)]
pub struct FailureLog {
    total_runs: u64,
    failures: Vec<Failure>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.total_runs += 1;
    }

    pub fn record_failure(&mut self, failure: Failure) -> &Failure {
        self.total_runs += 1;
        debug!(category = %failure.category, seed = failure.seed, reason = %failure.reason, "Recorded failure");
        self.failures.push(failure);
        &self.failures[self.failures.len() - 1]
    }

    pub fn total_runs(&self) -> u64 {
        self.total_runs
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn in_category(&self, category: FailureCategory) -> impl Iterator<Item = &Failure> {
        self.failures.iter().filter(move |f| f.category == category)
    }

    pub fn report(&self) -> FailureReport {
        let total_failures = self.failures.len() as u64;
        let mut report = FailureReport {
            total_runs: self.total_runs,
            total_failures,
            success_rate: if self.total_runs == 0 {
                0.0
            } else {
                (self.total_runs - total_failures) as f64 / self.total_runs as f64
            },
            failures_by_category: BTreeMap::new(),
            top_reasons: BTreeMap::new(),
            minimal_repros: BTreeMap::new(),
        };

        for category in FailureCategory::ALL {
            let failures: Vec<&Failure> = self.in_category(category).collect();
            if failures.is_empty() {
                continue;
            }
            report.failures_by_category.insert(
                category,
                CategoryStats {
                    count: failures.len(),
                    percentage: failures.len() as f64 / total_failures as f64 * 100.0,
                },
            );

            let mut reasons: Vec<(String, usize)> = Vec::new();
            for failure in &failures {
                let key = truncate(&failure.reason, REASON_GROUP_PREFIX);
                match reasons.iter_mut().find(|(reason, _)| *reason == key) {
                    Some((_, count)) => *count += 1,
                    None => reasons.push((key, 1)),
                }
            }
            reasons.sort_by(|a, b| b.1.cmp(&a.1));
            reasons.truncate(TOP_REASONS);
            report.top_reasons.insert(category, reasons);

            report.minimal_repros.insert(
                category,
                failures
                    .iter()
                    .take(SAMPLE_REPROS)
                    .map(|f| f.minimal_repro.clone())
                    .collect(),
            );
        }
        report
    }

    /// Writes `failure_analysis.json` plus one `failures_<category>.jsonl` per
    /// category that has failures.
    pub fn save(&self, dir: &Path) -> io::Result<FailureReport> {
        let report = self.report();
        storage::write_json_atomic(&dir.join(FAILURE_REPORT_FILE), &report)?;

        for category in report.failures_by_category.keys() {
            let mut lines = Vec::new();
            for failure in self.in_category(*category) {
                serde_json::to_writer(&mut lines, failure).map_err(io::Error::other)?;
                lines.push(b'\n');
            }
            let path = dir.join(format!("failures_{category}.jsonl"));
            storage::write_atomic(&path, &lines)?;
        }
        info!(
            runs = report.total_runs,
            failures = report.total_failures,
            "Saved failure analysis"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::coverage::GridPoint;
    use std::path::PathBuf;
    use std::time::Duration;

    fn result(code: i32, stdout: &str, stderr: &str) -> SimulationResult {
        SimulationResult {
            exit_code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            timed_out: false,
            duration: Duration::from_millis(5),
        }
    }

    fn request(seed: u64) -> SimulationRequest {
        SimulationRequest {
            formula: "CH4".to_string(),
            seed,
            temperature: 300.0,
            density: 0.01,
            steps: 1000,
            output: PathBuf::from(format!("/tmp/run_{seed}.xyz")),
            point: GridPoint {
                scale: 5.0,
                temperature: 300.0,
                density: 0.01,
            },
        }
    }

    #[test]
    fn timeout_exit_codes_win_over_text() {
        for code in TIMEOUT_EXIT_CODES {
            assert_eq!(classify(&result(code, "NaN detected", "")), FailureCategory::Timeout);
        }
        let timed_out = SimulationResult {
            timed_out: true,
            ..Default::default()
        };
        assert_eq!(classify(&timed_out), FailureCategory::Timeout);
    }

    #[test]
    fn patterns_map_to_categories_in_priority_order() {
        let cases = [
            ("Energy became NaN at step 40", FailureCategory::Numerical),
            ("ERROR: timestep is too large", FailureCategory::Numerical),
            ("atomic clash between 3 and 7", FailureCategory::Physics),
            ("Unknown element 'Xx'", FailureCategory::OutOfDomain),
            ("optimizer failed to converge", FailureCategory::Convergence),
            ("walltime exceeded", FailureCategory::Timeout),
            ("segmentation fault", FailureCategory::Unknown),
        ];
        for (text, expected) in cases {
            assert_eq!(classify(&result(1, "", text)), expected, "{text}");
        }
    }

    #[test]
    fn words_containing_inf_are_not_numerical() {
        assert_eq!(
            classify(&result(1, "information: done", "")),
            FailureCategory::Unknown
        );
    }

    #[test]
    fn reason_prefers_error_lines_then_first_line() {
        let text = "step 1\nstep 2\nFATAL ERROR: bad things\n";
        assert_eq!(
            extract_reason(text, FailureCategory::Unknown),
            "FATAL ERROR: bad things"
        );
        assert_eq!(extract_reason("\n  hello  \n", FailureCategory::Unknown), "hello");
        assert_eq!(
            extract_reason("", FailureCategory::Physics),
            "physics (no specific reason extracted)"
        );
        assert_eq!(
            extract_reason(&"x".repeat(300), FailureCategory::Unknown).len(),
            REASON_LIMIT
        );
    }

    #[test]
    fn failure_carries_a_minimal_repro_and_truncated_message() {
        let long = format!("error: {}", "y".repeat(1000));
        let failure = Failure::new(&request(7), &result(2, &long, ""), Path::new("./sim"));
        assert_eq!(failure.error_message.chars().count(), MESSAGE_LIMIT);
        assert!(failure.minimal_repro.starts_with("./sim --formula CH4 --seed 7"));
        assert_eq!(failure.exit_code, Some(2));
    }

    #[test]
    fn only_timeouts_are_retried_within_budget() {
        assert!(should_retry(FailureCategory::Timeout, 1, 1));
        assert!(!should_retry(FailureCategory::Timeout, 2, 1));
        assert!(!should_retry(FailureCategory::Numerical, 1, 5));
    }

    #[test]
    fn report_counts_categories_reasons_and_repros() {
        let mut log = FailureLog::new();
        for _ in 0..6 {
            log.record_success();
        }
        for seed in 0..4 {
            log.record_failure(Failure::new(&request(seed), &result(1, "NaN in forces", ""), Path::new("sim")));
        }
        log.record_failure(Failure::new(&request(9), &result(1, "clash", ""), Path::new("sim")));

        let report = log.report();
        assert_eq!(report.total_runs, 11);
        assert_eq!(report.total_failures, 5);
        assert!((report.success_rate - 6.0 / 11.0).abs() < 1e-12);

        let numerical = &report.failures_by_category[&FailureCategory::Numerical];
        assert_eq!(numerical.count, 4);
        assert!((numerical.percentage - 80.0).abs() < 1e-9);
        assert_eq!(
            report.top_reasons[&FailureCategory::Numerical],
            vec![("NaN in forces".to_string(), 4)]
        );
        assert_eq!(report.minimal_repros[&FailureCategory::Numerical].len(), SAMPLE_REPROS);
        assert!(!report.failures_by_category.contains_key(&FailureCategory::Timeout));
    }

    #[test]
    fn save_writes_report_and_category_logs() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FailureLog::new();
        log.record_failure(Failure::new(&request(1), &result(124, "", ""), Path::new("sim")));
        log.save(dir.path()).unwrap();

        let report: FailureReport =
            storage::read_json(&dir.path().join(FAILURE_REPORT_FILE)).unwrap().unwrap();
        assert_eq!(report.total_failures, 1);
        let jsonl = std::fs::read_to_string(dir.path().join("failures_timeout.jsonl")).unwrap();
        assert_eq!(jsonl.lines().count(), 1);
    }
}
