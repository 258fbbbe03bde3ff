//! Extraction of scalar outcomes from the engine's free-text diagnostics.

use crate::core::models::outcome::SimulationOutcome;
use once_cell::sync::Lazy;
use regex::Regex;

static ENERGY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^\s*final\s+energy\s*:\s*([-+]?(?:[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?|inf(?:inity)?|nan))",
    )
    .expect("Invalid energy regex")
});
static MAX_FORCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*max\s+force\s*:\s*([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)")
        .expect("Invalid max force regex")
});
static CONVERGED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*converged\s*:\s*(\w+)").expect("Invalid converged regex")
});
static STABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*stable\s*:\s*(\w+)").expect("Invalid stable regex"));
static CHARGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*total\s+charge\s*:\s*([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)")
        .expect("Invalid charge regex")
});
static ITERATIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*iterations\s*:\s*(\d+)").expect("Invalid iterations regex")
});

/// Max force below which a negative-energy run is treated as stable even when the
/// engine does not say so.
const INFERRED_STABLE_FORCE: f64 = 0.01;

fn first_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn first_flag(re: &Regex, text: &str) -> bool {
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| matches!(m.as_str().to_ascii_lowercase().as_str(), "yes" | "true"))
        .unwrap_or(false)
}

/// The `Final energy:` value, or `None` when the engine printed none.
pub fn reported_energy(text: &str) -> Option<f64> {
    first_number(&ENERGY, text)
}

/// Parses diagnostics such as:
///
/// ```text
/// Final energy: -123.45 kcal/mol
/// Max force: 0.0012 kcal/(mol*A)
/// Converged: yes
/// ```
///
/// Missing values default to zero and `false`. Callers that must tell a missing energy
/// apart from a zero one use [`reported_energy`].
pub fn parse_diagnostics(text: &str) -> SimulationOutcome {
    let energy = reported_energy(text).unwrap_or(0.0);
    let max_force = first_number(&MAX_FORCE, text).unwrap_or(0.0);
    let converged = first_flag(&CONVERGED, text);
    let reported_stable = first_flag(&STABLE, text);
    let stable = reported_stable || (max_force < INFERRED_STABLE_FORCE && energy < 0.0);

    SimulationOutcome {
        energy,
        max_force,
        converged,
        stable,
        total_charge: first_number(&CHARGE, text).unwrap_or(0.0),
        iterations: first_number(&ITERATIONS, text)
            .map(|v| v as u32)
            .unwrap_or(0),
    }
}
