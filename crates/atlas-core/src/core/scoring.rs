use super::classification::{ClassLabel, Classifier};
use super::models::composition::Composition;
use super::models::health::Health;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference system size used to normalize the cost proxy.
const COST_REFERENCE_ATOMS: f64 = 2000.0;
/// Scale factor mapping the raw priority onto the reported 0-100 range.
const PRIORITY_SCALE: f64 = 50.0;
pub const PRIORITY_CAP: f64 = 100.0;
/// Flat priority assigned by [`ScoringMode::Uniform`].
pub const UNIFORM_PRIORITY: f64 = 50.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Cannot score a system with zero atoms")]
    ZeroAtoms,
    #[error("Total charge must be finite, got {0}")]
    NonFiniteCharge(f64),
}

/// Tunable coefficients of the multi-factor score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScoringWeights {
    pub mu1: f64,
    pub mu2: f64,
    pub sigma1: f64,
    pub sigma2: f64,
    pub a: f64,
    pub b: f64,
    pub k_charge: f64,
    pub alpha_metal: f64,
    pub beta_diversity: f64,
    pub lambda_cost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            mu1: 8.0,
            mu2: 56.0,
            sigma1: 3.0,
            sigma2: 12.0,
            a: 1.0,
            b: 0.8,
            k_charge: 2.0,
            alpha_metal: 0.3,
            beta_diversity: 0.5,
            lambda_cost: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    #[default]
    Weighted,
    /// Flat priority for unbiased baseline collection.
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub mode: ScoringMode,
    pub use_classification: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            mode: ScoringMode::Weighted,
            use_classification: true,
        }
    }
}

/// Everything the scorer needs about one simulated system.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub atom_count: u32,
    pub composition: &'a Composition,
    pub total_charge: f64,
    pub health: Health,
    pub converged: bool,
    pub bounded: bool,
    pub has_long_range: bool,
}

/// Auditable result of one scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(rename = "wN")]
    pub w_n: f64,
    #[serde(rename = "wQ")]
    pub w_q: f64,
    #[serde(rename = "wM")]
    pub w_m: f64,
    #[serde(rename = "wD")]
    pub w_d: f64,
    #[serde(rename = "wS")]
    pub w_s: f64,
    #[serde(rename = "wC")]
    pub w_c: f64,
    pub cost: f64,
    pub value: f64,
    pub priority: f64,
    pub classifications: Vec<ClassLabel>,
}

impl ScoreBreakdown {
    fn uniform() -> Self {
        Self {
            w_n: 1.0,
            w_q: 1.0,
            w_m: 1.0,
            w_d: 1.0,
            w_s: 1.0,
            w_c: 1.0,
            cost: 0.0,
            value: 1.0,
            priority: UNIFORM_PRIORITY,
            classifications: Vec::new(),
        }
    }
}

pub struct Scorer<'a> {
    classifier: &'a Classifier,
    config: ScoringConfig,
}

impl<'a> Scorer<'a> {
    pub fn new(classifier: &'a Classifier, config: ScoringConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Computes the priority score and its full breakdown.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::ZeroAtoms`] when `atom_count` is zero and
    /// [`ScoringError::NonFiniteCharge`] for a NaN or infinite charge.
    pub fn score(&self, input: &ScoreInput<'_>) -> Result<ScoreBreakdown, ScoringError> {
        if input.atom_count == 0 {
            return Err(ScoringError::ZeroAtoms);
        }
        if !input.total_charge.is_finite() {
            return Err(ScoringError::NonFiniteCharge(input.total_charge));
        }

        if self.config.mode == ScoringMode::Uniform {
            return Ok(ScoreBreakdown::uniform());
        }

        let n = f64::from(input.atom_count);
        let w_n = self.size_weight(n);
        let w_q = self.charge_weight(input.total_charge);
        let w_m = self.metal_weight(input.composition);
        let w_d = self.diversity_weight(input.composition);
        let (w_c, classifications) = self.classification_weight(input.composition);
        let w_s = stability_weight(input.health, input.converged, input.bounded);

        let value = w_n * w_q * w_m * w_d * w_c * w_s;
        let cost = cost_proxy(n, input.has_long_range);
        let raw = value / (1.0 + self.config.weights.lambda_cost * cost);
        let priority = (raw * PRIORITY_SCALE).min(PRIORITY_CAP);

        Ok(ScoreBreakdown {
            w_n,
            w_q,
            w_m,
            w_d,
            w_s,
            w_c,
            cost,
            value,
            priority,
            classifications,
        })
    }

    fn size_weight(&self, n: f64) -> f64 {
        let w = &self.config.weights;
        let gaussian = |mu: f64, sigma: f64| (-(n - mu).powi(2) / (2.0 * sigma * sigma)).exp();
        w.a * gaussian(w.mu1, w.sigma1) + w.b * gaussian(w.mu2, w.sigma2)
    }

    fn charge_weight(&self, total_charge: f64) -> f64 {
        (-self.config.weights.k_charge * total_charge.abs()).exp()
    }

    // Uses the composition's own total so that wM stays in [1, 1 + alpha].
    fn metal_weight(&self, composition: &Composition) -> f64 {
        let total = f64::from(composition.total_atoms());
        let metals = f64::from(composition.metal_atom_count());
        1.0 + self.config.weights.alpha_metal * (metals / total)
    }

    fn diversity_weight(&self, composition: &Composition) -> f64 {
        let n = f64::from(composition.total_atoms());
        if n <= 1.0 {
            return 1.0;
        }
        let unique = composition.unique_elements() as f64;
        1.0 + self.config.weights.beta_diversity * (unique / n.ln_1p())
    }

    fn classification_weight(&self, composition: &Composition) -> (f64, Vec<ClassLabel>) {
        if !self.config.use_classification {
            return (1.0, Vec::new());
        }
        let classifications = self.classifier.classify(composition);
        let bonus: f64 = classifications.iter().map(|c| c.bonus).sum();
        let labels = classifications.into_iter().map(|c| c.label).collect();
        (1.0 + bonus, labels)
    }
}

fn stability_weight(health: Health, converged: bool, bounded: bool) -> f64 {
    if health == Health::Converged || (bounded && converged) {
        1.0
    } else if health == Health::Bounded || bounded {
        0.3
    } else {
        0.05
    }
}

fn cost_proxy(n: f64, has_long_range: bool) -> f64 {
    let raw = if has_long_range { n * n } else { n.powf(1.5) };
    raw / COST_REFERENCE_ATOMS.powf(1.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn input<'a>(composition: &'a Composition, health: Health) -> ScoreInput<'a> {
        ScoreInput {
            atom_count: composition.total_atoms(),
            composition,
            total_charge: 0.0,
            health,
            converged: health == Health::Converged,
            bounded: matches!(health, Health::Converged | Health::Bounded),
            has_long_range: false,
        }
    }

    #[test]
    fn score_rejects_zero_atom_count() {
        let classifier = Classifier::new();
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        let water = Composition::from_formula("H2O").unwrap();
        let mut request = input(&water, Health::Converged);
        request.atom_count = 0;
        assert_eq!(scorer.score(&request), Err(ScoringError::ZeroAtoms));
    }

    #[test]
    fn score_rejects_non_finite_charge() {
        let classifier = Classifier::new();
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        let water = Composition::from_formula("H2O").unwrap();
        let mut request = input(&water, Health::Converged);
        request.total_charge = f64::NAN;
        assert!(matches!(
            scorer.score(&request),
            Err(ScoringError::NonFiniteCharge(_))
        ));
    }

    #[test]
    fn converged_water_has_neutral_stability_and_classification_weights() {
        let classifier = Classifier::new();
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        let water = Composition::from_formula("H2O").unwrap();
        let breakdown = scorer.score(&input(&water, Health::Converged)).unwrap();

        assert_eq!(breakdown.w_s, 1.0);
        assert_eq!(breakdown.w_c, 1.0);
        assert_eq!(breakdown.w_q, 1.0);
        assert!(breakdown.classifications.is_empty());
        assert!((breakdown.w_m - 1.0).abs() < EPS);

        let expected_wd = 1.0 + 0.5 * (2.0 / 4.0_f64.ln());
        assert!((breakdown.w_d - expected_wd).abs() < EPS);

        let product = breakdown.w_n
            * breakdown.w_q
            * breakdown.w_m
            * breakdown.w_d
            * breakdown.w_s
            * breakdown.w_c;
        assert!((breakdown.value - product).abs() < EPS);
    }

    #[test]
    fn size_weight_peaks_near_the_small_molecule_mean() {
        let classifier = Classifier::new();
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        assert!(scorer.size_weight(8.0) > scorer.size_weight(20.0));
        assert!(scorer.size_weight(56.0) > scorer.size_weight(30.0));
        assert!((scorer.size_weight(8.0) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn stability_weight_follows_health_and_flags() {
        assert_eq!(stability_weight(Health::Converged, false, false), 1.0);
        assert_eq!(stability_weight(Health::Invalid, true, true), 1.0);
        assert_eq!(stability_weight(Health::Bounded, false, false), 0.3);
        assert_eq!(stability_weight(Health::Exploded, false, true), 0.3);
        assert_eq!(stability_weight(Health::Exploded, false, false), 0.05);
        assert_eq!(stability_weight(Health::Invalid, true, false), 0.05);
    }

    #[test]
    fn long_range_cost_grows_quadratically() {
        let short = cost_proxy(100.0, false);
        let long = cost_proxy(100.0, true);
        assert!((short - 1000.0 / 2000.0_f64.powf(1.5)).abs() < EPS);
        assert!((long - 10_000.0 / 2000.0_f64.powf(1.5)).abs() < EPS);
    }

    #[test]
    fn charge_is_penalized_exponentially() {
        let classifier = Classifier::new();
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        assert!((scorer.charge_weight(-1.0) - (-2.0_f64).exp()).abs() < EPS);
    }

    #[test]
    fn priority_stays_within_zero_and_one_hundred() {
        let classifier = Classifier::new();
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        let formulas = [
            "H", "H2O", "C10H10Fe", "C6H12F6FeN4O4", "Na28Cl28", "Fe200", "C8F18", "Ni60Cr20Fe20",
        ];
        for formula in formulas {
            let c = Composition::from_formula(formula).unwrap();
            for health in [
                Health::Converged,
                Health::Bounded,
                Health::Exploded,
                Health::Invalid,
            ] {
                let breakdown = scorer.score(&input(&c, health)).unwrap();
                assert!(
                    (0.0..=PRIORITY_CAP).contains(&breakdown.priority),
                    "{formula} {health}: {}",
                    breakdown.priority
                );
            }
        }
    }

    #[test]
    fn multiple_classifications_can_push_priority_to_the_cap() {
        let classifier = Classifier::new();
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        let c = Composition::from_formula("C3H2FeN2O").unwrap();
        let breakdown = scorer.score(&input(&c, Health::Converged)).unwrap();
        assert!(breakdown.w_c > 2.0);
        assert_eq!(breakdown.priority, PRIORITY_CAP);
    }

    #[test]
    fn disabling_classification_reports_no_labels() {
        let classifier = Classifier::new();
        let config = ScoringConfig {
            use_classification: false,
            ..ScoringConfig::default()
        };
        let scorer = Scorer::new(&classifier, config);
        let ferrocene = Composition::from_formula("C10H10Fe").unwrap();
        let breakdown = scorer.score(&input(&ferrocene, Health::Converged)).unwrap();
        assert_eq!(breakdown.w_c, 1.0);
        assert!(breakdown.classifications.is_empty());
    }

    #[test]
    fn uniform_mode_returns_a_flat_neutral_breakdown() {
        let classifier = Classifier::new();
        let config = ScoringConfig {
            mode: ScoringMode::Uniform,
            ..ScoringConfig::default()
        };
        let scorer = Scorer::new(&classifier, config);
        let tnt = Composition::from_formula("C7H5N3O6").unwrap();
        let breakdown = scorer.score(&input(&tnt, Health::Exploded)).unwrap();
        assert_eq!(breakdown.priority, UNIFORM_PRIORITY);
        assert_eq!(breakdown.value, 1.0);
        assert_eq!(breakdown.cost, 0.0);
        assert!(breakdown.classifications.is_empty());
    }

    #[test]
    fn breakdown_serializes_with_short_weight_names() {
        let classifier = Classifier::new();
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        let water = Composition::from_formula("H2O").unwrap();
        let breakdown = scorer.score(&input(&water, Health::Converged)).unwrap();
        let json = serde_json::to_value(&breakdown).unwrap();
        for key in ["wN", "wQ", "wM", "wD", "wS", "wC", "cost", "value", "priority"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
