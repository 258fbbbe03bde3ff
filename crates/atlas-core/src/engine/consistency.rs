//! Regression checks over a catalog of run cards.
//!
//! Nothing here mutates a card: violations are reported, never corrected.

use super::card::RunCard;
use crate::core::classification::{ClassLabel, Classifier};
use crate::core::models::health::Health;
use crate::core::scoring::{PRIORITY_CAP, Scorer, ScoringConfig, ScoringMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// Score differences at or below this are not reported as changes.
pub const SCORE_DELTA_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    /// Priority lies in `[0, 100]`.
    ScoreBounded,
    ClassificationConsistent,
    HealthConsistent,
}

impl Invariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Invariant::ScoreBounded => "score_bounded",
            Invariant::ClassificationConsistent => "classification_consistent",
            Invariant::HealthConsistent => "health_consistent",
        }
    }
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub invariant: Invariant,
    pub run_id: String,
    pub detail: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.invariant, self.run_id, self.detail)
    }
}

fn score_in_range(score: f64) -> bool {
    score.is_finite() && (0.0..=PRIORITY_CAP).contains(&score)
}

fn label_set(labels: &[ClassLabel]) -> BTreeSet<ClassLabel> {
    labels.iter().copied().collect()
}

fn join_labels(labels: &BTreeSet<ClassLabel>) -> String {
    labels
        .iter()
        .map(ClassLabel::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Evaluates every invariant against every card.
///
/// Recorded labels are only compared when `scoring` would have produced them
/// (weighted mode with classification enabled).
pub fn check_catalog(
    cards: &[RunCard],
    classifier: &Classifier,
    scoring: &ScoringConfig,
) -> Vec<InvariantViolation> {
    let compare_labels = scoring.mode == ScoringMode::Weighted && scoring.use_classification;
    let mut violations = Vec::new();

    for card in cards {
        if !score_in_range(card.score) {
            violations.push(InvariantViolation {
                invariant: Invariant::ScoreBounded,
                run_id: card.run_id.clone(),
                detail: format!("score {} outside [0, {PRIORITY_CAP}]", card.score),
            });
        }

        let first = classifier.classify(&card.composition);
        let second = classifier.classify(&card.composition);
        if first != second {
            violations.push(InvariantViolation {
                invariant: Invariant::ClassificationConsistent,
                run_id: card.run_id.clone(),
                detail: "classifying the same composition twice gave different results".to_string(),
            });
        } else if compare_labels {
            let current: BTreeSet<ClassLabel> = first.iter().map(|c| c.label).collect();
            let recorded = label_set(&card.score_breakdown.classifications);
            if current != recorded {
                violations.push(InvariantViolation {
                    invariant: Invariant::ClassificationConsistent,
                    run_id: card.run_id.clone(),
                    detail: format!(
                        "recorded labels [{}] but classifier now gives [{}]",
                        join_labels(&recorded),
                        join_labels(&current)
                    ),
                });
            }
        }

        let expected = Health::determine(&card.metrics.outcome());
        if expected != card.health {
            violations.push(InvariantViolation {
                invariant: Invariant::HealthConsistent,
                run_id: card.run_id.clone(),
                detail: format!("card says {} but metrics give {expected}", card.health),
            });
        }
    }

    if violations.is_empty() {
        debug!(cards = cards.len(), "All invariants hold");
    } else {
        warn!(cards = cards.len(), violations = violations.len(), "Invariant violations found");
    }
    violations
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreChange {
    pub run_id: String,
    pub formula: String,
    pub old_score: f64,
    pub new_score: f64,
}

impl ScoreChange {
    pub fn delta(&self) -> f64 {
        self.new_score - self.old_score
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeReport {
    pub total: usize,
    pub reclassified: Vec<String>,
    pub score_changes: Vec<ScoreChange>,
    pub invariant_breaks: Vec<InvariantViolation>,
}

impl ChangeReport {
    pub fn is_clean(&self) -> bool {
        self.invariant_breaks.is_empty()
    }
}

pub fn rescore(cards: &[RunCard], classifier: &Classifier, config: ScoringConfig) -> ChangeReport {
    let scorer = Scorer::new(classifier, config);
    let mut report = ChangeReport {
        total: cards.len(),
        ..Default::default()
    };

    for card in cards {
        let breakdown = match scorer.score(&card.score_input()) {
            Ok(breakdown) => breakdown,
            Err(e) => {
                report.invariant_breaks.push(InvariantViolation {
                    invariant: Invariant::ScoreBounded,
                    run_id: card.run_id.clone(),
                    detail: format!("rescoring failed: {e}"),
                });
                continue;
            }
        };

        if label_set(&breakdown.classifications) != label_set(&card.score_breakdown.classifications) {
            report.reclassified.push(card.run_id.clone());
        }

        if (breakdown.priority - card.score).abs() > SCORE_DELTA_TOLERANCE {
            report.score_changes.push(ScoreChange {
                run_id: card.run_id.clone(),
                formula: card.formula.clone(),
                old_score: card.score,
                new_score: breakdown.priority,
            });
        }

        if !score_in_range(breakdown.priority) {
            report.invariant_breaks.push(InvariantViolation {
                invariant: Invariant::ScoreBounded,
                run_id: card.run_id.clone(),
                detail: format!("rescored priority {} outside [0, {PRIORITY_CAP}]", breakdown.priority),
            });
        }
    }

    debug!(
        total = report.total,
        reclassified = report.reclassified.len(),
        changed = report.score_changes.len(),
        "Rescored catalog"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::composition::Composition;
    use crate::core::models::outcome::SimulationOutcome;
    use crate::core::scoring::{ScoreInput, ScoringWeights};
    use crate::engine::card::{self, CardPaths, Domain, RunMetrics, Tag};
    use crate::engine::config::DEFAULT_MODEL;
    use crate::engine::validation::{LookupResponse, ValidationSummary, Validator};
    use chrono::Utc;

    fn converged() -> SimulationOutcome {
        SimulationOutcome {
            energy: -10.0,
            max_force: 0.001,
            converged: true,
            stable: true,
            total_charge: 0.0,
            iterations: 50,
        }
    }

    fn make_card(run_id: &str, formula: &str) -> RunCard {
        let classifier = Classifier::new();
        let composition = Composition::from_formula(formula).unwrap();
        let outcome = converged();
        let health = Health::determine(&outcome);
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        let breakdown = scorer
            .score(&ScoreInput {
                atom_count: composition.total_atoms(),
                composition: &composition,
                total_charge: 0.0,
                health,
                converged: true,
                bounded: true,
                has_long_range: true,
            })
            .unwrap();
        let validation = Validator::new().validate(formula, true, &LookupResponse::NotFound);
        let domain = Domain::infer(&composition);
        let size = composition.total_atoms();
        RunCard {
            run_id: run_id.to_string(),
            title: card::card_title(formula, domain),
            formula: composition.formula(),
            size,
            composition,
            domain,
            model: DEFAULT_MODEL.to_string(),
            score: breakdown.priority,
            health,
            timestamp: Utc::now(),
            metrics: RunMetrics::new(&outcome, size),
            validation: ValidationSummary::from(&validation),
            paths: CardPaths::default(),
            tags: Tag::derive(&outcome, true, breakdown.priority, health, 80.0),
            generation_method: "test".to_string(),
            score_breakdown: breakdown,
        }
    }

    #[test]
    fn freshly_scored_cards_satisfy_every_invariant() {
        let cards = vec![make_card("a", "H2O"), make_card("b", "C7H5N3O6")];
        let violations = check_catalog(&cards, &Classifier::new(), &ScoringConfig::default());
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn out_of_range_scores_are_reported_not_clamped() {
        let mut card = make_card("a", "H2O");
        card.score = 140.0;
        let violations = check_catalog(std::slice::from_ref(&card), &Classifier::new(), &ScoringConfig::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, Invariant::ScoreBounded);
        assert_eq!(card.score, 140.0);
    }

    #[test]
    fn stale_labels_and_health_are_flagged() {
        let mut card = make_card("a", "C7H5N3O6");
        card.score_breakdown.classifications.clear();
        card.health = Health::Exploded;
        let violations = check_catalog(&[card], &Classifier::new(), &ScoringConfig::default());
        let kinds: Vec<Invariant> = violations.iter().map(|v| v.invariant).collect();
        assert_eq!(
            kinds,
            vec![Invariant::ClassificationConsistent, Invariant::HealthConsistent]
        );
    }

    #[test]
    fn labels_are_not_compared_when_classification_is_disabled() {
        let mut card = make_card("a", "C7H5N3O6");
        card.score_breakdown.classifications.clear();
        let config = ScoringConfig {
            use_classification: false,
            ..Default::default()
        };
        assert!(check_catalog(&[card], &Classifier::new(), &config).is_empty());
    }

    #[test]
    fn rescoring_with_the_same_config_changes_nothing() {
        let cards = vec![make_card("a", "H2O"), make_card("b", "C10H10Fe")];
        let report = rescore(&cards, &Classifier::new(), ScoringConfig::default());
        assert_eq!(report.total, 2);
        assert!(report.reclassified.is_empty());
        assert!(report.score_changes.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn rescoring_reports_reclassification_and_score_deltas() {
        let cards = vec![make_card("tnt", "C7H5N3O6")];
        let config = ScoringConfig {
            use_classification: false,
            weights: ScoringWeights {
                k_charge: 5.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let report = rescore(&cards, &Classifier::new(), config);
        assert_eq!(report.reclassified, vec!["tnt".to_string()]);
        assert_eq!(report.score_changes.len(), 1);
        assert!(report.score_changes[0].delta() < 0.0);
    }
}
