use crate::core::classification::{Classification, Classifier};
use crate::core::io::diagnostics::parse_diagnostics;
use crate::core::models::composition::Composition;
use crate::core::models::health::Health;
use crate::core::models::outcome::SimulationOutcome;
use crate::core::models::structure::Structure;
use crate::core::scoring::{ScoreBreakdown, ScoreInput, Scorer, ScoringConfig};
use crate::engine::card::RunCard;
use crate::engine::catalog::{Catalog, RunSubmission};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::validation::{LookupResponse, ValidationResult, Validator};
use tracing::{debug, info, instrument};

/// One finished simulation awaiting analysis.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryInput<'a> {
    pub structure: &'a Structure,
    /// Raw diagnostics text printed by the engine.
    pub diagnostics: &'a str,
    /// Database answer for the structure's formula.
    pub lookup: &'a LookupResponse,
    pub generation_method: &'a str,
    /// Formula the engine was asked to build, when known. The structure must agree
    /// with it on atom count.
    pub requested_formula: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub card: RunCard,
    pub outcome: SimulationOutcome,
    pub classifications: Vec<Classification>,
    pub breakdown: ScoreBreakdown,
    pub validation: ValidationResult,
}

/// Turns a finished simulation into a cataloged run card: parse diagnostics,
/// classify and score, validate against the lookup answer, then commit.
#[instrument(skip_all, name = "discovery_workflow")]
pub fn run(
    catalog: &mut Catalog,
    classifier: &Classifier,
    scoring: &ScoringConfig,
    input: DiscoveryInput<'_>,
    reporter: &ProgressReporter,
) -> Result<DiscoveryResult, EngineError> {
    let composition = check_structure(input.structure, input.requested_formula)?;
    let formula = composition.formula();
    info!(%formula, atoms = input.structure.atom_count(), "Analyzing simulation result");

    let outcome = reporter.phase("Parsing Diagnostics", || parse_diagnostics(input.diagnostics));
    let health = Health::determine(&outcome);
    debug!(energy = outcome.energy, max_force = outcome.max_force, %health, "Parsed outcome");

    let (classifications, breakdown) = reporter.phase("Scoring", || {
        let classifications = classifier.classify(&composition);
        let scorer = Scorer::new(classifier, *scoring);
        let breakdown = scorer.score(&ScoreInput {
            atom_count: composition.total_atoms(),
            composition: &composition,
            total_charge: outcome.total_charge,
            health,
            converged: outcome.converged,
            bounded: outcome.stable,
            has_long_range: catalog.config().has_long_range(),
        });
        (classifications, breakdown)
    });
    let breakdown = breakdown?;

    let validation = reporter.phase("Validation", || {
        Validator::new().validate(&formula, outcome.stable, input.lookup)
    });

    let card = reporter.phase("Cataloging", || {
        catalog.record(RunSubmission {
            composition: &composition,
            outcome: &outcome,
            breakdown: &breakdown,
            validation: &validation,
            structure: input.structure,
            diagnostics: input.diagnostics,
            generation_method: input.generation_method,
        })
    })?;

    info!(
        run_id = %card.run_id,
        priority = breakdown.priority,
        status = %validation.status,
        "Discovery workflow complete"
    );
    Ok(DiscoveryResult {
        card,
        outcome,
        classifications,
        breakdown,
        validation,
    })
}

/// Derives the structure's composition and, when a formula was requested, checks that
/// the atom counts agree.
pub fn check_structure(
    structure: &Structure,
    requested_formula: Option<&str>,
) -> Result<Composition, EngineError> {
    let composition = structure.composition()?;
    if let Some(requested) = requested_formula {
        let requested = Composition::from_formula(requested)?;
        if structure.atom_count() != requested.total_atoms() as usize {
            return Err(EngineError::AtomCountMismatch {
                structure: structure.atom_count(),
                composition: requested.total_atoms(),
            });
        }
    }
    Ok(composition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::StructureAtom;
    use crate::engine::card::Tag;
    use crate::engine::config::CatalogConfig;
    use crate::engine::progress::Progress;
    use crate::engine::validation::{CompoundRecord, ValidationStatus};
    use nalgebra::Point3;
    use std::sync::Mutex;

    fn water() -> Structure {
        Structure::new(
            "water",
            vec![
                StructureAtom::new("O", Point3::new(0.0, 0.0, 0.0)),
                StructureAtom::new("H", Point3::new(0.96, 0.0, 0.0)),
                StructureAtom::new("H", Point3::new(-0.24, 0.93, 0.0)),
            ],
        )
    }

    const CONVERGED_LOG: &str = "Final energy: -14.2\nMax force: 0.004\nConverged: yes\n";

    fn input<'a>(structure: &'a Structure, lookup: &'a LookupResponse) -> DiscoveryInput<'a> {
        DiscoveryInput {
            structure,
            diagnostics: CONVERGED_LOG,
            lookup,
            generation_method: "manual",
            requested_formula: None,
        }
    }

    #[test]
    fn converged_unknown_molecule_becomes_a_novel_stable_card() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let structure = water();
        let lookup = LookupResponse::NotFound;

        let result = run(
            &mut catalog,
            &Classifier::new(),
            &ScoringConfig::default(),
            input(&structure, &lookup),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.card.formula, "H2O");
        assert_eq!(result.card.health, Health::Converged);
        assert_eq!(result.breakdown.w_s, 1.0);
        assert_eq!(result.breakdown.w_c, 1.0);
        assert!(result.classifications.is_empty());
        assert!(result.card.has_tag(Tag::Stable));
        assert!(result.card.has_tag(Tag::Converged));
        assert!(result.card.has_tag(Tag::Novel));
        assert_eq!(catalog.len(), 1);
        assert!(catalog.discoveries()[0].database_validated);
    }

    #[test]
    fn failed_lookup_leaves_the_discovery_unvalidated() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let structure = water();
        let lookup = LookupResponse::Error("database returned 503".to_string());

        let result = run(
            &mut catalog,
            &Classifier::new(),
            &ScoringConfig::default(),
            input(&structure, &lookup),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.validation.status, ValidationStatus::Unknown);
        assert!(!result.card.has_tag(Tag::Novel));
        assert!(!catalog.discoveries()[0].database_validated);
    }

    #[test]
    fn known_molecule_is_validated_but_not_novel() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let structure = water();
        let lookup = LookupResponse::Found(vec![CompoundRecord {
            formula: "H2O".to_string(),
            name: "oxidane".to_string(),
            cid: Some(962),
            molecular_weight: Some(18.015),
            smiles: None,
            inchi: None,
        }]);

        let result = run(
            &mut catalog,
            &Classifier::new(),
            &ScoringConfig::default(),
            input(&structure, &lookup),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.validation.status, ValidationStatus::Known);
        assert!(!result.card.has_tag(Tag::Novel));
        assert!(catalog.discoveries()[0].database_validated);
    }

    #[test]
    fn requested_formula_must_match_the_structure_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let structure = water();
        let lookup = LookupResponse::NotFound;
        let mut discovery = input(&structure, &lookup);
        discovery.requested_formula = Some("CH4");

        let err = run(
            &mut catalog,
            &Classifier::new(),
            &ScoringConfig::default(),
            discovery,
            &ProgressReporter::new(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            EngineError::AtomCountMismatch {
                structure: 3,
                composition: 5
            }
        ));
        assert!(catalog.is_empty());
    }

    #[test]
    fn empty_structures_are_rejected_before_scoring() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let structure = Structure::new("empty", Vec::new());
        let lookup = LookupResponse::NotFound;

        let err = run(
            &mut catalog,
            &Classifier::new(),
            &ScoringConfig::default(),
            input(&structure, &lookup),
            &ProgressReporter::new(),
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::Composition { .. }));
    }

    #[test]
    fn workflow_reports_its_phases_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let structure = water();
        let lookup = LookupResponse::Error("offline".to_string());
        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                phases.lock().unwrap().push(name);
            }
        }));

        run(
            &mut catalog,
            &Classifier::new(),
            &ScoringConfig::default(),
            input(&structure, &lookup),
            &reporter,
        )
        .unwrap();
        drop(reporter);

        assert_eq!(
            phases.into_inner().unwrap(),
            vec!["Parsing Diagnostics", "Scoring", "Validation", "Cataloging"]
        );
    }
}
