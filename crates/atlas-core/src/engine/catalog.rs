//! Append-only catalog of run cards and discovery records.
//!
//! On disk the catalog is three things: one immutable directory per run, a discovery
//! log, and a cards index. A run is committed in that order, each file replaced
//! atomically, so a crash leaves at worst an orphaned run directory or a discovery
//! entry without a card. The latter is hidden on load.

use super::card::{
    self, CardPaths, Domain, MetricsFile, RunCard, RunMetrics, Tag, LOG_FILE, METRICS_FILE,
    STRUCTURE_FILE, SUMMARY_FILE,
};
use super::config::CatalogConfig;
use super::storage;
use super::validation::{ValidationResult, ValidationStatus, ValidationSummary};
use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::{StructureError, XyzFile};
use crate::core::models::composition::Composition;
use crate::core::models::health::Health;
use crate::core::models::outcome::SimulationOutcome;
use crate::core::models::structure::Structure;
use crate::core::scoring::ScoreBreakdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const CATALOG_DIR: &str = "catalog";
pub const DISCOVERIES_DIR: &str = "discoveries";
pub const CARDS_INDEX_FILE: &str = "cards_index.json";
pub const DISCOVERY_LOG_FILE: &str = "discovery_catalog.json";

const RUN_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write structure file: {0}")]
    Structure(#[from] StructureError),
    #[error("Failed to export CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Could not allocate a fresh run directory after {0} attempts")]
    RunIdExhausted(usize),
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> CatalogError + '_ {
    move |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub run_id: String,
    pub formula: String,
    pub composition: Composition,
    pub generation_method: String,
    pub energy: f64,
    pub max_force: f64,
    pub converged: bool,
    pub stable: bool,
    pub health: Health,
    pub score: f64,
    pub database_validated: bool,
    pub is_novel: bool,
    pub confidence: f64,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct RunSubmission<'a> {
    pub composition: &'a Composition,
    pub outcome: &'a SimulationOutcome,
    pub breakdown: &'a ScoreBreakdown,
    pub validation: &'a ValidationResult,
    pub structure: &'a Structure,
    pub diagnostics: &'a str,
    pub generation_method: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogSummary {
    pub discoveries: usize,
    pub cards: usize,
    pub known: usize,
    pub novel: usize,
    pub stable: usize,
}

pub struct Catalog {
    config: CatalogConfig,
    discoveries: Vec<DiscoveryRecord>,
    cards: Vec<RunCard>,
}

impl Catalog {
    /// Opens the catalog under `config.root`, creating its directories if needed and
    /// rebuilding the in-memory collections from disk.
    pub fn open(config: CatalogConfig) -> Result<Self, CatalogError> {
        let catalog_dir = config.root.join(CATALOG_DIR);
        let discoveries_dir = config.root.join(DISCOVERIES_DIR);
        fs::create_dir_all(&catalog_dir).map_err(io_at(&catalog_dir))?;
        fs::create_dir_all(&discoveries_dir).map_err(io_at(&discoveries_dir))?;

        let index_path = catalog_dir.join(CARDS_INDEX_FILE);
        let cards: Vec<RunCard> = storage::read_json(&index_path)
            .map_err(io_at(&index_path))?
            .unwrap_or_default();

        let log_path = discoveries_dir.join(DISCOVERY_LOG_FILE);
        let logged: Vec<DiscoveryRecord> = storage::read_json(&log_path)
            .map_err(io_at(&log_path))?
            .unwrap_or_default();

        let indexed: HashSet<&str> = cards.iter().map(|c| c.run_id.as_str()).collect();
        let (discoveries, orphans): (Vec<_>, Vec<_>) = logged
            .into_iter()
            .partition(|d| indexed.contains(d.run_id.as_str()));
        for orphan in &orphans {
            warn!(run_id = %orphan.run_id, "Hiding discovery entry without an indexed card");
        }

        info!(
            cards = cards.len(),
            discoveries = discoveries.len(),
            root = %config.root.display(),
            "Opened catalog"
        );
        Ok(Self {
            config,
            discoveries,
            cards,
        })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.config.root.join(CATALOG_DIR)
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.catalog_dir().join(run_id)
    }

    fn index_path(&self) -> PathBuf {
        self.catalog_dir().join(CARDS_INDEX_FILE)
    }

    fn log_path(&self) -> PathBuf {
        self.config.root.join(DISCOVERIES_DIR).join(DISCOVERY_LOG_FILE)
    }

    pub fn cards(&self) -> &[RunCard] {
        &self.cards
    }

    pub fn discoveries(&self) -> &[DiscoveryRecord] {
        &self.discoveries
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, run_id: &str) -> Option<&RunCard> {
        self.cards.iter().find(|c| c.run_id == run_id)
    }

    /// Commits one run and returns its card. The card is durable and indexed when this
    /// returns `Ok`.
    pub fn record(&mut self, submission: RunSubmission<'_>) -> Result<RunCard, CatalogError> {
        let timestamp = Utc::now();
        let (run_id, run_dir) = self.allocate_run_dir(timestamp)?;

        let composition = submission.composition;
        let formula = composition.formula();
        let size = composition.total_atoms();
        let domain = Domain::infer(composition);
        let health = Health::determine(submission.outcome);
        let score = submission.breakdown.priority;
        let metrics = RunMetrics::new(submission.outcome, size);

        let card = RunCard {
            run_id: run_id.clone(),
            title: card::card_title(&formula, domain),
            formula: formula.clone(),
            composition: composition.clone(),
            domain,
            size,
            model: self.config.model.clone(),
            score,
            health,
            timestamp,
            metrics: metrics.clone(),
            validation: ValidationSummary::from(submission.validation),
            paths: CardPaths::default(),
            tags: Tag::derive(
                submission.outcome,
                submission.validation.is_novel,
                score,
                health,
                self.config.high_priority_threshold,
            ),
            generation_method: submission.generation_method.to_string(),
            score_breakdown: submission.breakdown.clone(),
        };

        write_artifacts(&run_dir, &card, metrics, &submission)?;

        let discovery = DiscoveryRecord {
            run_id: run_id.clone(),
            formula,
            composition: composition.clone(),
            generation_method: card.generation_method.clone(),
            energy: submission.outcome.energy,
            max_force: submission.outcome.max_force,
            converged: submission.outcome.converged,
            stable: submission.outcome.stable,
            health,
            score,
            database_validated: submission.validation.status != ValidationStatus::Unknown,
            is_novel: submission.validation.is_novel,
            confidence: submission.validation.confidence,
            notes: submission.validation.notes.clone(),
            timestamp,
        };

        self.discoveries.push(discovery);
        let log_path = self.log_path();
        if let Err(e) = storage::write_json_atomic(&log_path, &self.discoveries) {
            self.discoveries.pop();
            return Err(io_at(&log_path)(e));
        }

        self.cards.push(card.clone());
        let index_path = self.index_path();
        if let Err(e) = storage::write_json_atomic(&index_path, &self.cards) {
            self.cards.pop();
            self.discoveries.pop();
            return Err(io_at(&index_path)(e));
        }

        info!(run_id = %card.run_id, formula = %card.formula, score = card.score, health = %card.health, "Recorded run card");
        Ok(card)
    }

    fn allocate_run_dir(&self, timestamp: DateTime<Utc>) -> Result<(String, PathBuf), CatalogError> {
        let mut rng = rand::thread_rng();
        for _ in 0..RUN_ID_ATTEMPTS {
            let run_id = card::generate_run_id(timestamp, &mut rng);
            let dir = self.run_dir(&run_id);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((run_id, dir)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    warn!(%run_id, "Run directory already exists, drawing a new id");
                }
                Err(e) => return Err(io_at(&dir)(e)),
            }
        }
        Err(CatalogError::RunIdExhausted(RUN_ID_ATTEMPTS))
    }

    pub fn by_tag(&self, tag: Tag) -> Vec<&RunCard> {
        self.cards.iter().filter(|c| c.has_tag(tag)).collect()
    }

    pub fn by_domain(&self, domain: Domain) -> Vec<&RunCard> {
        self.cards.iter().filter(|c| c.domain == domain).collect()
    }

    pub fn by_health(&self, health: Health) -> Vec<&RunCard> {
        self.cards.iter().filter(|c| c.health == health).collect()
    }

    pub fn by_formula(&self, formula: &str) -> Vec<&RunCard> {
        self.cards.iter().filter(|c| c.formula == formula).collect()
    }

    /// Highest-scoring cards first; equal scores keep catalog order.
    pub fn top_by_score(&self, n: usize) -> Vec<&RunCard> {
        let mut ranked: Vec<&RunCard> = self.cards.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(n);
        ranked
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            discoveries: self.discoveries.len(),
            cards: self.cards.len(),
            known: self.discoveries.iter().filter(|d| !d.is_novel).count(),
            novel: self.discoveries.iter().filter(|d| d.is_novel).count(),
            stable: self.discoveries.iter().filter(|d| d.stable).count(),
        }
    }

    pub fn export_csv<W: Write>(&self, writer: W) -> Result<(), CatalogError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "run_id",
            "formula",
            "domain",
            "size",
            "score",
            "health",
            "tags",
            "generation_method",
            "timestamp",
        ])?;
        for card in &self.cards {
            csv.write_record([
                card.run_id.clone(),
                card.formula.clone(),
                card.domain.to_string(),
                card.size.to_string(),
                format!("{:.3}", card.score),
                card.health.to_string(),
                card.tag_list(),
                card.generation_method.clone(),
                card.timestamp.to_rfc3339(),
            ])?;
        }
        csv.flush().map_err(|e| io_at(&self.index_path())(e))?;
        Ok(())
    }

    pub fn report(&self) -> String {
        let summary = self.summary();
        let mut out = String::new();
        let rule = "=".repeat(60);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "  DISCOVERY CATALOG");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Total discoveries: {}", summary.discoveries);
        let _ = writeln!(out, "Known molecules:   {}", summary.known);
        let _ = writeln!(out, "Novel candidates:  {}", summary.novel);
        let _ = writeln!(out, "Stable molecules:  {}", summary.stable);

        if summary.novel > 0 {
            let _ = writeln!(out, "\nNovel discoveries:");
            for record in self.discoveries.iter().filter(|d| d.is_novel) {
                let _ = writeln!(out, "  {} ({})", record.formula, record.run_id);
                let _ = writeln!(out, "    Energy: {:.2} kcal/mol", record.energy);
                let _ = writeln!(out, "    Method: {}", record.generation_method);
                let _ = writeln!(out, "    Notes:  {}", record.notes);
            }
        }

        let known_stable: Vec<&DiscoveryRecord> = self
            .discoveries
            .iter()
            .filter(|d| !d.is_novel && d.stable)
            .collect();
        if !known_stable.is_empty() {
            let _ = writeln!(out, "\nKnown stable molecules:");
            for record in known_stable {
                let _ = writeln!(out, "  {}: {}", record.formula, record.notes);
            }
        }
        out
    }
}

fn write_artifacts(
    run_dir: &Path,
    card: &RunCard,
    metrics: RunMetrics,
    submission: &RunSubmission<'_>,
) -> Result<(), CatalogError> {
    XyzFile::write_to_path(submission.structure, run_dir.join(STRUCTURE_FILE))?;

    let summary_path = run_dir.join(SUMMARY_FILE);
    storage::write_json_atomic(&summary_path, card).map_err(io_at(&summary_path))?;

    let metrics_path = run_dir.join(METRICS_FILE);
    let metrics_file = MetricsFile {
        metrics,
        score_breakdown: submission.breakdown.clone(),
    };
    storage::write_json_atomic(&metrics_path, &metrics_file).map_err(io_at(&metrics_path))?;

    let log_path = run_dir.join(LOG_FILE);
    storage::write_atomic(&log_path, submission.diagnostics.as_bytes()).map_err(io_at(&log_path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classification::Classifier;
    use crate::core::models::structure::StructureAtom;
    use crate::core::scoring::{ScoreInput, Scorer, ScoringConfig};
    use crate::engine::validation::{LookupResponse, Validator};
    use nalgebra::Point3;

    struct Fixture {
        composition: Composition,
        outcome: SimulationOutcome,
        breakdown: ScoreBreakdown,
        validation: ValidationResult,
        structure: Structure,
    }

    fn fixture(formula: &str, outcome: SimulationOutcome, response: LookupResponse) -> Fixture {
        let composition = Composition::from_formula(formula).unwrap();
        let classifier = Classifier::new();
        let scorer = Scorer::new(&classifier, ScoringConfig::default());
        let health = Health::determine(&outcome);
        let breakdown = scorer
            .score(&ScoreInput {
                atom_count: composition.total_atoms(),
                composition: &composition,
                total_charge: 0.0,
                health,
                converged: outcome.converged,
                bounded: outcome.stable,
                has_long_range: true,
            })
            .unwrap();
        let validation = Validator::new().validate(formula, outcome.stable, &response);
        let atoms = composition
            .iter()
            .flat_map(|(symbol, count)| std::iter::repeat_n(symbol, count as usize))
            .enumerate()
            .map(|(i, symbol)| StructureAtom::new(symbol, Point3::new(i as f64, 0.0, 0.0)))
            .collect();
        Fixture {
            composition,
            outcome,
            breakdown,
            validation,
            structure: Structure::new(formula, atoms),
        }
    }

    fn converged() -> SimulationOutcome {
        SimulationOutcome {
            energy: -12.5,
            max_force: 0.001,
            converged: true,
            stable: true,
            ..Default::default()
        }
    }

    fn submit<'a>(f: &'a Fixture, method: &'a str) -> RunSubmission<'a> {
        RunSubmission {
            composition: &f.composition,
            outcome: &f.outcome,
            breakdown: &f.breakdown,
            validation: &f.validation,
            structure: &f.structure,
            diagnostics: "Final energy: -12.5\nMax force: 0.001\nConverged: yes\n",
            generation_method: method,
        }
    }

    #[test]
    fn record_writes_artifacts_and_both_collections() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let f = fixture("H2O", converged(), LookupResponse::NotFound);

        let card = catalog.record(submit(&f, "test")).unwrap();

        let run_dir = catalog.run_dir(&card.run_id);
        for name in [STRUCTURE_FILE, SUMMARY_FILE, METRICS_FILE, LOG_FILE] {
            assert!(run_dir.join(name).exists(), "missing {name}");
        }
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.discoveries().len(), 1);
        assert_eq!(catalog.discoveries()[0].run_id, card.run_id);

        assert_eq!(card.health, Health::Converged);
        assert_eq!(card.domain, Domain::Molecule);
        assert_eq!(card.title, "H2O@molecule");
        assert_eq!(card.size, 3);
        assert!(card.has_tag(Tag::Stable));
        assert!(card.has_tag(Tag::Converged));
        assert!(card.has_tag(Tag::Novel));
    }

    #[test]
    fn summary_file_round_trips_to_the_same_card() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let f = fixture("C10H10Fe", converged(), LookupResponse::NotFound);
        let card = catalog.record(submit(&f, "random")).unwrap();

        let summary_path = catalog.run_dir(&card.run_id).join(SUMMARY_FILE);
        let reloaded: RunCard = storage::read_json(&summary_path).unwrap().unwrap();
        assert_eq!(reloaded, card);

        let metrics_path = catalog.run_dir(&card.run_id).join(METRICS_FILE);
        let metrics: MetricsFile = storage::read_json(&metrics_path).unwrap().unwrap();
        assert_eq!(metrics.metrics, card.metrics);
        assert_eq!(metrics.score_breakdown, card.score_breakdown);
    }

    #[test]
    fn reopening_rebuilds_the_catalog_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let first = {
            let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
            let f = fixture("H2O", converged(), LookupResponse::NotFound);
            let a = catalog.record(submit(&f, "test")).unwrap();
            let g = fixture("CH4", converged(), LookupResponse::NotFound);
            catalog.record(submit(&g, "test")).unwrap();
            a
        };

        let reopened = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.discoveries().len(), 2);
        assert_eq!(reopened.get(&first.run_id), Some(&first));
    }

    #[test]
    fn run_ids_are_unique_across_rapid_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let f = fixture("H2O", converged(), LookupResponse::NotFound);
        let ids: HashSet<String> = (0..20)
            .map(|_| catalog.record(submit(&f, "test")).unwrap().run_id)
            .collect();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn discovery_entries_without_a_card_are_hidden_on_load() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
            let f = fixture("H2O", converged(), LookupResponse::NotFound);
            catalog.record(submit(&f, "test")).unwrap();
        }

        let log_path = dir.path().join(DISCOVERIES_DIR).join(DISCOVERY_LOG_FILE);
        let mut logged: Vec<DiscoveryRecord> = storage::read_json(&log_path).unwrap().unwrap();
        let mut orphan = logged[0].clone();
        orphan.run_id = "run_orphan".to_string();
        logged.push(orphan);
        storage::write_json_atomic(&log_path, &logged).unwrap();

        let reopened = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        assert_eq!(reopened.discoveries().len(), 1);
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn queries_filter_and_rank_cards() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();

        let water = fixture("H2O", converged(), LookupResponse::NotFound);
        let exploded = SimulationOutcome {
            energy: 5e6,
            max_force: 50.0,
            ..Default::default()
        };
        let argon = fixture("Ar3", exploded, LookupResponse::Found(Vec::new()));
        let ferrocene = fixture("C10H10Fe", converged(), LookupResponse::NotFound);

        catalog.record(submit(&water, "test")).unwrap();
        catalog.record(submit(&argon, "test")).unwrap();
        catalog.record(submit(&ferrocene, "test")).unwrap();

        assert_eq!(catalog.by_domain(Domain::Cluster).len(), 1);
        assert_eq!(catalog.by_health(Health::Exploded).len(), 1);
        assert_eq!(catalog.by_tag(Tag::Converged).len(), 2);
        assert_eq!(catalog.by_formula("H2O").len(), 1);

        let top = catalog.top_by_score(2);
        assert_eq!(top.len(), 2);
        assert!(top[0].score >= top[1].score);
        assert_eq!(top[0].formula, "H2O");

        let summary = catalog.summary();
        assert_eq!(summary.cards, 3);
        assert_eq!(summary.novel, 3);
        assert_eq!(summary.stable, 2);
    }

    #[test]
    fn csv_export_has_a_header_and_one_row_per_card() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let f = fixture("H2O", converged(), LookupResponse::NotFound);
        let card = catalog.record(submit(&f, "test")).unwrap();

        let mut buffer = Vec::new();
        catalog.export_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("run_id,formula,domain"));
        assert!(lines[1].starts_with(&card.run_id));
        assert!(lines[1].contains("stable;novel;converged"));
    }

    #[test]
    fn report_lists_novel_and_known_stable_molecules() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(CatalogConfig::new(dir.path())).unwrap();
        let novel = fixture("XeF8", converged(), LookupResponse::NotFound);
        let known_record = crate::engine::validation::CompoundRecord {
            formula: "H2O".to_string(),
            name: "oxidane".to_string(),
            cid: Some(962),
            molecular_weight: None,
            smiles: None,
            inchi: None,
        };
        let known = fixture("H2O", converged(), LookupResponse::Found(vec![known_record]));
        catalog.record(submit(&novel, "test")).unwrap();
        catalog.record(submit(&known, "test")).unwrap();

        let report = catalog.report();
        assert!(report.contains("Total discoveries: 2"));
        assert!(report.contains("Novel discoveries:"));
        assert!(report.contains("F8Xe"));
        assert!(report.contains("H2O: Matches known molecule: oxidane"));
    }
}
