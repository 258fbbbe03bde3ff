use crate::cli::{ConfigArgs, HealthArg, ScoreArgs};
use crate::config::{CommandOverrides, build_config};
use crate::data::DataManager;
use crate::error::{CliError, Result};
use mesoatlas::core::classification::Classifier;
use mesoatlas::core::models::composition::Composition;
use mesoatlas::core::models::health::Health;
use mesoatlas::core::scoring::{ScoreInput, Scorer};
use mesoatlas::engine::error::EngineError;
use tracing::info;

impl From<HealthArg> for Health {
    fn from(arg: HealthArg) -> Self {
        match arg {
            HealthArg::Converged => Health::Converged,
            HealthArg::Bounded => Health::Bounded,
            HealthArg::Exploded => Health::Exploded,
            HealthArg::Invalid => Health::Invalid,
        }
    }
}

pub async fn run(args: ScoreArgs, config_args: &ConfigArgs) -> Result<()> {
    let data_manager = DataManager::new()?;
    let app = build_config(config_args, &CommandOverrides::default(), &data_manager)?;

    let composition = Composition::from_formula(&args.formula).map_err(EngineError::from)?;
    let classifier = Classifier::new();
    let scorer = Scorer::new(&classifier, app.core_config.scoring);
    let breakdown = scorer
        .score(&ScoreInput {
            atom_count: composition.total_atoms(),
            composition: &composition,
            total_charge: args.charge,
            health: args.health.into(),
            converged: args.converged,
            bounded: args.bounded,
            has_long_range: args.long_range || app.core_config.catalog.has_long_range(),
        })
        .map_err(EngineError::from)?;
    info!(formula = %composition.formula(), priority = breakdown.priority, "Scored composition");

    if args.json {
        let json = serde_json::to_string_pretty(&breakdown).map_err(|e| CliError::Other(e.into()))?;
        println!("{json}");
        return Ok(());
    }

    println!("{}  priority {:.2}", composition.formula(), breakdown.priority);
    println!("  size       wN = {:.4}", breakdown.w_n);
    println!("  charge     wQ = {:.4}", breakdown.w_q);
    println!("  metals     wM = {:.4}", breakdown.w_m);
    println!("  diversity  wD = {:.4}", breakdown.w_d);
    println!("  stability  wS = {:.4}", breakdown.w_s);
    println!("  classes    wC = {:.4}", breakdown.w_c);
    println!("  cost          = {:.4}", breakdown.cost);
    println!("  value         = {:.4}", breakdown.value);
    if !breakdown.classifications.is_empty() {
        let labels: Vec<&str> = breakdown.classifications.iter().map(|l| l.as_str()).collect();
        println!("  labels: {}", labels.join(", "));
    }
    Ok(())
}
