use crate::cli::{ConfigArgs, RecordArgs};
use crate::config::defaults::DefaultsConfig;
use crate::config::{CommandOverrides, build_config};
use crate::data::DataManager;
use crate::error::{CliError, Result};
use crate::lookup::{self, CompoundClient};
use crate::utils::progress::CliProgressHandler;
use mesoatlas::core::classification::Classifier;
use mesoatlas::core::io::traits::StructureFile;
use mesoatlas::core::io::xyz::XyzFile;
use mesoatlas::engine::catalog::Catalog;
use mesoatlas::engine::error::EngineError;
use mesoatlas::engine::progress::ProgressReporter;
use mesoatlas::engine::validation::LookupCache;
use mesoatlas::workflows::discover::{self, DiscoveryInput};
use tracing::{info, warn};

pub async fn run(args: RecordArgs, config_args: &ConfigArgs) -> Result<()> {
    let data_manager = DataManager::new()?;
    let app = build_config(config_args, &CommandOverrides::default(), &data_manager)?;

    info!("Loading structure from {:?}", &args.structure);
    let structure =
        XyzFile::read_from_path(&args.structure).map_err(|e| CliError::FileParsing {
            path: args.structure.clone(),
            source: e.into(),
        })?;
    let diagnostics = match &args.diagnostics {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            warn!("No diagnostics given; energy and forces default to zero.");
            String::new()
        }
    };
    let formula = structure.composition().map_err(EngineError::from)?.formula();

    let mut cache = LookupCache::load(&lookup::cache_dir(&app.root))?;
    let client = if args.offline {
        None
    } else {
        Some(CompoundClient::new()?)
    };
    let lookup = lookup::resolve(&mut cache, client.as_ref(), &formula).await;
    cache.flush()?;

    let mut catalog = Catalog::open(app.core_config.catalog.clone()).map_err(EngineError::from)?;
    let method = args
        .method
        .unwrap_or_else(|| DefaultsConfig::default().generation_method);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let result = tokio::task::block_in_place(|| {
        discover::run(
            &mut catalog,
            &Classifier::new(),
            &app.core_config.scoring,
            DiscoveryInput {
                structure: &structure,
                diagnostics: &diagnostics,
                lookup: &lookup,
                generation_method: &method,
                requested_formula: None,
            },
            &reporter,
        )
    })?;

    let card = &result.card;
    println!("Recorded {} as {}", card.formula, card.run_id);
    println!("  health:     {}", card.health.as_str());
    println!("  score:      {:.2}", card.score);
    println!("  validation: {}", result.validation.status);
    println!("  tags:       {}", card.tag_list());
    println!("  card:       {}", catalog.run_dir(&card.run_id).display());
    Ok(())
}
