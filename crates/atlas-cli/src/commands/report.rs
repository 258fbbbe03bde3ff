use crate::cli::{ConfigArgs, ReportArgs};
use crate::config::{CommandOverrides, build_config};
use crate::data::DataManager;
use crate::error::Result;
use mesoatlas::engine::catalog::Catalog;
use mesoatlas::engine::error::EngineError;
use std::fs::File;
use std::io::BufWriter;
use tracing::info;

pub async fn run(args: ReportArgs, config_args: &ConfigArgs) -> Result<()> {
    let data_manager = DataManager::new()?;
    let app = build_config(config_args, &CommandOverrides::default(), &data_manager)?;
    let catalog = Catalog::open(app.core_config.catalog.clone()).map_err(EngineError::from)?;
    info!(cards = catalog.len(), root = %app.root.display(), "Opened catalog");

    print!("{}", catalog.report());

    let top = catalog.top_by_score(args.top);
    if !top.is_empty() {
        println!("\nTop {} by score:", top.len());
        for card in top {
            println!(
                "  {:>6.2}  {:<14} {:<10} {}  [{}]",
                card.score,
                card.formula,
                card.health.as_str(),
                card.run_id,
                card.tag_list()
            );
        }
    }

    if let Some(path) = &args.csv {
        let writer = BufWriter::new(File::create(path)?);
        catalog.export_csv(writer).map_err(EngineError::from)?;
        println!("\nExported {} card(s) to {}", catalog.len(), path.display());
    }
    Ok(())
}
