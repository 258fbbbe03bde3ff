use crate::cli::ClassifyArgs;
use crate::error::Result;
use mesoatlas::core::classification::Classifier;
use mesoatlas::core::models::composition::Composition;
use mesoatlas::engine::error::EngineError;
use tracing::info;

pub async fn run(args: ClassifyArgs) -> Result<()> {
    let composition = Composition::from_formula(&args.formula).map_err(EngineError::from)?;
    let classifications = Classifier::new().classify(&composition);
    info!(
        formula = %composition.formula(),
        matches = classifications.len(),
        "Classified composition"
    );

    println!(
        "{} ({} atoms, {} elements)",
        composition.formula(),
        composition.total_atoms(),
        composition.unique_elements()
    );
    if classifications.is_empty() {
        println!("  No classification rules matched.");
        return Ok(());
    }
    for c in &classifications {
        println!(
            "  {:<22} confidence {:.2}  bonus {:+.2}  {}",
            c.label.as_str(),
            c.confidence,
            c.bonus,
            c.reason
        );
    }
    Ok(())
}
