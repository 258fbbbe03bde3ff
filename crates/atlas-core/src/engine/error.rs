use thiserror::Error;

use super::catalog::CatalogError;
use super::config::ConfigError;
use super::coverage::CoverageError;
use crate::core::io::xyz::StructureError;
use crate::core::models::composition::CompositionError;
use crate::core::scoring::ScoringError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid composition: {source}")]
    Composition {
        #[from]
        source: CompositionError,
    },

    #[error("Scoring failed: {source}")]
    Scoring {
        #[from]
        source: ScoringError,
    },

    #[error("Structure file error: {source}")]
    Structure {
        #[from]
        source: StructureError,
    },

    #[error("Catalog error: {source}")]
    Catalog {
        #[from]
        source: CatalogError,
    },

    #[error("Coverage grid error: {source}")]
    Coverage {
        #[from]
        source: CoverageError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Structure has {structure} atoms but the composition declares {composition}")]
    AtomCountMismatch { structure: usize, composition: u32 },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
