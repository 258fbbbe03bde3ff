//! Reading and writing of simulation artifacts.
//!
//! Structure files go through the [`traits::StructureFile`] interface; the engine's
//! free-text output is reduced to a [`SimulationOutcome`](crate::core::models::outcome::SimulationOutcome)
//! by [`diagnostics::parse_diagnostics`].

pub mod diagnostics;
pub mod traits;
pub mod xyz;
