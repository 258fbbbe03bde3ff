//! # Mesoatlas Core Library
//!
//! The analytic control loop around a molecular-geometry simulation engine. Raw
//! simulation outcomes (compositions, energies, forces) are turned into prioritized,
//! cataloged, and coverage-aware experiment decisions.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Composition`, `Health`),
//!   the pure `Classifier` and `Scorer`, and structure/diagnostics I/O.
//!
//! - **[`engine`]: The Stateful Layer.** Owns every piece of mutable, persisted state:
//!   the append-only `Catalog` of run cards, the `CoverageGrid` over the simulation
//!   parameter space, the compound `LookupCache`, and the failure ledger. It also
//!   defines the invocation contract to the external simulation engine.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie the two layers
//!   together: cataloging a finished simulation, and planning/ingesting a batch of
//!   gap-filling runs.
//!
//! The simulation engine itself is an external collaborator; this crate never
//! computes physics, it only consumes outcomes.

pub mod core;
pub mod engine;
pub mod workflows;
