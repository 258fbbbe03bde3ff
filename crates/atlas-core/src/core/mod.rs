//! # Core Module
//!
//! Stateless building blocks of the pipeline. Nothing in this module owns persisted
//! state; every function is deterministic in its inputs and the configuration handed
//! to it at construction.
//!
//! - **Molecular Description** ([`models`]) - Compositions, element tables, health bands
//!   and the scalar outcome of one simulation
//! - **Classification** ([`classification`]) - Rule-based domain categories with score bonuses
//! - **Scoring** ([`scoring`]) - The multi-factor priority score with a full breakdown
//! - **File I/O** ([`io`]) - XYZ structure files and engine diagnostics text

pub mod classification;
pub mod io;
pub mod models;
pub mod scoring;
