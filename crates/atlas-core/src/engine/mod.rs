//! # Engine Module
//!
//! Stateful services of the analytic loop and their configuration.
//!
//! ## Overview
//!
//! Where [`crate::core`] holds pure functions over compositions and outcomes, the engine
//! owns everything that persists or accumulates across runs: the run-card catalog, the
//! coverage grid, the compound lookup cache, and the failure log of a batch.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Scoring, grid, catalog and simulation settings with a builder
//! - **Run Cards** ([`card`]) - Immutable per-run records, tags, domains and run ids
//! - **Catalog** ([`catalog`]) - Append-only on-disk store of cards and discovery records
//! - **Coverage** ([`coverage`]) - Parameter-space grid statistics, gaps and run scheduling
//! - **Validation** ([`validation`]) - Lookup cache and the known/novel verdict
//! - **Simulation** ([`simulation`]) - Invocation contract with the external engine
//! - **Failures** ([`failure`]) - Failure bucketing and the batch failure report
//! - **Consistency** ([`consistency`]) - Invariant checks and rescoring comparisons
//! - **Storage** ([`storage`]) - Atomic file replacement shared by every writer
//! - **Progress Monitoring** ([`progress`]) - Progress events for front ends
//! - **Error Handling** ([`error`]) - The aggregate error used by workflows

pub mod card;
pub mod catalog;
pub mod config;
pub mod consistency;
pub mod coverage;
pub mod error;
pub mod failure;
pub mod progress;
pub mod simulation;
pub mod storage;
pub mod validation;
