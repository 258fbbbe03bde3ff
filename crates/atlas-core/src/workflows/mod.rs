//! # Workflows Module
//!
//! End-to-end procedures built from the [`crate::core`] functions and
//! [`crate::engine`] services. These are the entry points front ends call.
//!
//! - **Discovery** ([`discover`]) - Structure and diagnostics of one finished simulation
//!   to a scored, validated and cataloged run card.
//! - **Gap Filling** ([`gap_fill`]) - Planning a batch from the coverage grid and folding
//!   each finished run back into the grid, the failure log and the catalog.
//!
//! Workflows are synchronous. Running simulations concurrently is left to the caller,
//! which serializes access to the shared grid and catalog.

pub mod discover;
pub mod gap_fill;
