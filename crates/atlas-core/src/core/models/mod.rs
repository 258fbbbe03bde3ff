//! # Core Models Module
//!
//! Data structures describing what a simulation was run on and what came out of it.
//!
//! ## Key Components
//!
//! - [`composition`] - Element-to-count multiset with derived formula and atom counts
//! - [`elements`] - Static element tables (metals, superalloy metals, noble gases, ...)
//! - [`health`] - The four mutually exclusive outcome bands of a simulation
//! - [`outcome`] - Scalar results reported by the engine (energy, max force, flags)
//! - [`structure`] - Atom positions of a final geometry

pub mod composition;
pub mod elements;
pub mod health;
pub mod outcome;
pub mod structure;
