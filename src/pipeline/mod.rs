// src/pipeline/mod.rs

//! Stages the builder attaches to its own streams.
//!
//! - [`collect`] refreshes the module cache from the dependency walk.
//! - [`measure`] reports bytes written and elapsed time for the output.
//!
//! Neither stage alters what flows through it.

pub mod collect;
pub mod measure;

pub use collect::{CacheCollector, DepRow};
pub use measure::OutputMeter;
