// src/exec/mod.rs

//! Process execution for the host binary.
//!
//! The orchestrator itself never runs anything; the `depwatch` binary uses
//! [`command::run_build`] as its builder, bracketing each run with
//! `build_started` / `build_finished`.

pub mod command;

pub use command::run_build;
