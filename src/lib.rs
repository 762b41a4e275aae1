//! walkthrough - a step-driven guided walkthrough runner
//!
//! Walkthroughs are ordered lists of steps. Each step waits for a UI element
//! to appear, performs an input on it, and hands control back to the host UI
//! before the next step. This library provides the data model, fragment
//! expansion, the registry, the runner, and a scripted host for dry runs.

pub mod cli;
pub mod commands;
pub mod common;
pub mod sim;
pub mod tour;

// Re-export commonly used types for tests
pub use common::{Error, Result, StepFailure};
pub use tour::{Registry, RunOutcome, RunReport, Runner, Walkthrough, WalkthroughDefinition};
