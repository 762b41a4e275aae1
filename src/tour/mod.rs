//! Guided walkthroughs
//!
//! Definitions are authored as ordered step lists (optionally built from
//! fragments), registered into a [`Registry`], and executed by a [`Runner`]
//! against a host UI reached through the traits in [`host`].

pub mod catalog;
pub mod context;
pub mod definition;
pub mod fragment;
pub mod host;
pub mod registry;
pub mod runner;

pub use catalog::Catalog;
pub use context::{Edition, EligibilityContext, Platform};
pub use definition::{
    Action, Fragment, FragmentRef, Position, Step, StepEntry, Walkthrough, WalkthroughDefinition,
};
pub use fragment::FragmentLibrary;
pub use host::{
    ActionDispatch, ActionHandler, Element, HandlerTable, Host, IdentityTranslator, Translator,
    UiQuery,
};
pub use registry::Registry;
pub use runner::{
    CancelToken, RunOutcome, RunReport, RunSettings, RunState, Runner, StepRecord, StepStatus,
};
