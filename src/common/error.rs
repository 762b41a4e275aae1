//! Error types for the walkthrough runner
//!
//! `Error` covers loading, registration and host failures. Run outcomes carry
//! a [`StepFailure`] instead so a failed walkthrough is data, not an `Err`.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the walkthrough crate
#[derive(Error, Debug)]
pub enum Error {
    // === Registry Errors ===
    #[error("Walkthrough '{0}' is already registered")]
    DuplicateId(String),

    #[error("Fragment '{0}' is already registered")]
    DuplicateFragment(String),

    #[error("Walkthrough '{0}' not found. Use 'walkthrough list' to see registered walkthroughs")]
    WalkthroughNotFound(String),

    #[error("No walkthrough is eligible for url '{url}' ({edition}, {platform})")]
    NoEligibleWalkthrough {
        url: String,
        edition: String,
        platform: String,
    },

    // === Fragment Errors ===
    #[error("Unknown fragment '{name}' referenced from '{referenced_by}'")]
    UnknownFragment { name: String, referenced_by: String },

    #[error("Fragment '{fragment}': {message}")]
    FragmentArguments { fragment: String, message: String },

    #[error("Fragment cycle detected: {chain}")]
    CyclicFragment { chain: String },

    // === Run Errors ===
    #[error("Walkthrough '{id}' failed at step {step}: {reason}")]
    WalkthroughFailed {
        id: String,
        step: usize,
        reason: String,
    },

    #[error("Action failed: {0}")]
    Action(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to parse '{path}': {message}")]
    CatalogParse { path: String, message: String },

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an unknown fragment error
    pub fn unknown_fragment(name: &str, referenced_by: &str) -> Self {
        Self::UnknownFragment {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        }
    }

    /// Create a fragment argument error
    pub fn fragment_arguments(fragment: &str, message: impl Into<String>) -> Self {
        Self::FragmentArguments {
            fragment: fragment.to_string(),
            message: message.into(),
        }
    }

    /// Create a cyclic fragment error from the expansion stack
    pub fn cyclic_fragment<S: AsRef<str>>(stack: &[S], repeated: &str) -> Self {
        let mut chain: Vec<&str> = stack.iter().map(|s| s.as_ref()).collect();
        chain.push(repeated);
        Self::CyclicFragment {
            chain: chain.join(" -> "),
        }
    }

    /// Create a catalog parse error
    pub fn catalog_parse(path: &str, message: impl ToString) -> Self {
        Self::CatalogParse {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// Why a step ended a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    #[error("trigger '{trigger}' not found after {}ms", .waited.as_millis())]
    Timeout { trigger: String, waited: Duration },

    #[error("action failed: {0}")]
    Action(String),

    #[error("not eligible: {0}")]
    NotEligible(String),

    #[error("cancelled by caller")]
    Cancelled,
}

impl StepFailure {
    /// Stable machine-readable code, used in JSON reports
    pub fn code(&self) -> &'static str {
        match self {
            StepFailure::Timeout { .. } => "TIMEOUT",
            StepFailure::Action(_) => "ACTION_FAILED",
            StepFailure::NotEligible(_) => "NOT_ELIGIBLE",
            StepFailure::Cancelled => "CANCELLED",
        }
    }
}

impl From<Error> for StepFailure {
    fn from(e: Error) -> Self {
        match e {
            Error::Action(message) => StepFailure::Action(message),
            other => StepFailure::Action(other.to_string()),
        }
    }
}
