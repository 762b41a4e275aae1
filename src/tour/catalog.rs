//! Walkthrough catalogs
//!
//! A catalog is a YAML document holding fragments and walkthrough
//! definitions. Loading it into a registry expands every walkthrough, so a
//! catalog that loads is a catalog whose references all resolve.

use serde::Deserialize;
use std::path::Path;

use super::definition::{Fragment, WalkthroughDefinition};
use super::fragment::FragmentLibrary;
use super::registry::Registry;
use crate::common::{Error, Result};

/// Fragments and walkthroughs read from one file
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    #[serde(default)]
    pub fragments: Vec<Fragment>,
    #[serde(default)]
    pub walkthroughs: Vec<WalkthroughDefinition>,
}

impl Catalog {
    /// Load a catalog from a YAML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::catalog_parse(&path.display().to_string(), e))
    }

    /// Parse a catalog from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::catalog_parse("<catalog>", e))
    }

    /// Register built-in fragments, then this catalog's fragments and walkthroughs
    pub fn into_registry(self) -> Result<Registry> {
        let mut registry = Registry::new(FragmentLibrary::with_builtins());
        for fragment in self.fragments {
            registry.register_fragment(fragment)?;
        }
        registry.fragments().check_all()?;
        for definition in self.walkthroughs {
            registry.register(definition)?;
        }
        tracing::debug!(
            walkthroughs = registry.len(),
            fragments = registry.fragments().len(),
            "Catalog loaded"
        );
        Ok(registry)
    }
}
