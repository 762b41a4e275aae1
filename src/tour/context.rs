//! Eligibility context: where, on which edition and on which device class a
//! walkthrough is about to run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Product edition of the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edition {
    #[default]
    Community,
    Enterprise,
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edition::Community => write!(f, "community"),
            Edition::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl FromStr for Edition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "community" => Ok(Edition::Community),
            "enterprise" => Ok(Edition::Enterprise),
            other => Err(format!(
                "unknown edition '{}' (expected 'community' or 'enterprise')",
                other
            )),
        }
    }
}

/// Device class the UI is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Desktop,
    Mobile,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Desktop => write!(f, "desktop"),
            Platform::Mobile => write!(f, "mobile"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Platform::Desktop),
            "mobile" => Ok(Platform::Mobile),
            other => Err(format!(
                "unknown platform '{}' (expected 'desktop' or 'mobile')",
                other
            )),
        }
    }
}

/// The {url, edition, platform} triple used to select walkthroughs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EligibilityContext {
    pub url: String,
    #[serde(default)]
    pub edition: Edition,
    #[serde(default)]
    pub platform: Platform,
}

impl EligibilityContext {
    pub fn new(url: impl Into<String>, edition: Edition, platform: Platform) -> Self {
        Self {
            url: url.into(),
            edition,
            platform,
        }
    }

    /// Check an optional edition/platform filter pair against this context
    pub fn accepts(&self, edition: Option<Edition>, platform: Option<Platform>) -> bool {
        edition.map_or(true, |e| e == self.edition)
            && platform.map_or(true, |p| p == self.platform)
    }

    /// Check whether `prefix` activates on this context's url
    ///
    /// An empty prefix matches everything. Query strings and fragments of the
    /// context url are ignored, and the prefix must end on a path boundary.
    pub fn url_matches(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        let path = self
            .url
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or("");
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
            None => false,
        }
    }
}

impl fmt::Display for EligibilityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.url, self.edition, self.platform)
    }
}
