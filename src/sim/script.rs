//! UI script types
//!
//! A UI script describes a host UI well enough to run walkthroughs without a
//! browser: which selectors are rendered up front, and how the page reacts
//! to clicks and typed input.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::{Error, Result};

/// A scripted host UI loaded from YAML
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct UiScript {
    /// Page the UI starts on
    #[serde(default)]
    pub url: String,
    /// Selectors rendered before any action
    #[serde(default)]
    pub initial: Vec<String>,
    /// Translation catalog for step content
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    /// How the UI responds to dispatched actions
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

/// Kind of input a reaction listens for
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReactOn {
    Click,
    Input,
}

/// A UI change caused by an action on `target`
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Reaction {
    pub on: ReactOn,
    /// Selector the action must be dispatched on
    pub target: String,
    /// Selectors that become available
    #[serde(default)]
    pub reveal: Vec<String>,
    /// Selectors that disappear
    #[serde(default)]
    pub remove: Vec<String>,
    /// Render delay after the action, in milliseconds
    #[serde(default)]
    pub delay_ms: u64,
    /// Make the action raise this error instead of changing the UI
    #[serde(default)]
    pub fail: Option<String>,
}

impl Reaction {
    pub fn new(on: ReactOn, target: impl Into<String>) -> Self {
        Self {
            on,
            target: target.into(),
            reveal: Vec::new(),
            remove: Vec::new(),
            delay_ms: 0,
            fail: None,
        }
    }

    pub fn reveal(mut self, selector: impl Into<String>) -> Self {
        self.reveal.push(selector.into());
        self
    }

    pub fn remove(mut self, selector: impl Into<String>) -> Self {
        self.remove.push(selector.into());
        self
    }

    pub fn after_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.fail = Some(message.into());
        self
    }
}

impl UiScript {
    pub fn new<S: Into<String>>(url: impl Into<String>, initial: impl IntoIterator<Item = S>) -> Self {
        Self {
            url: url.into(),
            initial: initial.into_iter().map(Into::into).collect(),
            translations: BTreeMap::new(),
            reactions: Vec::new(),
        }
    }

    pub fn with_reaction(mut self, reaction: Reaction) -> Self {
        self.reactions.push(reaction);
        self
    }

    pub fn with_translation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.translations.insert(key.into(), value.into());
        self
    }

    /// Load a UI script from a YAML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::CatalogParse { message, .. } => {
                Error::catalog_parse(&path.display().to_string(), message)
            }
            other => other,
        })
    }

    /// Parse a UI script from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let script: Self =
            serde_yaml::from_str(content).map_err(|e| Error::catalog_parse("<ui script>", e))?;
        if let Some(reaction) = script.reactions.iter().find(|r| r.target.is_empty()) {
            return Err(Error::catalog_parse(
                "<ui script>",
                format!("reaction on {:?} has an empty target", reaction.on),
            ));
        }
        Ok(script)
    }

    /// Reactions for an action of kind `on` dispatched on `selector`
    pub fn reactions_for<'a>(&'a self, on: ReactOn, selector: &'a str) -> impl Iterator<Item = &'a Reaction> + 'a {
        self.reactions
            .iter()
            .filter(move |r| r.on == on && r.target == selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ui_script() {
        let yaml = r#"
url: /web
initial:
  - .o_menu_toggle
translations:
  Home menu: Menu chính
reactions:
  - on: click
    target: .o_menu_toggle
    reveal: [".o_app[data-menu-xmlid='connector.menu_connector_root']"]
    delay_ms: 40
  - on: input
    target: .o_input[name='name']
    fail: read-only field
"#;
        let script = UiScript::from_yaml(yaml).unwrap();
        assert_eq!(script.url, "/web");
        assert_eq!(script.initial, [".o_menu_toggle"]);
        assert_eq!(script.reactions.len(), 2);
        assert_eq!(script.reactions[0].delay_ms, 40);
        assert_eq!(script.reactions[1].fail.as_deref(), Some("read-only field"));
        assert_eq!(script.reactions_for(ReactOn::Click, ".o_menu_toggle").count(), 1);
        assert_eq!(script.reactions_for(ReactOn::Input, ".o_menu_toggle").count(), 0);
    }

    #[test]
    fn test_empty_target_rejected() {
        let yaml = "reactions:\n  - on: click\n    target: ''\n";
        assert!(matches!(
            UiScript::from_yaml(yaml),
            Err(Error::CatalogParse { .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "initial: []\nelements: []\n";
        assert!(UiScript::from_yaml(yaml).is_err());
    }
}
