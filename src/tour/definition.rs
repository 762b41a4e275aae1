//! Walkthrough data model
//!
//! `WalkthroughDefinition` is the authored form and may reference fragments.
//! Registration flattens it into a [`Walkthrough`], which is what runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::context::{Edition, EligibilityContext, Platform};

/// Placement of the instructional tooltip relative to the target element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Top,
    Right,
    #[default]
    Bottom,
    Left,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Top => write!(f, "top"),
            Position::Right => write!(f, "right"),
            Position::Bottom => write!(f, "bottom"),
            Position::Left => write!(f, "left"),
        }
    }
}

/// What a step does once its trigger resolves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Activate the element
    Click,
    /// Enter text into the element
    Type { text: String },
    /// Run a handler registered by name in the runner's handler table
    Custom { handler: String },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click => write!(f, "click"),
            Action::Type { text } => write!(f, "type {:?}", text),
            Action::Custom { handler } => write!(f, "custom {}", handler),
        }
    }
}

/// One unit of a walkthrough: wait for the trigger, then act
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Selector of the element this step targets
    pub trigger: String,
    /// Selector that must also resolve before the step runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_trigger: Option<String>,
    /// Instructional text, or a localization key for it
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub position: Position,
    /// Defaults to a click when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Only run on this device class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Only run on this edition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<Edition>,
}

impl Step {
    /// A step that clicks `trigger`
    pub fn click(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            extra_trigger: None,
            content: String::new(),
            position: Position::default(),
            action: None,
            platform: None,
            edition: None,
        }
    }

    /// A step that types `text` into `trigger`
    pub fn type_text(trigger: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            action: Some(Action::Type { text: text.into() }),
            ..Self::click(trigger)
        }
    }

    /// A step that runs the named custom handler on `trigger`
    pub fn custom(trigger: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            action: Some(Action::Custom {
                handler: handler.into(),
            }),
            ..Self::click(trigger)
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_extra_trigger(mut self, selector: impl Into<String>) -> Self {
        self.extra_trigger = Some(selector.into());
        self
    }

    pub fn only_on(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn only_in(mut self, edition: Edition) -> Self {
        self.edition = Some(edition);
        self
    }

    /// The effective action, with the implicit click made explicit
    pub fn effective_action(&self) -> Action {
        self.action.clone().unwrap_or(Action::Click)
    }

    /// Whether the step's platform/edition filters accept the context
    pub fn applies_to(&self, context: &EligibilityContext) -> bool {
        context.accepts(self.edition, self.platform)
    }
}

/// A reference to a named fragment, expanded in place at registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmentRef {
    pub fragment: String,
    /// Arguments substituted for `{{param}}` placeholders in the fragment
    #[serde(default, rename = "with", skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl FragmentRef {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }
}

/// An entry of an authored step list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepEntry {
    Fragment(FragmentRef),
    Step(Step),
}

impl From<Step> for StepEntry {
    fn from(step: Step) -> Self {
        StepEntry::Step(step)
    }
}

impl From<FragmentRef> for StepEntry {
    fn from(fragment: FragmentRef) -> Self {
        StepEntry::Fragment(fragment)
    }
}

/// A reusable, named, optionally parameterised step sub-sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fragment {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub steps: Vec<StepEntry>,
}

impl Fragment {
    pub fn new(name: impl Into<String>, steps: Vec<StepEntry>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            steps,
        }
    }

    pub fn with_params<S: Into<String>>(mut self, params: impl IntoIterator<Item = S>) -> Self {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }
}

fn default_sequence() -> u32 {
    1000
}

/// Authored walkthrough, as found in catalogs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalkthroughDefinition {
    /// Unique identifier within a registry
    pub id: String,
    /// Path prefix the walkthrough starts from; empty means anywhere
    #[serde(default)]
    pub url: String,
    /// Priority among eligible walkthroughs; lower wins
    #[serde(default = "default_sequence")]
    pub sequence: u32,
    /// Skip the completion celebration
    #[serde(default)]
    pub suppress_celebration: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<Edition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub steps: Vec<StepEntry>,
}

impl WalkthroughDefinition {
    pub fn new(id: impl Into<String>, steps: Vec<StepEntry>) -> Self {
        Self {
            id: id.into(),
            url: String::new(),
            sequence: default_sequence(),
            suppress_celebration: false,
            edition: None,
            platform: None,
            steps,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn without_celebration(mut self) -> Self {
        self.suppress_celebration = true;
        self
    }

    pub fn only_in(mut self, edition: Edition) -> Self {
        self.edition = Some(edition);
        self
    }

    pub fn only_on(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }
}

/// A registered walkthrough with its steps flattened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Walkthrough {
    pub id: String,
    pub url: String,
    pub sequence: u32,
    pub suppress_celebration: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<Edition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub steps: Vec<Step>,
}

impl Walkthrough {
    /// Build from a definition header and already-expanded steps
    pub(crate) fn from_definition(definition: WalkthroughDefinition, steps: Vec<Step>) -> Self {
        Self {
            id: definition.id,
            url: definition.url,
            sequence: definition.sequence,
            suppress_celebration: definition.suppress_celebration,
            edition: definition.edition,
            platform: definition.platform,
            steps,
        }
    }

    /// Explain why the context rejects this walkthrough, if it does
    ///
    /// The url is only checked when the context carries one.
    pub fn ineligibility(&self, context: &EligibilityContext) -> Option<String> {
        if !context.url.is_empty() && !context.url_matches(&self.url) {
            return Some(format!(
                "url '{}' does not start with '{}'",
                context.url, self.url
            ));
        }
        if let Some(edition) = self.edition {
            if edition != context.edition {
                return Some(format!(
                    "requires {} edition, running on {}",
                    edition, context.edition
                ));
            }
        }
        if let Some(platform) = self.platform {
            if platform != context.platform {
                return Some(format!(
                    "requires {} platform, running on {}",
                    platform, context.platform
                ));
            }
        }
        None
    }

    pub fn is_eligible(&self, context: &EligibilityContext) -> bool {
        self.ineligibility(context).is_none()
    }
}
