//! Interfaces the host application provides to the runner
//!
//! The runner only queries the live UI and dispatches single input events;
//! the UI tree itself is owned and mutated by the host.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use super::definition::Position;
use crate::common::{Error, Result};

/// A UI element resolved from a selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element {
    /// Host-assigned identity, stable while the element stays rendered
    pub id: u64,
    /// The selector the element was found with
    pub selector: String,
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.selector)
    }
}

/// Read access to the live UI tree
#[async_trait]
pub trait UiQuery: Send + Sync {
    /// Resolve a selector, `None` while nothing matches
    async fn find(&self, selector: &str) -> Option<Element>;

    /// Subscribe to UI mutations
    ///
    /// The value is a generation counter; the runner only cares that it changed.
    fn observe_mutations(&self) -> watch::Receiver<u64>;
}

/// Input events sent to the host UI
#[async_trait]
pub trait ActionDispatch: Send + Sync {
    async fn dispatch_input(&self, element: &Element, text: &str) -> Result<()>;

    async fn dispatch_click(&self, element: &Element) -> Result<()>;

    /// Show the instructional tooltip for a step
    async fn show_tip(&self, _element: &Element, _content: &str, _position: Position) {}

    /// Remove the tooltip after the step's action succeeded
    async fn hide_tip(&self) {}
}

/// Resolves step content keys into display text
pub trait Translator: Send + Sync {
    fn translate(&self, key: &str) -> String;
}

/// Returns keys unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, key: &str) -> String {
        key.to_string()
    }
}

/// A named action for steps whose input is more than a click or typed text
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self, element: &Element, dispatch: &dyn ActionDispatch) -> Result<()>;
}

/// Custom action handlers resolved by name
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one with that name
    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn with(mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.insert(name, handler);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ActionHandler>> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Action(format!("no handler registered as '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerTable").field("handlers", &names).finish()
    }
}

/// The host-side collaborators a runner drives
#[derive(Clone)]
pub struct Host {
    pub ui: Arc<dyn UiQuery>,
    pub actions: Arc<dyn ActionDispatch>,
    pub translator: Arc<dyn Translator>,
}

impl Host {
    pub fn new(
        ui: Arc<dyn UiQuery>,
        actions: Arc<dyn ActionDispatch>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            ui,
            actions,
            translator,
        }
    }

    /// Use one object for every role
    pub fn from_shared<H>(host: Arc<H>) -> Self
    where
        H: UiQuery + ActionDispatch + Translator + 'static,
    {
        Self {
            ui: host.clone(),
            actions: host.clone(),
            translator: host,
        }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
