//! Simulated host UI
//!
//! Implements the host traits over an in-memory set of rendered selectors
//! driven by a [`UiScript`]. Used for dry runs from the CLI and as the mock
//! UI in tests.

mod script;

pub use script::{ReactOn, Reaction, UiScript};

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::common::{Error, Result};
use crate::tour::{ActionDispatch, Element, Position, Translator, UiQuery};

/// An action the simulated UI received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedAction {
    pub kind: ReactOn,
    pub selector: String,
    /// Typed text, for input actions
    pub text: Option<String>,
}

/// The tooltip currently shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip {
    pub element: Element,
    pub content: String,
    pub position: Position,
}

#[derive(Debug, Default)]
struct SimState {
    /// Rendered selectors and their element ids
    elements: BTreeMap<String, u64>,
    values: HashMap<String, String>,
    next_id: u64,
    log: Vec<DispatchedAction>,
    tip: Option<Tooltip>,
    /// Bumped on reset so reactions scheduled before it are dropped
    epoch: u64,
}

impl SimState {
    fn render(&mut self, selector: &str) -> bool {
        if self.elements.contains_key(selector) {
            return false;
        }
        self.next_id += 1;
        self.elements.insert(selector.to_string(), self.next_id);
        true
    }

    fn load(&mut self, script: &UiScript) {
        self.elements.clear();
        self.values.clear();
        self.log.clear();
        self.tip = None;
        self.next_id = 0;
        for selector in &script.initial {
            self.render(selector);
        }
    }

    fn apply(&mut self, reaction: &Reaction) -> bool {
        let mut changed = false;
        for selector in &reaction.remove {
            changed |= self.elements.remove(selector).is_some();
        }
        for selector in &reaction.reveal {
            changed |= self.render(selector);
        }
        changed
    }
}

/// A scripted, in-memory host UI
#[derive(Debug)]
pub struct SimulatedUi {
    script: Arc<UiScript>,
    state: Arc<Mutex<SimState>>,
    mutations: Arc<watch::Sender<u64>>,
}

impl SimulatedUi {
    pub fn new(script: UiScript) -> Self {
        let mut state = SimState::default();
        state.load(&script);
        let (mutations, _) = watch::channel(0);
        Self {
            script: Arc::new(script),
            state: Arc::new(Mutex::new(state)),
            mutations: Arc::new(mutations),
        }
    }

    /// Load a UI script file
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        Ok(Self::new(UiScript::from_path(path)?))
    }

    pub fn script(&self) -> &UiScript {
        &self.script
    }

    /// Restore the initial rendering and forget dispatched actions
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.epoch += 1;
        state.load(&self.script);
        drop(state);
        self.notify();
    }

    /// Render a selector out of band, as the host would on its own
    pub async fn reveal(&self, selector: &str) {
        let changed = self.state.lock().await.render(selector);
        if changed {
            self.notify();
        }
    }

    /// Every action received since construction or the last reset
    pub async fn dispatched(&self) -> Vec<DispatchedAction> {
        self.state.lock().await.log.clone()
    }

    pub async fn visible_tip(&self) -> Option<Tooltip> {
        self.state.lock().await.tip.clone()
    }

    /// Text last typed into a selector
    pub async fn value(&self, selector: &str) -> Option<String> {
        self.state.lock().await.values.get(selector).cloned()
    }

    fn notify(&self) {
        self.mutations.send_modify(|generation| *generation += 1);
    }

    async fn dispatch(&self, kind: ReactOn, element: &Element, text: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.elements.get(&element.selector) != Some(&element.id) {
            return Err(Error::Action(format!(
                "element '{}' is no longer rendered",
                element.selector
            )));
        }

        state.log.push(DispatchedAction {
            kind,
            selector: element.selector.clone(),
            text: text.map(str::to_string),
        });

        // A refused action leaves the page as it was
        if let Some(message) = self
            .script
            .reactions_for(kind, &element.selector)
            .find_map(|r| r.fail.as_ref())
        {
            tracing::debug!(selector = %element.selector, %message, "Simulated action failure");
            return Err(Error::Action(message.clone()));
        }

        if let Some(text) = text {
            state.values.insert(element.selector.clone(), text.to_string());
        }

        let mut changed = false;
        for reaction in self.script.reactions_for(kind, &element.selector) {
            if reaction.delay_ms == 0 {
                changed |= state.apply(reaction);
            } else {
                self.schedule(reaction.clone(), state.epoch);
            }
        }
        drop(state);

        if changed {
            self.notify();
        }
        Ok(())
    }

    fn schedule(&self, reaction: Reaction, epoch: u64) {
        let state = Arc::clone(&self.state);
        let mutations = Arc::clone(&self.mutations);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(reaction.delay_ms)).await;
            let mut state = state.lock().await;
            if state.epoch != epoch {
                return;
            }
            if state.apply(&reaction) {
                drop(state);
                mutations.send_modify(|generation| *generation += 1);
            }
        });
    }
}

#[async_trait]
impl UiQuery for SimulatedUi {
    async fn find(&self, selector: &str) -> Option<Element> {
        let state = self.state.lock().await;
        state.elements.get(selector).map(|id| Element {
            id: *id,
            selector: selector.to_string(),
        })
    }

    fn observe_mutations(&self) -> watch::Receiver<u64> {
        self.mutations.subscribe()
    }
}

#[async_trait]
impl ActionDispatch for SimulatedUi {
    async fn dispatch_input(&self, element: &Element, text: &str) -> Result<()> {
        self.dispatch(ReactOn::Input, element, Some(text)).await
    }

    async fn dispatch_click(&self, element: &Element) -> Result<()> {
        self.dispatch(ReactOn::Click, element, None).await
    }

    async fn show_tip(&self, element: &Element, content: &str, position: Position) {
        self.state.lock().await.tip = Some(Tooltip {
            element: element.clone(),
            content: content.to_string(),
            position,
        });
    }

    async fn hide_tip(&self) {
        self.state.lock().await.tip = None;
    }
}

impl Translator for SimulatedUi {
    fn translate(&self, key: &str) -> String {
        self.script
            .translations
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
