//! Walkthrough registry
//!
//! An explicit registry object owned by whoever drives the runner. Entries are
//! write-once: a second registration under the same id is rejected and the
//! first one stays in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::context::EligibilityContext;
use super::definition::{Fragment, Walkthrough, WalkthroughDefinition};
use super::fragment::FragmentLibrary;
use crate::common::{Error, Result};

/// Registered walkthroughs keyed by identifier
#[derive(Debug, Default)]
pub struct Registry {
    fragments: FragmentLibrary,
    walkthroughs: BTreeMap<String, Arc<Walkthrough>>,
}

impl Registry {
    /// A registry whose definitions may reference the given fragments
    pub fn new(fragments: FragmentLibrary) -> Self {
        Self {
            fragments,
            walkthroughs: BTreeMap::new(),
        }
    }

    /// A registry with only the built-in fragments available
    pub fn with_builtins() -> Self {
        Self::new(FragmentLibrary::with_builtins())
    }

    /// Make a fragment available to definitions registered afterwards
    pub fn register_fragment(&mut self, fragment: Fragment) -> Result<()> {
        self.fragments.insert(fragment)
    }

    pub fn fragments(&self) -> &FragmentLibrary {
        &self.fragments
    }

    /// Expand a definition's fragments and register the result
    pub fn register(&mut self, definition: WalkthroughDefinition) -> Result<Arc<Walkthrough>> {
        if self.walkthroughs.contains_key(&definition.id) {
            return Err(Error::DuplicateId(definition.id));
        }

        let steps = self.fragments.expand(&definition.id, &definition.steps)?;
        let walkthrough = Arc::new(Walkthrough::from_definition(definition, steps));

        tracing::debug!(
            id = %walkthrough.id,
            sequence = walkthrough.sequence,
            steps = walkthrough.steps.len(),
            "Registered walkthrough"
        );

        self.walkthroughs
            .insert(walkthrough.id.clone(), Arc::clone(&walkthrough));
        Ok(walkthrough)
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Walkthrough>> {
        self.walkthroughs.get(id).cloned()
    }

    /// Look up a walkthrough, failing when it is not registered
    pub fn get(&self, id: &str) -> Result<Arc<Walkthrough>> {
        self.lookup(id)
            .ok_or_else(|| Error::WalkthroughNotFound(id.to_string()))
    }

    /// Every registered walkthrough, lowest sequence first
    ///
    /// Equal sequences are ordered by id.
    pub fn all(&self) -> Vec<Arc<Walkthrough>> {
        by_priority(self.walkthroughs.values().cloned().collect())
    }

    /// Walkthroughs that may start from `context`, in the same order as [`Registry::all`]
    pub fn list_eligible(&self, context: &EligibilityContext) -> Vec<Arc<Walkthrough>> {
        by_priority(
            self.walkthroughs
                .values()
                .filter(|w| w.is_eligible(context))
                .cloned()
                .collect(),
        )
    }

    /// The walkthrough that wins when several could start from `context`
    pub fn first_eligible(&self, context: &EligibilityContext) -> Result<Arc<Walkthrough>> {
        self.list_eligible(context)
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoEligibleWalkthrough {
                url: context.url.clone(),
                edition: context.edition.to_string(),
                platform: context.platform.to_string(),
            })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.walkthroughs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.walkthroughs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walkthroughs.is_empty()
    }

    /// Drop every walkthrough; fragments stay available
    pub fn clear(&mut self) {
        tracing::debug!(count = self.walkthroughs.len(), "Clearing walkthrough registry");
        self.walkthroughs.clear();
    }
}

fn by_priority(mut walkthroughs: Vec<Arc<Walkthrough>>) -> Vec<Arc<Walkthrough>> {
    walkthroughs.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.id.cmp(&b.id)));
    walkthroughs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::context::{Edition, Platform};
    use crate::tour::definition::{FragmentRef, Step, StepEntry};

    fn definition(id: &str, sequence: u32) -> WalkthroughDefinition {
        WalkthroughDefinition::new(id, vec![Step::click(".o_app").into()])
            .with_url("/web")
            .with_sequence(sequence)
    }

    fn web_context(edition: Edition, platform: Platform) -> EligibilityContext {
        EligibilityContext::new("/web", edition, platform)
    }

    #[test]
    fn test_duplicate_id_keeps_original() {
        let mut registry = Registry::with_builtins();
        registry.register(definition("connector_tour", 10)).unwrap();

        let replacement = WalkthroughDefinition::new("connector_tour", Vec::new()).with_sequence(1);
        let err = registry.register(replacement).unwrap_err();
        assert!(matches!(err, Error::DuplicateId(ref id) if id == "connector_tour"));

        let kept = registry.lookup("connector_tour").unwrap();
        assert_eq!(kept.sequence, 10);
        assert_eq!(kept.steps.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_expands_fragments() {
        let mut registry = Registry::with_builtins();
        let def = WalkthroughDefinition::new(
            "connector_tour",
            vec![
                StepEntry::from(FragmentRef::new("show_apps_menu_item")),
                Step::click(".o_list_button_add").into(),
            ],
        );
        let walkthrough = registry.register(def).unwrap();
        assert_eq!(walkthrough.steps.len(), 2);
        assert_eq!(walkthrough.steps[0].trigger, ".o_menu_toggle");
    }

    #[test]
    fn test_failed_expansion_registers_nothing() {
        let mut registry = Registry::new(FragmentLibrary::new());
        let def = WalkthroughDefinition::new("tour", vec![FragmentRef::new("missing").into()]);
        assert!(matches!(
            registry.register(def),
            Err(Error::UnknownFragment { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_eligible_orders_by_sequence() {
        let mut registry = Registry::with_builtins();
        registry.register(definition("sale_connector_tour", 11)).unwrap();
        registry.register(definition("connector_tour", 10)).unwrap();
        registry.register(definition("b_tour", 19)).unwrap();
        registry.register(definition("a_tour", 19)).unwrap();

        let ctx = web_context(Edition::Community, Platform::Desktop);
        let ids: Vec<String> = registry
            .list_eligible(&ctx)
            .iter()
            .map(|w| w.id.clone())
            .collect();
        assert_eq!(ids, ["connector_tour", "sale_connector_tour", "a_tour", "b_tour"]);
        assert_eq!(registry.first_eligible(&ctx).unwrap().id, "connector_tour");
    }

    #[test]
    fn test_all_includes_ineligible_in_priority_order() {
        let mut registry = Registry::with_builtins();
        registry
            .register(definition("enterprise_only", 5).only_in(Edition::Enterprise))
            .unwrap();
        registry.register(definition("shop_tour", 2).with_url("/shop")).unwrap();
        registry.register(definition("b_tour", 2)).unwrap();
        registry.register(definition("connector_tour", 10)).unwrap();

        let ids: Vec<String> = registry.all().iter().map(|w| w.id.clone()).collect();
        assert_eq!(ids, ["b_tour", "shop_tour", "enterprise_only", "connector_tour"]);

        // Eligible entries keep the same relative order
        let ctx = web_context(Edition::Community, Platform::Desktop);
        let eligible: Vec<String> = registry.list_eligible(&ctx).iter().map(|w| w.id.clone()).collect();
        assert_eq!(eligible, ["b_tour", "connector_tour"]);
    }

    #[test]
    fn test_list_eligible_applies_filters() {
        let mut registry = Registry::with_builtins();
        registry
            .register(definition("enterprise_only", 1).only_in(Edition::Enterprise))
            .unwrap();
        registry
            .register(definition("desktop_only", 2).only_on(Platform::Desktop))
            .unwrap();
        registry.register(definition("anywhere", 3).with_url("")).unwrap();

        let mobile = web_context(Edition::Community, Platform::Mobile);
        let ids: Vec<String> = registry.list_eligible(&mobile).iter().map(|w| w.id.clone()).collect();
        assert_eq!(ids, ["anywhere"]);

        let shop = EligibilityContext::new("/shop", Edition::Enterprise, Platform::Desktop);
        let ids: Vec<String> = registry.list_eligible(&shop).iter().map(|w| w.id.clone()).collect();
        assert_eq!(ids, ["anywhere"]);
    }

    #[test]
    fn test_no_eligible_walkthrough() {
        let registry = Registry::with_builtins();
        let ctx = web_context(Edition::Community, Platform::Desktop);
        assert!(matches!(
            registry.first_eligible(&ctx),
            Err(Error::NoEligibleWalkthrough { .. })
        ));
    }

    #[test]
    fn test_clear_and_reregister() {
        let mut registry = Registry::with_builtins();
        registry.register(definition("connector_tour", 10)).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.lookup("connector_tour").is_none());
        assert!(matches!(registry.get("connector_tour"), Err(Error::WalkthroughNotFound(_))));

        registry.register(definition("connector_tour", 10)).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["connector_tour"]);
        assert_eq!(registry.fragments().len(), 2);
    }
}
