//! Fragment library and expansion
//!
//! Fragments are flattened into plain step lists when a walkthrough is
//! registered, so the runner never sees a reference. Expansion substitutes
//! `{{param}}` placeholders and rejects reference cycles.

use std::collections::{BTreeMap, BTreeSet};

use super::context::{Edition, Platform};
use super::definition::{Action, Fragment, Position, Step, StepEntry};
use crate::common::{Error, Result};

/// Opens the apps menu from the navbar (community edition only)
pub const SHOW_APPS_MENU_ITEM: &str = "show_apps_menu_item";

/// Clicks a statusbar button by label; on mobile the actions dropdown is opened first
pub const STATUSBAR_BUTTON: &str = "statusbar_button";

/// Named fragments available to walkthrough definitions
#[derive(Debug, Clone, Default)]
pub struct FragmentLibrary {
    fragments: BTreeMap<String, Fragment>,
}

impl FragmentLibrary {
    /// An empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// A library preloaded with the built-in fragments
    pub fn with_builtins() -> Self {
        let mut fragments = BTreeMap::new();
        for fragment in [show_apps_menu_item(), statusbar_button()] {
            fragments.insert(fragment.name.clone(), fragment);
        }
        Self { fragments }
    }

    /// Add a fragment; names are unique
    pub fn insert(&mut self, fragment: Fragment) -> Result<()> {
        if self.fragments.contains_key(&fragment.name) {
            return Err(Error::DuplicateFragment(fragment.name));
        }
        let mut seen = BTreeSet::new();
        for param in &fragment.params {
            if !seen.insert(param.as_str()) {
                return Err(Error::fragment_arguments(
                    &fragment.name,
                    format!("parameter '{}' declared twice", param),
                ));
            }
        }
        tracing::debug!(fragment = %fragment.name, params = fragment.params.len(), "Registered fragment");
        self.fragments.insert(fragment.name.clone(), fragment);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Fragment> {
        self.fragments.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Flatten `entries` into concrete steps
    ///
    /// `owner` names the walkthrough being expanded, for error messages.
    pub fn expand(&self, owner: &str, entries: &[StepEntry]) -> Result<Vec<Step>> {
        let mut steps = Vec::with_capacity(entries.len());
        let mut stack = Vec::new();
        self.expand_into(owner, entries, &BTreeMap::new(), &mut stack, &mut steps)?;
        Ok(steps)
    }

    /// Expand every fragment once, with its own placeholders as arguments
    ///
    /// Surfaces unknown references and cycles without needing a walkthrough
    /// that uses the fragment.
    pub fn check_all(&self) -> Result<()> {
        for fragment in self.fragments.values() {
            let args: BTreeMap<String, String> = fragment
                .params
                .iter()
                .map(|p| (p.clone(), format!("{{{{{}}}}}", p)))
                .collect();
            let mut stack = vec![fragment.name.clone()];
            let mut steps = Vec::new();
            self.expand_into(&fragment.name, &fragment.steps, &args, &mut stack, &mut steps)?;
        }
        Ok(())
    }

    fn expand_into(
        &self,
        referenced_by: &str,
        entries: &[StepEntry],
        args: &BTreeMap<String, String>,
        stack: &mut Vec<String>,
        out: &mut Vec<Step>,
    ) -> Result<()> {
        for entry in entries {
            match entry {
                StepEntry::Step(step) => out.push(substitute_step(step, args)),
                StepEntry::Fragment(reference) => {
                    let name = reference.fragment.as_str();
                    if stack.iter().any(|s| s == name) {
                        return Err(Error::cyclic_fragment(stack.as_slice(), name));
                    }
                    let fragment = self
                        .get(name)
                        .ok_or_else(|| Error::unknown_fragment(name, referenced_by))?;

                    let resolved: BTreeMap<String, String> = reference
                        .args
                        .iter()
                        .map(|(k, v)| (k.clone(), substitute(v, args)))
                        .collect();
                    check_arguments(fragment, &resolved)?;

                    stack.push(fragment.name.clone());
                    self.expand_into(&fragment.name, &fragment.steps, &resolved, stack, out)?;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

fn check_arguments(fragment: &Fragment, args: &BTreeMap<String, String>) -> Result<()> {
    if let Some(extra) = args.keys().find(|k| !fragment.params.contains(*k)) {
        return Err(Error::fragment_arguments(
            &fragment.name,
            format!("unexpected argument '{}'", extra),
        ));
    }
    if let Some(missing) = fragment.params.iter().find(|p| !args.contains_key(*p)) {
        return Err(Error::fragment_arguments(
            &fragment.name,
            format!("missing argument '{}'", missing),
        ));
    }
    Ok(())
}

/// Replace `{{name}}` tokens in one left-to-right pass
///
/// Argument values are copied verbatim, so placeholders inside them are never
/// expanded. Tokens without a matching argument are kept as written.
fn substitute(text: &str, args: &BTreeMap<String, String>) -> String {
    if args.is_empty() || !text.contains("{{") {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let name = &after_open[..end];
        match args.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    out
}

fn substitute_step(step: &Step, args: &BTreeMap<String, String>) -> Step {
    if args.is_empty() {
        return step.clone();
    }
    Step {
        trigger: substitute(&step.trigger, args),
        extra_trigger: step.extra_trigger.as_deref().map(|s| substitute(s, args)),
        content: substitute(&step.content, args),
        action: step.action.as_ref().map(|action| match action {
            Action::Click => Action::Click,
            Action::Type { text } => Action::Type {
                text: substitute(text, args),
            },
            Action::Custom { handler } => Action::Custom {
                handler: substitute(handler, args),
            },
        }),
        ..step.clone()
    }
}

fn show_apps_menu_item() -> Fragment {
    Fragment::new(
        SHOW_APPS_MENU_ITEM,
        vec![Step::click(".o_menu_toggle")
            .with_content("Home menu")
            .with_position(Position::Bottom)
            .only_in(Edition::Community)
            .into()],
    )
}

fn statusbar_button() -> Fragment {
    Fragment::new(
        STATUSBAR_BUTTON,
        vec![
            Step::click(".o_statusbar_buttons")
                .with_extra_trigger("{{extra_trigger}}")
                .only_on(Platform::Mobile)
                .into(),
            Step::click(".o_statusbar_buttons button:enabled:contains('{{button}}')")
                .with_content("{{content}}")
                .with_position(Position::Bottom)
                .into(),
        ],
    )
    .with_params(["button", "content", "extra_trigger"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::definition::FragmentRef;

    fn confirm_dialog() -> Fragment {
        Fragment::new(
            "confirm_dialog",
            vec![Step::click(".modal-footer .btn-primary")
                .with_content("Confirm {{what}}")
                .into()],
        )
        .with_params(["what"])
    }

    #[test]
    fn test_plain_steps_pass_through() {
        let library = FragmentLibrary::new();
        let entries = vec![StepEntry::from(Step::click(".o_app")), Step::type_text("name", "Agrolait").into()];
        let steps = library.expand("tour", &entries).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].effective_action(), Action::Type { text: "Agrolait".to_string() });
    }

    #[test]
    fn test_builtin_statusbar_button_expansion() {
        let library = FragmentLibrary::with_builtins();
        let entries = vec![StepEntry::from(
            FragmentRef::new(STATUSBAR_BUTTON)
                .arg("button", "Check Connection")
                .arg("content", "Check the connection")
                .arg("extra_trigger", "button[name='button_check_connection']"),
        )];

        let steps = library.expand("connector_tour", &entries).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].platform, Some(Platform::Mobile));
        assert_eq!(
            steps[0].extra_trigger.as_deref(),
            Some("button[name='button_check_connection']")
        );
        assert_eq!(
            steps[1].trigger,
            ".o_statusbar_buttons button:enabled:contains('Check Connection')"
        );
        assert_eq!(steps[1].content, "Check the connection");
    }

    #[test]
    fn test_nested_fragment_arguments_forwarded() {
        let mut library = FragmentLibrary::new();
        library.insert(confirm_dialog()).unwrap();
        library
            .insert(
                Fragment::new(
                    "save_and_confirm",
                    vec![
                        Step::click(".o_form_button_save").into(),
                        FragmentRef::new("confirm_dialog").arg("what", "the {{record}}").into(),
                    ],
                )
                .with_params(["record"]),
            )
            .unwrap();

        let entries = vec![StepEntry::from(FragmentRef::new("save_and_confirm").arg("record", "order"))];
        let steps = library.expand("tour", &entries).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].content, "Confirm the order");
    }

    #[test]
    fn test_argument_values_are_not_substituted_again() {
        let mut library = FragmentLibrary::new();
        library
            .insert(
                Fragment::new(
                    "label",
                    vec![Step::click("{{a}}").with_content("{{b}} field").into()],
                )
                .with_params(["a", "b"]),
            )
            .unwrap();

        let entries = vec![StepEntry::from(
            FragmentRef::new("label")
                .arg("a", "input[placeholder='{{b}}']")
                .arg("b", "Name"),
        )];
        let steps = library.expand("tour", &entries).unwrap();
        assert_eq!(steps[0].trigger, "input[placeholder='{{b}}']");
        assert_eq!(steps[0].content, "Name field");
    }

    #[test]
    fn test_substitute_single_pass() {
        let args: BTreeMap<String, String> = [
            ("a".to_string(), "{{b}}".to_string()),
            ("b".to_string(), "x".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(substitute("{{a}}-{{b}}", &args), "{{b}}-x");
        assert_eq!(substitute("{{unknown}} {{b}}", &args), "{{unknown}} x");
        assert_eq!(substitute("open {{b", &args), "open {{b");
        assert_eq!(substitute("{{b}}}}", &args), "x}}");
    }

    #[test]
    fn test_missing_and_unexpected_arguments() {
        let mut library = FragmentLibrary::new();
        library.insert(confirm_dialog()).unwrap();

        let missing = vec![StepEntry::from(FragmentRef::new("confirm_dialog"))];
        let err = library.expand("tour", &missing).unwrap_err();
        assert!(err.to_string().contains("missing argument 'what'"));

        let extra = vec![StepEntry::from(
            FragmentRef::new("confirm_dialog").arg("what", "x").arg("colour", "red"),
        )];
        let err = library.expand("tour", &extra).unwrap_err();
        assert!(err.to_string().contains("unexpected argument 'colour'"));
    }

    #[test]
    fn test_unknown_fragment() {
        let library = FragmentLibrary::new();
        let entries = vec![StepEntry::from(FragmentRef::new("nope"))];
        match library.expand("connector_tour", &entries) {
            Err(Error::UnknownFragment { name, referenced_by }) => {
                assert_eq!(name, "nope");
                assert_eq!(referenced_by, "connector_tour");
            }
            other => panic!("Expected UnknownFragment, got {:?}", other),
        }
    }

    #[test]
    fn test_transitive_cycle_detected() {
        let mut library = FragmentLibrary::new();
        library
            .insert(Fragment::new("a", vec![FragmentRef::new("b").into()]))
            .unwrap();
        library
            .insert(Fragment::new(
                "b",
                vec![Step::click(".x").into(), FragmentRef::new("a").into()],
            ))
            .unwrap();

        let entries = vec![StepEntry::from(FragmentRef::new("a"))];
        match library.expand("tour", &entries) {
            Err(Error::CyclicFragment { chain }) => assert_eq!(chain, "a -> b -> a"),
            other => panic!("Expected CyclicFragment, got {:?}", other),
        }
        assert!(matches!(library.check_all(), Err(Error::CyclicFragment { .. })));
    }

    #[test]
    fn test_same_fragment_twice_is_not_a_cycle() {
        let mut library = FragmentLibrary::new();
        library.insert(confirm_dialog()).unwrap();
        let entries = vec![
            StepEntry::from(FragmentRef::new("confirm_dialog").arg("what", "invoice")),
            FragmentRef::new("confirm_dialog").arg("what", "payment").into(),
        ];
        let steps = library.expand("tour", &entries).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].content, "Confirm invoice");
        assert_eq!(steps[1].content, "Confirm payment");
    }

    #[test]
    fn test_duplicate_fragment_and_params() {
        let mut library = FragmentLibrary::with_builtins();
        assert_eq!(library.len(), 2);
        let err = library
            .insert(Fragment::new(SHOW_APPS_MENU_ITEM, Vec::new()))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateFragment(name) if name == SHOW_APPS_MENU_ITEM));

        let err = library
            .insert(Fragment::new("twice", Vec::new()).with_params(["x", "x"]))
            .unwrap_err();
        assert!(matches!(err, Error::FragmentArguments { .. }));
        assert!(library.check_all().is_ok());
    }
}
