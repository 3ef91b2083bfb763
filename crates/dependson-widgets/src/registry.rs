#![forbid(unsafe_code)]

//! Accessor registry.
//!
//! Maps elements to the [`Accessor`] responsible for them. Entries are kept
//! in registration order and resolved newest first, so a narrow accessor
//! registered after a broad one shadows it for the elements both match.
//!
//! # Invariants
//!
//! 1. `resolve` is a pure function of the registration sequence and the
//!    element's current tag/attributes.
//! 2. The registry is append-only; registering for a selector that already
//!    has an entry shadows the old entry without removing it.
//! 3. An element no entry matches resolves to the fallback
//!    [`DefaultAccessor`].

use std::rc::Rc;

use dependson_core::dom::{Document, ElementId};
use dependson_core::error::SelectorError;
use dependson_core::selector::Selector;
use dependson_core::value::{RefType, Value};

use crate::accessor::{Accessor, DefaultAccessor};
use crate::multi_value::{MULTI_VALUE_SELECTOR, MultiValueAccessor};
use crate::radio_group::{RADIO_GROUP_SELECTOR, RadioGroupAccessor};
use crate::toggle::{TOGGLE_SELECTOR, ToggleAccessor};

struct Entry {
    selector: Selector,
    accessor: Rc<dyn Accessor>,
}

/// Ordered table of accessors keyed by selector.
pub struct AccessorRegistry {
    entries: Vec<Entry>,
    fallback: Rc<dyn Accessor>,
}

impl std::fmt::Debug for AccessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|e| (e.selector.as_str(), e.accessor.name())),
            )
            .finish()
    }
}

impl Default for AccessorRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl AccessorRegistry {
    /// An empty registry that resolves everything to [`DefaultAccessor`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            fallback: Rc::new(DefaultAccessor),
        }
    }

    /// A registry with the built-in widget accessors.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(builtin(TOGGLE_SELECTOR), ToggleAccessor);
        registry.register(builtin(RADIO_GROUP_SELECTOR), RadioGroupAccessor::new());
        registry.register(builtin(MULTI_VALUE_SELECTOR), MultiValueAccessor::new());
        registry
    }

    /// Append an accessor for `selector`.
    pub fn register(&mut self, selector: Selector, accessor: impl Accessor + 'static) {
        tracing::debug!(
            message = "dependson.accessor.register",
            selector = selector.as_str(),
            accessor = accessor.name(),
            shadows = self.entries.iter().any(|e| e.selector == selector),
        );
        self.entries.push(Entry {
            selector,
            accessor: Rc::new(accessor),
        });
    }

    /// Parse `selector` and append an accessor for it.
    pub fn register_str(
        &mut self,
        selector: &str,
        accessor: impl Accessor + 'static,
    ) -> Result<(), SelectorError> {
        let selector = Selector::parse(selector)?;
        self.register(selector, accessor);
        Ok(())
    }

    /// Number of registered entries (the fallback excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The accessor for `el`: the most recently registered matching entry,
    /// or the fallback.
    #[must_use]
    pub fn resolve(&self, doc: &Document, el: ElementId) -> Rc<dyn Accessor> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.selector.matches(doc, el))
            .map_or_else(|| Rc::clone(&self.fallback), |entry| Rc::clone(&entry.accessor))
    }

    /// Current value of `el`, uncast.
    #[must_use]
    pub fn get(&self, doc: &Document, el: ElementId) -> Value {
        self.resolve(doc, el).get(doc, el)
    }

    /// Current value of `el` cast to `ty`; [`RefType::Auto`] uses the
    /// accessor's preferable type.
    #[must_use]
    pub fn get_typed(&self, doc: &Document, el: ElementId, ty: RefType) -> Value {
        let accessor = self.resolve(doc, el);
        let ty = match ty {
            RefType::Auto => accessor.preferable_type(),
            other => other,
        };
        accessor.get(doc, el).cast(ty)
    }

    pub fn set(&self, doc: &mut Document, el: ElementId, value: &Value, notify: bool) {
        self.resolve(doc, el).set(doc, el, value, notify);
    }

    /// Show or hide `el` through its accessor.
    pub fn set_visibility(&self, doc: &mut Document, el: ElementId, visible: bool) {
        self.resolve(doc, el).visibility(doc, el, visible);
    }

    pub fn set_disabled(&self, doc: &mut Document, el: ElementId, disabled: bool) {
        self.resolve(doc, el).disabled(doc, el, disabled);
    }

    pub fn set_readonly(&self, doc: &mut Document, el: ElementId, readonly: bool) {
        self.resolve(doc, el).readonly(doc, el, readonly);
    }

    pub fn set_required(&self, doc: &mut Document, el: ElementId, required: bool) {
        self.resolve(doc, el).required(doc, el, required);
    }
}

fn builtin(source: &str) -> Selector {
    Selector::parse(source).expect("built-in accessor selector is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::AccessorDescriptor;

    fn element(doc: &mut Document, tag: &str, attrs: &[(&str, &str)]) -> ElementId {
        let el = doc.create_element(tag);
        for (name, value) in attrs {
            doc.set_attr(el, name, *value);
        }
        let root = doc.root();
        doc.append_child(root, el);
        el
    }

    #[test]
    fn builtin_selectors_parse() {
        for source in [TOGGLE_SELECTOR, RADIO_GROUP_SELECTOR, MULTI_VALUE_SELECTOR] {
            assert!(Selector::parse(source).is_ok(), "{source}");
        }
        assert_eq!(AccessorRegistry::with_builtin().len(), 3);
    }

    #[test]
    fn resolves_builtin_widgets() {
        let mut doc = Document::new();
        let registry = AccessorRegistry::with_builtin();
        let text = element(&mut doc, "input", &[("type", "text")]);
        let checkbox = element(&mut doc, "input", &[("type", "checkbox")]);
        let switch = element(&mut doc, "coral-switch", &[]);
        let group = element(&mut doc, "div", &[("class", "coral-RadioGroup")]);
        let select = element(&mut doc, "coral-select", &[("multiple", "")]);
        let single = element(&mut doc, "coral-select", &[]);

        assert_eq!(registry.resolve(&doc, text).name(), "default");
        assert_eq!(registry.resolve(&doc, checkbox).name(), "toggle");
        assert_eq!(registry.resolve(&doc, switch).name(), "toggle");
        assert_eq!(registry.resolve(&doc, group).name(), "radio-group");
        assert_eq!(registry.resolve(&doc, select).name(), "multi-value");
        assert_eq!(registry.resolve(&doc, single).name(), "default");
    }

    #[test]
    fn later_registration_shadows_earlier() {
        let mut doc = Document::new();
        let mut registry = AccessorRegistry::with_builtin();
        let checkbox = element(&mut doc, "input", &[("type", "checkbox"), ("class", "fancy")]);

        registry
            .register_str("input.fancy", AccessorDescriptor::new("fancy", |_, _| Value::Null))
            .expect("valid selector");
        assert_eq!(registry.resolve(&doc, checkbox).name(), "fancy");

        registry
            .register_str("input", AccessorDescriptor::new("broad", |_, _| Value::Null))
            .expect("valid selector");
        assert_eq!(registry.resolve(&doc, checkbox).name(), "broad");
    }

    #[test]
    fn register_str_rejects_bad_selector() {
        let mut registry = AccessorRegistry::new();
        let err = registry
            .register_str("[unclosed", DefaultAccessor)
            .expect_err("invalid selector");
        assert!(matches!(err, SelectorError::UnterminatedAttribute { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn get_typed_uses_preferable_type_for_auto() {
        let mut doc = Document::new();
        let registry = AccessorRegistry::with_builtin();
        let checkbox = element(&mut doc, "coral-checkbox", &[]);
        doc.set_checked(checkbox, true);
        assert_eq!(registry.get_typed(&doc, checkbox, RefType::Auto), Value::Bool(true));
        assert_eq!(
            registry.get_typed(&doc, checkbox, RefType::String),
            Value::from("true")
        );

        let number = element(&mut doc, "input", &[("value", "42")]);
        assert_eq!(registry.get_typed(&doc, number, RefType::Auto), Value::from("42"));
        assert_eq!(registry.get_typed(&doc, number, RefType::Number), Value::Number(42.0));
    }

    #[test]
    fn set_visibility_delegates_to_resolved_accessor() {
        let mut doc = Document::new();
        let registry = AccessorRegistry::with_builtin();
        let input = element(&mut doc, "input", &[]);
        registry.set_visibility(&mut doc, input, false);
        assert!(doc.has_attr(input, "hidden"));
        registry.set_visibility(&mut doc, input, true);
        assert!(!doc.has_attr(input, "hidden"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        const POOL: [&str; 5] = [
            "input",
            r#"input[type="checkbox"]"#,
            ".fancy",
            "input.fancy",
            "*",
        ];

        proptest! {
            #[test]
            fn resolve_picks_newest_matching(order in prop::collection::vec(0..POOL.len(), 0..12)) {
                let mut doc = Document::new();
                let el = element(&mut doc, "input", &[("type", "checkbox"), ("class", "fancy")]);
                let other = element(&mut doc, "textarea", &[]);
                let mut registry = AccessorRegistry::new();
                for (n, &i) in order.iter().enumerate() {
                    let name = format!("{n}:{}", POOL[i]);
                    registry
                        .register_str(POOL[i], AccessorDescriptor::new(name, |_, _| Value::Null))
                        .expect("pool selectors are valid");
                }

                let expected = order
                    .iter()
                    .enumerate()
                    .last()
                    .map_or_else(|| "default".to_string(), |(n, &i)| format!("{n}:{}", POOL[i]));
                let resolved = registry.resolve(&doc, el);
                prop_assert_eq!(resolved.name(), expected.as_str());
                // Resolution is stable across repeated calls.
                let first = registry.resolve(&doc, el);
                let second = registry.resolve(&doc, el);
                prop_assert_eq!(
                    first.name(),
                    second.name()
                );

                let expected_other = order
                    .iter()
                    .enumerate()
                    .filter(|&(_, &i)| POOL[i] == "*")
                    .last()
                    .map_or_else(|| "default".to_string(), |(n, &i)| format!("{n}:{}", POOL[i]));
                let resolved_other = registry.resolve(&doc, other);
                prop_assert_eq!(resolved_other.name(), expected_other.as_str());
            }
        }
    }
}
