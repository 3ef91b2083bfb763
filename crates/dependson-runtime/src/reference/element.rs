#![forbid(unsafe_code)]

//! Simple references: one element per name and scope.
//!
//! # Invariants
//!
//! 1. Every entry's element was attached when last registered; entries for
//!    detached elements survive only until the next [`actualize`].
//! 2. Reclaiming an entry sets its value to [`Value::Undefined`] and bumps
//!    the name epoch, so every subscriber re-resolves on its next
//!    evaluation and never reads the detached element again.
//! 3. Resolution only returns attached elements.
//!
//! [`actualize`]: ElementReferenceRegistry::actualize

use ahash::AHashMap;
use dependson_core::dom::{Document, ElementId};
use dependson_core::value::{RefType, Value};
use dependson_widgets::registry::AccessorRegistry;

use crate::config::DependsOnConfig;
use crate::query::is_valid_reference_name;
use crate::reactive::Observable;

/// A registered simple reference.
#[derive(Debug, Clone)]
pub struct ElementReference {
    element: ElementId,
    name: String,
    ref_type: RefType,
    value: Observable<Value>,
}

impl ElementReference {
    #[must_use]
    pub fn element(&self) -> ElementId {
        self.element
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn ref_type(&self) -> RefType {
        self.ref_type
    }

    /// Shared handle to the current value.
    #[must_use]
    pub fn value(&self) -> &Observable<Value> {
        &self.value
    }
}

/// Registry of simple references keyed by element.
#[derive(Debug, Default)]
pub struct ElementReferenceRegistry {
    refs: AHashMap<ElementId, ElementReference>,
    epochs: AHashMap<String, Observable<u64>>,
}

impl ElementReferenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    #[must_use]
    pub fn get(&self, el: ElementId) -> Option<&ElementReference> {
        self.refs.get(&el)
    }

    /// Entries sorted by element id.
    #[must_use]
    pub fn entries(&self) -> Vec<&ElementReference> {
        let mut entries: Vec<_> = self.refs.values().collect();
        entries.sort_by_key(|r| r.element);
        entries
    }

    /// Epoch observable for `name`; bumped whenever the set of elements
    /// carrying that name changes.
    pub fn epoch(&mut self, name: &str) -> Observable<u64> {
        self.epochs
            .entry(name.to_string())
            .or_insert_with(|| Observable::new(0))
            .clone()
    }

    fn bump(&self, name: &str) {
        if let Some(epoch) = self.epochs.get(name) {
            epoch.update(|e| *e += 1);
        }
    }

    /// Register (or refresh) the reference declared on `el`.
    ///
    /// The name comes from the reference attribute; an empty attribute falls
    /// back to the element's `name` without its `./` prefix. Invalid names
    /// are skipped with a warning. Re-registering an unchanged declaration
    /// only refreshes the value.
    pub fn register_element(
        &mut self,
        doc: &Document,
        accessors: &AccessorRegistry,
        config: &DependsOnConfig,
        el: ElementId,
    ) -> Option<&ElementReference> {
        let declared = doc.attr(el, &config.reference_attr).unwrap_or("").trim();
        let name = if declared.is_empty() {
            doc.attr(el, "name")
                .unwrap_or("")
                .trim()
                .trim_start_matches("./")
                .to_string()
        } else {
            declared.to_string()
        };
        if !is_valid_reference_name(&name) {
            tracing::warn!(
                message = "dependson.reference.invalid_name",
                element = %el,
                name = %name
            );
            return None;
        }
        let ref_type = match doc.attr(el, &config.reftype_attr) {
            Some(raw) => raw.parse::<RefType>().unwrap_or_else(|error| {
                tracing::warn!(
                    message = "dependson.reference.invalid_type",
                    element = %el,
                    %error
                );
                RefType::Auto
            }),
            None => RefType::Auto,
        };
        let current = accessors.get_typed(doc, el, ref_type);

        let previous = self
            .refs
            .get(&el)
            .map(|r| (r.name.clone(), r.ref_type));
        match previous {
            Some((old_name, old_type)) if old_name == name && old_type == ref_type => {
                if let Some(existing) = self.refs.get(&el) {
                    existing.value.set(current);
                }
            }
            Some((old_name, _)) => {
                tracing::debug!(
                    message = "dependson.reference.redeclare",
                    element = %el,
                    from = %old_name,
                    to = %name
                );
                if let Some(existing) = self.refs.remove(&el) {
                    existing.value.set(Value::Undefined);
                }
                self.bump(&old_name);
                self.insert(el, name, ref_type, current);
            }
            None => {
                tracing::debug!(
                    message = "dependson.reference.register",
                    element = %el,
                    name = %name,
                    ref_type = %ref_type
                );
                self.insert(el, name, ref_type, current);
            }
        }
        self.refs.get(&el)
    }

    fn insert(&mut self, el: ElementId, name: String, ref_type: RefType, value: Value) {
        self.refs.insert(
            el,
            ElementReference {
                element: el,
                name: name.clone(),
                ref_type,
                value: Observable::new(value),
            },
        );
        self.bump(&name);
    }

    /// Reclaim entries whose element is no longer attached. Returns the
    /// number reclaimed.
    pub fn actualize(&mut self, doc: &Document) -> usize {
        let mut stale: Vec<ElementId> = self
            .refs
            .keys()
            .copied()
            .filter(|&el| !doc.is_attached(el))
            .collect();
        stale.sort_unstable();
        for el in &stale {
            if let Some(reference) = self.refs.remove(el) {
                reference.value.set(Value::Undefined);
                self.bump(&reference.name);
            }
        }
        if !stale.is_empty() {
            tracing::debug!(
                message = "dependson.reference.actualize",
                reclaimed = stale.len(),
                live = self.refs.len()
            );
        }
        stale.len()
    }

    /// Refresh every reference whose element is `target` or one of its
    /// ancestors. Returns the names whose value changed.
    pub fn handle_change(
        &self,
        doc: &Document,
        accessors: &AccessorRegistry,
        target: ElementId,
    ) -> Vec<String> {
        let mut changed = Vec::new();
        for el in std::iter::once(target).chain(doc.ancestors(target)) {
            let Some(reference) = self.refs.get(&el) else {
                continue;
            };
            let value = accessors.get_typed(doc, el, reference.ref_type);
            tracing::trace!(
                message = "dependson.reference.change",
                element = %el,
                name = %reference.name,
                value = %value
            );
            if reference.value.set(value) {
                changed.push(reference.name.clone());
            }
        }
        changed
    }

    /// Resolve `name` for an observer on `from`.
    ///
    /// With a `scope` root, the first matching element inside it in
    /// document order wins. Without one, the nearest ancestor of `from`
    /// (itself included) containing a match decides.
    #[must_use]
    pub fn resolve(
        &self,
        doc: &Document,
        from: ElementId,
        name: &str,
        scope: Option<ElementId>,
    ) -> Option<&ElementReference> {
        let candidates: Vec<ElementId> = self
            .refs
            .values()
            .filter(|r| r.name == name && doc.is_attached(r.element))
            .map(|r| r.element)
            .collect();
        let found = match (scope, candidates.as_slice()) {
            (_, []) => None,
            (Some(root), _) => first_in(doc, root, &candidates),
            (None, [only]) => Some(*only),
            (None, _) => std::iter::once(from)
                .chain(doc.ancestors(from))
                .find_map(|root| first_in(doc, root, &candidates)),
        };
        found.and_then(|el| self.refs.get(&el))
    }

    /// References named `name` inside `scope`, in document order.
    #[must_use]
    pub fn named_within(&self, doc: &Document, scope: ElementId, name: &str) -> Vec<&ElementReference> {
        std::iter::once(scope)
            .chain(doc.descendants(scope))
            .filter_map(|el| self.refs.get(&el))
            .filter(|r| r.name == name)
            .collect()
    }
}

fn first_in(doc: &Document, root: ElementId, candidates: &[ElementId]) -> Option<ElementId> {
    if candidates.contains(&root) {
        return Some(root);
    }
    doc.descendants(root)
        .into_iter()
        .find(|el| candidates.contains(el))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dependson_core::fixture::append;
    use std::cell::Cell;
    use std::rc::Rc;

    fn setup() -> (Document, AccessorRegistry, DependsOnConfig) {
        (
            Document::new(),
            AccessorRegistry::with_builtin(),
            DependsOnConfig::default(),
        )
    }

    #[test]
    fn registers_with_declared_or_derived_name() {
        let (mut doc, accessors, config) = setup();
        let root = doc.root();
        let a = append(&mut doc, root, "input", &[("data-dependsonref", "title"), ("value", "x")]);
        let b = append(&mut doc, root, "input", &[("data-dependsonref", ""), ("name", "./subtitle")]);
        let c = append(&mut doc, root, "input", &[("data-dependsonref", "bad name")]);

        let mut registry = ElementReferenceRegistry::new();
        let title = registry
            .register_element(&doc, &accessors, &config, a)
            .expect("registered");
        assert_eq!(title.name(), "title");
        assert_eq!(title.value().get(), Value::from("x"));
        assert_eq!(
            registry
                .register_element(&doc, &accessors, &config, b)
                .map(ElementReference::name),
            Some("subtitle")
        );
        assert!(registry.register_element(&doc, &accessors, &config, c).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn reftype_casts_value() {
        let (mut doc, accessors, config) = setup();
        let root = doc.root();
        let el = append(
            &mut doc,
            root,
            "input",
            &[("data-dependsonref", "n"), ("data-dependsonreftype", "number"), ("value", "12")],
        );
        let mut registry = ElementReferenceRegistry::new();
        let reference = registry
            .register_element(&doc, &accessors, &config, el)
            .expect("registered");
        assert_eq!(reference.ref_type(), RefType::Number);
        assert_eq!(reference.value().get(), Value::Number(12.0));
    }

    #[test]
    fn non_numeric_number_reference_is_stable() {
        let (mut doc, accessors, config) = setup();
        let root = doc.root();
        let el = append(
            &mut doc,
            root,
            "input",
            &[("data-dependsonref", "n"), ("data-dependsonreftype", "number"), ("value", "abc")],
        );
        let mut registry = ElementReferenceRegistry::new();
        let value = registry
            .register_element(&doc, &accessors, &config, el)
            .expect("registered")
            .value()
            .clone();
        let version = value.version();

        doc.set_value(el, "still not a number");
        assert!(registry.handle_change(&doc, &accessors, el).is_empty());
        registry.register_element(&doc, &accessors, &config, el);
        assert_eq!(value.version(), version);

        doc.set_value(el, "3");
        assert_eq!(registry.handle_change(&doc, &accessors, el), vec!["n".to_string()]);
    }

    #[test]
    fn reregistration_is_idempotent() {
        let (mut doc, accessors, config) = setup();
        let root = doc.root();
        let el = append(&mut doc, root, "input", &[("data-dependsonref", "a")]);
        let mut registry = ElementReferenceRegistry::new();
        let epoch = registry.epoch("a");
        registry.register_element(&doc, &accessors, &config, el);
        assert_eq!(epoch.get(), 1);
        registry.register_element(&doc, &accessors, &config, el);
        assert_eq!(epoch.get(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn actualize_reclaims_detached() {
        let (mut doc, accessors, config) = setup();
        let root = doc.root();
        let el = append(&mut doc, root, "input", &[("data-dependsonref", "gone"), ("value", "v")]);
        let mut registry = ElementReferenceRegistry::new();
        let value = registry
            .register_element(&doc, &accessors, &config, el)
            .expect("registered")
            .value()
            .clone();
        let notified = Rc::new(Cell::new(false));
        let _sub = {
            let notified = Rc::clone(&notified);
            value.subscribe(move |_| notified.set(true))
        };

        assert_eq!(registry.actualize(&doc), 0);
        doc.remove(el);
        assert_eq!(registry.actualize(&doc), 1);
        assert!(registry.is_empty());
        assert!(notified.get());
        assert_eq!(value.get(), Value::Undefined);
        assert!(registry.resolve(&doc, root, "gone", None).is_none());
    }

    #[test]
    fn handle_change_bubbles_to_referenced_ancestor() {
        let (mut doc, accessors, config) = setup();
        let root = doc.root();
        let group = append(
            &mut doc,
            root,
            "div",
            &[("class", "coral-RadioGroup"), ("data-dependsonref", "color")],
        );
        let red = append(&mut doc, group, "coral-radio", &[("value", "red")]);
        let mut registry = ElementReferenceRegistry::new();
        registry.register_element(&doc, &accessors, &config, group);

        doc.set_checked(red, true);
        assert_eq!(registry.handle_change(&doc, &accessors, red), vec!["color"]);
        assert_eq!(
            registry.get(group).map(|r| r.value().get()),
            Some(Value::from("red"))
        );
        assert!(registry.handle_change(&doc, &accessors, red).is_empty());
    }

    #[test]
    fn resolves_nearest_scope() {
        let (mut doc, accessors, config) = setup();
        let root = doc.root();
        let outer = append(&mut doc, root, "input", &[("data-dependsonref", "x"), ("value", "outer")]);
        let item = append(&mut doc, root, "section", &[]);
        let inner = append(&mut doc, item, "input", &[("data-dependsonref", "x"), ("value", "inner")]);
        let observer = append(&mut doc, item, "input", &[]);
        let elsewhere = append(&mut doc, root, "input", &[]);

        let mut registry = ElementReferenceRegistry::new();
        for el in [outer, inner] {
            registry.register_element(&doc, &accessors, &config, el);
        }
        let pick = |from, scope| registry.resolve(&doc, from, "x", scope).map(|r| r.element());
        assert_eq!(pick(observer, None), Some(inner));
        assert_eq!(pick(elsewhere, None), Some(outer));
        assert_eq!(pick(elsewhere, Some(item)), Some(inner));
        assert_eq!(pick(elsewhere, Some(root)), Some(outer));
    }
}
