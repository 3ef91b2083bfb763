#![forbid(unsafe_code)]

//! Group references: every element sharing a name inside a scope.
//!
//! A group is keyed by `(name, scope root)` and created the first time an
//! observer reads it. Its value is the ordered list of member values; the
//! member count is exposed next to it. Membership is recomputed on every
//! [`actualize`](GroupReferenceRegistry::actualize), because adding or
//! removing collection items changes membership without changing any
//! existing member's value.

use dependson_core::dom::{Document, ElementId};
use dependson_core::value::Value;

use super::element::ElementReferenceRegistry;
use crate::query::GroupSnapshot;
use crate::reactive::Observable;

/// One live group reference.
#[derive(Debug, Clone)]
pub struct GroupReference {
    name: String,
    scope: ElementId,
    members: Vec<ElementId>,
    value: Observable<Value>,
}

impl GroupReference {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn scope(&self) -> ElementId {
        self.scope
    }

    /// Member elements in document order.
    #[must_use]
    pub fn members(&self) -> &[ElementId] {
        &self.members
    }

    /// Shared handle to the member value list.
    #[must_use]
    pub fn value(&self) -> &Observable<Value> {
        &self.value
    }

    /// Values and count as handed to evaluators.
    #[must_use]
    pub fn snapshot(&self) -> GroupSnapshot {
        let values = match self.value.get() {
            Value::List(values) => values,
            _ => Vec::new(),
        };
        GroupSnapshot {
            count: self.members.len(),
            values,
        }
    }

    fn refresh(&mut self, doc: &Document, elements: &ElementReferenceRegistry) -> bool {
        let members = elements.named_within(doc, self.scope, &self.name);
        let values = Value::List(members.iter().map(|r| r.value().get()).collect());
        self.members = members.iter().map(|r| r.element()).collect();
        self.value.set(values)
    }
}

/// Registry of group references.
#[derive(Debug, Default)]
pub struct GroupReferenceRegistry {
    groups: Vec<GroupReference>,
}

impl GroupReferenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupReference> {
        self.groups.iter()
    }

    /// The group for `name` inside `scope`, created on first use.
    pub fn resolve(
        &mut self,
        doc: &Document,
        elements: &ElementReferenceRegistry,
        name: &str,
        scope: ElementId,
    ) -> &GroupReference {
        let index = match self
            .groups
            .iter()
            .position(|g| g.name == name && g.scope == scope)
        {
            Some(index) => index,
            None => {
                let mut group = GroupReference {
                    name: name.to_string(),
                    scope,
                    members: Vec::new(),
                    value: Observable::new(Value::List(Vec::new())),
                };
                group.refresh(doc, elements);
                tracing::debug!(
                    message = "dependson.group.create",
                    name = %name,
                    scope = %scope,
                    members = group.members.len()
                );
                self.groups.push(group);
                self.groups.len() - 1
            }
        };
        &self.groups[index]
    }

    /// Drop groups whose scope is detached and recompute the membership of
    /// the rest. Returns the number of groups whose value changed.
    pub fn actualize(&mut self, doc: &Document, elements: &ElementReferenceRegistry) -> usize {
        let before = self.groups.len();
        self.groups.retain(|group| {
            let live = doc.is_attached(group.scope);
            if !live {
                group.value.set(Value::Undefined);
            }
            live
        });
        let dropped = before - self.groups.len();
        let changed = self
            .groups
            .iter_mut()
            .map(|group| group.refresh(doc, elements))
            .filter(|&changed| changed)
            .count();
        tracing::debug!(
            message = "dependson.group.actualize",
            dropped,
            changed,
            live = self.groups.len()
        );
        changed
    }

    /// Recompute groups named in `names` whose scope contains `target`.
    pub fn handle_change(
        &mut self,
        doc: &Document,
        elements: &ElementReferenceRegistry,
        target: ElementId,
        names: &[String],
    ) -> usize {
        self.groups
            .iter_mut()
            .filter(|g| names.contains(&g.name) && doc.contains(g.scope, target))
            .map(|group| group.refresh(doc, elements))
            .filter(|&changed| changed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DependsOnConfig;
    use dependson_core::fixture::append;
    use dependson_widgets::registry::AccessorRegistry;

    fn item(doc: &mut Document, parent: ElementId, value: &str) -> ElementId {
        let wrapper = append(doc, parent, "coral-multifield-item", &[]);
        append(doc, wrapper, "input", &[("data-dependsonref", "items"), ("value", value)])
    }

    #[test]
    fn group_tracks_membership() {
        let mut doc = Document::new();
        let accessors = AccessorRegistry::with_builtin();
        let config = DependsOnConfig::default();
        let root = doc.root();
        let list = append(&mut doc, root, "coral-multifield", &[]);
        let first = item(&mut doc, list, "a");
        let second = item(&mut doc, list, "b");

        let mut elements = ElementReferenceRegistry::new();
        for el in [first, second] {
            elements.register_element(&doc, &accessors, &config, el);
        }
        let mut groups = GroupReferenceRegistry::new();
        let snapshot = groups.resolve(&doc, &elements, "items", list).snapshot();
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.values, vec![Value::from("a"), Value::from("b")]);

        let third = item(&mut doc, list, "c");
        elements.register_element(&doc, &accessors, &config, third);
        assert_eq!(groups.actualize(&doc, &elements), 1);
        assert_eq!(groups.resolve(&doc, &elements, "items", list).snapshot().count, 3);

        let first_item = doc.parent(first).expect("wrapped");
        doc.remove(first_item);
        elements.actualize(&doc);
        groups.actualize(&doc, &elements);
        let group = groups.resolve(&doc, &elements, "items", list);
        assert_eq!(group.members(), &[second, third]);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn value_change_propagates_to_group() {
        let mut doc = Document::new();
        let accessors = AccessorRegistry::with_builtin();
        let config = DependsOnConfig::default();
        let root = doc.root();
        let list = append(&mut doc, root, "coral-multifield", &[]);
        let only = item(&mut doc, list, "a");
        let mut elements = ElementReferenceRegistry::new();
        elements.register_element(&doc, &accessors, &config, only);
        let mut groups = GroupReferenceRegistry::new();
        let value = groups.resolve(&doc, &elements, "items", root).value().clone();

        doc.set_value(only, "z");
        let names = elements.handle_change(&doc, &accessors, only);
        assert_eq!(groups.handle_change(&doc, &elements, only, &names), 1);
        assert_eq!(value.get(), Value::List(vec![Value::from("z")]));
    }

    #[test]
    fn detached_scope_is_dropped() {
        let mut doc = Document::new();
        let elements = ElementReferenceRegistry::new();
        let root = doc.root();
        let list = append(&mut doc, root, "coral-multifield", &[]);
        let mut groups = GroupReferenceRegistry::new();
        let value = groups.resolve(&doc, &elements, "items", list).value().clone();
        doc.remove(list);
        groups.actualize(&doc, &elements);
        assert!(groups.is_empty());
        assert_eq!(value.get(), Value::Undefined);
    }
}
