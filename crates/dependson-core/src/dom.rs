#![forbid(unsafe_code)]

//! Element document model.
//!
//! A [`Document`] is an arena of elements addressed by [`ElementId`]. It
//! carries exactly the structure the dependency engine consumes from a host
//! page: tag names, attributes, the `checked`/`value` properties of form
//! controls, parent/child links, and an event outbox.
//!
//! # Invariants
//!
//! 1. The root element exists for the whole document lifetime and is always
//!    attached.
//! 2. An element is attached iff its parent chain reaches the root.
//! 3. Removing an element detaches its subtree but keeps every id readable,
//!    so holders of stale ids can detect detachment instead of dangling.
//! 4. The parent/child relation is a forest: `append_child` refuses to make
//!    an element its own ancestor.
//! 5. Events are delivered in the order they were triggered.
//!
//! # Failure Modes
//!
//! - Unknown id passed to a getter: returns the empty/default answer.
//! - Unknown id passed to a mutator: the call is a no-op and returns `false`
//!   where a status is reported.

use std::collections::VecDeque;
use std::fmt;

use ahash::AHashMap;

use crate::event::{DomEvent, EventKind};
use crate::selector::Selector;

/// Stable identifier of an element inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    checked: bool,
    value: Option<String>,
    pending: bool,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
            checked: false,
            value: None,
            pending: false,
        }
    }
}

/// Arena-backed element tree with an event outbox.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: AHashMap<ElementId, Node>,
    root: ElementId,
    next_id: u64,
    outbox: VecDeque<DomEvent>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only its `body` root.
    #[must_use]
    pub fn new() -> Self {
        let root = ElementId(0);
        let mut nodes = AHashMap::new();
        nodes.insert(root, Node::new("body"));
        Self {
            nodes,
            root,
            next_id: 1,
            outbox: VecDeque::new(),
        }
    }

    /// The always-attached root element.
    #[inline]
    #[must_use]
    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Number of elements ever created (attached or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document holds nothing but its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    // ── Structure ────────────────────────────────────────────────────

    /// Create a detached element. Tag names are stored lowercase.
    pub fn create_element(&mut self, tag: &str) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(tag));
        id
    }

    /// Whether `el` was created by this document.
    #[must_use]
    pub fn exists(&self, el: ElementId) -> bool {
        self.nodes.contains_key(&el)
    }

    /// Append `child` as the last child of `parent`, moving it if it already
    /// has a parent. Returns `false` if either id is unknown or the move
    /// would create a cycle.
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) -> bool {
        if !self.can_adopt(parent, child) {
            return false;
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        true
    }

    /// Insert `child` into `parent` right before `reference`. Falls back to
    /// appending when `reference` is not a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: ElementId,
        child: ElementId,
        reference: ElementId,
    ) -> bool {
        if !self.can_adopt(parent, child) || child == reference {
            return false;
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            let index = node
                .children
                .iter()
                .position(|&c| c == reference)
                .unwrap_or(node.children.len());
            node.children.insert(index, child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        true
    }

    /// Detach `el` (and with it its subtree) from its parent.
    ///
    /// The root cannot be removed. Returns `true` if the element had a
    /// parent.
    pub fn remove(&mut self, el: ElementId) -> bool {
        if el == self.root {
            return false;
        }
        self.detach(el)
    }

    fn detach(&mut self, el: ElementId) -> bool {
        let Some(parent) = self.nodes.get_mut(&el).and_then(|n| n.parent.take()) else {
            return false;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|&c| c != el);
        }
        true
    }

    fn can_adopt(&self, parent: ElementId, child: ElementId) -> bool {
        if !self.exists(parent) || !self.exists(child) || child == self.root {
            return false;
        }
        // The new parent must not live inside the child's subtree.
        !self.contains(child, parent)
    }

    /// Whether the parent chain of `el` reaches the root.
    #[must_use]
    pub fn is_attached(&self, el: ElementId) -> bool {
        if !self.exists(el) {
            return false;
        }
        let mut current = el;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Parent of `el`, if any.
    #[must_use]
    pub fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.nodes.get(&el).and_then(|n| n.parent)
    }

    /// Children of `el` in document order.
    #[must_use]
    pub fn children(&self, el: ElementId) -> &[ElementId] {
        self.nodes.get(&el).map_or(&[], |n| n.children.as_slice())
    }

    /// Lowercase tag name of `el`.
    #[must_use]
    pub fn tag(&self, el: ElementId) -> Option<&str> {
        self.nodes.get(&el).map(|n| n.tag.as_str())
    }

    /// Iterate the proper ancestors of `el`, nearest first.
    pub fn ancestors(&self, el: ElementId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(el),
        }
    }

    /// All descendants of `el` (excluding `el`) in document (pre-)order.
    #[must_use]
    pub fn descendants(&self, el: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.children(el).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Whether `el` is `ancestor` or lives inside its subtree.
    #[must_use]
    pub fn contains(&self, ancestor: ElementId, el: ElementId) -> bool {
        (el == ancestor && self.exists(el)) || self.ancestors(el).any(|a| a == ancestor)
    }

    // ── Attributes ───────────────────────────────────────────────────

    /// Attribute value, if present.
    #[must_use]
    pub fn attr(&self, el: ElementId, name: &str) -> Option<&str> {
        self.nodes.get(&el).and_then(|n| {
            n.attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        })
    }

    /// Whether the attribute is present (with any value).
    #[must_use]
    pub fn has_attr(&self, el: ElementId, name: &str) -> bool {
        self.attr(el, name).is_some()
    }

    /// Set or replace an attribute.
    pub fn set_attr(&mut self, el: ElementId, name: &str, value: impl Into<String>) {
        let Some(node) = self.nodes.get_mut(&el) else {
            return;
        };
        let value = value.into();
        match node.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => node.attributes.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute. Returns `true` if it was present.
    pub fn remove_attr(&mut self, el: ElementId, name: &str) -> bool {
        let Some(node) = self.nodes.get_mut(&el) else {
            return false;
        };
        let before = node.attributes.len();
        node.attributes.retain(|(key, _)| key != name);
        node.attributes.len() < before
    }

    /// Set the attribute when `on`, remove it otherwise.
    pub fn toggle_attr(&mut self, el: ElementId, name: &str, on: bool) {
        if on {
            self.set_attr(el, name, "true");
        } else {
            self.remove_attr(el, name);
        }
    }

    /// Attributes of `el` in insertion order.
    pub fn attributes(&self, el: ElementId) -> impl Iterator<Item = (&str, &str)> {
        self.nodes
            .get(&el)
            .into_iter()
            .flat_map(|n| n.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Whether the whitespace-separated `class` attribute contains `class`.
    #[must_use]
    pub fn has_class(&self, el: ElementId, class: &str) -> bool {
        self.attr(el, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    // ── Form control properties ─────────────────────────────────────

    /// The `checked` property.
    #[must_use]
    pub fn checked(&self, el: ElementId) -> bool {
        self.nodes.get(&el).is_some_and(|n| n.checked)
    }

    /// Set the `checked` property. No event is emitted.
    pub fn set_checked(&mut self, el: ElementId, checked: bool) {
        if let Some(node) = self.nodes.get_mut(&el) {
            node.checked = checked;
        }
    }

    /// The `value` property, falling back to the `value` attribute until the
    /// property is written for the first time.
    #[must_use]
    pub fn value(&self, el: ElementId) -> &str {
        match self.nodes.get(&el) {
            Some(Node { value: Some(value), .. }) => value.as_str(),
            Some(_) => self.attr(el, "value").unwrap_or(""),
            None => "",
        }
    }

    /// Set the `value` property. No event is emitted.
    pub fn set_value(&mut self, el: ElementId, value: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(&el) {
            node.value = Some(value.into());
        }
    }

    // ── Component readiness ──────────────────────────────────────────

    /// Mark `el` as still running its own asynchronous setup.
    pub fn set_pending(&mut self, el: ElementId, pending: bool) {
        if let Some(node) = self.nodes.get_mut(&el) {
            node.pending = pending;
        }
    }

    /// Whether `el` is still setting itself up.
    #[must_use]
    pub fn is_pending(&self, el: ElementId) -> bool {
        self.nodes.get(&el).is_some_and(|n| n.pending)
    }

    /// Whether neither `container` nor any descendant is pending.
    #[must_use]
    pub fn is_ready(&self, container: ElementId) -> bool {
        !self.is_pending(container)
            && !self
                .descendants(container)
                .into_iter()
                .any(|el| self.is_pending(el))
    }

    /// Finish the asynchronous setup of `el` and announce it.
    pub fn mark_ready(&mut self, el: ElementId) {
        if self.is_pending(el) {
            self.set_pending(el, false);
            self.trigger(el, EventKind::ComponentReady);
        }
    }

    // ── Selectors ────────────────────────────────────────────────────

    /// Whether `el` matches `selector`.
    #[must_use]
    pub fn matches(&self, el: ElementId, selector: &Selector) -> bool {
        selector.matches(self, el)
    }

    /// Nearest element, starting with `el` itself, that matches `selector`.
    #[must_use]
    pub fn closest(&self, el: ElementId, selector: &Selector) -> Option<ElementId> {
        if !self.exists(el) {
            return None;
        }
        std::iter::once(el)
            .chain(self.ancestors(el))
            .find(|&candidate| selector.matches(self, candidate))
    }

    /// Descendants of `container` matching `selector`, in document order.
    #[must_use]
    pub fn query_all(&self, container: ElementId, selector: &Selector) -> Vec<ElementId> {
        self.descendants(container)
            .into_iter()
            .filter(|&el| selector.matches(self, el))
            .collect()
    }

    /// Descendants of `container` carrying attribute `name`, in document
    /// order.
    #[must_use]
    pub fn query_attr(&self, container: ElementId, name: &str) -> Vec<ElementId> {
        self.descendants(container)
            .into_iter()
            .filter(|&el| self.has_attr(el, name))
            .collect()
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Queue an event targeted at `el`.
    pub fn trigger(&mut self, el: ElementId, kind: EventKind) {
        if self.exists(el) {
            self.outbox.push_back(DomEvent { target: el, kind });
        }
    }

    /// Take the oldest queued event.
    pub fn next_event(&mut self) -> Option<DomEvent> {
        self.outbox.pop_front()
    }

    /// Whether any event is waiting for delivery.
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Drain every queued event.
    pub fn take_events(&mut self) -> Vec<DomEvent> {
        self.outbox.drain(..).collect()
    }
}

/// Iterator over the proper ancestors of an element, nearest first.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<ElementId>,
}

impl Iterator for Ancestors<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
