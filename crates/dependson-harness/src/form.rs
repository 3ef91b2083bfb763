#![forbid(unsafe_code)]

//! Form fixtures.
//!
//! [`FormFixture`] owns a [`Document`] with a single `<form>` under the body
//! and builds the widget shapes the built-in accessors understand. The
//! interaction helpers mutate the document the way a user would and queue
//! the matching host event; nothing runs until the engine is pumped.

use dependson_core::dom::{Document, ElementId};
use dependson_core::event::EventKind;
use dependson_core::fixture::append;
use dependson_widgets::FIELD_WRAPPER_CLASS;

const REFERENCE_ATTR: &str = "data-dependsonref";

/// An input inside its field wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub wrapper: ElementId,
    pub input: ElementId,
}

/// A repeatable collection and the member inputs it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub element: ElementId,
    pub name: String,
    pub items: Vec<ElementId>,
}

/// Builder for a single authoring form.
#[derive(Debug)]
pub struct FormFixture {
    doc: Document,
    form: ElementId,
}

impl Default for FormFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl FormFixture {
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        let form = append(&mut doc, root, "form", &[("class", "coral-Form")]);
        Self { doc, form }
    }

    #[must_use]
    pub fn form(&self) -> ElementId {
        self.form
    }

    #[must_use]
    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// A checkbox declaring reference `name`.
    pub fn checkbox(&mut self, name: &str) -> ElementId {
        let field = self.wrapped(
            self.form,
            "input",
            &[("type", "checkbox"), (REFERENCE_ATTR, name)],
        );
        field.input
    }

    /// A switch whose internal native input carries the switch class.
    pub fn switch(&mut self, name: &str) -> ElementId {
        let field = self.wrapped(self.form, "coral-switch", &[(REFERENCE_ATTR, name)]);
        append(
            &mut self.doc,
            field.input,
            "input",
            &[("type", "checkbox"), ("class", "coral3-Switch-input")],
        );
        field.input
    }

    /// A wrapped text input with extra attributes.
    pub fn text_field(&mut self, attrs: &[(&str, &str)]) -> Field {
        let mut all = vec![("type", "text")];
        all.extend_from_slice(attrs);
        self.wrapped(self.form, "input", &all)
    }

    /// A wrapped text input declaring reference `name` with `value`.
    pub fn text_reference(&mut self, name: &str, value: &str) -> Field {
        self.text_field(&[(REFERENCE_ATTR, name), ("value", value)])
    }

    /// A wrapped text input controlled by `query`.
    pub fn dependent(&mut self, query: &str, attrs: &[(&str, &str)]) -> Field {
        let mut all = vec![("data-dependson", query)];
        all.extend_from_slice(attrs);
        self.text_field(&all)
    }

    /// A radio group declaring reference `name`, one radio per value.
    pub fn radio_group(&mut self, name: &str, values: &[&str]) -> (ElementId, Vec<ElementId>) {
        let group = append(
            &mut self.doc,
            self.form,
            "div",
            &[("class", "coral-RadioGroup"), (REFERENCE_ATTR, name)],
        );
        let radios = values
            .iter()
            .map(|value| {
                append(
                    &mut self.doc,
                    group,
                    "input",
                    &[("type", "radio"), ("name", name), ("value", *value)],
                )
            })
            .collect();
        (group, radios)
    }

    /// A multi-select declaring reference `name`.
    pub fn multi_select(&mut self, name: &str, options: &[&str]) -> (ElementId, Vec<ElementId>) {
        let select = append(
            &mut self.doc,
            self.form,
            "select",
            &[("multiple", ""), (REFERENCE_ATTR, name)],
        );
        let items = options
            .iter()
            .map(|value| append(&mut self.doc, select, "option", &[("value", *value)]))
            .collect();
        (select, items)
    }

    /// A `coral-multifield` whose members declare reference `name`.
    pub fn multifield(&mut self, name: &str, values: &[&str]) -> Collection {
        let element = append(&mut self.doc, self.form, "coral-multifield", &[]);
        let mut collection = Collection {
            element,
            name: name.to_string(),
            items: Vec::new(),
        };
        for value in values {
            let input = self.push_member(&collection, value);
            collection.items.push(input);
        }
        collection
    }

    /// Add a member to `collection` and announce it.
    pub fn add_item(&mut self, collection: &mut Collection, value: &str) -> ElementId {
        let input = self.push_member(collection, value);
        collection.items.push(input);
        self.doc.trigger(collection.element, EventKind::CollectionAdd);
        input
    }

    /// Remove the member at `index` and announce it.
    pub fn remove_item(&mut self, collection: &mut Collection, index: usize) -> Option<ElementId> {
        if index >= collection.items.len() {
            return None;
        }
        let input = collection.items.remove(index);
        let item = self.doc.parent(input).unwrap_or(input);
        self.doc.remove(item);
        self.doc
            .trigger(collection.element, EventKind::CollectionRemove);
        Some(input)
    }

    /// Check or uncheck a toggle and announce the change.
    pub fn set_checked(&mut self, el: ElementId, checked: bool) {
        self.doc.set_checked(el, checked);
        self.doc.trigger(el, EventKind::Change);
    }

    /// Type `text` into an input and announce the change.
    pub fn type_text(&mut self, el: ElementId, text: &str) {
        self.doc.set_value(el, text);
        self.doc.trigger(el, EventKind::Change);
    }

    /// Pick the radio in `radios` whose value is `value`.
    pub fn pick_radio(&mut self, radios: &[ElementId], value: &str) {
        let mut picked = None;
        for &radio in radios {
            let on = self.doc.value(radio) == value;
            self.doc.set_checked(radio, on);
            if on {
                picked = Some(radio);
            }
        }
        if let Some(radio) = picked {
            self.doc.trigger(radio, EventKind::Change);
        }
    }

    fn push_member(&mut self, collection: &Collection, value: &str) -> ElementId {
        let item = append(&mut self.doc, collection.element, "coral-multifield-item", &[]);
        append(
            &mut self.doc,
            item,
            "input",
            &[("type", "text"), (REFERENCE_ATTR, collection.name.as_str()), ("value", value)],
        )
    }

    fn wrapped(&mut self, parent: ElementId, tag: &str, attrs: &[(&str, &str)]) -> Field {
        let wrapper = append(&mut self.doc, parent, "div", &[("class", FIELD_WRAPPER_CLASS)]);
        let input = append(&mut self.doc, wrapper, tag, attrs);
        Field { wrapper, input }
    }
}
