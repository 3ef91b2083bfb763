#![forbid(unsafe_code)]

//! The accessor protocol.
//!
//! An [`Accessor`] abstracts one widget type's element shape behind
//! `get`/`set`/`visibility`/`disabled` (plus `readonly`/`required`). Only
//! [`Accessor::get`] must be implemented; every other method defaults to the
//! generic behaviour in [`defaults`], which operates on plain attributes.
//!
//! [`AccessorDescriptor`] builds an accessor from closures for widgets that
//! do not warrant a dedicated type.

use dependson_core::dom::{Document, ElementId};
use dependson_core::event::EventKind;
use dependson_core::value::{RefType, Value};

/// Class of the wrapper element that carries a field's label and chrome.
pub const FIELD_WRAPPER_CLASS: &str = "coral-Form-fieldwrapper";

/// Capability set of one widget type.
pub trait Accessor {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "custom"
    }

    /// Type references cast to when they declare [`RefType::Auto`].
    fn preferable_type(&self) -> RefType {
        RefType::String
    }

    /// Read the widget's current value.
    fn get(&self, doc: &Document, el: ElementId) -> Value;

    /// Write a value. When `notify` is set a change event is queued right
    /// after the mutation.
    fn set(&self, doc: &mut Document, el: ElementId, value: &Value, notify: bool) {
        defaults::set(doc, el, value, notify);
    }

    /// Show (`true`) or hide (`false`) the widget.
    fn visibility(&self, doc: &mut Document, el: ElementId, visible: bool) {
        defaults::visibility(doc, el, visible);
    }

    /// Disable (`true`) or enable (`false`) the widget.
    fn disabled(&self, doc: &mut Document, el: ElementId, disabled: bool) {
        defaults::disabled(doc, el, disabled);
    }

    /// Make the widget read-only.
    fn readonly(&self, doc: &mut Document, el: ElementId, readonly: bool) {
        defaults::readonly(doc, el, readonly);
    }

    /// Mark the widget as required.
    fn required(&self, doc: &mut Document, el: ElementId, required: bool) {
        defaults::required(doc, el, required);
    }
}

/// Generic implementations shared by every accessor.
pub mod defaults {
    use super::*;

    /// Nearest field wrapper around `el`, `el` included.
    #[must_use]
    pub fn field_wrapper(doc: &Document, el: ElementId) -> Option<ElementId> {
        std::iter::once(el)
            .chain(doc.ancestors(el))
            .find(|&candidate| doc.has_class(candidate, FIELD_WRAPPER_CLASS))
    }

    /// Write the text form into the `value` property.
    pub fn set(doc: &mut Document, el: ElementId, value: &Value, notify: bool) {
        doc.set_value(el, value.to_text());
        if notify {
            doc.trigger(el, EventKind::Change);
        }
    }

    /// Toggle `hidden` on the element and its field wrapper.
    pub fn visibility(doc: &mut Document, el: ElementId, visible: bool) {
        doc.toggle_attr(el, "hidden", !visible);
        if let Some(wrapper) = field_wrapper(doc, el).filter(|&w| w != el) {
            doc.toggle_attr(wrapper, "hidden", !visible);
        }
    }

    /// Toggle `disabled` on the element and its field wrapper.
    pub fn disabled(doc: &mut Document, el: ElementId, disabled: bool) {
        doc.toggle_attr(el, "disabled", disabled);
        if let Some(wrapper) = field_wrapper(doc, el).filter(|&w| w != el) {
            doc.toggle_attr(wrapper, "disabled", disabled);
        }
    }

    /// Toggle `readonly`.
    pub fn readonly(doc: &mut Document, el: ElementId, readonly: bool) {
        doc.toggle_attr(el, "readonly", readonly);
    }

    /// Toggle `required` and `aria-required`.
    pub fn required(doc: &mut Document, el: ElementId, required: bool) {
        doc.toggle_attr(el, "required", required);
        doc.toggle_attr(el, "aria-required", required);
    }
}

/// Accessor for plain inputs; used when nothing more specific matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAccessor;

impl Accessor for DefaultAccessor {
    fn name(&self) -> &str {
        "default"
    }

    fn get(&self, doc: &Document, el: ElementId) -> Value {
        Value::Text(doc.value(el).to_string())
    }
}

// ---------------------------------------------------------------------------
// Closure-built accessor
// ---------------------------------------------------------------------------

type GetFn = Box<dyn Fn(&Document, ElementId) -> Value>;
type SetFn = Box<dyn Fn(&mut Document, ElementId, &Value, bool)>;
type StateFn = Box<dyn Fn(&mut Document, ElementId, bool)>;

/// An accessor assembled from closures. Omitted operations fall back to
/// [`defaults`].
///
/// ```
/// use dependson_core::value::{RefType, Value};
/// use dependson_widgets::accessor::{Accessor, AccessorDescriptor};
///
/// let accessor = AccessorDescriptor::new("color-field", |doc, el| {
///     Value::Text(doc.attr(el, "data-color").unwrap_or("").to_string())
/// })
/// .with_preferable_type(RefType::String);
/// assert_eq!(accessor.name(), "color-field");
/// ```
pub struct AccessorDescriptor {
    name: String,
    preferable_type: RefType,
    get: GetFn,
    set: Option<SetFn>,
    visibility: Option<StateFn>,
    disabled: Option<StateFn>,
}

impl std::fmt::Debug for AccessorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorDescriptor")
            .field("name", &self.name)
            .field("preferable_type", &self.preferable_type)
            .field("set", &self.set.is_some())
            .field("visibility", &self.visibility.is_some())
            .field("disabled", &self.disabled.is_some())
            .finish()
    }
}

impl AccessorDescriptor {
    /// Create a descriptor with the mandatory `get`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        get: impl Fn(&Document, ElementId) -> Value + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            preferable_type: RefType::String,
            get: Box::new(get),
            set: None,
            visibility: None,
            disabled: None,
        }
    }

    /// Set the preferable reference type.
    #[must_use]
    pub fn with_preferable_type(mut self, ty: RefType) -> Self {
        self.preferable_type = ty;
        self
    }

    /// Provide a custom `set`.
    #[must_use]
    pub fn with_set(mut self, set: impl Fn(&mut Document, ElementId, &Value, bool) + 'static) -> Self {
        self.set = Some(Box::new(set));
        self
    }

    /// Provide a custom `visibility`.
    #[must_use]
    pub fn with_visibility(mut self, visibility: impl Fn(&mut Document, ElementId, bool) + 'static) -> Self {
        self.visibility = Some(Box::new(visibility));
        self
    }

    /// Provide a custom `disabled`.
    #[must_use]
    pub fn with_disabled(mut self, disabled: impl Fn(&mut Document, ElementId, bool) + 'static) -> Self {
        self.disabled = Some(Box::new(disabled));
        self
    }
}

impl Accessor for AccessorDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn preferable_type(&self) -> RefType {
        self.preferable_type
    }

    fn get(&self, doc: &Document, el: ElementId) -> Value {
        (self.get)(doc, el)
    }

    fn set(&self, doc: &mut Document, el: ElementId, value: &Value, notify: bool) {
        match &self.set {
            Some(set) => set(doc, el, value, notify),
            None => defaults::set(doc, el, value, notify),
        }
    }

    fn visibility(&self, doc: &mut Document, el: ElementId, visible: bool) {
        match &self.visibility {
            Some(visibility) => visibility(doc, el, visible),
            None => defaults::visibility(doc, el, visible),
        }
    }

    fn disabled(&self, doc: &mut Document, el: ElementId, disabled: bool) {
        match &self.disabled {
            Some(f) => f(doc, el, disabled),
            None => defaults::disabled(doc, el, disabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_in_wrapper() -> (Document, ElementId, ElementId) {
        let mut doc = Document::new();
        let wrapper = doc.create_element("div");
        doc.set_attr(wrapper, "class", FIELD_WRAPPER_CLASS);
        let input = doc.create_element("input");
        let root = doc.root();
        doc.append_child(root, wrapper);
        doc.append_child(wrapper, input);
        (doc, wrapper, input)
    }

    #[test]
    fn default_get_reads_value() {
        let (mut doc, _, input) = field_in_wrapper();
        doc.set_value(input, "hello");
        assert_eq!(DefaultAccessor.get(&doc, input), Value::from("hello"));
    }

    #[test]
    fn default_set_notifies_only_when_asked() {
        let (mut doc, _, input) = field_in_wrapper();
        DefaultAccessor.set(&mut doc, input, &Value::Number(5.0), false);
        assert_eq!(doc.value(input), "5");
        assert!(!doc.has_events());

        DefaultAccessor.set(&mut doc, input, &Value::from("x"), true);
        let event = doc.next_event().expect("change event");
        assert_eq!(event.kind, EventKind::Change);
        assert_eq!(event.target, input);
    }

    #[test]
    fn default_visibility_covers_wrapper() {
        let (mut doc, wrapper, input) = field_in_wrapper();
        DefaultAccessor.visibility(&mut doc, input, false);
        assert!(doc.has_attr(input, "hidden"));
        assert!(doc.has_attr(wrapper, "hidden"));
        DefaultAccessor.visibility(&mut doc, input, true);
        assert!(!doc.has_attr(input, "hidden"));
        assert!(!doc.has_attr(wrapper, "hidden"));
    }

    #[test]
    fn default_disabled_and_required() {
        let (mut doc, wrapper, input) = field_in_wrapper();
        DefaultAccessor.disabled(&mut doc, input, true);
        assert!(doc.has_attr(input, "disabled"));
        assert!(doc.has_attr(wrapper, "disabled"));
        DefaultAccessor.required(&mut doc, input, true);
        assert_eq!(doc.attr(input, "aria-required"), Some("true"));
        DefaultAccessor.required(&mut doc, input, false);
        assert!(!doc.has_attr(input, "required"));
    }

    #[test]
    fn descriptor_falls_back_to_defaults() {
        let (mut doc, _, input) = field_in_wrapper();
        doc.set_attr(input, "data-color", "red");
        let accessor = AccessorDescriptor::new("color", |doc, el| {
            Value::Text(doc.attr(el, "data-color").unwrap_or("").to_string())
        });
        assert_eq!(accessor.get(&doc, input), Value::from("red"));
        accessor.visibility(&mut doc, input, false);
        assert!(doc.has_attr(input, "hidden"));
        accessor.set(&mut doc, input, &Value::from("blue"), false);
        assert_eq!(doc.value(input), "blue");
    }

    #[test]
    fn descriptor_custom_set_is_used() {
        let (mut doc, _, input) = field_in_wrapper();
        let accessor = AccessorDescriptor::new("color", |doc, el| {
            Value::Text(doc.attr(el, "data-color").unwrap_or("").to_string())
        })
        .with_set(|doc, el, value, _| doc.set_attr(el, "data-color", value.to_text()));
        accessor.set(&mut doc, input, &Value::from("green"), false);
        assert_eq!(accessor.get(&doc, input), Value::from("green"));
        assert_eq!(doc.value(input), "");
    }
}
