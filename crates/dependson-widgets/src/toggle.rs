#![forbid(unsafe_code)]

//! Single checkbox, radio button, and switch accessor.

use dependson_core::dom::{Document, ElementId};
use dependson_core::event::EventKind;
use dependson_core::value::{RefType, Value};

use crate::accessor::{Accessor, defaults};

/// Elements handled by [`ToggleAccessor`].
pub const TOGGLE_SELECTOR: &str =
    r#"input[type="radio"],input[type="checkbox"],coral-radio,coral-checkbox,coral-switch"#;

/// Class of the native input a switch renders inside itself.
pub const SWITCH_INPUT_CLASS: &str = "coral3-Switch-input";

/// Boolean accessor reading and writing the `checked` property.
///
/// Hiding a switch also flips its internal native input to `type="hidden"`
/// so the hidden field stays out of native form validation while its
/// checked state remains readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToggleAccessor;

impl Accessor for ToggleAccessor {
    fn name(&self) -> &str {
        "toggle"
    }

    fn preferable_type(&self) -> RefType {
        RefType::Boolean
    }

    fn get(&self, doc: &Document, el: ElementId) -> Value {
        Value::Bool(doc.checked(el))
    }

    fn set(&self, doc: &mut Document, el: ElementId, value: &Value, notify: bool) {
        doc.set_checked(el, value.is_truthy());
        if notify {
            doc.trigger(el, EventKind::Change);
        }
    }

    fn visibility(&self, doc: &mut Document, el: ElementId, visible: bool) {
        let inputs: Vec<ElementId> = doc
            .descendants(el)
            .into_iter()
            .filter(|&d| doc.has_class(d, SWITCH_INPUT_CLASS))
            .collect();
        for input in inputs {
            doc.set_attr(input, "type", if visible { "text" } else { "hidden" });
        }
        defaults::visibility(doc, el, visible);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set_checked() {
        let mut doc = Document::new();
        let checkbox = doc.create_element("coral-checkbox");
        assert_eq!(ToggleAccessor.get(&doc, checkbox), Value::Bool(false));
        ToggleAccessor.set(&mut doc, checkbox, &Value::from("on"), false);
        assert!(doc.checked(checkbox));
        ToggleAccessor.set(&mut doc, checkbox, &Value::Bool(false), true);
        assert!(!doc.checked(checkbox));
        assert_eq!(doc.next_event().map(|e| e.kind), Some(EventKind::Change));
    }

    #[test]
    fn hiding_switch_hides_internal_input() {
        let mut doc = Document::new();
        let switch = doc.create_element("coral-switch");
        let input = doc.create_element("input");
        doc.set_attr(input, "class", SWITCH_INPUT_CLASS);
        doc.set_attr(input, "type", "text");
        doc.append_child(switch, input);

        ToggleAccessor.visibility(&mut doc, switch, false);
        assert_eq!(doc.attr(input, "type"), Some("hidden"));
        assert!(doc.has_attr(switch, "hidden"));

        ToggleAccessor.visibility(&mut doc, switch, true);
        assert_eq!(doc.attr(input, "type"), Some("text"));
        assert!(!doc.has_attr(switch, "hidden"));
    }
}
