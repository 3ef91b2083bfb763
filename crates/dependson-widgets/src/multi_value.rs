#![forbid(unsafe_code)]

//! Multi-value select accessor.

use dependson_core::dom::{Document, ElementId};
use dependson_core::event::EventKind;
use dependson_core::selector::Selector;
use dependson_core::value::{RefType, Value};

use crate::accessor::Accessor;

/// Elements handled by [`MultiValueAccessor`].
pub const MULTI_VALUE_SELECTOR: &str = "select[multiple],coral-select[multiple]";

/// Option elements inside a multi-value select.
pub const OPTION_SELECTOR: &str = "option,coral-select-item";

/// List accessor: the value is the ordered list of selected option values.
#[derive(Debug, Clone)]
pub struct MultiValueAccessor {
    options: Selector,
}

impl Default for MultiValueAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiValueAccessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: Selector::parse(OPTION_SELECTOR).expect("option selector is valid"),
        }
    }
}

impl Accessor for MultiValueAccessor {
    fn name(&self) -> &str {
        "multi-value"
    }

    fn preferable_type(&self) -> RefType {
        RefType::Any
    }

    fn get(&self, doc: &Document, el: ElementId) -> Value {
        Value::List(
            doc.query_all(el, &self.options)
                .into_iter()
                .filter(|&option| doc.has_attr(option, "selected"))
                .map(|option| Value::Text(doc.value(option).to_string()))
                .collect(),
        )
    }

    /// Select exactly the options whose value is listed. A scalar selects a
    /// single option; `Undefined`/`Null` clear the selection.
    fn set(&self, doc: &mut Document, el: ElementId, value: &Value, notify: bool) {
        let wanted: Vec<String> = match value {
            Value::List(items) => items.iter().map(Value::to_text).collect(),
            Value::Undefined | Value::Null => Vec::new(),
            other => vec![other.to_text()],
        };
        for option in doc.query_all(el, &self.options) {
            let selected = wanted.iter().any(|w| w == doc.value(option));
            doc.toggle_attr(option, "selected", selected);
        }
        if notify {
            doc.trigger(el, EventKind::Change);
        }
    }
}
