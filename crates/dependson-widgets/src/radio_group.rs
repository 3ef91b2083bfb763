#![forbid(unsafe_code)]

//! Radio group accessor.
//!
//! The group's value is the value of its checked member, or the empty
//! string when none is checked. Writing a value re-synchronises the whole
//! group: exactly the members whose value equals the written one end up
//! checked, every other member is unchecked.

use dependson_core::dom::{Document, ElementId};
use dependson_core::event::EventKind;
use dependson_core::selector::Selector;
use dependson_core::value::{RefType, Value};

use crate::accessor::Accessor;

/// Elements handled by [`RadioGroupAccessor`].
pub const RADIO_GROUP_SELECTOR: &str = ".coral-RadioGroup";

/// Members of a radio group.
pub const RADIO_MEMBER_SELECTOR: &str = r#"coral-radio,input[type="radio"]"#;

/// String accessor over a group of radio members.
#[derive(Debug, Clone)]
pub struct RadioGroupAccessor {
    members: Selector,
}

impl Default for RadioGroupAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioGroupAccessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: Selector::parse(RADIO_MEMBER_SELECTOR)
                .expect("radio member selector is valid"),
        }
    }

    fn members(&self, doc: &Document, group: ElementId) -> Vec<ElementId> {
        doc.query_all(group, &self.members)
    }
}

impl Accessor for RadioGroupAccessor {
    fn name(&self) -> &str {
        "radio-group"
    }

    fn preferable_type(&self) -> RefType {
        RefType::String
    }

    fn get(&self, doc: &Document, el: ElementId) -> Value {
        self.members(doc, el)
            .into_iter()
            .find(|&member| doc.checked(member))
            .map_or_else(
                || Value::Text(String::new()),
                |member| Value::Text(doc.value(member).to_string()),
            )
    }

    fn set(&self, doc: &mut Document, el: ElementId, value: &Value, notify: bool) {
        let wanted = value.to_text();
        for member in self.members(doc, el) {
            let checked = doc.value(member) == wanted;
            doc.set_checked(member, checked);
        }
        if notify {
            doc.trigger(el, EventKind::Change);
        }
    }
}
