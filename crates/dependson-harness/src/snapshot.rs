#![forbid(unsafe_code)]

//! JSONL state dumps.
//!
//! One line per element with the attributes actions touch, so a scenario's
//! end state can be compared as a whole or logged on failure.

use dependson_core::dom::{Document, ElementId};
use serde_json::{Value as Json, json};

const STATE_ATTRS: [&str; 5] = ["hidden", "disabled", "readonly", "required", "aria-invalid"];

/// State of `el` as a JSON object.
#[must_use]
pub fn element_state(doc: &Document, el: ElementId) -> Json {
    let mut state = serde_json::Map::new();
    state.insert("element".into(), json!(el.to_string()));
    state.insert("tag".into(), json!(doc.tag(el).unwrap_or("?")));
    state.insert("attached".into(), json!(doc.is_attached(el)));
    for attr in STATE_ATTRS {
        state.insert(attr.into(), json!(doc.has_attr(el, attr)));
    }
    state.insert("value".into(), json!(doc.value(el)));
    state.insert("checked".into(), json!(doc.checked(el)));
    Json::Object(state)
}

/// One JSON line per element in `els`.
#[must_use]
pub fn state_jsonl(doc: &Document, els: &[ElementId]) -> String {
    els.iter()
        .map(|&el| element_state(doc, el).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
