#![no_main]

use arbitrary::Arbitrary;
use dependson_core::dom::{Document, ElementId};
use dependson_core::event::EventKind;
use dependson_core::value::Value;
use dependson_runtime::DependsOn;
use dependson_runtime::query::{EvaluationError, ReferenceValues};
use libfuzzer_sys::fuzz_target;

const NAMES: [&str; 4] = ["a", "b", "items", "this"];
const ACTIONS: [&str; 5] = ["visibility", "disabled", "set", "required", "bogus"];

#[derive(Arbitrary, Debug)]
enum Op {
    Checkbox { parent: u8, name: u8 },
    Dependent { parent: u8, name: u8, group: bool, action: u8 },
    Collection { parent: u8 },
    AddMember { collection: u8, name: u8 },
    Toggle { el: u8, checked: bool },
    Type { el: u8, text: u8 },
    Remove { el: u8 },
    Initialize { el: u8 },
    Pump,
}

fn pick(els: &[ElementId], index: u8) -> Option<ElementId> {
    (!els.is_empty()).then(|| els[usize::from(index) % els.len()])
}

fn evaluate(_: &str, refs: &ReferenceValues) -> Result<Value, EvaluationError> {
    Ok(Value::Bool(refs.iter().any(|(_, v)| v.is_truthy())))
}

fuzz_target!(|ops: Vec<Op>| {
    let mut doc = Document::new();
    let root = doc.root();
    let mut els = vec![root];
    let mut collections = Vec::new();
    let mut engine = DependsOn::new(evaluate);
    engine.initialize(&doc, root);

    for op in ops.into_iter().take(256) {
        match op {
            Op::Checkbox { parent, name } => {
                let parent = pick(&els, parent).unwrap_or(root);
                let el = doc.create_element("input");
                doc.set_attr(el, "type", "checkbox");
                doc.set_attr(el, "data-dependsonref", NAMES[usize::from(name) % NAMES.len()]);
                doc.append_child(parent, el);
                els.push(el);
            }
            Op::Dependent { parent, name, group, action } => {
                let parent = pick(&els, parent).unwrap_or(root);
                let el = doc.create_element("input");
                let name = NAMES[usize::from(name) % NAMES.len()];
                let query = if group { format!("@@{name}") } else { format!("@{name}") };
                doc.set_attr(el, "data-dependson", query);
                doc.set_attr(el, "data-dependsonaction", ACTIONS[usize::from(action) % ACTIONS.len()]);
                doc.append_child(parent, el);
                els.push(el);
            }
            Op::Collection { parent } => {
                let parent = pick(&els, parent).unwrap_or(root);
                let el = doc.create_element("coral-multifield");
                doc.append_child(parent, el);
                els.push(el);
                collections.push(el);
            }
            Op::AddMember { collection, name } => {
                if let Some(list) = pick(&collections, collection) {
                    let item = doc.create_element("coral-multifield-item");
                    let input = doc.create_element("input");
                    doc.set_attr(input, "data-dependsonref", NAMES[usize::from(name) % NAMES.len()]);
                    doc.append_child(item, input);
                    doc.append_child(list, item);
                    els.push(input);
                    doc.trigger(list, EventKind::CollectionAdd);
                }
            }
            Op::Toggle { el, checked } => {
                if let Some(el) = pick(&els, el) {
                    doc.set_checked(el, checked);
                    doc.trigger(el, EventKind::Change);
                }
            }
            Op::Type { el, text } => {
                if let Some(el) = pick(&els, el) {
                    doc.set_value(el, text.to_string());
                    doc.trigger(el, EventKind::Change);
                }
            }
            Op::Remove { el } => {
                if let Some(el) = pick(&els, el) {
                    let parent = doc.parent(el);
                    doc.remove(el);
                    if let Some(parent) = parent {
                        doc.trigger(parent, EventKind::CollectionRemove);
                    }
                }
            }
            Op::Initialize { el } => {
                if let Some(el) = pick(&els, el) {
                    engine.initialize(&doc, el);
                }
            }
            Op::Pump => {
                engine.pump(&mut doc);
                assert!(!doc.has_events());
            }
        }
    }

    engine.pump(&mut doc);
    for reference in engine.references().entries() {
        let _ = reference.value().get();
    }
    let _ = engine.take_errors();
});
