#![forbid(unsafe_code)]

//! Document building helpers for tests.

use crate::dom::{Document, ElementId};

/// Create `tag` with `attrs` and append it to `parent`.
pub fn append(
    doc: &mut Document,
    parent: ElementId,
    tag: &str,
    attrs: &[(&str, &str)],
) -> ElementId {
    let el = doc.create_element(tag);
    for (name, value) in attrs {
        doc.set_attr(el, name, *value);
    }
    doc.append_child(parent, el);
    el
}

/// Render the subtree of `el` as indented `tag[attr=value]` lines.
#[must_use]
pub fn outline(doc: &Document, el: ElementId) -> String {
    let mut out = String::new();
    write_outline(doc, el, 0, &mut out);
    out
}

fn write_outline(doc: &Document, el: ElementId, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(doc.tag(el).unwrap_or("?"));
    for (name, value) in doc.attributes(el) {
        out.push('[');
        out.push_str(name);
        if !value.is_empty() {
            out.push('=');
            out.push_str(value);
        }
        out.push(']');
    }
    if doc.checked(el) {
        out.push_str(" checked");
    }
    out.push('\n');
    for &child in doc.children(el) {
        write_outline(doc, child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_shows_structure() {
        let mut doc = Document::new();
        let root = doc.root();
        let form = append(&mut doc, root, "form", &[("id", "f")]);
        let input = append(&mut doc, form, "input", &[("hidden", "")]);
        doc.set_checked(input, true);
        assert_eq!(outline(&doc, root), "body\n  form[id=f]\n    input[hidden] checked\n");
    }
}
