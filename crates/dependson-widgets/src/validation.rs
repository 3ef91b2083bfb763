#![forbid(unsafe_code)]

//! Validation exclusion for fields hidden by dependency actions.
//!
//! A field is skipped by form validation when it, or any ancestor, is both
//! hidden and under dependency control: it either declares a dependency
//! query itself or carries the controllable marker added by the
//! `visibility` action.

use dependson_core::dom::{Document, ElementId};

/// Attribute declaring a dependency query on an element.
pub const OBSERVER_ATTR: &str = "data-dependson";

/// Marker attribute set on elements whose visibility an action controls.
pub const CONTROLLABLE_ATTR: &str = "data-dependson-controllable";

/// Whether validation should skip `el`, using the default attribute names.
#[must_use]
pub fn is_excluded_from_validation(doc: &Document, el: ElementId) -> bool {
    is_excluded_with(doc, el, &[OBSERVER_ATTR, CONTROLLABLE_ATTR])
}

/// Whether `el` or an ancestor is hidden while carrying one of `markers`.
#[must_use]
pub fn is_excluded_with(doc: &Document, el: ElementId, markers: &[&str]) -> bool {
    std::iter::once(el).chain(doc.ancestors(el)).any(|candidate| {
        doc.has_attr(candidate, "hidden") && markers.iter().any(|m| doc.has_attr(candidate, m))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_controlled_ancestor_excludes_descendants() {
        let mut doc = Document::new();
        let section = doc.create_element("div");
        let input = doc.create_element("input");
        let root = doc.root();
        doc.append_child(root, section);
        doc.append_child(section, input);

        assert!(!is_excluded_from_validation(&doc, input));

        doc.set_attr(section, "hidden", "true");
        assert!(!is_excluded_from_validation(&doc, input), "plain hidden");

        doc.set_attr(section, CONTROLLABLE_ATTR, "");
        assert!(is_excluded_from_validation(&doc, input));
        assert!(is_excluded_from_validation(&doc, section));
    }

    #[test]
    fn visible_observer_is_validated() {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attr(input, OBSERVER_ATTR, "@agree");
        assert!(!is_excluded_from_validation(&doc, input));
        doc.set_attr(input, "hidden", "true");
        assert!(is_excluded_from_validation(&doc, input));
        assert!(!is_excluded_with(&doc, input, &["data-other"]));
    }
}
