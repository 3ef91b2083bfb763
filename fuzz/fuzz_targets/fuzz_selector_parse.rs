#![no_main]

use dependson_core::dom::Document;
use dependson_core::selector::Selector;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(selector) = Selector::parse(text) else {
        return;
    };
    assert_eq!(selector.as_str(), text.trim());

    let mut doc = Document::new();
    let root = doc.root();
    let form = doc.create_element("form");
    doc.append_child(root, form);
    let input = doc.create_element("input");
    doc.set_attr(input, "type", "checkbox");
    doc.set_attr(input, "class", "a b");
    doc.append_child(form, input);
    let _ = doc.matches(input, &selector);
    let _ = doc.closest(input, &selector);
    let _ = doc.query_all(root, &selector);
});
