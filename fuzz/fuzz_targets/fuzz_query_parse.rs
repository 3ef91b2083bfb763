#![no_main]

use dependson_runtime::query::{Query, ReferenceKind, is_valid_reference_name};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: &str| {
    let Ok(query) = Query::parse(text) else {
        return;
    };
    assert_eq!(query.text(), text);
    let mut keys = Vec::new();
    for token in query.references() {
        match token.kind() {
            ReferenceKind::This => assert_eq!(token.name(), "this"),
            _ => assert!(is_valid_reference_name(token.name())),
        }
        let key = token.key();
        assert!(!keys.contains(&key), "duplicate token {key}");
        keys.push(key);
    }
});
