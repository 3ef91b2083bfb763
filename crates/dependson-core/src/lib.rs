#![forbid(unsafe_code)]

//! Core: element document model, selectors, values, and host events.

pub mod dom;
pub mod error;
pub mod event;
#[cfg(any(test, feature = "test-helpers"))]
pub mod fixture;
pub mod selector;
pub mod value;

pub use dom::{Document, ElementId};
pub use error::SelectorError;
pub use event::{DomEvent, EventKind};
pub use selector::Selector;
pub use value::{RefType, Value};
