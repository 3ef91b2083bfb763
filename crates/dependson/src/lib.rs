#![forbid(unsafe_code)]

//! DependsOn public facade crate.
//!
//! Reactive field dependencies for form authoring UIs: queries declared on
//! elements are evaluated against the live values of referenced fields and
//! drive actions such as show/hide, enable/disable and set-value.

pub use dependson_core as core;
pub use dependson_widgets as widgets;

#[cfg(feature = "runtime")]
pub use dependson_runtime as runtime;

pub mod prelude {
    pub use dependson_core::{Document, DomEvent, ElementId, EventKind, RefType, Selector, Value};
    pub use dependson_widgets::{Accessor, AccessorDescriptor, AccessorRegistry};

    #[cfg(feature = "runtime")]
    pub use dependson_runtime::{
        ActionContext, DependsOn, DependsOnConfig, DependsOnError, EvaluationError,
        ExpressionEvaluator, ReferenceValues,
    };
}
