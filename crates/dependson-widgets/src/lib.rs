#![forbid(unsafe_code)]

//! Widget accessors for DependsOn.
//!
//! An [`Accessor`] gives every widget type the same
//! `get`/`set`/`visibility`/`disabled` surface regardless of its element
//! shape. The [`AccessorRegistry`] maps elements to accessors by selector.
//!
//! # Built-in accessors
//!
//! | Accessor | Elements | Value |
//! |----------|----------|-------|
//! | [`DefaultAccessor`] | anything unmatched | `value` property as text |
//! | [`ToggleAccessor`] | checkboxes, radios, switches | `checked` as boolean |
//! | [`RadioGroupAccessor`] | `.coral-RadioGroup` | checked member's value |
//! | [`MultiValueAccessor`] | multi-selects | list of selected values |

pub mod accessor;
pub mod multi_value;
pub mod radio_group;
pub mod registry;
pub mod toggle;
pub mod validation;

pub use accessor::{Accessor, AccessorDescriptor, DefaultAccessor, FIELD_WRAPPER_CLASS};
pub use multi_value::MultiValueAccessor;
pub use radio_group::RadioGroupAccessor;
pub use registry::AccessorRegistry;
pub use toggle::ToggleAccessor;
pub use validation::{CONTROLLABLE_ATTR, OBSERVER_ATTR, is_excluded_from_validation};
