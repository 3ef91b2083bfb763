#![forbid(unsafe_code)]

//! Reference registries.
//!
//! - [`ElementReferenceRegistry`]: one element per name and scope.
//! - [`GroupReferenceRegistry`]: all elements sharing a name inside a scope.
//!
//! Both hold element ids only; a detached element stays in a registry
//! until the next `actualize` pass reclaims it, and no lookup resolves to
//! it in the meantime. Values live in [`Observable`](crate::reactive::Observable)
//! slots that observers subscribe to.

pub mod element;
pub mod group;

pub use element::{ElementReference, ElementReferenceRegistry};
pub use group::{GroupReference, GroupReferenceRegistry};
