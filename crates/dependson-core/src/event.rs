#![forbid(unsafe_code)]

//! Host event types.
//!
//! These are the only signals the dependency engine consumes from the page:
//! content loads, field value changes, collection membership changes, and
//! completion of a component's own asynchronous setup.

use crate::dom::ElementId;

/// Kind of a host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// New content was inserted under the target and should be scanned.
    ContentLoaded,
    /// A field value changed.
    Change,
    /// A selection-style widget picked an item.
    Selected,
    /// A member was added to the target collection.
    CollectionAdd,
    /// A member was removed from the target collection.
    CollectionRemove,
    /// The target finished its own asynchronous setup.
    ComponentReady,
}

impl EventKind {
    /// Whether the event reports a field value change.
    #[must_use]
    pub const fn is_value_change(self) -> bool {
        matches!(self, Self::Change | Self::Selected)
    }

    /// Whether the event reports a collection membership change.
    #[must_use]
    pub const fn is_collection_change(self) -> bool {
        matches!(self, Self::CollectionAdd | Self::CollectionRemove)
    }
}

/// An event queued on a [`Document`](crate::dom::Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomEvent {
    pub target: ElementId,
    pub kind: EventKind,
}
