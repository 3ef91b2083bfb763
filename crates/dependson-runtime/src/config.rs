#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! Every attribute name the engine reads or writes is configurable; the
//! defaults are the stable external contract. Configuration round-trips
//! through JSON with per-field defaults, so a partial document only
//! overrides the fields it names.

use dependson_core::selector::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{DependsOnError, Result};

/// Default number of evaluations one observer may run in a single pump turn.
pub const DEFAULT_CASCADE_LIMIT: u32 = 64;

/// Default message stored by the `validate` action.
pub const DEFAULT_VALIDATION_MESSAGE: &str = "Incorrect data";

/// Attribute names and limits used by [`DependsOn`](crate::DependsOn).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependsOnConfig {
    /// Declares a simple reference; its value is the reference name.
    pub reference_attr: String,
    /// Reference type used to cast the referenced value.
    pub reftype_attr: String,
    /// Declares one or more queries.
    pub query_attr: String,
    /// Action names paired with the queries.
    pub action_attr: String,
    /// Presence inverts each query result.
    pub negate_attr: String,
    /// Presence skips the action on the first evaluation.
    pub skip_initial_attr: String,
    /// Selector for the action targets, searched from the document root.
    pub target_attr: String,
    /// Marker the `visibility` action sets on its targets.
    pub controllable_attr: String,
    /// Prefix of `{prefix}{action}-{param}` parameter attributes.
    pub param_prefix: String,
    /// Attribute the `validate` action stores its message in.
    pub validation_message_attr: String,
    /// Repeatable collection elements.
    pub collection_selector: String,
    /// Separator between multiple queries and actions.
    pub separator: char,
    /// Evaluations one observer may run per pump turn before it is skipped.
    pub cascade_limit: u32,
}

impl Default for DependsOnConfig {
    fn default() -> Self {
        Self {
            reference_attr: "data-dependsonref".into(),
            reftype_attr: "data-dependsonreftype".into(),
            query_attr: "data-dependson".into(),
            action_attr: "data-dependsonaction".into(),
            negate_attr: "data-dependsonnegate".into(),
            skip_initial_attr: "data-dependsonskipinitial".into(),
            target_attr: "data-dependsontarget".into(),
            controllable_attr: "data-dependson-controllable".into(),
            param_prefix: "data-dependson-".into(),
            validation_message_attr: "data-dependson-validation-message".into(),
            collection_selector: "coral-multifield".into(),
            separator: ';',
            cascade_limit: DEFAULT_CASCADE_LIMIT,
        }
    }
}

impl DependsOnConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parsed [`collection_selector`](Self::collection_selector).
    pub fn collection(&self) -> Result<Selector> {
        Selector::parse(&self.collection_selector).map_err(|source| {
            DependsOnError::InvalidSelector {
                context: "collection selector".into(),
                source,
            }
        })
    }

    #[must_use]
    pub fn with_reference_attr(mut self, name: impl Into<String>) -> Self {
        self.reference_attr = name.into();
        self
    }

    #[must_use]
    pub fn with_query_attr(mut self, name: impl Into<String>) -> Self {
        self.query_attr = name.into();
        self
    }

    #[must_use]
    pub fn with_action_attr(mut self, name: impl Into<String>) -> Self {
        self.action_attr = name.into();
        self
    }

    #[must_use]
    pub fn with_collection_selector(mut self, selector: impl Into<String>) -> Self {
        self.collection_selector = selector.into();
        self
    }

    #[must_use]
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    #[must_use]
    pub fn with_cascade_limit(mut self, limit: u32) -> Self {
        self.cascade_limit = limit;
        self
    }
}
