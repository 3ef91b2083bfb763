#![forbid(unsafe_code)]

//! Runtime for DependsOn: references, observers, actions, and the
//! lifecycle coordinator.
//!
//! # Module map
//!
//! | Module | Role |
//! |--------|------|
//! | [`reactive`] | `Observable`/`Subscription` primitives behind reference values |
//! | [`query`] | reference extraction and the evaluator boundary |
//! | [`reference`] | simple and group reference registries |
//! | [`observer`] | query observers and the pending-evaluation queue |
//! | [`action`] | named side effects and the built-in set |
//! | [`plugin`] | the [`DependsOn`] coordinator |

pub mod action;
pub mod config;
pub mod error;
pub mod observer;
pub mod plugin;
pub mod query;
pub mod reactive;
pub mod reference;

pub use action::{ActionContext, ActionFn, ActionParams, ActionRegistry, DEFAULT_ACTION, sanitize_name};
pub use config::DependsOnConfig;
pub use error::{DependsOnError, Result};
pub use observer::{ObserverId, ObserverRegistry, QueryObserver};
pub use plugin::DependsOn;
pub use query::{
    EvaluationError, ExpressionEvaluator, GroupSnapshot, Query, ReferenceKind, ReferenceToken,
    ReferenceValues,
};
pub use reference::{ElementReferenceRegistry, GroupReferenceRegistry};
