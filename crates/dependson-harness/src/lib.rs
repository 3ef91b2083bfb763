#![forbid(unsafe_code)]

//! Test harness and reference fixtures for DependsOn.
//!
//! - [`form`]: a builder for the authoring-form shapes the engine is used
//!   with, plus the user interactions that drive it.
//! - [`evaluators`]: small scripted evaluators standing in for the external
//!   expression language.
//! - [`capture`]: a `tracing` layer that records emitted events so tests can
//!   assert on warnings and errors.
//! - [`snapshot`]: JSONL state dumps of controlled elements.

pub mod capture;
pub mod evaluators;
pub mod form;
pub mod snapshot;

pub use capture::{CapturedEvent, LogCapture};
pub use evaluators::ScriptedEvaluator;
pub use form::{Collection, Field, FormFixture};
