#![forbid(unsafe_code)]

//! Scripted evaluators.
//!
//! The engine never parses expression syntax; these stand-ins map reference
//! values to results directly so scenarios can pin down exactly what an
//! observer computed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use dependson_core::value::Value;
use dependson_runtime::query::{EvaluationError, ExpressionEvaluator, ReferenceValues};

type EvalResult = Result<Value, EvaluationError>;

/// The value of reference `key` as is.
pub fn reference(key: &'static str) -> impl Fn(&str, &ReferenceValues) -> EvalResult {
    move |_, refs| Ok(refs.get(key).clone())
}

/// `true` when reference `key` equals `expected`.
pub fn equals(key: &'static str, expected: Value) -> impl Fn(&str, &ReferenceValues) -> EvalResult {
    move |_, refs| Ok(Value::Bool(*refs.get(key) == expected))
}

/// `true` when group `name` has at least `min` members.
pub fn group_count_at_least(
    name: &'static str,
    min: usize,
) -> impl Fn(&str, &ReferenceValues) -> EvalResult {
    move |_, refs| {
        let count = refs.group(name).map_or(0, |g| g.count);
        Ok(Value::Bool(count >= min))
    }
}

type Script = Box<dyn Fn(&ReferenceValues) -> Value>;

/// Evaluator keyed by exact expression text. Every call is recorded.
///
/// ```
/// use dependson_core::value::Value;
/// use dependson_harness::ScriptedEvaluator;
/// use dependson_runtime::query::{ExpressionEvaluator, ReferenceValues};
///
/// let evaluator = ScriptedEvaluator::new().on("@a", |refs| refs.get("a").clone());
/// let mut refs = ReferenceValues::new();
/// refs.insert("a", Value::from("x"));
/// assert_eq!(evaluator.evaluate("@a", &refs), Ok(Value::from("x")));
/// assert!(evaluator.evaluate("@b", &refs).is_err());
/// ```
#[derive(Default)]
pub struct ScriptedEvaluator {
    scripts: Vec<(String, Script)>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl fmt::Debug for ScriptedEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedEvaluator")
            .field(
                "scripts",
                &self.scripts.iter().map(|(q, _)| q.as_str()).collect::<Vec<_>>(),
            )
            .field("calls", &self.calls.borrow().len())
            .finish()
    }
}

impl ScriptedEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `expression` with `script`. A later script for the same text
    /// replaces the earlier one.
    #[must_use]
    pub fn on(mut self, expression: &str, script: impl Fn(&ReferenceValues) -> Value + 'static) -> Self {
        self.scripts.retain(|(q, _)| q != expression);
        self.scripts.push((expression.to_string(), Box::new(script)));
        self
    }

    /// Shared log of evaluated expressions, in call order. Stays readable
    /// after the evaluator moves into the engine.
    #[must_use]
    pub fn call_log(&self) -> CallLog {
        CallLog(Rc::clone(&self.calls))
    }
}

impl ExpressionEvaluator for ScriptedEvaluator {
    fn evaluate(&self, expression: &str, refs: &ReferenceValues) -> EvalResult {
        self.calls.borrow_mut().push(expression.to_string());
        self.scripts
            .iter()
            .find(|(q, _)| q == expression)
            .map(|(_, script)| script(refs))
            .ok_or_else(|| EvaluationError::new(format!("no script for {expression:?}")))
    }
}

/// Handle onto a [`ScriptedEvaluator`]'s call record.
#[derive(Debug, Clone)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Number of evaluations of `expression`.
    #[must_use]
    pub fn count(&self, expression: &str) -> usize {
        self.0.borrow().iter().filter(|q| *q == expression).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dependson_runtime::query::GroupSnapshot;

    #[test]
    fn group_count_reads_snapshot() {
        let mut refs = ReferenceValues::new();
        refs.insert_group(
            "@items",
            GroupSnapshot {
                values: vec![Value::from("a"), Value::from("b")],
                count: 2,
            },
        );
        let eval = group_count_at_least("items", 2);
        assert_eq!(eval("", &refs), Ok(Value::Bool(true)));
        let eval = group_count_at_least("items", 3);
        assert_eq!(eval("", &refs), Ok(Value::Bool(false)));
        let eval = group_count_at_least("missing", 1);
        assert_eq!(eval("", &refs), Ok(Value::Bool(false)));
    }

    #[test]
    fn call_log_survives_move() {
        let evaluator = ScriptedEvaluator::new()
            .on("@a", |_| Value::Bool(true))
            .on("@a", |_| Value::Bool(false));
        let log = evaluator.call_log();
        let boxed: Box<dyn ExpressionEvaluator> = Box::new(evaluator);
        let refs = ReferenceValues::new();
        assert_eq!(boxed.evaluate("@a", &refs), Ok(Value::Bool(false)));
        assert!(boxed.evaluate("@b", &refs).is_err());
        assert_eq!(log.calls(), vec!["@a".to_string(), "@b".to_string()]);
        assert_eq!(log.count("@a"), 1);
    }
}
