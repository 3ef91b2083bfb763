#![forbid(unsafe_code)]

//! Queries and the expression-evaluator boundary.
//!
//! The engine never interprets expression syntax. It only scans the query
//! text for reference tokens so it knows what to subscribe to:
//!
//! | Token | Reads |
//! |-------|-------|
//! | `@name` | simple reference `name`, nearest scope |
//! | `@name(selector)` | simple reference inside the closest ancestor matching `selector` |
//! | `@@name` | group reference `name` across the document |
//! | `@@name(selector)` | group reference inside the closest ancestor matching `selector` |
//! | `@this` | the observer element's own value |
//!
//! Text inside quoted string literals is skipped. The untouched query text
//! and the resolved [`ReferenceValues`] go to the injected
//! [`ExpressionEvaluator`].

use std::collections::BTreeMap;
use std::fmt;

use dependson_core::selector::Selector;
use dependson_core::value::Value;
use thiserror::Error;

use crate::error::{DependsOnError, Result};

/// Which registry a reference token reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Simple,
    Group,
    This,
}

/// One reference read by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    kind: ReferenceKind,
    name: String,
    scope: Option<Selector>,
}

impl ReferenceToken {
    #[must_use]
    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// Reference name (`this` for [`ReferenceKind::This`]).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit scope selector, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&Selector> {
        self.scope.as_ref()
    }

    /// Key under which the token's value appears in [`ReferenceValues`]:
    /// `name`, `@name` for groups, `this`, with `(selector)` appended when
    /// scoped.
    #[must_use]
    pub fn key(&self) -> String {
        let mut key = match self.kind {
            ReferenceKind::Group => format!("@{}", self.name),
            ReferenceKind::Simple | ReferenceKind::This => self.name.clone(),
        };
        if let Some(scope) = &self.scope {
            key.push('(');
            key.push_str(scope.as_str());
            key.push(')');
        }
        key
    }
}

/// A parsed query: its text plus the references it reads, in order of
/// first appearance and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    references: Vec<ReferenceToken>,
}

impl Query {
    /// Scan `text` for reference tokens.
    pub fn parse(text: &str) -> Result<Self> {
        let references = Scanner::new(text).scan()?;
        Ok(Self {
            text: text.to_string(),
            references,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn references(&self) -> &[ReferenceToken] {
        &self.references
    }

    /// Whether the query reads the observer element's own value.
    #[must_use]
    pub fn reads_self(&self) -> bool {
        self.references
            .iter()
            .any(|token| token.kind == ReferenceKind::This)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-'
}

/// Whether `name` is a valid reference name.
#[must_use]
pub fn is_valid_reference_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start) && chars.all(is_name_char)
}

struct Scanner<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.text.len(), |&(offset, _)| offset)
    }

    fn malformed(&self, offset: usize, reason: &'static str) -> DependsOnError {
        DependsOnError::MalformedQuery {
            query: self.text.to_string(),
            offset,
            reason,
        }
    }

    fn scan(mut self) -> Result<Vec<ReferenceToken>> {
        let mut tokens: Vec<ReferenceToken> = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                '"' | '\'' | '`' => self.skip_string(c)?,
                '@' => {
                    let token = self.reference()?;
                    if !tokens.iter().any(|t| t.key() == token.key()) {
                        tokens.push(token);
                    }
                }
                _ => self.pos += 1,
            }
        }
        Ok(tokens)
    }

    fn skip_string(&mut self, quote: char) -> Result<()> {
        let start = self.offset();
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(self.malformed(start, "unterminated string literal")),
                Some('\\') => self.pos += 2,
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn reference(&mut self) -> Result<ReferenceToken> {
        let start = self.offset();
        self.pos += 1;
        let group = self.peek() == Some('@');
        if group {
            self.pos += 1;
        }
        if !self.peek().is_some_and(is_name_start) {
            return Err(self.malformed(start, "expected a reference name after '@'"));
        }
        let name_start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        let name: String = self.chars[name_start..self.pos]
            .iter()
            .map(|&(_, c)| c)
            .collect();
        let scope = if self.peek() == Some('(') {
            Some(self.scope()?)
        } else {
            None
        };
        let kind = match (group, name.as_str()) {
            (true, _) => ReferenceKind::Group,
            (false, "this") => ReferenceKind::This,
            (false, _) => ReferenceKind::Simple,
        };
        if kind == ReferenceKind::This && scope.is_some() {
            return Err(self.malformed(start, "@this cannot be scoped"));
        }
        Ok(ReferenceToken { kind, name, scope })
    }

    fn scope(&mut self) -> Result<Selector> {
        let open = self.offset();
        self.pos += 1;
        let body_start = self.offset();
        let mut depth = 1usize;
        loop {
            match self.peek() {
                None => return Err(self.malformed(open, "unterminated scope selector")),
                Some('(') => depth += 1,
                Some(')') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some(_) => {}
            }
            self.pos += 1;
        }
        let body = &self.text[body_start..self.offset()];
        self.pos += 1;
        Selector::parse(body).map_err(|source| DependsOnError::InvalidSelector {
            context: format!("scope of query {:?}", self.text),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Evaluator boundary
// ---------------------------------------------------------------------------

/// Member values and count of a group reference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupSnapshot {
    pub values: Vec<Value>,
    pub count: usize,
}

/// Current values of the references a query reads, keyed by
/// [`ReferenceToken::key`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceValues {
    values: BTreeMap<String, Value>,
    groups: BTreeMap<String, GroupSnapshot>,
}

static UNDEFINED: Value = Value::Undefined;

impl ReferenceValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Record a group under `key`; the plain lookup sees the value list.
    pub fn insert_group(&mut self, key: impl Into<String>, snapshot: GroupSnapshot) {
        let key = key.into();
        self.values
            .insert(key.clone(), Value::List(snapshot.values.clone()));
        self.groups.insert(key, snapshot);
    }

    /// Value under `key`, or [`Value::Undefined`] when absent.
    #[must_use]
    pub fn get(&self, key: &str) -> &Value {
        self.values.get(key).unwrap_or(&UNDEFINED)
    }

    /// Group snapshot for `name` (the key without its leading `@`).
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupSnapshot> {
        self.groups.get(&format!("@{name}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values as a JSON object, for evaluators that bind JSON scopes.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Failure reported by an [`ExpressionEvaluator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvaluationError {
    message: String,
}

impl EvaluationError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Evaluates query text against resolved reference values.
///
/// Implemented for any `Fn(&str, &ReferenceValues) -> Result<Value, EvaluationError>`.
pub trait ExpressionEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        refs: &ReferenceValues,
    ) -> std::result::Result<Value, EvaluationError>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str, &ReferenceValues) -> std::result::Result<Value, EvaluationError>,
{
    fn evaluate(
        &self,
        expression: &str,
        refs: &ReferenceValues,
    ) -> std::result::Result<Value, EvaluationError> {
        self(expression, refs)
    }
}
