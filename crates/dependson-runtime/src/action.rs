#![forbid(unsafe_code)]

//! Action registry.
//!
//! Actions are named side effects applied to a query result. Names are
//! sanitized to `[a-z0-9-]+`. Registration is last-write-wins and looking up
//! an unknown name is a hard failure that lists every known name.
//!
//! # Built-in actions
//!
//! | Name | Effect on each target |
//! |------|-----------------------|
//! | `visibility` | show when truthy, hide otherwise |
//! | `disabled` | disable when truthy |
//! | `readonly` | read-only when truthy |
//! | `required` | required when truthy |
//! | `set` | write the result unless it is undefined |
//! | `set-if-blank` | like `set`, only while the target is blank |
//! | `validate` | mark invalid with the `msg` parameter when falsy |

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use dependson_core::dom::{Document, ElementId};
use dependson_core::value::Value;
use dependson_widgets::registry::AccessorRegistry;

use crate::config::{DEFAULT_VALIDATION_MESSAGE, DependsOnConfig};
use crate::error::{DependsOnError, Result};

/// Name of the action used when none is declared.
pub const DEFAULT_ACTION: &str = "visibility";

/// Parameters passed to one observer's action.
pub type ActionParams = BTreeMap<String, String>;

/// A registered action.
pub type ActionFn = Rc<dyn Fn(&mut ActionContext<'_>, &Value)>;

/// Everything an action may touch while it runs.
pub struct ActionContext<'a> {
    doc: &'a mut Document,
    accessors: &'a AccessorRegistry,
    config: &'a DependsOnConfig,
    element: ElementId,
    targets: &'a [ElementId],
    params: &'a ActionParams,
}

impl fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("element", &self.element)
            .field("targets", &self.targets)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl<'a> ActionContext<'a> {
    #[must_use]
    pub fn new(
        doc: &'a mut Document,
        accessors: &'a AccessorRegistry,
        config: &'a DependsOnConfig,
        element: ElementId,
        targets: &'a [ElementId],
        params: &'a ActionParams,
    ) -> Self {
        Self {
            doc,
            accessors,
            config,
            element,
            targets,
            params,
        }
    }

    #[must_use]
    pub fn doc(&self) -> &Document {
        &*self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut *self.doc
    }

    #[must_use]
    pub fn accessors(&self) -> &'a AccessorRegistry {
        self.accessors
    }

    #[must_use]
    pub fn config(&self) -> &'a DependsOnConfig {
        self.config
    }

    /// The element declaring the query.
    #[must_use]
    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Elements the action applies to.
    #[must_use]
    pub fn targets(&self) -> &'a [ElementId] {
        self.targets
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn params(&self) -> &'a ActionParams {
        self.params
    }

    /// Show or hide every target, marking them as dependency-controlled.
    pub fn set_visibility(&mut self, visible: bool) {
        for &target in self.targets {
            self.doc.set_attr(target, &self.config.controllable_attr, "");
            self.accessors.resolve(self.doc, target).visibility(self.doc, target, visible);
        }
    }
}

/// Lowercase `raw` and drop every character outside `[a-z0-9-]`.
#[must_use]
pub fn sanitize_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Named table of actions in registration order.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: Vec<(String, ActionFn)>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ActionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in actions.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(DEFAULT_ACTION, Rc::new(visibility));
        registry.insert("disabled", Rc::new(disabled));
        registry.insert("readonly", Rc::new(readonly));
        registry.insert("required", Rc::new(required));
        registry.insert("set", Rc::new(set));
        registry.insert("set-if-blank", Rc::new(set_if_blank));
        registry.insert("validate", Rc::new(validate));
        registry
    }

    fn insert(&mut self, name: &str, action: ActionFn) {
        match self.actions.iter_mut().find(|(known, _)| known == name) {
            Some(slot) => slot.1 = action,
            None => self.actions.push((name.to_string(), action)),
        }
    }

    /// Register `action` under the sanitized form of `raw`.
    ///
    /// Returns the name actually used. Renaming and overwriting are logged
    /// as warnings.
    pub fn register(
        &mut self,
        raw: &str,
        action: impl Fn(&mut ActionContext<'_>, &Value) + 'static,
    ) -> Result<String> {
        let trimmed = raw.trim();
        let name = sanitize_name(trimmed);
        if name.is_empty() {
            return Err(DependsOnError::InvalidActionName { raw: raw.into() });
        }
        if name != trimmed {
            tracing::warn!(
                message = "dependson.action.rename",
                requested = %raw,
                name = %name
            );
        }
        if self.contains(&name) {
            tracing::warn!(message = "dependson.action.overwrite", name = %name);
        }
        self.insert(&name, Rc::new(action));
        Ok(name)
    }

    /// The action registered under exactly `name`.
    pub fn get(&self, name: &str) -> Result<ActionFn> {
        self.actions
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, action)| Rc::clone(action))
            .ok_or_else(|| DependsOnError::UnknownAction {
                name: name.to_string(),
                known: self.names().map(str::to_string).collect(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.iter().any(|(known, _)| known == name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Built-in actions
// ---------------------------------------------------------------------------

fn visibility(ctx: &mut ActionContext<'_>, result: &Value) {
    ctx.set_visibility(result.is_truthy());
}

fn disabled(ctx: &mut ActionContext<'_>, result: &Value) {
    let accessors = ctx.accessors();
    for &target in ctx.targets() {
        accessors.set_disabled(ctx.doc_mut(), target, result.is_truthy());
    }
}

fn readonly(ctx: &mut ActionContext<'_>, result: &Value) {
    let accessors = ctx.accessors();
    for &target in ctx.targets() {
        accessors.set_readonly(ctx.doc_mut(), target, result.is_truthy());
    }
}

fn required(ctx: &mut ActionContext<'_>, result: &Value) {
    let accessors = ctx.accessors();
    for &target in ctx.targets() {
        accessors.set_required(ctx.doc_mut(), target, result.is_truthy());
    }
}

fn set(ctx: &mut ActionContext<'_>, result: &Value) {
    if result.is_undefined() {
        return;
    }
    let accessors = ctx.accessors();
    for &target in ctx.targets() {
        accessors.set(ctx.doc_mut(), target, result, true);
    }
}

fn set_if_blank(ctx: &mut ActionContext<'_>, result: &Value) {
    if result.is_undefined() {
        return;
    }
    let accessors = ctx.accessors();
    for &target in ctx.targets() {
        if accessors.get(ctx.doc(), target).is_blank() {
            accessors.set(ctx.doc_mut(), target, result, true);
        }
    }
}

fn validate(ctx: &mut ActionContext<'_>, result: &Value) {
    let message_attr = &ctx.config().validation_message_attr;
    let message = ctx.param("msg").unwrap_or(DEFAULT_VALIDATION_MESSAGE);
    let valid = result.is_truthy();
    for &target in ctx.targets() {
        let doc = ctx.doc_mut();
        if valid {
            doc.remove_attr(target, "aria-invalid");
            doc.remove_attr(target, message_attr);
        } else {
            doc.set_attr(target, "aria-invalid", "true");
            doc.set_attr(target, message_attr, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dependson_core::fixture::append;
    use std::cell::Cell;

    fn run(name: &str, result: Value, params: &[(&str, &str)]) -> (Document, ElementId) {
        let mut doc = Document::new();
        let root = doc.root();
        let target = append(&mut doc, root, "input", &[]);
        let accessors = AccessorRegistry::with_builtin();
        let config = DependsOnConfig::default();
        let params: ActionParams = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let targets = [target];
        let action = ActionRegistry::with_builtin().get(name).expect("built-in");
        let mut ctx = ActionContext::new(&mut doc, &accessors, &config, target, &targets, &params);
        action(&mut ctx, &result);
        (doc, target)
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_name("My Action!"), "myaction");
        assert_eq!(sanitize_name("set-If-Blank"), "set-if-blank");
        assert_eq!(sanitize_name("£$%"), "");
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ActionRegistry::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let name = registry
            .register("My Action!", move |_, _| counter.set(counter.get() + 1))
            .expect("valid name");
        assert_eq!(name, "myaction");
        assert!(registry.get("myaction").is_ok());
        assert!(registry.get("My Action!").is_err());
        assert!(registry.get("MyAction").is_err());

        let err = registry.get("unknown").err().expect("unknown action");
        assert!(matches!(
            &err,
            DependsOnError::UnknownAction { known, .. } if known == &["myaction".to_string()]
        ));
        assert!(err.to_string().contains("myaction"));
    }

    #[test]
    fn register_overwrites_in_place() {
        let mut registry = ActionRegistry::with_builtin();
        let before: Vec<String> = registry.names().map(str::to_string).collect();
        registry
            .register("disabled", |_, _| {})
            .expect("valid name");
        let after: Vec<String> = registry.names().map(str::to_string).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn register_rejects_empty_name() {
        let mut registry = ActionRegistry::new();
        let err = registry.register(" !! ", |_, _| {}).expect_err("empty");
        assert_eq!(err.kind(), "invalid_action_name");
        assert!(registry.is_empty());
    }

    #[test]
    fn visibility_hides_and_marks() {
        let (doc, target) = run("visibility", Value::Bool(false), &[]);
        assert!(doc.has_attr(target, "hidden"));
        assert!(doc.has_attr(target, "data-dependson-controllable"));
        let (doc, target) = run("visibility", Value::from("x"), &[]);
        assert!(!doc.has_attr(target, "hidden"));
    }

    #[test]
    fn state_actions() {
        let (doc, target) = run("disabled", Value::Bool(true), &[]);
        assert!(doc.has_attr(target, "disabled"));
        let (doc, target) = run("readonly", Value::Number(1.0), &[]);
        assert!(doc.has_attr(target, "readonly"));
        let (doc, target) = run("required", Value::Bool(true), &[]);
        assert!(doc.has_attr(target, "required"));
    }

    #[test]
    fn set_writes_and_notifies() {
        let (mut doc, target) = run("set", Value::from("hello"), &[]);
        assert_eq!(doc.value(target), "hello");
        assert_eq!(doc.next_event().map(|e| e.target), Some(target));

        let (mut doc, target) = run("set", Value::Undefined, &[]);
        assert_eq!(doc.value(target), "");
        assert!(doc.next_event().is_none());
    }

    #[test]
    fn set_if_blank_respects_existing_value() {
        let mut doc = Document::new();
        let root = doc.root();
        let target = append(&mut doc, root, "input", &[("value", "keep")]);
        let accessors = AccessorRegistry::with_builtin();
        let config = DependsOnConfig::default();
        let params = ActionParams::new();
        let targets = [target];
        let action = ActionRegistry::with_builtin().get("set-if-blank").expect("built-in");
        let mut ctx = ActionContext::new(&mut doc, &accessors, &config, target, &targets, &params);
        action(&mut ctx, &Value::from("new"));
        assert_eq!(doc.value(target), "keep");

        let (doc, target) = run("set-if-blank", Value::from("new"), &[]);
        assert_eq!(doc.value(target), "new");
    }

    #[test]
    fn validate_uses_message_param() {
        let (doc, target) = run("validate", Value::Bool(false), &[("msg", "Too short")]);
        assert_eq!(doc.attr(target, "aria-invalid"), Some("true"));
        assert_eq!(doc.attr(target, "data-dependson-validation-message"), Some("Too short"));

        let (doc, target) = run("validate", Value::Bool(false), &[]);
        assert_eq!(
            doc.attr(target, "data-dependson-validation-message"),
            Some(DEFAULT_VALIDATION_MESSAGE)
        );

        let (doc, target) = run("validate", Value::Bool(true), &[]);
        assert!(!doc.has_attr(target, "aria-invalid"));
    }
}
