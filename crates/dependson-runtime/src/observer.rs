#![forbid(unsafe_code)]

//! Query observers.
//!
//! A [`QueryObserver`] binds one query on one element to one action. It
//! subscribes to exactly the reference slots its last evaluation read and
//! re-resolves them on every evaluation, so replaced or reclaimed
//! references never leave it reading a detached element.
//!
//! # State machine
//!
//! ```text
//! (none) --init--> subscribed --reference change--> queued --flush--> subscribed
//!                      |                                                  |
//!                      +------------ element detached (next scan) -------+--> destroyed
//! ```
//!
//! # Invariants
//!
//! 1. An element's observers are replaced wholesale when its declaration
//!    attributes change and left untouched when they do not.
//! 2. Subscriptions only push observer ids onto the shared pending queue;
//!    evaluation happens when the owner flushes it, never inside a
//!    notification.
//! 3. The pending queue holds each observer at most once and preserves
//!    notification order.
//! 4. One observer runs at most `cascade_limit` evaluations per pump turn.
//!
//! # Failure Modes
//!
//! - **Unknown action or malformed query**: `init` fails for that element
//!   and creates no observer for it.
//! - **Evaluator error**: the action is not run; subscriptions stay in place
//!   so the next reference change retries.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use dependson_core::dom::{Document, ElementId};
use dependson_core::selector::Selector;
use dependson_core::value::{RefType, Value};
use dependson_widgets::registry::AccessorRegistry;

use crate::action::{ActionContext, ActionFn, ActionParams, ActionRegistry, DEFAULT_ACTION, sanitize_name};
use crate::config::DependsOnConfig;
use crate::error::{DependsOnError, Result};
use crate::query::{ExpressionEvaluator, GroupSnapshot, Query, ReferenceKind, ReferenceValues};
use crate::reactive::{Observable, Subscription};
use crate::reference::{ElementReferenceRegistry, GroupReferenceRegistry};

/// Identifier of a live observer. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Pending queue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PendingInner {
    order: VecDeque<ObserverId>,
    queued: AHashSet<ObserverId>,
}

/// Ordered, de-duplicated queue of observers awaiting evaluation.
#[derive(Debug, Clone, Default)]
struct PendingQueue {
    inner: Rc<RefCell<PendingInner>>,
}

impl PendingQueue {
    fn push(&self, id: ObserverId) {
        let mut inner = self.inner.borrow_mut();
        if inner.queued.insert(id) {
            inner.order.push_back(id);
        }
    }

    fn pop(&self) -> Option<ObserverId> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.order.pop_front()?;
        inner.queued.remove(&id);
        Some(id)
    }

    fn len(&self) -> usize {
        self.inner.borrow().order.len()
    }
}

fn watch<T: Clone + PartialEq + 'static>(
    source: &Observable<T>,
    pending: &PendingQueue,
    id: ObserverId,
) -> Subscription {
    let pending = pending.clone();
    source.subscribe(move |_| pending.push(id))
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// One `query -> action` pair declared on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub query: String,
    pub action: String,
    pub params: ActionParams,
}

/// Split the declaration attributes of `el` into query/action pairs.
///
/// Queries and actions are paired by position; a missing or empty action
/// defaults to `visibility`. Parameters for the n-th (0-based) pair using a
/// given action come from `{prefix}{action}-{param}` when n is 0 and from
/// `{prefix}{action}-{param}-{n}` otherwise.
#[must_use]
pub fn declarations(doc: &Document, el: ElementId, config: &DependsOnConfig) -> Vec<Declaration> {
    let queries = doc.attr(el, &config.query_attr).unwrap_or("");
    let actions: Vec<&str> = doc
        .attr(el, &config.action_attr)
        .unwrap_or("")
        .split(config.separator)
        .map(str::trim)
        .collect();
    let mut occurrences: AHashMap<String, usize> = AHashMap::new();
    queries
        .split(config.separator)
        .map(str::trim)
        .enumerate()
        .filter(|(_, query)| !query.is_empty())
        .map(|(position, query)| {
            let raw = actions
                .get(position)
                .copied()
                .filter(|a| !a.is_empty())
                .unwrap_or(DEFAULT_ACTION);
            let sanitized = sanitize_name(raw);
            let action = if sanitized.is_empty() { raw.to_string() } else { sanitized };
            let counter = occurrences.entry(action.clone()).or_insert(0);
            let params = params_for(doc, el, config, &action, *counter);
            *counter += 1;
            Declaration {
                query: query.to_string(),
                action,
                params,
            }
        })
        .collect()
}

fn params_for(
    doc: &Document,
    el: ElementId,
    config: &DependsOnConfig,
    action: &str,
    index: usize,
) -> ActionParams {
    let prefix = format!("{}{action}-", config.param_prefix);
    let mut params = ActionParams::new();
    for (name, value) in doc.attributes(el) {
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        let (param, position) = match rest.rsplit_once('-') {
            Some((param, n)) if !param.is_empty() => match n.parse::<usize>() {
                Ok(n) => (param, n),
                Err(_) => (rest, 0),
            },
            _ => (rest, 0),
        };
        if position == index && !param.is_empty() {
            params.insert(param.to_string(), value.to_string());
        }
    }
    params
}

fn signature(doc: &Document, el: ElementId, config: &DependsOnConfig, declared: &[Declaration]) -> String {
    let mut parts = vec![
        doc.attr(el, &config.query_attr).unwrap_or("").to_string(),
        doc.attr(el, &config.action_attr).unwrap_or("").to_string(),
        doc.has_attr(el, &config.negate_attr).to_string(),
        doc.has_attr(el, &config.skip_initial_attr).to_string(),
        doc.attr(el, &config.target_attr).unwrap_or("").to_string(),
    ];
    for declaration in declared {
        for (name, value) in &declaration.params {
            parts.push(format!("{}:{name}={value}", declaration.action));
        }
    }
    parts.join("\u{1f}")
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// A live binding between one query and its action.
pub struct QueryObserver {
    id: ObserverId,
    element: ElementId,
    query: Query,
    action_name: String,
    action: ActionFn,
    negate: bool,
    skip_initial: bool,
    params: ActionParams,
    target: Option<Selector>,
    evaluations: u64,
    last_result: Option<Value>,
    subscriptions: Vec<Subscription>,
}

impl fmt::Debug for QueryObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryObserver")
            .field("id", &self.id)
            .field("element", &self.element)
            .field("query", &self.query.text())
            .field("action", &self.action_name)
            .field("negate", &self.negate)
            .field("evaluations", &self.evaluations)
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl QueryObserver {
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Element declaring the query.
    #[must_use]
    pub fn element(&self) -> ElementId {
        self.element
    }

    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    #[must_use]
    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.negate
    }

    #[must_use]
    pub fn params(&self) -> &ActionParams {
        &self.params
    }

    /// Completed evaluations.
    #[must_use]
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Result of the last successful evaluation, after negation.
    #[must_use]
    pub fn last_result(&self) -> Option<&Value> {
        self.last_result.as_ref()
    }

    /// Number of reference slots currently watched.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

/// Registries an evaluation reads from.
pub struct EvaluationEnv<'a> {
    pub accessors: &'a AccessorRegistry,
    pub elements: &'a mut ElementReferenceRegistry,
    pub groups: &'a mut GroupReferenceRegistry,
    pub evaluator: &'a dyn ExpressionEvaluator,
    pub config: &'a DependsOnConfig,
}

/// Outcome of [`ObserverRegistry::flush`].
#[derive(Debug, Default)]
pub struct FlushReport {
    pub evaluated: usize,
    pub skipped: usize,
    pub errors: Vec<DependsOnError>,
}

#[derive(Debug)]
struct ElementObservers {
    signature: String,
    ids: Vec<ObserverId>,
}

/// All live observers plus the queue of those awaiting evaluation.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    observers: BTreeMap<ObserverId, QueryObserver>,
    by_element: AHashMap<ElementId, ElementObservers>,
    next_id: u64,
    pending: PendingQueue,
    turn: AHashMap<ObserverId, u32>,
}

impl ObserverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: ObserverId) -> Option<&QueryObserver> {
        self.observers.get(&id)
    }

    /// Observers in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &QueryObserver> {
        self.observers.values()
    }

    /// Observers declared on `el`.
    #[must_use]
    pub fn observers_of(&self, el: ElementId) -> &[ObserverId] {
        self.by_element.get(&el).map_or(&[], |e| e.ids.as_slice())
    }

    /// Number of observers waiting for evaluation.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Create the observers declared on `el`.
    ///
    /// Returns the ids of newly created observers; an unchanged declaration
    /// returns an empty list and keeps the existing observers.
    pub fn init(
        &mut self,
        doc: &Document,
        el: ElementId,
        actions: &ActionRegistry,
        config: &DependsOnConfig,
    ) -> Result<Vec<ObserverId>> {
        let declared = declarations(doc, el, config);
        let signature = signature(doc, el, config, &declared);
        if self
            .by_element
            .get(&el)
            .is_some_and(|existing| existing.signature == signature)
        {
            return Ok(Vec::new());
        }
        let replaced = self.destroy_element(el);

        let target = match doc.attr(el, &config.target_attr).map(str::trim) {
            Some(source) if !source.is_empty() => {
                Some(Selector::parse(source).map_err(|source| DependsOnError::InvalidSelector {
                    context: format!("action target of {el}"),
                    source,
                })?)
            }
            _ => None,
        };
        let mut built = Vec::with_capacity(declared.len());
        for declaration in declared {
            let query = Query::parse(&declaration.query)?;
            let action = actions.get(&declaration.action)?;
            built.push((query, declaration, action));
        }

        let negate = doc.has_attr(el, &config.negate_attr);
        let skip_initial = doc.has_attr(el, &config.skip_initial_attr);
        let mut ids = Vec::with_capacity(built.len());
        for (query, declaration, action) in built {
            let id = ObserverId(self.next_id);
            self.next_id += 1;
            self.observers.insert(
                id,
                QueryObserver {
                    id,
                    element: el,
                    query,
                    action_name: declaration.action,
                    action,
                    negate,
                    skip_initial,
                    params: declaration.params,
                    target: target.clone(),
                    evaluations: 0,
                    last_result: None,
                    subscriptions: Vec::new(),
                },
            );
            ids.push(id);
        }
        tracing::debug!(
            message = "dependson.observer.init",
            element = %el,
            observers = ids.len(),
            replaced
        );
        self.by_element.insert(
            el,
            ElementObservers {
                signature,
                ids: ids.clone(),
            },
        );
        Ok(ids)
    }

    /// Destroy the observers declared on `el`. Returns how many were removed.
    pub fn destroy_element(&mut self, el: ElementId) -> usize {
        let Some(entry) = self.by_element.remove(&el) else {
            return 0;
        };
        for id in &entry.ids {
            self.observers.remove(id);
            self.turn.remove(id);
        }
        entry.ids.len()
    }

    /// Destroy observers whose element is detached. Returns how many were
    /// removed.
    pub fn actualize(&mut self, doc: &Document) -> usize {
        let mut detached: Vec<ElementId> = self
            .by_element
            .keys()
            .copied()
            .filter(|&el| !doc.is_attached(el))
            .collect();
        detached.sort_unstable();
        let removed: usize = detached.into_iter().map(|el| self.destroy_element(el)).sum();
        if removed > 0 {
            tracing::debug!(
                message = "dependson.observer.actualize",
                destroyed = removed,
                live = self.observers.len()
            );
        }
        removed
    }

    /// Queue one observer.
    pub fn queue(&self, id: ObserverId) {
        if self.observers.contains_key(&id) {
            self.pending.push(id);
        }
    }

    /// Queue every observer declared inside `container`.
    pub fn queue_within(&self, doc: &Document, container: ElementId) -> usize {
        let mut queued = 0;
        for observer in self.observers.values() {
            if doc.contains(container, observer.element) {
                self.pending.push(observer.id);
                queued += 1;
            }
        }
        queued
    }

    /// Queue observers reading `@this` whose element is or contains `target`.
    pub fn queue_self_readers(&self, doc: &Document, target: ElementId) -> usize {
        let mut queued = 0;
        for observer in self.observers.values() {
            if observer.query.reads_self() && doc.contains(observer.element, target) {
                self.pending.push(observer.id);
                queued += 1;
            }
        }
        queued
    }

    /// Start a new pump turn: reset the per-observer cascade counters.
    pub fn begin_turn(&mut self) {
        self.turn.clear();
    }

    /// Evaluate `id` now, subject to the cascade limit.
    ///
    /// Returns whether the action ran.
    pub fn evaluate_now(
        &mut self,
        doc: &mut Document,
        id: ObserverId,
        env: &mut EvaluationEnv<'_>,
    ) -> Result<bool> {
        let count = self.turn.entry(id).or_insert(0);
        if *count >= env.config.cascade_limit {
            tracing::warn!(
                message = "dependson.observer.cascade_limit",
                observer = %id,
                limit = env.config.cascade_limit
            );
            return Ok(false);
        }
        *count += 1;
        self.evaluate(doc, id, env)
    }

    /// Evaluate queued observers until the queue is empty.
    pub fn flush(&mut self, doc: &mut Document, env: &mut EvaluationEnv<'_>) -> FlushReport {
        let mut report = FlushReport::default();
        while let Some(id) = self.pending.pop() {
            if !self.observers.contains_key(&id) {
                continue;
            }
            let limited = self
                .turn
                .get(&id)
                .is_some_and(|&count| count >= env.config.cascade_limit);
            match self.evaluate_now(doc, id, env) {
                Ok(_) if limited => report.skipped += 1,
                Ok(_) => report.evaluated += 1,
                Err(error) => report.errors.push(error),
            }
        }
        report
    }

    fn evaluate(
        &mut self,
        doc: &mut Document,
        id: ObserverId,
        env: &mut EvaluationEnv<'_>,
    ) -> Result<bool> {
        let Some(element) = self.observers.get(&id).map(|o| o.element) else {
            return Ok(false);
        };
        if !doc.is_attached(element) {
            self.destroy_element(element);
            return Ok(false);
        }
        let pending = self.pending.clone();
        let Some(observer) = self.observers.get_mut(&id) else {
            return Ok(false);
        };

        let mut values = ReferenceValues::new();
        let mut subscriptions = Vec::new();
        for token in observer.query.references() {
            let scope = match token.scope() {
                Some(selector) => match doc.closest(element, selector) {
                    Some(root) => Some(root),
                    None => {
                        subscriptions.push(watch(&env.elements.epoch(token.name()), &pending, id));
                        match token.kind() {
                            ReferenceKind::Group => {
                                values.insert_group(token.key(), GroupSnapshot::default());
                            }
                            _ => values.insert(token.key(), Value::Undefined),
                        }
                        continue;
                    }
                },
                None => None,
            };
            match token.kind() {
                ReferenceKind::Simple => {
                    subscriptions.push(watch(&env.elements.epoch(token.name()), &pending, id));
                    let value = match env.elements.resolve(doc, element, token.name(), scope) {
                        Some(reference) => {
                            subscriptions.push(watch(reference.value(), &pending, id));
                            reference.value().get()
                        }
                        None => Value::Undefined,
                    };
                    values.insert(token.key(), value);
                }
                ReferenceKind::Group => {
                    subscriptions.push(watch(&env.elements.epoch(token.name()), &pending, id));
                    let root = scope.unwrap_or_else(|| doc.root());
                    let group = env.groups.resolve(doc, env.elements, token.name(), root);
                    subscriptions.push(watch(group.value(), &pending, id));
                    values.insert_group(token.key(), group.snapshot());
                }
                ReferenceKind::This => {
                    values.insert(token.key(), env.accessors.get_typed(doc, element, RefType::Auto));
                }
            }
        }
        observer.subscriptions = subscriptions;

        let result = env
            .evaluator
            .evaluate(observer.query.text(), &values)
            .map_err(|source| DependsOnError::Evaluation {
                query: observer.query.text().to_string(),
                element,
                source,
            })?;
        let result = if observer.negate {
            Value::Bool(!result.is_truthy())
        } else {
            result
        };
        tracing::trace!(
            message = "dependson.observer.evaluate",
            observer = %id,
            element = %element,
            query = observer.query.text(),
            result = %result
        );
        let initial = observer.evaluations == 0;
        observer.evaluations += 1;
        observer.last_result = Some(result.clone());
        if initial && observer.skip_initial {
            return Ok(false);
        }

        let targets = match &observer.target {
            Some(selector) => doc.query_all(doc.root(), selector),
            None => vec![element],
        };
        let action = Rc::clone(&observer.action);
        let observer = &*observer;
        let mut ctx = ActionContext::new(doc, env.accessors, env.config, element, &targets, &observer.params);
        action(&mut ctx, &result);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::EvaluationError;
    use dependson_core::fixture::append;

    fn truthy_ref(
        name: &'static str,
    ) -> impl Fn(&str, &ReferenceValues) -> std::result::Result<Value, EvaluationError> {
        move |_, refs| Ok(refs.get(name).clone())
    }

    struct Fixture {
        doc: Document,
        accessors: AccessorRegistry,
        elements: ElementReferenceRegistry,
        groups: GroupReferenceRegistry,
        actions: ActionRegistry,
        config: DependsOnConfig,
        observers: ObserverRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                doc: Document::new(),
                accessors: AccessorRegistry::with_builtin(),
                elements: ElementReferenceRegistry::new(),
                groups: GroupReferenceRegistry::new(),
                actions: ActionRegistry::with_builtin(),
                config: DependsOnConfig::default(),
                observers: ObserverRegistry::new(),
            }
        }

        fn register(&mut self, el: ElementId) {
            self.elements
                .register_element(&self.doc, &self.accessors, &self.config, el);
        }

        fn init(&mut self, el: ElementId, evaluator: &dyn ExpressionEvaluator) -> Vec<ObserverId> {
            let ids = self
                .observers
                .init(&self.doc, el, &self.actions, &self.config)
                .expect("valid declaration");
            let mut env = EvaluationEnv {
                accessors: &self.accessors,
                elements: &mut self.elements,
                groups: &mut self.groups,
                evaluator,
                config: &self.config,
            };
            for &id in &ids {
                self.observers
                    .evaluate_now(&mut self.doc, id, &mut env)
                    .expect("evaluates");
            }
            ids
        }

        fn flush(&mut self, evaluator: &dyn ExpressionEvaluator) -> FlushReport {
            let mut env = EvaluationEnv {
                accessors: &self.accessors,
                elements: &mut self.elements,
                groups: &mut self.groups,
                evaluator,
                config: &self.config,
            };
            self.observers.flush(&mut self.doc, &mut env)
        }
    }

    #[test]
    fn declarations_pair_queries_with_actions_and_params() {
        let mut doc = Document::new();
        let root = doc.root();
        let el = append(
            &mut doc,
            root,
            "input",
            &[
                ("data-dependson", "@a; @b ;@c"),
                ("data-dependsonaction", "validate;;Validate"),
                ("data-dependson-validate-msg", "first"),
                ("data-dependson-validate-msg-1", "second"),
            ],
        );
        let declared = declarations(&doc, el, &DependsOnConfig::default());
        assert_eq!(declared.len(), 3);
        assert_eq!(declared[0].action, "validate");
        assert_eq!(declared[0].params.get("msg").map(String::as_str), Some("first"));
        assert_eq!(declared[1].action, "visibility");
        assert!(declared[1].params.is_empty());
        assert_eq!(declared[2].query, "@c");
        assert_eq!(declared[2].params.get("msg").map(String::as_str), Some("second"));
    }

    #[test]
    fn init_is_idempotent_until_declaration_changes() {
        let mut fx = Fixture::new();
        let root = fx.doc.root();
        let el = append(&mut fx.doc, root, "input", &[("data-dependson", "@a")]);
        let evaluator = truthy_ref("a");
        let first = fx.init(el, &evaluator);
        assert_eq!(first.len(), 1);
        assert!(fx.init(el, &evaluator).is_empty());
        assert_eq!(fx.observers.len(), 1);

        fx.doc.set_attr(el, "data-dependson", "@b");
        let second = fx.init(el, &evaluator);
        assert_eq!(second.len(), 1);
        assert_ne!(first, second);
        assert_eq!(fx.observers.len(), 1);
        assert!(fx.observers.get(first[0]).is_none());
    }

    #[test]
    fn unknown_action_fails_init() {
        let mut fx = Fixture::new();
        let root = fx.doc.root();
        let el = append(
            &mut fx.doc,
            root,
            "input",
            &[("data-dependson", "@a"), ("data-dependsonaction", "fade")],
        );
        let err = fx
            .observers
            .init(&fx.doc, el, &fx.actions, &fx.config)
            .expect_err("unknown action");
        assert_eq!(err.kind(), "unknown_action");
        assert!(fx.observers.is_empty());
    }

    #[test]
    fn change_queues_dependents_in_subscription_order() {
        let mut fx = Fixture::new();
        let root = fx.doc.root();
        let source = append(&mut fx.doc, root, "input", &[("data-dependsonref", "r"), ("value", "x")]);
        let a = append(&mut fx.doc, root, "input", &[("data-dependson", "@r")]);
        let b = append(&mut fx.doc, root, "input", &[("data-dependson", "@r")]);
        fx.register(source);
        let evaluator = truthy_ref("r");
        let a_id = fx.init(a, &evaluator)[0];
        let b_id = fx.init(b, &evaluator)[0];
        assert!(!fx.doc.has_attr(a, "hidden"));

        fx.doc.set_value(source, "");
        fx.elements.handle_change(&fx.doc, &fx.accessors, source);
        assert_eq!(fx.observers.pending(), 2);
        let report = fx.flush(&evaluator);
        assert_eq!(report.evaluated, 2);
        assert!(fx.doc.has_attr(a, "hidden"));
        assert!(fx.doc.has_attr(b, "hidden"));
        assert_eq!(fx.observers.get(a_id).map(QueryObserver::evaluations), Some(2));
        assert_eq!(fx.observers.get(b_id).map(QueryObserver::evaluations), Some(2));
    }

    #[test]
    fn missing_reference_is_undefined_and_negation_applies() {
        let mut fx = Fixture::new();
        let root = fx.doc.root();
        let el = append(
            &mut fx.doc,
            root,
            "input",
            &[("data-dependson", "@nobody"), ("data-dependsonnegate", "")],
        );
        let id = fx.init(el, &truthy_ref("nobody"))[0];
        assert_eq!(
            fx.observers.get(id).and_then(QueryObserver::last_result),
            Some(&Value::Bool(true))
        );
        assert!(!fx.doc.has_attr(el, "hidden"));
    }

    #[test]
    fn skip_initial_defers_first_action() {
        let mut fx = Fixture::new();
        let root = fx.doc.root();
        let source = append(&mut fx.doc, root, "input", &[("data-dependsonref", "r")]);
        let el = append(
            &mut fx.doc,
            root,
            "input",
            &[("data-dependson", "@r"), ("data-dependsonskipinitial", "")],
        );
        fx.register(source);
        let evaluator = truthy_ref("r");
        fx.init(el, &evaluator);
        assert!(!fx.doc.has_attr(el, "hidden"), "first action skipped");

        fx.doc.set_value(source, "x");
        fx.elements.handle_change(&fx.doc, &fx.accessors, source);
        fx.doc.set_value(source, "");
        fx.elements.handle_change(&fx.doc, &fx.accessors, source);
        fx.flush(&evaluator);
        assert!(fx.doc.has_attr(el, "hidden"));
    }

    #[test]
    fn reclaimed_reference_requeues_and_reads_undefined() {
        let mut fx = Fixture::new();
        let root = fx.doc.root();
        let source = append(&mut fx.doc, root, "input", &[("data-dependsonref", "r"), ("value", "on")]);
        let el = append(&mut fx.doc, root, "input", &[("data-dependson", "@r")]);
        fx.register(source);
        let evaluator = truthy_ref("r");
        let id = fx.init(el, &evaluator)[0];

        fx.doc.remove(source);
        fx.elements.actualize(&fx.doc);
        fx.flush(&evaluator);
        assert_eq!(
            fx.observers.get(id).and_then(QueryObserver::last_result),
            Some(&Value::Undefined)
        );
        assert!(fx.doc.has_attr(el, "hidden"));

        let replacement = append(&mut fx.doc, root, "input", &[("data-dependsonref", "r"), ("value", "on")]);
        fx.register(replacement);
        fx.flush(&evaluator);
        assert!(!fx.doc.has_attr(el, "hidden"));
    }

    #[test]
    fn cascade_limit_stops_runaway() {
        let mut fx = Fixture::new();
        fx.config = DependsOnConfig::default().with_cascade_limit(3);
        let root = fx.doc.root();
        let el = append(&mut fx.doc, root, "input", &[("data-dependson", "@this")]);
        let evaluator = |_: &str, _: &ReferenceValues| Ok::<_, EvaluationError>(Value::Bool(true));
        let id = fx.init(el, &evaluator)[0];
        for _ in 0..5 {
            fx.observers.queue(id);
            fx.flush(&evaluator);
        }
        assert_eq!(fx.observers.get(id).map(QueryObserver::evaluations), Some(3));
        fx.observers.begin_turn();
        fx.observers.queue(id);
        assert_eq!(fx.flush(&evaluator).evaluated, 1);
    }

    #[test]
    fn detached_observers_are_destroyed() {
        let mut fx = Fixture::new();
        let root = fx.doc.root();
        let el = append(&mut fx.doc, root, "input", &[("data-dependson", "@a")]);
        fx.init(el, &truthy_ref("a"));
        fx.doc.remove(el);
        assert_eq!(fx.observers.actualize(&fx.doc), 1);
        assert!(fx.observers.is_empty());
        assert!(fx.observers.observers_of(el).is_empty());
    }
}
