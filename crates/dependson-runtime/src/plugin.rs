#![forbid(unsafe_code)]

//! The lifecycle coordinator.
//!
//! [`DependsOn`] owns every registry and the injected evaluator. Hosts feed
//! it through the document outbox and drive it with [`DependsOn::pump`],
//! one call per event-loop turn.
//!
//! # Pump turn
//!
//! 1. Drain the document outbox. Each event is processed completely,
//!    including every observer it re-queues and the actions they run,
//!    before the next event is taken.
//! 2. When the outbox is empty, run one deferred task (an initialization
//!    pass), then go back to step 1.
//! 3. Stop when both queues are empty.
//!
//! # Initialization pass
//!
//! Reclaim simple references, register the simple references declared in
//! the container, reclaim and recompute group references, destroy
//! observers of detached elements, create the container's observers with
//! an immediate first evaluation, flush, then run the callback. Reclaiming
//! before registering is what makes repeated passes over overlapping
//! containers idempotent.
//!
//! # Failure Modes
//!
//! - **Configuration error during a pass** (unknown action, malformed
//!   query, bad selector): logged with `tracing::error!`, collected for
//!   [`DependsOn::take_errors`], and only the offending element is skipped.
//! - **Runaway cascade**: an observer hitting the cascade limit is skipped
//!   for the rest of the turn with a warning.

use std::collections::VecDeque;
use std::fmt;

use dependson_core::dom::{Document, ElementId};
use dependson_core::event::{DomEvent, EventKind};
use dependson_core::selector::Selector;
use dependson_core::value::Value;
use dependson_widgets::accessor::Accessor;
use dependson_widgets::registry::AccessorRegistry;
use dependson_widgets::validation::is_excluded_with;
use web_time::Instant;

use crate::action::{ActionContext, ActionFn, ActionRegistry};
use crate::config::DependsOnConfig;
use crate::error::{DependsOnError, Result};
use crate::observer::{EvaluationEnv, ObserverRegistry};
use crate::query::ExpressionEvaluator;
use crate::reference::{ElementReferenceRegistry, GroupReferenceRegistry};

/// Callback run at the end of an initialization pass.
pub type InitCallback = Box<dyn FnOnce(&mut Document)>;

struct InitTask {
    container: ElementId,
    callback: Option<InitCallback>,
}

impl fmt::Debug for InitTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitTask")
            .field("container", &self.container)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// The dependency engine for one document.
pub struct DependsOn {
    config: DependsOnConfig,
    collection: Selector,
    accessors: AccessorRegistry,
    actions: ActionRegistry,
    elements: ElementReferenceRegistry,
    groups: GroupReferenceRegistry,
    observers: ObserverRegistry,
    evaluator: Box<dyn ExpressionEvaluator>,
    tasks: VecDeque<InitTask>,
    parked: Vec<InitTask>,
    errors: Vec<DependsOnError>,
}

impl fmt::Debug for DependsOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependsOn")
            .field("references", &self.elements.len())
            .field("groups", &self.groups.len())
            .field("observers", &self.observers.len())
            .field("actions", &self.actions)
            .field("tasks", &self.tasks)
            .field("parked", &self.parked)
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}

impl DependsOn {
    /// Engine with the default configuration, built-in accessors and
    /// built-in actions.
    #[must_use]
    pub fn new(evaluator: impl ExpressionEvaluator + 'static) -> Self {
        Self::with_config(DependsOnConfig::default(), evaluator)
            .expect("default configuration is valid")
    }

    /// Engine with a custom configuration.
    pub fn with_config(
        config: DependsOnConfig,
        evaluator: impl ExpressionEvaluator + 'static,
    ) -> Result<Self> {
        let collection = config.collection()?;
        Ok(Self {
            config,
            collection,
            accessors: AccessorRegistry::with_builtin(),
            actions: ActionRegistry::with_builtin(),
            elements: ElementReferenceRegistry::new(),
            groups: GroupReferenceRegistry::new(),
            observers: ObserverRegistry::new(),
            evaluator: Box::new(evaluator),
            tasks: VecDeque::new(),
            parked: Vec::new(),
            errors: Vec::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &DependsOnConfig {
        &self.config
    }

    #[must_use]
    pub fn accessors(&self) -> &AccessorRegistry {
        &self.accessors
    }

    /// Register an accessor for elements matching `selector`.
    pub fn register_accessor(
        &mut self,
        selector: &str,
        accessor: impl Accessor + 'static,
    ) -> Result<()> {
        self.accessors
            .register_str(selector, accessor)
            .map_err(|source| DependsOnError::InvalidSelector {
                context: "accessor registration".into(),
                source,
            })
    }

    #[must_use]
    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Register a custom action; see [`ActionRegistry::register`].
    pub fn register_action(
        &mut self,
        name: &str,
        action: impl Fn(&mut ActionContext<'_>, &Value) + 'static,
    ) -> Result<String> {
        self.actions.register(name, action)
    }

    /// Look up an action; unknown names fail with the list of known ones.
    pub fn get_action(&self, name: &str) -> Result<ActionFn> {
        self.actions.get(name)
    }

    #[must_use]
    pub fn references(&self) -> &ElementReferenceRegistry {
        &self.elements
    }

    #[must_use]
    pub fn groups(&self) -> &GroupReferenceRegistry {
        &self.groups
    }

    #[must_use]
    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    /// Whether form validation should skip `el`.
    #[must_use]
    pub fn is_excluded_from_validation(&self, doc: &Document, el: ElementId) -> bool {
        is_excluded_with(
            doc,
            el,
            &[
                self.config.query_attr.as_str(),
                self.config.controllable_attr.as_str(),
            ],
        )
    }

    /// Drain configuration and evaluation errors collected so far.
    pub fn take_errors(&mut self) -> Vec<DependsOnError> {
        std::mem::take(&mut self.errors)
    }

    /// Whether initialization passes are queued or waiting for readiness.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        !self.tasks.is_empty() || !self.parked.is_empty()
    }

    /// Schedule an initialization pass over `container`.
    ///
    /// The pass runs on a later [`pump`](Self::pump) once no element in the
    /// container is still pending its own setup.
    pub fn initialize(&mut self, doc: &Document, container: ElementId) {
        self.schedule(doc, InitTask {
            container,
            callback: None,
        });
    }

    /// Like [`initialize`](Self::initialize), running `callback` at the end
    /// of the pass.
    pub fn initialize_with(
        &mut self,
        doc: &Document,
        container: ElementId,
        callback: impl FnOnce(&mut Document) + 'static,
    ) {
        self.schedule(doc, InitTask {
            container,
            callback: Some(Box::new(callback)),
        });
    }

    fn schedule(&mut self, doc: &Document, task: InitTask) {
        if doc.is_ready(task.container) {
            tracing::trace!(message = "dependson.initialize.queue", container = %task.container);
            self.tasks.push_back(task);
        } else {
            tracing::debug!(message = "dependson.initialize.park", container = %task.container);
            self.parked.push(task);
        }
    }

    fn unpark(&mut self, doc: &Document) {
        self.drop_detached_parked(doc);
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.parked)
            .into_iter()
            .partition(|task| doc.is_ready(task.container));
        self.parked = waiting;
        self.tasks.extend(ready);
    }

    /// A detached container never becomes ready; its parked pass is dropped.
    fn drop_detached_parked(&mut self, doc: &Document) {
        self.parked.retain(|task| {
            let attached = doc.is_attached(task.container);
            if !attached {
                tracing::debug!(message = "dependson.initialize.drop", container = %task.container);
            }
            attached
        });
    }

    /// Run one event-loop turn. Returns the number of events and tasks
    /// processed.
    pub fn pump(&mut self, doc: &mut Document) -> usize {
        let started = Instant::now();
        self.observers.begin_turn();
        self.drop_detached_parked(doc);
        let mut processed = 0;
        loop {
            if let Some(event) = doc.next_event() {
                self.dispatch(doc, event);
            } else if let Some(task) = self.tasks.pop_front() {
                self.run_initialize(doc, task);
            } else {
                break;
            }
            processed += 1;
        }
        if processed > 0 {
            tracing::debug!(
                message = "dependson.pump",
                processed,
                elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
            );
        }
        processed
    }

    /// Process one event now, including the re-evaluations it causes.
    pub fn dispatch(&mut self, doc: &mut Document, event: DomEvent) {
        let DomEvent { target, kind } = event;
        tracing::trace!(message = "dependson.event", target = %target, kind = ?kind);
        match kind {
            EventKind::ContentLoaded => self.initialize(doc, target),
            EventKind::ComponentReady => self.unpark(doc),
            EventKind::Change | EventKind::Selected => {
                self.handle_change(doc, target);
                self.flush(doc);
            }
            EventKind::CollectionAdd | EventKind::CollectionRemove => {
                if !self.collection.matches(doc, target) {
                    return;
                }
                self.handle_change(doc, target);
                self.elements.actualize(doc);
                self.groups.actualize(doc, &self.elements);
                self.observers.queue_within(doc, target);
                self.flush(doc);
                // New members register on the deferred pass.
                self.initialize(doc, target);
            }
        }
    }

    fn handle_change(&mut self, doc: &Document, target: ElementId) {
        let names = self.elements.handle_change(doc, &self.accessors, target);
        if !names.is_empty() {
            self.groups
                .handle_change(doc, &self.elements, target, &names);
        }
        self.observers.queue_self_readers(doc, target);
    }

    fn flush(&mut self, doc: &mut Document) {
        let mut env = EvaluationEnv {
            accessors: &self.accessors,
            elements: &mut self.elements,
            groups: &mut self.groups,
            evaluator: self.evaluator.as_ref(),
            config: &self.config,
        };
        let report = self.observers.flush(doc, &mut env);
        for error in report.errors {
            self.record(error);
        }
    }

    fn record(&mut self, error: DependsOnError) {
        tracing::error!(message = "dependson.error", kind = error.kind(), %error);
        self.errors.push(error);
    }

    fn run_initialize(&mut self, doc: &mut Document, task: InitTask) {
        let InitTask {
            container,
            callback,
        } = task;
        if doc.is_attached(container) {
            self.scan(doc, container);
        } else {
            tracing::debug!(message = "dependson.initialize.detached", container = %container);
        }
        if let Some(callback) = callback {
            callback(doc);
        }
    }

    fn scan(&mut self, doc: &mut Document, container: ElementId) {
        let started = Instant::now();
        let reclaimed = self.elements.actualize(doc);

        let mut registered = 0;
        for el in with_self(doc, container, &self.config.reference_attr) {
            if self
                .elements
                .register_element(doc, &self.accessors, &self.config, el)
                .is_some()
            {
                registered += 1;
            }
        }

        self.groups.actualize(doc, &self.elements);
        let destroyed = self.observers.actualize(doc);

        let mut created = 0;
        for el in with_self(doc, container, &self.config.query_attr) {
            let ids = match self.observers.init(doc, el, &self.actions, &self.config) {
                Ok(ids) => ids,
                Err(error) => {
                    self.record(error);
                    continue;
                }
            };
            created += ids.len();
            let mut failures = Vec::new();
            {
                let mut env = EvaluationEnv {
                    accessors: &self.accessors,
                    elements: &mut self.elements,
                    groups: &mut self.groups,
                    evaluator: self.evaluator.as_ref(),
                    config: &self.config,
                };
                for id in ids {
                    if let Err(error) = self.observers.evaluate_now(doc, id, &mut env) {
                        failures.push(error);
                    }
                }
            }
            for error in failures {
                self.record(error);
            }
        }
        self.flush(doc);

        tracing::debug!(
            message = "dependson.initialize",
            container = %container,
            reclaimed,
            registered,
            destroyed,
            created,
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
        );
    }
}

/// `container` (when it carries `attr`) followed by its descendants that do.
fn with_self(doc: &Document, container: ElementId, attr: &str) -> Vec<ElementId> {
    let mut found = Vec::new();
    if doc.has_attr(container, attr) {
        found.push(container);
    }
    found.extend(doc.query_attr(container, attr));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{EvaluationError, ReferenceValues};
    use dependson_core::fixture::append;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn echo(_: &str, refs: &ReferenceValues) -> std::result::Result<Value, EvaluationError> {
        Ok(refs.iter().next().map(|(_, v)| v.clone()).unwrap_or_default())
    }

    #[test]
    fn initialize_is_deferred_until_pump() {
        let mut doc = Document::new();
        let root = doc.root();
        let el = append(&mut doc, root, "input", &[("data-dependson", "@missing")]);
        let mut engine = DependsOn::new(echo);
        engine.initialize(&doc, root);
        assert!(engine.observers().is_empty());
        assert!(engine.has_pending_work());
        assert_eq!(engine.pump(&mut doc), 1);
        assert_eq!(engine.observers().len(), 1);
        assert!(doc.has_attr(el, "hidden"));
    }

    #[test]
    fn pending_components_park_the_pass() {
        let mut doc = Document::new();
        let root = doc.root();
        let widget = append(&mut doc, root, "coral-select", &[]);
        doc.set_pending(widget, true);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut engine = DependsOn::new(echo);
        {
            let log = Rc::clone(&log);
            engine.initialize_with(&doc, root, move |_| log.borrow_mut().push("done"));
        }
        assert_eq!(engine.pump(&mut doc), 0);
        assert!(log.borrow().is_empty());

        doc.mark_ready(widget);
        engine.pump(&mut doc);
        assert_eq!(*log.borrow(), vec!["done"]);
        assert!(!engine.has_pending_work());
    }

    #[test]
    fn parked_pass_for_detached_container_is_dropped() {
        let mut doc = Document::new();
        let root = doc.root();
        let panel = append(&mut doc, root, "div", &[]);
        let widget = append(&mut doc, panel, "coral-select", &[]);
        doc.set_pending(widget, true);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut engine = DependsOn::new(echo);
        {
            let log = Rc::clone(&log);
            engine.initialize_with(&doc, panel, move |_| log.borrow_mut().push("done"));
        }
        assert_eq!(engine.pump(&mut doc), 0);
        assert!(engine.has_pending_work());

        assert!(doc.remove(panel));
        assert_eq!(engine.pump(&mut doc), 0);
        assert!(!engine.has_pending_work());

        doc.mark_ready(widget);
        engine.pump(&mut doc);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn content_loaded_event_runs_a_pass() {
        let mut doc = Document::new();
        let root = doc.root();
        append(&mut doc, root, "input", &[("data-dependsonref", "a")]);
        let mut engine = DependsOn::new(echo);
        doc.trigger(root, EventKind::ContentLoaded);
        assert_eq!(engine.pump(&mut doc), 2);
        assert_eq!(engine.references().len(), 1);
    }

    #[test]
    fn configuration_errors_are_collected() {
        let mut doc = Document::new();
        let root = doc.root();
        let bad = append(
            &mut doc,
            root,
            "input",
            &[("data-dependson", "@a"), ("data-dependsonaction", "explode")],
        );
        let good = append(&mut doc, root, "input", &[("data-dependson", "@a")]);
        let mut engine = DependsOn::new(echo);
        engine.initialize(&doc, root);
        engine.pump(&mut doc);

        let errors = engine.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), "unknown_action");
        assert!(engine.observers().observers_of(bad).is_empty());
        assert_eq!(engine.observers().observers_of(good).len(), 1);
        assert!(engine.take_errors().is_empty());
    }

    #[test]
    fn evaluation_errors_are_collected() {
        let mut doc = Document::new();
        let root = doc.root();
        append(&mut doc, root, "input", &[("data-dependson", "@a")]);
        let mut engine =
            DependsOn::new(|_: &str, _: &ReferenceValues| Err::<Value, _>(EvaluationError::new("boom")));
        engine.initialize(&doc, root);
        engine.pump(&mut doc);
        let errors = engine.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("boom"));
    }

    #[test]
    fn invalid_collection_selector_is_rejected() {
        let config = DependsOnConfig::default().with_collection_selector("[");
        assert!(DependsOn::with_config(config, echo).is_err());
    }

    #[test]
    fn register_accessor_maps_selector_errors() {
        let mut engine = DependsOn::new(echo);
        let err = engine
            .register_accessor("", dependson_widgets::DefaultAccessor)
            .expect_err("empty selector");
        assert_eq!(err.kind(), "invalid_selector");
    }
}
