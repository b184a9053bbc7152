//! The evaluator: keyed boolean state with change notification.
//!
//! An [`Evaluator`] tracks a set of named conditions. Each condition has a
//! handler that recomputes it on demand and a stored state that every read
//! is answered from. Transitions are broadcast synchronously to weakly held
//! observers.
//!
//! ## Rules
//!
//! 1. Registering a key runs its handler once and stores the result silently
//! 2. A mutation that leaves a state unchanged fires no notification
//! 3. Updating a key with no handler keeps the stored state and never fails
//! 4. Internal borrows are released before handlers and observers run

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;

use crate::config::{EvaluatorConfig, ReentryPolicy};
use crate::observer::{EvaluationObserver, ObserverList};
use crate::types::{EvaluationSnapshot, EvaluatorKey};

/// Errors from evaluator accessors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    /// The key was never registered with this evaluator.
    #[error("key not found: {0}")]
    KeyNotFound(EvaluatorKey),
}

type Handler = Rc<dyn Fn() -> bool>;

/// Keyed boolean-state aggregator.
///
/// All methods take `&self`; the evaluator is meant to be embedded in the
/// feature object that owns it and read by any number of collaborators.
/// It is single-threaded (`!Send`, `!Sync`).
pub struct Evaluator {
    config: EvaluatorConfig,
    handlers: RefCell<HashMap<EvaluatorKey, Handler>>,
    states: RefCell<HashMap<EvaluatorKey, bool>>,
    observers: RefCell<ObserverList>,
    in_flight: RefCell<HashSet<EvaluatorKey>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self {
            config,
            handlers: RefCell::new(HashMap::new()),
            states: RefCell::new(HashMap::new()),
            observers: RefCell::new(ObserverList::default()),
            in_flight: RefCell::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn label(&self) -> Option<&str> {
        self.config.label.as_deref()
    }

    // ------------------------------------------------------------------
    // Registration and per-key access
    // ------------------------------------------------------------------

    /// Register `handler` under `key` and store its current result.
    ///
    /// Registration is not a change: observers are not notified. Registering
    /// an existing key replaces its handler and recomputes its state.
    pub fn register_key<F>(&self, key: EvaluatorKey, handler: F)
    where
        F: Fn() -> bool + 'static,
    {
        let handler: Handler = Rc::new(handler);
        self.handlers
            .borrow_mut()
            .insert(key.clone(), Rc::clone(&handler));

        let state = handler();
        self.states.borrow_mut().insert(key.clone(), state);

        tracing::trace!(evaluator = self.log_name(), key = %key, state, "Key registered");
    }

    /// The stored state for `key`. Never runs the handler.
    pub fn evaluation_state(&self, key: &EvaluatorKey) -> Result<bool, EvaluatorError> {
        self.states
            .borrow()
            .get(key)
            .copied()
            .ok_or_else(|| EvaluatorError::KeyNotFound(key.clone()))
    }

    /// Set the stored state for a registered key.
    ///
    /// Observers are notified only if `state` differs from the stored value.
    pub fn add_evaluation(&self, state: bool, key: &EvaluatorKey) -> Result<(), EvaluatorError> {
        let previous = self.evaluation_state(key)?;
        self.apply(key, previous, state);
        Ok(())
    }

    /// Rerun the handler for `key` and store the result.
    ///
    /// Returns the resulting state. When no handler is registered the stored
    /// state is returned unchanged (`None` if there is none).
    pub fn update_evaluation(&self, key: &EvaluatorKey) -> Option<bool> {
        let handler = self.handlers.borrow().get(key).cloned();
        let Some(handler) = handler else {
            tracing::debug!(evaluator = self.log_name(), key = %key, "No handler registered, keeping stored state");
            return self.stored(key);
        };

        let inserted = self.in_flight.borrow_mut().insert(key.clone());
        if !inserted {
            match self.config.reentry {
                ReentryPolicy::Skip => {
                    // The handler result is only compared; an owner observing
                    // itself lands here with an unchanged value.
                    let stored = self.stored(key);
                    if stored == Some(handler()) {
                        tracing::debug!(evaluator = self.log_name(), key = %key, "Re-entrant update skipped");
                    } else {
                        tracing::warn!(
                            evaluator = self.log_name(),
                            key = %key,
                            "Re-entrant update skipped with a pending change, evaluators may form a cycle"
                        );
                    }
                    return stored;
                }
                ReentryPolicy::Panic => {
                    panic!(
                        "re-entrant update of key `{}` in evaluator `{}`",
                        key,
                        self.log_name()
                    );
                }
            }
        }
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            key: key.clone(),
        };

        let next = handler();
        match self.stored(key) {
            Some(previous) => self.apply(key, previous, next),
            None => {
                self.states.borrow_mut().insert(key.clone(), next);
            }
        }
        Some(next)
    }

    /// Update each key in order. Keys without a handler are skipped.
    pub fn update_evaluations<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a EvaluatorKey>,
    {
        for key in keys {
            self.update_evaluation(key);
        }
    }

    pub fn is_registered(&self, key: &EvaluatorKey) -> bool {
        self.states.borrow().contains_key(key)
    }

    /// Tracked keys in sorted order.
    pub fn keys(&self) -> Vec<EvaluatorKey> {
        let mut keys: Vec<EvaluatorKey> = self.states.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    // ------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------

    /// True iff no tracked key is false. Vacuously true when nothing is tracked.
    pub fn is_complete(&self) -> bool {
        self.states.borrow().values().all(|state| *state)
    }

    /// Fraction of tracked keys that are true; 1.0 when nothing is tracked.
    pub fn completion(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 1.0;
        }
        self.valid_evaluations() as f64 / total as f64
    }

    pub fn total_count(&self) -> usize {
        self.states.borrow().len()
    }

    pub fn valid_evaluations(&self) -> usize {
        self.states.borrow().values().filter(|state| **state).count()
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Observe this evaluator without keeping `observer` alive.
    ///
    /// Adding the same observer twice has no effect.
    pub fn add_observer<O>(&self, observer: &Rc<O>)
    where
        O: EvaluationObserver + 'static,
    {
        let weak = Rc::downgrade(observer) as Weak<dyn EvaluationObserver>;
        self.add_weak_observer(weak);
    }

    /// Like [`Evaluator::add_observer`], for callers that only hold a weak
    /// reference, such as an owner registering itself during construction.
    pub fn add_weak_observer(&self, observer: Weak<dyn EvaluationObserver>) {
        if self.observers.borrow_mut().add(observer) {
            tracing::trace!(evaluator = self.log_name(), "Observer added");
        }
    }

    pub fn remove_observer<O>(&self, observer: &Rc<O>)
    where
        O: EvaluationObserver + 'static,
    {
        let weak = Rc::downgrade(observer) as Weak<dyn EvaluationObserver>;
        self.remove_weak_observer(&weak);
    }

    pub fn remove_weak_observer(&self, observer: &Weak<dyn EvaluationObserver>) {
        if self.observers.borrow_mut().remove(observer) {
            tracing::trace!(evaluator = self.log_name(), "Observer removed");
        }
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.observers.borrow_mut().len()
    }

    /// Deliver `(self, key, state)` to every live observer in insertion order.
    pub fn notify_observers(&self, key: &EvaluatorKey, state: bool) {
        let observers = self.observers.borrow_mut().live();
        for observer in observers {
            observer.evaluation_changed(self, key, state);
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Copy the current state, stamped with the current time.
    ///
    /// For deterministic output use [`Evaluator::snapshot_at`].
    pub fn snapshot(&self) -> EvaluationSnapshot {
        self.snapshot_at(Utc::now())
    }

    /// Copy the current state with an explicit timestamp.
    pub fn snapshot_at(&self, taken_at: DateTime<Utc>) -> EvaluationSnapshot {
        let states = self
            .states
            .borrow()
            .iter()
            .map(|(key, state)| (key.clone(), *state))
            .collect();

        EvaluationSnapshot {
            label: self.config.label.clone(),
            states,
            is_complete: self.is_complete(),
            completion: self.completion(),
            valid_evaluations: self.valid_evaluations(),
            total_count: self.total_count(),
            taken_at,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn stored(&self, key: &EvaluatorKey) -> Option<bool> {
        self.states.borrow().get(key).copied()
    }

    /// Store `next` and notify if it differs from `previous`.
    fn apply(&self, key: &EvaluatorKey, previous: bool, next: bool) {
        if previous == next {
            return;
        }
        self.states.borrow_mut().insert(key.clone(), next);

        if self.config.log_transitions {
            tracing::debug!(
                evaluator = self.log_name(),
                key = %key,
                from = previous,
                to = next,
                complete = self.is_complete(),
                observers = self.observer_count(),
                "Evaluation changed"
            );
        }

        self.notify_observers(key, next);
    }

    fn log_name(&self) -> &str {
        self.label().unwrap_or("evaluator")
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("label", &self.config.label)
            .field("states", &self.states.borrow())
            .finish_non_exhaustive()
    }
}

/// Clears a key's in-flight mark when its update finishes or unwinds.
struct InFlightGuard<'a> {
    in_flight: &'a RefCell<HashSet<EvaluatorKey>>,
    key: EvaluatorKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.borrow_mut().remove(&self.key);
    }
}
