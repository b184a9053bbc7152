//! Observer capability and the weak observer list.
//!
//! Observers are held weakly: an evaluator never keeps an observer alive.
//! Entries whose observer has been dropped are pruned lazily, on the next
//! add, remove, count or notify.

use std::rc::{Rc, Weak};

use crate::evaluator::Evaluator;
use crate::types::EvaluatorKey;

/// Receives state transitions from an [`Evaluator`].
pub trait EvaluationObserver {
    /// Called synchronously after `key` changed to `state` in `evaluator`.
    ///
    /// The evaluator holds no internal borrows while this runs, so the
    /// observer may read it or update any evaluator, including this one.
    fn evaluation_changed(&self, evaluator: &Evaluator, key: &EvaluatorKey, state: bool);
}

/// A feature object that owns an evaluator.
pub trait Evaluatable {
    /// The evaluator tracking this object's conditions.
    fn evaluator(&self) -> &Evaluator;

    /// Whether every condition of this object holds.
    fn is_complete(&self) -> bool {
        self.evaluator().is_complete()
    }

    /// Fraction of conditions that hold.
    fn completion(&self) -> f64 {
        self.evaluator().completion()
    }
}

/// Ordered list of weakly held observers, unique by identity.
#[derive(Default)]
pub(crate) struct ObserverList {
    entries: Vec<Weak<dyn EvaluationObserver>>,
}

impl ObserverList {
    /// Add an observer unless it is already present. Returns whether it was added.
    pub(crate) fn add(&mut self, observer: Weak<dyn EvaluationObserver>) -> bool {
        self.prune();
        if observer.strong_count() == 0 {
            return false;
        }
        if self.entries.iter().any(|entry| same_observer(entry, &observer)) {
            return false;
        }
        self.entries.push(observer);
        true
    }

    /// Remove an observer by identity. Returns whether it was present.
    pub(crate) fn remove(&mut self, observer: &Weak<dyn EvaluationObserver>) -> bool {
        self.prune();
        let before = self.entries.len();
        self.entries.retain(|entry| !same_observer(entry, observer));
        self.entries.len() != before
    }

    /// Number of live observers.
    pub(crate) fn len(&mut self) -> usize {
        self.prune();
        self.entries.len()
    }

    /// Strong handles to every live observer, in insertion order.
    pub(crate) fn live(&mut self) -> Vec<Rc<dyn EvaluationObserver>> {
        self.prune();
        self.entries.iter().filter_map(Weak::upgrade).collect()
    }

    fn prune(&mut self) {
        self.entries.retain(|entry| entry.strong_count() > 0);
    }
}

// Compare data pointers only; vtable pointers for the same object may differ
// across codegen units.
fn same_observer(a: &Weak<dyn EvaluationObserver>, b: &Weak<dyn EvaluationObserver>) -> bool {
    std::ptr::eq(a.as_ptr() as *const (), b.as_ptr() as *const ())
}
