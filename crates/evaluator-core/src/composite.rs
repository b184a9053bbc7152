//! Aggregated validity over child evaluatables.
//!
//! An [`Aggregate`] owns an evaluator with a single key that holds while
//! every child is complete. It observes each child's evaluator and
//! re-evaluates that key on any child transition, so aggregates can be nested
//! into trees (event → incidents → reports).
//!
//! Aggregates must form an acyclic graph. A cycle is caught by the
//! evaluator's re-entry guard rather than recursing.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::EvaluatorConfig;
use crate::evaluator::Evaluator;
use crate::observer::{Evaluatable, EvaluationObserver};
use crate::types::EvaluatorKey;

/// Key conventionally used for "all children are complete".
pub const ALL_VALID: EvaluatorKey = EvaluatorKey::from_static("allValid");

/// An evaluatable whose key reflects the completeness of its children.
pub struct Aggregate {
    key: EvaluatorKey,
    evaluator: Evaluator,
    children: RefCell<Vec<Rc<dyn Evaluatable>>>,
    this: Weak<Aggregate>,
}

impl Aggregate {
    /// Create an aggregate tracking [`ALL_VALID`].
    pub fn new() -> Rc<Self> {
        Self::with_key(ALL_VALID, EvaluatorConfig::default())
    }

    /// Create an aggregate tracking `key`, with an explicit evaluator config.
    pub fn with_key(key: EvaluatorKey, config: EvaluatorConfig) -> Rc<Self> {
        let aggregate = Rc::new_cyclic(|this| Self {
            key: key.clone(),
            evaluator: Evaluator::with_config(config),
            children: RefCell::new(Vec::new()),
            this: this.clone(),
        });

        let weak = Rc::downgrade(&aggregate);
        aggregate.evaluator.register_key(key, move || {
            weak.upgrade()
                .map_or(false, |aggregate| aggregate.children_complete())
        });
        aggregate
    }

    pub fn key(&self) -> &EvaluatorKey {
        &self.key
    }

    /// Add a child, observe it and re-evaluate.
    ///
    /// Adding a child that is already present only re-evaluates.
    pub fn add_child(&self, child: Rc<dyn Evaluatable>) {
        let added = {
            let mut children = self.children.borrow_mut();
            if children.iter().any(|existing| same_child(existing, &child)) {
                false
            } else {
                children.push(Rc::clone(&child));
                true
            }
        };
        if added {
            child.evaluator().add_weak_observer(self.as_observer());
        }
        self.evaluator.update_evaluation(&self.key);
    }

    /// Add several children, re-evaluating once per child.
    pub fn add_children<I>(&self, children: I)
    where
        I: IntoIterator<Item = Rc<dyn Evaluatable>>,
    {
        for child in children {
            self.add_child(child);
        }
    }

    /// Remove a child by identity, stop observing it and re-evaluate.
    pub fn remove_child(&self, child: &Rc<dyn Evaluatable>) -> bool {
        let removed = {
            let mut children = self.children.borrow_mut();
            let before = children.len();
            children.retain(|existing| !same_child(existing, child));
            children.len() != before
        };
        if removed {
            child.evaluator().remove_weak_observer(&self.as_observer());
            self.evaluator.update_evaluation(&self.key);
        }
        removed
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    /// True iff every child is complete. Vacuously true with no children.
    pub fn children_complete(&self) -> bool {
        self.children.borrow().iter().all(|child| child.is_complete())
    }

    fn as_observer(&self) -> Weak<dyn EvaluationObserver> {
        let weak: Weak<dyn EvaluationObserver> = self.this.clone();
        weak
    }
}

impl Evaluatable for Aggregate {
    fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }
}

impl EvaluationObserver for Aggregate {
    fn evaluation_changed(&self, _evaluator: &Evaluator, _key: &EvaluatorKey, _state: bool) {
        self.evaluator.update_evaluation(&self.key);
    }
}

fn same_child(a: &Rc<dyn Evaluatable>, b: &Rc<dyn Evaluatable>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}
