//! # evaluator-core
//!
//! Keyed boolean-state aggregation with change notification.
//!
//! An [`Evaluator`] answers two questions for the feature object that owns it:
//! - Is each named condition currently satisfied?
//! - Is everything satisfied, and how much of it?
//!
//! ## Key Guarantees
//!
//! 1. **Memoized**: reads come from stored state; handlers only run on
//!    registration and explicit updates
//! 2. **Change-only notification**: observers hear about transitions, never
//!    about writes that leave a state unchanged
//! 3. **Non-owning**: observers are held weakly and pruned lazily
//! 4. **Composable**: a handler may read other evaluators, which is how
//!    [`Aggregate`] builds trees of validity
//!
//! ## Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use evaluator_core::{Evaluator, EvaluatorKey};
//!
//! const LOCATION: EvaluatorKey = EvaluatorKey::from_static("location");
//!
//! let has_location = Rc::new(Cell::new(false));
//! let evaluator = Evaluator::new();
//!
//! let flag = Rc::clone(&has_location);
//! evaluator.register_key(LOCATION, move || flag.get());
//! assert!(!evaluator.is_complete());
//!
//! has_location.set(true);
//! evaluator.update_evaluation(&LOCATION);
//! assert!(evaluator.is_complete());
//! assert_eq!(evaluator.completion(), 1.0);
//! ```
//!
//! ## Logging
//!
//! Transitions are emitted through `tracing` at debug level. The library
//! installs no subscriber.

pub mod composite;
pub mod config;
pub mod evaluator;
pub mod observer;
pub mod types;

// Re-export main types at crate root
pub use composite::{Aggregate, ALL_VALID};
pub use config::{ConfigError, EvaluatorConfig, ReentryPolicy};
pub use evaluator::{Evaluator, EvaluatorError};
pub use observer::{Evaluatable, EvaluationObserver};
pub use types::{EvaluationSnapshot, EvaluatorKey};
