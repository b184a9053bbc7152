//! Core types for evaluator state.
//!
//! These are the value types shared by the evaluator, its observers and the
//! composition helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier for one tracked boolean condition.
///
/// Keys compare by their underlying string, so two keys built separately from
/// the same text are interchangeable. Features normally declare their keys as
/// constants:
///
/// ```rust
/// use evaluator_core::EvaluatorKey;
///
/// const ALL_VALID: EvaluatorKey = EvaluatorKey::from_static("allValid");
/// assert_eq!(ALL_VALID, EvaluatorKey::new("allValid".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluatorKey(Cow<'static, str>);

impl EvaluatorKey {
    /// Create a key from a static string. Usable in `const` context.
    pub const fn from_static(raw: &'static str) -> Self {
        Self(Cow::Borrowed(raw))
    }

    /// Create a key from any owned or borrowed string.
    pub fn new(raw: impl Into<Cow<'static, str>>) -> Self {
        Self(raw.into())
    }

    /// The raw string backing this key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EvaluatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for EvaluatorKey {
    fn from(raw: &'static str) -> Self {
        Self::from_static(raw)
    }
}

impl From<String> for EvaluatorKey {
    fn from(raw: String) -> Self {
        Self(Cow::Owned(raw))
    }
}

impl AsRef<str> for EvaluatorKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for EvaluatorKey {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

/// Point-in-time copy of an evaluator's state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationSnapshot {
    /// Label of the evaluator, if one was configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// State of every tracked key (BTreeMap for deterministic ordering)
    pub states: BTreeMap<EvaluatorKey, bool>,

    /// Whether every tracked key was true
    pub is_complete: bool,

    /// Fraction of true keys, 1.0 when nothing is tracked
    pub completion: f64,

    /// Number of true keys
    pub valid_evaluations: usize,

    /// Number of tracked keys
    pub total_count: usize,

    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl EvaluationSnapshot {
    /// Keys currently holding `false`, in sorted order.
    pub fn incomplete_keys(&self) -> Vec<&EvaluatorKey> {
        self.states
            .iter()
            .filter(|(_, state)| !**state)
            .map(|(key, _)| key)
            .collect()
    }
}
