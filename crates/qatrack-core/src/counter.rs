//! Sequential custom-ID issuance.
//!
//! A counter is identified by `(kind, scope)`. The record is created lazily
//! with an implicit value of 0, so the first issued value is 1. Values are
//! never reused, even when the entity that consumed one is deleted.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, TrackerError};
use crate::model::EntityKind;

/// Identity of one counter record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceKey {
    pub kind: EntityKind,
    /// Empty when the counter is global for its kind.
    pub scope: String,
}

impl SequenceKey {
    #[must_use]
    pub fn new(kind: EntityKind, scope: Option<&str>) -> Self {
        Self {
            kind,
            scope: scope.unwrap_or_default().to_string(),
        }
    }

    /// Key used when creating an entity of `kind` in `project_id`.
    ///
    /// Every kind numbers its entities per project.
    #[must_use]
    pub fn for_project(kind: EntityKind, project_id: &str) -> Self {
        Self::new(kind, Some(project_id))
    }

    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        if self.scope.is_empty() {
            None
        } else {
            Some(&self.scope)
        }
    }

    /// Error for a counter that cannot advance any further.
    #[must_use]
    pub fn exhausted(&self) -> TrackerError {
        TrackerError::SequenceExhausted {
            kind: self.kind.to_string(),
            scope: self.scope().unwrap_or("global").to_string(),
        }
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope() {
            Some(scope) => write!(f, "{}:{}", self.kind, scope),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Atomic increment-and-fetch over durable counter records.
///
/// Implementations must perform the increment as a single operation against
/// the record. Two concurrent callers never receive the same value.
pub trait SequenceCounter {
    /// Issue the next value for `(kind, scope)`.
    ///
    /// # Errors
    ///
    /// Returns `SequenceExhausted` when the counter is at its maximum and
    /// `StoreUnavailable` when the backing store cannot be reached. No retry
    /// is attempted.
    fn next_value(&self, kind: EntityKind, scope: Option<&str>) -> Result<u64>;
}

/// Counter state held in memory.
///
/// Callers wrap it in a lock; `advance` itself is the increment step.
#[derive(Debug, Default)]
pub struct CounterTable {
    values: HashMap<SequenceKey, u64>,
}

impl CounterTable {
    /// Increment the record for `key` and return the new value.
    ///
    /// # Errors
    ///
    /// Returns `SequenceExhausted` if the record is already at `u64::MAX`.
    pub fn advance(&mut self, key: SequenceKey) -> Result<u64> {
        let current = self.values.get(&key).copied().unwrap_or(0);
        let next = current.checked_add(1).ok_or_else(|| key.exhausted())?;
        self.values.insert(key, next);
        Ok(next)
    }

    /// Current value without issuing anything; 0 for unseen keys.
    #[must_use]
    pub fn peek(&self, key: &SequenceKey) -> u64 {
        self.values.get(key).copied().unwrap_or(0)
    }

    /// Force a record to `value`. Used by tests and by stores restoring state.
    pub fn set(&mut self, key: SequenceKey, value: u64) {
        self.values.insert(key, value);
    }
}
