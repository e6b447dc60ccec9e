//! Relation state consumed by validation.
//!
//! The engine never owns tuples. Key checks, foreign-key checks and computed
//! defaults read current relation state through a [`StateProvider`] that the
//! storage layer supplies. [`MemoryState`] is an in-memory implementation for
//! embedding and tests.

mod memory;

use std::collections::HashSet;

use crate::catalog::Value;

pub use memory::MemoryState;

/// Read access to the current tuples of every relation.
///
/// Implementations are expected to answer from memory; validation calls these
/// methods on its hot path and from several threads.
pub trait StateProvider: Send + Sync {
    /// Distinct value-tuples currently stored for an attribute subset.
    fn distinct(&self, relation: &str, attributes: &[String]) -> HashSet<Vec<Value>>;

    /// Whether a value-tuple currently exists under an attribute subset.
    fn contains(&self, relation: &str, attributes: &[String], values: &[Value]) -> bool {
        self.distinct(relation, attributes).contains(values)
    }

    /// Number of tuples currently stored for a relation.
    fn len(&self, relation: &str) -> usize;

    /// Whether a relation currently holds no tuples.
    fn is_empty(&self, relation: &str) -> bool {
        self.len(relation) == 0
    }
}

/// Snapshot handle passed to computed defaults.
///
/// Scoped to the relation that owns the attribute being defaulted.
pub struct StateView<'a> {
    provider: &'a dyn StateProvider,
    relation: &'a str,
}

impl<'a> StateView<'a> {
    /// Create a view of one relation.
    pub fn new(provider: &'a dyn StateProvider, relation: &'a str) -> Self {
        Self { provider, relation }
    }

    /// Name of the viewed relation.
    pub fn relation(&self) -> &str {
        self.relation
    }

    /// Distinct value-tuples for an attribute subset.
    pub fn distinct(&self, attributes: &[&str]) -> HashSet<Vec<Value>> {
        self.provider.distinct(self.relation, &owned(attributes))
    }

    /// Whether a value-tuple exists under an attribute subset.
    pub fn contains(&self, attributes: &[&str], values: &[Value]) -> bool {
        self.provider.contains(self.relation, &owned(attributes), values)
    }

    /// Number of stored tuples.
    pub fn len(&self) -> usize {
        self.provider.len(self.relation)
    }

    /// Whether the relation is empty.
    pub fn is_empty(&self) -> bool {
        self.provider.is_empty(self.relation)
    }

    /// Largest integer stored in an attribute, if any.
    pub fn max_integer(&self, attribute: &str) -> Option<i64> {
        self.distinct(&[attribute])
            .into_iter()
            .filter_map(|t| t.first().and_then(Value::as_i64))
            .max()
    }
}

fn owned(attributes: &[&str]) -> Vec<String> {
    attributes.iter().map(|a| a.to_string()).collect()
}
