//! Key and reference lookups used by key and foreign-key checks.
//!
//! Single-tuple validation asks the [`StateProvider`] directly. Batches take a
//! [`KeyIndex`] snapshot once and add the projections of every tuple accepted
//! earlier in the batch, so duplicates inside a batch are caught in input
//! order.

use std::collections::{HashMap, HashSet};

use crate::catalog::{ForeignKey, Key, Relation, Value};
use crate::state::StateProvider;

/// Answers key-existence questions for one relation.
pub(crate) trait KeyLookup {
    /// Whether `values` already exists under `key` of `relation`.
    fn key_exists(&self, relation: &Relation, key: &Key, values: &[Value]) -> bool;

    /// Whether `values` exists under the target attributes of `foreign_key`.
    fn reference_exists(&self, foreign_key: &ForeignKey, values: &[Value]) -> bool;
}

/// Lookups straight against current provider state.
pub(crate) struct ProviderLookup<'a>(pub &'a dyn StateProvider);

impl KeyLookup for ProviderLookup<'_> {
    fn key_exists(&self, relation: &Relation, key: &Key, values: &[Value]) -> bool {
        self.0.contains(relation.name(), key.attributes(), values)
    }

    fn reference_exists(&self, foreign_key: &ForeignKey, values: &[Value]) -> bool {
        self.0
            .contains(foreign_key.target(), &foreign_key.target_attributes(), values)
    }
}

/// Snapshot of key projections and referenced projections for one batch.
///
/// Key sets are indexed by key name, reference sets by foreign key name.
#[derive(Debug, Default)]
pub(crate) struct KeyIndex {
    keys: HashMap<String, HashSet<Vec<Value>>>,
    references: HashMap<String, HashSet<Vec<Value>>>,
}

impl KeyIndex {
    /// Take a snapshot of everything `relation`'s keys and foreign keys read.
    pub fn snapshot(relation: &Relation, provider: &dyn StateProvider) -> Self {
        let keys = relation
            .candidate_keys()
            .iter()
            .map(|key| {
                (
                    key.name().to_string(),
                    provider.distinct(relation.name(), key.attributes()),
                )
            })
            .collect();

        let references = relation
            .foreign_keys()
            .iter()
            .map(|fk| {
                (
                    fk.name().to_string(),
                    provider.distinct(fk.target(), &fk.target_attributes()),
                )
            })
            .collect();

        Self { keys, references }
    }

    /// Check if a key projection is still available.
    pub fn check_unique(&self, key: &str, values: &[Value]) -> bool {
        !self.keys.get(key).is_some_and(|set| set.contains(values))
    }

    /// Insert a key projection. Returns false if it was already present.
    pub fn insert(&mut self, key: &str, values: Vec<Value>) -> bool {
        self.keys.entry(key.to_string()).or_default().insert(values)
    }

    /// Record an accepted row so later tuples of the batch see it.
    ///
    /// Self-referencing foreign keys also gain the row as a valid target.
    pub fn record_accepted(&mut self, relation: &Relation, row: &[Value]) {
        for key in relation.candidate_keys() {
            self.insert(key.name(), Relation::project(row, key.positions()));
        }

        for fk in relation.foreign_keys() {
            if fk.target() != relation.name() {
                continue;
            }
            let positions: Option<Vec<usize>> = fk
                .target_attributes()
                .iter()
                .map(|a| relation.attribute_index(a))
                .collect();
            if let Some(positions) = positions {
                self.references
                    .entry(fk.name().to_string())
                    .or_default()
                    .insert(Relation::project(row, &positions));
            }
        }
    }
}

impl KeyLookup for KeyIndex {
    fn key_exists(&self, _relation: &Relation, key: &Key, values: &[Value]) -> bool {
        !self.check_unique(key.name(), values)
    }

    fn reference_exists(&self, foreign_key: &ForeignKey, values: &[Value]) -> bool {
        self.references
            .get(foreign_key.name())
            .is_some_and(|set| set.contains(values))
    }
}
