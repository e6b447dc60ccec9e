//! In-memory relation state.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use super::StateProvider;
use crate::catalog::{Relation, Row, Tuple, Value};
use crate::error::Error;

/// Stored tuples of one relation, in the relation's canonical layout.
#[derive(Debug, Clone, Default)]
struct Table {
    attributes: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    fn positions(&self, attributes: &[String]) -> Option<Vec<usize>> {
        attributes
            .iter()
            .map(|a| self.attributes.iter().position(|x| x == a))
            .collect()
    }
}

/// Thread-safe in-memory [`StateProvider`].
///
/// Holds rows per relation name. Writers take a short exclusive lock; the
/// validation path only reads.
#[derive(Debug, Default)]
pub struct MemoryState {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolved row.
    ///
    /// The row must hold one value per attribute, in canonical order.
    pub fn insert(&self, relation: &Relation, row: Row) -> Result<(), Error> {
        if row.len() != relation.arity() {
            return Err(Error::RowArity {
                relation: relation.name().to_string(),
                expected: relation.arity(),
                found: row.len(),
            });
        }
        self.push(relation, row);
        Ok(())
    }

    /// Append a named tuple; attributes it leaves out are stored as null.
    pub fn insert_tuple(&self, relation: &Relation, tuple: &Tuple) {
        let row = relation
            .attribute_names()
            .map(|name| tuple.get(name).cloned().unwrap_or(Value::Null))
            .collect();
        self.push(relation, row);
    }

    /// Append every row of an accepted batch.
    ///
    /// Nothing is stored if any row has the wrong length.
    pub fn apply(
        &self,
        relation: &Relation,
        rows: impl IntoIterator<Item = Row>,
    ) -> Result<(), Error> {
        let rows: Vec<Row> = rows.into_iter().collect();
        if let Some(bad) = rows.iter().find(|row| row.len() != relation.arity()) {
            return Err(Error::RowArity {
                relation: relation.name().to_string(),
                expected: relation.arity(),
                found: bad.len(),
            });
        }
        for row in rows {
            self.push(relation, row);
        }
        Ok(())
    }

    fn push(&self, relation: &Relation, row: Row) {
        let mut tables = self.tables.write();
        let table = tables
            .entry(relation.name().to_string())
            .or_insert_with(|| Table {
                attributes: relation.attribute_names().map(String::from).collect(),
                rows: Vec::new(),
            });
        table.rows.push(row);
    }

    /// Remove every stored row of a relation.
    pub fn clear(&self, relation: &str) {
        if let Some(table) = self.tables.write().get_mut(relation) {
            table.rows.clear();
        }
    }

    /// Copy of the stored rows of a relation.
    pub fn rows(&self, relation: &str) -> Vec<Row> {
        self.tables
            .read()
            .get(relation)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

impl StateProvider for MemoryState {
    fn distinct(&self, relation: &str, attributes: &[String]) -> HashSet<Vec<Value>> {
        let tables = self.tables.read();
        let Some(table) = tables.get(relation) else {
            return HashSet::new();
        };
        let Some(positions) = table.positions(attributes) else {
            return HashSet::new();
        };

        table
            .rows
            .iter()
            .map(|row| positions.iter().map(|&i| row[i].clone()).collect())
            .collect()
    }

    fn contains(&self, relation: &str, attributes: &[String], values: &[Value]) -> bool {
        let tables = self.tables.read();
        let Some(table) = tables.get(relation) else {
            return false;
        };
        let Some(positions) = table.positions(attributes) else {
            return false;
        };

        table
            .rows
            .iter()
            .any(|row| positions.iter().zip(values).all(|(&i, v)| &row[i] == v))
    }

    fn len(&self, relation: &str) -> usize {
        self.tables
            .read()
            .get(relation)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}
