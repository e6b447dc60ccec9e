//! Batch validation reports.

use std::collections::HashSet;

use crate::catalog::{Relation, Row, Value};
use crate::state::StateProvider;

use super::violation::Violation;

/// Outcome for one candidate of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TupleOutcome {
    /// Accepted, with the resolved row in canonical attribute order.
    Accepted(Row),
    /// Rejected with every violation found.
    Rejected(Vec<Violation>),
}

impl TupleOutcome {
    /// Check if the tuple was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, TupleOutcome::Accepted(_))
    }

    /// Violations of a rejected tuple; empty when accepted.
    pub fn violations(&self) -> &[Violation] {
        match self {
            TupleOutcome::Accepted(_) => &[],
            TupleOutcome::Rejected(violations) => violations,
        }
    }
}

/// Result of validating a batch.
///
/// Outcomes are in input order. A cancelled batch holds the outcomes of the
/// prefix that was processed before cancellation was observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub(crate) outcomes: Vec<TupleOutcome>,
    pub(crate) cancelled: bool,
}

impl BatchReport {
    /// Outcomes in input order.
    pub fn outcomes(&self) -> &[TupleOutcome] {
        &self.outcomes
    }

    /// Check if the batch was abandoned before every tuple was processed.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Number of processed tuples.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Check if no tuple was processed.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of accepted tuples.
    pub fn accepted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_accepted()).count()
    }

    /// Number of rejected tuples.
    pub fn rejected_count(&self) -> usize {
        self.len() - self.accepted_count()
    }

    /// Check if the whole batch was processed and accepted.
    pub fn is_fully_accepted(&self) -> bool {
        !self.cancelled && self.outcomes.iter().all(TupleOutcome::is_accepted)
    }

    /// Accepted rows in input order.
    pub fn accepted_rows(&self) -> impl Iterator<Item = &Row> {
        self.outcomes.iter().filter_map(|o| match o {
            TupleOutcome::Accepted(row) => Some(row),
            TupleOutcome::Rejected(_) => None,
        })
    }

    /// Consume the report, keeping the accepted rows.
    pub fn into_accepted_rows(self) -> Vec<Row> {
        self.outcomes
            .into_iter()
            .filter_map(|o| match o {
                TupleOutcome::Accepted(row) => Some(row),
                TupleOutcome::Rejected(_) => None,
            })
            .collect()
    }

    /// Rejected tuples as `(input index, violations)`.
    pub fn rejections(&self) -> impl Iterator<Item = (usize, &[Violation])> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.is_accepted())
            .map(|(i, o)| (i, o.violations()))
    }
}

/// Provider state plus the rows accepted earlier in the current batch.
///
/// Computed defaults of later tuples read through this view.
pub(crate) struct BatchOverlay<'a> {
    base: &'a dyn StateProvider,
    relation: &'a Relation,
    rows: Vec<Row>,
}

impl<'a> BatchOverlay<'a> {
    pub fn new(base: &'a dyn StateProvider, relation: &'a Relation) -> Self {
        Self {
            base,
            relation,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }
}

impl StateProvider for BatchOverlay<'_> {
    fn distinct(&self, relation: &str, attributes: &[String]) -> HashSet<Vec<Value>> {
        let mut set = self.base.distinct(relation, attributes);
        if relation != self.relation.name() {
            return set;
        }
        let positions: Option<Vec<usize>> = attributes
            .iter()
            .map(|a| self.relation.attribute_index(a))
            .collect();
        if let Some(positions) = positions {
            set.extend(
                self.rows
                    .iter()
                    .map(|row| Relation::project(row, &positions)),
            );
        }
        set
    }

    fn len(&self, relation: &str) -> usize {
        let base = self.base.len(relation);
        if relation == self.relation.name() {
            base + self.rows.len()
        } else {
            base
        }
    }
}
