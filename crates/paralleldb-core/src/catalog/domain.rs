//! Domains: named value spaces with inherited constraint chains.

use std::fmt;
use std::sync::Arc;

use super::constraint::Constraint;
use super::types::{BaseType, Value};

/// A constraint in a domain's resolved chain, tagged with the domain that
/// declared it and its position in that domain's own list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainedConstraint {
    /// Name of the declaring domain.
    pub domain: String,
    /// Index within the declaring domain's own constraint list.
    pub index: usize,
    /// The predicate.
    pub constraint: Constraint,
}

/// A reason a value falls outside a domain.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainFailure {
    /// The value kind does not match the base type.
    TypeMismatch {
        /// Base type of the domain.
        expected: BaseType,
        /// Kind of the rejected value.
        found: BaseType,
    },
    /// Null is outside every domain.
    Null,
    /// A constraint predicate returned false.
    Constraint {
        /// Name of the declaring domain.
        domain: String,
        /// Constraint name.
        constraint: String,
        /// Index within the declaring domain's own constraint list.
        index: usize,
    },
}

/// A finalized, immutable domain.
///
/// A value belongs to the domain iff it matches the base type and satisfies
/// every constraint of every ancestor (checked first) and of the domain itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    name: String,
    base_type: Option<BaseType>,
    parent: Option<Arc<Domain>>,
    own: Vec<Constraint>,
    chain: Vec<ChainedConstraint>,
}

impl Domain {
    /// Assemble a domain from its resolved parent and own constraints.
    pub(crate) fn new(
        name: impl Into<String>,
        base_type: Option<BaseType>,
        parent: Option<Arc<Domain>>,
        own: Vec<Constraint>,
    ) -> Self {
        let name = name.into();
        let mut chain = parent
            .as_ref()
            .map(|p| p.chain.clone())
            .unwrap_or_default();
        chain.extend(own.iter().enumerate().map(|(index, c)| ChainedConstraint {
            domain: name.clone(),
            index,
            constraint: c.clone(),
        }));

        Self {
            name,
            base_type,
            parent,
            own,
            chain,
        }
    }

    /// Get the domain name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the base type; `None` accepts every non-null kind.
    pub fn base_type(&self) -> Option<BaseType> {
        self.base_type
    }

    /// Get the parent domain.
    pub fn parent(&self) -> Option<&Arc<Domain>> {
        self.parent.as_ref()
    }

    /// Constraints declared on this domain alone.
    pub fn own_constraints(&self) -> &[Constraint] {
        &self.own
    }

    /// All constraints in evaluation order, ancestors first.
    pub fn constraints(&self) -> &[ChainedConstraint] {
        &self.chain
    }

    /// Iterate over the ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Domain> {
        std::iter::successors(self.parent.as_deref(), |d| d.parent.as_deref())
    }

    /// Check whether this domain is `other` or inherits from it.
    pub fn is_descendant_of(&self, other: &Domain) -> bool {
        self.name == other.name || self.ancestors().any(|a| a.name == other.name)
    }

    /// Check a value, stopping at the first failure.
    pub fn is_valid(&self, value: &Value) -> bool {
        let Some(kind) = value.kind() else {
            return false;
        };
        if self.base_type.is_some_and(|bt| bt != kind) {
            return false;
        }
        self.chain.iter().all(|c| c.constraint.check(value))
    }

    /// Check a value and report every failing constraint.
    ///
    /// A type mismatch is reported alone: predicates are not run on values of
    /// the wrong kind.
    pub fn failures(&self, value: &Value) -> Vec<DomainFailure> {
        let Some(kind) = value.kind() else {
            return vec![DomainFailure::Null];
        };
        if let Some(expected) = self.base_type {
            if expected != kind {
                return vec![DomainFailure::TypeMismatch {
                    expected,
                    found: kind,
                }];
            }
        }

        self.chain
            .iter()
            .filter(|c| !c.constraint.check(value))
            .map(|c| DomainFailure::Constraint {
                domain: c.domain.clone(),
                constraint: c.constraint.name().to_string(),
                index: c.index,
            })
            .collect()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
