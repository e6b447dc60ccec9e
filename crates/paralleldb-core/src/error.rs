//! Core error types.

use thiserror::Error;

use crate::catalog::BaseType;
use crate::constraint::Violation;

/// Errors that make a schema definition internally inconsistent.
///
/// All variants except [`DefinitionError::InvalidDefaultShape`] are collected
/// by `SchemaBuilder::finalize` and reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// Two domains declared with the same name.
    #[error("duplicate domain name: {0}")]
    DuplicateDomainName(String),

    /// Two relations declared with the same name.
    #[error("duplicate relation name: {0}")]
    DuplicateRelationName(String),

    /// Two attributes with the same name on one relation.
    #[error("duplicate attribute '{attribute}' on relation '{relation}'")]
    DuplicateAttributeName {
        /// Relation name.
        relation: String,
        /// Attribute name.
        attribute: String,
    },

    /// An attribute is bound to a domain that was never declared.
    #[error("attribute '{relation}.{attribute}' references unknown domain '{domain}'")]
    UnknownDomain {
        /// Relation name.
        relation: String,
        /// Attribute name.
        attribute: String,
        /// Domain name.
        domain: String,
    },

    /// A domain names a parent that was never declared.
    #[error("domain '{domain}' references unknown parent '{parent}'")]
    UnknownParentDomain {
        /// Domain name.
        domain: String,
        /// Parent domain name.
        parent: String,
    },

    /// A foreign key targets a relation that was never declared.
    #[error("foreign key '{foreign_key}' on '{relation}' targets unknown relation '{target}'")]
    UnknownRelation {
        /// Owning relation name.
        relation: String,
        /// Foreign key name.
        foreign_key: String,
        /// Target relation name.
        target: String,
    },

    /// A key or foreign key names an attribute the relation does not have.
    #[error("key '{key}' references unknown attribute '{relation}.{attribute}'")]
    UnknownAttributeInKey {
        /// Relation the attribute was looked up on.
        relation: String,
        /// Key or foreign key name.
        key: String,
        /// Attribute name.
        attribute: String,
    },

    /// A key was declared over no attributes.
    #[error("key on relation '{relation}' has no attributes")]
    EmptyKey {
        /// Relation name.
        relation: String,
    },

    /// A key attribute is nullable.
    #[error("key '{key}' uses nullable attribute '{relation}.{attribute}'")]
    KeyAttributeNullable {
        /// Relation name.
        relation: String,
        /// Key name.
        key: String,
        /// Attribute name.
        attribute: String,
    },

    /// More than one primary key declared on a relation.
    #[error("relation '{0}' declares more than one primary key")]
    MultiplePrimaryKeys(String),

    /// The primary key strictly contains another candidate key.
    #[error("primary key of '{relation}' is not a candidate key: it contains key '{contained}'")]
    PrimaryKeyNotCandidate {
        /// Relation name.
        relation: String,
        /// The smaller candidate key inside the primary key.
        contained: String,
    },

    /// A foreign key's `from` and `to` lists differ in length.
    #[error("foreign key '{foreign_key}' maps {from} attribute(s) onto {to}")]
    ForeignKeyArityMismatch {
        /// Foreign key name.
        foreign_key: String,
        /// Length of the `from` list.
        from: usize,
        /// Length of the `to` list.
        to: usize,
    },

    /// A `from` attribute is not a descendant of its `to` attribute's domain.
    #[error(
        "foreign key '{foreign_key}': domain '{from_domain}' of '{from_attribute}' is not compatible with '{to_domain}' of '{to_attribute}'"
    )]
    ForeignKeyDomainIncompatible {
        /// Foreign key name.
        foreign_key: String,
        /// Source attribute.
        from_attribute: String,
        /// Source attribute's domain.
        from_domain: String,
        /// Target attribute.
        to_attribute: String,
        /// Target attribute's domain.
        to_domain: String,
    },

    /// The `to` attributes do not form a declared key of the target relation.
    #[error("foreign key '{foreign_key}' does not reference a key of '{target}'")]
    ForeignKeyTargetNotAKey {
        /// Foreign key name.
        foreign_key: String,
        /// Target relation name.
        target: String,
    },

    /// A `from` attribute belongs to a relation other than the owner.
    #[error("foreign key '{foreign_key}' on '{relation}' lists source attribute of '{other}'")]
    ForeignKeySourceMismatch {
        /// Owning relation name.
        relation: String,
        /// Foreign key name.
        foreign_key: String,
        /// The relation named by the offending source attribute.
        other: String,
    },

    /// A foreign key was declared with an empty `from` or `to` list.
    #[error("foreign key '{foreign_key}' on '{relation}' has no attributes")]
    ForeignKeyEmpty {
        /// Owning relation name.
        relation: String,
        /// Foreign key name.
        foreign_key: String,
    },

    /// The `to` list spans more than one relation.
    #[error("foreign key '{foreign_key}' targets more than one relation")]
    ForeignKeyMixedTargets {
        /// Foreign key name.
        foreign_key: String,
    },

    /// A domain is its own ancestor.
    #[error("cyclic inheritance involving domain '{0}'")]
    CyclicDomainInheritance(String),

    /// `parent` was called more than once on a domain.
    #[error("domain '{0}' has its parent assigned more than once")]
    DuplicateParentAssignment(String),

    /// A domain's explicit base type differs from its parent's.
    #[error("domain '{domain}' declares base type {declared} but its parent has {inherited}")]
    BaseTypeConflict {
        /// Domain name.
        domain: String,
        /// Base type set on the domain itself.
        declared: BaseType,
        /// Base type of the parent chain.
        inherited: BaseType,
    },

    /// A static default is rejected by its attribute's domain.
    #[error("static default of '{relation}.{attribute}' is invalid: {reason}")]
    DefaultViolatesDomain {
        /// Relation name.
        relation: String,
        /// Attribute name.
        attribute: String,
        /// Description of the failed checks.
        reason: String,
    },

    /// A default was given in a shape that is neither a literal nor a function.
    #[error("invalid default for attribute '{attribute}': {shape} is not a literal value")]
    InvalidDefaultShape {
        /// Attribute name.
        attribute: String,
        /// Description of the rejected shape.
        shape: String,
    },
}

/// Crate-level error for callers that want a single `?`-friendly type.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema failed to finalize.
    #[error("schema definition failed with {} error(s)", .0.len())]
    Definition(Vec<DefinitionError>),

    /// A tuple was rejected.
    #[error("tuple rejected with {} violation(s)", .0.len())]
    Rejected(Vec<Violation>),

    /// JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid validator configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A stored row does not match the layout of its relation.
    #[error("row for '{relation}' has {found} value(s), expected {expected}")]
    RowArity {
        relation: String,
        expected: usize,
        found: usize,
    },
}

impl From<Vec<DefinitionError>> for Error {
    fn from(errors: Vec<DefinitionError>) -> Self {
        Error::Definition(errors)
    }
}

impl From<DefinitionError> for Error {
    fn from(error: DefinitionError) -> Self {
        Error::Definition(vec![error])
    }
}

impl From<Vec<Violation>> for Error {
    fn from(violations: Vec<Violation>) -> Self {
        Error::Rejected(violations)
    }
}
