//! Data-level violation reports.

use thiserror::Error;

use crate::catalog::{BaseType, ConstraintOrigin, Value};

/// One failed data-level check for a candidate tuple.
///
/// Violations are always recoverable: the caller rejects the write and
/// surfaces the report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    /// A non-nullable attribute without a default was not supplied.
    #[error("missing required value for attribute '{attribute}'")]
    MissingRequiredValue {
        /// Attribute name.
        attribute: String,
    },

    /// Null supplied for a non-nullable attribute.
    #[error("null not allowed for attribute '{attribute}'")]
    NullNotAllowed {
        /// Attribute name.
        attribute: String,
    },

    /// The candidate names an attribute the relation does not have.
    #[error("unknown attribute '{attribute}'")]
    UnknownAttribute {
        /// Attribute name.
        attribute: String,
    },

    /// Value kind differs from the domain's base type.
    #[error("attribute '{attribute}' expects {expected}, found {found}")]
    TypeMismatch {
        /// Attribute name.
        attribute: String,
        /// Base type of the domain.
        expected: BaseType,
        /// Kind of the supplied value.
        found: BaseType,
    },

    /// A domain or attribute-local predicate rejected the value.
    #[error("constraint '{constraint}' (#{index} of {origin}) failed for attribute '{attribute}'")]
    ConstraintFailed {
        /// Attribute name.
        attribute: String,
        /// Where the predicate was declared.
        origin: ConstraintOrigin,
        /// Predicate name.
        constraint: String,
        /// Index in the declaring domain's or attribute's own list.
        index: usize,
    },

    /// A computed default produced a value the attribute rejects.
    #[error("computed default {value} for attribute '{attribute}' is invalid: {reason}")]
    DefaultViolatesConstraint {
        /// Attribute name.
        attribute: String,
        /// The computed value.
        value: Value,
        /// The violations the value raised.
        reason: String,
    },

    /// The key projection already exists.
    #[error("duplicate key '{key}': ({})", format_values(.values))]
    DuplicateKey {
        /// Key name.
        key: String,
        /// The colliding projection.
        values: Vec<Value>,
    },

    /// The foreign-key projection matches no tuple of the target.
    #[error("dangling reference '{foreign_key}' to '{target}': ({})", format_values(.values))]
    DanglingReference {
        /// Foreign key name.
        foreign_key: String,
        /// Target relation name.
        target: String,
        /// The unmatched projection.
        values: Vec<Value>,
    },
}

/// Coarse classification of a [`Violation`], used for counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    MissingRequiredValue,
    NullNotAllowed,
    UnknownAttribute,
    TypeMismatch,
    ConstraintFailed,
    DefaultViolatesConstraint,
    DuplicateKey,
    DanglingReference,
}

impl ViolationKind {
    /// All kinds, in declaration order.
    pub const ALL: [ViolationKind; 8] = [
        ViolationKind::MissingRequiredValue,
        ViolationKind::NullNotAllowed,
        ViolationKind::UnknownAttribute,
        ViolationKind::TypeMismatch,
        ViolationKind::ConstraintFailed,
        ViolationKind::DefaultViolatesConstraint,
        ViolationKind::DuplicateKey,
        ViolationKind::DanglingReference,
    ];

    /// Snake-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::MissingRequiredValue => "missing_required_value",
            ViolationKind::NullNotAllowed => "null_not_allowed",
            ViolationKind::UnknownAttribute => "unknown_attribute",
            ViolationKind::TypeMismatch => "type_mismatch",
            ViolationKind::ConstraintFailed => "constraint_failed",
            ViolationKind::DefaultViolatesConstraint => "default_violates_constraint",
            ViolationKind::DuplicateKey => "duplicate_key",
            ViolationKind::DanglingReference => "dangling_reference",
        }
    }
}

impl Violation {
    /// Get the violation kind.
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::MissingRequiredValue { .. } => ViolationKind::MissingRequiredValue,
            Violation::NullNotAllowed { .. } => ViolationKind::NullNotAllowed,
            Violation::UnknownAttribute { .. } => ViolationKind::UnknownAttribute,
            Violation::TypeMismatch { .. } => ViolationKind::TypeMismatch,
            Violation::ConstraintFailed { .. } => ViolationKind::ConstraintFailed,
            Violation::DefaultViolatesConstraint { .. } => {
                ViolationKind::DefaultViolatesConstraint
            }
            Violation::DuplicateKey { .. } => ViolationKind::DuplicateKey,
            Violation::DanglingReference { .. } => ViolationKind::DanglingReference,
        }
    }

    /// Attribute the violation is about, for attribute-level violations.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Violation::MissingRequiredValue { attribute }
            | Violation::NullNotAllowed { attribute }
            | Violation::UnknownAttribute { attribute }
            | Violation::TypeMismatch { attribute, .. }
            | Violation::ConstraintFailed { attribute, .. }
            | Violation::DefaultViolatesConstraint { attribute, .. } => Some(attribute),
            Violation::DuplicateKey { .. } | Violation::DanglingReference { .. } => None,
        }
    }
}

fn format_values(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let v = Violation::DuplicateKey {
            key: "users_pkey".into(),
            values: vec![Value::Integer(1), Value::from("x")],
        };
        assert_eq!(v.to_string(), "duplicate key 'users_pkey': (1, 'x')");

        let v = Violation::ConstraintFailed {
            attribute: "age".into(),
            origin: ConstraintOrigin::Domain("PositiveInt".into()),
            constraint: "positive".into(),
            index: 0,
        };
        assert_eq!(
            v.to_string(),
            "constraint 'positive' (#0 of domain 'PositiveInt') failed for attribute 'age'"
        );
    }

    #[test]
    fn test_kind_and_attribute() {
        let v = Violation::NullNotAllowed {
            attribute: "email".into(),
        };
        assert_eq!(v.kind(), ViolationKind::NullNotAllowed);
        assert_eq!(v.attribute(), Some("email"));

        let v = Violation::DanglingReference {
            foreign_key: "fk".into(),
            target: "users".into(),
            values: vec![Value::Integer(3)],
        };
        assert_eq!(v.kind().as_str(), "dangling_reference");
        assert_eq!(v.attribute(), None);
    }
}
