//! Attribute definitions for relations.

use std::fmt;
use std::sync::Arc;

use super::constraint::{Constraint, ConstraintOrigin};
use super::domain::{Domain, DomainFailure};
use super::types::Value;
use crate::constraint::Violation;
use crate::state::StateView;

/// Signature of a computed default.
pub type ComputeFn = dyn Fn(&StateView<'_>) -> Value + Send + Sync;

/// Default value for an attribute.
#[derive(Clone)]
pub enum DefaultValue {
    /// A literal, checked against the domain when the schema finalizes.
    Static(Value),
    /// Evaluated per insertion against the owning relation's current state.
    Computed(Arc<ComputeFn>),
}

impl DefaultValue {
    /// Create a computed default.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&StateView<'_>) -> Value + Send + Sync + 'static,
    {
        DefaultValue::Computed(Arc::new(f))
    }

    /// Check if this default is computed.
    pub fn is_computed(&self) -> bool {
        matches!(self, DefaultValue::Computed(_))
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(v) => f.debug_tuple("Static").field(v).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DefaultValue::Static(a), DefaultValue::Static(b)) => a == b,
            (DefaultValue::Computed(a), DefaultValue::Computed(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl From<Value> for DefaultValue {
    fn from(value: Value) -> Self {
        DefaultValue::Static(value)
    }
}

/// A finalized attribute of a relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    relation: String,
    position: usize,
    domain: Arc<Domain>,
    nullable: bool,
    default: Option<DefaultValue>,
    constraints: Vec<Constraint>,
}

impl Attribute {
    pub(crate) fn new(
        name: impl Into<String>,
        relation: impl Into<String>,
        position: usize,
        domain: Arc<Domain>,
        nullable: bool,
        default: Option<DefaultValue>,
        constraints: Vec<Constraint>,
    ) -> Self {
        Self {
            name: name.into(),
            relation: relation.into(),
            position,
            domain,
            nullable,
            default,
            constraints,
        }
    }

    /// Get the attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning relation.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Position in the relation's canonical tuple layout.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the domain.
    pub fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    /// Check if the attribute accepts null.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Get the default.
    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Attribute-local constraints, evaluated after the domain's.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Check a value against the domain and the attribute-local constraints.
    ///
    /// Every failing constraint is reported. Null is accepted exactly when
    /// the attribute is nullable.
    pub fn check(&self, value: &Value) -> Vec<Violation> {
        if value.is_null() {
            return if self.nullable {
                Vec::new()
            } else {
                vec![Violation::NullNotAllowed {
                    attribute: self.name.clone(),
                }]
            };
        }

        let mut violations = Vec::new();
        for failure in self.domain.failures(value) {
            match failure {
                DomainFailure::TypeMismatch { expected, found } => {
                    // Local predicates assume the domain's kind.
                    return vec![Violation::TypeMismatch {
                        attribute: self.name.clone(),
                        expected,
                        found,
                    }];
                }
                DomainFailure::Null => {}
                DomainFailure::Constraint {
                    domain,
                    constraint,
                    index,
                } => violations.push(Violation::ConstraintFailed {
                    attribute: self.name.clone(),
                    origin: ConstraintOrigin::Domain(domain),
                    constraint,
                    index,
                }),
            }
        }

        for (index, constraint) in self.constraints.iter().enumerate() {
            if !constraint.check(value) {
                violations.push(Violation::ConstraintFailed {
                    attribute: self.name.clone(),
                    origin: ConstraintOrigin::Attribute,
                    constraint: constraint.name().to_string(),
                    index,
                });
            }
        }

        violations
    }

    /// Check if the attribute has a default.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Check if the attribute's default is computed.
    pub fn has_computed_default(&self) -> bool {
        self.default.as_ref().is_some_and(DefaultValue::is_computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BaseType;

    fn int_domain() -> Arc<Domain> {
        Arc::new(Domain::new(
            "PositiveInt",
            Some(BaseType::Integer),
            None,
            vec![Constraint::new("positive", |v| {
                v.as_i64().is_some_and(|i| i > 0)
            })],
        ))
    }

    #[test]
    fn test_domain_then_local_constraints() {
        let attr = Attribute::new(
            "age",
            "people",
            0,
            int_domain(),
            false,
            None,
            vec![Constraint::new("adult", |v| v.as_i64().is_some_and(|i| i >= 18))],
        );

        assert!(attr.check(&Value::Integer(30)).is_empty());

        let violations = attr.check(&Value::Integer(-1));
        assert_eq!(violations.len(), 2);
        assert!(matches!(
            &violations[0],
            Violation::ConstraintFailed { origin: ConstraintOrigin::Domain(d), index: 0, .. } if d == "PositiveInt"
        ));
        assert!(matches!(
            &violations[1],
            Violation::ConstraintFailed { origin: ConstraintOrigin::Attribute, index: 0, .. }
        ));
    }

    #[test]
    fn test_null_handling() {
        let required = Attribute::new("age", "people", 0, int_domain(), false, None, Vec::new());
        let optional = Attribute::new("age", "people", 0, int_domain(), true, None, Vec::new());

        assert!(matches!(
            required.check(&Value::Null).as_slice(),
            [Violation::NullNotAllowed { .. }]
        ));
        assert!(optional.check(&Value::Null).is_empty());
    }

    #[test]
    fn test_type_mismatch_skips_predicates() {
        let attr = Attribute::new("age", "people", 0, int_domain(), false, None, Vec::new());

        let violations = attr.check(&Value::String("ten".into()));
        assert!(matches!(
            violations.as_slice(),
            [Violation::TypeMismatch {
                expected: BaseType::Integer,
                found: BaseType::String,
                ..
            }]
        ));
    }

    #[test]
    fn test_default_kinds() {
        let stat: DefaultValue = Value::Integer(25).into();
        assert!(!stat.is_computed());
        assert_eq!(stat, DefaultValue::Static(Value::Integer(25)));

        let computed = DefaultValue::computed(|view| Value::Integer(view.len() as i64));
        assert!(computed.is_computed());
        assert_eq!(computed, computed.clone());
    }
}
