//! Named constraint predicates attached to domains and attributes.

use std::fmt;
use std::sync::Arc;

use super::types::Value;

/// Predicate signature: a pure, deterministic test over a single value.
pub type PredicateFn = dyn Fn(&Value) -> bool + Send + Sync;

/// A named predicate.
///
/// Predicates must not capture mutable state; finalized schemas share them
/// across validator threads.
#[derive(Clone)]
pub struct Constraint {
    name: String,
    predicate: Arc<PredicateFn>,
}

impl Constraint {
    /// Create a constraint from a name and a predicate.
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Get the constraint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the predicate.
    pub fn check(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Two constraints are equal when they share a name and the same predicate
/// allocation; closures themselves cannot be compared.
impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && Arc::as_ptr(&self.predicate) as *const () == Arc::as_ptr(&other.predicate) as *const ()
    }
}

/// Where a failing constraint was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintOrigin {
    /// Declared on the named domain (possibly an ancestor).
    Domain(String),
    /// Declared on the attribute itself.
    Attribute,
}

impl fmt::Display for ConstraintOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintOrigin::Domain(name) => write!(f, "domain '{}'", name),
            ConstraintOrigin::Attribute => f.write_str("attribute"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_constraint() {
        let positive = Constraint::new("positive", |v| v.as_i64().is_some_and(|i| i > 0));

        assert_eq!(positive.name(), "positive");
        assert!(positive.check(&Value::Integer(5)));
        assert!(!positive.check(&Value::Integer(-1)));
        assert!(!positive.check(&Value::String("5".into())));
    }

    #[test]
    fn test_equality_is_by_identity() {
        let a = Constraint::new("positive", |v| v.as_i64().is_some_and(|i| i > 0));
        let b = Constraint::new("positive", |v| v.as_i64().is_some_and(|i| i > 0));

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(
            ConstraintOrigin::Domain("Age".into()).to_string(),
            "domain 'Age'"
        );
        assert_eq!(ConstraintOrigin::Attribute.to_string(), "attribute");
    }
}
