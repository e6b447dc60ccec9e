//! Constraint validation logic.
//!
//! The ConstraintValidator checks candidate tuples against a finalized
//! relation: value resolution and attribute constraints, candidate keys, and
//! foreign keys. It reads relation state through a [`StateProvider`] and never
//! stores tuples itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, instrument, trace};

use crate::catalog::{DefaultValue, Relation, Row, Tuple, Value};
use crate::config::ValidatorConfig;
use crate::error::Error;
use crate::metrics::ValidationMetrics;
use crate::state::{StateProvider, StateView};

use super::batch::{BatchOverlay, BatchReport, TupleOutcome};
use super::key_index::{KeyIndex, KeyLookup, ProviderLookup};
use super::violation::Violation;

/// Values of a candidate after defaults are applied.
///
/// `values[i]` is `None` when attribute `i` produced a violation; such
/// positions are left out of key and foreign-key checks.
struct Resolution {
    values: Vec<Option<Value>>,
    violations: Vec<Violation>,
}

impl Resolution {
    fn into_row(self) -> Row {
        self.values
            .into_iter()
            .map(|v| v.unwrap_or(Value::Null))
            .collect()
    }
}

/// Constraint validator for candidate tuples.
#[derive(Debug, Clone, Default)]
pub struct ConstraintValidator {
    config: ValidatorConfig,
    metrics: Option<Arc<ValidationMetrics>>,
}

impl ConstraintValidator {
    /// Create a validator with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with a specific configuration.
    ///
    /// Fails if the configuration does not pass [`ValidatorConfig::validate`].
    pub fn with_config(config: ValidatorConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: None,
        })
    }

    /// Record outcomes into a metrics registry.
    pub fn with_metrics(mut self, metrics: Arc<ValidationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Resolve a candidate and check nullability plus domain and
    /// attribute-local constraints.
    ///
    /// Every failing check is reported; nothing short-circuits across
    /// attributes.
    pub fn validate_tuple(
        &self,
        relation: &Relation,
        candidate: &Tuple,
        state: &dyn StateProvider,
    ) -> Result<(), Vec<Violation>> {
        self.resolve(relation, candidate, state).map(|_| ())
    }

    /// Like [`validate_tuple`](Self::validate_tuple), returning the resolved
    /// row in canonical attribute order.
    pub fn resolve(
        &self,
        relation: &Relation,
        candidate: &Tuple,
        state: &dyn StateProvider,
    ) -> Result<Row, Vec<Violation>> {
        let resolution = resolve(relation, candidate, state);
        if resolution.violations.is_empty() {
            Ok(resolution.into_row())
        } else {
            Err(self.cap(resolution.violations))
        }
    }

    /// Check that no candidate key projection already exists in `state`.
    pub fn validate_keys(
        &self,
        relation: &Relation,
        candidate: &Tuple,
        state: &dyn StateProvider,
    ) -> Result<(), Vec<Violation>> {
        let resolution = resolve(relation, candidate, state);
        into_result(self.cap(check_keys(
            relation,
            &resolution.values,
            &ProviderLookup(state),
        )))
    }

    /// Check that every foreign-key projection exists in its target.
    ///
    /// A foreign key with any null component references nothing and is not
    /// checked.
    pub fn validate_foreign_keys(
        &self,
        relation: &Relation,
        candidate: &Tuple,
        state: &dyn StateProvider,
    ) -> Result<(), Vec<Violation>> {
        let resolution = resolve(relation, candidate, state);
        into_result(self.cap(check_foreign_keys(
            relation,
            &resolution.values,
            &ProviderLookup(state),
        )))
    }

    /// Run tuple, key and foreign-key checks and merge their violations.
    ///
    /// A tuple is accepted only if all three pass.
    pub fn validate_all(
        &self,
        relation: &Relation,
        candidate: &Tuple,
        state: &dyn StateProvider,
    ) -> Result<(), Vec<Violation>> {
        self.admit(relation, candidate, state).map(|_| ())
    }

    /// Like [`validate_all`](Self::validate_all), returning the resolved row of
    /// an accepted tuple so the caller can store it.
    pub fn admit(
        &self,
        relation: &Relation,
        candidate: &Tuple,
        state: &dyn StateProvider,
    ) -> Result<Row, Vec<Violation>> {
        let resolution = resolve(relation, candidate, state);
        match self.settle(relation, resolution, &ProviderLookup(state)) {
            TupleOutcome::Accepted(row) => Ok(row),
            TupleOutcome::Rejected(violations) => Err(violations),
        }
    }

    /// Validate a batch against `state` plus the tuples accepted earlier in the
    /// same batch, in input order.
    ///
    /// Tuple checks fan out across the rayon pool once the batch reaches the
    /// configured threshold. Relations with computed defaults are resolved
    /// sequentially so each default sees the rows accepted before it.
    #[instrument(skip_all, fields(relation = relation.name(), tuples = candidates.len()))]
    pub fn validate_batch(
        &self,
        relation: &Relation,
        candidates: &[Tuple],
        state: &dyn StateProvider,
    ) -> BatchReport {
        self.run_batch(relation, candidates, state, None)
    }

    /// Like [`validate_batch`](Self::validate_batch), stopping before the next
    /// tuple once `cancel` is set.
    #[instrument(skip_all, fields(relation = relation.name(), tuples = candidates.len()))]
    pub fn validate_batch_cancellable(
        &self,
        relation: &Relation,
        candidates: &[Tuple],
        state: &dyn StateProvider,
        cancel: &AtomicBool,
    ) -> BatchReport {
        self.run_batch(relation, candidates, state, Some(cancel))
    }

    fn run_batch(
        &self,
        relation: &Relation,
        candidates: &[Tuple],
        state: &dyn StateProvider,
        cancel: Option<&AtomicBool>,
    ) -> BatchReport {
        let is_cancelled = || cancel.is_some_and(|c| c.load(Ordering::Relaxed));
        let mut index = KeyIndex::snapshot(relation, state);
        let mut report = BatchReport {
            outcomes: Vec::with_capacity(candidates.len()),
            cancelled: false,
        };

        if relation.has_computed_defaults() {
            let mut overlay = BatchOverlay::new(state, relation);
            for candidate in candidates {
                if is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                let resolution = resolve(relation, candidate, &overlay);
                let outcome = self.settle_into(relation, resolution, &mut index);
                if let TupleOutcome::Accepted(row) = &outcome {
                    overlay.push(row.clone());
                }
                report.outcomes.push(outcome);
            }
        } else {
            let resolve_one = |candidate: &Tuple| {
                (!is_cancelled()).then(|| resolve(relation, candidate, state))
            };
            let resolutions: Vec<Option<Resolution>> =
                if self.config.should_parallelize(candidates.len()) {
                    candidates.par_iter().map(resolve_one).collect()
                } else {
                    candidates.iter().map(resolve_one).collect()
                };

            for resolution in resolutions {
                let Some(resolution) = resolution.filter(|_| !is_cancelled()) else {
                    report.cancelled = true;
                    break;
                };
                let outcome = self.settle_into(relation, resolution, &mut index);
                report.outcomes.push(outcome);
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_batch(report.cancelled);
        }
        debug!(
            accepted = report.accepted_count(),
            rejected = report.rejected_count(),
            cancelled = report.cancelled,
            "batch validated"
        );
        report
    }

    /// Settle a batch tuple and record an accepted row in the batch index.
    fn settle_into(
        &self,
        relation: &Relation,
        resolution: Resolution,
        index: &mut KeyIndex,
    ) -> TupleOutcome {
        let outcome = self.settle(relation, resolution, &*index);
        if let TupleOutcome::Accepted(row) = &outcome {
            index.record_accepted(relation, row);
        }
        outcome
    }

    fn settle(
        &self,
        relation: &Relation,
        resolution: Resolution,
        lookup: &dyn KeyLookup,
    ) -> TupleOutcome {
        let mut violations = resolution.violations;
        violations.extend(check_keys(relation, &resolution.values, lookup));
        violations.extend(check_foreign_keys(relation, &resolution.values, lookup));

        if let Some(metrics) = &self.metrics {
            metrics.record_tuple(relation.name(), &violations);
        }

        if violations.is_empty() {
            TupleOutcome::Accepted(
                resolution
                    .values
                    .into_iter()
                    .map(|v| v.unwrap_or(Value::Null))
                    .collect(),
            )
        } else {
            trace!(
                relation = relation.name(),
                violations = violations.len(),
                "tuple rejected"
            );
            TupleOutcome::Rejected(self.cap(violations))
        }
    }

    fn cap(&self, mut violations: Vec<Violation>) -> Vec<Violation> {
        if let Some(max) = self.config.max_violations_per_tuple {
            violations.truncate(max);
        }
        violations
    }
}

fn into_result(violations: Vec<Violation>) -> Result<(), Vec<Violation>> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Apply explicit values, defaults and nulls, then check each attribute.
fn resolve(relation: &Relation, candidate: &Tuple, state: &dyn StateProvider) -> Resolution {
    let mut violations = Vec::new();

    let mut unknown: Vec<&str> = candidate
        .names()
        .filter(|name| relation.attribute(name).is_none())
        .collect();
    unknown.sort_unstable();
    violations.extend(unknown.into_iter().map(|name| Violation::UnknownAttribute {
        attribute: name.to_string(),
    }));

    let mut values = Vec::with_capacity(relation.arity());
    for attribute in relation.attributes() {
        let value = match candidate.get(attribute.name()) {
            Some(value) => {
                let found = attribute.check(value);
                if found.is_empty() {
                    Some(value.clone())
                } else {
                    violations.extend(found);
                    None
                }
            }
            None => match attribute.default() {
                Some(DefaultValue::Static(value)) => Some(value.clone()),
                Some(DefaultValue::Computed(compute)) => {
                    let value = compute(&StateView::new(state, relation.name()));
                    let found = attribute.check(&value);
                    if found.is_empty() {
                        Some(value)
                    } else {
                        let reason = found
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join("; ");
                        violations.push(Violation::DefaultViolatesConstraint {
                            attribute: attribute.name().to_string(),
                            value,
                            reason,
                        });
                        None
                    }
                }
                None if attribute.is_nullable() => Some(Value::Null),
                None => {
                    violations.push(Violation::MissingRequiredValue {
                        attribute: attribute.name().to_string(),
                    });
                    None
                }
            },
        };
        values.push(value);
    }

    Resolution { values, violations }
}

/// Projection onto `positions`, or None if any component is unresolved or null.
fn project(values: &[Option<Value>], positions: &[usize]) -> Option<Vec<Value>> {
    positions
        .iter()
        .map(|&i| values[i].clone().filter(|v| !v.is_null()))
        .collect()
}

fn check_keys(
    relation: &Relation,
    values: &[Option<Value>],
    lookup: &dyn KeyLookup,
) -> Vec<Violation> {
    relation
        .candidate_keys()
        .iter()
        .filter_map(|key| {
            let projection = project(values, key.positions())?;
            lookup
                .key_exists(relation, key, &projection)
                .then(|| Violation::DuplicateKey {
                    key: key.name().to_string(),
                    values: projection,
                })
        })
        .collect()
}

fn check_foreign_keys(
    relation: &Relation,
    values: &[Option<Value>],
    lookup: &dyn KeyLookup,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for fk in relation.foreign_keys() {
        let Some(projection) = project(values, fk.from_positions()) else {
            continue;
        };
        if lookup.reference_exists(fk, &projection) {
            continue;
        }

        // A self-referencing tuple may reference itself.
        if fk.target() == relation.name() {
            let own: Option<Vec<usize>> = fk
                .target_attributes()
                .iter()
                .map(|a| relation.attribute_index(a))
                .collect();
            if own.and_then(|positions| project(values, &positions)) == Some(projection.clone()) {
                continue;
            }
        }

        violations.push(Violation::DanglingReference {
            foreign_key: fk.name().to_string(),
            target: fk.target().to_string(),
            values: projection,
        });
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BaseType, Schema, SchemaBuilder};
    use crate::metrics::ValidationMetrics;
    use crate::state::MemoryState;

    fn schema() -> Schema {
        let mut builder = SchemaBuilder::new();
        builder.domain_from_base_type("Integer", BaseType::Integer);
        builder.domain_from_base_type("Text", BaseType::String);
        builder
            .domain("PositiveInt")
            .parent("Integer")
            .constraint("positive", |v| v.as_i64().is_some_and(|i| i > 0));
        builder
            .relation("users")
            .attribute("id", "PositiveInt")
            .attribute("email", "Text")
            .constraint("has_at", |v| v.as_str().is_some_and(|s| s.contains('@')))
            .attribute("age", "PositiveInt")
            .nullable(true)
            .attribute("role", "Text")
            .default("member")
            .end()
            .key(["id"])
            .potential_key(["email"]);
        builder
            .relation("orders")
            .attribute("id", "PositiveInt")
            .attribute("user_id", "PositiveInt")
            .nullable(true)
            .end()
            .key(["id"])
            .foreign_key("orders_user_fk", [("orders", "user_id")], [("users", "id")]);
        builder.finalize().unwrap()
    }

    fn user(id: i64, email: &str) -> Tuple {
        Tuple::new().with("id", id).with("email", email)
    }

    #[test]
    fn test_resolve_applies_defaults_and_nulls() {
        let schema = schema();
        let users = schema.relation("users").unwrap();
        let state = MemoryState::new();
        let validator = ConstraintValidator::new();

        let row = validator
            .resolve(users, &user(1, "a@example.com"), &state)
            .unwrap();
        assert_eq!(
            row,
            vec![
                Value::Integer(1),
                Value::from("a@example.com"),
                Value::Null,
                Value::from("member"),
            ]
        );
    }

    #[test]
    fn test_validate_tuple_reports_everything() {
        let schema = schema();
        let users = schema.relation("users").unwrap();
        let state = MemoryState::new();
        let validator = ConstraintValidator::new();

        let candidate = Tuple::new()
            .with("email", "nope")
            .with("age", -3)
            .with("nickname", "x");
        let violations = validator
            .validate_tuple(users, &candidate, &state)
            .unwrap_err();

        assert_eq!(violations.len(), 4);
        assert!(matches!(&violations[0], Violation::UnknownAttribute { attribute } if attribute == "nickname"));
        assert!(matches!(&violations[1], Violation::MissingRequiredValue { attribute } if attribute == "id"));
        assert!(matches!(&violations[2], Violation::ConstraintFailed { constraint, .. } if constraint == "has_at"));
        assert!(matches!(&violations[3], Violation::ConstraintFailed { attribute, .. } if attribute == "age"));
    }

    #[test]
    fn test_explicit_null() {
        let schema = schema();
        let users = schema.relation("users").unwrap();
        let state = MemoryState::new();
        let validator = ConstraintValidator::new();

        let candidate = user(1, "a@b").with("email", Value::Null).with("age", Value::Null);
        let violations = validator
            .validate_tuple(users, &candidate, &state)
            .unwrap_err();
        assert_eq!(
            violations,
            vec![Violation::NullNotAllowed {
                attribute: "email".into()
            }]
        );
    }

    #[test]
    fn test_validate_keys() {
        let schema = schema();
        let users = schema.relation("users").unwrap();
        let state = MemoryState::new();
        state.insert(users, vec![1.into(), "a@b".into(), Value::Null, "member".into()]).unwrap();
        let validator = ConstraintValidator::new();

        let violations = validator
            .validate_keys(users, &user(1, "a@b"), &state)
            .unwrap_err();
        assert_eq!(violations.len(), 2);
        assert!(matches!(&violations[0], Violation::DuplicateKey { key, .. } if key == "users_pkey"));
        assert!(matches!(&violations[1], Violation::DuplicateKey { key, .. } if key == "users_email_key"));

        assert!(validator.validate_keys(users, &user(2, "c@d"), &state).is_ok());
    }

    #[test]
    fn test_validate_foreign_keys() {
        let schema = schema();
        let users = schema.relation("users").unwrap();
        let orders = schema.relation("orders").unwrap();
        let state = MemoryState::new();
        state.insert(users, vec![1.into(), "a@b".into(), Value::Null, "member".into()]).unwrap();
        let validator = ConstraintValidator::new();

        let dangling = Tuple::new().with("id", 10).with("user_id", 3);
        let violations = validator
            .validate_foreign_keys(orders, &dangling, &state)
            .unwrap_err();
        assert_eq!(
            violations,
            vec![Violation::DanglingReference {
                foreign_key: "orders_user_fk".into(),
                target: "users".into(),
                values: vec![Value::Integer(3)],
            }]
        );

        let ok = Tuple::new().with("id", 11).with("user_id", 1);
        assert!(validator.validate_foreign_keys(orders, &ok, &state).is_ok());

        let unlinked = Tuple::new().with("id", 12);
        assert!(validator.validate_all(orders, &unlinked, &state).is_ok());
    }

    #[test]
    fn test_admit_and_cap() {
        let schema = schema();
        let users = schema.relation("users").unwrap();
        let state = MemoryState::new();
        let metrics = Arc::new(ValidationMetrics::new());
        let validator = ConstraintValidator::with_config(
            ValidatorConfig::sequential().with_max_violations_per_tuple(1),
        )
        .unwrap()
        .with_metrics(metrics.clone());

        let row = validator.admit(users, &user(1, "a@b"), &state).unwrap();
        state.insert(users, row).unwrap();

        let violations = validator
            .validate_all(users, &user(1, "a@b"), &state)
            .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(metrics.tuples_accepted(), 1);
        assert_eq!(metrics.tuples_rejected(), 1);
    }

    #[test]
    fn test_with_config_rejects_zero_cap() {
        let result =
            ConstraintValidator::with_config(ValidatorConfig::new().with_max_violations_per_tuple(0));
        assert!(matches!(result, Err(Error::Config(_))));

        let validator = ConstraintValidator::with_config(ValidatorConfig::sequential()).unwrap();
        assert!(!validator.config().parallel);
    }

    #[test]
    fn test_batch_detects_in_batch_duplicates() {
        let schema = schema();
        let users = schema.relation("users").unwrap();
        let state = MemoryState::new();
        let validator = ConstraintValidator::new();

        let report = validator.validate_batch(
            users,
            &[user(1, "a@b"), user(1, "c@d"), user(2, "a@b"), user(3, "e@f")],
            &state,
        );

        assert!(!report.is_cancelled());
        let accepted: Vec<bool> = report.outcomes().iter().map(|o| o.is_accepted()).collect();
        assert_eq!(accepted, vec![true, false, false, true]);
        assert!(matches!(
            report.outcomes()[2].violations(),
            [Violation::DuplicateKey { key, .. }] if key == "users_email_key"
        ));
    }

    #[test]
    fn test_cancelled_before_start() {
        let schema = schema();
        let users = schema.relation("users").unwrap();
        let state = MemoryState::new();
        let cancel = AtomicBool::new(true);

        let report = ConstraintValidator::new().validate_batch_cancellable(
            users,
            &[user(1, "a@b")],
            &state,
            &cancel,
        );
        assert!(report.is_cancelled());
        assert!(report.is_empty());
    }
}
