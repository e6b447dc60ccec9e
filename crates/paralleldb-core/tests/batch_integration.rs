//! Integration tests for batch validation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use paralleldb_core::catalog::{BaseType, Schema, SchemaBuilder, Tuple, Value};
use paralleldb_core::config::ValidatorConfig;
use paralleldb_core::constraint::{ConstraintValidator, TupleOutcome, Violation};
use paralleldb_core::metrics::ValidationMetrics;
use paralleldb_core::state::{MemoryState, StateProvider};

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
        .end()
        .key(["id"])
        .potential_key(["email"]);
    builder
        .relation("tickets")
        .attribute("id", "PositiveInt")
        .default_with(|view| Value::Integer(view.max_integer("id").unwrap_or(0) + 1))
        .attribute("title", "Text")
        .end()
        .key(["id"]);
    builder
        .relation("employees")
        .attribute("id", "PositiveInt")
        .attribute("manager_id", "PositiveInt")
        .nullable(true)
        .end()
        .key(["id"])
        .foreign_key(
            "employees_manager_fk",
            [("employees", "manager_id")],
            [("employees", "id")],
        );
    builder.finalize().unwrap()
}

fn user(id: i64, email: &str) -> Tuple {
    Tuple::new().with("id", id).with("email", email)
}

fn user_batch(len: i64) -> Vec<Tuple> {
    // Every tenth id repeats an earlier one; every seventh id is invalid.
    (1..=len)
        .map(|i| {
            let id = if i % 10 == 0 { i - 5 } else if i % 7 == 0 { -i } else { i };
            user(id, &format!("user{i}@example.com"))
        })
        .collect()
}

fn decisions(outcomes: &[TupleOutcome]) -> Vec<bool> {
    outcomes.iter().map(TupleOutcome::is_accepted).collect()
}

#[test]
fn test_in_batch_duplicates_in_input_order() {
    let schema = schema();
    let users = schema.relation("users").unwrap();
    let state = MemoryState::new();
    state.insert(users, vec![Value::Integer(1), Value::from("taken@example.com")]).unwrap();

    let report = ConstraintValidator::new().validate_batch(
        users,
        &[
            user(1, "a@example.com"),
            user(2, "taken@example.com"),
            user(3, "b@example.com"),
            user(3, "c@example.com"),
            user(4, "b@example.com"),
        ],
        &state,
    );

    assert_eq!(decisions(report.outcomes()), vec![false, false, true, false, false]);
    assert_eq!(report.accepted_count(), 1);
    for (_, violations) in report.rejections() {
        assert!(matches!(violations, [Violation::DuplicateKey { .. }]));
    }
    assert_eq!(state.len("users"), 1);
}

#[test]
fn test_parallel_matches_sequential() {
    let schema = schema();
    let users = schema.relation("users").unwrap();
    let state = MemoryState::new();
    let batch = user_batch(2_000);

    let sequential = ConstraintValidator::with_config(ValidatorConfig::sequential())
        .unwrap()
        .validate_batch(users, &batch, &state);
    let parallel =
        ConstraintValidator::with_config(ValidatorConfig::new().with_parallel_threshold(1))
            .unwrap()
            .validate_batch(users, &batch, &state);
    let again =
        ConstraintValidator::with_config(ValidatorConfig::new().with_parallel_threshold(1))
            .unwrap()
            .validate_batch(users, &batch, &state);

    assert_eq!(sequential, parallel);
    assert_eq!(parallel, again);
    assert!(sequential.rejected_count() > 0);
    assert!(matches!(
        sequential.outcomes()[9].violations(),
        [Violation::DuplicateKey { key, .. }] if key == "users_pkey"
    ));
}

#[test]
fn test_computed_defaults_see_earlier_batch_rows() {
    let schema = schema();
    let tickets = schema.relation("tickets").unwrap();
    let state = MemoryState::new();
    state.insert(tickets, vec![Value::Integer(10), Value::from("old")]).unwrap();

    let report = ConstraintValidator::new().validate_batch(
        tickets,
        &[
            Tuple::new().with("title", "a"),
            Tuple::new().with("title", "b"),
            Tuple::new().with("id", 12).with("title", "c"),
            Tuple::new().with("title", "d"),
        ],
        &state,
    );

    let ids: Vec<Value> = report.outcomes().iter().map(|o| match o {
        TupleOutcome::Accepted(row) => row[0].clone(),
        TupleOutcome::Rejected(_) => Value::Null,
    }).collect();
    assert_eq!(
        ids,
        vec![Value::Integer(11), Value::Integer(12), Value::Null, Value::Integer(13)]
    );

    state.apply(tickets, report.into_accepted_rows()).unwrap();
    assert_eq!(state.len("tickets"), 4);
}

#[test]
fn test_self_reference_within_batch() {
    let schema = schema();
    let employees = schema.relation("employees").unwrap();
    let state = MemoryState::new();

    let report = ConstraintValidator::new().validate_batch(
        employees,
        &[
            Tuple::new().with("id", 1),
            Tuple::new().with("id", 2).with("manager_id", 1),
            Tuple::new().with("id", 3).with("manager_id", 3),
            Tuple::new().with("id", 4).with("manager_id", 99),
        ],
        &state,
    );

    assert_eq!(decisions(report.outcomes()), vec![true, true, true, false]);
    assert!(matches!(
        report.outcomes()[3].violations(),
        [Violation::DanglingReference { values, .. }] if values == &vec![Value::Integer(99)]
    ));
}

#[test]
fn test_cancellation_keeps_processed_prefix() {
    let cancel = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut builder = SchemaBuilder::new();
    builder.domain_from_base_type("Integer", BaseType::Integer);
    let (flag, counter) = (cancel.clone(), calls.clone());
    builder
        .relation("jobs")
        .attribute("id", "Integer")
        .default_with(move |view| {
            if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                flag.store(true, Ordering::SeqCst);
            }
            Value::Integer(view.len() as i64 + 1)
        })
        .end()
        .key(["id"]);
    let schema = builder.finalize().unwrap();
    let jobs = schema.relation("jobs").unwrap();

    let metrics = Arc::new(ValidationMetrics::new());
    let batch = vec![Tuple::new(); 10];
    let report = ConstraintValidator::new()
        .with_metrics(metrics.clone())
        .validate_batch_cancellable(jobs, &batch, &MemoryState::new(), &cancel);

    assert!(report.is_cancelled());
    assert_eq!(report.len(), 3);
    assert_eq!(report.accepted_count(), 3);
    assert!(!report.is_fully_accepted());
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.batches_cancelled, 1);
    assert_eq!(snapshot.tuples_validated, 3);
}

#[test]
fn test_invalid_computed_default() {
    let mut builder = SchemaBuilder::new();
    builder.domain_from_base_type("Integer", BaseType::Integer);
    builder
        .domain("PositiveInt")
        .parent("Integer")
        .constraint("positive", |v| v.as_i64().is_some_and(|i| i > 0));
    builder
        .relation("counters")
        .attribute("n", "PositiveInt")
        .default_with(|view| Value::Integer(-(view.len() as i64)))
        .end();
    let schema = builder.finalize().unwrap();
    let counters = schema.relation("counters").unwrap();

    let result = ConstraintValidator::new().validate_all(counters, &Tuple::new(), &MemoryState::new());
    assert!(matches!(
        result.unwrap_err().as_slice(),
        [Violation::DefaultViolatesConstraint { attribute, value: Value::Integer(0), .. }] if attribute == "n"
    ));
}
