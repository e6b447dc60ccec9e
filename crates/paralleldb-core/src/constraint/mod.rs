//! Constraint enforcement module.
//!
//! This module validates candidate tuples against finalized relations:
//! - Value resolution (explicit values, defaults, nulls)
//! - Domain and attribute-local constraints
//! - Candidate keys (single and composite)
//! - Foreign keys
//! - Batches, checked in input order with optional parallelism

mod batch;
mod key_index;
mod validator;
mod violation;

pub use batch::{BatchReport, TupleOutcome};
pub use validator::ConstraintValidator;
pub use violation::{Violation, ViolationKind};
