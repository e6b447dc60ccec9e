//! ParallelDB - relational schemas with enforced domain, key and reference
//! constraints.
//!
//! Declare domains and relations with a [`SchemaBuilder`], finalize them into
//! an immutable [`Schema`], and check candidate tuples with a
//! [`ConstraintValidator`] against any [`StateProvider`].
//!
//! ```ignore
//! use paralleldb::prelude::*;
//!
//! let mut builder = SchemaBuilder::new();
//! builder.domain_from_base_type("Integer", BaseType::Integer);
//! builder
//!     .domain("PositiveInt")
//!     .parent("Integer")
//!     .constraint("positive", |v| v.as_i64().is_some_and(|i| i > 0));
//! builder
//!     .relation("users")
//!     .attribute("id", "PositiveInt")
//!     .end()
//!     .key(["id"]);
//! let schema = builder.finalize()?;
//!
//! let users = schema.relation("users").unwrap();
//! let state = MemoryState::new();
//! let validator = ConstraintValidator::new();
//!
//! let row = validator.admit(users, &Tuple::new().with("id", 1), &state)?;
//! state.insert(users, row)?;
//! assert!(validator.validate_all(users, &Tuple::new().with("id", 1), &state).is_err());
//! ```

pub use paralleldb_core::*;

/// Common imports for embedding applications.
pub mod prelude {
    pub use paralleldb_core::{
        BaseType, BatchReport, ConstraintValidator, DefinitionError, Error, MemoryState,
        Relation, Schema, SchemaBuilder, StateProvider, StateView, Tuple, TupleOutcome,
        ValidatorConfig, Value, Violation,
    };
}
