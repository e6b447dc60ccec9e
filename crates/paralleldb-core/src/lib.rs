//! ParallelDB Core - Schema catalog and constraint validation.
//!
//! This crate provides relational schema definition (domains, relations,
//! keys, foreign keys) and the validator that checks candidate tuples and
//! batches against a finalized schema.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod config;
pub mod constraint;
pub mod error;
pub mod metrics;
pub mod state;

pub use catalog::{
    Attribute, AttributeBuilder, BaseType, Constraint, ConstraintOrigin, DefaultValue, Domain,
    DomainBuilder, ForeignKey, Key, Relation, RelationAttribute, RelationBuilder, Row, Schema,
    SchemaBuilder, SchemaDescriptor, Tuple, Value,
};
pub use config::ValidatorConfig;
pub use constraint::{BatchReport, ConstraintValidator, TupleOutcome, Violation, ViolationKind};
pub use error::{DefinitionError, Error};

// Metrics exports
pub use metrics::{new_shared_metrics, MetricsSnapshot, SharedValidationMetrics, ValidationMetrics};

// State exports
pub use state::{MemoryState, StateProvider, StateView};
