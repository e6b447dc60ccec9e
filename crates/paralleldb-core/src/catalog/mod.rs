//! Relational schema catalog.
//!
//! Domains, attributes, relations, keys and foreign keys, plus the
//! [`SchemaBuilder`] that declares them and resolves them into a [`Schema`].

mod attribute;
mod builder;
mod constraint;
mod domain;
mod relation;
mod schema;
mod types;

pub use attribute::{Attribute, ComputeFn, DefaultValue};
pub use builder::{AttributeBuilder, DomainBuilder, RelationBuilder, SchemaBuilder};
pub use constraint::{Constraint, ConstraintOrigin, PredicateFn};
pub use domain::{ChainedConstraint, Domain, DomainFailure};
pub use relation::{ForeignKey, Key, Relation, RelationAttribute};
pub use schema::{
    AttributeDescriptor, DefaultDescriptor, DomainDescriptor, ForeignKeyDescriptor, KeyDescriptor,
    RelationDescriptor, Schema, SchemaDescriptor,
};
pub use types::{BaseType, Row, Tuple, Value};
