//! Finalized schema - immutable snapshot of every domain and relation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::attribute::DefaultValue;
use super::domain::Domain;
use super::relation::{ForeignKey, Relation};
use super::types::{BaseType, Value};
use crate::error::Error;

/// A finalized schema.
///
/// Produced by [`SchemaBuilder::finalize`](super::SchemaBuilder::finalize).
/// Domains and relations are shared behind `Arc` and never change, so a
/// schema can be handed to any number of validators and threads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    domains: BTreeMap<String, Arc<Domain>>,
    relations: BTreeMap<String, Arc<Relation>>,
}

impl Schema {
    pub(crate) fn new(
        domains: HashMap<String, Arc<Domain>>,
        relations: HashMap<String, Arc<Relation>>,
    ) -> Self {
        Self {
            domains: domains.into_iter().collect(),
            relations: relations.into_iter().collect(),
        }
    }

    /// Get a domain by name.
    pub fn domain(&self, name: &str) -> Option<&Arc<Domain>> {
        self.domains.get(name)
    }

    /// Get a relation by name.
    pub fn relation(&self, name: &str) -> Option<&Arc<Relation>> {
        self.relations.get(name)
    }

    /// Iterate over domains, ordered by name.
    pub fn domains(&self) -> impl Iterator<Item = &Arc<Domain>> {
        self.domains.values()
    }

    /// Iterate over relations, ordered by name.
    pub fn relations(&self) -> impl Iterator<Item = &Arc<Relation>> {
        self.relations.values()
    }

    /// List all relation names.
    pub fn relation_names(&self) -> Vec<&str> {
        self.relations.keys().map(String::as_str).collect()
    }

    /// Foreign keys, from any relation, that reference `target`.
    pub fn references_to(&self, target: &str) -> Vec<(&Relation, &ForeignKey)> {
        self.relations
            .values()
            .flat_map(|r| {
                r.foreign_keys()
                    .iter()
                    .filter(|fk| fk.target() == target)
                    .map(move |fk| (r.as_ref(), fk))
            })
            .collect()
    }

    /// Serializable description of the schema.
    ///
    /// Predicates and computed defaults are opaque and described by name only.
    pub fn describe(&self) -> SchemaDescriptor {
        SchemaDescriptor {
            domains: self.domains.values().map(|d| describe_domain(d)).collect(),
            relations: self
                .relations
                .values()
                .map(|r| describe_relation(r))
                .collect(),
        }
    }

    /// Render [`Schema::describe`] as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(&self.describe())?)
    }
}

/// Serializable description of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub domains: Vec<DomainDescriptor>,
    pub relations: Vec<RelationDescriptor>,
}

/// Serializable description of a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDescriptor {
    pub name: String,
    pub base_type: Option<BaseType>,
    pub parent: Option<String>,
    /// Names of the domain's own constraints.
    pub constraints: Vec<String>,
}

/// Serializable description of a relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    pub name: String,
    pub attributes: Vec<AttributeDescriptor>,
    pub keys: Vec<KeyDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

/// Serializable description of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub domain: String,
    pub nullable: bool,
    pub default: Option<DefaultDescriptor>,
    pub constraints: Vec<String>,
}

/// Serializable description of a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultDescriptor {
    Static(Value),
    Computed,
}

/// Serializable description of a candidate key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    pub name: String,
    pub attributes: Vec<String>,
    pub primary: bool,
}

/// Serializable description of a foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    pub name: String,
    pub from: Vec<String>,
    pub target: String,
    pub to: Vec<String>,
}

fn describe_domain(domain: &Domain) -> DomainDescriptor {
    DomainDescriptor {
        name: domain.name().to_string(),
        base_type: domain.base_type(),
        parent: domain.parent().map(|p| p.name().to_string()),
        constraints: domain
            .own_constraints()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    }
}

fn describe_relation(relation: &Relation) -> RelationDescriptor {
    RelationDescriptor {
        name: relation.name().to_string(),
        attributes: relation
            .attributes()
            .iter()
            .map(|a| AttributeDescriptor {
                name: a.name().to_string(),
                domain: a.domain().name().to_string(),
                nullable: a.is_nullable(),
                default: a.default().map(|d| match d {
                    DefaultValue::Static(v) => DefaultDescriptor::Static(v.clone()),
                    DefaultValue::Computed(_) => DefaultDescriptor::Computed,
                }),
                constraints: a.constraints().iter().map(|c| c.name().to_string()).collect(),
            })
            .collect(),
        keys: relation
            .candidate_keys()
            .iter()
            .map(|k| KeyDescriptor {
                name: k.name().to_string(),
                attributes: k.attributes().to_vec(),
                primary: k.is_primary(),
            })
            .collect(),
        foreign_keys: relation
            .foreign_keys()
            .iter()
            .map(|fk| ForeignKeyDescriptor {
                name: fk.name().to_string(),
                from: fk.from().iter().map(|ra| ra.attribute.clone()).collect(),
                target: fk.target().to_string(),
                to: fk.target_attributes(),
            })
            .collect(),
    }
}
