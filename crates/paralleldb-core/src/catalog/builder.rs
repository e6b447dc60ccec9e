//! Fluent schema construction with deferred validation.
//!
//! Builder calls only record declarations. Cross references (domains by name,
//! key attributes, foreign-key targets) are resolved by
//! [`SchemaBuilder::finalize`], which reports every definition error at once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::attribute::{Attribute, DefaultValue};
use super::constraint::Constraint;
use super::domain::Domain;
use super::relation::{ForeignKey, Key, Relation, RelationAttribute};
use super::schema::Schema;
use super::types::{BaseType, Value};
use crate::error::DefinitionError;
use crate::state::StateView;

#[derive(Debug, Clone)]
struct DomainDraft {
    name: String,
    base_type: Option<BaseType>,
    parents: Vec<String>,
    constraints: Vec<Constraint>,
}

#[derive(Debug, Clone)]
struct AttributeDraft {
    name: String,
    domain: String,
    nullable: bool,
    default: Option<DefaultValue>,
    constraints: Vec<Constraint>,
}

#[derive(Debug, Clone)]
struct ForeignKeyDraft {
    name: String,
    from: Vec<RelationAttribute>,
    to: Vec<RelationAttribute>,
}

#[derive(Debug, Clone)]
struct RelationDraft {
    name: String,
    attributes: Vec<AttributeDraft>,
    primary_keys: Vec<Vec<String>>,
    potential_keys: Vec<Vec<String>>,
    foreign_keys: Vec<ForeignKeyDraft>,
}

/// Builder for a schema of domains and relations.
///
/// ```ignore
/// let mut schema = SchemaBuilder::new();
/// schema.domain_from_base_type("Integer", BaseType::Integer);
/// schema
///     .domain("PositiveInt")
///     .parent("Integer")
///     .constraint("positive", |v| v.as_i64().is_some_and(|i| i > 0));
/// schema
///     .relation("users")
///     .key(["id"])
///     .attribute("id", "PositiveInt")
///     .end();
/// let schema = schema.finalize()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    domains: Vec<DomainDraft>,
    relations: Vec<RelationDraft>,
}

impl SchemaBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a domain with no base type and no constraints.
    pub fn domain(&mut self, name: impl Into<String>) -> DomainBuilder<'_> {
        self.push_domain(name.into(), None)
    }

    /// Declare a domain over a fixed base type.
    pub fn domain_from_base_type(
        &mut self,
        name: impl Into<String>,
        base_type: BaseType,
    ) -> DomainBuilder<'_> {
        self.push_domain(name.into(), Some(base_type))
    }

    fn push_domain(&mut self, name: String, base_type: Option<BaseType>) -> DomainBuilder<'_> {
        self.domains.push(DomainDraft {
            name,
            base_type,
            parents: Vec::new(),
            constraints: Vec::new(),
        });
        let index = self.domains.len() - 1;
        DomainBuilder {
            draft: &mut self.domains[index],
        }
    }

    /// Declare a relation.
    pub fn relation(&mut self, name: impl Into<String>) -> RelationBuilder<'_> {
        self.relations.push(RelationDraft {
            name: name.into(),
            attributes: Vec::new(),
            primary_keys: Vec::new(),
            potential_keys: Vec::new(),
            foreign_keys: Vec::new(),
        });
        let index = self.relations.len() - 1;
        RelationBuilder {
            draft: &mut self.relations[index],
        }
    }

    /// Validate every declaration and produce an immutable schema.
    ///
    /// The builder is left untouched, so calling this again on an unmodified
    /// builder yields an equal schema.
    pub fn finalize(&self) -> Result<Schema, Vec<DefinitionError>> {
        let mut errors = Vec::new();

        let mut resolver = DomainResolver::new(&self.domains, &mut errors);
        resolver.resolve_all(&mut errors);
        let relations = self.resolve_relations(&resolver, &mut errors);

        if !errors.is_empty() {
            warn!(errors = errors.len(), "schema finalization failed");
            return Err(errors);
        }

        let schema = Schema::new(resolver.resolved, relations);
        debug!(
            domains = schema.domains().count(),
            relations = schema.relations().count(),
            "schema finalized"
        );
        Ok(schema)
    }

    fn resolve_relations(
        &self,
        domains: &DomainResolver<'_>,
        errors: &mut Vec<DefinitionError>,
    ) -> HashMap<String, Arc<Relation>> {
        let mut unique: Vec<&RelationDraft> = Vec::new();
        let mut seen = HashSet::new();
        for draft in &self.relations {
            if seen.insert(draft.name.as_str()) {
                unique.push(draft);
            } else {
                errors.push(DefinitionError::DuplicateRelationName(draft.name.clone()));
            }
        }

        let locals: HashMap<&str, LocalRelation<'_>> = unique
            .iter()
            .copied()
            .map(|draft| (draft.name.as_str(), LocalRelation::build(draft, domains, errors)))
            .collect();

        let mut relations = HashMap::new();
        for draft in unique {
            let local = &locals[draft.name.as_str()];
            let foreign_keys = draft
                .foreign_keys
                .iter()
                .map(|fk| resolve_foreign_key(local, fk, &locals, errors))
                .collect::<Vec<_>>();

            if !errors.is_empty() {
                continue;
            }

            let attributes = local.attributes.iter().flatten().cloned().collect();
            let relation = Relation::new(
                draft.name.clone(),
                attributes,
                local.keys.clone(),
                foreign_keys.into_iter().flatten().collect(),
            );
            relations.insert(draft.name.clone(), Arc::new(relation));
        }

        relations
    }
}

/// Resolves domain drafts into shared domains, detecting inheritance errors.
struct DomainResolver<'d> {
    drafts: HashMap<&'d str, &'d DomainDraft>,
    order: Vec<&'d DomainDraft>,
    resolved: HashMap<String, Arc<Domain>>,
    broken: HashSet<String>,
}

impl<'d> DomainResolver<'d> {
    fn new(drafts: &'d [DomainDraft], errors: &mut Vec<DefinitionError>) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for draft in drafts {
            if map.contains_key(draft.name.as_str()) {
                errors.push(DefinitionError::DuplicateDomainName(draft.name.clone()));
            } else {
                map.insert(draft.name.as_str(), draft);
                order.push(draft);
            }
        }

        Self {
            drafts: map,
            order,
            resolved: HashMap::new(),
            broken: HashSet::new(),
        }
    }

    fn resolve_all(&mut self, errors: &mut Vec<DefinitionError>) {
        for draft in self.order.clone() {
            if draft.parents.len() > 1 {
                errors.push(DefinitionError::DuplicateParentAssignment(
                    draft.name.clone(),
                ));
            }
            self.detect_cycle(draft, errors);
        }

        for draft in self.order.clone() {
            self.resolve(&draft.name, errors);
        }
    }

    /// Walk the parent chain. Domains on a cycle report it; domains that
    /// merely lead into one are marked unresolvable without a second report.
    fn detect_cycle(&mut self, draft: &'d DomainDraft, errors: &mut Vec<DefinitionError>) {
        let mut seen = HashSet::from([draft.name.as_str()]);
        let mut current = draft.parents.first();

        while let Some(parent) = current {
            if *parent == draft.name {
                errors.push(DefinitionError::CyclicDomainInheritance(draft.name.clone()));
                self.broken.insert(draft.name.clone());
                return;
            }
            if !seen.insert(parent.as_str()) {
                self.broken.insert(draft.name.clone());
                return;
            }
            current = self
                .drafts
                .get(parent.as_str())
                .copied()
                .and_then(|d| d.parents.first());
        }
    }

    fn resolve(&mut self, name: &str, errors: &mut Vec<DefinitionError>) -> Option<Arc<Domain>> {
        if let Some(domain) = self.resolved.get(name) {
            return Some(domain.clone());
        }
        if self.broken.contains(name) {
            return None;
        }
        let draft = *self.drafts.get(name)?;

        let parent = match draft.parents.first() {
            None => None,
            Some(parent) if !self.drafts.contains_key(parent.as_str()) => {
                errors.push(DefinitionError::UnknownParentDomain {
                    domain: draft.name.clone(),
                    parent: parent.clone(),
                });
                self.broken.insert(draft.name.clone());
                return None;
            }
            Some(parent) => match self.resolve(parent, errors) {
                Some(domain) => Some(domain),
                None => {
                    self.broken.insert(draft.name.clone());
                    return None;
                }
            },
        };

        // A parent fixes the base type; the child may only restate it.
        let base_type = match (&parent, draft.base_type) {
            (Some(parent), declared) => match (declared, parent.base_type()) {
                (Some(declared), Some(inherited)) if declared != inherited => {
                    errors.push(DefinitionError::BaseTypeConflict {
                        domain: draft.name.clone(),
                        declared,
                        inherited,
                    });
                    self.broken.insert(draft.name.clone());
                    return None;
                }
                (Some(declared), None) => Some(declared),
                (_, inherited) => inherited,
            },
            (None, declared) => declared,
        };

        let domain = Arc::new(Domain::new(
            draft.name.clone(),
            base_type,
            parent,
            draft.constraints.clone(),
        ));
        self.resolved.insert(draft.name.clone(), domain.clone());
        Some(domain)
    }

    fn get(&self, name: &str) -> Option<&Arc<Domain>> {
        self.resolved.get(name)
    }

    fn is_declared(&self, name: &str) -> bool {
        self.drafts.contains_key(name)
    }
}

/// Attributes and keys of one relation, resolved without looking at others.
struct LocalRelation<'r> {
    name: &'r str,
    drafts: Vec<&'r AttributeDraft>,
    attributes: Vec<Option<Attribute>>,
    keys: Vec<Key>,
}

impl<'r> LocalRelation<'r> {
    fn build(
        draft: &'r RelationDraft,
        domains: &DomainResolver<'_>,
        errors: &mut Vec<DefinitionError>,
    ) -> Self {
        let relation = draft.name.as_str();
        let mut drafts: Vec<&AttributeDraft> = Vec::new();
        for attribute in &draft.attributes {
            if drafts.iter().any(|a| a.name == attribute.name) {
                errors.push(DefinitionError::DuplicateAttributeName {
                    relation: relation.to_string(),
                    attribute: attribute.name.clone(),
                });
            } else {
                drafts.push(attribute);
            }
        }

        let attributes = drafts
            .iter()
            .enumerate()
            .map(|(position, a)| resolve_attribute(relation, position, a, domains, errors))
            .collect();

        let mut local = Self {
            name: relation,
            drafts,
            attributes,
            keys: Vec::new(),
        };
        local.keys = local.resolve_keys(draft, errors);
        local
    }

    fn position(&self, attribute: &str) -> Option<usize> {
        self.drafts.iter().position(|a| a.name == attribute)
    }

    fn domain(&self, position: usize) -> Option<&Arc<Domain>> {
        self.attributes[position].as_ref().map(Attribute::domain)
    }

    fn resolve_keys(&self, draft: &RelationDraft, errors: &mut Vec<DefinitionError>) -> Vec<Key> {
        if draft.primary_keys.len() > 1 {
            errors.push(DefinitionError::MultiplePrimaryKeys(self.name.to_string()));
        }

        let mut declared: Vec<(&Vec<String>, bool)> = Vec::new();
        let candidates = draft
            .primary_keys
            .iter()
            .take(1)
            .map(|k| (k, true))
            .chain(draft.potential_keys.iter().map(|k| (k, false)));
        for (attributes, primary) in candidates {
            let duplicate = declared
                .iter()
                .any(|(existing, _)| same_set(existing.as_slice(), attributes.as_slice()));
            if !duplicate {
                declared.push((attributes, primary));
            }
        }

        let mut keys = Vec::new();
        for (attributes, primary) in declared {
            let name = if primary {
                format!("{}_pkey", self.name)
            } else {
                format!("{}_{}_key", self.name, attributes.join("_"))
            };

            if attributes.is_empty() {
                errors.push(DefinitionError::EmptyKey {
                    relation: self.name.to_string(),
                });
                continue;
            }

            let mut positions = Vec::with_capacity(attributes.len());
            for attribute in attributes {
                match self.position(attribute) {
                    None => errors.push(DefinitionError::UnknownAttributeInKey {
                        relation: self.name.to_string(),
                        key: name.clone(),
                        attribute: attribute.clone(),
                    }),
                    Some(position) => {
                        if self.drafts[position].nullable {
                            errors.push(DefinitionError::KeyAttributeNullable {
                                relation: self.name.to_string(),
                                key: name.clone(),
                                attribute: attribute.clone(),
                            });
                        }
                        positions.push(position);
                    }
                }
            }

            keys.push(Key::new(name, attributes.clone(), positions, primary));
        }

        if let Some(primary) = keys.iter().find(|k| k.is_primary()) {
            let contained = keys.iter().find(|k| {
                !k.is_primary()
                    && k.attributes().len() < primary.attributes().len()
                    && k.attributes().iter().all(|a| primary.attributes().contains(a))
            });
            if let Some(contained) = contained {
                errors.push(DefinitionError::PrimaryKeyNotCandidate {
                    relation: self.name.to_string(),
                    contained: contained.name().to_string(),
                });
            }
        }

        keys
    }
}

fn resolve_attribute(
    relation: &str,
    position: usize,
    draft: &AttributeDraft,
    domains: &DomainResolver<'_>,
    errors: &mut Vec<DefinitionError>,
) -> Option<Attribute> {
    let Some(domain) = domains.get(&draft.domain) else {
        // Declared-but-broken domains already reported their own error.
        if !domains.is_declared(&draft.domain) {
            errors.push(DefinitionError::UnknownDomain {
                relation: relation.to_string(),
                attribute: draft.name.clone(),
                domain: draft.domain.clone(),
            });
        }
        return None;
    };

    let attribute = Attribute::new(
        draft.name.clone(),
        relation,
        position,
        domain.clone(),
        draft.nullable,
        draft.default.clone(),
        draft.constraints.clone(),
    );

    if let Some(DefaultValue::Static(value)) = &draft.default {
        let violations = attribute.check(value);
        if !violations.is_empty() {
            let reason = violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            errors.push(DefinitionError::DefaultViolatesDomain {
                relation: relation.to_string(),
                attribute: draft.name.clone(),
                reason,
            });
        }
    }

    Some(attribute)
}

fn resolve_foreign_key(
    local: &LocalRelation<'_>,
    draft: &ForeignKeyDraft,
    locals: &HashMap<&str, LocalRelation<'_>>,
    errors: &mut Vec<DefinitionError>,
) -> Option<ForeignKey> {
    if draft.from.is_empty() || draft.to.is_empty() {
        errors.push(DefinitionError::ForeignKeyEmpty {
            relation: local.name.to_string(),
            foreign_key: draft.name.clone(),
        });
        return None;
    }
    let before = errors.len();

    let mut from_positions = Vec::with_capacity(draft.from.len());
    for ra in &draft.from {
        if ra.relation != local.name {
            errors.push(DefinitionError::ForeignKeySourceMismatch {
                relation: local.name.to_string(),
                foreign_key: draft.name.clone(),
                other: ra.relation.clone(),
            });
            continue;
        }
        match local.position(&ra.attribute) {
            Some(position) => from_positions.push(position),
            None => errors.push(DefinitionError::UnknownAttributeInKey {
                relation: local.name.to_string(),
                key: draft.name.clone(),
                attribute: ra.attribute.clone(),
            }),
        }
    }

    if draft.from.len() != draft.to.len() {
        errors.push(DefinitionError::ForeignKeyArityMismatch {
            foreign_key: draft.name.clone(),
            from: draft.from.len(),
            to: draft.to.len(),
        });
    }

    let targets: HashSet<&str> = draft.to.iter().map(|ra| ra.relation.as_str()).collect();
    if targets.len() > 1 {
        errors.push(DefinitionError::ForeignKeyMixedTargets {
            foreign_key: draft.name.clone(),
        });
        return None;
    }
    let target_name = targets.into_iter().next()?;
    let Some(target) = locals.get(target_name) else {
        errors.push(DefinitionError::UnknownRelation {
            relation: local.name.to_string(),
            foreign_key: draft.name.clone(),
            target: target_name.to_string(),
        });
        return None;
    };

    let mut to_positions = Vec::with_capacity(draft.to.len());
    for ra in &draft.to {
        match target.position(&ra.attribute) {
            Some(position) => to_positions.push(position),
            None => errors.push(DefinitionError::UnknownAttributeInKey {
                relation: target.name.to_string(),
                key: draft.name.clone(),
                attribute: ra.attribute.clone(),
            }),
        }
    }
    if to_positions.len() != draft.to.len() {
        return None;
    }

    let to_attributes: Vec<&str> = draft.to.iter().map(|ra| ra.attribute.as_str()).collect();
    let references_key = target
        .keys
        .iter()
        .any(|k| same_set(k.attributes(), &to_attributes));
    if !references_key {
        errors.push(DefinitionError::ForeignKeyTargetNotAKey {
            foreign_key: draft.name.clone(),
            target: target.name.to_string(),
        });
    }

    if from_positions.len() == to_positions.len() {
        for (&from, &to) in from_positions.iter().zip(&to_positions) {
            let (Some(from_domain), Some(to_domain)) = (local.domain(from), target.domain(to))
            else {
                continue;
            };
            if !from_domain.is_descendant_of(to_domain) {
                errors.push(DefinitionError::ForeignKeyDomainIncompatible {
                    foreign_key: draft.name.clone(),
                    from_attribute: format!("{}.{}", local.name, local.drafts[from].name),
                    from_domain: from_domain.name().to_string(),
                    to_attribute: format!("{}.{}", target.name, target.drafts[to].name),
                    to_domain: to_domain.name().to_string(),
                });
            }
        }
    }

    if errors.len() > before {
        return None;
    }
    Some(ForeignKey::new(
        draft.name.clone(),
        draft.from.clone(),
        draft.to.clone(),
        from_positions,
    ))
}

fn same_set<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    let a: HashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let b: HashSet<&str> = b.iter().map(AsRef::as_ref).collect();
    a == b
}

/// Builder for a domain declaration.
pub struct DomainBuilder<'a> {
    draft: &'a mut DomainDraft,
}

impl<'a> DomainBuilder<'a> {
    /// Fix the base type.
    pub fn base_type(self, base_type: BaseType) -> Self {
        self.draft.base_type = Some(base_type);
        self
    }

    /// Inherit from a parent domain; its constraints run before this
    /// domain's own. Assigning a parent twice is a definition error.
    pub fn parent(self, parent: impl Into<String>) -> Self {
        self.draft.parents.push(parent.into());
        self
    }

    /// Append a constraint to this domain's own list.
    pub fn constraint<F>(self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.draft.constraints.push(Constraint::new(name, predicate));
        self
    }
}

/// Builder for a relation declaration.
pub struct RelationBuilder<'a> {
    draft: &'a mut RelationDraft,
}

impl<'a> RelationBuilder<'a> {
    /// Declare an attribute bound to a domain, non-nullable by default.
    pub fn attribute(
        self,
        name: impl Into<String>,
        domain: impl Into<String>,
    ) -> AttributeBuilder<'a> {
        self.draft.attributes.push(AttributeDraft {
            name: name.into(),
            domain: domain.into(),
            nullable: false,
            default: None,
            constraints: Vec::new(),
        });
        let index = self.draft.attributes.len() - 1;
        AttributeBuilder {
            relation: self.draft,
            index,
        }
    }

    /// Declare the primary key. It is also a candidate key.
    pub fn key<I, S>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft
            .primary_keys
            .push(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Declare a candidate key.
    pub fn potential_key<I, S>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft
            .potential_keys
            .push(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Declare a named foreign key from attributes of this relation to a key
    /// of a target relation.
    pub fn foreign_key<F, T>(self, name: impl Into<String>, from: F, to: T) -> Self
    where
        F: IntoIterator,
        F::Item: Into<RelationAttribute>,
        T: IntoIterator,
        T::Item: Into<RelationAttribute>,
    {
        self.draft.foreign_keys.push(ForeignKeyDraft {
            name: name.into(),
            from: from.into_iter().map(Into::into).collect(),
            to: to.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// Builder for an attribute declaration.
pub struct AttributeBuilder<'a> {
    relation: &'a mut RelationDraft,
    index: usize,
}

impl<'a> AttributeBuilder<'a> {
    fn draft(&mut self) -> &mut AttributeDraft {
        &mut self.relation.attributes[self.index]
    }

    /// Set nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.draft().nullable = nullable;
        self
    }

    /// Set a literal default.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.draft().default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Set a default computed from the owning relation's current state.
    pub fn default_with<F>(mut self, compute: F) -> Self
    where
        F: Fn(&StateView<'_>) -> Value + Send + Sync + 'static,
    {
        self.draft().default = Some(DefaultValue::computed(compute));
        self
    }

    /// Set a default from a JSON literal.
    ///
    /// Arrays and objects are not literal values and fail immediately with
    /// [`DefinitionError::InvalidDefaultShape`].
    pub fn default_json(mut self, json: &serde_json::Value) -> Result<Self, DefinitionError> {
        match Value::from_json(json) {
            Some(value) => {
                self.draft().default = Some(DefaultValue::Static(value));
                Ok(self)
            }
            None => Err(DefinitionError::InvalidDefaultShape {
                attribute: self.draft().name.clone(),
                shape: json_shape(json).to_string(),
            }),
        }
    }

    /// Attach an attribute-local constraint, checked after the domain's.
    pub fn constraint<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.draft()
            .constraints
            .push(Constraint::new(name, predicate));
        self
    }

    /// Finish the attribute and return to the relation.
    pub fn end(self) -> RelationBuilder<'a> {
        RelationBuilder {
            draft: self.relation,
        }
    }

    /// Finish the attribute and declare the next one.
    pub fn attribute(
        self,
        name: impl Into<String>,
        domain: impl Into<String>,
    ) -> AttributeBuilder<'a> {
        self.end().attribute(name, domain)
    }
}

fn json_shape(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
        _ => "scalar",
    }
}
