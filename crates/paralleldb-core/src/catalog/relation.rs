//! Relation schemas, keys and foreign keys.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use super::attribute::Attribute;
use super::types::Value;

/// A `(relation, attribute)` pair naming one attribute for key declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationAttribute {
    /// Relation name.
    pub relation: String,
    /// Attribute name.
    pub attribute: String,
}

impl RelationAttribute {
    /// Create a relation attribute reference.
    pub fn new(relation: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for RelationAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.relation, self.attribute)
    }
}

impl<R: Into<String>, A: Into<String>> From<(R, A)> for RelationAttribute {
    fn from((relation, attribute): (R, A)) -> Self {
        Self::new(relation, attribute)
    }
}

/// A candidate key: an attribute subset whose projection is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    name: String,
    attributes: Vec<String>,
    positions: Vec<usize>,
    primary: bool,
}

impl Key {
    pub(crate) fn new(
        name: impl Into<String>,
        attributes: Vec<String>,
        positions: Vec<usize>,
        primary: bool,
    ) -> Self {
        Self {
            name: name.into(),
            attributes,
            positions,
            primary,
        }
    }

    /// Get the key name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute names in declaration order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Attribute positions in the owning relation's layout.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Check if this is the primary key.
    pub fn is_primary(&self) -> bool {
        self.primary
    }
}

/// A reference from attributes of the owning relation to a key of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    name: String,
    from: Vec<RelationAttribute>,
    to: Vec<RelationAttribute>,
    from_positions: Vec<usize>,
}

impl ForeignKey {
    pub(crate) fn new(
        name: impl Into<String>,
        from: Vec<RelationAttribute>,
        to: Vec<RelationAttribute>,
        from_positions: Vec<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            from_positions,
        }
    }

    /// Get the foreign key name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source attributes on the owning relation.
    pub fn from(&self) -> &[RelationAttribute] {
        &self.from
    }

    /// Referenced attributes on the target relation.
    pub fn to(&self) -> &[RelationAttribute] {
        &self.to
    }

    /// Name of the target relation.
    pub fn target(&self) -> &str {
        self.to.first().map(|ra| ra.relation.as_str()).unwrap_or_default()
    }

    /// Referenced attribute names, aligned with [`ForeignKey::from_positions`].
    pub fn target_attributes(&self) -> Vec<String> {
        self.to.iter().map(|ra| ra.attribute.clone()).collect()
    }

    /// Positions of the source attributes in the owning relation's layout.
    pub fn from_positions(&self) -> &[usize] {
        &self.from_positions
    }
}

/// A finalized, immutable relation schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    name: String,
    attributes: Vec<Attribute>,
    index: HashMap<String, usize>,
    candidate_keys: Vec<Key>,
    foreign_keys: Vec<ForeignKey>,
}

impl Relation {
    pub(crate) fn new(
        name: impl Into<String>,
        attributes: Vec<Attribute>,
        candidate_keys: Vec<Key>,
        foreign_keys: Vec<ForeignKey>,
    ) -> Self {
        let index = attributes
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name().to_string(), i))
            .collect();

        Self {
            name: name.into(),
            attributes,
            index,
            candidate_keys,
            foreign_keys,
        }
    }

    /// Get the relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in canonical tuple order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute names in canonical tuple order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name())
    }

    /// Get an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.index.get(name).map(|&i| &self.attributes[i])
    }

    /// Position of an attribute in the tuple layout.
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Number of attributes.
    pub fn arity(&self) -> usize {
        self.attributes.len()
    }

    /// All candidate keys, the primary key included.
    pub fn candidate_keys(&self) -> &[Key] {
        &self.candidate_keys
    }

    /// The primary key, if declared.
    pub fn primary_key(&self) -> Option<&Key> {
        self.candidate_keys.iter().find(|k| k.is_primary())
    }

    /// Get a candidate key by name.
    pub fn key(&self, name: &str) -> Option<&Key> {
        self.candidate_keys.iter().find(|k| k.name() == name)
    }

    /// Foreign keys declared on this relation.
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Get a foreign key by name.
    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name() == name)
    }

    /// Check if any attribute has a computed default.
    pub fn has_computed_defaults(&self) -> bool {
        self.attributes.iter().any(Attribute::has_computed_default)
    }

    /// Project a resolved row onto a list of positions.
    pub fn project(row: &[Value], positions: &[usize]) -> Vec<Value> {
        positions.iter().map(|&i| row[i].clone()).collect()
    }
}

impl Index<&str> for Relation {
    type Output = Attribute;

    fn index(&self, name: &str) -> &Attribute {
        match self.attribute(name) {
            Some(attribute) => attribute,
            None => panic!("relation '{}' has no attribute '{}'", self.name, name),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, attribute) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", attribute.name(), attribute.domain())?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BaseType, SchemaBuilder};

    fn sample() -> std::sync::Arc<Relation> {
        let mut builder = SchemaBuilder::new();
        builder.domain_from_base_type("Integer", BaseType::Integer);
        builder.domain_from_base_type("Text", BaseType::String);
        builder
            .relation("users")
            .attribute("id", "Integer")
            .end()
            .attribute("email", "Text")
            .end()
            .attribute("nickname", "Text")
            .nullable(true)
            .end()
            .key(["id"])
            .potential_key(["email"]);

        builder.finalize().unwrap().relation("users").unwrap().clone()
    }

    #[test]
    fn test_attribute_lookup() {
        let users = sample();

        assert_eq!(users.arity(), 3);
        assert_eq!(users.attribute_index("email"), Some(1));
        assert!(users.attribute("missing").is_none());
        assert!(users["nickname"].is_nullable());
        assert_eq!(
            users.attribute_names().collect::<Vec<_>>(),
            vec!["id", "email", "nickname"]
        );
    }

    #[test]
    fn test_keys() {
        let users = sample();

        assert_eq!(users.candidate_keys().len(), 2);
        let pk = users.primary_key().unwrap();
        assert_eq!(pk.name(), "users_pkey");
        assert_eq!(pk.positions(), &[0]);

        let email = users.key("users_email_key").unwrap();
        assert!(!email.is_primary());
        assert_eq!(email.attributes(), &["email".to_string()]);
    }

    #[test]
    fn test_project_and_display() {
        let users = sample();
        let row = vec![Value::Integer(1), "a@b".into(), Value::Null];

        assert_eq!(
            Relation::project(&row, &[1, 0]),
            vec![Value::from("a@b"), Value::Integer(1)]
        );
        assert_eq!(
            users.to_string(),
            "users(id: Integer, email: Text, nickname: Text)"
        );
    }

    #[test]
    fn test_relation_attribute_from_pair() {
        let ra: RelationAttribute = ("orders", "user_id").into();
        assert_eq!(ra, RelationAttribute::new("orders", "user_id"));
        assert_eq!(ra.to_string(), "orders.user_id");
    }
}
