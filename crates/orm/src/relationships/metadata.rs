//! Relationship Metadata System - Declarations attached to model definitions
//!
//! A [`RelationDecl`] is what application code writes when it declares a
//! relation: the kind, the target (possibly just a registry name) and any key
//! overrides. Nothing here is resolved; turning a declaration into something
//! queryable is the job of [`RelationDescriptor`](super::descriptor::RelationDescriptor).

use std::sync::Arc;

use crate::error::{ModelError, ModelResult};
use crate::model::{CollectionDef, ModelDef};
use crate::query::QueryBuilder;

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Many-to-one: the owner stores the target's key
    BelongsTo,
    /// One-to-one: the target stores the owner's key
    HasOne,
    /// One-to-many: the target stores the owner's key
    HasMany,
    /// Many-to-many through a pivot table
    BelongsToMany,
    /// Polymorphic one-to-one
    MorphOne,
    /// Polymorphic one-to-many
    MorphMany,
    /// Inverse polymorphic relation; the target type varies per row
    MorphTo,
}

impl RelationKind {
    /// Returns true if this relationship type is polymorphic
    pub fn is_polymorphic(self) -> bool {
        matches!(self, Self::MorphOne | Self::MorphMany | Self::MorphTo)
    }

    /// Returns true if this relationship resolves to an entity set
    pub fn is_to_many(self) -> bool {
        matches!(self, Self::HasMany | Self::BelongsToMany | Self::MorphMany)
    }

    /// Returns true if this relationship requires a pivot table
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::BelongsToMany)
    }

    /// Returns true if `.through(...)` may be composed with this kind
    pub fn supports_through(self) -> bool {
        matches!(
            self,
            Self::BelongsTo | Self::HasOne | Self::HasMany | Self::BelongsToMany
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BelongsTo => "belongsTo",
            Self::HasOne => "hasOne",
            Self::HasMany => "hasMany",
            Self::BelongsToMany => "belongsToMany",
            Self::MorphOne => "morphOne",
            Self::MorphMany => "morphMany",
            Self::MorphTo => "morphTo",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a model or collection type, either concrete or by registry name
#[derive(Debug, Clone)]
pub enum TypeRef {
    Model(Arc<ModelDef>),
    Collection(Arc<CollectionDef>),
    Name(String),
}

impl TypeRef {
    /// The registry name, if this reference is by name
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Name(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Name(name)
    }
}

impl From<Arc<ModelDef>> for TypeRef {
    fn from(model: Arc<ModelDef>) -> Self {
        TypeRef::Model(model)
    }
}

impl From<&Arc<ModelDef>> for TypeRef {
    fn from(model: &Arc<ModelDef>) -> Self {
        TypeRef::Model(model.clone())
    }
}

impl From<Arc<CollectionDef>> for TypeRef {
    fn from(collection: Arc<CollectionDef>) -> Self {
        TypeRef::Collection(collection)
    }
}

/// Intermediate model a `through` relation passes over
#[derive(Debug, Clone)]
pub struct ThroughConfig {
    /// The intermediate model
    pub target: TypeRef,
    /// Column on the intermediate table pointing back at the owner
    pub foreign_key: Option<String>,
    /// Column linking the intermediate table and the final target
    pub other_key: Option<String>,
}

/// Polymorphic configuration
#[derive(Debug, Clone)]
pub struct MorphConfig {
    /// Morph name, e.g. `imageable`
    pub name: String,
    /// Discriminator column (defaults to `<name>_type`)
    pub type_column: Option<String>,
    /// Id column (defaults to `<name>_id`)
    pub id_column: Option<String>,
    /// Discriminator value stored for the owner (defaults to its table name)
    pub value: Option<String>,
    /// Candidate targets for `morphTo`
    pub candidates: Vec<TypeRef>,
}

impl MorphConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_column: None,
            id_column: None,
            value: None,
            candidates: Vec::new(),
        }
    }

    pub fn type_column(&self) -> String {
        self.type_column
            .clone()
            .unwrap_or_else(|| format!("{}_type", self.name))
    }

    pub fn id_column(&self) -> String {
        self.id_column
            .clone()
            .unwrap_or_else(|| format!("{}_id", self.name))
    }

    /// Validate the polymorphic configuration
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::Configuration(
                "Polymorphic relation must have a morph name".to_string(),
            ));
        }
        Ok(())
    }
}

/// A declared relation, as written on a model definition
#[derive(Debug, Clone)]
pub struct RelationDecl {
    pub kind: RelationKind,
    /// Static target; `None` only for `morphTo`
    pub target: Option<TypeRef>,
    pub foreign_key: Option<String>,
    pub other_key: Option<String>,
    /// Explicit join table for `belongsToMany`
    pub pivot_table: Option<String>,
    /// Extra pivot columns exposed on each related entity
    pub pivot_columns: Vec<String>,
    pub through: Option<ThroughConfig>,
    pub morph: Option<MorphConfig>,
    /// Additional constraints merged into the target query
    pub constraints: Option<QueryBuilder>,
}

impl RelationDecl {
    fn new(kind: RelationKind, target: Option<TypeRef>) -> Self {
        Self {
            kind,
            target,
            foreign_key: None,
            other_key: None,
            pivot_table: None,
            pivot_columns: Vec::new(),
            through: None,
            morph: None,
            constraints: None,
        }
    }

    pub fn belongs_to(target: impl Into<TypeRef>) -> Self {
        Self::new(RelationKind::BelongsTo, Some(target.into()))
    }

    pub fn has_one(target: impl Into<TypeRef>) -> Self {
        Self::new(RelationKind::HasOne, Some(target.into()))
    }

    pub fn has_many(target: impl Into<TypeRef>) -> Self {
        Self::new(RelationKind::HasMany, Some(target.into()))
    }

    pub fn belongs_to_many(target: impl Into<TypeRef>) -> Self {
        Self::new(RelationKind::BelongsToMany, Some(target.into()))
    }

    pub fn morph_one(target: impl Into<TypeRef>, morph_name: &str) -> Self {
        let mut decl = Self::new(RelationKind::MorphOne, Some(target.into()));
        decl.morph = Some(MorphConfig::new(morph_name));
        decl
    }

    pub fn morph_many(target: impl Into<TypeRef>, morph_name: &str) -> Self {
        let mut decl = Self::new(RelationKind::MorphMany, Some(target.into()));
        decl.morph = Some(MorphConfig::new(morph_name));
        decl
    }

    /// Inverse polymorphic relation. With no candidates, the discriminator
    /// value itself is looked up in the registry.
    pub fn morph_to<I, T>(morph_name: &str, candidates: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeRef>,
    {
        let mut morph = MorphConfig::new(morph_name);
        morph.candidates = candidates.into_iter().map(Into::into).collect();
        let mut decl = Self::new(RelationKind::MorphTo, None);
        decl.morph = Some(morph);
        decl
    }

    pub fn foreign_key(mut self, column: &str) -> Self {
        self.foreign_key = Some(column.to_string());
        self
    }

    pub fn other_key(mut self, column: &str) -> Self {
        self.other_key = Some(column.to_string());
        self
    }

    /// Explicit join table name for `belongsToMany`
    pub fn pivot_table(mut self, table: &str) -> Self {
        self.pivot_table = Some(table.to_string());
        self
    }

    /// Extra pivot columns to expose on each related entity
    pub fn with_pivot<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pivot_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Route the relation over an intermediate model
    pub fn through(mut self, target: impl Into<TypeRef>) -> Self {
        self.through = Some(ThroughConfig {
            target: target.into(),
            foreign_key: None,
            other_key: None,
        });
        self
    }

    /// Override the intermediate model's linking columns
    pub fn through_keys(mut self, foreign_key: &str, other_key: &str) -> Self {
        if let Some(ref mut through) = self.through {
            through.foreign_key = Some(foreign_key.to_string());
            through.other_key = Some(other_key.to_string());
        }
        self
    }

    /// Override the discriminator and id column names
    pub fn morph_columns(mut self, type_column: &str, id_column: &str) -> Self {
        if let Some(ref mut morph) = self.morph {
            morph.type_column = Some(type_column.to_string());
            morph.id_column = Some(id_column.to_string());
        }
        self
    }

    /// Override the discriminator value written for the owner
    pub fn morph_value(mut self, value: &str) -> Self {
        if let Some(ref mut morph) = self.morph {
            morph.value = Some(value.to_string());
        }
        self
    }

    /// Merge WHERE/ORDER BY constraints into every target query
    pub fn constrain(mut self, query: QueryBuilder) -> Self {
        self.constraints = Some(query);
        self
    }

    /// Validate the declaration for consistency
    pub fn validate(&self) -> ModelResult<()> {
        if self.kind.is_polymorphic() {
            match self.morph {
                Some(ref morph) => morph.validate()?,
                None => {
                    return Err(ModelError::Configuration(format!(
                        "Relation of kind {} requires polymorphic configuration",
                        self.kind
                    )))
                }
            }
        }

        if self.kind != RelationKind::MorphTo && self.target.is_none() {
            return Err(ModelError::Configuration(format!(
                "Relation of kind {} requires a target",
                self.kind
            )));
        }

        if self.through.is_some() && !self.kind.supports_through() {
            return Err(ModelError::Configuration(format!(
                "Relation of kind {} cannot be routed through another model",
                self.kind
            )));
        }

        if !self.pivot_columns.is_empty() && !self.kind.requires_pivot() {
            return Err(ModelError::Configuration(format!(
                "Pivot columns are only valid on belongsToMany, not {}",
                self.kind
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_kind_properties() {
        assert!(RelationKind::HasMany.is_to_many());
        assert!(RelationKind::MorphMany.is_to_many());
        assert!(!RelationKind::MorphTo.is_to_many());
        assert!(RelationKind::MorphTo.is_polymorphic());
        assert!(RelationKind::BelongsToMany.requires_pivot());
        assert!(!RelationKind::MorphOne.supports_through());
    }

    #[test]
    fn test_morph_column_defaults() {
        let decl = RelationDecl::morph_many("Photo", "imageable");
        let morph = decl.morph.as_ref().unwrap();
        assert_eq!(morph.type_column(), "imageable_type");
        assert_eq!(morph.id_column(), "imageable_id");

        let decl = RelationDecl::morph_many("Photo", "imageable").morph_columns("kind", "ref_id");
        let morph = decl.morph.as_ref().unwrap();
        assert_eq!(morph.type_column(), "kind");
        assert_eq!(morph.id_column(), "ref_id");
    }

    #[test]
    fn test_validation_rejects_through_on_morph() {
        let decl = RelationDecl::morph_one("Photo", "imageable").through("Blog");
        assert!(matches!(decl.validate(), Err(ModelError::Configuration(_))));
    }

    #[test]
    fn test_validation_rejects_pivot_columns_on_has_many() {
        let decl = RelationDecl::has_many("Post").with_pivot(["item"]);
        assert!(decl.validate().is_err());
    }

    #[test]
    fn test_morph_to_collects_candidates() {
        let decl = RelationDecl::morph_to("imageable", ["Site", "Author"]);
        assert!(decl.target.is_none());
        assert_eq!(decl.morph.as_ref().unwrap().candidates.len(), 2);
        assert!(decl.validate().is_ok());
    }
}
