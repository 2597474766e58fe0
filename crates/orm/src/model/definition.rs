//! Model and collection definitions
//!
//! A [`ModelDef`] describes a table: its name, primary key column and the
//! relations declared on it. Definitions are immutable once built and shared
//! behind `Arc`, which also gives them an identity for registry conflict
//! checks and for grouping owners during eager loading.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ModelError, ModelResult};
use crate::relationships::metadata::{RelationDecl, RelationKind};

/// Description of a model type
#[derive(Debug, Clone)]
pub struct ModelDef {
    table_name: String,
    id_attribute: String,
    relations: BTreeMap<String, RelationDecl>,
}

impl ModelDef {
    /// Start building a definition for the given table
    pub fn new(table_name: &str) -> ModelDefBuilder {
        ModelDefBuilder {
            def: ModelDef {
                table_name: table_name.to_string(),
                id_attribute: "id".to_string(),
                relations: BTreeMap::new(),
            },
        }
    }

    /// Definition carried by placeholders whose target type is unknown
    pub(crate) fn unresolved() -> Arc<ModelDef> {
        Arc::new(ModelDef {
            table_name: String::new(),
            id_attribute: "id".to_string(),
            relations: BTreeMap::new(),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDecl> {
        self.relations.get(name)
    }

    /// Look up a relation, failing with `UndefinedRelation`
    pub fn require_relation(&self, name: &str) -> ModelResult<&RelationDecl> {
        self.relations
            .get(name)
            .ok_or_else(|| ModelError::UndefinedRelation {
                table: self.table_name.clone(),
                relation: name.to_string(),
            })
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Singular form of the table name, used for default key names
    pub fn singular_name(&self) -> String {
        singularize(&self.table_name)
    }

    /// Default foreign key pointing at this model, e.g. `site_id`
    pub fn default_foreign_key(&self) -> String {
        format!("{}_{}", self.singular_name(), self.id_attribute)
    }
}

impl PartialEq for ModelDef {
    fn eq(&self, other: &Self) -> bool {
        self.table_name == other.table_name && self.id_attribute == other.id_attribute
    }
}

/// Builder for [`ModelDef`]
#[derive(Debug, Clone)]
pub struct ModelDefBuilder {
    def: ModelDef,
}

impl ModelDefBuilder {
    pub fn id_attribute(mut self, column: &str) -> Self {
        self.def.id_attribute = column.to_string();
        self
    }

    /// Declare a relation under the given name
    pub fn relation(mut self, name: &str, decl: RelationDecl) -> Self {
        self.def.relations.insert(name.to_string(), decl);
        self
    }

    /// Validate declarations and freeze the definition
    pub fn build(self) -> ModelResult<Arc<ModelDef>> {
        if self.def.table_name.trim().is_empty() {
            return Err(ModelError::Configuration(
                "Model definition requires a table name".to_string(),
            ));
        }
        for (name, decl) in &self.def.relations {
            decl.validate().map_err(|e| match e {
                ModelError::Configuration(msg) => ModelError::Configuration(format!(
                    "{}.{}: {}",
                    self.def.table_name, name, msg
                )),
                other => other,
            })?;
        }
        tracing::trace!(
            "Built model definition '{}' with {} relation(s)",
            self.def.table_name,
            self.def.relations.len()
        );
        Ok(Arc::new(self.def))
    }
}

/// Description of a collection type bound to a model
#[derive(Debug, Clone)]
pub struct CollectionDef {
    model: Arc<ModelDef>,
}

impl CollectionDef {
    pub fn new(model: Arc<ModelDef>) -> Arc<CollectionDef> {
        Arc::new(CollectionDef { model })
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }
}

/// A resolved relation target
#[derive(Debug, Clone)]
pub enum Target {
    Model(Arc<ModelDef>),
    Collection(Arc<CollectionDef>),
}

impl Target {
    /// The model every entity of this target is built from
    pub fn model(&self) -> &Arc<ModelDef> {
        match self {
            Target::Model(model) => model,
            Target::Collection(collection) => collection.model(),
        }
    }

    pub fn collection(&self) -> Option<&Arc<CollectionDef>> {
        match self {
            Target::Collection(collection) => Some(collection),
            Target::Model(_) => None,
        }
    }

    pub fn table_name(&self) -> &str {
        self.model().table_name()
    }

    /// Whether this target's model is the same definition as `model`
    pub fn is_model(&self, model: &Arc<ModelDef>) -> bool {
        Arc::ptr_eq(self.model(), model)
    }
}

/// Which registry table a name lookup prefers for a relation kind
pub(crate) fn prefers_collection(kind: RelationKind) -> bool {
    kind.is_to_many()
}

/// Naive English singular: `ies` -> `y`, trailing `s` dropped
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = word.strip_suffix('s') {
        stem.to_string()
    } else {
        word.to_string()
    }
}
