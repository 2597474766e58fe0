//! Entities: attribute bags bound to a model definition

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::collection::EntitySet;
use super::definition::ModelDef;
use super::key::KeyValue;
use crate::backends::Row;
use crate::error::{ModelError, ModelResult};

/// Loaded result of a relation on one owner
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Box<Entity>),
    Many(EntitySet),
}

impl Related {
    /// Whether the relation loaded nothing
    pub fn is_empty(&self) -> bool {
        match self {
            Related::One(entity) => entity.is_placeholder(),
            Related::Many(set) => set.is_empty(),
        }
    }

    pub fn as_one(&self) -> Option<&Entity> {
        match self {
            Related::One(entity) => Some(entity),
            Related::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&EntitySet> {
        match self {
            Related::Many(set) => Some(set),
            Related::One(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Related::One(entity) => entity.to_json(),
            Related::Many(set) => set.to_json(),
        }
    }

    pub(crate) fn entities_mut(&mut self) -> &mut [Entity] {
        match self {
            Related::One(entity) => std::slice::from_mut(entity.as_mut()),
            Related::Many(set) => set.as_mut_slice(),
        }
    }
}

/// A single record of some model
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    def: Arc<ModelDef>,
    attributes: Map<String, Value>,
    relations: BTreeMap<String, Related>,
    pivot: Option<Box<Entity>>,
    through_table: Option<String>,
    placeholder: bool,
}

impl Entity {
    /// A new, unsaved entity with no attributes
    pub fn new(def: Arc<ModelDef>) -> Self {
        Self::from_row(def, Map::new())
    }

    pub fn from_row(def: Arc<ModelDef>, attributes: Row) -> Self {
        Self {
            def,
            attributes,
            relations: BTreeMap::new(),
            pivot: None,
            through_table: None,
            placeholder: false,
        }
    }

    /// Build from a JSON object; non-object values are rejected
    pub fn from_json(def: Arc<ModelDef>, value: Value) -> ModelResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_row(def, map)),
            other => Err(ModelError::Serialization(format!(
                "Expected a JSON object for '{}', got {}",
                def.table_name(),
                other
            ))),
        }
    }

    /// Explicitly-empty result for a to-one relation that matched nothing
    pub fn placeholder(def: Arc<ModelDef>) -> Self {
        let mut entity = Self::new(def);
        entity.placeholder = true;
        entity
    }

    /// Set an attribute, builder style
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn def(&self) -> &Arc<ModelDef> {
        &self.def
    }

    pub fn table_name(&self) -> &str {
        self.def.table_name()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.attributes.insert(column.to_string(), value.into());
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Hashable key stored in `column`, if present and usable
    pub fn key(&self, column: &str) -> Option<KeyValue> {
        self.attributes.get(column).and_then(KeyValue::from_json)
    }

    /// Key stored in `column`, failing with `MissingKey`
    pub fn require_key(&self, column: &str) -> ModelResult<KeyValue> {
        self.key(column).ok_or_else(|| ModelError::MissingKey {
            table: self.def.table_name().to_string(),
            key: column.to_string(),
        })
    }

    /// Primary key value
    pub fn id(&self) -> Option<KeyValue> {
        self.key(self.def.id_attribute())
    }

    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn related(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn related_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.relations.get_mut(name)
    }

    pub fn set_related(&mut self, name: &str, related: Related) {
        self.relations.insert(name.to_string(), related);
    }

    pub(crate) fn take_related(&mut self, name: &str) -> Option<Related> {
        self.relations.remove(name)
    }

    pub fn loaded_relations(&self) -> impl Iterator<Item = (&str, &Related)> {
        self.relations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Pivot/intermediate record this entity was reached through
    pub fn pivot(&self) -> Option<&Entity> {
        self.pivot.as_deref()
    }

    pub(crate) fn pivot_mut(&mut self) -> Option<&mut Entity> {
        self.pivot.as_deref_mut()
    }

    pub fn set_pivot(&mut self, pivot: Entity) {
        self.pivot = Some(Box::new(pivot));
    }

    /// Table of the intermediate model, for entities loaded through one
    pub fn through_table(&self) -> Option<&str> {
        self.through_table.as_deref()
    }

    pub(crate) fn set_through_table(&mut self, table: &str) {
        self.through_table = Some(table.to_string());
    }

    /// Serialize attributes, loaded relations and pivot columns
    pub fn to_json(&self) -> Value {
        let mut map = self.attributes.clone();
        if let Some(ref pivot) = self.pivot {
            for (column, value) in pivot.attributes() {
                map.insert(format!("_pivot_{}", column), value.clone());
            }
        }
        for (name, related) in &self.relations {
            map.insert(name.clone(), related.to_json());
        }
        Value::Object(map)
    }
}
