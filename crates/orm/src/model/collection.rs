//! Entity sets: ordered, id-deduplicated collections of entities

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::definition::{CollectionDef, ModelDef};
use super::entity::Entity;
use super::key::KeyValue;

/// How [`EntitySet::add`] treats an entity whose id is already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddPolicy {
    /// Keep the existing entity
    #[default]
    Ignore,
    /// Copy the incoming attributes onto the existing entity
    Merge,
    /// Swap the existing entity for the incoming one
    Replace,
}

/// Ordered collection of entities of one model
#[derive(Debug, Clone)]
pub struct EntitySet {
    def: Arc<ModelDef>,
    collection: Option<Arc<CollectionDef>>,
    entities: Vec<Entity>,
    by_id: HashMap<KeyValue, usize>,
}

impl PartialEq for EntitySet {
    fn eq(&self, other: &Self) -> bool {
        self.def == other.def && self.entities == other.entities
    }
}

impl EntitySet {
    pub fn new(def: Arc<ModelDef>) -> Self {
        Self {
            def,
            collection: None,
            entities: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Empty set typed by a registered collection
    pub fn for_collection(collection: Arc<CollectionDef>) -> Self {
        let mut set = Self::new(collection.model().clone());
        set.collection = Some(collection);
        set
    }

    /// Build from entities, ignoring duplicate ids
    pub fn from_entities(def: Arc<ModelDef>, entities: Vec<Entity>) -> Self {
        let mut set = Self::new(def);
        for entity in entities {
            set.add(entity, AddPolicy::Ignore);
        }
        set
    }

    pub fn def(&self) -> &Arc<ModelDef> {
        &self.def
    }

    pub fn collection(&self) -> Option<&Arc<CollectionDef>> {
        self.collection.as_ref()
    }

    /// Add an entity. Returns true if the set grew.
    pub fn add(&mut self, entity: Entity, policy: AddPolicy) -> bool {
        let id = match entity.id() {
            Some(id) => id,
            None => {
                self.entities.push(entity);
                return true;
            }
        };

        match self.by_id.get(&id) {
            Some(&index) => {
                match policy {
                    AddPolicy::Ignore => {}
                    AddPolicy::Merge => {
                        let existing = &mut self.entities[index];
                        for (column, value) in entity.attributes() {
                            existing.set(column, value.clone());
                        }
                    }
                    AddPolicy::Replace => self.entities[index] = entity,
                }
                false
            }
            None => {
                self.by_id.insert(id, self.entities.len());
                self.entities.push(entity);
                true
            }
        }
    }

    /// Drop all entities
    pub fn reset(&mut self) {
        self.entities.clear();
        self.by_id.clear();
    }

    pub fn get(&self, id: &KeyValue) -> Option<&Entity> {
        self.by_id.get(id).map(|&index| &self.entities[index])
    }

    pub fn contains(&self, id: &KeyValue) -> bool {
        self.by_id.contains_key(id)
    }

    /// Remove the entity with the given id
    pub fn remove(&mut self, id: &KeyValue) -> Option<Entity> {
        let index = self.by_id.remove(id)?;
        let removed = self.entities.remove(index);
        self.reindex();
        Some(removed)
    }

    /// Keep only entities matching the predicate
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&Entity) -> bool,
    {
        self.entities.retain(f);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        for (index, entity) in self.entities.iter().enumerate() {
            if let Some(id) = entity.id() {
                self.by_id.entry(id).or_insert(index);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn first(&self) -> Option<&Entity> {
        self.entities.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn as_slice(&self) -> &[Entity] {
        &self.entities
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.entities.iter_mut()
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    /// Ids in set order
    pub fn ids(&self) -> Vec<KeyValue> {
        self.entities.iter().filter_map(Entity::id).collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.entities.iter().map(Entity::to_json).collect())
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

impl IntoIterator for EntitySet {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn posts() -> Arc<ModelDef> {
        ModelDef::new("posts").build().unwrap()
    }

    fn post(id: i64, title: &str) -> Entity {
        Entity::new(posts()).with("id", id).with("title", title)
    }

    #[test]
    fn test_add_ignores_duplicates_by_default() {
        let mut set = EntitySet::new(posts());
        assert!(set.add(post(1, "first"), AddPolicy::default()));
        assert!(!set.add(post(1, "again"), AddPolicy::default()));
        assert_eq!(set.len(), 1);
        assert_eq!(set.first().unwrap().get("title"), Some(&json!("first")));
    }

    #[test]
    fn test_add_merge() {
        let mut set = EntitySet::new(posts());
        set.add(post(1, "first").with("blog_id", 2), AddPolicy::Ignore);
        set.add(post(1, "merged"), AddPolicy::Merge);
        let merged = set.get(&KeyValue::Integer(1)).unwrap();
        assert_eq!(merged.get("title"), Some(&json!("merged")));
        assert_eq!(merged.get("blog_id"), Some(&json!(2)));
    }

    #[test]
    fn test_entities_without_id_are_appended() {
        let mut set = EntitySet::new(posts());
        set.add(Entity::new(posts()), AddPolicy::Ignore);
        set.add(Entity::new(posts()), AddPolicy::Ignore);
        assert_eq!(set.len(), 2);
        assert!(set.ids().is_empty());
    }

    #[test]
    fn test_remove_reindexes() {
        let mut set = EntitySet::from_entities(posts(), vec![post(1, "a"), post(2, "b"), post(3, "c")]);
        assert!(set.remove(&KeyValue::Integer(1)).is_some());
        assert_eq!(set.get(&KeyValue::Integer(3)).unwrap().get("title"), Some(&json!("c")));
        assert!(!set.contains(&KeyValue::Integer(1)));

        set.reset();
        assert!(set.is_empty());
    }
}
