//! Pivot synchronization for many-to-many relations
//!
//! Mutations write pivot rows and keep the owner's loaded entity set in step,
//! so an owner never has to be reloaded after `attach` or `detach`.

use std::time::Duration;

use serde_json::{Map, Value};

use super::descriptor::{LinkPlan, RelationDescriptor};
use super::metadata::RelationKind;
use crate::backends::{execute_with_timeout, QueryExecutor};
use crate::error::{ModelError, ModelResult};
use crate::model::{persist, AddPolicy, Entity, EntitySet, KeyValue, ModelDef, Related};
use crate::query::QueryBuilder;

/// Something to attach: a bare key or a (possibly unsaved) entity
#[derive(Debug, Clone)]
pub enum PivotTarget {
    Key(KeyValue),
    Entity(Entity),
}

impl From<KeyValue> for PivotTarget {
    fn from(key: KeyValue) -> Self {
        PivotTarget::Key(key)
    }
}

impl From<i64> for PivotTarget {
    fn from(key: i64) -> Self {
        PivotTarget::Key(KeyValue::Integer(key))
    }
}

impl From<i32> for PivotTarget {
    fn from(key: i32) -> Self {
        PivotTarget::Key(KeyValue::Integer(key as i64))
    }
}

impl From<Entity> for PivotTarget {
    fn from(entity: Entity) -> Self {
        PivotTarget::Entity(entity)
    }
}

/// Writes pivot rows for one `belongsToMany` relation
pub struct PivotSynchronizer<'a> {
    executor: &'a dyn QueryExecutor,
    descriptor: &'a RelationDescriptor,
    link: &'a LinkPlan,
    timeout: Option<Duration>,
}

impl<'a> PivotSynchronizer<'a> {
    pub fn new(
        executor: &'a dyn QueryExecutor,
        descriptor: &'a RelationDescriptor,
    ) -> ModelResult<Self> {
        let link = match (descriptor.kind, descriptor.link()) {
            (RelationKind::BelongsToMany, Some(link)) if !link.through => link,
            _ => {
                return Err(ModelError::Configuration(format!(
                    "Pivot operations require a belongsToMany relation; '{}' is {}",
                    descriptor.name, descriptor.kind
                )))
            }
        };
        Ok(Self {
            executor,
            descriptor,
            link,
            timeout: None,
        })
    }

    /// Bound every statement by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Insert pivot rows linking `owner` to each target.
    ///
    /// Targets already present in the owner's loaded set (or repeated in
    /// `targets`) are skipped. Unsaved entity targets are saved first.
    pub async fn attach(
        &self,
        owner: &mut Entity,
        targets: Vec<PivotTarget>,
        extra: Map<String, Value>,
    ) -> ModelResult<usize> {
        let owner_key = owner.require_key(&self.link.owner_key)?;
        let mut set = self.take_loaded_set(owner);
        let mut inserted = 0;

        let result = async {
            for target in targets {
                let mut entity = match target {
                    PivotTarget::Key(key) => {
                        let model = self.target_model();
                        Entity::new(model).with(&self.link.target_key, key)
                    }
                    PivotTarget::Entity(mut entity) => {
                        if entity.is_new() {
                            persist::save(self.executor, &mut entity, self.timeout).await?;
                        }
                        entity
                    }
                };

                let target_key = entity.require_key(&self.link.target_key)?;
                if set
                    .iter()
                    .any(|existing| existing.key(&self.link.target_key).as_ref() == Some(&target_key))
                {
                    tracing::debug!(
                        "{}: {} already attached to {}, skipping",
                        self.link.table,
                        target_key,
                        owner_key
                    );
                    continue;
                }

                // link keys last so extra columns cannot relink the row
                let mut row = extra.clone();
                row.insert(self.link.link_key.clone(), owner_key.to_json());
                row.insert(self.link.hop_key.clone(), target_key.to_json());

                let query = QueryBuilder::new()
                    .insert_into(&self.link.table)
                    .set_values(row.iter().map(|(c, v)| (c.clone(), v.clone())));
                execute_with_timeout(self.executor, &query, self.timeout).await?;
                inserted += 1;

                entity.set_pivot(Entity::from_row(self.link.model.clone(), row));
                set.add(entity, AddPolicy::Ignore);
            }
            Ok::<_, ModelError>(())
        }
        .await;

        owner.set_related(&self.descriptor.name, Related::Many(set));
        result?;

        tracing::debug!(
            "Attached {} row(s) to {} for {} {}",
            inserted,
            self.link.table,
            owner.table_name(),
            owner_key
        );
        Ok(inserted)
    }

    /// Delete pivot rows for the owner; all of them when `targets` is `None`
    pub async fn detach(
        &self,
        owner: &mut Entity,
        targets: Option<Vec<KeyValue>>,
    ) -> ModelResult<u64> {
        let owner_key = owner.require_key(&self.link.owner_key)?;
        let mut query = QueryBuilder::new()
            .delete_from(&self.link.table)
            .where_eq(&self.link.link_key, owner_key.clone());
        if let Some(ref keys) = targets {
            if keys.is_empty() {
                return Ok(0);
            }
            query = query.where_in(&self.link.hop_key, keys.clone());
        }

        let deleted = execute_with_timeout(self.executor, &query, self.timeout).await?;

        if let Some(Related::Many(set)) = owner.related_mut(&self.descriptor.name) {
            match targets {
                Some(ref keys) => {
                    let target_key = &self.link.target_key;
                    set.retain(|entity| {
                        entity
                            .key(target_key)
                            .map_or(true, |key| !keys.contains(&key))
                    });
                }
                None => set.reset(),
            }
        }

        tracing::debug!(
            "Detached {} row(s) from {} for {} {}",
            deleted,
            self.link.table,
            owner.table_name(),
            owner_key
        );
        Ok(deleted)
    }

    /// Update extra columns on the owner's pivot rows
    pub async fn update_pivot(
        &self,
        owner: &mut Entity,
        attributes: Map<String, Value>,
        targets: Option<Vec<KeyValue>>,
    ) -> ModelResult<u64> {
        let owner_key = owner.require_key(&self.link.owner_key)?;
        if attributes.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::new()
            .update(&self.link.table)
            .set_values(attributes.iter().map(|(c, v)| (c.clone(), v.clone())))
            .where_eq(&self.link.link_key, owner_key.clone());
        if let Some(ref keys) = targets {
            if keys.is_empty() {
                return Ok(0);
            }
            query = query.where_in(&self.link.hop_key, keys.clone());
        }
        let updated = execute_with_timeout(self.executor, &query, self.timeout).await?;

        if let Some(Related::Many(set)) = owner.related_mut(&self.descriptor.name) {
            for entity in set.iter_mut() {
                let selected = match (&targets, entity.key(&self.link.target_key)) {
                    (Some(keys), Some(key)) => keys.contains(&key),
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                if !selected {
                    continue;
                }
                if let Some(pivot) = entity.pivot_mut() {
                    for (column, value) in &attributes {
                        pivot.set(column, value.clone());
                    }
                }
            }
        }

        tracing::debug!(
            "Updated {} pivot row(s) in {} for {} {}",
            updated,
            self.link.table,
            owner.table_name(),
            owner_key
        );
        Ok(updated)
    }

    fn target_model(&self) -> std::sync::Arc<ModelDef> {
        match self.descriptor.target {
            Some(ref target) => target.model().clone(),
            None => ModelDef::unresolved(),
        }
    }

    /// The owner's loaded set for this relation, or a fresh empty one
    fn take_loaded_set(&self, owner: &Entity) -> EntitySet {
        match owner.related(&self.descriptor.name) {
            Some(Related::Many(set)) => set.clone(),
            _ => match self.descriptor.target {
                Some(ref target) => match target.collection() {
                    Some(collection) => EntitySet::for_collection(collection.clone()),
                    None => EntitySet::new(target.model().clone()),
                },
                None => EntitySet::new(ModelDef::unresolved()),
            },
        }
    }
}
