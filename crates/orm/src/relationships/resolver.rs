//! Relation Resolver - batched fetching and owner association
//!
//! Resolution is split in two phases. [`RelationResolver::fetch`] only reads
//! the owners and issues queries, so fetches for many relations can run
//! concurrently. [`RelationResolver::associate`] then attaches the fetched
//! entities to each owner without touching the store.

use std::collections::HashMap;
use std::future::Future;

use futures::future::try_join_all;
use serde_json::Value;

use super::descriptor::{LinkPlan, MorphToPlan, RelationDescriptor, Strategy};
use super::metadata::RelationKind;
use super::registry::TypeRegistry;
use crate::backends::{fetch_with_timeout, QueryExecutor, Row};
use crate::error::{ModelError, ModelResult};
use crate::loading::EagerLoadConfig;
use crate::model::{AddPolicy, Entity, EntitySet, KeyValue, ModelDef, Related, Target};
use crate::query::QueryBuilder;

/// Per-call resolution switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Fail on morph discriminators with no known type
    pub strict: bool,
    /// Attach pivot records to entities reached over a pivot or intermediate table
    pub include_pivot: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            strict: false,
            include_pivot: true,
        }
    }
}

#[derive(Debug)]
enum FetchedRows {
    Direct(Vec<Entity>),
    Linked { links: Vec<Row>, targets: Vec<Entity> },
    Morph(Vec<MorphGroup>),
}

#[derive(Debug)]
struct MorphGroup {
    discriminator: String,
    target: Target,
    entities: Vec<Entity>,
}

/// Rows fetched for one relation over a batch of owners
#[derive(Debug)]
pub struct Fetched {
    rows: FetchedRows,
    query_count: usize,
}

impl Fetched {
    /// Number of queries issued to fetch these rows
    pub fn query_count(&self) -> usize {
        self.query_count
    }

    /// Number of related entities fetched
    pub fn record_count(&self) -> usize {
        match self.rows {
            FetchedRows::Direct(ref entities) => entities.len(),
            FetchedRows::Linked { ref targets, .. } => targets.len(),
            FetchedRows::Morph(ref groups) => groups.iter().map(|g| g.entities.len()).sum(),
        }
    }
}

/// Run futures concurrently, or one after another, failing on the first error
pub(crate) async fn run_all<F, T>(parallel: bool, futures: Vec<F>) -> ModelResult<Vec<T>>
where
    F: Future<Output = ModelResult<T>>,
{
    if parallel {
        try_join_all(futures).await
    } else {
        let mut results = Vec::with_capacity(futures.len());
        for future in futures {
            results.push(future.await?);
        }
        Ok(results)
    }
}

/// Fetches and associates the rows of one relation for a batch of owners
#[derive(Clone, Copy)]
pub struct RelationResolver<'a> {
    executor: &'a dyn QueryExecutor,
    registry: &'a TypeRegistry,
    config: &'a EagerLoadConfig,
    options: ResolveOptions,
}

impl<'a> RelationResolver<'a> {
    pub fn new(
        executor: &'a dyn QueryExecutor,
        registry: &'a TypeRegistry,
        config: &'a EagerLoadConfig,
        options: ResolveOptions,
    ) -> Self {
        Self {
            executor,
            registry,
            config,
            options,
        }
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Fetch the related rows for all owners.
    ///
    /// Issues one query per relation per batch of keys (two for pivot and
    /// `through` relations, one per discriminator for `morphTo`). Owners
    /// without a usable key contribute nothing; with no keys at all no
    /// query is issued.
    pub async fn fetch(
        &self,
        descriptor: &RelationDescriptor,
        owners: &[&Entity],
    ) -> ModelResult<Fetched> {
        let fetched = match descriptor.strategy {
            Strategy::Direct { ref owner_key, .. } => {
                let keys = collect_keys(owners, owner_key);
                let (rows, query_count) = self
                    .run_batched(&keys, |chunk| descriptor.plan_query(chunk))
                    .await?;
                let model = target_model(descriptor);
                Fetched {
                    rows: FetchedRows::Direct(
                        rows.into_iter()
                            .map(|row| Entity::from_row(model.clone(), row))
                            .collect(),
                    ),
                    query_count,
                }
            }
            Strategy::Linked(ref link) => {
                let keys = collect_keys(owners, &link.owner_key);
                let (links, link_queries) = self
                    .run_batched(&keys, |chunk| descriptor.plan_query(chunk))
                    .await?;

                let hop_keys = distinct(links.iter().filter_map(|row| row_key(row, &link.hop_key)));
                let (rows, target_queries) = self
                    .run_batched(&hop_keys, |chunk| descriptor.plan_target_query(chunk))
                    .await?;
                let model = target_model(descriptor);
                Fetched {
                    rows: FetchedRows::Linked {
                        links,
                        targets: rows
                            .into_iter()
                            .map(|row| Entity::from_row(model.clone(), row))
                            .collect(),
                    },
                    query_count: link_queries + target_queries,
                }
            }
            Strategy::MorphTo(ref morph) => self.fetch_morph(descriptor, morph, owners).await?,
        };

        tracing::debug!(
            "Fetched {} {} record(s) for {}.{} with {} quer{}",
            fetched.record_count(),
            descriptor.target_table().unwrap_or("polymorphic"),
            descriptor.owner.table_name(),
            descriptor.name,
            fetched.query_count,
            if fetched.query_count == 1 { "y" } else { "ies" }
        );
        Ok(fetched)
    }

    async fn fetch_morph(
        &self,
        descriptor: &RelationDescriptor,
        morph: &MorphToPlan,
        owners: &[&Entity],
    ) -> ModelResult<Fetched> {
        // discriminator -> ids, in order of first appearance
        let mut partitions: Vec<(String, Vec<KeyValue>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for owner in owners {
            let Some(discriminator) = owner.get(&morph.type_column).and_then(discriminator) else {
                tracing::debug!(
                    "Skipping {} owner without '{}' for {}",
                    owner.table_name(),
                    morph.type_column,
                    descriptor.name
                );
                continue;
            };
            let Some(id) = recover_key(owner, &morph.id_column) else {
                continue;
            };
            let slot = *index.entry(discriminator.clone()).or_insert_with(|| {
                partitions.push((discriminator, Vec::new()));
                partitions.len() - 1
            });
            let ids = &mut partitions[slot].1;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let mut groups = Vec::with_capacity(partitions.len());
        for (discriminator, ids) in partitions {
            match morph.target_for(&discriminator, self.registry) {
                Some(target) => groups.push((discriminator, target, ids)),
                None if self.options.strict => {
                    tracing::warn!(
                        "No morph target for '{}' on {}.{}",
                        discriminator,
                        descriptor.owner.table_name(),
                        descriptor.name
                    );
                    return Err(ModelError::UnresolvedName {
                        name: discriminator,
                        kind: "morph target",
                    });
                }
                None => tracing::debug!(
                    "Ignoring unmapped morph discriminator '{}' on {}.{}",
                    discriminator,
                    descriptor.owner.table_name(),
                    descriptor.name
                ),
            }
        }

        let futures = groups
            .into_iter()
            .map(|(discriminator, target, ids)| async move {
                let (rows, query_count) = self
                    .run_batched(&ids, |chunk| Ok(morph.plan_query(&target, chunk)))
                    .await?;
                let model = target.model().clone();
                let entities = rows
                    .into_iter()
                    .map(|row| Entity::from_row(model.clone(), row))
                    .collect();
                Ok::<_, ModelError>((
                    MorphGroup {
                        discriminator,
                        target,
                        entities,
                    },
                    query_count,
                ))
            })
            .collect::<Vec<_>>();

        let results = run_all(self.config.enable_parallelism, futures).await?;
        let query_count = results.iter().map(|(_, count)| count).sum();
        Ok(Fetched {
            rows: FetchedRows::Morph(results.into_iter().map(|(group, _)| group).collect()),
            query_count,
        })
    }

    /// Run the planned query over `keys` in chunks of `max_batch_size`
    async fn run_batched<P>(&self, keys: &[KeyValue], plan: P) -> ModelResult<(Vec<Row>, usize)>
    where
        P: Fn(&[KeyValue]) -> ModelResult<QueryBuilder>,
    {
        let mut rows = Vec::new();
        let mut query_count = 0;
        for chunk in keys.chunks(self.config.max_batch_size.max(1)) {
            let query = plan(chunk)?;
            rows.extend(fetch_with_timeout(self.executor, &query, self.config.query_timeout()).await?);
            query_count += 1;
        }
        Ok((rows, query_count))
    }

    /// Attach fetched entities to their owners.
    ///
    /// Every owner receives a result: to-many relations an entity set (possibly
    /// empty), to-one relations the first match or an empty placeholder.
    pub fn associate(
        &self,
        descriptor: &RelationDescriptor,
        fetched: Fetched,
        owners: &mut [&mut Entity],
    ) {
        match (fetched.rows, &descriptor.strategy) {
            (
                FetchedRows::Direct(entities),
                Strategy::Direct {
                    owner_key,
                    target_key,
                    ..
                },
            ) => {
                let mut by_key: HashMap<KeyValue, Vec<&Entity>> = HashMap::new();
                for entity in &entities {
                    if let Some(key) = entity.key(target_key) {
                        by_key.entry(key).or_default().push(entity);
                    }
                }
                for owner in owners.iter_mut() {
                    let matches = owner
                        .key(owner_key)
                        .and_then(|key| by_key.get(&key))
                        .map(Vec::as_slice)
                        .unwrap_or(&[]);
                    let related = build_related(
                        descriptor.kind,
                        descriptor.target.as_ref(),
                        matches.iter().map(|entity| (*entity).clone()),
                    );
                    owner.set_related(&descriptor.name, related);
                }
            }
            (FetchedRows::Linked { links, targets }, Strategy::Linked(link)) => {
                let mut links_by_owner: HashMap<KeyValue, Vec<&Row>> = HashMap::new();
                for row in &links {
                    if let Some(key) = row_key(row, &link.link_key) {
                        links_by_owner.entry(key).or_default().push(row);
                    }
                }
                for owner in owners.iter_mut() {
                    let mut hops: HashMap<KeyValue, &Row> = HashMap::new();
                    if let Some(owner_links) = owner
                        .key(&link.owner_key)
                        .and_then(|key| links_by_owner.get(&key))
                    {
                        for row in owner_links {
                            if let Some(hop) = row_key(row, &link.hop_key) {
                                hops.entry(hop).or_insert(row);
                            }
                        }
                    }
                    let matched = targets.iter().filter_map(|target| {
                        let row = hops.get(&target.key(&link.target_key)?)?;
                        Some(self.linked_entity(descriptor, link, target, row))
                    });
                    let related = build_related(descriptor.kind, descriptor.target.as_ref(), matched);
                    owner.set_related(&descriptor.name, related);
                }
            }
            (FetchedRows::Morph(groups), Strategy::MorphTo(morph)) => {
                let mut index: HashMap<(&str, KeyValue), &Entity> = HashMap::new();
                for group in &groups {
                    let id_column = group.target.model().id_attribute();
                    for entity in &group.entities {
                        if let Some(id) = entity.key(id_column) {
                            index.entry((group.discriminator.as_str(), id)).or_insert(entity);
                        }
                    }
                }
                for owner in owners.iter_mut() {
                    let discriminator = owner.get(&morph.type_column).and_then(discriminator);
                    let found = match (discriminator.as_deref(), owner.key(&morph.id_column)) {
                        (Some(discriminator), Some(id)) => index.get(&(discriminator, id)).copied(),
                        _ => None,
                    };
                    let related = match found {
                        Some(entity) => Related::One(Box::new(entity.clone())),
                        None => {
                            let def = discriminator
                                .as_deref()
                                .and_then(|d| groups.iter().find(|g| g.discriminator == d))
                                .map(|g| g.target.model().clone())
                                .unwrap_or_else(ModelDef::unresolved);
                            Related::One(Box::new(Entity::placeholder(def)))
                        }
                    };
                    owner.set_related(&descriptor.name, related);
                }
            }
            _ => tracing::warn!(
                "Fetched rows do not match the strategy of {}.{}",
                descriptor.owner.table_name(),
                descriptor.name
            ),
        }
    }

    fn linked_entity(
        &self,
        descriptor: &RelationDescriptor,
        link: &LinkPlan,
        target: &Entity,
        row: &Row,
    ) -> Entity {
        let mut entity = target.clone();
        if link.through {
            entity.set_through_table(&link.table);
        }
        if self.options.include_pivot {
            let pivot_row = if descriptor.kind.requires_pivot() {
                link.pivot_attributes()
                    .into_iter()
                    .filter_map(|column| row.get(column).map(|v| (column.to_string(), v.clone())))
                    .collect()
            } else {
                row.clone()
            };
            entity.set_pivot(Entity::from_row(link.model.clone(), pivot_row));
        }
        entity
    }
}

fn target_model(descriptor: &RelationDescriptor) -> std::sync::Arc<ModelDef> {
    descriptor
        .target
        .as_ref()
        .map(|target| target.model().clone())
        .unwrap_or_else(ModelDef::unresolved)
}

/// Build the loaded value for one owner from its matched entities
pub(crate) fn build_related<I>(kind: RelationKind, target: Option<&Target>, matched: I) -> Related
where
    I: IntoIterator<Item = Entity>,
{
    let mut matched = matched.into_iter();
    if kind.is_to_many() {
        let mut set = match target {
            Some(Target::Collection(collection)) => EntitySet::for_collection(collection.clone()),
            Some(Target::Model(model)) => EntitySet::new(model.clone()),
            None => EntitySet::new(ModelDef::unresolved()),
        };
        for entity in matched {
            set.add(entity, AddPolicy::Ignore);
        }
        Related::Many(set)
    } else {
        let entity = matched.next().unwrap_or_else(|| {
            Entity::placeholder(
                target
                    .map(|t| t.model().clone())
                    .unwrap_or_else(ModelDef::unresolved),
            )
        });
        Related::One(Box::new(entity))
    }
}

/// Key of `column` on an owner; a missing key is recovered and skipped
fn recover_key(owner: &Entity, column: &str) -> Option<KeyValue> {
    match owner.require_key(column) {
        Ok(key) => Some(key),
        Err(err) if err.is_recoverable() => {
            tracing::debug!("Skipping owner: {}", err);
            None
        }
        Err(_) => None,
    }
}

fn collect_keys(owners: &[&Entity], column: &str) -> Vec<KeyValue> {
    distinct(owners.iter().filter_map(|owner| recover_key(owner, column)))
}

fn distinct<I: IntoIterator<Item = KeyValue>>(keys: I) -> Vec<KeyValue> {
    let mut seen = std::collections::HashSet::new();
    keys.into_iter().filter(|key| seen.insert(key.clone())).collect()
}

fn row_key(row: &Row, column: &str) -> Option<KeyValue> {
    row.get(column).and_then(KeyValue::from_json)
}

fn discriminator(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
