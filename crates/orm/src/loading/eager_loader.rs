//! Eager Loader - breadth-first loading of relation trees
//!
//! Each depth of the [`EagerTree`] is one round: every relation at that depth
//! is fetched (concurrently when enabled) for all owners reached so far, then
//! associated. Owners of different models at the same path are grouped and
//! resolved separately, which is what lets paths continue past a `morphTo`.

use std::sync::Arc;
use std::time::Instant;

use super::config::EagerLoadConfig;
use super::eager_tree::{EagerNode, EagerTree};
use crate::backends::QueryExecutor;
use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, ModelDef, Related};
use crate::relationships::descriptor::RelationDescriptor;
use crate::relationships::registry::TypeRegistry;
use crate::relationships::resolver::{run_all, RelationResolver, ResolveOptions};

/// Statistics about an eager loading operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EagerLoadStats {
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
    /// Number of queries executed
    pub query_count: usize,
    /// Total related records loaded
    pub records_loaded: usize,
    /// Number of relation levels loaded
    pub depth_loaded: usize,
    /// Number of (relation, owner model) fetches performed
    pub relations_loaded: usize,
}

struct PlannedFetch {
    owner_path: Vec<String>,
    model: Arc<ModelDef>,
    descriptor: RelationDescriptor,
}

/// Loads relation trees onto root entities
pub struct EagerLoader<'a> {
    resolver: RelationResolver<'a>,
    registry: &'a TypeRegistry,
    config: &'a EagerLoadConfig,
}

impl<'a> EagerLoader<'a> {
    pub fn new(
        executor: &'a dyn QueryExecutor,
        registry: &'a TypeRegistry,
        config: &'a EagerLoadConfig,
        options: ResolveOptions,
    ) -> Self {
        Self {
            resolver: RelationResolver::new(executor, registry, config, options),
            registry,
            config,
        }
    }

    /// Load every path of `tree` onto `roots`.
    ///
    /// Fails as a whole on the first storage or resolution error; entities
    /// already associated at shallower depths keep their results.
    pub async fn load(&self, roots: &mut [Entity], tree: &EagerTree) -> ModelResult<EagerLoadStats> {
        let started = Instant::now();
        let mut stats = EagerLoadStats::default();

        if tree.depth() > self.config.max_depth {
            return Err(ModelError::Configuration(format!(
                "Relation path depth {} exceeds the maximum of {}",
                tree.depth(),
                self.config.max_depth
            )));
        }

        let mut frontier: Vec<(Vec<String>, &EagerNode)> = tree
            .root()
            .children()
            .map(|(name, node)| (vec![name.to_string()], node))
            .collect();

        while !frontier.is_empty() {
            stats.depth_loaded += 1;
            let planned = self.plan(roots, &frontier)?;
            tracing::debug!(
                "Eager loading depth {}: {} relation fetch(es)",
                stats.depth_loaded,
                planned.len()
            );

            let fetched = {
                let shared: &[Entity] = roots;
                let owner_sets: Vec<Vec<&Entity>> = planned
                    .iter()
                    .map(|p| owners_of_model(shared, &p.owner_path, &p.model))
                    .collect();
                let futures = planned
                    .iter()
                    .zip(owner_sets.iter())
                    .map(|(p, owners)| self.resolver.fetch(&p.descriptor, owners))
                    .collect::<Vec<_>>();
                run_all(self.config.enable_parallelism, futures).await?
            };

            for (p, result) in planned.iter().zip(fetched) {
                stats.query_count += result.query_count();
                stats.records_loaded += result.record_count();
                stats.relations_loaded += 1;

                let mut owners = Vec::new();
                collect_owners_mut(roots, &p.owner_path, &mut owners);
                owners.retain(|owner| Arc::ptr_eq(owner.def(), &p.model));
                self.resolver.associate(&p.descriptor, result, &mut owners);
            }

            frontier = frontier
                .iter()
                .flat_map(|(path, node)| {
                    node.children().map(move |(name, child)| {
                        let mut child_path = path.clone();
                        child_path.push(name.to_string());
                        (child_path, child)
                    })
                })
                .collect();
        }

        stats.execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            "Eager load finished: {} queries, {} records, depth {}",
            stats.query_count,
            stats.records_loaded,
            stats.depth_loaded
        );
        Ok(stats)
    }

    /// Resolve a descriptor for every (node, owner model) pair at one depth
    fn plan(
        &self,
        roots: &[Entity],
        frontier: &[(Vec<String>, &EagerNode)],
    ) -> ModelResult<Vec<PlannedFetch>> {
        let mut planned = Vec::new();
        for (path, _) in frontier {
            let Some((relation, owner_path)) = path.split_last() else {
                continue;
            };

            let mut owners = Vec::new();
            collect_owners(roots, owner_path, &mut owners);

            let mut models: Vec<Arc<ModelDef>> = Vec::new();
            for owner in owners {
                if !models.iter().any(|m| Arc::ptr_eq(m, owner.def())) {
                    models.push(owner.def().clone());
                }
            }

            for model in models {
                let descriptor = RelationDescriptor::build(&model, relation, self.registry)?;
                planned.push(PlannedFetch {
                    owner_path: owner_path.to_vec(),
                    model,
                    descriptor,
                });
            }
        }
        Ok(planned)
    }
}

fn owners_of_model<'e>(roots: &'e [Entity], path: &[String], model: &Arc<ModelDef>) -> Vec<&'e Entity> {
    let mut owners = Vec::new();
    collect_owners(roots, path, &mut owners);
    owners.retain(|owner| Arc::ptr_eq(owner.def(), model));
    owners
}

/// Entities reached by following `path` from `roots`, placeholders excluded
fn collect_owners<'e>(roots: &'e [Entity], path: &[String], out: &mut Vec<&'e Entity>) {
    for root in roots {
        match path.split_first() {
            None => {
                if !root.is_placeholder() {
                    out.push(root);
                }
            }
            Some((head, rest)) => match root.related(head) {
                Some(Related::One(entity)) => {
                    collect_owners(std::slice::from_ref(entity.as_ref()), rest, out)
                }
                Some(Related::Many(set)) => collect_owners(set.as_slice(), rest, out),
                None => {}
            },
        }
    }
}

fn collect_owners_mut<'e>(roots: &'e mut [Entity], path: &[String], out: &mut Vec<&'e mut Entity>) {
    for root in roots.iter_mut() {
        match path.split_first() {
            None => {
                if !root.is_placeholder() {
                    out.push(root);
                }
            }
            Some((head, rest)) => {
                if let Some(related) = root.related_mut(head) {
                    collect_owners_mut(related.entities_mut(), rest, out);
                }
            }
        }
    }
}
