//! ORM facade: fetching, eager loading and relation access
//!
//! [`Orm`] ties an executor, a type registry and loader configuration
//! together. Every entry point that loads relations goes through the same
//! breadth-first [`EagerLoader`].

use std::sync::Arc;

use crate::backends::{fetch_with_timeout, QueryExecutor};
use crate::error::{ModelError, ModelResult};
use crate::loading::{EagerLoadConfig, EagerLoadStats, EagerLoader, EagerTree};
use crate::model::{persist, AddPolicy, Entity, EntitySet};
use crate::query::QueryBuilder;
use crate::relationships::descriptor::RelationDescriptor;
use crate::relationships::metadata::{RelationKind, TypeRef};
use crate::relationships::registry::TypeRegistry;
use crate::relationships::relation::Relation;
use crate::relationships::resolver::ResolveOptions;

/// Options for fetch calls
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Relation paths to eager load onto the result
    pub with_related: Vec<String>,
    /// Fail with `NotFound` instead of returning nothing
    pub require: bool,
    /// Override the configured strict morph behavior
    pub strict: Option<bool>,
    /// Attach pivot records to entities loaded over a pivot table
    pub include_pivot: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            with_related: Vec::new(),
            require: false,
            strict: None,
            include_pivot: true,
        }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Eager load these relation paths
    pub fn with_related<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_related.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn require(mut self, require: bool) -> Self {
        self.require = require;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn include_pivot(mut self, include: bool) -> Self {
        self.include_pivot = include;
        self
    }
}

/// Entry point for loading entities and their relations
#[derive(Clone)]
pub struct Orm {
    executor: Arc<dyn QueryExecutor>,
    registry: TypeRegistry,
    config: EagerLoadConfig,
}

impl std::fmt::Debug for Orm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orm")
            .field("registry", &self.registry.stats())
            .field("config", &self.config)
            .finish()
    }
}

impl Orm {
    pub fn new(executor: Arc<dyn QueryExecutor>, registry: TypeRegistry) -> Self {
        Self {
            executor,
            registry,
            config: EagerLoadConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EagerLoadConfig) -> ModelResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        self.executor.as_ref()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EagerLoadConfig {
        &self.config
    }

    pub(crate) fn resolve_options(&self, options: &FetchOptions) -> ResolveOptions {
        ResolveOptions {
            strict: options.strict.unwrap_or(self.config.strict_morph),
            include_pivot: options.include_pivot,
        }
    }

    /// Fetch the first row matching the entity's set attributes
    pub async fn fetch(&self, entity: &Entity, options: FetchOptions) -> ModelResult<Option<Entity>> {
        let def = entity.def().clone();
        let mut query = QueryBuilder::new().from(def.table_name());
        for (column, value) in entity.attributes() {
            if !value.is_null() {
                query = query.where_eq(column, value.clone());
            }
        }
        query = query.limit(1);

        let rows = fetch_with_timeout(self.executor(), &query, self.config.query_timeout()).await?;
        let Some(row) = rows.into_iter().next() else {
            if options.require {
                return Err(ModelError::NotFound(def.table_name().to_string()));
            }
            tracing::debug!("No {} row matched", def.table_name());
            return Ok(None);
        };

        let mut found = Entity::from_row(def, row);
        if !options.with_related.is_empty() {
            self.fetch_eager(std::slice::from_mut(&mut found), options.with_related.as_slice(), &options)
                .await?;
        }
        Ok(Some(found))
    }

    /// Fetch all rows of a model or collection matching `constraints`
    pub async fn fetch_all(
        &self,
        target: impl Into<TypeRef>,
        constraints: QueryBuilder,
        options: FetchOptions,
    ) -> ModelResult<EntitySet> {
        let target = self.registry.resolve(&target.into(), RelationKind::HasMany)?;
        let model = target.model().clone();
        let query = QueryBuilder::new()
            .from(model.table_name())
            .merge_constraints(&constraints);

        let rows = fetch_with_timeout(self.executor(), &query, self.config.query_timeout()).await?;
        if rows.is_empty() && options.require {
            return Err(ModelError::NotFound(model.table_name().to_string()));
        }

        let mut set = match target.collection() {
            Some(collection) => EntitySet::for_collection(collection.clone()),
            None => EntitySet::new(model.clone()),
        };
        for row in rows {
            set.add(Entity::from_row(model.clone(), row), AddPolicy::Ignore);
        }

        if !options.with_related.is_empty() {
            self.fetch_eager(set.as_mut_slice(), options.with_related.as_slice(), &options)
                .await?;
        }
        Ok(set)
    }

    /// Eager load relation paths onto existing roots
    pub async fn fetch_eager<S: AsRef<str>>(
        &self,
        roots: &mut [Entity],
        paths: &[S],
        options: &FetchOptions,
    ) -> ModelResult<EagerLoadStats> {
        let tree = EagerTree::parse(paths.iter().map(AsRef::as_ref))?;
        if tree.is_empty() {
            return Ok(EagerLoadStats::default());
        }
        let loader = EagerLoader::new(
            self.executor(),
            &self.registry,
            &self.config,
            self.resolve_options(options),
        );
        loader.load(roots, &tree).await
    }

    /// Load relation paths onto one entity
    pub async fn load<S: AsRef<str>>(&self, entity: &mut Entity, paths: &[S]) -> ModelResult<EagerLoadStats> {
        self.fetch_eager(std::slice::from_mut(entity), paths, &FetchOptions::default())
            .await
    }

    /// Load relation paths onto every entity of a set
    pub async fn load_all<S: AsRef<str>>(
        &self,
        set: &mut EntitySet,
        paths: &[S],
    ) -> ModelResult<EagerLoadStats> {
        self.fetch_eager(set.as_mut_slice(), paths, &FetchOptions::default())
            .await
    }

    /// Relation `name` of `owner`, bound for fetching and pivot mutations
    pub fn related<'a>(&'a self, owner: &'a mut Entity, name: &str) -> ModelResult<Relation<'a>> {
        let descriptor = RelationDescriptor::build(owner.def(), name, &self.registry)?;
        Ok(Relation::new(self, owner, descriptor))
    }

    /// Insert or update an entity
    pub async fn save(&self, entity: &mut Entity) -> ModelResult<()> {
        persist::save(self.executor(), entity, self.config.query_timeout()).await
    }
}
