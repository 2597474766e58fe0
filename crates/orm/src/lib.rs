//! # relata-orm: relations and batched eager loading
//!
//! Models are declared as data: a [`ModelDef`] names a table, its id
//! attribute and its relations. Entities carry JSON attributes and whatever
//! relations have been loaded onto them.
//!
//! Relations are resolved against a [`TypeRegistry`] by name, so definitions
//! may refer to each other before both exist. Loading is batched per depth:
//! for any set of owners, one relation costs one query (two over a pivot or
//! intermediate table, one per discriminator for `morphTo`).

pub mod backends;
pub mod database;
pub mod error;
pub mod loading;
pub mod model;
pub mod orm;
pub mod query;
pub mod relationships;

pub use backends::{MemoryExecutor, PostgresExecutor, QueryExecutor, Row};
pub use database::{create_database_pool, create_database_pool_with_config, PoolConfig};
pub use error::{ModelError, ModelResult, OrmError, OrmResult};
pub use loading::{EagerLoadConfig, EagerLoadStats, EagerLoader, EagerTree};
pub use model::{AddPolicy, CollectionDef, Entity, EntitySet, KeyValue, ModelDef, Related, Target};
pub use orm::{FetchOptions, Orm};
pub use query::QueryBuilder;
pub use relationships::{
    global_registry, PivotTarget, Relation, RelationDecl, RelationDescriptor, RelationKind,
    TypeRef, TypeRegistry,
};
