//! Relationships Module - relation metadata, type resolution and loading
//!
//! Declarations ([`RelationDecl`]) live on model definitions. They are turned
//! into [`RelationDescriptor`]s against a [`TypeRegistry`] at load time, then
//! fetched and associated by the [`RelationResolver`].

pub mod descriptor;
pub mod metadata;
pub mod pivot;
pub mod registry;
pub mod relation;
pub mod resolver;

pub use descriptor::{join_table_name, LinkPlan, MorphToPlan, RelationDescriptor, Strategy};
pub use metadata::{MorphConfig, RelationDecl, RelationKind, ThroughConfig, TypeRef};
pub use pivot::{PivotSynchronizer, PivotTarget};
pub use registry::{global_registry, RegistryStats, Resolution, TypeRegistry};
pub use relation::Relation;
pub use resolver::{Fetched, RelationResolver, ResolveOptions};
