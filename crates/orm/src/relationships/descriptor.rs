//! Relation descriptors: declarations resolved against the registry
//!
//! A descriptor fixes everything a load needs: the concrete target, every key
//! column (defaults filled in) and the query strategy. Descriptors are built
//! per call, so a relation naming a model registered later still resolves.

use std::sync::Arc;

use super::metadata::{RelationDecl, RelationKind, TypeRef};
use super::registry::TypeRegistry;
use crate::error::{ModelError, ModelResult};
use crate::model::{KeyValue, ModelDef, Target};
use crate::query::QueryBuilder;

/// Owner and target joined over a pivot table or an intermediate model.
///
/// Loading runs two queries: link rows where `link_key` is in the owners'
/// `owner_key` values, then targets where `target_key` is in the links'
/// `hop_key` values.
#[derive(Debug, Clone)]
pub struct LinkPlan {
    pub table: String,
    /// Pivot definition, or the intermediate model for `through`
    pub model: Arc<ModelDef>,
    pub owner_key: String,
    pub link_key: String,
    pub hop_key: String,
    pub target_key: String,
    /// Extra pivot columns carried onto each target's pivot
    pub pivot_columns: Vec<String>,
    pub through: bool,
}

impl LinkPlan {
    /// Columns copied from a link row onto the pivot entity
    pub fn pivot_attributes(&self) -> Vec<&str> {
        let mut columns = vec![self.link_key.as_str(), self.hop_key.as_str()];
        for column in &self.pivot_columns {
            if !columns.contains(&column.as_str()) {
                columns.push(column);
            }
        }
        columns
    }
}

/// Inverse polymorphic relation over a discriminator column
#[derive(Debug, Clone)]
pub struct MorphToPlan {
    pub type_column: String,
    pub id_column: String,
    /// Declared candidates, resolved only when a discriminator is mapped
    pub candidates: Vec<TypeRef>,
}

impl MorphToPlan {
    /// Map a discriminator value to a target.
    ///
    /// Candidates match on table name or registry name. Without candidates
    /// the value itself is looked up in the registry. Candidates that are not
    /// registered never match.
    pub fn target_for(&self, discriminator: &str, registry: &TypeRegistry) -> Option<Target> {
        if self.candidates.is_empty() {
            return registry
                .lookup(discriminator, RelationKind::MorphTo)
                .into_target();
        }
        self.candidates.iter().find_map(|type_ref| {
            let target = match registry.resolve(type_ref, RelationKind::MorphTo) {
                Ok(target) => target,
                Err(err) => {
                    tracing::trace!("Skipping morph candidate: {}", err);
                    return None;
                }
            };
            (target.table_name() == discriminator || type_ref.name() == Some(discriminator))
                .then_some(target)
        })
    }

    pub fn plan_query(&self, target: &Target, ids: &[KeyValue]) -> QueryBuilder {
        QueryBuilder::new()
            .from(target.table_name())
            .where_in(target.model().id_attribute(), ids.to_vec())
    }
}

/// How a relation's rows are fetched and matched to owners
#[derive(Debug, Clone)]
pub enum Strategy {
    /// `owner.owner_key = target.target_key`, optionally filtered by a
    /// discriminator column/value pair
    Direct {
        owner_key: String,
        target_key: String,
        morph_filter: Option<(String, String)>,
    },
    Linked(LinkPlan),
    MorphTo(MorphToPlan),
}

/// A relation resolved for one owner model
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    pub name: String,
    pub kind: RelationKind,
    pub owner: Arc<ModelDef>,
    /// Static target; `None` for `morphTo`
    pub target: Option<Target>,
    pub strategy: Strategy,
    pub constraints: Option<QueryBuilder>,
}

impl RelationDescriptor {
    /// Resolve relation `name` declared on `owner`
    pub fn build(owner: &Arc<ModelDef>, name: &str, registry: &TypeRegistry) -> ModelResult<Self> {
        let decl = owner.require_relation(name)?;
        decl.validate()?;

        let descriptor = match decl.kind {
            RelationKind::MorphTo => Self::build_morph_to(owner, name, decl)?,
            kind => {
                let target_ref = decl.target.as_ref().ok_or_else(|| {
                    ModelError::Configuration(format!("Relation '{}' has no target", name))
                })?;
                let target = registry.resolve(target_ref, kind)?;
                let strategy = match decl.through {
                    Some(ref through) => {
                        let intermediate = registry
                            .resolve(&through.target, RelationKind::BelongsTo)?
                            .model()
                            .clone();
                        Self::through_strategy(owner, decl, &target, intermediate)?
                    }
                    None => Self::direct_strategy(owner, decl, &target)?,
                };
                RelationDescriptor {
                    name: name.to_string(),
                    kind,
                    owner: owner.clone(),
                    target: Some(target),
                    strategy,
                    constraints: decl.constraints.clone(),
                }
            }
        };

        tracing::trace!(
            "Resolved {}.{} ({}) -> {}",
            owner.table_name(),
            name,
            descriptor.kind,
            descriptor.target_table().unwrap_or("<polymorphic>")
        );
        Ok(descriptor)
    }

    fn build_morph_to(
        owner: &Arc<ModelDef>,
        name: &str,
        decl: &RelationDecl,
    ) -> ModelResult<Self> {
        let morph = decl.morph.as_ref().ok_or_else(|| {
            ModelError::Configuration(format!("morphTo relation '{}' has no morph name", name))
        })?;
        Ok(RelationDescriptor {
            name: name.to_string(),
            kind: RelationKind::MorphTo,
            owner: owner.clone(),
            target: None,
            strategy: Strategy::MorphTo(MorphToPlan {
                type_column: morph.type_column(),
                id_column: morph.id_column(),
                candidates: morph.candidates.clone(),
            }),
            constraints: decl.constraints.clone(),
        })
    }

    fn direct_strategy(
        owner: &Arc<ModelDef>,
        decl: &RelationDecl,
        target: &Target,
    ) -> ModelResult<Strategy> {
        let target_model = target.model();
        let strategy = match decl.kind {
            RelationKind::BelongsTo => Strategy::Direct {
                owner_key: decl
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| target_model.default_foreign_key()),
                target_key: decl
                    .other_key
                    .clone()
                    .unwrap_or_else(|| target_model.id_attribute().to_string()),
                morph_filter: None,
            },
            RelationKind::HasOne | RelationKind::HasMany => Strategy::Direct {
                owner_key: decl
                    .other_key
                    .clone()
                    .unwrap_or_else(|| owner.id_attribute().to_string()),
                target_key: decl
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| owner.default_foreign_key()),
                morph_filter: None,
            },
            RelationKind::MorphOne | RelationKind::MorphMany => {
                let morph = decl.morph.as_ref().ok_or_else(|| {
                    ModelError::Configuration("Polymorphic relation has no morph name".to_string())
                })?;
                let value = morph
                    .value
                    .clone()
                    .unwrap_or_else(|| owner.table_name().to_string());
                Strategy::Direct {
                    owner_key: owner.id_attribute().to_string(),
                    target_key: morph.id_column(),
                    morph_filter: Some((morph.type_column(), value)),
                }
            }
            RelationKind::BelongsToMany => {
                let table = decl
                    .pivot_table
                    .clone()
                    .unwrap_or_else(|| join_table_name(owner.table_name(), target_model.table_name()));
                Strategy::Linked(LinkPlan {
                    model: ModelDef::new(&table).build()?,
                    table,
                    owner_key: owner.id_attribute().to_string(),
                    link_key: decl
                        .foreign_key
                        .clone()
                        .unwrap_or_else(|| owner.default_foreign_key()),
                    hop_key: decl
                        .other_key
                        .clone()
                        .unwrap_or_else(|| target_model.default_foreign_key()),
                    target_key: target_model.id_attribute().to_string(),
                    pivot_columns: decl.pivot_columns.clone(),
                    through: false,
                })
            }
            RelationKind::MorphTo => {
                return Err(ModelError::Configuration(
                    "morphTo has no static target".to_string(),
                ))
            }
        };
        Ok(strategy)
    }

    fn through_strategy(
        owner: &Arc<ModelDef>,
        decl: &RelationDecl,
        target: &Target,
        intermediate: Arc<ModelDef>,
    ) -> ModelResult<Strategy> {
        let through = decl.through.as_ref().ok_or_else(|| {
            ModelError::Configuration("Relation is not routed through a model".to_string())
        })?;
        let target_model = target.model();

        let plan = match decl.kind {
            RelationKind::BelongsTo => LinkPlan {
                table: intermediate.table_name().to_string(),
                owner_key: through
                    .foreign_key
                    .clone()
                    .or_else(|| decl.foreign_key.clone())
                    .unwrap_or_else(|| intermediate.default_foreign_key()),
                link_key: intermediate.id_attribute().to_string(),
                hop_key: through
                    .other_key
                    .clone()
                    .unwrap_or_else(|| target_model.default_foreign_key()),
                target_key: target_model.id_attribute().to_string(),
                model: intermediate,
                pivot_columns: Vec::new(),
                through: true,
            },
            RelationKind::HasOne | RelationKind::HasMany => LinkPlan {
                table: intermediate.table_name().to_string(),
                owner_key: owner.id_attribute().to_string(),
                link_key: through
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| owner.default_foreign_key()),
                hop_key: intermediate.id_attribute().to_string(),
                target_key: through
                    .other_key
                    .clone()
                    .or_else(|| decl.foreign_key.clone())
                    .unwrap_or_else(|| intermediate.default_foreign_key()),
                model: intermediate,
                pivot_columns: Vec::new(),
                through: true,
            },
            RelationKind::BelongsToMany => LinkPlan {
                table: intermediate.table_name().to_string(),
                owner_key: owner.id_attribute().to_string(),
                link_key: through
                    .foreign_key
                    .clone()
                    .or_else(|| decl.foreign_key.clone())
                    .unwrap_or_else(|| owner.default_foreign_key()),
                hop_key: through
                    .other_key
                    .clone()
                    .or_else(|| decl.other_key.clone())
                    .unwrap_or_else(|| target_model.default_foreign_key()),
                target_key: target_model.id_attribute().to_string(),
                model: intermediate,
                pivot_columns: decl.pivot_columns.clone(),
                through: true,
            },
            kind => {
                return Err(ModelError::Configuration(format!(
                    "Relation of kind {} cannot be routed through another model",
                    kind
                )))
            }
        };
        Ok(Strategy::Linked(plan))
    }

    pub fn target_table(&self) -> Option<&str> {
        self.target.as_ref().map(Target::table_name)
    }

    /// Column on the owner whose values drive the first query
    pub fn owner_key(&self) -> &str {
        match self.strategy {
            Strategy::Direct { ref owner_key, .. } => owner_key,
            Strategy::Linked(ref link) => &link.owner_key,
            Strategy::MorphTo(ref morph) => &morph.id_column,
        }
    }

    pub fn link(&self) -> Option<&LinkPlan> {
        match self.strategy {
            Strategy::Linked(ref link) => Some(link),
            _ => None,
        }
    }

    /// First query for a batch of owner keys.
    ///
    /// Direct relations select the targets; linked relations select the
    /// pivot or intermediate rows.
    pub fn plan_query(&self, owner_keys: &[KeyValue]) -> ModelResult<QueryBuilder> {
        match self.strategy {
            Strategy::Direct {
                ref target_key,
                ref morph_filter,
                ..
            } => {
                let table = self.target_table().unwrap_or_default();
                let mut query = QueryBuilder::new()
                    .from(table)
                    .where_in(target_key, owner_keys.to_vec());
                if let Some((column, value)) = morph_filter {
                    query = query.where_eq(column, value.as_str());
                }
                Ok(self.constrain(query))
            }
            Strategy::Linked(ref link) => Ok(QueryBuilder::new()
                .from(&link.table)
                .where_in(&link.link_key, owner_keys.to_vec())),
            Strategy::MorphTo(_) => Err(ModelError::Configuration(format!(
                "morphTo relation '{}' is planned per discriminator",
                self.name
            ))),
        }
    }

    /// Second query of a linked relation, keyed by the links' hop values
    pub fn plan_target_query(&self, hop_keys: &[KeyValue]) -> ModelResult<QueryBuilder> {
        match (&self.strategy, self.target_table()) {
            (Strategy::Linked(link), Some(table)) => Ok(self.constrain(
                QueryBuilder::new()
                    .from(table)
                    .where_in(&link.target_key, hop_keys.to_vec()),
            )),
            _ => Err(ModelError::Configuration(format!(
                "Relation '{}' has no second query",
                self.name
            ))),
        }
    }

    fn constrain(&self, query: QueryBuilder) -> QueryBuilder {
        match self.constraints {
            Some(ref constraints) => query.merge_constraints(constraints),
            None => query,
        }
    }
}

/// Default join table: both table names sorted and joined with `_`
pub fn join_table_name(a: &str, b: &str) -> String {
    let mut tables = [a, b];
    tables.sort_unstable();
    tables.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (TypeRegistry, Arc<ModelDef>) {
        let registry = TypeRegistry::new();
        let site = ModelDef::new("sites")
            .relation("authors", RelationDecl::has_many("Author"))
            .relation("admins", RelationDecl::belongs_to_many("Admin").with_pivot(["item"]))
            .relation("photos", RelationDecl::morph_many("Photo", "imageable"))
            .relation("posts", RelationDecl::has_many("Post").through("Blog"))
            .build()
            .unwrap();
        registry.register_model("Site", site.clone()).unwrap();
        registry
            .register_model("Author", ModelDef::new("authors").build().unwrap())
            .unwrap();
        registry
            .register_model("Admin", ModelDef::new("admins").build().unwrap())
            .unwrap();
        registry
            .register_model("Photo", ModelDef::new("photos").build().unwrap())
            .unwrap();
        registry
            .register_model("Blog", ModelDef::new("blogs").build().unwrap())
            .unwrap();
        registry
            .register_model("Post", ModelDef::new("posts").build().unwrap())
            .unwrap();
        (registry, site)
    }

    #[test]
    fn test_join_table_name() {
        assert_eq!(join_table_name("sites", "admins"), "admins_sites");
        assert_eq!(join_table_name("admins", "sites"), "admins_sites");
    }

    #[test]
    fn test_has_many_defaults() {
        let (registry, site) = registry();
        let descriptor = RelationDescriptor::build(&site, "authors", &registry).unwrap();
        match descriptor.strategy {
            Strategy::Direct {
                ref owner_key,
                ref target_key,
                ..
            } => {
                assert_eq!(owner_key, "id");
                assert_eq!(target_key, "site_id");
            }
            _ => panic!("expected a direct strategy"),
        }
        let query = descriptor.plan_query(&[KeyValue::Integer(1)]).unwrap();
        assert_eq!(query.to_sql(), "SELECT * FROM authors WHERE site_id IN ($1)");
    }

    #[test]
    fn test_belongs_to_many_defaults() {
        let (registry, site) = registry();
        let descriptor = RelationDescriptor::build(&site, "admins", &registry).unwrap();
        let link = descriptor.link().unwrap();
        assert_eq!(link.table, "admins_sites");
        assert_eq!(link.link_key, "site_id");
        assert_eq!(link.hop_key, "admin_id");
        assert_eq!(link.pivot_attributes(), vec!["site_id", "admin_id", "item"]);
    }

    #[test]
    fn test_morph_many_filters_on_owner_table() {
        let (registry, site) = registry();
        let descriptor = RelationDescriptor::build(&site, "photos", &registry).unwrap();
        let query = descriptor.plan_query(&[KeyValue::Integer(1)]).unwrap();
        assert_eq!(
            query.to_sql(),
            "SELECT * FROM photos WHERE imageable_id IN ($1) AND imageable_type = $2"
        );
    }

    #[test]
    fn test_has_many_through_keys() {
        let (registry, site) = registry();
        let descriptor = RelationDescriptor::build(&site, "posts", &registry).unwrap();
        let link = descriptor.link().unwrap();
        assert!(link.through);
        assert_eq!(link.table, "blogs");
        assert_eq!(link.link_key, "site_id");
        assert_eq!(link.hop_key, "id");
        assert_eq!(link.target_key, "blog_id");
    }

    #[test]
    fn test_unknown_relation() {
        let (registry, site) = registry();
        assert!(matches!(
            RelationDescriptor::build(&site, "nope", &registry),
            Err(ModelError::UndefinedRelation { .. })
        ));
    }

    #[test]
    fn test_morph_to_candidates_resolve_lazily() {
        let (registry, _) = registry();
        let photo = ModelDef::new("photos")
            .relation("imageable", RelationDecl::morph_to("imageable", ["Site", "User"]))
            .build()
            .unwrap();
        let descriptor = RelationDescriptor::build(&photo, "imageable", &registry).unwrap();
        let Strategy::MorphTo(ref morph) = descriptor.strategy else {
            panic!("expected a morphTo strategy");
        };

        let site = morph.target_for("sites", &registry).unwrap();
        assert_eq!(site.table_name(), "sites");
        assert!(morph.target_for("User", &registry).is_none());
        assert!(morph.target_for("users", &registry).is_none());
    }

    #[test]
    fn test_unregistered_target() {
        let registry = TypeRegistry::new();
        let site = ModelDef::new("sites")
            .relation("authors", RelationDecl::has_many("Author"))
            .build()
            .unwrap();
        assert!(matches!(
            RelationDescriptor::build(&site, "authors", &registry),
            Err(ModelError::UnresolvedName { .. })
        ));
    }
}
