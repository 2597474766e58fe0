//! Type Registry - Name-based lookup of model and collection definitions
//!
//! Relations may name their targets instead of holding them, which is how two
//! models refer to each other before both exist. Models and collections live
//! in separate tables, so one name can denote a model and a collection at once.

use std::sync::Arc;

use dashmap::DashMap;

use super::metadata::{RelationKind, TypeRef};
use crate::error::{ModelError, ModelResult};
use crate::model::definition::prefers_collection;
use crate::model::{CollectionDef, ModelDef, Target};

/// Outcome of a registry lookup
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Target),
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn into_target(self) -> Option<Target> {
        match self {
            Resolution::Found(target) => Some(target),
            Resolution::NotFound => None,
        }
    }
}

/// Thread-safe registry of named model and collection definitions
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    models: Arc<DashMap<String, Arc<ModelDef>>>,
    collections: Arc<DashMap<String, Arc<CollectionDef>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under `name`.
    ///
    /// Registering the same definition again is a no-op; a different
    /// definition under a taken name is a `Conflict`.
    pub fn register_model(&self, name: &str, def: Arc<ModelDef>) -> ModelResult<Arc<ModelDef>> {
        let entry = self.models.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!("Registered model '{}' ({})", name, def.table_name());
            def.clone()
        });
        if !Arc::ptr_eq(entry.value(), &def) {
            tracing::warn!("Model name '{}' is already registered", name);
            return Err(ModelError::Conflict {
                name: name.to_string(),
                kind: "model",
            });
        }
        Ok(def)
    }

    /// Register a collection under `name`, with the same conflict rules as models
    pub fn register_collection(
        &self,
        name: &str,
        def: Arc<CollectionDef>,
    ) -> ModelResult<Arc<CollectionDef>> {
        let entry = self.collections.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(
                "Registered collection '{}' ({})",
                name,
                def.model().table_name()
            );
            def.clone()
        });
        if !Arc::ptr_eq(entry.value(), &def) {
            tracing::warn!("Collection name '{}' is already registered", name);
            return Err(ModelError::Conflict {
                name: name.to_string(),
                kind: "collection",
            });
        }
        Ok(def)
    }

    pub fn model(&self, name: &str) -> Option<Arc<ModelDef>> {
        self.models.get(name).map(|entry| entry.value().clone())
    }

    pub fn collection(&self, name: &str) -> Option<Arc<CollectionDef>> {
        self.collections.get(name).map(|entry| entry.value().clone())
    }

    /// Look a name up for a relation of the given kind.
    ///
    /// To-many kinds prefer a collection, everything else prefers a model;
    /// either falls back to the other table.
    pub fn lookup(&self, name: &str, kind: RelationKind) -> Resolution {
        let model = || self.model(name).map(Target::Model);
        let collection = || self.collection(name).map(Target::Collection);

        let found = if prefers_collection(kind) {
            collection().or_else(model)
        } else {
            model().or_else(collection)
        };

        match found {
            Some(target) => Resolution::Found(target),
            None => Resolution::NotFound,
        }
    }

    /// Resolve a type reference, failing with `UnresolvedName` for unknown names
    pub fn resolve(&self, type_ref: &TypeRef, kind: RelationKind) -> ModelResult<Target> {
        match type_ref {
            TypeRef::Model(def) => Ok(Target::Model(def.clone())),
            TypeRef::Collection(def) => Ok(Target::Collection(def.clone())),
            TypeRef::Name(name) => match self.lookup(name, kind) {
                Resolution::Found(target) => Ok(target),
                Resolution::NotFound => Err(ModelError::UnresolvedName {
                    name: name.clone(),
                    kind: "model or collection",
                }),
            },
        }
    }

    /// Resolve a model definition by name
    pub fn resolve_model(&self, name: &str) -> ModelResult<Arc<ModelDef>> {
        self.model(name).ok_or_else(|| ModelError::UnresolvedName {
            name: name.to_string(),
            kind: "model",
        })
    }

    pub fn unregister_model(&self, name: &str) -> Option<Arc<ModelDef>> {
        self.models.remove(name).map(|(_, def)| def)
    }

    pub fn unregister_collection(&self, name: &str) -> Option<Arc<CollectionDef>> {
        self.collections.remove(name).map(|(_, def)| def)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            models: self.models.len(),
            collections: self.collections.len(),
        }
    }

    pub fn clear(&self) {
        self.models.clear();
        self.collections.clear();
    }
}

/// Statistics about the type registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub models: usize,
    pub collections: usize,
}

/// Global registry instance for the application
static GLOBAL_REGISTRY: std::sync::OnceLock<TypeRegistry> = std::sync::OnceLock::new();

/// Get the global type registry
pub fn global_registry() -> &'static TypeRegistry {
    GLOBAL_REGISTRY.get_or_init(TypeRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(table: &str) -> Arc<ModelDef> {
        ModelDef::new(table).build().unwrap()
    }

    #[test]
    fn test_registry_creation() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.stats(), RegistryStats { models: 0, collections: 0 });
    }

    #[test]
    fn test_identical_reregistration_is_noop() {
        let registry = TypeRegistry::new();
        let site = model("sites");
        registry.register_model("Site", site.clone()).unwrap();
        assert!(registry.register_model("Site", site.clone()).is_ok());
        assert_eq!(registry.stats().models, 1);
    }

    #[test]
    fn test_conflicting_registration() {
        let registry = TypeRegistry::new();
        registry.register_model("Site", model("sites")).unwrap();
        let err = registry.register_model("Site", model("sites")).unwrap_err();
        assert_eq!(
            err,
            ModelError::Conflict {
                name: "Site".to_string(),
                kind: "model"
            }
        );
    }

    #[test]
    fn test_models_and_collections_are_separate() {
        let registry = TypeRegistry::new();
        let post = model("posts");
        registry.register_model("Posts", post.clone()).unwrap();
        assert!(registry
            .register_collection("Posts", CollectionDef::new(post))
            .is_ok());
        assert_eq!(registry.stats(), RegistryStats { models: 1, collections: 1 });
    }

    #[test]
    fn test_lookup_preference_by_kind() {
        let registry = TypeRegistry::new();
        let post = model("posts");
        registry.register_model("Posts", post.clone()).unwrap();
        registry
            .register_collection("Posts", CollectionDef::new(post))
            .unwrap();

        let to_many = registry.lookup("Posts", RelationKind::HasMany).into_target().unwrap();
        assert!(to_many.collection().is_some());

        let to_one = registry.lookup("Posts", RelationKind::BelongsTo).into_target().unwrap();
        assert!(to_one.collection().is_none());
    }

    #[test]
    fn test_lookup_falls_back_to_collection() {
        let registry = TypeRegistry::new();
        registry
            .register_collection("CRelated", CollectionDef::new(model("related")))
            .unwrap();
        let target = registry.resolve(&"CRelated".into(), RelationKind::HasMany).unwrap();
        assert_eq!(target.table_name(), "related");
    }

    #[test]
    fn test_unresolved_name() {
        let registry = TypeRegistry::new();
        assert!(!registry.lookup("Missing", RelationKind::HasOne).is_found());
        assert!(matches!(
            registry.resolve(&"Missing".into(), RelationKind::HasOne),
            Err(ModelError::UnresolvedName { .. })
        ));
    }

    #[test]
    fn test_registry_clear() {
        let registry = TypeRegistry::new();
        registry.register_model("Site", model("sites")).unwrap();
        registry.clear();
        assert!(registry.model("Site").is_none());
    }
}
