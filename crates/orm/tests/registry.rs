mod fixtures;

use std::sync::Arc;

use relata_orm::{
    global_registry, CollectionDef, EagerLoadConfig, Entity, MemoryExecutor, ModelDef, ModelError,
    Orm, Related, RelationDecl, RelationKind, TypeRegistry,
};
use serde_json::json;

#[tokio::test]
async fn test_forward_references_resolve_at_load_time() {
    let registry = TypeRegistry::new();
    // "Child" is not registered yet
    let parent = ModelDef::new("parents")
        .relation("children", RelationDecl::has_many("Child"))
        .build()
        .unwrap();
    registry.register_model("Parent", parent.clone()).unwrap();

    let executor = Arc::new(MemoryExecutor::new());
    executor
        .seed("children", vec![json!({"id": 1, "parent_id": 7})])
        .await
        .unwrap();
    let orm = Orm::new(executor.clone(), registry.clone());

    let mut owner = Entity::new(parent).with("id", 7);
    assert!(matches!(
        orm.load(&mut owner, &["children"]).await,
        Err(ModelError::UnresolvedName { ref name, .. }) if name == "Child"
    ));

    registry
        .register_model("Child", ModelDef::new("children").build().unwrap())
        .unwrap();
    orm.load(&mut owner, &["children"]).await.unwrap();
    let children = owner.related("children").and_then(Related::as_many).unwrap();
    assert_eq!(children.len(), 1);
}

#[test]
fn test_conflict_and_identical_reregistration() {
    let registry = fixtures::registry();
    let site = registry.resolve_model("Site").unwrap();
    assert!(registry.register_model("Site", site).is_ok());

    let other = ModelDef::new("sites").build().unwrap();
    assert!(matches!(
        registry.register_model("Site", other),
        Err(ModelError::Conflict { kind: "model", .. })
    ));

    let posts = CollectionDef::new(registry.resolve_model("Post").unwrap());
    assert!(matches!(
        registry.register_collection("Post", posts),
        Err(ModelError::Conflict { kind: "collection", .. })
    ));
}

#[test]
fn test_to_many_relations_prefer_collections() {
    let registry = fixtures::registry();
    let many = registry
        .resolve(&"Post".into(), RelationKind::HasMany)
        .unwrap();
    assert!(many.collection().is_some());
    let one = registry
        .resolve(&"Post".into(), RelationKind::BelongsTo)
        .unwrap();
    assert!(one.collection().is_none());
    assert_eq!(many.table_name(), one.table_name());
}

#[test]
fn test_global_registry_is_shared() {
    let def = ModelDef::new("global_widgets").build().unwrap();
    global_registry()
        .register_model("GlobalWidget", def.clone())
        .unwrap();
    let found = global_registry().model("GlobalWidget").unwrap();
    assert!(Arc::ptr_eq(&found, &def));
    global_registry().unregister_model("GlobalWidget");
}

#[test]
fn test_invalid_config_is_rejected() {
    let orm = Orm::new(Arc::new(MemoryExecutor::new()), TypeRegistry::new());
    assert!(matches!(
        orm.with_config(EagerLoadConfig::default().max_batch_size(0)),
        Err(ModelError::Configuration(_))
    ));
}
