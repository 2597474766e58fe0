//! Shared schema and seed data for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use relata_orm::{
    CollectionDef, Entity, MemoryExecutor, ModelDef, Orm, RelationDecl, TypeRegistry,
};
use serde_json::json;

pub struct Fixture {
    pub orm: Orm,
    pub executor: Arc<MemoryExecutor>,
    pub registry: TypeRegistry,
}

impl Fixture {
    pub fn model(&self, name: &str) -> Arc<ModelDef> {
        self.registry.resolve_model(name).unwrap()
    }

    /// An entity of `model` carrying only its id
    pub fn entity(&self, model: &str, id: i64) -> Entity {
        Entity::new(self.model(model)).with("id", id)
    }
}

pub fn registry() -> TypeRegistry {
    let registry = TypeRegistry::new();

    let site = ModelDef::new("sites")
        .relation("authors", RelationDecl::has_many("Author"))
        .relation("meta", RelationDecl::has_one("SiteMeta"))
        .relation("blogs", RelationDecl::has_many("Blog"))
        .relation("admins", RelationDecl::belongs_to_many("Admin").with_pivot(["item"]))
        .relation("photos", RelationDecl::morph_many("Photo", "imageable"))
        .relation("posts", RelationDecl::has_many("Post").through("Blog"))
        .build()
        .unwrap();
    let meta = ModelDef::new("sitesmeta")
        .relation("site", RelationDecl::belongs_to("Site"))
        .build()
        .unwrap();
    let author = ModelDef::new("authors")
        .relation("site", RelationDecl::belongs_to("Site"))
        .relation("posts", RelationDecl::has_many("Post"))
        .relation("photos", RelationDecl::morph_many("Photo", "imageable"))
        .build()
        .unwrap();
    let blog = ModelDef::new("blogs")
        .relation("site", RelationDecl::belongs_to("Site"))
        .relation("posts", RelationDecl::has_many("Post"))
        .build()
        .unwrap();
    let post = ModelDef::new("posts")
        .relation("blog", RelationDecl::belongs_to("Blog"))
        .relation("author", RelationDecl::belongs_to("Author"))
        .relation("comments", RelationDecl::has_many("Comment"))
        .relation("tags", RelationDecl::belongs_to_many("Tag"))
        .relation("site", RelationDecl::belongs_to("Site").through("Blog"))
        .build()
        .unwrap();
    let comment = ModelDef::new("comments")
        .relation("post", RelationDecl::belongs_to("Post"))
        .build()
        .unwrap();
    let tag = ModelDef::new("tags")
        .relation("posts", RelationDecl::belongs_to_many("Post"))
        .build()
        .unwrap();
    let admin = ModelDef::new("admins")
        .relation("sites", RelationDecl::belongs_to_many("Site").with_pivot(["item"]))
        .build()
        .unwrap();
    let photo = ModelDef::new("photos")
        .relation("imageable", RelationDecl::morph_to("imageable", ["Site", "Author"]))
        .build()
        .unwrap();

    registry.register_model("Site", site).unwrap();
    registry.register_model("SiteMeta", meta).unwrap();
    registry.register_model("Author", author).unwrap();
    registry.register_model("Blog", blog).unwrap();
    registry.register_model("Post", post.clone()).unwrap();
    registry.register_model("Comment", comment).unwrap();
    registry.register_model("Tag", tag).unwrap();
    registry.register_model("Admin", admin).unwrap();
    registry.register_model("Photo", photo).unwrap();
    registry
        .register_collection("Post", CollectionDef::new(post))
        .unwrap();
    registry
}

pub async fn seeded_executor() -> MemoryExecutor {
    let executor = MemoryExecutor::new();
    let tables = vec![
        (
            "sites",
            vec![
                json!({"id": 1, "name": "alpha.example.com"}),
                json!({"id": 2, "name": "beta.example.com"}),
                json!({"id": 3, "name": "gamma.example.com"}),
            ],
        ),
        (
            "sitesmeta",
            vec![
                json!({"id": 1, "site_id": 1, "description": "This is a description for the alpha site"}),
                json!({"id": 2, "site_id": 2, "description": "This is a description for the beta site"}),
            ],
        ),
        (
            "authors",
            vec![
                json!({"id": 1, "site_id": 1, "first_name": "Tim", "last_name": "Walker"}),
                json!({"id": 2, "site_id": 1, "first_name": "Bazooka", "last_name": "Jones"}),
                json!({"id": 3, "site_id": 2, "first_name": "Charlie", "last_name": "Moss"}),
                json!({"id": 4, "site_id": 2, "first_name": "Ron", "last_name": "Hale"}),
            ],
        ),
        (
            "blogs",
            vec![
                json!({"id": 1, "site_id": 1, "name": "Main Site Blog"}),
                json!({"id": 2, "site_id": 1, "name": "Alternate Site Blog"}),
                json!({"id": 3, "site_id": 2, "name": "Main Site Blog"}),
                json!({"id": 4, "site_id": 2, "name": "Alternate Site Blog"}),
            ],
        ),
        (
            "posts",
            vec![
                json!({"id": 1, "owner_id": 1, "author_id": 1, "blog_id": 1, "name": "This is a new Title!"}),
                json!({"id": 2, "owner_id": 2, "author_id": 2, "blog_id": 2, "name": "This is a new Title 2!"}),
                json!({"id": 3, "owner_id": 2, "author_id": 2, "blog_id": 1, "name": "This is a new Title 3!"}),
                json!({"id": 4, "owner_id": 3, "author_id": 3, "blog_id": 3, "name": "This is a new Title 4!"}),
                json!({"id": 5, "owner_id": 4, "author_id": 4, "blog_id": 4, "name": "This is a new Title 5!"}),
            ],
        ),
        (
            "comments",
            vec![
                json!({"id": 1, "post_id": 1, "name": "(blank)", "email": "test@example.com"}),
                json!({"id": 2, "post_id": 1, "name": "Bazooka", "email": "bazooka@example.com"}),
                json!({"id": 3, "post_id": 3, "name": "Charlie", "email": "charlie@example.com"}),
            ],
        ),
        (
            "tags",
            vec![
                json!({"id": 1, "name": "cool"}),
                json!({"id": 2, "name": "boring"}),
                json!({"id": 3, "name": "exciting"}),
            ],
        ),
        (
            "posts_tags",
            vec![
                json!({"id": 1, "post_id": 1, "tag_id": 1}),
                json!({"id": 2, "post_id": 1, "tag_id": 2}),
                json!({"id": 3, "post_id": 2, "tag_id": 3}),
            ],
        ),
        (
            "admins",
            vec![
                json!({"id": 1, "username": "test"}),
                json!({"id": 2, "username": "test2"}),
            ],
        ),
        (
            "admins_sites",
            vec![
                json!({"id": 1, "site_id": 1, "admin_id": 1, "item": "test"}),
                json!({"id": 2, "site_id": 1, "admin_id": 2, "item": "test2"}),
                json!({"id": 3, "site_id": 2, "admin_id": 2, "item": "test"}),
            ],
        ),
        (
            "photos",
            vec![
                json!({"id": 1, "url": "https://img.example.com/photo.png", "caption": "Site photo 1", "imageable_id": 1, "imageable_type": "sites"}),
                json!({"id": 2, "url": "https://img.example.com/photo.png", "caption": "Site photo 2", "imageable_id": 1, "imageable_type": "sites"}),
                json!({"id": 3, "url": "https://img.example.com/photo.png", "caption": "Author photo 1", "imageable_id": 1, "imageable_type": "authors"}),
                json!({"id": 4, "url": "https://img.example.com/photo.png", "caption": "Author photo 2", "imageable_id": 2, "imageable_type": "authors"}),
                json!({"id": 5, "url": "https://img.example.com/photo.png", "caption": "Orphaned photo", "imageable_id": 1, "imageable_type": "users"}),
            ],
        ),
    ];
    for (table, rows) in tables {
        executor.seed(table, rows).await.unwrap();
    }
    executor
}

pub async fn fixture() -> Fixture {
    let executor = Arc::new(seeded_executor().await);
    let registry = registry();
    let orm = Orm::new(executor.clone(), registry.clone());
    Fixture {
        orm,
        executor,
        registry,
    }
}
