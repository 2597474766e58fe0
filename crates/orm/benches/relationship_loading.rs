//! Relationship Loading Performance Benchmarks
//!
//! Measures batched eager loading over the in-memory executor, so the numbers
//! reflect planning, grouping and association rather than database latency.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relata_orm::{
    EagerTree, Entity, FetchOptions, MemoryExecutor, ModelDef, Orm, QueryBuilder, RelationDecl,
    TypeRegistry,
};
use serde_json::json;
use tokio::runtime::Runtime;

fn registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    let user = ModelDef::new("users")
        .relation("posts", RelationDecl::has_many("Post"))
        .relation("roles", RelationDecl::belongs_to_many("Role"))
        .build()
        .unwrap();
    let post = ModelDef::new("posts")
        .relation("user", RelationDecl::belongs_to("User"))
        .relation("comments", RelationDecl::has_many("Comment"))
        .build()
        .unwrap();
    registry.register_model("User", user).unwrap();
    registry.register_model("Post", post).unwrap();
    registry
        .register_model("Comment", ModelDef::new("comments").build().unwrap())
        .unwrap();
    registry
        .register_model("Role", ModelDef::new("roles").build().unwrap())
        .unwrap();
    registry
}

async fn seeded(users: usize) -> MemoryExecutor {
    let executor = MemoryExecutor::new();
    let users_rows = (1..=users).map(|id| json!({"id": id, "name": format!("User {}", id)}));
    let post_rows = (1..=users * 3).map(|id| json!({"id": id, "user_id": (id - 1) / 3 + 1}));
    let comment_rows = (1..=users * 6).map(|id| json!({"id": id, "post_id": (id - 1) / 2 + 1}));
    let role_rows = (1..=5).map(|id| json!({"id": id, "name": format!("role-{}", id)}));
    let pivot_rows = (1..=users).map(|id| json!({"user_id": id, "role_id": id % 5 + 1}));

    executor.seed("users", users_rows.collect()).await.unwrap();
    executor.seed("posts", post_rows.collect()).await.unwrap();
    executor.seed("comments", comment_rows.collect()).await.unwrap();
    executor.seed("roles", role_rows.collect()).await.unwrap();
    executor.seed("roles_users", pivot_rows.collect()).await.unwrap();
    executor
}

fn bench_eager_tree_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("eager_tree_parsing");

    group.bench_function("nested_paths", |b| {
        b.iter(|| {
            let tree = EagerTree::parse(black_box([
                "posts.comments",
                "posts.user.roles",
                "roles",
                "posts.comments.post.user",
            ]))
            .unwrap();
            black_box(tree.depth())
        })
    });

    group.finish();
}

fn bench_batched_loading(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("batched_loading");

    for &user_count in &[10usize, 100, 500] {
        let executor = Arc::new(rt.block_on(seeded(user_count)));
        let orm = Orm::new(executor.clone(), registry());

        group.bench_with_input(
            BenchmarkId::new("posts_comments", user_count),
            &user_count,
            |b, _| {
                b.iter(|| {
                    rt.block_on(async {
                        executor.clear_log().await;
                        let users = orm
                            .fetch_all(
                                "User",
                                QueryBuilder::new(),
                                FetchOptions::new().with_related(["posts.comments"]),
                            )
                            .await
                            .unwrap();
                        black_box(users.len())
                    })
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("belongs_to_many", user_count),
            &user_count,
            |b, _| {
                b.iter(|| {
                    rt.block_on(async {
                        executor.clear_log().await;
                        let users = orm
                            .fetch_all(
                                "User",
                                QueryBuilder::new(),
                                FetchOptions::new().with_related(["roles"]),
                            )
                            .await
                            .unwrap();
                        black_box(users.len())
                    })
                })
            },
        );
    }

    group.finish();
}

fn bench_single_owner(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let executor = Arc::new(rt.block_on(seeded(100)));
    let registry = registry();
    let user_model = registry.resolve_model("User").unwrap();
    let orm = Orm::new(executor.clone(), registry);

    c.bench_function("single_owner_relation_fetch", |b| {
        b.iter(|| {
            rt.block_on(async {
                executor.clear_log().await;
                let mut user = Entity::new(user_model.clone()).with("id", 42);
                let posts = orm
                    .related(&mut user, "posts")
                    .unwrap()
                    .fetch(FetchOptions::default())
                    .await
                    .unwrap();
                black_box(posts)
            })
        })
    });
}

criterion_group!(
    benches,
    bench_eager_tree_parsing,
    bench_batched_loading,
    bench_single_owner
);
criterion_main!(benches);
