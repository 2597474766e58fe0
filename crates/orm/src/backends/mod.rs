//! Database Backend Abstractions
//!
//! Relation loading only ever needs three things from a store: run a SELECT,
//! run a statement, and insert a row returning its id. [`QueryExecutor`]
//! captures exactly that, so the loader runs unchanged against PostgreSQL or
//! the in-memory store used by tests and benches.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{ModelError, OrmResult};
use crate::query::QueryBuilder;

pub use memory::{ExecutedQuery, MemoryExecutor};
pub use postgres::PostgresExecutor;

/// A fetched row: column name to JSON value
pub type Row = Map<String, Value>;

/// Abstract query execution against a backing store
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a SELECT and return all rows
    async fn fetch_all(&self, query: &QueryBuilder) -> OrmResult<Vec<Row>>;

    /// Run an UPDATE/DELETE/INSERT and return the affected row count
    async fn execute(&self, query: &QueryBuilder) -> OrmResult<u64>;

    /// Run an INSERT and return the generated value of `id_column`
    async fn insert(&self, query: &QueryBuilder, id_column: &str) -> OrmResult<Option<Value>>;
}

/// Await `operation`, failing with a storage error once `timeout` elapses
async fn bounded<T, F>(query: &QueryBuilder, timeout: Option<Duration>, operation: F) -> OrmResult<T>
where
    F: Future<Output = OrmResult<T>>,
{
    tracing::trace!("Executing query: {}", query.to_sql());
    match timeout {
        Some(limit) => tokio::time::timeout(limit, operation).await.map_err(|_| {
            tracing::warn!("Query timed out after {:?}: {}", limit, query.to_sql());
            ModelError::Storage(format!("Query timed out after {}ms", limit.as_millis()))
        })?,
        None => operation.await,
    }
}

/// Run a SELECT, bounded by an optional timeout
pub(crate) async fn fetch_with_timeout(
    executor: &dyn QueryExecutor,
    query: &QueryBuilder,
    timeout: Option<Duration>,
) -> OrmResult<Vec<Row>> {
    bounded(query, timeout, executor.fetch_all(query)).await
}

/// Run an UPDATE/DELETE/INSERT, bounded by an optional timeout
pub(crate) async fn execute_with_timeout(
    executor: &dyn QueryExecutor,
    query: &QueryBuilder,
    timeout: Option<Duration>,
) -> OrmResult<u64> {
    bounded(query, timeout, executor.execute(query)).await
}

/// Run an INSERT returning `id_column`, bounded by an optional timeout
pub(crate) async fn insert_with_timeout(
    executor: &dyn QueryExecutor,
    query: &QueryBuilder,
    id_column: &str,
    timeout: Option<Duration>,
) -> OrmResult<Option<Value>> {
    bounded(query, timeout, executor.insert(query, id_column)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_writes_honor_timeout() {
        let executor = MemoryExecutor::new();
        executor.stall_table("tags").await;
        let limit = Some(Duration::from_millis(20));

        let insert = QueryBuilder::new()
            .insert_into("tags")
            .set_values([("name".to_string(), json!("slow"))]);
        assert!(matches!(
            insert_with_timeout(&executor, &insert, "id", limit).await,
            Err(ModelError::Storage(_))
        ));

        let delete = QueryBuilder::new().delete_from("tags").where_eq("id", 1);
        assert!(matches!(
            execute_with_timeout(&executor, &delete, limit).await,
            Err(ModelError::Storage(_))
        ));
        assert_eq!(executor.query_count().await, 2);
    }

    #[tokio::test]
    async fn test_no_timeout_runs_to_completion() {
        let executor = MemoryExecutor::new();
        let insert = QueryBuilder::new()
            .insert_into("tags")
            .set_values([("name".to_string(), json!("fast"))]);
        let id = insert_with_timeout(&executor, &insert, "id", None)
            .await
            .unwrap();
        assert_eq!(id, Some(json!(1)));
    }
}
