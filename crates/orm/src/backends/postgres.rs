//! PostgreSQL Backend Implementation
//!
//! Executes [`QueryBuilder`] statements through a sqlx pool, binding JSON
//! parameters by type and decoding result columns back into JSON rows.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgArguments, Column, Pool, Postgres, Row as SqlxRow, TypeInfo};

use super::{QueryExecutor, Row};
use crate::database::{create_database_pool_with_config, PoolConfig};
use crate::error::{OrmError, OrmResult};
use crate::query::QueryBuilder;

type PgQuery<'a> = sqlx::query::Query<'a, Postgres, PgArguments>;

/// Query executor backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: Arc<Pool<Postgres>>,
}

impl PostgresExecutor {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }

    /// Connect a new pool and wrap it
    pub async fn connect(database_url: &str, config: &PoolConfig) -> OrmResult<Self> {
        let pool = create_database_pool_with_config(database_url, config).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn fetch_all(&self, query: &QueryBuilder) -> OrmResult<Vec<Row>> {
        let (sql, params) = query.to_sql_with_params();
        let mut statement = sqlx::query(&sql);
        for param in &params {
            statement = bind_json_value(statement, param);
        }

        let rows = statement
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| OrmError::Storage(format!("Query fetch failed: {}", e)))?;

        rows.iter().map(pg_row_to_json).collect()
    }

    async fn execute(&self, query: &QueryBuilder) -> OrmResult<u64> {
        let (sql, params) = query.to_sql_with_params();
        let mut statement = sqlx::query(&sql);
        for param in &params {
            statement = bind_json_value(statement, param);
        }

        let result = statement
            .execute(&*self.pool)
            .await
            .map_err(|e| OrmError::Storage(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn insert(&self, query: &QueryBuilder, id_column: &str) -> OrmResult<Option<JsonValue>> {
        let (sql, params) = query.to_sql_with_params();
        let sql = format!("{} RETURNING {}", sql, id_column);
        let mut statement = sqlx::query(&sql);
        for param in &params {
            statement = bind_json_value(statement, param);
        }

        let row = statement
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| OrmError::Storage(format!("Insert failed: {}", e)))?;

        match row {
            Some(row) => {
                let mut decoded = pg_row_to_json(&row)?;
                Ok(decoded.remove(id_column))
            }
            None => Ok(None),
        }
    }
}

/// Bind a JSON parameter to a sqlx query
fn bind_json_value<'a>(query: PgQuery<'a>, value: &JsonValue) -> PgQuery<'a> {
    match value {
        JsonValue::Null => query.bind(Option::<String>::None),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(s) => query.bind(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => query.bind(value.clone()),
    }
}

fn pg_row_to_json(row: &sqlx::postgres::PgRow) -> OrmResult<Row> {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), pg_value_to_json(row, index)?);
    }
    Ok(map)
}

fn decode<'r, T>(row: &'r sqlx::postgres::PgRow, index: usize, kind: &str) -> OrmResult<Option<T>>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .map_err(|e| OrmError::Storage(format!("Failed to get {} value: {}", kind, e)))
}

/// Convert a PostgreSQL column value to JSON
fn pg_value_to_json(row: &sqlx::postgres::PgRow, index: usize) -> OrmResult<JsonValue> {
    let type_name = row.columns()[index].type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => decode::<bool>(row, index, "bool")?.map(JsonValue::from),
        "INT2" => decode::<i16>(row, index, "int16")?.map(JsonValue::from),
        "INT4" => decode::<i32>(row, index, "int32")?.map(JsonValue::from),
        "INT8" => decode::<i64>(row, index, "int64")?.map(JsonValue::from),
        "FLOAT4" => decode::<f32>(row, index, "float32")?.map(JsonValue::from),
        "FLOAT8" => decode::<f64>(row, index, "float64")?.map(JsonValue::from),
        "UUID" => decode::<uuid::Uuid>(row, index, "UUID")?.map(|u| JsonValue::from(u.to_string())),
        "TIMESTAMPTZ" => decode::<chrono::DateTime<chrono::Utc>>(row, index, "datetime")?
            .map(|dt| JsonValue::from(dt.to_rfc3339())),
        "TIMESTAMP" => decode::<chrono::NaiveDateTime>(row, index, "timestamp")?
            .map(|dt| JsonValue::from(dt.to_string())),
        "DATE" => decode::<chrono::NaiveDate>(row, index, "date")?
            .map(|d| JsonValue::from(d.to_string())),
        "TIME" => decode::<chrono::NaiveTime>(row, index, "time")?
            .map(|t| JsonValue::from(t.to_string())),
        "JSON" | "JSONB" => decode::<JsonValue>(row, index, "JSON")?,
        _ => decode::<String>(row, index, &type_name)?.map(JsonValue::from),
    };

    Ok(value.unwrap_or(JsonValue::Null))
}
