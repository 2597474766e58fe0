//! In-memory backend
//!
//! Evaluates [`QueryBuilder`] statements against tables held in memory and
//! records every statement it runs. Tests use the log to count round trips;
//! benches use the store to measure loader overhead without a database.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use super::{QueryExecutor, Row};
use crate::error::{ModelError, OrmResult};
use crate::model::KeyValue;
use crate::query::{OrderDirection, QueryBuilder, QueryOperator, QueryType, WhereCondition};

/// A statement recorded by [`MemoryExecutor`]
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedQuery {
    pub query_type: QueryType,
    pub table: String,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Query executor over in-memory tables
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    log: Mutex<Vec<ExecutedQuery>>,
    failing: RwLock<HashSet<String>>,
    stalled: RwLock<HashSet<String>>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows to a table. Non-object values are rejected.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) -> OrmResult<()> {
        let mut decoded = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Value::Object(map) => decoded.push(map),
                other => {
                    return Err(ModelError::Serialization(format!(
                        "Cannot seed '{}' with non-object row {}",
                        table, other
                    )))
                }
            }
        }
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().extend(decoded);
        Ok(())
    }

    /// Current contents of a table
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.read().await;
        tables.get(table).cloned().unwrap_or_default()
    }

    /// Make every statement against `table` fail with a storage error
    pub async fn fail_table(&self, table: &str) {
        self.failing.write().await.insert(table.to_string());
    }

    /// Make every statement against `table` hang without completing
    pub async fn stall_table(&self, table: &str) {
        self.stalled.write().await.insert(table.to_string());
    }

    pub async fn executed(&self) -> Vec<ExecutedQuery> {
        self.log.lock().await.clone()
    }

    /// Number of SELECTs issued against a table
    pub async fn select_count(&self, table: &str) -> usize {
        self.log
            .lock()
            .await
            .iter()
            .filter(|q| q.query_type == QueryType::Select && q.table == table)
            .count()
    }

    /// Total number of statements issued
    pub async fn query_count(&self) -> usize {
        self.log.lock().await.len()
    }

    pub async fn clear_log(&self) {
        self.log.lock().await.clear();
    }

    async fn record(&self, query: &QueryBuilder) -> OrmResult<String> {
        let table = query
            .table()
            .ok_or_else(|| ModelError::Storage("Query has no target table".to_string()))?
            .to_string();
        let (sql, params) = query.to_sql_with_params();
        tracing::trace!("memory executor: {}", sql);
        self.log.lock().await.push(ExecutedQuery {
            query_type: query.query_type(),
            table: table.clone(),
            sql,
            params,
        });

        if self.failing.read().await.contains(&table) {
            return Err(ModelError::Storage(format!(
                "Simulated failure for table '{}'",
                table
            )));
        }
        let stalled = self.stalled.read().await.contains(&table);
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(table)
    }

    fn build_row(query: &QueryBuilder) -> Row {
        query
            .set_clauses
            .iter()
            .map(|clause| {
                (
                    clause.column.clone(),
                    clause.value.clone().unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Push an inserted row, assigning the next integer id when absent
    fn insert_row(rows: &mut Vec<Row>, query: &QueryBuilder, id_column: &str) -> Option<Value> {
        let mut row = Self::build_row(query);
        let has_id = row.get(id_column).map_or(false, |v| !v.is_null());
        if !has_id {
            let next = rows
                .iter()
                .filter_map(|r| r.get(id_column).and_then(Value::as_i64))
                .max()
                .unwrap_or(0)
                + 1;
            row.insert(id_column.to_string(), Value::from(next));
        }

        let id = row.get(id_column).cloned();
        rows.push(row);
        id
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn fetch_all(&self, query: &QueryBuilder) -> OrmResult<Vec<Row>> {
        let table = self.record(query).await?;
        if query.query_type() != QueryType::Select {
            return Err(ModelError::Storage(
                "fetch_all requires a SELECT statement".to_string(),
            ));
        }

        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, query.conditions()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for (column, direction) in query.order_by.iter().rev() {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                }
            });
        }

        let offset = query.offset_value.unwrap_or(0).max(0) as usize;
        let mut rows: Vec<Row> = rows.into_iter().skip(offset).collect();
        if let Some(limit) = query.limit_count {
            rows.truncate(limit.max(0) as usize);
        }

        let projected = &query.select_fields;
        if projected.is_empty() || projected.iter().any(|f| f == "*") {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                projected
                    .iter()
                    .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
                    .collect()
            })
            .collect())
    }

    async fn execute(&self, query: &QueryBuilder) -> OrmResult<u64> {
        let table = self.record(query).await?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();

        match query.query_type() {
            QueryType::Select => Err(ModelError::Storage(
                "execute does not accept SELECT statements".to_string(),
            )),
            QueryType::Insert => {
                rows.push(Self::build_row(query));
                Ok(1)
            }
            QueryType::Update => {
                let mut affected = 0;
                for row in rows.iter_mut().filter(|r| matches_all(r, query.conditions())) {
                    for clause in &query.set_clauses {
                        row.insert(
                            clause.column.clone(),
                            clause.value.clone().unwrap_or(Value::Null),
                        );
                    }
                    affected += 1;
                }
                Ok(affected)
            }
            QueryType::Delete => {
                let before = rows.len();
                rows.retain(|r| !matches_all(r, query.conditions()));
                Ok((before - rows.len()) as u64)
            }
        }
    }

    async fn insert(&self, query: &QueryBuilder, id_column: &str) -> OrmResult<Option<Value>> {
        let table = self.record(query).await?;
        if query.query_type() != QueryType::Insert {
            return Err(ModelError::Storage(
                "insert requires an INSERT statement".to_string(),
            ));
        }
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        Ok(Self::insert_row(rows, query, id_column))
    }
}

fn matches_all(row: &Row, conditions: &[WhereCondition]) -> bool {
    conditions.iter().all(|condition| matches(row, condition))
}

fn matches(row: &Row, condition: &WhereCondition) -> bool {
    let actual = row.get(&condition.column).filter(|v| !v.is_null());
    match condition.operator {
        QueryOperator::IsNull => actual.is_none(),
        QueryOperator::IsNotNull => actual.is_some(),
        QueryOperator::Equal => match (actual, condition.value.as_ref()) {
            (Some(a), Some(b)) => values_equal(a, b),
            _ => false,
        },
        QueryOperator::NotEqual => match (actual, condition.value.as_ref()) {
            (Some(a), Some(b)) => !values_equal(a, b),
            _ => false,
        },
        QueryOperator::In => {
            actual.map_or(false, |a| condition.values.iter().any(|b| values_equal(a, b)))
        }
        QueryOperator::NotIn => {
            actual.map_or(false, |a| !condition.values.iter().any(|b| values_equal(a, b)))
        }
    }
}

/// Key-aware equality: `1` matches `1.0`, otherwise plain JSON equality
fn values_equal(a: &Value, b: &Value) -> bool {
    match (KeyValue::from_json(a), KeyValue::from_json(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
