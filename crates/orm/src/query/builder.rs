//! Query Builder - Core builder implementation

use super::types::*;

/// Query builder for constructing database queries
///
/// Relation queries are always built against a single table; the builder
/// keeps enough structure for both SQL rendering and in-process evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    pub(crate) query_type: QueryType,
    pub(crate) select_fields: Vec<String>,
    pub(crate) from_table: Option<String>,
    pub(crate) insert_table: Option<String>,
    pub(crate) update_table: Option<String>,
    pub(crate) delete_table: Option<String>,
    pub(crate) set_clauses: Vec<SetClause>,
    pub(crate) where_conditions: Vec<WhereCondition>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) offset_value: Option<i64>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self {
            query_type: QueryType::Select,
            select_fields: Vec::new(),
            from_table: None,
            insert_table: None,
            update_table: None,
            delete_table: None,
            set_clauses: Vec::new(),
            where_conditions: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
        }
    }

    /// The kind of statement this builder renders
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// The table this statement targets, whatever its type
    pub fn table(&self) -> Option<&str> {
        match self.query_type {
            QueryType::Select => self.from_table.as_deref(),
            QueryType::Insert => self.insert_table.as_deref(),
            QueryType::Update => self.update_table.as_deref(),
            QueryType::Delete => self.delete_table.as_deref(),
        }
    }

    /// All WHERE conditions, in the order they were added
    pub fn conditions(&self) -> &[WhereCondition] {
        &self.where_conditions
    }

    /// Merge another builder's WHERE and ORDER BY clauses into this one
    pub fn merge_constraints(mut self, other: &QueryBuilder) -> Self {
        self.where_conditions.extend(other.where_conditions.iter().cloned());
        self.order_by.extend(other.order_by.iter().cloned());
        if other.limit_count.is_some() {
            self.limit_count = other.limit_count;
        }
        if other.offset_value.is_some() {
            self.offset_value = other.offset_value;
        }
        self
    }
}
