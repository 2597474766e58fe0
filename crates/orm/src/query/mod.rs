//! Query Builder Module - Fluent builder for the statements relation loading issues

pub mod builder;
pub mod dml;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use types::{OrderDirection, QueryOperator, QueryType, SetClause, WhereCondition};
