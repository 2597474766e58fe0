//! Entity persistence: insert new entities, update existing ones

use std::time::Duration;

use serde_json::Value;

use super::entity::Entity;
use crate::backends::{execute_with_timeout, insert_with_timeout, QueryExecutor};
use crate::error::{ModelError, ModelResult};
use crate::query::QueryBuilder;

/// Insert the entity if it has no id, otherwise update it by id.
///
/// Each statement is bounded by `timeout` when one is given.
pub async fn save(
    executor: &dyn QueryExecutor,
    entity: &mut Entity,
    timeout: Option<Duration>,
) -> ModelResult<()> {
    if entity.is_placeholder() {
        return Err(ModelError::Configuration(
            "Cannot save an empty relation placeholder".to_string(),
        ));
    }

    let table = entity.table_name().to_string();
    let id_column = entity.def().id_attribute().to_string();

    match entity.id() {
        None => {
            let values: Vec<(String, Value)> = entity
                .attributes()
                .iter()
                .filter(|(column, _)| **column != id_column)
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect();
            let query = QueryBuilder::new().insert_into(&table).set_values(values);
            let id = insert_with_timeout(executor, &query, &id_column, timeout).await?;
            match id {
                Some(id) => {
                    tracing::debug!("Inserted {} with {} = {}", table, id_column, id);
                    entity.set(&id_column, id);
                }
                None => tracing::warn!("Insert into {} returned no {}", table, id_column),
            }
            Ok(())
        }
        Some(id) => {
            let values: Vec<(String, Value)> = entity
                .attributes()
                .iter()
                .filter(|(column, _)| **column != id_column)
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect();
            if values.is_empty() {
                return Ok(());
            }
            let query = QueryBuilder::new()
                .update(&table)
                .set_values(values)
                .where_eq(&id_column, id.clone());
            let affected = execute_with_timeout(executor, &query, timeout).await?;
            if affected == 0 {
                return Err(ModelError::NotFound(table));
            }
            tracing::debug!("Updated {} {} = {}", table, id_column, id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryExecutor;
    use crate::model::{KeyValue, ModelDef};
    use serde_json::json;

    #[tokio::test]
    async fn test_save_inserts_then_updates() {
        let executor = MemoryExecutor::new();
        let roles = ModelDef::new("roles").build().unwrap();

        let mut role = Entity::new(roles).with("name", "admin");
        save(&executor, &mut role, None).await.unwrap();
        assert_eq!(role.id(), Some(KeyValue::Integer(1)));

        role.set("name", "owner");
        save(&executor, &mut role, None).await.unwrap();
        assert_eq!(executor.rows("roles").await[0]["name"], json!("owner"));
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_not_found() {
        let executor = MemoryExecutor::new();
        let roles = ModelDef::new("roles").build().unwrap();
        let mut role = Entity::new(roles).with("id", 9).with("name", "ghost");
        assert!(matches!(
            save(&executor, &mut role, None).await,
            Err(ModelError::NotFound(_))
        ));
    }
}
