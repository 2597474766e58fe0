//! Query Builder SQL generation

use serde_json::Value;
use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Generate SQL from query with parameter placeholders and return parameters
    pub fn to_sql_with_params(&self) -> (String, Vec<Value>) {
        match self.query_type {
            QueryType::Select => self.build_select_sql(),
            QueryType::Insert => self.build_insert_sql(),
            QueryType::Update => self.build_update_sql(),
            QueryType::Delete => self.build_delete_sql(),
        }
    }

    /// Convert the query to its placeholder SQL text
    pub fn to_sql(&self) -> String {
        self.to_sql_with_params().0
    }

    /// Build SELECT SQL with parameters
    fn build_select_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();
        let mut param_counter = 1;

        if self.select_fields.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select_fields.join(", "));
        }

        if let Some(table) = &self.from_table {
            sql.push_str(" FROM ");
            sql.push_str(table);
        }

        self.build_where_clause(&mut sql, &mut params, &mut param_counter);
        self.build_order_limit_clause(&mut sql);

        (sql, params)
    }

    /// Build INSERT SQL with parameters
    fn build_insert_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        let mut param_counter = 1;

        if let Some(table) = &self.insert_table {
            sql.push_str(&format!("INSERT INTO {}", table));

            if self.set_clauses.is_empty() {
                sql.push_str(" DEFAULT VALUES");
            } else {
                sql.push_str(" (");
                let columns: Vec<&str> = self.set_clauses.iter()
                    .map(|clause| clause.column.as_str())
                    .collect();
                sql.push_str(&columns.join(", "));
                sql.push_str(") VALUES (");

                for (i, clause) in self.set_clauses.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    if let Some(ref value) = clause.value {
                        sql.push_str(&format!("${}", param_counter));
                        params.push(value.clone());
                        param_counter += 1;
                    } else {
                        sql.push_str("NULL");
                    }
                }
                sql.push(')');
            }
        }

        (sql, params)
    }

    /// Build UPDATE SQL with parameters
    fn build_update_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        let mut param_counter = 1;

        if let Some(table) = &self.update_table {
            sql.push_str(&format!("UPDATE {}", table));

            if !self.set_clauses.is_empty() {
                sql.push_str(" SET ");
                for (i, clause) in self.set_clauses.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push_str(&format!("{} = ", clause.column));
                    if let Some(ref value) = clause.value {
                        sql.push_str(&format!("${}", param_counter));
                        params.push(value.clone());
                        param_counter += 1;
                    } else {
                        sql.push_str("NULL");
                    }
                }
            }

            self.build_where_clause(&mut sql, &mut params, &mut param_counter);
        }

        (sql, params)
    }

    /// Build DELETE SQL with parameters
    fn build_delete_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        let mut param_counter = 1;

        if let Some(table) = &self.delete_table {
            sql.push_str(&format!("DELETE FROM {}", table));
            self.build_where_clause(&mut sql, &mut params, &mut param_counter);
        }

        (sql, params)
    }

    /// Helper method to build WHERE clauses
    fn build_where_clause(&self, sql: &mut String, params: &mut Vec<Value>, param_counter: &mut usize) {
        if self.where_conditions.is_empty() {
            return;
        }

        sql.push_str(" WHERE ");
        for (i, condition) in self.where_conditions.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }

            match condition.operator {
                // An empty IN list matches nothing; NOT IN of nothing matches everything
                QueryOperator::In if condition.values.is_empty() => sql.push_str("FALSE"),
                QueryOperator::NotIn if condition.values.is_empty() => sql.push_str("TRUE"),
                QueryOperator::In | QueryOperator::NotIn => {
                    sql.push_str(&format!("{} {} (", condition.column, condition.operator));
                    for (j, value) in condition.values.iter().enumerate() {
                        if j > 0 {
                            sql.push_str(", ");
                        }
                        sql.push_str(&format!("${}", param_counter));
                        params.push(value.clone());
                        *param_counter += 1;
                    }
                    sql.push(')');
                }
                QueryOperator::IsNull | QueryOperator::IsNotNull => {
                    sql.push_str(&format!("{} {}", condition.column, condition.operator));
                }
                QueryOperator::Equal | QueryOperator::NotEqual => {
                    match condition.value {
                        Some(ref value) => {
                            sql.push_str(&format!("{} {} ${}", condition.column, condition.operator, param_counter));
                            params.push(value.clone());
                            *param_counter += 1;
                        }
                        None => {
                            let operator = if condition.operator == QueryOperator::Equal {
                                QueryOperator::IsNull
                            } else {
                                QueryOperator::IsNotNull
                            };
                            sql.push_str(&format!("{} {}", condition.column, operator));
                        }
                    }
                }
            }
        }
    }

    /// Helper method to build ORDER BY and LIMIT clauses
    fn build_order_limit_clause(&self, sql: &mut String) {
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, (column, direction)) in self.order_by.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&format!("{} {}", column, direction));
            }
        }

        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset_value {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_with_in_clause() {
        let (sql, params) = QueryBuilder::new()
            .from("posts")
            .where_in("blog_id", vec![1, 2, 3])
            .to_sql_with_params();

        assert_eq!(sql, "SELECT * FROM posts WHERE blog_id IN ($1, $2, $3)");
        assert_eq!(params, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_empty_in_clause_matches_nothing() {
        let sql = QueryBuilder::new()
            .from("posts")
            .where_in::<i64>("blog_id", Vec::new())
            .to_sql();

        assert_eq!(sql, "SELECT * FROM posts WHERE FALSE");
    }

    #[test]
    fn test_morph_constraint_rendering() {
        let (sql, params) = QueryBuilder::new()
            .from("photos")
            .where_in("imageable_id", vec![1])
            .where_eq("imageable_type", "sites")
            .order_by("id")
            .to_sql_with_params();

        assert_eq!(
            sql,
            "SELECT * FROM photos WHERE imageable_id IN ($1) AND imageable_type = $2 ORDER BY id ASC"
        );
        assert_eq!(params, vec![json!(1), json!("sites")]);
    }

    #[test]
    fn test_insert_rendering() {
        let (sql, params) = QueryBuilder::new()
            .insert_into("admins_sites")
            .set("site_id", 1)
            .set("admin_id", 2)
            .set("item", serde_json::Value::Null)
            .to_sql_with_params();

        assert_eq!(sql, "INSERT INTO admins_sites (site_id, admin_id, item) VALUES ($1, $2, NULL)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_update_and_delete_rendering() {
        let (sql, params) = QueryBuilder::new()
            .update("admins_sites")
            .set("item", "changed")
            .where_eq("site_id", 1)
            .where_in("admin_id", vec![4, 5])
            .to_sql_with_params();
        assert_eq!(
            sql,
            "UPDATE admins_sites SET item = $1 WHERE site_id = $2 AND admin_id IN ($3, $4)"
        );
        assert_eq!(params.len(), 4);

        let sql = QueryBuilder::new()
            .delete_from("admins_sites")
            .where_eq("site_id", 1)
            .to_sql();
        assert_eq!(sql, "DELETE FROM admins_sites WHERE site_id = $1");
    }
}
