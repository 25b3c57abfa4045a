//! Upsert loader: batched INSERT .. ON CONFLICT DO UPDATE.

use bytes::BytesMut;
use deadpool_postgres::Pool;
use serde_json::Value;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::model::RawRecord;
use crate::pg::{connect_pool, quote_ident};

/// Default rows per sub-batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Key-based merge loader.
///
/// Rows are plain field mappings; the column set is taken from the first row
/// and every other row must match it (checked up front). On key collision
/// every non-key column is overwritten with the incoming value. All
/// sub-batches of one call share a single transaction.
pub struct UpsertLoader {
    pool: Pool,
}

impl UpsertLoader {
    /// Connect to the target database.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = connect_pool(dsn, 2).await?;
        Ok(Self { pool })
    }

    /// Upsert a batch into `table` on the `key_columns` conflict key.
    /// Returns the number of rows written. An empty batch is a no-op.
    pub async fn load(
        &self,
        table: &str,
        rows: &[RawRecord],
        key_columns: &[String],
        batch_size: usize,
    ) -> Result<u64> {
        if rows.is_empty() {
            info!("Empty batch, nothing to upsert into {}", table);
            return Ok(0);
        }

        let columns = column_set(table, rows, key_columns)?;

        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| PipelineError::pool(e, "getting connection for upsert"))?;
        let tx = client.transaction().await?;

        let mut affected: u64 = 0;
        for batch in rows.chunks(batch_size) {
            let sql = build_upsert_sql(table, &columns, key_columns, batch.len());
            let params = bind_params(table, batch, &columns)?;
            let param_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            affected += tx
                .execute(&sql, &param_refs)
                .await
                .map_err(|e| PipelineError::load(table, format!("upserting sub-batch: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| PipelineError::load(table, format!("committing upsert: {}", e)))?;

        info!("Upserted {} rows into {}", affected, table);
        Ok(affected)
    }
}

/// Infer the column set from the first row and verify the batch is
/// column-homogeneous and that every key column is present.
fn column_set(table: &str, rows: &[RawRecord], key_columns: &[String]) -> Result<Vec<String>> {
    if key_columns.is_empty() {
        return Err(PipelineError::load(
            table,
            "upsert requires at least one key column (run.key_columns)",
        ));
    }

    let columns: Vec<String> = rows[0].keys().cloned().collect();

    for (index, row) in rows.iter().enumerate().skip(1) {
        if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(c)) {
            return Err(PipelineError::load(
                table,
                format!(
                    "row {} has a different column set than row 0; upsert batches must be column-homogeneous",
                    index
                ),
            ));
        }
    }

    for key in key_columns {
        if !columns.contains(key) {
            return Err(PipelineError::load(
                table,
                format!("key column '{}' is not present in the batch", key),
            ));
        }
    }

    Ok(columns)
}

/// Build one parameterized multi-row upsert statement.
fn build_upsert_sql(
    table: &str,
    columns: &[String],
    key_columns: &[String],
    row_count: usize,
) -> String {
    let col_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let col_list = col_list.join(", ");

    let mut values = Vec::with_capacity(row_count);
    for row in 0..row_count {
        let placeholders: Vec<String> = (0..columns.len())
            .map(|col| format!("${}", row * columns.len() + col + 1))
            .collect();
        values.push(format!("({})", placeholders.join(", ")));
    }

    let key_list: Vec<String> = key_columns.iter().map(|c| quote_ident(c)).collect();
    let key_list = key_list.join(", ");

    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !key_columns.contains(c))
        .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
        .collect();

    if updates.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO NOTHING",
            quote_ident(table),
            col_list,
            values.join(", "),
            key_list
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO UPDATE SET {}",
            quote_ident(table),
            col_list,
            values.join(", "),
            key_list,
            updates.join(", ")
        )
    }
}

/// Flatten a sub-batch into positional parameters in column order.
fn bind_params(table: &str, batch: &[RawRecord], columns: &[String]) -> Result<Vec<SqlParam>> {
    let mut params = Vec::with_capacity(batch.len() * columns.len());
    for row in batch {
        for column in columns {
            let value = row.get(column).unwrap_or(&Value::Null);
            params.push(SqlParam::from_json(table, column, value)?);
        }
    }
    Ok(params)
}

/// Scalar parameter decoded from a JSON field value.
#[derive(Debug)]
enum SqlParam {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
}

impl SqlParam {
    fn from_json(table: &str, column: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(SqlParam::Null),
            Value::Bool(b) => Ok(SqlParam::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlParam::I64(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlParam::F64(f))
                } else {
                    Err(PipelineError::load(
                        table,
                        format!("column '{}': number {} is out of range", column, n),
                    ))
                }
            }
            Value::String(s) => Ok(SqlParam::Text(s.clone())),
            other => Err(PipelineError::load(
                table,
                format!("column '{}': nested values are not supported ({})", column, other),
            )),
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlParam::Null => Ok(IsNull::Yes),
            SqlParam::Bool(v) => v.to_sql(ty, out),
            SqlParam::I64(v) => v.to_sql(ty, out),
            SqlParam::F64(v) => v.to_sql(ty, out),
            SqlParam::Text(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Values arrive untyped; the statement's inferred types drive encoding
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected an object"),
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_upsert_sql_overwrites_non_key_columns() {
        let sql = build_upsert_sql("users", &keys(&["email", "id"]), &keys(&["id"]), 2);
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (\"email\", \"id\") VALUES ($1, $2), ($3, $4) \
             ON CONFLICT (\"id\") DO UPDATE SET \"email\" = EXCLUDED.\"email\""
        );
    }

    #[test]
    fn test_build_upsert_sql_all_key_columns_does_nothing() {
        let sql = build_upsert_sql("users", &keys(&["id"]), &keys(&["id"]), 1);
        assert!(sql.ends_with("ON CONFLICT (\"id\") DO NOTHING"));
    }

    #[test]
    fn test_column_set_rejects_heterogeneous_rows() {
        let rows = vec![
            record(json!({"id": 1, "email": "a@b.c"})),
            record(json!({"id": 2, "name": "x"})),
        ];
        let err = column_set("users", &rows, &keys(&["id"])).unwrap_err();
        assert!(err.to_string().contains("column-homogeneous"));
    }

    #[test]
    fn test_column_set_rejects_missing_key_column() {
        let rows = vec![record(json!({"email": "a@b.c"}))];
        let err = column_set("users", &rows, &keys(&["id"])).unwrap_err();
        assert!(err.to_string().contains("key column 'id'"));
    }

    #[test]
    fn test_column_set_requires_keys() {
        let rows = vec![record(json!({"id": 1}))];
        assert!(column_set("users", &rows, &[]).is_err());
    }

    #[test]
    fn test_bind_params_flattens_in_column_order() {
        let rows = vec![record(json!({"email": null, "id": 1}))];
        let columns = keys(&["email", "id"]);
        let params = bind_params("users", &rows, &columns).unwrap();
        assert!(matches!(params[0], SqlParam::Null));
        assert!(matches!(params[1], SqlParam::I64(1)));
    }

    #[test]
    fn test_bind_params_rejects_nested_values() {
        let rows = vec![record(json!({"id": 1, "tags": ["a"]}))];
        let columns = keys(&["id", "tags"]);
        assert!(bind_params("users", &rows, &columns).is_err());
    }
}
