//! Row Store queries
//!
//! `list_rows` reads the whole table; `update_row` applies a validated
//! [`RowPatch`] to one row inside a short transaction.

use crate::config::is_valid_table_name;
use crate::db::models::{Row, MUTABLE_COLUMNS, ROW_COLUMNS};
use crate::{Error, Result};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

/// Column → new value map for a partial update
///
/// Only columns from [`MUTABLE_COLUMNS`] can be present, so the update
/// statement never names a column the caller supplied verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowPatch {
    fields: Vec<(&'static str, Option<String>)>,
}

impl RowPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one column, replacing an earlier value for the same column
    pub fn set(mut self, column: &str, value: Option<String>) -> Result<Self> {
        let column = mutable_column(column)?;
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((column, value)),
        }
        Ok(self)
    }

    /// Validate a JSON object body
    ///
    /// Values must be strings or `null`; every key must be a mutable column.
    pub fn from_json(map: &Map<String, Value>) -> Result<Self> {
        let mut patch = Self::new();
        for (key, value) in map {
            let value = match value {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => {
                    return Err(Error::InvalidInput(format!(
                        "Column '{}' expects a string or null, got {}",
                        key,
                        json_type_name(other)
                    )))
                }
            };
            patch = patch.set(key, value)?;
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(column, _)| *column)
    }
}

impl TryFrom<Map<String, Value>> for RowPatch {
    type Error = Error;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        Self::from_json(&map)
    }
}

fn mutable_column(column: &str) -> Result<&'static str> {
    MUTABLE_COLUMNS
        .iter()
        .copied()
        .find(|name| *name == column)
        .ok_or_else(|| Error::InvalidInput(format!("Column '{}' cannot be updated", column)))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_table(table: &str) -> Result<()> {
    if is_valid_table_name(table) {
        Ok(())
    } else {
        Err(Error::Config(format!("Invalid table name: {}", table)))
    }
}

/// Return every row in storage order
pub async fn list_rows(pool: &SqlitePool, table: &str) -> Result<Vec<Row>> {
    check_table(table)?;

    let sql = format!("SELECT {} FROM {}", ROW_COLUMNS.join(", "), table);
    let rows = sqlx::query_as::<_, Row>(&sql).fetch_all(pool).await?;

    Ok(rows)
}

/// Apply `patch` to the row with `id`, returning the number of rows affected
///
/// A missing id and an empty patch both yield `Ok(0)`.
pub async fn update_row(pool: &SqlitePool, table: &str, id: i64, patch: &RowPatch) -> Result<u64> {
    check_table(table)?;

    if patch.is_empty() {
        debug!("Empty patch for row {}, nothing to update", id);
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!("UPDATE {} SET ", table));
    {
        let mut assignments = builder.separated(", ");
        for (column, value) in &patch.fields {
            assignments.push(format!("{} = ", column));
            assignments.push_bind_unseparated(value.clone());
        }
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let mut tx = pool.begin().await?;
    let result = builder.build().execute(&mut *tx).await?;
    tx.commit().await?;

    let affected = result.rows_affected();
    debug!("Updated row {} ({} columns): {} affected", id, patch.len(), affected);

    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_patch_accepts_strings_and_null() {
        let patch = RowPatch::from_json(&object(json!({
            "accuracy_v1": "0.92",
            "isu": null,
        })))
        .unwrap();

        assert_eq!(patch.len(), 2);
        let columns: Vec<_> = patch.columns().collect();
        assert!(columns.contains(&"accuracy_v1"));
        assert!(columns.contains(&"isu"));
    }

    #[test]
    fn test_patch_rejects_id() {
        let err = RowPatch::from_json(&object(json!({ "id": "5" }))).unwrap_err();
        match err {
            Error::InvalidInput(msg) => assert!(msg.contains("'id'")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_patch_rejects_unknown_column() {
        let err = RowPatch::from_json(&object(json!({ "drop_me": "x" }))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_patch_rejects_non_string_values() {
        let err = RowPatch::from_json(&object(json!({ "accuracy_v1": 0.92 }))).unwrap_err();
        match err {
            Error::InvalidInput(msg) => assert!(msg.contains("number")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_patch_set_replaces_existing_column() {
        let patch = RowPatch::new()
            .set("gu", Some("a".to_string()))
            .unwrap()
            .set("gu", Some("b".to_string()))
            .unwrap();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.fields[0], ("gu", Some("b".to_string())));
    }

    #[test]
    fn test_empty_object_is_empty_patch() {
        let patch = RowPatch::try_from(Map::new()).unwrap();
        assert!(patch.is_empty());
    }
}
