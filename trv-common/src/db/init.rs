//! Database initialization
//!
//! Opens the pool named by the connection string and creates the rows
//! table when it is missing. Safe to call on every startup.

use crate::config::{is_valid_table_name, Variant};
use crate::db::models::MUTABLE_COLUMNS;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open the database and make sure the rows table exists
pub async fn init_database(database_url: &str, table: &str, variant: Variant) -> Result<SqlitePool> {
    let pool = connect(database_url).await?;
    create_rows_table(&pool, table, variant).await?;
    Ok(pool)
}

/// Open a connection pool for `database_url`
///
/// In-memory databases get a single long-lived connection; every new
/// connection to `sqlite::memory:` would otherwise see an empty database.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.busy_timeout(BUSY_TIMEOUT);

    let in_memory = is_in_memory(database_url);

    if !in_memory {
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(10)
    };

    let pool = pool_options.connect_with(options).await?;

    if in_memory {
        info!("Opened in-memory database");
    } else {
        info!("Opened database: {}", database_url);
    }

    Ok(pool)
}

/// Create the rows table if it does not exist
///
/// Text columns are NOT NULL for the test variant and nullable otherwise.
pub async fn create_rows_table(pool: &SqlitePool, table: &str, variant: Variant) -> Result<()> {
    if !is_valid_table_name(table) {
        return Err(Error::Config(format!("Invalid table name: {}", table)));
    }

    let sql = rows_table_sql(table, variant);
    sqlx::query(&sql).execute(pool).await?;

    info!("Rows table ready: {} ({} variant)", table, variant);
    Ok(())
}

fn rows_table_sql(table: &str, variant: Variant) -> String {
    let text_type = if variant.text_columns_required() {
        "TEXT NOT NULL"
    } else {
        "TEXT"
    };

    let columns: Vec<String> = MUTABLE_COLUMNS
        .iter()
        .map(|column| format!("            {} {}", column, text_type))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n            id INTEGER PRIMARY KEY,\n{}\n        )",
        table,
        columns.join(",\n")
    )
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_table_sql_nullability() {
        let test_sql = rows_table_sql("t", Variant::Test);
        assert!(test_sql.contains("human_output TEXT NOT NULL"));
        assert!(test_sql.contains("id INTEGER PRIMARY KEY"));

        let prod_sql = rows_table_sql("t", Variant::Production);
        assert!(prod_sql.contains("human_output TEXT"));
        assert!(!prod_sql.contains("NOT NULL"));
    }

    #[test]
    fn test_is_in_memory() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:rows?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://rows.db?mode=rwc"));
    }

    #[tokio::test]
    async fn test_create_rows_table_is_idempotent() {
        let pool = connect("sqlite::memory:").await.unwrap();

        create_rows_table(&pool, "rows", Variant::Production).await.unwrap();
        create_rows_table(&pool, "rows", Variant::Production).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rows")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_create_rows_table_rejects_bad_name() {
        let pool = connect("sqlite::memory:").await.unwrap();
        let result = create_rows_table(&pool, "rows;--", Variant::Test).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
