//! SQLite storage engine

use std::path::Path;

use async_trait::async_trait;
use beacon_protocol::LeafValue;
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::Storage;
use crate::error::{Result, StorageError};
use crate::schema::quote_identifier;

/// Connection pool size for file databases
const MAX_CONNECTIONS: u32 = 5;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Event tables in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open or create a database file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "event database opened");
        Ok(Self { pool })
    }

    /// Create an in-memory database
    ///
    /// Limited to one connection, since every SQLite connection to
    /// `:memory:` is a separate database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    /// Underlying connection pool
    #[inline]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<i64> =
            // Table names are case-insensitive in SQLite
            sqlx::query_scalar(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            )
                .bind(table)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn execute_ddl(&self, statement: &str) -> Result<()> {
        sqlx::query(statement).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, table: &str, columns: &[String], values: &[LeafValue]) -> Result<()> {
        if columns.len() != values.len() {
            return Err(StorageError::schema(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }

        let sql = insert_sql(table, columns)?;
        let mut query = sqlx::query(&sql);
        for (column, value) in columns.iter().zip(values) {
            query = bind_leaf(query, column, value)?;
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

fn insert_sql(table: &str, columns: &[String]) -> Result<String> {
    let table = quote_identifier(table)?;
    if columns.is_empty() {
        return Ok(format!("INSERT INTO {table} DEFAULT VALUES"));
    }

    let names = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Result<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();

    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    ))
}

fn bind_leaf<'q>(query: SqliteQuery<'q>, column: &str, value: &LeafValue) -> Result<SqliteQuery<'q>> {
    let query = match value {
        LeafValue::String(s) => query.bind(s.clone()),
        LeafValue::I8(v) => query.bind(i32::from(*v)),
        LeafValue::U8(v) => query.bind(i32::from(*v)),
        LeafValue::I16(v) => query.bind(i32::from(*v)),
        LeafValue::U16(v) => query.bind(i32::from(*v)),
        LeafValue::I32(v) => query.bind(*v),
        LeafValue::U32(v) => query.bind(i64::from(*v)),
        LeafValue::I64(v) => query.bind(*v),
        // SQLite integers are signed 64-bit; larger values keep their digits as text
        LeafValue::U64(v) => match i64::try_from(*v) {
            Ok(n) => query.bind(n),
            Err(_) => query.bind(v.to_string()),
        },
        LeafValue::F32(v) => query.bind(*v),
        LeafValue::F64(v) => query.bind(*v),
        LeafValue::Bool(v) => query.bind(*v),
        LeafValue::Decimal(d) => query.bind(d.to_string()),
        LeafValue::DateTime(dt) => query.bind(*dt),
        LeafValue::Duration(d) => {
            let nanos = d.num_nanoseconds().ok_or_else(|| StorageError::UnsupportedValue {
                column: column.to_string(),
                message: format!("duration {d} overflows 64-bit nanoseconds"),
            })?;
            query.bind(nanos)
        }
        LeafValue::Bytes(b) => query.bind(b.to_vec()),
        LeafValue::Chars(chars) => query.bind(chars.iter().collect::<String>()),
        LeafValue::Char(c) => query.bind(c.to_string()),
        LeafValue::Enum { value, .. } => query.bind(*value),
    };
    Ok(query)
}
