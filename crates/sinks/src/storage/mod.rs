//! Storage capability
//!
//! The provisioner only needs three operations from a relational engine:
//! an existence check, DDL execution and a parameterized insert. Values are
//! always bound as parameters, never interpolated into SQL text.

mod sqlite;

use async_trait::async_trait;
use beacon_protocol::LeafValue;

use crate::error::Result;

pub use sqlite::SqliteStorage;

/// SQL-capable storage engine
#[async_trait]
pub trait Storage: Send + Sync {
    /// Check whether a table exists
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Execute one DDL statement
    async fn execute_ddl(&self, statement: &str) -> Result<()>;

    /// Insert one row, binding `values` as parameters in column order
    async fn insert(&self, table: &str, columns: &[String], values: &[LeafValue]) -> Result<()>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
#[path = "sqlite_test.rs"]
mod sqlite_test;
