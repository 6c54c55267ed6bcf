//! Table provisioner
//!
//! Persists events into per-schema tables, creating each table the first
//! time its identity is seen.
//!
//! # Concurrency
//!
//! Check-then-create is serialized per table identity through a map of
//! async mutexes. Identities are keyed case-folded, since table names
//! compare case-insensitively. The lock covers only the existence check and the DDL;
//! inserts run unlocked. Identities that are known to exist skip the lock
//! entirely.
//!
//! A DDL failure is re-checked once: if the table exists afterwards,
//! another process created it and the failure is ignored.

use std::sync::Arc;

use beacon_protocol::{Event, flatten};
use dashmap::{DashMap, DashSet};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::schema::{EventRow, SchemaMapper};
use crate::storage::Storage;

/// Outcome of persisting one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted {
    /// Table the row went into
    pub table: String,
    /// Whether this call created the table
    pub created: bool,
}

/// Creates tables on demand and inserts rows
pub struct TableProvisioner {
    storage: Arc<dyn Storage>,
    mapper: SchemaMapper,
    locks: DashMap<String, Arc<Mutex<()>>>,
    known: DashSet<String>,
}

impl TableProvisioner {
    /// Create a provisioner over a storage engine
    pub fn new(storage: Arc<dyn Storage>, mapper: SchemaMapper) -> Self {
        Self {
            storage,
            mapper,
            locks: DashMap::new(),
            known: DashSet::new(),
        }
    }

    /// Schema mapper in use
    #[inline]
    pub fn mapper(&self) -> &SchemaMapper {
        &self.mapper
    }

    /// Flatten, provision and insert one event
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` for this event only; the provisioner stays
    /// usable for the next one.
    pub async fn persist(&self, event: &Event) -> Result<Persisted> {
        let fields = flatten(event)?;
        let row = self.mapper.map(fields)?;

        let created = self.ensure_table(&row).await?;
        self.storage
            .insert(&row.table, &row.column_names(), &row.values)
            .await?;

        Ok(Persisted {
            table: row.table,
            created,
        })
    }

    /// Make sure the row's table exists, returning true if this call created it
    pub async fn ensure_table(&self, row: &EventRow) -> Result<bool> {
        let key = row.table.to_lowercase();
        if self.known.contains(&key) {
            return Ok(false);
        }

        let lock = self.locks.entry(key.clone()).or_default().clone();
        let _guard = lock.lock().await;

        if self.storage.table_exists(&row.table).await? {
            self.known.insert(key);
            return Ok(false);
        }

        let ddl = self.mapper.create_table_sql(row)?;
        if let Err(e) = self.storage.execute_ddl(&ddl).await {
            if self.storage.table_exists(&row.table).await? {
                debug!(table = %row.table, error = %e, "table created concurrently");
                self.known.insert(key);
                return Ok(false);
            }
            return Err(e);
        }

        info!(
            table = %row.table,
            columns = row.columns.len(),
            storage = self.storage.name(),
            "provisioned table"
        );
        self.known.insert(key);
        Ok(true)
    }
}

impl std::fmt::Debug for TableProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableProvisioner")
            .field("storage", &self.storage.name())
            .field("mapper", &self.mapper)
            .field("known_tables", &self.known.len())
            .finish()
    }
}
