//! Beacon Sinks - relational storage for ingested events
//!
//! Every event is flattened, mapped onto a table derived from its schema,
//! and inserted as one row. Tables are created the first time a schema is
//! seen and never altered afterwards.
//!
//! ```text
//! Event ──flatten──► [(path, leaf)] ──SchemaMapper──► EventRow
//!                                                       │
//!                         TableProvisioner: ensure table, insert
//!                                                       │
//!                                                   Storage (SQLite)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use beacon_sinks::{SchemaConfig, SchemaMapper, SqliteStorage, TableProvisioner};
//!
//! let storage = Arc::new(SqliteStorage::open("events.db").await?);
//! let mapper = SchemaMapper::new(SchemaConfig::default())?;
//! let provisioner = TableProvisioner::new(storage, mapper);
//!
//! let persisted = provisioner.persist(&event).await?;
//! ```

mod error;
mod provisioner;
pub mod schema;
pub mod storage;

pub use error::{Result, StorageError};
pub use provisioner::{Persisted, TableProvisioner};
pub use schema::{Column, EventRow, SchemaConfig, SchemaMapper};
pub use storage::{SqliteStorage, Storage};
