//! Schema mapper
//!
//! Turns a flattened event into a table identity, a column scheme and the
//! values of one row.
//!
//! # Table identity
//!
//! If one of the configured name properties is present as a non-empty
//! top-level string leaf, its value names the table verbatim. Otherwise the name is
//! `event` followed by 16 hex digits of a SHA-256 over the sorted
//! `path:kind` lines, so identical schemas always share a table and a
//! changed schema gets its own table (no migrations).
//!
//! # Column types
//!
//! | Leaf | Column |
//! |------|--------|
//! | string, chars, char | `TEXT` |
//! | i8, u8, i16 | `SMALLINT` |
//! | u16, i32, enum | `INTEGER` |
//! | u32, i64, duration (ns) | `BIGINT` |
//! | u64 | `DECIMAL(20,0)` |
//! | f32 | `REAL` |
//! | f64 | `DOUBLE PRECISION` |
//! | bool | `BOOLEAN` |
//! | decimal | `DECIMAL` |
//! | datetime | `TIMESTAMP` |
//! | bytes | `BLOB` |

use std::collections::HashSet;
use std::fmt::Write as _;

use beacon_protocol::{Event, FlatFields, LeafKind, LeafValue, flatten};
use sha2::{Digest, Sha256};

use crate::error::{Result, StorageError};

/// Default designated name properties, checked in order
pub const DEFAULT_TABLE_NAME_PROPERTIES: [&str; 2] = ["EventName", "EventId"];

/// Default primary key column
pub const DEFAULT_PRIMARY_KEY_COLUMN: &str = "EventRecordId";

/// Prefix of hash-derived table names
pub const HASHED_TABLE_PREFIX: &str = "event";

/// Hex digits of the schema hash kept in table names
const HASH_HEX_LEN: usize = 16;

/// Longest accepted identifier, in bytes
const MAX_IDENTIFIER_LEN: usize = 256;

/// Mapper settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaConfig {
    /// Properties whose string value names the table, first match wins
    pub table_name_properties: Vec<String>,

    /// Keep the designated name property as a column (on by default)
    pub include_name_column: bool,

    /// Auto-assigned integer primary key column
    pub primary_key_column: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            table_name_properties: DEFAULT_TABLE_NAME_PROPERTIES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            include_name_column: true,
            primary_key_column: DEFAULT_PRIMARY_KEY_COLUMN.to_string(),
        }
    }
}

/// One column of an event table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, the flattened path
    pub name: String,
    /// Leaf kind the column type is derived from
    pub kind: LeafKind,
}

impl Column {
    /// Storage type for this column
    #[inline]
    pub fn sql_type(&self) -> &'static str {
        column_type(self.kind)
    }
}

/// A flattened event mapped onto its table
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    /// Table identity
    pub table: String,
    /// Columns in flattened order
    pub columns: Vec<Column>,
    /// Values, parallel to `columns`
    pub values: Vec<LeafValue>,
}

impl EventRow {
    /// Column names in order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Maps flattened events to tables and rows
#[derive(Debug, Clone)]
pub struct SchemaMapper {
    config: SchemaConfig,
}

impl SchemaMapper {
    /// Create a mapper, validating the primary key column name
    pub fn new(config: SchemaConfig) -> Result<Self> {
        quote_identifier(&config.primary_key_column)?;
        Ok(Self { config })
    }

    /// Mapper settings
    #[inline]
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Derive the table identity of a flattened event
    pub fn table_identity(&self, fields: &FlatFields) -> String {
        match self.designated_name(fields) {
            Some((_, name)) => name.to_string(),
            None => schema_hash(fields),
        }
    }

    /// Table identity of an unflattened event, if it can be flattened
    pub fn identity_of(&self, event: &Event) -> Option<String> {
        flatten(event).ok().map(|fields| self.table_identity(&fields))
    }

    /// Map a flattened event onto its table and row
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` for an unusable table or column name
    /// - `Schema` for columns that collide with each other or the primary key
    pub fn map(&self, fields: FlatFields) -> Result<EventRow> {
        let designated = self.designated_name(&fields).map(|(i, name)| (i, name.to_string()));

        let (table, skip) = match designated {
            Some((index, name)) => {
                let skip = (!self.config.include_name_column).then_some(index);
                (name, skip)
            }
            None => (schema_hash(&fields), None),
        };
        quote_identifier(&table)?;

        let pk = self.config.primary_key_column.to_lowercase();
        let mut seen = HashSet::with_capacity(fields.len());
        let mut columns = Vec::with_capacity(fields.len());
        let mut values = Vec::with_capacity(fields.len());

        for (index, (path, value)) in fields.into_iter().enumerate() {
            if skip == Some(index) {
                continue;
            }
            quote_identifier(&path)?;

            // SQL identifiers compare case-insensitively
            let folded = path.to_lowercase();
            if folded == pk {
                return Err(StorageError::schema(format!(
                    "column '{path}' collides with the primary key column"
                )));
            }
            if !seen.insert(folded) {
                return Err(StorageError::schema(format!(
                    "column '{path}' differs from another column only by case"
                )));
            }

            columns.push(Column {
                name: path,
                kind: value.kind(),
            });
            values.push(value);
        }

        Ok(EventRow {
            table,
            columns,
            values,
        })
    }

    /// `CREATE TABLE` statement for a row's table
    pub fn create_table_sql(&self, row: &EventRow) -> Result<String> {
        let mut sql = format!(
            "CREATE TABLE {} (\n    {} INTEGER PRIMARY KEY",
            quote_identifier(&row.table)?,
            quote_identifier(&self.config.primary_key_column)?,
        );
        for column in &row.columns {
            let _ = write!(
                sql,
                ",\n    {} {}",
                quote_identifier(&column.name)?,
                column.sql_type()
            );
        }
        sql.push_str("\n)");
        Ok(sql)
    }

    /// First configured name property present as a non-empty top-level string leaf
    fn designated_name<'a>(&self, fields: &'a FlatFields) -> Option<(usize, &'a str)> {
        fields.iter().enumerate().find_map(|(index, (path, value))| {
            let name = value.as_str().filter(|s| !s.is_empty())?;
            self.config
                .table_name_properties
                .iter()
                .any(|p| p == path)
                .then_some((index, name))
        })
    }
}

/// Hash-derived table name over the sorted `(path, kind)` pairs
pub fn schema_hash(fields: &FlatFields) -> String {
    let mut lines: Vec<String> = fields
        .iter()
        .map(|(path, value)| format!("{path}:{}", value.kind()))
        .collect();
    lines.sort_unstable();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hex::encode(hasher.finalize());

    format!("{HASHED_TABLE_PREFIX}{}", &digest[..HASH_HEX_LEN])
}

/// Storage type for a leaf kind
pub fn column_type(kind: LeafKind) -> &'static str {
    match kind {
        LeafKind::String | LeafKind::Chars | LeafKind::Char => "TEXT",
        LeafKind::I8 | LeafKind::U8 | LeafKind::I16 => "SMALLINT",
        LeafKind::U16 | LeafKind::I32 | LeafKind::Enum => "INTEGER",
        LeafKind::U32 | LeafKind::I64 | LeafKind::Duration => "BIGINT",
        LeafKind::U64 => "DECIMAL(20,0)",
        LeafKind::F32 => "REAL",
        LeafKind::F64 => "DOUBLE PRECISION",
        LeafKind::Bool => "BOOLEAN",
        LeafKind::Decimal => "DECIMAL",
        LeafKind::DateTime => "TIMESTAMP",
        LeafKind::Bytes => "BLOB",
    }
}

/// Validate a name and quote it as an SQL identifier
///
/// Names are wrapped in double quotes with embedded quotes doubled, so any
/// flattened path (`items[0].sku`) is usable. Empty names, control
/// characters and overly long names are rejected.
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(StorageError::invalid_identifier(name, "empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(StorageError::invalid_identifier(name, "too long"));
    }
    if name.chars().any(char::is_control) {
        return Err(StorageError::invalid_identifier(
            name,
            "contains control characters",
        ));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
