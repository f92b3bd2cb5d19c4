// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Relational Store Interface
//!
//! This module provides the table abstraction the layer stores are built on.
//! A table is a set of rows addressed by a unique key; each row carries its
//! scalar columns, the packed list of child names and the variant tag of the
//! entity it encodes.
//!
//! # Features
//!
//! - Keyed insert/select/delete against named tables
//! - Duplicate-key rejection on insert
//! - Optional JSON file persistence with write-through flushing
//! - Statement counters for monitoring

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Statement kinds tracked in the statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOperation {
    Insert,
    Select,
    Delete,
    Flush,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Flush the table file after every mutating statement
    pub sync_writes: bool,
    /// Pretty-print the persisted table file
    pub pretty: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { sync_writes: true, pretty: true }
    }
}

/// Database error types
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Duplicate key {key} in table {table}")]
    DuplicateKey { table: TableName, key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Type alias for database operation results
pub type DbResult<T> = Result<T, DbError>;

/// Table name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableName(pub String);

impl TableName {
    /// Create a new table name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TableName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Scalar columns of a row, by column name
pub type Scalars = BTreeMap<String, serde_json::Value>;

/// A single table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Unique key of the row within its table
    pub key: String,
    /// Scalar columns
    pub scalars: Scalars,
    /// Packed list of child names
    pub packed_children: String,
    /// Tag naming the concrete entity variant stored in the row
    pub variant_tag: String,
}

impl Row {
    /// Create an empty row for a key and variant
    pub fn new(key: impl Into<String>, variant_tag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            scalars: Scalars::new(),
            packed_children: "[]".to_string(),
            variant_tag: variant_tag.into(),
        }
    }

    /// Set a scalar column
    pub fn with_scalar(mut self, column: impl Into<String>, value: serde_json::Value) -> Self {
        self.scalars.insert(column.into(), value);
        self
    }

    /// Set the packed children column
    pub fn with_packed_children(mut self, packed: impl Into<String>) -> Self {
        self.packed_children = packed.into();
        self
    }
}

/// Database statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbStats {
    pub select_count: u64,
    pub insert_count: u64,
    pub delete_count: u64,
    pub flush_count: u64,
    pub rejected_inserts: u64,
}

/// Relational store interface
///
/// Each call is one statement; implementations serialize individual
/// statements but offer no transaction spanning several of them.
pub trait DatabaseInterface: Send + Sync {
    /// Insert a row, failing with `DuplicateKey` if the key is taken
    fn insert(&self, table: &TableName, row: Row) -> DbResult<()>;

    /// Select a row by key
    fn select(&self, table: &TableName, key: &str) -> DbResult<Option<Row>>;

    /// Select every key of a table, in key order
    fn select_keys(&self, table: &TableName) -> DbResult<Vec<String>>;

    /// Delete a row by key, returning whether it existed
    fn delete(&self, table: &TableName, key: &str) -> DbResult<bool>;

    /// Check if a key exists
    fn contains(&self, table: &TableName, key: &str) -> DbResult<bool> {
        Ok(self.select(table, key)?.is_some())
    }

    /// Get database statistics
    fn stats(&self) -> DbStats;

    /// Flush any pending writes
    fn flush(&self) -> DbResult<()>;
}

type Tables = BTreeMap<TableName, BTreeMap<String, Row>>;

/// Table store held in memory, optionally mirrored to a JSON file
pub struct Database {
    /// Database name
    name: String,

    /// Database configuration
    config: DbConfig,

    /// Backing file, `None` for in-memory databases
    path: Option<PathBuf>,

    /// Table contents
    tables: Arc<RwLock<Tables>>,

    /// Database statistics
    stats: Arc<RwLock<DbStats>>,
}

impl Database {
    /// Create a new in-memory database
    pub fn new_in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: DbConfig::default(),
            path: None,
            tables: Arc::new(RwLock::new(Tables::new())),
            stats: Arc::new(RwLock::new(DbStats::default())),
        }
    }

    /// Open (or create) a database stored as `<dir>/<name>.json`
    pub fn open<P: AsRef<Path>>(dir: P, name: &str, config: DbConfig) -> DbResult<Self> {
        std::fs::create_dir_all(&dir)?;
        let path = dir.as_ref().join(format!("{name}.json"));

        let tables = if path.exists() {
            let data = std::fs::read(&path)?;
            let persisted: BTreeMap<String, Vec<Row>> = serde_json::from_slice(&data)?;
            persisted
                .into_iter()
                .map(|(table, rows)| (TableName::new(table), rows.into_iter().map(|row| (row.key.clone(), row)).collect()))
                .collect()
        } else {
            Tables::new()
        };

        info!("Opened database {} at {}", name, path.display());

        Ok(Self {
            name: name.to_string(),
            config,
            path: Some(path),
            tables: Arc::new(RwLock::new(tables)),
            stats: Arc::new(RwLock::new(DbStats::default())),
        })
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the tables to the backing file
    fn persist(&self, tables: &Tables) -> DbResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let persisted: BTreeMap<&str, Vec<&Row>> = tables.iter().map(|(table, rows)| (table.as_str(), rows.values().collect())).collect();
        let data = if self.config.pretty { serde_json::to_vec_pretty(&persisted)? } else { serde_json::to_vec(&persisted)? };

        // Write to a sibling file, then rename over the target
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;

        self.update_stats(DbOperation::Flush);
        debug!("Flushed database {} to {}", self.name, path.display());
        Ok(())
    }

    /// Persist after a mutating statement when write-through is enabled
    fn after_write(&self, tables: &Tables) -> DbResult<()> {
        if self.config.sync_writes { self.persist(tables) } else { Ok(()) }
    }

    /// Update statistics
    fn update_stats(&self, operation: DbOperation) {
        let mut stats = self.stats.write();
        match operation {
            DbOperation::Insert => stats.insert_count += 1,
            DbOperation::Select => stats.select_count += 1,
            DbOperation::Delete => stats.delete_count += 1,
            DbOperation::Flush => stats.flush_count += 1,
        }
    }
}

impl DatabaseInterface for Database {
    fn insert(&self, table: &TableName, row: Row) -> DbResult<()> {
        let mut tables = self.tables.write();
        let rows = tables.entry(table.clone()).or_default();

        if rows.contains_key(&row.key) {
            self.stats.write().rejected_inserts += 1;
            return Err(DbError::DuplicateKey { table: table.clone(), key: row.key });
        }

        let key = row.key.clone();
        rows.insert(key.clone(), row);

        // A statement whose write-through fails is rolled back
        if let Err(err) = self.after_write(&tables) {
            if let Some(rows) = tables.get_mut(table) {
                rows.remove(&key);
            }
            return Err(err);
        }

        self.update_stats(DbOperation::Insert);
        Ok(())
    }

    fn select(&self, table: &TableName, key: &str) -> DbResult<Option<Row>> {
        let tables = self.tables.read();
        self.update_stats(DbOperation::Select);
        Ok(tables.get(table).and_then(|rows| rows.get(key)).cloned())
    }

    fn select_keys(&self, table: &TableName) -> DbResult<Vec<String>> {
        let tables = self.tables.read();
        self.update_stats(DbOperation::Select);
        Ok(tables.get(table).map(|rows| rows.keys().cloned().collect()).unwrap_or_default())
    }

    fn delete(&self, table: &TableName, key: &str) -> DbResult<bool> {
        let mut tables = self.tables.write();
        let Some(removed) = tables.get_mut(table).and_then(|rows| rows.remove(key)) else {
            self.update_stats(DbOperation::Delete);
            return Ok(false);
        };

        if let Err(err) = self.after_write(&tables) {
            tables.entry(table.clone()).or_default().insert(key.to_string(), removed);
            return Err(err);
        }

        self.update_stats(DbOperation::Delete);
        Ok(true)
    }

    fn stats(&self) -> DbStats {
        self.stats.read().clone()
    }

    fn flush(&self) -> DbResult<()> {
        let tables = self.tables.read();
        self.persist(&tables)
    }
}
