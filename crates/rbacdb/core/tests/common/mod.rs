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

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use rbacdb_core::{Action, Database, DatabaseInterface, DbError, DbResult, DbStats, Permission, Role, Row, TableName, User};
use std::collections::HashSet;
use std::sync::Arc;

type Targets = Mutex<HashSet<(String, String)>>;

/// Database wrapper that fails chosen statements
///
/// `fail_*` rejects the statement before it runs. `commit_then_fail_*` lets
/// it apply and still reports an error, like a store whose write-through
/// failed after the change landed.
pub struct FaultyDatabase {
    inner: Database,
    failing_inserts: Targets,
    failing_deletes: Targets,
    committed_inserts: Targets,
    committed_deletes: Targets,
}

impl FaultyDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Database::new_in_memory("faulty"),
            failing_inserts: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            committed_inserts: Mutex::new(HashSet::new()),
            committed_deletes: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail_insert(&self, table: &str, key: &str) {
        self.failing_inserts.lock().insert((table.to_string(), key.to_string()));
    }

    pub fn fail_delete(&self, table: &str, key: &str) {
        self.failing_deletes.lock().insert((table.to_string(), key.to_string()));
    }

    pub fn commit_then_fail_insert(&self, table: &str, key: &str) {
        self.committed_inserts.lock().insert((table.to_string(), key.to_string()));
    }

    pub fn commit_then_fail_delete(&self, table: &str, key: &str) {
        self.committed_deletes.lock().insert((table.to_string(), key.to_string()));
    }

    /// Write a row directly, bypassing every store
    pub fn put_raw(&self, table: &str, row: Row) {
        self.inner.insert(&TableName::new(table), row).unwrap();
    }

    fn should_fail(set: &Targets, table: &TableName, key: &str) -> bool {
        set.lock().contains(&(table.as_str().to_string(), key.to_string()))
    }
}

impl DatabaseInterface for FaultyDatabase {
    fn insert(&self, table: &TableName, row: Row) -> DbResult<()> {
        if Self::should_fail(&self.failing_inserts, table, &row.key) {
            return Err(DbError::Unavailable(format!("injected insert failure for {}/{}", table, row.key)));
        }
        let key = row.key.clone();
        self.inner.insert(table, row)?;
        if Self::should_fail(&self.committed_inserts, table, &key) {
            return Err(DbError::Unavailable(format!("injected error after insert of {}/{}", table, key)));
        }
        Ok(())
    }

    fn select(&self, table: &TableName, key: &str) -> DbResult<Option<Row>> {
        self.inner.select(table, key)
    }

    fn select_keys(&self, table: &TableName) -> DbResult<Vec<String>> {
        self.inner.select_keys(table)
    }

    fn delete(&self, table: &TableName, key: &str) -> DbResult<bool> {
        if Self::should_fail(&self.failing_deletes, table, key) {
            return Err(DbError::Unavailable(format!("injected delete failure for {}/{}", table, key)));
        }
        let existed = self.inner.delete(table, key)?;
        if Self::should_fail(&self.committed_deletes, table, key) {
            return Err(DbError::Unavailable(format!("injected error after delete of {}/{}", table, key)));
        }
        Ok(existed)
    }

    fn stats(&self) -> DbStats {
        self.inner.stats()
    }

    fn flush(&self) -> DbResult<()> {
        self.inner.flush()
    }
}

pub fn memory_db() -> Arc<dyn DatabaseInterface> {
    Arc::new(Database::new_in_memory("test"))
}

pub fn action(name: &str) -> Action {
    Action::new(name, format!("{name} description"))
}

/// Action `read` in permission `view` in role `viewer` held by user `ada`
pub fn chain() -> (Action, Permission, Role, User) {
    let read = action("read");
    let view = Permission::new("view", vec![read.clone()]);
    let viewer = Role::new("viewer", vec![view.clone()]);
    let ada = User::with_id("ada", "u-ada", vec![viewer.clone()]);
    (read, view, viewer, ada)
}
