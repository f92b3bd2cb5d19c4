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

//! Store Registry
//!
//! Wiring of stores, codecs and cascade observers, plus the registry holding
//! one database connection per database name.
//!
//! Every layer has two factories. `read_only_*_store` builds a store that can
//! only read; codecs use these to resolve children. `observing_*_store` builds
//! the full CRUD store with the cascade observer into the next layer attached.
//! Observers only ever point upward (actions → permissions → roles → users)
//! and codecs only ever hold read-only stores, so constructing any observing
//! store builds a finite chain of at most four stores.

use crate::cascade::CascadeObserver;
use crate::db_interface::{Database, DatabaseInterface, DbConfig};
use crate::entity::{Action, Permission, Role, User};
use crate::store::{CompositeCodec, LayerStore, LeafCodec, ReadOnlyStore, RowCodec, StoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

fn action_codec() -> Arc<dyn RowCodec<Action>> {
    Arc::new(LeafCodec)
}

fn permission_codec(db: &Arc<dyn DatabaseInterface>) -> Arc<dyn RowCodec<Permission>> {
    Arc::new(CompositeCodec::<Permission>::new(read_only_action_store(db.clone())))
}

fn role_codec(db: &Arc<dyn DatabaseInterface>) -> Arc<dyn RowCodec<Role>> {
    Arc::new(CompositeCodec::<Role>::new(read_only_permission_store(db.clone())))
}

fn user_codec(db: &Arc<dyn DatabaseInterface>) -> Arc<dyn RowCodec<User>> {
    Arc::new(CompositeCodec::<User>::new(read_only_role_store(db.clone())))
}

pub fn read_only_action_store(db: Arc<dyn DatabaseInterface>) -> ReadOnlyStore<Action> {
    ReadOnlyStore::new(db, action_codec())
}

pub fn read_only_permission_store(db: Arc<dyn DatabaseInterface>) -> ReadOnlyStore<Permission> {
    let codec = permission_codec(&db);
    ReadOnlyStore::new(db, codec)
}

pub fn read_only_role_store(db: Arc<dyn DatabaseInterface>) -> ReadOnlyStore<Role> {
    let codec = role_codec(&db);
    ReadOnlyStore::new(db, codec)
}

pub fn read_only_user_store(db: Arc<dyn DatabaseInterface>) -> ReadOnlyStore<User> {
    let codec = user_codec(&db);
    ReadOnlyStore::new(db, codec)
}

/// User store; users are the top layer, so nothing observes them
pub fn observing_user_store(db: Arc<dyn DatabaseInterface>) -> LayerStore<User> {
    let codec = user_codec(&db);
    LayerStore::new(db, codec)
}

/// Role store cascading into users
pub fn observing_role_store(db: Arc<dyn DatabaseInterface>) -> LayerStore<Role> {
    let codec = role_codec(&db);
    let observer = CascadeObserver::new(observing_user_store(db.clone()));
    LayerStore::new(db, codec).with_handler(Arc::new(observer))
}

/// Permission store cascading into roles, and through them into users
pub fn observing_permission_store(db: Arc<dyn DatabaseInterface>) -> LayerStore<Permission> {
    let codec = permission_codec(&db);
    let observer = CascadeObserver::new(observing_role_store(db.clone()));
    LayerStore::new(db, codec).with_handler(Arc::new(observer))
}

/// Action store cascading into permissions, roles and users
pub fn observing_action_store(db: Arc<dyn DatabaseInterface>) -> LayerStore<Action> {
    let observer = CascadeObserver::new(observing_permission_store(db.clone()));
    LayerStore::new(db, action_codec()).with_handler(Arc::new(observer))
}

/// Registry of open databases, one connection per database name
///
/// Constructed once at startup and passed to whatever needs stores.
pub struct StoreRegistry {
    data_dir: Option<PathBuf>,
    config: DbConfig,
    databases: RwLock<HashMap<String, Arc<dyn DatabaseInterface>>>,
}

impl StoreRegistry {
    /// Registry whose databases live in memory only
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            config: DbConfig::default(),
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// Registry opening databases as JSON files under `data_dir`
    pub fn persistent(data_dir: impl Into<PathBuf>, config: DbConfig) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            config,
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// Use an existing connection for a database name
    pub fn register(&self, name: impl Into<String>, db: Arc<dyn DatabaseInterface>) {
        self.databases.write().insert(name.into(), db);
    }

    /// Connection for a database name, opened on first use
    pub fn database(&self, name: &str) -> StoreResult<Arc<dyn DatabaseInterface>> {
        if let Some(db) = self.databases.read().get(name) {
            return Ok(db.clone());
        }

        let mut databases = self.databases.write();
        // Another caller may have opened it between the two locks
        if let Some(db) = databases.get(name) {
            return Ok(db.clone());
        }

        let db: Arc<dyn DatabaseInterface> = match &self.data_dir {
            Some(dir) => Arc::new(Database::open(dir, name, self.config.clone())?),
            None => Arc::new(Database::new_in_memory(name)),
        };
        info!("Registered database {}", name);
        databases.insert(name.to_string(), db.clone());
        Ok(db)
    }

    /// Names of the databases opened so far
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Flush every open database
    pub fn flush_all(&self) -> StoreResult<()> {
        for db in self.databases.read().values() {
            db.flush()?;
        }
        Ok(())
    }

    pub fn observing_action_store(&self, database: &str) -> StoreResult<LayerStore<Action>> {
        Ok(observing_action_store(self.database(database)?))
    }

    pub fn observing_permission_store(&self, database: &str) -> StoreResult<LayerStore<Permission>> {
        Ok(observing_permission_store(self.database(database)?))
    }

    pub fn observing_role_store(&self, database: &str) -> StoreResult<LayerStore<Role>> {
        Ok(observing_role_store(self.database(database)?))
    }

    pub fn observing_user_store(&self, database: &str) -> StoreResult<LayerStore<User>> {
        Ok(observing_user_store(self.database(database)?))
    }

    pub fn read_only_action_store(&self, database: &str) -> StoreResult<ReadOnlyStore<Action>> {
        Ok(read_only_action_store(self.database(database)?))
    }

    pub fn read_only_permission_store(&self, database: &str) -> StoreResult<ReadOnlyStore<Permission>> {
        Ok(read_only_permission_store(self.database(database)?))
    }

    pub fn read_only_role_store(&self, database: &str) -> StoreResult<ReadOnlyStore<Role>> {
        Ok(read_only_role_store(self.database(database)?))
    }

    pub fn read_only_user_store(&self, database: &str) -> StoreResult<ReadOnlyStore<User>> {
        Ok(read_only_user_store(self.database(database)?))
    }
}
