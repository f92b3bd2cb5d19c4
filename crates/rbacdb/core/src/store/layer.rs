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

//! Layer Store Implementation
//!
//! CRUD over one table of the privilege graph. Updates are a delete followed
//! by a create; handlers see one notification per logical update, never one
//! for each half.

use super::{CascadeReport, EntityRef, MutationContext, MutationHandler, Notifier, RowCodec, StoreError, StoreResult};
use crate::db_interface::{DatabaseInterface, DbError, TableName};
use crate::entity::Record;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Table access shared by both store kinds
struct StoreTable<E: Record> {
    db: Arc<dyn DatabaseInterface>,
    table: TableName,
    codec: Arc<dyn RowCodec<E>>,
}

impl<E: Record> Clone for StoreTable<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            table: self.table.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<E: Record> StoreTable<E> {
    fn new(db: Arc<dyn DatabaseInterface>, codec: Arc<dyn RowCodec<E>>) -> Self {
        Self {
            db,
            table: TableName::new(E::TABLE),
            codec,
        }
    }

    fn entity_ref(&self, name: &str) -> EntityRef {
        EntityRef::new(self.table.clone(), name)
    }

    fn fetch(&self, name: &str) -> StoreResult<Option<E>> {
        match self.db.select(&self.table, name)? {
            Some(row) => Ok(Some(self.codec.unpack(&row)?)),
            None => Ok(None),
        }
    }

    fn read(&self, name: &str) -> E {
        match self.fetch(name) {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                debug!("{} not found, returning placeholder", self.entity_ref(name));
                E::placeholder()
            }
            Err(err) => {
                warn!("Failed to read {}: {}; returning placeholder", self.entity_ref(name), err);
                E::placeholder()
            }
        }
    }

    fn names(&self) -> StoreResult<Vec<String>> {
        Ok(self.db.select_keys(&self.table)?)
    }

    fn fetch_all(&self) -> StoreResult<Vec<E>> {
        let names = self.names()?;
        let mut entities = Vec::with_capacity(names.len());

        // Missing or unreadable rows come back as the placeholder
        for name in names {
            entities.push(self.read(&name));
        }

        Ok(entities)
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.db.contains(&self.table, name)?)
    }

    /// Insert the row for `entity`
    ///
    /// A failed statement may still have committed; the outcome is whatever
    /// the table holds afterwards.
    fn insert(&self, entity: &E) -> StoreResult<()> {
        let row = self.codec.pack(entity)?;
        match self.db.insert(&self.table, row) {
            Ok(()) => {}
            Err(DbError::DuplicateKey { .. }) => return Err(StoreError::Conflict(self.entity_ref(entity.name()))),
            Err(err) => {
                if matches!(self.exists(entity.name()), Ok(true)) {
                    warn!("Insert of {} reported an error but the row exists: {}", self.entity_ref(entity.name()), err);
                    return Ok(());
                }
                return Err(err.into());
            }
        }

        if !self.exists(entity.name())? {
            return Err(StoreError::NotFound(self.entity_ref(entity.name())));
        }
        Ok(())
    }

    /// Delete the row for `name`, succeeding once the row is confirmed gone
    fn remove(&self, name: &str) -> StoreResult<()> {
        match self.db.delete(&self.table, name) {
            Ok(true) => {}
            Ok(false) => return Err(StoreError::NotFound(self.entity_ref(name))),
            Err(err) => {
                if matches!(self.exists(name), Ok(false)) {
                    warn!("Delete of {} reported an error but the row is gone: {}", self.entity_ref(name), err);
                    return Ok(());
                }
                return Err(err.into());
            }
        }

        if self.exists(name)? {
            return Err(StoreError::InvalidRow {
                entity: self.entity_ref(name),
                reason: "row still present after delete".to_string(),
            });
        }
        Ok(())
    }
}

/// Log a failed fail-soft operation; expected failures stay at debug level
fn log_failure(operation: &str, err: &StoreError) {
    match err {
        StoreError::NotFound(_) | StoreError::Conflict(_) => debug!("{} rejected: {}", operation, err),
        _ => error!("{} failed: {}", operation, err),
    }
}

/// Read access to one layer, unable to mutate or notify
///
/// Codecs hold one of these for the child layer.
pub struct ReadOnlyStore<E: Record> {
    table: StoreTable<E>,
}

impl<E: Record> Clone for ReadOnlyStore<E> {
    fn clone(&self) -> Self {
        Self { table: self.table.clone() }
    }
}

impl<E: Record> ReadOnlyStore<E> {
    pub fn new(db: Arc<dyn DatabaseInterface>, codec: Arc<dyn RowCodec<E>>) -> Self {
        Self {
            table: StoreTable::new(db, codec),
        }
    }

    pub fn table_name(&self) -> &TableName {
        &self.table.table
    }

    /// Read an entity, `None` if absent
    pub fn try_read(&self, name: &str) -> StoreResult<Option<E>> {
        self.table.fetch(name)
    }

    /// Read an entity, falling back to the layer placeholder
    pub fn read(&self, name: &str) -> E {
        self.table.read(name)
    }

    /// Read every entity in key order; fails only if the table cannot be listed
    pub fn try_read_all(&self) -> StoreResult<Vec<E>> {
        self.table.fetch_all()
    }

    /// Read every entity; empty if the table cannot be listed
    pub fn read_all(&self) -> Vec<E> {
        self.table.fetch_all().unwrap_or_else(|err| {
            error!("Failed to read {}: {}", E::TABLE, err);
            Vec::new()
        })
    }

    pub fn exists(&self, name: &str) -> StoreResult<bool> {
        self.table.exists(name)
    }
}

/// CRUD access to one layer with mutation handlers attached
pub struct LayerStore<E: Record> {
    table: StoreTable<E>,
    notifier: Notifier<E>,
}

impl<E: Record> Clone for LayerStore<E> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<E: Record> LayerStore<E> {
    /// Create a store with no handlers
    pub fn new(db: Arc<dyn DatabaseInterface>, codec: Arc<dyn RowCodec<E>>) -> Self {
        Self {
            table: StoreTable::new(db, codec),
            notifier: Notifier::new(),
        }
    }

    /// Attach a mutation handler
    pub fn with_handler(mut self, handler: Arc<dyn MutationHandler<E>>) -> Self {
        self.notifier.register(handler);
        self
    }

    /// Labels of the attached handlers
    pub fn handlers(&self) -> Vec<String> {
        self.notifier.labels()
    }

    /// Read-only view of the same table
    pub fn read_only(&self) -> ReadOnlyStore<E> {
        ReadOnlyStore { table: self.table.clone() }
    }

    pub fn table_name(&self) -> &TableName {
        &self.table.table
    }

    /// Create an entity; fails with `Conflict` if the name is taken
    #[instrument(level = "debug", skip_all, fields(table = E::TABLE, name = entity.name()))]
    pub fn try_create(&self, entity: &E) -> StoreResult<()> {
        self.table.insert(entity)?;
        metrics::increment_counter!("rbacdb_store_mutations_total", "table" => E::TABLE, "op" => "create");
        info!("Created {}", self.table.entity_ref(entity.name()));
        Ok(())
    }

    /// Create an entity, returning whether its row now exists
    pub fn create(&self, entity: &E) -> bool {
        match self.try_create(entity) {
            Ok(()) => true,
            Err(err) => {
                log_failure("create", &err);
                false
            }
        }
    }

    pub fn try_read(&self, name: &str) -> StoreResult<Option<E>> {
        self.table.fetch(name)
    }

    /// Read an entity, falling back to the layer placeholder
    pub fn read(&self, name: &str) -> E {
        self.table.read(name)
    }

    pub fn try_read_all(&self) -> StoreResult<Vec<E>> {
        self.table.fetch_all()
    }

    /// Read every entity; empty if the table cannot be listed
    pub fn read_all(&self) -> Vec<E> {
        self.read_only().read_all()
    }

    pub fn exists(&self, name: &str) -> StoreResult<bool> {
        self.table.exists(name)
    }

    /// Names of every entity, in key order
    pub fn names(&self) -> StoreResult<Vec<String>> {
        self.table.names()
    }

    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.table.names()?.len())
    }

    /// Replace the entity stored under `name`
    ///
    /// The row is deleted and `entity` created in its place, which may carry a
    /// different name. Handlers are prepared before the delete and notified
    /// once after the create. There is no transaction around the two halves:
    /// if the create fails the entity stays absent.
    #[instrument(level = "debug", skip_all, fields(table = E::TABLE, name = %name))]
    pub fn try_update(&self, name: &str, entity: E) -> StoreResult<CascadeReport> {
        let original = self.table.fetch(name)?.ok_or_else(|| StoreError::NotFound(self.table.entity_ref(name)))?;

        if entity.name() != name && self.table.exists(entity.name())? {
            return Err(StoreError::Conflict(self.table.entity_ref(entity.name())));
        }

        let prepared = self.notifier.prepare()?;

        self.table.remove(name)?;
        if let Err(err) = self.table.insert(&entity) {
            error!("Update of {} removed the row but could not recreate it: {}", self.table.entity_ref(name), err);
            return Err(err);
        }

        metrics::increment_counter!("rbacdb_store_mutations_total", "table" => E::TABLE, "op" => "update");
        info!("Updated {}", self.table.entity_ref(name));

        Ok(prepared.dispatch(&MutationContext::update(original, entity)))
    }

    /// Replace the entity stored under `name`, returning whether it succeeded
    pub fn update(&self, name: &str, entity: E) -> bool {
        match self.try_update(name, entity) {
            Ok(report) => {
                if !report.is_clean() {
                    warn!("Update of {}/{} left {} dependent entities stale", E::TABLE, name, report.failed.len());
                }
                true
            }
            Err(err) => {
                log_failure("update", &err);
                false
            }
        }
    }

    /// Delete the entity stored under `name` and notify handlers once
    #[instrument(level = "debug", skip_all, fields(table = E::TABLE, name = %name))]
    pub fn try_delete(&self, name: &str) -> StoreResult<CascadeReport> {
        let original = self.table.fetch(name)?.ok_or_else(|| StoreError::NotFound(self.table.entity_ref(name)))?;
        let prepared = self.notifier.prepare()?;

        self.table.remove(name)?;

        metrics::increment_counter!("rbacdb_store_mutations_total", "table" => E::TABLE, "op" => "delete");
        info!("Deleted {}", self.table.entity_ref(name));

        Ok(prepared.dispatch(&MutationContext::delete(original)))
    }

    /// Delete the entity stored under `name`, returning whether it succeeded
    pub fn delete(&self, name: &str) -> bool {
        match self.try_delete(name) {
            Ok(report) => {
                if !report.is_clean() {
                    warn!("Delete of {}/{} left {} dependent entities stale", E::TABLE, name, report.failed.len());
                }
                true
            }
            Err(err) => {
                log_failure("delete", &err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_interface::{Database, Row};
    use crate::entity::Action;
    use crate::store::{LeafCodec, ModKind, PreparedHandler};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        prepared: Mutex<usize>,
        seen: Mutex<Vec<(ModKind, Action, Action)>>,
    }

    struct Armed<'a> {
        recorder: &'a Recorder,
    }

    impl MutationHandler<Action> for Recorder {
        fn label(&self) -> String {
            "recorder".to_string()
        }

        fn prepare(&self) -> StoreResult<Box<dyn PreparedHandler<Action> + '_>> {
            *self.prepared.lock() += 1;
            Ok(Box::new(Armed { recorder: self }))
        }
    }

    impl PreparedHandler<Action> for Armed<'_> {
        fn handle_mutation(&self, context: &MutationContext<Action>) -> CascadeReport {
            let (original, modified) = context.subject().unwrap();
            self.recorder.seen.lock().push((context.kind, original.clone(), modified.clone()));
            CascadeReport::default()
        }
    }

    fn setup() -> (Arc<Database>, LayerStore<Action>, Arc<Recorder>) {
        let db = Arc::new(Database::new_in_memory("test"));
        let recorder = Arc::new(Recorder::default());
        let store = LayerStore::<Action>::new(db.clone(), Arc::new(LeafCodec)).with_handler(recorder.clone());
        (db, store, recorder)
    }

    #[test]
    fn test_create_and_read() {
        let (_, store, _) = setup();
        let action = Action::new("read", "Read a document");

        assert!(store.create(&action));
        assert_eq!(store.read("read"), action);
        assert!(store.exists("read").unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_create_keeps_existing() {
        let (_, store, _) = setup();
        assert!(store.create(&Action::new("read", "first")));
        assert!(!store.create(&Action::new("read", "second")));
        assert!(store.try_create(&Action::new("read", "third")).unwrap_err().is_conflict());
        assert_eq!(store.read("read").description, "first");
    }

    #[test]
    fn test_read_missing_returns_placeholder() {
        let (_, store, _) = setup();
        assert_eq!(store.read("doesNotExist"), Action::new("No Access", "No Access"));
        assert_eq!(store.try_read("doesNotExist").unwrap(), None);
    }

    #[test]
    fn test_read_corrupt_row_returns_placeholder() {
        let (db, store, _) = setup();
        db.insert(&TableName::new("actions"), Row::new("broken", "Action")).unwrap();

        assert_eq!(store.read("broken"), Action::placeholder());
        assert!(matches!(store.try_read("broken"), Err(StoreError::InvalidRow { .. })));

        store.create(&Action::new("read", "r"));
        assert_eq!(store.read_all(), vec![Action::placeholder(), Action::new("read", "r")]);
    }

    #[test]
    fn test_read_all_in_name_order() {
        let (_, store, _) = setup();
        store.create(&Action::new("write", "w"));
        store.create(&Action::new("delete", "d"));
        store.create(&Action::new("read", "r"));

        let names: Vec<String> = store.read_all().into_iter().map(|action| action.name).collect();
        assert_eq!(names, vec!["delete", "read", "write"]);
        assert_eq!(store.read_all(), store.read_all());
    }

    #[test]
    fn test_update_notifies_once() {
        let (_, store, recorder) = setup();
        store.create(&Action::new("read", "d1"));

        assert!(store.update("read", Action::new("read", "d2")));
        assert_eq!(store.read("read").description, "d2");

        assert_eq!(*recorder.prepared.lock(), 1);
        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (ModKind::Update, Action::new("read", "d1"), Action::new("read", "d2")));
    }

    #[test]
    fn test_update_can_rename() {
        let (_, store, recorder) = setup();
        store.create(&Action::new("read", "r"));

        assert!(store.update("read", Action::new("view", "r")));
        assert!(!store.exists("read").unwrap());
        assert_eq!(store.read("view"), Action::new("view", "r"));
        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[test]
    fn test_update_rejects_rename_onto_existing() {
        let (_, store, recorder) = setup();
        store.create(&Action::new("read", "r"));
        store.create(&Action::new("view", "v"));

        assert!(!store.update("read", Action::new("view", "r")));
        assert_eq!(store.read("read"), Action::new("read", "r"));
        assert_eq!(store.read("view"), Action::new("view", "v"));
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn test_update_missing_does_nothing() {
        let (_, store, recorder) = setup();
        assert!(!store.update("ghost", Action::new("ghost", "g")));
        assert!(store.try_update("ghost", Action::new("ghost", "g")).unwrap_err().is_not_found());
        assert!(!store.exists("ghost").unwrap());
        assert_eq!(*recorder.prepared.lock(), 0);
    }

    #[test]
    fn test_delete_notifies_once_with_original() {
        let (_, store, recorder) = setup();
        store.create(&Action::new("read", "r"));

        assert!(store.delete("read"));
        assert!(!store.exists("read").unwrap());
        assert!(!store.delete("read"));

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (ModKind::Delete, Action::new("read", "r"), Action::new("read", "r")));
    }

    #[test]
    fn test_read_only_view_shares_table() {
        let (_, store, _) = setup();
        let view = store.read_only();
        store.create(&Action::new("read", "r"));

        assert_eq!(view.read("read"), Action::new("read", "r"));
        assert_eq!(view.table_name().as_str(), "actions");
        assert_eq!(store.handlers(), vec!["recorder"]);
    }
}
