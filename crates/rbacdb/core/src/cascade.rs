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

//! Cascade Observers
//!
//! One observer sits on each layer boundary (action → permission,
//! permission → role, role → user). It is attached to the store of the lower
//! layer and owns an observing store for the upper one.
//!
//! Before the lower store mutates, the observer snapshots every entity of the
//! upper layer. Matching must happen against that snapshot: once the lower
//! row has changed, a fresh read of the upper layer reconstructs children
//! from the new state and no longer contains the original value.
//!
//! After the mutation the observer rewrites every snapshotted entity whose
//! child set held the original, through the upper store's `update`. That
//! update runs the same protocol one layer further up, which makes the
//! cascade transitive. Rewrites are independent of each other; a failed one
//! is logged and reported, never rolled back.

use crate::entity::{Composite, Record, contains_equal};
use crate::store::{CascadeReport, EntityRef, LayerStore, ModKind, MutationContext, MutationHandler, PreparedHandler, StoreError, StoreResult};
use parking_lot::Mutex;
use tracing::{debug, error, info};

/// Copy of an entire layer taken before a mutation below it
#[derive(Debug, Clone)]
pub struct Snapshot<P> {
    entities: Vec<P>,
}

impl<P: Composite> Snapshot<P> {
    pub fn new(entities: Vec<P>) -> Self {
        Self { entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[P] {
        &self.entities
    }

    /// Entities whose child set holds a value equal to `original`
    pub fn affected_by<'a>(&'a self, original: &'a P::Child) -> impl Iterator<Item = &'a P> + 'a {
        self.entities.iter().filter(move |entity| contains_equal(entity.children(), original))
    }
}

/// Counters kept by each observer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeStats {
    /// Notifications handled
    pub passes: u64,
    /// Upper-layer entities rewritten
    pub rewrites: u64,
    /// Upper-layer rewrites that failed
    pub failures: u64,
    /// Notifications rejected for an incomplete context
    pub skipped: u64,
}

/// Child set of an affected entity after a mutation of one of its children
///
/// Children equal to `original` or `modified` are dropped, the remaining ones
/// keep their relative order, and for an update `modified` is appended.
/// Every layer the cascade reaches applies the same rule, so a parent holding
/// several rewritten children ends with them moved to the back in rewrite
/// order: renaming an action shared by `p1` and `p2` turns role
/// `[p1, p2, p3]` into `[p3, p1', p2']`.
pub fn rebuild_children<C: Record>(children: &[C], original: &C, modified: &C, kind: ModKind) -> Vec<C> {
    let mut rebuilt: Vec<C> = children.iter().filter(|child| !child.deep_eq(original) && !child.deep_eq(modified)).cloned().collect();

    if kind == ModKind::Update {
        rebuilt.push(modified.clone());
    }
    rebuilt
}

/// Propagates mutations of `P::Child` into the layer `P`
pub struct CascadeObserver<P: Composite> {
    next: LayerStore<P>,
    stats: Mutex<CascadeStats>,
}

impl<P: Composite> CascadeObserver<P> {
    /// Create an observer rewriting through `next`, which should itself be an
    /// observing store so the cascade continues upward
    pub fn new(next: LayerStore<P>) -> Self {
        Self {
            next,
            stats: Mutex::new(CascadeStats::default()),
        }
    }

    /// Store used for the rewrites
    pub fn next_store(&self) -> &LayerStore<P> {
        &self.next
    }

    pub fn stats(&self) -> CascadeStats {
        *self.stats.lock()
    }

    /// Capture the upper layer as it is right now
    pub fn snapshot(&self) -> StoreResult<Snapshot<P>> {
        Ok(Snapshot::new(self.next.try_read_all()?))
    }

    /// Rewrite every entity of `snapshot` affected by `context`
    pub fn notify(&self, snapshot: &Snapshot<P>, context: &MutationContext<P::Child>) -> CascadeReport {
        let (original, modified) = match context.subject() {
            Ok(subject) => subject,
            Err(err) => {
                error!("Skipping cascade into {}: {}", P::TABLE, err);
                self.stats.lock().skipped += 1;
                return CascadeReport::default();
            }
        };

        self.stats.lock().passes += 1;
        metrics::increment_counter!("rbacdb_cascade_passes_total", "table" => P::TABLE);

        let mut report = CascadeReport::default();
        for entity in snapshot.affected_by(original) {
            let children = rebuild_children(entity.children(), original, modified, context.kind);
            let replacement = entity.with_children(children);
            let entity_ref = EntityRef::new(P::TABLE, entity.name());

            debug!("Cascading {} of {}/{} into {}", context.kind, <P::Child as Record>::TABLE, original.name(), entity_ref);

            match self.next.try_update(entity.name(), replacement) {
                Ok(upstream) => {
                    self.stats.lock().rewrites += 1;
                    metrics::increment_counter!("rbacdb_cascade_rewrites_total", "table" => P::TABLE);
                    report.rewritten.push(entity_ref);
                    report.merge(upstream);
                }
                Err(err) => {
                    self.stats.lock().failures += 1;
                    metrics::increment_counter!("rbacdb_cascade_failures_total", "table" => P::TABLE);
                    let failure = StoreError::CascadeFailure {
                        entity: entity_ref.clone(),
                        reason: err.to_string(),
                    };
                    error!("{}; data may be inconsistent and need manual repair", failure);
                    report.failed.push(entity_ref);
                }
            }
        }

        if !report.rewritten.is_empty() || !report.failed.is_empty() {
            info!(
                "Cascade of {} {}/{}: {} rewritten, {} failed",
                context.kind,
                <P::Child as Record>::TABLE,
                original.name(),
                report.rewritten.len(),
                report.failed.len()
            );
        }
        report
    }
}

impl<P: Composite> MutationHandler<P::Child> for CascadeObserver<P> {
    fn label(&self) -> String {
        format!("cascade {} -> {}", <P::Child as Record>::TABLE, P::TABLE)
    }

    fn prepare(&self) -> StoreResult<Box<dyn PreparedHandler<P::Child> + '_>> {
        let snapshot = self.snapshot()?;
        Ok(Box::new(PreparedCascade { observer: self, snapshot }))
    }
}

/// Observer paired with the snapshot taken for one mutation
struct PreparedCascade<'a, P: Composite> {
    observer: &'a CascadeObserver<P>,
    snapshot: Snapshot<P>,
}

impl<P: Composite> PreparedHandler<P::Child> for PreparedCascade<'_, P> {
    fn handle_mutation(&self, context: &MutationContext<P::Child>) -> CascadeReport {
        self.observer.notify(&self.snapshot, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_interface::{Database, DatabaseInterface};
    use crate::entity::{Action, Permission};
    use crate::store::{CompositeCodec, LeafCodec, ReadOnlyStore};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn permission_store(db: Arc<dyn DatabaseInterface>) -> LayerStore<Permission> {
        let actions = ReadOnlyStore::<Action>::new(db.clone(), Arc::new(LeafCodec));
        LayerStore::new(db, Arc::new(CompositeCodec::<Permission>::new(actions)))
    }

    fn action(name: &str) -> Action {
        Action::new(name, format!("{name} things"))
    }

    #[test]
    fn test_rebuild_update_appends_modified() {
        let children = vec![action("a"), action("b"), action("c")];
        let modified = Action::new("b", "changed");

        let rebuilt = rebuild_children(&children, &action("b"), &modified, ModKind::Update);
        assert_eq!(rebuilt, vec![action("a"), action("c"), modified]);
    }

    #[test]
    fn test_rebuild_delete_removes_every_copy() {
        let children = vec![action("a"), action("b"), action("a")];
        let rebuilt = rebuild_children(&children, &action("a"), &action("a"), ModKind::Delete);
        assert_eq!(rebuilt, vec![action("b")]);
    }

    #[test]
    fn test_rebuild_does_not_duplicate_existing_modified() {
        let modified = Action::new("a", "new");
        let children = vec![action("a"), modified.clone()];
        let rebuilt = rebuild_children(&children, &action("a"), &modified, ModKind::Update);
        assert_eq!(rebuilt, vec![modified]);
    }

    #[test]
    fn test_snapshot_matching_is_structural() {
        let snapshot = Snapshot::new(vec![
            Permission::new("p1", vec![action("a")]),
            Permission::new("p2", vec![Action::new("a", "other description")]),
            Permission::new("p3", vec![action("b"), action("a")]),
        ]);

        let original = action("a");
        let affected: Vec<&str> = snapshot.affected_by(&original).map(|p| p.name.as_str()).collect();
        assert_eq!(affected, vec!["p1", "p3"]);
    }

    #[test]
    fn test_notify_rewrites_affected_entities() {
        let db: Arc<dyn DatabaseInterface> = Arc::new(Database::new_in_memory("test"));
        let actions = LayerStore::<Action>::new(db.clone(), Arc::new(LeafCodec));
        let observer = CascadeObserver::new(permission_store(db.clone()));

        actions.create(&action("a"));
        actions.create(&action("b"));
        observer.next_store().create(&Permission::new("p1", vec![action("a"), action("b")]));
        observer.next_store().create(&Permission::new("p2", vec![action("b")]));

        let snapshot = observer.snapshot().unwrap();
        actions.try_update("a", Action::new("z", "renamed")).unwrap();

        let report = observer.notify(&snapshot, &MutationContext::update(action("a"), Action::new("z", "renamed")));
        assert_eq!(report.rewritten, vec![EntityRef::new("permissions", "p1")]);
        assert!(report.is_clean());

        let p1 = observer.next_store().read("p1");
        assert_eq!(p1.actions, vec![action("b"), Action::new("z", "renamed")]);
        assert_eq!(observer.next_store().read("p2").actions, vec![action("b")]);

        let stats = observer.stats();
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.rewrites, 1);
        assert_eq!(stats.failures, 0);
    }

    #[test]
    fn test_notify_skips_incomplete_context() {
        let db: Arc<dyn DatabaseInterface> = Arc::new(Database::new_in_memory("test"));
        let observer = CascadeObserver::new(permission_store(db));
        observer.next_store().create(&Permission::new("p1", vec![action("a")]));

        let snapshot = observer.snapshot().unwrap();
        let context = MutationContext {
            kind: ModKind::Delete,
            original: None,
            modified: Some(action("a")),
        };

        let report = observer.notify(&snapshot, &context);
        assert_eq!(report, CascadeReport::default());
        assert_eq!(observer.stats().skipped, 1);
        assert_eq!(observer.stats().passes, 0);
        assert_eq!(observer.next_store().read("p1").actions, vec![action("a")]);
    }

    #[test]
    fn test_label_names_both_layers() {
        let db: Arc<dyn DatabaseInterface> = Arc::new(Database::new_in_memory("test"));
        let observer = CascadeObserver::new(permission_store(db));
        assert_eq!(observer.label(), "cascade actions -> permissions");
    }

    proptest! {
        #[test]
        fn prop_rebuild_keeps_sibling_order(names in prop::collection::vec("[a-e]", 0..8), target in "[a-e]", update in any::<bool>()) {
            let children: Vec<Action> = names.iter().map(|n| action(n)).collect();
            let original = action(&target);
            let modified = Action::new(target.clone(), "modified");
            let kind = if update { ModKind::Update } else { ModKind::Delete };
            let modified = if update { modified } else { original.clone() };

            let rebuilt = rebuild_children(&children, &original, &modified, kind);

            let siblings: Vec<Action> = children.iter().filter(|c| c.name != target).cloned().collect();
            let kept: Vec<Action> = rebuilt.iter().filter(|c| c.name != target).cloned().collect();
            prop_assert_eq!(kept, siblings);
            prop_assert!(!contains_equal(&rebuilt, &original));
            if update {
                prop_assert_eq!(rebuilt.last(), Some(&modified));
                prop_assert_eq!(rebuilt.iter().filter(|c| c.deep_eq(&modified)).count(), 1);
            } else {
                prop_assert!(!rebuilt.iter().any(|c| c.name == target));
            }
        }
    }
}
