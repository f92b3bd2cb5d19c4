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

//! Mutation Notification
//!
//! Stores hold an explicit list of handlers. Before every update or delete the
//! store asks each handler to prepare, which is when a handler captures the
//! state it needs to react (a cascade observer snapshots the next layer).
//! After the mutation commits, each prepared handler receives the mutation
//! context exactly once.

use super::{EntityRef, StoreError, StoreResult};
use crate::entity::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModKind {
    Update,
    Delete,
}

impl fmt::Display for ModKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModKind::Update => write!(f, "update"),
            ModKind::Delete => write!(f, "delete"),
        }
    }
}

/// What changed: the entity before the mutation and the entity after it
#[derive(Debug, Clone)]
pub struct MutationContext<E> {
    pub kind: ModKind,
    pub original: Option<E>,
    pub modified: Option<E>,
}

impl<E: Record> MutationContext<E> {
    /// Context for an update of `original` into `modified`
    pub fn update(original: E, modified: E) -> Self {
        Self {
            kind: ModKind::Update,
            original: Some(original),
            modified: Some(modified),
        }
    }

    /// Context for a delete; the modified entity is the original itself
    pub fn delete(original: E) -> Self {
        Self {
            kind: ModKind::Delete,
            modified: Some(original.clone()),
            original: Some(original),
        }
    }

    /// Borrow the original and modified entities, rejecting incomplete contexts
    pub fn subject(&self) -> StoreResult<(&E, &E)> {
        match (&self.original, &self.modified) {
            (Some(original), Some(modified)) => Ok((original, modified)),
            (None, _) => Err(StoreError::InvalidSubject(format!("{} of {} carries no original entity", self.kind, E::TABLE))),
            (_, None) => Err(StoreError::InvalidSubject(format!("{} of {} carries no modified entity", self.kind, E::TABLE))),
        }
    }
}

/// Outcome of the rewrites triggered by one mutation, across every layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Entities rewritten, in the order the rewrites committed
    pub rewritten: Vec<EntityRef>,
    /// Entities whose rewrite failed and may now be inconsistent
    pub failed: Vec<EntityRef>,
}

impl CascadeReport {
    /// Fold the report of a nested cascade into this one
    pub fn merge(&mut self, other: CascadeReport) {
        self.rewritten.extend(other.rewritten);
        self.failed.extend(other.failed);
    }

    /// True when no rewrite failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fail with `CascadeFailure` naming the first entity left stale
    pub fn ensure_clean(&self) -> StoreResult<()> {
        match self.failed.first() {
            None => Ok(()),
            Some(entity) => Err(StoreError::CascadeFailure {
                entity: entity.clone(),
                reason: format!("{} of {} dependent rewrites failed", self.failed.len(), self.failed.len() + self.rewritten.len()),
            }),
        }
    }

    /// Number of rewrites of a given table
    pub fn rewrites_of(&self, table: &str) -> usize {
        self.rewritten.iter().filter(|entity| entity.table.as_str() == table).count()
    }
}

/// Reacts to committed mutations of a layer
pub trait MutationHandler<E: Record>: Send + Sync {
    /// Label used in logs
    fn label(&self) -> String;

    /// Capture whatever must be read before the store mutates
    fn prepare(&self) -> StoreResult<Box<dyn PreparedHandler<E> + '_>>;
}

/// A handler armed for exactly one mutation
pub trait PreparedHandler<E: Record> {
    fn handle_mutation(&self, context: &MutationContext<E>) -> CascadeReport;
}

/// Handler list owned by a store
pub struct Notifier<E: Record> {
    handlers: Vec<Arc<dyn MutationHandler<E>>>,
}

impl<E: Record> Notifier<E> {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Attach a handler
    pub fn register(&mut self, handler: Arc<dyn MutationHandler<E>>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Labels of the attached handlers
    pub fn labels(&self) -> Vec<String> {
        self.handlers.iter().map(|handler| handler.label()).collect()
    }

    /// Prepare every handler; fails as soon as one of them cannot
    pub fn prepare(&self) -> StoreResult<PreparedNotifier<'_, E>> {
        let prepared = self.handlers.iter().map(|handler| handler.prepare()).collect::<StoreResult<Vec<_>>>()?;
        Ok(PreparedNotifier { prepared })
    }
}

impl<E: Record> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Record> Clone for Notifier<E> {
    fn clone(&self) -> Self {
        Self { handlers: self.handlers.clone() }
    }
}

/// Handlers prepared for one mutation; consumed by [`PreparedNotifier::dispatch`]
pub struct PreparedNotifier<'a, E: Record> {
    prepared: Vec<Box<dyn PreparedHandler<E> + 'a>>,
}

impl<E: Record> PreparedNotifier<'_, E> {
    /// Deliver the context to every prepared handler, once each
    pub fn dispatch(self, context: &MutationContext<E>) -> CascadeReport {
        let mut report = CascadeReport::default();
        for handler in &self.prepared {
            report.merge(handler.handle_mutation(context));
        }
        report
    }
}
