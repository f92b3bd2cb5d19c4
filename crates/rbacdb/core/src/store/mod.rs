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

//! Layer Stores
//!
//! This module provides the CRUD stores for the four entity layers. A single
//! generic store serves every layer; what differs per layer is the row codec
//! (how children are packed and unpacked) and the list of mutation handlers
//! attached to it.
//!
//! Two kinds of store exist:
//!
//! - [`LayerStore`]: full CRUD, notifies its handlers after every committed
//!   update or delete.
//! - [`ReadOnlyStore`]: reads only. Codecs use it to resolve children, so a
//!   store built for unpacking can never start a cascade of its own.

pub mod codec;
pub mod layer;
pub mod notifier;

pub use codec::*;
pub use layer::*;
pub use notifier::*;

use crate::db_interface::{DbError, TableName};
use std::fmt;

/// Reference to a single entity, for reports and logs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub table: TableName,
    pub name: String,
}

impl EntityRef {
    pub fn new(table: impl Into<TableName>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.name)
    }
}

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Entity not found: {0}")]
    NotFound(EntityRef),

    #[error("Entity already exists: {0}")]
    Conflict(EntityRef),

    #[error("Invalid row {entity}: {reason}")]
    InvalidRow { entity: EntityRef, reason: String },

    #[error("Invalid mutation subject: {0}")]
    InvalidSubject(String),

    #[error("Cascade failed for {entity}: {reason}")]
    CascadeFailure { entity: EntityRef, reason: String },
}

impl StoreError {
    /// Whether the error reports a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Whether the error reports a name collision
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Type alias for store operation results
pub type StoreResult<T> = Result<T, StoreError>;
