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

//! Entity Model
//!
//! The four layers of the privilege graph, leaves first: actions, permissions,
//! roles and users. Every layer above actions owns an ordered set of entities
//! from the layer directly below it, held by value.
//!
//! Equality between entities is structural and deep: two permissions are
//! equal when their names match and their action lists are pairwise equal.
//! Cascade matching relies on exactly this comparison, so every layer spells
//! it out in [`Record::deep_eq`] rather than deriving it.

pub mod action;
pub mod permission;
pub mod role;
pub mod user;

pub use action::*;
pub use permission::*;
pub use role::*;
pub use user::*;

use crate::db_interface::Scalars;
use std::collections::BTreeMap;
use std::fmt;

/// Name used by every placeholder entity above the action layer
pub const ANONYMOUS: &str = "Anonymous";

/// An entity stored in one table of the privilege graph
pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    /// Table holding this layer
    const TABLE: &'static str;

    /// Variant tag written alongside every row of this layer
    const VARIANT: &'static str;

    /// Unique key within the layer
    fn name(&self) -> &str;

    /// Fallback value returned when a requested name does not exist
    fn placeholder() -> Self;

    /// Scalar columns persisted for this entity
    fn scalars(&self) -> Scalars;

    /// Structural equality including nested child sets
    fn deep_eq(&self, other: &Self) -> bool;
}

/// An entity without children
pub trait Leaf: Record {
    /// Rebuild the entity from its key and scalar columns
    fn from_scalars(name: String, scalars: &Scalars) -> Result<Self, FieldError>;
}

/// An entity owning an ordered set of entities from the layer below
pub trait Composite: Record {
    type Child: Record;

    /// Children in stored order
    fn children(&self) -> &[Self::Child];

    /// Copy of this entity with its child set replaced
    fn with_children(&self, children: Vec<Self::Child>) -> Self;

    /// Rebuild the entity from its key, scalar columns and resolved children
    fn from_parts(name: String, scalars: &Scalars, children: Vec<Self::Child>) -> Result<Self, FieldError>;
}

/// Errors raised while rebuilding an entity from stored columns
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("missing column {0}")]
    Missing(&'static str),

    #[error("column {column} is not {expected}")]
    WrongType { column: &'static str, expected: &'static str },
}

/// Check whether a child set holds a value equal to `target`
pub fn contains_equal<C: Record>(children: &[C], target: &C) -> bool {
    children.iter().any(|child| child.deep_eq(target))
}

/// Pairwise deep equality of two child sets
pub fn children_eq<C: Record>(left: &[C], right: &[C]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l.deep_eq(r))
}

/// Read a string column
pub(crate) fn string_column(scalars: &Scalars, column: &'static str) -> Result<String, FieldError> {
    match scalars.get(column) {
        Some(serde_json::Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(FieldError::WrongType { column, expected: "a string" }),
        None => Err(FieldError::Missing(column)),
    }
}

/// Read a string-to-string map column; an absent column is an empty map
pub(crate) fn map_column(scalars: &Scalars, column: &'static str) -> Result<BTreeMap<String, String>, FieldError> {
    match scalars.get(column) {
        Some(value) => serde_json::from_value(value.clone()).map_err(|_| FieldError::WrongType { column, expected: "a map of strings" }),
        None => Ok(BTreeMap::new()),
    }
}
