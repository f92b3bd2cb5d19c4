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

//! RbacDB Core
//!
//! Persistence layer for a role-based access-control graph. Four layers of
//! entities (actions, permissions, roles, users) are stored in their own
//! tables, each row holding a packed list of the names of its children.
//!
//! Mutations at one layer are propagated to every dependent layer by cascade
//! observers attached to the layer stores, so the denormalized rows never keep
//! a stale copy of an entity that was updated or deleted below them.

pub mod cascade;
pub mod db_interface;
pub mod entity;
pub mod registry;
pub mod store;

pub use cascade::{CascadeObserver, CascadeStats, Snapshot, rebuild_children};
pub use db_interface::{Database, DatabaseInterface, DbConfig, DbError, DbResult, DbStats, Row, Scalars, TableName};
pub use entity::{Action, Composite, Leaf, Permission, Record, Role, User};
pub use registry::{
    StoreRegistry, observing_action_store, observing_permission_store, observing_role_store, observing_user_store, read_only_action_store, read_only_permission_store,
    read_only_role_store, read_only_user_store,
};
pub use store::{
    CascadeReport, CompositeCodec, EntityRef, LayerStore, LeafCodec, ModKind, MutationContext, MutationHandler, Notifier, PreparedHandler, ReadOnlyStore, RowCodec, StoreError,
    StoreResult,
};
