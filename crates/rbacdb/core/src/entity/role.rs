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

//! Roles, each holding an ordered set of permissions

use super::{ANONYMOUS, Composite, FieldError, Permission, Record, children_eq};
use crate::db_interface::Scalars;
use serde::{Deserialize, Serialize};

/// A named bundle of permissions assigned to users
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role name
    pub name: String,
    /// Held permissions, in stored order
    pub permissions: Vec<Permission>,
}

impl Role {
    /// Create a new role
    pub fn new(name: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self { name: name.into(), permissions }
    }

    /// Append a permission
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }
}

impl Record for Role {
    const TABLE: &'static str = "roles";
    const VARIANT: &'static str = "Role";

    fn name(&self) -> &str {
        &self.name
    }

    fn placeholder() -> Self {
        Self::new(ANONYMOUS, vec![Permission::placeholder()])
    }

    fn scalars(&self) -> Scalars {
        Scalars::new()
    }

    fn deep_eq(&self, other: &Self) -> bool {
        self.name == other.name && children_eq(&self.permissions, &other.permissions)
    }
}

impl Composite for Role {
    type Child = Permission;

    fn children(&self) -> &[Permission] {
        &self.permissions
    }

    fn with_children(&self, children: Vec<Permission>) -> Self {
        Self::new(self.name.clone(), children)
    }

    fn from_parts(name: String, _scalars: &Scalars, children: Vec<Permission>) -> Result<Self, FieldError> {
        Ok(Self::new(name, children))
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Action;

    #[test]
    fn test_deep_equality_reaches_actions() {
        let edit = Permission::new("edit", vec![Action::new("write", "d1")]);
        let edit_changed = Permission::new("edit", vec![Action::new("write", "d2")]);

        let role = Role::new("editor", vec![edit.clone()]);
        assert!(role.deep_eq(&Role::new("editor", vec![edit])));
        assert!(!role.deep_eq(&Role::new("editor", vec![edit_changed])));
    }

    #[test]
    fn test_placeholder_nests_placeholders() {
        let role = Role::placeholder();
        assert_eq!(role.name, "Anonymous");
        assert_eq!(role.permissions, vec![Permission::placeholder()]);
        assert_eq!(role.permissions[0].actions, vec![Action::placeholder()]);
    }
}
