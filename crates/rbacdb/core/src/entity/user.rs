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

//! Users, the top layer of the privilege graph

use super::{ANONYMOUS, Composite, FieldError, Record, Role, children_eq, map_column, string_column};
use crate::db_interface::Scalars;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of the placeholder user
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// An account holding an ordered set of roles
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique login name
    pub user_name: String,
    /// Stable identifier, independent of the login name
    pub user_id: String,
    /// Metadata visible to other users
    pub public_meta: BTreeMap<String, String>,
    /// Metadata visible only to the user and administrators
    pub private_meta: BTreeMap<String, String>,
    /// Assigned roles, in stored order
    pub roles: Vec<Role>,
}

impl User {
    /// Create a user with a freshly generated identifier
    pub fn new(user_name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self::with_id(user_name, Uuid::new_v4().to_string(), roles)
    }

    /// Create a user with a known identifier
    pub fn with_id(user_name: impl Into<String>, user_id: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            user_name: user_name.into(),
            user_id: user_id.into(),
            public_meta: BTreeMap::new(),
            private_meta: BTreeMap::new(),
            roles,
        }
    }

    /// Set a public metadata entry
    pub fn with_public_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.public_meta.insert(key.into(), value.into());
        self
    }

    /// Set a private metadata entry
    pub fn with_private_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.private_meta.insert(key.into(), value.into());
        self
    }

    /// Check whether the user holds a role with the given name
    pub fn has_role(&self, role_name: &str) -> bool {
        self.roles.iter().any(|role| role.name == role_name)
    }
}

impl Record for User {
    const TABLE: &'static str = "users";
    const VARIANT: &'static str = "User";

    fn name(&self) -> &str {
        &self.user_name
    }

    fn placeholder() -> Self {
        Self::with_id(ANONYMOUS, ANONYMOUS_USER_ID, vec![Role::placeholder()])
    }

    fn scalars(&self) -> Scalars {
        let mut scalars = Scalars::new();
        scalars.insert("user_id".to_string(), serde_json::Value::String(self.user_id.clone()));
        scalars.insert("public_meta".to_string(), serde_json::json!(self.public_meta));
        scalars.insert("private_meta".to_string(), serde_json::json!(self.private_meta));
        scalars
    }

    fn deep_eq(&self, other: &Self) -> bool {
        self.user_name == other.user_name
            && self.user_id == other.user_id
            && self.public_meta == other.public_meta
            && self.private_meta == other.private_meta
            && children_eq(&self.roles, &other.roles)
    }
}

impl Composite for User {
    type Child = Role;

    fn children(&self) -> &[Role] {
        &self.roles
    }

    fn with_children(&self, children: Vec<Role>) -> Self {
        Self {
            roles: children,
            ..self.clone()
        }
    }

    fn from_parts(name: String, scalars: &Scalars, children: Vec<Role>) -> Result<Self, FieldError> {
        Ok(Self {
            user_name: name,
            user_id: string_column(scalars, "user_id")?,
            public_meta: map_column(scalars, "public_meta")?,
            private_meta: map_column(scalars, "private_meta")?,
            roles: children,
        })
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = User::new("ada", Vec::new());
        let b = User::new("ada", Vec::new());
        assert_ne!(a.user_id, b.user_id);
        assert!(!a.deep_eq(&b));
    }

    #[test]
    fn test_with_children_keeps_identity_and_meta() {
        let user = User::with_id("ada", "u-1", vec![Role::new("admin", Vec::new())]).with_public_meta("team", "core").with_private_meta("phone", "555");

        let replaced = user.with_children(vec![Role::new("viewer", Vec::new())]);
        assert_eq!(replaced.user_id, "u-1");
        assert_eq!(replaced.public_meta.get("team").map(String::as_str), Some("core"));
        assert!(replaced.has_role("viewer"));
        assert!(!replaced.has_role("admin"));
    }

    #[test]
    fn test_scalars_rebuild() {
        let user = User::with_id("ada", "u-1", Vec::new()).with_public_meta("team", "core").with_private_meta("phone", "555");

        let rebuilt = User::from_parts("ada".to_string(), &user.scalars(), Vec::new()).unwrap();
        assert_eq!(rebuilt, user);
    }

    #[test]
    fn test_placeholder() {
        let user = User::placeholder();
        assert_eq!(user.user_name, "Anonymous");
        assert_eq!(user.user_id, "anonymous");
        assert_eq!(user.roles, vec![Role::placeholder()]);
    }
}
