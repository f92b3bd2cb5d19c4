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

//! Permissions, each granting an ordered set of actions

use super::{ANONYMOUS, Action, Composite, FieldError, Record, children_eq};
use crate::db_interface::Scalars;
use serde::{Deserialize, Serialize};

/// A named bundle of actions
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique permission name
    pub name: String,
    /// Granted actions, in stored order
    pub actions: Vec<Action>,
}

impl Permission {
    /// Create a new permission
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self { name: name.into(), actions }
    }

    /// Append an action
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Check whether this permission grants an action with the given name
    pub fn grants(&self, action_name: &str) -> bool {
        self.actions.iter().any(|action| action.name == action_name)
    }
}

impl Record for Permission {
    const TABLE: &'static str = "permissions";
    const VARIANT: &'static str = "Permission";

    fn name(&self) -> &str {
        &self.name
    }

    fn placeholder() -> Self {
        Self::new(ANONYMOUS, vec![Action::placeholder()])
    }

    fn scalars(&self) -> Scalars {
        Scalars::new()
    }

    fn deep_eq(&self, other: &Self) -> bool {
        self.name == other.name && children_eq(&self.actions, &other.actions)
    }
}

impl Composite for Permission {
    type Child = Action;

    fn children(&self) -> &[Action] {
        &self.actions
    }

    fn with_children(&self, children: Vec<Action>) -> Self {
        Self::new(self.name.clone(), children)
    }

    fn from_parts(name: String, _scalars: &Scalars, children: Vec<Action>) -> Result<Self, FieldError> {
        Ok(Self::new(name, children))
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}
