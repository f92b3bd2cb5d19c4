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

//! Actions, the leaves of the privilege graph

use super::{FieldError, Leaf, Record, string_column};
use crate::db_interface::Scalars;
use serde::{Deserialize, Serialize};

/// Name and description of the placeholder action
pub const NO_ACCESS: &str = "No Access";

/// A single operation that permissions grant
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Unique action name
    pub name: String,
    /// Human-readable description
    pub description: String,
}

impl Action {
    /// Create a new action
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl Record for Action {
    const TABLE: &'static str = "actions";
    const VARIANT: &'static str = "Action";

    fn name(&self) -> &str {
        &self.name
    }

    fn placeholder() -> Self {
        Self::new(NO_ACCESS, NO_ACCESS)
    }

    fn scalars(&self) -> Scalars {
        let mut scalars = Scalars::new();
        scalars.insert("description".to_string(), serde_json::Value::String(self.description.clone()));
        scalars
    }

    fn deep_eq(&self, other: &Self) -> bool {
        self.name == other.name && self.description == other.description
    }
}

impl Leaf for Action {
    fn from_scalars(name: String, scalars: &Scalars) -> Result<Self, FieldError> {
        Ok(Self {
            name,
            description: string_column(scalars, "description")?,
        })
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        let action = Action::placeholder();
        assert_eq!(action.name, "No Access");
        assert_eq!(action.description, "No Access");
    }

    #[test]
    fn test_equality_covers_description() {
        assert!(Action::new("read", "d1").deep_eq(&Action::new("read", "d1")));
        assert!(!Action::new("read", "d1").deep_eq(&Action::new("read", "d2")));
        assert!(!Action::new("read", "d1").deep_eq(&Action::new("write", "d1")));
    }

    #[test]
    fn test_scalars_rebuild() {
        let action = Action::new("read", "Read a document");
        let rebuilt = Action::from_scalars("read".to_string(), &action.scalars()).unwrap();
        assert_eq!(rebuilt, action);

        assert_eq!(Action::from_scalars("read".to_string(), &Scalars::new()), Err(FieldError::Missing("description")));
    }
}
