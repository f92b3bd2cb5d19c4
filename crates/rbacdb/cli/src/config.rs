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

use anyhow::Result;
use rbacdb_core::DbConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "RBACDB_CONFIG";
pub const DATA_DIR_ENV: &str = "RBACDB_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbacConfig {
    /// Directory holding one JSON file per database
    pub data_dir: PathBuf,
    /// Database the commands operate on
    pub database: String,
    pub db: DbConfig,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("rbacdb"),
            database: "rbac".to_string(),
            db: DbConfig::default(),
        }
    }
}

impl RbacConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn resolve_config(cli_config: Option<PathBuf>, cli_data_dir: Option<PathBuf>, cli_database: Option<String>) -> Result<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Ok(env_config) = std::env::var(CONFIG_ENV) {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        // CLI data_dir overrides environment settings
        if let Some(data_dir) = cli_data_dir {
            config.data_dir = data_dir;
        } else if let Ok(env_data_dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(env_data_dir);
        }

        if let Some(database) = cli_database {
            config.database = database;
        }

        std::fs::create_dir_all(&config.data_dir)?;
        Ok(config)
    }
}
