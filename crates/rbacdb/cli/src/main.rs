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

//! RbacDB CLI Tool
//!
//! Command-line interface for managing actions, permissions, roles and users.

mod config;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use config::RbacConfig;
use rbacdb_core::{Action, CascadeReport, LayerStore, Permission, ReadOnlyStore, Record, Role, StoreRegistry, User};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rbacdb")]
#[command(about = "RbacDB - Role-based access control store CLI")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Data directory for persistent storage
    #[arg(long, short = 'd', global = true)]
    data_dir: Option<PathBuf>,

    /// Database name
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage actions
    #[command(subcommand)]
    Action(ActionCommand),
    /// Manage permissions
    #[command(subcommand)]
    Permission(PermissionCommand),
    /// Manage roles
    #[command(subcommand)]
    Role(RoleCommand),
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Print the resolved configuration
    ShowConfig,
}

#[derive(Subcommand)]
enum ActionCommand {
    /// Create an action
    Create { name: String, description: String },
    /// Show an action
    Get { name: String },
    /// List all actions
    List,
    /// Replace an action, cascading the change to permissions
    Update { name: String, new_name: String, description: String },
    /// Delete an action, removing it from permissions
    Delete { name: String },
}

#[derive(Subcommand)]
enum PermissionCommand {
    /// Create a permission
    Create {
        name: String,
        /// Granted action (repeatable)
        #[arg(long = "action", short = 'a')]
        actions: Vec<String>,
    },
    Get { name: String },
    List,
    /// Replace a permission, cascading the change to roles
    Update {
        name: String,
        new_name: String,
        #[arg(long = "action", short = 'a')]
        actions: Vec<String>,
    },
    Delete { name: String },
}

#[derive(Subcommand)]
enum RoleCommand {
    /// Create a role
    Create {
        name: String,
        /// Granted permission (repeatable)
        #[arg(long = "permission", short = 'p')]
        permissions: Vec<String>,
    },
    Get { name: String },
    List,
    /// Replace a role, cascading the change to users
    Update {
        name: String,
        new_name: String,
        #[arg(long = "permission", short = 'p')]
        permissions: Vec<String>,
    },
    Delete { name: String },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a user with a fresh id
    Create {
        user_name: String,
        #[command(flatten)]
        fields: UserFields,
    },
    Get { user_name: String },
    List,
    /// Replace a user, keeping its id and merging meta entries
    Update {
        user_name: String,
        new_user_name: String,
        #[command(flatten)]
        fields: UserFields,
    },
    Delete { user_name: String },
}

#[derive(Args)]
struct UserFields {
    /// Assigned role (repeatable)
    #[arg(long = "role", short = 'r')]
    roles: Vec<String>,
    /// Public meta entry as key=value (repeatable)
    #[arg(long = "public", value_parser = parse_key_val)]
    public_meta: Vec<(String, String)>,
    /// Private meta entry as key=value (repeatable)
    #[arg(long = "private", value_parser = parse_key_val)]
    private_meta: Vec<(String, String)>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match RbacConfig::resolve_config(cli.config, cli.data_dir, cli.database) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to resolve configuration: {:#}", e);
            process::exit(1);
        }
    };

    let registry = StoreRegistry::persistent(&config.data_dir, config.db.clone());

    let result = run(cli.command, &registry, &config).and_then(|()| registry.flush_all().context("flushing databases"));

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

fn run(command: Commands, registry: &StoreRegistry, config: &RbacConfig) -> anyhow::Result<()> {
    let database = config.database.as_str();

    match command {
        Commands::Action(command) => {
            let store = registry.observing_action_store(database)?;
            match command {
                ActionCommand::Create { name, description } => handle_create(&store, &Action::new(name, description)),
                ActionCommand::Get { name } => handle_get(&store, &name),
                ActionCommand::List => handle_list(&store),
                ActionCommand::Update { name, new_name, description } => handle_update(&store, &name, Action::new(new_name, description)),
                ActionCommand::Delete { name } => handle_delete(&store, &name),
            }
        }
        Commands::Permission(command) => {
            let store = registry.observing_permission_store(database)?;
            let actions = registry.read_only_action_store(database)?;
            match command {
                PermissionCommand::Create { name, actions: names } => handle_create(&store, &Permission::new(name, resolve_children(&actions, &names)?)),
                PermissionCommand::Get { name } => handle_get(&store, &name),
                PermissionCommand::List => handle_list(&store),
                PermissionCommand::Update { name, new_name, actions: names } => handle_update(&store, &name, Permission::new(new_name, resolve_children(&actions, &names)?)),
                PermissionCommand::Delete { name } => handle_delete(&store, &name),
            }
        }
        Commands::Role(command) => {
            let store = registry.observing_role_store(database)?;
            let permissions = registry.read_only_permission_store(database)?;
            match command {
                RoleCommand::Create { name, permissions: names } => handle_create(&store, &Role::new(name, resolve_children(&permissions, &names)?)),
                RoleCommand::Get { name } => handle_get(&store, &name),
                RoleCommand::List => handle_list(&store),
                RoleCommand::Update { name, new_name, permissions: names } => handle_update(&store, &name, Role::new(new_name, resolve_children(&permissions, &names)?)),
                RoleCommand::Delete { name } => handle_delete(&store, &name),
            }
        }
        Commands::User(command) => {
            let store = registry.observing_user_store(database)?;
            let roles = registry.read_only_role_store(database)?;
            match command {
                UserCommand::Create { user_name, fields } => {
                    let user = User::new(user_name, resolve_children(&roles, &fields.roles)?);
                    handle_create(&store, &apply_meta(user, fields))
                }
                UserCommand::Get { user_name } => handle_get(&store, &user_name),
                UserCommand::List => handle_list(&store),
                UserCommand::Update { user_name, new_user_name, fields } => {
                    let existing = store.try_read(&user_name)?.ok_or_else(|| anyhow!("User '{user_name}' does not exist"))?;
                    let mut user = User::with_id(new_user_name, existing.user_id, resolve_children(&roles, &fields.roles)?);
                    user.public_meta = existing.public_meta;
                    user.private_meta = existing.private_meta;
                    handle_update(&store, &user_name, apply_meta(user, fields))
                }
                UserCommand::Delete { user_name } => handle_delete(&store, &user_name),
            }
        }
        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

/// Look up each named child, failing on the first unknown name
fn resolve_children<E: Record>(store: &ReadOnlyStore<E>, names: &[String]) -> anyhow::Result<Vec<E>> {
    names
        .iter()
        .map(|name| -> anyhow::Result<E> { store.try_read(name)?.ok_or_else(|| anyhow!("{} '{}' does not exist", E::VARIANT, name)) })
        .collect()
}

fn apply_meta(user: User, fields: UserFields) -> User {
    let user = fields.public_meta.into_iter().fold(user, |user, (key, value)| user.with_public_meta(key, value));
    fields.private_meta.into_iter().fold(user, |user, (key, value)| user.with_private_meta(key, value))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report(report: &CascadeReport) {
    for entity in &report.rewritten {
        println!("  rewrote {entity}");
    }
    for entity in &report.failed {
        warn!("Dependent entity {} could not be rewritten and needs manual repair", entity);
        println!("  FAILED {entity}");
    }
}

fn handle_create<E: Record + Serialize>(store: &LayerStore<E>, entity: &E) -> anyhow::Result<()> {
    store.try_create(entity)?;
    info!("Created {} {}", E::VARIANT, entity.name());
    print_json(entity)
}

fn handle_get<E: Record + Serialize>(store: &LayerStore<E>, name: &str) -> anyhow::Result<()> {
    match store.try_read(name)? {
        Some(entity) => print_json(&entity),
        None => bail!("{} '{}' not found", E::VARIANT, name),
    }
}

fn handle_list<E: Record + Serialize>(store: &LayerStore<E>) -> anyhow::Result<()> {
    let entities = store.try_read_all()?;
    info!("Listed {} entries from {}", entities.len(), E::TABLE);
    print_json(&entities)
}

fn handle_update<E: Record + Serialize>(store: &LayerStore<E>, name: &str, entity: E) -> anyhow::Result<()> {
    let report = store.try_update(name, entity.clone())?;
    info!("Updated {} {} ({} dependents rewritten)", E::VARIANT, name, report.rewritten.len());
    print_json(&entity)?;
    print_report(&report);
    Ok(report.ensure_clean()?)
}

fn handle_delete<E: Record>(store: &LayerStore<E>, name: &str) -> anyhow::Result<()> {
    let report = store.try_delete(name)?;
    println!("{} deleted: {name}", E::VARIANT);
    info!("Deleted {} {} ({} dependents rewritten)", E::VARIANT, name, report.rewritten.len());
    print_report(&report);
    Ok(report.ensure_clean()?)
}
