// src/db/schema.rs

//! Database schema definitions and migrations for the recipe metadata backend
//!
//! This module defines the SQLite schema for the persisted recipe metadata
//! and provides a migration system to evolve the schema over time.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => panic!("Unknown migration version: {}", version),
    }
}

/// Initial schema - Version 1
///
/// Creates the core tables:
/// - recipes: one row per registered recipe
/// - vars: expanded variable values, stamped with scope priority
/// - attrs: variable attributes (metadata about the metadata)
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE recipes (
            key INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe TEXT NOT NULL UNIQUE
        );

        -- Variable values per recipe; lookups take the highest priority row
        CREATE TABLE vars (
            key INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe INTEGER NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            var TEXT NOT NULL,
            val TEXT,
            FOREIGN KEY (recipe) REFERENCES recipes(key) ON DELETE CASCADE
        );

        CREATE INDEX idx_vars_recipe_var ON vars(recipe, var);

        -- Variable attributes, one row per (recipe, var, attr)
        CREATE TABLE attrs (
            key INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe INTEGER NOT NULL,
            var TEXT NOT NULL,
            attr TEXT NOT NULL,
            val TEXT,
            UNIQUE(recipe, var, attr),
            FOREIGN KEY (recipe) REFERENCES recipes(key) ON DELETE CASCADE
        );

        CREATE INDEX idx_attrs_recipe_var ON attrs(recipe, var);
        ",
    )?;

    Ok(())
}
