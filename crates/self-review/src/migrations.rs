// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Database migrations for self-review
//!
//! This module provides schema migration functionality, allowing the database
//! schema to evolve over time while maintaining backward compatibility.

use chrono::Utc;
use rusqlite::{Connection, params};
use thiserror::Error;
use tracing::info;

/// Migration errors
#[derive(Debug, Error)]
pub enum MigrationError {
    /// SQLite error during migration
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Database was written by a newer version of self-review
    #[error("Database schema version {found} is newer than supported version {supported}")]
    TooNew {
        /// Version found in the database
        found: i32,
        /// Newest version this build understands
        supported: i32,
    },
}

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// A database migration
pub struct Migration {
    /// Migration version number
    pub version: i32,
    /// Migration name/description
    pub name: &'static str,
    /// SQL to apply the migration
    pub up: &'static str,
}

/// All available migrations in order
pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        up: include_str!("schema.sql"),
    },
    Migration {
        version: 2,
        name: "author_filter_tracking",
        up: r#"
        -- Key of the author filter a cursor was advanced under, and that a
        -- commit was first fetched under; '' for rows written before version 2
        ALTER TABLE fetch_cursors ADD COLUMN author_filter TEXT NOT NULL DEFAULT '';
        ALTER TABLE commits ADD COLUMN fetched_by TEXT NOT NULL DEFAULT '';
    "#,
    },
];

/// Get the current schema version from the database
///
/// Returns 0 if no migrations have been applied.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_version(conn: &Connection) -> Result<i32, MigrationError> {
    let table_exists: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
        [],
        |row| row.get(0),
    )?;

    if table_exists == 0 {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Apply all pending migrations
///
/// # Errors
///
/// Returns an error if any migration fails or the database is newer than
/// this build.
pub fn migrate(conn: &mut Connection) -> Result<Vec<i32>, MigrationError> {
    let current_version = get_version(conn)?;
    if current_version > CURRENT_VERSION {
        return Err(MigrationError::TooNew {
            found: current_version,
            supported: CURRENT_VERSION,
        });
    }

    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        if migration.version > current_version {
            apply_migration(conn, migration)?;
            applied.push(migration.version);
        }
    }

    if !applied.is_empty() {
        info!(versions = ?applied, "Applied database migrations");
    }
    Ok(applied)
}

/// Apply a single migration and record it, atomically
///
/// # Errors
///
/// Returns an error if the migration fails.
pub fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<(), MigrationError> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.up)?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![
            migration.version,
            migration.name,
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
        ],
    )?;
    tx.commit()?;
    Ok(())
}
