//! SQLite-backed host database.
//!
//! This module wraps a SQLite database that plays the role of the
//! disassembler's database for the CLI:
//! - Segments, functions, items (code/data/string) and typed xrefs
//! - Function, regular and repeatable comments
//! - A history of annotation runs
//!
//! Contents usually arrive through [`SqliteDatabase::import_snapshot`].

use rusqlite::Connection;
use thiserror::Error;

use crate::model::Address;

pub mod models;
pub mod store;

pub use models::{DbStats, MarkRunRecord, MarkRunStatus};
pub use store::SqliteDatabase;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Error type for host database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },

    /// A stored value could not be mapped back onto the model.
    #[error("Corrupt {column} value '{value}'")]
    Corrupt { column: &'static str, value: String },
}

/// Convenience result type for DB operations.
pub type DbResult<T> = Result<T, DbError>;

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: disassembly tables (meta, segments, functions, items, xrefs, comments)
/// - 2: add mark_runs table
/// - 3: store addresses as order-preserving keys (see [`addr_key`])
pub(crate) fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS segments (
                id    INTEGER PRIMARY KEY AUTOINCREMENT,
                name  TEXT NOT NULL,
                start INTEGER NOT NULL,
                end   INTEGER NOT NULL,
                kind  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS functions (
                address INTEGER PRIMARY KEY,
                name    TEXT
            );

            CREATE TABLE IF NOT EXISTS items (
                address     INTEGER PRIMARY KEY,
                size        INTEGER NOT NULL,
                kind        TEXT NOT NULL,
                string_type TEXT,
                bytes       BLOB
            );

            CREATE TABLE IF NOT EXISTS xrefs (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                from_addr INTEGER NOT NULL,
                to_addr   INTEGER NOT NULL,
                kind      TEXT NOT NULL,
                code_flow INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS xrefs_to_addr ON xrefs (to_addr);

            CREATE TABLE IF NOT EXISTS comments (
                address INTEGER NOT NULL,
                slot    TEXT NOT NULL,
                text    TEXT NOT NULL,
                PRIMARY KEY (address, slot)
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS mark_runs (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                status              TEXT NOT NULL,
                started_at          TEXT NOT NULL,
                finished_at         TEXT NOT NULL,
                functions_annotated INTEGER NOT NULL,
                data_annotated      INTEGER NOT NULL,
                write_failures      INTEGER NOT NULL
            );

            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    if (1..3).contains(&current_version) {
        // Flip the sign bit of every address column. Keyed tables are rebuilt
        // so the remapping cannot collide with an existing primary key.
        conn.execute_batch(&format!(
            r#"
            BEGIN;
            CREATE TABLE functions_v3 (
                address INTEGER PRIMARY KEY,
                name    TEXT
            );
            INSERT INTO functions_v3 SELECT {address}, name FROM functions;
            DROP TABLE functions;
            ALTER TABLE functions_v3 RENAME TO functions;

            CREATE TABLE items_v3 (
                address     INTEGER PRIMARY KEY,
                size        INTEGER NOT NULL,
                kind        TEXT NOT NULL,
                string_type TEXT,
                bytes       BLOB
            );
            INSERT INTO items_v3 SELECT {address}, size, kind, string_type, bytes FROM items;
            DROP TABLE items;
            ALTER TABLE items_v3 RENAME TO items;

            CREATE TABLE comments_v3 (
                address INTEGER NOT NULL,
                slot    TEXT NOT NULL,
                text    TEXT NOT NULL,
                PRIMARY KEY (address, slot)
            );
            INSERT INTO comments_v3 SELECT {address}, slot, text FROM comments;
            DROP TABLE comments;
            ALTER TABLE comments_v3 RENAME TO comments;

            UPDATE segments SET start = {start}, end = {end};
            UPDATE xrefs SET from_addr = {from_addr}, to_addr = {to_addr};

            PRAGMA user_version = 3;
            COMMIT;
            "#,
            address = flip_sql("address"),
            start = flip_sql("start"),
            end = flip_sql("end"),
            from_addr = flip_sql("from_addr"),
            to_addr = flip_sql("to_addr"),
        ))?;
    } else if current_version == 0 {
        conn.execute_batch("PRAGMA user_version = 3;")?;
    }

    Ok(())
}

/// Storage key for an address.
///
/// SQLite integers are signed, so a plain `as i64` would sort every address
/// at or above 2^63 before the low half. Flipping the sign bit keeps the
/// key order identical to `u64` order.
pub(crate) fn addr_key(address: Address) -> i64 {
    (address ^ SIGN_BIT) as i64
}

/// Inverse of [`addr_key`].
pub(crate) fn key_addr(key: i64) -> Address {
    (key as u64) ^ SIGN_BIT
}

const SIGN_BIT: u64 = 1 << 63;

/// SQL for `addr_key` applied to a column holding a plain `as i64` address.
fn flip_sql(column: &str) -> String {
    format!(
        "(CASE WHEN {column} >= 0 THEN {column} - 9223372036854775807 - 1 \
         ELSE {column} + 9223372036854775807 + 1 END)"
    )
}

/// Read the SQLite schema version from `PRAGMA user_version`.
pub(crate) fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
