use std::path::Path;

use anyhow::{anyhow, Context, Result};
use refmark_core::db::SqliteDatabase;

pub mod commands;

/// Open an existing host database, failing if the file is missing.
///
/// Only `import` creates databases; every other command expects one.
pub fn open_existing_db(path: &Path) -> Result<SqliteDatabase> {
    if !path.exists() {
        return Err(anyhow!(
            "Database not found: {} (create it with `refmark import`)",
            path.display()
        ));
    }
    SqliteDatabase::open(path)
        .with_context(|| format!("Failed to open host database at {}", path.display()))
}

/// Format an address the way every command prints it.
pub fn hex(address: u64) -> String {
    format!("{address:#x}")
}
