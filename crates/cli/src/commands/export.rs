use std::path::Path;

use anyhow::{Context, Result};

use crate::open_existing_db;

/// Write the database back out as a snapshot (format chosen by extension).
pub fn export_command(db_path: &Path, out: &Path) -> Result<()> {
    let db = open_existing_db(db_path)?;
    let snapshot = db.export_snapshot().context("Failed to read database contents")?;
    snapshot.save(out)?;

    println!("Exported snapshot:");
    println!("  DB: {}", db_path.display());
    println!("  Output: {}", out.display());
    println!("  Comments: {}", snapshot.comments.len());

    Ok(())
}
