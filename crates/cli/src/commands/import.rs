use std::path::Path;

use anyhow::{Context, Result};
use refmark_core::db::SqliteDatabase;
use refmark_core::host::Snapshot;

/// Load a JSON/YAML snapshot into a (new or existing) host database.
///
/// Existing contents are replaced; run history is kept.
pub fn import_command(snapshot_path: &Path, db_path: &Path) -> Result<()> {
    let (snapshot, hash) = Snapshot::load(snapshot_path)?;

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let db = SqliteDatabase::open(db_path)
        .with_context(|| format!("Failed to open host database at {}", db_path.display()))?;
    db.import_snapshot(&snapshot, Some(&hash)).context("Failed to import snapshot")?;

    println!("Imported snapshot:");
    println!("  Source: {}", snapshot_path.display());
    println!("  SHA-256: {hash}");
    println!("  Segments: {}", snapshot.segments.len());
    println!("  Functions: {}", snapshot.functions.len());
    println!("  Items: {}", snapshot.items.len());
    println!("  Xrefs: {}", snapshot.xrefs.len());
    println!("  Comments: {}", snapshot.comments.len());
    if !snapshot.analysis_complete {
        println!("  Note: analysis marked incomplete; `refmark run` will refuse until it is complete");
    }
    println!("  DB: {}", db_path.display());

    Ok(())
}
