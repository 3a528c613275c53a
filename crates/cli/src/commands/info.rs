use std::path::Path;

use anyhow::{Context, Result};

use crate::open_existing_db;

/// Show schema version, row counts and the imported snapshot's hash.
pub fn info_command(db_path: &Path, json: bool) -> Result<()> {
    let db = open_existing_db(db_path)?;
    let stats = db.stats().context("Failed to read database stats")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("refmark database");
    println!("================");
    println!("Path: {}", db_path.display());
    println!("Schema version: {}", stats.schema_version);
    println!("Analysis complete: {}", if stats.analysis_complete { "yes" } else { "no" });
    println!("Source SHA-256: {}", stats.source_hash.as_deref().unwrap_or("(none)"));
    println!();
    println!("Segments: {}", stats.segments);
    println!("Functions: {}", stats.functions);
    println!("Items: {}", stats.items);
    println!("Xrefs: {}", stats.xrefs);
    println!("Comments: {}", stats.comments);
    println!("Runs: {}", stats.runs);

    Ok(())
}
