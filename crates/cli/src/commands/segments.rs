use std::path::Path;

use anyhow::{Context, Result};
use refmark_core::host::HostDatabase;
use serde::Serialize;

use crate::{hex, open_existing_db};

#[derive(Debug, Serialize)]
pub struct SegmentRow {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub kind: String,
    /// Walked by the data pass when no segments are named.
    pub default_data: bool,
}

/// List segments with their kind and whether they are data-pass defaults.
pub fn segments_command(db_path: &Path, json: bool) -> Result<()> {
    let db = open_existing_db(db_path)?;
    let rows: Vec<SegmentRow> = db
        .list_segments()
        .context("Failed to list segments")?
        .into_iter()
        .map(|s| SegmentRow {
            default_data: s.kind.is_data_like(),
            kind: s.kind.as_str().to_string(),
            start: s.start,
            end: s.end,
            name: s.name,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Segments:");
    if rows.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for row in rows {
        let marker = if row.default_data { " [data]" } else { "" };
        println!("- {} {}..{} ({}){}", row.name, hex(row.start), hex(row.end), row.kind, marker);
    }

    Ok(())
}
