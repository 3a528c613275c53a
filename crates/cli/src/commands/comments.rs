use std::path::Path;

use anyhow::{Context, Result};

use crate::{hex, open_existing_db};

/// List every stored comment, ordered by address then slot.
pub fn comments_command(db_path: &Path, json: bool) -> Result<()> {
    let db = open_existing_db(db_path)?;
    let comments = db.list_comments().context("Failed to list comments")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&comments)?);
        return Ok(());
    }

    println!("Comments:");
    if comments.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for c in comments {
        println!("- {} [{}] {}", hex(c.address), c.slot.as_str(), c.text);
    }

    Ok(())
}
