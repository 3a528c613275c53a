use std::path::Path;

use anyhow::{Context, Result};

use crate::open_existing_db;

/// List recorded annotation runs, oldest first.
pub fn runs_command(db_path: &Path, json: bool) -> Result<()> {
    let db = open_existing_db(db_path)?;
    let runs = db.list_runs().context("Failed to list runs")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    println!("Runs:");
    if runs.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for run in runs {
        println!(
            "- {} {} -> {} (functions: {}, data: {}, write failures: {})",
            run.status.as_str(),
            run.started_at,
            run.finished_at,
            run.functions_annotated,
            run.data_annotated,
            run.write_failures
        );
    }

    Ok(())
}
