use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use refmark_core::config::MarkConfig;
use refmark_core::host::{Deadline, NoProgress, ProgressSink};
use refmark_core::services::{run_and_record, PassSummary};

use crate::open_existing_db;

/// Options for `refmark run`, layered over an optional config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub no_functions: bool,
    pub no_data: bool,
    pub segments: Vec<String>,
    pub time_limit_secs: Option<u64>,
    pub json: bool,
}

impl RunOptions {
    /// Defaults, then the config file, then flags.
    pub fn resolve_config(&self) -> Result<MarkConfig> {
        let mut config = match &self.config {
            Some(path) => MarkConfig::load(path)?,
            None => MarkConfig::default(),
        };
        if self.no_functions {
            config.process_functions = false;
        }
        if self.no_data {
            config.process_data = false;
        }
        if !self.segments.is_empty() {
            config.data_segments = self.segments.clone();
        }
        Ok(config)
    }
}

/// Annotate the database and record the run.
pub fn run_command(db_path: &Path, options: &RunOptions) -> Result<()> {
    let config = options.resolve_config()?;
    let mut db = open_existing_db(db_path)?;

    let mut no_progress = NoProgress;
    let mut deadline;
    let progress: &mut dyn ProgressSink = match options.time_limit_secs {
        Some(secs) => {
            deadline = Deadline::new(Duration::from_secs(secs));
            &mut deadline
        }
        None => &mut no_progress,
    };

    let run = run_and_record(&mut db, progress, &config)
        .with_context(|| format!("Reference count pass failed on {}", db_path.display()))?;

    if options.json {
        let body = serde_json::json!({
            "run_id": run.run_id,
            "state": run.outcome.state,
            "started_at": run.record.started_at,
            "finished_at": run.record.finished_at,
            "summary": run.outcome.summary,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if run.outcome.is_aborted() {
        println!("Aborted by user; comments written so far are kept.");
    } else {
        println!("Done.");
    }
    print_summary(&run.outcome.summary);
    println!("  Run id: {}", run.run_id);

    Ok(())
}

fn print_summary(summary: &PassSummary) {
    println!(
        "  Functions: {} annotated of {} scanned",
        summary.functions_annotated, summary.functions_scanned
    );
    println!(
        "  Data items: {} annotated of {} scanned in {} segment(s)",
        summary.data_annotated, summary.items_scanned, summary.segments_scanned
    );
    if summary.write_failures + summary.decode_failures + summary.read_failures > 0 {
        println!(
            "  Failures: {} write, {} decode, {} read",
            summary.write_failures, summary.decode_failures, summary.read_failures
        );
    }
    println!("  Elapsed: {} ms", summary.elapsed_ms);
}
