use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use refmark::commands::{
    comments_command, export_command, import_command, info_command, run_command, runs_command,
    segments_command, RunOptions,
};

/// Annotate a disassembly database with cross-reference counts.
///
/// This CLI is a thin wrapper around `refmark-core` (exposed in code as `refmark_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "refmark",
    version,
    about = "Annotate functions and data with how often they are referenced",
    long_about = None
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a JSON/YAML snapshot into a host database, creating it if needed.
    Import {
        /// Snapshot file (`.json`, `.yaml` or `.yml`).
        #[arg(long)]
        snapshot: PathBuf,

        /// Host database file.
        #[arg(long)]
        db: PathBuf,
    },

    /// Write the host database (comments included) back out as a snapshot.
    Export {
        #[arg(long)]
        db: PathBuf,

        /// Output file; the extension picks JSON or YAML.
        #[arg(long)]
        out: PathBuf,
    },

    /// Count references and write them into comments.
    ///
    /// Not idempotent: each run prefixes another count.
    Run {
        #[arg(long)]
        db: PathBuf,

        /// JSON/YAML config file; flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip the function pass.
        #[arg(long, default_value_t = false)]
        no_functions: bool,

        /// Skip the data pass.
        #[arg(long, default_value_t = false)]
        no_data: bool,

        /// Segment to walk in the data pass (repeatable). Defaults to all data segments.
        #[arg(long = "segment")]
        segments: Vec<String>,

        /// Abort after this many seconds, keeping comments written so far.
        #[arg(long)]
        time_limit: Option<u64>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List segments and which ones the data pass walks by default.
    Segments {
        #[arg(long)]
        db: PathBuf,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List function, regular and repeatable comments.
    Comments {
        #[arg(long)]
        db: PathBuf,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List recorded runs.
    Runs {
        #[arg(long)]
        db: PathBuf,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show schema version, row counts and source hash.
    Info {
        #[arg(long)]
        db: PathBuf,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.log_json {
        refmark_core::logging::init_tracing_json();
    } else {
        refmark_core::logging::init_tracing();
    }

    match cli.command {
        Command::Import { snapshot, db } => import_command(&snapshot, &db)?,
        Command::Export { db, out } => export_command(&db, &out)?,
        Command::Run { db, config, no_functions, no_data, segments, time_limit, json } => {
            let options = RunOptions {
                config,
                no_functions,
                no_data,
                segments,
                time_limit_secs: time_limit,
                json,
            };
            run_command(&db, &options)?
        }
        Command::Segments { db, json } => segments_command(&db, json)?,
        Command::Comments { db, json } => comments_command(&db, json)?,
        Command::Runs { db, json } => runs_command(&db, json)?,
        Command::Info { db, json } => info_command(&db, json)?,
    }

    Ok(())
}
