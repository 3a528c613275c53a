//! Runs the pass against a SQLite host and records the run in `mark_runs`.

use chrono::Utc;
use tracing::warn;

use crate::config::MarkConfig;
use crate::db::{MarkRunRecord, MarkRunStatus, SqliteDatabase};
use crate::host::{HostError, ProgressSink};
use crate::services::{run_pass, PassError, PassOutcome};

/// Result of a recorded run.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub run_id: i64,
    pub record: MarkRunRecord,
    pub outcome: PassOutcome,
}

/// Run the pass and persist a [`MarkRunRecord`] describing it.
///
/// Aborted runs are recorded as `aborted`; a pass error is recorded as
/// `failed` and then returned. When recording fails as well, the pass error
/// wins and the recording failure is only logged.
pub fn run_and_record(
    db: &mut SqliteDatabase,
    progress: &mut dyn ProgressSink,
    config: &MarkConfig,
) -> Result<RecordedRun, PassError> {
    let started_at = Utc::now().to_rfc3339();
    let result = run_pass(db, progress, config);
    let finished_at = Utc::now().to_rfc3339();

    let record = match &result {
        Ok(outcome) => MarkRunRecord {
            status: if outcome.is_aborted() {
                MarkRunStatus::Aborted
            } else {
                MarkRunStatus::Succeeded
            },
            started_at,
            finished_at,
            functions_annotated: outcome.summary.functions_annotated,
            data_annotated: outcome.summary.data_annotated,
            write_failures: outcome.summary.write_failures,
        },
        Err(_) => MarkRunRecord {
            status: MarkRunStatus::Failed,
            started_at,
            finished_at,
            functions_annotated: 0,
            data_annotated: 0,
            write_failures: 0,
        },
    };
    match (db.insert_run(&record), result) {
        (Ok(run_id), Ok(outcome)) => Ok(RecordedRun { run_id, record, outcome }),
        (Ok(_), Err(err)) => Err(err),
        (Err(db_err), Ok(_)) => Err(HostError::from(db_err).into()),
        (Err(db_err), Err(err)) => {
            warn!(error = %db_err, status = record.status.as_str(), "failed to record run");
            Err(err)
        }
    }
}
