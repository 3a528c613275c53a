use serde::{Deserialize, Serialize};

/// Final state of an annotation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkRunStatus {
    Succeeded,
    Aborted,
    Failed,
}

impl MarkRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkRunStatus::Succeeded => "succeeded",
            MarkRunStatus::Aborted => "aborted",
            MarkRunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "succeeded" => Some(MarkRunStatus::Succeeded),
            "aborted" => Some(MarkRunStatus::Aborted),
            "failed" => Some(MarkRunStatus::Failed),
            _ => None,
        }
    }
}

/// Record describing an annotation run for bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkRunRecord {
    pub status: MarkRunStatus,
    pub started_at: String,
    pub finished_at: String,
    pub functions_annotated: u64,
    pub data_annotated: u64,
    pub write_failures: u64,
}

/// Row counts, for `info` style reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DbStats {
    pub schema_version: i32,
    pub segments: u64,
    pub functions: u64,
    pub items: u64,
    pub xrefs: u64,
    pub comments: u64,
    pub runs: u64,
    pub analysis_complete: bool,
    pub source_hash: Option<String>,
}
