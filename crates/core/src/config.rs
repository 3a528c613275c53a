//! Per-run configuration for the annotation pass.
//!
//! A `MarkConfig` is built fresh for each run (defaults, then an optional
//! JSON/YAML file, then CLI flags) and passed by reference into
//! [`run_pass`](crate::services::run_pass).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CANCEL_CHECK_STRIDE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkConfig {
    pub process_functions: bool,
    pub process_data: bool,
    /// Segment names for the data pass. Empty selects every data segment.
    pub data_segments: Vec<String>,
    /// Items between cancellation polls.
    pub cancel_check_stride: usize,
}

impl Default for MarkConfig {
    fn default() -> Self {
        Self {
            process_functions: true,
            process_data: true,
            data_segments: Vec::new(),
            cancel_check_stride: DEFAULT_CANCEL_CHECK_STRIDE,
        }
    }
}

impl MarkConfig {
    /// Cancellation stride, never zero.
    pub fn stride(&self) -> usize {
        self.cancel_check_stride.max(1)
    }

    /// Load from a `.yaml`/`.yml` or JSON file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            serde_yaml::from_str(&text)
                .with_context(|| format!("parsing YAML config {}", path.display()))?
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON config {}", path.display()))?
        };
        Ok(config)
    }
}
