//! Driving pass: functions first, then every item of the selected data segments.

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MarkConfig;
use crate::host::{HostDatabase, HostError, ProgressGuard, ProgressSink};
use crate::model::{Hex, Segment};
use crate::services::{Annotation, DataRefCounter, FunctionRefCounter};

#[derive(Debug, Error)]
pub enum PassError {
    #[error("auto-analysis has not finished; wait for it before counting references")]
    AnalysisIncomplete,
    #[error("data processing is enabled but no data segments were selected")]
    NoDataSegments,
    #[error("no segment named `{0}`")]
    UnknownSegment(String),
    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    Idle,
    SegmentResolution,
    FunctionPass,
    DataPass,
    Done,
    Aborted,
}

impl PassState {
    pub fn as_str(self) -> &'static str {
        match self {
            PassState::Idle => "idle",
            PassState::SegmentResolution => "segment_resolution",
            PassState::FunctionPass => "function_pass",
            PassState::DataPass => "data_pass",
            PassState::Done => "done",
            PassState::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub functions_scanned: u64,
    pub functions_annotated: u64,
    pub segments_scanned: u64,
    pub items_scanned: u64,
    pub data_annotated: u64,
    pub write_failures: u64,
    pub decode_failures: u64,
    pub read_failures: u64,
    pub elapsed_ms: u64,
}

impl PassSummary {
    fn record_function(&mut self, annotation: &Annotation) {
        self.functions_scanned += 1;
        if annotation.is_written() {
            self.functions_annotated += 1;
        }
        self.record_failure(annotation);
    }

    fn record_data(&mut self, annotation: &Annotation) {
        self.items_scanned += 1;
        if annotation.is_written() {
            self.data_annotated += 1;
        }
        self.record_failure(annotation);
    }

    fn record_failure(&mut self, annotation: &Annotation) {
        match annotation {
            Annotation::WriteFailed { .. } => self.write_failures += 1,
            Annotation::DecodeFailed { .. } => self.decode_failures += 1,
            Annotation::ReadFailed => self.read_failures += 1,
            Annotation::Skipped | Annotation::Written { .. } => {}
        }
    }
}

/// Final state of a pass that got past its preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassOutcome {
    /// [`PassState::Done`] or [`PassState::Aborted`].
    pub state: PassState,
    pub summary: PassSummary,
}

impl PassOutcome {
    pub fn is_aborted(&self) -> bool {
        self.state == PassState::Aborted
    }
}

/// Segments the data pass will walk.
///
/// Empty when data processing is off. Otherwise the named segments, in the
/// order given, or every data segment when no names were given.
pub fn resolve_segments<H: HostDatabase + ?Sized>(
    host: &H,
    config: &MarkConfig,
) -> Result<Vec<Segment>, PassError> {
    if !config.process_data {
        return Ok(Vec::new());
    }
    let segments = host.list_segments()?;
    let selected: Vec<Segment> = if config.data_segments.is_empty() {
        segments.into_iter().filter(|s| s.kind.is_data_like()).collect()
    } else {
        config
            .data_segments
            .iter()
            .map(|name| {
                segments
                    .iter()
                    .find(|s| &s.name == name)
                    .cloned()
                    .ok_or_else(|| PassError::UnknownSegment(name.clone()))
            })
            .collect::<Result<_, _>>()?
    };
    if selected.is_empty() {
        return Err(PassError::NoDataSegments);
    }
    Ok(selected)
}

/// Annotate every function and selected data item with its reference count.
///
/// Comments written before a cancellation are kept. Running twice prefixes
/// a second count onto the first.
pub fn run_pass<H: HostDatabase + ?Sized>(
    host: &mut H,
    progress: &mut dyn ProgressSink,
    config: &MarkConfig,
) -> Result<PassOutcome, PassError> {
    info!(version = crate::version(), "refmark: reference count annotation");
    let started = Instant::now();
    let mut state = PassState::Idle;

    if !host.is_analysis_complete()? {
        warn!("analysis incomplete; refusing to run");
        return Err(PassError::AnalysisIncomplete);
    }

    enter(&mut state, PassState::SegmentResolution);
    let segments = resolve_segments(&*host, config)?;

    let stride = config.stride();
    let mut summary = PassSummary::default();
    let mut guard = ProgressGuard::new(progress);

    if config.process_functions {
        enter(&mut state, PassState::FunctionPass);
        let functions = host.list_functions()?;
        info!(functions = functions.len(), "counting function references");
        let mut counter = FunctionRefCounter::new(&mut *host);
        for (i, function) in functions.iter().enumerate() {
            let annotation = counter.annotate(function);
            summary.record_function(&annotation);
            if checkpoint(&mut guard, i, stride) {
                enter(&mut state, PassState::Aborted);
                break;
            }
        }
    }

    if config.process_data && state != PassState::Aborted {
        enter(&mut state, PassState::DataPass);
        let mut i = 0usize;
        'segments: for segment in &segments {
            info!(
                segment = %segment.name,
                start = %Hex(segment.start),
                end = %Hex(segment.end),
                "counting data references"
            );
            summary.segments_scanned += 1;
            let mut address = segment.start;
            while address < segment.end {
                let annotation = DataRefCounter::new(&mut *host).annotate(address);
                summary.record_data(&annotation);
                if checkpoint(&mut guard, i, stride) {
                    enter(&mut state, PassState::Aborted);
                    break 'segments;
                }
                i += 1;
                match host.next_address(address) {
                    Ok(Some(next)) if next > address => address = next,
                    Ok(_) => break,
                    Err(err) => {
                        warn!(address = %Hex(address), %err, "failed to step to next item");
                        summary.read_failures += 1;
                        break;
                    }
                }
            }
        }
    }

    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    drop(guard);

    if state == PassState::Aborted {
        warn!(
            functions_annotated = summary.functions_annotated,
            data_annotated = summary.data_annotated,
            "aborted by user"
        );
    } else {
        enter(&mut state, PassState::Done);
        info!(
            functions_scanned = summary.functions_scanned,
            functions_annotated = summary.functions_annotated,
            items_scanned = summary.items_scanned,
            data_annotated = summary.data_annotated,
            write_failures = summary.write_failures,
            elapsed_ms = summary.elapsed_ms,
            "done"
        );
    }
    Ok(PassOutcome { state, summary })
}

fn enter(state: &mut PassState, next: PassState) {
    debug!(from = state.as_str(), to = next.as_str(), "pass state");
    *state = next;
}

/// Report progress and poll for cancellation after every `stride` items.
fn checkpoint(guard: &mut ProgressGuard<'_>, index: usize, stride: usize) -> bool {
    if (index + 1) % stride != 0 {
        return false;
    }
    guard.report_progress(index + 1);
    guard.poll_cancelled()
}
