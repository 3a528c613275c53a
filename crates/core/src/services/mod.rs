//! Reference-count annotation services.
//!
//! - [`classify`]: which references count for functions and data items.
//! - [`comment`]: composition and truncation of the comment text.
//! - [`function_refs`] / [`data_refs`]: per-item counters.
//! - [`pass`]: the driving pass over functions and data segments.
//! - [`runner`]: the pass plus run bookkeeping for the SQLite host.

pub mod classify;
pub mod comment;
pub mod data_refs;
pub mod function_refs;
pub mod pass;
pub mod runner;

pub use data_refs::DataRefCounter;
pub use function_refs::FunctionRefCounter;
pub use pass::{run_pass, PassError, PassOutcome, PassState, PassSummary};
pub use runner::{run_and_record, RecordedRun};

/// What a counter did with a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// Code in a data segment, or at most one qualifying reference.
    Skipped,
    Written { count: usize, comment: String },
    /// The comment store rejected the write.
    WriteFailed { count: usize },
    /// A string literal decoded to nothing.
    DecodeFailed { count: usize },
    /// A host query failed before a comment could be composed.
    ReadFailed,
}

impl Annotation {
    pub fn is_written(&self) -> bool {
        matches!(self, Annotation::Written { .. })
    }
}
