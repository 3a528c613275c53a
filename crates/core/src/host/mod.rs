//! Host collaborator interfaces.
//!
//! The annotation pass never talks to a concrete disassembler. Everything it
//! needs (functions, segments, cross-references, flags, strings, comments)
//! comes through [`HostDatabase`], and progress/cancellation comes through
//! [`ProgressSink`]. This keeps the counters testable against
//! [`InMemoryDatabase`] and lets the CLI drive a SQLite-backed store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::model::{Address, CommentSlot, Function, Segment, StringType, Xref};

pub mod memory;
pub mod snapshot;
pub mod strings;

pub use memory::InMemoryDatabase;
pub use snapshot::Snapshot;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("database error: {0}")]
    Db(#[from] crate::db::DbError),
    #[error("no function starts at {0:#x}")]
    NoSuchFunction(Address),
    #[error("no string literal at {0:#x}")]
    NotAString(Address),
    #[error("comment store rejected write at {0:#x}")]
    WriteRejected(Address),
    #[error("host error: {0}")]
    Other(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Operations the annotation pass requires from the disassembly database.
pub trait HostDatabase {
    /// Whether auto-analysis has finished; the pass refuses to run otherwise.
    fn is_analysis_complete(&self) -> HostResult<bool>;

    /// Functions in the host's native (stable) order.
    fn list_functions(&self) -> HostResult<Vec<Function>>;

    fn list_segments(&self) -> HostResult<Vec<Segment>>;

    /// Incoming references to `target`.
    ///
    /// When [`code_refs_first`](Self::code_refs_first) holds, all code-flow
    /// references come before any other kind.
    fn incoming_references(&self, target: Address) -> HostResult<Vec<Xref>>;

    /// Whether the host guarantees code-flow references are enumerated first.
    fn code_refs_first(&self) -> bool {
        true
    }

    fn is_code(&self, address: Address) -> HostResult<bool>;

    fn is_string_literal(&self, address: Address) -> HostResult<bool>;

    fn string_type(&self, address: Address) -> HostResult<StringType>;

    /// Payload length of the literal at `address`. May exceed the comment capacity.
    fn max_decodable_length(&self, address: Address, string_type: StringType)
        -> HostResult<usize>;

    /// Decoded, escaped contents of the literal.
    fn decode_string(
        &self,
        address: Address,
        len: usize,
        string_type: StringType,
    ) -> HostResult<String>;

    fn comment(&self, address: Address, slot: CommentSlot) -> HostResult<Option<String>>;

    fn set_comment(&mut self, address: Address, slot: CommentSlot, text: &str)
        -> HostResult<()>;

    /// Start of the next distinct item after `address`, or `None` at the end.
    fn next_address(&self, address: Address) -> HostResult<Option<Address>>;
}

/// Progress display and cooperative cancellation.
pub trait ProgressSink {
    fn show(&mut self) {}

    fn report_progress(&mut self, _done: usize) {}

    /// Polled at a coarse stride; returning `true` aborts the current sub-pass.
    fn poll_cancelled(&mut self) -> bool;

    fn hide(&mut self) {}
}

/// Shows the progress sink on creation and hides it when dropped.
pub struct ProgressGuard<'a> {
    sink: &'a mut dyn ProgressSink,
}

impl<'a> ProgressGuard<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        sink.show();
        Self { sink }
    }

    pub fn report_progress(&mut self, done: usize) {
        self.sink.report_progress(done);
    }

    pub fn poll_cancelled(&mut self) -> bool {
        self.sink.poll_cancelled()
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.sink.hide();
    }
}

/// Progress sink that never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn poll_cancelled(&mut self) -> bool {
        false
    }
}

/// Cancellation flag that can be raised from another owner.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl ProgressSink for CancelFlag {
    fn poll_cancelled(&mut self) -> bool {
        self.is_cancelled()
    }
}

/// Cancels once a wall-clock budget has been used up.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self { started: Instant::now(), budget }
    }
}

impl ProgressSink for Deadline {
    fn report_progress(&mut self, done: usize) {
        tracing::debug!(done, elapsed_ms = self.started.elapsed().as_millis() as u64, "progress");
    }

    fn poll_cancelled(&mut self) -> bool {
        self.started.elapsed() >= self.budget
    }
}
