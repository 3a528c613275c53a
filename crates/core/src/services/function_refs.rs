use tracing::{debug, warn};

use crate::host::{HostDatabase, HostResult};
use crate::model::{CommentSlot, Function, Hex};
use crate::services::classify::{all_code_refs, leading_code_refs};
use crate::services::comment::prefix_count;
use crate::services::Annotation;

/// Prefixes each function's comment with the number of call/jump sites
/// referencing it, when there is more than one.
pub struct FunctionRefCounter<'a, H: HostDatabase + ?Sized> {
    host: &'a mut H,
}

impl<'a, H: HostDatabase + ?Sized> FunctionRefCounter<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        Self { host }
    }

    /// Count code-flow references to `function` without touching its comment.
    ///
    /// Uses an early-exit scan when the host enumerates code-flow references
    /// first, a full filtered scan otherwise.
    pub fn count(&self, function: &Function) -> HostResult<usize> {
        let refs = self.host.incoming_references(function.start)?;
        let count = if self.host.code_refs_first() {
            leading_code_refs(&refs)
        } else {
            all_code_refs(&refs)
        };
        Ok(count)
    }

    pub fn annotate(&mut self, function: &Function) -> Annotation {
        let start = function.start;
        let count = match self.count(function) {
            Ok(count) => count,
            Err(err) => {
                warn!(address = %Hex(start), %err, "failed to read function references");
                return Annotation::ReadFailed;
            }
        };
        if count <= 1 {
            return Annotation::Skipped;
        }

        let existing = match self.host.comment(start, CommentSlot::Function) {
            Ok(existing) => existing,
            Err(err) => {
                warn!(address = %Hex(start), %err, "failed to read function comment");
                return Annotation::ReadFailed;
            }
        };
        let comment = prefix_count(count, existing.as_deref());

        match self.host.set_comment(start, CommentSlot::Function, &comment) {
            Ok(()) => {
                debug!(address = %Hex(start), count, "function annotated");
                Annotation::Written { count, comment }
            }
            Err(err) => {
                warn!(address = %Hex(start), %err, "failed to set function comment");
                Annotation::WriteFailed { count }
            }
        }
    }
}
