use tracing::{debug, warn};

use crate::host::{HostDatabase, HostResult};
use crate::model::{Address, CommentSlot, Hex};
use crate::services::classify::counts_for_data;
use crate::services::comment::{prefix_count, string_count};
use crate::services::Annotation;

/// Writes the number of qualifying references into a data item's repeatable
/// comment, when there is more than one.
///
/// Precedence when composing the comment:
/// 1. an existing repeatable comment is prefixed with the count;
/// 2. a string literal gets `{count} "{contents}"`;
/// 3. anything else gets the bare count.
pub struct DataRefCounter<'a, H: HostDatabase + ?Sized> {
    host: &'a mut H,
}

impl<'a, H: HostDatabase + ?Sized> DataRefCounter<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        Self { host }
    }

    /// Count qualifying references to `address`. Every reference is examined.
    pub fn count(&self, address: Address) -> HostResult<usize> {
        let mut count = 0;
        for xref in self.host.incoming_references(address)? {
            if counts_for_data(&*self.host, &xref)? {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn annotate(&mut self, address: Address) -> Annotation {
        match self.try_annotate(address) {
            Ok(annotation) => annotation,
            Err(err) => {
                warn!(address = %Hex(address), %err, "failed to read data item");
                Annotation::ReadFailed
            }
        }
    }

    fn try_annotate(&mut self, address: Address) -> HostResult<Annotation> {
        // Code inside a nominal data segment is left alone.
        if self.host.is_code(address)? {
            return Ok(Annotation::Skipped);
        }
        let count = self.count(address)?;
        if count <= 1 {
            return Ok(Annotation::Skipped);
        }

        let comment = match self.host.comment(address, CommentSlot::Repeatable)? {
            Some(existing) if !existing.is_empty() => prefix_count(count, Some(&existing)),
            _ if self.host.is_string_literal(address)? => {
                let string_type = self.host.string_type(address)?;
                let len = self.host.max_decodable_length(address, string_type)?;
                let decoded = if len > 0 {
                    self.host.decode_string(address, len, string_type)?
                } else {
                    String::new()
                };
                if decoded.is_empty() {
                    warn!(address = %Hex(address), "failed to decode string literal");
                    return Ok(Annotation::DecodeFailed { count });
                }
                string_count(count, &decoded)
            }
            _ => prefix_count(count, None),
        };

        match self.host.set_comment(address, CommentSlot::Repeatable, &comment) {
            Ok(()) => {
                debug!(address = %Hex(address), count, "data item annotated");
                Ok(Annotation::Written { count, comment })
            }
            Err(err) => {
                warn!(address = %Hex(address), %err, "failed to set data comment");
                Ok(Annotation::WriteFailed { count })
            }
        }
    }
}
