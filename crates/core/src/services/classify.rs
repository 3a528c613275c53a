//! Rules for which cross-references count toward an item's reference total.
//!
//! Functions and data items use different rules:
//! - a function counts code-flow references (calls, jumps, flow);
//! - a data item counts everything except untyped data references and
//!   offset references whose origin is itself data (pointer tables).

use crate::host::{HostDatabase, HostResult};
use crate::model::{Xref, XrefKind};

/// Whether `xref` counts toward a function's reference total.
pub fn counts_for_function(xref: &Xref) -> bool {
    xref.kind.is_code_flow()
}

/// Whether `xref` counts toward a data item's reference total.
///
/// Needs the host only for offset references, to ask whether the origin is code.
pub fn counts_for_data<H: HostDatabase + ?Sized>(host: &H, xref: &Xref) -> HostResult<bool> {
    match xref.kind {
        XrefKind::Unknown => Ok(false),
        XrefKind::Offset => host.is_code(xref.from),
        _ => Ok(true),
    }
}

/// Number of leading code-flow references.
///
/// Only valid when the host enumerates code-flow references before any other
/// kind; stops at the first non-code-flow reference.
pub fn leading_code_refs(refs: &[Xref]) -> usize {
    refs.iter().take_while(|x| counts_for_function(x)).count()
}

/// Number of code-flow references anywhere in `refs`.
pub fn all_code_refs(refs: &[Xref]) -> usize {
    refs.iter().filter(|x| counts_for_function(x)).count()
}
