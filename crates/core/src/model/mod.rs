//! Core data model: addresses, cross-references, segments, and string literals.
//!
//! These are views over a host disassembly database. Nothing here owns
//! persistent state; hosts hand these values out and the counters consume them.

use serde::{Deserialize, Serialize};

/// Location in the program's address space.
pub type Address = u64;

/// Displays an address as `0x…` in log fields and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hex(pub Address);

impl std::fmt::Display for Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Typed cross-reference class, mirroring the host disassembler's flags.
///
/// Code-flow kinds describe control transfers; the rest are data references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XrefKind {
    /// Untyped data reference. Never counted for data items.
    Unknown,
    /// Stored pointer/offset value. May originate from code or data.
    Offset,
    Write,
    Read,
    Text,
    Informational,
    Symbolic,
    CallFar,
    CallNear,
    JumpFar,
    JumpNear,
    /// Ordinary fall-through flow.
    Flow,
}

impl XrefKind {
    /// True for calls, jumps and ordinary flow.
    pub fn is_code_flow(self) -> bool {
        matches!(
            self,
            XrefKind::CallFar
                | XrefKind::CallNear
                | XrefKind::JumpFar
                | XrefKind::JumpNear
                | XrefKind::Flow
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            XrefKind::Unknown => "unknown",
            XrefKind::Offset => "offset",
            XrefKind::Write => "write",
            XrefKind::Read => "read",
            XrefKind::Text => "text",
            XrefKind::Informational => "informational",
            XrefKind::Symbolic => "symbolic",
            XrefKind::CallFar => "call_far",
            XrefKind::CallNear => "call_near",
            XrefKind::JumpFar => "jump_far",
            XrefKind::JumpNear => "jump_near",
            XrefKind::Flow => "flow",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value {
            "unknown" => XrefKind::Unknown,
            "offset" => XrefKind::Offset,
            "write" => XrefKind::Write,
            "read" => XrefKind::Read,
            "text" => XrefKind::Text,
            "informational" => XrefKind::Informational,
            "symbolic" => XrefKind::Symbolic,
            "call_far" => XrefKind::CallFar,
            "call_near" => XrefKind::CallNear,
            "jump_far" => XrefKind::JumpFar,
            "jump_near" => XrefKind::JumpNear,
            "flow" => XrefKind::Flow,
            _ => return None,
        };
        Some(kind)
    }
}

/// Directed reference from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xref {
    pub from: Address,
    pub to: Address,
    pub kind: XrefKind,
}

impl Xref {
    pub fn new(from: Address, to: Address, kind: XrefKind) -> Self {
        Self { from, to, kind }
    }
}

/// Function known to the host, keyed by its start address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub start: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Function {
    pub fn new(start: Address) -> Self {
        Self { start, name: None }
    }
}

/// Declared segment type. Only `Data` is selected by default for the data pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Normal,
    Code,
    Data,
    Bss,
    Extern,
    Import,
    Other,
}

impl SegmentKind {
    /// Generic data segment, the default population for the data pass.
    pub fn is_data_like(self) -> bool {
        matches!(self, SegmentKind::Data)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Normal => "normal",
            SegmentKind::Code => "code",
            SegmentKind::Data => "data",
            SegmentKind::Bss => "bss",
            SegmentKind::Extern => "extern",
            SegmentKind::Import => "import",
            SegmentKind::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value {
            "normal" => SegmentKind::Normal,
            "code" => SegmentKind::Code,
            "data" => SegmentKind::Data,
            "bss" => SegmentKind::Bss,
            "extern" => SegmentKind::Extern,
            "import" => SegmentKind::Import,
            "other" => SegmentKind::Other,
            _ => return None,
        };
        Some(kind)
    }
}

/// Half-open address range `[start, end)` with a name and declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub start: Address,
    pub end: Address,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn new(name: impl Into<String>, start: Address, end: Address, kind: SegmentKind) -> Self {
        Self { name: name.into(), start, end, kind }
    }

    pub fn contains(&self, address: Address) -> bool {
        address >= self.start && address < self.end
    }
}

/// Encoding tag of a string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringType {
    /// NUL-terminated 8-bit text.
    C,
    /// NUL-terminated UTF-16 little endian.
    Utf16Le,
    /// One-byte length prefix followed by 8-bit text.
    Pascal,
}

impl StringType {
    pub fn as_str(self) -> &'static str {
        match self {
            StringType::C => "c",
            StringType::Utf16Le => "utf16le",
            StringType::Pascal => "pascal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "c" => Some(StringType::C),
            "utf16le" => Some(StringType::Utf16Le),
            "pascal" => Some(StringType::Pascal),
            _ => None,
        }
    }
}

/// Which annotation slot a comment lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSlot {
    /// Function-level comment, keyed by function start.
    Function,
    /// Plain one-off comment on an item.
    Regular,
    /// Comment propagated to every place showing the same value.
    Repeatable,
}

impl CommentSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentSlot::Function => "function",
            CommentSlot::Regular => "regular",
            CommentSlot::Repeatable => "repeatable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "function" => Some(CommentSlot::Function),
            "regular" => Some(CommentSlot::Regular),
            "repeatable" => Some(CommentSlot::Repeatable),
            _ => None,
        }
    }
}
