//! In-memory host database.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;

use crate::host::snapshot::{CommentEntry, ItemEntry, ItemKind, Snapshot, StringEntry};
use crate::host::{strings, HostDatabase, HostError, HostResult};
use crate::model::{Address, CommentSlot, Function, Segment, StringType, Xref, XrefKind};

#[derive(Debug, Clone)]
struct Item {
    size: u64,
    kind: ItemKind,
    string: Option<(StringType, Vec<u8>)>,
}

/// Host database held entirely in memory.
///
/// Items are address ranges; `is_code` answers for any address covered by a
/// code item or equal to a function start. Incoming references come back in
/// insertion order, stably reordered code-flow first unless
/// [`set_code_refs_first(false)`](Self::set_code_refs_first) is used to model
/// a host without that guarantee.
#[derive(Debug, Clone)]
pub struct InMemoryDatabase {
    analysis_complete: bool,
    code_refs_first: bool,
    segments: Vec<Segment>,
    functions: BTreeMap<Address, Function>,
    items: BTreeMap<Address, Item>,
    xrefs: Vec<Xref>,
    comments: HashMap<(Address, CommentSlot), String>,
    rejected_writes: HashSet<Address>,
    write_log: Vec<(Address, CommentSlot)>,
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self {
            analysis_complete: true,
            code_refs_first: true,
            segments: Vec::new(),
            functions: BTreeMap::new(),
            items: BTreeMap::new(),
            xrefs: Vec::new(),
            comments: HashMap::new(),
            rejected_writes: HashSet::new(),
            write_log: Vec::new(),
        }
    }

    pub fn set_analysis_complete(&mut self, complete: bool) -> &mut Self {
        self.analysis_complete = complete;
        self
    }

    pub fn set_code_refs_first(&mut self, ordered: bool) -> &mut Self {
        self.code_refs_first = ordered;
        self
    }

    pub fn add_segment(&mut self, segment: Segment) -> &mut Self {
        self.segments.push(segment);
        self
    }

    pub fn add_function(&mut self, start: Address, name: Option<&str>) -> &mut Self {
        self.functions
            .insert(start, Function { start, name: name.map(str::to_string) });
        self
    }

    pub fn add_code(&mut self, address: Address, size: u64) -> &mut Self {
        self.items.insert(address, Item { size, kind: ItemKind::Code, string: None });
        self
    }

    pub fn add_data(&mut self, address: Address, size: u64) -> &mut Self {
        self.items.insert(address, Item { size, kind: ItemKind::Data, string: None });
        self
    }

    pub fn add_string(&mut self, address: Address, string_type: StringType, text: &str) -> &mut Self {
        let bytes = strings::encode(string_type, text);
        self.add_string_bytes(address, string_type, bytes)
    }

    /// Add a string literal from raw bytes as laid out in the binary.
    pub fn add_string_bytes(
        &mut self,
        address: Address,
        string_type: StringType,
        bytes: Vec<u8>,
    ) -> &mut Self {
        let size = bytes.len().max(1) as u64;
        self.items.insert(
            address,
            Item { size, kind: ItemKind::String, string: Some((string_type, bytes)) },
        );
        self
    }

    pub fn add_xref(&mut self, from: Address, to: Address, kind: XrefKind) -> &mut Self {
        self.xrefs.push(Xref::new(from, to, kind));
        self
    }

    /// Seed a comment without recording it as a write.
    pub fn put_comment(&mut self, address: Address, slot: CommentSlot, text: &str) -> &mut Self {
        self.comments.insert((address, slot), text.to_string());
        self
    }

    /// Make every comment write at `address` fail.
    pub fn reject_writes_at(&mut self, address: Address) -> &mut Self {
        self.rejected_writes.insert(address);
        self
    }

    /// Successful comment writes, in order.
    pub fn write_log(&self) -> &[(Address, CommentSlot)] {
        &self.write_log
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut db = Self::new();
        db.set_analysis_complete(snapshot.analysis_complete);
        for segment in &snapshot.segments {
            db.add_segment(segment.clone());
        }
        for function in &snapshot.functions {
            db.functions.insert(function.start, function.clone());
        }
        for item in &snapshot.items {
            match (item.kind, &item.string) {
                (ItemKind::String, Some(entry)) => {
                    db.add_string(item.address, entry.string_type, &entry.text);
                }
                (kind, _) => {
                    db.items.insert(item.address, Item { size: item.size, kind, string: None });
                }
            }
        }
        db.xrefs.extend(snapshot.xrefs.iter().copied());
        for comment in &snapshot.comments {
            db.put_comment(comment.address, comment.slot, &comment.text);
        }
        db
    }

    pub fn to_snapshot(&self) -> Snapshot {
        let items = self
            .items
            .iter()
            .map(|(address, item)| ItemEntry {
                address: *address,
                size: item.size,
                kind: item.kind,
                string: item.string.as_ref().map(|(string_type, bytes)| StringEntry {
                    string_type: *string_type,
                    text: strings::decode_raw(*string_type, bytes, usize::MAX),
                }),
            })
            .collect();
        let mut comments: Vec<CommentEntry> = self
            .comments
            .iter()
            .map(|((address, slot), text)| CommentEntry {
                address: *address,
                slot: *slot,
                text: text.clone(),
            })
            .collect();
        comments.sort_by_key(|c| (c.address, c.slot as u8));
        Snapshot {
            analysis_complete: self.analysis_complete,
            segments: self.segments.clone(),
            functions: self.functions.values().cloned().collect(),
            items,
            xrefs: self.xrefs.clone(),
            comments,
        }
    }

    fn string_item(&self, address: Address) -> HostResult<&(StringType, Vec<u8>)> {
        self.items
            .get(&address)
            .and_then(|item| item.string.as_ref())
            .ok_or(HostError::NotAString(address))
    }
}

impl HostDatabase for InMemoryDatabase {
    fn is_analysis_complete(&self) -> HostResult<bool> {
        Ok(self.analysis_complete)
    }

    fn list_functions(&self) -> HostResult<Vec<Function>> {
        Ok(self.functions.values().cloned().collect())
    }

    fn list_segments(&self) -> HostResult<Vec<Segment>> {
        Ok(self.segments.clone())
    }

    fn incoming_references(&self, target: Address) -> HostResult<Vec<Xref>> {
        let mut refs: Vec<Xref> = self.xrefs.iter().filter(|x| x.to == target).copied().collect();
        if self.code_refs_first {
            refs.sort_by_key(|x| !x.kind.is_code_flow());
        }
        Ok(refs)
    }

    fn code_refs_first(&self) -> bool {
        self.code_refs_first
    }

    fn is_code(&self, address: Address) -> HostResult<bool> {
        if self.functions.contains_key(&address) {
            return Ok(true);
        }
        let covering = self
            .items
            .range(..=address)
            .next_back()
            .filter(|(start, item)| address - **start < item.size.max(1));
        Ok(matches!(covering, Some((_, item)) if item.kind == ItemKind::Code))
    }

    fn is_string_literal(&self, address: Address) -> HostResult<bool> {
        Ok(self.items.get(&address).is_some_and(|item| item.kind == ItemKind::String))
    }

    fn string_type(&self, address: Address) -> HostResult<StringType> {
        Ok(self.string_item(address)?.0)
    }

    fn max_decodable_length(
        &self,
        address: Address,
        string_type: StringType,
    ) -> HostResult<usize> {
        let (_, bytes) = self.string_item(address)?;
        Ok(strings::max_length(string_type, bytes))
    }

    fn decode_string(
        &self,
        address: Address,
        len: usize,
        string_type: StringType,
    ) -> HostResult<String> {
        let (_, bytes) = self.string_item(address)?;
        Ok(strings::decode(string_type, bytes, len))
    }

    fn comment(&self, address: Address, slot: CommentSlot) -> HostResult<Option<String>> {
        Ok(self.comments.get(&(address, slot)).cloned())
    }

    fn set_comment(&mut self, address: Address, slot: CommentSlot, text: &str) -> HostResult<()> {
        if self.rejected_writes.contains(&address) {
            return Err(HostError::WriteRejected(address));
        }
        let is_function = self.functions.contains_key(&address);
        match slot {
            CommentSlot::Function if !is_function => {
                return Err(HostError::NoSuchFunction(address));
            }
            CommentSlot::Regular | CommentSlot::Repeatable
                if !is_function && !self.items.contains_key(&address) =>
            {
                return Err(HostError::WriteRejected(address));
            }
            _ => {}
        }
        self.comments.insert((address, slot), text.to_string());
        self.write_log.push((address, slot));
        Ok(())
    }

    fn next_address(&self, address: Address) -> HostResult<Option<Address>> {
        Ok(self
            .items
            .range((Bound::Excluded(address), Bound::Unbounded))
            .next()
            .map(|(start, _)| *start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SegmentKind;

    #[test]
    fn code_refs_are_reordered_first() {
        let mut db = InMemoryDatabase::new();
        db.add_xref(0x10, 0x100, XrefKind::Offset)
            .add_xref(0x20, 0x100, XrefKind::CallNear)
            .add_xref(0x30, 0x100, XrefKind::Read)
            .add_xref(0x40, 0x100, XrefKind::JumpNear);
        let kinds: Vec<XrefKind> =
            db.incoming_references(0x100).unwrap().into_iter().map(|x| x.kind).collect();
        assert_eq!(
            kinds,
            vec![XrefKind::CallNear, XrefKind::JumpNear, XrefKind::Offset, XrefKind::Read]
        );
    }

    #[test]
    fn unordered_host_keeps_insertion_order() {
        let mut db = InMemoryDatabase::new();
        db.set_code_refs_first(false)
            .add_xref(0x10, 0x100, XrefKind::Offset)
            .add_xref(0x20, 0x100, XrefKind::CallNear);
        let refs = db.incoming_references(0x100).unwrap();
        assert_eq!(refs[0].kind, XrefKind::Offset);
        assert!(!db.code_refs_first());
    }

    #[test]
    fn is_code_covers_whole_instruction() {
        let mut db = InMemoryDatabase::new();
        db.add_code(0x400, 4).add_data(0x404, 8).add_function(0x500, Some("f"));
        assert!(db.is_code(0x400).unwrap());
        assert!(db.is_code(0x403).unwrap());
        assert!(!db.is_code(0x404).unwrap());
        assert!(db.is_code(0x500).unwrap());
        assert!(!db.is_code(0x600).unwrap());
    }

    #[test]
    fn next_address_skips_to_next_item_head() {
        let mut db = InMemoryDatabase::new();
        db.add_data(0x1000, 8).add_data(0x1008, 4);
        assert_eq!(db.next_address(0x1000).unwrap(), Some(0x1008));
        assert_eq!(db.next_address(0x1002).unwrap(), Some(0x1008));
        assert_eq!(db.next_address(0x1008).unwrap(), None);
    }

    #[test]
    fn function_comment_requires_function() {
        let mut db = InMemoryDatabase::new();
        let err = db.set_comment(0x10, CommentSlot::Function, "x").unwrap_err();
        assert!(matches!(err, HostError::NoSuchFunction(0x10)));
    }

    #[test]
    fn item_comment_requires_item_head() {
        let mut db = InMemoryDatabase::new();
        db.add_data(0x3000, 8).add_function(0x400, None);
        let err = db.set_comment(0x3004, CommentSlot::Repeatable, "x").unwrap_err();
        assert!(matches!(err, HostError::WriteRejected(0x3004)));
        db.set_comment(0x3000, CommentSlot::Repeatable, "ok").unwrap();
        db.set_comment(0x400, CommentSlot::Regular, "entry").unwrap();
        assert_eq!(db.write_log().len(), 2);
    }

    #[test]
    fn snapshot_round_trip_preserves_strings_and_comments() {
        let mut db = InMemoryDatabase::new();
        db.add_segment(Segment::new(".data", 0x1000, 0x2000, SegmentKind::Data))
            .add_function(0x400, Some("main"))
            .add_string(0x1000, StringType::Utf16Le, "wide")
            .add_xref(0x400, 0x1000, XrefKind::Read)
            .put_comment(0x1000, CommentSlot::Repeatable, "note");
        let snapshot = db.to_snapshot();
        let restored = InMemoryDatabase::from_snapshot(&snapshot);
        assert_eq!(restored.to_snapshot(), snapshot);
        assert_eq!(snapshot.items[0].string.as_ref().unwrap().text, "wide");
    }
}
