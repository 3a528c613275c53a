use refmark_core::config::MarkConfig;
use refmark_core::host::{CancelFlag, HostDatabase, InMemoryDatabase, NoProgress, ProgressSink};
use refmark_core::model::{CommentSlot, Segment, SegmentKind, StringType, XrefKind};
use refmark_core::services::{run_pass, PassError, PassState};

const F: u64 = 0x401000;
const D: u64 = 0x404000;

fn base() -> InMemoryDatabase {
    let mut db = InMemoryDatabase::new();
    db.add_segment(Segment::new(".text", 0x401000, 0x404000, SegmentKind::Code))
        .add_segment(Segment::new(".data", 0x404000, 0x405000, SegmentKind::Data))
        .add_code(0x402000, 0x100);
    db
}

fn functions_only() -> MarkConfig {
    MarkConfig { process_data: false, ..MarkConfig::default() }
}

fn data_only() -> MarkConfig {
    MarkConfig { process_functions: false, ..MarkConfig::default() }
}

#[test]
fn function_with_three_callers_gets_plain_count() {
    let mut db = base();
    db.add_function(F, Some("parse"));
    for from in [0x402000, 0x402010, 0x402020] {
        db.add_xref(from, F, XrefKind::CallNear);
    }
    run_pass(&mut db, &mut NoProgress, &functions_only()).expect("pass");
    assert_eq!(db.comment(F, CommentSlot::Function).unwrap().as_deref(), Some("3"));
}

#[test]
fn function_with_one_caller_keeps_no_comment() {
    let mut db = base();
    db.add_function(F, Some("parse")).add_xref(0x402000, F, XrefKind::CallNear);
    run_pass(&mut db, &mut NoProgress, &functions_only()).expect("pass");
    assert_eq!(db.comment(F, CommentSlot::Function).unwrap(), None);
}

#[test]
fn string_literal_with_two_references() {
    let mut db = base();
    db.add_string(D, StringType::C, "Hello")
        .add_xref(0x402000, D, XrefKind::Offset)
        .add_xref(0x402040, D, XrefKind::Read);
    run_pass(&mut db, &mut NoProgress, &data_only()).expect("pass");
    assert_eq!(
        db.comment(D, CommentSlot::Repeatable).unwrap().as_deref(),
        Some(r#"2 "Hello""#)
    );
}

#[test]
fn existing_repeatable_comment_is_prefixed() {
    let mut db = base();
    db.add_data(D, 4).put_comment(D, CommentSlot::Repeatable, "note");
    for from in [0x402000, 0x402010, 0x402020, 0x402030] {
        db.add_xref(from, D, XrefKind::Read);
    }
    run_pass(&mut db, &mut NoProgress, &data_only()).expect("pass");
    assert_eq!(db.comment(D, CommentSlot::Repeatable).unwrap().as_deref(), Some("4 note"));
}

#[test]
fn code_inside_data_segment_is_skipped() {
    let mut db = base();
    db.add_code(D, 8)
        .add_xref(0x402000, D, XrefKind::JumpNear)
        .add_xref(0x402010, D, XrefKind::Read);
    let outcome = run_pass(&mut db, &mut NoProgress, &data_only()).expect("pass");
    assert_eq!(outcome.summary.items_scanned, 1);
    assert!(db.write_log().is_empty());
}

#[test]
fn empty_data_selection_aborts_the_run() {
    let mut db = InMemoryDatabase::new();
    db.add_segment(Segment::new(".text", 0x401000, 0x404000, SegmentKind::Code))
        .add_function(F, None)
        .add_xref(0x402000, F, XrefKind::CallNear)
        .add_xref(0x402010, F, XrefKind::CallNear);
    let err = run_pass(&mut db, &mut NoProgress, &data_only()).unwrap_err();
    assert!(matches!(err, PassError::NoDataSegments));
    assert!(db.write_log().is_empty());
}

#[test]
fn offset_classification_depends_on_origin() {
    let mut db = base();
    db.add_data(D, 4)
        .add_data(0x404100, 0x40)
        // pointer table entries
        .add_xref(0x404100, D, XrefKind::Offset)
        .add_xref(0x404108, D, XrefKind::Offset)
        // code loading the address
        .add_xref(0x402000, D, XrefKind::Offset)
        // untyped, from code
        .add_xref(0x402010, D, XrefKind::Unknown);
    run_pass(&mut db, &mut NoProgress, &data_only()).expect("pass");
    assert_eq!(db.comment(D, CommentSlot::Repeatable).unwrap(), None);

    db.add_xref(0x402020, D, XrefKind::Read);
    run_pass(&mut db, &mut NoProgress, &data_only()).expect("pass");
    assert_eq!(db.comment(D, CommentSlot::Repeatable).unwrap().as_deref(), Some("2"));
}

#[test]
fn repeated_runs_accumulate_prefixes() {
    let mut db = base();
    db.add_function(F, None)
        .put_comment(F, CommentSlot::Function, "init")
        .add_xref(0x402000, F, XrefKind::CallNear)
        .add_xref(0x402010, F, XrefKind::CallFar);
    for expected in ["2 init", "2 2 init", "2 2 2 init"] {
        run_pass(&mut db, &mut NoProgress, &functions_only()).expect("pass");
        assert_eq!(db.comment(F, CommentSlot::Function).unwrap().as_deref(), Some(expected));
    }
}

#[test]
fn raised_cancel_flag_stops_at_first_checkpoint() {
    let mut db = base();
    for i in 0..10u64 {
        let addr = D + i * 0x10;
        db.add_data(addr, 0x10)
            .add_xref(0x402000, addr, XrefKind::Read)
            .add_xref(0x402004, addr, XrefKind::Read);
    }
    let flag = CancelFlag::new();
    flag.cancel();
    let mut sink = flag.clone();
    let config = MarkConfig { cancel_check_stride: 3, ..data_only() };
    let outcome = run_pass(&mut db, &mut sink, &config).expect("pass");
    assert_eq!(outcome.state, PassState::Aborted);
    assert_eq!(outcome.summary.items_scanned, 3);
    assert_eq!(outcome.summary.data_annotated, 3);
    assert!(db.comment(D + 0x30, CommentSlot::Repeatable).unwrap().is_none());
}

struct Counting {
    polls: usize,
    reported: Vec<usize>,
}

impl ProgressSink for Counting {
    fn report_progress(&mut self, done: usize) {
        self.reported.push(done);
    }

    fn poll_cancelled(&mut self) -> bool {
        self.polls += 1;
        false
    }
}

#[test]
fn default_stride_polls_every_five_hundred_functions() {
    let mut db = base();
    for i in 0..1200u64 {
        db.add_function(0x500000 + i * 0x10, None);
    }
    let mut sink = Counting { polls: 0, reported: Vec::new() };
    let outcome = run_pass(&mut db, &mut sink, &functions_only()).expect("pass");
    assert_eq!(outcome.summary.functions_scanned, 1200);
    assert_eq!(sink.polls, 2);
    assert_eq!(sink.reported, vec![500, 1000]);
}

#[test]
fn wide_string_is_decoded_and_escaped() {
    let mut db = base();
    db.add_string(D, StringType::Utf16Le, "line\tone\n")
        .add_xref(0x402000, D, XrefKind::Read)
        .add_xref(0x402010, D, XrefKind::Read);
    run_pass(&mut db, &mut NoProgress, &data_only()).expect("pass");
    assert_eq!(
        db.comment(D, CommentSlot::Repeatable).unwrap().as_deref(),
        Some(r#"2 "line\tone\n""#)
    );
}
