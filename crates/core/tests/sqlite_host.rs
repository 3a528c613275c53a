use rusqlite::Connection;
use tempfile::tempdir;

use refmark_core::config::MarkConfig;
use refmark_core::db::{DbError, MarkRunRecord, MarkRunStatus, SqliteDatabase, CURRENT_SCHEMA_VERSION};
use refmark_core::host::snapshot::{CommentEntry, ItemEntry, ItemKind, StringEntry};
use refmark_core::host::{HostDatabase, HostError, InMemoryDatabase, NoProgress, Snapshot};
use refmark_core::model::{
    CommentSlot, Function, Segment, SegmentKind, StringType, Xref, XrefKind,
};
use refmark_core::services::run_pass;

fn sample_snapshot() -> Snapshot {
    Snapshot {
        analysis_complete: true,
        segments: vec![
            Segment::new(".text", 0x1000, 0x2000, SegmentKind::Code),
            Segment::new(".rdata", 0x3000, 0x3100, SegmentKind::Data),
        ],
        functions: vec![
            Function { start: 0x1000, name: Some("main".into()) },
            Function { start: 0x1200, name: None },
        ],
        items: vec![
            ItemEntry { address: 0x1000, size: 0x400, kind: ItemKind::Code, string: None },
            ItemEntry {
                address: 0x3000,
                size: 6,
                kind: ItemKind::String,
                string: Some(StringEntry { string_type: StringType::C, text: "Hello".into() }),
            },
            ItemEntry { address: 0x3010, size: 8, kind: ItemKind::Data, string: None },
        ],
        xrefs: vec![
            // data-kind reference listed before the calls
            Xref::new(0x3010, 0x1200, XrefKind::Offset),
            Xref::new(0x1010, 0x1200, XrefKind::CallNear),
            Xref::new(0x1020, 0x1200, XrefKind::CallNear),
            Xref::new(0x1030, 0x3000, XrefKind::Offset),
            Xref::new(0x1040, 0x3000, XrefKind::Read),
            Xref::new(0x1050, 0x3010, XrefKind::Read),
            Xref::new(0x1060, 0x3010, XrefKind::Read),
        ],
        comments: vec![CommentEntry {
            address: 0x3010,
            slot: CommentSlot::Repeatable,
            text: "vtable".into(),
        }],
    }
}

#[test]
fn fresh_database_is_at_current_schema() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("host.db");
    let db = SqliteDatabase::open(&path).expect("open");
    let stats = db.stats().expect("stats");
    assert_eq!(stats.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(stats.functions, 0);
    assert!(!stats.analysis_complete);
}

#[test]
fn newer_schema_is_refused() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("host.db");
    {
        let conn = Connection::open(&path).expect("open sqlite");
        conn.execute_batch("PRAGMA user_version = 99;").expect("set version");
    }
    let err = SqliteDatabase::open(&path).unwrap_err();
    assert!(matches!(err, DbError::UnsupportedSchemaVersion { found: 99, .. }));
}

#[test]
fn version_one_database_gains_run_table() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("host.db");
    {
        let db = SqliteDatabase::open(&path).expect("open");
        db.connection()
            .execute_batch("DROP TABLE mark_runs; PRAGMA user_version = 1;")
            .expect("downgrade");
    }
    let db = SqliteDatabase::open(&path).expect("reopen");
    assert_eq!(db.stats().expect("stats").schema_version, CURRENT_SCHEMA_VERSION);
    assert!(db.list_runs().expect("runs").is_empty());
}

#[test]
fn import_then_export_preserves_contents() {
    let db = SqliteDatabase::open_in_memory().expect("open");
    let snapshot = sample_snapshot();
    db.import_snapshot(&snapshot, Some("abc123")).expect("import");
    let exported = db.export_snapshot().expect("export");
    assert_eq!(exported, snapshot);
    assert_eq!(db.stats().expect("stats").source_hash.as_deref(), Some("abc123"));
}

#[test]
fn reimport_replaces_contents_but_keeps_runs() {
    let db = SqliteDatabase::open_in_memory().expect("open");
    db.import_snapshot(&sample_snapshot(), None).expect("import");
    db.insert_run(&MarkRunRecord {
        status: MarkRunStatus::Succeeded,
        started_at: "t0".into(),
        finished_at: "t1".into(),
        functions_annotated: 1,
        data_annotated: 2,
        write_failures: 0,
    })
    .expect("insert run");
    db.import_snapshot(&Snapshot::default(), None).expect("reimport");
    let stats = db.stats().expect("stats");
    assert_eq!(stats.functions, 0);
    assert_eq!(stats.xrefs, 0);
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.source_hash, None);
}

#[test]
fn references_come_back_code_flow_first() {
    let db = SqliteDatabase::open_in_memory().expect("open");
    db.import_snapshot(&sample_snapshot(), None).expect("import");
    let kinds: Vec<XrefKind> =
        db.incoming_references(0x1200).expect("refs").into_iter().map(|x| x.kind).collect();
    assert_eq!(kinds, vec![XrefKind::CallNear, XrefKind::CallNear, XrefKind::Offset]);
    assert!(db.is_code(0x1010).expect("is_code"));
    assert!(!db.is_code(0x3010).expect("is_code"));
    assert_eq!(db.next_address(0x3000).expect("next"), Some(0x3010));
}

#[test]
fn sqlite_and_memory_hosts_agree() {
    let snapshot = sample_snapshot();

    let mut sqlite = SqliteDatabase::open_in_memory().expect("open");
    sqlite.import_snapshot(&snapshot, None).expect("import");
    let a = run_pass(&mut sqlite, &mut NoProgress, &MarkConfig::default()).expect("sqlite pass");

    let mut memory = InMemoryDatabase::from_snapshot(&snapshot);
    let b = run_pass(&mut memory, &mut NoProgress, &MarkConfig::default()).expect("memory pass");

    assert_eq!(a.summary.functions_annotated, b.summary.functions_annotated);
    assert_eq!(a.summary.data_annotated, b.summary.data_annotated);
    assert_eq!(sqlite.export_snapshot().expect("export").comments, memory.to_snapshot().comments);

    let comments = sqlite.list_comments().expect("comments");
    let text = |address, slot| {
        comments
            .iter()
            .find(|c| c.address == address && c.slot == slot)
            .map(|c| c.text.as_str())
    };
    assert_eq!(text(0x1200, CommentSlot::Function), Some("2"));
    assert_eq!(text(0x3000, CommentSlot::Repeatable), Some("2 \"Hello\""));
    assert_eq!(text(0x3010, CommentSlot::Repeatable), Some("2 vtable"));
}

#[test]
fn function_comment_on_non_function_is_rejected() {
    let mut db = SqliteDatabase::open_in_memory().expect("open");
    db.import_snapshot(&sample_snapshot(), None).expect("import");
    assert!(db.set_comment(0x3000, CommentSlot::Function, "x").is_err());
    db.set_comment(0x1000, CommentSlot::Function, "entry").expect("set");
    assert_eq!(
        db.comment(0x1000, CommentSlot::Function).expect("get").as_deref(),
        Some("entry")
    );
}

#[test]
fn regular_comment_needs_an_item_or_function() {
    let mut db = SqliteDatabase::open_in_memory().expect("open");
    db.import_snapshot(&sample_snapshot(), None).expect("import");
    let err = db.set_comment(0x3050, CommentSlot::Repeatable, "x").unwrap_err();
    assert!(matches!(err, HostError::WriteRejected(0x3050)));
    assert!(db.set_comment(0x3004, CommentSlot::Regular, "x").is_err());
    assert_eq!(db.comment(0x3050, CommentSlot::Repeatable).expect("get"), None);

    db.set_comment(0x3000, CommentSlot::Repeatable, "greeting").expect("item head");
    // 0x1200 is a function start without an item of its own.
    db.set_comment(0x1200, CommentSlot::Regular, "helper").expect("function start");
    assert_eq!(db.list_comments().expect("comments").len(), 3);
}

const KERNEL_TEXT: u64 = 0xffff_ffff_8100_0000;

fn high_half_snapshot() -> Snapshot {
    Snapshot {
        analysis_complete: true,
        segments: vec![
            Segment::new(".data", 0x1000, 0x1100, SegmentKind::Data),
            Segment::new(".text", KERNEL_TEXT, KERNEL_TEXT + 0x1000, SegmentKind::Code),
        ],
        functions: vec![Function { start: KERNEL_TEXT, name: Some("startup".into()) }],
        items: vec![
            ItemEntry { address: 0x1000, size: 4, kind: ItemKind::Data, string: None },
            ItemEntry { address: 0x1004, size: 4, kind: ItemKind::Data, string: None },
            ItemEntry { address: KERNEL_TEXT, size: 0x100, kind: ItemKind::Code, string: None },
        ],
        xrefs: vec![
            Xref::new(KERNEL_TEXT + 0x10, 0x1000, XrefKind::Read),
            Xref::new(KERNEL_TEXT + 0x20, 0x1000, XrefKind::Write),
            Xref::new(0x1004, KERNEL_TEXT, XrefKind::Offset),
            Xref::new(KERNEL_TEXT + 0x30, KERNEL_TEXT, XrefKind::CallNear),
            Xref::new(KERNEL_TEXT + 0x40, KERNEL_TEXT, XrefKind::CallNear),
        ],
        comments: Vec::new(),
    }
}

#[test]
fn high_half_addresses_keep_unsigned_order() {
    let mut db = SqliteDatabase::open_in_memory().expect("open");
    let snapshot = high_half_snapshot();
    db.import_snapshot(&snapshot, None).expect("import");

    assert!(!db.is_code(0x800).expect("below every item"));
    assert!(!db.is_code(0x1000).expect("data item"));
    assert!(db.is_code(KERNEL_TEXT + 0x10).expect("inside code item"));
    assert!(!db.is_code(KERNEL_TEXT + 0x100).expect("past code item"));
    assert_eq!(db.next_address(0x1000).expect("next"), Some(0x1004));
    assert_eq!(db.next_address(0x1004).expect("next"), Some(KERNEL_TEXT));
    assert_eq!(db.next_address(KERNEL_TEXT).expect("next"), None);
    assert_eq!(db.export_snapshot().expect("export"), snapshot);

    let outcome = run_pass(&mut db, &mut NoProgress, &MarkConfig::default()).expect("pass");
    assert_eq!(outcome.summary.functions_annotated, 1);
    assert_eq!(outcome.summary.items_scanned, 2);
    assert_eq!(outcome.summary.data_annotated, 1);
    assert_eq!(
        db.comment(KERNEL_TEXT, CommentSlot::Function).expect("get").as_deref(),
        Some("2")
    );
    assert_eq!(db.comment(0x1000, CommentSlot::Repeatable).expect("get").as_deref(), Some("2"));
}

#[test]
fn version_two_addresses_are_rekeyed() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("host.db");
    {
        let db = SqliteDatabase::open(&path).expect("open");
        let high = KERNEL_TEXT as i64;
        db.connection()
            .execute_batch(&format!(
                r#"
                INSERT INTO segments (name, start, end, kind) VALUES ('.data', 4096, 4352, 'data');
                INSERT INTO functions (address, name) VALUES ({high}, 'startup');
                INSERT INTO items (address, size, kind) VALUES (4096, 4, 'data');
                INSERT INTO items (address, size, kind) VALUES ({high}, 256, 'code');
                INSERT INTO xrefs (from_addr, to_addr, kind, code_flow)
                    VALUES ({high} + 16, 4096, 'read', 0);
                INSERT INTO comments (address, slot, text) VALUES ({high}, 'function', 'entry');
                PRAGMA user_version = 2;
                "#
            ))
            .expect("write version two rows");
    }

    let db = SqliteDatabase::open(&path).expect("reopen");
    assert_eq!(db.stats().expect("stats").schema_version, CURRENT_SCHEMA_VERSION);
    let exported = db.export_snapshot().expect("export");
    assert_eq!(exported.segments[0].start, 0x1000);
    assert_eq!(exported.segments[0].end, 0x1100);
    assert_eq!(exported.functions[0].start, KERNEL_TEXT);
    let items: Vec<u64> = exported.items.iter().map(|i| i.address).collect();
    assert_eq!(items, vec![0x1000, KERNEL_TEXT]);
    assert_eq!(exported.xrefs[0].from, KERNEL_TEXT + 0x10);
    assert_eq!(exported.xrefs[0].to, 0x1000);
    assert_eq!(exported.comments[0].address, KERNEL_TEXT);
    assert!(!db.is_code(0x1000).expect("is_code"));
}
