use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{
    addr_key, apply_migrations, current_schema_version, key_addr, DbError, DbResult, DbStats,
    MarkRunRecord, MarkRunStatus,
};
use crate::host::snapshot::{CommentEntry, ItemEntry, ItemKind, Snapshot, StringEntry};
use crate::host::{strings, HostDatabase, HostError, HostResult};
use crate::model::{
    Address, CommentSlot, Function, Segment, SegmentKind, StringType, Xref, XrefKind,
};

const META_ANALYSIS_COMPLETE: &str = "analysis_complete";
const META_SOURCE_HASH: &str = "source_hash";

/// SQLite-backed host database.
///
/// This is a thin wrapper around `rusqlite::Connection` that is responsible for:
/// - Opening/creating the DB file.
/// - Applying schema migrations.
/// - Answering the [`HostDatabase`] queries the annotation pass issues.
#[derive(Debug)]
pub struct SqliteDatabase {
    conn: Connection,
}

fn corrupt(column: &'static str, value: &str) -> DbError {
    DbError::Corrupt { column, value: value.to_string() }
}

impl SqliteDatabase {
    /// Open (or create) a database at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Expose a reference to the underlying connection for advanced callers.
    /// For most code, prefer higher-level helpers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn meta(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?)
    }

    /// Replace the database contents with `snapshot`. Run history is kept.
    pub fn import_snapshot(&self, snapshot: &Snapshot, source_hash: Option<&str>) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            r#"
            DELETE FROM segments;
            DELETE FROM functions;
            DELETE FROM items;
            DELETE FROM xrefs;
            DELETE FROM comments;
            DELETE FROM meta;
            "#,
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO segments (name, start, end, kind) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for seg in &snapshot.segments {
                stmt.execute(params![
                    seg.name,
                    addr_key(seg.start),
                    addr_key(seg.end),
                    seg.kind.as_str()
                ])?;
            }
        }

        {
            let mut stmt =
                tx.prepare("INSERT OR REPLACE INTO functions (address, name) VALUES (?1, ?2)")?;
            for f in &snapshot.functions {
                stmt.execute(params![addr_key(f.start), f.name])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO items (address, size, kind, string_type, bytes)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for item in &snapshot.items {
                let (string_type, bytes, size) = match (&item.kind, &item.string) {
                    (ItemKind::String, Some(entry)) => {
                        let bytes = strings::encode(entry.string_type, &entry.text);
                        let size = bytes.len() as i64;
                        (Some(entry.string_type.as_str()), Some(bytes), size)
                    }
                    _ => (None, None, item.size as i64),
                };
                stmt.execute(params![
                    addr_key(item.address),
                    size,
                    item.kind.as_str(),
                    string_type,
                    bytes
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO xrefs (from_addr, to_addr, kind, code_flow) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for x in &snapshot.xrefs {
                stmt.execute(params![
                    addr_key(x.from),
                    addr_key(x.to),
                    x.kind.as_str(),
                    if x.kind.is_code_flow() { 1 } else { 0 }
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO comments (address, slot, text) VALUES (?1, ?2, ?3)",
            )?;
            for c in &snapshot.comments {
                stmt.execute(params![addr_key(c.address), c.slot.as_str(), c.text])?;
            }
        }

        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)",
            params![META_ANALYSIS_COMPLETE, if snapshot.analysis_complete { "1" } else { "0" }],
        )?;
        if let Some(hash) = source_hash {
            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                params![META_SOURCE_HASH, hash],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Dump the database contents back into a snapshot.
    pub fn export_snapshot(&self) -> DbResult<Snapshot> {
        let analysis_complete = self.meta(META_ANALYSIS_COMPLETE)?.as_deref() == Some("1");
        let segments = self.segments()?;
        let functions = self.functions()?;

        let items = {
            let mut stmt = self.conn.prepare(
                "SELECT address, size, kind, string_type, bytes FROM items ORDER BY address",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<Vec<u8>>>(4)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (address, size, kind, string_type, bytes) = row?;
                let kind = ItemKind::parse(&kind).ok_or_else(|| corrupt("items.kind", &kind))?;
                let string = match (string_type, bytes) {
                    (Some(tag), Some(bytes)) => {
                        let string_type = StringType::parse(&tag)
                            .ok_or_else(|| corrupt("items.string_type", &tag))?;
                        Some(StringEntry {
                            string_type,
                            text: strings::decode_raw(string_type, &bytes, usize::MAX),
                        })
                    }
                    _ => None,
                };
                out.push(ItemEntry {
                    address: key_addr(address),
                    size: size as u64,
                    kind,
                    string,
                });
            }
            out
        };

        let xrefs = {
            let mut stmt =
                self.conn.prepare("SELECT from_addr, to_addr, kind FROM xrefs ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (from, to, kind) = row?;
                let kind = XrefKind::parse(&kind).ok_or_else(|| corrupt("xrefs.kind", &kind))?;
                out.push(Xref::new(key_addr(from), key_addr(to), kind));
            }
            out
        };

        let comments = self.list_comments()?;

        Ok(Snapshot { analysis_complete, segments, functions, items, xrefs, comments })
    }

    fn segments(&self) -> DbResult<Vec<Segment>> {
        let mut stmt = self.conn.prepare("SELECT name, start, end, kind FROM segments ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (name, start, end, kind) = row?;
            let kind = SegmentKind::parse(&kind).ok_or_else(|| corrupt("segments.kind", &kind))?;
            out.push(Segment::new(name, key_addr(start), key_addr(end), kind));
        }
        Ok(out)
    }

    fn functions(&self) -> DbResult<Vec<Function>> {
        let mut stmt = self.conn.prepare("SELECT address, name FROM functions ORDER BY address")?;
        let rows = stmt.query_map([], |row| {
            Ok(Function { start: key_addr(row.get(0)?), name: row.get(1)? })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All stored comments, ordered by address then slot.
    pub fn list_comments(&self) -> DbResult<Vec<CommentEntry>> {
        let mut stmt =
            self.conn.prepare("SELECT address, slot, text FROM comments ORDER BY address, slot")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (address, slot, text) = row?;
            let slot = CommentSlot::parse(&slot).ok_or_else(|| corrupt("comments.slot", &slot))?;
            out.push(CommentEntry { address: key_addr(address), slot, text });
        }
        Ok(out)
    }

    /// Insert a run record and return its row id.
    pub fn insert_run(&self, record: &MarkRunRecord) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO mark_runs (status, started_at, finished_at, functions_annotated, data_annotated, write_failures)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.status.as_str(),
                record.started_at,
                record.finished_at,
                record.functions_annotated as i64,
                record.data_annotated as i64,
                record.write_failures as i64
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List run records (ordered by id).
    pub fn list_runs(&self) -> DbResult<Vec<MarkRunRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT status, started_at, finished_at, functions_annotated, data_annotated, write_failures
            FROM mark_runs
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (status, started_at, finished_at, functions, data, failures) = row?;
            let status =
                MarkRunStatus::parse(&status).ok_or_else(|| corrupt("mark_runs.status", &status))?;
            out.push(MarkRunRecord {
                status,
                started_at,
                finished_at,
                functions_annotated: functions as u64,
                data_annotated: data as u64,
                write_failures: failures as u64,
            });
        }
        Ok(out)
    }

    pub fn stats(&self) -> DbResult<DbStats> {
        let count = |table: &str| -> DbResult<u64> {
            let n: i64 =
                self.conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(DbStats {
            schema_version: current_schema_version(&self.conn)?,
            segments: count("segments")?,
            functions: count("functions")?,
            items: count("items")?,
            xrefs: count("xrefs")?,
            comments: count("comments")?,
            runs: count("mark_runs")?,
            analysis_complete: self.meta(META_ANALYSIS_COMPLETE)?.as_deref() == Some("1"),
            source_hash: self.meta(META_SOURCE_HASH)?,
        })
    }

    fn string_row(&self, address: Address) -> HostResult<(StringType, Vec<u8>)> {
        let row: Option<(String, Vec<u8>)> = self
            .conn
            .query_row(
                r#"
                SELECT string_type, bytes FROM items
                WHERE address = ?1 AND kind = 'string' AND string_type IS NOT NULL
                "#,
                params![addr_key(address)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(DbError::from)?;
        let (tag, bytes) = row.ok_or(HostError::NotAString(address))?;
        let string_type =
            StringType::parse(&tag).ok_or_else(|| corrupt("items.string_type", &tag))?;
        Ok((string_type, bytes))
    }
}

impl HostDatabase for SqliteDatabase {
    fn is_analysis_complete(&self) -> HostResult<bool> {
        Ok(self.meta(META_ANALYSIS_COMPLETE)?.as_deref() == Some("1"))
    }

    fn list_functions(&self) -> HostResult<Vec<Function>> {
        Ok(self.functions()?)
    }

    fn list_segments(&self) -> HostResult<Vec<Segment>> {
        Ok(self.segments()?)
    }

    fn incoming_references(&self, target: Address) -> HostResult<Vec<Xref>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                r#"
                SELECT from_addr, kind FROM xrefs
                WHERE to_addr = ?1
                ORDER BY code_flow DESC, id
                "#,
            )
            .map_err(DbError::from)?;
        let rows = stmt
            .query_map(params![addr_key(target)], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(DbError::from)?;
        let mut out = Vec::new();
        for row in rows {
            let (from, kind) = row.map_err(DbError::from)?;
            let kind = XrefKind::parse(&kind).ok_or_else(|| corrupt("xrefs.kind", &kind))?;
            out.push(Xref::new(key_addr(from), target, kind));
        }
        Ok(out)
    }

    fn is_code(&self, address: Address) -> HostResult<bool> {
        let is_function: bool = self
            .conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM functions WHERE address = ?1)",
                params![addr_key(address)],
                |row| row.get(0),
            )
            .map_err(DbError::from)?;
        if is_function {
            return Ok(true);
        }
        let covering: Option<(i64, i64, String)> = self
            .conn
            .query_row(
                r#"
                SELECT address, size, kind FROM items
                WHERE address <= ?1
                ORDER BY address DESC
                LIMIT 1
                "#,
                params![addr_key(address)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(DbError::from)?;
        Ok(match covering {
            Some((start, size, kind)) => {
                kind == ItemKind::Code.as_str()
                    && address
                        .checked_sub(key_addr(start))
                        .is_some_and(|offset| offset < size.max(1) as u64)
            }
            None => false,
        })
    }

    fn is_string_literal(&self, address: Address) -> HostResult<bool> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT kind FROM items WHERE address = ?1",
                params![addr_key(address)],
                |row| row.get(0),
            )
            .optional()
            .map_err(DbError::from)?;
        Ok(kind.as_deref() == Some(ItemKind::String.as_str()))
    }

    fn string_type(&self, address: Address) -> HostResult<StringType> {
        Ok(self.string_row(address)?.0)
    }

    fn max_decodable_length(
        &self,
        address: Address,
        string_type: StringType,
    ) -> HostResult<usize> {
        let (_, bytes) = self.string_row(address)?;
        Ok(strings::max_length(string_type, &bytes))
    }

    fn decode_string(
        &self,
        address: Address,
        len: usize,
        string_type: StringType,
    ) -> HostResult<String> {
        let (_, bytes) = self.string_row(address)?;
        Ok(strings::decode(string_type, &bytes, len))
    }

    fn comment(&self, address: Address, slot: CommentSlot) -> HostResult<Option<String>> {
        let text = self
            .conn
            .query_row(
                "SELECT text FROM comments WHERE address = ?1 AND slot = ?2",
                params![addr_key(address), slot.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(DbError::from)?;
        Ok(text)
    }

    fn set_comment(&mut self, address: Address, slot: CommentSlot, text: &str) -> HostResult<()> {
        // Function comments need a function; the other slots need an item head
        // or a function start.
        let (sql, missing) = match slot {
            CommentSlot::Function => (
                "SELECT EXISTS (SELECT 1 FROM functions WHERE address = ?1)",
                HostError::NoSuchFunction(address),
            ),
            CommentSlot::Regular | CommentSlot::Repeatable => (
                r#"
                SELECT EXISTS (SELECT 1 FROM items WHERE address = ?1)
                    OR EXISTS (SELECT 1 FROM functions WHERE address = ?1)
                "#,
                HostError::WriteRejected(address),
            ),
        };
        let exists: bool = self
            .conn
            .query_row(sql, params![addr_key(address)], |row| row.get(0))
            .map_err(DbError::from)?;
        if !exists {
            return Err(missing);
        }
        self.conn
            .execute(
                "INSERT OR REPLACE INTO comments (address, slot, text) VALUES (?1, ?2, ?3)",
                params![addr_key(address), slot.as_str(), text],
            )
            .map_err(DbError::from)?;
        Ok(())
    }

    fn next_address(&self, address: Address) -> HostResult<Option<Address>> {
        let next: Option<i64> = self
            .conn
            .query_row(
                "SELECT address FROM items WHERE address > ?1 ORDER BY address LIMIT 1",
                params![addr_key(address)],
                |row| row.get(0),
            )
            .optional()
            .map_err(DbError::from)?;
        Ok(next.map(key_addr))
    }
}
