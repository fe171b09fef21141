//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Pipeline stages work on in-memory tables; the store loads the
//! source snapshot and persists run artefacts.

use crate::{error::PipelineResult, report::StageReportEntry};
use rusqlite::{params, Connection};

mod artifacts;
mod source;

pub use source::{LineSet, REQUIRED_COLUMNS};

pub struct ReorderStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl ReorderStore {
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_source.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_run_artifacts.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, seed as i64, version, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ── Stage reports ──────────────────────────────────────────

    pub fn append_stage_report(&self, entry: &StageReportEntry) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO stage_report (run_id, seq, stage, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.run_id, entry.seq as i64, entry.stage, entry.payload],
        )?;
        Ok(())
    }

    pub fn stage_reports(&self, run_id: &str) -> PipelineResult<Vec<StageReportEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, seq, stage, payload
             FROM stage_report WHERE run_id = ?1
             ORDER BY seq ASC, id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(StageReportEntry {
                    run_id: row.get(0)?,
                    seq: row.get::<_, i64>(1)? as u32,
                    stage: row.get(2)?,
                    payload: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
