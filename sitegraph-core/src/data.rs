use crate::error::Result;
use crate::result::AnalysisResult;
use chrono::SecondsFormat;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub struct Database {
    conn: Connection,
}

/// One row of the run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub version: u64,
    pub generated_at: String,
    pub page_count: usize,
    pub keyword_groups: usize,
    pub flags: Vec<String>,
}

impl Database {
    pub fn remove(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;  -- 16MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- One row per published analysis result
            CREATE TABLE IF NOT EXISTS analysis_runs (
    id TEXT PRIMARY KEY,
    version INTEGER NOT NULL,
    generated_at TEXT NOT NULL,   -- RFC 3339, UTC
    page_count INTEGER NOT NULL,
    keyword_groups INTEGER NOT NULL,
    flags TEXT NOT NULL,          -- JSON array
    result TEXT NOT NULL          -- full AnalysisResult as JSON
);

CREATE INDEX IF NOT EXISTS idx_runs_generated ON analysis_runs(generated_at);

-- Per-run redirect rule hit deltas
CREATE TABLE IF NOT EXISTS rule_hits (
    run_id TEXT NOT NULL,
    rule_id TEXT NOT NULL,
    hits INTEGER NOT NULL,

    FOREIGN KEY(run_id) REFERENCES analysis_runs(id) ON DELETE CASCADE,
    UNIQUE(run_id, rule_id)
);

CREATE INDEX IF NOT EXISTS idx_rule_hits_rule ON rule_hits(rule_id);
            ",
        )?;
        Ok(())
    }

    pub fn insert_run(&mut self, result: &AnalysisResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        let flags: Vec<&str> = result.flags.iter().map(|f| f.as_str()).collect();
        let flags = serde_json::to_string(&flags)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO analysis_runs (id, version, generated_at, page_count, keyword_groups, flags, result)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &result.run_id,
                result.version as i64,
                result
                    .generated_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
                result.pages.len() as i64,
                result.keywords.len() as i64,
                flags,
                json,
            ],
        )?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO rule_hits (run_id, rule_id, hits) VALUES (?1, ?2, ?3)")?;
            for (rule_id, hits) in &result.rule_hits {
                stmt.execute(params![&result.run_id, rule_id, *hits as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<AnalysisResult>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT result FROM analysis_runs WHERE id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn latest_run(&self) -> Result<Option<AnalysisResult>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT result FROM analysis_runs ORDER BY generated_at DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Newest first.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, version, generated_at, page_count, keyword_groups, flags
             FROM analysis_runs
             ORDER BY generated_at DESC, rowid DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, version, generated_at, pages, groups, flags)| -> Result<RunSummary> {
                Ok(RunSummary {
                    id,
                    version: version as u64,
                    generated_at,
                    page_count: pages as usize,
                    keyword_groups: groups as usize,
                    flags: serde_json::from_str(&flags)?,
                })
            })
            .collect()
    }

    /// Hits per rule id summed over every stored run.
    pub fn rule_hit_totals(&self) -> Result<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT rule_id, SUM(hits) FROM rule_hits GROUP BY rule_id")?;

        let totals = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        Ok(totals)
    }

    pub fn delete_run(&self, run_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM analysis_runs WHERE id = ?1", params![run_id])?;
        Ok(deleted > 0)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}
