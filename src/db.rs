use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::fetch::Scenario;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scenarios (
            id         INTEGER PRIMARY KEY,
            params     TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS reports (
            id          INTEGER PRIMARY KEY,
            scenario_id INTEGER NOT NULL REFERENCES scenarios(id),
            url         TEXT NOT NULL,
            html        TEXT,
            status      INTEGER,
            error       TEXT,
            latency_ms  INTEGER,
            fetched_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_reports_scenario ON reports(scenario_id);

        CREATE TABLE IF NOT EXISTS records (
            id           INTEGER PRIMARY KEY,
            report_id    INTEGER UNIQUE NOT NULL REFERENCES reports(id),
            flat         TEXT NOT NULL,
            error        TEXT,
            processed_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Scenarios ──

/// Insert the scenario if it is new; returns its id either way.
pub fn upsert_scenario(conn: &Connection, scenario: &Scenario) -> Result<i64> {
    let params = serde_json::to_string(scenario)?;
    conn.execute(
        "INSERT OR IGNORE INTO scenarios (params) VALUES (?1)",
        rusqlite::params![params],
    )?;
    let id = conn.query_row(
        "SELECT id FROM scenarios WHERE params = ?1",
        rusqlite::params![params],
        |row| row.get(0),
    )?;
    Ok(id)
}

// ── Fetching ──

pub struct ReportRow {
    pub scenario_id: i64,
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

pub fn insert_report(conn: &Connection, row: &ReportRow) -> Result<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO reports (scenario_id, url, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    stmt.execute(rusqlite::params![
        row.scenario_id, row.url, row.html, row.status, row.error, row.latency_ms,
    ])?;
    Ok(conn.last_insert_rowid())
}

// ── Processing ──

pub struct StoredReport {
    pub report_id: i64,
    pub scenario_id: i64,
    pub url: String,
    pub html: String,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<StoredReport>> {
    let sql = format!(
        "SELECT r.id, r.scenario_id, r.url, r.html
         FROM reports r
         LEFT JOIN records rec ON rec.report_id = r.id
         WHERE r.html IS NOT NULL AND rec.id IS NULL
         ORDER BY r.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredReport {
                report_id: row.get(0)?,
                scenario_id: row.get(1)?,
                url: row.get(2)?,
                html: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Outcome of processing one report. A report that failed to parse is still
/// written, with an empty record and its error, so it leaves the queue.
pub struct RecordRow {
    pub report_id: i64,
    /// JSON-serialized flat record.
    pub flat: String,
    pub error: Option<String>,
}

impl RecordRow {
    pub fn failed(report_id: i64, error: String) -> Self {
        Self {
            report_id,
            flat: "{}".into(),
            error: Some(error),
        }
    }
}

pub fn save_records(conn: &Connection, rows: &[RecordRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt =
            tx.prepare("INSERT OR REPLACE INTO records (report_id, flat, error) VALUES (?1, ?2, ?3)")?;
        for r in rows {
            stmt.execute(rusqlite::params![r.report_id, r.flat, r.error])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Reporting ──

pub struct Stats {
    pub scenarios: i64,
    pub reports: i64,
    pub errors: i64,
    pub records: i64,
    pub parse_failures: i64,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };
    Ok(Stats {
        scenarios: count("SELECT COUNT(*) FROM scenarios")?,
        reports: count("SELECT COUNT(*) FROM reports")?,
        errors: count("SELECT COUNT(*) FROM reports WHERE error IS NOT NULL")?,
        records: count("SELECT COUNT(*) FROM records WHERE error IS NULL")?,
        parse_failures: count("SELECT COUNT(*) FROM records WHERE error IS NOT NULL")?,
    })
}

pub struct RecordOverview {
    pub report_id: i64,
    pub params: String,
    pub flat: String,
    pub fetched_at: String,
}

pub fn fetch_records(conn: &Connection, limit: usize) -> Result<Vec<RecordOverview>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, s.params, rec.flat, r.fetched_at
         FROM records rec
         JOIN reports r ON r.id = rec.report_id
         JOIN scenarios s ON s.id = r.scenario_id
         WHERE rec.error IS NULL
         ORDER BY r.id DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![limit as i64], |row| {
            Ok(RecordOverview {
                report_id: row.get(0)?,
                params: row.get(1)?,
                flat: row.get(2)?,
                fetched_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Tests ──
