//! SQLite-backed history of scored ticks, for the dashboard's recent-risk
//! chart and offline inspection. Plain storage; scores carry no at-rest
//! secrecy requirement.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub ts: i64,
    pub mode: String,
    pub score: Option<f32>,
    pub blackout_prob: f32,
    pub is_anomaly: bool,
    pub payload: String,
}

pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open or create DB at path.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ticks (
                ts INTEGER NOT NULL,
                mode TEXT NOT NULL,
                score REAL,
                blackout_prob REAL NOT NULL,
                is_anomaly INTEGER NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ticks_ts ON ticks(ts);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert_tick(&self, row: &HistoryRow) -> Result<(), rusqlite::Error> {
        self.conn.lock().unwrap().execute(
            "INSERT INTO ticks (ts, mode, score, blackout_prob, is_anomaly, payload) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.ts,
                row.mode,
                row.score,
                row.blackout_prob,
                row.is_anomaly as i64,
                row.payload
            ],
        )?;
        Ok(())
    }

    /// Most recent `n` ticks, newest first.
    pub fn recent(&self, n: usize) -> Result<Vec<HistoryRow>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT ts, mode, score, blackout_prob, is_anomaly, payload FROM ticks ORDER BY ts DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![n as i64], |row| {
            Ok(HistoryRow {
                ts: row.get(0)?,
                mode: row.get(1)?,
                score: row.get(2)?,
                blackout_prob: row.get(3)?,
                is_anomaly: row.get::<_, i64>(4)? != 0,
                payload: row.get(5)?,
            })
        })?;
        rows.collect()
    }

    /// Retention: delete ticks older than given timestamp
    pub fn prune_before(&self, ts: i64) -> Result<u64, rusqlite::Error> {
        let n = self
            .conn
            .lock()
            .unwrap()
            .execute("DELETE FROM ticks WHERE ts < ?1", params![ts])?;
        Ok(n as u64)
    }
}
