pub mod query;
pub mod upsert;

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA foreign_keys=ON;
CREATE TABLE IF NOT EXISTS talk (
    id                     INTEGER PRIMARY KEY,
    slug                   TEXT NOT NULL,
    title                  TEXT NOT NULL,
    description            TEXT NOT NULL,
    image_url              TEXT NOT NULL,
    is_canceled            INTEGER NOT NULL,
    is_delisted            INTEGER NOT NULL,
    is_featured            INTEGER NOT NULL,
    start_timestamp        INTEGER NOT NULL,
    end_timestamp          INTEGER NOT NULL,
    duration_min           INTEGER NOT NULL,
    timezone               TEXT,
    has_internal_recording INTEGER NOT NULL,
    is_recording_public    INTEGER NOT NULL,
    num_signups            INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS instructor (
    id        TEXT PRIMARY KEY,
    name      TEXT NOT NULL,
    image_url TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tag (
    id   INTEGER PRIMARY KEY,
    slug TEXT NOT NULL,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS talk_instructor (
    talk_id       INTEGER NOT NULL REFERENCES talk(id),
    instructor_id TEXT NOT NULL REFERENCES instructor(id),
    PRIMARY KEY (talk_id, instructor_id)
);
CREATE TABLE IF NOT EXISTS talk_tag (
    talk_id INTEGER NOT NULL REFERENCES talk(id),
    tag_id  INTEGER NOT NULL REFERENCES tag(id),
    PRIMARY KEY (talk_id, tag_id)
);
CREATE INDEX IF NOT EXISTS idx_talk_start ON talk(start_timestamp);
"#;

/// Shared handle over the SQLite store. Writers (the ingest pipeline)
/// and readers (the query engine) both borrow this; the connection is
/// injected rather than held as process-global state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Row counts across all five relations.
    pub fn row_counts(&self) -> Result<RowCounts> {
        let conn = self.lock();
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
        Ok(RowCounts {
            talks: count("SELECT COUNT(*) FROM talk")?,
            instructors: count("SELECT COUNT(*) FROM instructor")?,
            tags: count("SELECT COUNT(*) FROM tag")?,
            talk_instructors: count("SELECT COUNT(*) FROM talk_instructor")?,
            talk_tags: count("SELECT COUNT(*) FROM talk_tag")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCounts {
    pub talks: i64,
    pub instructors: i64,
    pub tags: i64,
    pub talk_instructors: i64,
    pub talk_tags: i64,
}
