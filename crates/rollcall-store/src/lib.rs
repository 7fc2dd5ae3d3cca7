//! rollcall-store — SQLite persistence for subjects and attendance.
//!
//! Everything is a free function over `&mut rusqlite::Connection`, so
//! the same code runs synchronously in tests and inside
//! `tokio_rusqlite::Connection::call` in the daemon. Template blobs are
//! encoded/decoded here, at the persistence edge; business logic only
//! ever sees typed vectors.

mod attendance;
mod subjects;

pub use attendance::{attendance_history, mark_attendance, reset_score, AttendanceRecord};
pub use subjects::{
    insert_subject, list_subjects, load_gallery, load_subject, remove_subject, update_template,
};

use chrono::NaiveDateTime;
use rollcall_core::AttendanceStatus;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("subject {0} not found")]
    SubjectNotFound(i64),
    #[error("gallery has {0} entries but none could be decoded")]
    GalleryUnreadable(usize),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Identity record for an enrolled subject. The template itself stays
/// in the gallery path; listings and lookups carry only metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub department: String,
    pub attendance_score: f64,
    pub created_at: NaiveDateTime,
}

/// Immutable attendance fact, one per recognition event.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceLogEntry {
    pub id: i64,
    pub subject_id: i64,
    pub timestamp: NaiveDateTime,
    pub status: AttendanceStatus,
}

/// Starting score for new subjects, and the administrative reset value.
pub const INITIAL_SCORE: f64 = 100.0;

/// Create tables and indexes if they do not exist yet.
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS subjects (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            template BLOB NOT NULL,
            attendance_score REAL NOT NULL DEFAULT 100.0,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS attendance_log (
            id INTEGER PRIMARY KEY,
            subject_id INTEGER NOT NULL REFERENCES subjects(id),
            timestamp TEXT NOT NULL,
            status TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attendance_subject
            ON attendance_log(subject_id, timestamp);",
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory db");
    init_schema(&conn).expect("schema");
    conn
}
