//! The attendance log and the transactional mark operation.

use crate::{AttendanceLogEntry, StoreError};
use chrono::NaiveDateTime;
use rollcall_core::{scorer, AttendanceStatus, ScorePolicy};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

/// Outcome of one mark-attendance operation.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub status: AttendanceStatus,
    /// Subject's score after the (possible) deduction.
    pub attendance_score: f64,
}

/// Record a recognition event: append a log entry and apply the late
/// penalty, as one commit.
///
/// The IMMEDIATE transaction takes the write lock before reading the
/// score, so concurrent recognitions of the same subject serialize and
/// no penalty decrement is lost. Either both writes land or neither
/// does. Marking is deliberately not idempotent: a second recognition
/// the same day appends a second entry and can deduct again.
pub fn mark_attendance(
    conn: &mut Connection,
    subject_id: i64,
    now: NaiveDateTime,
    policy: &ScorePolicy,
) -> Result<AttendanceRecord, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current: f64 = tx
        .query_row(
            "SELECT attendance_score FROM subjects WHERE id = ?1",
            params![subject_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(StoreError::SubjectNotFound(subject_id))?;

    let (status, new_score) = scorer::evaluate(policy, now, current);

    tx.execute(
        "UPDATE subjects SET attendance_score = ?1 WHERE id = ?2",
        params![new_score, subject_id],
    )?;
    tx.execute(
        "INSERT INTO attendance_log (subject_id, timestamp, status) VALUES (?1, ?2, ?3)",
        params![subject_id, now, status.as_str()],
    )?;
    tx.commit()?;

    tracing::info!(
        subject_id,
        %status,
        score = new_score,
        "attendance marked"
    );

    Ok(AttendanceRecord {
        status,
        attendance_score: new_score,
    })
}

/// Attendance history for one subject, most recent first.
pub fn attendance_history(
    conn: &Connection,
    subject_id: i64,
) -> Result<Vec<AttendanceLogEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, subject_id, timestamp, status FROM attendance_log
         WHERE subject_id = ?1 ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![subject_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, NaiveDateTime>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, subject_id, timestamp, status) = row?;
        let status = status
            .parse::<AttendanceStatus>()
            .map_err(StoreError::CorruptRow)?;
        entries.push(AttendanceLogEntry {
            id,
            subject_id,
            timestamp,
            status,
        });
    }
    Ok(entries)
}

/// Administrative reset — the only sanctioned way a score goes up.
pub fn reset_score(conn: &Connection, subject_id: i64, score: f64) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE subjects SET attendance_score = ?1 WHERE id = ?2",
        params![score, subject_id],
    )?;
    if changed == 0 {
        return Err(StoreError::SubjectNotFound(subject_id));
    }
    tracing::info!(subject_id, score, "attendance score reset");
    Ok(())
}
