//! Attendance state machine: timestamp in, status and new score out.
//!
//! Pure decision logic. The transactional write (log entry + score
//! update as one commit) lives at the storage layer.

use crate::types::AttendanceStatus;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::Deserialize;

pub const DEFAULT_WORK_START: &str = "09:00:00";
pub const DEFAULT_ALLOWED_DELAY_MINUTES: i64 = 15;
pub const DEFAULT_LATE_PENALTY: f64 = 5.0;

/// Lateness policy for a site.
#[derive(Debug, Clone, Deserialize)]
pub struct ScorePolicy {
    /// Official start of the working day.
    pub work_start: NaiveTime,
    /// Grace period after `work_start` before a recognition counts as late.
    pub allowed_delay_minutes: i64,
    /// Score deduction per late recognition.
    pub late_penalty: f64,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            work_start: NaiveTime::from_hms_opt(9, 0, 0).expect("valid default work start"),
            allowed_delay_minutes: DEFAULT_ALLOWED_DELAY_MINUTES,
            late_penalty: DEFAULT_LATE_PENALTY,
        }
    }
}

/// Decide the attendance status for a recognition at `now` and compute
/// the subject's new score.
///
/// The late boundary is `now.date() + work_start + allowed_delay`,
/// compared by time-of-day. Arriving exactly on the boundary is on
/// time. A late arrival deducts `late_penalty`, floored at 0; the score
/// never increases here — only an administrative reset does that.
pub fn evaluate(
    policy: &ScorePolicy,
    now: NaiveDateTime,
    current_score: f64,
) -> (AttendanceStatus, f64) {
    let late_boundary =
        now.date().and_time(policy.work_start) + Duration::minutes(policy.allowed_delay_minutes);

    if now.time() <= late_boundary.time() {
        (AttendanceStatus::OnTime, current_score)
    } else {
        (
            AttendanceStatus::Late,
            (current_score - policy.late_penalty).max(0.0),
        )
    }
}
