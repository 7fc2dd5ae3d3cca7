use crate::config::Config;
use crate::engine::{EngineError, EngineHandle};
use chrono::Local;
use rollcall_core::find_match;
use rollcall_store::{self as store, StoreError};
use std::time::Duration;
use tokio::time::timeout;
use zbus::interface;

/// D-Bus service for the attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
///
/// Methods return JSON payloads. Expected outcomes (no face, no match,
/// nothing cleared the enrollment threshold) are `status` values in the
/// payload; only infrastructure failures become D-Bus errors.
pub struct AttendanceService {
    engine: EngineHandle,
    db: tokio_rusqlite::Connection,
    config: Config,
}

impl AttendanceService {
    pub fn new(engine: EngineHandle, db: tokio_rusqlite::Connection, config: Config) -> Self {
        Self { engine, db, config }
    }

    fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.config.engine_timeout_secs)
    }
}

fn json_error(msg: &str) -> String {
    serde_json::json!({ "status": "error", "msg": msg }).to_string()
}

fn internal(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Enroll a new subject from a burst of captures.
    async fn register(
        &self,
        name: &str,
        department: &str,
        images: Vec<Vec<u8>>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(name, department, captures = images.len(), "register requested");
        if images.is_empty() {
            return Ok(json_error("no images supplied"));
        }
        if images.len() != self.config.images_per_enroll {
            tracing::warn!(
                got = images.len(),
                expected = self.config.images_per_enroll,
                "enrollment burst size differs from policy"
            );
        }

        let best = match timeout(self.engine_timeout(), self.engine.enroll(images)).await {
            Err(_) => return Ok(json_error("encoder timed out")),
            Ok(Err(EngineError::NoTemplate)) => {
                return Ok(json_error("no clear face found in any capture"))
            }
            Ok(Err(e)) => return Err(internal(e)),
            Ok(Ok(best)) => best,
        };

        let (owned_name, owned_department) = (name.to_string(), department.to_string());
        let template = best.template.clone();
        let now = Local::now().naive_local();
        let inserted: Result<i64, StoreError> = self
            .db
            .call(move |conn| {
                Ok(store::insert_subject(
                    conn,
                    &owned_name,
                    &owned_department,
                    &template,
                    now,
                ))
            })
            .await
            .map_err(internal)?;
        let subject_id = inserted.map_err(internal)?;

        Ok(serde_json::json!({
            "status": "ok",
            "subject_id": subject_id,
            "image_index": best.image_index,
            "confidence": best.confidence,
        })
        .to_string())
    }

    /// Re-enrollment: replace an existing subject's template.
    async fn reenroll(&self, subject_id: i64, images: Vec<Vec<u8>>) -> zbus::fdo::Result<String> {
        tracing::info!(subject_id, captures = images.len(), "reenroll requested");
        if images.is_empty() {
            return Ok(json_error("no images supplied"));
        }

        let best = match timeout(self.engine_timeout(), self.engine.enroll(images)).await {
            Err(_) => return Ok(json_error("encoder timed out")),
            Ok(Err(EngineError::NoTemplate)) => {
                return Ok(json_error("no clear face found in any capture"))
            }
            Ok(Err(e)) => return Err(internal(e)),
            Ok(Ok(best)) => best,
        };

        let template = best.template.clone();
        let updated: Result<(), StoreError> = self
            .db
            .call(move |conn| Ok(store::update_template(conn, subject_id, &template)))
            .await
            .map_err(internal)?;
        match updated {
            Ok(()) => Ok(serde_json::json!({
                "status": "ok",
                "subject_id": subject_id,
                "image_index": best.image_index,
                "confidence": best.confidence,
            })
            .to_string()),
            Err(StoreError::SubjectNotFound(_)) => Ok(json_error("subject not found")),
            Err(e) => Err(internal(e)),
        }
    }

    /// Recognize a live capture and mark attendance for the match.
    async fn recognize(&self, image: Vec<u8>) -> zbus::fdo::Result<String> {
        tracing::info!(bytes = image.len(), "recognize requested");

        let template = match timeout(self.engine_timeout(), self.engine.encode(image)).await {
            Err(_) => return Ok(json_error("encoder timed out")),
            Ok(Err(EngineError::NoFaceDetected)) => {
                return Ok(serde_json::json!({ "status": "no_face" }).to_string())
            }
            Ok(Err(e)) => return Err(internal(e)),
            Ok(Ok(t)) => t,
        };

        // Snapshot the gallery; enrollments racing this call may not be
        // visible, which is fine.
        let gallery: Result<_, StoreError> = self
            .db
            .call(|conn| Ok(store::load_gallery(conn)))
            .await
            .map_err(internal)?;
        let gallery = gallery.map_err(internal)?;

        let Some(matched) = find_match(&template, &gallery, self.config.match_tolerance) else {
            return Ok(serde_json::json!({ "status": "no_match" }).to_string());
        };

        let now = Local::now().naive_local();
        let policy = self.config.score_policy();
        let subject_id = matched.subject_id;
        let marked: Result<_, StoreError> = self
            .db
            .call(move |conn| {
                let result = store::mark_attendance(conn, subject_id, now, &policy).and_then(
                    |record| store::load_subject(conn, subject_id).map(|s| (record, s)),
                );
                Ok(result)
            })
            .await
            .map_err(internal)?;
        let (record, subject) = marked.map_err(internal)?;

        Ok(serde_json::json!({
            "status": "ok",
            "subject_id": subject.id,
            "name": subject.name,
            "department": subject.department,
            "distance": matched.distance,
            "attendance_status": record.status,
            "attendance_score": record.attendance_score,
        })
        .to_string())
    }

    /// List enrolled subjects.
    async fn list_subjects(&self) -> zbus::fdo::Result<String> {
        let subjects: Result<_, StoreError> = self
            .db
            .call(|conn| Ok(store::list_subjects(conn)))
            .await
            .map_err(internal)?;
        serde_json::to_string(&subjects.map_err(internal)?).map_err(internal)
    }

    /// Attendance history for a subject, most recent first.
    async fn history(&self, subject_id: i64) -> zbus::fdo::Result<String> {
        let entries: Result<_, StoreError> = self
            .db
            .call(move |conn| {
                let result = store::load_subject(conn, subject_id)
                    .and_then(|_| store::attendance_history(conn, subject_id));
                Ok(result)
            })
            .await
            .map_err(internal)?;
        match entries {
            Ok(entries) => serde_json::to_string(&entries).map_err(internal),
            Err(StoreError::SubjectNotFound(_)) => Ok(json_error("subject not found")),
            Err(e) => Err(internal(e)),
        }
    }

    /// Administrative score reset.
    async fn reset_score(&self, subject_id: i64) -> zbus::fdo::Result<String> {
        tracing::info!(subject_id, "reset_score requested");
        let reset: Result<(), StoreError> = self
            .db
            .call(move |conn| Ok(store::reset_score(conn, subject_id, store::INITIAL_SCORE)))
            .await
            .map_err(internal)?;
        match reset {
            Ok(()) => Ok(serde_json::json!({
                "status": "ok",
                "subject_id": subject_id,
                "attendance_score": store::INITIAL_SCORE,
            })
            .to_string()),
            Err(StoreError::SubjectNotFound(_)) => Ok(json_error("subject not found")),
            Err(e) => Err(internal(e)),
        }
    }

    /// Remove a subject and their history. Returns false when unknown.
    async fn remove_subject(&self, subject_id: i64) -> zbus::fdo::Result<bool> {
        tracing::info!(subject_id, "remove_subject requested");
        let removed: Result<(), StoreError> = self
            .db
            .call(move |conn| Ok(store::remove_subject(conn, subject_id)))
            .await
            .map_err(internal)?;
        match removed {
            Ok(()) => Ok(true),
            Err(StoreError::SubjectNotFound(_)) => Ok(false),
            Err(e) => Err(internal(e)),
        }
    }

    /// Daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let count: Result<_, StoreError> = self
            .db
            .call(|conn| Ok(store::list_subjects(conn).map(|s| s.len())))
            .await
            .map_err(internal)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "db_path": self.config.db_path,
            "subjects": count.map_err(internal)?,
            "confidence_threshold": self.config.confidence_threshold,
            "match_tolerance": self.config.match_tolerance,
        })
        .to_string())
    }
}
