//! Subject records and the gallery snapshot.

use crate::{StoreError, Subject};
use chrono::NaiveDateTime;
use rollcall_core::{codec, GalleryEntry, Template};
use rusqlite::{params, Connection, OptionalExtension};

/// Enroll a subject with their winning template. Returns the new id.
pub fn insert_subject(
    conn: &Connection,
    name: &str,
    department: &str,
    template: &Template,
    created_at: NaiveDateTime,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO subjects (name, department, template, attendance_score, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            name,
            department,
            codec::encode(template),
            crate::INITIAL_SCORE,
            created_at
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(subject_id = id, name, department, "subject enrolled");
    Ok(id)
}

/// Re-enrollment: replace the subject's template. A subject owns at
/// most one current template; this never appends.
pub fn update_template(
    conn: &Connection,
    subject_id: i64,
    template: &Template,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE subjects SET template = ?1 WHERE id = ?2",
        params![codec::encode(template), subject_id],
    )?;
    if changed == 0 {
        return Err(StoreError::SubjectNotFound(subject_id));
    }
    tracing::info!(subject_id, "template replaced");
    Ok(())
}

pub fn load_subject(conn: &Connection, subject_id: i64) -> Result<Subject, StoreError> {
    conn.query_row(
        "SELECT id, name, department, attendance_score, created_at
         FROM subjects WHERE id = ?1",
        params![subject_id],
        subject_from_row,
    )
    .optional()?
    .ok_or(StoreError::SubjectNotFound(subject_id))
}

pub fn list_subjects(conn: &Connection) -> Result<Vec<Subject>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, department, attendance_score, created_at
         FROM subjects ORDER BY id",
    )?;
    let rows = stmt.query_map([], subject_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Delete a subject and their attendance history.
pub fn remove_subject(conn: &mut Connection, subject_id: i64) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM attendance_log WHERE subject_id = ?1",
        params![subject_id],
    )?;
    let changed = tx.execute("DELETE FROM subjects WHERE id = ?1", params![subject_id])?;
    if changed == 0 {
        return Err(StoreError::SubjectNotFound(subject_id));
    }
    tx.commit()?;
    tracing::info!(subject_id, "subject removed");
    Ok(())
}

/// Load the gallery snapshot the matcher scans.
///
/// Decoding is fail-soft per entry: a corrupt blob is logged and
/// excluded so one bad row cannot take recognition down. If the table
/// is non-empty but nothing decodes, that is a different animal —
/// fail loud.
pub fn load_gallery(conn: &Connection) -> Result<Vec<GalleryEntry>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, template FROM subjects ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;

    let mut total = 0usize;
    let mut gallery = Vec::new();
    for row in rows {
        let (subject_id, blob) = row?;
        total += 1;
        match codec::decode(&blob) {
            Ok(template) => gallery.push(GalleryEntry {
                subject_id,
                template,
            }),
            Err(e) => {
                tracing::warn!(subject_id, error = %e, "skipping undecodable gallery entry");
            }
        }
    }

    if total > 0 && gallery.is_empty() {
        return Err(StoreError::GalleryUnreadable(total));
    }
    Ok(gallery)
}

fn subject_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        attendance_score: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_conn;
    use chrono::NaiveDate;
    use rollcall_core::TEMPLATE_DIM;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 24)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn template(seed: f32) -> Template {
        Template::new((0..TEMPLATE_DIM).map(|i| seed + i as f32 * 0.01).collect())
    }

    #[test]
    fn test_insert_and_load_subject() {
        let conn = test_conn();
        let id = insert_subject(&conn, "Amira Haddad", "Engineering", &template(0.1), now())
            .unwrap();
        let subject = load_subject(&conn, id).unwrap();
        assert_eq!(subject.name, "Amira Haddad");
        assert_eq!(subject.department, "Engineering");
        assert_eq!(subject.attendance_score, 100.0);
        assert_eq!(subject.created_at, now());
    }

    #[test]
    fn test_load_missing_subject() {
        let conn = test_conn();
        assert!(matches!(
            load_subject(&conn, 42),
            Err(StoreError::SubjectNotFound(42))
        ));
    }

    #[test]
    fn test_gallery_round_trips_templates() {
        let conn = test_conn();
        let a = insert_subject(&conn, "A", "Ops", &template(0.1), now()).unwrap();
        let b = insert_subject(&conn, "B", "Ops", &template(0.9), now()).unwrap();
        let gallery = load_gallery(&conn).unwrap();
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery[0].subject_id, a);
        assert_eq!(gallery[1].subject_id, b);
        assert_eq!(gallery[0].template.values, template(0.1).values);
    }

    #[test]
    fn test_gallery_skips_corrupt_entry() {
        let conn = test_conn();
        let good = insert_subject(&conn, "Good", "Ops", &template(0.1), now()).unwrap();
        conn.execute(
            "INSERT INTO subjects (name, department, template, attendance_score, created_at)
             VALUES ('Bad', 'Ops', x'DEADBEEF', 100.0, '2026-08-24T08:00:00')",
            [],
        )
        .unwrap();
        let gallery = load_gallery(&conn).unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery[0].subject_id, good);
    }

    #[test]
    fn test_gallery_all_corrupt_fails_loud() {
        let conn = test_conn();
        conn.execute(
            "INSERT INTO subjects (name, department, template, attendance_score, created_at)
             VALUES ('Bad', 'Ops', x'00', 100.0, '2026-08-24T08:00:00')",
            [],
        )
        .unwrap();
        assert!(matches!(
            load_gallery(&conn),
            Err(StoreError::GalleryUnreadable(1))
        ));
    }

    #[test]
    fn test_empty_gallery_is_fine() {
        let conn = test_conn();
        assert!(load_gallery(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_update_template_replaces() {
        let conn = test_conn();
        let id = insert_subject(&conn, "A", "Ops", &template(0.1), now()).unwrap();
        update_template(&conn, id, &template(0.7)).unwrap();
        let gallery = load_gallery(&conn).unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery[0].template.values, template(0.7).values);
    }

    #[test]
    fn test_update_template_missing_subject() {
        let conn = test_conn();
        assert!(matches!(
            update_template(&conn, 9, &template(0.1)),
            Err(StoreError::SubjectNotFound(9))
        ));
    }

    #[test]
    fn test_remove_subject() {
        let mut conn = test_conn();
        let id = insert_subject(&conn, "A", "Ops", &template(0.1), now()).unwrap();
        remove_subject(&mut conn, id).unwrap();
        assert!(list_subjects(&conn).unwrap().is_empty());
        assert!(matches!(
            remove_subject(&mut conn, id),
            Err(StoreError::SubjectNotFound(_))
        ));
    }
}
