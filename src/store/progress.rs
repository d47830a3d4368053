use rusqlite::{Connection, OptionalExtension, Row};

use crate::model::StudentProgress;

const PROGRESS_COLUMNS: &str =
    "id, user_id, topic, subtopics_completed, total_subtopics, questions_answered, last_accessed";

fn progress_from_row(r: &Row<'_>) -> rusqlite::Result<StudentProgress> {
    Ok(StudentProgress {
        id: r.get(0)?,
        user_id: r.get(1)?,
        topic: r.get(2)?,
        subtopics_completed: r.get(3)?,
        total_subtopics: r.get(4)?,
        questions_answered: r.get(5)?,
        last_accessed: r.get(6)?,
    })
}

pub fn get(conn: &Connection, user_id: i64, topic_id: &str) -> rusqlite::Result<Option<StudentProgress>> {
    conn.query_row(
        &format!("SELECT {PROGRESS_COLUMNS} FROM student_progress WHERE user_id = ? AND topic = ?"),
        (user_id, topic_id),
        progress_from_row,
    )
    .optional()
}

/// Rows of one user joined with the topic name, newest access first.
pub fn list_for_user(
    conn: &Connection,
    user_id: i64,
) -> rusqlite::Result<Vec<(StudentProgress, Option<String>)>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.user_id, p.topic, p.subtopics_completed, p.total_subtopics,
                p.questions_answered, p.last_accessed, t.name
         FROM student_progress p
         LEFT JOIN topics t ON t.id = p.topic
         WHERE p.user_id = ?
         ORDER BY p.last_accessed DESC, p.topic",
    )?;
    let rows = stmt.query_map([user_id], |r| Ok((progress_from_row(r)?, r.get(7)?)))?;
    rows.collect()
}

/// Every progress row of students on the active roster.
pub fn list_rostered(conn: &Connection) -> rusqlite::Result<Vec<StudentProgress>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM student_progress
         WHERE user_id IN ({})
         ORDER BY user_id, topic",
        super::roster::ROSTERED_USER_IDS_SQL
    ))?;
    let rows = stmt.query_map([], progress_from_row)?;
    rows.collect()
}

/// Set completion counters, creating the row when absent. Returns true when
/// a new row was inserted.
pub fn upsert_completion(
    conn: &Connection,
    user_id: i64,
    topic_id: &str,
    subtopics_completed: i64,
    total_subtopics: i64,
    at: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE student_progress
         SET subtopics_completed = ?, total_subtopics = ?, last_accessed = ?
         WHERE user_id = ? AND topic = ?",
        (subtopics_completed, total_subtopics, at, user_id, topic_id),
    )?;
    if changed > 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO student_progress(
            user_id, topic, subtopics_completed, total_subtopics, questions_answered, last_accessed)
         VALUES(?, ?, ?, ?, 0, ?)",
        (user_id, topic_id, subtopics_completed, total_subtopics, at),
    )?;
    Ok(true)
}

/// Atomic +1 on questions_answered; a missing row starts at zero totals.
pub fn increment_answered(
    conn: &Connection,
    user_id: i64,
    topic_id: &str,
    at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO student_progress(
            user_id, topic, subtopics_completed, total_subtopics, questions_answered, last_accessed)
         VALUES(?, ?, 0, 0, 1, ?)
         ON CONFLICT(user_id, topic) DO UPDATE SET
            questions_answered = questions_answered + 1,
            last_accessed = excluded.last_accessed",
        (user_id, topic_id, at),
    )?;
    Ok(())
}
