use rusqlite::{params_from_iter, types::Value, Connection, Row};

use crate::model::{ResponseStatus, StudentResponse};

const RESPONSE_COLUMNS: &str = "id, user_id, topic, subtopic_type, question_code, student_answer, \
     correct_answer, is_correct, status, time_spent, attempted_at";

fn response_from_row(r: &Row<'_>) -> rusqlite::Result<StudentResponse> {
    Ok(StudentResponse {
        id: r.get(0)?,
        user_id: r.get(1)?,
        topic: r.get(2)?,
        subtopic_type: r.get(3)?,
        question_code: r.get(4)?,
        student_answer: r.get(5)?,
        correct_answer: r.get(6)?,
        is_correct: r.get::<_, i64>(7)? != 0,
        status: r.get(8)?,
        time_spent: r.get(9)?,
        attempted_at: r.get(10)?,
    })
}

/// A response ready to append. Validation happens in the service layer.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub user_id: i64,
    pub topic: String,
    pub subtopic_type: String,
    pub question_code: String,
    pub student_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub status: ResponseStatus,
    pub time_spent: Option<i64>,
}

pub fn insert(conn: &Connection, r: &NewResponse, attempted_at: &str) -> rusqlite::Result<StudentResponse> {
    conn.execute(
        "INSERT INTO student_responses(
            user_id, topic, subtopic_type, question_code, student_answer,
            correct_answer, is_correct, status, time_spent, attempted_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            r.user_id,
            &r.topic,
            &r.subtopic_type,
            &r.question_code,
            &r.student_answer,
            &r.correct_answer,
            r.is_correct as i64,
            r.status.as_str(),
            r.time_spent,
            attempted_at,
        ),
    )?;
    Ok(StudentResponse {
        id: conn.last_insert_rowid(),
        user_id: r.user_id,
        topic: r.topic.clone(),
        subtopic_type: r.subtopic_type.clone(),
        question_code: r.question_code.clone(),
        student_answer: r.student_answer.clone(),
        correct_answer: r.correct_answer.clone(),
        is_correct: r.is_correct,
        status: r.status,
        time_spent: r.time_spent,
        attempted_at: attempted_at.to_string(),
    })
}

/// Newest first, optionally restricted to one topic.
pub fn list_for_user(
    conn: &Connection,
    user_id: i64,
    topic_id: Option<&str>,
) -> rusqlite::Result<Vec<StudentResponse>> {
    let mut sql = format!("SELECT {RESPONSE_COLUMNS} FROM student_responses WHERE user_id = ?");
    let mut binds = vec![Value::Integer(user_id)];
    if let Some(t) = topic_id {
        sql.push_str(" AND topic = ?");
        binds.push(Value::Text(t.to_string()));
    }
    sql.push_str(" ORDER BY attempted_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(binds), response_from_row)?;
    rows.collect()
}

/// Chronological responses of one user, used by the student report.
pub fn history_for_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<StudentResponse>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESPONSE_COLUMNS} FROM student_responses WHERE user_id = ? ORDER BY attempted_at, id"
    ))?;
    let rows = stmt.query_map([user_id], response_from_row)?;
    rows.collect()
}

/// Every response in a topic, optionally for one subtopic type.
pub fn list_for_topic(
    conn: &Connection,
    topic_id: &str,
    subtopic_type: Option<&str>,
) -> rusqlite::Result<Vec<StudentResponse>> {
    let mut sql = format!("SELECT {RESPONSE_COLUMNS} FROM student_responses WHERE topic = ?");
    let mut binds = vec![Value::Text(topic_id.to_string())];
    if let Some(s) = subtopic_type {
        sql.push_str(" AND subtopic_type = ?");
        binds.push(Value::Text(s.to_string()));
    }
    sql.push_str(" ORDER BY attempted_at, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(binds), response_from_row)?;
    rows.collect()
}

/// Responses written by students on the active roster, optionally limited
/// to one topic and/or attempts at or after `since`.
pub fn list_rostered(
    conn: &Connection,
    topic_id: Option<&str>,
    since: Option<&str>,
) -> rusqlite::Result<Vec<StudentResponse>> {
    let mut sql = format!(
        "SELECT {RESPONSE_COLUMNS} FROM student_responses
         WHERE user_id IN ({})",
        super::roster::ROSTERED_USER_IDS_SQL
    );
    let mut binds: Vec<Value> = Vec::new();
    if let Some(t) = topic_id {
        sql.push_str(" AND topic = ?");
        binds.push(Value::Text(t.to_string()));
    }
    if let Some(s) = since {
        sql.push_str(" AND attempted_at >= ?");
        binds.push(Value::Text(s.to_string()));
    }
    sql.push_str(" ORDER BY attempted_at, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(binds), response_from_row)?;
    rows.collect()
}
