use rusqlite::Connection;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::model::{format_ts, ResponseStatus, StudentResponse};
use crate::store;
use crate::store::responses::NewResponse;

/// Incoming answer event. Every field is optional at parse time so that
/// missing keys can be reported together.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePayload {
    pub user_id: Option<i64>,
    pub topic: Option<String>,
    pub subtopic_type: Option<String>,
    pub question_code: Option<String>,
    pub student_answer: Option<String>,
    pub correct_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub status: Option<String>,
    pub time_spent: Option<i64>,
}

impl ResponsePayload {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.user_id.is_none() {
            missing.push("user_id");
        }
        if self.topic.is_none() {
            missing.push("topic");
        }
        if self.subtopic_type.is_none() {
            missing.push("subtopic_type");
        }
        if self.question_code.is_none() {
            missing.push("question_code");
        }
        if self.correct_answer.is_none() {
            missing.push("correct_answer");
        }
        if self.is_correct.is_none() {
            missing.push("is_correct");
        }
        if self.status.is_none() {
            missing.push("status");
        }
        missing.sort_unstable();
        missing
    }

    fn validate(self) -> ServiceResult<NewResponse> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ServiceError::validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
        let raw_status = self.status.unwrap_or_default();
        let status = ResponseStatus::parse(raw_status.trim()).ok_or_else(|| {
            ServiceError::validation(format!(
                "status must be one of correct, incorrect, skipped (got {raw_status})"
            ))
        })?;
        if matches!(self.time_spent, Some(t) if t < 0) {
            return Err(ServiceError::validation("time_spent must be >= 0"));
        }
        Ok(NewResponse {
            user_id: self.user_id.unwrap_or_default(),
            topic: self.topic.unwrap_or_default(),
            subtopic_type: self.subtopic_type.unwrap_or_default(),
            question_code: self.question_code.unwrap_or_default(),
            student_answer: self.student_answer,
            correct_answer: self.correct_answer.unwrap_or_default(),
            // skipped is never counted correct
            is_correct: status != ResponseStatus::Skipped && self.is_correct.unwrap_or(false),
            status,
            time_spent: self.time_spent,
        })
    }
}

/// Append an answer and bump the matching progress counter in one transaction.
pub fn record_response(
    conn: &Connection,
    payload: ResponsePayload,
    now: chrono::DateTime<chrono::Utc>,
) -> ServiceResult<StudentResponse> {
    let new = payload.validate()?;
    super::require_user(conn, new.user_id)?;
    super::require_topic(conn, &new.topic)?;

    let at = format_ts(now);
    let tx = conn.unchecked_transaction()?;
    let saved = store::responses::insert(&tx, &new, &at)?;
    store::progress::increment_answered(&tx, new.user_id, &new.topic, &at)?;
    tx.commit()?;

    debug!(
        user_id = saved.user_id,
        topic = %saved.topic,
        status = saved.status.as_str(),
        "response recorded"
    );
    Ok(saved)
}

pub fn list_for_student(
    conn: &Connection,
    user_id: i64,
    topic_id: Option<&str>,
) -> ServiceResult<Vec<StudentResponse>> {
    super::require_user(conn, user_id)?;
    Ok(store::responses::list_for_user(conn, user_id, topic_id)?)
}
