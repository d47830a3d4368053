use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::model::{format_ts, StudentProgress};
use crate::store;

/// Progress row as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    #[serde(flatten)]
    pub progress: StudentProgress,
    pub topic_name: Option<String>,
    pub completion_percentage: f64,
    pub is_complete: bool,
}

impl ProgressView {
    fn new(progress: StudentProgress, topic_name: Option<String>) -> Self {
        Self {
            completion_percentage: progress.completion_percentage(),
            is_complete: progress.is_complete(),
            progress,
            topic_name,
        }
    }
}

/// Raw counters from the request; checked to be JSON integers before use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionInput {
    pub subtopics_completed: Option<Value>,
    pub total_subtopics: Option<Value>,
}

fn integer_field(v: Option<&Value>, key: &str) -> ServiceResult<i64> {
    match v {
        None | Some(Value::Null) => Err(ServiceError::validation(format!("{key} is required"))),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| ServiceError::validation(format!("{key} must be an integer"))),
    }
}

impl CompletionInput {
    pub fn validate(&self) -> ServiceResult<(i64, i64)> {
        let completed = integer_field(self.subtopics_completed.as_ref(), "subtopics_completed")?;
        let total = integer_field(self.total_subtopics.as_ref(), "total_subtopics")?;
        if completed < 0 {
            return Err(ServiceError::validation("subtopics_completed must be >= 0"));
        }
        if total <= 0 {
            return Err(ServiceError::validation("total_subtopics must be > 0"));
        }
        Ok((completed, total))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub progress: ProgressView,
    pub created: bool,
}

fn view(conn: &Connection, user_id: i64, topic_id: &str) -> ServiceResult<ProgressView> {
    let progress = store::progress::get(conn, user_id, topic_id)?.ok_or_else(|| {
        ServiceError::not_found(format!("no progress for user {user_id} in topic {topic_id}"))
    })?;
    let topic_name = store::topics::get_by_id(conn, topic_id)?.map(|t| t.name);
    Ok(ProgressView::new(progress, topic_name))
}

pub fn get_progress(conn: &Connection, user_id: i64, topic_id: &str) -> ServiceResult<ProgressView> {
    view(conn, user_id, topic_id)
}

pub fn list_progress(conn: &Connection, user_id: i64) -> ServiceResult<Vec<ProgressView>> {
    super::require_user(conn, user_id)?;
    Ok(store::progress::list_for_user(conn, user_id)?
        .into_iter()
        .map(|(p, name)| ProgressView::new(p, name))
        .collect())
}

/// Upsert the (user, topic) completion counters.
pub fn update_or_create_progress(
    conn: &Connection,
    user_id: i64,
    topic_id: &str,
    input: &CompletionInput,
    now: DateTime<Utc>,
) -> ServiceResult<ProgressUpdate> {
    let (completed, total) = input.validate()?;
    super::require_user(conn, user_id)?;
    super::require_topic(conn, topic_id)?;

    let tx = conn.unchecked_transaction()?;
    let created =
        store::progress::upsert_completion(&tx, user_id, topic_id, completed, total, &format_ts(now))?;
    let progress = view(&tx, user_id, topic_id)?;
    tx.commit()?;
    info!(user_id, topic = topic_id, completed, total, created, "progress updated");
    Ok(ProgressUpdate { progress, created })
}

pub fn increment_questions_answered(
    conn: &Connection,
    user_id: i64,
    topic_id: &str,
    now: DateTime<Utc>,
) -> ServiceResult<ProgressView> {
    super::require_user(conn, user_id)?;
    super::require_topic(conn, topic_id)?;
    store::progress::increment_answered(conn, user_id, topic_id, &format_ts(now))?;
    view(conn, user_id, topic_id)
}
