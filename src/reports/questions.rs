use std::collections::{BTreeMap, BTreeSet};

use rusqlite::Connection;
use serde::Serialize;

use crate::error::ServiceResult;
use crate::services::require_topic;
use crate::stats::Tally;
use crate::store;

#[derive(Debug, Clone, Serialize)]
pub struct QuestionAnalytics {
    pub topic: String,
    pub subtopic_type: Option<String>,
    pub analytics: Vec<QuestionStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionStats {
    pub question_code: String,
    pub subtopic_type: String,
    pub times_shown: i64,
    pub correct_count: i64,
    pub incorrect_count: i64,
    pub skipped_count: i64,
    pub success_rate: f64,
    pub avg_time_spent: f64,
    pub students_who_saw: i64,
}

/// Per-question statistics for a topic, most shown first. Covers every
/// response, not only rostered students.
pub fn question_analytics(
    conn: &Connection,
    topic_id: &str,
    subtopic_type: Option<&str>,
) -> ServiceResult<QuestionAnalytics> {
    let topic = require_topic(conn, topic_id)?;
    let responses = store::responses::list_for_topic(conn, topic_id, subtopic_type)?;

    let mut by_question: BTreeMap<(&str, &str), (Tally, BTreeSet<i64>)> = BTreeMap::new();
    for r in &responses {
        let (tally, students) = by_question
            .entry((r.question_code.as_str(), r.subtopic_type.as_str()))
            .or_default();
        tally.push(r.status, r.time_spent);
        students.insert(r.user_id);
    }

    let mut analytics = by_question
        .into_iter()
        .map(|((code, subtopic), (t, students))| QuestionStats {
            question_code: code.to_string(),
            subtopic_type: subtopic.to_string(),
            times_shown: t.total(),
            correct_count: t.correct,
            incorrect_count: t.incorrect,
            skipped_count: t.skipped,
            success_rate: t.accuracy(),
            avg_time_spent: t.avg_time(),
            students_who_saw: students.len() as i64,
        })
        .collect::<Vec<_>>();
    analytics.sort_by(|a, b| b.times_shown.cmp(&a.times_shown));

    Ok(QuestionAnalytics {
        topic: topic.id,
        subtopic_type: subtopic_type.map(str::to_string),
        analytics,
    })
}
