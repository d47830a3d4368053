use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;

use super::{cmp_rate, day_of, topic_names};
use crate::error::{ServiceError, ServiceResult};
use crate::model::ResponseStatus;
use crate::stats::{percent, round2, Tally};
use crate::store;

const STRUGGLING_MIN_ATTEMPTS: i64 = 3;
const STRUGGLING_MAX_ACCURACY: f64 = 60.0;
const STRUGGLING_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub student_id: i64,
    pub student_name: String,
    pub student_email: String,
    pub overall_stats: StudentOverall,
    pub topic_breakdown: Vec<TopicBreakdown>,
    pub performance_over_time: Vec<DailyPerformance>,
    pub struggling_subtopics: Vec<StrugglingSubtopic>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentOverall {
    pub total_questions_answered: i64,
    pub total_correct: i64,
    pub total_incorrect: i64,
    pub total_skipped: i64,
    pub overall_accuracy: f64,
    pub avg_time_per_question: f64,
    pub topics_started: i64,
    pub topics_completed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicBreakdown {
    pub topic: String,
    pub topic_name: String,
    pub questions_answered: i64,
    pub correct: i64,
    pub incorrect: i64,
    pub skipped: i64,
    pub accuracy: f64,
    pub avg_time: f64,
    pub completion_percentage: f64,
    pub last_accessed: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyPerformance {
    pub date: String,
    pub questions_answered: i64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrugglingSubtopic {
    pub topic: String,
    pub subtopic_type: String,
    pub attempts: i64,
    pub correct: i64,
    pub accuracy: f64,
}

/// Per-student analytics. Users without an active roster entry are
/// reported as not found.
pub fn student_report(conn: &Connection, student_id: i64) -> ServiceResult<StudentReport> {
    let not_found = || ServiceError::not_found(format!("student {student_id} not found"));
    let user = store::users::get_by_id(conn, student_id)?.ok_or_else(not_found)?;
    if !store::roster::is_user_rostered(conn, student_id)? {
        return Err(not_found());
    }

    let responses = store::responses::history_for_user(conn, student_id)?;
    let progress = store::progress::list_for_user(conn, student_id)?;
    let names = topic_names(conn)?;

    let mut overall = Tally::default();
    let mut per_topic: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut per_day: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut per_subtopic: BTreeMap<(&str, &str), Tally> = BTreeMap::new();
    for r in &responses {
        overall.push(r.status, r.time_spent);
        per_topic
            .entry(r.topic.as_str())
            .or_default()
            .push(r.status, r.time_spent);
        per_day
            .entry(day_of(&r.attempted_at))
            .or_default()
            .push(r.status, r.time_spent);
        if r.status != ResponseStatus::Skipped {
            per_subtopic
                .entry((r.topic.as_str(), r.subtopic_type.as_str()))
                .or_default()
                .push(r.status, r.time_spent);
        }
    }

    let topic_breakdown = per_topic
        .into_iter()
        .map(|(topic, t)| {
            let p = progress.iter().find(|(p, _)| p.topic == topic).map(|(p, _)| p);
            TopicBreakdown {
                topic: topic.to_string(),
                topic_name: names.get(topic).cloned().unwrap_or_else(|| topic.to_string()),
                questions_answered: t.total(),
                correct: t.correct,
                incorrect: t.incorrect,
                skipped: t.skipped,
                accuracy: t.accuracy(),
                avg_time: t.avg_time(),
                completion_percentage: p.map(|p| p.completion_percentage()).unwrap_or(0.0),
                last_accessed: p.map(|p| p.last_accessed.clone()),
            }
        })
        .collect();

    let performance_over_time = per_day
        .into_iter()
        .map(|(date, t)| DailyPerformance {
            date: date.to_string(),
            questions_answered: t.total(),
            accuracy: round2(percent(t.correct, t.total())),
        })
        .collect();

    let mut struggling = per_subtopic
        .into_iter()
        .filter(|(_, t)| t.answered() >= STRUGGLING_MIN_ATTEMPTS && t.accuracy() < STRUGGLING_MAX_ACCURACY)
        .map(|((topic, subtopic), t)| StrugglingSubtopic {
            topic: topic.to_string(),
            subtopic_type: subtopic.to_string(),
            attempts: t.answered(),
            correct: t.correct,
            accuracy: t.accuracy(),
        })
        .collect::<Vec<_>>();
    // BTreeMap order already breaks ties by (topic, subtopic); the sort is stable.
    struggling.sort_by(|a, b| cmp_rate(a.accuracy, b.accuracy));
    struggling.truncate(STRUGGLING_LIMIT);

    Ok(StudentReport {
        student_id,
        student_name: user.name,
        student_email: user.email,
        overall_stats: StudentOverall {
            total_questions_answered: overall.total(),
            total_correct: overall.correct,
            total_incorrect: overall.incorrect,
            total_skipped: overall.skipped,
            overall_accuracy: overall.accuracy(),
            avg_time_per_question: overall.avg_time(),
            topics_started: progress.len() as i64,
            topics_completed: progress.iter().filter(|(p, _)| p.is_complete()).count() as i64,
        },
        topic_breakdown,
        performance_over_time,
        struggling_subtopics: struggling,
    })
}
