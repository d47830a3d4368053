use std::collections::{BTreeMap, BTreeSet};

use rusqlite::Connection;
use serde::Serialize;

use super::cmp_rate;
use crate::error::ServiceResult;
use crate::model::ResponseStatus;
use crate::services::require_topic;
use crate::stats::{Difficulty, Tally};
use crate::store;

const MISSED_MIN_ATTEMPTS: i64 = 5;
const MISSED_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct TopicReport {
    pub topic: String,
    pub topic_name: String,
    pub overall_stats: TopicOverall,
    pub subtopic_difficulty: Vec<SubtopicDifficulty>,
    pub most_missed_questions: Vec<MissedQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicOverall {
    pub total_students: i64,
    pub students_started: i64,
    pub students_completed: i64,
    pub total_attempts: i64,
    pub avg_accuracy: f64,
    pub avg_time_per_question: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtopicDifficulty {
    pub subtopic_type: String,
    pub attempts: i64,
    pub unique_students: i64,
    pub success_rate: f64,
    pub avg_time: f64,
    pub difficulty_rating: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissedQuestion {
    pub question_code: String,
    pub subtopic_type: String,
    pub attempts: i64,
    pub success_rate: f64,
}

#[derive(Default)]
struct SubtopicAcc {
    tally: Tally,
    students: BTreeSet<i64>,
}

/// Topic analytics restricted to rostered students.
pub fn topic_report(conn: &Connection, topic_id: &str) -> ServiceResult<TopicReport> {
    let topic = require_topic(conn, topic_id)?;
    let responses = store::responses::list_rostered(conn, Some(topic_id), None)?;
    let total_students = store::roster::count_active(conn)?;
    let students_completed = store::progress::list_rostered(conn)?
        .iter()
        .filter(|p| p.topic == topic_id && p.is_complete())
        .count() as i64;

    let mut overall = Tally::default();
    let mut started = BTreeSet::new();
    let mut by_subtopic: BTreeMap<&str, SubtopicAcc> = BTreeMap::new();
    let mut by_question: BTreeMap<(&str, &str), Tally> = BTreeMap::new();
    for r in &responses {
        overall.push(r.status, r.time_spent);
        started.insert(r.user_id);
        if r.status == ResponseStatus::Skipped {
            continue;
        }
        let acc = by_subtopic.entry(r.subtopic_type.as_str()).or_default();
        acc.tally.push(r.status, r.time_spent);
        acc.students.insert(r.user_id);
        by_question
            .entry((r.question_code.as_str(), r.subtopic_type.as_str()))
            .or_default()
            .push(r.status, r.time_spent);
    }

    let mut subtopic_difficulty = by_subtopic
        .into_iter()
        .map(|(subtopic, acc)| {
            let rate = acc.tally.accuracy();
            SubtopicDifficulty {
                subtopic_type: subtopic.to_string(),
                attempts: acc.tally.answered(),
                unique_students: acc.students.len() as i64,
                success_rate: rate,
                avg_time: acc.tally.avg_time(),
                difficulty_rating: Difficulty::from_success_rate(rate).label(),
            }
        })
        .collect::<Vec<_>>();
    subtopic_difficulty.sort_by(|a, b| cmp_rate(a.success_rate, b.success_rate));

    let mut most_missed = by_question
        .into_iter()
        .filter(|(_, t)| t.answered() >= MISSED_MIN_ATTEMPTS)
        .map(|((code, subtopic), t)| MissedQuestion {
            question_code: code.to_string(),
            subtopic_type: subtopic.to_string(),
            attempts: t.answered(),
            success_rate: t.accuracy(),
        })
        .collect::<Vec<_>>();
    most_missed.sort_by(|a, b| cmp_rate(a.success_rate, b.success_rate));
    most_missed.truncate(MISSED_LIMIT);

    Ok(TopicReport {
        topic: topic.id,
        topic_name: topic.name,
        overall_stats: TopicOverall {
            total_students,
            students_started: started.len() as i64,
            students_completed,
            total_attempts: overall.total(),
            avg_accuracy: overall.accuracy(),
            avg_time_per_question: overall.avg_time(),
        },
        subtopic_difficulty,
        most_missed_questions: most_missed,
    })
}
