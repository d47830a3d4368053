use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::{cmp_rate, day_of, topic_names};
use crate::error::ServiceResult;
use crate::model::{format_ts, ResponseStatus};
use crate::stats::{percent, round2, Tally};
use crate::store;

const ACTIVE_WINDOW_DAYS: i64 = 7;
const PERFORMER_MIN_ANSWERED: i64 = 20;
const PERFORMER_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ClassOverview {
    pub total_students: i64,
    pub active_students_last_week: i64,
    pub total_questions_answered: i64,
    pub class_avg_accuracy: f64,
    pub topics_overview: Vec<TopicOverview>,
    pub rostered_students: Vec<RosteredStudent>,
    pub top_performers: Vec<Performer>,
    pub struggling_students: Vec<Performer>,
    pub recent_activity: Vec<DailyActivity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicOverview {
    pub topic: String,
    pub topic_name: String,
    pub students_started: i64,
    pub students_completed: i64,
    pub completion_rate: f64,
    pub avg_accuracy: f64,
    pub avg_time_per_question: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosteredStudent {
    pub roster_id: i64,
    /// None until the student has logged in once.
    pub student_id: Option<i64>,
    pub student_name: String,
    pub student_email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Performer {
    pub student_id: i64,
    pub student_name: String,
    pub questions_answered: i64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyActivity {
    pub date: String,
    pub questions_answered: i64,
    pub active_students: i64,
}

#[derive(Default)]
struct TopicAcc {
    started: i64,
    completed: i64,
    tally: Tally,
}

/// Class-wide analytics over the active roster. `now` anchors the trailing
/// activity window.
pub fn class_overview(conn: &Connection, now: DateTime<Utc>) -> ServiceResult<ClassOverview> {
    let roster = store::roster::list_active(conn)?;
    let users_by_email = store::users::list_all(conn)?
        .into_iter()
        .map(|u| (u.email.to_lowercase(), u))
        .collect::<HashMap<_, _>>();
    let responses = store::responses::list_rostered(conn, None, None)?;
    let progress = store::progress::list_rostered(conn)?;
    let names = topic_names(conn)?;
    let since = format_ts(now - Duration::days(ACTIVE_WINDOW_DAYS));

    let rostered_students = roster
        .iter()
        .map(|entry| {
            let user = users_by_email.get(&entry.email.to_lowercase());
            let student_name = user
                .map(|u| u.name.trim().to_string())
                .filter(|n| !n.is_empty())
                .or_else(|| Some(entry.full_name()).filter(|n| !n.is_empty()))
                .unwrap_or_else(|| entry.email.clone());
            RosteredStudent {
                roster_id: entry.id,
                student_id: user.map(|u| u.id),
                student_name,
                student_email: entry.email.clone(),
            }
        })
        .collect::<Vec<_>>();

    let mut overall = Tally::default();
    let mut per_student: BTreeMap<i64, Tally> = BTreeMap::new();
    let mut per_topic: BTreeMap<&str, TopicAcc> = BTreeMap::new();
    let mut recent: BTreeMap<&str, (i64, BTreeSet<i64>)> = BTreeMap::new();
    let mut active_last_week = BTreeSet::new();
    for r in &responses {
        overall.push(r.status, r.time_spent);
        if r.status != ResponseStatus::Skipped {
            per_student
                .entry(r.user_id)
                .or_default()
                .push(r.status, r.time_spent);
        }
        per_topic
            .entry(r.topic.as_str())
            .or_default()
            .tally
            .push(r.status, r.time_spent);
        if r.attempted_at.as_str() >= since.as_str() {
            active_last_week.insert(r.user_id);
            let day = recent.entry(day_of(&r.attempted_at)).or_default();
            day.0 += 1;
            day.1.insert(r.user_id);
        }
    }
    for p in &progress {
        let acc = per_topic.entry(p.topic.as_str()).or_default();
        acc.started += 1;
        if p.is_complete() {
            acc.completed += 1;
        }
    }

    let mut topics_overview = per_topic
        .into_iter()
        .filter(|(_, acc)| acc.started > 0)
        .map(|(topic, acc)| TopicOverview {
            topic: topic.to_string(),
            topic_name: names.get(topic).cloned().unwrap_or_else(|| topic.to_string()),
            students_started: acc.started,
            students_completed: acc.completed,
            completion_rate: round2(percent(acc.completed, acc.started)),
            avg_accuracy: acc.tally.accuracy(),
            avg_time_per_question: acc.tally.avg_time(),
        })
        .collect::<Vec<_>>();
    topics_overview.sort_by(|a, b| a.topic_name.cmp(&b.topic_name).then_with(|| a.topic.cmp(&b.topic)));

    let user_names = users_by_email
        .values()
        .map(|u| (u.id, u.name.as_str()))
        .collect::<HashMap<_, _>>();
    let eligible = per_student
        .into_iter()
        .filter(|(_, t)| t.answered() >= PERFORMER_MIN_ANSWERED)
        .map(|(id, t)| Performer {
            student_id: id,
            student_name: user_names.get(&id).map(|n| n.to_string()).unwrap_or_default(),
            questions_answered: t.answered(),
            accuracy: t.accuracy(),
        })
        .collect::<Vec<_>>();
    // eligible is in id order, so stable sorts break ties by id.
    let mut top_performers = eligible.clone();
    top_performers.sort_by(|a, b| cmp_rate(b.accuracy, a.accuracy));
    top_performers.truncate(PERFORMER_LIMIT);
    let mut struggling_students = eligible;
    struggling_students.sort_by(|a, b| cmp_rate(a.accuracy, b.accuracy));
    struggling_students.truncate(PERFORMER_LIMIT);

    let recent_activity = recent
        .into_iter()
        .map(|(date, (count, users))| DailyActivity {
            date: date.to_string(),
            questions_answered: count,
            active_students: users.len() as i64,
        })
        .collect();

    Ok(ClassOverview {
        total_students: rostered_students.len() as i64,
        active_students_last_week: active_last_week.len() as i64,
        total_questions_answered: overall.total(),
        class_avg_accuracy: overall.accuracy(),
        topics_overview,
        rostered_students,
        top_performers,
        struggling_students,
        recent_activity,
    })
}
