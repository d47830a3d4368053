//! Read-only analytics over responses, progress and the roster.
//!
//! Each report loads the rows it needs and aggregates in memory with the
//! helpers in `stats`. Nothing here writes.

pub mod class;
pub mod questions;
pub mod student;
pub mod topic;

pub use class::class_overview;
pub use questions::question_analytics;
pub use student::student_report;
pub use topic::topic_report;

use std::cmp::Ordering;
use std::collections::HashMap;

use rusqlite::Connection;

use crate::store;

/// Calendar day (UTC) of a stored timestamp.
pub(crate) fn day_of(ts: &str) -> &str {
    ts.get(..10).unwrap_or(ts)
}

pub(crate) fn topic_names(conn: &Connection) -> rusqlite::Result<HashMap<String, String>> {
    Ok(store::topics::list(conn, false)?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect())
}

/// Total order on rates, treating NaN as equal.
pub(crate) fn cmp_rate(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
pub(crate) mod fixture {
    use chrono::{DateTime, TimeZone, Utc};
    use rusqlite::Connection;

    use crate::model::{format_ts, ResponseStatus, Role, UpdateSource, User};
    use crate::store;
    use crate::store::responses::NewResponse;

    pub fn day(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()
    }

    pub fn student(conn: &Connection, email: &str, rostered: bool) -> User {
        let user = store::users::create_user(conn, email, email, Role::Student).expect("user");
        if rostered {
            enroll(conn, email);
        }
        user
    }

    pub fn enroll(conn: &Connection, email: &str) -> i64 {
        store::roster::insert(
            conn,
            &store::roster::NewRosterStudent {
                email,
                first_name: "First",
                last_name: email,
                notes: None,
                class_name: None,
                via: UpdateSource::Manual,
                upload_id: None,
            },
            "2025-01-01T00:00:00.000000Z",
        )
        .expect("enroll")
    }

    pub fn topic(conn: &Connection, id: &str) {
        store::topics::insert(conn, id, &format!("Topic {id}"), true, 1).expect("topic");
    }

    #[allow(clippy::too_many_arguments)]
    pub fn answer(
        conn: &Connection,
        user_id: i64,
        topic: &str,
        subtopic: &str,
        question: &str,
        status: ResponseStatus,
        time_spent: Option<i64>,
        at: DateTime<Utc>,
    ) {
        let r = NewResponse {
            user_id,
            topic: topic.to_string(),
            subtopic_type: subtopic.to_string(),
            question_code: question.to_string(),
            student_answer: None,
            correct_answer: "x".to_string(),
            is_correct: status == ResponseStatus::Correct,
            status,
            time_spent,
        };
        store::responses::insert(conn, &r, &format_ts(at)).expect("answer");
        store::progress::increment_answered(conn, user_id, topic, &format_ts(at)).expect("progress");
    }
}
