use chrono::Utc;
use serde_json::Value;

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db, get_opt_str, get_required_i64, get_required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::reports;

fn handle_student(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let student_id = get_required_i64(&req.params, "student_id")?;
    to_json(&reports::student_report(conn, student_id)?)
}

fn handle_topic(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let topic_id = get_required_str(&req.params, "topic_id")?;
    to_json(&reports::topic_report(conn, &topic_id)?)
}

fn handle_class_overview(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    to_json(&reports::class_overview(conn, Utc::now())?)
}

fn handle_question_analytics(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let topic_id = get_required_str(&req.params, "topic_id")?;
    let subtopic = get_opt_str(&req.params, "subtopic_type")?;
    to_json(&reports::question_analytics(
        conn,
        &topic_id,
        subtopic.as_deref(),
    )?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "reports.student" => handle_student(state, req),
        "reports.topic" => handle_topic(state, req),
        "reports.classOverview" => handle_class_overview(state, req),
        "reports.questionAnalytics" => handle_question_analytics(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, result))
}
