use chrono::Utc;
use serde_json::{json, Value};

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db, get_required_i64, get_required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::services::progress::{self, CompletionInput};

fn handle_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let user_id = get_required_i64(&req.params, "user_id")?;
    Ok(json!({ "progress": to_json(&progress::list_progress(conn, user_id)?)? }))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let user_id = get_required_i64(&req.params, "user_id")?;
    let topic_id = get_required_str(&req.params, "topic_id")?;
    to_json(&progress::get_progress(conn, user_id, &topic_id)?)
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let input = CompletionInput {
        subtopics_completed: req.params.get("subtopics_completed").cloned(),
        total_subtopics: req.params.get("total_subtopics").cloned(),
    };
    input.validate()?;
    let user_id = get_required_i64(&req.params, "user_id")?;
    let topic_id = get_required_str(&req.params, "topic_id")?;
    to_json(&progress::update_or_create_progress(
        conn,
        user_id,
        &topic_id,
        &input,
        Utc::now(),
    )?)
}

fn handle_increment(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let user_id = get_required_i64(&req.params, "user_id")?;
    let topic_id = get_required_str(&req.params, "topic_id")?;
    to_json(&progress::increment_questions_answered(
        conn,
        user_id,
        &topic_id,
        Utc::now(),
    )?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "progress.list" => handle_list(state, req),
        "progress.get" => handle_get(state, req),
        "progress.update" => handle_update(state, req),
        "progress.increment" => handle_increment(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, result))
}
