use chrono::Utc;
use serde_json::{json, Value};

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db, get_opt_str, get_required_i64, parse_params, to_json};
use crate::ipc::types::{AppState, Request};
use crate::services::responses::{self, ResponsePayload};

fn handle_record(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let payload: ResponsePayload = parse_params(&req.params, &[])?;
    to_json(&responses::record_response(conn, payload, Utc::now())?)
}

fn handle_list_for_student(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let user_id = get_required_i64(&req.params, "user_id")?;
    let topic_id = get_opt_str(&req.params, "topic_id")?;
    let rows = responses::list_for_student(conn, user_id, topic_id.as_deref())?;
    Ok(json!({ "responses": to_json(&rows)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "responses.record" => handle_record(state, req),
        "responses.listForStudent" => handle_list_for_student(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, result))
}
