use serde_json::{json, Value};

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db, get_opt_bool, get_opt_str, get_required_str, parse_params, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::services::topics::{self, NewTopic, TopicPatch};

fn handle_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let role = match get_opt_str(&req.params, "role")? {
        None => Role::Student,
        Some(raw) => Role::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params("role must be student or instructor"))?,
    };
    let topics = topics::list_topics(conn, role)?;
    Ok(json!({ "topics": to_json(&topics)? }))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let topic_id = get_required_str(&req.params, "topic_id")?;
    to_json(&topics::get_topic(conn, &topic_id)?)
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let new: NewTopic = parse_params(&req.params, &[])?;
    to_json(&topics::create_topic(conn, &new)?)
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let topic_id = get_required_str(&req.params, "topic_id")?;
    let patch: TopicPatch = parse_params(&req.params, &["topic_id"])?;
    to_json(&topics::update_topic(conn, &topic_id, &patch)?)
}

fn handle_set_visibility(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let topic_id = get_required_str(&req.params, "topic_id")?;
    let is_visible = get_opt_bool(&req.params, "is_visible")?
        .ok_or_else(|| HandlerErr::bad_params("missing params.is_visible"))?;
    to_json(&topics::set_visibility(conn, &topic_id, is_visible)?)
}

fn handle_seed_defaults(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let summary = topics::seed_defaults(conn)?;
    Ok(json!({
        "inserted": summary.inserted,
        "refreshed": summary.refreshed,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "topics.list" => handle_list(state, req),
        "topics.get" => handle_get(state, req),
        "topics.create" => handle_create(state, req),
        "topics.update" => handle_update(state, req),
        "topics.setVisibility" => handle_set_visibility(state, req),
        "topics.seedDefaults" => handle_seed_defaults(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, result))
}
