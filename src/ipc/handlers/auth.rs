use serde_json::{json, Value};

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db, get_required_i64, get_required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::services::auth;

fn handle_login(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let email = get_required_str(&req.params, "email")?;
    let out = auth::login_or_register(conn, &state.config, &email)?;
    Ok(json!({
        "user": to_json(&out.user)?,
        "session_token": out.session_token,
        "created": out.created,
    }))
}

fn handle_profile(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let token = get_required_str(&req.params, "session_token")?;
    to_json(&auth::profile(conn, &token)?)
}

fn handle_logout(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let token = get_required_str(&req.params, "session_token")?;
    Ok(json!({ "logged_out": auth::logout(conn, &token)? }))
}

fn handle_user_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let user_id = get_required_i64(&req.params, "user_id")?;
    to_json(&auth::get_user(conn, user_id)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "auth.login" => handle_login(state, req),
        "auth.profile" => handle_profile(state, req),
        "auth.logout" => handle_logout(state, req),
        "users.get" => handle_user_get(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, result))
}
