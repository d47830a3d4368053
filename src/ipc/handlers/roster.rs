use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    db, get_opt_bool, get_opt_i64, get_opt_str, get_required_i64, parse_params, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::model::UploadAction;
use crate::services::roster::{
    self, ListParams, NewRosterInput, RosterPatch, UploadRequest, TEMPLATE_FILE_NAME,
};

fn io_err(path: &Path, e: std::io::Error) -> HandlerErr {
    HandlerErr::new("io_failed", e.to_string())
        .with_details(json!({ "path": path.to_string_lossy() }))
}

fn write_text_file(path: &Path, contents: &str) -> Result<(), HandlerErr> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
    }
    std::fs::write(path, contents).map_err(|e| io_err(path, e))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let params: ListParams = parse_params(&req.params, &[])?;
    to_json(&roster::list_roster(conn, &state.config, &params)?)
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let roster_id = get_required_i64(&req.params, "roster_id")?;
    to_json(&roster::get_roster(conn, roster_id)?)
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let input: NewRosterInput = parse_params(&req.params, &[])?;
    to_json(&roster::create_roster(conn, &input, Utc::now())?)
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let roster_id = get_required_i64(&req.params, "roster_id")?;
    let patch: RosterPatch = parse_params(&req.params, &["roster_id"])?;
    to_json(&roster::update_roster(conn, roster_id, &patch, Utc::now())?)
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let roster_id = get_required_i64(&req.params, "roster_id")?;
    let hard = get_opt_bool(&req.params, "hard")?.unwrap_or(false);
    to_json(&roster::delete_roster(conn, roster_id, hard, Utc::now())?)
}

fn handle_restore(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let roster_id = get_required_i64(&req.params, "roster_id")?;
    to_json(&roster::restore_roster(conn, roster_id, Utc::now())?)
}

fn handle_bulk_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let ids = req
        .params
        .get("roster_ids")
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerErr::bad_params("missing params.roster_ids"))?
        .iter()
        .map(|v| {
            v.as_i64()
                .ok_or_else(|| HandlerErr::bad_params("params.roster_ids must hold integers"))
        })
        .collect::<Result<Vec<i64>, _>>()?;
    let hard = get_opt_bool(&req.params, "hard")?.unwrap_or(false);
    let deleted = roster::bulk_delete(conn, &ids, hard, Utc::now())?;
    Ok(json!({ "requested": ids.len(), "deleted": deleted, "hard": hard }))
}

/// CSV body comes either inline as `csv_text` or from a file at `in_path`.
fn upload_source(params: &Value) -> Result<(String, String), HandlerErr> {
    let filename = get_opt_str(params, "filename")?;
    if let Some(text) = get_opt_str(params, "csv_text")? {
        return Ok((text, filename.unwrap_or_else(|| "upload.csv".to_string())));
    }
    let Some(in_path) = get_opt_str(params, "in_path")? else {
        return Err(HandlerErr::bad_params("missing params.csv_text or params.in_path"));
    };
    let path = PathBuf::from(&in_path);
    let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let filename = filename.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.csv".to_string())
    });
    Ok((text, filename))
}

fn handle_upload(
    state: &mut AppState,
    req: &Request,
    action: UploadAction,
) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let (csv_text, filename) = upload_source(&req.params)?;
    let uploaded_by = get_opt_i64(&req.params, "uploaded_by")?;
    let result = roster::apply_upload(
        conn,
        &UploadRequest {
            action,
            csv_text: &csv_text,
            filename: &filename,
            uploaded_by,
        },
        Utc::now(),
    )?;
    to_json(&result)
}

fn handle_template(_state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let content = roster::template_csv();
    let mut out = json!({
        "filename": TEMPLATE_FILE_NAME,
        "content": content,
    });
    if let Some(out_path) = get_opt_str(&req.params, "out_path")? {
        let path = PathBuf::from(&out_path);
        write_text_file(&path, content)?;
        out["path"] = json!(out_path);
    }
    Ok(out)
}

fn handle_uploads_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let page = get_opt_i64(&req.params, "page")?;
    let per_page = get_opt_i64(&req.params, "per_page")?;
    to_json(&roster::list_uploads(conn, &state.config, page, per_page)?)
}

fn handle_uploads_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db(state)?;
    let upload_id = get_required_i64(&req.params, "upload_id")?;
    to_json(&roster::get_upload(conn, upload_id)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "roster.list" => handle_list(state, req),
        "roster.get" => handle_get(state, req),
        "roster.create" => handle_create(state, req),
        "roster.update" => handle_update(state, req),
        "roster.delete" => handle_delete(state, req),
        "roster.restore" => handle_restore(state, req),
        "roster.bulkDelete" => handle_bulk_delete(state, req),
        "roster.add" => handle_upload(state, req, UploadAction::Add),
        "roster.drop" => handle_upload(state, req, UploadAction::Drop),
        "roster.sync" => handle_upload(state, req, UploadAction::Sync),
        "roster.template" => handle_template(state, req),
        "roster.uploads.list" => handle_uploads_list(state, req),
        "roster.uploads.get" => handle_uploads_get(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_csv_wins_over_path() {
        let p = json!({ "csv_text": "a", "in_path": "/nope.csv" });
        let (text, name) = upload_source(&p).expect("source");
        assert_eq!(text, "a");
        assert_eq!(name, "upload.csv");
    }

    #[test]
    fn unreadable_path_is_io_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.csv");
        let p = json!({ "in_path": missing.to_string_lossy() });
        let e = upload_source(&p).expect_err("missing file");
        assert_eq!(e.code, "io_failed");
        assert!(e.details.is_some());
    }

    #[test]
    fn path_source_uses_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("period3.csv");
        std::fs::write(&path, "first_name,last_name,email\n").expect("write");
        let p = json!({ "in_path": path.to_string_lossy() });
        let (_, name) = upload_source(&p).expect("source");
        assert_eq!(name, "period3.csv");
    }
}
