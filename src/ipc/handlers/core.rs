use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};

fn handle_health(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspace_path": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
    }))
}

/// Open (or create) the workspace database and load its config. The state
/// is only replaced once both succeed.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let config = Config::load(path).context("failed to load workspace config")?;
    let conn = db::open_db(path)?;
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    state.config = config;
    info!(workspace = %path.display(), "workspace selected");
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let path = PathBuf::from(get_required_str(&req.params, "path")?);
    open_workspace(state, &path).map_err(|e| {
        HandlerErr::new("db_open_failed", format!("{e:#}"))
            .with_details(json!({ "path": path.to_string_lossy() }))
    })?;
    Ok(json!({ "workspace_path": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, result))
}
