mod config;
mod db;
mod error;
mod ipc;
mod model;
mod reports;
mod services;
mod stats;
mod store;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;

const WORKSPACE_ENV: &str = "BYTEPATH_WORKSPACE";

fn init_tracing(config: &Config) {
    let filter = ["BYTEPATH_LOG", "RUST_LOG"]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .or_else(|| EnvFilter::try_new(&config.log_filter).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() {
    let workspace = std::env::var_os(WORKSPACE_ENV).map(PathBuf::from);
    let (config, config_err) = match workspace.as_deref().map(Config::load) {
        Some(Ok(cfg)) => (cfg, None),
        Some(Err(e)) => (Config::from_env(), Some(e)),
        None => (Config::from_env(), None),
    };
    init_tracing(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "bytepathd starting");
    if let Some(e) = config_err {
        warn!(error = %format!("{e:#}"), "workspace config ignored, using defaults");
    }

    let mut state = ipc::AppState::new(config);
    if let Some(path) = workspace {
        if let Err(e) = ipc::open_workspace(&mut state, &path) {
            error!(workspace = %path.display(), error = %format!("{e:#}"), "failed to open workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => ipc::bad_json(e),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed, shutting down");
}
