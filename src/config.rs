//! Daemon configuration.
//!
//! Read from `bytepath.toml` in the workspace directory, then overridden by
//! environment variables. Every key has a default so an absent file is fine.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "bytepath.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// tracing filter used when neither BYTEPATH_LOG nor RUST_LOG is set.
    pub log_filter: String,
    pub auth: AuthConfig,
    pub roster: RosterConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Emails assigned (or promoted to) the instructor role at login.
    pub instructor_emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            auth: AuthConfig::default(),
            roster: RosterConfig::default(),
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl Config {
    /// Load `bytepath.toml` from the workspace (defaults when missing) and
    /// apply environment overrides.
    pub fn load(workspace: &Path) -> anyhow::Result<Self> {
        let path = workspace.join(CONFIG_FILE_NAME);
        let mut cfg = if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
            Self::from_toml_str(&text)
                .with_context(|| format!("invalid config {}", path.to_string_lossy()))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let mut cfg: Config = toml::from_str(text)?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Defaults plus environment overrides; used before a workspace is chosen.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var("BYTEPATH_INSTRUCTOR_EMAILS") {
            self.auth.instructor_emails = raw
                .split(',')
                .map(|s| s.to_string())
                .collect();
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        let mut emails = self
            .auth
            .instructor_emails
            .iter()
            .map(|e| e.trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect::<Vec<_>>();
        emails.sort();
        emails.dedup();
        self.auth.instructor_emails = emails;

        if self.roster.max_page_size == 0 {
            self.roster.max_page_size = RosterConfig::default().max_page_size;
        }
        self.roster.default_page_size = self
            .roster
            .default_page_size
            .clamp(1, self.roster.max_page_size);
    }

    pub fn is_instructor_email(&self, email: &str) -> bool {
        let key = email.trim().to_ascii_lowercase();
        self.auth.instructor_emails.iter().any(|e| *e == key)
    }
}
