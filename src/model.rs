use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Canonical timestamp text stored in every `*_at` column.
pub fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Lowercase and trim. All email comparisons go through this.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Instructor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "instructor" => Some(Role::Instructor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub is_visible: bool,
    pub order_index: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Correct,
    Incorrect,
    Skipped,
}

impl ResponseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseStatus::Correct => "correct",
            ResponseStatus::Incorrect => "incorrect",
            ResponseStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "correct" => Some(ResponseStatus::Correct),
            "incorrect" => Some(ResponseStatus::Incorrect),
            "skipped" => Some(ResponseStatus::Skipped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentResponse {
    pub id: i64,
    pub user_id: i64,
    pub topic: String,
    pub subtopic_type: String,
    pub question_code: String,
    pub student_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub status: ResponseStatus,
    pub time_spent: Option<i64>,
    pub attempted_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentProgress {
    pub id: i64,
    pub user_id: i64,
    pub topic: String,
    pub subtopics_completed: i64,
    pub total_subtopics: i64,
    pub questions_answered: i64,
    pub last_accessed: String,
}

impl StudentProgress {
    /// Not persisted; 0 when total_subtopics is 0.
    pub fn completion_percentage(&self) -> f64 {
        crate::stats::completion_percentage(self.subtopics_completed, self.total_subtopics)
    }

    pub fn is_complete(&self) -> bool {
        self.total_subtopics > 0 && self.subtopics_completed >= self.total_subtopics
    }
}

/// How a roster row was last touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    CsvAdd,
    CsvDrop,
    CsvSync,
    Inline,
    Manual,
}

impl UpdateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateSource::CsvAdd => "csv_add",
            UpdateSource::CsvDrop => "csv_drop",
            UpdateSource::CsvSync => "csv_sync",
            UpdateSource::Inline => "inline",
            UpdateSource::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "csv_add" => Some(UpdateSource::CsvAdd),
            "csv_drop" => Some(UpdateSource::CsvDrop),
            "csv_sync" => Some(UpdateSource::CsvSync),
            "inline" => Some(UpdateSource::Inline),
            "manual" => Some(UpdateSource::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterStudent {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
    pub notes: Option<String>,
    pub class_name: Option<String>,
    pub last_updated_via: Option<UpdateSource>,
    pub last_upload_id: Option<i64>,
}

impl RosterStudent {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadAction {
    Add,
    Drop,
    Sync,
}

impl UploadAction {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadAction::Add => "add",
            UploadAction::Drop => "drop",
            UploadAction::Sync => "sync",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(UploadAction::Add),
            "drop" => Some(UploadAction::Drop),
            "sync" => Some(UploadAction::Sync),
            _ => None,
        }
    }

    pub fn update_source(self) -> UpdateSource {
        match self {
            UploadAction::Add => UpdateSource::CsvAdd,
            UploadAction::Drop => UpdateSource::CsvDrop,
            UploadAction::Sync => UpdateSource::CsvSync,
        }
    }
}

/// Per-row classification of a CSV upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    Added,
    Updated,
    Restored,
    Removed,
    NotFound,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCounts {
    pub added: i64,
    pub updated: i64,
    pub removed: i64,
    pub skipped: i64,
    pub restored: i64,
    pub not_found: i64,
    pub total: i64,
}

impl UploadCounts {
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Added => self.added += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Restored => self.restored += 1,
            RowOutcome::Removed => self.removed += 1,
            RowOutcome::NotFound => self.not_found += 1,
            RowOutcome::Skipped => self.skipped += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub line: usize,
    #[serde(rename = "type")]
    pub outcome: RowOutcome,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roster_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadHistory {
    pub id: i64,
    pub filename: String,
    pub uploaded_at: String,
    pub uploaded_by: Option<i64>,
    pub action: UploadAction,
    pub content_sha256: String,
    pub summary: UploadCounts,
    pub changes: Vec<ChangeRecord>,
}
