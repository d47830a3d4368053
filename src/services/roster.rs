//! Roster management and CSV reconciliation.
//!
//! Uploads are parsed and validated up front; the per-row apply then runs in
//! one transaction together with its audit row, so a failing upload leaves
//! neither roster changes nor history behind.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::model::{
    format_ts, normalize_email, ChangeRecord, RosterStudent, RowOutcome, UpdateSource,
    UploadAction, UploadCounts, UploadHistory,
};
use crate::store;
use crate::store::roster::{ListFilter, NewRosterStudent, SortKey};

pub const ROSTER_HEADER: [&str; 3] = ["first_name", "last_name", "email"];

pub const TEMPLATE_FILE_NAME: &str = "students_template.csv";

pub fn template_csv() -> &'static str {
    "first_name,last_name,email\n\
     Ada,Lovelace,ada@example.com\n\
     Alan,Turing,alan@example.com\n"
}

// ---------------------------------------------------------------------------
// CSV parsing

fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    out.push(buf);
    out
}

/// Split CSV text into raw records. Line breaks inside a quoted field stay
/// part of the record.
fn split_csv_records(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    for ch in text.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                buf.push(ch);
            }
            '\n' if !in_quotes => {
                if buf.ends_with('\r') {
                    buf.pop();
                }
                out.push(std::mem::take(&mut buf));
            }
            _ => buf.push(ch),
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
    out
}

/// One data row of an upload. `line` counts data rows from 1, skipping
/// blank lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub line: usize,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl CsvRow {
    fn problem(&self) -> Option<String> {
        let missing = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k)
        .collect::<Vec<_>>();
        if missing.is_empty() {
            None
        } else {
            Some(format!("missing {}", missing.join(", ")))
        }
    }
}

pub fn parse_roster_csv(text: &str) -> ServiceResult<Vec<CsvRow>> {
    let text = text.trim_start_matches('\u{feff}');
    let records = split_csv_records(text);
    let mut lines = records.iter().map(String::as_str).filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Err(ServiceError::validation(format!(
            "CSV is empty; expected header {}",
            ROSTER_HEADER.join(",")
        )));
    };

    let mut idx = HashMap::<String, usize>::new();
    for (i, name) in parse_csv_record(header).into_iter().enumerate() {
        idx.entry(name.trim().to_ascii_lowercase()).or_insert(i);
    }
    let missing = ROSTER_HEADER
        .iter()
        .filter(|c| !idx.contains_key(**c))
        .copied()
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ServiceError::validation(format!(
            "CSV header is missing column(s): {}",
            missing.join(", ")
        )));
    }
    let (first_col, last_col, email_col) = (idx["first_name"], idx["last_name"], idx["email"]);

    Ok(lines
        .enumerate()
        .map(|(i, raw)| {
            let fields = parse_csv_record(raw);
            let field = |col: usize| fields.get(col).map(|s| s.trim().to_string()).unwrap_or_default();
            CsvRow {
                line: i + 1,
                first_name: field(first_col),
                last_name: field(last_col),
                email: normalize_email(&field(email_col)),
            }
        })
        .collect())
}

pub fn content_sha256(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Uploads

#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub action: UploadAction,
    pub csv_text: &'a str,
    pub filename: &'a str,
    pub uploaded_by: Option<i64>,
}

/// Counts reported back for one upload; only the keys meaningful for the
/// action are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_found: Option<i64>,
    pub skipped: i64,
    pub total_processed: i64,
}

impl UploadSummary {
    fn new(action: UploadAction, c: &UploadCounts) -> Self {
        let mut s = UploadSummary {
            added: None,
            updated: None,
            restored: None,
            removed: None,
            not_found: None,
            skipped: c.skipped,
            total_processed: c.total,
        };
        match action {
            UploadAction::Add => {
                s.added = Some(c.added);
                s.restored = Some(c.restored);
            }
            UploadAction::Sync => {
                s.added = Some(c.added);
                s.updated = Some(c.updated);
                s.restored = Some(c.restored);
            }
            UploadAction::Drop => {
                s.removed = Some(c.removed);
                s.not_found = Some(c.not_found);
            }
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub upload_id: i64,
    pub action: UploadAction,
    pub summary: UploadSummary,
    pub errors: Vec<RowError>,
    pub upload_history: UploadHistory,
}

struct Applied {
    outcome: RowOutcome,
    roster_id: Option<i64>,
    reason: Option<String>,
}

impl Applied {
    fn new(outcome: RowOutcome, roster_id: Option<i64>) -> Self {
        Self {
            outcome,
            roster_id,
            reason: None,
        }
    }

    fn skipped(roster_id: Option<i64>, reason: impl Into<String>) -> Self {
        Self {
            outcome: RowOutcome::Skipped,
            roster_id,
            reason: Some(reason.into()),
        }
    }
}

fn apply_row(
    conn: &Connection,
    action: UploadAction,
    row: &CsvRow,
    upload_id: i64,
    at: &str,
) -> rusqlite::Result<Applied> {
    if let Some(problem) = row.problem() {
        return Ok(Applied::skipped(None, problem));
    }
    let via = action.update_source();
    let active = store::roster::find_active_by_email(conn, &row.email)?;

    if action == UploadAction::Drop {
        return Ok(match active {
            Some(existing) => {
                store::roster::soft_delete(conn, existing.id, via, Some(upload_id), at)?;
                Applied::new(RowOutcome::Removed, Some(existing.id))
            }
            None => Applied::new(RowOutcome::NotFound, None),
        });
    }

    if let Some(existing) = active {
        if action == UploadAction::Add {
            return Ok(Applied::skipped(Some(existing.id), "already exists"));
        }
        store::roster::reactivate_with_names(
            conn,
            existing.id,
            &row.first_name,
            &row.last_name,
            via,
            Some(upload_id),
            at,
        )?;
        return Ok(Applied::new(RowOutcome::Updated, Some(existing.id)));
    }

    if let Some(tombstone) = store::roster::find_deleted_by_email(conn, &row.email)? {
        store::roster::reactivate_with_names(
            conn,
            tombstone.id,
            &row.first_name,
            &row.last_name,
            via,
            Some(upload_id),
            at,
        )?;
        return Ok(Applied::new(RowOutcome::Restored, Some(tombstone.id)));
    }

    let id = store::roster::insert(
        conn,
        &NewRosterStudent {
            email: &row.email,
            first_name: &row.first_name,
            last_name: &row.last_name,
            notes: None,
            class_name: None,
            via,
            upload_id: Some(upload_id),
        },
        at,
    )?;
    Ok(Applied::new(RowOutcome::Added, Some(id)))
}

/// Reconcile a roster CSV against the table and record exactly one upload
/// history entry. All-or-nothing.
pub fn apply_upload(
    conn: &Connection,
    req: &UploadRequest<'_>,
    now: DateTime<Utc>,
) -> ServiceResult<UploadResult> {
    let rows = parse_roster_csv(req.csv_text)?;
    let filename = req.filename.trim();
    if filename.is_empty() {
        return Err(ServiceError::validation("filename must not be blank"));
    }
    if let Some(user_id) = req.uploaded_by {
        super::require_user(conn, user_id)?;
    }

    let at = format_ts(now);
    let tx = conn.unchecked_transaction()?;
    let upload_id = store::uploads::create(
        &tx,
        filename,
        req.uploaded_by,
        req.action,
        &content_sha256(req.csv_text),
        &at,
    )?;

    let mut counts = UploadCounts::default();
    let mut changes = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for row in &rows {
        let applied = apply_row(&tx, req.action, row, upload_id, &at)?;
        counts.record(applied.outcome);
        if let Some(reason) = applied.reason.as_ref() {
            errors.push(RowError {
                line: row.line,
                email: Some(row.email.clone()).filter(|e| !e.is_empty()),
                reason: reason.clone(),
            });
        }
        changes.push(ChangeRecord {
            line: row.line,
            outcome: applied.outcome,
            email: row.email.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            roster_id: applied.roster_id,
            reason: applied.reason,
        });
    }
    store::uploads::finish(&tx, upload_id, &counts, &changes)?;
    let history = store::uploads::get_by_id(&tx, upload_id)?
        .ok_or_else(|| ServiceError::not_found(format!("upload {upload_id} not found")))?;
    tx.commit()?;

    info!(
        upload_id,
        action = req.action.as_str(),
        added = counts.added,
        updated = counts.updated,
        restored = counts.restored,
        removed = counts.removed,
        not_found = counts.not_found,
        skipped = counts.skipped,
        "roster upload applied"
    );
    if !errors.is_empty() {
        warn!(upload_id, rows = errors.len(), "roster upload skipped rows");
    }

    Ok(UploadResult {
        upload_id,
        action: req.action,
        summary: UploadSummary::new(req.action, &counts),
        errors,
        upload_history: history,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadPage {
    pub items: Vec<UploadHistory>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

pub fn list_uploads(
    conn: &Connection,
    config: &Config,
    page: Option<i64>,
    per_page: Option<i64>,
) -> ServiceResult<UploadPage> {
    let (page, per_page, offset) = super::page_window(
        page,
        per_page,
        config.roster.default_page_size,
        config.roster.max_page_size,
    );
    let (items, total) = store::uploads::list_page(conn, per_page, offset)?;
    Ok(UploadPage {
        items,
        page,
        per_page,
        total,
        total_pages: super::total_pages(total, per_page),
    })
}

pub fn get_upload(conn: &Connection, upload_id: i64) -> ServiceResult<UploadHistory> {
    store::uploads::get_by_id(conn, upload_id)?
        .ok_or_else(|| ServiceError::not_found(format!("upload {upload_id} not found")))
}

// ---------------------------------------------------------------------------
// Roster rows

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterPage {
    pub items: Vec<RosterStudent>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

pub fn list_roster(conn: &Connection, config: &Config, params: &ListParams) -> ServiceResult<RosterPage> {
    let sort = match params.sort_by.as_deref() {
        None => SortKey::CreatedAt,
        Some(s) => SortKey::parse(s.trim())
            .ok_or_else(|| ServiceError::validation(format!("unsupported sort_by: {s}")))?,
    };
    let descending = match params.sort_order.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
        None => true,
        Some(o) if o == "desc" => true,
        Some(o) if o == "asc" => false,
        Some(o) => return Err(ServiceError::validation(format!("sort_order must be asc or desc: {o}"))),
    };
    let (page, page_size, offset) = super::page_window(
        params.page,
        params.page_size,
        config.roster.default_page_size,
        config.roster.max_page_size,
    );
    let filter = ListFilter {
        search: params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        include_deleted: params.include_deleted,
        class_name: params
            .class_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        sort,
        descending,
        limit: page_size,
        offset,
    };
    let (items, total) = store::roster::list_page(conn, &filter)?;
    Ok(RosterPage {
        items,
        page,
        page_size,
        total,
        total_pages: super::total_pages(total, page_size),
    })
}

pub fn get_roster(conn: &Connection, roster_id: i64) -> ServiceResult<RosterStudent> {
    store::roster::get_by_id(conn, roster_id)?
        .ok_or_else(|| ServiceError::not_found(format!("roster student {roster_id} not found")))
}

fn required_text(value: &str, key: &str) -> ServiceResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ServiceError::validation(format!("{key} must not be blank")));
    }
    Ok(v.to_string())
}

fn required_email(value: &str) -> ServiceResult<String> {
    let email = normalize_email(value);
    if email.is_empty() {
        return Err(ServiceError::validation("email must not be blank"));
    }
    if !email.contains('@') {
        return Err(ServiceError::validation(format!("invalid email: {email}")));
    }
    Ok(email)
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn email_conflict(email: &str) -> ServiceError {
    ServiceError::conflict(format!("an active roster student already uses {email}"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRosterInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
}

pub fn create_roster(
    conn: &Connection,
    input: &NewRosterInput,
    now: DateTime<Utc>,
) -> ServiceResult<RosterStudent> {
    let email = required_email(&input.email)?;
    let first_name = required_text(&input.first_name, "first_name")?;
    let last_name = required_text(&input.last_name, "last_name")?;
    let notes = optional_text(input.notes.as_deref());
    let class_name = optional_text(input.class_name.as_deref());

    if store::roster::find_active_by_email(conn, &email)?.is_some() {
        return Err(email_conflict(&email));
    }
    let inserted = store::roster::insert(
        conn,
        &NewRosterStudent {
            email: &email,
            first_name: &first_name,
            last_name: &last_name,
            notes: notes.as_deref(),
            class_name: class_name.as_deref(),
            via: UpdateSource::Manual,
            upload_id: None,
        },
        &format_ts(now),
    );
    let id = match inserted {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => return Err(email_conflict(&email)),
        Err(e) => return Err(e.into()),
    };
    info!(roster_id = id, "roster student created");
    get_roster(conn, id)
}

/// `null` deserializes to `Some(None)` so a patch can clear a field.
fn nullable<'de, D>(d: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(d).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RosterPatch {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub class_name: Option<Option<String>>,
}

pub fn update_roster(
    conn: &Connection,
    roster_id: i64,
    patch: &RosterPatch,
    now: DateTime<Utc>,
) -> ServiceResult<RosterStudent> {
    let mut student = get_roster(conn, roster_id)?;
    if let Some(email) = patch.email.as_deref() {
        let email = required_email(email)?;
        if student.is_active() {
            if let Some(other) = store::roster::find_active_by_email(conn, &email)? {
                if other.id != student.id {
                    return Err(email_conflict(&email));
                }
            }
        }
        student.email = email;
    }
    if let Some(v) = patch.first_name.as_deref() {
        student.first_name = required_text(v, "first_name")?;
    }
    if let Some(v) = patch.last_name.as_deref() {
        student.last_name = required_text(v, "last_name")?;
    }
    if let Some(v) = patch.notes.as_ref() {
        student.notes = optional_text(v.as_deref());
    }
    if let Some(v) = patch.class_name.as_ref() {
        student.class_name = optional_text(v.as_deref());
    }
    student.updated_at = format_ts(now);
    student.last_updated_via = Some(UpdateSource::Inline);

    match store::roster::save(conn, &student) {
        Ok(()) => {}
        Err(e) if is_unique_violation(&e) => return Err(email_conflict(&student.email)),
        Err(e) => return Err(e.into()),
    }
    info!(roster_id, "roster student updated");
    Ok(student)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub roster_id: i64,
    pub hard: bool,
    pub deleted: bool,
}

pub fn delete_roster(
    conn: &Connection,
    roster_id: i64,
    hard: bool,
    now: DateTime<Utc>,
) -> ServiceResult<DeleteOutcome> {
    get_roster(conn, roster_id)?;
    let deleted = if hard {
        store::roster::hard_delete(conn, roster_id)?
    } else {
        store::roster::soft_delete(conn, roster_id, UpdateSource::Manual, None, &format_ts(now))?
    };
    info!(roster_id, hard, deleted, "roster student deleted");
    Ok(DeleteOutcome {
        roster_id,
        hard,
        deleted,
    })
}

pub fn restore_roster(conn: &Connection, roster_id: i64, now: DateTime<Utc>) -> ServiceResult<RosterStudent> {
    let student = get_roster(conn, roster_id)?;
    if student.is_active() {
        return Ok(student);
    }
    if let Some(other) = store::roster::find_active_by_email(conn, &student.email)? {
        if other.id != student.id {
            return Err(email_conflict(&student.email));
        }
    }
    store::roster::restore(conn, roster_id, UpdateSource::Manual, &format_ts(now))?;
    info!(roster_id, "roster student restored");
    get_roster(conn, roster_id)
}

/// Delete several rows at once; unknown ids are ignored. Returns how many
/// rows changed.
pub fn bulk_delete(
    conn: &Connection,
    roster_ids: &[i64],
    hard: bool,
    now: DateTime<Utc>,
) -> ServiceResult<usize> {
    if roster_ids.is_empty() {
        return Err(ServiceError::validation("roster_ids must not be empty"));
    }
    let at = format_ts(now);
    let tx = conn.unchecked_transaction()?;
    let mut deleted = 0usize;
    for id in roster_ids {
        let changed = if hard {
            store::roster::hard_delete(&tx, *id)?
        } else {
            store::roster::soft_delete(&tx, *id, UpdateSource::Manual, None, &at)?
        };
        if changed {
            deleted += 1;
        }
    }
    tx.commit()?;
    info!(requested = roster_ids.len(), deleted, hard, "roster bulk delete");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;
    use chrono::TimeZone;

    const ADA: &str = "first_name,last_name,email\nAda,Lovelace,ada@example.com\n";

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, day, 9, 0, 0).unwrap()
    }

    fn upload(conn: &Connection, action: UploadAction, csv: &str, day: u32) -> UploadResult {
        apply_upload(
            conn,
            &UploadRequest {
                action,
                csv_text: csv,
                filename: "roster.csv",
                uploaded_by: None,
            },
            at(day),
        )
        .expect("upload")
    }

    fn history_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM upload_history", [], |r| r.get(0))
            .expect("count")
    }

    #[test]
    fn csv_record_handles_quotes() {
        assert_eq!(
            parse_csv_record(r#"a,"b, c","say ""hi""",d"#),
            vec!["a", "b, c", "say \"hi\"", "d"]
        );
        assert_eq!(parse_csv_record(""), vec![""]);
    }

    #[test]
    fn header_is_matched_by_name() {
        let rows = parse_roster_csv(
            "\u{feff}Email , First_Name,last_name\r\n\r\n  ADA@Example.com ,Ada, Lovelace\r\n,Bob,\r\n",
        )
        .expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            CsvRow {
                line: 1,
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
            }
        );
        assert_eq!(rows[1].line, 2);
        assert_eq!(rows[1].problem().as_deref(), Some("missing last_name, email"));
    }

    #[test]
    fn quoted_line_breaks_stay_in_one_row() {
        let rows = parse_roster_csv(
            "first_name,last_name,email\r\n\"Ada\r\nAugusta\",Lovelace,ada@example.com\r\nAlan,Turing,alan@example.com\r\n",
        )
        .expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].first_name, "Ada\r\nAugusta");
        assert_eq!(rows[0].email, "ada@example.com");
        assert_eq!(rows[1].line, 2);
        assert_eq!(rows[1].last_name, "Turing");
    }

    #[test]
    fn only_blank_fields_skip_a_row() {
        let conn = testing::conn();
        let res = upload(
            &conn,
            UploadAction::Add,
            "first_name,last_name,email\nAda,Lovelace,ada\nAlan,,alan@example.com\n",
            1,
        );
        assert_eq!(res.summary.added, Some(1));
        assert_eq!(res.summary.skipped, 1);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].line, 2);
        assert_eq!(res.errors[0].reason, "missing last_name");
        assert_eq!(res.upload_history.changes[0].outcome, RowOutcome::Added);
        assert_eq!(res.upload_history.changes[0].email, "ada");
    }

    #[test]
    fn bad_header_is_rejected_without_history() {
        let conn = testing::conn();
        for csv in ["", "\n\n", "first,last,email\nA,B,a@b.c\n"] {
            let err = apply_upload(
                &conn,
                &UploadRequest {
                    action: UploadAction::Add,
                    csv_text: csv,
                    filename: "x.csv",
                    uploaded_by: None,
                },
                at(1),
            )
            .expect_err("must fail");
            assert!(matches!(err, ServiceError::Validation(_)), "{csv:?}");
        }
        assert_eq!(history_count(&conn), 0);
    }

    #[test]
    fn add_twice_skips_existing() {
        let conn = testing::conn();
        let first = upload(&conn, UploadAction::Add, ADA, 1);
        assert_eq!(first.summary.added, Some(1));
        assert_eq!(first.summary.restored, Some(0));
        assert_eq!(first.summary.skipped, 0);
        assert_eq!(first.summary.total_processed, 1);
        assert!(first.summary.removed.is_none());

        let second = upload(&conn, UploadAction::Add, ADA, 2);
        assert_eq!(second.summary.added, Some(0));
        assert_eq!(second.summary.skipped, 1);
        assert_eq!(second.errors[0].reason, "already exists");
        assert_eq!(second.errors[0].line, 1);
        assert_eq!(history_count(&conn), 2);
    }

    #[test]
    fn duplicate_email_within_one_batch_is_skipped() {
        let conn = testing::conn();
        let res = upload(
            &conn,
            UploadAction::Add,
            "first_name,last_name,email\nAda,Lovelace,ada@example.com\nAda,L,ADA@example.com\n",
            1,
        );
        assert_eq!(res.summary.added, Some(1));
        assert_eq!(res.summary.skipped, 1);
        assert_eq!(res.upload_history.changes[1].outcome, RowOutcome::Skipped);
    }

    #[test]
    fn drop_then_add_restores_same_row() {
        let conn = testing::conn();
        let added = upload(&conn, UploadAction::Add, ADA, 1);
        let id = added.upload_history.changes[0].roster_id.expect("id");

        let dropped = upload(&conn, UploadAction::Drop, ADA, 2);
        assert_eq!(dropped.summary.removed, Some(1));
        assert_eq!(dropped.summary.not_found, Some(0));
        let row = get_roster(&conn, id).expect("row");
        assert!(!row.is_active());
        assert_eq!(row.last_updated_via, Some(UpdateSource::CsvDrop));

        let readded = upload(
            &conn,
            UploadAction::Add,
            "first_name,last_name,email\nAugusta,King,ada@example.com\n",
            3,
        );
        assert_eq!(readded.summary.restored, Some(1));
        assert_eq!(readded.summary.added, Some(0));
        let row = get_roster(&conn, id).expect("row");
        assert!(row.is_active());
        assert_eq!(row.first_name, "Augusta");
        assert_eq!(row.last_updated_via, Some(UpdateSource::CsvAdd));
        assert_eq!(row.last_upload_id, Some(readded.upload_id));
    }

    #[test]
    fn drop_unknown_email_is_not_found() {
        let conn = testing::conn();
        let res = upload(
            &conn,
            UploadAction::Drop,
            "first_name,last_name,email\nNo,One,nobody@example.com\n,,\n",
            1,
        );
        assert_eq!(res.summary.not_found, Some(1));
        assert_eq!(res.summary.skipped, 1);
        assert_eq!(res.summary.total_processed, 2);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.upload_history.summary.not_found, 1);
    }

    #[test]
    fn sync_overwrites_active_names() {
        let conn = testing::conn();
        upload(&conn, UploadAction::Add, ADA, 1);
        let res = upload(
            &conn,
            UploadAction::Sync,
            "first_name,last_name,email\nAda,King,ada@example.com\nAlan,Turing,alan@example.com\n",
            2,
        );
        assert_eq!(res.summary.updated, Some(1));
        assert_eq!(res.summary.added, Some(1));
        let page = list_roster(&conn, &Config::default(), &ListParams::default()).expect("list");
        assert_eq!(page.total, 2);
        assert!(page
            .items
            .iter()
            .all(|s| s.last_updated_via == Some(UpdateSource::CsvSync)));
    }

    #[test]
    fn history_records_hash_and_changes() {
        let conn = testing::conn();
        let res = upload(&conn, UploadAction::Add, ADA, 1);
        let h = get_upload(&conn, res.upload_id).expect("history");
        assert_eq!(h.content_sha256, content_sha256(ADA));
        assert_eq!(h.content_sha256.len(), 64);
        assert_eq!(h.changes.len(), 1);
        assert_eq!(h.action, UploadAction::Add);
        let page = list_uploads(&conn, &Config::default(), None, None).expect("list");
        assert_eq!(page.total, 1);
    }

    #[test]
    fn manual_create_conflicts_with_active_email() {
        let conn = testing::conn();
        let input = NewRosterInput {
            email: " Ada@Example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            notes: Some("  ".into()),
            class_name: Some("CS1".into()),
        };
        let s = create_roster(&conn, &input, at(1)).expect("create");
        assert_eq!(s.email, "ada@example.com");
        assert_eq!(s.notes, None);
        assert_eq!(s.last_updated_via, Some(UpdateSource::Manual));
        assert!(matches!(
            create_roster(&conn, &input, at(2)),
            Err(ServiceError::Conflict(_))
        ));

        delete_roster(&conn, s.id, false, at(3)).expect("soft delete");
        let again = create_roster(&conn, &input, at(4)).expect("create beside tombstone");
        assert!(matches!(
            restore_roster(&conn, s.id, at(5)),
            Err(ServiceError::Conflict(_))
        ));
        delete_roster(&conn, again.id, true, at(6)).expect("hard delete");
        assert!(restore_roster(&conn, s.id, at(7)).expect("restore").is_active());
    }

    #[test]
    fn patch_can_clear_nullable_fields() {
        let conn = testing::conn();
        let s = create_roster(
            &conn,
            &NewRosterInput {
                email: "a@x.edu".into(),
                first_name: "A".into(),
                last_name: "B".into(),
                notes: Some("note".into()),
                class_name: Some("CS1".into()),
            },
            at(1),
        )
        .expect("create");

        let patch: RosterPatch =
            serde_json::from_value(serde_json::json!({ "notes": null, "last_name": "C" }))
                .expect("patch");
        let updated = update_roster(&conn, s.id, &patch, at(2)).expect("update");
        assert_eq!(updated.notes, None);
        assert_eq!(updated.class_name.as_deref(), Some("CS1"));
        assert_eq!(updated.last_name, "C");
        assert_eq!(updated.last_updated_via, Some(UpdateSource::Inline));

        let blank: RosterPatch =
            serde_json::from_value(serde_json::json!({ "first_name": " " })).expect("patch");
        assert!(matches!(
            update_roster(&conn, s.id, &blank, at(3)),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn list_filters_and_paginates() {
        let conn = testing::conn();
        upload(
            &conn,
            UploadAction::Add,
            "first_name,last_name,email\nAda,Lovelace,ada@x.edu\nAlan,Turing,alan@x.edu\nGrace,Hopper,grace@x.edu\n",
            1,
        );
        upload(&conn, UploadAction::Drop, "first_name,last_name,email\nAlan,Turing,alan@x.edu\n", 2);
        let cfg = Config::default();

        let active = list_roster(&conn, &cfg, &ListParams::default()).expect("list");
        assert_eq!(active.total, 2);

        let all = list_roster(
            &conn,
            &cfg,
            &ListParams {
                include_deleted: true,
                sort_by: Some("last_name".into()),
                sort_order: Some("asc".into()),
                page_size: Some(2),
                ..ListParams::default()
            },
        )
        .expect("list");
        assert_eq!(all.total, 3);
        assert_eq!(all.total_pages, 2);
        assert_eq!(all.items[0].last_name, "Hopper");
        assert_eq!(all.items[1].last_name, "Lovelace");

        let search = list_roster(
            &conn,
            &cfg,
            &ListParams {
                search: Some("HOP".into()),
                ..ListParams::default()
            },
        )
        .expect("search");
        assert_eq!(search.total, 1);

        assert!(list_roster(
            &conn,
            &cfg,
            &ListParams {
                sort_by: Some("shoe_size".into()),
                ..ListParams::default()
            },
        )
        .is_err());
    }

    #[test]
    fn bulk_delete_counts_changed_rows() {
        let conn = testing::conn();
        let res = upload(
            &conn,
            UploadAction::Add,
            "first_name,last_name,email\nA,A,a@x.edu\nB,B,b@x.edu\n",
            1,
        );
        let ids = res
            .upload_history
            .changes
            .iter()
            .filter_map(|c| c.roster_id)
            .collect::<Vec<_>>();
        assert_eq!(bulk_delete(&conn, &[ids[0], ids[1], 999], false, at(2)).expect("bulk"), 2);
        assert_eq!(bulk_delete(&conn, &ids, false, at(3)).expect("bulk again"), 0);
        assert_eq!(bulk_delete(&conn, &ids, true, at(4)).expect("hard"), 2);
    }

    #[test]
    fn unknown_uploader_is_not_found() {
        let conn = testing::conn();
        let err = apply_upload(
            &conn,
            &UploadRequest {
                action: UploadAction::Add,
                csv_text: ADA,
                filename: "x.csv",
                uploaded_by: Some(42),
            },
            at(1),
        )
        .expect_err("fail");
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
