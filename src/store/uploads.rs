use rusqlite::{Connection, OptionalExtension, Row};

use crate::model::{ChangeRecord, UploadAction, UploadCounts, UploadHistory};

const UPLOAD_COLUMNS: &str = "id, filename, uploaded_at, uploaded_by, action, content_sha256, \
     added_count, updated_count, removed_count, skipped_count, restored_count, not_found_count, \
     total_count, change_log";

fn upload_from_row(r: &Row<'_>) -> rusqlite::Result<UploadHistory> {
    let change_log: String = r.get(13)?;
    let changes: Vec<ChangeRecord> = serde_json::from_str(&change_log).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(13, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(UploadHistory {
        id: r.get(0)?,
        filename: r.get(1)?,
        uploaded_at: r.get(2)?,
        uploaded_by: r.get(3)?,
        action: r.get(4)?,
        content_sha256: r.get(5)?,
        summary: UploadCounts {
            added: r.get(6)?,
            updated: r.get(7)?,
            removed: r.get(8)?,
            skipped: r.get(9)?,
            restored: r.get(10)?,
            not_found: r.get(11)?,
            total: r.get(12)?,
        },
        changes,
    })
}

/// Create the audit row up front so applied rows can reference its id.
pub fn create(
    conn: &Connection,
    filename: &str,
    uploaded_by: Option<i64>,
    action: UploadAction,
    content_sha256: &str,
    at: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO upload_history(filename, uploaded_at, uploaded_by, action, content_sha256)
         VALUES(?, ?, ?, ?, ?)",
        (filename, at, uploaded_by, action.as_str(), content_sha256),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn finish(
    conn: &Connection,
    upload_id: i64,
    counts: &UploadCounts,
    changes: &[ChangeRecord],
) -> rusqlite::Result<()> {
    let change_log = serde_json::to_string(changes)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "UPDATE upload_history
         SET added_count = ?, updated_count = ?, removed_count = ?, skipped_count = ?,
             restored_count = ?, not_found_count = ?, total_count = ?, change_log = ?
         WHERE id = ?",
        (
            counts.added,
            counts.updated,
            counts.removed,
            counts.skipped,
            counts.restored,
            counts.not_found,
            counts.total,
            change_log,
            upload_id,
        ),
    )?;
    Ok(())
}

pub fn get_by_id(conn: &Connection, upload_id: i64) -> rusqlite::Result<Option<UploadHistory>> {
    conn.query_row(
        &format!("SELECT {UPLOAD_COLUMNS} FROM upload_history WHERE id = ?"),
        [upload_id],
        upload_from_row,
    )
    .optional()
}

/// Newest first.
pub fn list_page(conn: &Connection, limit: i64, offset: i64) -> rusqlite::Result<(Vec<UploadHistory>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM upload_history", [], |r| r.get(0))?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {UPLOAD_COLUMNS} FROM upload_history
         ORDER BY uploaded_at DESC, id DESC
         LIMIT ? OFFSET ?"
    ))?;
    let rows = stmt.query_map((limit, offset), upload_from_row)?;
    let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((items, total))
}
