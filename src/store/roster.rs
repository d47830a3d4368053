use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};

use crate::model::{RosterStudent, UpdateSource};

const ROSTER_COLUMNS: &str = "id, email, first_name, last_name, created_at, updated_at, deleted_at, \
     notes, class_name, last_updated_via, last_upload_id";

/// Sub-select of student user ids whose email is on the active roster.
pub const ROSTERED_USER_IDS_SQL: &str = "SELECT u.id FROM users u
     JOIN roster_students r ON lower(r.email) = lower(u.email)
     WHERE r.deleted_at IS NULL AND u.role = 'student'";

fn roster_from_row(r: &Row<'_>) -> rusqlite::Result<RosterStudent> {
    Ok(RosterStudent {
        id: r.get(0)?,
        email: r.get(1)?,
        first_name: r.get(2)?,
        last_name: r.get(3)?,
        created_at: r.get(4)?,
        updated_at: r.get(5)?,
        deleted_at: r.get(6)?,
        notes: r.get(7)?,
        class_name: r.get(8)?,
        last_updated_via: r.get(9)?,
        last_upload_id: r.get(10)?,
    })
}

pub fn get_by_id(conn: &Connection, roster_id: i64) -> rusqlite::Result<Option<RosterStudent>> {
    conn.query_row(
        &format!("SELECT {ROSTER_COLUMNS} FROM roster_students WHERE id = ?"),
        [roster_id],
        roster_from_row,
    )
    .optional()
}

pub fn find_active_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<RosterStudent>> {
    conn.query_row(
        &format!(
            "SELECT {ROSTER_COLUMNS} FROM roster_students
             WHERE lower(email) = lower(?) AND deleted_at IS NULL"
        ),
        [email],
        roster_from_row,
    )
    .optional()
}

/// Most recently deleted tombstone for an email.
pub fn find_deleted_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<RosterStudent>> {
    conn.query_row(
        &format!(
            "SELECT {ROSTER_COLUMNS} FROM roster_students
             WHERE lower(email) = lower(?) AND deleted_at IS NOT NULL
             ORDER BY deleted_at DESC, id DESC
             LIMIT 1"
        ),
        [email],
        roster_from_row,
    )
    .optional()
}

/// True when the user's email has an active roster row, whatever the role.
pub fn is_user_rostered(conn: &Connection, user_id: i64) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM users u
             JOIN roster_students r ON lower(r.email) = lower(u.email)
             WHERE u.id = ? AND r.deleted_at IS NULL
             LIMIT 1",
            [user_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub fn list_active(conn: &Connection) -> rusqlite::Result<Vec<RosterStudent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ROSTER_COLUMNS} FROM roster_students
         WHERE deleted_at IS NULL
         ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE, id"
    ))?;
    let rows = stmt.query_map([], roster_from_row)?;
    rows.collect()
}

pub fn count_active(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM roster_students WHERE deleted_at IS NULL",
        [],
        |r| r.get(0),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    UpdatedAt,
    LastName,
    FirstName,
    Email,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(SortKey::CreatedAt),
            "updated_at" => Some(SortKey::UpdatedAt),
            "last_name" => Some(SortKey::LastName),
            "first_name" => Some(SortKey::FirstName),
            "email" => Some(SortKey::Email),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
            SortKey::LastName => "last_name COLLATE NOCASE",
            SortKey::FirstName => "first_name COLLATE NOCASE",
            SortKey::Email => "lower(email)",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListFilter {
    pub search: Option<String>,
    pub include_deleted: bool,
    pub class_name: Option<String>,
    pub sort: SortKey,
    pub descending: bool,
    pub limit: i64,
    pub offset: i64,
}

/// One page of roster rows plus the total matching count.
pub fn list_page(conn: &Connection, f: &ListFilter) -> rusqlite::Result<(Vec<RosterStudent>, i64)> {
    let mut where_sql = String::from(" WHERE 1 = 1");
    let mut binds: Vec<Value> = Vec::new();
    if !f.include_deleted {
        where_sql.push_str(" AND deleted_at IS NULL");
    }
    if let Some(search) = f.search.as_deref() {
        let like = format!("%{}%", search.to_lowercase());
        where_sql.push_str(
            " AND (lower(first_name) LIKE ? OR lower(last_name) LIKE ? OR lower(email) LIKE ?)",
        );
        for _ in 0..3 {
            binds.push(Value::Text(like.clone()));
        }
    }
    if let Some(class_name) = f.class_name.as_deref() {
        where_sql.push_str(" AND class_name = ?");
        binds.push(Value::Text(class_name.to_string()));
    }

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM roster_students{where_sql}"),
        params_from_iter(binds.iter()),
        |r| r.get(0),
    )?;

    let dir = if f.descending { "DESC" } else { "ASC" };
    let sql = format!(
        "SELECT {ROSTER_COLUMNS} FROM roster_students{where_sql}
         ORDER BY {} {dir}, id {dir}
         LIMIT ? OFFSET ?",
        f.sort.column()
    );
    binds.push(Value::Integer(f.limit));
    binds.push(Value::Integer(f.offset));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(binds.iter()), roster_from_row)?;
    let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((items, total))
}

pub struct NewRosterStudent<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub notes: Option<&'a str>,
    pub class_name: Option<&'a str>,
    pub via: UpdateSource,
    pub upload_id: Option<i64>,
}

pub fn insert(conn: &Connection, s: &NewRosterStudent<'_>, at: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO roster_students(
            email, first_name, last_name, created_at, updated_at,
            notes, class_name, last_updated_via, last_upload_id)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            s.email,
            s.first_name,
            s.last_name,
            at,
            at,
            s.notes,
            s.class_name,
            s.via.as_str(),
            s.upload_id,
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrite names and clear any tombstone. Used by restore and sync.
pub fn reactivate_with_names(
    conn: &Connection,
    roster_id: i64,
    first_name: &str,
    last_name: &str,
    via: UpdateSource,
    upload_id: Option<i64>,
    at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE roster_students
         SET first_name = ?, last_name = ?, deleted_at = NULL, updated_at = ?,
             last_updated_via = ?, last_upload_id = COALESCE(?, last_upload_id)
         WHERE id = ?",
        (first_name, last_name, at, via.as_str(), upload_id, roster_id),
    )?;
    Ok(())
}

pub fn soft_delete(
    conn: &Connection,
    roster_id: i64,
    via: UpdateSource,
    upload_id: Option<i64>,
    at: &str,
) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "UPDATE roster_students
         SET deleted_at = ?, updated_at = ?, last_updated_via = ?,
             last_upload_id = COALESCE(?, last_upload_id)
         WHERE id = ? AND deleted_at IS NULL",
        (at, at, via.as_str(), upload_id, roster_id),
    )?;
    Ok(n > 0)
}

pub fn hard_delete(conn: &Connection, roster_id: i64) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM roster_students WHERE id = ?", [roster_id])? > 0)
}

pub fn restore(conn: &Connection, roster_id: i64, via: UpdateSource, at: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE roster_students
         SET deleted_at = NULL, updated_at = ?, last_updated_via = ?
         WHERE id = ?",
        (at, via.as_str(), roster_id),
    )?;
    Ok(())
}

/// Persist every editable field of a row.
pub fn save(conn: &Connection, s: &RosterStudent) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE roster_students
         SET email = ?, first_name = ?, last_name = ?, notes = ?, class_name = ?,
             updated_at = ?, last_updated_via = ?
         WHERE id = ?",
        (
            &s.email,
            &s.first_name,
            &s.last_name,
            &s.notes,
            &s.class_name,
            &s.updated_at,
            s.last_updated_via.map(|v| v.as_str()),
            s.id,
        ),
    )?;
    Ok(())
}
