use rusqlite::{Connection, OptionalExtension, Row};

use crate::model::{now_ts, Role, User};

const USER_COLUMNS: &str = "id, email, name, role, created_at";

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        email: r.get(1)?,
        name: r.get(2)?,
        role: r.get(3)?,
        created_at: r.get(4)?,
    })
}

pub fn get_by_id(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
        [user_id],
        user_from_row,
    )
    .optional()
}

/// Case-insensitive lookup.
pub fn get_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower(?) ORDER BY id LIMIT 1"),
        [email.trim()],
        user_from_row,
    )
    .optional()
}

pub fn exists(conn: &Connection, user_id: i64) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

pub fn create_user(conn: &Connection, email: &str, name: &str, role: Role) -> rusqlite::Result<User> {
    let created_at = now_ts();
    conn.execute(
        "INSERT INTO users(email, name, role, created_at) VALUES(?, ?, ?, ?)",
        (email, name, role.as_str(), &created_at),
    )?;
    Ok(User {
        id: conn.last_insert_rowid(),
        email: email.to_string(),
        name: name.to_string(),
        role,
        created_at,
    })
}

pub fn set_role(conn: &Connection, user_id: i64, role: Role) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET role = ? WHERE id = ?",
        (role.as_str(), user_id),
    )?;
    Ok(())
}

pub fn set_name(conn: &Connection, user_id: i64, name: &str) -> rusqlite::Result<()> {
    conn.execute("UPDATE users SET name = ? WHERE id = ?", (name, user_id))?;
    Ok(())
}

pub fn create_session(conn: &Connection, token: &str, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sessions(token, user_id, created_at) VALUES(?, ?, ?)",
        (token, user_id, now_ts()),
    )?;
    Ok(())
}

pub fn get_session_user(conn: &Connection, token: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT u.id, u.email, u.name, u.role, u.created_at
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?",
        [token],
        user_from_row,
    )
    .optional()
}

pub fn delete_session(conn: &Connection, token: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM sessions WHERE token = ?", [token])? > 0)
}

pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.collect()
}
