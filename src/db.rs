use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "bytepath.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS topics(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            is_visible INTEGER NOT NULL DEFAULT 1,
            order_index INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_responses(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            topic TEXT NOT NULL,
            subtopic_type TEXT NOT NULL,
            question_code TEXT NOT NULL,
            student_answer TEXT,
            correct_answer TEXT NOT NULL,
            is_correct INTEGER NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('correct', 'incorrect', 'skipped')),
            time_spent INTEGER,
            attempted_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(topic) REFERENCES topics(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_responses_user ON student_responses(user_id, attempted_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_responses_topic ON student_responses(topic)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_progress(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            topic TEXT NOT NULL,
            subtopics_completed INTEGER NOT NULL DEFAULT 0,
            total_subtopics INTEGER NOT NULL DEFAULT 0,
            questions_answered INTEGER NOT NULL DEFAULT 0,
            last_accessed TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(topic) REFERENCES topics(id),
            UNIQUE(user_id, topic)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS upload_history(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            uploaded_at TEXT NOT NULL,
            uploaded_by INTEGER,
            action TEXT NOT NULL,
            added_count INTEGER NOT NULL DEFAULT 0,
            updated_count INTEGER NOT NULL DEFAULT 0,
            removed_count INTEGER NOT NULL DEFAULT 0,
            skipped_count INTEGER NOT NULL DEFAULT 0,
            restored_count INTEGER NOT NULL DEFAULT 0,
            not_found_count INTEGER NOT NULL DEFAULT 0,
            total_count INTEGER NOT NULL DEFAULT 0,
            change_log TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY(uploaded_by) REFERENCES users(id)
        )",
        [],
    )?;
    ensure_upload_history_sha256(conn)?;

    // First-generation roster: email/name/timestamps only. Later columns are
    // added by ensure_roster_columns so existing workspaces upgrade in place.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS roster_students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    ensure_roster_columns(conn)?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_roster_active_email
         ON roster_students(lower(email)) WHERE deleted_at IS NULL",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_roster_email ON roster_students(lower(email))",
        [],
    )?;

    Ok(())
}

fn ensure_roster_columns(conn: &Connection) -> anyhow::Result<()> {
    // The first release declared email UNIQUE on the table itself, which
    // blocks keeping a tombstone next to an active row of the same email.
    if roster_has_table_level_unique_email(conn)? {
        rebuild_roster_without_unique_email(conn)?;
    }
    if !table_has_column(conn, "roster_students", "deleted_at")? {
        conn.execute("ALTER TABLE roster_students ADD COLUMN deleted_at TEXT", [])?;
    }
    if !table_has_column(conn, "roster_students", "notes")? {
        conn.execute("ALTER TABLE roster_students ADD COLUMN notes TEXT", [])?;
    }
    if !table_has_column(conn, "roster_students", "class_name")? {
        conn.execute("ALTER TABLE roster_students ADD COLUMN class_name TEXT", [])?;
    }
    if !table_has_column(conn, "roster_students", "last_updated_via")? {
        conn.execute(
            "ALTER TABLE roster_students ADD COLUMN last_updated_via TEXT",
            [],
        )?;
    }
    if !table_has_column(conn, "roster_students", "last_upload_id")? {
        conn.execute(
            "ALTER TABLE roster_students ADD COLUMN last_upload_id INTEGER REFERENCES upload_history(id)",
            [],
        )?;
    }
    Ok(())
}

fn roster_has_table_level_unique_email(conn: &Connection) -> anyhow::Result<bool> {
    let mut stmt = conn.prepare("PRAGMA index_list(roster_students)")?;
    let indexes = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let unique: i64 = row.get(2)?;
            let origin: String = row.get(3)?;
            Ok((name, unique != 0, origin))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (name, unique, origin) in indexes {
        // origin "u" = created by a UNIQUE constraint in CREATE TABLE.
        if !unique || origin != "u" {
            continue;
        }
        let sql = format!("PRAGMA index_info(\"{}\")", name.replace('"', "\"\""));
        let mut info = conn.prepare(&sql)?;
        let cols = info
            .query_map([], |row| row.get::<_, String>(2))?
            .collect::<Result<Vec<_>, _>>()?;
        if cols == ["email"] {
            return Ok(true);
        }
    }
    Ok(false)
}

fn rebuild_roster_without_unique_email(conn: &Connection) -> anyhow::Result<()> {
    let mut cols = Vec::new();
    for c in [
        "id",
        "email",
        "first_name",
        "last_name",
        "created_at",
        "updated_at",
        "deleted_at",
        "notes",
        "class_name",
        "last_updated_via",
        "last_upload_id",
    ] {
        if table_has_column(conn, "roster_students", c)? {
            cols.push(c);
        }
    }
    let col_list = cols.join(", ");
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "CREATE TABLE roster_students_rebuild(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            notes TEXT,
            class_name TEXT,
            last_updated_via TEXT,
            last_upload_id INTEGER REFERENCES upload_history(id)
        )",
        [],
    )?;
    tx.execute(
        &format!(
            "INSERT INTO roster_students_rebuild({col_list}) SELECT {col_list} FROM roster_students"
        ),
        [],
    )?;
    tx.execute("DROP TABLE roster_students", [])?;
    tx.execute(
        "ALTER TABLE roster_students_rebuild RENAME TO roster_students",
        [],
    )?;
    tx.commit()?;
    Ok(())
}

fn ensure_upload_history_sha256(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "upload_history", "content_sha256")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE upload_history ADD COLUMN content_sha256 TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
