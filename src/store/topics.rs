use rusqlite::{Connection, OptionalExtension, Row};

use crate::model::{now_ts, Topic};

const TOPIC_COLUMNS: &str = "id, name, is_visible, order_index, created_at";

fn topic_from_row(r: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: r.get(0)?,
        name: r.get(1)?,
        is_visible: r.get::<_, i64>(2)? != 0,
        order_index: r.get(3)?,
        created_at: r.get(4)?,
    })
}

pub fn get_by_id(conn: &Connection, topic_id: &str) -> rusqlite::Result<Option<Topic>> {
    conn.query_row(
        &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?"),
        [topic_id],
        topic_from_row,
    )
    .optional()
}

pub fn list(conn: &Connection, visible_only: bool) -> rusqlite::Result<Vec<Topic>> {
    let sql = if visible_only {
        format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE is_visible = 1 ORDER BY order_index, created_at, id"
        )
    } else {
        format!("SELECT {TOPIC_COLUMNS} FROM topics ORDER BY order_index, created_at, id")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], topic_from_row)?;
    rows.collect()
}

pub fn next_order_index(conn: &Connection) -> rusqlite::Result<i64> {
    let max: Option<i64> =
        conn.query_row("SELECT MAX(order_index) FROM topics", [], |r| r.get(0))?;
    Ok(max.unwrap_or(0) + 1)
}

pub fn insert(
    conn: &Connection,
    id: &str,
    name: &str,
    is_visible: bool,
    order_index: i64,
) -> rusqlite::Result<Topic> {
    let created_at = now_ts();
    conn.execute(
        "INSERT INTO topics(id, name, is_visible, order_index, created_at) VALUES(?, ?, ?, ?, ?)",
        (id, name, is_visible as i64, order_index, &created_at),
    )?;
    Ok(Topic {
        id: id.to_string(),
        name: name.to_string(),
        is_visible,
        order_index,
        created_at,
    })
}

pub fn save(conn: &Connection, topic: &Topic) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE topics SET name = ?, is_visible = ?, order_index = ? WHERE id = ?",
        (
            &topic.name,
            topic.is_visible as i64,
            topic.order_index,
            &topic.id,
        ),
    )?;
    Ok(())
}
