//! Domain services: validation and orchestration over the store.
//!
//! Every entry point takes the connection explicitly and returns a
//! `ServiceResult`. Mutations that touch more than one row run inside a
//! single transaction.

pub mod auth;
pub mod progress;
pub mod responses;
pub mod roster;
pub mod topics;

use rusqlite::Connection;

use crate::error::{ServiceError, ServiceResult};
use crate::store;

pub(crate) fn require_user(conn: &Connection, user_id: i64) -> ServiceResult<()> {
    if store::users::exists(conn, user_id)? {
        Ok(())
    } else {
        Err(ServiceError::not_found(format!("user {user_id} not found")))
    }
}

pub(crate) fn require_topic(conn: &Connection, topic_id: &str) -> ServiceResult<crate::model::Topic> {
    store::topics::get_by_id(conn, topic_id)?
        .ok_or_else(|| ServiceError::not_found(format!("topic {topic_id} not found")))
}

/// Clamp a 1-based page number and page size into LIMIT/OFFSET.
pub(crate) fn page_window(page: Option<i64>, page_size: Option<i64>, default_size: u32, max_size: u32) -> (i64, i64, i64) {
    let size = page_size
        .unwrap_or(default_size as i64)
        .clamp(1, max_size.max(1) as i64);
    let page = page.unwrap_or(1).max(1);
    (page, size, (page - 1) * size)
}

pub(crate) fn total_pages(total: i64, page_size: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        (total + page_size - 1) / page_size
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use rusqlite::Connection;

    use crate::model::{Role, User};
    use crate::store;

    pub fn conn() -> Connection {
        crate::db::open_in_memory().expect("in-memory db")
    }

    pub fn user(conn: &Connection, email: &str) -> User {
        store::users::create_user(conn, email, email, Role::Student).expect("create user")
    }

    pub fn topic(conn: &Connection, id: &str) {
        store::topics::insert(conn, id, id, true, 1).expect("create topic");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_clamps() {
        assert_eq!(page_window(None, None, 20, 100), (1, 20, 0));
        assert_eq!(page_window(Some(3), Some(10), 20, 100), (3, 10, 20));
        assert_eq!(page_window(Some(0), Some(1000), 20, 100), (1, 100, 0));
        assert_eq!(page_window(Some(2), Some(0), 20, 100), (2, 1, 1));
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
    }
}
