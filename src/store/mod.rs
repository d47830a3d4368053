//! Access layer: one module per table, plain query functions over a
//! borrowed connection. Callers own transactions.

pub mod progress;
pub mod responses;
pub mod roster;
pub mod topics;
pub mod uploads;
pub mod users;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};

use crate::model::{ResponseStatus, Role, UpdateSource, UploadAction};

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Role::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown role: {s}").into()))
    }
}

impl FromSql for ResponseStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ResponseStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown status: {s}").into()))
    }
}

impl FromSql for UpdateSource {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        UpdateSource::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown update source: {s}").into()))
    }
}

impl FromSql for UploadAction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        UploadAction::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown upload action: {s}").into()))
    }
}
