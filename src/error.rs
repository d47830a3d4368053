use thiserror::Error;

/// Errors surfaced by the domain services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed input, rejected before any storage access.
    #[error("{0}")]
    Validation(String),

    /// A referenced user, topic, roster row or upload does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A unique key (topic id, active roster email) is already taken.
    #[error("{0}")]
    Conflict(String),

    /// Query or commit failure. The enclosing transaction is rolled back.
    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }

    /// Stable code used in the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "bad_params",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Persistence(_) => "db_error",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// True when the rusqlite error is a UNIQUE/PRIMARY KEY violation.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_per_kind() {
        assert_eq!(ServiceError::validation("x").code(), "bad_params");
        assert_eq!(ServiceError::not_found("x").code(), "not_found");
        assert_eq!(ServiceError::conflict("x").code(), "conflict");
        let e = ServiceError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(e.code(), "db_error");
    }

    #[test]
    fn unique_violation_is_detected() {
        let conn = rusqlite::Connection::open_in_memory().expect("open");
        conn.execute("CREATE TABLE t(k TEXT PRIMARY KEY)", []).expect("create");
        conn.execute("INSERT INTO t(k) VALUES('a')", []).expect("insert");
        let e = conn
            .execute("INSERT INTO t(k) VALUES('a')", [])
            .expect_err("duplicate");
        assert!(is_unique_violation(&e));
        assert!(!is_unique_violation(&rusqlite::Error::QueryReturnedNoRows));
    }
}
