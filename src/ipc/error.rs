use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::ServiceError;

pub fn ok(id: &str, result: Value) -> Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Failure of a single handler, rendered into the error envelope.
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ServiceError> for HandlerErr {
    fn from(e: ServiceError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

impl From<serde_json::Error> for HandlerErr {
    fn from(e: serde_json::Error) -> Self {
        HandlerErr::new("internal", e.to_string())
    }
}

/// Wrap a handler result in the response envelope, logging failures.
pub fn respond(req_id: &str, method: &str, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(req_id, v),
        Err(e) => {
            if e.code == "db_error" || e.code == "internal" {
                error!(method, code = e.code, message = %e.message, "request failed");
            } else {
                warn!(method, code = e.code, message = %e.message, "request rejected");
            }
            e.response(req_id)
        }
    }
}
