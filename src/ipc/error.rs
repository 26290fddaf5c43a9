use serde_json::json;

use crate::error::AttendanceError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
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

/// Shorthand for domain failures, which already know their code and details.
pub fn fail(id: &str, error: &AttendanceError) -> serde_json::Value {
    err(id, error.code(), error.to_string(), error.details())
}
