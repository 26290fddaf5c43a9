use std::rc::Rc;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::dashboard::Dashboard;
use crate::entry::{EntryKey, Status};
use crate::error::AttendanceError;
use crate::ipc::error::err;
use crate::ipc::types::AppState;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<AttendanceError> for HandlerErr {
    fn from(error: AttendanceError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_opt_bool(params: &serde_json::Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

pub fn get_required_bool(params: &serde_json::Value, key: &str) -> Result<bool, HandlerErr> {
    get_opt_bool(params, key)?
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_key(params: &serde_json::Value) -> Result<EntryKey, HandlerErr> {
    let raw = get_required_str(params, "key")?;
    Ok(EntryKey::parse(&raw))
}

pub fn get_required_status(params: &serde_json::Value) -> Result<Status, HandlerErr> {
    let raw = get_required_str(params, "status")?;
    Status::from_str(&raw)
        .map_err(|_| HandlerErr::bad_params(format!("unknown status: {}", raw)))
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = get_required_str(params, key)?;
    raw.parse::<NaiveDate>()
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn require_dashboard(state: &AppState) -> Result<Rc<Dashboard>, HandlerErr> {
    state.current_dashboard().ok_or(HandlerErr {
        code: "no_dashboard",
        message: "open the dashboard first".to_string(),
        details: None,
    })
}

/// Serializes the full dashboard view for a response.
pub fn view_json(dashboard: &Dashboard) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(dashboard.view()).map_err(|e| HandlerErr {
        code: "encode_failed",
        message: e.to_string(),
        details: None,
    })
}
