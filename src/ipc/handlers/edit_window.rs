use std::rc::Rc;

use serde_json::json;

use crate::dashboard::WindowOutcome;
use crate::error::AttendanceError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_date, require_dashboard, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn outcome_json(outcome: WindowOutcome) -> serde_json::Value {
    match outcome {
        WindowOutcome::Deferred => json!({ "deferred": true }),
        WindowOutcome::Applied(date) => {
            json!({ "deferred": false, "selectedDate": date.to_string() })
        }
    }
}

/// Deferred window changes finish later, from the settle task; their outcome
/// goes out as an event since the original response is long gone.
pub fn emit_window_outcome(state: &AppState, result: Result<WindowOutcome, AttendanceError>) {
    match result {
        Ok(WindowOutcome::Applied(date)) => {
            state.push_event("editWindow.applied", json!({ "selectedDate": date.to_string() }));
        }
        Ok(WindowOutcome::Deferred) => {}
        Err(error) => {
            state.push_event(
                "editWindow.failed",
                json!({ "code": error.code(), "message": error.to_string() }),
            );
        }
    }
}

fn edit_enter(state: &Rc<AppState>) -> Result<serde_json::Value, HandlerErr> {
    let dashboard = require_dashboard(state)?;
    dashboard.enter_edit_mode();
    Ok(json!({
        "mode": "historical",
        "selectedDate": dashboard.selected_date().to_string(),
    }))
}

async fn edit_exit(state: &Rc<AppState>) -> Result<serde_json::Value, HandlerErr> {
    let dashboard = require_dashboard(state)?;
    let outcome = dashboard.exit_edit_mode().await?;
    Ok(outcome_json(outcome))
}

async fn edit_set_date(
    state: &Rc<AppState>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let dashboard = require_dashboard(state)?;
    let date = get_required_date(params, "date")?;
    let outcome = dashboard.select_date(date).await?;
    Ok(outcome_json(outcome))
}

pub async fn try_handle(state: &Rc<AppState>, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "editWindow.enter" => Some(match edit_enter(state) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }),
        "editWindow.exit" => Some(match edit_exit(state).await {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }),
        "editWindow.setDate" => Some(match edit_set_date(state, &req.params).await {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }),
        _ => None,
    }
}
