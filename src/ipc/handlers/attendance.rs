use std::rc::Rc;

use serde_json::json;

use super::edit_window;
use crate::dashboard::{Dashboard, SettleOutcome, StatusTicket};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_opt_bool, get_opt_str, get_required_bool, get_required_key, get_required_status,
    require_dashboard, HandlerErr,
};
use crate::ipc::types::{AppState, Request};

/// Runs the in-flight part of a status change after the response has gone
/// out. The outcome arrives as an event; afterwards any window change that
/// was deferred behind this write gets its turn.
fn spawn_settle(state: Rc<AppState>, ticket: StatusTicket) {
    tokio::task::spawn_local(async move {
        let key = ticket.key().to_string();
        match ticket.settle().await {
            Ok(SettleOutcome::Reloaded) => {
                state.push_event("attendance.reloaded", json!({ "key": key }));
            }
            Ok(SettleOutcome::ReloadFailed(error)) => {
                state.push_event(
                    "attendance.reloadFailed",
                    json!({ "key": key, "code": error.code(), "message": error.to_string() }),
                );
            }
            Err(error) => {
                state.push_event(
                    "attendance.rolledBack",
                    json!({ "key": key, "code": error.code(), "message": error.to_string() }),
                );
            }
        }
        if let Some(dashboard) = state.current_dashboard() {
            if let Some(result) = dashboard.apply_deferred_if_idle().await {
                edit_window::emit_window_outcome(&state, result);
            }
        }
    });
}

fn attendance_set_status(
    state: &Rc<AppState>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let dashboard = require_dashboard(state)?;
    let key = get_required_key(params)?;
    let status = get_required_status(params)?;
    let note = get_opt_str(params, "note").unwrap_or_default();
    let has_assignment = get_opt_bool(params, "hasAssignment")?;
    let late = get_opt_bool(params, "late")?;

    let Some(ticket) =
        Dashboard::begin_status_change(&dashboard, &key, status, &note, has_assignment, late)?
    else {
        return Ok(json!({ "applied": false, "busy": true }));
    };
    let canonical = ticket.key().to_string();
    let entry = dashboard.entry(ticket.key());
    spawn_settle(state.clone(), ticket);
    Ok(json!({
        "applied": true,
        "key": canonical,
        "entry": entry,
    }))
}

fn attendance_set_late_flag(
    state: &Rc<AppState>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let dashboard = require_dashboard(state)?;
    let key = get_required_key(params)?;
    let value = get_required_bool(params, "late")?;
    let canonical = dashboard.set_late_flag(&key, value)?;
    Ok(json!({ "ok": true, "key": canonical.to_string() }))
}

fn attendance_set_assignment_flag(
    state: &Rc<AppState>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let dashboard = require_dashboard(state)?;
    let key = get_required_key(params)?;
    let value = get_required_bool(params, "hasAssignment")?;
    let canonical = dashboard.set_assignment_flag(&key, value)?;
    Ok(json!({ "ok": true, "key": canonical.to_string() }))
}

async fn attendance_submit_batch(
    state: &Rc<AppState>,
) -> Result<serde_json::Value, HandlerErr> {
    let dashboard = require_dashboard(state)?;
    let Some(outcome) = dashboard.submit_batch().await? else {
        return Ok(json!({ "submitted": false, "busy": true }));
    };
    let mut result = json!({
        "submitted": true,
        "message": outcome.ack.message,
    });
    if let Some(error) = outcome.reload_error {
        result["staleView"] = json!(true);
        result["reloadError"] = json!({ "code": error.code(), "message": error.to_string() });
    }
    Ok(result)
}

pub async fn try_handle(state: &Rc<AppState>, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.setStatus" => Some(match attendance_set_status(state, &req.params) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }),
        "attendance.setLateFlag" => Some(match attendance_set_late_flag(state, &req.params) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }),
        "attendance.setAssignmentFlag" => {
            Some(match attendance_set_assignment_flag(state, &req.params) {
                Ok(result) => ok(&req.id, result),
                Err(error) => error.response(&req.id),
            })
        }
        "attendance.submitBatch" => Some(match attendance_submit_batch(state).await {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }),
        _ => None,
    }
}
