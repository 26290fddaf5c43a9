use std::rc::Rc;

use serde_json::json;

use crate::dashboard::Dashboard;
use crate::edit_window::Flow;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, require_dashboard, view_json, HandlerErr};
use crate::ipc::types::{AppState, Request};

async fn dashboard_open(
    state: &Rc<AppState>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let flow_raw = get_required_str(params, "flow")?;
    let Some(flow) = Flow::parse(&flow_raw) else {
        return Err(HandlerErr::bad_params(format!(
            "flow must be teacher or student, got {}",
            flow_raw
        )));
    };
    let dashboard = Dashboard::open(
        state.backend.clone(),
        state.clock.clone(),
        flow,
        state.settle_delay,
    )
    .await?;
    *state.dashboard.borrow_mut() = Some(dashboard.clone());
    view_json(&dashboard)
}

fn dashboard_state(state: &Rc<AppState>) -> Result<serde_json::Value, HandlerErr> {
    let dashboard = require_dashboard(state)?;
    view_json(&dashboard)
}

async fn dashboard_reload(state: &Rc<AppState>) -> Result<serde_json::Value, HandlerErr> {
    let dashboard = require_dashboard(state)?;
    dashboard.reload().await?;
    let view = view_json(&dashboard)?;
    Ok(json!({ "reloaded": true, "view": view }))
}

pub async fn try_handle(state: &Rc<AppState>, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.open" => Some(match dashboard_open(state, &req.params).await {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }),
        "dashboard.state" => Some(match dashboard_state(state) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }),
        "dashboard.reload" => Some(match dashboard_reload(state).await {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }),
        _ => None,
    }
}
