use std::rc::Rc;

use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};

fn handle_health(state: &Rc<AppState>, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "dashboardOpen": state.current_dashboard().is_some(),
        }),
    )
}

pub async fn try_handle(state: &Rc<AppState>, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
