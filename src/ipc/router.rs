use std::rc::Rc;

use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub async fn handle_request(state: &Rc<AppState>, req: Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::dashboard::try_handle(state, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(state, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::edit_window::try_handle(state, &req).await {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
