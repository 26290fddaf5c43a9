use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::dashboard::Dashboard;
use crate::ipc::bridge::HostBackend;
use crate::time::SchoolClock;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Shared per-process state. Everything runs on one thread, so the open
/// dashboard sits in a `RefCell` rather than behind a lock.
pub struct AppState {
    pub backend: Rc<HostBackend>,
    pub clock: Rc<dyn SchoolClock>,
    pub dashboard: RefCell<Option<Rc<Dashboard>>>,
    pub outbox: UnboundedSender<String>,
    pub settle_delay: Duration,
}

impl AppState {
    pub fn current_dashboard(&self) -> Option<Rc<Dashboard>> {
        self.dashboard.borrow().clone()
    }

    /// Unsolicited notification to the host, as its own line on stdout.
    pub fn push_event(&self, event: &str, params: serde_json::Value) {
        let line = json!({ "event": event, "params": params }).to_string();
        if self.outbox.send(line).is_err() {
            debug!(event, "event dropped; host connection closed");
        }
    }
}
