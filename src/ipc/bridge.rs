use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

use crate::backend::{
    AttendanceBackend, BatchAck, BatchWrite, SnapshotScope, StatusWrite, WriteAck,
};
use crate::error::AttendanceError;
use crate::schedule::ScheduleRow;

struct HostReply {
    ok: bool,
    result: serde_json::Value,
    error_message: String,
}

/// Reverse-request side of the pipe. The sidecar sends `backend.*` requests
/// to the host on stdout and matches the host's answers back by id; bridge
/// ids carry a `b` prefix so they can never collide with host request ids.
pub struct HostBridge {
    outbox: UnboundedSender<String>,
    next_id: Cell<u64>,
    closed: Cell<bool>,
    waiting: RefCell<HashMap<String, oneshot::Sender<HostReply>>>,
}

impl HostBridge {
    pub fn new(outbox: UnboundedSender<String>) -> Self {
        Self {
            outbox,
            next_id: Cell::new(1),
            closed: Cell::new(false),
            waiting: RefCell::new(HashMap::new()),
        }
    }

    /// Fails every outstanding call and makes new ones fail immediately.
    /// Called once the host side of the pipe is gone, so in-flight tasks can
    /// wind down instead of waiting for answers that will never come.
    pub fn close(&self) {
        self.closed.set(true);
        self.waiting.borrow_mut().clear();
    }

    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        if self.closed.get() {
            anyhow::bail!("host connection closed");
        }
        let id = format!("b{}", self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        let (tx, rx) = oneshot::channel();
        self.waiting.borrow_mut().insert(id.clone(), tx);

        let line = json!({ "id": id, "method": method, "params": params }).to_string();
        if self.outbox.send(line).is_err() {
            self.waiting.borrow_mut().remove(&id);
            anyhow::bail!("host connection closed");
        }

        let reply = rx
            .await
            .map_err(|_| anyhow::anyhow!("host dropped the request"))?;
        if !reply.ok {
            anyhow::bail!("{}", reply.error_message);
        }
        Ok(reply.result)
    }

    /// Routes one host answer to its waiting call. Returns false when the
    /// line is not an answer to anything we asked.
    pub fn resolve(&self, value: &serde_json::Value) -> bool {
        let Some(id) = value.get("id").and_then(|v| v.as_str()) else {
            return false;
        };
        let Some(tx) = self.waiting.borrow_mut().remove(id) else {
            return false;
        };
        let ok = value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
        let result = value
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let error_message = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("host reported an error")
            .to_string();
        let _ = tx.send(HostReply {
            ok,
            result,
            error_message,
        });
        true
    }
}

/// The collaborator as seen through the host bridge.
pub struct HostBackend {
    bridge: Rc<HostBridge>,
}

impl HostBackend {
    pub fn new(bridge: Rc<HostBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait(?Send)]
impl AttendanceBackend for HostBackend {
    async fn fetch_snapshot(
        &self,
        scope: SnapshotScope,
    ) -> Result<Vec<ScheduleRow>, AttendanceError> {
        let params = match scope {
            SnapshotScope::Today => json!({ "scope": "today" }),
            SnapshotScope::AsOf(date) => json!({ "scope": "asOf", "date": date.to_string() }),
        };
        let result = self
            .bridge
            .call("backend.fetchSnapshot", params)
            .await
            .map_err(|e| AttendanceError::SnapshotLoadFailed {
                reason: e.to_string(),
            })?;
        let rows = result.get("sessions").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(rows).map_err(|e| AttendanceError::SnapshotLoadFailed {
            reason: format!("malformed schedule payload: {e}"),
        })
    }

    async fn submit_status(&self, write: &StatusWrite) -> Result<WriteAck, AttendanceError> {
        let params = serde_json::to_value(write).map_err(|e| AttendanceError::WriteFailed {
            reason: e.to_string(),
        })?;
        let result = self
            .bridge
            .call("backend.submitStatus", params)
            .await
            .map_err(|e| AttendanceError::WriteFailed {
                reason: e.to_string(),
            })?;
        serde_json::from_value(result).map_err(|e| AttendanceError::WriteFailed {
            reason: format!("malformed acknowledgement: {e}"),
        })
    }

    async fn submit_batch(&self, write: &BatchWrite) -> Result<BatchAck, AttendanceError> {
        let params = serde_json::to_value(write).map_err(|e| AttendanceError::WriteFailed {
            reason: e.to_string(),
        })?;
        let result = self
            .bridge
            .call("backend.submitBatch", params)
            .await
            .map_err(|e| AttendanceError::WriteFailed {
                reason: e.to_string(),
            })?;
        serde_json::from_value(result).map_err(|e| AttendanceError::WriteFailed {
            reason: format!("malformed acknowledgement: {e}"),
        })
    }
}
