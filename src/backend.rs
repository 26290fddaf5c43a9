use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entry::Status;
use crate::error::AttendanceError;
use crate::schedule::ScheduleRow;

/// Which day's schedule to fetch. `Today` is resolved by the collaborator so
/// the dashboard never guesses across midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotScope {
    Today,
    AsOf(NaiveDate),
}

/// One status write as the collaborator expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusWrite {
    pub session_id: String,
    pub teacher_id: i64,
    pub status: Status,
    pub note: String,
    pub target_date: NaiveDate,
    pub has_assignment: bool,
}

/// Collaborator acknowledgement for a single status write.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub is_multi_teacher: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub status: Status,
    pub note: String,
    pub has_assignment: bool,
    pub teacher_id: i64,
}

/// Whole-form submission. Entries are keyed by their canonical string form;
/// `session_id` names the day context the batch belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWrite {
    pub session_id: String,
    pub entries: BTreeMap<String, BatchEntry>,
    pub target_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Everything the attendance core needs from the collaborator. The dashboard
/// only ever talks to this trait; tests and the sidecar plug in their own
/// transports.
#[async_trait(?Send)]
pub trait AttendanceBackend {
    async fn fetch_snapshot(&self, scope: SnapshotScope)
        -> Result<Vec<ScheduleRow>, AttendanceError>;

    async fn submit_status(&self, write: &StatusWrite) -> Result<WriteAck, AttendanceError>;

    async fn submit_batch(&self, write: &BatchWrite) -> Result<BatchAck, AttendanceError>;
}
