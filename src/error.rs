use serde_json::json;
use thiserror::Error;

/// Everything the attendance core can refuse or fail with. Local validation
/// errors never touch entry state; write and load failures carry the
/// collaborator's reason through to the notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    #[error("session {0} is not on the loaded schedule")]
    SessionNotFound(String),

    #[error("session {0} has multiple teachers; the update must name one")]
    AmbiguousTeacher(String),

    #[error("session {session_id}: no valid teacher for this update")]
    InvalidTeacherId {
        session_id: String,
        teacher_id: Option<i64>,
    },

    #[error("attendance is still missing for: {}", missing_names.join(", "))]
    IncompleteAttendance { missing_names: Vec<String> },

    #[error("{subject_name}: every listed teacher needs a status before submitting")]
    IncompleteMultiTeacher { subject_name: String },

    #[error("{subject_name}: this status needs a note")]
    NoteRequired { subject_name: String },

    #[error("attendance cannot be recorded for a future date")]
    FutureDateRejected,

    #[error("the update was not saved: {reason}")]
    WriteFailed { reason: String },

    #[error("could not load the schedule: {reason}")]
    SnapshotLoadFailed { reason: String },
}

impl AttendanceError {
    /// Stable wire code for IPC error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::AmbiguousTeacher(_) => "ambiguous_teacher",
            Self::InvalidTeacherId { .. } => "invalid_teacher_id",
            Self::IncompleteAttendance { .. } => "incomplete_attendance",
            Self::IncompleteMultiTeacher { .. } => "incomplete_multi_teacher",
            Self::NoteRequired { .. } => "note_required",
            Self::FutureDateRejected => "future_date_rejected",
            Self::WriteFailed { .. } => "write_failed",
            Self::SnapshotLoadFailed { .. } => "snapshot_load_failed",
        }
    }

    /// Structured payload for the IPC error envelope, when there is one.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::SessionNotFound(session_id) | Self::AmbiguousTeacher(session_id) => {
                Some(json!({ "sessionId": session_id }))
            }
            Self::InvalidTeacherId {
                session_id,
                teacher_id,
            } => Some(json!({ "sessionId": session_id, "teacherId": teacher_id })),
            Self::IncompleteAttendance { missing_names } => {
                Some(json!({ "missingNames": missing_names }))
            }
            Self::IncompleteMultiTeacher { subject_name } | Self::NoteRequired { subject_name } => {
                Some(json!({ "subjectName": subject_name }))
            }
            _ => None,
        }
    }
}
