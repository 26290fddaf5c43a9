use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::AttendanceError;
use crate::schedule::ScheduleSession;

/// Closed status set; the wire uses the portal's Indonesian strings and
/// accepts nothing outside this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Status {
    #[serde(rename = "Hadir")]
    #[strum(serialize = "Hadir")]
    Present,
    #[serde(rename = "Izin")]
    #[strum(serialize = "Izin")]
    ExcusedLeave,
    #[serde(rename = "Sakit")]
    #[strum(serialize = "Sakit")]
    Sick,
    #[serde(rename = "Alpa")]
    #[strum(serialize = "Alpa")]
    Absent,
    #[serde(rename = "Dispensasi")]
    #[strum(serialize = "Dispensasi")]
    Dispensation,
}

impl Status {
    /// Every status except plain presence needs an explanatory note.
    pub fn requires_note(self) -> bool {
        !matches!(self, Status::Present)
    }

    /// The assignment flag only applies when the class went on without the
    /// person being recorded.
    pub fn allows_assignment(self) -> bool {
        matches!(self, Status::Absent | Status::Sick | Status::ExcusedLeave)
    }
}

/// One attendance slot as the dashboard currently shows it. `teacher_id` is
/// resolved before the entry is created and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub status: Status,
    pub note: String,
    pub teacher_id: i64,
}

/// Identity of one attendance slot. Single-teacher sessions are keyed by the
/// session alone; a multi-teacher session carries one key per listed teacher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub session_id: String,
    pub teacher_id: Option<i64>,
}

impl EntryKey {
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            teacher_id: None,
        }
    }

    pub fn session_teacher(session_id: impl Into<String>, teacher_id: i64) -> Self {
        Self {
            session_id: session_id.into(),
            teacher_id: Some(teacher_id),
        }
    }

    pub fn is_multi_teacher(&self) -> bool {
        self.teacher_id.is_some()
    }

    /// Parses the canonical string form back into a key. The suffix only
    /// counts as a teacher qualifier when it is numeric; session ids may
    /// themselves contain `:`.
    pub fn parse(raw: &str) -> Self {
        match raw.rsplit_once(':') {
            Some((session_id, suffix)) if !session_id.is_empty() => {
                match suffix.parse::<i64>() {
                    Ok(teacher_id) => Self::session_teacher(session_id, teacher_id),
                    Err(_) => Self::session(raw),
                }
            }
            _ => Self::session(raw),
        }
    }
}

/// Canonical wire form: `sessionId` or `sessionId:teacherId`.
impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.teacher_id {
            Some(teacher_id) => write!(f, "{}:{}", self.session_id, teacher_id),
            None => f.write_str(&self.session_id),
        }
    }
}

/// Normalizes the key an update should land on. Multi-teacher sessions must
/// be addressed through one of their listed teachers; single-teacher keys
/// drop any qualifier. Pure, so the optimistic and rollback paths agree.
pub fn canonical_key_for(
    session: &ScheduleSession,
    explicit: Option<i64>,
) -> Result<EntryKey, AttendanceError> {
    if session.multi_teacher {
        let Some(teacher_id) = explicit else {
            return Err(AttendanceError::AmbiguousTeacher(session.id.clone()));
        };
        if !session.has_co_teacher(teacher_id) {
            return Err(AttendanceError::InvalidTeacherId {
                session_id: session.id.clone(),
                teacher_id: Some(teacher_id),
            });
        }
        return Ok(EntryKey::session_teacher(&session.id, teacher_id));
    }
    if let (Some(requested), Some(assigned)) = (explicit, session.teacher_id) {
        if requested != assigned {
            return Err(AttendanceError::InvalidTeacherId {
                session_id: session.id.clone(),
                teacher_id: Some(requested),
            });
        }
    }
    Ok(EntryKey::session(&session.id))
}

/// Picks the teacher an update is attributed to: an explicit qualifier wins,
/// then the snapshot's assignment, then whatever an existing entry already
/// resolved to. Pure.
pub fn resolve_teacher_id(
    session: &ScheduleSession,
    explicit: Option<i64>,
    existing: Option<&AttendanceEntry>,
) -> Result<i64, AttendanceError> {
    if session.multi_teacher {
        let Some(teacher_id) = explicit else {
            return Err(AttendanceError::AmbiguousTeacher(session.id.clone()));
        };
        if !session.has_co_teacher(teacher_id) {
            return Err(AttendanceError::InvalidTeacherId {
                session_id: session.id.clone(),
                teacher_id: Some(teacher_id),
            });
        }
        return Ok(teacher_id);
    }
    explicit
        .or(session.teacher_id)
        .or_else(|| existing.map(|entry| entry.teacher_id))
        .ok_or_else(|| AttendanceError::InvalidTeacherId {
            session_id: session.id.clone(),
            teacher_id: None,
        })
}
