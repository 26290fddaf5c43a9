use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entry::{EntryKey, Status};

/// Activity kinds that never take attendance.
const NON_ATTENDABLE_KINDS: &[&str] = &["upacara", "istirahat", "libur"];

/// One schedule row exactly as the portal sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRow {
    pub jadwal_id: String,
    pub mapel: String,
    pub kelas: String,
    pub hari: String,
    pub jam_mulai: String,
    pub jam_selesai: String,
    #[serde(default)]
    pub ruang: Option<String>,
    #[serde(default)]
    pub guru_id: Option<i64>,
    pub jenis_kegiatan: String,
    #[serde(default)]
    pub status_kehadiran: Option<String>,
    #[serde(default)]
    pub keterangan: Option<String>,
    #[serde(default)]
    pub is_multi_guru: bool,
    #[serde(default)]
    pub guru_list: Option<String>,
}

/// One listed teacher of a multi-teacher session, with whatever the portal
/// already has recorded for that slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoTeacher {
    pub teacher_id: i64,
    pub name: String,
    pub recorded: Option<Status>,
    pub recorded_note: String,
}

/// Status the portal already holds for a single-teacher session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatus {
    pub status: Status,
    pub note: String,
}

/// A schedule row after decoding, with attendability and the co-teacher list
/// resolved. This is what the store seeds from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSession {
    pub id: String,
    pub subject_name: String,
    pub class_name: String,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub room_code: Option<String>,
    pub teacher_id: Option<i64>,
    pub kind: String,
    pub attendable: bool,
    pub multi_teacher: bool,
    #[serde(skip)]
    pub co_teachers: Vec<CoTeacher>,
    #[serde(skip)]
    pub recorded: Option<RecordedStatus>,
}

impl ScheduleSession {
    pub fn has_co_teacher(&self, teacher_id: i64) -> bool {
        self.co_teachers.iter().any(|t| t.teacher_id == teacher_id)
    }

    /// Every key this session contributes to the store. Non-attendable
    /// sessions contribute none.
    pub fn entry_keys(&self) -> Vec<EntryKey> {
        if !self.attendable {
            return Vec::new();
        }
        if self.multi_teacher {
            self.co_teachers
                .iter()
                .map(|t| EntryKey::session_teacher(&self.id, t.teacher_id))
                .collect()
        } else {
            vec![EntryKey::session(&self.id)]
        }
    }
}

/// Point-in-time view of one day's schedule. The set of valid keys is fixed
/// by this snapshot until the next reload replaces it wholesale.
#[derive(Debug, Clone, Default)]
pub struct ScheduleSnapshot {
    pub date: NaiveDate,
    pub sessions: Vec<ScheduleSession>,
}

impl ScheduleSnapshot {
    /// Decodes raw rows into sessions. Malformed pieces are logged and
    /// skipped rather than failing the whole snapshot.
    pub fn from_rows(date: NaiveDate, rows: Vec<ScheduleRow>) -> Self {
        let sessions = rows
            .into_iter()
            .map(|row| {
                let attendable = !NON_ATTENDABLE_KINDS.contains(&row.jenis_kegiatan.as_str());
                let multi_teacher = row.is_multi_guru;
                let co_teachers = if multi_teacher {
                    parse_co_teachers(&row.jadwal_id, row.guru_list.as_deref())
                } else {
                    Vec::new()
                };
                let recorded = if multi_teacher {
                    None
                } else {
                    parse_wire_status(&row.jadwal_id, row.status_kehadiran.as_deref()).map(
                        |status| RecordedStatus {
                            status,
                            note: row.keterangan.clone().unwrap_or_default(),
                        },
                    )
                };
                ScheduleSession {
                    id: row.jadwal_id,
                    subject_name: row.mapel,
                    class_name: row.kelas,
                    day: row.hari,
                    start_time: row.jam_mulai,
                    end_time: row.jam_selesai,
                    room_code: row.ruang,
                    teacher_id: row.guru_id,
                    kind: row.jenis_kegiatan,
                    attendable,
                    multi_teacher,
                    co_teachers,
                    recorded,
                }
            })
            .collect();
        Self { date, sessions }
    }

    pub fn session(&self, id: &str) -> Option<&ScheduleSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Finds the session a parsed key refers to. A numeric `:`-suffix
    /// normally names a co-teacher, but a session id may itself end in
    /// `:<digits>`; when the split reading is not on the schedule and the
    /// unsplit string is, the unsplit reading wins and the key loses its
    /// qualifier.
    pub fn resolve_key(&self, desired: &EntryKey) -> Option<(&ScheduleSession, EntryKey)> {
        if let Some(session) = self.session(&desired.session_id) {
            return Some((session, desired.clone()));
        }
        if desired.teacher_id.is_some() {
            let unsplit = desired.to_string();
            if let Some(session) = self.session(&unsplit) {
                return Some((session, EntryKey::session(unsplit)));
            }
        }
        None
    }
}

/// `guru_list` packs one teacher per `;`-separated segment as
/// `id|name|status|note`. Status and note may be empty; names may contain
/// anything except the two separators.
fn parse_co_teachers(session_id: &str, raw: Option<&str>) -> Vec<CoTeacher> {
    let Some(raw) = raw else {
        warn!(session_id, "multi-teacher session without guru_list");
        return Vec::new();
    };
    raw.split(';')
        .filter(|segment| !segment.trim().is_empty())
        .filter_map(|segment| {
            let mut fields = segment.splitn(4, '|');
            let id_field = fields.next().unwrap_or_default().trim();
            let Some(name) = fields.next() else {
                warn!(session_id, segment, "guru_list segment without a name");
                return None;
            };
            let Ok(teacher_id) = id_field.parse::<i64>() else {
                warn!(session_id, segment, "guru_list segment with a bad teacher id");
                return None;
            };
            let status_field = fields.next().unwrap_or_default();
            let note_field = fields.next().unwrap_or_default();
            Some(CoTeacher {
                teacher_id,
                name: name.trim().to_string(),
                recorded: parse_wire_status(session_id, Some(status_field)),
                recorded_note: note_field.to_string(),
            })
        })
        .collect()
}

/// Empty means nothing recorded yet; unknown strings are dropped with a
/// warning so one odd row cannot wedge the snapshot.
fn parse_wire_status(session_id: &str, raw: Option<&str>) -> Option<Status> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match Status::from_str(raw) {
        Ok(status) => Some(status),
        Err(_) => {
            warn!(session_id, raw, "unrecognized attendance status on the wire");
            None
        }
    }
}
