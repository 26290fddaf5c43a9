use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::entry::{AttendanceEntry, EntryKey, Status};
use crate::schedule::ScheduleSnapshot;

/// Optimistic per-key attendance state. Writes land here before the
/// collaborator confirms them; a failed write puts the previous value back.
/// The late and assignment flags are kept beside the entries, not inside
/// them, so restoring an entry never touches a flag.
#[derive(Debug, Default)]
pub struct AttendanceStateStore {
    entries: BTreeMap<EntryKey, AttendanceEntry>,
    late: HashMap<EntryKey, bool>,
    assignment: HashMap<EntryKey, bool>,
}

impl AttendanceStateStore {
    /// Rebuilds the whole store from a snapshot. Single-teacher sessions
    /// default to present when the portal has nothing recorded; multi-teacher
    /// slots stay empty until a recorded status fills them, so an untouched
    /// co-teacher remains visibly unset.
    pub fn seed(&mut self, snapshot: &ScheduleSnapshot) {
        self.entries.clear();
        self.late.clear();
        self.assignment.clear();
        for session in &snapshot.sessions {
            if !session.attendable {
                continue;
            }
            if session.multi_teacher {
                for teacher in &session.co_teachers {
                    let Some(status) = teacher.recorded else {
                        continue;
                    };
                    let key = EntryKey::session_teacher(&session.id, teacher.teacher_id);
                    let note = if status == Status::Present {
                        String::new()
                    } else {
                        teacher.recorded_note.clone()
                    };
                    self.entries.insert(
                        key,
                        AttendanceEntry {
                            status,
                            note,
                            teacher_id: teacher.teacher_id,
                        },
                    );
                }
                continue;
            }
            let Some(teacher_id) = session.teacher_id else {
                warn!(session_id = %session.id, "attendable session without a teacher; not seeded");
                continue;
            };
            let (status, note) = match &session.recorded {
                Some(recorded) if recorded.status != Status::Present => {
                    (recorded.status, recorded.note.clone())
                }
                Some(recorded) => (recorded.status, String::new()),
                None => (Status::Present, String::new()),
            };
            self.entries.insert(
                EntryKey::session(&session.id),
                AttendanceEntry {
                    status,
                    note,
                    teacher_id,
                },
            );
        }
    }

    pub fn entry(&self, key: &EntryKey) -> Option<&AttendanceEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Applies an update locally and hands back what was there before, for
    /// rollback. Setting present wipes the note in the same step.
    pub fn set_local(
        &mut self,
        key: &EntryKey,
        status: Status,
        note: &str,
        teacher_id: i64,
    ) -> Option<AttendanceEntry> {
        let note = if status == Status::Present {
            String::new()
        } else {
            note.to_string()
        };
        self.entries.insert(
            key.clone(),
            AttendanceEntry {
                status,
                note,
                teacher_id,
            },
        )
    }

    /// Puts a captured previous value back. `None` means the slot had no
    /// entry before the update, so the slot empties again.
    pub fn restore(&mut self, key: &EntryKey, previous: Option<AttendanceEntry>) {
        match previous {
            Some(entry) => {
                self.entries.insert(key.clone(), entry);
            }
            None => {
                self.entries.remove(key);
            }
        }
    }

    pub fn set_late(&mut self, key: &EntryKey, value: bool) {
        self.late.insert(key.clone(), value);
    }

    pub fn late(&self, key: &EntryKey) -> bool {
        self.late.get(key).copied().unwrap_or(false)
    }

    pub fn set_assignment(&mut self, key: &EntryKey, value: bool) {
        self.assignment.insert(key.clone(), value);
    }

    pub fn has_assignment(&self, key: &EntryKey) -> bool {
        self.assignment.get(key).copied().unwrap_or(false)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&EntryKey, &AttendanceEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
