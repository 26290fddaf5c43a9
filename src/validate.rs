use chrono::NaiveDate;

use crate::backend::{BatchEntry, BatchWrite};
use crate::entry::EntryKey;
use crate::error::AttendanceError;
use crate::schedule::ScheduleSnapshot;
use crate::store::AttendanceStateStore;

/// Whole-form gate, checked in a fixed order: complete single-teacher
/// coverage, then complete co-teacher coverage, then notes, then the date.
/// The first unmet condition wins so the caller surfaces one problem at a
/// time.
pub fn validate_batch(
    snapshot: &ScheduleSnapshot,
    store: &AttendanceStateStore,
    target_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), AttendanceError> {
    let missing_names: Vec<String> = snapshot
        .sessions
        .iter()
        .filter(|s| s.attendable && !s.multi_teacher)
        .filter(|s| !store.contains(&EntryKey::session(&s.id)))
        .map(|s| s.subject_name.clone())
        .collect();
    if !missing_names.is_empty() {
        return Err(AttendanceError::IncompleteAttendance { missing_names });
    }

    for session in snapshot.sessions.iter().filter(|s| s.attendable && s.multi_teacher) {
        let complete = session
            .entry_keys()
            .iter()
            .all(|key| store.contains(key));
        if !complete {
            return Err(AttendanceError::IncompleteMultiTeacher {
                subject_name: session.subject_name.clone(),
            });
        }
    }

    for (key, entry) in store.entries() {
        if entry.status.requires_note() && entry.note.trim().is_empty() {
            let subject_name = snapshot
                .session(&key.session_id)
                .map(|s| s.subject_name.clone())
                .unwrap_or_else(|| key.session_id.clone());
            return Err(AttendanceError::NoteRequired { subject_name });
        }
    }

    if target_date > today {
        return Err(AttendanceError::FutureDateRejected);
    }
    Ok(())
}

/// Packs the store into one submission. Assignment flags only survive for
/// statuses that can carry them.
pub fn build_batch(store: &AttendanceStateStore, target_date: NaiveDate) -> BatchWrite {
    let entries = store
        .entries()
        .map(|(key, entry)| {
            let has_assignment = entry.status.allows_assignment() && store.has_assignment(key);
            (
                key.to_string(),
                BatchEntry {
                    status: entry.status,
                    note: entry.note.clone(),
                    has_assignment,
                    teacher_id: entry.teacher_id,
                },
            )
        })
        .collect();
    BatchWrite {
        session_id: target_date.to_string(),
        entries,
        target_date,
    }
}
