use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{AttendanceBackend, BatchAck, SnapshotScope, StatusWrite};
use crate::edit_window::{EditWindow, Flow, WindowMode};
use crate::entry::{canonical_key_for, resolve_teacher_id, AttendanceEntry, EntryKey, Status};
use crate::error::AttendanceError;
use crate::pending::PendingKeys;
use crate::schedule::ScheduleSnapshot;
use crate::store::AttendanceStateStore;
use crate::time::SchoolClock;
use crate::validate::{build_batch, validate_batch};

/// How long a confirmed write is left to settle before the reload that
/// reconciles the dashboard with the portal.
pub const SETTLE_DELAY: Duration = Duration::from_millis(600);

/// A window change requested while writes were still in flight. Only the
/// latest one is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowChange {
    Select(NaiveDate),
    ExitToLive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    Applied(NaiveDate),
    Deferred,
}

/// What happened after a confirmed status write settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    Reloaded,
    ReloadFailed(AttendanceError),
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub ack: BatchAck,
    pub reload_error: Option<AttendanceError>,
}

struct DashboardState {
    snapshot: ScheduleSnapshot,
    store: AttendanceStateStore,
    pending: PendingKeys,
    window: EditWindow,
    deferred: Option<WindowChange>,
    batch_in_flight: bool,
}

/// The attendance dashboard core. One instance per opened dashboard; all
/// access happens on the single runtime thread, so interior state lives in a
/// `RefCell` and borrows are never held across an await.
pub struct Dashboard {
    backend: Rc<dyn AttendanceBackend>,
    clock: Rc<dyn SchoolClock>,
    settle_delay: Duration,
    state: RefCell<DashboardState>,
}

impl Dashboard {
    /// Fetches today's schedule and seeds the store from it.
    pub async fn open(
        backend: Rc<dyn AttendanceBackend>,
        clock: Rc<dyn SchoolClock>,
        flow: Flow,
        settle_delay: Duration,
    ) -> Result<Rc<Self>, AttendanceError> {
        let rows = backend.fetch_snapshot(SnapshotScope::Today).await?;
        let today = clock.today();
        let snapshot = ScheduleSnapshot::from_rows(today, rows);
        let mut store = AttendanceStateStore::default();
        store.seed(&snapshot);
        Ok(Rc::new(Self {
            backend,
            clock,
            settle_delay,
            state: RefCell::new(DashboardState {
                snapshot,
                store,
                pending: PendingKeys::default(),
                window: EditWindow::new(flow, today),
                deferred: None,
                batch_in_flight: false,
            }),
        }))
    }

    /// Validates one status update, applies it optimistically and claims the
    /// key. `Ok(None)` means another write for the same key is still in
    /// flight and this one was dropped. The returned ticket must be settled
    /// to push the write out; dropping it releases the key untouched.
    pub fn begin_status_change(
        dash: &Rc<Self>,
        desired: &EntryKey,
        status: Status,
        note: &str,
        has_assignment: Option<bool>,
        late: Option<bool>,
    ) -> Result<Option<StatusTicket>, AttendanceError> {
        let today = dash.clock.today();
        let mut guard = dash.state.borrow_mut();
        let st = &mut *guard;

        let Some((session, desired)) = st.snapshot.resolve_key(desired) else {
            return Err(AttendanceError::SessionNotFound(desired.session_id.clone()));
        };
        let key = canonical_key_for(session, desired.teacher_id)?;
        let teacher_id = resolve_teacher_id(session, desired.teacher_id, st.store.entry(&key))?;
        if status.requires_note() && note.trim().is_empty() {
            return Err(AttendanceError::NoteRequired {
                subject_name: session.subject_name.clone(),
            });
        }
        let target_date = st.window.selected_date();
        if target_date > today {
            return Err(AttendanceError::FutureDateRejected);
        }
        if !st.pending.try_acquire(&key) {
            debug!(key = %key, "update dropped; a write for this key is in flight");
            return Ok(None);
        }

        let previous = st.store.set_local(&key, status, note, teacher_id);
        if let Some(value) = late {
            st.store.set_late(&key, value);
        }
        if let Some(value) = has_assignment {
            st.store.set_assignment(&key, value);
        }
        let write = StatusWrite {
            session_id: key.session_id.clone(),
            teacher_id,
            status,
            note: if status == Status::Present {
                String::new()
            } else {
                note.to_string()
            },
            target_date,
            has_assignment: status.allows_assignment() && st.store.has_assignment(&key),
        };
        Ok(Some(StatusTicket {
            dash: Rc::clone(dash),
            key,
            previous,
            write,
            released: false,
        }))
    }

    /// Manual retry after a failed load. Refetches whatever the window is
    /// looking at and reseeds; on failure the last-known state stays put.
    pub async fn reload(&self) -> Result<(), AttendanceError> {
        self.reload_active().await
    }

    async fn reload_active(&self) -> Result<(), AttendanceError> {
        let scope = {
            let st = self.state.borrow();
            match st.window.mode() {
                WindowMode::Live => SnapshotScope::Today,
                WindowMode::Historical => SnapshotScope::AsOf(st.window.selected_date()),
            }
        };
        let rows = self.backend.fetch_snapshot(scope).await?;
        let today = self.clock.today();
        let date = match scope {
            SnapshotScope::Today => today,
            SnapshotScope::AsOf(date) => date,
        };
        let snapshot = ScheduleSnapshot::from_rows(date, rows);
        let st = &mut *self.state.borrow_mut();
        st.snapshot = snapshot;
        st.store.seed(&st.snapshot);
        st.window.follow_today(today);
        Ok(())
    }

    /// Switches to historical editing. The selection starts on today, which
    /// is already loaded, so nothing is fetched.
    pub fn enter_edit_mode(&self) {
        let today = self.clock.today();
        self.state.borrow_mut().window.enter_edit_mode(today);
    }

    /// Leaves historical editing and reloads today. Deferred while any write
    /// is in flight.
    pub async fn exit_edit_mode(&self) -> Result<WindowOutcome, AttendanceError> {
        let today = self.clock.today();
        {
            let mut st = self.state.borrow_mut();
            if !st.pending.is_empty() {
                st.deferred = Some(WindowChange::ExitToLive);
                return Ok(WindowOutcome::Deferred);
            }
            st.window.exit_edit_mode(today);
        }
        self.reload_active().await?;
        Ok(WindowOutcome::Applied(today))
    }

    /// Moves the historical selection, clamped to the edit window, and
    /// fetches that day. Deferred while any write is in flight; a newer
    /// request replaces an older deferred one.
    pub async fn select_date(&self, requested: NaiveDate) -> Result<WindowOutcome, AttendanceError> {
        let today = self.clock.today();
        let effective = {
            let mut st = self.state.borrow_mut();
            if !st.pending.is_empty() {
                st.deferred = Some(WindowChange::Select(requested));
                return Ok(WindowOutcome::Deferred);
            }
            st.window.set_selected_date(requested, today)
        };
        self.reload_active().await?;
        Ok(WindowOutcome::Applied(effective))
    }

    /// Runs the deferred window change once no writes are left in flight.
    pub async fn apply_deferred_if_idle(
        &self,
    ) -> Option<Result<WindowOutcome, AttendanceError>> {
        let change = {
            let mut st = self.state.borrow_mut();
            if !st.pending.is_empty() {
                return None;
            }
            st.deferred.take()
        }?;
        Some(match change {
            WindowChange::Select(date) => self.select_date(date).await,
            WindowChange::ExitToLive => self.exit_edit_mode().await,
        })
    }

    /// Submits the whole form. `Ok(None)` means a batch is already on its
    /// way; validation failures leave the local state untouched. A confirmed
    /// batch reloads immediately, and a reload failure is reported alongside
    /// the acknowledgement rather than undoing it.
    pub async fn submit_batch(&self) -> Result<Option<BatchOutcome>, AttendanceError> {
        let write = {
            let mut guard = self.state.borrow_mut();
            let st = &mut *guard;
            if st.batch_in_flight {
                debug!("batch dropped; one is already in flight");
                return Ok(None);
            }
            let today = self.clock.today();
            let target_date = st.window.selected_date();
            validate_batch(&st.snapshot, &st.store, target_date, today)?;
            st.batch_in_flight = true;
            build_batch(&st.store, target_date)
        };
        let result = self.backend.submit_batch(&write).await;
        self.state.borrow_mut().batch_in_flight = false;
        let ack = result?;
        if !ack.success {
            return Err(AttendanceError::WriteFailed {
                reason: ack
                    .message
                    .clone()
                    .unwrap_or_else(|| "rejected by the portal".to_string()),
            });
        }
        let reload_error = self.reload_active().await.err();
        if let Some(err) = &reload_error {
            warn!(error = %err, "reload after batch submission failed");
        }
        Ok(Some(BatchOutcome { ack, reload_error }))
    }

    /// Local-only lateness marker. Never written to the portal on its own.
    pub fn set_late_flag(&self, desired: &EntryKey, value: bool) -> Result<EntryKey, AttendanceError> {
        let st = &mut *self.state.borrow_mut();
        let Some((session, desired)) = st.snapshot.resolve_key(desired) else {
            return Err(AttendanceError::SessionNotFound(desired.session_id.clone()));
        };
        let key = canonical_key_for(session, desired.teacher_id)?;
        st.store.set_late(&key, value);
        Ok(key)
    }

    /// Assignment marker; it reaches the portal with the next status or
    /// batch write, and only for statuses that can carry it.
    pub fn set_assignment_flag(
        &self,
        desired: &EntryKey,
        value: bool,
    ) -> Result<EntryKey, AttendanceError> {
        let st = &mut *self.state.borrow_mut();
        let Some((session, desired)) = st.snapshot.resolve_key(desired) else {
            return Err(AttendanceError::SessionNotFound(desired.session_id.clone()));
        };
        let key = canonical_key_for(session, desired.teacher_id)?;
        st.store.set_assignment(&key, value);
        Ok(key)
    }

    pub fn entry(&self, key: &EntryKey) -> Option<AttendanceEntry> {
        self.state.borrow().store.entry(key).cloned()
    }

    pub fn is_pending(&self, key: &EntryKey) -> bool {
        self.state.borrow().pending.is_pending(key)
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.state.borrow().window.selected_date()
    }

    pub fn mode(&self) -> WindowMode {
        self.state.borrow().window.mode()
    }

    pub fn late_flag(&self, key: &EntryKey) -> bool {
        self.state.borrow().store.late(key)
    }

    pub fn assignment_flag(&self, key: &EntryKey) -> bool {
        self.state.borrow().store.has_assignment(key)
    }

    pub fn deferred_change(&self) -> Option<WindowChange> {
        self.state.borrow().deferred
    }

    pub fn batch_in_flight(&self) -> bool {
        self.state.borrow().batch_in_flight
    }

    /// Owned snapshot of everything a frontend needs to render the form.
    pub fn view(&self) -> DashboardView {
        let today = self.clock.today();
        let st = self.state.borrow();
        let sessions = st
            .snapshot
            .sessions
            .iter()
            .map(|session| SessionView {
                keys: session.entry_keys().iter().map(|k| k.to_string()).collect(),
                co_teachers: session
                    .co_teachers
                    .iter()
                    .map(|t| CoTeacherView {
                        key: EntryKey::session_teacher(&session.id, t.teacher_id).to_string(),
                        teacher_id: t.teacher_id,
                        name: t.name.clone(),
                    })
                    .collect(),
                session: session.clone(),
            })
            .collect();
        let entries = st
            .store
            .entries()
            .map(|(key, entry)| EntryView {
                key: key.to_string(),
                status: entry.status,
                note: entry.note.clone(),
                teacher_id: entry.teacher_id,
                late: st.store.late(key),
                has_assignment: st.store.has_assignment(key),
                updating: st.pending.is_pending(key),
            })
            .collect();
        DashboardView {
            flow: st.window.flow().as_str(),
            mode: st.window.mode().as_str(),
            selected_date: st.window.selected_date(),
            min_date: st.window.min_date(today),
            max_date: st.window.max_date(today),
            sessions,
            entries,
            pending_keys: st.pending.keys().map(|k| k.to_string()).collect(),
            batch_in_flight: st.batch_in_flight,
        }
    }
}

/// One claimed in-flight status write. Holds the captured previous entry for
/// rollback; the key is released exactly once, on settle or on drop.
pub struct StatusTicket {
    dash: Rc<Dashboard>,
    key: EntryKey,
    previous: Option<AttendanceEntry>,
    write: StatusWrite,
    released: bool,
}

impl StatusTicket {
    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn write(&self) -> &StatusWrite {
        &self.write
    }

    /// Pushes the write out and finishes the claim: a rejected or failed
    /// write rolls the entry back to the captured value, a confirmed one is
    /// left to settle and then reconciled against a fresh snapshot. The key
    /// is freed before this returns, whichever way it went.
    pub async fn settle(mut self) -> Result<SettleOutcome, AttendanceError> {
        let ack = match self.dash.backend.submit_status(&self.write).await {
            Ok(ack) => ack,
            Err(err) => {
                self.rollback_and_release();
                return Err(err);
            }
        };
        if !ack.success {
            self.rollback_and_release();
            return Err(AttendanceError::WriteFailed {
                reason: "rejected by the portal".to_string(),
            });
        }
        debug!(key = %self.key, is_multi_teacher = ?ack.is_multi_teacher, "status write confirmed");

        tokio::time::sleep(self.dash.settle_delay).await;
        let reload = self.dash.reload_active().await;
        self.release();
        match reload {
            Ok(()) => Ok(SettleOutcome::Reloaded),
            Err(err) => {
                warn!(key = %self.key, error = %err, "reload after settle failed; keeping local state");
                Ok(SettleOutcome::ReloadFailed(err))
            }
        }
    }

    fn rollback_and_release(&mut self) {
        if self.released {
            return;
        }
        let mut st = self.dash.state.borrow_mut();
        st.store.restore(&self.key, self.previous.take());
        st.pending.release(&self.key);
        self.released = true;
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.dash.state.borrow_mut().pending.release(&self.key);
        self.released = true;
    }
}

impl Drop for StatusTicket {
    fn drop(&mut self) {
        self.release();
    }
}

// Not derivable: the ticket holds its dashboard.
impl fmt::Debug for StatusTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusTicket")
            .field("key", &self.key)
            .field("write", &self.write)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub flow: &'static str,
    pub mode: &'static str,
    pub selected_date: NaiveDate,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub sessions: Vec<SessionView>,
    pub entries: Vec<EntryView>,
    pub pending_keys: Vec<String>,
    pub batch_in_flight: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub session: crate::schedule::ScheduleSession,
    pub keys: Vec<String>,
    pub co_teachers: Vec<CoTeacherView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoTeacherView {
    pub key: String,
    pub teacher_id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub key: String,
    pub status: Status,
    pub note: String,
    pub teacher_id: i64,
    pub late: bool,
    pub has_assignment: bool,
    pub updating: bool,
}
