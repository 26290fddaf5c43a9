mod support;

use presensid::backend::SnapshotScope;
use presensid::dashboard::{Dashboard, SettleOutcome};
use presensid::edit_window::Flow;
use presensid::entry::{EntryKey, Status};
use support::*;

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn happy_path_applies_then_reloads() {
    let backend = FakeBackend::new();
    let clock = TestClock::new(TODAY);
    let dash = open_dashboard(
        &backend,
        &clock,
        Flow::Teacher,
        vec![single_row("S1", "Matematika", 5)],
    )
    .await;
    let key = EntryKey::session("S1");

    let ticket = Dashboard::begin_status_change(&dash, &key, Status::Sick, "demam", None, None)
        .expect("begin accepted")
        .expect("key was free");

    // Optimistic value is visible while the write is in flight.
    let entry = dash.entry(&key).expect("entry present");
    assert_eq!(entry.status, Status::Sick);
    assert_eq!(entry.note, "demam");
    assert!(dash.is_pending(&key));

    let write = ticket.write().clone();
    assert_eq!(write.session_id, "S1");
    assert_eq!(write.teacher_id, 5);
    assert_eq!(write.status, Status::Sick);
    assert_eq!(write.note, "demam");
    assert_eq!(write.target_date, date(TODAY));
    assert!(!write.has_assignment);

    backend.queue_snapshot(vec![single_row_recorded(
        "S1",
        "Matematika",
        5,
        "Sakit",
        "demam",
    )]);
    let outcome = ticket.settle().await.expect("settle");
    assert_eq!(outcome, SettleOutcome::Reloaded);

    assert!(!dash.is_pending(&key));
    let entry = dash.entry(&key).expect("entry present");
    assert_eq!(entry.status, Status::Sick);
    assert_eq!(entry.note, "demam");

    assert_eq!(backend.writes.borrow().len(), 1);
    assert_eq!(
        *backend.fetches.borrow(),
        vec![SnapshotScope::Today, SnapshotScope::Today]
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn present_write_clears_note() {
    let backend = FakeBackend::new();
    let clock = TestClock::new(TODAY);
    let dash = open_dashboard(
        &backend,
        &clock,
        Flow::Teacher,
        vec![single_row_recorded("S1", "Matematika", 5, "Sakit", "demam")],
    )
    .await;
    let key = EntryKey::session("S1");
    assert_eq!(dash.entry(&key).expect("seeded").status, Status::Sick);

    let ticket =
        Dashboard::begin_status_change(&dash, &key, Status::Present, "leftover text", None, None)
            .expect("begin accepted")
            .expect("key was free");

    let entry = dash.entry(&key).expect("entry present");
    assert_eq!(entry.status, Status::Present);
    assert_eq!(entry.note, "");
    assert_eq!(ticket.write().note, "");

    backend.queue_snapshot(vec![single_row("S1", "Matematika", 5)]);
    ticket.settle().await.expect("settle");
    let entry = dash.entry(&key).expect("entry present");
    assert_eq!(entry.status, Status::Present);
    assert_eq!(entry.note, "");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn note_required_for_non_present() {
    let backend = FakeBackend::new();
    let clock = TestClock::new(TODAY);
    let dash = open_dashboard(
        &backend,
        &clock,
        Flow::Teacher,
        vec![single_row("S1", "Matematika", 5)],
    )
    .await;
    let key = EntryKey::session("S1");

    let err = Dashboard::begin_status_change(&dash, &key, Status::Absent, "   ", None, None)
        .expect_err("note is required");
    assert_eq!(err.code(), "note_required");

    // Nothing was applied or claimed.
    assert_eq!(dash.entry(&key).expect("entry").status, Status::Present);
    assert!(!dash.is_pending(&key));
    assert!(backend.writes.borrow().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn unknown_session_is_refused() {
    let backend = FakeBackend::new();
    let clock = TestClock::new(TODAY);
    let dash = open_dashboard(
        &backend,
        &clock,
        Flow::Teacher,
        vec![single_row("S1", "Matematika", 5)],
    )
    .await;

    let err = Dashboard::begin_status_change(
        &dash,
        &EntryKey::session("S9"),
        Status::Sick,
        "demam",
        None,
        None,
    )
    .expect_err("session is not on the schedule");
    assert_eq!(err.code(), "session_not_found");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn multi_teacher_update_needs_a_teacher() {
    let backend = FakeBackend::new();
    let clock = TestClock::new(TODAY);
    let dash = open_dashboard(
        &backend,
        &clock,
        Flow::Teacher,
        vec![multi_row("S2", "Fisika", "7|Budi|Hadir|;9|Sari||")],
    )
    .await;

    let err = Dashboard::begin_status_change(
        &dash,
        &EntryKey::session("S2"),
        Status::Sick,
        "demam",
        None,
        None,
    )
    .expect_err("bare key is ambiguous");
    assert_eq!(err.code(), "ambiguous_teacher");

    let err = Dashboard::begin_status_change(
        &dash,
        &EntryKey::session_teacher("S2", 11),
        Status::Sick,
        "demam",
        None,
        None,
    )
    .expect_err("teacher 11 is not listed");
    assert_eq!(err.code(), "invalid_teacher_id");

    let ticket = Dashboard::begin_status_change(
        &dash,
        &EntryKey::session_teacher("S2", 9),
        Status::Sick,
        "demam",
        None,
        None,
    )
    .expect("begin accepted")
    .expect("key was free");
    assert_eq!(ticket.write().teacher_id, 9);
    backend.queue_snapshot(vec![multi_row(
        "S2",
        "Fisika",
        "7|Budi|Hadir|;9|Sari|Sakit|demam",
    )]);
    ticket.settle().await.expect("settle");
    let entry = dash
        .entry(&EntryKey::session_teacher("S2", 9))
        .expect("entry present");
    assert_eq!(entry.status, Status::Sick);
    assert_eq!(entry.note, "demam");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn assignment_flag_rides_along_for_allowed_statuses() {
    let backend = FakeBackend::new();
    let clock = TestClock::new(TODAY);
    let dash = open_dashboard(
        &backend,
        &clock,
        Flow::Teacher,
        vec![single_row("S1", "Matematika", 5)],
    )
    .await;
    let key = EntryKey::session("S1");

    let ticket = Dashboard::begin_status_change(
        &dash,
        &key,
        Status::Absent,
        "tanpa kabar",
        Some(true),
        None,
    )
    .expect("begin accepted")
    .expect("key was free");
    assert!(ticket.write().has_assignment);
    assert!(dash.assignment_flag(&key));
    drop(ticket);

    // Present can never carry the assignment marker, whatever the flag says.
    let ticket =
        Dashboard::begin_status_change(&dash, &key, Status::Present, "", Some(true), None)
            .expect("begin accepted")
            .expect("key was free");
    assert!(!ticket.write().has_assignment);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn session_id_ending_in_colon_digits_resolves_unsplit() {
    let backend = FakeBackend::new();
    let clock = TestClock::new(TODAY);
    // The id looks like a co-teacher key, but it is the whole session id.
    let dash = open_dashboard(
        &backend,
        &clock,
        Flow::Teacher,
        vec![single_row("J12:34", "Matematika", 5)],
    )
    .await;
    let key = EntryKey::session("J12:34");
    assert_eq!(dash.entry(&key).expect("seeded").status, Status::Present);

    let ticket =
        Dashboard::begin_status_change(&dash, &EntryKey::parse("J12:34"), Status::Sick, "demam", None, None)
            .expect("begin accepted")
            .expect("key was free");
    assert_eq!(ticket.key(), &key);
    assert_eq!(ticket.write().session_id, "J12:34");
    assert_eq!(ticket.write().teacher_id, 5);
    assert!(format!("{ticket:?}").contains("J12:34"));
    assert!(dash.is_pending(&key));

    backend.queue_snapshot(vec![single_row_recorded(
        "J12:34",
        "Matematika",
        5,
        "Sakit",
        "demam",
    )]);
    ticket.settle().await.expect("settle");
    assert_eq!(dash.entry(&key).expect("entry").status, Status::Sick);
    assert!(!dash.is_pending(&key));

    let canonical = dash.set_late_flag(&EntryKey::parse("J12:34"), true).expect("flag set");
    assert_eq!(canonical, key);
    assert!(dash.late_flag(&key));
}
