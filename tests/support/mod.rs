#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use presensid::backend::{
    AttendanceBackend, BatchAck, BatchWrite, SnapshotScope, StatusWrite, WriteAck,
};
use presensid::dashboard::Dashboard;
use presensid::edit_window::Flow;
use presensid::error::AttendanceError;
use presensid::schedule::ScheduleRow;
use presensid::time::SchoolClock;

pub const TODAY: &str = "2024-05-06";

pub fn date(s: &str) -> NaiveDate {
    s.parse().expect("valid date literal")
}

/// Clock the tests can move, including backwards.
pub struct TestClock {
    today: Cell<NaiveDate>,
}

impl TestClock {
    pub fn new(s: &str) -> Rc<Self> {
        Rc::new(Self {
            today: Cell::new(date(s)),
        })
    }

    pub fn set(&self, s: &str) {
        self.today.set(date(s));
    }
}

impl SchoolClock for TestClock {
    fn today(&self) -> NaiveDate {
        self.today.get()
    }
}

/// Scripted collaborator. Responses are queued per call kind; every call is
/// recorded so tests can assert exactly what went over the wire. An empty
/// queue answers with the benign default for its kind.
#[derive(Default)]
pub struct FakeBackend {
    pub snapshots: RefCell<VecDeque<Result<Vec<ScheduleRow>, AttendanceError>>>,
    pub write_acks: RefCell<VecDeque<Result<WriteAck, AttendanceError>>>,
    pub batch_acks: RefCell<VecDeque<Result<BatchAck, AttendanceError>>>,
    pub fetches: RefCell<Vec<SnapshotScope>>,
    pub writes: RefCell<Vec<StatusWrite>>,
    pub batches: RefCell<Vec<BatchWrite>>,
    pub stall_batch: Cell<bool>,
}

impl FakeBackend {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn queue_snapshot(&self, rows: Vec<ScheduleRow>) {
        self.snapshots.borrow_mut().push_back(Ok(rows));
    }

    pub fn queue_snapshot_err(&self, reason: &str) {
        self.snapshots
            .borrow_mut()
            .push_back(Err(AttendanceError::SnapshotLoadFailed {
                reason: reason.to_string(),
            }));
    }

    pub fn queue_write_ok(&self, is_multi_teacher: Option<bool>) {
        self.write_acks.borrow_mut().push_back(Ok(WriteAck {
            success: true,
            is_multi_teacher,
        }));
    }

    pub fn queue_write_rejected(&self) {
        self.write_acks.borrow_mut().push_back(Ok(WriteAck {
            success: false,
            is_multi_teacher: None,
        }));
    }

    pub fn queue_write_err(&self, reason: &str) {
        self.write_acks
            .borrow_mut()
            .push_back(Err(AttendanceError::WriteFailed {
                reason: reason.to_string(),
            }));
    }

    pub fn queue_batch_ack(&self, success: bool, message: Option<&str>) {
        self.batch_acks.borrow_mut().push_back(Ok(BatchAck {
            success,
            message: message.map(|m| m.to_string()),
        }));
    }
}

#[async_trait(?Send)]
impl AttendanceBackend for FakeBackend {
    async fn fetch_snapshot(
        &self,
        scope: SnapshotScope,
    ) -> Result<Vec<ScheduleRow>, AttendanceError> {
        self.fetches.borrow_mut().push(scope);
        self.snapshots
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn submit_status(&self, write: &StatusWrite) -> Result<WriteAck, AttendanceError> {
        self.writes.borrow_mut().push(write.clone());
        self.write_acks.borrow_mut().pop_front().unwrap_or_else(|| {
            Ok(WriteAck {
                success: true,
                is_multi_teacher: None,
            })
        })
    }

    async fn submit_batch(&self, write: &BatchWrite) -> Result<BatchAck, AttendanceError> {
        self.batches.borrow_mut().push(write.clone());
        // Lets a second caller run while this one is "on the wire".
        if self.stall_batch.get() {
            tokio::task::yield_now().await;
        }
        self.batch_acks.borrow_mut().pop_front().unwrap_or_else(|| {
            Ok(BatchAck {
                success: true,
                message: None,
            })
        })
    }
}

pub fn base_row(id: &str, subject: &str) -> ScheduleRow {
    ScheduleRow {
        jadwal_id: id.to_string(),
        mapel: subject.to_string(),
        kelas: "X-1".to_string(),
        hari: "Senin".to_string(),
        jam_mulai: "07:00".to_string(),
        jam_selesai: "08:30".to_string(),
        ruang: None,
        guru_id: None,
        jenis_kegiatan: "belajar".to_string(),
        status_kehadiran: None,
        keterangan: None,
        is_multi_guru: false,
        guru_list: None,
    }
}

pub fn single_row(id: &str, subject: &str, teacher_id: i64) -> ScheduleRow {
    let mut row = base_row(id, subject);
    row.guru_id = Some(teacher_id);
    row
}

pub fn single_row_recorded(
    id: &str,
    subject: &str,
    teacher_id: i64,
    status: &str,
    note: &str,
) -> ScheduleRow {
    let mut row = single_row(id, subject, teacher_id);
    row.status_kehadiran = Some(status.to_string());
    row.keterangan = Some(note.to_string());
    row
}

pub fn multi_row(id: &str, subject: &str, guru_list: &str) -> ScheduleRow {
    let mut row = base_row(id, subject);
    row.is_multi_guru = true;
    row.guru_list = Some(guru_list.to_string());
    row
}

pub fn non_attendable_row(id: &str, kind: &str) -> ScheduleRow {
    let mut row = base_row(id, "Upacara Bendera");
    row.jenis_kegiatan = kind.to_string();
    row
}

pub async fn open_dashboard(
    backend: &Rc<FakeBackend>,
    clock: &Rc<TestClock>,
    flow: Flow,
    rows: Vec<ScheduleRow>,
) -> Rc<Dashboard> {
    backend.queue_snapshot(rows);
    Dashboard::open(
        backend.clone(),
        clock.clone(),
        flow,
        Duration::from_millis(600),
    )
    .await
    .expect("open dashboard")
}
