//! Attendance core for the school portal dashboards. Keeps optimistic
//! per-entry status state, serializes writes per key with rollback on
//! failure, reconciles against fresh snapshots after a settle delay, and
//! bounds how far back attendance may still be edited.

pub mod backend;
pub mod dashboard;
pub mod edit_window;
pub mod entry;
pub mod error;
pub mod ipc;
pub mod pending;
pub mod schedule;
pub mod store;
pub mod time;
pub mod validate;
