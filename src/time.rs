use chrono::{Duration, NaiveDate, Utc};

/// Dates as the school sees them. The portal runs on Western Indonesian Time
/// (UTC+7, no DST), so the school's "today" can differ from the host's UTC
/// date for a few hours every night.
pub trait SchoolClock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SchoolClock for SystemClock {
    fn today(&self) -> NaiveDate {
        (Utc::now() + Duration::hours(7)).date_naive()
    }
}

/// Clock pinned to one date; used by tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl SchoolClock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
