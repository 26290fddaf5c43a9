use chrono::{Duration, NaiveDate};

/// Who is using the dashboard. The flow decides how far back attendance may
/// still be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Teacher,
    Student,
}

impl Flow {
    pub fn window_days(self) -> i64 {
        match self {
            Flow::Teacher => 30,
            Flow::Student => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Flow::Teacher => "teacher",
            Flow::Student => "student",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "teacher" => Some(Flow::Teacher),
            "student" => Some(Flow::Student),
            _ => None,
        }
    }
}

/// Live mode tracks today; historical mode pins a chosen date inside the
/// edit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Live,
    Historical,
}

impl WindowMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WindowMode::Live => "live",
            WindowMode::Historical => "historical",
        }
    }
}

/// Bounded historical edit window. The selected date is always clamped to
/// `[today - window, today]`; the future is never selectable.
#[derive(Debug, Clone, Copy)]
pub struct EditWindow {
    flow: Flow,
    mode: WindowMode,
    selected: NaiveDate,
}

impl EditWindow {
    pub fn new(flow: Flow, today: NaiveDate) -> Self {
        Self {
            flow,
            mode: WindowMode::Live,
            selected: today,
        }
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected
    }

    pub fn min_date(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.flow.window_days())
    }

    pub fn max_date(&self, today: NaiveDate) -> NaiveDate {
        today
    }

    /// Switches to historical mode, starting from today.
    pub fn enter_edit_mode(&mut self, today: NaiveDate) {
        self.mode = WindowMode::Historical;
        self.selected = today;
    }

    /// Returns to live mode on today's date.
    pub fn exit_edit_mode(&mut self, today: NaiveDate) {
        self.mode = WindowMode::Live;
        self.selected = today;
    }

    /// Moves the selection, clamped to the window, and reports the date that
    /// actually took effect. Selecting a date always means historical mode,
    /// even when the clamp lands on today.
    pub fn set_selected_date(&mut self, requested: NaiveDate, today: NaiveDate) -> NaiveDate {
        let effective = requested.clamp(self.min_date(today), self.max_date(today));
        self.mode = WindowMode::Historical;
        self.selected = effective;
        effective
    }

    /// In live mode the selection follows the clock across midnight.
    pub fn follow_today(&mut self, today: NaiveDate) {
        if self.mode == WindowMode::Live {
            self.selected = today;
        }
    }
}
