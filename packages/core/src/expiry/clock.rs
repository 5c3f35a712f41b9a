//! Source of "today" for expiry arithmetic.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock, read in a fixed UTC offset so the calendar date does not
/// depend on the host timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Clock pinned to a single date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
