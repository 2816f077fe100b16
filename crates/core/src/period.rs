use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Widens the range by `buffer_days` on both sides. Used to keep
    /// candidates dated just outside a statement period in play.
    pub fn expand(self, buffer_days: i64) -> Self {
        DateRange {
            start: self.start - Duration::days(buffer_days),
            end: self.end + Duration::days(buffer_days),
        }
    }
}
