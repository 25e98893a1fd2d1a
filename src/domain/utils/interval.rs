use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Half-open interval `[begin, end)` of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeInterval {
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeInterval {
    pub fn new(begin: NaiveDateTime, end: NaiveDateTime) -> Self {
        TimeInterval { begin, end }
    }

    pub fn on_date(date: NaiveDate, begin: NaiveTime, end: NaiveTime) -> Self {
        TimeInterval { begin: date.and_time(begin), end: date.and_time(end) }
    }

    /// Back-to-back intervals (`[8,9)` and `[9,10)`) do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.begin < other.end && self.end > other.begin
    }

    /// Every calendar date the interval touches. An interval ending exactly at
    /// midnight does not touch the following day.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let first = self.begin.date();
        let last = if self.end.time() == NaiveTime::MIN && self.end > self.begin { self.end.date().pred_opt().unwrap_or(first) } else { self.end.date() };

        let mut dates = Vec::new();
        let mut current = first;
        while current <= last {
            dates.push(current);
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        dates
    }

    /// Dates whose bookings may overlap the interval: the touched dates plus
    /// the day before, whose overnight bookings run into the first date.
    pub fn occupancy_dates(&self) -> Vec<NaiveDate> {
        let mut dates = self.dates();
        if let Some(previous) = self.begin.date().pred_opt() {
            dates.insert(0, previous);
        }
        dates
    }
}
