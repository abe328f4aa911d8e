/// Report time zone helpers
///
/// Timestamps are stored in UTC. Calendar questions ("which month", "which
/// day", the `HH:MM dd/mm` rendering in reports) are answered in one fixed
/// report offset, UTC+7 unless configured otherwise.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// Default report offset in minutes east of UTC (Indochina Time)
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 7 * 60;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Fixed-offset zone used for calendar logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportZone {
    offset: FixedOffset,
}

impl Default for ReportZone {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_UTC_OFFSET_MINUTES)
    }
}

impl ReportZone {
    /// Builds a zone from minutes east of UTC; out-of-range values fall back to UTC
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or(Utc.fix());
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::from_offset_minutes(0)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local(&self, ts: DateTime<Utc>) -> DateTime<FixedOffset> {
        ts.with_timezone(&self.offset)
    }

    /// Calendar date of a timestamp in this zone
    pub fn date_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        self.local(ts).date_naive()
    }

    /// `(year, month)` of a timestamp in this zone
    pub fn month_of(&self, ts: DateTime<Utc>) -> (i32, u32) {
        let local = self.local(ts);
        (local.year(), local.month())
    }

    /// Whether two timestamps fall in the same calendar month
    pub fn same_month(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.month_of(a) == self.month_of(b)
    }

    /// First and last calendar day of the month containing `now`
    pub fn month_range(&self, now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
        let (year, month) = self.month_of(now);
        let first = first_of_month(year, month);
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let last = first_of_month(next_year, next_month) - Duration::days(1);
        (first, last)
    }

    /// The twelve `(year, month)` pairs ending with the month of `now`, oldest first
    pub fn trailing_months(&self, now: DateTime<Utc>, count: u32) -> Vec<(i32, u32)> {
        let (year, month) = self.month_of(now);
        let current = year * 12 + (month as i32 - 1);
        (0..count as i32)
            .rev()
            .map(|back| {
                let index = current - back;
                (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
            })
            .collect()
    }

    /// Renders `HH:MM dd/mm`
    pub fn format_short(&self, ts: DateTime<Utc>) -> String {
        self.local(ts).format("%H:%M %d/%m").to_string()
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// Whole days until `due`, rounded up
///
/// A deadline one hour away is 1 day left; one hour ago is 0; 25 hours ago
/// is -1.
pub fn days_left(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (due - now).num_milliseconds();
    (millis + MILLIS_PER_DAY - 1).div_euclid(MILLIS_PER_DAY)
}
