//! Date/instant helpers.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Current instant in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC calendar day.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Epoch milliseconds of `date` at 00:00 UTC.
pub fn date_start_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// UTC calendar day containing the instant `ms`.
pub fn date_of_ms(ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|instant| instant.date_naive())
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// First day of the month after the one containing `date`.
///
/// Saturates to `NaiveDate::MAX` in the last representable month.
pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    shift_month(date, 1).unwrap_or(NaiveDate::MAX)
}

/// Number of days in `month` (1-based) of `year`; 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    match shift_month(first, 1) {
        Some(next) => u32::try_from((next - first).num_days()).unwrap_or(0),
        // December of the last representable year.
        None => 31,
    }
}

/// Start of the day after `date`, or `None` past the calendar's end.
fn day_after_start_ms(date: NaiveDate) -> Option<i64> {
    date.succ_opt().map(date_start_ms)
}

/// First day of the month `delta` months away from `date`'s month.
pub fn shift_month(date: NaiveDate, delta: i32) -> Option<NaiveDate> {
    let index = date.year() * 12 + date.month0() as i32 + delta;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
}

/// Month starts of the `count` months ending with `date`'s month, oldest first.
pub fn trailing_month_starts(date: NaiveDate, count: u32) -> Vec<NaiveDate> {
    (0..count as i32)
        .rev()
        .filter_map(|back| shift_month(date, -back))
        .collect()
}

/// English month name for a 1-based month number.
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("")
}

/// Short trend label such as `Mar 2024`.
pub fn month_label(month_start: NaiveDate) -> String {
    month_start.format("%b %Y").to_string()
}

/// Half-open instant range; `None` bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EpochRange {
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

impl EpochRange {
    /// Unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    /// `[start, end)` in epoch milliseconds.
    pub fn between(start_ms: i64, end_ms: i64) -> Self {
        Self {
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
        }
    }

    /// Whole days from `first` through `last` inclusive.
    ///
    /// A `last` of `NaiveDate::MAX` leaves the end unbounded.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            start_ms: Some(date_start_ms(first)),
            end_ms: day_after_start_ms(last),
        }
    }

    /// Optional inclusive day bounds, as used by list filters.
    pub fn from_optional_days(first: Option<NaiveDate>, last: Option<NaiveDate>) -> Self {
        Self {
            start_ms: first.map(date_start_ms),
            end_ms: last.and_then(day_after_start_ms),
        }
    }

    /// The whole calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        Self::between(
            date_start_ms(month_start(date)),
            date_start_ms(next_month_start(date)),
        )
    }

    pub fn contains(&self, ms: i64) -> bool {
        self.start_ms.map_or(true, |start| ms >= start) && self.end_ms.map_or(true, |end| ms < end)
    }
}

/// Resolves a `(year, month)` pair to its first day.
pub fn month_from_parts(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::{
        date_of_ms, date_start_ms, days_in_month, month_label, month_name, month_start,
        next_month_start, shift_month, trailing_month_starts, EpochRange,
    };
    use chrono::{Datelike, NaiveDate};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_boundaries() {
        assert_eq!(month_start(day(2024, 2, 17)), day(2024, 2, 1));
        assert_eq!(next_month_start(day(2024, 2, 17)), day(2024, 3, 1));
        assert_eq!(next_month_start(day(2024, 12, 31)), day(2025, 1, 1));
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2024, 9), 30);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2024, 13), 0);
    }

    #[test]
    fn calendar_edges_do_not_overflow() {
        assert_eq!(next_month_start(NaiveDate::MAX), NaiveDate::MAX);
        assert_eq!(days_in_month(NaiveDate::MAX.year(), 12), 31);

        let open_ended = EpochRange::days(day(2024, 1, 1), NaiveDate::MAX);
        assert_eq!(open_ended.end_ms, None);
        assert!(open_ended.contains(date_start_ms(NaiveDate::MAX)));

        let filter = EpochRange::from_optional_days(None, Some(NaiveDate::MAX));
        assert_eq!(filter, EpochRange::all());
        assert!(EpochRange::month_of(NaiveDate::MAX).contains(date_start_ms(month_start(NaiveDate::MAX))));
    }

    #[test]
    fn shifting_months_crosses_years() {
        assert_eq!(shift_month(day(2024, 1, 20), -1), Some(day(2023, 12, 1)));
        assert_eq!(shift_month(day(2024, 11, 5), 3), Some(day(2025, 2, 1)));
        assert_eq!(
            trailing_month_starts(day(2024, 2, 10), 3),
            vec![day(2023, 12, 1), day(2024, 1, 1), day(2024, 2, 1)]
        );
    }

    #[test]
    fn epoch_ranges_are_half_open() {
        let range = EpochRange::days(day(2024, 3, 1), day(2024, 3, 1));
        let start = date_start_ms(day(2024, 3, 1));
        assert!(range.contains(start));
        assert!(range.contains(start + 86_399_999));
        assert!(!range.contains(start + 86_400_000));
        assert!(EpochRange::all().contains(i64::MIN));
        assert_eq!(date_of_ms(start + 1000), Some(day(2024, 3, 1)));
    }

    #[test]
    fn month_labels() {
        assert_eq!(month_name(3), "March");
        assert_eq!(month_name(13), "");
        assert_eq!(month_label(day(2024, 3, 1)), "Mar 2024");
    }
}
