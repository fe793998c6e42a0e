//! Habit streak arithmetic over sets of completed days.
//!
//! # Invariants
//! - The current streak counts backward from the reference day and stops at
//!   the first day without a completed entry.
//! - The reference day itself must be completed for a non-zero streak.

use crate::model::money::round_to;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

/// One cell of a trailing completion grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCompletion {
    pub date: NaiveDate,
    pub completed: bool,
}

/// Consecutive completed days ending at `as_of`.
pub fn current_streak(completed: &BTreeSet<NaiveDate>, as_of: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut day = Some(as_of);
    while let Some(current) = day.filter(|d| completed.contains(d)) {
        streak += 1;
        day = current.pred_opt();
    }
    streak
}

/// Longest run of consecutive completed days anywhere in the set.
pub fn longest_streak(completed: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in completed {
        run = match previous {
            Some(prev) if *day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }
    longest
}

/// Completed days among the `window_days` days ending at `as_of`, as a
/// percentage with one fractional digit.
pub fn completion_rate(completed: &BTreeSet<NaiveDate>, as_of: NaiveDate, window_days: u32) -> f64 {
    if window_days == 0 {
        return 0.0;
    }
    let first = as_of - Duration::days(i64::from(window_days) - 1);
    let hits = completed.range(first..=as_of).count() as f64;
    round_to(hits / f64::from(window_days) * 100.0, 1)
}

/// Completion flags for the `days` days ending at `as_of`, oldest first.
pub fn trailing_days(completed: &BTreeSet<NaiveDate>, as_of: NaiveDate, days: u32) -> Vec<DayCompletion> {
    (0..i64::from(days))
        .rev()
        .map(|back| {
            let date = as_of - Duration::days(back);
            DayCompletion {
                date,
                completed: completed.contains(&date),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{completion_rate, current_streak, longest_streak, trailing_days};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn current_streak_stops_at_first_gap() {
        let completed: BTreeSet<_> = [day(10), day(9), day(8), day(6), day(5)].into();
        assert_eq!(current_streak(&completed, day(10)), 3);
        assert_eq!(current_streak(&completed, day(6)), 2);
        assert_eq!(current_streak(&completed, day(7)), 0);
        assert_eq!(current_streak(&completed, day(11)), 0);
    }

    #[test]
    fn longest_streak_scans_all_runs() {
        let completed: BTreeSet<_> = [day(1), day(2), day(4), day(5), day(6), day(7), day(9)].into();
        assert_eq!(longest_streak(&completed), 4);
        assert_eq!(longest_streak(&BTreeSet::new()), 0);
    }

    #[test]
    fn completion_rate_uses_trailing_window() {
        let completed: BTreeSet<_> = [day(1), day(20), day(29), day(30)].into();
        assert_eq!(completion_rate(&completed, day(30), 30), 13.3);
        assert_eq!(completion_rate(&completed, day(30), 0), 0.0);
    }

    #[test]
    fn trailing_days_are_oldest_first() {
        let completed: BTreeSet<_> = [day(7)].into();
        let grid = trailing_days(&completed, day(7), 7);
        assert_eq!(grid.len(), 7);
        assert_eq!(grid[0].date, day(1));
        assert!(!grid[0].completed);
        assert!(grid[6].completed);
    }
}
