//! Calendar and streak arithmetic shared by the aggregation services.
//!
//! # Responsibility
//! - Convert between calendar dates and epoch-millisecond ranges.
//! - Compute habit streaks and completion windows from completed days.
//!
//! # Invariants
//! - All conversions are UTC.
//! - Ranges are half-open: `start <= t < end`.

pub mod period;
pub mod streak;
