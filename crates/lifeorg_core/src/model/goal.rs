//! Goal, progress, milestone, journal and review models.
//!
//! # Responsibility
//! - Define goal tracking records and their derived figures (progress,
//!   overdue, days remaining).
//! - Define journaling records (daily entries, monthly reviews).
//!
//! # Invariants
//! - `completed_at` is set iff `status == Completed`.
//! - Progress percentage is capped at 100.
//! - Journal entries are unique per day, reviews unique per month.

use super::money::{percentage, round_to};
use super::{
    limit_text, normalize_tags, require_rating, require_text, RecordId, UserId, ValidationError,
    ValidationResult,
};
use crate::analytics::period::{month_name, month_start};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

db_enum! {
    pub enum GoalType {
        Numeric => "numeric",
        Boolean => "boolean",
        Habit => "habit",
        Financial => "financial",
    }
}

db_enum! {
    pub enum GoalStatus {
        Active => "active",
        Completed => "completed",
        Paused => "paused",
        Cancelled => "cancelled",
    }
}

impl GoalStatus {
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

db_enum! {
    pub enum GoalFrequency {
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
        Yearly => "yearly",
        OneTime => "one_time",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: RecordId,
    pub user_id: UserId,
    pub category_id: Option<RecordId>,
    pub title: String,
    pub description: String,
    pub goal_type: GoalType,
    pub status: GoalStatus,
    pub frequency: GoalFrequency,
    pub target_value: Option<Decimal>,
    pub current_value: Decimal,
    pub unit: String,
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    /// Epoch milliseconds; present iff `status == Completed`.
    pub completed_at: Option<i64>,
    pub is_public: bool,
    pub reminder_enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Goal {
    pub fn new(
        user_id: UserId,
        title: impl Into<String>,
        goal_type: GoalType,
        start_date: NaiveDate,
        target_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            category_id: None,
            title: title.into(),
            description: String::new(),
            goal_type,
            status: GoalStatus::Active,
            frequency: GoalFrequency::OneTime,
            target_value: None,
            current_value: Decimal::ZERO,
            unit: String::new(),
            start_date,
            target_date,
            completed_at: None,
            is_public: false,
            reminder_enabled: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, 255)?;
        limit_text("unit", &self.unit, 50)?;
        if self.target_date < self.start_date {
            return Err(ValidationError::new(
                "target_date",
                "target date must not be before start date",
            ));
        }
        if self.target_value.is_some_and(|value| value < Decimal::ZERO) {
            return Err(ValidationError::new(
                "target_value",
                "target value must not be negative",
            ));
        }
        Ok(())
    }

    /// Moves the goal to `status`, stamping or clearing `completed_at`.
    pub fn set_status(&mut self, status: GoalStatus, now_ms: i64) {
        if status == GoalStatus::Completed {
            if self.status != GoalStatus::Completed || self.completed_at.is_none() {
                self.completed_at = Some(now_ms);
            }
        } else {
            self.completed_at = None;
        }
        self.status = status;
    }

    /// Progress in percent, two fractional digits.
    ///
    /// Boolean goals are all-or-nothing; numeric and financial goals compare
    /// current to target, capped at 100; habits report 0 here and are tracked
    /// by streaks instead.
    pub fn progress_percentage(&self) -> f64 {
        match self.goal_type {
            GoalType::Boolean => {
                if self.status == GoalStatus::Completed {
                    100.0
                } else {
                    0.0
                }
            }
            GoalType::Numeric | GoalType::Financial => match self.target_value {
                Some(target) if !target.is_zero() => {
                    round_to(percentage(self.current_value, target).min(100.0), 2)
                }
                _ => 0.0,
            },
            GoalType::Habit => 0.0,
        }
    }

    /// Open and past its target date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_closed() && today > self.target_date
    }

    /// Whole days until the target date, never negative; 0 once closed.
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        if self.status.is_closed() {
            return 0;
        }
        (self.target_date - today).num_days().max(0)
    }

    /// Numeric and financial goals take progress values as their current value.
    pub fn tracks_value(&self) -> bool {
        matches!(self.goal_type, GoalType::Numeric | GoalType::Financial)
    }
}

/// One day's progress on a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub id: RecordId,
    pub goal_id: RecordId,
    pub user_id: UserId,
    pub progress_date: NaiveDate,
    pub value: Decimal,
    pub notes: String,
    /// Habit check-off for the day.
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GoalProgress {
    pub fn new(goal_id: RecordId, user_id: UserId, progress_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal_id,
            user_id,
            progress_date,
            value: Decimal::ZERO,
            notes: String::new(),
            completed: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        limit_text("notes", &self.notes, 10_000)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalMilestone {
    pub id: RecordId,
    pub goal_id: RecordId,
    pub title: String,
    pub description: String,
    pub target_value: Option<Decimal>,
    pub target_date: NaiveDate,
    pub is_completed: bool,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GoalMilestone {
    pub fn new(goal_id: RecordId, title: impl Into<String>, target_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal_id,
            title: title.into(),
            description: String::new(),
            target_value: None,
            target_date,
            is_completed: false,
            completed_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, 255)
    }

    /// Marks the milestone done; keeps the first completion time.
    pub fn complete(&mut self, now_ms: i64) {
        if !self.is_completed || self.completed_at.is_none() {
            self.completed_at = Some(now_ms);
        }
        self.is_completed = true;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: RecordId,
    pub user_id: UserId,
    pub entry_date: NaiveDate,
    pub title: String,
    pub content: String,
    pub mood_rating: Option<u8>,
    /// Normalized tags.
    pub tags: Vec<String>,
    pub is_private: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl JournalEntry {
    pub fn new(user_id: UserId, entry_date: NaiveDate, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            entry_date,
            title: String::new(),
            content: content.into(),
            mood_rating: None,
            tags: Vec::new(),
            is_private: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        limit_text("title", &self.title, 255)?;
        require_text("content", &self.content, 100_000)?;
        if let Some(mood) = self.mood_rating {
            require_rating("mood_rating", mood)?;
        }
        limit_text("tags", &self.tags.join(","), 500)
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReview {
    pub id: RecordId,
    pub user_id: UserId,
    /// First day of the reviewed month.
    pub review_month: NaiveDate,
    pub achievements: String,
    pub challenges: String,
    pub lessons_learned: String,
    pub next_month_focus: String,
    pub overall_satisfaction: u8,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MonthlyReview {
    pub fn new(user_id: UserId, month: NaiveDate, overall_satisfaction: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            review_month: month_start(month),
            achievements: String::new(),
            challenges: String::new(),
            lessons_learned: String::new(),
            next_month_focus: String::new(),
            overall_satisfaction,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        if self.review_month.day() != 1 {
            return Err(ValidationError::new(
                "review_month",
                "review month must be the first day of a month",
            ));
        }
        require_rating("overall_satisfaction", self.overall_satisfaction)
    }

    /// `March 2024` style label.
    pub fn month_label(&self) -> String {
        format!(
            "{} {}",
            month_name(self.review_month.month()),
            self.review_month.year()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Goal, GoalStatus, GoalType, JournalEntry, MonthlyReview};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn numeric_goal(target: Option<Decimal>, current: Decimal) -> Goal {
        let mut goal = Goal::new(Uuid::new_v4(), "read", GoalType::Numeric, day(1, 1), day(12, 31));
        goal.target_value = target;
        goal.current_value = current;
        goal
    }

    #[test]
    fn numeric_progress_is_capped_and_guards_zero_target() {
        assert_eq!(
            numeric_goal(Some(Decimal::from(20)), Decimal::from(5)).progress_percentage(),
            25.0
        );
        assert_eq!(
            numeric_goal(Some(Decimal::from(20)), Decimal::from(45)).progress_percentage(),
            100.0
        );
        assert_eq!(
            numeric_goal(Some(Decimal::ZERO), Decimal::from(5)).progress_percentage(),
            0.0
        );
        assert_eq!(numeric_goal(None, Decimal::from(5)).progress_percentage(), 0.0);
    }

    #[test]
    fn boolean_progress_follows_completion() {
        let mut goal = Goal::new(Uuid::new_v4(), "ship", GoalType::Boolean, day(1, 1), day(2, 1));
        assert_eq!(goal.progress_percentage(), 0.0);
        goal.set_status(GoalStatus::Completed, 42);
        assert_eq!(goal.progress_percentage(), 100.0);
        assert_eq!(goal.completed_at, Some(42));
        goal.set_status(GoalStatus::Paused, 43);
        assert_eq!(goal.completed_at, None);
    }

    #[test]
    fn overdue_and_days_remaining_respect_status() {
        let mut goal = Goal::new(Uuid::new_v4(), "run", GoalType::Habit, day(1, 1), day(3, 10));
        assert!(!goal.is_overdue(day(3, 10)));
        assert!(goal.is_overdue(day(3, 11)));
        assert_eq!(goal.days_remaining(day(3, 1)), 9);
        assert_eq!(goal.days_remaining(day(4, 1)), 0);
        goal.set_status(GoalStatus::Cancelled, 0);
        assert!(!goal.is_overdue(day(4, 1)));
        assert_eq!(goal.days_remaining(day(3, 1)), 0);
    }

    #[test]
    fn target_date_must_follow_start_date() {
        let goal = Goal::new(Uuid::new_v4(), "x", GoalType::Boolean, day(5, 1), day(4, 1));
        assert_eq!(goal.validate().unwrap_err().field, "target_date");
    }

    #[test]
    fn journal_rules() {
        let mut entry = JournalEntry::new(Uuid::new_v4(), day(5, 5), "A calm  day\nat home");
        entry.set_tags(["Calm", "home", "calm"]);
        assert_eq!(entry.tags, vec!["calm".to_string(), "home".to_string()]);
        assert_eq!(entry.word_count(), 5);
        entry.mood_rating = Some(11);
        assert_eq!(entry.validate().unwrap_err().field, "mood_rating");
        entry.mood_rating = Some(7);
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn review_month_is_normalized() {
        let review = MonthlyReview::new(Uuid::new_v4(), day(6, 18), 8);
        assert_eq!(review.review_month, day(6, 1));
        assert_eq!(review.month_label(), "June 2024");
        assert!(review.validate().is_ok());
        assert!(MonthlyReview::new(Uuid::new_v4(), day(6, 1), 0).validate().is_err());
    }
}
