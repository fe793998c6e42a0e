//! Goal, progress, milestone, journal and review use cases.
//!
//! # Responsibility
//! - Keep goal status, completion stamps and tracked values consistent.
//! - Derive progress, habit streaks, suggestions and goal analytics.
//!
//! # Invariants
//! - Every record is scoped to its owning user; milestones through their goal.
//! - One progress entry per `(goal, day)`; progress updates upsert it.
//! - Suggestions are deterministic for a given data set.

use super::{found, ServiceError, ServiceResult};
use crate::analytics::period::{month_label, month_start, trailing_month_starts, EpochRange};
use crate::analytics::streak::{
    completion_rate, current_streak, longest_streak, trailing_days, DayCompletion,
};
use crate::model::category::{Category, CategoryKind};
use crate::model::goal::{
    Goal, GoalFrequency, GoalMilestone, GoalProgress, GoalStatus, GoalType, JournalEntry,
    MonthlyReview,
};
use crate::model::money::{count_percentage, round_to};
use crate::model::{double_option, RecordId, UserId};
use crate::repo::category_repo::CategoryRepository;
use crate::repo::goal_repo::{
    GoalCategoryCounts, GoalQuery, GoalRepository, JournalQuery, ProgressQuery,
};
use chrono::{DateTime, Days, Duration, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_SUGGESTIONS: usize = 5;
const HABIT_WINDOW_DAYS: u32 = 30;
const HABIT_GRID_DAYS: u32 = 7;
const HABIT_MIN_WEEKLY_ENTRIES: usize = 5;
const TREND_MONTHS: u32 = 6;
/// Upper bound for `days` look-back windows.
pub const MAX_WINDOW_DAYS: u32 = 3650;
const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoalCategoryInput {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoalCategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalCategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub goal_count: u32,
    pub active_goals: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<RecordId>,
    pub goal_type: GoalType,
    #[serde(default)]
    pub frequency: Option<GoalFrequency>,
    #[serde(default)]
    pub target_value: Option<Decimal>,
    #[serde(default)]
    pub current_value: Option<Decimal>,
    #[serde(default)]
    pub unit: String,
    /// Defaults to today.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    pub target_date: NaiveDate,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub reminder_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoalPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub category: Option<Option<RecordId>>,
    pub goal_type: Option<GoalType>,
    pub status: Option<GoalStatus>,
    pub frequency: Option<GoalFrequency>,
    #[serde(deserialize_with = "double_option")]
    pub target_value: Option<Option<Decimal>>,
    pub current_value: Option<Decimal>,
    pub unit: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub is_public: Option<bool>,
    pub reminder_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalView {
    #[serde(flatten)]
    pub goal: Goal,
    pub category_name: Option<String>,
    pub progress_percentage: f64,
    pub is_overdue: bool,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalSummary {
    pub total_goals: u32,
    pub active_goals: u32,
    pub completed_goals: u32,
    pub paused_goals: u32,
    pub overdue_goals: u32,
    pub completion_rate: f64,
    pub average_progress: f64,
}

/// Body of `update_progress`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgressUpdate {
    pub value: Decimal,
    pub notes: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressOutcome {
    pub message: &'static str,
    pub progress: GoalProgress,
    pub goal: GoalView,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressInput {
    pub goal: RecordId,
    pub progress_date: NaiveDate,
    #[serde(default)]
    pub value: Decimal,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgressPatch {
    pub progress_date: Option<NaiveDate>,
    pub value: Option<Decimal>,
    pub notes: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneInput {
    pub goal: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_value: Option<Decimal>,
    pub target_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MilestonePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub target_value: Option<Option<Decimal>>,
    pub target_date: Option<NaiveDate>,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalInput {
    /// Defaults to today.
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
    #[serde(default)]
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub mood_rating: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JournalPatch {
    pub entry_date: Option<NaiveDate>,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub mood_rating: Option<Option<u8>>,
    pub tags: Option<Vec<String>>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalView {
    #[serde(flatten)]
    pub entry: JournalEntry,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodPoint {
    pub date: NaiveDate,
    pub mood: u8,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodTrends {
    pub mood_trends: Vec<MoodPoint>,
    pub average_mood: f64,
    pub total_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    /// Any day of the reviewed month.
    pub review_month: NaiveDate,
    #[serde(default)]
    pub achievements: String,
    #[serde(default)]
    pub challenges: String,
    #[serde(default)]
    pub lessons_learned: String,
    #[serde(default)]
    pub next_month_focus: String,
    pub overall_satisfaction: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewPatch {
    pub achievements: Option<String>,
    pub challenges: Option<String>,
    pub lessons_learned: Option<String>,
    pub next_month_focus: Option<String>,
    pub overall_satisfaction: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: MonthlyReview,
    pub month_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyGoalCompletion {
    pub month: String,
    pub completed_goals: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalAnalytics {
    pub goal_completion_trend: Vec<MonthlyGoalCompletion>,
    pub category_distribution: BTreeMap<String, u32>,
    pub goal_type_distribution: BTreeMap<String, u32>,
    /// Days from start date to completion.
    pub average_goal_duration: f64,
    /// Completed share of goals per category name, in percent.
    pub success_rate_by_category: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub message: String,
    pub insight_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<RecordId>,
    pub action_suggestion: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestions {
    pub suggestions: Vec<Suggestion>,
    pub total_active_goals: usize,
    pub generated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitStats {
    pub goal_id: RecordId,
    pub habit_name: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Percent of the last 30 days completed.
    pub completion_rate: f64,
    /// Last seven days, oldest first.
    pub weekly_progress: Vec<DayCompletion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitReport {
    pub habits: Vec<HabitStats>,
    pub total_habits: usize,
}

/// Goal use-case facade.
pub struct GoalService<G: GoalRepository, C: CategoryRepository> {
    repo: G,
    categories: C,
}

impl<G: GoalRepository, C: CategoryRepository> GoalService<G, C> {
    pub fn new(repo: G, categories: C) -> Self {
        Self { repo, categories }
    }

    pub fn list_categories(&self, user_id: UserId) -> ServiceResult<Vec<GoalCategoryView>> {
        let counts = self.repo.goal_category_counts(user_id)?;
        Ok(self
            .categories
            .list_categories(user_id, CategoryKind::Goal)?
            .into_iter()
            .map(|category| goal_category_view(category, &counts))
            .collect())
    }

    pub fn get_category(&self, user_id: UserId, id: RecordId) -> ServiceResult<GoalCategoryView> {
        let category = found(
            self.categories.get_category(user_id, CategoryKind::Goal, id)?,
            "goal category",
        )?;
        let counts = self.repo.goal_category_counts(user_id)?;
        Ok(goal_category_view(category, &counts))
    }

    pub fn create_category(&self, user_id: UserId, input: GoalCategoryInput) -> ServiceResult<GoalCategoryView> {
        let mut category = Category::new(user_id, CategoryKind::Goal, input.name.trim());
        category.description = input.description;
        category.icon = input.icon;
        if let Some(color) = input.color {
            category.color = color;
        }
        self.categories
            .create_category(&category)
            .map_err(|err| duplicate_name(err.into()))?;
        self.get_category(user_id, category.id)
    }

    pub fn update_category(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: GoalCategoryPatch,
    ) -> ServiceResult<GoalCategoryView> {
        let mut category = found(
            self.categories.get_category(user_id, CategoryKind::Goal, id)?,
            "goal category",
        )?;
        if let Some(name) = patch.name {
            category.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            category.description = description;
        }
        if let Some(icon) = patch.icon {
            category.icon = icon;
        }
        if let Some(color) = patch.color {
            category.color = color;
        }
        self.categories
            .update_category(&category)
            .map_err(|err| duplicate_name(err.into()))?;
        self.get_category(user_id, id)
    }

    pub fn delete_category(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.categories.delete_category(user_id, CategoryKind::Goal, id)?;
        Ok(())
    }

    pub fn create_default_categories(&self, user_id: UserId) -> ServiceResult<Vec<Category>> {
        let created = self.categories.create_defaults(user_id, CategoryKind::Goal)?;
        info!(
            "event=category_defaults module=goals status=ok kind=goal created={}",
            created.len()
        );
        Ok(created)
    }

    pub fn list_goals(&self, user_id: UserId, query: &GoalQuery, today: NaiveDate) -> ServiceResult<Vec<GoalView>> {
        let names = self.category_names(user_id)?;
        Ok(self
            .repo
            .list_goals(user_id, query)?
            .into_iter()
            .map(|goal| goal_view(goal, &names, today))
            .collect())
    }

    pub fn active_goals(&self, user_id: UserId, today: NaiveDate) -> ServiceResult<Vec<GoalView>> {
        let query = GoalQuery {
            status: Some(GoalStatus::Active),
            ..GoalQuery::default()
        };
        self.list_goals(user_id, &query, today)
    }

    /// Active goals whose target date is before `today`.
    pub fn overdue_goals(&self, user_id: UserId, today: NaiveDate) -> ServiceResult<Vec<GoalView>> {
        let query = GoalQuery {
            status: Some(GoalStatus::Active),
            target_before: Some(today),
            ..GoalQuery::default()
        };
        self.list_goals(user_id, &query, today)
    }

    pub fn get_goal(&self, user_id: UserId, id: RecordId, today: NaiveDate) -> ServiceResult<GoalView> {
        let goal = found(self.repo.get_goal(user_id, id)?, "goal")?;
        let names = self.category_names(user_id)?;
        Ok(goal_view(goal, &names, today))
    }

    pub fn create_goal(
        &self,
        user_id: UserId,
        input: GoalInput,
        now_ms: i64,
        today: NaiveDate,
    ) -> ServiceResult<GoalView> {
        let mut goal = Goal::new(
            user_id,
            input.title.trim(),
            input.goal_type,
            input.start_date.unwrap_or(today),
            input.target_date,
        );
        goal.description = input.description;
        goal.category_id = input.category;
        if let Some(frequency) = input.frequency {
            goal.frequency = frequency;
        }
        goal.target_value = input.target_value;
        if let Some(current) = input.current_value {
            goal.current_value = current;
        }
        goal.unit = input.unit;
        goal.is_public = input.is_public;
        if let Some(enabled) = input.reminder_enabled {
            goal.reminder_enabled = enabled;
        }
        goal.validate()?;
        self.ensure_category(user_id, goal.category_id)?;
        goal.set_status(GoalStatus::Active, now_ms);

        self.repo.create_goal(&goal)?;
        info!(
            "event=goal_create module=goals status=ok user_id={user_id} goal_id={}",
            goal.id
        );
        self.get_goal(user_id, goal.id, today)
    }

    pub fn update_goal(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: GoalPatch,
        now_ms: i64,
        today: NaiveDate,
    ) -> ServiceResult<GoalView> {
        let mut goal = found(self.repo.get_goal(user_id, id)?, "goal")?;
        if let Some(title) = patch.title {
            goal.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            goal.description = description;
        }
        if let Some(category) = patch.category {
            goal.category_id = category;
        }
        if let Some(goal_type) = patch.goal_type {
            goal.goal_type = goal_type;
        }
        if let Some(status) = patch.status {
            goal.set_status(status, now_ms);
        }
        if let Some(frequency) = patch.frequency {
            goal.frequency = frequency;
        }
        if let Some(target) = patch.target_value {
            goal.target_value = target;
        }
        if let Some(current) = patch.current_value {
            goal.current_value = current;
        }
        if let Some(unit) = patch.unit {
            goal.unit = unit;
        }
        if let Some(start) = patch.start_date {
            goal.start_date = start;
        }
        if let Some(target) = patch.target_date {
            goal.target_date = target;
        }
        if let Some(public) = patch.is_public {
            goal.is_public = public;
        }
        if let Some(enabled) = patch.reminder_enabled {
            goal.reminder_enabled = enabled;
        }
        goal.validate()?;
        self.ensure_category(user_id, goal.category_id)?;

        self.repo.update_goal(&goal)?;
        let names = self.category_names(user_id)?;
        Ok(goal_view(goal, &names, today))
    }

    pub fn delete_goal(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_goal(user_id, id)?;
        info!("event=goal_delete module=goals status=ok goal_id={id}");
        Ok(())
    }

    pub fn summary(&self, user_id: UserId, today: NaiveDate) -> ServiceResult<GoalSummary> {
        let goals = self.repo.list_goals(user_id, &GoalQuery::default())?;
        let count = |status: GoalStatus| goals.iter().filter(|g| g.status == status).count() as u32;
        let active: Vec<&Goal> = goals.iter().filter(|g| g.status == GoalStatus::Active).collect();
        let completed = count(GoalStatus::Completed);
        let total = goals.len() as u32;
        Ok(GoalSummary {
            total_goals: total,
            active_goals: active.len() as u32,
            completed_goals: completed,
            paused_goals: count(GoalStatus::Paused),
            overdue_goals: active.iter().filter(|g| g.target_date < today).count() as u32,
            completion_rate: round_to(count_percentage(completed, total), 2),
            average_progress: average_progress(active.iter().copied()),
        })
    }

    /// Upserts today's entry; numeric and financial goals adopt the value.
    pub fn update_progress(
        &self,
        user_id: UserId,
        goal_id: RecordId,
        update: ProgressUpdate,
        today: NaiveDate,
    ) -> ServiceResult<ProgressOutcome> {
        let mut goal = found(self.repo.get_goal(user_id, goal_id)?, "goal")?;
        let mut progress = GoalProgress::new(goal.id, user_id, today);
        progress.value = update.value;
        progress.notes = update.notes;
        progress.completed = update.completed;
        let stored = self.repo.upsert_progress(&progress)?;

        if goal.tracks_value() {
            goal.current_value = update.value;
            self.repo.update_goal(&goal)?;
        }
        info!(
            "event=goal_progress module=goals status=ok goal_id={goal_id} date={today}"
        );
        let names = self.category_names(user_id)?;
        Ok(ProgressOutcome {
            message: "Progress updated successfully",
            progress: stored,
            goal: goal_view(goal, &names, today),
        })
    }

    pub fn list_progress(&self, user_id: UserId, query: &ProgressQuery) -> ServiceResult<Vec<GoalProgress>> {
        Ok(self.repo.list_progress(user_id, query)?)
    }

    /// Entries from `days` days before `today` onward, newest first.
    pub fn recent_progress(&self, user_id: UserId, days: u32, today: NaiveDate) -> ServiceResult<Vec<GoalProgress>> {
        let query = ProgressQuery {
            since: Some(window_start(today, days)?),
            ..ProgressQuery::default()
        };
        self.list_progress(user_id, &query)
    }

    pub fn get_progress(&self, user_id: UserId, id: RecordId) -> ServiceResult<GoalProgress> {
        found(self.repo.get_progress(user_id, id)?, "progress")
    }

    pub fn create_progress(&self, user_id: UserId, input: ProgressInput) -> ServiceResult<GoalProgress> {
        let goal = self.referenced_goal(user_id, input.goal)?;
        let mut progress = GoalProgress::new(goal.id, user_id, input.progress_date);
        progress.value = input.value;
        progress.notes = input.notes;
        progress.completed = input.completed;
        self.repo
            .create_progress(&progress)
            .map_err(|err| duplicate_day(err.into()))?;
        self.get_progress(user_id, progress.id)
    }

    pub fn update_progress_entry(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: ProgressPatch,
    ) -> ServiceResult<GoalProgress> {
        let mut progress = self.get_progress(user_id, id)?;
        if let Some(day) = patch.progress_date {
            progress.progress_date = day;
        }
        if let Some(value) = patch.value {
            progress.value = value;
        }
        if let Some(notes) = patch.notes {
            progress.notes = notes;
        }
        if let Some(completed) = patch.completed {
            progress.completed = completed;
        }
        self.repo
            .update_progress(&progress)
            .map_err(|err| duplicate_day(err.into()))?;
        self.get_progress(user_id, id)
    }

    pub fn delete_progress(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_progress(user_id, id)?;
        Ok(())
    }

    pub fn list_milestones(&self, user_id: UserId, goal_id: Option<RecordId>) -> ServiceResult<Vec<GoalMilestone>> {
        Ok(self.repo.list_milestones(user_id, goal_id)?)
    }

    pub fn get_milestone(&self, user_id: UserId, id: RecordId) -> ServiceResult<GoalMilestone> {
        found(self.repo.get_milestone(user_id, id)?, "milestone")
    }

    pub fn create_milestone(&self, user_id: UserId, input: MilestoneInput) -> ServiceResult<GoalMilestone> {
        let goal = self.referenced_goal(user_id, input.goal)?;
        let mut milestone = GoalMilestone::new(goal.id, input.title.trim(), input.target_date);
        milestone.description = input.description;
        milestone.target_value = input.target_value;
        self.repo.create_milestone(&milestone)?;
        self.get_milestone(user_id, milestone.id)
    }

    pub fn update_milestone(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: MilestonePatch,
        now_ms: i64,
    ) -> ServiceResult<GoalMilestone> {
        let mut milestone = self.get_milestone(user_id, id)?;
        if let Some(title) = patch.title {
            milestone.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            milestone.description = description;
        }
        if let Some(target) = patch.target_value {
            milestone.target_value = target;
        }
        if let Some(day) = patch.target_date {
            milestone.target_date = day;
        }
        match patch.is_completed {
            Some(true) => milestone.complete(now_ms),
            Some(false) => {
                milestone.is_completed = false;
                milestone.completed_at = None;
            }
            None => {}
        }
        self.repo.update_milestone(&milestone)?;
        self.get_milestone(user_id, id)
    }

    pub fn complete_milestone(&self, user_id: UserId, id: RecordId, now_ms: i64) -> ServiceResult<GoalMilestone> {
        let mut milestone = self.get_milestone(user_id, id)?;
        milestone.complete(now_ms);
        self.repo.update_milestone(&milestone)?;
        info!("event=milestone_complete module=goals status=ok milestone_id={id}");
        self.get_milestone(user_id, id)
    }

    pub fn delete_milestone(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        let milestone = self.get_milestone(user_id, id)?;
        self.repo.delete_milestone(milestone.id)?;
        Ok(())
    }

    pub fn list_journal_entries(&self, user_id: UserId, query: &JournalQuery) -> ServiceResult<Vec<JournalView>> {
        Ok(self
            .repo
            .list_journal_entries(user_id, query)?
            .into_iter()
            .map(journal_view)
            .collect())
    }

    pub fn get_journal_entry(&self, user_id: UserId, id: RecordId) -> ServiceResult<JournalView> {
        found(self.repo.get_journal_entry(user_id, id)?, "journal entry").map(journal_view)
    }

    pub fn create_journal_entry(
        &self,
        user_id: UserId,
        input: JournalInput,
        today: NaiveDate,
    ) -> ServiceResult<JournalView> {
        let mut entry = JournalEntry::new(user_id, input.entry_date.unwrap_or(today), input.content);
        entry.title = input.title.trim().to_string();
        entry.mood_rating = input.mood_rating;
        entry.set_tags(&input.tags);
        if let Some(private) = input.is_private {
            entry.is_private = private;
        }
        self.repo.create_journal_entry(&entry)?;
        info!(
            "event=journal_create module=goals status=ok user_id={user_id} date={}",
            entry.entry_date
        );
        self.get_journal_entry(user_id, entry.id)
    }

    pub fn update_journal_entry(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: JournalPatch,
    ) -> ServiceResult<JournalView> {
        let mut entry = found(self.repo.get_journal_entry(user_id, id)?, "journal entry")?;
        if let Some(day) = patch.entry_date {
            entry.entry_date = day;
        }
        if let Some(title) = patch.title {
            entry.title = title.trim().to_string();
        }
        if let Some(content) = patch.content {
            entry.content = content;
        }
        if let Some(mood) = patch.mood_rating {
            entry.mood_rating = mood;
        }
        if let Some(tags) = patch.tags {
            entry.set_tags(&tags);
        }
        if let Some(private) = patch.is_private {
            entry.is_private = private;
        }
        self.repo.update_journal_entry(&entry)?;
        self.get_journal_entry(user_id, id)
    }

    pub fn delete_journal_entry(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_journal_entry(user_id, id)?;
        Ok(())
    }

    /// Rated entries from `days` days before `today` onward, oldest first.
    pub fn mood_trends(&self, user_id: UserId, days: u32, today: NaiveDate) -> ServiceResult<MoodTrends> {
        let query = JournalQuery {
            since: Some(window_start(today, days)?),
            ..JournalQuery::default()
        };
        let mut points: Vec<MoodPoint> = self
            .repo
            .list_journal_entries(user_id, &query)?
            .into_iter()
            .filter_map(|entry| {
                entry.mood_rating.map(|mood| MoodPoint {
                    date: entry.entry_date,
                    mood,
                    title: entry.title,
                })
            })
            .collect();
        points.reverse();
        let average_mood = if points.is_empty() {
            0.0
        } else {
            let sum: u32 = points.iter().map(|p| u32::from(p.mood)).sum();
            round_to(f64::from(sum) / points.len() as f64, 1)
        };
        Ok(MoodTrends {
            total_entries: points.len(),
            average_mood,
            mood_trends: points,
        })
    }

    pub fn list_reviews(&self, user_id: UserId) -> ServiceResult<Vec<ReviewView>> {
        Ok(self.repo.list_reviews(user_id)?.into_iter().map(review_view).collect())
    }

    pub fn get_review(&self, user_id: UserId, id: RecordId) -> ServiceResult<ReviewView> {
        found(self.repo.get_review(user_id, id)?, "monthly review").map(review_view)
    }

    /// Review of the month containing `today`; `NotFound` when none exists.
    pub fn current_month_review(&self, user_id: UserId, today: NaiveDate) -> ServiceResult<ReviewView> {
        found(
            self.repo.find_review(user_id, month_start(today))?,
            "review for current month",
        )
        .map(review_view)
    }

    pub fn create_review(&self, user_id: UserId, input: ReviewInput) -> ServiceResult<ReviewView> {
        let mut review = MonthlyReview::new(user_id, input.review_month, input.overall_satisfaction);
        review.achievements = input.achievements;
        review.challenges = input.challenges;
        review.lessons_learned = input.lessons_learned;
        review.next_month_focus = input.next_month_focus;
        self.repo.create_review(&review).map_err(|err| match ServiceError::from(err) {
            ServiceError::Conflict(_) => ServiceError::validation(
                "review_month",
                "a review for this month already exists",
            ),
            other => other,
        })?;
        self.get_review(user_id, review.id)
    }

    pub fn update_review(&self, user_id: UserId, id: RecordId, patch: ReviewPatch) -> ServiceResult<ReviewView> {
        let mut review = found(self.repo.get_review(user_id, id)?, "monthly review")?;
        if let Some(text) = patch.achievements {
            review.achievements = text;
        }
        if let Some(text) = patch.challenges {
            review.challenges = text;
        }
        if let Some(text) = patch.lessons_learned {
            review.lessons_learned = text;
        }
        if let Some(text) = patch.next_month_focus {
            review.next_month_focus = text;
        }
        if let Some(rating) = patch.overall_satisfaction {
            review.overall_satisfaction = rating;
        }
        self.repo.update_review(&review)?;
        self.get_review(user_id, id)
    }

    pub fn delete_review(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_review(user_id, id)?;
        Ok(())
    }

    /// Goal statistics for goals created in `[start, end]`; defaults to the
    /// 180 days ending `today`.
    pub fn analytics(
        &self,
        user_id: UserId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> ServiceResult<GoalAnalytics> {
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            _ => (today - Duration::days(180), today),
        };
        let created = EpochRange::days(start, end);
        let all_goals = self.repo.list_goals(user_id, &GoalQuery::default())?;
        let names = self.category_names(user_id)?;

        let goal_completion_trend = trailing_month_starts(today, TREND_MONTHS)
            .into_iter()
            .map(|month| {
                let range = EpochRange::month_of(month);
                MonthlyGoalCompletion {
                    month: month_label(month),
                    completed_goals: all_goals
                        .iter()
                        .filter(|g| g.status == GoalStatus::Completed)
                        .filter(|g| g.completed_at.is_some_and(|at| range.contains(at)))
                        .count() as u32,
                }
            })
            .collect();

        let goals: Vec<&Goal> = all_goals
            .iter()
            .filter(|goal| created.contains(goal.created_at))
            .collect();
        let mut category_distribution = BTreeMap::new();
        let mut goal_type_distribution = BTreeMap::new();
        let mut category_done: BTreeMap<String, u32> = BTreeMap::new();
        let mut durations = Vec::new();
        for goal in &goals {
            let category = goal
                .category_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            *category_distribution.entry(category.clone()).or_insert(0) += 1;
            *goal_type_distribution.entry(goal.goal_type.to_string()).or_insert(0) += 1;
            let done = category_done.entry(category).or_insert(0);
            if goal.status == GoalStatus::Completed {
                *done += 1;
                if let Some(finished) = goal.completed_at.and_then(DateTime::from_timestamp_millis) {
                    durations.push((finished.date_naive() - goal.start_date).num_days() as f64);
                }
            }
        }
        let success_rate_by_category = category_distribution
            .iter()
            .map(|(name, total)| {
                let done = category_done.get(name).copied().unwrap_or(0);
                (name.clone(), round_to(count_percentage(done, *total), 1))
            })
            .collect();
        let average_goal_duration = if durations.is_empty() {
            0.0
        } else {
            round_to(durations.iter().sum::<f64>() / durations.len() as f64, 2)
        };

        Ok(GoalAnalytics {
            goal_completion_trend,
            category_distribution,
            goal_type_distribution,
            average_goal_duration,
            success_rate_by_category,
        })
    }

    /// Next-step hints, at most five, in goal order then habit order.
    pub fn suggestions(&self, user_id: UserId, today: NaiveDate, now_ms: i64) -> ServiceResult<Suggestions> {
        let active = self.repo.list_goals(
            user_id,
            &GoalQuery {
                status: Some(GoalStatus::Active),
                ..GoalQuery::default()
            },
        )?;

        let mut suggestions: Vec<Suggestion> = active.iter().map(progress_suggestion).collect();
        if suggestions.is_empty() {
            suggestions.push(Suggestion {
                message: "Ready to achieve something amazing? Create your first goal!".to_string(),
                insight_type: "getting_started",
                goal_id: None,
                action_suggestion: "Start with a small, achievable goal",
            });
        }
        for habit in active.iter().filter(|g| g.goal_type == GoalType::Habit) {
            let recent = self.repo.list_progress(
                user_id,
                &ProgressQuery {
                    goal_id: Some(habit.id),
                    since: Some(today - Duration::days(i64::from(HABIT_GRID_DAYS))),
                    ..ProgressQuery::default()
                },
            )?;
            if recent.len() < HABIT_MIN_WEEKLY_ENTRIES {
                suggestions.push(Suggestion {
                    message: format!(
                        "Consistency is key for '{}'. Try to maintain your daily habit",
                        habit.title
                    ),
                    insight_type: "habit_reminder",
                    goal_id: Some(habit.id),
                    action_suggestion: "Set a daily reminder at the same time each day",
                });
            }
        }
        suggestions.truncate(MAX_SUGGESTIONS);

        Ok(Suggestions {
            suggestions,
            total_active_goals: active.len(),
            generated_at: now_ms,
        })
    }

    /// Streak statistics for every active habit goal.
    pub fn habits(&self, user_id: UserId, today: NaiveDate) -> ServiceResult<HabitReport> {
        let habits = self.repo.list_goals(
            user_id,
            &GoalQuery {
                status: Some(GoalStatus::Active),
                goal_type: Some(GoalType::Habit),
                ..GoalQuery::default()
            },
        )?;
        let habits = habits
            .into_iter()
            .map(|habit| {
                let days = self.repo.completed_days(habit.id)?;
                Ok(HabitStats {
                    goal_id: habit.id,
                    habit_name: habit.title,
                    current_streak: current_streak(&days, today),
                    longest_streak: longest_streak(&days),
                    completion_rate: completion_rate(&days, today, HABIT_WINDOW_DAYS),
                    weekly_progress: trailing_days(&days, today, HABIT_GRID_DAYS),
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(HabitReport {
            total_habits: habits.len(),
            habits,
        })
    }

    fn referenced_goal(&self, user_id: UserId, id: RecordId) -> ServiceResult<Goal> {
        self.repo
            .get_goal(user_id, id)?
            .ok_or_else(|| ServiceError::validation("goal", "invalid goal"))
    }

    fn ensure_category(&self, user_id: UserId, category_id: Option<RecordId>) -> ServiceResult<()> {
        let Some(id) = category_id else {
            return Ok(());
        };
        if self.categories.get_category(user_id, CategoryKind::Goal, id)?.is_none() {
            return Err(ServiceError::validation("category", "invalid category"));
        }
        Ok(())
    }

    fn category_names(&self, user_id: UserId) -> ServiceResult<BTreeMap<RecordId, String>> {
        Ok(self
            .categories
            .list_categories(user_id, CategoryKind::Goal)?
            .into_iter()
            .map(|category| (category.id, category.name))
            .collect())
    }
}

/// Mean `progress_percentage` of `goals`, two fractional digits; 0 when empty.
pub fn average_progress<'a, I: IntoIterator<Item = &'a Goal>>(goals: I) -> f64 {
    let values: Vec<f64> = goals.into_iter().map(Goal::progress_percentage).collect();
    if values.is_empty() {
        return 0.0;
    }
    round_to(values.iter().sum::<f64>() / values.len() as f64, 2)
}

fn progress_suggestion(goal: &Goal) -> Suggestion {
    let progress = goal.progress_percentage();
    let (message, insight_type, action_suggestion) = if progress < 25.0 {
        (
            format!("Break down '{}' into smaller, actionable steps", goal.title),
            "planning",
            "Create 3-5 milestones for this goal",
        )
    } else if progress < 50.0 {
        (
            format!("You're making progress on '{}'! Keep the momentum going", goal.title),
            "motivation",
            "Schedule daily 15-minute work sessions",
        )
    } else if progress < 75.0 {
        (
            format!("'{}' is more than halfway done! Push through to the finish", goal.title),
            "encouragement",
            "Set a completion deadline for extra motivation",
        )
    } else {
        (
            format!("'{}' is almost complete! You're so close to achieving it", goal.title),
            "final_push",
            "Dedicate focused time this week to finish",
        )
    };
    Suggestion {
        message,
        insight_type,
        goal_id: Some(goal.id),
        action_suggestion,
    }
}

fn goal_view(goal: Goal, names: &BTreeMap<RecordId, String>, today: NaiveDate) -> GoalView {
    GoalView {
        category_name: goal.category_id.and_then(|id| names.get(&id).cloned()),
        progress_percentage: goal.progress_percentage(),
        is_overdue: goal.is_overdue(today),
        days_remaining: goal.days_remaining(today),
        goal,
    }
}

fn goal_category_view(category: Category, counts: &BTreeMap<RecordId, GoalCategoryCounts>) -> GoalCategoryView {
    let counts = counts.get(&category.id).copied().unwrap_or_default();
    GoalCategoryView {
        category,
        goal_count: counts.goal_count,
        active_goals: counts.active_goals,
    }
}

fn journal_view(entry: JournalEntry) -> JournalView {
    JournalView {
        word_count: entry.word_count(),
        entry,
    }
}

fn review_view(review: MonthlyReview) -> ReviewView {
    ReviewView {
        month_label: review.month_label(),
        review,
    }
}

fn duplicate_name(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Conflict(_) => {
            ServiceError::validation("name", "a category with this name already exists")
        }
        other => other,
    }
}

fn duplicate_day(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Conflict(_) => ServiceError::validation(
            "progress_date",
            "progress for this goal and day already exists",
        ),
        other => other,
    }
}

/// First day of a `days`-long look-back window ending at `today`.
fn window_start(today: NaiveDate, days: u32) -> ServiceResult<NaiveDate> {
    if days > MAX_WINDOW_DAYS {
        return Err(ServiceError::validation(
            "days",
            format!("must be at most {MAX_WINDOW_DAYS}"),
        ));
    }
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(|| ServiceError::validation("days", "window starts before the calendar"))
}

#[cfg(test)]
mod tests {
    use super::{average_progress, progress_suggestion, window_start, MAX_WINDOW_DAYS};
    use crate::service::ServiceError;
    use crate::model::goal::{Goal, GoalType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn numeric(current: i64, target: i64) -> Goal {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut goal = Goal::new(Uuid::new_v4(), "Run", GoalType::Numeric, day, day);
        goal.target_value = Some(Decimal::from(target));
        goal.current_value = Decimal::from(current);
        goal
    }

    #[test]
    fn suggestions_bucket_by_progress() {
        assert_eq!(progress_suggestion(&numeric(10, 100)).insight_type, "planning");
        assert_eq!(progress_suggestion(&numeric(30, 100)).insight_type, "motivation");
        assert_eq!(progress_suggestion(&numeric(60, 100)).insight_type, "encouragement");
        assert_eq!(progress_suggestion(&numeric(90, 100)).insight_type, "final_push");
    }

    #[test]
    fn average_progress_is_mean_of_capped_percentages() {
        let goals = [numeric(50, 100), numeric(300, 100)];
        assert_eq!(average_progress(goals.iter()), 75.0);
        assert_eq!(average_progress(std::iter::empty()), 0.0);
    }

    #[test]
    fn look_back_windows_are_bounded() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(
            window_start(today, 7).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
        assert!(matches!(
            window_start(today, u32::MAX),
            Err(ServiceError::Validation(err)) if err.field == "days"
        ));
        assert!(window_start(today, MAX_WINDOW_DAYS).is_ok());
        assert!(window_start(NaiveDate::MIN, 1).is_err());
    }
}
