//! Goal, progress, milestone, journal and review persistence.
//!
//! # Responsibility
//! - CRUD and filtered listing for goal tracking and journaling records.
//! - Provide the per-day completion sets habit analytics are built on.
//!
//! # Invariants
//! - Every statement is scoped by the owning `user_id`; milestones are scoped
//!   through their goal.
//! - `upsert_progress` keeps one row per `(goal, day)`.

use super::{
    bool_col, bool_to_int, count_col, date_col, date_text, decimal_col, decimal_text, enum_col,
    id_text, opt_decimal_col, opt_decimal_text, opt_id_text, opt_uuid_col, uuid_col, RepoError,
    RepoResult, SqlQuery,
};
use crate::model::goal::{
    Goal, GoalFrequency, GoalMilestone, GoalProgress, GoalStatus, GoalType, JournalEntry,
    MonthlyReview,
};
use crate::model::{split_tags, RecordId, UserId};
use crate::repo::expense_repo::escape_like;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::collections::{BTreeMap, BTreeSet};

const GOAL_SELECT_SQL: &str = "SELECT
    id, user_id, category_id, title, description, goal_type, status, frequency,
    target_value, current_value, unit, start_date, target_date, completed_at,
    is_public, reminder_enabled, created_at, updated_at
 FROM goals";

const PROGRESS_SELECT_SQL: &str = "SELECT
    id, goal_id, user_id, progress_date, value, notes, completed, created_at, updated_at
 FROM goal_progress";

const MILESTONE_SELECT_SQL: &str = "SELECT
    m.id, m.goal_id, m.title, m.description, m.target_value, m.target_date,
    m.is_completed, m.completed_at, m.created_at, m.updated_at
 FROM goal_milestones m
 JOIN goals g ON g.id = m.goal_id";

const JOURNAL_SELECT_SQL: &str = "SELECT
    id, user_id, entry_date, title, content, mood_rating, tags, is_private,
    created_at, updated_at
 FROM journal_entries";

const REVIEW_SELECT_SQL: &str = "SELECT
    id, user_id, review_month, achievements, challenges, lessons_learned,
    next_month_focus, overall_satisfaction, created_at, updated_at
 FROM monthly_reviews";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalQuery {
    pub status: Option<GoalStatus>,
    pub goal_type: Option<GoalType>,
    pub category_id: Option<RecordId>,
    pub frequency: Option<GoalFrequency>,
    /// Case-insensitive match over title and description.
    pub search: Option<String>,
    /// Only goals whose target date is strictly before this day.
    pub target_before: Option<NaiveDate>,
    /// Order by nearest target date instead of newest first.
    pub by_target_date: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressQuery {
    pub goal_id: Option<RecordId>,
    /// Inclusive lower bound on the progress day.
    pub since: Option<NaiveDate>,
    /// Inclusive upper bound on the progress day.
    pub until: Option<NaiveDate>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalQuery {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub mood_rating: Option<u8>,
    /// Case-insensitive match over title and content.
    pub search: Option<String>,
}

/// Goal totals for one goal category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoalCategoryCounts {
    pub goal_count: u32,
    pub active_goals: u32,
}

pub trait GoalRepository {
    fn create_goal(&self, goal: &Goal) -> RepoResult<()>;
    fn get_goal(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<Goal>>;
    fn list_goals(&self, user_id: UserId, query: &GoalQuery) -> RepoResult<Vec<Goal>>;
    fn update_goal(&self, goal: &Goal) -> RepoResult<()>;
    fn delete_goal(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
    fn goal_category_counts(&self, user_id: UserId)
        -> RepoResult<BTreeMap<RecordId, GoalCategoryCounts>>;

    fn create_progress(&self, progress: &GoalProgress) -> RepoResult<()>;
    /// Inserts or replaces the entry for `(goal, day)` and returns the stored row.
    fn upsert_progress(&self, progress: &GoalProgress) -> RepoResult<GoalProgress>;
    fn get_progress(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<GoalProgress>>;
    /// Lists entries newest day first.
    fn list_progress(&self, user_id: UserId, query: &ProgressQuery)
        -> RepoResult<Vec<GoalProgress>>;
    fn update_progress(&self, progress: &GoalProgress) -> RepoResult<()>;
    fn delete_progress(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
    /// Days with a completed entry for one goal.
    fn completed_days(&self, goal_id: RecordId) -> RepoResult<BTreeSet<NaiveDate>>;

    fn create_milestone(&self, milestone: &GoalMilestone) -> RepoResult<()>;
    fn get_milestone(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<GoalMilestone>>;
    /// Lists milestones by target date.
    fn list_milestones(
        &self,
        user_id: UserId,
        goal_id: Option<RecordId>,
    ) -> RepoResult<Vec<GoalMilestone>>;
    fn update_milestone(&self, milestone: &GoalMilestone) -> RepoResult<()>;
    fn delete_milestone(&self, id: RecordId) -> RepoResult<()>;

    fn create_journal_entry(&self, entry: &JournalEntry) -> RepoResult<()>;
    fn get_journal_entry(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<JournalEntry>>;
    /// Lists entries newest day first.
    fn list_journal_entries(&self, user_id: UserId, query: &JournalQuery)
        -> RepoResult<Vec<JournalEntry>>;
    fn update_journal_entry(&self, entry: &JournalEntry) -> RepoResult<()>;
    fn delete_journal_entry(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;

    fn create_review(&self, review: &MonthlyReview) -> RepoResult<()>;
    fn get_review(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<MonthlyReview>>;
    fn find_review(&self, user_id: UserId, month: NaiveDate) -> RepoResult<Option<MonthlyReview>>;
    /// Lists reviews newest month first.
    fn list_reviews(&self, user_id: UserId) -> RepoResult<Vec<MonthlyReview>>;
    fn update_review(&self, review: &MonthlyReview) -> RepoResult<()>;
    fn delete_review(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteGoalRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGoalRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find_progress(&self, goal_id: RecordId, day: NaiveDate) -> RepoResult<Option<GoalProgress>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROGRESS_SELECT_SQL} WHERE goal_id = ?1 AND progress_date = ?2;"
        ))?;
        let mut rows = stmt.query([id_text(goal_id), date_text(day)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_progress_row(row)?)),
            None => Ok(None),
        }
    }
}

impl GoalRepository for SqliteGoalRepository<'_> {
    fn create_goal(&self, goal: &Goal) -> RepoResult<()> {
        goal.validate()?;
        self.conn.execute(
            "INSERT INTO goals (
                id, user_id, category_id, title, description, goal_type, status, frequency,
                target_value, current_value, unit, start_date, target_date, completed_at,
                is_public, reminder_enabled
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
            params![
                id_text(goal.id),
                id_text(goal.user_id),
                opt_id_text(goal.category_id),
                goal.title,
                goal.description,
                goal.goal_type.as_str(),
                goal.status.as_str(),
                goal.frequency.as_str(),
                opt_decimal_text(goal.target_value),
                decimal_text(goal.current_value),
                goal.unit,
                date_text(goal.start_date),
                date_text(goal.target_date),
                goal.completed_at,
                bool_to_int(goal.is_public),
                bool_to_int(goal.reminder_enabled),
            ],
        )?;
        Ok(())
    }

    fn get_goal(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<Goal>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GOAL_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_goal_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_goals(&self, user_id: UserId, query: &GoalQuery) -> RepoResult<Vec<Goal>> {
        let mut sql = SqlQuery::new(GOAL_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(status) = query.status {
            sql.push_bind("AND status = ?", status.as_str().to_string());
        }
        if let Some(goal_type) = query.goal_type {
            sql.push_bind("AND goal_type = ?", goal_type.as_str().to_string());
        }
        if let Some(category_id) = query.category_id {
            sql.push_bind("AND category_id = ?", id_text(category_id));
        }
        if let Some(frequency) = query.frequency {
            sql.push_bind("AND frequency = ?", frequency.as_str().to_string());
        }
        if let Some(day) = query.target_before {
            sql.push_bind("AND target_date < ?", date_text(day));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            sql.push_bind("AND (title LIKE ? ESCAPE '\\'", pattern.clone())
                .push_bind("OR description LIKE ? ESCAPE '\\')", pattern);
        }
        if query.by_target_date {
            sql.push("ORDER BY target_date ASC, created_at DESC, id ASC");
        } else {
            sql.push("ORDER BY created_at DESC, id ASC");
        }

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut goals = Vec::new();
        while let Some(row) = rows.next()? {
            goals.push(parse_goal_row(row)?);
        }
        Ok(goals)
    }

    fn update_goal(&self, goal: &Goal) -> RepoResult<()> {
        goal.validate()?;
        let changed = self.conn.execute(
            "UPDATE goals
             SET category_id = ?3, title = ?4, description = ?5, goal_type = ?6, status = ?7,
                 frequency = ?8, target_value = ?9, current_value = ?10, unit = ?11,
                 start_date = ?12, target_date = ?13, completed_at = ?14, is_public = ?15,
                 reminder_enabled = ?16,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(goal.id),
                id_text(goal.user_id),
                opt_id_text(goal.category_id),
                goal.title,
                goal.description,
                goal.goal_type.as_str(),
                goal.status.as_str(),
                goal.frequency.as_str(),
                opt_decimal_text(goal.target_value),
                decimal_text(goal.current_value),
                goal.unit,
                date_text(goal.start_date),
                date_text(goal.target_date),
                goal.completed_at,
                bool_to_int(goal.is_public),
                bool_to_int(goal.reminder_enabled),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("goal", goal.id));
        }
        Ok(())
    }

    fn delete_goal(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM goals WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("goal", id));
        }
        Ok(())
    }

    fn goal_category_counts(
        &self,
        user_id: UserId,
    ) -> RepoResult<BTreeMap<RecordId, GoalCategoryCounts>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id,
                    COUNT(*),
                    COUNT(CASE WHEN status = 'active' THEN 1 END)
             FROM goals
             WHERE user_id = ?1 AND category_id IS NOT NULL
             GROUP BY category_id;",
        )?;
        let mut rows = stmt.query([id_text(user_id)])?;
        let mut counts = BTreeMap::new();
        while let Some(row) = rows.next()? {
            counts.insert(
                uuid_col(row, "category_id")?,
                GoalCategoryCounts {
                    goal_count: count_col(row, 1)?,
                    active_goals: count_col(row, 2)?,
                },
            );
        }
        Ok(counts)
    }

    fn create_progress(&self, progress: &GoalProgress) -> RepoResult<()> {
        progress.validate()?;
        self.conn.execute(
            "INSERT INTO goal_progress (id, goal_id, user_id, progress_date, value, notes, completed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id_text(progress.id),
                id_text(progress.goal_id),
                id_text(progress.user_id),
                date_text(progress.progress_date),
                decimal_text(progress.value),
                progress.notes,
                bool_to_int(progress.completed),
            ],
        )?;
        Ok(())
    }

    fn upsert_progress(&self, progress: &GoalProgress) -> RepoResult<GoalProgress> {
        progress.validate()?;
        self.conn.execute(
            "INSERT INTO goal_progress (id, goal_id, user_id, progress_date, value, notes, completed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(goal_id, progress_date) DO UPDATE SET
                value = excluded.value,
                notes = excluded.notes,
                completed = excluded.completed,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                id_text(progress.id),
                id_text(progress.goal_id),
                id_text(progress.user_id),
                date_text(progress.progress_date),
                decimal_text(progress.value),
                progress.notes,
                bool_to_int(progress.completed),
            ],
        )?;
        self.find_progress(progress.goal_id, progress.progress_date)?
            .ok_or_else(|| RepoError::not_found("goal progress", progress.id))
    }

    fn get_progress(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<GoalProgress>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROGRESS_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_progress_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_progress(
        &self,
        user_id: UserId,
        query: &ProgressQuery,
    ) -> RepoResult<Vec<GoalProgress>> {
        let mut sql = SqlQuery::new(PROGRESS_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(goal_id) = query.goal_id {
            sql.push_bind("AND goal_id = ?", id_text(goal_id));
        }
        if let Some(since) = query.since {
            sql.push_bind("AND progress_date >= ?", date_text(since));
        }
        if let Some(until) = query.until {
            sql.push_bind("AND progress_date <= ?", date_text(until));
        }
        if let Some(completed) = query.completed {
            sql.push_bind("AND completed = ?", bool_to_int(completed));
        }
        sql.push("ORDER BY progress_date DESC, created_at DESC, id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_progress_row(row)?);
        }
        Ok(entries)
    }

    fn update_progress(&self, progress: &GoalProgress) -> RepoResult<()> {
        progress.validate()?;
        let changed = self.conn.execute(
            "UPDATE goal_progress
             SET progress_date = ?3, value = ?4, notes = ?5, completed = ?6,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(progress.id),
                id_text(progress.user_id),
                date_text(progress.progress_date),
                decimal_text(progress.value),
                progress.notes,
                bool_to_int(progress.completed),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("goal progress", progress.id));
        }
        Ok(())
    }

    fn delete_progress(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM goal_progress WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("goal progress", id));
        }
        Ok(())
    }

    fn completed_days(&self, goal_id: RecordId) -> RepoResult<BTreeSet<NaiveDate>> {
        let mut stmt = self.conn.prepare(
            "SELECT progress_date FROM goal_progress WHERE goal_id = ?1 AND completed = 1;",
        )?;
        let mut rows = stmt.query([id_text(goal_id)])?;
        let mut days = BTreeSet::new();
        while let Some(row) = rows.next()? {
            days.insert(date_col(row, "progress_date")?);
        }
        Ok(days)
    }

    fn create_milestone(&self, milestone: &GoalMilestone) -> RepoResult<()> {
        milestone.validate()?;
        self.conn.execute(
            "INSERT INTO goal_milestones (
                id, goal_id, title, description, target_value, target_date,
                is_completed, completed_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id_text(milestone.id),
                id_text(milestone.goal_id),
                milestone.title,
                milestone.description,
                opt_decimal_text(milestone.target_value),
                date_text(milestone.target_date),
                bool_to_int(milestone.is_completed),
                milestone.completed_at,
            ],
        )?;
        Ok(())
    }

    fn get_milestone(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<GoalMilestone>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MILESTONE_SELECT_SQL} WHERE m.id = ?1 AND g.user_id = ?2;"
        ))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_milestone_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_milestones(
        &self,
        user_id: UserId,
        goal_id: Option<RecordId>,
    ) -> RepoResult<Vec<GoalMilestone>> {
        let mut sql = SqlQuery::new(MILESTONE_SELECT_SQL);
        sql.push_bind("WHERE g.user_id = ?", id_text(user_id));
        if let Some(goal_id) = goal_id {
            sql.push_bind("AND m.goal_id = ?", id_text(goal_id));
        }
        sql.push("ORDER BY m.target_date ASC, m.created_at ASC, m.id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut milestones = Vec::new();
        while let Some(row) = rows.next()? {
            milestones.push(parse_milestone_row(row)?);
        }
        Ok(milestones)
    }

    fn update_milestone(&self, milestone: &GoalMilestone) -> RepoResult<()> {
        milestone.validate()?;
        let changed = self.conn.execute(
            "UPDATE goal_milestones
             SET goal_id = ?2, title = ?3, description = ?4, target_value = ?5, target_date = ?6,
                 is_completed = ?7, completed_at = ?8,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id_text(milestone.id),
                id_text(milestone.goal_id),
                milestone.title,
                milestone.description,
                opt_decimal_text(milestone.target_value),
                date_text(milestone.target_date),
                bool_to_int(milestone.is_completed),
                milestone.completed_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("milestone", milestone.id));
        }
        Ok(())
    }

    fn delete_milestone(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM goal_milestones WHERE id = ?1;", [id_text(id)])?;
        if changed == 0 {
            return Err(RepoError::not_found("milestone", id));
        }
        Ok(())
    }

    fn create_journal_entry(&self, entry: &JournalEntry) -> RepoResult<()> {
        entry.validate()?;
        self.conn.execute(
            "INSERT INTO journal_entries (
                id, user_id, entry_date, title, content, mood_rating, tags, is_private
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id_text(entry.id),
                id_text(entry.user_id),
                date_text(entry.entry_date),
                entry.title,
                entry.content,
                entry.mood_rating,
                entry.tags.join(","),
                bool_to_int(entry.is_private),
            ],
        )?;
        Ok(())
    }

    fn get_journal_entry(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<JournalEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{JOURNAL_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_journal_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_journal_entries(
        &self,
        user_id: UserId,
        query: &JournalQuery,
    ) -> RepoResult<Vec<JournalEntry>> {
        let mut sql = SqlQuery::new(JOURNAL_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(since) = query.since {
            sql.push_bind("AND entry_date >= ?", date_text(since));
        }
        if let Some(until) = query.until {
            sql.push_bind("AND entry_date <= ?", date_text(until));
        }
        if let Some(mood) = query.mood_rating {
            sql.push_bind("AND mood_rating = ?", i64::from(mood));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            sql.push_bind("AND (title LIKE ? ESCAPE '\\'", pattern.clone())
                .push_bind("OR content LIKE ? ESCAPE '\\')", pattern);
        }
        sql.push("ORDER BY entry_date DESC, id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_journal_row(row)?);
        }
        Ok(entries)
    }

    fn update_journal_entry(&self, entry: &JournalEntry) -> RepoResult<()> {
        entry.validate()?;
        let changed = self.conn.execute(
            "UPDATE journal_entries
             SET entry_date = ?3, title = ?4, content = ?5, mood_rating = ?6, tags = ?7,
                 is_private = ?8,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(entry.id),
                id_text(entry.user_id),
                date_text(entry.entry_date),
                entry.title,
                entry.content,
                entry.mood_rating,
                entry.tags.join(","),
                bool_to_int(entry.is_private),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("journal entry", entry.id));
        }
        Ok(())
    }

    fn delete_journal_entry(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM journal_entries WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("journal entry", id));
        }
        Ok(())
    }

    fn create_review(&self, review: &MonthlyReview) -> RepoResult<()> {
        review.validate()?;
        self.conn.execute(
            "INSERT INTO monthly_reviews (
                id, user_id, review_month, achievements, challenges, lessons_learned,
                next_month_focus, overall_satisfaction
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id_text(review.id),
                id_text(review.user_id),
                date_text(review.review_month),
                review.achievements,
                review.challenges,
                review.lessons_learned,
                review.next_month_focus,
                review.overall_satisfaction,
            ],
        )?;
        Ok(())
    }

    fn get_review(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<MonthlyReview>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{REVIEW_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_review_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_review(&self, user_id: UserId, month: NaiveDate) -> RepoResult<Option<MonthlyReview>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVIEW_SELECT_SQL} WHERE user_id = ?1 AND review_month = ?2;"
        ))?;
        let mut rows = stmt.query([id_text(user_id), date_text(month)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_review_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_reviews(&self, user_id: UserId) -> RepoResult<Vec<MonthlyReview>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVIEW_SELECT_SQL} WHERE user_id = ?1 ORDER BY review_month DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([id_text(user_id)])?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next()? {
            reviews.push(parse_review_row(row)?);
        }
        Ok(reviews)
    }

    fn update_review(&self, review: &MonthlyReview) -> RepoResult<()> {
        review.validate()?;
        let changed = self.conn.execute(
            "UPDATE monthly_reviews
             SET review_month = ?3, achievements = ?4, challenges = ?5, lessons_learned = ?6,
                 next_month_focus = ?7, overall_satisfaction = ?8,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(review.id),
                id_text(review.user_id),
                date_text(review.review_month),
                review.achievements,
                review.challenges,
                review.lessons_learned,
                review.next_month_focus,
                review.overall_satisfaction,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("monthly review", review.id));
        }
        Ok(())
    }

    fn delete_review(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM monthly_reviews WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("monthly review", id));
        }
        Ok(())
    }
}

fn parse_goal_row(row: &Row<'_>) -> RepoResult<Goal> {
    Ok(Goal {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        category_id: opt_uuid_col(row, "category_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        goal_type: enum_col(row, "goal_type", GoalType::parse)?,
        status: enum_col(row, "status", GoalStatus::parse)?,
        frequency: enum_col(row, "frequency", GoalFrequency::parse)?,
        target_value: opt_decimal_col(row, "target_value")?,
        current_value: decimal_col(row, "current_value")?,
        unit: row.get("unit")?,
        start_date: date_col(row, "start_date")?,
        target_date: date_col(row, "target_date")?,
        completed_at: row.get("completed_at")?,
        is_public: bool_col(row, "is_public")?,
        reminder_enabled: bool_col(row, "reminder_enabled")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_progress_row(row: &Row<'_>) -> RepoResult<GoalProgress> {
    Ok(GoalProgress {
        id: uuid_col(row, "id")?,
        goal_id: uuid_col(row, "goal_id")?,
        user_id: uuid_col(row, "user_id")?,
        progress_date: date_col(row, "progress_date")?,
        value: decimal_col(row, "value")?,
        notes: row.get("notes")?,
        completed: bool_col(row, "completed")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_milestone_row(row: &Row<'_>) -> RepoResult<GoalMilestone> {
    Ok(GoalMilestone {
        id: uuid_col(row, "id")?,
        goal_id: uuid_col(row, "goal_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        target_value: opt_decimal_col(row, "target_value")?,
        target_date: date_col(row, "target_date")?,
        is_completed: bool_col(row, "is_completed")?,
        completed_at: row.get("completed_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_journal_row(row: &Row<'_>) -> RepoResult<JournalEntry> {
    let mood: Option<i64> = row.get("mood_rating")?;
    let mood_rating = mood
        .map(|value| {
            u8::try_from(value)
                .map_err(|_| RepoError::InvalidData(format!("invalid mood rating `{value}`")))
        })
        .transpose()?;
    let tags: String = row.get("tags")?;
    Ok(JournalEntry {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        entry_date: date_col(row, "entry_date")?,
        title: row.get("title")?,
        content: row.get("content")?,
        mood_rating,
        tags: split_tags(&tags),
        is_private: bool_col(row, "is_private")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_review_row(row: &Row<'_>) -> RepoResult<MonthlyReview> {
    let satisfaction: i64 = row.get("overall_satisfaction")?;
    Ok(MonthlyReview {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        review_month: date_col(row, "review_month")?,
        achievements: row.get("achievements")?,
        challenges: row.get("challenges")?,
        lessons_learned: row.get("lessons_learned")?,
        next_month_focus: row.get("next_month_focus")?,
        overall_satisfaction: u8::try_from(satisfaction).map_err(|_| {
            RepoError::InvalidData(format!("invalid satisfaction rating `{satisfaction}`"))
        })?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
