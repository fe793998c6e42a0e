//! Project and task models.
//!
//! # Responsibility
//! - Define projects, tasks and the records hanging off a task (comments,
//!   attachments, reminders, time logs).
//! - Keep status-derived fields (`completed_at`, overdue, duration) consistent.
//!
//! # Invariants
//! - `completed_at` is set iff `status == Done`.
//! - A time log's `end_time` is never before its `start_time`.

use super::money::round_to;
use super::{
    limit_text, require_hex_color, require_text, split_tags, RecordId, UserId, ValidationError,
    ValidationResult,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

db_enum! {
    pub enum TaskPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

db_enum! {
    pub enum TaskStatus {
        Todo => "todo",
        InProgress => "in_progress",
        Review => "review",
        Done => "done",
        Cancelled => "cancelled",
    }
}

impl TaskStatus {
    /// Column title on the kanban board.
    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Review => "Review",
            Self::Done => "Done",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Done and cancelled tasks can no longer become overdue.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// Group of tasks inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub workspace_id: RecordId,
    pub owner_id: UserId,
    pub color: String,
    pub is_archived: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    pub fn new(owner_id: UserId, workspace_id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            workspace_id,
            owner_id,
            color: "#007bff".to_string(),
            is_archived: false,
            start_date: None,
            end_date: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("name", &self.name, 200)?;
        require_hex_color("color", &self.color)?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ValidationError::new(
                    "end_date",
                    "end date must not be before start date",
                ));
            }
        }
        Ok(())
    }
}

/// Unit of work, optionally nested under a parent task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    pub description: String,
    pub project_id: Option<RecordId>,
    pub workspace_id: RecordId,
    pub assignee_id: Option<UserId>,
    pub created_by: UserId,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    /// Epoch milliseconds.
    pub due_date: Option<i64>,
    /// Epoch milliseconds.
    pub start_date: Option<i64>,
    /// Epoch milliseconds; present iff `status == Done`.
    pub completed_at: Option<i64>,
    pub parent_task_id: Option<RecordId>,
    pub estimated_hours: Option<Decimal>,
    pub actual_hours: Option<Decimal>,
    /// Comma-separated, normalized tags.
    pub tags: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Creates a `todo` task assigned to its creator.
    pub fn new(created_by: UserId, workspace_id: RecordId, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            project_id: None,
            workspace_id,
            assignee_id: Some(created_by),
            created_by,
            priority: TaskPriority::Medium,
            status: TaskStatus::Todo,
            due_date: None,
            start_date: None,
            completed_at: None,
            parent_task_id: None,
            estimated_hours: None,
            actual_hours: None,
            tags: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, 255)?;
        limit_text("tags", &self.tags, 500)?;
        if self.parent_task_id == Some(self.id) {
            return Err(ValidationError::new(
                "parent_task",
                "a task cannot be its own parent",
            ));
        }
        for (field, hours) in [
            ("estimated_hours", self.estimated_hours),
            ("actual_hours", self.actual_hours),
        ] {
            if hours.is_some_and(|value| value < Decimal::ZERO) {
                return Err(ValidationError::new(field, "hours must not be negative"));
            }
        }
        Ok(())
    }

    /// Moves the task to `status`, stamping or clearing `completed_at`.
    pub fn set_status(&mut self, status: TaskStatus, now_ms: i64) {
        if status == TaskStatus::Done {
            if self.status != TaskStatus::Done || self.completed_at.is_none() {
                self.completed_at = Some(now_ms);
            }
        } else {
            self.completed_at = None;
        }
        self.status = status;
    }

    /// Due in the past and still open.
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        !self.status.is_closed() && self.due_date.is_some_and(|due| due < now_ms)
    }

    pub fn tag_list(&self) -> Vec<String> {
        split_tags(&self.tags)
    }
}

/// Share of subtasks in `done`; without subtasks, 100 for a done task and
/// 0 otherwise.
pub fn completion_percentage(status: TaskStatus, subtasks: u32, subtasks_done: u32) -> f64 {
    if subtasks == 0 {
        return if status == TaskStatus::Done { 100.0 } else { 0.0 };
    }
    round_to(f64::from(subtasks_done) / f64::from(subtasks) * 100.0, 2)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: RecordId,
    pub task_id: RecordId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TaskComment {
    pub fn new(task_id: RecordId, author_id: UserId, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            author_id,
            content: content.into(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("content", &self.content, 10_000)
    }
}

/// File metadata attached to a task; the bytes live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttachment {
    pub id: RecordId,
    pub task_id: RecordId,
    pub uploaded_by: UserId,
    pub filename: String,
    pub file_url: String,
    /// Size in bytes.
    pub file_size: i64,
    pub uploaded_at: i64,
}

impl TaskAttachment {
    pub fn validate(&self) -> ValidationResult {
        require_text("filename", &self.filename, 255)?;
        limit_text("file_url", &self.file_url, 1_000)?;
        if self.file_size < 0 {
            return Err(ValidationError::new("file_size", "file size must not be negative"));
        }
        Ok(())
    }
}

db_enum! {
    pub enum ReminderType {
        Email => "email",
        Push => "push",
        Both => "both",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReminder {
    pub id: RecordId,
    pub task_id: RecordId,
    pub user_id: UserId,
    /// Epoch milliseconds.
    pub reminder_time: i64,
    pub reminder_type: ReminderType,
    pub message: String,
    pub is_sent: bool,
    pub sent_at: Option<i64>,
    pub created_at: i64,
}

impl TaskReminder {
    pub fn new(task_id: RecordId, user_id: UserId, reminder_time: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            user_id,
            reminder_time,
            reminder_type: ReminderType::Both,
            message: String::new(),
            is_sent: false,
            sent_at: None,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        limit_text("message", &self.message, 1_000)?;
        if self.sent_at.is_some() && !self.is_sent {
            return Err(ValidationError::new("sent_at", "sent_at requires is_sent"));
        }
        Ok(())
    }
}

/// One span of tracked work; open while `end_time` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTimeLog {
    pub id: RecordId,
    pub task_id: RecordId,
    pub user_id: UserId,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub description: String,
    pub duration_minutes: Option<i64>,
    pub created_at: i64,
}

impl TaskTimeLog {
    /// Opens a running log at `start_time`.
    pub fn start(task_id: RecordId, user_id: UserId, start_time: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            user_id,
            start_time,
            end_time: None,
            description: String::new(),
            duration_minutes: None,
            created_at: 0,
        }
    }

    /// Closes the log and derives whole elapsed minutes.
    pub fn stop(&mut self, end_time: i64) {
        self.end_time = Some(end_time);
        self.refresh_duration();
    }

    /// Recomputes `duration_minutes` from the start/end pair.
    pub fn refresh_duration(&mut self) {
        self.duration_minutes = self
            .end_time
            .map(|end| end.saturating_sub(self.start_time).max(0) / 60_000);
    }

    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn validate(&self) -> ValidationResult {
        if self.end_time.is_some_and(|end| end < self.start_time) {
            return Err(ValidationError::new(
                "end_time",
                "end time must not be before start time",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{completion_percentage, Task, TaskStatus, TaskTimeLog};
    use uuid::Uuid;

    #[test]
    fn done_status_stamps_completed_at_and_other_statuses_clear_it() {
        let user = Uuid::new_v4();
        let mut task = Task::new(user, Uuid::new_v4(), "write report");
        task.set_status(TaskStatus::Done, 1_000);
        assert_eq!(task.completed_at, Some(1_000));

        task.set_status(TaskStatus::Done, 2_000);
        assert_eq!(task.completed_at, Some(1_000));

        task.set_status(TaskStatus::Review, 3_000);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn overdue_requires_open_status_and_past_due() {
        let mut task = Task::new(Uuid::new_v4(), Uuid::new_v4(), "pay rent");
        assert!(!task.is_overdue(10_000));
        task.due_date = Some(5_000);
        assert!(task.is_overdue(10_000));
        assert!(!task.is_overdue(4_000));
        task.set_status(TaskStatus::Cancelled, 10_000);
        assert!(!task.is_overdue(10_000));
    }

    #[test]
    fn completion_percentage_uses_subtasks_when_present() {
        assert_eq!(completion_percentage(TaskStatus::Done, 0, 0), 100.0);
        assert_eq!(completion_percentage(TaskStatus::Todo, 0, 0), 0.0);
        assert_eq!(completion_percentage(TaskStatus::Todo, 3, 1), 33.33);
        assert_eq!(completion_percentage(TaskStatus::Done, 4, 2), 50.0);
    }

    #[test]
    fn task_cannot_parent_itself() {
        let mut task = Task::new(Uuid::new_v4(), Uuid::new_v4(), "loop");
        task.parent_task_id = Some(task.id);
        assert_eq!(task.validate().unwrap_err().field, "parent_task");
    }

    #[test]
    fn time_log_duration_is_whole_minutes() {
        let mut log = TaskTimeLog::start(Uuid::new_v4(), Uuid::new_v4(), 0);
        assert!(log.is_running());
        log.stop(95 * 60_000 + 59_000);
        assert_eq!(log.duration_minutes, Some(95));
        assert!(!log.is_running());
    }

    #[test]
    fn extreme_time_log_bounds_saturate() {
        let mut log = TaskTimeLog::start(Uuid::new_v4(), Uuid::new_v4(), i64::MIN);
        log.stop(i64::MAX);
        assert_eq!(log.duration_minutes, Some(i64::MAX / 60_000));

        let mut backwards = TaskTimeLog::start(Uuid::new_v4(), Uuid::new_v4(), i64::MAX);
        backwards.stop(i64::MIN);
        assert_eq!(backwards.duration_minutes, Some(0));
    }
}
