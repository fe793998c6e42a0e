//! Project, task and task-satellite use cases.
//!
//! # Responsibility
//! - Enforce task and project visibility, ownership and reference rules.
//! - Resolve default assignee and workspace for new tasks.
//! - Shape task views, boards, calendars, timers and analytics.
//!
//! # Invariants
//! - A task is visible to its creator, its assignee and members of its
//!   workspace; anything else is reported as not found.
//! - Parent links never form a cycle.
//! - At most one running timer exists per `(task, user)`.

use super::{found, ServiceError, ServiceResult};
use crate::analytics::period::{
    date_of_ms, month_from_parts, month_label, trailing_month_starts, EpochRange,
};
use crate::model::money::{count_percentage, round_to};
use crate::model::task::{
    completion_percentage, Project, ReminderType, Task, TaskAttachment, TaskComment,
    TaskPriority, TaskReminder, TaskStatus, TaskTimeLog,
};
use crate::model::{double_option, normalize_tags, RecordId, UserId};
use crate::repo::task_repo::{
    ProjectQuery, ReminderQuery, TaskOrdering, TaskQuery, TaskRepository, TaskScope,
    TimeLogQuery,
};
use crate::repo::user_repo::UserRepository;
use chrono::{DateTime, Datelike, Duration, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 24 * HOUR_MS;
const TREND_MONTHS: u32 = 6;
const MAX_PARENT_DEPTH: usize = 10_000;
const OPEN_STATUSES: [TaskStatus; 2] = [TaskStatus::Todo, TaskStatus::InProgress];
const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
const BOARD_COLUMNS: [TaskStatus; 4] = [
    TaskStatus::Todo,
    TaskStatus::InProgress,
    TaskStatus::Review,
    TaskStatus::Done,
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectInput {
    pub name: String,
    pub description: String,
    pub workspace: Option<RecordId>,
    pub color: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_archived: Option<bool>,
    #[serde(deserialize_with = "double_option")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub task_count: u32,
    pub completed_tasks: u32,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskInput {
    pub title: String,
    pub description: String,
    pub project: Option<RecordId>,
    pub workspace: Option<RecordId>,
    pub assignee: Option<UserId>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<i64>,
    pub start_date: Option<i64>,
    pub parent_task: Option<RecordId>,
    pub estimated_hours: Option<Decimal>,
    pub actual_hours: Option<Decimal>,
    /// Comma-separated.
    pub tags: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub project: Option<Option<RecordId>>,
    pub workspace: Option<RecordId>,
    #[serde(deserialize_with = "double_option")]
    pub assignee: Option<Option<UserId>>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    #[serde(deserialize_with = "double_option")]
    pub due_date: Option<Option<i64>>,
    #[serde(deserialize_with = "double_option")]
    pub start_date: Option<Option<i64>>,
    #[serde(deserialize_with = "double_option")]
    pub parent_task: Option<Option<RecordId>>,
    #[serde(deserialize_with = "double_option")]
    pub estimated_hours: Option<Option<Decimal>>,
    #[serde(deserialize_with = "double_option")]
    pub actual_hours: Option<Option<Decimal>>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub project_name: Option<String>,
    pub workspace_name: String,
    pub subtask_count: u32,
    pub comment_count: u32,
    pub is_overdue: bool,
    pub completion_percentage: f64,
}

/// `due` filter of the personal task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueFilter {
    Today,
    Overdue,
    Upcoming,
}

impl DueFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "today" => Some(Self::Today),
            "overdue" => Some(Self::Overdue),
            "upcoming" => Some(Self::Upcoming),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub pending_tasks: u32,
    pub overdue_tasks: u32,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub task: RecordId,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentInput {
    pub task: RecordId,
    pub filename: String,
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub file_size: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttachmentPatch {
    pub filename: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderInput {
    pub task: RecordId,
    pub reminder_time: i64,
    #[serde(default)]
    pub reminder_type: Option<ReminderType>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReminderPatch {
    pub reminder_time: Option<i64>,
    pub reminder_type: Option<ReminderType>,
    pub message: Option<String>,
    pub is_sent: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeLogInput {
    pub task: RecordId,
    pub start_time: i64,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimeLogPatch {
    pub start_time: Option<i64>,
    #[serde(deserialize_with = "double_option")]
    pub end_time: Option<Option<i64>>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTimeSummary {
    pub date: NaiveDate,
    pub total_hours: f64,
    pub total_minutes: i64,
    pub log_count: usize,
    /// Minutes per task title.
    pub task_breakdown: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KanbanColumn {
    pub status: TaskStatus,
    pub title: &'static str,
    pub tasks: Vec<TaskView>,
    pub task_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskCalendar {
    pub month: u32,
    pub year: i32,
    /// Tasks keyed by `YYYY-MM-DD` due day.
    pub tasks: BTreeMap<String, Vec<TaskView>>,
    pub total_tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCompletion {
    pub month: String,
    pub completed_tasks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskAnalytics {
    pub productivity_score: f64,
    /// Hours from creation to completion.
    pub average_completion_time: f64,
    pub most_productive_day: Option<&'static str>,
    pub priority_distribution: BTreeMap<String, u32>,
    pub status_distribution: BTreeMap<String, u32>,
    pub monthly_completion_trend: Vec<MonthlyCompletion>,
}

/// Task use-case facade.
pub struct TaskService<T: TaskRepository, U: UserRepository> {
    repo: T,
    users: U,
}

impl<T: TaskRepository, U: UserRepository> TaskService<T, U> {
    pub fn new(repo: T, users: U) -> Self {
        Self { repo, users }
    }

    pub fn list_projects(&self, user_id: UserId, query: &ProjectQuery) -> ServiceResult<Vec<ProjectView>> {
        self.repo
            .list_visible_projects(user_id, query)?
            .into_iter()
            .map(|project| self.project_view(project))
            .collect()
    }

    pub fn get_project(&self, user_id: UserId, id: RecordId) -> ServiceResult<ProjectView> {
        let project = found(self.repo.get_visible_project(user_id, id)?, "project")?;
        self.project_view(project)
    }

    pub fn create_project(&self, user_id: UserId, input: ProjectInput) -> ServiceResult<ProjectView> {
        let workspace_id = self.resolve_workspace(user_id, input.workspace)?;
        let mut project = Project::new(user_id, workspace_id, input.name.trim());
        project.description = input.description;
        if let Some(color) = input.color {
            project.color = color;
        }
        project.start_date = input.start_date;
        project.end_date = input.end_date;
        self.repo.create_project(&project)?;
        info!(
            "event=project_create module=tasks status=ok user_id={user_id} workspace_id={workspace_id}"
        );
        self.get_project(user_id, project.id)
    }

    pub fn update_project(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: ProjectPatch,
    ) -> ServiceResult<ProjectView> {
        let mut project = found(self.repo.get_visible_project(user_id, id)?, "project")?;
        if let Some(name) = patch.name {
            project.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            project.description = description;
        }
        if let Some(color) = patch.color {
            project.color = color;
        }
        if let Some(archived) = patch.is_archived {
            if archived != project.is_archived && project.owner_id != user_id {
                return Err(ServiceError::forbidden(
                    "only the project owner can archive or restore projects",
                ));
            }
            project.is_archived = archived;
        }
        if let Some(start) = patch.start_date {
            project.start_date = start;
        }
        if let Some(end) = patch.end_date {
            project.end_date = end;
        }
        self.repo.update_project(&project)?;
        self.project_view(project)
    }

    /// Owner-only; removes the project's tasks with it.
    pub fn delete_project(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        let project = self.owned_project(user_id, id, "only the project owner can delete projects")?;
        self.repo.delete_project(project.id)?;
        info!("event=project_delete module=tasks status=ok project_id={id}");
        Ok(())
    }

    pub fn archive_project(&self, user_id: UserId, id: RecordId) -> ServiceResult<ProjectView> {
        self.set_archived(user_id, id, true, "only the project owner can archive projects")
    }

    pub fn restore_project(&self, user_id: UserId, id: RecordId) -> ServiceResult<ProjectView> {
        self.set_archived(user_id, id, false, "only the project owner can restore projects")
    }

    pub fn list_tasks(
        &self,
        user_id: UserId,
        query: &TaskQuery,
        now_ms: i64,
    ) -> ServiceResult<Vec<TaskView>> {
        self.repo
            .list_tasks(user_id, query)?
            .into_iter()
            .map(|task| self.task_view(task, now_ms))
            .collect()
    }

    pub fn get_task(&self, user_id: UserId, id: RecordId, now_ms: i64) -> ServiceResult<TaskView> {
        let task = found(self.repo.get_visible_task(user_id, id)?, "task")?;
        self.task_view(task, now_ms)
    }

    pub fn create_task(&self, user_id: UserId, input: TaskInput, now_ms: i64) -> ServiceResult<TaskView> {
        let project = match input.project {
            Some(id) => Some(self.referenced_project(user_id, id)?),
            None => None,
        };
        let workspace_id = match (input.workspace, &project) {
            (Some(id), _) => self.referenced_workspace(user_id, id)?,
            (None, Some(project)) => project.workspace_id,
            (None, None) => self.resolve_workspace(user_id, None)?,
        };
        if project.as_ref().is_some_and(|p| p.workspace_id != workspace_id) {
            return Err(ServiceError::validation(
                "project",
                "project belongs to a different workspace",
            ));
        }

        let mut task = Task::new(user_id, workspace_id, input.title.trim());
        task.description = input.description;
        task.project_id = input.project;
        if let Some(assignee) = input.assignee {
            self.ensure_user(assignee)?;
            task.assignee_id = Some(assignee);
        }
        if let Some(priority) = input.priority {
            task.priority = priority;
        }
        task.set_status(input.status.unwrap_or(TaskStatus::Todo), now_ms);
        task.due_date = input.due_date;
        task.start_date = input.start_date;
        if let Some(parent) = input.parent_task {
            self.ensure_parent(user_id, task.id, parent)?;
            task.parent_task_id = Some(parent);
        }
        task.estimated_hours = input.estimated_hours;
        task.actual_hours = input.actual_hours;
        task.tags = normalize_tags(input.tags.split(',')).join(",");

        self.repo.create_task(&task)?;
        info!(
            "event=task_create module=tasks status=ok user_id={user_id} task_id={}",
            task.id
        );
        self.get_task(user_id, task.id, now_ms)
    }

    pub fn update_task(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: TaskPatch,
        now_ms: i64,
    ) -> ServiceResult<TaskView> {
        let mut task = found(self.repo.get_visible_task(user_id, id)?, "task")?;
        if let Some(title) = patch.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(workspace) = patch.workspace {
            if workspace != task.workspace_id {
                task.workspace_id = self.referenced_workspace(user_id, workspace)?;
            }
        }
        if let Some(project) = patch.project {
            task.project_id = project;
        }
        if let Some(project_id) = task.project_id {
            let project = self.referenced_project(user_id, project_id)?;
            if project.workspace_id != task.workspace_id {
                return Err(ServiceError::validation(
                    "project",
                    "project belongs to a different workspace",
                ));
            }
        }
        if let Some(assignee) = patch.assignee {
            if let Some(assignee) = assignee {
                self.ensure_user(assignee)?;
            }
            task.assignee_id = assignee;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(status) = patch.status {
            task.set_status(status, now_ms);
        }
        if let Some(due) = patch.due_date {
            task.due_date = due;
        }
        if let Some(start) = patch.start_date {
            task.start_date = start;
        }
        if let Some(parent) = patch.parent_task {
            if let Some(parent) = parent {
                self.ensure_parent(user_id, task.id, parent)?;
            }
            task.parent_task_id = parent;
        }
        if let Some(hours) = patch.estimated_hours {
            task.estimated_hours = hours;
        }
        if let Some(hours) = patch.actual_hours {
            task.actual_hours = hours;
        }
        if let Some(tags) = patch.tags {
            task.tags = normalize_tags(tags.split(',')).join(",");
        }

        self.repo.update_task(&task)?;
        self.task_view(task, now_ms)
    }

    pub fn delete_task(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        let task = found(self.repo.get_visible_task(user_id, id)?, "task")?;
        self.repo.delete_task(task.id)?;
        info!("event=task_delete module=tasks status=ok task_id={id}");
        Ok(())
    }

    /// Visible tasks assigned to the caller.
    pub fn my_tasks(
        &self,
        user_id: UserId,
        status: Option<TaskStatus>,
        due: Option<DueFilter>,
        now_ms: i64,
    ) -> ServiceResult<Vec<TaskView>> {
        let mut query = TaskQuery {
            assignee_id: Some(user_id),
            statuses: status.into_iter().collect(),
            ..TaskQuery::default()
        };
        match due {
            Some(DueFilter::Today) => {
                if let Some(today) = date_of_ms(now_ms) {
                    query.due = EpochRange::days(today, today);
                }
            }
            Some(filter @ (DueFilter::Overdue | DueFilter::Upcoming)) => {
                if status.is_some_and(|s| !OPEN_STATUSES.contains(&s)) {
                    return Ok(Vec::new());
                }
                if status.is_none() {
                    query.statuses = OPEN_STATUSES.to_vec();
                }
                query.due = if filter == DueFilter::Overdue {
                    EpochRange {
                        start_ms: None,
                        end_ms: Some(now_ms),
                    }
                } else {
                    EpochRange::between(now_ms, now_ms + 7 * DAY_MS + 1)
                };
            }
            None => {}
        }
        self.repo
            .list_tasks(user_id, &query)?
            .into_iter()
            .map(|task| self.task_view(task, now_ms))
            .collect()
    }

    pub fn summary(&self, user_id: UserId, now_ms: i64) -> ServiceResult<TaskSummary> {
        let total = self.repo.count_tasks(user_id, &TaskQuery::default())?;
        let completed = self.count_with(user_id, vec![TaskStatus::Done], EpochRange::all())?;
        let pending = self.count_with(user_id, OPEN_STATUSES.to_vec(), EpochRange::all())?;
        let overdue = self.count_with(
            user_id,
            OPEN_STATUSES.to_vec(),
            EpochRange {
                start_ms: None,
                end_ms: Some(now_ms),
            },
        )?;
        Ok(TaskSummary {
            total_tasks: total,
            completed_tasks: completed,
            pending_tasks: pending,
            overdue_tasks: overdue,
            completion_rate: round_to(count_percentage(completed, total), 2),
        })
    }

    pub fn start_timer(
        &self,
        user_id: UserId,
        task_id: RecordId,
        description: String,
        now_ms: i64,
    ) -> ServiceResult<TaskTimeLog> {
        let task = found(self.repo.get_visible_task(user_id, task_id)?, "task")?;
        if self.repo.running_time_log(user_id, task.id)?.is_some() {
            return Err(ServiceError::invalid("Timer already running for this task"));
        }
        let mut log = TaskTimeLog::start(task.id, user_id, now_ms);
        log.description = description;
        self.repo.create_time_log(&log)?;
        info!("event=timer_start module=tasks status=ok task_id={task_id}");
        found(self.repo.get_time_log(user_id, log.id)?, "time log")
    }

    pub fn stop_timer(&self, user_id: UserId, task_id: RecordId, now_ms: i64) -> ServiceResult<TaskTimeLog> {
        let task = found(self.repo.get_visible_task(user_id, task_id)?, "task")?;
        let Some(mut log) = self.repo.running_time_log(user_id, task.id)? else {
            return Err(ServiceError::invalid("No active timer found for this task"));
        };
        log.stop(now_ms.max(log.start_time));
        self.repo.update_time_log(&log)?;
        info!(
            "event=timer_stop module=tasks status=ok task_id={task_id} minutes={}",
            log.duration_minutes.unwrap_or(0)
        );
        Ok(log)
    }

    pub fn list_comments(&self, user_id: UserId, task_id: Option<RecordId>) -> ServiceResult<Vec<TaskComment>> {
        Ok(self.repo.list_comments(user_id, task_id)?)
    }

    pub fn get_comment(&self, user_id: UserId, id: RecordId) -> ServiceResult<TaskComment> {
        found(self.repo.get_comment(user_id, id)?, "comment")
    }

    pub fn create_comment(&self, user_id: UserId, input: CommentInput) -> ServiceResult<TaskComment> {
        let task = self.referenced_task(user_id, input.task)?;
        let comment = TaskComment::new(task.id, user_id, input.content.trim());
        self.repo.create_comment(&comment)?;
        self.get_comment(user_id, comment.id)
    }

    pub fn update_comment(&self, user_id: UserId, id: RecordId, content: String) -> ServiceResult<TaskComment> {
        let mut comment = self.get_comment(user_id, id)?;
        if comment.author_id != user_id {
            return Err(ServiceError::forbidden("only the author can edit a comment"));
        }
        comment.content = content.trim().to_string();
        self.repo.update_comment(&comment)?;
        self.get_comment(user_id, id)
    }

    pub fn delete_comment(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        let comment = self.get_comment(user_id, id)?;
        if comment.author_id != user_id {
            return Err(ServiceError::forbidden("only the author can delete a comment"));
        }
        self.repo.delete_comment(id)?;
        Ok(())
    }

    pub fn list_attachments(
        &self,
        user_id: UserId,
        task_id: Option<RecordId>,
    ) -> ServiceResult<Vec<TaskAttachment>> {
        Ok(self.repo.list_attachments(user_id, task_id)?)
    }

    pub fn get_attachment(&self, user_id: UserId, id: RecordId) -> ServiceResult<TaskAttachment> {
        found(self.repo.get_attachment(user_id, id)?, "attachment")
    }

    pub fn create_attachment(&self, user_id: UserId, input: AttachmentInput) -> ServiceResult<TaskAttachment> {
        let task = self.referenced_task(user_id, input.task)?;
        let attachment = TaskAttachment {
            id: uuid::Uuid::new_v4(),
            task_id: task.id,
            uploaded_by: user_id,
            filename: input.filename.trim().to_string(),
            file_url: input.file_url,
            file_size: input.file_size,
            uploaded_at: 0,
        };
        self.repo.create_attachment(&attachment)?;
        self.get_attachment(user_id, attachment.id)
    }

    pub fn update_attachment(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: AttachmentPatch,
    ) -> ServiceResult<TaskAttachment> {
        let mut attachment = self.get_attachment(user_id, id)?;
        if attachment.uploaded_by != user_id {
            return Err(ServiceError::forbidden("only the uploader can edit an attachment"));
        }
        if let Some(filename) = patch.filename {
            attachment.filename = filename.trim().to_string();
        }
        if let Some(url) = patch.file_url {
            attachment.file_url = url;
        }
        if let Some(size) = patch.file_size {
            attachment.file_size = size;
        }
        self.repo.update_attachment(&attachment)?;
        self.get_attachment(user_id, id)
    }

    pub fn delete_attachment(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        let attachment = self.get_attachment(user_id, id)?;
        if attachment.uploaded_by != user_id {
            return Err(ServiceError::forbidden("only the uploader can delete an attachment"));
        }
        self.repo.delete_attachment(id)?;
        Ok(())
    }

    pub fn list_reminders(&self, user_id: UserId, query: &ReminderQuery) -> ServiceResult<Vec<TaskReminder>> {
        Ok(self.repo.list_reminders(user_id, query)?)
    }

    /// Unsent reminders due within the next 24 hours.
    pub fn upcoming_reminders(&self, user_id: UserId, now_ms: i64) -> ServiceResult<Vec<TaskReminder>> {
        let query = ReminderQuery {
            is_sent: Some(false),
            range: EpochRange::between(now_ms, now_ms + DAY_MS + 1),
            ..ReminderQuery::default()
        };
        self.list_reminders(user_id, &query)
    }

    pub fn get_reminder(&self, user_id: UserId, id: RecordId) -> ServiceResult<TaskReminder> {
        found(self.repo.get_reminder(user_id, id)?, "reminder")
    }

    pub fn create_reminder(&self, user_id: UserId, input: ReminderInput) -> ServiceResult<TaskReminder> {
        let task = self.referenced_task(user_id, input.task)?;
        let mut reminder = TaskReminder::new(task.id, user_id, input.reminder_time);
        if let Some(kind) = input.reminder_type {
            reminder.reminder_type = kind;
        }
        reminder.message = input.message;
        self.repo.create_reminder(&reminder)?;
        self.get_reminder(user_id, reminder.id)
    }

    pub fn update_reminder(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: ReminderPatch,
        now_ms: i64,
    ) -> ServiceResult<TaskReminder> {
        let mut reminder = self.get_reminder(user_id, id)?;
        if let Some(time) = patch.reminder_time {
            reminder.reminder_time = time;
        }
        if let Some(kind) = patch.reminder_type {
            reminder.reminder_type = kind;
        }
        if let Some(message) = patch.message {
            reminder.message = message;
        }
        if let Some(sent) = patch.is_sent {
            reminder.sent_at = match (sent, reminder.sent_at) {
                (false, _) => None,
                (true, Some(at)) => Some(at),
                (true, None) => Some(now_ms),
            };
            reminder.is_sent = sent;
        }
        self.repo.update_reminder(&reminder)?;
        self.get_reminder(user_id, id)
    }

    pub fn delete_reminder(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_reminder(user_id, id)?;
        Ok(())
    }

    pub fn list_time_logs(&self, user_id: UserId, query: &TimeLogQuery) -> ServiceResult<Vec<TaskTimeLog>> {
        Ok(self.repo.list_time_logs(user_id, query)?)
    }

    pub fn get_time_log(&self, user_id: UserId, id: RecordId) -> ServiceResult<TaskTimeLog> {
        found(self.repo.get_time_log(user_id, id)?, "time log")
    }

    pub fn create_time_log(&self, user_id: UserId, input: TimeLogInput) -> ServiceResult<TaskTimeLog> {
        let task = self.referenced_task(user_id, input.task)?;
        let mut log = TaskTimeLog::start(task.id, user_id, input.start_time);
        log.description = input.description;
        if let Some(end) = input.end_time {
            log.stop(end);
        } else if self.repo.running_time_log(user_id, task.id)?.is_some() {
            return Err(ServiceError::invalid("Timer already running for this task"));
        }
        self.repo.create_time_log(&log)?;
        self.get_time_log(user_id, log.id)
    }

    pub fn update_time_log(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: TimeLogPatch,
    ) -> ServiceResult<TaskTimeLog> {
        let mut log = self.get_time_log(user_id, id)?;
        if let Some(start) = patch.start_time {
            log.start_time = start;
        }
        if let Some(end) = patch.end_time {
            log.end_time = end;
        }
        if let Some(description) = patch.description {
            log.description = description;
        }
        log.refresh_duration();
        self.repo.update_time_log(&log)?;
        self.get_time_log(user_id, id)
    }

    pub fn delete_time_log(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_time_log(user_id, id)?;
        Ok(())
    }

    /// Finished logs started on `date`.
    pub fn daily_summary(&self, user_id: UserId, date: NaiveDate) -> ServiceResult<DailyTimeSummary> {
        let range = EpochRange::days(date, date);
        let logs = self.repo.list_time_logs(
            user_id,
            &TimeLogQuery {
                range,
                finished_only: true,
                ..TimeLogQuery::default()
            },
        )?;
        let total_minutes: i64 = logs.iter().filter_map(|log| log.duration_minutes).sum();
        let mut task_breakdown = BTreeMap::new();
        for entry in self.repo.minutes_by_task(user_id, &range)? {
            *task_breakdown.entry(entry.title).or_insert(0) += entry.minutes;
        }
        Ok(DailyTimeSummary {
            date,
            total_hours: round_to(total_minutes as f64 / 60.0, 2),
            total_minutes,
            log_count: logs.len(),
            task_breakdown,
        })
    }

    /// Four status columns, newest first, optionally limited to one project.
    pub fn kanban(
        &self,
        user_id: UserId,
        project_id: Option<RecordId>,
        now_ms: i64,
    ) -> ServiceResult<Vec<KanbanColumn>> {
        BOARD_COLUMNS
            .into_iter()
            .map(|status| {
                let query = TaskQuery {
                    statuses: vec![status],
                    project_id,
                    ordering: TaskOrdering::CreatedDesc,
                    ..TaskQuery::default()
                };
                let tasks = self
                    .repo
                    .list_tasks(user_id, &query)?
                    .into_iter()
                    .map(|task| self.task_view(task, now_ms))
                    .collect::<ServiceResult<Vec<_>>>()?;
                Ok(KanbanColumn {
                    status,
                    title: status.label(),
                    task_count: tasks.len(),
                    tasks,
                })
            })
            .collect()
    }

    pub fn calendar(&self, user_id: UserId, year: i32, month: u32, now_ms: i64) -> ServiceResult<TaskCalendar> {
        let first = month_from_parts(year, month)
            .ok_or_else(|| ServiceError::invalid("Invalid month or year"))?;
        let query = TaskQuery {
            due: EpochRange::month_of(first),
            ordering: TaskOrdering::DueAsc,
            ..TaskQuery::default()
        };
        let mut tasks: BTreeMap<String, Vec<TaskView>> = BTreeMap::new();
        let mut total_tasks = 0;
        for task in self.repo.list_tasks(user_id, &query)? {
            let Some(day) = task.due_date.and_then(date_of_ms) else {
                continue;
            };
            total_tasks += 1;
            tasks
                .entry(day.format("%Y-%m-%d").to_string())
                .or_default()
                .push(self.task_view(task, now_ms)?);
        }
        Ok(TaskCalendar {
            month,
            year,
            tasks,
            total_tasks,
        })
    }

    /// Personal task statistics for tasks created in `[start, end]`;
    /// defaults to the 30 days ending `today`.
    pub fn analytics(
        &self,
        user_id: UserId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> ServiceResult<TaskAnalytics> {
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            _ => (today - Duration::days(30), today),
        };
        let tasks = self.repo.list_tasks(
            user_id,
            &TaskQuery {
                scope: TaskScope::Personal,
                created: EpochRange::days(start, end),
                ..TaskQuery::default()
            },
        )?;

        let total = tasks.len() as u32;
        let done: Vec<&Task> = tasks.iter().filter(|t| t.status == TaskStatus::Done).collect();
        let durations: Vec<f64> = done
            .iter()
            .filter_map(|task| task.completed_at.map(|at| (at - task.created_at) as f64 / HOUR_MS as f64))
            .collect();
        let average_completion_time = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        let mut priority_distribution = BTreeMap::new();
        let mut status_distribution = BTreeMap::new();
        for task in &tasks {
            *priority_distribution.entry(task.priority.to_string()).or_insert(0) += 1;
            *status_distribution.entry(task.status.to_string()).or_insert(0) += 1;
        }

        let monthly_completion_trend = trailing_month_starts(today, TREND_MONTHS)
            .into_iter()
            .map(|month| {
                let completed = self.repo.count_tasks(
                    user_id,
                    &TaskQuery {
                        scope: TaskScope::Personal,
                        statuses: vec![TaskStatus::Done],
                        completed: EpochRange::month_of(month),
                        ..TaskQuery::default()
                    },
                )?;
                Ok(MonthlyCompletion {
                    month: month_label(month),
                    completed_tasks: completed,
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        Ok(TaskAnalytics {
            productivity_score: round_to(count_percentage(done.len() as u32, total), 2),
            average_completion_time: round_to(average_completion_time, 2),
            most_productive_day: most_productive_day(done.iter().filter_map(|t| t.completed_at)),
            priority_distribution,
            status_distribution,
            monthly_completion_trend,
        })
    }

    fn task_view(&self, task: Task, now_ms: i64) -> ServiceResult<TaskView> {
        let context = self.repo.task_context(&task)?;
        Ok(TaskView {
            is_overdue: task.is_overdue(now_ms),
            completion_percentage: completion_percentage(
                task.status,
                context.subtask_count,
                context.subtasks_done,
            ),
            project_name: context.project_name,
            workspace_name: context.workspace_name,
            subtask_count: context.subtask_count,
            comment_count: context.comment_count,
            task,
        })
    }

    fn project_view(&self, project: Project) -> ServiceResult<ProjectView> {
        let (total, done) = self.repo.project_task_counts(project.id)?;
        Ok(ProjectView {
            project,
            task_count: total,
            completed_tasks: done,
            progress_percentage: round_to(count_percentage(done, total), 2),
        })
    }

    fn count_with(&self, user_id: UserId, statuses: Vec<TaskStatus>, due: EpochRange) -> ServiceResult<u32> {
        Ok(self.repo.count_tasks(
            user_id,
            &TaskQuery {
                statuses,
                due,
                ..TaskQuery::default()
            },
        )?)
    }

    fn set_archived(
        &self,
        user_id: UserId,
        id: RecordId,
        archived: bool,
        denied: &str,
    ) -> ServiceResult<ProjectView> {
        let mut project = self.owned_project(user_id, id, denied)?;
        project.is_archived = archived;
        self.repo.update_project(&project)?;
        info!("event=project_archive module=tasks status=ok project_id={id} archived={archived}");
        self.project_view(project)
    }

    fn owned_project(&self, user_id: UserId, id: RecordId, denied: &str) -> ServiceResult<Project> {
        let project = found(self.repo.get_visible_project(user_id, id)?, "project")?;
        if project.owner_id != user_id {
            return Err(ServiceError::forbidden(denied));
        }
        Ok(project)
    }

    /// Requested workspace if visible, else the caller's personal workspace.
    fn resolve_workspace(&self, user_id: UserId, requested: Option<RecordId>) -> ServiceResult<RecordId> {
        match requested {
            Some(id) => self.referenced_workspace(user_id, id),
            None => self
                .users
                .default_workspace_id(user_id)?
                .ok_or_else(|| ServiceError::validation("workspace", "no workspace available")),
        }
    }

    fn referenced_workspace(&self, user_id: UserId, id: RecordId) -> ServiceResult<RecordId> {
        self.users
            .get_visible_workspace(user_id, id)?
            .map(|workspace| workspace.id)
            .ok_or_else(|| ServiceError::validation("workspace", "invalid workspace"))
    }

    fn referenced_project(&self, user_id: UserId, id: RecordId) -> ServiceResult<Project> {
        self.repo
            .get_visible_project(user_id, id)?
            .ok_or_else(|| ServiceError::validation("project", "invalid project"))
    }

    fn referenced_task(&self, user_id: UserId, id: RecordId) -> ServiceResult<Task> {
        self.repo
            .get_visible_task(user_id, id)?
            .ok_or_else(|| ServiceError::validation("task", "invalid task"))
    }

    fn ensure_user(&self, id: UserId) -> ServiceResult<()> {
        match self.users.get_user(id)? {
            Some(_) => Ok(()),
            None => Err(ServiceError::validation("assignee", "unknown user")),
        }
    }

    /// Parent must be visible and must not have `task_id` among its ancestors.
    fn ensure_parent(&self, user_id: UserId, task_id: RecordId, parent_id: RecordId) -> ServiceResult<()> {
        if self.repo.get_visible_task(user_id, parent_id)?.is_none() {
            return Err(ServiceError::validation("parent_task", "invalid parent task"));
        }
        let mut cursor = Some(parent_id);
        for _ in 0..MAX_PARENT_DEPTH {
            let Some(current) = cursor else {
                return Ok(());
            };
            if current == task_id {
                return Err(ServiceError::validation(
                    "parent_task",
                    "parent task would create a cycle",
                ));
            }
            cursor = self.repo.get_task_parent(current)?.flatten();
        }
        Err(ServiceError::validation("parent_task", "parent chain is too deep"))
    }
}

/// Weekday with the most completions; ties go to the earlier weekday.
pub fn most_productive_day<I: IntoIterator<Item = i64>>(completions: I) -> Option<&'static str> {
    let mut counts = [0u32; 7];
    for ms in completions {
        if let Some(at) = DateTime::from_timestamp_millis(ms) {
            counts[at.weekday().num_days_from_monday() as usize] += 1;
        }
    }
    let (index, best) = counts
        .iter()
        .enumerate()
        .fold((0, 0), |acc, (i, &n)| if n > acc.1 { (i, n) } else { acc });
    (best > 0).then(|| WEEKDAY_NAMES[index])
}

#[cfg(test)]
mod tests {
    use super::{most_productive_day, DueFilter};
    use chrono::{NaiveDate, NaiveTime};

    fn at(y: i32, m: u32, d: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(15, 0, 0).unwrap())
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn most_productive_day_counts_completion_weekdays() {
        // 2024-03-05 and 2024-03-12 are Tuesdays, 2024-03-08 is a Friday.
        let completions = [at(2024, 3, 5), at(2024, 3, 12), at(2024, 3, 8)];
        assert_eq!(most_productive_day(completions), Some("Tuesday"));
        assert_eq!(most_productive_day(Vec::new()), None);
    }

    #[test]
    fn most_productive_day_prefers_earlier_weekday_on_ties() {
        let completions = [at(2024, 3, 8), at(2024, 3, 4)];
        assert_eq!(most_productive_day(completions), Some("Monday"));
    }

    #[test]
    fn due_filter_parses_known_values() {
        assert_eq!(DueFilter::parse("overdue"), Some(DueFilter::Overdue));
        assert_eq!(DueFilter::parse("later"), None);
    }
}
