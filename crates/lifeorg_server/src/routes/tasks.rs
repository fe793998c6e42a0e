//! Projects, tasks, task side records, kanban, calendar and analytics.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Datelike, NaiveDate};
use lifeorg_core::analytics::period::{now_ms, today, EpochRange};
use lifeorg_core::model::dashboard::ActivityType;
use lifeorg_core::model::task::{
    TaskAttachment, TaskComment, TaskPriority, TaskReminder, TaskStatus, TaskTimeLog,
};
use lifeorg_core::repo::task_repo::{
    ProjectQuery, ReminderQuery, TaskOrdering, TaskQuery, TimeLogQuery,
};
use lifeorg_core::service::task_service::{
    AttachmentInput, AttachmentPatch, CommentInput, DailyTimeSummary, DueFilter, KanbanColumn,
    ProjectInput, ProjectPatch, ProjectView, ReminderInput, ReminderPatch, TaskAnalytics,
    TaskCalendar, TaskInput, TaskPatch, TaskSummary, TaskView, TimeLogInput, TimeLogPatch,
};
use lifeorg_core::{RecordId, UserId};
use serde::Deserialize;
use serde_json::json;

use super::created;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser, ClientMeta};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/{id}/archive", post(archive_project))
        .route("/projects/{id}/restore", post(restore_project))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/my_tasks", get(my_tasks))
        .route("/tasks/summary", get(summary))
        .route(
            "/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/start_timer", post(start_timer))
        .route("/tasks/{id}/stop_timer", post(stop_timer))
        .route("/comments", get(list_comments).post(create_comment))
        .route(
            "/comments/{id}",
            get(get_comment).patch(update_comment).delete(delete_comment),
        )
        .route("/attachments", get(list_attachments).post(create_attachment))
        .route(
            "/attachments/{id}",
            get(get_attachment)
                .patch(update_attachment)
                .delete(delete_attachment),
        )
        .route("/reminders", get(list_reminders).post(create_reminder))
        .route("/reminders/upcoming", get(upcoming_reminders))
        .route(
            "/reminders/{id}",
            get(get_reminder).patch(update_reminder).delete(delete_reminder),
        )
        .route("/time-logs", get(list_time_logs).post(create_time_log))
        .route("/time-logs/daily_summary", get(daily_summary))
        .route(
            "/time-logs/{id}",
            get(get_time_log).patch(update_time_log).delete(delete_time_log),
        )
        .route("/kanban", get(kanban))
        .route("/calendar", get(calendar))
        .route("/analytics", get(analytics))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectParams {
    workspace: Option<RecordId>,
    is_archived: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TaskParams {
    /// Comma-separated statuses.
    status: Option<String>,
    priority: Option<TaskPriority>,
    project: Option<RecordId>,
    workspace: Option<RecordId>,
    assignee: Option<UserId>,
    parent_task: Option<RecordId>,
    search: Option<String>,
    ordering: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl TaskParams {
    fn into_query(self) -> ApiResult<TaskQuery> {
        let statuses = match self.status.as_deref() {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    TaskStatus::parse(part)
                        .ok_or_else(|| ApiError::BadRequest(format!("unknown status {part:?}")))
                })
                .collect::<ApiResult<Vec<_>>>()?,
        };
        let ordering = match self.ordering.as_deref() {
            None => TaskOrdering::default(),
            Some(value) => TaskOrdering::parse(value)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown ordering {value:?}")))?,
        };
        Ok(TaskQuery {
            statuses,
            priority: self.priority,
            project_id: self.project,
            workspace_id: self.workspace,
            assignee_id: self.assignee,
            parent_task_id: self.parent_task,
            search: self.search,
            ordering,
            limit: self.limit,
            offset: self.offset.unwrap_or(0),
            ..TaskQuery::default()
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MyTaskParams {
    status: Option<TaskStatus>,
    due: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimerRequest {
    description: String,
}

#[derive(Debug, Deserialize)]
struct CommentEdit {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TaskFilter {
    task: Option<RecordId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReminderParams {
    task: Option<RecordId>,
    is_sent: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimeLogParams {
    task: Option<RecordId>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DayParams {
    date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KanbanParams {
    project: Option<RecordId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CalendarParams {
    year: Option<i32>,
    month: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DateRangeParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<ProjectParams>,
) -> ApiResult<Json<Vec<ProjectView>>> {
    let query = ProjectQuery {
        workspace_id: params.workspace,
        is_archived: params.is_archived,
    };
    let projects = state
        .run(move |db| Ok(db.tasks().list_projects(auth.user_id, &query)?))
        .await?;
    Ok(Json(projects))
}

async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<ProjectInput>,
) -> ApiResult<Response> {
    let project = state
        .run(move |db| Ok(db.tasks().create_project(auth.user_id, input)?))
        .await?;
    Ok(created(project))
}

async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<ProjectView>> {
    let project = state
        .run(move |db| Ok(db.tasks().get_project(auth.user_id, id)?))
        .await?;
    Ok(Json(project))
}

async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<ProjectPatch>,
) -> ApiResult<Json<ProjectView>> {
    let project = state
        .run(move |db| Ok(db.tasks().update_project(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.tasks().delete_project(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn archive_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<ProjectView>> {
    let project = state
        .run(move |db| Ok(db.tasks().archive_project(auth.user_id, id)?))
        .await?;
    Ok(Json(project))
}

async fn restore_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<ProjectView>> {
    let project = state
        .run(move |db| Ok(db.tasks().restore_project(auth.user_id, id)?))
        .await?;
    Ok(Json(project))
}

async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<TaskParams>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let query = params.into_query()?;
    let tasks = state
        .run(move |db| Ok(db.tasks().list_tasks(auth.user_id, &query, now_ms())?))
        .await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientMeta,
    ApiJson(input): ApiJson<TaskInput>,
) -> ApiResult<Response> {
    let task = state
        .run(move |db| {
            let task = db.tasks().create_task(auth.user_id, input, now_ms())?;
            db.dashboard().record_activity(
                auth.user_id,
                ActivityType::TaskCreated,
                format!("Created task: {}", task.task.title),
                client.context(Some(json!({ "task_id": task.task.id }))),
            )?;
            Ok(task)
        })
        .await?;
    Ok(created(task))
}

async fn my_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<MyTaskParams>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let due = match params.due.as_deref() {
        None => None,
        Some(value) => Some(
            DueFilter::parse(value)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown due filter {value:?}")))?,
        ),
    };
    let tasks = state
        .run(move |db| Ok(db.tasks().my_tasks(auth.user_id, params.status, due, now_ms())?))
        .await?;
    Ok(Json(tasks))
}

async fn summary(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<TaskSummary>> {
    let summary = state
        .run(move |db| Ok(db.tasks().summary(auth.user_id, now_ms())?))
        .await?;
    Ok(Json(summary))
}

async fn get_task(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<TaskView>> {
    let task = state
        .run(move |db| Ok(db.tasks().get_task(auth.user_id, id, now_ms())?))
        .await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientMeta,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> ApiResult<Json<TaskView>> {
    let task = state
        .run(move |db| {
            let tasks = db.tasks();
            let now = now_ms();
            let before = tasks.get_task(auth.user_id, id, now)?.task.status;
            let task = tasks.update_task(auth.user_id, id, patch, now)?;
            if before != TaskStatus::Done && task.task.status == TaskStatus::Done {
                db.dashboard().record_activity(
                    auth.user_id,
                    ActivityType::TaskCompleted,
                    format!("Completed task: {}", task.task.title),
                    client.context(Some(json!({ "task_id": task.task.id }))),
                )?;
            }
            Ok(task)
        })
        .await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.tasks().delete_task(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_timer(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    body: Bytes,
) -> ApiResult<Response> {
    let description = if body.is_empty() {
        String::new()
    } else {
        serde_json::from_slice::<TimerRequest>(&body)
            .map_err(|err| ApiError::Malformed(err.to_string()))?
            .description
    };
    let log = state
        .run(move |db| Ok(db.tasks().start_timer(auth.user_id, id, description, now_ms())?))
        .await?;
    Ok(created(log))
}

async fn stop_timer(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<TaskTimeLog>> {
    let log = state
        .run(move |db| Ok(db.tasks().stop_timer(auth.user_id, id, now_ms())?))
        .await?;
    Ok(Json(log))
}

async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> ApiResult<Json<Vec<TaskComment>>> {
    let comments = state
        .run(move |db| Ok(db.tasks().list_comments(auth.user_id, filter.task)?))
        .await?;
    Ok(Json(comments))
}

async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<CommentInput>,
) -> ApiResult<Response> {
    let comment = state
        .run(move |db| Ok(db.tasks().create_comment(auth.user_id, input)?))
        .await?;
    Ok(created(comment))
}

async fn get_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<TaskComment>> {
    let comment = state
        .run(move |db| Ok(db.tasks().get_comment(auth.user_id, id)?))
        .await?;
    Ok(Json(comment))
}

async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(edit): ApiJson<CommentEdit>,
) -> ApiResult<Json<TaskComment>> {
    let comment = state
        .run(move |db| Ok(db.tasks().update_comment(auth.user_id, id, edit.content)?))
        .await?;
    Ok(Json(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.tasks().delete_comment(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_attachments(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> ApiResult<Json<Vec<TaskAttachment>>> {
    let attachments = state
        .run(move |db| Ok(db.tasks().list_attachments(auth.user_id, filter.task)?))
        .await?;
    Ok(Json(attachments))
}

async fn create_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<AttachmentInput>,
) -> ApiResult<Response> {
    let attachment = state
        .run(move |db| Ok(db.tasks().create_attachment(auth.user_id, input)?))
        .await?;
    Ok(created(attachment))
}

async fn get_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<TaskAttachment>> {
    let attachment = state
        .run(move |db| Ok(db.tasks().get_attachment(auth.user_id, id)?))
        .await?;
    Ok(Json(attachment))
}

async fn update_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<AttachmentPatch>,
) -> ApiResult<Json<TaskAttachment>> {
    let attachment = state
        .run(move |db| Ok(db.tasks().update_attachment(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(attachment))
}

async fn delete_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.tasks().delete_attachment(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_reminders(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<ReminderParams>,
) -> ApiResult<Json<Vec<TaskReminder>>> {
    let query = ReminderQuery {
        task_id: params.task,
        is_sent: params.is_sent,
        ..ReminderQuery::default()
    };
    let reminders = state
        .run(move |db| Ok(db.tasks().list_reminders(auth.user_id, &query)?))
        .await?;
    Ok(Json(reminders))
}

async fn upcoming_reminders(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<TaskReminder>>> {
    let reminders = state
        .run(move |db| Ok(db.tasks().upcoming_reminders(auth.user_id, now_ms())?))
        .await?;
    Ok(Json(reminders))
}

async fn create_reminder(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<ReminderInput>,
) -> ApiResult<Response> {
    let reminder = state
        .run(move |db| Ok(db.tasks().create_reminder(auth.user_id, input)?))
        .await?;
    Ok(created(reminder))
}

async fn get_reminder(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<TaskReminder>> {
    let reminder = state
        .run(move |db| Ok(db.tasks().get_reminder(auth.user_id, id)?))
        .await?;
    Ok(Json(reminder))
}

async fn update_reminder(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<ReminderPatch>,
) -> ApiResult<Json<TaskReminder>> {
    let reminder = state
        .run(move |db| Ok(db.tasks().update_reminder(auth.user_id, id, patch, now_ms())?))
        .await?;
    Ok(Json(reminder))
}

async fn delete_reminder(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.tasks().delete_reminder(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_time_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<TimeLogParams>,
) -> ApiResult<Json<Vec<TaskTimeLog>>> {
    let query = TimeLogQuery {
        task_id: params.task,
        range: EpochRange::from_optional_days(params.start_date, params.end_date),
        finished_only: false,
    };
    let logs = state
        .run(move |db| Ok(db.tasks().list_time_logs(auth.user_id, &query)?))
        .await?;
    Ok(Json(logs))
}

async fn create_time_log(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<TimeLogInput>,
) -> ApiResult<Response> {
    let log = state
        .run(move |db| Ok(db.tasks().create_time_log(auth.user_id, input)?))
        .await?;
    Ok(created(log))
}

async fn daily_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<DayParams>,
) -> ApiResult<Json<DailyTimeSummary>> {
    let date = params.date.unwrap_or_else(today);
    let summary = state
        .run(move |db| Ok(db.tasks().daily_summary(auth.user_id, date)?))
        .await?;
    Ok(Json(summary))
}

async fn get_time_log(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<TaskTimeLog>> {
    let log = state
        .run(move |db| Ok(db.tasks().get_time_log(auth.user_id, id)?))
        .await?;
    Ok(Json(log))
}

async fn update_time_log(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<TimeLogPatch>,
) -> ApiResult<Json<TaskTimeLog>> {
    let log = state
        .run(move |db| Ok(db.tasks().update_time_log(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(log))
}

async fn delete_time_log(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.tasks().delete_time_log(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn kanban(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<KanbanParams>,
) -> ApiResult<Json<Vec<KanbanColumn>>> {
    let columns = state
        .run(move |db| Ok(db.tasks().kanban(auth.user_id, params.project, now_ms())?))
        .await?;
    Ok(Json(columns))
}

async fn calendar(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<CalendarParams>,
) -> ApiResult<Json<TaskCalendar>> {
    let now = today();
    let year = params.year.unwrap_or(now.year());
    let month = params.month.unwrap_or(now.month());
    let calendar = state
        .run(move |db| Ok(db.tasks().calendar(auth.user_id, year, month, now_ms())?))
        .await?;
    Ok(Json(calendar))
}

async fn analytics(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<DateRangeParams>,
) -> ApiResult<Json<TaskAnalytics>> {
    let analytics = state
        .run(move |db| {
            Ok(db
                .tasks()
                .analytics(auth.user_id, params.start_date, params.end_date, today())?)
        })
        .await?;
    Ok(Json(analytics))
}
