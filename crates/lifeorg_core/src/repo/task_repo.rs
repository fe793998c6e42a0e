//! Project, task and task-attachment persistence.
//!
//! # Responsibility
//! - CRUD and filtered listing for projects, tasks and the records hanging
//!   off a task (comments, attachments, reminders, time logs).
//! - Encode the visibility rules in SQL so callers never see foreign rows.
//!
//! # Invariants
//! - Visible tasks: created by, assigned to, or in a workspace of the viewer.
//! - Personal-scope tasks: created by or assigned to the viewer.
//! - Visible projects: owned by the viewer or in one of their workspaces.
//! - Comments and attachments are visible to their author/uploader and to the
//!   creator or assignee of their task.
//! - Reminders and time logs are private to their user.

use super::{
    bool_col, bool_to_int, count_col, date_text, enum_col, id_text, normalize_limit, opt_date_col,
    opt_decimal_col, opt_decimal_text, opt_id_text, opt_uuid_col, uuid_col, RepoError, RepoResult,
    SqlQuery,
};
use crate::analytics::period::EpochRange;
use crate::model::task::{
    Project, ReminderType, Task, TaskAttachment, TaskComment, TaskPriority, TaskReminder,
    TaskStatus, TaskTimeLog,
};
use crate::model::{RecordId, UserId};
use crate::repo::expense_repo::escape_like;
use rusqlite::{params, Connection, OptionalExtension, Row};

const TASKS_LIMIT_MAX: u32 = 1_000;

const PROJECT_SELECT_SQL: &str = "SELECT
    p.id, p.name, p.description, p.workspace_id, p.owner_id, p.color, p.is_archived,
    p.start_date, p.end_date, p.created_at, p.updated_at
 FROM projects p";

const PROJECT_VISIBLE_SQL: &str = "(p.owner_id = ? OR EXISTS (
    SELECT 1 FROM workspace_members wm WHERE wm.workspace_id = p.workspace_id AND wm.user_id = ?
 ))";

const TASK_SELECT_SQL: &str = "SELECT
    t.id, t.title, t.description, t.project_id, t.workspace_id, t.assignee_id, t.created_by,
    t.priority, t.status, t.due_date, t.start_date, t.completed_at, t.parent_task_id,
    t.estimated_hours, t.actual_hours, t.tags, t.created_at, t.updated_at
 FROM tasks t";

const TASK_VISIBLE_SQL: &str = "(t.created_by = ? OR t.assignee_id = ? OR EXISTS (
    SELECT 1 FROM workspace_members wm WHERE wm.workspace_id = t.workspace_id AND wm.user_id = ?
 ))";

const TASK_PERSONAL_SQL: &str = "(t.created_by = ? OR t.assignee_id = ?)";

const COMMENT_SELECT_SQL: &str = "SELECT
    c.id, c.task_id, c.author_id, c.content, c.created_at, c.updated_at
 FROM task_comments c
 JOIN tasks t ON t.id = c.task_id";

const ATTACHMENT_SELECT_SQL: &str = "SELECT
    a.id, a.task_id, a.uploaded_by, a.filename, a.file_url, a.file_size, a.uploaded_at
 FROM task_attachments a
 JOIN tasks t ON t.id = a.task_id";

const REMINDER_SELECT_SQL: &str = "SELECT
    id, task_id, user_id, reminder_time, reminder_type, message, is_sent, sent_at, created_at
 FROM task_reminders";

const TIME_LOG_SELECT_SQL: &str = "SELECT
    id, task_id, user_id, start_time, end_time, description, duration_minutes, created_at
 FROM task_time_logs";

/// Which rule decides whether a task row is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskScope {
    /// Creator, assignee or workspace member.
    #[default]
    Visible,
    /// Creator or assignee only; used for personal statistics.
    Personal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskOrdering {
    #[default]
    CreatedDesc,
    CreatedAsc,
    DueAsc,
    DueDesc,
    PriorityDesc,
    PriorityAsc,
    TitleAsc,
}

impl TaskOrdering {
    /// Parses `field` / `-field` for `created_at`, `due_date`, `priority`, `title`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "-created_at" => Some(Self::CreatedDesc),
            "created_at" => Some(Self::CreatedAsc),
            "due_date" => Some(Self::DueAsc),
            "-due_date" => Some(Self::DueDesc),
            "-priority" => Some(Self::PriorityDesc),
            "priority" => Some(Self::PriorityAsc),
            "title" => Some(Self::TitleAsc),
            _ => None,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            Self::CreatedDesc => "ORDER BY t.created_at DESC, t.id ASC",
            Self::CreatedAsc => "ORDER BY t.created_at ASC, t.id ASC",
            Self::DueAsc => "ORDER BY t.due_date IS NULL, t.due_date ASC, t.id ASC",
            Self::DueDesc => "ORDER BY t.due_date IS NULL, t.due_date DESC, t.id ASC",
            Self::PriorityDesc => {
                "ORDER BY CASE t.priority WHEN 'urgent' THEN 4 WHEN 'high' THEN 3 \
                 WHEN 'medium' THEN 2 ELSE 1 END DESC, t.created_at DESC, t.id ASC"
            }
            Self::PriorityAsc => {
                "ORDER BY CASE t.priority WHEN 'urgent' THEN 4 WHEN 'high' THEN 3 \
                 WHEN 'medium' THEN 2 ELSE 1 END ASC, t.created_at DESC, t.id ASC"
            }
            Self::TitleAsc => "ORDER BY t.title COLLATE NOCASE ASC, t.id ASC",
        }
    }
}

/// Filter and page options for task listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub scope: TaskScope,
    /// Accepted statuses; empty accepts all.
    pub statuses: Vec<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub project_id: Option<RecordId>,
    pub workspace_id: Option<RecordId>,
    pub assignee_id: Option<UserId>,
    pub parent_task_id: Option<RecordId>,
    /// Case-insensitive match over title, description and tags.
    pub search: Option<String>,
    pub due: EpochRange,
    pub created: EpochRange,
    pub completed: EpochRange,
    pub ordering: TaskOrdering,
    /// Maximum rows to return; `None` returns every matching row.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Derived counts and labels for one task view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskContext {
    pub project_name: Option<String>,
    pub workspace_name: String,
    pub subtask_count: u32,
    pub subtasks_done: u32,
    pub comment_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectQuery {
    pub workspace_id: Option<RecordId>,
    pub is_archived: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderQuery {
    pub task_id: Option<RecordId>,
    pub is_sent: Option<bool>,
    pub range: EpochRange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeLogQuery {
    pub task_id: Option<RecordId>,
    /// Bounds on `start_time`.
    pub range: EpochRange,
    /// Only logs with an `end_time`.
    pub finished_only: bool,
}

/// Minutes logged against one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMinutes {
    pub task_id: RecordId,
    pub title: String,
    pub minutes: i64,
}

pub trait TaskRepository {
    fn create_project(&self, project: &Project) -> RepoResult<()>;
    fn get_visible_project(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<Project>>;
    fn list_visible_projects(&self, viewer: UserId, query: &ProjectQuery)
        -> RepoResult<Vec<Project>>;
    fn update_project(&self, project: &Project) -> RepoResult<()>;
    fn delete_project(&self, id: RecordId) -> RepoResult<()>;
    /// Returns `(total, done)` task counts of a project.
    fn project_task_counts(&self, project_id: RecordId) -> RepoResult<(u32, u32)>;

    fn create_task(&self, task: &Task) -> RepoResult<()>;
    fn get_visible_task(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<Task>>;
    /// Parent link of any task; `None` when the task does not exist.
    fn get_task_parent(&self, id: RecordId) -> RepoResult<Option<Option<RecordId>>>;
    fn list_tasks(&self, viewer: UserId, query: &TaskQuery) -> RepoResult<Vec<Task>>;
    fn count_tasks(&self, viewer: UserId, query: &TaskQuery) -> RepoResult<u32>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn delete_task(&self, id: RecordId) -> RepoResult<()>;
    fn task_context(&self, task: &Task) -> RepoResult<TaskContext>;

    fn create_comment(&self, comment: &TaskComment) -> RepoResult<()>;
    fn get_comment(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<TaskComment>>;
    fn list_comments(&self, viewer: UserId, task_id: Option<RecordId>)
        -> RepoResult<Vec<TaskComment>>;
    fn update_comment(&self, comment: &TaskComment) -> RepoResult<()>;
    fn delete_comment(&self, id: RecordId) -> RepoResult<()>;

    fn create_attachment(&self, attachment: &TaskAttachment) -> RepoResult<()>;
    fn get_attachment(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<TaskAttachment>>;
    fn list_attachments(
        &self,
        viewer: UserId,
        task_id: Option<RecordId>,
    ) -> RepoResult<Vec<TaskAttachment>>;
    fn update_attachment(&self, attachment: &TaskAttachment) -> RepoResult<()>;
    fn delete_attachment(&self, id: RecordId) -> RepoResult<()>;

    fn create_reminder(&self, reminder: &TaskReminder) -> RepoResult<()>;
    fn get_reminder(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<TaskReminder>>;
    /// Lists reminders by time, soonest first.
    fn list_reminders(&self, user_id: UserId, query: &ReminderQuery)
        -> RepoResult<Vec<TaskReminder>>;
    fn update_reminder(&self, reminder: &TaskReminder) -> RepoResult<()>;
    fn delete_reminder(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;

    fn create_time_log(&self, log: &TaskTimeLog) -> RepoResult<()>;
    fn get_time_log(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<TaskTimeLog>>;
    /// The user's open log on a task, if any.
    fn running_time_log(&self, user_id: UserId, task_id: RecordId)
        -> RepoResult<Option<TaskTimeLog>>;
    /// Lists logs newest first.
    fn list_time_logs(&self, user_id: UserId, query: &TimeLogQuery)
        -> RepoResult<Vec<TaskTimeLog>>;
    /// Finished-log minutes per task for logs started inside `range`.
    fn minutes_by_task(&self, user_id: UserId, range: &EpochRange) -> RepoResult<Vec<TaskMinutes>>;
    fn update_time_log(&self, log: &TaskTimeLog) -> RepoResult<()>;
    fn delete_time_log(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn task_filter(base: &str, viewer: UserId, query: &TaskQuery) -> SqlQuery {
        let mut sql = SqlQuery::new(base);
        let viewer = id_text(viewer);
        match query.scope {
            TaskScope::Visible => {
                sql.push_bind(&format!("WHERE {TASK_VISIBLE_SQL}"), viewer.clone())
                    .bind(viewer.clone())
                    .bind(viewer);
            }
            TaskScope::Personal => {
                sql.push_bind(&format!("WHERE {TASK_PERSONAL_SQL}"), viewer.clone())
                    .bind(viewer);
            }
        }
        if !query.statuses.is_empty() {
            let marks = vec!["?"; query.statuses.len()].join(", ");
            sql.push(&format!("AND t.status IN ({marks})"));
            for status in &query.statuses {
                sql.bind(status.as_str().to_string());
            }
        }
        if let Some(priority) = query.priority {
            sql.push_bind("AND t.priority = ?", priority.as_str().to_string());
        }
        if let Some(project_id) = query.project_id {
            sql.push_bind("AND t.project_id = ?", id_text(project_id));
        }
        if let Some(workspace_id) = query.workspace_id {
            sql.push_bind("AND t.workspace_id = ?", id_text(workspace_id));
        }
        if let Some(assignee_id) = query.assignee_id {
            sql.push_bind("AND t.assignee_id = ?", id_text(assignee_id));
        }
        if let Some(parent_id) = query.parent_task_id {
            sql.push_bind("AND t.parent_task_id = ?", id_text(parent_id));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            sql.push_bind("AND (t.title LIKE ? ESCAPE '\\'", pattern.clone())
                .push_bind("OR t.description LIKE ? ESCAPE '\\'", pattern.clone())
                .push_bind("OR t.tags LIKE ? ESCAPE '\\')", pattern);
        }
        sql.push_range("t.due_date", &query.due)
            .push_range("t.created_at", &query.created)
            .push_range("t.completed_at", &query.completed);
        sql
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_project(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;
        self.conn.execute(
            "INSERT INTO projects (
                id, name, description, workspace_id, owner_id, color, is_archived,
                start_date, end_date
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                id_text(project.id),
                project.name,
                project.description,
                id_text(project.workspace_id),
                id_text(project.owner_id),
                project.color,
                bool_to_int(project.is_archived),
                project.start_date.map(date_text),
                project.end_date.map(date_text),
            ],
        )?;
        Ok(())
    }

    fn get_visible_project(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<Project>> {
        let mut sql = SqlQuery::new(PROJECT_SELECT_SQL);
        sql.push_bind(&format!("WHERE {PROJECT_VISIBLE_SQL}"), id_text(viewer))
            .bind(id_text(viewer))
            .push_bind("AND p.id = ?", id_text(id));
        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_project_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_visible_projects(
        &self,
        viewer: UserId,
        query: &ProjectQuery,
    ) -> RepoResult<Vec<Project>> {
        let mut sql = SqlQuery::new(PROJECT_SELECT_SQL);
        sql.push_bind(&format!("WHERE {PROJECT_VISIBLE_SQL}"), id_text(viewer))
            .bind(id_text(viewer));
        if let Some(workspace_id) = query.workspace_id {
            sql.push_bind("AND p.workspace_id = ?", id_text(workspace_id));
        }
        if let Some(archived) = query.is_archived {
            sql.push_bind("AND p.is_archived = ?", bool_to_int(archived));
        }
        sql.push("ORDER BY p.created_at DESC, p.id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn update_project(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;
        let changed = self.conn.execute(
            "UPDATE projects
             SET name = ?2, description = ?3, workspace_id = ?4, color = ?5, is_archived = ?6,
                 start_date = ?7, end_date = ?8,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id_text(project.id),
                project.name,
                project.description,
                id_text(project.workspace_id),
                project.color,
                bool_to_int(project.is_archived),
                project.start_date.map(date_text),
                project.end_date.map(date_text),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("project", project.id));
        }
        Ok(())
    }

    fn delete_project(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id_text(id)])?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        Ok(())
    }

    fn project_task_counts(&self, project_id: RecordId) -> RepoResult<(u32, u32)> {
        let counts = self.conn.query_row(
            "SELECT COUNT(*), COUNT(CASE WHEN status = 'done' THEN 1 END)
             FROM tasks WHERE project_id = ?1;",
            [id_text(project_id)],
            |row| Ok((count_col(row, 0)?, count_col(row, 1)?)),
        )?;
        Ok(counts)
    }

    fn create_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        self.conn.execute(
            "INSERT INTO tasks (
                id, title, description, project_id, workspace_id, assignee_id, created_by,
                priority, status, due_date, start_date, completed_at, parent_task_id,
                estimated_hours, actual_hours, tags
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
            params![
                id_text(task.id),
                task.title,
                task.description,
                opt_id_text(task.project_id),
                id_text(task.workspace_id),
                opt_id_text(task.assignee_id),
                id_text(task.created_by),
                task.priority.as_str(),
                task.status.as_str(),
                task.due_date,
                task.start_date,
                task.completed_at,
                opt_id_text(task.parent_task_id),
                opt_decimal_text(task.estimated_hours),
                opt_decimal_text(task.actual_hours),
                task.tags,
            ],
        )?;
        Ok(())
    }

    fn get_visible_task(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<Task>> {
        let mut sql = SqlQuery::new(TASK_SELECT_SQL);
        let viewer = id_text(viewer);
        sql.push_bind(&format!("WHERE {TASK_VISIBLE_SQL}"), viewer.clone())
            .bind(viewer.clone())
            .bind(viewer)
            .push_bind("AND t.id = ?", id_text(id));
        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_task_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_task_parent(&self, id: RecordId) -> RepoResult<Option<Option<RecordId>>> {
        let parent = self
            .conn
            .query_row(
                "SELECT parent_task_id FROM tasks WHERE id = ?1;",
                [id_text(id)],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        match parent {
            None => Ok(None),
            Some(None) => Ok(Some(None)),
            Some(Some(text)) => uuid::Uuid::parse_str(&text)
                .map(|parent| Some(Some(parent)))
                .map_err(|_| RepoError::InvalidData(format!("invalid parent task id `{text}`"))),
        }
    }

    fn list_tasks(&self, viewer: UserId, query: &TaskQuery) -> RepoResult<Vec<Task>> {
        let mut sql = Self::task_filter(TASK_SELECT_SQL, viewer, query);
        sql.push(query.ordering.order_by());
        if let Some(limit) = query.limit {
            let limit = normalize_limit(Some(limit), TASKS_LIMIT_MAX, TASKS_LIMIT_MAX);
            sql.push_bind("LIMIT ?", i64::from(limit))
                .push_bind("OFFSET ?", i64::from(query.offset));
        }

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn count_tasks(&self, viewer: UserId, query: &TaskQuery) -> RepoResult<u32> {
        let sql = Self::task_filter("SELECT COUNT(*) FROM tasks t", viewer, query);
        let count = self
            .conn
            .query_row(sql.sql(), sql.params(), |row| count_col(row, 0))?;
        Ok(count)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        let changed = self.conn.execute(
            "UPDATE tasks
             SET title = ?2, description = ?3, project_id = ?4, workspace_id = ?5,
                 assignee_id = ?6, priority = ?7, status = ?8, due_date = ?9, start_date = ?10,
                 completed_at = ?11, parent_task_id = ?12, estimated_hours = ?13,
                 actual_hours = ?14, tags = ?15,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id_text(task.id),
                task.title,
                task.description,
                opt_id_text(task.project_id),
                id_text(task.workspace_id),
                opt_id_text(task.assignee_id),
                task.priority.as_str(),
                task.status.as_str(),
                task.due_date,
                task.start_date,
                task.completed_at,
                opt_id_text(task.parent_task_id),
                opt_decimal_text(task.estimated_hours),
                opt_decimal_text(task.actual_hours),
                task.tags,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("task", task.id));
        }
        Ok(())
    }

    fn delete_task(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id_text(id)])?;
        if changed == 0 {
            return Err(RepoError::not_found("task", id));
        }
        Ok(())
    }

    fn task_context(&self, task: &Task) -> RepoResult<TaskContext> {
        let context = self
            .conn
            .query_row(
                "SELECT
                    p.name,
                    w.name,
                    (SELECT COUNT(*) FROM tasks s WHERE s.parent_task_id = t.id),
                    (SELECT COUNT(*) FROM tasks s WHERE s.parent_task_id = t.id AND s.status = 'done'),
                    (SELECT COUNT(*) FROM task_comments c WHERE c.task_id = t.id)
                 FROM tasks t
                 JOIN workspaces w ON w.id = t.workspace_id
                 LEFT JOIN projects p ON p.id = t.project_id
                 WHERE t.id = ?1;",
                [id_text(task.id)],
                |row| {
                    Ok(TaskContext {
                        project_name: row.get(0)?,
                        workspace_name: row.get(1)?,
                        subtask_count: count_col(row, 2)?,
                        subtasks_done: count_col(row, 3)?,
                        comment_count: count_col(row, 4)?,
                    })
                },
            )
            .optional()?;
        context.ok_or_else(|| RepoError::not_found("task", task.id))
    }

    fn create_comment(&self, comment: &TaskComment) -> RepoResult<()> {
        comment.validate()?;
        self.conn.execute(
            "INSERT INTO task_comments (id, task_id, author_id, content) VALUES (?1, ?2, ?3, ?4);",
            params![
                id_text(comment.id),
                id_text(comment.task_id),
                id_text(comment.author_id),
                comment.content,
            ],
        )?;
        Ok(())
    }

    fn get_comment(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<TaskComment>> {
        let viewer = id_text(viewer);
        let mut stmt = self.conn.prepare(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE (t.created_by = ?1 OR t.assignee_id = ?1 OR c.author_id = ?1) AND c.id = ?2;"
        ))?;
        let mut rows = stmt.query([viewer, id_text(id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_comment_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_comments(
        &self,
        viewer: UserId,
        task_id: Option<RecordId>,
    ) -> RepoResult<Vec<TaskComment>> {
        let viewer = id_text(viewer);
        let mut sql = SqlQuery::new(COMMENT_SELECT_SQL);
        sql.push_bind("WHERE (t.created_by = ?", viewer.clone())
            .push_bind("OR t.assignee_id = ?", viewer.clone())
            .push_bind("OR c.author_id = ?)", viewer);
        if let Some(task_id) = task_id {
            sql.push_bind("AND c.task_id = ?", id_text(task_id));
        }
        sql.push("ORDER BY c.created_at ASC, c.id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }
        Ok(comments)
    }

    fn update_comment(&self, comment: &TaskComment) -> RepoResult<()> {
        comment.validate()?;
        let changed = self.conn.execute(
            "UPDATE task_comments
             SET content = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id_text(comment.id), comment.content],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("comment", comment.id));
        }
        Ok(())
    }

    fn delete_comment(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM task_comments WHERE id = ?1;", [id_text(id)])?;
        if changed == 0 {
            return Err(RepoError::not_found("comment", id));
        }
        Ok(())
    }

    fn create_attachment(&self, attachment: &TaskAttachment) -> RepoResult<()> {
        attachment.validate()?;
        self.conn.execute(
            "INSERT INTO task_attachments (id, task_id, uploaded_by, filename, file_url, file_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id_text(attachment.id),
                id_text(attachment.task_id),
                id_text(attachment.uploaded_by),
                attachment.filename,
                attachment.file_url,
                attachment.file_size,
            ],
        )?;
        Ok(())
    }

    fn get_attachment(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<TaskAttachment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTACHMENT_SELECT_SQL}
             WHERE (t.created_by = ?1 OR t.assignee_id = ?1 OR a.uploaded_by = ?1) AND a.id = ?2;"
        ))?;
        let mut rows = stmt.query([id_text(viewer), id_text(id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_attachment_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_attachments(
        &self,
        viewer: UserId,
        task_id: Option<RecordId>,
    ) -> RepoResult<Vec<TaskAttachment>> {
        let viewer = id_text(viewer);
        let mut sql = SqlQuery::new(ATTACHMENT_SELECT_SQL);
        sql.push_bind("WHERE (t.created_by = ?", viewer.clone())
            .push_bind("OR t.assignee_id = ?", viewer.clone())
            .push_bind("OR a.uploaded_by = ?)", viewer);
        if let Some(task_id) = task_id {
            sql.push_bind("AND a.task_id = ?", id_text(task_id));
        }
        sql.push("ORDER BY a.uploaded_at DESC, a.id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut attachments = Vec::new();
        while let Some(row) = rows.next()? {
            attachments.push(parse_attachment_row(row)?);
        }
        Ok(attachments)
    }

    fn update_attachment(&self, attachment: &TaskAttachment) -> RepoResult<()> {
        attachment.validate()?;
        let changed = self.conn.execute(
            "UPDATE task_attachments SET filename = ?2, file_url = ?3, file_size = ?4 WHERE id = ?1;",
            params![
                id_text(attachment.id),
                attachment.filename,
                attachment.file_url,
                attachment.file_size,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("attachment", attachment.id));
        }
        Ok(())
    }

    fn delete_attachment(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM task_attachments WHERE id = ?1;", [id_text(id)])?;
        if changed == 0 {
            return Err(RepoError::not_found("attachment", id));
        }
        Ok(())
    }

    fn create_reminder(&self, reminder: &TaskReminder) -> RepoResult<()> {
        reminder.validate()?;
        self.conn.execute(
            "INSERT INTO task_reminders (
                id, task_id, user_id, reminder_time, reminder_type, message, is_sent, sent_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id_text(reminder.id),
                id_text(reminder.task_id),
                id_text(reminder.user_id),
                reminder.reminder_time,
                reminder.reminder_type.as_str(),
                reminder.message,
                bool_to_int(reminder.is_sent),
                reminder.sent_at,
            ],
        )?;
        Ok(())
    }

    fn get_reminder(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<TaskReminder>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{REMINDER_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_reminder_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_reminders(
        &self,
        user_id: UserId,
        query: &ReminderQuery,
    ) -> RepoResult<Vec<TaskReminder>> {
        let mut sql = SqlQuery::new(REMINDER_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(task_id) = query.task_id {
            sql.push_bind("AND task_id = ?", id_text(task_id));
        }
        if let Some(is_sent) = query.is_sent {
            sql.push_bind("AND is_sent = ?", bool_to_int(is_sent));
        }
        sql.push_range("reminder_time", &query.range)
            .push("ORDER BY reminder_time ASC, id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut reminders = Vec::new();
        while let Some(row) = rows.next()? {
            reminders.push(parse_reminder_row(row)?);
        }
        Ok(reminders)
    }

    fn update_reminder(&self, reminder: &TaskReminder) -> RepoResult<()> {
        reminder.validate()?;
        let changed = self.conn.execute(
            "UPDATE task_reminders
             SET task_id = ?3, reminder_time = ?4, reminder_type = ?5, message = ?6,
                 is_sent = ?7, sent_at = ?8
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(reminder.id),
                id_text(reminder.user_id),
                id_text(reminder.task_id),
                reminder.reminder_time,
                reminder.reminder_type.as_str(),
                reminder.message,
                bool_to_int(reminder.is_sent),
                reminder.sent_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("reminder", reminder.id));
        }
        Ok(())
    }

    fn delete_reminder(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM task_reminders WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("reminder", id));
        }
        Ok(())
    }

    fn create_time_log(&self, log: &TaskTimeLog) -> RepoResult<()> {
        log.validate()?;
        self.conn.execute(
            "INSERT INTO task_time_logs (
                id, task_id, user_id, start_time, end_time, description, duration_minutes
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id_text(log.id),
                id_text(log.task_id),
                id_text(log.user_id),
                log.start_time,
                log.end_time,
                log.description,
                log.duration_minutes,
            ],
        )?;
        Ok(())
    }

    fn get_time_log(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<TaskTimeLog>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TIME_LOG_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_time_log_row(row)?)),
            None => Ok(None),
        }
    }

    fn running_time_log(
        &self,
        user_id: UserId,
        task_id: RecordId,
    ) -> RepoResult<Option<TaskTimeLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TIME_LOG_SELECT_SQL}
             WHERE user_id = ?1 AND task_id = ?2 AND end_time IS NULL
             ORDER BY start_time DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([id_text(user_id), id_text(task_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_time_log_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_time_logs(
        &self,
        user_id: UserId,
        query: &TimeLogQuery,
    ) -> RepoResult<Vec<TaskTimeLog>> {
        let mut sql = SqlQuery::new(TIME_LOG_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(task_id) = query.task_id {
            sql.push_bind("AND task_id = ?", id_text(task_id));
        }
        if query.finished_only {
            sql.push("AND end_time IS NOT NULL");
        }
        sql.push_range("start_time", &query.range)
            .push("ORDER BY start_time DESC, id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(parse_time_log_row(row)?);
        }
        Ok(logs)
    }

    fn minutes_by_task(&self, user_id: UserId, range: &EpochRange) -> RepoResult<Vec<TaskMinutes>> {
        let mut sql = SqlQuery::new(
            "SELECT l.task_id AS task_id, t.title AS title,
                    COALESCE(SUM(l.duration_minutes), 0) AS minutes
             FROM task_time_logs l
             JOIN tasks t ON t.id = l.task_id",
        );
        sql.push_bind("WHERE l.user_id = ?", id_text(user_id))
            .push("AND l.end_time IS NOT NULL")
            .push_range("l.start_time", range)
            .push("GROUP BY l.task_id ORDER BY minutes DESC, title ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut breakdown = Vec::new();
        while let Some(row) = rows.next()? {
            breakdown.push(TaskMinutes {
                task_id: uuid_col(row, "task_id")?,
                title: row.get("title")?,
                minutes: row.get("minutes")?,
            });
        }
        Ok(breakdown)
    }

    fn update_time_log(&self, log: &TaskTimeLog) -> RepoResult<()> {
        log.validate()?;
        let changed = self.conn.execute(
            "UPDATE task_time_logs
             SET task_id = ?3, start_time = ?4, end_time = ?5, description = ?6,
                 duration_minutes = ?7
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(log.id),
                id_text(log.user_id),
                id_text(log.task_id),
                log.start_time,
                log.end_time,
                log.description,
                log.duration_minutes,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("time log", log.id));
        }
        Ok(())
    }

    fn delete_time_log(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM task_time_logs WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("time log", id));
        }
        Ok(())
    }
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    Ok(Project {
        id: uuid_col(row, "id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        workspace_id: uuid_col(row, "workspace_id")?,
        owner_id: uuid_col(row, "owner_id")?,
        color: row.get("color")?,
        is_archived: bool_col(row, "is_archived")?,
        start_date: opt_date_col(row, "start_date")?,
        end_date: opt_date_col(row, "end_date")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    Ok(Task {
        id: uuid_col(row, "id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        project_id: opt_uuid_col(row, "project_id")?,
        workspace_id: uuid_col(row, "workspace_id")?,
        assignee_id: opt_uuid_col(row, "assignee_id")?,
        created_by: uuid_col(row, "created_by")?,
        priority: enum_col(row, "priority", TaskPriority::parse)?,
        status: enum_col(row, "status", TaskStatus::parse)?,
        due_date: row.get("due_date")?,
        start_date: row.get("start_date")?,
        completed_at: row.get("completed_at")?,
        parent_task_id: opt_uuid_col(row, "parent_task_id")?,
        estimated_hours: opt_decimal_col(row, "estimated_hours")?,
        actual_hours: opt_decimal_col(row, "actual_hours")?,
        tags: row.get("tags")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<TaskComment> {
    Ok(TaskComment {
        id: uuid_col(row, "id")?,
        task_id: uuid_col(row, "task_id")?,
        author_id: uuid_col(row, "author_id")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_attachment_row(row: &Row<'_>) -> RepoResult<TaskAttachment> {
    Ok(TaskAttachment {
        id: uuid_col(row, "id")?,
        task_id: uuid_col(row, "task_id")?,
        uploaded_by: uuid_col(row, "uploaded_by")?,
        filename: row.get("filename")?,
        file_url: row.get("file_url")?,
        file_size: row.get("file_size")?,
        uploaded_at: row.get("uploaded_at")?,
    })
}

fn parse_reminder_row(row: &Row<'_>) -> RepoResult<TaskReminder> {
    Ok(TaskReminder {
        id: uuid_col(row, "id")?,
        task_id: uuid_col(row, "task_id")?,
        user_id: uuid_col(row, "user_id")?,
        reminder_time: row.get("reminder_time")?,
        reminder_type: enum_col(row, "reminder_type", ReminderType::parse)?,
        message: row.get("message")?,
        is_sent: bool_col(row, "is_sent")?,
        sent_at: row.get("sent_at")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_time_log_row(row: &Row<'_>) -> RepoResult<TaskTimeLog> {
    Ok(TaskTimeLog {
        id: uuid_col(row, "id")?,
        task_id: uuid_col(row, "task_id")?,
        user_id: uuid_col(row, "user_id")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        description: row.get("description")?,
        duration_minutes: row.get("duration_minutes")?,
        created_at: row.get("created_at")?,
    })
}
