use lifeorg_core::db::open_db_in_memory;
use lifeorg_core::model::task::{TaskPriority, TaskStatus};
use lifeorg_core::model::user::WorkspaceType;
use lifeorg_core::repo::task_repo::{SqliteTaskRepository, TaskQuery};
use lifeorg_core::repo::user_repo::SqliteUserRepository;
use lifeorg_core::service::task_service::{
    CommentInput, DueFilter, ProjectInput, TaskInput, TaskPatch, TimeLogInput,
};
use lifeorg_core::service::user_service::{Registration, WorkspaceInput};
use lifeorg_core::{RecordId, ServiceError, TaskService, UserId, UserService};
use rusqlite::Connection;

const NOW: i64 = 1_717_243_200_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 24 * HOUR_MS;

type Service<'conn> = TaskService<SqliteTaskRepository<'conn>, SqliteUserRepository<'conn>>;

fn users(conn: &Connection) -> UserService<SqliteUserRepository<'_>> {
    UserService::new(SqliteUserRepository::new(conn))
}

fn register(conn: &Connection, username: &str) -> UserId {
    users(conn)
        .register(
            Registration {
                username: username.to_string(),
                password: "s3cret-pass".to_string(),
                ..Registration::default()
            },
            NOW,
        )
        .unwrap()
        .user
        .id
}

fn service(conn: &Connection) -> Service<'_> {
    TaskService::new(SqliteTaskRepository::new(conn), SqliteUserRepository::new(conn))
}

fn task(title: &str) -> TaskInput {
    TaskInput {
        title: title.to_string(),
        ..TaskInput::default()
    }
}

fn team_workspace(conn: &Connection, owner: UserId, member: &str) -> RecordId {
    let users = users(conn);
    let workspace = users
        .create_workspace(
            owner,
            WorkspaceInput {
                name: "Team".to_string(),
                description: String::new(),
                workspace_type: WorkspaceType::Team,
            },
        )
        .unwrap();
    users.add_member(owner, workspace.id, member).unwrap();
    workspace.id
}

#[test]
fn new_task_lands_in_personal_workspace_assigned_to_creator() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let tasks = service(&conn);

    let created = tasks
        .create_task(
            user,
            TaskInput {
                tags: " home, urgent ,home".to_string(),
                ..task("Fix sink")
            },
            NOW,
        )
        .unwrap();
    assert_eq!(created.task.assignee_id, Some(user));
    assert_eq!(created.task.status, TaskStatus::Todo);
    assert_eq!(created.task.priority, TaskPriority::Medium);
    assert_eq!(created.workspace_name, "Personal");
    assert_eq!(created.task.tag_list(), vec!["home", "urgent"]);
    assert_eq!(created.completion_percentage, 0.0);
}

#[test]
fn completing_task_stamps_completion_and_reopening_clears_it() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let tasks = service(&conn);
    let id = tasks.create_task(user, task("Write report"), NOW).unwrap().task.id;

    let done = tasks
        .update_task(
            user,
            id,
            TaskPatch {
                status: Some(TaskStatus::Done),
                ..TaskPatch::default()
            },
            NOW + HOUR_MS,
        )
        .unwrap();
    assert_eq!(done.task.completed_at, Some(NOW + HOUR_MS));
    assert_eq!(done.completion_percentage, 100.0);

    let reopened = tasks
        .update_task(
            user,
            id,
            TaskPatch {
                status: Some(TaskStatus::InProgress),
                ..TaskPatch::default()
            },
            NOW + 2 * HOUR_MS,
        )
        .unwrap();
    assert_eq!(reopened.task.completed_at, None);
}

#[test]
fn summary_and_due_filters_count_open_and_overdue_tasks() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let tasks = service(&conn);

    tasks
        .create_task(
            user,
            TaskInput {
                due_date: Some(NOW - DAY_MS),
                ..task("Late")
            },
            NOW,
        )
        .unwrap();
    tasks
        .create_task(
            user,
            TaskInput {
                due_date: Some(NOW + 2 * DAY_MS),
                ..task("Soon")
            },
            NOW,
        )
        .unwrap();
    tasks
        .create_task(
            user,
            TaskInput {
                due_date: Some(NOW - DAY_MS),
                status: Some(TaskStatus::Done),
                ..task("Finished late")
            },
            NOW,
        )
        .unwrap();

    let summary = tasks.summary(user, NOW).unwrap();
    assert_eq!(summary.total_tasks, 3);
    assert_eq!(summary.completed_tasks, 1);
    assert_eq!(summary.pending_tasks, 2);
    assert_eq!(summary.overdue_tasks, 1);
    assert!((summary.completion_rate - 33.33).abs() < 1e-9);

    let overdue = tasks.my_tasks(user, None, Some(DueFilter::Overdue), NOW).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].task.title, "Late");
    assert!(overdue[0].is_overdue);

    let upcoming = tasks.my_tasks(user, None, Some(DueFilter::Upcoming), NOW).unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].task.title, "Soon");

    let none = tasks
        .my_tasks(user, Some(TaskStatus::Done), Some(DueFilter::Overdue), NOW)
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn parent_links_reject_cycles() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let tasks = service(&conn);
    let root = tasks.create_task(user, task("Root"), NOW).unwrap().task.id;
    let child = tasks
        .create_task(
            user,
            TaskInput {
                parent_task: Some(root),
                ..task("Child")
            },
            NOW,
        )
        .unwrap()
        .task
        .id;

    let cycle = tasks.update_task(
        user,
        root,
        TaskPatch {
            parent_task: Some(Some(child)),
            ..TaskPatch::default()
        },
        NOW,
    );
    assert!(matches!(cycle, Err(ServiceError::Validation(err)) if err.field == "parent_task"));

    let itself = tasks.update_task(
        user,
        root,
        TaskPatch {
            parent_task: Some(Some(root)),
            ..TaskPatch::default()
        },
        NOW,
    );
    assert!(matches!(itself, Err(ServiceError::Validation(_))));

    let parent = tasks.get_task(user, root, NOW).unwrap();
    assert_eq!(parent.subtask_count, 1);
    assert_eq!(parent.completion_percentage, 0.0);
}

#[test]
fn workspace_members_see_shared_tasks_and_outsiders_do_not() {
    let conn = open_db_in_memory().unwrap();
    let owner = register(&conn, "ada");
    let member = register(&conn, "grace");
    let outsider = register(&conn, "linus");
    let workspace = team_workspace(&conn, owner, "grace");
    let tasks = service(&conn);

    let shared = tasks
        .create_task(
            owner,
            TaskInput {
                workspace: Some(workspace),
                ..task("Plan offsite")
            },
            NOW,
        )
        .unwrap();
    assert_eq!(tasks.get_task(member, shared.task.id, NOW).unwrap().workspace_name, "Team");
    assert!(matches!(
        tasks.get_task(outsider, shared.task.id, NOW),
        Err(ServiceError::NotFound(_))
    ));

    let foreign = tasks.create_task(
        outsider,
        TaskInput {
            workspace: Some(workspace),
            ..task("Sneaky")
        },
        NOW,
    );
    assert!(matches!(foreign, Err(ServiceError::Validation(err)) if err.field == "workspace"));

    let visible = tasks.list_tasks(member, &TaskQuery::default(), NOW).unwrap();
    assert_eq!(visible.len(), 1);
}

#[test]
fn only_project_owner_may_delete_or_archive() {
    let conn = open_db_in_memory().unwrap();
    let owner = register(&conn, "ada");
    let member = register(&conn, "grace");
    let workspace = team_workspace(&conn, owner, "grace");
    let tasks = service(&conn);

    let project = tasks
        .create_project(
            owner,
            ProjectInput {
                name: "Move house".to_string(),
                workspace: Some(workspace),
                ..ProjectInput::default()
            },
        )
        .unwrap();
    assert_eq!(project.project.color, "#007bff");

    let task_id = tasks
        .create_task(
            member,
            TaskInput {
                project: Some(project.project.id),
                status: Some(TaskStatus::Done),
                ..task("Book movers")
            },
            NOW,
        )
        .unwrap()
        .task
        .id;
    tasks
        .create_task(
            owner,
            TaskInput {
                project: Some(project.project.id),
                ..task("Pack books")
            },
            NOW,
        )
        .unwrap();

    let view = tasks.get_project(member, project.project.id).unwrap();
    assert_eq!(view.task_count, 2);
    assert_eq!(view.completed_tasks, 1);
    assert_eq!(view.progress_percentage, 50.0);

    assert!(matches!(
        tasks.delete_project(member, project.project.id),
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        tasks.archive_project(member, project.project.id),
        Err(ServiceError::Forbidden(_))
    ));
    assert!(tasks.archive_project(owner, project.project.id).unwrap().project.is_archived);

    tasks.delete_project(owner, project.project.id).unwrap();
    assert!(matches!(
        tasks.get_task(owner, task_id, NOW),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn timer_runs_once_per_task_and_records_minutes() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let tasks = service(&conn);
    let id = tasks.create_task(user, task("Deep work"), NOW).unwrap().task.id;

    tasks.start_timer(user, id, "focus".to_string(), NOW).unwrap();
    assert!(matches!(
        tasks.start_timer(user, id, String::new(), NOW + 1),
        Err(ServiceError::Invalid(_))
    ));
    let manual = tasks.create_time_log(
        user,
        TimeLogInput {
            task: id,
            start_time: NOW,
            end_time: None,
            description: String::new(),
        },
    );
    assert!(matches!(manual, Err(ServiceError::Invalid(_))));

    let stopped = tasks.stop_timer(user, id, NOW + 90 * 60_000).unwrap();
    assert_eq!(stopped.duration_minutes, Some(90));
    assert!(matches!(
        tasks.stop_timer(user, id, NOW + 100 * 60_000),
        Err(ServiceError::Invalid(_))
    ));
}

#[test]
fn comments_can_only_be_changed_by_their_author() {
    let conn = open_db_in_memory().unwrap();
    let owner = register(&conn, "ada");
    let member = register(&conn, "grace");
    let workspace = team_workspace(&conn, owner, "grace");
    let tasks = service(&conn);
    let id = tasks
        .create_task(
            owner,
            TaskInput {
                workspace: Some(workspace),
                ..task("Shared")
            },
            NOW,
        )
        .unwrap()
        .task
        .id;

    let comment = tasks
        .create_comment(
            member,
            CommentInput {
                task: id,
                content: "On it".to_string(),
            },
        )
        .unwrap();
    assert!(matches!(
        tasks.update_comment(owner, comment.id, "Nope".to_string()),
        Err(ServiceError::Forbidden(_))
    ));
    let edited = tasks
        .update_comment(member, comment.id, " Done soon ".to_string())
        .unwrap();
    assert_eq!(edited.content, "Done soon");
    assert_eq!(tasks.get_task(owner, id, NOW).unwrap().comment_count, 1);
}

#[test]
fn kanban_and_calendar_group_visible_tasks() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let tasks = service(&conn);
    tasks
        .create_task(
            user,
            TaskInput {
                status: Some(TaskStatus::Review),
                due_date: Some(NOW),
                ..task("Check PR")
            },
            NOW,
        )
        .unwrap();
    tasks.create_task(user, task("Someday"), NOW).unwrap();

    let board = tasks.kanban(user, None, NOW).unwrap();
    let counts: Vec<(TaskStatus, usize)> = board.iter().map(|c| (c.status, c.task_count)).collect();
    assert_eq!(
        counts,
        vec![
            (TaskStatus::Todo, 1),
            (TaskStatus::InProgress, 0),
            (TaskStatus::Review, 1),
            (TaskStatus::Done, 0),
        ]
    );

    let calendar = tasks.calendar(user, 2024, 6, NOW).unwrap();
    assert_eq!(calendar.total_tasks, 1);
    assert!(calendar.tasks.contains_key("2024-06-01"));
    assert!(matches!(tasks.calendar(user, 2024, 0, NOW), Err(ServiceError::Invalid(_))));
}

#[test]
fn analytics_scores_completions_inside_the_creation_window() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let tasks = service(&conn);
    let today = chrono::NaiveDate::from_ymd_opt(2024, 6, 20).unwrap();

    let mut ids = Vec::new();
    for title in ["a", "b", "c", "d"] {
        let priority = (title == "d").then_some(TaskPriority::High);
        let created = tasks
            .create_task(user, TaskInput { priority, ..task(title) }, NOW)
            .unwrap();
        ids.push(created.task.id);
    }
    let archived = tasks
        .create_task(
            user,
            TaskInput {
                status: Some(TaskStatus::Done),
                ..task("old")
            },
            NOW - 40 * DAY_MS,
        )
        .unwrap();
    // Creation stamps come from the database clock; pin them to the fixture day.
    conn.execute("UPDATE tasks SET created_at = ?1", [NOW]).unwrap();
    conn.execute(
        "UPDATE tasks SET created_at = ?1 WHERE id = ?2",
        rusqlite::params![NOW - 40 * DAY_MS, archived.task.id.to_string()],
    )
    .unwrap();

    // Saturday 14:00, Saturday 16:00 and Monday 12:00.
    for (id, done_at) in ids.iter().zip([NOW + 2 * HOUR_MS, NOW + 4 * HOUR_MS, NOW + 2 * DAY_MS]) {
        tasks
            .update_task(
                user,
                *id,
                TaskPatch {
                    status: Some(TaskStatus::Done),
                    ..TaskPatch::default()
                },
                done_at,
            )
            .unwrap();
    }

    let report = tasks.analytics(user, None, None, today).unwrap();
    assert_eq!(report.productivity_score, 75.0);
    assert_eq!(report.average_completion_time, 18.0);
    assert_eq!(report.most_productive_day, Some("Saturday"));
    assert_eq!(report.status_distribution.get("done"), Some(&3));
    assert_eq!(report.status_distribution.get("todo"), Some(&1));
    assert_eq!(report.priority_distribution.get("high"), Some(&1));

    let trend: Vec<(&str, u32)> = report
        .monthly_completion_trend
        .iter()
        .map(|m| (m.month.as_str(), m.completed_tasks))
        .collect();
    assert_eq!(
        trend,
        vec![
            ("Jan 2024", 0),
            ("Feb 2024", 0),
            ("Mar 2024", 0),
            ("Apr 2024", 1),
            ("May 2024", 0),
            ("Jun 2024", 3),
        ]
    );

    let empty = tasks
        .analytics(user, Some(today), Some(today), today)
        .unwrap();
    assert_eq!(empty.productivity_score, 0.0);
    assert_eq!(empty.most_productive_day, None);
}
