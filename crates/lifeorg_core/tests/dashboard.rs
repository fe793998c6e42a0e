use chrono::Duration;
use lifeorg_core::analytics::period::{date_start_ms, now_ms, today};
use lifeorg_core::db::open_db_in_memory;
use lifeorg_core::model::category::CategoryKind;
use lifeorg_core::model::dashboard::{
    ActivityType, NotificationPriority, NotificationType, WidgetType,
};
use lifeorg_core::model::expense::TransactionType;
use lifeorg_core::model::goal::GoalType;
use lifeorg_core::model::task::TaskStatus;
use lifeorg_core::repo::category_repo::SqliteCategoryRepository;
use lifeorg_core::repo::dashboard_repo::SqliteDashboardRepository;
use lifeorg_core::repo::expense_repo::SqliteExpenseRepository;
use lifeorg_core::repo::goal_repo::SqliteGoalRepository;
use lifeorg_core::repo::task_repo::SqliteTaskRepository;
use lifeorg_core::repo::user_repo::SqliteUserRepository;
use lifeorg_core::service::dashboard_service::{
    ActivityContext, Deadline, NotificationInput, PreferencePatch, WidgetData, WidgetInput,
    WidgetPatch,
};
use lifeorg_core::service::expense_service::{BudgetInput, CategoryInput, TransactionInput};
use lifeorg_core::service::goal_service::{GoalInput, ProgressInput};
use lifeorg_core::service::task_service::TaskInput;
use lifeorg_core::service::user_service::Registration;
use lifeorg_core::{
    DashboardService, ExpenseService, GoalService, RecordId, ServiceError, TaskService, UserId,
    UserService,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use uuid::Uuid;

const DAY_MS: i64 = 24 * 3_600_000;

type Dashboard<'conn> = DashboardService<
    SqliteDashboardRepository<'conn>,
    SqliteExpenseRepository<'conn>,
    SqliteCategoryRepository<'conn>,
    SqliteTaskRepository<'conn>,
    SqliteGoalRepository<'conn>,
>;

fn register(conn: &Connection, username: &str) -> UserId {
    UserService::new(SqliteUserRepository::new(conn))
        .register(
            Registration {
                username: username.to_string(),
                password: "s3cret-pass".to_string(),
                ..Registration::default()
            },
            now_ms(),
        )
        .unwrap()
        .user
        .id
}

fn dashboard(conn: &Connection) -> Dashboard<'_> {
    DashboardService::new(
        SqliteDashboardRepository::new(conn),
        SqliteExpenseRepository::new(conn),
        SqliteCategoryRepository::new(conn),
        SqliteTaskRepository::new(conn),
        SqliteGoalRepository::new(conn),
    )
}

fn expenses(
    conn: &Connection,
) -> ExpenseService<SqliteExpenseRepository<'_>, SqliteCategoryRepository<'_>> {
    ExpenseService::new(SqliteExpenseRepository::new(conn), SqliteCategoryRepository::new(conn))
}

fn notification(title: &str, priority: NotificationPriority) -> NotificationInput {
    NotificationInput {
        notification_type: NotificationType::System,
        priority: Some(priority),
        title: title.to_string(),
        message: "body".to_string(),
        action_url: String::new(),
        action_data: None,
        scheduled_for: None,
    }
}

fn food_category(conn: &Connection, user: UserId) -> RecordId {
    expenses(conn)
        .create_category(
            user,
            CategoryKind::Expense,
            CategoryInput {
                name: "Food".to_string(),
                ..CategoryInput::default()
            },
        )
        .unwrap()
        .category
        .id
}

fn spend(conn: &Connection, user: UserId, category: Option<RecordId>, amount: i64, at: i64) {
    expenses(conn)
        .create_transaction(
            user,
            TransactionInput {
                transaction_type: TransactionType::Expense,
                amount: Decimal::from(amount),
                description: "groceries".to_string(),
                notes: String::new(),
                expense_category: category,
                income_category: None,
                transaction_date: Some(at),
                location: String::new(),
                voice_input: false,
            },
            at,
        )
        .unwrap();
}

#[test]
fn notification_is_marked_read_exactly_once() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let service = dashboard(&conn);

    let created = service
        .create_notification(user, notification("Hello", NotificationPriority::High), 1_000)
        .unwrap();
    assert!(!created.is_read);
    assert_eq!(created.scheduled_for, 1_000);

    let first = service.mark_notification_read(user, created.id, 5_000).unwrap();
    assert!(first.is_read);
    assert_eq!(first.read_at, Some(5_000));

    let second = service.mark_notification_read(user, created.id, 9_000).unwrap();
    assert_eq!(second.read_at, Some(5_000));
    assert_eq!(
        service.get_notification(user, created.id).unwrap().read_at,
        Some(5_000)
    );
}

#[test]
fn notification_summary_counts_unread_high_priority() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let other = register(&conn, "grace");
    let service = dashboard(&conn);

    for (title, priority) in [
        ("a", NotificationPriority::Low),
        ("b", NotificationPriority::High),
        ("c", NotificationPriority::Urgent),
    ] {
        service
            .create_notification(user, notification(title, priority), 0)
            .unwrap();
    }
    service
        .create_notification(other, notification("x", NotificationPriority::High), 0)
        .unwrap();

    let summary = service.notification_summary(user).unwrap();
    assert_eq!(summary.total_notifications, 3);
    assert_eq!(summary.unread_notifications, 3);
    assert_eq!(summary.high_priority_count, 2);
    assert_eq!(summary.recent_notifications.len(), 3);

    assert_eq!(service.mark_all_notifications_read(user, 10).unwrap(), 3);
    assert!(service.unread_notifications(user).unwrap().is_empty());
    assert_eq!(service.unread_notifications(other).unwrap().len(), 1);
}

#[test]
fn foreign_notifications_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let grace = register(&conn, "grace");
    let service = dashboard(&conn);
    let created = service
        .create_notification(ada, notification("private", NotificationPriority::Low), 0)
        .unwrap();

    assert!(matches!(
        service.mark_notification_read(grace, created.id, 1),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_notification(grace, created.id),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn reset_layout_installs_default_widgets() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let service = dashboard(&conn);

    service
        .create_widget(
            user,
            WidgetInput {
                widget_type: WidgetType::MoodTracker,
                title: None,
                position_x: 0,
                position_y: 5,
                width: None,
                height: None,
                settings: None,
                is_visible: None,
            },
        )
        .unwrap();

    let layout = service.reset_layout(user).unwrap();
    let types: Vec<WidgetType> = layout.iter().map(|w| w.widget_type).collect();
    assert_eq!(
        types,
        vec![
            WidgetType::ExpenseSummary,
            WidgetType::TaskSummary,
            WidgetType::GoalProgress,
            WidgetType::RecentTransactions,
        ]
    );
    assert_eq!(service.list_widgets(user).unwrap().len(), 4);
    assert_eq!(layout[0].title, "Expense Summary");
}

#[test]
fn widget_data_follows_visible_widgets() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let service = dashboard(&conn);
    let now = now_ms();
    let today = today();
    spend(&conn, user, None, 12, date_start_ms(today));

    let layout = service.reset_layout(user).unwrap();
    service
        .update_widget(
            user,
            layout[2].id,
            WidgetPatch {
                is_visible: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

    let payloads = service.widget_data(user, now, today).unwrap();
    assert_eq!(payloads.len(), 3);
    match &payloads[0].data {
        WidgetData::ExpenseSummary { expenses, net, .. } => {
            assert_eq!(*expenses, Decimal::from(12));
            assert_eq!(*net, Decimal::from(-12));
        }
        other => panic!("unexpected widget data: {other:?}"),
    }
    let recent = payloads
        .iter()
        .find(|p| p.widget_type == WidgetType::RecentTransactions)
        .unwrap();
    match &recent.data {
        WidgetData::RecentTransactions { transactions } => {
            assert_eq!(transactions.len(), 1);
            assert_eq!(transactions[0].category.as_deref(), Some("Uncategorized"));
        }
        other => panic!("unexpected widget data: {other:?}"),
    }
}

#[test]
fn budget_alerts_become_notifications_when_enabled() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let service = dashboard(&conn);
    let food = food_category(&conn, user);
    let today = today();
    expenses(&conn)
        .create_budget(
            user,
            BudgetInput {
                category: food,
                amount: Decimal::from(50),
                month: today,
                alert_threshold: None,
            },
        )
        .unwrap();
    let created = expenses(&conn)
        .create_transaction(
            user,
            TransactionInput {
                transaction_type: TransactionType::Expense,
                amount: Decimal::from(60),
                description: "feast".to_string(),
                notes: String::new(),
                expense_category: Some(food),
                income_category: None,
                transaction_date: Some(date_start_ms(today)),
                location: String::new(),
                voice_input: false,
            },
            now_ms(),
        )
        .unwrap();
    assert_eq!(created.triggered_alerts.len(), 2);

    let sent = service
        .notify_budget_alerts(user, &created.triggered_alerts, 100)
        .unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|n| n.notification_type == NotificationType::BudgetAlert));
    assert!(sent.iter().any(|n| n.priority == NotificationPriority::High));

    service
        .update_preferences(
            user,
            PreferencePatch {
                show_budget_alerts: Some(false),
                ..PreferencePatch::default()
            },
        )
        .unwrap();
    assert!(service
        .notify_budget_alerts(user, &created.triggered_alerts, 200)
        .unwrap()
        .is_empty());
}

#[test]
fn quick_expense_categories_must_be_own_expense_categories() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let service = dashboard(&conn);
    let food = food_category(&conn, user);

    let defaults = service.preferences(user).unwrap();
    assert!(defaults.show_budget_alerts);
    assert!(defaults.quick_expense_categories.is_empty());

    let saved = service
        .update_preferences(
            user,
            PreferencePatch {
                quick_expense_categories: Some(vec![food]),
                ..PreferencePatch::default()
            },
        )
        .unwrap();
    assert_eq!(saved.quick_expense_categories, vec![food]);

    let invalid = service.update_preferences(
        user,
        PreferencePatch {
            quick_expense_categories: Some(vec![Uuid::new_v4()]),
            ..PreferencePatch::default()
        },
    );
    assert!(matches!(
        invalid,
        Err(ServiceError::Validation(err)) if err.field == "quick_expense_categories"
    ));
}

#[test]
fn activity_log_records_and_aggregates() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let service = dashboard(&conn);

    let login = service
        .record_activity(
            user,
            ActivityType::Login,
            "User logged in",
            ActivityContext {
                ip_address: Some("not-an-ip".to_string()),
                user_agent: "tests".to_string(),
                ..ActivityContext::default()
            },
        )
        .unwrap();
    assert_eq!(login.ip_address, None);
    assert_eq!(login.user_agent, "tests");
    service
        .record_activity(user, ActivityType::TaskCreated, "Created task", ActivityContext::default())
        .unwrap();
    service
        .record_activity(user, ActivityType::TaskCreated, "Created task", ActivityContext::default())
        .unwrap();

    let stats = service.activity_stats(user, today()).unwrap();
    assert_eq!(stats.total_activities, 3);
    assert_eq!(stats.activity_by_type.get("task_created"), Some(&2));
    assert_eq!(stats.daily_activity.len(), 7);
    assert_eq!(stats.daily_activity[6].date, today());
    assert_eq!(stats.daily_activity[6].count, 3);

    let recent = service.recent_activities(user, 7, now_ms() + 1_000).unwrap();
    assert_eq!(recent.len(), 3);
}

#[test]
fn overview_aggregates_every_component() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let service = dashboard(&conn);
    let now = now_ms();
    let today = today();
    let food = food_category(&conn, user);
    expenses(&conn)
        .create_budget(
            user,
            BudgetInput {
                category: food,
                amount: Decimal::from(200),
                month: today,
                alert_threshold: None,
            },
        )
        .unwrap();
    spend(&conn, user, Some(food), 50, date_start_ms(today));

    let tasks = TaskService::new(SqliteTaskRepository::new(&conn), SqliteUserRepository::new(&conn));
    for (title, due, status) in [
        ("later", now + 3 * DAY_MS, TaskStatus::Todo),
        ("sooner", now + DAY_MS, TaskStatus::InProgress),
        ("late", now - DAY_MS, TaskStatus::Todo),
        ("done", now + DAY_MS, TaskStatus::Done),
    ] {
        tasks
            .create_task(
                user,
                TaskInput {
                    title: title.to_string(),
                    due_date: Some(due),
                    status: Some(status),
                    ..TaskInput::default()
                },
                now,
            )
            .unwrap();
    }

    let goals = GoalService::new(SqliteGoalRepository::new(&conn), SqliteCategoryRepository::new(&conn));
    goals
        .create_goal(
            user,
            GoalInput {
                title: "Save".to_string(),
                description: String::new(),
                category: None,
                goal_type: GoalType::Financial,
                frequency: None,
                target_value: Some(Decimal::from(100)),
                current_value: Some(Decimal::from(40)),
                unit: String::new(),
                start_date: Some(today),
                target_date: today + Duration::days(5),
                is_public: false,
                reminder_enabled: None,
            },
            now,
            today,
        )
        .unwrap();

    let overview = service.overview(user, now, today).unwrap();
    assert_eq!(overview.total_expenses, Decimal::from(50));
    assert_eq!(overview.net_amount, Decimal::from(-50));
    assert_eq!(overview.budget_used_percentage, 25.0);
    assert_eq!(overview.total_tasks, 4);
    assert_eq!(overview.completed_tasks, 1);
    assert_eq!(overview.pending_tasks, 3);
    assert_eq!(overview.overdue_tasks, 1);
    let upcoming: Vec<&str> = overview.upcoming_tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(upcoming, vec!["sooner", "later"]);
    assert_eq!(overview.active_goals, 1);
    assert_eq!(overview.average_goal_progress, 40.0);
    assert_eq!(overview.goal_milestones.len(), 1);
    assert_eq!(overview.recent_transactions.len(), 1);

    let stats = service.quick_stats(user, "week", now + 1_000, today).unwrap();
    assert_eq!(stats.period, "week");
    assert_eq!(stats.task_completion_rate, 25.0);
    assert_eq!(stats.top_expense_categories[0].category, "Food");
    let deadlines = stats
        .upcoming_deadlines
        .iter()
        .filter(|d| matches!(d, Deadline::Goal { .. }))
        .count();
    assert_eq!(deadlines, 1);
    assert_eq!(
        stats
            .upcoming_deadlines
            .iter()
            .filter(|d| matches!(d, Deadline::Task { .. }))
            .count(),
        2
    );
}

#[test]
fn widget_settings_must_be_an_object() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let service = dashboard(&conn);

    let result = service.create_widget(
        user,
        WidgetInput {
            widget_type: WidgetType::QuickStats,
            title: None,
            position_x: 0,
            position_y: 0,
            width: None,
            height: None,
            settings: Some(serde_json::json!([1, 2])),
            is_visible: None,
        },
    );
    assert!(matches!(result, Err(ServiceError::Validation(err)) if err.field == "settings"));
}

#[test]
fn habit_streak_average_counts_consecutive_days_only() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let now = now_ms();
    let today = today();
    let goals = GoalService::new(SqliteGoalRepository::new(&conn), SqliteCategoryRepository::new(&conn));

    let habit = |title: &str| {
        goals
            .create_goal(
                user,
                GoalInput {
                    title: title.to_string(),
                    description: String::new(),
                    category: None,
                    goal_type: GoalType::Habit,
                    frequency: None,
                    target_value: None,
                    current_value: None,
                    unit: String::new(),
                    start_date: Some(today - Duration::days(10)),
                    target_date: today + Duration::days(30),
                    is_public: false,
                    reminder_enabled: None,
                },
                now,
                today,
            )
            .unwrap()
            .goal
            .id
    };
    let gapped = habit("Stretch");
    let steady = habit("Read");

    for (goal, back) in [(gapped, 7), (gapped, 0), (steady, 2), (steady, 1), (steady, 0)] {
        goals
            .create_progress(
                user,
                ProgressInput {
                    goal,
                    progress_date: today - Duration::days(back),
                    value: Decimal::ONE,
                    notes: String::new(),
                    completed: true,
                },
            )
            .unwrap();
    }

    let stats = dashboard(&conn).quick_stats(user, "week", now, today).unwrap();
    assert_eq!(stats.habit_streak_average, 2.0);
}
