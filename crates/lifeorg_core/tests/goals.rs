use chrono::{Duration, NaiveDate};
use lifeorg_core::db::open_db_in_memory;
use lifeorg_core::model::goal::{GoalStatus, GoalType};
use lifeorg_core::repo::category_repo::SqliteCategoryRepository;
use lifeorg_core::repo::goal_repo::{GoalQuery, SqliteGoalRepository};
use lifeorg_core::repo::user_repo::SqliteUserRepository;
use lifeorg_core::service::goal_service::{
    GoalCategoryInput, GoalInput, GoalPatch, JournalInput, MilestoneInput, ProgressInput, ProgressUpdate, ReviewInput,
};
use lifeorg_core::service::user_service::Registration;
use lifeorg_core::{GoalService, RecordId, ServiceError, UserId, UserService};
use rusqlite::Connection;
use rust_decimal::Decimal;

const NOW: i64 = 1_718_452_800_000;

type Service<'conn> = GoalService<SqliteGoalRepository<'conn>, SqliteCategoryRepository<'conn>>;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn register(conn: &Connection, username: &str) -> UserId {
    UserService::new(SqliteUserRepository::new(conn))
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
    GoalService::new(SqliteGoalRepository::new(conn), SqliteCategoryRepository::new(conn))
}

fn goal(title: &str, goal_type: GoalType, target: Option<i64>) -> GoalInput {
    GoalInput {
        title: title.to_string(),
        description: String::new(),
        category: None,
        goal_type,
        frequency: None,
        target_value: target.map(Decimal::from),
        current_value: None,
        unit: String::new(),
        start_date: Some(today() - Duration::days(30)),
        target_date: today() + Duration::days(30),
        is_public: false,
        reminder_enabled: None,
    }
}

fn create(service: &Service<'_>, user: UserId, input: GoalInput) -> RecordId {
    service.create_goal(user, input, NOW, today()).unwrap().goal.id
}

#[test]
fn numeric_progress_is_current_over_target_capped_at_hundred() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);
    let id = create(&goals, user, goal("Read 40 books", GoalType::Numeric, Some(40)));

    let outcome = goals
        .update_progress(
            user,
            id,
            ProgressUpdate {
                value: Decimal::from(10),
                ..ProgressUpdate::default()
            },
            today(),
        )
        .unwrap();
    assert_eq!(outcome.goal.goal.current_value, Decimal::from(10));
    assert_eq!(outcome.goal.progress_percentage, 25.0);

    let capped = goals
        .update_progress(
            user,
            id,
            ProgressUpdate {
                value: Decimal::from(55),
                ..ProgressUpdate::default()
            },
            today(),
        )
        .unwrap();
    assert_eq!(capped.goal.progress_percentage, 100.0);
    assert_eq!(capped.progress.id, outcome.progress.id);
    assert_eq!(
        goals.list_progress(user, &Default::default()).unwrap().len(),
        1
    );
}

#[test]
fn boolean_goal_progress_follows_completion_status() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);
    let id = create(&goals, user, goal("Run a marathon", GoalType::Boolean, None));
    assert_eq!(goals.get_goal(user, id, today()).unwrap().progress_percentage, 0.0);

    let done = goals
        .update_goal(
            user,
            id,
            GoalPatch {
                status: Some(GoalStatus::Completed),
                ..GoalPatch::default()
            },
            NOW,
            today(),
        )
        .unwrap();
    assert_eq!(done.progress_percentage, 100.0);
    assert_eq!(done.goal.completed_at, Some(NOW));
    assert_eq!(done.days_remaining, 0);
    assert!(!done.is_overdue);
}

#[test]
fn target_before_start_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);

    let mut input = goal("Backwards", GoalType::Boolean, None);
    input.target_date = today() - Duration::days(40);
    let result = goals.create_goal(user, input, NOW, today());
    assert!(matches!(result, Err(ServiceError::Validation(err)) if err.field == "target_date"));
}

#[test]
fn summary_counts_overdue_and_average_progress() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);

    let mut late = goal("Save 1000", GoalType::Financial, Some(1000));
    late.current_value = Some(Decimal::from(500));
    late.target_date = today() - Duration::days(1);
    create(&goals, user, late);
    create(&goals, user, goal("Read 10 books", GoalType::Numeric, Some(10)));
    let paused = create(&goals, user, goal("Learn Rust", GoalType::Boolean, None));
    goals
        .update_goal(
            user,
            paused,
            GoalPatch {
                status: Some(GoalStatus::Paused),
                ..GoalPatch::default()
            },
            NOW,
            today(),
        )
        .unwrap();

    let summary = goals.summary(user, today()).unwrap();
    assert_eq!(summary.total_goals, 3);
    assert_eq!(summary.active_goals, 2);
    assert_eq!(summary.paused_goals, 1);
    assert_eq!(summary.overdue_goals, 1);
    assert_eq!(summary.average_progress, 25.0);

    let overdue = goals.overdue_goals(user, today()).unwrap();
    assert_eq!(overdue.len(), 1);
    assert!(overdue[0].is_overdue);

    let by_type = goals
        .list_goals(
            user,
            &GoalQuery {
                goal_type: Some(GoalType::Numeric),
                ..GoalQuery::default()
            },
            today(),
        )
        .unwrap();
    assert_eq!(by_type.len(), 1);
}

#[test]
fn habit_streaks_count_consecutive_completed_days() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);
    let habit = create(&goals, user, goal("Meditate", GoalType::Habit, None));

    for back in [0, 1, 2, 5, 6] {
        goals
            .create_progress(
                user,
                ProgressInput {
                    goal: habit,
                    progress_date: today() - Duration::days(back),
                    value: Decimal::ONE,
                    notes: String::new(),
                    completed: true,
                },
            )
            .unwrap();
    }
    goals
        .create_progress(
            user,
            ProgressInput {
                goal: habit,
                progress_date: today() - Duration::days(3),
                value: Decimal::ZERO,
                notes: "skipped".to_string(),
                completed: false,
            },
        )
        .unwrap();

    let report = goals.habits(user, today()).unwrap();
    assert_eq!(report.total_habits, 1);
    let stats = &report.habits[0];
    assert_eq!(stats.current_streak, 3);
    assert_eq!(stats.longest_streak, 3);
    assert_eq!(stats.completion_rate, 16.7);
    let flags: Vec<bool> = stats.weekly_progress.iter().map(|d| d.completed).collect();
    assert_eq!(flags, vec![true, true, false, false, true, true, true]);
}

#[test]
fn progress_for_same_goal_and_day_is_unique() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);
    let id = create(&goals, user, goal("Walk", GoalType::Habit, None));
    let input = ProgressInput {
        goal: id,
        progress_date: today(),
        value: Decimal::ONE,
        notes: String::new(),
        completed: true,
    };

    goals.create_progress(user, input.clone()).unwrap();
    assert!(goals.create_progress(user, input).is_err());
}

#[test]
fn milestones_complete_once_and_belong_to_own_goals() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let grace = register(&conn, "grace");
    let goals = service(&conn);
    let id = create(&goals, ada, goal("Write a book", GoalType::Boolean, None));

    let milestone = goals
        .create_milestone(
            ada,
            MilestoneInput {
                goal: id,
                title: "First draft".to_string(),
                description: String::new(),
                target_value: None,
                target_date: today() + Duration::days(10),
            },
        )
        .unwrap();
    let done = goals.complete_milestone(ada, milestone.id, NOW).unwrap();
    assert!(done.is_completed);
    assert_eq!(done.completed_at, Some(NOW));

    let foreign = goals.create_milestone(
        grace,
        MilestoneInput {
            goal: id,
            title: "Hijack".to_string(),
            description: String::new(),
            target_value: None,
            target_date: today(),
        },
    );
    assert!(matches!(foreign, Err(ServiceError::Validation(err)) if err.field == "goal"));
}

#[test]
fn journal_mood_trends_average_rated_entries() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);
    let entry = |back: i64, mood: Option<u8>| JournalInput {
        entry_date: Some(today() - Duration::days(back)),
        title: format!("day -{back}"),
        content: "Quiet day at home".to_string(),
        mood_rating: mood,
        tags: vec!["Home".to_string(), "home".to_string()],
        is_private: None,
    };
    let first = goals.create_journal_entry(user, entry(2, Some(4)), today()).unwrap();
    assert_eq!(first.word_count, 4);
    assert_eq!(first.entry.tags, vec!["home".to_string()]);
    goals.create_journal_entry(user, entry(1, Some(5)), today()).unwrap();
    goals.create_journal_entry(user, entry(0, None), today()).unwrap();
    goals.create_journal_entry(user, entry(60, Some(1)), today()).unwrap();

    let trends = goals.mood_trends(user, 30, today()).unwrap();
    assert_eq!(trends.total_entries, 2);
    assert_eq!(trends.average_mood, 4.5);
    assert_eq!(trends.mood_trends[0].date, today() - Duration::days(2));

    let bad = goals.create_journal_entry(user, entry(3, Some(11)), today());
    assert!(matches!(bad, Err(ServiceError::Validation(_))));
}

#[test]
fn one_review_per_month() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);
    assert!(matches!(
        goals.current_month_review(user, today()),
        Err(ServiceError::NotFound(_))
    ));

    let input = ReviewInput {
        review_month: today(),
        achievements: "Shipped".to_string(),
        challenges: String::new(),
        lessons_learned: String::new(),
        next_month_focus: String::new(),
        overall_satisfaction: 8,
    };
    let review = goals.create_review(user, input.clone()).unwrap();
    assert_eq!(review.month_label, "June 2024");
    assert_eq!(
        goals.current_month_review(user, today()).unwrap().review.id,
        review.review.id
    );

    let duplicate = goals.create_review(user, input);
    assert!(matches!(
        duplicate,
        Err(ServiceError::Validation(err)) if err.field == "review_month"
    ));
}

#[test]
fn suggestions_flag_stalled_and_near_deadline_goals() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);
    let mut urgent = goal("Finish course", GoalType::Numeric, Some(10));
    urgent.target_date = today() + Duration::days(3);
    create(&goals, user, urgent);

    let suggestions = goals.suggestions(user, today(), NOW).unwrap();
    assert_eq!(suggestions.total_active_goals, 1);
    assert_eq!(suggestions.generated_at, NOW);
    assert!(!suggestions.suggestions.is_empty());
    assert!(suggestions.suggestions.len() <= 5);
}

#[test]
fn analytics_rates_categories_and_averages_durations() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let goals = service(&conn);
    let category = |name: &str| {
        goals
            .create_category(
                user,
                GoalCategoryInput {
                    name: name.to_string(),
                    ..GoalCategoryInput::default()
                },
            )
            .unwrap()
            .category
            .id
    };
    let fitness = category("Fitness");
    let learning = category("Learning");
    let filed = |title: &str, category: Option<RecordId>| {
        create(
            &goals,
            user,
            GoalInput {
                category,
                ..goal(title, GoalType::Numeric, Some(10))
            },
        )
    };

    let run = filed("Run", Some(fitness));
    filed("Swim", Some(fitness));
    let course = filed("Course", Some(learning));
    filed("Misc", None);
    let old = filed("Old course", Some(learning));

    // Creation stamps come from the database clock; pin them to the fixture day.
    conn.execute("UPDATE goals SET created_at = ?1", [NOW]).unwrap();
    conn.execute(
        "UPDATE goals SET created_at = ?1 WHERE id = ?2",
        rusqlite::params![1_685_577_600_000_i64, old.to_string()],
    )
    .unwrap();

    let complete = |id: RecordId, at: i64| {
        goals
            .update_goal(
                user,
                id,
                GoalPatch {
                    status: Some(GoalStatus::Completed),
                    ..GoalPatch::default()
                },
                at,
                today(),
            )
            .unwrap();
    };
    complete(run, NOW);
    complete(course, NOW - 5 * 86_400_000);
    complete(old, 1_704_888_000_000);

    let report = goals.analytics(user, None, None, today()).unwrap();
    assert_eq!(report.category_distribution.get("Fitness"), Some(&2));
    assert_eq!(report.category_distribution.get("Learning"), Some(&1));
    assert_eq!(report.category_distribution.get("Uncategorized"), Some(&1));
    assert_eq!(report.goal_type_distribution.get("numeric"), Some(&4));
    assert_eq!(report.success_rate_by_category.get("Fitness"), Some(&50.0));
    assert_eq!(report.success_rate_by_category.get("Learning"), Some(&100.0));
    assert_eq!(report.success_rate_by_category.get("Uncategorized"), Some(&0.0));
    assert_eq!(report.average_goal_duration, 27.5);

    let trend: Vec<(&str, u32)> = report
        .goal_completion_trend
        .iter()
        .map(|m| (m.month.as_str(), m.completed_goals))
        .collect();
    assert_eq!(
        trend,
        vec![
            ("Jan 2024", 1),
            ("Feb 2024", 0),
            ("Mar 2024", 0),
            ("Apr 2024", 0),
            ("May 2024", 0),
            ("Jun 2024", 2),
        ]
    );
}
