use chrono::NaiveDate;
use lifeorg_core::analytics::period::date_start_ms;
use lifeorg_core::db::open_db_in_memory;
use lifeorg_core::model::category::CategoryKind;
use lifeorg_core::model::expense::{AlertType, TransactionType};
use lifeorg_core::repo::category_repo::SqliteCategoryRepository;
use lifeorg_core::repo::expense_repo::{AlertQuery, SqliteExpenseRepository, TransactionQuery};
use lifeorg_core::repo::user_repo::SqliteUserRepository;
use lifeorg_core::service::expense_service::{
    BudgetInput, CategoryInput, TransactionInput, TransactionPatch,
};
use lifeorg_core::service::user_service::Registration;
use lifeorg_core::{ExpenseService, RecordId, ServiceError, UserId, UserService};
use rusqlite::Connection;
use rust_decimal::Decimal;

type Service<'conn> = ExpenseService<SqliteExpenseRepository<'conn>, SqliteCategoryRepository<'conn>>;

fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

fn money(text: &str) -> Decimal {
    text.parse().unwrap()
}

fn register(conn: &Connection, username: &str) -> UserId {
    UserService::new(SqliteUserRepository::new(conn))
        .register(
            Registration {
                username: username.to_string(),
                password: "s3cret-pass".to_string(),
                ..Registration::default()
            },
            date_start_ms(june(1)),
        )
        .unwrap()
        .user
        .id
}

fn service(conn: &Connection) -> Service<'_> {
    ExpenseService::new(
        SqliteExpenseRepository::new(conn),
        SqliteCategoryRepository::new(conn),
    )
}

fn category(service: &Service<'_>, user: UserId, kind: CategoryKind, name: &str) -> RecordId {
    service
        .create_category(
            user,
            kind,
            CategoryInput {
                name: name.to_string(),
                ..CategoryInput::default()
            },
        )
        .unwrap()
        .category
        .id
}

fn expense(category: RecordId, amount: &str, day: NaiveDate) -> TransactionInput {
    TransactionInput {
        transaction_type: TransactionType::Expense,
        amount: money(amount),
        description: format!("spent {amount}"),
        notes: String::new(),
        expense_category: Some(category),
        income_category: None,
        transaction_date: Some(date_start_ms(day) + 3_600_000),
        location: String::new(),
        voice_input: false,
    }
}

fn income(amount: &str, day: NaiveDate) -> TransactionInput {
    TransactionInput {
        transaction_type: TransactionType::Income,
        amount: money(amount),
        description: "salary".to_string(),
        notes: String::new(),
        expense_category: None,
        income_category: None,
        transaction_date: Some(date_start_ms(day)),
        location: String::new(),
        voice_input: false,
    }
}

#[test]
fn default_categories_are_seeded_once() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let expenses = service(&conn);

    let first = expenses
        .create_default_categories(user, CategoryKind::Expense)
        .unwrap();
    assert!(!first.is_empty());
    let second = expenses
        .create_default_categories(user, CategoryKind::Expense)
        .unwrap();
    assert!(second.is_empty());
    assert_eq!(
        expenses.list_categories(user, CategoryKind::Expense).unwrap().len(),
        first.len()
    );
}

#[test]
fn duplicate_category_name_is_rejected_per_user() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let grace = register(&conn, "grace");
    let expenses = service(&conn);

    category(&expenses, ada, CategoryKind::Expense, "Food");
    let duplicate = expenses.create_category(
        ada,
        CategoryKind::Expense,
        CategoryInput {
            name: "Food".to_string(),
            ..CategoryInput::default()
        },
    );
    assert!(matches!(duplicate, Err(ServiceError::Validation(_))));

    category(&expenses, grace, CategoryKind::Expense, "Food");
}

#[test]
fn category_total_grows_by_transaction_amount() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let expenses = service(&conn);
    let food = category(&expenses, user, CategoryKind::Expense, "Food");

    let before = expenses
        .get_category(user, CategoryKind::Expense, food)
        .unwrap();
    assert_eq!(before.total, Decimal::ZERO);

    expenses
        .create_transaction(user, expense(food, "12.50", june(3)), date_start_ms(june(3)))
        .unwrap();
    expenses
        .create_transaction(user, expense(food, "7.25", june(4)), date_start_ms(june(4)))
        .unwrap();

    let after = expenses
        .get_category(user, CategoryKind::Expense, food)
        .unwrap();
    assert_eq!(after.total, money("19.75"));
    assert_eq!(after.transaction_count, 2);
}

#[test]
fn transactions_may_not_reference_foreign_categories() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let grace = register(&conn, "grace");
    let expenses = service(&conn);
    let graces_food = category(&expenses, grace, CategoryKind::Expense, "Food");

    let result = expenses.create_transaction(ada, expense(graces_food, "5.00", june(2)), 0);
    assert!(matches!(
        result,
        Err(ServiceError::Validation(err)) if err.field == "expense_category"
    ));

    let zero = expenses.create_transaction(grace, expense(graces_food, "0.00", june(2)), 0);
    assert!(matches!(zero, Err(ServiceError::Validation(_))));
}

#[test]
fn budget_usage_tracks_spending_and_alerts_fire_once() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let expenses = service(&conn);
    let food = category(&expenses, user, CategoryKind::Expense, "Food");

    let budget = expenses
        .create_budget(
            user,
            BudgetInput {
                category: food,
                amount: money("100.00"),
                month: june(15),
                alert_threshold: None,
            },
        )
        .unwrap();
    assert_eq!(budget.budget.month, june(1));
    assert_eq!(budget.month_label, "June 2024");

    let first = expenses
        .create_transaction(user, expense(food, "50.00", june(2)), 0)
        .unwrap();
    assert!(first.triggered_alerts.is_empty());

    let second = expenses
        .create_transaction(user, expense(food, "35.00", june(3)), 0)
        .unwrap();
    assert_eq!(second.triggered_alerts.len(), 1);
    assert_eq!(second.triggered_alerts[0].alert_type, AlertType::Threshold);

    let third = expenses
        .create_transaction(user, expense(food, "10.00", june(4)), 0)
        .unwrap();
    assert!(third.triggered_alerts.is_empty());

    let fourth = expenses
        .create_transaction(user, expense(food, "20.00", june(5)), 0)
        .unwrap();
    assert_eq!(fourth.triggered_alerts.len(), 1);
    assert_eq!(fourth.triggered_alerts[0].alert_type, AlertType::Exceeded);

    let view = expenses.get_budget(user, budget.budget.id).unwrap();
    assert_eq!(view.usage.spent_amount, money("115.00"));
    assert_eq!(view.usage.remaining_amount, money("-15.00"));
    assert!((view.usage.percentage_used - 115.0).abs() < 1e-9);
    assert!(view.usage.is_over_budget);

    let notices = expenses.current_month_alerts(user, june(20)).unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].alert_type, AlertType::Exceeded);

    let unread = expenses
        .list_alerts(
            user,
            &AlertQuery {
                is_read: Some(false),
                ..AlertQuery::default()
            },
        )
        .unwrap();
    assert_eq!(unread.len(), 2);
    assert_eq!(expenses.mark_all_alerts_read(user).unwrap(), 2);
    assert_eq!(expenses.mark_all_alerts_read(user).unwrap(), 0);
}

#[test]
fn second_budget_for_same_category_and_month_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let expenses = service(&conn);
    let food = category(&expenses, user, CategoryKind::Expense, "Food");
    let input = BudgetInput {
        category: food,
        amount: money("100.00"),
        month: june(1),
        alert_threshold: None,
    };

    expenses.create_budget(user, input.clone()).unwrap();
    let duplicate = expenses.create_budget(
        user,
        BudgetInput {
            month: june(30),
            ..input
        },
    );
    assert!(matches!(duplicate, Err(ServiceError::Validation(_))));
}

#[test]
fn summaries_cover_income_expenses_and_budget() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let expenses = service(&conn);
    let food = category(&expenses, user, CategoryKind::Expense, "Food");
    expenses
        .create_budget(
            user,
            BudgetInput {
                category: food,
                amount: money("200.00"),
                month: june(1),
                alert_threshold: None,
            },
        )
        .unwrap();

    expenses.create_transaction(user, income("3000.00", june(1)), 0).unwrap();
    expenses.create_transaction(user, expense(food, "60.00", june(10)), 0).unwrap();
    expenses
        .create_transaction(user, expense(food, "40.00", NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()), 0)
        .unwrap();

    let summary = expenses.monthly_summary(user, 2024, 6).unwrap();
    assert_eq!(summary.month, "June");
    assert_eq!(summary.total_income, money("3000.00"));
    assert_eq!(summary.total_expenses, money("60.00"));
    assert_eq!(summary.net_amount, money("2940.00"));
    assert_eq!(summary.budget_remaining, money("140.00"));
    assert!((summary.budget_used_percentage - 30.0).abs() < 1e-9);
    assert_eq!(summary.daily_avg_income, money("100.00"));
    assert_eq!(summary.days_in_month, 30);
    assert_eq!(summary.transaction_count, 2);

    assert!(matches!(
        expenses.monthly_summary(user, 2024, 13),
        Err(ServiceError::Invalid(_))
    ));

    let all_time = expenses.transaction_summary(user, None, None).unwrap();
    assert_eq!(all_time.period, "all_time");
    assert_eq!(all_time.total_expenses, money("100.00"));
    assert_eq!(all_time.transaction_count, 3);

    let week = expenses
        .transaction_summary(user, Some(june(8)), Some(june(14)))
        .unwrap();
    assert_eq!(week.period, "week");
    assert_eq!(week.total_expenses, money("60.00"));
    assert_eq!(week.total_income, Decimal::ZERO);
}

#[test]
fn updating_transaction_can_clear_category() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let expenses = service(&conn);
    let food = category(&expenses, user, CategoryKind::Expense, "Food");
    let created = expenses
        .create_transaction(user, expense(food, "9.99", june(2)), 0)
        .unwrap();
    assert_eq!(created.category_name.as_deref(), Some("Food"));

    let updated = expenses
        .update_transaction(
            user,
            created.transaction.id,
            TransactionPatch {
                expense_category: Some(None),
                description: Some("snack".to_string()),
                ..TransactionPatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.category_name, None);
    assert_eq!(updated.transaction.description, "snack");

    let listed = expenses
        .list_transactions(
            user,
            &TransactionQuery {
                search: Some("SNACK".to_string()),
                ..TransactionQuery::default()
            },
        )
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[test]
fn analytics_breaks_down_categories_and_trends_six_months() {
    let conn = open_db_in_memory().unwrap();
    let user = register(&conn, "ada");
    let expenses = service(&conn);
    let food = category(&expenses, user, CategoryKind::Expense, "Food");
    let rent = category(&expenses, user, CategoryKind::Expense, "Rent");
    let day = |month: u32, day: u32| NaiveDate::from_ymd_opt(2024, month, day).unwrap();

    expenses.create_transaction(user, income("1000.00", june(1)), 0).unwrap();
    expenses.create_transaction(user, expense(food, "75.00", june(3)), 0).unwrap();
    expenses.create_transaction(user, expense(food, "25.00", june(5)), 0).unwrap();
    expenses.create_transaction(user, expense(rent, "300.00", june(10)), 0).unwrap();
    expenses.create_transaction(user, expense(food, "40.00", day(4, 15)), 0).unwrap();
    expenses.create_transaction(user, expense(food, "10.00", day(1, 2)), 0).unwrap();
    expenses
        .create_transaction(
            user,
            expense(food, "999.00", NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            0,
        )
        .unwrap();

    let report = expenses.analytics(user, None, None, june(20)).unwrap();
    assert_eq!(report.period.start_date, june(1));
    assert_eq!(report.period.end_date, june(30));
    assert_eq!(report.total_expenses, money("400.00"));
    assert_eq!(report.total_income, money("1000.00"));

    let shares: Vec<(&str, f64, u32)> = report
        .category_breakdown
        .iter()
        .map(|share| (share.category_name.as_str(), share.percentage, share.transaction_count))
        .collect();
    assert_eq!(shares, vec![("Rent", 75.0, 1), ("Food", 25.0, 2)]);

    let months: Vec<&str> = report.monthly_trends.iter().map(|t| t.month.as_str()).collect();
    assert_eq!(
        months,
        vec!["Jan 2024", "Feb 2024", "Mar 2024", "Apr 2024", "May 2024", "Jun 2024"]
    );
    let spent: Vec<Decimal> = report.monthly_trends.iter().map(|t| t.expenses).collect();
    assert_eq!(
        spent,
        vec![
            money("10.00"),
            Decimal::ZERO,
            Decimal::ZERO,
            money("40.00"),
            Decimal::ZERO,
            money("400.00"),
        ]
    );
    assert_eq!(report.monthly_trends[5].net, money("600.00"));

    let narrow = expenses
        .analytics(user, Some(june(3)), Some(june(5)), june(20))
        .unwrap();
    assert_eq!(narrow.total_expenses, money("100.00"));
    assert_eq!(narrow.category_breakdown.len(), 1);
    assert_eq!(narrow.category_breakdown[0].percentage, 100.0);

    let reversed = expenses.analytics(user, Some(june(10)), Some(june(1)), june(20));
    assert!(matches!(reversed, Err(ServiceError::Validation(err)) if err.field == "end_date"));
}
