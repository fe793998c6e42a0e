//! Dashboard widgets, notifications, activity log, preferences and
//! cross-component aggregates.
//!
//! # Responsibility
//! - Own the per-user dashboard records.
//! - Read the expense, task and goal stores to build overview figures and
//!   widget payloads without writing to them.
//!
//! # Invariants
//! - A notification's `read_at` is stamped once, on its first read.
//! - Widget data is produced only for visible widgets, in grid order.

use super::goal_service::average_progress;
use super::task_service::most_productive_day;
use super::{found, ServiceError, ServiceResult};
use crate::analytics::period::{date_start_ms, month_start, EpochRange};
use crate::analytics::streak::current_streak;
use crate::model::category::CategoryKind;
use crate::model::dashboard::{
    ActivityType, DashboardPreference, DashboardWidget, ExpensePeriod, LayoutType, Notification,
    NotificationPriority, NotificationType, TaskView, UserActivity, WidgetType,
};
use crate::model::expense::{AlertType, BudgetAlert, Transaction, TransactionType};
use crate::model::goal::{Goal, GoalStatus, GoalType};
use crate::model::money::{count_percentage, percentage, round_to};
use crate::model::task::{TaskPriority, TaskStatus};
use crate::model::{RecordId, UserId};
use crate::repo::category_repo::CategoryRepository;
use crate::repo::dashboard_repo::{
    ActivityQuery, DashboardRepository, NotificationCounts, NotificationQuery,
};
use crate::repo::expense_repo::{AlertQuery, ExpenseRepository, TransactionQuery};
use crate::repo::goal_repo::{GoalQuery, GoalRepository, JournalQuery};
use crate::repo::task_repo::{TaskOrdering, TaskQuery, TaskRepository, TaskScope};
use chrono::{Datelike, Duration, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

const DAY_MS: i64 = 24 * 3_600_000;
const OPEN_STATUSES: [TaskStatus; 2] = [TaskStatus::Todo, TaskStatus::InProgress];
const RECENT_ACTIVITY_LIMIT: u32 = 20;
const RECENT_NOTIFICATION_LIMIT: u32 = 5;
const OVERVIEW_LIST_LIMIT: u32 = 5;
const WIDGET_TRANSACTION_LIMIT: u32 = 10;
const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetInput {
    pub widget_type: WidgetType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub position_x: u32,
    #[serde(default)]
    pub position_y: u32,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub settings: Option<Value>,
    #[serde(default)]
    pub is_visible: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WidgetPatch {
    pub widget_type: Option<WidgetType>,
    pub title: Option<String>,
    pub position_x: Option<u32>,
    pub position_y: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub settings: Option<Value>,
    pub is_visible: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WidgetPayload {
    pub widget_id: RecordId,
    pub widget_type: WidgetType,
    pub title: String,
    pub data: WidgetData,
    pub last_updated: i64,
}

/// Data block of one widget, shaped per widget type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WidgetData {
    ExpenseSummary {
        income: Decimal,
        expenses: Decimal,
        net: Decimal,
        period: &'static str,
    },
    TaskSummary {
        total: u32,
        completed: u32,
        pending: u32,
        overdue: u32,
    },
    GoalProgress {
        goals: Vec<GoalBrief>,
        average_progress: f64,
    },
    RecentTransactions {
        transactions: Vec<TransactionBrief>,
    },
    BudgetOverview {
        budgets: Vec<BudgetBrief>,
        total_budget: Decimal,
        total_spent: Decimal,
    },
    UpcomingTasks {
        tasks: Vec<TaskBrief>,
    },
    MoodTracker {
        entries: Vec<MoodBrief>,
        average_mood: f64,
    },
    QuickStats(Box<QuickStats>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalBrief {
    pub id: RecordId,
    pub title: String,
    pub progress: f64,
    pub target_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionBrief {
    pub id: RecordId,
    pub description: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskBrief {
    pub id: RecordId,
    pub title: String,
    pub due_date: Option<i64>,
    pub priority: TaskPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetBrief {
    pub budget_id: RecordId,
    pub category: String,
    pub amount: Decimal,
    pub spent: Decimal,
    pub percentage_used: f64,
    pub is_over_budget: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodBrief {
    pub date: NaiveDate,
    pub mood: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationInput {
    pub notification_type: NotificationType,
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action_url: String,
    #[serde(default)]
    pub action_data: Option<Value>,
    /// Defaults to now.
    #[serde(default)]
    pub scheduled_for: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationPatch {
    pub priority: Option<NotificationPriority>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub action_url: Option<String>,
    pub action_data: Option<Value>,
    pub scheduled_for: Option<i64>,
    pub is_read: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationSummary {
    pub total_notifications: u32,
    pub unread_notifications: u32,
    pub high_priority_count: u32,
    pub recent_notifications: Vec<Notification>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityStats {
    pub activity_by_type: BTreeMap<String, u32>,
    /// Last seven days, oldest first.
    pub daily_activity: Vec<DailyActivity>,
    pub total_activities: u32,
}

/// Optional request context stored with an activity.
#[derive(Debug, Clone, Default)]
pub struct ActivityContext {
    pub metadata: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreferencePatch {
    pub layout_type: Option<LayoutType>,
    pub default_expense_period: Option<ExpensePeriod>,
    pub default_task_view: Option<TaskView>,
    pub show_budget_alerts: Option<bool>,
    pub show_task_reminders: Option<bool>,
    pub show_goal_reminders: Option<bool>,
    pub quick_expense_categories: Option<Vec<RecordId>>,
    pub quick_task_templates: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_amount: Decimal,
    pub budget_used_percentage: f64,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub pending_tasks: u32,
    pub overdue_tasks: u32,
    pub total_goals: u32,
    pub active_goals: u32,
    pub completed_goals: u32,
    pub average_goal_progress: f64,
    pub recent_transactions: Vec<TransactionBrief>,
    pub upcoming_tasks: Vec<TaskBrief>,
    pub goal_milestones: Vec<GoalBrief>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeVsExpenses {
    pub income: Decimal,
    pub expenses: Decimal,
    pub difference: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Deadline {
    Task {
        title: String,
        deadline: i64,
        priority: TaskPriority,
    },
    Goal {
        title: String,
        deadline: NaiveDate,
        progress: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickStats {
    pub period: String,
    pub income_vs_expenses: IncomeVsExpenses,
    pub top_expense_categories: Vec<CategorySpend>,
    pub budget_alerts: Vec<BudgetAlert>,
    pub task_completion_rate: f64,
    /// Hours from creation to completion.
    pub average_task_completion_time: f64,
    pub most_productive_day: Option<&'static str>,
    pub goal_completion_rate: f64,
    pub habit_streak_average: f64,
    pub upcoming_deadlines: Vec<Deadline>,
}

/// Dashboard use-case facade.
pub struct DashboardService<D, E, C, T, G>
where
    D: DashboardRepository,
    E: ExpenseRepository,
    C: CategoryRepository,
    T: TaskRepository,
    G: GoalRepository,
{
    repo: D,
    expenses: E,
    categories: C,
    tasks: T,
    goals: G,
}

impl<D, E, C, T, G> DashboardService<D, E, C, T, G>
where
    D: DashboardRepository,
    E: ExpenseRepository,
    C: CategoryRepository,
    T: TaskRepository,
    G: GoalRepository,
{
    pub fn new(repo: D, expenses: E, categories: C, tasks: T, goals: G) -> Self {
        Self {
            repo,
            expenses,
            categories,
            tasks,
            goals,
        }
    }

    pub fn list_widgets(&self, user_id: UserId) -> ServiceResult<Vec<DashboardWidget>> {
        Ok(self.repo.list_widgets(user_id, false)?)
    }

    pub fn get_widget(&self, user_id: UserId, id: RecordId) -> ServiceResult<DashboardWidget> {
        found(self.repo.get_widget(user_id, id)?, "widget")
    }

    pub fn create_widget(&self, user_id: UserId, input: WidgetInput) -> ServiceResult<DashboardWidget> {
        let mut widget = DashboardWidget::new(user_id, input.widget_type).placed(
            input.position_x,
            input.position_y,
            input.width.unwrap_or(1),
            input.height.unwrap_or(1),
        );
        if let Some(title) = input.title {
            widget.title = title.trim().to_string();
        }
        if let Some(settings) = input.settings {
            widget.settings = settings;
        }
        if let Some(visible) = input.is_visible {
            widget.is_visible = visible;
        }
        self.repo.create_widget(&widget)?;
        self.get_widget(user_id, widget.id)
    }

    pub fn update_widget(&self, user_id: UserId, id: RecordId, patch: WidgetPatch) -> ServiceResult<DashboardWidget> {
        let mut widget = self.get_widget(user_id, id)?;
        if let Some(widget_type) = patch.widget_type {
            widget.widget_type = widget_type;
        }
        if let Some(title) = patch.title {
            widget.title = title.trim().to_string();
        }
        if let Some(x) = patch.position_x {
            widget.position_x = x;
        }
        if let Some(y) = patch.position_y {
            widget.position_y = y;
        }
        if let Some(width) = patch.width {
            widget.width = width;
        }
        if let Some(height) = patch.height {
            widget.height = height;
        }
        if let Some(settings) = patch.settings {
            widget.settings = settings;
        }
        if let Some(visible) = patch.is_visible {
            widget.is_visible = visible;
        }
        self.repo.update_widget(&widget)?;
        self.get_widget(user_id, id)
    }

    pub fn delete_widget(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_widget(user_id, id)?;
        Ok(())
    }

    /// Replaces every widget with the four-widget default layout.
    pub fn reset_layout(&self, user_id: UserId) -> ServiceResult<Vec<DashboardWidget>> {
        let widgets = self.repo.reset_layout(user_id)?;
        info!(
            "event=layout_reset module=dashboard status=ok user_id={user_id} widgets={}",
            widgets.len()
        );
        Ok(widgets)
    }

    pub fn widget_data(&self, user_id: UserId, now_ms: i64, today: NaiveDate) -> ServiceResult<Vec<WidgetPayload>> {
        self.repo
            .list_widgets(user_id, true)?
            .into_iter()
            .map(|widget| {
                Ok(WidgetPayload {
                    data: self.data_for(widget.widget_type, user_id, now_ms, today)?,
                    widget_id: widget.id,
                    widget_type: widget.widget_type,
                    title: widget.title,
                    last_updated: now_ms,
                })
            })
            .collect()
    }

    fn data_for(
        &self,
        widget_type: WidgetType,
        user_id: UserId,
        now_ms: i64,
        today: NaiveDate,
    ) -> ServiceResult<WidgetData> {
        Ok(match widget_type {
            WidgetType::ExpenseSummary => {
                let totals = self.expenses.totals(user_id, &EpochRange::month_of(today))?;
                WidgetData::ExpenseSummary {
                    income: totals.income,
                    expenses: totals.expenses,
                    net: totals.net(),
                    period: "This Month",
                }
            }
            WidgetType::TaskSummary => {
                let (total, completed, pending, overdue) = self.task_counts(user_id, now_ms)?;
                WidgetData::TaskSummary {
                    total,
                    completed,
                    pending,
                    overdue,
                }
            }
            WidgetType::GoalProgress => {
                let active = self.active_goals(user_id, false)?;
                let shown: Vec<&Goal> = active.iter().take(OVERVIEW_LIST_LIMIT as usize).collect();
                WidgetData::GoalProgress {
                    average_progress: average_progress(shown.iter().copied()),
                    goals: shown.into_iter().map(goal_brief).collect(),
                }
            }
            WidgetType::RecentTransactions => WidgetData::RecentTransactions {
                transactions: self.recent_transactions(user_id, WIDGET_TRANSACTION_LIMIT, true)?,
            },
            WidgetType::BudgetOverview => {
                let names = self.category_names(user_id)?;
                let mut budgets = Vec::new();
                let mut total_budget = Decimal::ZERO;
                let mut total_spent = Decimal::ZERO;
                for budget in self.expenses.list_budgets(user_id, Some(month_start(today)))? {
                    let spent = self.expenses.spent_in_category(
                        user_id,
                        budget.category_id,
                        &EpochRange::month_of(budget.month),
                    )?;
                    let usage = budget.status(spent);
                    total_budget += budget.amount;
                    total_spent += spent;
                    budgets.push(BudgetBrief {
                        budget_id: budget.id,
                        category: names.get(&budget.category_id).cloned().unwrap_or_default(),
                        amount: budget.amount,
                        spent,
                        percentage_used: round_to(usage.percentage_used, 2),
                        is_over_budget: usage.is_over_budget,
                    });
                }
                WidgetData::BudgetOverview {
                    budgets,
                    total_budget,
                    total_spent,
                }
            }
            WidgetType::UpcomingTasks => WidgetData::UpcomingTasks {
                tasks: self.upcoming_tasks(user_id, now_ms, None)?,
            },
            WidgetType::MoodTracker => {
                let query = JournalQuery {
                    since: Some(today - Duration::days(6)),
                    ..JournalQuery::default()
                };
                let mut entries: Vec<MoodBrief> = self
                    .goals
                    .list_journal_entries(user_id, &query)?
                    .into_iter()
                    .filter_map(|e| e.mood_rating.map(|mood| MoodBrief { date: e.entry_date, mood }))
                    .collect();
                entries.reverse();
                let average_mood = if entries.is_empty() {
                    0.0
                } else {
                    let sum: u32 = entries.iter().map(|e| u32::from(e.mood)).sum();
                    round_to(f64::from(sum) / entries.len() as f64, 1)
                };
                WidgetData::MoodTracker {
                    entries,
                    average_mood,
                }
            }
            WidgetType::QuickStats => {
                WidgetData::QuickStats(Box::new(self.quick_stats(user_id, "month", now_ms, today)?))
            }
        })
    }

    pub fn list_notifications(&self, user_id: UserId, query: &NotificationQuery) -> ServiceResult<Vec<Notification>> {
        Ok(self.repo.list_notifications(user_id, query)?)
    }

    pub fn unread_notifications(&self, user_id: UserId) -> ServiceResult<Vec<Notification>> {
        let query = NotificationQuery {
            is_read: Some(false),
            ..NotificationQuery::default()
        };
        self.list_notifications(user_id, &query)
    }

    pub fn get_notification(&self, user_id: UserId, id: RecordId) -> ServiceResult<Notification> {
        found(self.repo.get_notification(user_id, id)?, "notification")
    }

    pub fn create_notification(
        &self,
        user_id: UserId,
        input: NotificationInput,
        now_ms: i64,
    ) -> ServiceResult<Notification> {
        let mut notification = Notification::new(
            user_id,
            input.notification_type,
            input.title.trim(),
            input.message,
            input.scheduled_for.unwrap_or(now_ms),
        );
        if let Some(priority) = input.priority {
            notification.priority = priority;
        }
        notification.action_url = input.action_url;
        if let Some(data) = input.action_data {
            notification.action_data = data;
        }
        self.repo.create_notification(&notification)?;
        self.get_notification(user_id, notification.id)
    }

    pub fn update_notification(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: NotificationPatch,
        now_ms: i64,
    ) -> ServiceResult<Notification> {
        let mut notification = self.get_notification(user_id, id)?;
        if let Some(priority) = patch.priority {
            notification.priority = priority;
        }
        if let Some(title) = patch.title {
            notification.title = title.trim().to_string();
        }
        if let Some(message) = patch.message {
            notification.message = message;
        }
        if let Some(url) = patch.action_url {
            notification.action_url = url;
        }
        if let Some(data) = patch.action_data {
            notification.action_data = data;
        }
        if let Some(at) = patch.scheduled_for {
            notification.scheduled_for = at;
        }
        if patch.is_read == Some(true) {
            notification.mark_as_read(now_ms);
        }
        self.repo.update_notification(&notification)?;
        self.get_notification(user_id, id)
    }

    pub fn delete_notification(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_notification(user_id, id)?;
        Ok(())
    }

    pub fn mark_notification_read(&self, user_id: UserId, id: RecordId, now_ms: i64) -> ServiceResult<Notification> {
        Ok(self.repo.mark_notification_read(user_id, id, now_ms)?)
    }

    pub fn mark_all_notifications_read(&self, user_id: UserId, now_ms: i64) -> ServiceResult<usize> {
        let changed = self.repo.mark_all_notifications_read(user_id, now_ms)?;
        info!("event=notifications_read_all module=dashboard status=ok changed={changed}");
        Ok(changed)
    }

    pub fn notification_summary(&self, user_id: UserId) -> ServiceResult<NotificationSummary> {
        let NotificationCounts {
            total,
            unread,
            high_priority_unread,
        } = self.repo.notification_counts(user_id)?;
        let recent = self.list_notifications(
            user_id,
            &NotificationQuery {
                limit: Some(RECENT_NOTIFICATION_LIMIT),
                ..NotificationQuery::default()
            },
        )?;
        Ok(NotificationSummary {
            total_notifications: total,
            unread_notifications: unread,
            high_priority_count: high_priority_unread,
            recent_notifications: recent,
        })
    }

    /// Turns freshly recorded budget alerts into notifications when the
    /// user keeps budget alerts switched on.
    pub fn notify_budget_alerts(
        &self,
        user_id: UserId,
        alerts: &[BudgetAlert],
        now_ms: i64,
    ) -> ServiceResult<Vec<Notification>> {
        if alerts.is_empty() || !self.repo.get_or_create_preferences(user_id)?.show_budget_alerts {
            return Ok(Vec::new());
        }
        let mut created = Vec::with_capacity(alerts.len());
        for alert in alerts {
            let mut notification = Notification::new(
                user_id,
                NotificationType::BudgetAlert,
                match alert.alert_type {
                    AlertType::Exceeded => "Budget exceeded",
                    _ => "Budget threshold reached",
                },
                alert.message.clone(),
                now_ms,
            );
            notification.priority = match alert.alert_type {
                AlertType::Exceeded => NotificationPriority::High,
                _ => NotificationPriority::Medium,
            };
            notification.action_data = serde_json::json!({ "budget_id": alert.budget_id });
            self.repo.create_notification(&notification)?;
            created.push(notification);
        }
        Ok(created)
    }

    pub fn list_activities(&self, user_id: UserId, query: &ActivityQuery) -> ServiceResult<Vec<UserActivity>> {
        Ok(self.repo.list_activities(user_id, query)?)
    }

    pub fn get_activity(&self, user_id: UserId, id: RecordId) -> ServiceResult<UserActivity> {
        found(self.repo.get_activity(user_id, id)?, "activity")
    }

    pub fn delete_activity(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_activity(user_id, id)?;
        Ok(())
    }

    /// Up to 20 activities from the last `days` days, newest first.
    pub fn recent_activities(&self, user_id: UserId, days: u32, now_ms: i64) -> ServiceResult<Vec<UserActivity>> {
        let query = ActivityQuery {
            range: EpochRange {
                start_ms: Some(now_ms - i64::from(days) * DAY_MS),
                end_ms: None,
            },
            limit: Some(RECENT_ACTIVITY_LIMIT),
            ..ActivityQuery::default()
        };
        self.list_activities(user_id, &query)
    }

    pub fn activity_stats(&self, user_id: UserId, today: NaiveDate) -> ServiceResult<ActivityStats> {
        let daily_activity = (0..7)
            .rev()
            .map(|back| {
                let date = today - Duration::days(back);
                Ok(DailyActivity {
                    date,
                    count: self.repo.count_activities(user_id, &EpochRange::days(date, date))?,
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(ActivityStats {
            activity_by_type: self.repo.activity_counts_by_type(user_id)?,
            daily_activity,
            total_activities: self.repo.count_activities(user_id, &EpochRange::all())?,
        })
    }

    pub fn record_activity(
        &self,
        user_id: UserId,
        activity_type: ActivityType,
        description: impl Into<String>,
        context: ActivityContext,
    ) -> ServiceResult<UserActivity> {
        let mut activity = UserActivity::new(user_id, activity_type, description);
        if let Some(metadata) = context.metadata {
            activity.metadata = metadata;
        }
        activity.ip_address = context.ip_address.filter(|ip| ip.parse::<std::net::IpAddr>().is_ok());
        activity.user_agent = context.user_agent;
        self.repo.record_activity(&activity)?;
        info!(
            "event=activity_record module=dashboard status=ok type={activity_type} user_id={user_id}"
        );
        self.get_activity(user_id, activity.id)
    }

    pub fn preferences(&self, user_id: UserId) -> ServiceResult<DashboardPreference> {
        Ok(self.repo.get_or_create_preferences(user_id)?)
    }

    pub fn update_preferences(&self, user_id: UserId, patch: PreferencePatch) -> ServiceResult<DashboardPreference> {
        let mut preferences = self.repo.get_or_create_preferences(user_id)?;
        if let Some(layout) = patch.layout_type {
            preferences.layout_type = layout;
        }
        if let Some(period) = patch.default_expense_period {
            preferences.default_expense_period = period;
        }
        if let Some(view) = patch.default_task_view {
            preferences.default_task_view = view;
        }
        if let Some(show) = patch.show_budget_alerts {
            preferences.show_budget_alerts = show;
        }
        if let Some(show) = patch.show_task_reminders {
            preferences.show_task_reminders = show;
        }
        if let Some(show) = patch.show_goal_reminders {
            preferences.show_goal_reminders = show;
        }
        if let Some(categories) = patch.quick_expense_categories {
            let owned: BTreeSet<RecordId> = self
                .categories
                .list_categories(user_id, CategoryKind::Expense)?
                .into_iter()
                .map(|category| category.id)
                .collect();
            if categories.iter().any(|id| !owned.contains(id)) {
                return Err(ServiceError::validation(
                    "quick_expense_categories",
                    "invalid category",
                ));
            }
            preferences.quick_expense_categories = categories;
        }
        if let Some(templates) = patch.quick_task_templates {
            preferences.quick_task_templates = templates;
        }
        self.repo.save_preferences(&preferences)?;
        self.preferences(user_id)
    }

    /// Current-month figures across every component.
    pub fn overview(&self, user_id: UserId, now_ms: i64, today: NaiveDate) -> ServiceResult<DashboardOverview> {
        let month = month_start(today);
        let totals = self.expenses.totals(user_id, &EpochRange::month_of(month))?;
        let total_budget = self.expenses.budget_total(user_id, month)?;
        let (total_tasks, completed_tasks, pending_tasks, overdue_tasks) =
            self.task_counts(user_id, now_ms)?;

        let goals = self.goals.list_goals(user_id, &GoalQuery::default())?;
        let active: Vec<&Goal> = goals.iter().filter(|g| g.status == GoalStatus::Active).collect();
        let completed_goals = goals.iter().filter(|g| g.status == GoalStatus::Completed).count() as u32;
        let goal_milestones = self
            .active_goals(user_id, true)?
            .iter()
            .take(OVERVIEW_LIST_LIMIT as usize)
            .map(goal_brief)
            .collect();

        Ok(DashboardOverview {
            total_income: totals.income,
            total_expenses: totals.expenses,
            net_amount: totals.net(),
            budget_used_percentage: round_to(percentage(totals.expenses, total_budget), 2),
            total_tasks,
            completed_tasks,
            pending_tasks,
            overdue_tasks,
            total_goals: goals.len() as u32,
            active_goals: active.len() as u32,
            completed_goals,
            average_goal_progress: average_progress(active.iter().copied()),
            recent_transactions: self.recent_transactions(user_id, OVERVIEW_LIST_LIMIT, false)?,
            upcoming_tasks: self.upcoming_tasks(user_id, now_ms, None)?,
            goal_milestones,
        })
    }

    /// Headline statistics since the start of `period`
    /// (`week`, `month`, `year`, anything else meaning the last 30 days).
    pub fn quick_stats(&self, user_id: UserId, period: &str, now_ms: i64, today: NaiveDate) -> ServiceResult<QuickStats> {
        let start_ms = match period {
            "week" => now_ms - 7 * DAY_MS,
            "month" => date_start_ms(month_start(today)),
            "year" => date_start_ms(today.with_ordinal(1).unwrap_or(today)),
            _ => now_ms - 30 * DAY_MS,
        };
        let since = EpochRange {
            start_ms: Some(start_ms),
            end_ms: None,
        };

        let totals = self.expenses.totals(user_id, &since)?;
        let top_expense_categories = self
            .expenses
            .category_breakdown(user_id, TransactionType::Expense, &since)?
            .into_iter()
            .take(5)
            .map(|slice| CategorySpend {
                category: slice.name,
                amount: slice.amount,
            })
            .collect();

        let tasks = self.tasks.list_tasks(
            user_id,
            &TaskQuery {
                scope: TaskScope::Personal,
                created: since,
                ..TaskQuery::default()
            },
        )?;
        let done: Vec<_> = tasks.iter().filter(|t| t.status == TaskStatus::Done).collect();
        let hours: Vec<f64> = done
            .iter()
            .filter_map(|t| t.completed_at.map(|at| (at - t.created_at) as f64 / 3_600_000.0))
            .collect();
        let average_task_completion_time = if hours.is_empty() {
            0.0
        } else {
            round_to(hours.iter().sum::<f64>() / hours.len() as f64, 2)
        };

        let goals = self.goals.list_goals(user_id, &GoalQuery::default())?;
        let recent_goals: Vec<&Goal> = goals.iter().filter(|g| since.contains(g.created_at)).collect();
        let goals_done = recent_goals
            .iter()
            .filter(|g| g.status == GoalStatus::Completed)
            .count() as u32;

        let habits: Vec<&Goal> = goals
            .iter()
            .filter(|g| g.status == GoalStatus::Active && g.goal_type == GoalType::Habit)
            .collect();
        let mut streak_total = 0u64;
        for habit in &habits {
            let days = self.goals.completed_days(habit.id)?;
            streak_total += u64::from(current_streak(&days, today));
        }
        let habit_streak_average = if habits.is_empty() {
            0.0
        } else {
            round_to(streak_total as f64 / habits.len() as f64, 2)
        };

        let mut upcoming_deadlines: Vec<Deadline> = self
            .upcoming_tasks(user_id, now_ms, Some(now_ms + 7 * DAY_MS))?
            .into_iter()
            .map(|task| Deadline::Task {
                title: task.title,
                deadline: task.due_date.unwrap_or(now_ms),
                priority: task.priority,
            })
            .collect();
        let horizon = today + Duration::days(7);
        upcoming_deadlines.extend(
            goals
                .iter()
                .filter(|g| g.status == GoalStatus::Active)
                .filter(|g| g.target_date >= today && g.target_date <= horizon)
                .take(OVERVIEW_LIST_LIMIT as usize)
                .map(|goal| Deadline::Goal {
                    title: goal.title.clone(),
                    deadline: goal.target_date,
                    progress: goal.progress_percentage(),
                }),
        );

        let budget_alerts = self
            .expenses
            .list_alerts(
                user_id,
                &AlertQuery {
                    is_read: Some(false),
                    ..AlertQuery::default()
                },
            )?
            .into_iter()
            .filter(|alert| since.contains(alert.sent_at))
            .collect();

        Ok(QuickStats {
            period: period.to_string(),
            income_vs_expenses: IncomeVsExpenses {
                income: totals.income,
                expenses: totals.expenses,
                difference: totals.net(),
            },
            top_expense_categories,
            budget_alerts,
            task_completion_rate: round_to(count_percentage(done.len() as u32, tasks.len() as u32), 2),
            average_task_completion_time,
            most_productive_day: most_productive_day(done.iter().filter_map(|t| t.completed_at)),
            goal_completion_rate: round_to(count_percentage(goals_done, recent_goals.len() as u32), 2),
            habit_streak_average,
            upcoming_deadlines,
        })
    }

    /// Personal task counts: total, done, open, open and past due.
    fn task_counts(&self, user_id: UserId, now_ms: i64) -> ServiceResult<(u32, u32, u32, u32)> {
        let count = |statuses: Vec<TaskStatus>, due: EpochRange| {
            self.tasks.count_tasks(
                user_id,
                &TaskQuery {
                    scope: TaskScope::Personal,
                    statuses,
                    due,
                    ..TaskQuery::default()
                },
            )
        };
        let overdue = EpochRange {
            start_ms: None,
            end_ms: Some(now_ms),
        };
        Ok((
            count(Vec::new(), EpochRange::all())?,
            count(vec![TaskStatus::Done], EpochRange::all())?,
            count(OPEN_STATUSES.to_vec(), EpochRange::all())?,
            count(OPEN_STATUSES.to_vec(), overdue)?,
        ))
    }

    /// Open personal tasks due from now on, soonest first, at most five.
    fn upcoming_tasks(&self, user_id: UserId, now_ms: i64, until_ms: Option<i64>) -> ServiceResult<Vec<TaskBrief>> {
        let tasks = self.tasks.list_tasks(
            user_id,
            &TaskQuery {
                scope: TaskScope::Personal,
                statuses: OPEN_STATUSES.to_vec(),
                due: EpochRange {
                    start_ms: Some(now_ms),
                    end_ms: until_ms.map(|until| until + 1),
                },
                ordering: TaskOrdering::DueAsc,
                limit: Some(OVERVIEW_LIST_LIMIT),
                ..TaskQuery::default()
            },
        )?;
        Ok(tasks
            .into_iter()
            .map(|task| TaskBrief {
                id: task.id,
                title: task.title,
                due_date: task.due_date,
                priority: task.priority,
            })
            .collect())
    }

    fn active_goals(&self, user_id: UserId, by_target_date: bool) -> ServiceResult<Vec<Goal>> {
        Ok(self.goals.list_goals(
            user_id,
            &GoalQuery {
                status: Some(GoalStatus::Active),
                by_target_date,
                ..GoalQuery::default()
            },
        )?)
    }

    fn recent_transactions(&self, user_id: UserId, limit: u32, with_category: bool) -> ServiceResult<Vec<TransactionBrief>> {
        let transactions = self.expenses.list_transactions(
            user_id,
            &TransactionQuery {
                limit: Some(limit),
                ..TransactionQuery::default()
            },
        )?;
        let names = if with_category {
            self.category_names(user_id)?
        } else {
            BTreeMap::new()
        };
        Ok(transactions
            .into_iter()
            .map(|transaction| transaction_brief(transaction, with_category.then_some(&names)))
            .collect())
    }

    fn category_names(&self, user_id: UserId) -> ServiceResult<BTreeMap<RecordId, String>> {
        let mut names = BTreeMap::new();
        for kind in [CategoryKind::Expense, CategoryKind::Income] {
            for category in self.categories.list_categories(user_id, kind)? {
                names.insert(category.id, category.name);
            }
        }
        Ok(names)
    }
}

fn goal_brief(goal: &Goal) -> GoalBrief {
    GoalBrief {
        id: goal.id,
        title: goal.title.clone(),
        progress: goal.progress_percentage(),
        target_date: goal.target_date,
    }
}

fn transaction_brief(transaction: Transaction, names: Option<&BTreeMap<RecordId, String>>) -> TransactionBrief {
    let category = names.map(|names| {
        transaction
            .category_id()
            .and_then(|id| names.get(&id).cloned())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    });
    TransactionBrief {
        id: transaction.id,
        description: transaction.description,
        amount: transaction.amount,
        transaction_type: transaction.transaction_type,
        date: transaction.transaction_date,
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::{transaction_brief, Deadline};
    use crate::model::expense::{Transaction, TransactionType};
    use crate::model::task::TaskPriority;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    #[test]
    fn transaction_brief_falls_back_to_uncategorized() {
        let mut tx = Transaction::new(Uuid::new_v4(), TransactionType::Expense, Decimal::new(450, 2), "Coffee", 0);
        tx.expense_category_id = Some(Uuid::new_v4());
        let names = BTreeMap::new();
        let brief = transaction_brief(tx.clone(), Some(&names));
        assert_eq!(brief.category.as_deref(), Some("Uncategorized"));

        let brief = transaction_brief(tx, None);
        assert!(brief.category.is_none());
    }

    #[test]
    fn deadlines_serialize_with_type_tag() {
        let deadline = Deadline::Task {
            title: "File taxes".to_string(),
            deadline: 1_700_000_000_000,
            priority: TaskPriority::High,
        };
        let json = serde_json::to_value(&deadline).unwrap();
        assert_eq!(json["type"], "task");
        assert_eq!(json["priority"], "high");
    }
}
