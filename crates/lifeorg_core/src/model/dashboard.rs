//! Dashboard widget, notification, activity and preference models.
//!
//! # Invariants
//! - Widgets are laid out on a grid; width and height are at least 1.
//! - A notification's `read_at` is written once, on the first read.

use super::{limit_text, require_text, RecordId, UserId, ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

db_enum! {
    pub enum WidgetType {
        ExpenseSummary => "expense_summary",
        BudgetOverview => "budget_overview",
        TaskSummary => "task_summary",
        GoalProgress => "goal_progress",
        RecentTransactions => "recent_transactions",
        UpcomingTasks => "upcoming_tasks",
        MoodTracker => "mood_tracker",
        QuickStats => "quick_stats",
    }
}

impl WidgetType {
    pub fn title(self) -> &'static str {
        match self {
            Self::ExpenseSummary => "Expense Summary",
            Self::BudgetOverview => "Budget Overview",
            Self::TaskSummary => "Task Summary",
            Self::GoalProgress => "Goal Progress",
            Self::RecentTransactions => "Recent Transactions",
            Self::UpcomingTasks => "Upcoming Tasks",
            Self::MoodTracker => "Mood Tracker",
            Self::QuickStats => "Quick Statistics",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardWidget {
    pub id: RecordId,
    pub user_id: UserId,
    pub widget_type: WidgetType,
    pub title: String,
    pub position_x: u32,
    pub position_y: u32,
    pub width: u32,
    pub height: u32,
    /// Free-form widget configuration object.
    pub settings: Value,
    pub is_visible: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DashboardWidget {
    /// Creates a visible widget titled after its type.
    pub fn new(user_id: UserId, widget_type: WidgetType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            widget_type,
            title: widget_type.title().to_string(),
            position_x: 0,
            position_y: 0,
            width: 1,
            height: 1,
            settings: Value::Object(Default::default()),
            is_visible: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Places the widget at `(x, y)` spanning `width` x `height` cells.
    pub fn placed(mut self, x: u32, y: u32, width: u32, height: u32) -> Self {
        self.position_x = x;
        self.position_y = y;
        self.width = width;
        self.height = height;
        self
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, 100)?;
        if self.width == 0 {
            return Err(ValidationError::new("width", "width must be at least 1"));
        }
        if self.height == 0 {
            return Err(ValidationError::new("height", "height must be at least 1"));
        }
        if !self.settings.is_object() {
            return Err(ValidationError::new("settings", "settings must be an object"));
        }
        Ok(())
    }
}

/// Layout applied by `reset_layout`.
pub fn default_layout(user_id: UserId) -> Vec<DashboardWidget> {
    vec![
        DashboardWidget::new(user_id, WidgetType::ExpenseSummary).placed(0, 0, 2, 1),
        DashboardWidget::new(user_id, WidgetType::TaskSummary).placed(2, 0, 2, 1),
        DashboardWidget::new(user_id, WidgetType::GoalProgress).placed(0, 1, 2, 1),
        DashboardWidget::new(user_id, WidgetType::RecentTransactions).placed(2, 1, 2, 2),
    ]
}

db_enum! {
    pub enum NotificationType {
        BudgetAlert => "budget_alert",
        TaskReminder => "task_reminder",
        GoalReminder => "goal_reminder",
        System => "system",
        Achievement => "achievement",
    }
}

db_enum! {
    pub enum NotificationPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

impl NotificationPriority {
    pub fn is_high(self) -> bool {
        matches!(self, Self::High | Self::Urgent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: RecordId,
    pub user_id: UserId,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub action_url: String,
    pub action_data: Value,
    pub is_read: bool,
    pub is_sent: bool,
    pub scheduled_for: i64,
    pub sent_at: Option<i64>,
    pub read_at: Option<i64>,
    pub created_at: i64,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        scheduled_for: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            notification_type,
            priority: NotificationPriority::Medium,
            title: title.into(),
            message: message.into(),
            action_url: String::new(),
            action_data: Value::Object(Default::default()),
            is_read: false,
            is_sent: false,
            scheduled_for,
            sent_at: None,
            read_at: None,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, 255)?;
        require_text("message", &self.message, 10_000)?;
        limit_text("action_url", &self.action_url, 200)
    }

    /// Marks the notification read. Returns `false` when it already was.
    pub fn mark_as_read(&mut self, now_ms: i64) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(now_ms);
        true
    }
}

db_enum! {
    pub enum ActivityType {
        Login => "login",
        ExpenseAdded => "expense_added",
        IncomeAdded => "income_added",
        TaskCreated => "task_created",
        TaskCompleted => "task_completed",
        GoalCreated => "goal_created",
        GoalUpdated => "goal_updated",
        JournalEntry => "journal_entry",
        BudgetCreated => "budget_created",
    }
}

/// Append-only audit record of user actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub id: RecordId,
    pub user_id: UserId,
    pub activity_type: ActivityType,
    pub description: String,
    pub metadata: Value,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub created_at: i64,
}

impl UserActivity {
    pub fn new(user_id: UserId, activity_type: ActivityType, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            activity_type,
            description: description.into(),
            metadata: Value::Object(Default::default()),
            ip_address: None,
            user_agent: String::new(),
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        limit_text("description", &self.description, 255)?;
        if let Some(ip) = &self.ip_address {
            if ip.parse::<std::net::IpAddr>().is_err() {
                return Err(ValidationError::new("ip_address", "enter a valid IP address"));
            }
        }
        Ok(())
    }
}

db_enum! {
    pub enum LayoutType {
        Grid => "grid",
        List => "list",
    }
}

db_enum! {
    pub enum ExpensePeriod {
        Week => "week",
        Month => "month",
        Quarter => "quarter",
        Year => "year",
    }
}

db_enum! {
    pub enum TaskView {
        Kanban => "kanban",
        List => "list",
        Calendar => "calendar",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardPreference {
    pub user_id: UserId,
    pub layout_type: LayoutType,
    pub default_expense_period: ExpensePeriod,
    pub default_task_view: TaskView,
    pub show_budget_alerts: bool,
    pub show_task_reminders: bool,
    pub show_goal_reminders: bool,
    /// Expense category ids offered as one-tap shortcuts.
    pub quick_expense_categories: Vec<RecordId>,
    /// Client-defined task templates.
    pub quick_task_templates: Vec<Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DashboardPreference {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            layout_type: LayoutType::Grid,
            default_expense_period: ExpensePeriod::Month,
            default_task_view: TaskView::Kanban,
            show_budget_alerts: true,
            show_task_reminders: true,
            show_goal_reminders: true,
            quick_expense_categories: Vec::new(),
            quick_task_templates: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{default_layout, DashboardWidget, Notification, NotificationType, UserActivity, ActivityType, WidgetType};
    use uuid::Uuid;

    #[test]
    fn default_layout_has_four_widgets_in_grid() {
        let layout = default_layout(Uuid::new_v4());
        let cells = layout
            .iter()
            .map(|w| (w.widget_type, w.position_x, w.position_y, w.width, w.height))
            .collect::<Vec<_>>();
        assert_eq!(
            cells,
            vec![
                (WidgetType::ExpenseSummary, 0, 0, 2, 1),
                (WidgetType::TaskSummary, 2, 0, 2, 1),
                (WidgetType::GoalProgress, 0, 1, 2, 1),
                (WidgetType::RecentTransactions, 2, 1, 2, 2),
            ]
        );
        assert!(layout.iter().all(|w| w.validate().is_ok()));
    }

    #[test]
    fn zero_sized_widget_is_rejected() {
        let widget = DashboardWidget::new(Uuid::new_v4(), WidgetType::QuickStats).placed(0, 0, 0, 1);
        assert_eq!(widget.validate().unwrap_err().field, "width");
    }

    #[test]
    fn mark_as_read_only_stamps_once() {
        let mut note = Notification::new(Uuid::new_v4(), NotificationType::System, "hi", "there", 0);
        assert!(note.mark_as_read(100));
        assert!(!note.mark_as_read(200));
        assert!(note.is_read);
        assert_eq!(note.read_at, Some(100));
    }

    #[test]
    fn activity_ip_must_parse() {
        let mut activity = UserActivity::new(Uuid::new_v4(), ActivityType::Login, "login");
        activity.ip_address = Some("10.0.0.1".to_string());
        assert!(activity.validate().is_ok());
        activity.ip_address = Some("not-an-ip".to_string());
        assert!(activity.validate().is_err());
    }
}
