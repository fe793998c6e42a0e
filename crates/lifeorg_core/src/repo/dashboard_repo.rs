//! Dashboard widget, notification, activity and preference persistence.
//!
//! # Responsibility
//! - Store per-user dashboard configuration and the notification inbox.
//! - Append and aggregate the user activity log.
//!
//! # Invariants
//! - `reset_layout` replaces the whole layout inside one transaction.
//! - `mark_notification_read` only stamps `read_at` on the first read.
//! - Preferences exist at most once per user and are created on first access.

use super::{
    bool_col, bool_to_int, count_col, enum_col, id_text, json_col, json_text, uuid_col,
    RepoError, RepoResult, SqlQuery,
};
use crate::analytics::period::EpochRange;
use crate::db::in_transaction;
use crate::model::dashboard::{
    default_layout, ActivityType, DashboardPreference, DashboardWidget, ExpensePeriod,
    LayoutType, Notification, NotificationPriority, NotificationType, TaskView, UserActivity,
    WidgetType,
};
use crate::model::{RecordId, UserId};
use rusqlite::{params, Connection, Row};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

const WIDGET_SELECT_SQL: &str = "SELECT
    id, user_id, widget_type, title, position_x, position_y, width, height, settings,
    is_visible, created_at, updated_at
 FROM dashboard_widgets";

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id, user_id, notification_type, priority, title, message, action_url, action_data,
    is_read, is_sent, scheduled_for, sent_at, read_at, created_at
 FROM notifications";

const ACTIVITY_SELECT_SQL: &str = "SELECT
    id, user_id, activity_type, description, metadata, ip_address, user_agent, created_at
 FROM user_activities";

const PREFERENCE_SELECT_SQL: &str = "SELECT
    user_id, layout_type, default_expense_period, default_task_view, show_budget_alerts,
    show_task_reminders, show_goal_reminders, quick_expense_categories, quick_task_templates,
    created_at, updated_at
 FROM dashboard_preferences";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationQuery {
    pub is_read: Option<bool>,
    pub notification_type: Option<NotificationType>,
    pub priority: Option<NotificationPriority>,
    /// `None` returns every match.
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationCounts {
    pub total: u32,
    pub unread: u32,
    /// Unread notifications with high or urgent priority.
    pub high_priority_unread: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityQuery {
    pub activity_type: Option<ActivityType>,
    pub range: EpochRange,
    /// `None` returns every match.
    pub limit: Option<u32>,
}

pub trait DashboardRepository {
    fn create_widget(&self, widget: &DashboardWidget) -> RepoResult<()>;
    fn get_widget(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<DashboardWidget>>;
    /// Lists widgets in grid order (row, then column).
    fn list_widgets(&self, user_id: UserId, visible_only: bool)
        -> RepoResult<Vec<DashboardWidget>>;
    fn update_widget(&self, widget: &DashboardWidget) -> RepoResult<()>;
    fn delete_widget(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
    /// Deletes every widget of the user and installs the default layout.
    fn reset_layout(&self, user_id: UserId) -> RepoResult<Vec<DashboardWidget>>;

    fn create_notification(&self, notification: &Notification) -> RepoResult<()>;
    fn get_notification(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<Notification>>;
    /// Lists notifications newest first.
    fn list_notifications(&self, user_id: UserId, query: &NotificationQuery)
        -> RepoResult<Vec<Notification>>;
    fn update_notification(&self, notification: &Notification) -> RepoResult<()>;
    fn delete_notification(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
    /// Marks one notification read and returns its stored state.
    fn mark_notification_read(
        &self,
        user_id: UserId,
        id: RecordId,
        now_ms: i64,
    ) -> RepoResult<Notification>;
    /// Marks every unread notification read; returns how many changed.
    fn mark_all_notifications_read(&self, user_id: UserId, now_ms: i64) -> RepoResult<usize>;
    fn notification_counts(&self, user_id: UserId) -> RepoResult<NotificationCounts>;

    fn record_activity(&self, activity: &UserActivity) -> RepoResult<()>;
    fn get_activity(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<UserActivity>>;
    /// Lists activities newest first.
    fn list_activities(&self, user_id: UserId, query: &ActivityQuery)
        -> RepoResult<Vec<UserActivity>>;
    fn delete_activity(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
    fn count_activities(&self, user_id: UserId, range: &EpochRange) -> RepoResult<u32>;
    fn activity_counts_by_type(&self, user_id: UserId) -> RepoResult<BTreeMap<String, u32>>;

    fn get_or_create_preferences(&self, user_id: UserId) -> RepoResult<DashboardPreference>;
    fn save_preferences(&self, preferences: &DashboardPreference) -> RepoResult<()>;
}

pub struct SqliteDashboardRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDashboardRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find_preferences(&self, user_id: UserId) -> RepoResult<Option<DashboardPreference>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PREFERENCE_SELECT_SQL} WHERE user_id = ?1;"))?;
        let mut rows = stmt.query([id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_preference_row(row)?)),
            None => Ok(None),
        }
    }
}

impl DashboardRepository for SqliteDashboardRepository<'_> {
    fn create_widget(&self, widget: &DashboardWidget) -> RepoResult<()> {
        widget.validate()?;
        insert_widget(self.conn, widget)
    }

    fn get_widget(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<DashboardWidget>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{WIDGET_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_widget_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_widgets(
        &self,
        user_id: UserId,
        visible_only: bool,
    ) -> RepoResult<Vec<DashboardWidget>> {
        let mut sql = SqlQuery::new(WIDGET_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if visible_only {
            sql.push("AND is_visible = 1");
        }
        sql.push("ORDER BY position_y ASC, position_x ASC, created_at ASC, id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut widgets = Vec::new();
        while let Some(row) = rows.next()? {
            widgets.push(parse_widget_row(row)?);
        }
        Ok(widgets)
    }

    fn update_widget(&self, widget: &DashboardWidget) -> RepoResult<()> {
        widget.validate()?;
        let changed = self.conn.execute(
            "UPDATE dashboard_widgets
             SET widget_type = ?3, title = ?4, position_x = ?5, position_y = ?6, width = ?7,
                 height = ?8, settings = ?9, is_visible = ?10,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(widget.id),
                id_text(widget.user_id),
                widget.widget_type.as_str(),
                widget.title,
                widget.position_x,
                widget.position_y,
                widget.width,
                widget.height,
                json_text(&widget.settings)?,
                bool_to_int(widget.is_visible),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("widget", widget.id));
        }
        Ok(())
    }

    fn delete_widget(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM dashboard_widgets WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("widget", id));
        }
        Ok(())
    }

    fn reset_layout(&self, user_id: UserId) -> RepoResult<Vec<DashboardWidget>> {
        in_transaction(self.conn, |conn| -> RepoResult<Vec<DashboardWidget>> {
            conn.execute(
                "DELETE FROM dashboard_widgets WHERE user_id = ?1;",
                [id_text(user_id)],
            )?;
            let layout = default_layout(user_id);
            for widget in &layout {
                widget.validate()?;
                insert_widget(conn, widget)?;
            }
            Ok(layout)
        })
    }

    fn create_notification(&self, notification: &Notification) -> RepoResult<()> {
        notification.validate()?;
        self.conn.execute(
            "INSERT INTO notifications (
                id, user_id, notification_type, priority, title, message, action_url,
                action_data, is_read, is_sent, scheduled_for, sent_at, read_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                id_text(notification.id),
                id_text(notification.user_id),
                notification.notification_type.as_str(),
                notification.priority.as_str(),
                notification.title,
                notification.message,
                notification.action_url,
                json_text(&notification.action_data)?,
                bool_to_int(notification.is_read),
                bool_to_int(notification.is_sent),
                notification.scheduled_for,
                notification.sent_at,
                notification.read_at,
            ],
        )?;
        Ok(())
    }

    fn get_notification(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_notification_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_notifications(
        &self,
        user_id: UserId,
        query: &NotificationQuery,
    ) -> RepoResult<Vec<Notification>> {
        let mut sql = SqlQuery::new(NOTIFICATION_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(is_read) = query.is_read {
            sql.push_bind("AND is_read = ?", bool_to_int(is_read));
        }
        if let Some(kind) = query.notification_type {
            sql.push_bind("AND notification_type = ?", kind.as_str().to_string());
        }
        if let Some(priority) = query.priority {
            sql.push_bind("AND priority = ?", priority.as_str().to_string());
        }
        sql.push("ORDER BY created_at DESC, id ASC");
        if let Some(limit) = query.limit {
            sql.push_bind("LIMIT ?", i64::from(limit));
        }

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    fn update_notification(&self, notification: &Notification) -> RepoResult<()> {
        notification.validate()?;
        let changed = self.conn.execute(
            "UPDATE notifications
             SET notification_type = ?3, priority = ?4, title = ?5, message = ?6,
                 action_url = ?7, action_data = ?8, is_read = ?9, is_sent = ?10,
                 scheduled_for = ?11, sent_at = ?12, read_at = ?13
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(notification.id),
                id_text(notification.user_id),
                notification.notification_type.as_str(),
                notification.priority.as_str(),
                notification.title,
                notification.message,
                notification.action_url,
                json_text(&notification.action_data)?,
                bool_to_int(notification.is_read),
                bool_to_int(notification.is_sent),
                notification.scheduled_for,
                notification.sent_at,
                notification.read_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", notification.id));
        }
        Ok(())
    }

    fn delete_notification(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", id));
        }
        Ok(())
    }

    fn mark_notification_read(
        &self,
        user_id: UserId,
        id: RecordId,
        now_ms: i64,
    ) -> RepoResult<Notification> {
        let mut notification = self
            .get_notification(user_id, id)?
            .ok_or_else(|| RepoError::not_found("notification", id))?;
        if notification.mark_as_read(now_ms) {
            self.conn.execute(
                "UPDATE notifications SET is_read = 1, read_at = ?3
                 WHERE id = ?1 AND user_id = ?2 AND is_read = 0;",
                params![id_text(id), id_text(user_id), now_ms],
            )?;
        }
        Ok(notification)
    }

    fn mark_all_notifications_read(&self, user_id: UserId, now_ms: i64) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1, read_at = ?2
             WHERE user_id = ?1 AND is_read = 0;",
            params![id_text(user_id), now_ms],
        )?;
        Ok(changed)
    }

    fn notification_counts(&self, user_id: UserId) -> RepoResult<NotificationCounts> {
        let counts = self.conn.query_row(
            "SELECT COUNT(*),
                    COUNT(CASE WHEN is_read = 0 THEN 1 END),
                    COUNT(CASE WHEN is_read = 0 AND priority IN ('high', 'urgent') THEN 1 END)
             FROM notifications
             WHERE user_id = ?1;",
            [id_text(user_id)],
            |row| {
                Ok(NotificationCounts {
                    total: count_col(row, 0)?,
                    unread: count_col(row, 1)?,
                    high_priority_unread: count_col(row, 2)?,
                })
            },
        )?;
        Ok(counts)
    }

    fn record_activity(&self, activity: &UserActivity) -> RepoResult<()> {
        activity.validate()?;
        self.conn.execute(
            "INSERT INTO user_activities (
                id, user_id, activity_type, description, metadata, ip_address, user_agent
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id_text(activity.id),
                id_text(activity.user_id),
                activity.activity_type.as_str(),
                activity.description,
                json_text(&activity.metadata)?,
                activity.ip_address,
                activity.user_agent,
            ],
        )?;
        Ok(())
    }

    fn get_activity(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<UserActivity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACTIVITY_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_activity_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_activities(
        &self,
        user_id: UserId,
        query: &ActivityQuery,
    ) -> RepoResult<Vec<UserActivity>> {
        let mut sql = SqlQuery::new(ACTIVITY_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(kind) = query.activity_type {
            sql.push_bind("AND activity_type = ?", kind.as_str().to_string());
        }
        sql.push_range("created_at", &query.range);
        sql.push("ORDER BY created_at DESC, id ASC");
        if let Some(limit) = query.limit {
            sql.push_bind("LIMIT ?", i64::from(limit));
        }

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut activities = Vec::new();
        while let Some(row) = rows.next()? {
            activities.push(parse_activity_row(row)?);
        }
        Ok(activities)
    }

    fn delete_activity(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM user_activities WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("activity", id));
        }
        Ok(())
    }

    fn count_activities(&self, user_id: UserId, range: &EpochRange) -> RepoResult<u32> {
        let mut sql = SqlQuery::new("SELECT COUNT(*) FROM user_activities");
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        sql.push_range("created_at", range);
        let count = self
            .conn
            .query_row(sql.sql(), sql.params(), |row| count_col(row, 0))?;
        Ok(count)
    }

    fn activity_counts_by_type(&self, user_id: UserId) -> RepoResult<BTreeMap<String, u32>> {
        let mut stmt = self.conn.prepare(
            "SELECT activity_type, COUNT(*)
             FROM user_activities
             WHERE user_id = ?1
             GROUP BY activity_type;",
        )?;
        let mut rows = stmt.query([id_text(user_id)])?;
        let mut counts = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get(0)?;
            counts.insert(kind, count_col(row, 1)?);
        }
        Ok(counts)
    }

    fn get_or_create_preferences(&self, user_id: UserId) -> RepoResult<DashboardPreference> {
        self.conn.execute(
            "INSERT OR IGNORE INTO dashboard_preferences (user_id) VALUES (?1);",
            [id_text(user_id)],
        )?;
        self.find_preferences(user_id)?
            .ok_or_else(|| RepoError::not_found("dashboard preferences", user_id))
    }

    fn save_preferences(&self, preferences: &DashboardPreference) -> RepoResult<()> {
        let categories = preferences
            .quick_expense_categories
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>();
        self.conn.execute(
            "INSERT INTO dashboard_preferences (
                user_id, layout_type, default_expense_period, default_task_view,
                show_budget_alerts, show_task_reminders, show_goal_reminders,
                quick_expense_categories, quick_task_templates
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id) DO UPDATE SET
                layout_type = excluded.layout_type,
                default_expense_period = excluded.default_expense_period,
                default_task_view = excluded.default_task_view,
                show_budget_alerts = excluded.show_budget_alerts,
                show_task_reminders = excluded.show_task_reminders,
                show_goal_reminders = excluded.show_goal_reminders,
                quick_expense_categories = excluded.quick_expense_categories,
                quick_task_templates = excluded.quick_task_templates,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                id_text(preferences.user_id),
                preferences.layout_type.as_str(),
                preferences.default_expense_period.as_str(),
                preferences.default_task_view.as_str(),
                bool_to_int(preferences.show_budget_alerts),
                bool_to_int(preferences.show_task_reminders),
                bool_to_int(preferences.show_goal_reminders),
                json_text(&categories)?,
                json_text(&preferences.quick_task_templates)?,
            ],
        )?;
        Ok(())
    }
}

fn insert_widget(conn: &Connection, widget: &DashboardWidget) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO dashboard_widgets (
            id, user_id, widget_type, title, position_x, position_y, width, height,
            settings, is_visible
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
        params![
            id_text(widget.id),
            id_text(widget.user_id),
            widget.widget_type.as_str(),
            widget.title,
            widget.position_x,
            widget.position_y,
            widget.width,
            widget.height,
            json_text(&widget.settings)?,
            bool_to_int(widget.is_visible),
        ],
    )?;
    Ok(())
}

fn grid_col(row: &Row<'_>, column: &str) -> RepoResult<u32> {
    let value: i64 = row.get(column)?;
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid grid value `{value}` in column {column}")))
}

fn parse_widget_row(row: &Row<'_>) -> RepoResult<DashboardWidget> {
    Ok(DashboardWidget {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        widget_type: enum_col(row, "widget_type", WidgetType::parse)?,
        title: row.get("title")?,
        position_x: grid_col(row, "position_x")?,
        position_y: grid_col(row, "position_y")?,
        width: grid_col(row, "width")?,
        height: grid_col(row, "height")?,
        settings: json_col(row, "settings")?,
        is_visible: bool_col(row, "is_visible")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    Ok(Notification {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        notification_type: enum_col(row, "notification_type", NotificationType::parse)?,
        priority: enum_col(row, "priority", NotificationPriority::parse)?,
        title: row.get("title")?,
        message: row.get("message")?,
        action_url: row.get("action_url")?,
        action_data: json_col(row, "action_data")?,
        is_read: bool_col(row, "is_read")?,
        is_sent: bool_col(row, "is_sent")?,
        scheduled_for: row.get("scheduled_for")?,
        sent_at: row.get("sent_at")?,
        read_at: row.get("read_at")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<UserActivity> {
    Ok(UserActivity {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        activity_type: enum_col(row, "activity_type", ActivityType::parse)?,
        description: row.get("description")?,
        metadata: json_col(row, "metadata")?,
        ip_address: row.get("ip_address")?,
        user_agent: row.get("user_agent")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_preference_row(row: &Row<'_>) -> RepoResult<DashboardPreference> {
    let quick_categories = match json_col(row, "quick_expense_categories")? {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .and_then(|text| Uuid::parse_str(text).ok())
                    .ok_or_else(|| {
                        RepoError::InvalidData(format!("invalid quick expense category `{item}`"))
                    })
            })
            .collect::<RepoResult<Vec<_>>>()?,
        other => {
            return Err(RepoError::InvalidData(format!(
                "quick expense categories must be an array, got `{other}`"
            )))
        }
    };
    let templates = match json_col(row, "quick_task_templates")? {
        Value::Array(items) => items,
        other => {
            return Err(RepoError::InvalidData(format!(
                "quick task templates must be an array, got `{other}`"
            )))
        }
    };
    Ok(DashboardPreference {
        user_id: uuid_col(row, "user_id")?,
        layout_type: enum_col(row, "layout_type", LayoutType::parse)?,
        default_expense_period: enum_col(row, "default_expense_period", ExpensePeriod::parse)?,
        default_task_view: enum_col(row, "default_task_view", TaskView::parse)?,
        show_budget_alerts: bool_col(row, "show_budget_alerts")?,
        show_task_reminders: bool_col(row, "show_task_reminders")?,
        show_goal_reminders: bool_col(row, "show_goal_reminders")?,
        quick_expense_categories: quick_categories,
        quick_task_templates: templates,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
