//! Widgets, notifications, activity log, preferences and overview.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use lifeorg_core::analytics::period::{now_ms, today, EpochRange};
use lifeorg_core::model::dashboard::{
    ActivityType, DashboardPreference, DashboardWidget, Notification, NotificationPriority,
    NotificationType, UserActivity,
};
use lifeorg_core::repo::dashboard_repo::{ActivityQuery, NotificationQuery};
use lifeorg_core::service::dashboard_service::{
    ActivityStats, DashboardOverview, NotificationInput, NotificationPatch, NotificationSummary,
    PreferencePatch, QuickStats, WidgetInput, WidgetPatch, WidgetPayload,
};
use lifeorg_core::RecordId;
use serde::Deserialize;
use serde_json::json;

use super::{created, message};
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;

const DEFAULT_RECENT_DAYS: u32 = 7;
const DEFAULT_PERIOD: &str = "week";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/widgets", get(list_widgets).post(create_widget))
        .route("/widgets/reset_layout", post(reset_layout))
        .route("/widgets/widget_data", get(widget_data))
        .route(
            "/widgets/{id}",
            get(get_widget).patch(update_widget).delete(delete_widget),
        )
        .route("/notifications", get(list_notifications).post(create_notification))
        .route("/notifications/unread", get(unread_notifications))
        .route("/notifications/summary", get(notification_summary))
        .route("/notifications/mark_all_read", post(mark_all_read))
        .route(
            "/notifications/{id}",
            get(get_notification)
                .patch(update_notification)
                .delete(delete_notification),
        )
        .route("/notifications/{id}/mark_read", post(mark_read))
        .route("/activities", get(list_activities))
        .route("/activities/recent", get(recent_activities))
        .route("/activities/stats", get(activity_stats))
        .route("/activities/{id}", get(get_activity).delete(delete_activity))
        .route("/overview", get(overview))
        .route("/preferences", get(preferences).patch(update_preferences))
        .route("/quick-stats", get(quick_stats))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NotificationParams {
    is_read: Option<bool>,
    notification_type: Option<NotificationType>,
    priority: Option<NotificationPriority>,
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActivityParams {
    activity_type: Option<ActivityType>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DaysParams {
    days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PeriodParams {
    period: Option<String>,
}

async fn list_widgets(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<DashboardWidget>>> {
    let widgets = state
        .run(move |db| Ok(db.dashboard().list_widgets(auth.user_id)?))
        .await?;
    Ok(Json(widgets))
}

async fn create_widget(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<WidgetInput>,
) -> ApiResult<Response> {
    let widget = state
        .run(move |db| Ok(db.dashboard().create_widget(auth.user_id, input)?))
        .await?;
    Ok(created(widget))
}

async fn reset_layout(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<serde_json::Value>> {
    let widgets = state
        .run(move |db| Ok(db.dashboard().reset_layout(auth.user_id)?))
        .await?;
    Ok(Json(json!({
        "message": "Dashboard layout reset to default",
        "widgets": widgets,
    })))
}

async fn widget_data(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<WidgetPayload>>> {
    let payloads = state
        .run(move |db| Ok(db.dashboard().widget_data(auth.user_id, now_ms(), today())?))
        .await?;
    Ok(Json(payloads))
}

async fn get_widget(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<DashboardWidget>> {
    let widget = state
        .run(move |db| Ok(db.dashboard().get_widget(auth.user_id, id)?))
        .await?;
    Ok(Json(widget))
}

async fn update_widget(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<WidgetPatch>,
) -> ApiResult<Json<DashboardWidget>> {
    let widget = state
        .run(move |db| Ok(db.dashboard().update_widget(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(widget))
}

async fn delete_widget(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.dashboard().delete_widget(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<NotificationParams>,
) -> ApiResult<Json<Vec<Notification>>> {
    let query = NotificationQuery {
        is_read: params.is_read,
        notification_type: params.notification_type,
        priority: params.priority,
        limit: params.limit,
    };
    let notifications = state
        .run(move |db| Ok(db.dashboard().list_notifications(auth.user_id, &query)?))
        .await?;
    Ok(Json(notifications))
}

async fn create_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NotificationInput>,
) -> ApiResult<Response> {
    let notification = state
        .run(move |db| Ok(db.dashboard().create_notification(auth.user_id, input, now_ms())?))
        .await?;
    Ok(created(notification))
}

async fn unread_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = state
        .run(move |db| Ok(db.dashboard().unread_notifications(auth.user_id)?))
        .await?;
    Ok(Json(notifications))
}

async fn notification_summary(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<NotificationSummary>> {
    let summary = state
        .run(move |db| Ok(db.dashboard().notification_summary(auth.user_id)?))
        .await?;
    Ok(Json(summary))
}

async fn mark_all_read(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<serde_json::Value>> {
    let updated = state
        .run(move |db| Ok(db.dashboard().mark_all_notifications_read(auth.user_id, now_ms())?))
        .await?;
    Ok(Json(json!({
        "message": format!("{updated} notifications marked as read"),
        "updated": updated,
    })))
}

async fn get_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<Notification>> {
    let notification = state
        .run(move |db| Ok(db.dashboard().get_notification(auth.user_id, id)?))
        .await?;
    Ok(Json(notification))
}

async fn update_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<NotificationPatch>,
) -> ApiResult<Json<Notification>> {
    let notification = state
        .run(move |db| Ok(db.dashboard().update_notification(auth.user_id, id, patch, now_ms())?))
        .await?;
    Ok(Json(notification))
}

async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.dashboard().delete_notification(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .run(move |db| Ok(db.dashboard().mark_notification_read(auth.user_id, id, now_ms())?))
        .await?;
    Ok(message("Notification marked as read"))
}

async fn list_activities(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<ActivityParams>,
) -> ApiResult<Json<Vec<UserActivity>>> {
    let query = ActivityQuery {
        activity_type: params.activity_type,
        range: EpochRange::from_optional_days(params.start_date, params.end_date),
        limit: params.limit,
    };
    let activities = state
        .run(move |db| Ok(db.dashboard().list_activities(auth.user_id, &query)?))
        .await?;
    Ok(Json(activities))
}

async fn recent_activities(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<DaysParams>,
) -> ApiResult<Json<Vec<UserActivity>>> {
    let days = params.days.unwrap_or(DEFAULT_RECENT_DAYS);
    let activities = state
        .run(move |db| Ok(db.dashboard().recent_activities(auth.user_id, days, now_ms())?))
        .await?;
    Ok(Json(activities))
}

async fn activity_stats(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<ActivityStats>> {
    let stats = state
        .run(move |db| Ok(db.dashboard().activity_stats(auth.user_id, today())?))
        .await?;
    Ok(Json(stats))
}

async fn get_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<UserActivity>> {
    let activity = state
        .run(move |db| Ok(db.dashboard().get_activity(auth.user_id, id)?))
        .await?;
    Ok(Json(activity))
}

async fn delete_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.dashboard().delete_activity(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn overview(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<DashboardOverview>> {
    let overview = state
        .run(move |db| Ok(db.dashboard().overview(auth.user_id, now_ms(), today())?))
        .await?;
    Ok(Json(overview))
}

async fn preferences(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<DashboardPreference>> {
    let preferences = state
        .run(move |db| Ok(db.dashboard().preferences(auth.user_id)?))
        .await?;
    Ok(Json(preferences))
}

async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(patch): ApiJson<PreferencePatch>,
) -> ApiResult<Json<DashboardPreference>> {
    let preferences = state
        .run(move |db| Ok(db.dashboard().update_preferences(auth.user_id, patch)?))
        .await?;
    Ok(Json(preferences))
}

async fn quick_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<PeriodParams>,
) -> ApiResult<Json<QuickStats>> {
    let period = params.period.unwrap_or_else(|| DEFAULT_PERIOD.to_string());
    let stats = state
        .run(move |db| Ok(db.dashboard().quick_stats(auth.user_id, &period, now_ms(), today())?))
        .await?;
    Ok(Json(stats))
}
