//! Goal categories, goals, progress, milestones, journal and reviews.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use lifeorg_core::analytics::period::{now_ms, today};
use lifeorg_core::model::category::Category;
use lifeorg_core::model::dashboard::ActivityType;
use lifeorg_core::model::goal::{GoalFrequency, GoalMilestone, GoalProgress, GoalStatus, GoalType};
use lifeorg_core::repo::goal_repo::{GoalQuery, JournalQuery, ProgressQuery};
use lifeorg_core::service::goal_service::{
    GoalAnalytics, GoalCategoryInput, GoalCategoryPatch, GoalCategoryView, GoalInput, GoalPatch,
    GoalSummary, GoalView, HabitReport, JournalInput, JournalPatch, JournalView, MilestoneInput,
    MilestonePatch, MoodTrends, ProgressInput, ProgressOutcome, ProgressPatch, ProgressUpdate,
    ReviewInput, ReviewPatch, ReviewView, Suggestions,
};
use lifeorg_core::RecordId;
use serde::Deserialize;
use serde_json::json;

use super::created;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser, ClientMeta};
use crate::state::AppState;

const DEFAULT_RECENT_DAYS: u32 = 7;
const DEFAULT_MOOD_DAYS: u32 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/create_defaults", post(create_default_categories))
        .route(
            "/categories/{id}",
            get(get_category).patch(update_category).delete(delete_category),
        )
        .route("/goals", get(list_goals).post(create_goal))
        .route("/goals/active", get(active_goals))
        .route("/goals/overdue", get(overdue_goals))
        .route("/goals/summary", get(summary))
        .route(
            "/goals/{id}",
            get(get_goal).patch(update_goal).delete(delete_goal),
        )
        .route("/goals/{id}/update_progress", post(update_progress))
        .route("/progress", get(list_progress).post(create_progress))
        .route("/progress/recent", get(recent_progress))
        .route(
            "/progress/{id}",
            get(get_progress).patch(update_progress_entry).delete(delete_progress),
        )
        .route("/milestones", get(list_milestones).post(create_milestone))
        .route(
            "/milestones/{id}",
            get(get_milestone).patch(update_milestone).delete(delete_milestone),
        )
        .route("/milestones/{id}/complete", post(complete_milestone))
        .route("/journal", get(list_journal).post(create_journal_entry))
        .route("/journal/mood_trends", get(mood_trends))
        .route(
            "/journal/{id}",
            get(get_journal_entry)
                .patch(update_journal_entry)
                .delete(delete_journal_entry),
        )
        .route("/reviews", get(list_reviews).post(create_review))
        .route("/reviews/current_month", get(current_month_review))
        .route(
            "/reviews/{id}",
            get(get_review).patch(update_review).delete(delete_review),
        )
        .route("/analytics", get(analytics))
        .route("/suggestions", get(suggestions))
        .route("/habits", get(habits))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoalParams {
    status: Option<GoalStatus>,
    goal_type: Option<GoalType>,
    category: Option<RecordId>,
    frequency: Option<GoalFrequency>,
    search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProgressParams {
    goal: Option<RecordId>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    completed: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoalFilter {
    goal: Option<RecordId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JournalParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    mood_rating: Option<u8>,
    search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DaysParams {
    days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DateRangeParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

async fn list_categories(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<GoalCategoryView>>> {
    let categories = state
        .run(move |db| Ok(db.goals().list_categories(auth.user_id)?))
        .await?;
    Ok(Json(categories))
}

async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<GoalCategoryInput>,
) -> ApiResult<Response> {
    let category = state
        .run(move |db| Ok(db.goals().create_category(auth.user_id, input)?))
        .await?;
    Ok(created(category))
}

async fn create_default_categories(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Response> {
    let categories: Vec<Category> = state
        .run(move |db| Ok(db.goals().create_default_categories(auth.user_id)?))
        .await?;
    Ok(created(categories))
}

async fn get_category(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<GoalCategoryView>> {
    let category = state
        .run(move |db| Ok(db.goals().get_category(auth.user_id, id)?))
        .await?;
    Ok(Json(category))
}

async fn update_category(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<GoalCategoryPatch>,
) -> ApiResult<Json<GoalCategoryView>> {
    let category = state
        .run(move |db| Ok(db.goals().update_category(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(category))
}

async fn delete_category(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.goals().delete_category(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_goals(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<GoalParams>,
) -> ApiResult<Json<Vec<GoalView>>> {
    let query = GoalQuery {
        status: params.status,
        goal_type: params.goal_type,
        category_id: params.category,
        frequency: params.frequency,
        search: params.search,
        ..GoalQuery::default()
    };
    let goals = state
        .run(move |db| Ok(db.goals().list_goals(auth.user_id, &query, today())?))
        .await?;
    Ok(Json(goals))
}

async fn create_goal(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientMeta,
    ApiJson(input): ApiJson<GoalInput>,
) -> ApiResult<Response> {
    let goal = state
        .run(move |db| {
            let goal = db.goals().create_goal(auth.user_id, input, now_ms(), today())?;
            db.dashboard().record_activity(
                auth.user_id,
                ActivityType::GoalCreated,
                format!("Created goal: {}", goal.goal.title),
                client.context(Some(json!({ "goal_id": goal.goal.id }))),
            )?;
            Ok(goal)
        })
        .await?;
    Ok(created(goal))
}

async fn active_goals(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<GoalView>>> {
    let goals = state
        .run(move |db| Ok(db.goals().active_goals(auth.user_id, today())?))
        .await?;
    Ok(Json(goals))
}

async fn overdue_goals(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<GoalView>>> {
    let goals = state
        .run(move |db| Ok(db.goals().overdue_goals(auth.user_id, today())?))
        .await?;
    Ok(Json(goals))
}

async fn summary(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<GoalSummary>> {
    let summary = state
        .run(move |db| Ok(db.goals().summary(auth.user_id, today())?))
        .await?;
    Ok(Json(summary))
}

async fn get_goal(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<GoalView>> {
    let goal = state
        .run(move |db| Ok(db.goals().get_goal(auth.user_id, id, today())?))
        .await?;
    Ok(Json(goal))
}

async fn update_goal(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientMeta,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<GoalPatch>,
) -> ApiResult<Json<GoalView>> {
    let goal = state
        .run(move |db| {
            let goal = db.goals().update_goal(auth.user_id, id, patch, now_ms(), today())?;
            db.dashboard().record_activity(
                auth.user_id,
                ActivityType::GoalUpdated,
                format!("Updated goal: {}", goal.goal.title),
                client.context(Some(json!({ "goal_id": goal.goal.id }))),
            )?;
            Ok(goal)
        })
        .await?;
    Ok(Json(goal))
}

async fn delete_goal(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.goals().delete_goal(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientMeta,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(update): ApiJson<ProgressUpdate>,
) -> ApiResult<Json<ProgressOutcome>> {
    let outcome = state
        .run(move |db| {
            let outcome = db.goals().update_progress(auth.user_id, id, update, today())?;
            db.dashboard().record_activity(
                auth.user_id,
                ActivityType::GoalUpdated,
                format!("Updated progress for goal: {}", outcome.goal.goal.title),
                client.context(Some(json!({
                    "goal_id": outcome.goal.goal.id,
                    "value": outcome.progress.value.to_string(),
                }))),
            )?;
            Ok(outcome)
        })
        .await?;
    Ok(Json(outcome))
}

async fn list_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<ProgressParams>,
) -> ApiResult<Json<Vec<GoalProgress>>> {
    let query = ProgressQuery {
        goal_id: params.goal,
        since: params.start_date,
        until: params.end_date,
        completed: params.completed,
    };
    let entries = state
        .run(move |db| Ok(db.goals().list_progress(auth.user_id, &query)?))
        .await?;
    Ok(Json(entries))
}

async fn recent_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<DaysParams>,
) -> ApiResult<Json<Vec<GoalProgress>>> {
    let days = params.days.unwrap_or(DEFAULT_RECENT_DAYS);
    let entries = state
        .run(move |db| Ok(db.goals().recent_progress(auth.user_id, days, today())?))
        .await?;
    Ok(Json(entries))
}

async fn create_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<ProgressInput>,
) -> ApiResult<Response> {
    let entry = state
        .run(move |db| Ok(db.goals().create_progress(auth.user_id, input)?))
        .await?;
    Ok(created(entry))
}

async fn get_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<GoalProgress>> {
    let entry = state
        .run(move |db| Ok(db.goals().get_progress(auth.user_id, id)?))
        .await?;
    Ok(Json(entry))
}

async fn update_progress_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<ProgressPatch>,
) -> ApiResult<Json<GoalProgress>> {
    let entry = state
        .run(move |db| Ok(db.goals().update_progress_entry(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(entry))
}

async fn delete_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.goals().delete_progress(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_milestones(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(filter): ApiQuery<GoalFilter>,
) -> ApiResult<Json<Vec<GoalMilestone>>> {
    let milestones = state
        .run(move |db| Ok(db.goals().list_milestones(auth.user_id, filter.goal)?))
        .await?;
    Ok(Json(milestones))
}

async fn create_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<MilestoneInput>,
) -> ApiResult<Response> {
    let milestone = state
        .run(move |db| Ok(db.goals().create_milestone(auth.user_id, input)?))
        .await?;
    Ok(created(milestone))
}

async fn get_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<GoalMilestone>> {
    let milestone = state
        .run(move |db| Ok(db.goals().get_milestone(auth.user_id, id)?))
        .await?;
    Ok(Json(milestone))
}

async fn update_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<MilestonePatch>,
) -> ApiResult<Json<GoalMilestone>> {
    let milestone = state
        .run(move |db| Ok(db.goals().update_milestone(auth.user_id, id, patch, now_ms())?))
        .await?;
    Ok(Json(milestone))
}

async fn complete_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<GoalMilestone>> {
    let milestone = state
        .run(move |db| Ok(db.goals().complete_milestone(auth.user_id, id, now_ms())?))
        .await?;
    Ok(Json(milestone))
}

async fn delete_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.goals().delete_milestone(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_journal(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<JournalParams>,
) -> ApiResult<Json<Vec<JournalView>>> {
    let query = JournalQuery {
        since: params.start_date,
        until: params.end_date,
        mood_rating: params.mood_rating,
        search: params.search,
    };
    let entries = state
        .run(move |db| Ok(db.goals().list_journal_entries(auth.user_id, &query)?))
        .await?;
    Ok(Json(entries))
}

async fn create_journal_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientMeta,
    ApiJson(input): ApiJson<JournalInput>,
) -> ApiResult<Response> {
    let entry = state
        .run(move |db| {
            let entry = db.goals().create_journal_entry(auth.user_id, input, today())?;
            db.dashboard().record_activity(
                auth.user_id,
                ActivityType::JournalEntry,
                format!("Wrote journal entry for {}", entry.entry.entry_date),
                client.context(Some(json!({ "entry_id": entry.entry.id }))),
            )?;
            Ok(entry)
        })
        .await?;
    Ok(created(entry))
}

async fn mood_trends(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<DaysParams>,
) -> ApiResult<Json<MoodTrends>> {
    let days = params.days.unwrap_or(DEFAULT_MOOD_DAYS);
    let trends = state
        .run(move |db| Ok(db.goals().mood_trends(auth.user_id, days, today())?))
        .await?;
    Ok(Json(trends))
}

async fn get_journal_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<JournalView>> {
    let entry = state
        .run(move |db| Ok(db.goals().get_journal_entry(auth.user_id, id)?))
        .await?;
    Ok(Json(entry))
}

async fn update_journal_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<JournalPatch>,
) -> ApiResult<Json<JournalView>> {
    let entry = state
        .run(move |db| Ok(db.goals().update_journal_entry(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(entry))
}

async fn delete_journal_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.goals().delete_journal_entry(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_reviews(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<ReviewView>>> {
    let reviews = state
        .run(move |db| Ok(db.goals().list_reviews(auth.user_id)?))
        .await?;
    Ok(Json(reviews))
}

async fn create_review(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<ReviewInput>,
) -> ApiResult<Response> {
    let review = state
        .run(move |db| Ok(db.goals().create_review(auth.user_id, input)?))
        .await?;
    Ok(created(review))
}

async fn current_month_review(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ReviewView>> {
    let review = state
        .run(move |db| Ok(db.goals().current_month_review(auth.user_id, today())?))
        .await?;
    Ok(Json(review))
}

async fn get_review(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<ReviewView>> {
    let review = state
        .run(move |db| Ok(db.goals().get_review(auth.user_id, id)?))
        .await?;
    Ok(Json(review))
}

async fn update_review(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<ReviewPatch>,
) -> ApiResult<Json<ReviewView>> {
    let review = state
        .run(move |db| Ok(db.goals().update_review(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(review))
}

async fn delete_review(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.goals().delete_review(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn analytics(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<DateRangeParams>,
) -> ApiResult<Json<GoalAnalytics>> {
    let analytics = state
        .run(move |db| {
            Ok(db
                .goals()
                .analytics(auth.user_id, params.start_date, params.end_date, today())?)
        })
        .await?;
    Ok(Json(analytics))
}

async fn suggestions(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Suggestions>> {
    let suggestions = state
        .run(move |db| Ok(db.goals().suggestions(auth.user_id, today(), now_ms())?))
        .await?;
    Ok(Json(suggestions))
}

async fn habits(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<HabitReport>> {
    let report = state
        .run(move |db| Ok(db.goals().habits(auth.user_id, today())?))
        .await?;
    Ok(Json(report))
}
