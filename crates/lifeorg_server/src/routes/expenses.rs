//! Categories, transactions, budgets, alerts and expense analytics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Datelike, NaiveDate};
use lifeorg_core::analytics::period::{now_ms, today, EpochRange};
use lifeorg_core::model::category::{Category, CategoryKind};
use lifeorg_core::model::dashboard::ActivityType;
use lifeorg_core::model::expense::{AlertType, BudgetAlert, TransactionType};
use lifeorg_core::repo::expense_repo::{AlertQuery, TransactionOrdering, TransactionQuery};
use lifeorg_core::service::dashboard_service::ActivityContext;
use lifeorg_core::service::expense_service::{
    BudgetInput, BudgetNotice, BudgetPatch, BudgetView, CategoryInput, CategoryPatch,
    CategoryView, ExpenseAnalytics, MonthlySummary, TransactionInput, TransactionPatch,
    TransactionSummary, TransactionView,
};
use lifeorg_core::RecordId;
use serde::Deserialize;
use serde_json::json;

use super::created;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser, ClientMeta};
use crate::state::{AppState, Db};

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/categories", category_routes(CategoryKind::Expense))
        .nest("/income-categories", category_routes(CategoryKind::Income))
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/transactions/recent", get(recent_transactions))
        .route("/transactions/summary", get(transaction_summary))
        .route(
            "/transactions/{id}",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
        .route("/budgets", get(list_budgets).post(create_budget))
        .route("/budgets/current_month", get(current_month_budgets))
        .route("/budgets/alerts", get(current_month_alerts))
        .route(
            "/budgets/{id}",
            get(get_budget).patch(update_budget).delete(delete_budget),
        )
        .route("/alerts", get(list_alerts))
        .route("/alerts/mark_all_read", post(mark_all_alerts_read))
        .route("/alerts/{id}", get(get_alert).delete(delete_alert))
        .route("/alerts/{id}/mark_read", post(mark_alert_read))
        .route("/analytics", get(analytics))
        .route("/monthly-summary", get(monthly_summary))
}

/// CRUD plus `create_defaults` for one category kind.
fn category_routes(kind: CategoryKind) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(move |State(state): State<AppState>, auth: AuthUser| async move {
                let categories = state
                    .run(move |db| Ok(db.expenses().list_categories(auth.user_id, kind)?))
                    .await?;
                ApiResult::Ok(Json(categories))
            })
            .post(
                move |State(state): State<AppState>,
                      auth: AuthUser,
                      ApiJson(input): ApiJson<CategoryInput>| async move {
                    let category = state
                        .run(move |db| Ok(db.expenses().create_category(auth.user_id, kind, input)?))
                        .await?;
                    ApiResult::Ok(created(category))
                },
            ),
        )
        .route(
            "/create_defaults",
            post(move |State(state): State<AppState>, auth: AuthUser| async move {
                let categories: Vec<Category> = state
                    .run(move |db| Ok(db.expenses().create_default_categories(auth.user_id, kind)?))
                    .await?;
                ApiResult::Ok(created(json!({
                    "message": format!("Created {} default categories", categories.len()),
                    "categories": categories,
                })))
            }),
        )
        .route(
            "/{id}",
            get(
                move |State(state): State<AppState>, auth: AuthUser, ApiPath(id): ApiPath<RecordId>| async move {
                    let category: CategoryView = state
                        .run(move |db| Ok(db.expenses().get_category(auth.user_id, kind, id)?))
                        .await?;
                    ApiResult::Ok(Json(category))
                },
            )
            .patch(
                move |State(state): State<AppState>,
                      auth: AuthUser,
                      ApiPath(id): ApiPath<RecordId>,
                      ApiJson(patch): ApiJson<CategoryPatch>| async move {
                    let category = state
                        .run(move |db| {
                            Ok(db.expenses().update_category(auth.user_id, kind, id, patch)?)
                        })
                        .await?;
                    ApiResult::Ok(Json(category))
                },
            )
            .delete(
                move |State(state): State<AppState>, auth: AuthUser, ApiPath(id): ApiPath<RecordId>| async move {
                    state
                        .run(move |db| Ok(db.expenses().delete_category(auth.user_id, kind, id)?))
                        .await?;
                    ApiResult::Ok(StatusCode::NO_CONTENT)
                },
            ),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransactionParams {
    transaction_type: Option<TransactionType>,
    expense_category: Option<RecordId>,
    income_category: Option<RecordId>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    search: Option<String>,
    ordering: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl TransactionParams {
    fn into_query(self) -> ApiResult<TransactionQuery> {
        let ordering = match self.ordering.as_deref() {
            None => TransactionOrdering::default(),
            Some(value) => TransactionOrdering::parse(value)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown ordering {value:?}")))?,
        };
        Ok(TransactionQuery {
            transaction_type: self.transaction_type,
            expense_category_id: self.expense_category,
            income_category_id: self.income_category,
            range: EpochRange::from_optional_days(self.start_date, self.end_date),
            search: self.search,
            ordering,
            limit: self.limit,
            offset: self.offset.unwrap_or(0),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DateRangeParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MonthParams {
    month: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlertParams {
    is_read: Option<bool>,
    alert_type: Option<AlertType>,
    budget: Option<RecordId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SummaryParams {
    year: Option<i32>,
    month: Option<u32>,
}

/// Records the activity for a stored transaction and turns any budget
/// alerts it triggered into notifications.
fn after_transaction_write(
    db: &Db<'_>,
    view: &TransactionView,
    context: Option<ActivityContext>,
) -> ApiResult<()> {
    let user_id = view.transaction.user_id;
    let dashboard = db.dashboard();
    if let Some(context) = context {
        let (activity_type, verb) = match view.transaction.transaction_type {
            TransactionType::Income => (ActivityType::IncomeAdded, "income"),
            TransactionType::Expense => (ActivityType::ExpenseAdded, "expense"),
        };
        dashboard.record_activity(
            user_id,
            activity_type,
            format!("Added {verb}: {}", view.transaction.description),
            context,
        )?;
    }
    dashboard.notify_budget_alerts(user_id, &view.triggered_alerts, now_ms())?;
    Ok(())
}

async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<TransactionParams>,
) -> ApiResult<Json<Vec<TransactionView>>> {
    let query = params.into_query()?;
    let transactions = state
        .run(move |db| Ok(db.expenses().list_transactions(auth.user_id, &query)?))
        .await?;
    Ok(Json(transactions))
}

async fn create_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientMeta,
    ApiJson(input): ApiJson<TransactionInput>,
) -> ApiResult<Response> {
    let view = state
        .run(move |db| {
            let view = db
                .expenses()
                .create_transaction(auth.user_id, input, now_ms())?;
            let metadata = json!({ "transaction_id": view.transaction.id, "amount": view.transaction.amount });
            after_transaction_write(db, &view, Some(client.context(Some(metadata))))?;
            Ok(view)
        })
        .await?;
    Ok(created(view))
}

async fn recent_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<TransactionView>>> {
    let transactions = state
        .run(move |db| Ok(db.expenses().recent_transactions(auth.user_id)?))
        .await?;
    Ok(Json(transactions))
}

async fn transaction_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<DateRangeParams>,
) -> ApiResult<Json<TransactionSummary>> {
    let summary = state
        .run(move |db| {
            Ok(db
                .expenses()
                .transaction_summary(auth.user_id, params.start_date, params.end_date)?)
        })
        .await?;
    Ok(Json(summary))
}

async fn get_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<TransactionView>> {
    let view = state
        .run(move |db| Ok(db.expenses().get_transaction(auth.user_id, id)?))
        .await?;
    Ok(Json(view))
}

async fn update_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<TransactionPatch>,
) -> ApiResult<Json<TransactionView>> {
    let view = state
        .run(move |db| {
            let view = db.expenses().update_transaction(auth.user_id, id, patch)?;
            after_transaction_write(db, &view, None)?;
            Ok(view)
        })
        .await?;
    Ok(Json(view))
}

async fn delete_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.expenses().delete_transaction(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_budgets(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<MonthParams>,
) -> ApiResult<Json<Vec<BudgetView>>> {
    let budgets = state
        .run(move |db| Ok(db.expenses().list_budgets(auth.user_id, params.month)?))
        .await?;
    Ok(Json(budgets))
}

async fn create_budget(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientMeta,
    ApiJson(input): ApiJson<BudgetInput>,
) -> ApiResult<Response> {
    let view = state
        .run(move |db| {
            let view = db.expenses().create_budget(auth.user_id, input)?;
            db.dashboard().record_activity(
                auth.user_id,
                ActivityType::BudgetCreated,
                format!("Created budget for {} ({})", view.category_name, view.month_label),
                client.context(Some(json!({ "budget_id": view.budget.id }))),
            )?;
            Ok(view)
        })
        .await?;
    Ok(created(view))
}

async fn current_month_budgets(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<BudgetView>>> {
    let budgets = state
        .run(move |db| Ok(db.expenses().current_month_budgets(auth.user_id, today())?))
        .await?;
    Ok(Json(budgets))
}

async fn current_month_alerts(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<BudgetNotice>>> {
    let notices = state
        .run(move |db| Ok(db.expenses().current_month_alerts(auth.user_id, today())?))
        .await?;
    Ok(Json(notices))
}

async fn get_budget(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<BudgetView>> {
    let view = state
        .run(move |db| Ok(db.expenses().get_budget(auth.user_id, id)?))
        .await?;
    Ok(Json(view))
}

async fn update_budget(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<BudgetPatch>,
) -> ApiResult<Json<BudgetView>> {
    let view = state
        .run(move |db| Ok(db.expenses().update_budget(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(view))
}

async fn delete_budget(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.expenses().delete_budget(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_alerts(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<AlertParams>,
) -> ApiResult<Json<Vec<BudgetAlert>>> {
    let query = AlertQuery {
        is_read: params.is_read,
        alert_type: params.alert_type,
        budget_id: params.budget,
    };
    let alerts = state
        .run(move |db| Ok(db.expenses().list_alerts(auth.user_id, &query)?))
        .await?;
    Ok(Json(alerts))
}

async fn get_alert(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<BudgetAlert>> {
    let alert = state
        .run(move |db| Ok(db.expenses().get_alert(auth.user_id, id)?))
        .await?;
    Ok(Json(alert))
}

async fn mark_alert_read(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<BudgetAlert>> {
    let alert = state
        .run(move |db| Ok(db.expenses().mark_alert_read(auth.user_id, id)?))
        .await?;
    Ok(Json(alert))
}

async fn mark_all_alerts_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let changed = state
        .run(move |db| Ok(db.expenses().mark_all_alerts_read(auth.user_id)?))
        .await?;
    Ok(Json(json!({ "message": format!("Marked {changed} alerts as read") })))
}

async fn delete_alert(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.expenses().delete_alert(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn analytics(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<DateRangeParams>,
) -> ApiResult<Json<ExpenseAnalytics>> {
    let analytics = state
        .run(move |db| {
            Ok(db
                .expenses()
                .analytics(auth.user_id, params.start_date, params.end_date, today())?)
        })
        .await?;
    Ok(Json(analytics))
}

async fn monthly_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<SummaryParams>,
) -> ApiResult<Json<MonthlySummary>> {
    let now = today();
    let year = params.year.unwrap_or(now.year());
    let month = params.month.unwrap_or(now.month());
    let summary = state
        .run(move |db| Ok(db.expenses().monthly_summary(auth.user_id, year, month)?))
        .await?;
    Ok(Json(summary))
}
