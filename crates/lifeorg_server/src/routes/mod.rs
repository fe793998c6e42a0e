//! HTTP routes, one module per component.
//!
//! # Responsibility
//! - Decode requests, call one core service use case per handler, and
//!   encode the result.
//! - Record user activities for the actions the activity log tracks.
//!
//! # Invariants
//! - Handlers never touch SQL; all database work goes through `AppState::run`.
//! - Creation answers `201`, deletion `204`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

pub mod dashboard;
pub mod expenses;
pub mod goals;
pub mod tasks;
pub mod users;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/users", users::router())
        .nest("/api/expenses", expenses::router())
        .nest("/api/tasks", tasks::router())
        .nest("/api/goals", goals::router())
        .nest("/api/dashboard", dashboard::router())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": lifeorg_core::core_version(),
    }))
}

pub(crate) fn created<T: Serialize>(value: T) -> Response {
    (StatusCode::CREATED, Json(value)).into_response()
}

pub(crate) fn message(text: &'static str) -> Json<serde_json::Value> {
    Json(json!({ "message": text }))
}
