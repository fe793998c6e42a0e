use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lifeorg_core::analytics::period::today;
use lifeorg_server::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let conn = lifeorg_core::open_db_in_memory().expect("open in-memory db");
    build_router(AppState::new(conn, 30))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).expect("build request"))
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/users/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "correct-horse-1",
            "password_confirm": "correct-horse-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn health_reports_version() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some_and(|v| !v.is_empty()));
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/users/me", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_and_logout() {
    let app = app();
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");

    let (status, session) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({ "username": "alice", "password": "correct-horse-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{session}");
    let token = session["token"].as_str().expect("token");

    let (status, me) = send(&app, Method::GET, "/api/users/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");

    let (status, activities) =
        send(&app, Method::GET, "/api/dashboard/activities", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(activities
        .as_array()
        .expect("activity list")
        .iter()
        .any(|activity| activity["activity_type"] == "login"));

    let (status, _) = send(&app, Method::POST, "/api/users/logout", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/users/me", Some(token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_username_is_a_field_error() {
    let app = app();
    register(&app, "bob").await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/register",
        None,
        Some(json!({
            "username": "bob",
            "email": "bob2@example.com",
            "password": "correct-horse-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "username");
}

#[tokio::test]
async fn overspending_raises_alerts_and_notifications() {
    let app = app();
    let token = register(&app, "carol").await;
    let token = token.as_str();

    let (status, category) = send(
        &app,
        Method::POST,
        "/api/expenses/categories",
        Some(token),
        Some(json!({ "name": "Food" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{category}");
    let category_id = category["id"].as_str().expect("category id").to_string();

    let (status, budget) = send(
        &app,
        Method::POST,
        "/api/expenses/budgets",
        Some(token),
        Some(json!({
            "category": category_id,
            "amount": "50",
            "month": today().to_string(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{budget}");

    let (status, transaction) = send(
        &app,
        Method::POST,
        "/api/expenses/transactions",
        Some(token),
        Some(json!({
            "transaction_type": "expense",
            "amount": "60",
            "description": "Groceries",
            "expense_category": category_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{transaction}");

    let (status, alerts) = send(&app, Method::GET, "/api/expenses/alerts", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts.as_array().expect("alert list").len(), 2);

    let (status, summary) = send(
        &app,
        Method::GET,
        "/api/dashboard/notifications/summary",
        Some(token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["unread_notifications"], 2, "{summary}");

    let (status, activities) = send(
        &app,
        Method::GET,
        "/api/dashboard/activities?activity_type=expense_added",
        Some(token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activities.as_array().expect("activity list").len(), 1);
}

#[tokio::test]
async fn records_of_other_users_are_not_found() {
    let app = app();
    let owner = register(&app, "dave").await;
    let stranger = register(&app, "erin").await;

    let (status, task) = send(
        &app,
        Method::POST,
        "/api/tasks/tasks",
        Some(&owner),
        Some(json!({ "title": "File taxes" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    let uri = format!("/api/tasks/tasks/{}", task["id"].as_str().expect("task id"));

    let (status, _) = send(&app, Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn malformed_input_gets_the_error_body() {
    let app = app();
    let token = register(&app, "frank").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/goals/journal")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"content\": "))
        .expect("build request");
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.expect("read body").to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(body["error"], "malformed request");

    let (status, body) = send(&app, Method::GET, "/api/tasks/tasks/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed request");

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/tasks/tasks?ordering=sideways",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completing_a_task_is_logged_once() {
    let app = app();
    let token = register(&app, "grace").await;

    let (_, task) = send(
        &app,
        Method::POST,
        "/api/tasks/tasks",
        Some(&token),
        Some(json!({ "title": "Write report" })),
    )
    .await;
    let uri = format!("/api/tasks/tasks/{}", task["id"].as_str().expect("task id"));

    for _ in 0..2 {
        let (status, updated) = send(
            &app,
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "status": "done" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{updated}");
        assert!(updated["completed_at"].is_i64());
    }

    let (_, completed) = send(
        &app,
        Method::GET,
        "/api/dashboard/activities?activity_type=task_completed",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(completed.as_array().expect("activity list").len(), 1);
}

#[tokio::test]
async fn goal_progress_updates_the_goal() {
    let app = app();
    let token = register(&app, "heidi").await;
    let target = today() + chrono::Duration::days(30);

    let (status, goal) = send(
        &app,
        Method::POST,
        "/api/goals/goals",
        Some(&token),
        Some(json!({
            "title": "Read books",
            "goal_type": "numeric",
            "target_value": "10",
            "target_date": target.to_string(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{goal}");
    let uri = format!(
        "/api/goals/goals/{}/update_progress",
        goal["id"].as_str().expect("goal id")
    );

    let (status, outcome) = send(&app, Method::POST, &uri, Some(&token), Some(json!({ "value": "4" }))).await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert_eq!(outcome["goal"]["progress_percentage"], 40.0);
}

#[tokio::test]
async fn file_database_survives_a_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("lifeorg.sqlite3");

    let first = build_router(AppState::new(lifeorg_core::open_db(&path).expect("open db"), 30));
    let token = register(&first, "ivan").await;
    drop(first);

    let second = build_router(AppState::new(lifeorg_core::open_db(&path).expect("reopen db"), 30));
    let (status, me) = send(&second, Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ivan");
}

#[tokio::test]
async fn out_of_range_dates_are_rejected_without_breaking_the_server() {
    let app = app();
    let token = register(&app, "judy").await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/goals/progress/recent?days=4294967295",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["field"], "days");

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/goals/journal/mood_trends?days=4294967295",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/expenses/transactions/summary?start_date=2024-01-01&end_date=%2B262143-12-31",
        Some(&token),
        None,
    )
    .await;
    assert!(
        status == StatusCode::OK || status == StatusCode::BAD_REQUEST,
        "{status} {body}"
    );

    let (status, goals) = send(&app, Method::GET, "/api/goals/goals", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{goals}");
    let (status, session) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({ "username": "judy", "password": "correct-horse-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{session}");
}
