//! Accounts, sessions, profiles and workspaces.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use lifeorg_core::analytics::period::now_ms;
use lifeorg_core::model::dashboard::ActivityType;
use lifeorg_core::model::user::{User, UserProfile, Workspace};
use lifeorg_core::service::user_service::{
    AuthSession, ProfilePatch, Registration, UserPatch, WorkspaceInput, WorkspacePatch,
};
use lifeorg_core::RecordId;
use log::info;
use serde::Deserialize;

use super::{created, message};
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, AuthUser, ClientMeta};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me).patch(update_me))
        .route("/change-password", post(change_password))
        .route("/profiles/me", get(profile).patch(update_profile))
        .route("/workspaces", get(list_workspaces).post(create_workspace))
        .route(
            "/workspaces/{id}",
            get(get_workspace).patch(update_workspace).delete(delete_workspace),
        )
        .route("/workspaces/{id}/add_member", post(add_member))
        .route("/workspaces/{id}/remove_member", post(remove_member))
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct PasswordChange {
    old_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct MemberRequest {
    username: String,
}

async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<Registration>,
) -> ApiResult<Response> {
    let session = state
        .run(move |db| Ok(db.users().register(input, now_ms())?))
        .await?;
    Ok(created(session))
}

async fn login(
    State(state): State<AppState>,
    client: ClientMeta,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<Json<AuthSession>> {
    let session = state
        .run(move |db| {
            let session = db
                .users()
                .login(&credentials.username, &credentials.password, now_ms())?;
            db.dashboard().record_activity(
                session.user.id,
                ActivityType::Login,
                "User logged in",
                client.context(None),
            )?;
            Ok(session)
        })
        .await?;
    Ok(Json(session))
}

async fn logout(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<serde_json::Value>> {
    state.run(move |db| Ok(db.users().logout(&auth.token)?)).await?;
    Ok(message("Logout successful"))
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<User>> {
    let user = state.run(move |db| Ok(db.users().me(auth.user_id)?)).await?;
    Ok(Json(user))
}

async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(patch): ApiJson<UserPatch>,
) -> ApiResult<Json<User>> {
    let user = state
        .run(move |db| Ok(db.users().update_me(auth.user_id, patch)?))
        .await?;
    Ok(Json(user))
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(change): ApiJson<PasswordChange>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .run(move |db| {
            Ok(db.users().change_password(
                auth.user_id,
                &change.old_password,
                &change.new_password,
                &auth.token,
            )?)
        })
        .await?;
    info!("event=password_change module=http status=ok");
    Ok(message("Password changed successfully"))
}

async fn profile(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<UserProfile>> {
    let profile = state.run(move |db| Ok(db.users().profile(auth.user_id)?)).await?;
    Ok(Json(profile))
}

async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> ApiResult<Json<UserProfile>> {
    let profile = state
        .run(move |db| Ok(db.users().update_profile(auth.user_id, patch)?))
        .await?;
    Ok(Json(profile))
}

async fn list_workspaces(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<Workspace>>> {
    let workspaces = state
        .run(move |db| Ok(db.users().list_workspaces(auth.user_id)?))
        .await?;
    Ok(Json(workspaces))
}

async fn create_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<WorkspaceInput>,
) -> ApiResult<Response> {
    let workspace = state
        .run(move |db| Ok(db.users().create_workspace(auth.user_id, input)?))
        .await?;
    Ok(created(workspace))
}

async fn get_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .run(move |db| Ok(db.users().get_workspace(auth.user_id, id)?))
        .await?;
    Ok(Json(workspace))
}

async fn update_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(patch): ApiJson<WorkspacePatch>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .run(move |db| Ok(db.users().update_workspace(auth.user_id, id, patch)?))
        .await?;
    Ok(Json(workspace))
}

async fn delete_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |db| Ok(db.users().delete_workspace(auth.user_id, id)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(request): ApiJson<MemberRequest>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .run(move |db| Ok(db.users().add_member(auth.user_id, id, &request.username)?))
        .await?;
    Ok(Json(workspace))
}

async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(request): ApiJson<MemberRequest>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .run(move |db| Ok(db.users().remove_member(auth.user_id, id, &request.username)?))
        .await?;
    Ok(Json(workspace))
}
