//! Account, session, profile and workspace use cases.
//!
//! # Responsibility
//! - Register accounts, verify passwords and issue opaque bearer tokens.
//! - Apply partial updates to the current user and profile.
//! - Enforce workspace ownership rules for updates and membership changes.
//!
//! # Invariants
//! - Passwords are stored only as Argon2id PHC strings.
//! - Tokens expire `token_ttl_ms` after issue and are checked on every use.
//! - Only the owner may update, delete or change members of a workspace,
//!   and the owner can never be removed from it.

use super::{found, ServiceError, ServiceResult};
use crate::model::user::{
    validate_password, DefaultWorkspace, Theme, User, UserProfile, Workspace, WorkspaceType,
};
use crate::model::{double_option, RecordId, UserId};
use crate::repo::user_repo::UserRepository;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Default bearer token lifetime.
pub const DEFAULT_TOKEN_TTL_DAYS: u32 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Optional repeat of `password`; must match when present.
    pub password_confirm: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

/// Issued session returned by register and login.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: i64,
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfilePatch {
    #[serde(deserialize_with = "double_option")]
    pub phone_number: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub theme_preference: Option<Theme>,
    pub currency: Option<String>,
    pub timezone: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub weekly_recap_email: Option<bool>,
    pub default_workspace: Option<DefaultWorkspace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_workspace_type")]
    pub workspace_type: WorkspaceType,
}

fn default_workspace_type() -> WorkspaceType {
    WorkspaceType::Personal
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkspacePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub workspace_type: Option<WorkspaceType>,
    pub is_active: Option<bool>,
}

/// Account use-case facade.
pub struct UserService<R: UserRepository> {
    repo: R,
    token_ttl_ms: i64,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self::with_token_ttl_days(repo, DEFAULT_TOKEN_TTL_DAYS)
    }

    pub fn with_token_ttl_days(repo: R, days: u32) -> Self {
        Self {
            repo,
            token_ttl_ms: i64::from(days.max(1)) * DAY_MS,
        }
    }

    /// Creates the account with its profile and personal workspace, then
    /// signs it in.
    pub fn register(&self, input: Registration, now_ms: i64) -> ServiceResult<AuthSession> {
        validate_password(&input.password)?;
        if input
            .password_confirm
            .as_deref()
            .is_some_and(|confirm| confirm != input.password)
        {
            return Err(ServiceError::validation(
                "password_confirm",
                "password fields didn't match",
            ));
        }

        let mut user = User::new(input.username.trim(), input.email.trim());
        user.first_name = input.first_name.trim().to_string();
        user.last_name = input.last_name.trim().to_string();
        user.validate()?;
        if self.repo.find_user_by_username(&user.username)?.is_some() {
            return Err(ServiceError::validation(
                "username",
                "a user with that username already exists",
            ));
        }

        let hash = hash_password(&input.password)?;
        let profile = UserProfile::new(user.id);
        let workspace = Workspace::new(user.id, "Personal", WorkspaceType::Personal);
        self.repo
            .create_account(&user, &hash, &profile, &workspace)
            .map_err(|err| match ServiceError::from(err) {
                ServiceError::Conflict(_) => ServiceError::validation(
                    "username",
                    "a user with that username already exists",
                ),
                other => other,
            })?;
        info!(
            "event=user_register module=users status=ok user_id={}",
            user.id
        );

        let stored = found(self.repo.get_user(user.id)?, "user")?;
        self.issue_token(stored, now_ms)
    }

    pub fn login(&self, username: &str, password: &str, now_ms: i64) -> ServiceResult<AuthSession> {
        let credentials = self
            .repo
            .get_credentials(username.trim())?
            .filter(|credentials| credentials.user.is_active)
            .ok_or_else(|| ServiceError::unauthorized("invalid credentials"))?;
        if !verify_password(password, &credentials.password_hash) {
            info!("event=user_login module=users status=rejected");
            return Err(ServiceError::unauthorized("invalid credentials"));
        }
        self.repo.purge_expired_tokens(now_ms)?;
        info!(
            "event=user_login module=users status=ok user_id={}",
            credentials.user.id
        );
        self.issue_token(credentials.user, now_ms)
    }

    /// Revokes one token. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) -> ServiceResult<()> {
        self.repo.delete_token(token)?;
        Ok(())
    }

    /// Resolves a bearer token to its active user.
    pub fn authenticate(&self, token: &str, now_ms: i64) -> ServiceResult<UserId> {
        if token.trim().is_empty() {
            return Err(ServiceError::unauthorized("missing token"));
        }
        self.repo
            .find_token_user(token.trim(), now_ms)?
            .ok_or_else(|| ServiceError::unauthorized("invalid or expired token"))
    }

    pub fn me(&self, user_id: UserId) -> ServiceResult<User> {
        found(self.repo.get_user(user_id)?, "user")
    }

    pub fn update_me(&self, user_id: UserId, patch: UserPatch) -> ServiceResult<User> {
        let mut user = self.me(user_id)?;
        if let Some(email) = patch.email {
            user.email = email.trim().to_string();
        }
        if let Some(first_name) = patch.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = patch.last_name {
            user.last_name = last_name.trim().to_string();
        }
        self.repo.update_user(&user)?;
        Ok(user)
    }

    /// Replaces the password and revokes every other session of the user.
    pub fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
        current_token: &str,
    ) -> ServiceResult<()> {
        let hash = found(self.repo.get_password_hash(user_id)?, "user")?;
        if !verify_password(old_password, &hash) {
            return Err(ServiceError::validation(
                "old_password",
                "old password is incorrect",
            ));
        }
        validate_password(new_password).map_err(|err| {
            ServiceError::validation("new_password", err.message)
        })?;
        self.repo
            .set_password_hash(user_id, &hash_password(new_password)?)?;
        let revoked = self.repo.delete_other_tokens(user_id, current_token)?;
        info!(
            "event=password_change module=users status=ok user_id={user_id} revoked_tokens={revoked}"
        );
        Ok(())
    }

    /// Returns the profile, creating the default one on first access.
    pub fn profile(&self, user_id: UserId) -> ServiceResult<UserProfile> {
        if let Some(profile) = self.repo.get_profile(user_id)? {
            return Ok(profile);
        }
        let profile = UserProfile::new(user_id);
        self.repo.save_profile(&profile)?;
        found(self.repo.get_profile(user_id)?, "profile")
    }

    pub fn update_profile(&self, user_id: UserId, patch: ProfilePatch) -> ServiceResult<UserProfile> {
        let mut profile = self.profile(user_id)?;
        if let Some(phone) = patch.phone_number {
            profile.phone_number = phone.map(|value| value.trim().to_string());
        }
        if let Some(date_of_birth) = patch.date_of_birth {
            profile.date_of_birth = date_of_birth;
        }
        if let Some(theme) = patch.theme_preference {
            profile.theme_preference = theme;
        }
        if let Some(currency) = patch.currency {
            profile.currency = currency.trim().to_string();
        }
        if let Some(timezone) = patch.timezone {
            profile.timezone = timezone.trim().to_string();
        }
        if let Some(value) = patch.email_notifications {
            profile.email_notifications = value;
        }
        if let Some(value) = patch.push_notifications {
            profile.push_notifications = value;
        }
        if let Some(value) = patch.weekly_recap_email {
            profile.weekly_recap_email = value;
        }
        if let Some(value) = patch.default_workspace {
            profile.default_workspace = value;
        }
        self.repo.save_profile(&profile)?;
        found(self.repo.get_profile(user_id)?, "profile")
    }

    pub fn list_workspaces(&self, viewer: UserId) -> ServiceResult<Vec<Workspace>> {
        Ok(self.repo.list_workspaces(viewer)?)
    }

    pub fn get_workspace(&self, viewer: UserId, id: RecordId) -> ServiceResult<Workspace> {
        found(self.repo.get_visible_workspace(viewer, id)?, "workspace")
    }

    pub fn create_workspace(&self, owner: UserId, input: WorkspaceInput) -> ServiceResult<Workspace> {
        let mut workspace = Workspace::new(owner, input.name.trim(), input.workspace_type);
        workspace.description = input.description;
        workspace.validate()?;
        self.repo.create_workspace(&workspace)?;
        self.get_workspace(owner, workspace.id)
    }

    pub fn update_workspace(
        &self,
        actor: UserId,
        id: RecordId,
        patch: WorkspacePatch,
    ) -> ServiceResult<Workspace> {
        let mut workspace = self.owned_workspace(actor, id, "update")?;
        if let Some(name) = patch.name {
            workspace.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            workspace.description = description;
        }
        if let Some(workspace_type) = patch.workspace_type {
            workspace.workspace_type = workspace_type;
        }
        if let Some(is_active) = patch.is_active {
            workspace.is_active = is_active;
        }
        self.repo.update_workspace(&workspace)?;
        self.get_workspace(actor, id)
    }

    pub fn delete_workspace(&self, actor: UserId, id: RecordId) -> ServiceResult<()> {
        self.owned_workspace(actor, id, "delete")?;
        self.repo.delete_workspace(id)?;
        Ok(())
    }

    pub fn add_member(&self, actor: UserId, id: RecordId, username: &str) -> ServiceResult<Workspace> {
        self.owned_workspace(actor, id, "add members to")?;
        let member = found(self.repo.find_user_by_username(username.trim())?, "user")?;
        self.repo.add_member(id, member.id)?;
        self.get_workspace(actor, id)
    }

    pub fn remove_member(
        &self,
        actor: UserId,
        id: RecordId,
        username: &str,
    ) -> ServiceResult<Workspace> {
        let workspace = self.owned_workspace(actor, id, "remove members from")?;
        let member = found(self.repo.find_user_by_username(username.trim())?, "user")?;
        if workspace.is_owner(member.id) {
            return Err(ServiceError::invalid(
                "the workspace owner cannot be removed",
            ));
        }
        self.repo.remove_member(id, member.id)?;
        self.get_workspace(actor, id)
    }

    fn owned_workspace(&self, actor: UserId, id: RecordId, action: &str) -> ServiceResult<Workspace> {
        let workspace = self.get_workspace(actor, id)?;
        if !workspace.is_owner(actor) {
            return Err(ServiceError::forbidden(format!(
                "only the workspace owner can {action} this workspace"
            )));
        }
        Ok(workspace)
    }

    fn issue_token(&self, user: User, now_ms: i64) -> ServiceResult<AuthSession> {
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = now_ms + self.token_ttl_ms;
        self.repo.create_token(&token, user.id, expires_at)?;
        Ok(AuthSession {
            token,
            expires_at,
            user,
        })
    }
}

fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ServiceError::Crypto(err.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::{hash_password, verify_password};

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn each_hash_gets_a_fresh_os_salt() {
        let first = hash_password("same secret").unwrap();
        let second = hash_password("same secret").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("same secret", &first));
        assert!(verify_password("same secret", &second));
    }
}
