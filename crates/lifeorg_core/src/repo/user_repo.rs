//! Account, session token, profile and workspace persistence.
//!
//! # Responsibility
//! - Store accounts with their password hash and issue/revoke session tokens.
//! - Store profiles and workspaces with their member lists.
//!
//! # Invariants
//! - Account creation writes user, profile and personal workspace atomically.
//! - The workspace owner is always present in `workspace_members`.
//! - Password hashes never leave this module except through `UserCredentials`.

use super::{
    bool_col, bool_to_int, date_text, enum_col, id_text, opt_date_col, uuid_col, RepoError,
    RepoResult,
};
use crate::db::in_transaction;
use crate::model::user::{
    DefaultWorkspace, Theme, User, UserProfile, Workspace, WorkspaceType,
};
use crate::model::{RecordId, UserId};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};

const USER_SELECT_SQL: &str = "SELECT
    id, username, email, first_name, last_name, is_active, date_joined
 FROM users";

const PROFILE_SELECT_SQL: &str = "SELECT
    user_id, phone_number, date_of_birth, theme_preference, currency, timezone,
    email_notifications, push_notifications, weekly_recap_email, default_workspace,
    created_at, updated_at
 FROM user_profiles";

const WORKSPACE_SELECT_SQL: &str = "SELECT
    w.id, w.name, w.description, w.owner_id, w.workspace_type, w.is_active,
    w.created_at, w.updated_at
 FROM workspaces w";

const WORKSPACE_VISIBLE_SQL: &str = "(w.owner_id = ?1 OR EXISTS (
    SELECT 1 FROM workspace_members wm WHERE wm.workspace_id = w.id AND wm.user_id = ?1
 ))";

/// Account row plus its stored password hash, used only for verification.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Repository interface for accounts, sessions, profiles and workspaces.
pub trait UserRepository {
    /// Creates the account, its profile and its first workspace in one transaction.
    fn create_account(
        &self,
        user: &User,
        password_hash: &str,
        profile: &UserProfile,
        workspace: &Workspace,
    ) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Case-insensitive username lookup.
    fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    fn get_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>>;
    fn get_password_hash(&self, id: UserId) -> RepoResult<Option<String>>;
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()>;

    fn create_token(&self, token: &str, user_id: UserId, expires_at: i64) -> RepoResult<()>;
    /// Returns the owner of a token that has not expired at `now_ms`.
    fn find_token_user(&self, token: &str, now_ms: i64) -> RepoResult<Option<UserId>>;
    /// Returns whether a token was removed.
    fn delete_token(&self, token: &str) -> RepoResult<bool>;
    /// Revokes every token of the user except `keep`.
    fn delete_other_tokens(&self, user_id: UserId, keep: &str) -> RepoResult<usize>;
    /// Drops tokens that expired before `now_ms`.
    fn purge_expired_tokens(&self, now_ms: i64) -> RepoResult<usize>;

    fn get_profile(&self, user_id: UserId) -> RepoResult<Option<UserProfile>>;
    fn save_profile(&self, profile: &UserProfile) -> RepoResult<()>;

    fn create_workspace(&self, workspace: &Workspace) -> RepoResult<()>;
    fn update_workspace(&self, workspace: &Workspace) -> RepoResult<()>;
    /// Gets a workspace the viewer owns or belongs to.
    fn get_visible_workspace(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<Workspace>>;
    fn list_workspaces(&self, viewer: UserId) -> RepoResult<Vec<Workspace>>;
    fn delete_workspace(&self, id: RecordId) -> RepoResult<()>;
    /// Returns whether the user was newly added.
    fn add_member(&self, workspace_id: RecordId, user_id: UserId) -> RepoResult<bool>;
    /// Returns whether the user was a member.
    fn remove_member(&self, workspace_id: RecordId, user_id: UserId) -> RepoResult<bool>;
    /// Oldest active personal workspace owned by the user, else the oldest owned one.
    fn default_workspace_id(&self, user_id: UserId) -> RepoResult<Option<RecordId>>;
}

/// SQLite-backed account repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_members(&self, workspace: &mut Workspace) -> RepoResult<()> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM workspace_members
             WHERE workspace_id = ?1
             ORDER BY joined_at ASC, user_id ASC;",
        )?;
        let mut rows = stmt.query([id_text(workspace.id)])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(uuid_col(row, "user_id")?);
        }
        workspace.members = members;
        Ok(())
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_account(
        &self,
        user: &User,
        password_hash: &str,
        profile: &UserProfile,
        workspace: &Workspace,
    ) -> RepoResult<()> {
        user.validate()?;
        profile.validate()?;
        workspace.validate()?;

        in_transaction(self.conn, |conn| -> RepoResult<()> {
            conn.execute(
                "INSERT INTO users (id, username, email, first_name, last_name, password_hash, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    id_text(user.id),
                    user.username,
                    user.email,
                    user.first_name,
                    user.last_name,
                    password_hash,
                    bool_to_int(user.is_active),
                ],
            )?;
            insert_profile(conn, profile)?;
            insert_workspace(conn, workspace)?;
            Ok(())
        })
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id_text(id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE username = ?1 COLLATE NOCASE;"))?;
        let mut rows = stmt.query([username])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, email, first_name, last_name, is_active, date_joined, password_hash
             FROM users WHERE username = ?1 COLLATE NOCASE;",
        )?;
        let mut rows = stmt.query([username])?;
        match rows.next()? {
            Some(row) => Ok(Some(UserCredentials {
                user: parse_user_row(row)?,
                password_hash: row.get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    fn get_password_hash(&self, id: UserId) -> RepoResult<Option<String>> {
        let hash = self
            .conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?1;",
                [id_text(id)],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(hash)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;
        let changed = self.conn.execute(
            "UPDATE users
             SET username = ?2, email = ?3, first_name = ?4, last_name = ?5, is_active = ?6
             WHERE id = ?1;",
            params![
                id_text(user.id),
                user.username,
                user.email,
                user.first_name,
                user.last_name,
                bool_to_int(user.is_active),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("user", user.id));
        }
        Ok(())
    }

    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET password_hash = ?2 WHERE id = ?1;",
            params![id_text(id), password_hash],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }

    fn create_token(&self, token: &str, user_id: UserId, expires_at: i64) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO auth_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3);",
            params![token, id_text(user_id), expires_at],
        )?;
        Ok(())
    }

    fn find_token_user(&self, token: &str, now_ms: i64) -> RepoResult<Option<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.user_id
             FROM auth_tokens t
             JOIN users u ON u.id = t.user_id
             WHERE t.token = ?1 AND t.expires_at > ?2 AND u.is_active = 1;",
        )?;
        let mut rows = stmt.query(params![token, now_ms])?;
        match rows.next()? {
            Some(row) => Ok(Some(uuid_col(row, "user_id")?)),
            None => Ok(None),
        }
    }

    fn delete_token(&self, token: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM auth_tokens WHERE token = ?1;", [token])?;
        Ok(changed > 0)
    }

    fn delete_other_tokens(&self, user_id: UserId, keep: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM auth_tokens WHERE user_id = ?1 AND token <> ?2;",
            params![id_text(user_id), keep],
        )?;
        Ok(changed)
    }

    fn purge_expired_tokens(&self, now_ms: i64) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM auth_tokens WHERE expires_at <= ?1;", [now_ms])?;
        Ok(changed)
    }

    fn get_profile(&self, user_id: UserId) -> RepoResult<Option<UserProfile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROFILE_SELECT_SQL} WHERE user_id = ?1;"))?;
        let mut rows = stmt.query([id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_profile_row(row)?)),
            None => Ok(None),
        }
    }

    fn save_profile(&self, profile: &UserProfile) -> RepoResult<()> {
        profile.validate()?;
        self.conn.execute(
            "INSERT INTO user_profiles (
                user_id, phone_number, date_of_birth, theme_preference, currency, timezone,
                email_notifications, push_notifications, weekly_recap_email, default_workspace
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(user_id) DO UPDATE SET
                phone_number = excluded.phone_number,
                date_of_birth = excluded.date_of_birth,
                theme_preference = excluded.theme_preference,
                currency = excluded.currency,
                timezone = excluded.timezone,
                email_notifications = excluded.email_notifications,
                push_notifications = excluded.push_notifications,
                weekly_recap_email = excluded.weekly_recap_email,
                default_workspace = excluded.default_workspace,
                updated_at = (strftime('%s', 'now') * 1000);",
            params_from_iter(profile_params(profile)),
        )?;
        Ok(())
    }

    fn create_workspace(&self, workspace: &Workspace) -> RepoResult<()> {
        workspace.validate()?;
        in_transaction(self.conn, |conn| insert_workspace(conn, workspace))
    }

    fn update_workspace(&self, workspace: &Workspace) -> RepoResult<()> {
        workspace.validate()?;
        let changed = self.conn.execute(
            "UPDATE workspaces
             SET name = ?2, description = ?3, workspace_type = ?4, is_active = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id_text(workspace.id),
                workspace.name,
                workspace.description,
                workspace.workspace_type.as_str(),
                bool_to_int(workspace.is_active),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("workspace", workspace.id));
        }
        Ok(())
    }

    fn get_visible_workspace(&self, viewer: UserId, id: RecordId) -> RepoResult<Option<Workspace>> {
        let mut stmt = self.conn.prepare(&format!(
            "{WORKSPACE_SELECT_SQL} WHERE {WORKSPACE_VISIBLE_SQL} AND w.id = ?2;"
        ))?;
        let mut rows = stmt.query([id_text(viewer), id_text(id)])?;
        let mut workspace = match rows.next()? {
            Some(row) => parse_workspace_row(row)?,
            None => return Ok(None),
        };
        drop(rows);
        self.load_members(&mut workspace)?;
        Ok(Some(workspace))
    }

    fn list_workspaces(&self, viewer: UserId) -> RepoResult<Vec<Workspace>> {
        let mut stmt = self.conn.prepare(&format!(
            "{WORKSPACE_SELECT_SQL} WHERE {WORKSPACE_VISIBLE_SQL}
             ORDER BY w.created_at DESC, w.id ASC;"
        ))?;
        let mut rows = stmt.query([id_text(viewer)])?;
        let mut workspaces = Vec::new();
        while let Some(row) = rows.next()? {
            workspaces.push(parse_workspace_row(row)?);
        }
        drop(rows);
        for workspace in &mut workspaces {
            self.load_members(workspace)?;
        }
        Ok(workspaces)
    }

    fn delete_workspace(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM workspaces WHERE id = ?1;", [id_text(id)])?;
        if changed == 0 {
            return Err(RepoError::not_found("workspace", id));
        }
        Ok(())
    }

    fn add_member(&self, workspace_id: RecordId, user_id: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO workspace_members (workspace_id, user_id) VALUES (?1, ?2);",
            params![id_text(workspace_id), id_text(user_id)],
        )?;
        Ok(changed > 0)
    }

    fn remove_member(&self, workspace_id: RecordId, user_id: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM workspace_members WHERE workspace_id = ?1 AND user_id = ?2;",
            params![id_text(workspace_id), id_text(user_id)],
        )?;
        Ok(changed > 0)
    }

    fn default_workspace_id(&self, user_id: UserId) -> RepoResult<Option<RecordId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM workspaces
             WHERE owner_id = ?1
             ORDER BY
                CASE WHEN workspace_type = 'personal' AND is_active = 1 THEN 0 ELSE 1 END,
                created_at ASC,
                id ASC
             LIMIT 1;",
        )?;
        let mut rows = stmt.query([id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(uuid_col(row, "id")?)),
            None => Ok(None),
        }
    }
}

fn insert_profile(conn: &Connection, profile: &UserProfile) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO user_profiles (
            user_id, phone_number, date_of_birth, theme_preference, currency, timezone,
            email_notifications, push_notifications, weekly_recap_email, default_workspace
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
        params_from_iter(profile_params(profile)),
    )?;
    Ok(())
}

fn profile_params(profile: &UserProfile) -> Vec<Box<dyn ToSql>> {
    vec![
        Box::new(id_text(profile.user_id)),
        Box::new(profile.phone_number.clone()),
        Box::new(profile.date_of_birth.map(date_text)),
        Box::new(profile.theme_preference.as_str()),
        Box::new(profile.currency.clone()),
        Box::new(profile.timezone.clone()),
        Box::new(bool_to_int(profile.email_notifications)),
        Box::new(bool_to_int(profile.push_notifications)),
        Box::new(bool_to_int(profile.weekly_recap_email)),
        Box::new(profile.default_workspace.as_str()),
    ]
}

fn insert_workspace(conn: &Connection, workspace: &Workspace) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO workspaces (id, name, description, owner_id, workspace_type, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            id_text(workspace.id),
            workspace.name,
            workspace.description,
            id_text(workspace.owner_id),
            workspace.workspace_type.as_str(),
            bool_to_int(workspace.is_active),
        ],
    )?;
    let mut members = workspace.members.clone();
    if !members.contains(&workspace.owner_id) {
        members.insert(0, workspace.owner_id);
    }
    for member in members {
        conn.execute(
            "INSERT OR IGNORE INTO workspace_members (workspace_id, user_id) VALUES (?1, ?2);",
            params![id_text(workspace.id), id_text(member)],
        )?;
    }
    Ok(())
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        id: uuid_col(row, "id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        is_active: bool_col(row, "is_active")?,
        date_joined: row.get("date_joined")?,
    })
}

fn parse_profile_row(row: &Row<'_>) -> RepoResult<UserProfile> {
    Ok(UserProfile {
        user_id: uuid_col(row, "user_id")?,
        phone_number: row.get("phone_number")?,
        date_of_birth: opt_date_col(row, "date_of_birth")?,
        theme_preference: enum_col(row, "theme_preference", Theme::parse)?,
        currency: row.get("currency")?,
        timezone: row.get("timezone")?,
        email_notifications: bool_col(row, "email_notifications")?,
        push_notifications: bool_col(row, "push_notifications")?,
        weekly_recap_email: bool_col(row, "weekly_recap_email")?,
        default_workspace: enum_col(row, "default_workspace", DefaultWorkspace::parse)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_workspace_row(row: &Row<'_>) -> RepoResult<Workspace> {
    Ok(Workspace {
        id: uuid_col(row, "id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        owner_id: uuid_col(row, "owner_id")?,
        members: Vec::new(),
        workspace_type: enum_col(row, "workspace_type", WorkspaceType::parse)?,
        is_active: bool_col(row, "is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
