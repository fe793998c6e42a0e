//! Account, profile and workspace models.
//!
//! # Invariants
//! - `username` matches `[A-Za-z0-9_.@+-]{1,150}` and is unique ignoring case.
//! - A workspace owner is always listed among its members.

use super::{limit_text, require_text, RecordId, UserId, ValidationError, ValidationResult};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.@+-]{1,150}$").expect("valid username regex"));

/// Minimum accepted password length.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Public account record; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub date_joined: i64,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            date_joined: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        limit_text("first_name", &self.first_name, 150)?;
        limit_text("last_name", &self.last_name, 150)
    }

    /// `first last`, trimmed; falls back to the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

pub fn validate_username(username: &str) -> ValidationResult {
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new(
            "username",
            "150 characters or fewer; letters, digits and @/./+/-/_ only",
        ));
    }
    Ok(())
}

/// Empty email is allowed; otherwise it needs one `@` with text on both sides.
pub fn validate_email(email: &str) -> ValidationResult {
    if email.is_empty() {
        return Ok(());
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.contains('@')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("email", "enter a valid email address"));
    }
    limit_text("email", email, 254)
}

pub fn validate_password(password: &str) -> ValidationResult {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::new(
            "password",
            format!("password must contain at least {MIN_PASSWORD_CHARS} characters"),
        ));
    }
    Ok(())
}

db_enum! {
    pub enum Theme {
        Light => "light",
        Dark => "dark",
    }
}

db_enum! {
    /// Workspace kind pre-selected for new items.
    pub enum DefaultWorkspace {
        Personal => "personal",
        Work => "work",
        Team => "team",
    }
}

/// Per-user preferences, created together with the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub theme_preference: Theme,
    pub currency: String,
    pub timezone: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub weekly_recap_email: bool,
    pub default_workspace: DefaultWorkspace,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            phone_number: None,
            date_of_birth: None,
            theme_preference: Theme::Light,
            currency: "USD".to_string(),
            timezone: "UTC".to_string(),
            email_notifications: true,
            push_notifications: true,
            weekly_recap_email: true,
            default_workspace: DefaultWorkspace::Personal,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        if let Some(phone) = &self.phone_number {
            limit_text("phone_number", phone, 20)?;
        }
        let currency_ok =
            self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase());
        if !currency_ok {
            return Err(ValidationError::new(
                "currency",
                "currency must be a 3-letter upper-case code",
            ));
        }
        require_text("timezone", &self.timezone, 50)
    }
}

db_enum! {
    pub enum WorkspaceType {
        Personal => "personal",
        Work => "work",
        Team => "team",
        Family => "family",
    }
}

/// Shared container for projects and tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub owner_id: UserId,
    /// Member ids including the owner, ordered by join time.
    pub members: Vec<UserId>,
    pub workspace_type: WorkspaceType,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Workspace {
    pub fn new(owner_id: UserId, name: impl Into<String>, workspace_type: WorkspaceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            owner_id,
            members: vec![owner_id],
            workspace_type,
            is_active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("name", &self.name, 100)
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    pub fn has_member(&self, user_id: UserId) -> bool {
        self.is_owner(user_id) || self.members.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_email, validate_password, validate_username, User, UserProfile};
    use uuid::Uuid;

    #[test]
    fn username_rules() {
        assert!(validate_username("jane.doe+1@home").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("").is_ok());
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("missing-at.example.com").is_err());
        assert!(validate_email("a@nodot").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn password_needs_eight_chars() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = User::new("jdoe", "");
        assert_eq!(user.display_name(), "jdoe");
        user.first_name = "Jane".to_string();
        assert_eq!(user.display_name(), "Jane");
    }

    #[test]
    fn profile_defaults_validate() {
        let mut profile = UserProfile::new(Uuid::new_v4());
        assert!(profile.validate().is_ok());
        profile.currency = "usd".to_string();
        assert_eq!(profile.validate().unwrap_err().field, "currency");
    }
}
