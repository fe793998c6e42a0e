use lifeorg_core::db::open_db_in_memory;
use lifeorg_core::model::user::{Theme, WorkspaceType};
use lifeorg_core::repo::user_repo::SqliteUserRepository;
use lifeorg_core::service::user_service::{
    AuthSession, ProfilePatch, Registration, UserPatch, WorkspaceInput,
};
use lifeorg_core::{ServiceError, UserService};
use rusqlite::Connection;

const NOW: i64 = 1_717_200_000_000;
const DAY_MS: i64 = 24 * 3_600_000;

fn register(service: &UserService<SqliteUserRepository<'_>>, username: &str) -> AuthSession {
    service
        .register(
            Registration {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: "s3cret-pass".to_string(),
                password_confirm: Some("s3cret-pass".to_string()),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
            },
            NOW,
        )
        .unwrap()
}

fn service(conn: &Connection) -> UserService<SqliteUserRepository<'_>> {
    UserService::new(SqliteUserRepository::new(conn))
}

#[test]
fn register_creates_personal_workspace_and_token() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);

    let session = register(&users, "ada");
    assert!(!session.token.is_empty());
    assert_eq!(session.expires_at, NOW + 30 * DAY_MS);
    assert_eq!(users.authenticate(&session.token, NOW).unwrap(), session.user.id);

    let workspaces = users.list_workspaces(session.user.id).unwrap();
    assert_eq!(workspaces.len(), 1);
    assert_eq!(workspaces[0].workspace_type, WorkspaceType::Personal);
    assert_eq!(workspaces[0].members, vec![session.user.id]);
}

#[test]
fn register_rejects_duplicate_username_and_mismatched_confirmation() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    register(&users, "ada");

    let duplicate = users.register(
        Registration {
            username: "ada".to_string(),
            password: "another-pass".to_string(),
            ..Registration::default()
        },
        NOW,
    );
    assert!(matches!(duplicate, Err(ServiceError::Validation(err)) if err.field == "username"));

    let mismatch = users.register(
        Registration {
            username: "grace".to_string(),
            password: "another-pass".to_string(),
            password_confirm: Some("other-pass".to_string()),
            ..Registration::default()
        },
        NOW,
    );
    assert!(matches!(mismatch, Err(ServiceError::Validation(err)) if err.field == "password_confirm"));

    let short = users.register(
        Registration {
            username: "grace".to_string(),
            password: "short".to_string(),
            ..Registration::default()
        },
        NOW,
    );
    assert!(matches!(short, Err(ServiceError::Validation(err)) if err.field == "password"));
}

#[test]
fn login_checks_password_and_tokens_expire() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    let session = register(&users, "ada");

    let wrong = users.login("ada", "wrong-password", NOW);
    assert!(matches!(wrong, Err(ServiceError::Unauthorized(_))));

    let second = users.login("ada", "s3cret-pass", NOW + 1).unwrap();
    assert_ne!(second.token, session.token);

    let expired = users.authenticate(&second.token, second.expires_at + 1);
    assert!(matches!(expired, Err(ServiceError::Unauthorized(_))));

    users.logout(&session.token).unwrap();
    assert!(matches!(
        users.authenticate(&session.token, NOW),
        Err(ServiceError::Unauthorized(_))
    ));
}

#[test]
fn change_password_revokes_other_sessions() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    let first = register(&users, "ada");
    let second = users.login("ada", "s3cret-pass", NOW).unwrap();

    let bad = users.change_password(first.user.id, "nope-nope", "n3w-password", &first.token);
    assert!(matches!(bad, Err(ServiceError::Validation(err)) if err.field == "old_password"));

    users
        .change_password(first.user.id, "s3cret-pass", "n3w-password", &first.token)
        .unwrap();
    assert!(users.authenticate(&first.token, NOW).is_ok());
    assert!(users.authenticate(&second.token, NOW).is_err());
    assert!(users.login("ada", "n3w-password", NOW).is_ok());
}

#[test]
fn profile_and_account_updates_persist() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    let session = register(&users, "ada");

    let user = users
        .update_me(
            session.user.id,
            UserPatch {
                first_name: Some("  Augusta ".to_string()),
                ..UserPatch::default()
            },
        )
        .unwrap();
    assert_eq!(user.first_name, "Augusta");

    let profile = users
        .update_profile(
            session.user.id,
            ProfilePatch {
                theme_preference: Some(Theme::Dark),
                phone_number: Some(Some("555-0100".to_string())),
                ..ProfilePatch::default()
            },
        )
        .unwrap();
    assert_eq!(profile.theme_preference, Theme::Dark);
    assert_eq!(profile.phone_number.as_deref(), Some("555-0100"));

    let cleared = users
        .update_profile(
            session.user.id,
            ProfilePatch {
                phone_number: Some(None),
                ..ProfilePatch::default()
            },
        )
        .unwrap();
    assert_eq!(cleared.phone_number, None);
    assert_eq!(cleared.theme_preference, Theme::Dark);
}

#[test]
fn workspace_membership_controls_visibility_and_ownership() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    let owner = register(&users, "ada").user.id;
    let member = register(&users, "grace").user.id;
    let outsider = register(&users, "linus").user.id;

    let team = users
        .create_workspace(
            owner,
            WorkspaceInput {
                name: "Household".to_string(),
                description: String::new(),
                workspace_type: WorkspaceType::Team,
            },
        )
        .unwrap();
    users.add_member(owner, team.id, "grace").unwrap();

    assert_eq!(users.get_workspace(member, team.id).unwrap().name, "Household");
    assert!(matches!(
        users.get_workspace(outsider, team.id),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        users.delete_workspace(member, team.id),
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        users.remove_member(owner, team.id, "ada"),
        Err(ServiceError::Invalid(_))
    ));

    let after = users.remove_member(owner, team.id, "grace").unwrap();
    assert_eq!(after.members, vec![owner]);
    assert!(matches!(
        users.get_workspace(member, team.id),
        Err(ServiceError::NotFound(_))
    ));
}
