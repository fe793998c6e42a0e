//! Core domain logic for the life organizer.
//! This crate is the single source of truth for business invariants;
//! the HTTP transport calls into `service` and never touches SQL.

pub mod analytics;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{RecordId, UserId, ValidationError};
pub use repo::{RepoError, RepoResult};
pub use service::dashboard_service::DashboardService;
pub use service::expense_service::ExpenseService;
pub use service::goal_service::GoalService;
pub use service::task_service::TaskService;
pub use service::user_service::UserService;
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
