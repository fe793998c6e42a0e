//! Shared request state and service wiring.
//!
//! # Responsibility
//! - Own the single SQLite connection and run database work off the
//!   async executor.
//! - Build the core services over a borrowed connection.
//!
//! # Invariants
//! - The connection is only touched while its mutex is held, inside
//!   `spawn_blocking`.
//! - A panic inside request work never locks out later requests; the
//!   poisoned guard is reclaimed because any open transaction was rolled
//!   back when it unwound.

use std::sync::{Arc, Mutex, PoisonError};

use lifeorg_core::repo::category_repo::SqliteCategoryRepository;
use lifeorg_core::repo::dashboard_repo::SqliteDashboardRepository;
use lifeorg_core::repo::expense_repo::SqliteExpenseRepository;
use lifeorg_core::repo::goal_repo::SqliteGoalRepository;
use lifeorg_core::repo::task_repo::SqliteTaskRepository;
use lifeorg_core::repo::user_repo::SqliteUserRepository;
use lifeorg_core::{DashboardService, ExpenseService, GoalService, TaskService, UserService};
use rusqlite::Connection;

use log::warn;

use crate::error::{ApiError, ApiResult};

pub type Users<'conn> = UserService<SqliteUserRepository<'conn>>;
pub type Expenses<'conn> =
    ExpenseService<SqliteExpenseRepository<'conn>, SqliteCategoryRepository<'conn>>;
pub type Tasks<'conn> = TaskService<SqliteTaskRepository<'conn>, SqliteUserRepository<'conn>>;
pub type Goals<'conn> = GoalService<SqliteGoalRepository<'conn>, SqliteCategoryRepository<'conn>>;
pub type Dashboard<'conn> = DashboardService<
    SqliteDashboardRepository<'conn>,
    SqliteExpenseRepository<'conn>,
    SqliteCategoryRepository<'conn>,
    SqliteTaskRepository<'conn>,
    SqliteGoalRepository<'conn>,
>;

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    token_ttl_days: u32,
}

impl AppState {
    pub fn new(conn: Connection, token_ttl_days: u32) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            token_ttl_days,
        }
    }

    /// Runs `work` against the connection on tokio's blocking pool.
    pub async fn run<T, F>(&self, work: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Db<'_>) -> ApiResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let token_ttl_days = self.token_ttl_days;
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().unwrap_or_else(|poisoned| {
                warn!("event=db_lock module=http status=recovered reason=poisoned");
                db.clear_poison();
                PoisonError::into_inner(poisoned)
            });
            work(&Db {
                conn: &*conn,
                token_ttl_days,
            })
        })
        .await
        .map_err(|err| ApiError::Internal(format!("blocking task failed: {err}")))?
    }
}

/// Borrowed connection handed to request work; builds services on demand.
pub struct Db<'conn> {
    conn: &'conn Connection,
    token_ttl_days: u32,
}

impl<'conn> Db<'conn> {
    pub fn users(&self) -> Users<'conn> {
        UserService::with_token_ttl_days(SqliteUserRepository::new(self.conn), self.token_ttl_days)
    }

    pub fn expenses(&self) -> Expenses<'conn> {
        ExpenseService::new(
            SqliteExpenseRepository::new(self.conn),
            SqliteCategoryRepository::new(self.conn),
        )
    }

    pub fn tasks(&self) -> Tasks<'conn> {
        TaskService::new(SqliteTaskRepository::new(self.conn), SqliteUserRepository::new(self.conn))
    }

    pub fn goals(&self) -> Goals<'conn> {
        GoalService::new(SqliteGoalRepository::new(self.conn), SqliteCategoryRepository::new(self.conn))
    }

    pub fn dashboard(&self) -> Dashboard<'conn> {
        DashboardService::new(
            SqliteDashboardRepository::new(self.conn),
            SqliteExpenseRepository::new(self.conn),
            SqliteCategoryRepository::new(self.conn),
            SqliteTaskRepository::new(self.conn),
            SqliteGoalRepository::new(self.conn),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::AppState;
    use crate::error::{ApiError, ApiResult};

    #[tokio::test]
    async fn panicking_work_does_not_lock_out_later_requests() {
        let state = AppState::new(lifeorg_core::open_db_in_memory().unwrap(), 30);

        let failed = state
            .run(|_| -> ApiResult<()> { panic!("request handler bug") })
            .await;
        assert!(matches!(failed, Err(ApiError::Internal(_))));

        for _ in 0..2 {
            let autocommit = state.run(|db| Ok(db.conn.is_autocommit())).await.unwrap();
            assert!(autocommit);
        }
    }
}
