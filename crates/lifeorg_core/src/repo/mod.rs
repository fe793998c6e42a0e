//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per component.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must run the record's `validate()` before persistence.
//! - Every user-owned query is scoped by the requesting user id.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

use crate::db::DbError;
use crate::model::money::{from_cents, parse_decimal, to_cents};
use crate::model::{RecordId, ValidationError};
use crate::analytics::period::EpochRange;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{ErrorCode, Row};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod category_repo;
pub mod dashboard_repo;
pub mod expense_repo;
pub mod goal_repo;
pub mod task_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-level error for all persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: RecordId },
    /// A uniqueness rule rejected the write.
    Conflict(String),
    InvalidData(String),
}

impl RepoError {
    pub fn not_found(entity: &'static str, id: RecordId) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            let unique = failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                );
            if unique {
                return Self::Conflict(
                    message
                        .clone()
                        .unwrap_or_else(|| "unique constraint failed".to_string()),
                );
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Clamps a caller-provided page size to `[1, max]`, defaulting to `default`.
pub fn normalize_limit(limit: Option<u32>, default: u32, max: u32) -> u32 {
    match limit {
        Some(0) | None => default,
        Some(value) => value.min(max),
    }
}

/// Incrementally assembled `WHERE`/`ORDER BY` query with positional binds.
pub(crate) struct SqlQuery {
    sql: String,
    values: Vec<Value>,
}

impl SqlQuery {
    pub(crate) fn new(base: &str) -> Self {
        Self {
            sql: base.to_string(),
            values: Vec::new(),
        }
    }

    /// Appends raw SQL text.
    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push(' ');
        self.sql.push_str(sql);
        self
    }

    /// Appends `sql` and binds one value for its single `?`.
    pub(crate) fn push_bind(&mut self, sql: &str, value: impl Into<Value>) -> &mut Self {
        self.push(sql);
        self.values.push(value.into());
        self
    }

    /// Binds an extra positional value without adding SQL.
    pub(crate) fn bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.values.push(value.into());
        self
    }

    /// Appends `AND column >= ? AND column < ?` for the bounded ends of `range`.
    pub(crate) fn push_range(&mut self, column: &str, range: &EpochRange) -> &mut Self {
        if let Some(start) = range.start_ms {
            self.push_bind(&format!("AND {column} >= ?"), start);
        }
        if let Some(end) = range.end_ms {
            self.push_bind(&format!("AND {column} < ?"), end);
        }
        self
    }

    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    pub(crate) fn params(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, Value>> {
        rusqlite::params_from_iter(self.values.iter())
    }
}

pub(crate) fn id_text(id: RecordId) -> String {
    id.to_string()
}

pub(crate) fn opt_id_text(id: Option<RecordId>) -> Option<String> {
    id.map(|value| value.to_string())
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

pub(crate) fn decimal_text(value: Decimal) -> String {
    value.round_dp(2).to_string()
}

pub(crate) fn opt_decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(decimal_text)
}

pub(crate) fn cents(amount: Decimal) -> RepoResult<i64> {
    to_cents(amount).ok_or_else(|| {
        RepoError::Validation(ValidationError::new("amount", "amount is out of range"))
    })
}

pub(crate) fn uuid_col(row: &Row<'_>, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{text}` in column {column}")))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, column: &str) -> RepoResult<Option<Uuid>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => Uuid::parse_str(&text).map(Some).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid `{text}` in column {column}"))
        }),
        None => Ok(None),
    }
}

pub(crate) fn bool_col(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in column {column}"
        ))),
    }
}

pub(crate) fn cents_col(row: &Row<'_>, column: &str) -> RepoResult<Decimal> {
    Ok(from_cents(row.get::<_, i64>(column)?))
}

pub(crate) fn decimal_col(row: &Row<'_>, column: &str) -> RepoResult<Decimal> {
    let text: String = row.get(column)?;
    parse_decimal(&text)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid decimal `{text}` in column {column}")))
}

pub(crate) fn opt_decimal_col(row: &Row<'_>, column: &str) -> RepoResult<Option<Decimal>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => parse_decimal(&text).map(Some).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid decimal `{text}` in column {column}"))
        }),
        None => Ok(None),
    }
}

pub(crate) fn date_col(row: &Row<'_>, column: &str) -> RepoResult<NaiveDate> {
    let text: String = row.get(column)?;
    parse_date(&text, column)
}

pub(crate) fn opt_date_col(row: &Row<'_>, column: &str) -> RepoResult<Option<NaiveDate>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| parse_date(&text, column))
        .transpose()
}

fn parse_date(text: &str, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{text}` in column {column}")))
}

pub(crate) fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn enum_col<T>(
    row: &Row<'_>,
    column: &str,
    parse: fn(&str) -> Option<T>,
) -> RepoResult<T> {
    let text: String = row.get(column)?;
    parse(&text)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid value `{text}` in column {column}")))
}

pub(crate) fn json_col(row: &Row<'_>, column: &str) -> RepoResult<serde_json::Value> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in column {column}: {err}")))
}

pub(crate) fn json_text<T: serde::Serialize>(value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("failed to encode json: {err}")))
}

pub(crate) fn count_col(row: &Row<'_>, index: usize) -> rusqlite::Result<u32> {
    let value: i64 = row.get(index)?;
    Ok(u32::try_from(value).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::{normalize_limit, RepoError};
    use rusqlite::Connection;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(normalize_limit(None, 10, 50), 10);
        assert_eq!(normalize_limit(Some(0), 10, 50), 10);
        assert_eq!(normalize_limit(Some(7), 10, 50), 7);
        assert_eq!(normalize_limit(Some(500), 10, 50), 50);
    }

    #[test]
    fn unique_violations_map_to_conflict() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: RepoError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepoError::Conflict(_)), "got {err}");
    }
}
