//! Transaction, budget and budget-alert persistence.
//!
//! # Responsibility
//! - CRUD and filtered listing for transactions, budgets and alerts.
//! - Money aggregation in SQL over integer cents.
//!
//! # Invariants
//! - Every statement is scoped by the owning `user_id`.
//! - Sums are computed over `amount_cents` so totals are exact.
//! - A transaction's category must be one of the owner's categories of the
//!   matching kind; the service checks this before calling in.

use super::{
    bool_col, bool_to_int, cents, cents_col, count_col, date_col, date_text, decimal_col,
    decimal_text, enum_col, id_text, normalize_limit, opt_id_text, opt_uuid_col, uuid_col,
    RepoError, RepoResult, SqlQuery,
};
use crate::analytics::period::EpochRange;
use crate::model::category::CategoryKind;
use crate::model::expense::{AlertType, Budget, BudgetAlert, Transaction, TransactionType};
use crate::model::money::from_cents;
use crate::model::{RecordId, UserId};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

const TRANSACTIONS_DEFAULT_LIMIT: u32 = 50;
const TRANSACTIONS_LIMIT_MAX: u32 = 500;

const TRANSACTION_SELECT_SQL: &str = "SELECT
    id, user_id, transaction_type, amount_cents, description, notes,
    expense_category_id, income_category_id, transaction_date, location, voice_input,
    created_at, updated_at
 FROM transactions";

const BUDGET_SELECT_SQL: &str = "SELECT
    id, user_id, category_id, amount_cents, month, alert_threshold, created_at, updated_at
 FROM budgets";

const ALERT_SELECT_SQL: &str = "SELECT
    id, user_id, budget_id, alert_type, message, is_read, sent_at
 FROM budget_alerts";

/// Sort orders accepted by transaction listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionOrdering {
    #[default]
    DateDesc,
    DateAsc,
    AmountDesc,
    AmountAsc,
    CreatedDesc,
    CreatedAsc,
}

impl TransactionOrdering {
    /// Parses `field` / `-field` for `transaction_date`, `amount`, `created_at`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "-transaction_date" => Some(Self::DateDesc),
            "transaction_date" => Some(Self::DateAsc),
            "-amount" => Some(Self::AmountDesc),
            "amount" => Some(Self::AmountAsc),
            "-created_at" => Some(Self::CreatedDesc),
            "created_at" => Some(Self::CreatedAsc),
            _ => None,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            Self::DateDesc => "ORDER BY transaction_date DESC, created_at DESC, id ASC",
            Self::DateAsc => "ORDER BY transaction_date ASC, created_at ASC, id ASC",
            Self::AmountDesc => "ORDER BY amount_cents DESC, transaction_date DESC, id ASC",
            Self::AmountAsc => "ORDER BY amount_cents ASC, transaction_date DESC, id ASC",
            Self::CreatedDesc => "ORDER BY created_at DESC, id ASC",
            Self::CreatedAsc => "ORDER BY created_at ASC, id ASC",
        }
    }
}

/// Filter and page options for transaction listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub transaction_type: Option<TransactionType>,
    pub expense_category_id: Option<RecordId>,
    pub income_category_id: Option<RecordId>,
    pub range: EpochRange,
    /// Case-insensitive match over description, notes and location.
    pub search: Option<String>,
    pub ordering: TransactionOrdering,
    /// Maximum rows to return. Defaults to 50 and clamps to 500.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Income/expense sums over a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionTotals {
    pub income: Decimal,
    pub expenses: Decimal,
    pub count: u32,
}

impl TransactionTotals {
    pub fn net(&self) -> Decimal {
        self.income - self.expenses
    }
}

/// Sum and count of one category's matching transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryTotal {
    pub total: Decimal,
    pub transaction_count: u32,
}

/// One slice of a per-category breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryAmount {
    pub category_id: Option<RecordId>,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub amount: Decimal,
    pub count: u32,
}

/// Filter options for alert listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertQuery {
    pub is_read: Option<bool>,
    pub alert_type: Option<AlertType>,
    pub budget_id: Option<RecordId>,
}

pub trait ExpenseRepository {
    fn create_transaction(&self, transaction: &Transaction) -> RepoResult<()>;
    fn get_transaction(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<Transaction>>;
    fn update_transaction(&self, transaction: &Transaction) -> RepoResult<()>;
    fn delete_transaction(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
    fn list_transactions(
        &self,
        user_id: UserId,
        query: &TransactionQuery,
    ) -> RepoResult<Vec<Transaction>>;
    /// Counts rows matching the query filters, ignoring paging.
    fn count_transactions(&self, user_id: UserId, query: &TransactionQuery) -> RepoResult<u32>;
    fn totals(&self, user_id: UserId, range: &EpochRange) -> RepoResult<TransactionTotals>;
    /// Matching-type totals keyed by category id for every category of `kind`.
    fn category_totals(
        &self,
        user_id: UserId,
        kind: CategoryKind,
    ) -> RepoResult<BTreeMap<RecordId, CategoryTotal>>;
    /// Expense sum for one category inside `range`.
    fn spent_in_category(
        &self,
        user_id: UserId,
        category_id: RecordId,
        range: &EpochRange,
    ) -> RepoResult<Decimal>;
    /// Per-category sums for `transaction_type`, largest first.
    fn category_breakdown(
        &self,
        user_id: UserId,
        transaction_type: TransactionType,
        range: &EpochRange,
    ) -> RepoResult<Vec<CategoryAmount>>;

    fn create_budget(&self, budget: &Budget) -> RepoResult<()>;
    fn get_budget(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<Budget>>;
    fn find_budget(
        &self,
        user_id: UserId,
        category_id: RecordId,
        month: NaiveDate,
    ) -> RepoResult<Option<Budget>>;
    fn update_budget(&self, budget: &Budget) -> RepoResult<()>;
    fn delete_budget(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
    /// Lists budgets newest month first, optionally for one month.
    fn list_budgets(&self, user_id: UserId, month: Option<NaiveDate>) -> RepoResult<Vec<Budget>>;
    /// Sum of all budget allocations for `month`.
    fn budget_total(&self, user_id: UserId, month: NaiveDate) -> RepoResult<Decimal>;

    fn create_alert(&self, alert: &BudgetAlert) -> RepoResult<()>;
    fn has_alert(&self, budget_id: RecordId, alert_type: AlertType) -> RepoResult<bool>;
    fn get_alert(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<BudgetAlert>>;
    fn list_alerts(&self, user_id: UserId, query: &AlertQuery) -> RepoResult<Vec<BudgetAlert>>;
    /// Returns whether the alert changed from unread to read.
    fn mark_alert_read(&self, user_id: UserId, id: RecordId) -> RepoResult<bool>;
    fn mark_all_alerts_read(&self, user_id: UserId) -> RepoResult<usize>;
    fn delete_alert(&self, user_id: UserId, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteExpenseRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteExpenseRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn filtered(base: &str, user_id: UserId, query: &TransactionQuery) -> SqlQuery {
        let mut sql = SqlQuery::new(base);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(kind) = query.transaction_type {
            sql.push_bind("AND transaction_type = ?", kind.as_str().to_string());
        }
        if let Some(category) = query.expense_category_id {
            sql.push_bind("AND expense_category_id = ?", id_text(category));
        }
        if let Some(category) = query.income_category_id {
            sql.push_bind("AND income_category_id = ?", id_text(category));
        }
        sql.push_range("transaction_date", &query.range);
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            sql.push_bind(
                "AND (description LIKE ? ESCAPE '\\'",
                pattern.clone(),
            )
            .push_bind("OR notes LIKE ? ESCAPE '\\'", pattern.clone())
            .push_bind("OR location LIKE ? ESCAPE '\\')", pattern);
        }
        sql
    }
}

impl ExpenseRepository for SqliteExpenseRepository<'_> {
    fn create_transaction(&self, transaction: &Transaction) -> RepoResult<()> {
        transaction.validate()?;
        self.conn.execute(
            "INSERT INTO transactions (
                id, user_id, transaction_type, amount_cents, description, notes,
                expense_category_id, income_category_id, transaction_date, location, voice_input
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                id_text(transaction.id),
                id_text(transaction.user_id),
                transaction.transaction_type.as_str(),
                cents(transaction.amount)?,
                transaction.description,
                transaction.notes,
                opt_id_text(transaction.expense_category_id),
                opt_id_text(transaction.income_category_id),
                transaction.transaction_date,
                transaction.location,
                bool_to_int(transaction.voice_input),
            ],
        )?;
        Ok(())
    }

    fn get_transaction(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TRANSACTION_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_transaction_row(row)?)),
            None => Ok(None),
        }
    }

    fn update_transaction(&self, transaction: &Transaction) -> RepoResult<()> {
        transaction.validate()?;
        let changed = self.conn.execute(
            "UPDATE transactions
             SET transaction_type = ?3, amount_cents = ?4, description = ?5, notes = ?6,
                 expense_category_id = ?7, income_category_id = ?8, transaction_date = ?9,
                 location = ?10, voice_input = ?11,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(transaction.id),
                id_text(transaction.user_id),
                transaction.transaction_type.as_str(),
                cents(transaction.amount)?,
                transaction.description,
                transaction.notes,
                opt_id_text(transaction.expense_category_id),
                opt_id_text(transaction.income_category_id),
                transaction.transaction_date,
                transaction.location,
                bool_to_int(transaction.voice_input),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("transaction", transaction.id));
        }
        Ok(())
    }

    fn delete_transaction(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM transactions WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("transaction", id));
        }
        Ok(())
    }

    fn list_transactions(
        &self,
        user_id: UserId,
        query: &TransactionQuery,
    ) -> RepoResult<Vec<Transaction>> {
        let mut sql = Self::filtered(TRANSACTION_SELECT_SQL, user_id, query);
        sql.push(query.ordering.order_by());
        let limit = normalize_limit(query.limit, TRANSACTIONS_DEFAULT_LIMIT, TRANSACTIONS_LIMIT_MAX);
        sql.push_bind("LIMIT ?", i64::from(limit))
            .push_bind("OFFSET ?", i64::from(query.offset));

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut transactions = Vec::new();
        while let Some(row) = rows.next()? {
            transactions.push(parse_transaction_row(row)?);
        }
        Ok(transactions)
    }

    fn count_transactions(&self, user_id: UserId, query: &TransactionQuery) -> RepoResult<u32> {
        let sql = Self::filtered("SELECT COUNT(*) FROM transactions", user_id, query);
        let count = self
            .conn
            .query_row(sql.sql(), sql.params(), |row| count_col(row, 0))?;
        Ok(count)
    }

    fn totals(&self, user_id: UserId, range: &EpochRange) -> RepoResult<TransactionTotals> {
        let mut sql = SqlQuery::new(
            "SELECT
                COALESCE(SUM(CASE WHEN transaction_type = 'income' THEN amount_cents END), 0),
                COALESCE(SUM(CASE WHEN transaction_type = 'expense' THEN amount_cents END), 0),
                COUNT(*)
             FROM transactions",
        );
        sql.push_bind("WHERE user_id = ?", id_text(user_id))
            .push_range("transaction_date", range);
        let totals = self.conn.query_row(sql.sql(), sql.params(), |row| {
            Ok(TransactionTotals {
                income: from_cents(row.get(0)?),
                expenses: from_cents(row.get(1)?),
                count: count_col(row, 2)?,
            })
        })?;
        Ok(totals)
    }

    fn category_totals(
        &self,
        user_id: UserId,
        kind: CategoryKind,
    ) -> RepoResult<BTreeMap<RecordId, CategoryTotal>> {
        let (column, transaction_type) = match kind {
            CategoryKind::Expense => ("expense_category_id", TransactionType::Expense),
            CategoryKind::Income => ("income_category_id", TransactionType::Income),
            CategoryKind::Goal => return Ok(BTreeMap::new()),
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT c.id AS id,
                    COALESCE(SUM(t.amount_cents), 0) AS total_cents,
                    COUNT(t.id) AS transaction_count
             FROM categories c
             LEFT JOIN transactions t
               ON t.{column} = c.id AND t.transaction_type = ?3 AND t.user_id = c.user_id
             WHERE c.user_id = ?1 AND c.kind = ?2
             GROUP BY c.id;"
        ))?;
        let mut rows = stmt.query(params![
            id_text(user_id),
            kind.as_str(),
            transaction_type.as_str()
        ])?;
        let mut totals = BTreeMap::new();
        while let Some(row) = rows.next()? {
            totals.insert(
                uuid_col(row, "id")?,
                CategoryTotal {
                    total: cents_col(row, "total_cents")?,
                    transaction_count: count_col(row, 2)?,
                },
            );
        }
        Ok(totals)
    }

    fn spent_in_category(
        &self,
        user_id: UserId,
        category_id: RecordId,
        range: &EpochRange,
    ) -> RepoResult<Decimal> {
        let mut sql = SqlQuery::new("SELECT COALESCE(SUM(amount_cents), 0) FROM transactions");
        sql.push_bind("WHERE user_id = ?", id_text(user_id))
            .push("AND transaction_type = 'expense'")
            .push_bind("AND expense_category_id = ?", id_text(category_id))
            .push_range("transaction_date", range);
        let spent: i64 = self
            .conn
            .query_row(sql.sql(), sql.params(), |row| row.get(0))?;
        Ok(from_cents(spent))
    }

    fn category_breakdown(
        &self,
        user_id: UserId,
        transaction_type: TransactionType,
        range: &EpochRange,
    ) -> RepoResult<Vec<CategoryAmount>> {
        let column = match transaction_type {
            TransactionType::Expense => "expense_category_id",
            TransactionType::Income => "income_category_id",
        };
        let mut sql = SqlQuery::new(&format!(
            "SELECT c.id AS category_id,
                    COALESCE(c.name, 'Uncategorized') AS name,
                    COALESCE(c.color, '#6c757d') AS color,
                    COALESCE(c.icon, '') AS icon,
                    SUM(t.amount_cents) AS total_cents,
                    COUNT(*) AS transaction_count
             FROM transactions t
             LEFT JOIN categories c ON c.id = t.{column}"
        ));
        sql.push_bind("WHERE t.user_id = ?", id_text(user_id))
            .push_bind("AND t.transaction_type = ?", transaction_type.as_str().to_string())
            .push_range("t.transaction_date", range)
            .push("GROUP BY c.id ORDER BY total_cents DESC, name ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut breakdown = Vec::new();
        while let Some(row) = rows.next()? {
            breakdown.push(CategoryAmount {
                category_id: opt_uuid_col(row, "category_id")?,
                name: row.get("name")?,
                color: row.get("color")?,
                icon: row.get("icon")?,
                amount: cents_col(row, "total_cents")?,
                count: count_col(row, 5)?,
            });
        }
        Ok(breakdown)
    }

    fn create_budget(&self, budget: &Budget) -> RepoResult<()> {
        budget.validate()?;
        self.conn.execute(
            "INSERT INTO budgets (id, user_id, category_id, amount_cents, month, alert_threshold)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id_text(budget.id),
                id_text(budget.user_id),
                id_text(budget.category_id),
                cents(budget.amount)?,
                date_text(budget.month),
                decimal_text(budget.alert_threshold),
            ],
        )?;
        Ok(())
    }

    fn get_budget(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<Budget>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BUDGET_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_budget_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_budget(
        &self,
        user_id: UserId,
        category_id: RecordId,
        month: NaiveDate,
    ) -> RepoResult<Option<Budget>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BUDGET_SELECT_SQL} WHERE user_id = ?1 AND category_id = ?2 AND month = ?3;"
        ))?;
        let mut rows = stmt.query([id_text(user_id), id_text(category_id), date_text(month)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_budget_row(row)?)),
            None => Ok(None),
        }
    }

    fn update_budget(&self, budget: &Budget) -> RepoResult<()> {
        budget.validate()?;
        let changed = self.conn.execute(
            "UPDATE budgets
             SET category_id = ?3, amount_cents = ?4, month = ?5, alert_threshold = ?6,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND user_id = ?2;",
            params![
                id_text(budget.id),
                id_text(budget.user_id),
                id_text(budget.category_id),
                cents(budget.amount)?,
                date_text(budget.month),
                decimal_text(budget.alert_threshold),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("budget", budget.id));
        }
        Ok(())
    }

    fn delete_budget(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM budgets WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("budget", id));
        }
        Ok(())
    }

    fn list_budgets(&self, user_id: UserId, month: Option<NaiveDate>) -> RepoResult<Vec<Budget>> {
        let mut sql = SqlQuery::new(BUDGET_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(month) = month {
            sql.push_bind("AND month = ?", date_text(month));
        }
        sql.push("ORDER BY month DESC, created_at ASC, id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut budgets = Vec::new();
        while let Some(row) = rows.next()? {
            budgets.push(parse_budget_row(row)?);
        }
        Ok(budgets)
    }

    fn budget_total(&self, user_id: UserId, month: NaiveDate) -> RepoResult<Decimal> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM budgets WHERE user_id = ?1 AND month = ?2;",
            [id_text(user_id), date_text(month)],
            |row| row.get(0),
        )?;
        Ok(from_cents(total))
    }

    fn create_alert(&self, alert: &BudgetAlert) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO budget_alerts (id, user_id, budget_id, alert_type, message, is_read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id_text(alert.id),
                id_text(alert.user_id),
                id_text(alert.budget_id),
                alert.alert_type.as_str(),
                alert.message,
                bool_to_int(alert.is_read),
            ],
        )?;
        Ok(())
    }

    fn has_alert(&self, budget_id: RecordId, alert_type: AlertType) -> RepoResult<bool> {
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM budget_alerts WHERE budget_id = ?1 AND alert_type = ?2 LIMIT 1;",
        )?;
        Ok(stmt.exists(params![id_text(budget_id), alert_type.as_str()])?)
    }

    fn get_alert(&self, user_id: UserId, id: RecordId) -> RepoResult<Option<BudgetAlert>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ALERT_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query([id_text(id), id_text(user_id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_alert_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_alerts(&self, user_id: UserId, query: &AlertQuery) -> RepoResult<Vec<BudgetAlert>> {
        let mut sql = SqlQuery::new(ALERT_SELECT_SQL);
        sql.push_bind("WHERE user_id = ?", id_text(user_id));
        if let Some(is_read) = query.is_read {
            sql.push_bind("AND is_read = ?", bool_to_int(is_read));
        }
        if let Some(alert_type) = query.alert_type {
            sql.push_bind("AND alert_type = ?", alert_type.as_str().to_string());
        }
        if let Some(budget_id) = query.budget_id {
            sql.push_bind("AND budget_id = ?", id_text(budget_id));
        }
        sql.push("ORDER BY sent_at DESC, id ASC");

        let mut stmt = self.conn.prepare(sql.sql())?;
        let mut rows = stmt.query(sql.params())?;
        let mut alerts = Vec::new();
        while let Some(row) = rows.next()? {
            alerts.push(parse_alert_row(row)?);
        }
        Ok(alerts)
    }

    fn mark_alert_read(&self, user_id: UserId, id: RecordId) -> RepoResult<bool> {
        if self.get_alert(user_id, id)?.is_none() {
            return Err(RepoError::not_found("budget alert", id));
        }
        let changed = self.conn.execute(
            "UPDATE budget_alerts SET is_read = 1 WHERE id = ?1 AND user_id = ?2 AND is_read = 0;",
            [id_text(id), id_text(user_id)],
        )?;
        Ok(changed > 0)
    }

    fn mark_all_alerts_read(&self, user_id: UserId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE budget_alerts SET is_read = 1 WHERE user_id = ?1 AND is_read = 0;",
            [id_text(user_id)],
        )?;
        Ok(changed)
    }

    fn delete_alert(&self, user_id: UserId, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM budget_alerts WHERE id = ?1 AND user_id = ?2;",
            [id_text(id), id_text(user_id)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("budget alert", id));
        }
        Ok(())
    }
}

/// Escapes `%`, `_` and the escape char itself for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_transaction_row(row: &Row<'_>) -> RepoResult<Transaction> {
    Ok(Transaction {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        transaction_type: enum_col(row, "transaction_type", TransactionType::parse)?,
        amount: cents_col(row, "amount_cents")?,
        description: row.get("description")?,
        notes: row.get("notes")?,
        expense_category_id: opt_uuid_col(row, "expense_category_id")?,
        income_category_id: opt_uuid_col(row, "income_category_id")?,
        transaction_date: row.get("transaction_date")?,
        location: row.get("location")?,
        voice_input: bool_col(row, "voice_input")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_budget_row(row: &Row<'_>) -> RepoResult<Budget> {
    Ok(Budget {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        category_id: uuid_col(row, "category_id")?,
        amount: cents_col(row, "amount_cents")?,
        month: date_col(row, "month")?,
        alert_threshold: decimal_col(row, "alert_threshold")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_alert_row(row: &Row<'_>) -> RepoResult<BudgetAlert> {
    Ok(BudgetAlert {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        budget_id: uuid_col(row, "budget_id")?,
        alert_type: enum_col(row, "alert_type", AlertType::parse)?,
        message: row.get("message")?,
        is_read: bool_col(row, "is_read")?,
        sent_at: row.get("sent_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{escape_like, TransactionOrdering};

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("coffee"), "coffee");
    }

    #[test]
    fn ordering_accepts_signed_field_names() {
        assert_eq!(
            TransactionOrdering::parse("-amount"),
            Some(TransactionOrdering::AmountDesc)
        );
        assert_eq!(
            TransactionOrdering::parse("transaction_date"),
            Some(TransactionOrdering::DateAsc)
        );
        assert_eq!(TransactionOrdering::parse("title"), None);
    }
}
