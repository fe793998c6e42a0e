//! Expense, income, budget and budget-alert use cases.
//!
//! # Responsibility
//! - Check category ownership before money records reference a category.
//! - Derive budget consumption and record budget alerts when expenses land.
//! - Shape transaction summaries, expense analytics and monthly summaries.
//!
//! # Invariants
//! - A transaction or budget may only reference the caller's own category of
//!   the matching kind.
//! - Each budget records at most one `threshold` and one `exceeded` alert.
//! - Period figures are computed on read; nothing derived is persisted.

use super::{found, ServiceError, ServiceResult};
use crate::analytics::period::{
    date_of_ms, days_in_month, month_from_parts, month_label, month_name, month_start,
    next_month_start, trailing_month_starts, EpochRange,
};
use crate::model::category::{Category, CategoryKind};
use crate::model::expense::{
    AlertType, Budget, BudgetAlert, BudgetUsage, Transaction, TransactionType,
};
use crate::model::money::{percentage, round_to};
use crate::model::{double_option, RecordId, UserId};
use crate::repo::category_repo::CategoryRepository;
use crate::repo::expense_repo::{
    AlertQuery, CategoryTotal, ExpenseRepository, TransactionOrdering, TransactionQuery,
};
use chrono::{Datelike, Duration, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const RECENT_TRANSACTIONS: u32 = 10;
const TREND_MONTHS: u32 = 6;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryInput {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// Category with the sum and count of its matching-type transactions.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub total: Decimal,
    pub transaction_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInput {
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub expense_category: Option<RecordId>,
    #[serde(default)]
    pub income_category: Option<RecordId>,
    /// Epoch milliseconds; defaults to now.
    #[serde(default)]
    pub transaction_date: Option<i64>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub voice_input: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionPatch {
    pub transaction_type: Option<TransactionType>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub notes: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub expense_category: Option<Option<RecordId>>,
    #[serde(deserialize_with = "double_option")]
    pub income_category: Option<Option<RecordId>>,
    pub transaction_date: Option<i64>,
    pub location: Option<String>,
    pub voice_input: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub category_name: Option<String>,
    /// Alerts recorded because of this write.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub triggered_alerts: Vec<BudgetAlert>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_amount: Decimal,
    pub transaction_count: u32,
    pub period: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetInput {
    pub category: RecordId,
    pub amount: Decimal,
    /// Any day of the budgeted month.
    pub month: NaiveDate,
    #[serde(default)]
    pub alert_threshold: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BudgetPatch {
    pub category: Option<RecordId>,
    pub amount: Option<Decimal>,
    pub month: Option<NaiveDate>,
    pub alert_threshold: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetView {
    #[serde(flatten)]
    pub budget: Budget,
    pub category_name: String,
    pub month_label: String,
    #[serde(flatten)]
    pub usage: BudgetUsage,
}

/// Computed alert for a current-month budget that needs attention.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetNotice {
    pub budget_id: RecordId,
    pub category: String,
    pub alert_type: AlertType,
    pub message: String,
    pub percentage_used: f64,
    pub is_over_budget: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryShare {
    pub category_id: Option<RecordId>,
    pub category_name: String,
    pub category_color: String,
    pub total_amount: Decimal,
    pub transaction_count: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    pub month: String,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateSpan {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpenseAnalytics {
    pub period: DateSpan,
    pub category_breakdown: Vec<CategoryShare>,
    pub monthly_trends: Vec<MonthlyTrend>,
    pub total_expenses: Decimal,
    pub total_income: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    pub month: &'static str,
    pub year: i32,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_amount: Decimal,
    pub total_budget: Decimal,
    pub budget_remaining: Decimal,
    pub budget_used_percentage: f64,
    pub daily_avg_income: Decimal,
    pub daily_avg_expense: Decimal,
    pub transaction_count: u32,
    pub days_in_month: u32,
}

/// Money use-case facade.
pub struct ExpenseService<E: ExpenseRepository, C: CategoryRepository> {
    repo: E,
    categories: C,
}

impl<E: ExpenseRepository, C: CategoryRepository> ExpenseService<E, C> {
    pub fn new(repo: E, categories: C) -> Self {
        Self { repo, categories }
    }

    pub fn list_categories(&self, user_id: UserId, kind: CategoryKind) -> ServiceResult<Vec<CategoryView>> {
        let totals = self.repo.category_totals(user_id, kind)?;
        Ok(self
            .categories
            .list_categories(user_id, kind)?
            .into_iter()
            .map(|category| category_view(category, &totals))
            .collect())
    }

    pub fn get_category(
        &self,
        user_id: UserId,
        kind: CategoryKind,
        id: RecordId,
    ) -> ServiceResult<CategoryView> {
        let category = found(self.categories.get_category(user_id, kind, id)?, "category")?;
        let totals = self.repo.category_totals(user_id, kind)?;
        Ok(category_view(category, &totals))
    }

    pub fn create_category(
        &self,
        user_id: UserId,
        kind: CategoryKind,
        input: CategoryInput,
    ) -> ServiceResult<CategoryView> {
        let mut category = Category::new(user_id, kind, input.name.trim());
        category.description = input.description;
        category.icon = input.icon;
        if let Some(color) = input.color {
            category.color = color;
        }
        self.categories
            .create_category(&category)
            .map_err(|err| duplicate_name(err.into()))?;
        self.get_category(user_id, kind, category.id)
    }

    pub fn update_category(
        &self,
        user_id: UserId,
        kind: CategoryKind,
        id: RecordId,
        patch: CategoryPatch,
    ) -> ServiceResult<CategoryView> {
        let mut category = found(self.categories.get_category(user_id, kind, id)?, "category")?;
        if let Some(name) = patch.name {
            category.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            category.description = description;
        }
        if let Some(icon) = patch.icon {
            category.icon = icon;
        }
        if let Some(color) = patch.color {
            category.color = color;
        }
        self.categories
            .update_category(&category)
            .map_err(|err| duplicate_name(err.into()))?;
        self.get_category(user_id, kind, id)
    }

    pub fn delete_category(&self, user_id: UserId, kind: CategoryKind, id: RecordId) -> ServiceResult<()> {
        self.categories.delete_category(user_id, kind, id)?;
        Ok(())
    }

    /// Seeds the built-in categories of `kind`; returns only new rows.
    pub fn create_default_categories(
        &self,
        user_id: UserId,
        kind: CategoryKind,
    ) -> ServiceResult<Vec<Category>> {
        let created = self.categories.create_defaults(user_id, kind)?;
        info!(
            "event=category_defaults module=expenses status=ok kind={kind} created={}",
            created.len()
        );
        Ok(created)
    }

    pub fn list_transactions(
        &self,
        user_id: UserId,
        query: &TransactionQuery,
    ) -> ServiceResult<Vec<TransactionView>> {
        let names = self.category_names(user_id)?;
        Ok(self
            .repo
            .list_transactions(user_id, query)?
            .into_iter()
            .map(|transaction| transaction_view(transaction, &names, Vec::new()))
            .collect())
    }

    /// The ten latest transactions by transaction date.
    pub fn recent_transactions(&self, user_id: UserId) -> ServiceResult<Vec<TransactionView>> {
        let query = TransactionQuery {
            ordering: TransactionOrdering::DateDesc,
            limit: Some(RECENT_TRANSACTIONS),
            ..TransactionQuery::default()
        };
        self.list_transactions(user_id, &query)
    }

    pub fn get_transaction(&self, user_id: UserId, id: RecordId) -> ServiceResult<TransactionView> {
        let transaction = found(self.repo.get_transaction(user_id, id)?, "transaction")?;
        let names = self.category_names(user_id)?;
        Ok(transaction_view(transaction, &names, Vec::new()))
    }

    pub fn create_transaction(
        &self,
        user_id: UserId,
        input: TransactionInput,
        now_ms: i64,
    ) -> ServiceResult<TransactionView> {
        let mut transaction = Transaction::new(
            user_id,
            input.transaction_type,
            input.amount,
            input.description.trim(),
            input.transaction_date.unwrap_or(now_ms),
        );
        transaction.notes = input.notes;
        transaction.expense_category_id = input.expense_category;
        transaction.income_category_id = input.income_category;
        transaction.location = input.location;
        transaction.voice_input = input.voice_input;
        transaction.validate()?;
        self.ensure_transaction_categories(&transaction)?;

        self.repo.create_transaction(&transaction)?;
        info!(
            "event=transaction_create module=expenses status=ok type={} user_id={user_id}",
            transaction.transaction_type
        );
        let alerts = self.evaluate_budget(&transaction)?;
        let stored = found(self.repo.get_transaction(user_id, transaction.id)?, "transaction")?;
        let names = self.category_names(user_id)?;
        Ok(transaction_view(stored, &names, alerts))
    }

    pub fn update_transaction(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: TransactionPatch,
    ) -> ServiceResult<TransactionView> {
        let mut transaction = found(self.repo.get_transaction(user_id, id)?, "transaction")?;
        if let Some(kind) = patch.transaction_type {
            transaction.transaction_type = kind;
        }
        if let Some(amount) = patch.amount {
            transaction.amount = amount;
        }
        if let Some(description) = patch.description {
            transaction.description = description.trim().to_string();
        }
        if let Some(notes) = patch.notes {
            transaction.notes = notes;
        }
        if let Some(category) = patch.expense_category {
            transaction.expense_category_id = category;
        }
        if let Some(category) = patch.income_category {
            transaction.income_category_id = category;
        }
        if let Some(date) = patch.transaction_date {
            transaction.transaction_date = date;
        }
        if let Some(location) = patch.location {
            transaction.location = location;
        }
        if let Some(voice_input) = patch.voice_input {
            transaction.voice_input = voice_input;
        }
        transaction.validate()?;
        self.ensure_transaction_categories(&transaction)?;

        self.repo.update_transaction(&transaction)?;
        let alerts = self.evaluate_budget(&transaction)?;
        let stored = found(self.repo.get_transaction(user_id, id)?, "transaction")?;
        let names = self.category_names(user_id)?;
        Ok(transaction_view(stored, &names, alerts))
    }

    pub fn delete_transaction(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_transaction(user_id, id)?;
        Ok(())
    }

    /// Totals over optional inclusive day bounds.
    pub fn transaction_summary(
        &self,
        user_id: UserId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ServiceResult<TransactionSummary> {
        let totals = self
            .repo
            .totals(user_id, &EpochRange::from_optional_days(start, end))?;
        Ok(TransactionSummary {
            total_income: totals.income,
            total_expenses: totals.expenses,
            net_amount: totals.net(),
            transaction_count: totals.count,
            period: period_label(start, end),
        })
    }

    pub fn list_budgets(&self, user_id: UserId, month: Option<NaiveDate>) -> ServiceResult<Vec<BudgetView>> {
        let budgets = self.repo.list_budgets(user_id, month.map(month_start))?;
        let names = self.category_names(user_id)?;
        budgets
            .into_iter()
            .map(|budget| self.budget_view(budget, &names))
            .collect()
    }

    pub fn current_month_budgets(&self, user_id: UserId, today: NaiveDate) -> ServiceResult<Vec<BudgetView>> {
        self.list_budgets(user_id, Some(today))
    }

    pub fn get_budget(&self, user_id: UserId, id: RecordId) -> ServiceResult<BudgetView> {
        let budget = found(self.repo.get_budget(user_id, id)?, "budget")?;
        let names = self.category_names(user_id)?;
        self.budget_view(budget, &names)
    }

    pub fn create_budget(&self, user_id: UserId, input: BudgetInput) -> ServiceResult<BudgetView> {
        let mut budget = Budget::new(user_id, input.category, input.amount, input.month);
        if let Some(threshold) = input.alert_threshold {
            budget.alert_threshold = threshold;
        }
        budget.validate()?;
        self.ensure_category(user_id, CategoryKind::Expense, budget.category_id, "category")?;
        self.repo
            .create_budget(&budget)
            .map_err(|err| duplicate_budget(err.into()))?;
        info!(
            "event=budget_create module=expenses status=ok user_id={user_id} month={}",
            budget.month
        );
        self.get_budget(user_id, budget.id)
    }

    pub fn update_budget(
        &self,
        user_id: UserId,
        id: RecordId,
        patch: BudgetPatch,
    ) -> ServiceResult<BudgetView> {
        let mut budget = found(self.repo.get_budget(user_id, id)?, "budget")?;
        if let Some(category) = patch.category {
            budget.category_id = category;
        }
        if let Some(amount) = patch.amount {
            budget.amount = amount;
        }
        if let Some(month) = patch.month {
            budget.month = month_start(month);
        }
        if let Some(threshold) = patch.alert_threshold {
            budget.alert_threshold = threshold;
        }
        budget.validate()?;
        self.ensure_category(user_id, CategoryKind::Expense, budget.category_id, "category")?;
        self.repo
            .update_budget(&budget)
            .map_err(|err| duplicate_budget(err.into()))?;
        self.get_budget(user_id, id)
    }

    pub fn delete_budget(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_budget(user_id, id)?;
        Ok(())
    }

    /// Current-month budgets past their threshold or allocation.
    pub fn current_month_alerts(&self, user_id: UserId, today: NaiveDate) -> ServiceResult<Vec<BudgetNotice>> {
        Ok(self
            .current_month_budgets(user_id, today)?
            .into_iter()
            .filter(|view| view.usage.should_alert || view.usage.is_over_budget)
            .map(|view| budget_notice(&view))
            .collect())
    }

    pub fn list_alerts(&self, user_id: UserId, query: &AlertQuery) -> ServiceResult<Vec<BudgetAlert>> {
        Ok(self.repo.list_alerts(user_id, query)?)
    }

    pub fn get_alert(&self, user_id: UserId, id: RecordId) -> ServiceResult<BudgetAlert> {
        found(self.repo.get_alert(user_id, id)?, "budget alert")
    }

    pub fn mark_alert_read(&self, user_id: UserId, id: RecordId) -> ServiceResult<BudgetAlert> {
        self.repo.mark_alert_read(user_id, id)?;
        self.get_alert(user_id, id)
    }

    pub fn mark_all_alerts_read(&self, user_id: UserId) -> ServiceResult<usize> {
        Ok(self.repo.mark_all_alerts_read(user_id)?)
    }

    pub fn delete_alert(&self, user_id: UserId, id: RecordId) -> ServiceResult<()> {
        self.repo.delete_alert(user_id, id)?;
        Ok(())
    }

    /// Category breakdown and six-month trend; defaults to the month of `today`.
    pub fn analytics(
        &self,
        user_id: UserId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> ServiceResult<ExpenseAnalytics> {
        let (start_date, end_date) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            _ => (
                month_start(today),
                next_month_start(today) - Duration::days(1),
            ),
        };
        if end_date < start_date {
            return Err(ServiceError::validation(
                "end_date",
                "end date must not be before start date",
            ));
        }
        let range = EpochRange::days(start_date, end_date);
        let totals = self.repo.totals(user_id, &range)?;

        let mut category_breakdown = Vec::new();
        if totals.expenses > Decimal::ZERO {
            for slice in self
                .repo
                .category_breakdown(user_id, TransactionType::Expense, &range)?
            {
                category_breakdown.push(CategoryShare {
                    category_id: slice.category_id,
                    category_name: slice.name,
                    category_color: slice.color,
                    percentage: round_to(percentage(slice.amount, totals.expenses), 2),
                    total_amount: slice.amount,
                    transaction_count: slice.count,
                });
            }
        }

        let monthly_trends = trailing_month_starts(today, TREND_MONTHS)
            .into_iter()
            .map(|month| {
                let month_totals = self.repo.totals(user_id, &EpochRange::month_of(month))?;
                Ok(MonthlyTrend {
                    month: month_label(month),
                    income: month_totals.income,
                    expenses: month_totals.expenses,
                    net: month_totals.net(),
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        Ok(ExpenseAnalytics {
            period: DateSpan {
                start_date,
                end_date,
            },
            category_breakdown,
            monthly_trends,
            total_expenses: totals.expenses,
            total_income: totals.income,
        })
    }

    pub fn monthly_summary(&self, user_id: UserId, year: i32, month: u32) -> ServiceResult<MonthlySummary> {
        let first = month_from_parts(year, month)
            .ok_or_else(|| ServiceError::invalid("invalid month or year"))?;
        let totals = self.repo.totals(user_id, &EpochRange::month_of(first))?;
        let total_budget = self.repo.budget_total(user_id, first)?;
        let days = days_in_month(first.year(), first.month());
        let per_day = |total: Decimal| (total / Decimal::from(days)).round_dp(2);

        Ok(MonthlySummary {
            month: month_name(first.month()),
            year: first.year(),
            total_income: totals.income,
            total_expenses: totals.expenses,
            net_amount: totals.net(),
            total_budget,
            budget_remaining: total_budget - totals.expenses,
            budget_used_percentage: round_to(percentage(totals.expenses, total_budget), 2),
            daily_avg_income: per_day(totals.income),
            daily_avg_expense: per_day(totals.expenses),
            transaction_count: totals.count,
            days_in_month: days,
        })
    }

    /// Records missing threshold/exceeded alerts for the budget an expense
    /// falls under, returning the alerts created now.
    fn evaluate_budget(&self, transaction: &Transaction) -> ServiceResult<Vec<BudgetAlert>> {
        let (TransactionType::Expense, Some(category_id)) =
            (transaction.transaction_type, transaction.expense_category_id)
        else {
            return Ok(Vec::new());
        };
        let Some(day) = date_of_ms(transaction.transaction_date) else {
            return Ok(Vec::new());
        };
        let Some(budget) = self
            .repo
            .find_budget(transaction.user_id, category_id, month_start(day))?
        else {
            return Ok(Vec::new());
        };

        let names = self.category_names(transaction.user_id)?;
        let view = self.budget_view(budget, &names)?;
        let mut created = Vec::new();
        let mut pending = Vec::new();
        if view.usage.should_alert {
            pending.push(AlertType::Threshold);
        }
        if view.usage.is_over_budget {
            pending.push(AlertType::Exceeded);
        }
        for alert_type in pending {
            if self.repo.has_alert(view.budget.id, alert_type)? {
                continue;
            }
            let alert = BudgetAlert::new(
                view.budget.user_id,
                view.budget.id,
                alert_type,
                alert_message(&view, alert_type),
            );
            self.repo.create_alert(&alert)?;
            info!(
                "event=budget_alert module=expenses status=ok type={alert_type} budget_id={}",
                view.budget.id
            );
            created.push(found(
                self.repo.get_alert(view.budget.user_id, alert.id)?,
                "budget alert",
            )?);
        }
        Ok(created)
    }

    fn budget_view(&self, budget: Budget, names: &BTreeMap<RecordId, String>) -> ServiceResult<BudgetView> {
        let spent = self.repo.spent_in_category(
            budget.user_id,
            budget.category_id,
            &EpochRange::month_of(budget.month),
        )?;
        Ok(BudgetView {
            category_name: names.get(&budget.category_id).cloned().unwrap_or_default(),
            month_label: budget.month_label(),
            usage: budget.status(spent),
            budget,
        })
    }

    fn ensure_transaction_categories(&self, transaction: &Transaction) -> ServiceResult<()> {
        if let Some(id) = transaction.expense_category_id {
            self.ensure_category(transaction.user_id, CategoryKind::Expense, id, "expense_category")?;
        }
        if let Some(id) = transaction.income_category_id {
            self.ensure_category(transaction.user_id, CategoryKind::Income, id, "income_category")?;
        }
        Ok(())
    }

    fn ensure_category(
        &self,
        user_id: UserId,
        kind: CategoryKind,
        id: RecordId,
        field: &'static str,
    ) -> ServiceResult<()> {
        if self.categories.get_category(user_id, kind, id)?.is_none() {
            return Err(ServiceError::validation(field, "invalid category"));
        }
        Ok(())
    }

    fn category_names(&self, user_id: UserId) -> ServiceResult<BTreeMap<RecordId, String>> {
        let mut names = BTreeMap::new();
        for kind in [CategoryKind::Expense, CategoryKind::Income] {
            for category in self.categories.list_categories(user_id, kind)? {
                names.insert(category.id, category.name);
            }
        }
        Ok(names)
    }
}

fn category_view(category: Category, totals: &BTreeMap<RecordId, CategoryTotal>) -> CategoryView {
    let total = totals.get(&category.id).copied().unwrap_or_default();
    CategoryView {
        category,
        total: total.total,
        transaction_count: total.transaction_count,
    }
}

fn transaction_view(
    transaction: Transaction,
    names: &BTreeMap<RecordId, String>,
    triggered_alerts: Vec<BudgetAlert>,
) -> TransactionView {
    TransactionView {
        category_name: transaction
            .category_id()
            .and_then(|id| names.get(&id).cloned()),
        transaction,
        triggered_alerts,
    }
}

/// `all_time` without bounds, `week` up to 7 days, `month` up to 31 days.
pub fn period_label(start: Option<NaiveDate>, end: Option<NaiveDate>) -> &'static str {
    match (start, end) {
        (None, None) => "all_time",
        (Some(start), Some(end)) => {
            let days = (end - start).num_days();
            if (0..=7).contains(&days) {
                "week"
            } else if (0..=31).contains(&days) {
                "month"
            } else {
                "custom"
            }
        }
        _ => "custom",
    }
}

fn alert_message(view: &BudgetView, alert_type: AlertType) -> String {
    match alert_type {
        AlertType::Exceeded => format!(
            "Budget for {} is exceeded by ${:.2}",
            view.category_name,
            view.usage.spent_amount - view.budget.amount
        ),
        _ => format!(
            "Budget for {} is {:.1}% used",
            view.category_name, view.usage.percentage_used
        ),
    }
}

fn budget_notice(view: &BudgetView) -> BudgetNotice {
    let alert_type = if view.usage.is_over_budget {
        AlertType::Exceeded
    } else {
        AlertType::Threshold
    };
    BudgetNotice {
        budget_id: view.budget.id,
        category: view.category_name.clone(),
        alert_type,
        message: alert_message(view, alert_type),
        percentage_used: round_to(view.usage.percentage_used, 2),
        is_over_budget: view.usage.is_over_budget,
    }
}

fn duplicate_name(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Conflict(_) => {
            ServiceError::validation("name", "a category with this name already exists")
        }
        other => other,
    }
}

fn duplicate_budget(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Conflict(_) => ServiceError::validation(
            "month",
            "a budget for this category and month already exists",
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::period_label;
    use chrono::NaiveDate;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn period_labels_check_week_before_month() {
        assert_eq!(period_label(None, None), "all_time");
        assert_eq!(period_label(Some(day(3, 1)), Some(day(3, 7))), "week");
        assert_eq!(period_label(Some(day(3, 1)), Some(day(3, 31))), "month");
        assert_eq!(period_label(Some(day(1, 1)), Some(day(3, 31))), "custom");
        assert_eq!(period_label(Some(day(3, 1)), None), "custom");
    }
}
