//! Transaction, budget and budget-alert models.
//!
//! # Responsibility
//! - Define money records and their field rules.
//! - Derive budget consumption figures from a spent total.
//!
//! # Invariants
//! - Amounts are at least 0.01 with two fractional digits.
//! - An expense carries an expense category and no income category; income
//!   is the mirror image.
//! - `Budget::month` is always the first day of a month.

use super::money::{percentage, require_amount};
use super::{limit_text, require_text, RecordId, UserId, ValidationError, ValidationResult};
use crate::analytics::period::{month_start, month_name};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

db_enum! {
    pub enum TransactionType {
        Income => "income",
        Expense => "expense",
    }
}

/// One income or expense movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: RecordId,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub notes: String,
    pub expense_category_id: Option<RecordId>,
    pub income_category_id: Option<RecordId>,
    /// Epoch milliseconds.
    pub transaction_date: i64,
    pub location: String,
    /// Entry was captured by speech input.
    pub voice_input: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Transaction {
    pub fn new(
        user_id: UserId,
        transaction_type: TransactionType,
        amount: Decimal,
        description: impl Into<String>,
        transaction_date: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            transaction_type,
            amount,
            description: description.into(),
            notes: String::new(),
            expense_category_id: None,
            income_category_id: None,
            transaction_date,
            location: String::new(),
            voice_input: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Category id matching the transaction type.
    pub fn category_id(&self) -> Option<RecordId> {
        match self.transaction_type {
            TransactionType::Expense => self.expense_category_id,
            TransactionType::Income => self.income_category_id,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_amount("amount", self.amount)?;
        require_text("description", &self.description, 255)?;
        limit_text("location", &self.location, 255)?;
        match self.transaction_type {
            TransactionType::Expense => {
                if self.expense_category_id.is_none() {
                    return Err(ValidationError::new(
                        "expense_category",
                        "expense category is required for expense transactions",
                    ));
                }
                if self.income_category_id.is_some() {
                    return Err(ValidationError::new(
                        "income_category",
                        "income category should not be set for expense transactions",
                    ));
                }
            }
            TransactionType::Income => {
                if self.income_category_id.is_none() {
                    return Err(ValidationError::new(
                        "income_category",
                        "income category is required for income transactions",
                    ));
                }
                if self.expense_category_id.is_some() {
                    return Err(ValidationError::new(
                        "expense_category",
                        "expense category should not be set for income transactions",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Monthly spending cap for one expense category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: RecordId,
    pub user_id: UserId,
    pub category_id: RecordId,
    pub amount: Decimal,
    /// First day of the budgeted month.
    pub month: NaiveDate,
    /// Percentage of `amount` at which the budget starts alerting.
    pub alert_threshold: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Budget {
    /// Creates a budget; `month` is normalized to its first day.
    pub fn new(user_id: UserId, category_id: RecordId, amount: Decimal, month: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            category_id,
            amount,
            month: month_start(month),
            alert_threshold: default_alert_threshold(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_amount("amount", self.amount)?;
        if self.month.day() != 1 {
            return Err(ValidationError::new(
                "month",
                "month must be the first day of a month",
            ));
        }
        if self.alert_threshold < Decimal::ZERO || self.alert_threshold > Decimal::from(999) {
            return Err(ValidationError::new(
                "alert_threshold",
                "alert threshold must be between 0 and 999.99",
            ));
        }
        Ok(())
    }

    /// Derives consumption figures for a spent total.
    pub fn status(&self, spent: Decimal) -> BudgetUsage {
        let used = spent
            .checked_div(self.amount)
            .map_or(Decimal::ZERO, |ratio| ratio * Decimal::from(100));
        BudgetUsage {
            spent_amount: spent,
            remaining_amount: self.amount - spent,
            percentage_used: percentage(spent, self.amount),
            is_over_budget: spent > self.amount,
            should_alert: used >= self.alert_threshold,
        }
    }

    /// `March 2024` style label for the budgeted month.
    pub fn month_label(&self) -> String {
        format!("{} {}", month_name(self.month.month()), self.month.year())
    }
}

pub fn default_alert_threshold() -> Decimal {
    Decimal::new(8000, 2)
}

/// Consumption of one budget in its month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetUsage {
    pub spent_amount: Decimal,
    pub remaining_amount: Decimal,
    pub percentage_used: f64,
    pub is_over_budget: bool,
    pub should_alert: bool,
}

db_enum! {
    pub enum AlertType {
        Threshold => "threshold",
        Exceeded => "exceeded",
        WeeklyRecap => "weekly_recap",
    }
}

/// Persisted budget notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub id: RecordId,
    pub user_id: UserId,
    pub budget_id: RecordId,
    pub alert_type: AlertType,
    pub message: String,
    pub is_read: bool,
    pub sent_at: i64,
}

impl BudgetAlert {
    pub fn new(
        user_id: UserId,
        budget_id: RecordId,
        alert_type: AlertType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            budget_id,
            alert_type,
            message: message.into(),
            is_read: false,
            sent_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Budget, Transaction, TransactionType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn budget(amount: i64) -> Budget {
        Budget::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Decimal::new(amount, 2),
            NaiveDate::from_ymd_opt(2024, 3, 17).unwrap(),
        )
    }

    #[test]
    fn budget_month_is_normalized_to_first_day() {
        let budget = budget(10_000);
        assert_eq!(budget.month, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(budget.month_label(), "March 2024");
        assert!(budget.validate().is_ok());
    }

    #[test]
    fn budget_usage_is_spent_over_allocated() {
        let budget = budget(20_000);
        let usage = budget.status(Decimal::new(5_000, 2));
        assert_eq!(usage.percentage_used, 25.0);
        assert_eq!(usage.remaining_amount, Decimal::new(15_000, 2));
        assert!(!usage.should_alert);
        assert!(!usage.is_over_budget);

        let usage = budget.status(Decimal::new(16_000, 2));
        assert_eq!(usage.percentage_used, 80.0);
        assert!(usage.should_alert);

        let usage = budget.status(Decimal::new(25_000, 2));
        assert!(usage.is_over_budget);
        assert_eq!(usage.remaining_amount, Decimal::new(-5_000, 2));
    }

    #[test]
    fn expense_requires_expense_category_only() {
        let user = Uuid::new_v4();
        let mut tx = Transaction::new(user, TransactionType::Expense, Decimal::new(500, 2), "Lunch", 0);
        assert_eq!(tx.validate().unwrap_err().field, "expense_category");

        tx.expense_category_id = Some(Uuid::new_v4());
        assert!(tx.validate().is_ok());

        tx.income_category_id = Some(Uuid::new_v4());
        assert_eq!(tx.validate().unwrap_err().field, "income_category");
    }

    #[test]
    fn income_requires_income_category_only() {
        let user = Uuid::new_v4();
        let mut tx = Transaction::new(user, TransactionType::Income, Decimal::new(500, 2), "Pay", 0);
        assert_eq!(tx.validate().unwrap_err().field, "income_category");
        tx.income_category_id = Some(Uuid::new_v4());
        assert!(tx.validate().is_ok());
        assert_eq!(tx.category_id(), tx.income_category_id);
    }
}
