//! Category model shared by expenses, income and goals.
//!
//! # Invariants
//! - Name is unique per `(user, kind)`.
//! - `color` is `#RRGGBB`.

use super::{limit_text, require_hex_color, require_text, RecordId, UserId, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

db_enum! {
    /// Which record family a category groups.
    pub enum CategoryKind {
        Expense => "expense",
        Income => "income",
        Goal => "goal",
    }
}

impl CategoryKind {
    /// Color assigned when the caller does not pick one.
    pub fn default_color(self) -> &'static str {
        match self {
            Self::Expense => "#007bff",
            Self::Income | Self::Goal => "#28a745",
        }
    }
}

/// User-owned grouping label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: RecordId,
    pub user_id: UserId,
    pub kind: CategoryKind,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub is_default: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Category {
    /// Creates a category with a generated id and the kind's default color.
    pub fn new(user_id: UserId, kind: CategoryKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            name: name.into(),
            description: String::new(),
            icon: String::new(),
            color: kind.default_color().to_string(),
            is_default: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("name", &self.name, 100)?;
        limit_text("icon", &self.icon, 50)?;
        require_hex_color("color", &self.color)
    }
}

/// Seed row for `create_defaults`.
#[derive(Debug, Clone, Copy)]
pub struct DefaultCategory {
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

const fn seed(name: &'static str, icon: &'static str, color: &'static str) -> DefaultCategory {
    DefaultCategory { name, icon, color }
}

const EXPENSE_DEFAULTS: &[DefaultCategory] = &[
    seed("Food & Dining", "restaurant", "#FF5722"),
    seed("Transportation", "directions_car", "#2196F3"),
    seed("Shopping", "shopping_cart", "#9C27B0"),
    seed("Entertainment", "movie", "#FF9800"),
    seed("Bills & Utilities", "receipt", "#607D8B"),
    seed("Healthcare", "local_hospital", "#4CAF50"),
    seed("Education", "school", "#3F51B5"),
    seed("Travel", "flight", "#00BCD4"),
];

const INCOME_DEFAULTS: &[DefaultCategory] = &[
    seed("Salary", "work", "#4CAF50"),
    seed("Freelance", "laptop", "#2196F3"),
    seed("Investment", "trending_up", "#FF9800"),
    seed("Business", "business", "#9C27B0"),
    seed("Other", "attach_money", "#607D8B"),
];

const GOAL_DEFAULTS: &[DefaultCategory] = &[
    seed("Personal Development", "self_improvement", "#2196F3"),
    seed("Health & Fitness", "fitness_center", "#4CAF50"),
    seed("Career", "work", "#FF9800"),
    seed("Financial", "attach_money", "#9C27B0"),
    seed("Relationships", "favorite", "#E91E63"),
    seed("Education", "school", "#3F51B5"),
    seed("Travel", "flight", "#00BCD4"),
    seed("Hobbies", "palette", "#FF5722"),
];

/// Built-in categories offered to every user for `kind`.
pub fn default_categories(kind: CategoryKind) -> &'static [DefaultCategory] {
    match kind {
        CategoryKind::Expense => EXPENSE_DEFAULTS,
        CategoryKind::Income => INCOME_DEFAULTS,
        CategoryKind::Goal => GOAL_DEFAULTS,
    }
}

#[cfg(test)]
mod tests {
    use super::{default_categories, Category, CategoryKind};
    use uuid::Uuid;

    #[test]
    fn defaults_are_valid_categories() {
        for kind in CategoryKind::ALL {
            for seed in default_categories(*kind) {
                let mut category = Category::new(Uuid::new_v4(), *kind, seed.name);
                category.icon = seed.icon.to_string();
                category.color = seed.color.to_string();
                assert!(category.validate().is_ok(), "{} should validate", seed.name);
            }
        }
        assert_eq!(default_categories(CategoryKind::Expense).len(), 8);
        assert_eq!(default_categories(CategoryKind::Income).len(), 5);
        assert_eq!(default_categories(CategoryKind::Goal).len(), 8);
    }

    #[test]
    fn kind_round_trips_through_storage_name() {
        assert_eq!(CategoryKind::parse("income"), Some(CategoryKind::Income));
        assert_eq!(CategoryKind::Goal.as_str(), "goal");
        assert_eq!(CategoryKind::parse("other"), None);
    }
}
