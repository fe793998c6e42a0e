//! Category persistence for every category kind.
//!
//! # Responsibility
//! - CRUD over the shared `categories` table, always scoped by owner and kind.
//! - Seed the built-in defaults without duplicating existing names.
//!
//! # Invariants
//! - A category row is only reachable through its `(user_id, kind)` pair.
//! - `create_defaults` is idempotent and returns only the rows it inserted.

use super::{bool_col, bool_to_int, enum_col, id_text, uuid_col, RepoError, RepoResult};
use crate::db::in_transaction;
use crate::model::category::{default_categories, Category, CategoryKind};
use crate::model::{RecordId, UserId};
use rusqlite::{params, Connection, Row};

const CATEGORY_SELECT_SQL: &str = "SELECT
    id, user_id, kind, name, description, icon, color, is_default, created_at, updated_at
 FROM categories";

pub trait CategoryRepository {
    fn create_category(&self, category: &Category) -> RepoResult<()>;
    fn get_category(
        &self,
        user_id: UserId,
        kind: CategoryKind,
        id: RecordId,
    ) -> RepoResult<Option<Category>>;
    /// Lists the user's categories of `kind` by name.
    fn list_categories(&self, user_id: UserId, kind: CategoryKind) -> RepoResult<Vec<Category>>;
    fn update_category(&self, category: &Category) -> RepoResult<()>;
    fn delete_category(&self, user_id: UserId, kind: CategoryKind, id: RecordId) -> RepoResult<()>;
    /// Inserts missing built-in categories and returns the inserted rows.
    fn create_defaults(&self, user_id: UserId, kind: CategoryKind) -> RepoResult<Vec<Category>>;
}

pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn create_category(&self, category: &Category) -> RepoResult<()> {
        category.validate()?;
        insert_category(self.conn, category)
    }

    fn get_category(
        &self,
        user_id: UserId,
        kind: CategoryKind,
        id: RecordId,
    ) -> RepoResult<Option<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL} WHERE id = ?1 AND user_id = ?2 AND kind = ?3;"
        ))?;
        let mut rows = stmt.query(params![id_text(id), id_text(user_id), kind.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_category_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_categories(&self, user_id: UserId, kind: CategoryKind) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL} WHERE user_id = ?1 AND kind = ?2 ORDER BY name ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![id_text(user_id), kind.as_str()])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }

    fn update_category(&self, category: &Category) -> RepoResult<()> {
        category.validate()?;
        let changed = self.conn.execute(
            "UPDATE categories
             SET name = ?4, description = ?5, icon = ?6, color = ?7, is_default = ?8,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND user_id = ?2 AND kind = ?3;",
            params![
                id_text(category.id),
                id_text(category.user_id),
                category.kind.as_str(),
                category.name,
                category.description,
                category.icon,
                category.color,
                bool_to_int(category.is_default),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("category", category.id));
        }
        Ok(())
    }

    fn delete_category(&self, user_id: UserId, kind: CategoryKind, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM categories WHERE id = ?1 AND user_id = ?2 AND kind = ?3;",
            params![id_text(id), id_text(user_id), kind.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("category", id));
        }
        Ok(())
    }

    fn create_defaults(&self, user_id: UserId, kind: CategoryKind) -> RepoResult<Vec<Category>> {
        in_transaction(self.conn, |conn| -> RepoResult<Vec<Category>> {
            let mut exists = conn.prepare(
                "SELECT 1 FROM categories
                 WHERE user_id = ?1 AND kind = ?2 AND name = ?3
                 LIMIT 1;",
            )?;
            let mut created = Vec::new();
            for seed in default_categories(kind) {
                if exists.exists(params![id_text(user_id), kind.as_str(), seed.name])? {
                    continue;
                }
                let mut category = Category::new(user_id, kind, seed.name);
                category.icon = seed.icon.to_string();
                category.color = seed.color.to_string();
                category.is_default = true;
                category.validate()?;
                insert_category(conn, &category)?;
                created.push(category);
            }
            Ok(created)
        })
    }
}

fn insert_category(conn: &Connection, category: &Category) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO categories (id, user_id, kind, name, description, icon, color, is_default)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        params![
            id_text(category.id),
            id_text(category.user_id),
            category.kind.as_str(),
            category.name,
            category.description,
            category.icon,
            category.color,
            bool_to_int(category.is_default),
        ],
    )?;
    Ok(())
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<Category> {
    Ok(Category {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        kind: enum_col(row, "kind", CategoryKind::parse)?,
        name: row.get("name")?,
        description: row.get("description")?,
        icon: row.get("icon")?,
        color: row.get("color")?,
        is_default: bool_col(row, "is_default")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
