use std::borrow::Cow;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::category_store::{CategoryStore, PersistError};
use crate::features::categories::models::{
    Category, CategoryUpdate, KeyAssignment, NewCategory, OrderingPatch,
};

/// Translate a database error, naming the slug or parent when a constraint
/// on one of them was the cause
fn handle_db_error(e: sqlx::Error, slug: Option<&str>, parent_id: Option<Uuid>) -> PersistError {
    if let sqlx::Error::Database(db_err) = &e {
        // Unique constraint violation (PostgreSQL error code 23505)
        if db_err.code() == Some(Cow::Borrowed("23505")) {
            if let Some(slug) = slug {
                return PersistError::DuplicateSlug(slug.to_string());
            }
        }

        // Foreign key violation (PostgreSQL error code 23503)
        if db_err.code() == Some(Cow::Borrowed("23503")) {
            if let Some(parent_id) = parent_id {
                return PersistError::NotFound(parent_id);
            }
        }
    }

    tracing::error!("Category store query failed: {:?}", e);
    PersistError::Backend(e.to_string())
}

/// PostgreSQL-backed category store
pub struct PgCategoryStore {
    pool: PgPool,
}

impl PgCategoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryStore for PgCategoryStore {
    async fn load_snapshot(&self, store_id: Uuid) -> Result<Vec<Category>, PersistError> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, store_id, parent_id, name, slug, description, image_url, status,
                   order_key, created_at, updated_at
            FROM categories
            WHERE store_id = $1
            ORDER BY order_key, name
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| handle_db_error(e, None, None))
    }

    async fn patch_category(
        &self,
        store_id: Uuid,
        id: Uuid,
        patch: OrderingPatch,
    ) -> Result<(), PersistError> {
        let new_parent = patch.parent_id.flatten();
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET parent_id = CASE WHEN $3 THEN $4 ELSE parent_id END,
                order_key = COALESCE($5, order_key),
                updated_at = NOW()
            WHERE id = $1 AND store_id = $2
            "#,
        )
        .bind(id)
        .bind(store_id)
        .bind(patch.parent_id.is_some())
        .bind(new_parent)
        .bind(patch.order_key)
        .execute(&self.pool)
        .await
        .map_err(|e| handle_db_error(e, None, new_parent))?;

        if result.rows_affected() == 0 {
            return Err(PersistError::NotFound(id));
        }

        Ok(())
    }

    async fn batch_patch(
        &self,
        store_id: Uuid,
        assignments: &[KeyAssignment],
    ) -> Result<(), PersistError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| handle_db_error(e, None, None))?;

        for assignment in assignments {
            let result = sqlx::query(
                r#"
                UPDATE categories
                SET order_key = $3, updated_at = NOW()
                WHERE id = $1 AND store_id = $2
                "#,
            )
            .bind(assignment.id)
            .bind(store_id)
            .bind(assignment.order_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| handle_db_error(e, None, None))?;

            // Dropping the transaction rolls back the rows already touched
            if result.rows_affected() == 0 {
                return Err(PersistError::NotFound(assignment.id));
            }
        }

        tx.commit()
            .await
            .map_err(|e| handle_db_error(e, None, None))
    }

    async fn find_by_id(&self, store_id: Uuid, id: Uuid) -> Result<Option<Category>, PersistError> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, store_id, parent_id, name, slug, description, image_url, status,
                   order_key, created_at, updated_at
            FROM categories
            WHERE id = $1 AND store_id = $2
            "#,
        )
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| handle_db_error(e, None, None))
    }

    async fn find_by_slug(
        &self,
        store_id: Uuid,
        slug: &str,
    ) -> Result<Option<Category>, PersistError> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, store_id, parent_id, name, slug, description, image_url, status,
                   order_key, created_at, updated_at
            FROM categories
            WHERE slug = $1 AND store_id = $2
            "#,
        )
        .bind(slug)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| handle_db_error(e, None, None))
    }

    async fn insert(&self, category: NewCategory) -> Result<Category, PersistError> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (
                id, store_id, parent_id, name, slug, description, image_url, status, order_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, store_id, parent_id, name, slug, description, image_url, status,
                      order_key, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(category.store_id)
        .bind(category.parent_id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.image_url)
        .bind(category.status)
        .bind(category.order_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| handle_db_error(e, Some(&category.slug), category.parent_id))
    }

    async fn update_details(
        &self,
        store_id: Uuid,
        id: Uuid,
        update: &CategoryUpdate,
    ) -> Result<Category, PersistError> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($3, name),
                slug = COALESCE($4, slug),
                description = COALESCE($5, description),
                image_url = COALESCE($6, image_url),
                status = COALESCE($7, status),
                updated_at = NOW()
            WHERE id = $1 AND store_id = $2
            RETURNING id, store_id, parent_id, name, slug, description, image_url, status,
                      order_key, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(store_id)
        .bind(&update.name)
        .bind(&update.slug)
        .bind(&update.description)
        .bind(&update.image_url)
        .bind(update.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| handle_db_error(e, update.slug.as_deref(), None))?
        .ok_or(PersistError::NotFound(id))
    }

    async fn delete(&self, store_id: Uuid, id: Uuid) -> Result<(), PersistError> {
        let result = sqlx::query(
            r#"
            DELETE FROM categories
            WHERE id = $1 AND store_id = $2
            "#,
        )
        .bind(id)
        .bind(store_id)
        .execute(&self.pool)
        .await
        .map_err(|e| handle_db_error(e, None, None))?;

        if result.rows_affected() == 0 {
            return Err(PersistError::NotFound(id));
        }

        Ok(())
    }
}
