use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::features::categories::models::{
    Category, CategoryUpdate, KeyAssignment, NewCategory, OrderingPatch,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistError {
    /// A referenced category (the row itself or its new parent) no longer exists
    #[error("Category {0} not found")]
    NotFound(Uuid),

    #[error("Slug '{0}' is already in use")]
    DuplicateSlug(String),

    #[error("Category store error: {0}")]
    Backend(String),
}

/// Authoritative flat collection of categories, scoped per storefront.
///
/// The reorder path only needs `load_snapshot`, `patch_category` and
/// `batch_patch`; the rest backs the dashboard edit forms.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Full flat read of one store's categories
    async fn load_snapshot(&self, store_id: Uuid) -> Result<Vec<Category>, PersistError>;

    /// Atomic update of the ordering fields of one category
    async fn patch_category(
        &self,
        store_id: Uuid,
        id: Uuid,
        patch: OrderingPatch,
    ) -> Result<(), PersistError>;

    /// All-or-nothing key rewrite, used when a sibling group is rebalanced
    async fn batch_patch(
        &self,
        store_id: Uuid,
        assignments: &[KeyAssignment],
    ) -> Result<(), PersistError>;

    async fn find_by_id(&self, store_id: Uuid, id: Uuid) -> Result<Option<Category>, PersistError>;

    async fn find_by_slug(
        &self,
        store_id: Uuid,
        slug: &str,
    ) -> Result<Option<Category>, PersistError>;

    async fn insert(&self, category: NewCategory) -> Result<Category, PersistError>;

    async fn update_details(
        &self,
        store_id: Uuid,
        id: Uuid,
        update: &CategoryUpdate,
    ) -> Result<Category, PersistError>;

    /// Children of a deleted category are moved to root level
    async fn delete(&self, store_id: Uuid, id: Uuid) -> Result<(), PersistError>;
}
