use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Category visibility status matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "category_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    #[default]
    Active,
    Hidden,
    Archived,
}

impl std::fmt::Display for CategoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryStatus::Active => write!(f, "active"),
            CategoryStatus::Hidden => write!(f, "hidden"),
            CategoryStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Database model for category
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub store_id: Uuid,
    /// `None` means root level
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub status: CategoryStatus,
    /// Sibling ordering key, ascending display order within one parent
    pub order_key: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for creating a new category
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub store_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub status: CategoryStatus,
    pub order_key: f64,
}

/// Edit-form fields; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub status: Option<CategoryStatus>,
}

/// Partial update of the ordering fields of one category.
///
/// `parent_id: Some(None)` moves the category to root level, `None` keeps
/// the current parent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrderingPatch {
    pub parent_id: Option<Option<Uuid>>,
    pub order_key: Option<f64>,
}

/// One entry of a rebalance batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyAssignment {
    pub id: Uuid,
    pub order_key: f64,
}
