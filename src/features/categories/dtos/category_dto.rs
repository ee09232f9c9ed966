use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::categories::models::{Category, CategoryStatus};
use crate::features::categories::tree::{CategoryForest, DropIntent};

/// Response DTO for category
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponseDto {
    pub id: Uuid,
    pub store_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub status: CategoryStatus,
    pub order_key: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponseDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            store_id: c.store_id,
            parent_id: c.parent_id,
            name: c.name,
            slug: c.slug,
            description: c.description,
            image_url: c.image_url,
            status: c.status,
            order_key: c.order_key,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Response DTO for category tree (hierarchical structure)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(no_recursion)]
pub struct CategoryTreeDto {
    pub id: Uuid,
    /// Resolved parent; `null` for roots and for detached categories
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub status: CategoryStatus,
    pub order_key: f64,
    /// 0 for root level
    pub depth: usize,
    /// Stored parent reference could not be resolved, shown at root level
    pub detached: bool,
    pub children: Vec<CategoryTreeDto>,
}

impl CategoryTreeDto {
    pub fn from_forest(forest: &CategoryForest) -> Vec<CategoryTreeDto> {
        forest
            .roots()
            .iter()
            .filter_map(|id| Self::build_node(forest, *id, 0))
            .collect()
    }

    fn build_node(forest: &CategoryForest, id: Uuid, depth: usize) -> Option<CategoryTreeDto> {
        let category = forest.get(id)?;
        let children = forest
            .children(id)
            .iter()
            .filter_map(|child| Self::build_node(forest, *child, depth + 1))
            .collect();

        Some(CategoryTreeDto {
            id,
            parent_id: forest.parent_of(id),
            name: category.name.clone(),
            slug: category.slug.clone(),
            status: category.status,
            order_key: category.order_key,
            depth,
            detached: forest.detached().contains(&id),
            children,
        })
    }
}

/// Query params for listing categories
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCategoriesQuery {
    /// If true, return tree structure. Default: false (flat list)
    #[serde(default)]
    pub tree: bool,
}

/// Request DTO for creating a category
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryDto {
    /// Parent category; omit for root level
    pub parent_id: Option<Uuid>,

    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    /// Derived from the name when omitted
    #[validate(
        length(min = 1, max = 255, message = "Slug must be 1-255 characters"),
        regex(
            path = "*crate::shared::validation::SLUG_REGEX",
            message = "Slug must be lowercase letters and digits separated by single hyphens"
        )
    )]
    pub slug: Option<String>,

    #[validate(length(max = 2000, message = "Description must not exceed 2000 characters"))]
    pub description: Option<String>,

    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,

    pub status: Option<CategoryStatus>,
}

/// Request DTO for updating category details. Position changes go through
/// the move endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryDto {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[validate(
        length(min = 1, max = 255, message = "Slug must be 1-255 characters"),
        regex(
            path = "*crate::shared::validation::SLUG_REGEX",
            message = "Slug must be lowercase letters and digits separated by single hyphens"
        )
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[validate(length(max = 2000, message = "Description must not exceed 2000 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[validate(url(message = "Image URL must be a valid URL"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CategoryStatus>,
}

/// Request DTO for committing a drop of the path category onto a target row.
///
/// Either `intent` is given directly, or `offset` (pointer position within
/// the target row, 0 = top, 1 = bottom) is classified server-side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MoveCategoryDto {
    pub target_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<DropIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

/// Request DTO for previewing a hover
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DropPreviewDto {
    pub target_id: Uuid,
    pub offset: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DropPreviewResponseDto {
    pub intent: DropIntent,
    /// False when dropping here would nest the category inside itself
    pub allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MoveCategoryResponseDto {
    /// False when the drop resolved to the category's current position
    pub moved: bool,
    pub category_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub order_key: f64,
    /// Number of siblings renumbered to make room
    pub rebalanced: usize,
}
