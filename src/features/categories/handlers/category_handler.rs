use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::categories::dtos::{
    CategoryResponseDto, CreateCategoryDto, DropPreviewDto, DropPreviewResponseDto,
    ListCategoriesQuery, MoveCategoryDto, MoveCategoryResponseDto, UpdateCategoryDto,
};
use crate::features::categories::services::CategoryService;
use crate::shared::types::{ApiResponse, Meta};

/// List categories of a store
///
/// Returns categories as flat list (depth-first display order) or tree
/// structure based on `tree` query param.
#[utoipa::path(
    get,
    path = "/api/stores/{store_id}/categories",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        ListCategoriesQuery
    ),
    responses(
        (status = 200, description = "Flat list of categories, or `CategoryTreeDto` roots when tree=true", body = ApiResponse<Vec<CategoryResponseDto>>),
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(service): State<Arc<CategoryService>>,
    Path(store_id): Path<Uuid>,
    Query(query): Query<ListCategoriesQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let (value, total) = if query.tree {
        let tree = service.list_tree(store_id).await?;
        let total = tree.len();
        (serde_json::to_value(tree), total)
    } else {
        let categories = service.list(store_id).await?;
        let total = categories.len();
        (serde_json::to_value(categories), total)
    };
    let value = value.map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ApiResponse::success(
        Some(value),
        None,
        Some(Meta {
            total: total as i64,
        }),
    )))
}

/// Get category by id
#[utoipa::path(
    get,
    path = "/api/stores/{store_id}/categories/{id}",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category found", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found")
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(service): State<Arc<CategoryService>>,
    Path((store_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.get_by_id(store_id, id).await?;
    Ok(Json(ApiResponse::success(Some(category), None, None)))
}

/// Get category by slug
#[utoipa::path(
    get,
    path = "/api/stores/{store_id}/categories/by-slug/{slug}",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        ("slug" = String, Path, description = "Category slug")
    ),
    responses(
        (status = 200, description = "Category found", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found")
    ),
    tag = "categories"
)]
pub async fn get_category_by_slug(
    State(service): State<Arc<CategoryService>>,
    Path((store_id, slug)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.get_by_slug(store_id, &slug).await?;
    Ok(Json(ApiResponse::success(Some(category), None, None)))
}

/// Create a category, placed after its siblings
#[utoipa::path(
    post,
    path = "/api/stores/{store_id}/categories",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    request_body = CreateCategoryDto,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Parent category not found"),
        (status = 409, description = "Slug already in use")
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(service): State<Arc<CategoryService>>,
    Path(store_id): Path<Uuid>,
    AppJson(dto): AppJson<CreateCategoryDto>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = service.create(store_id, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(category),
            Some("Category created successfully".to_string()),
            None,
        )),
    ))
}

/// Update category details
#[utoipa::path(
    patch,
    path = "/api/stores/{store_id}/categories/{id}",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        ("id" = Uuid, Path, description = "Category ID")
    ),
    request_body = UpdateCategoryDto,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Slug already in use")
    ),
    tag = "categories"
)]
pub async fn update_category(
    State(service): State<Arc<CategoryService>>,
    Path((store_id, id)): Path<(Uuid, Uuid)>,
    AppJson(dto): AppJson<UpdateCategoryDto>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = service.update(store_id, id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(category),
        Some("Category updated successfully".to_string()),
        None,
    )))
}

/// Delete a category; its children move to root level
#[utoipa::path(
    delete,
    path = "/api/stores/{store_id}/categories/{id}",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 404, description = "Category not found")
    ),
    tag = "categories"
)]
pub async fn delete_category(
    State(service): State<Arc<CategoryService>>,
    Path((store_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(store_id, id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Category deleted successfully".to_string()),
        None,
    )))
}

/// Classify a hover of category `id` over a target row
///
/// Read-only: reports the drop intent for the pointer offset and whether
/// dropping there is allowed.
#[utoipa::path(
    post,
    path = "/api/stores/{store_id}/categories/{id}/drop-preview",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        ("id" = Uuid, Path, description = "ID of the dragged category")
    ),
    request_body = DropPreviewDto,
    responses(
        (status = 200, description = "Drop preview", body = ApiResponse<DropPreviewResponseDto>),
        (status = 404, description = "Category not found")
    ),
    tag = "categories"
)]
pub async fn preview_drop(
    State(service): State<Arc<CategoryService>>,
    Path((store_id, id)): Path<(Uuid, Uuid)>,
    AppJson(dto): AppJson<DropPreviewDto>,
) -> Result<Json<ApiResponse<DropPreviewResponseDto>>> {
    let preview = service.drop_preview(store_id, id, dto).await?;
    Ok(Json(ApiResponse::success(Some(preview), None, None)))
}

/// Drop category `id` onto a target row
#[utoipa::path(
    post,
    path = "/api/stores/{store_id}/categories/{id}/move",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        ("id" = Uuid, Path, description = "ID of the dragged category")
    ),
    request_body = MoveCategoryDto,
    responses(
        (status = 200, description = "Move applied or nothing to change", body = ApiResponse<MoveCategoryResponseDto>),
        (status = 400, description = "Neither intent nor offset given"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Tree out of date or another move in progress"),
        (status = 422, description = "Target is inside the moved category"),
        (status = 503, description = "Saving failed, retry")
    ),
    tag = "categories"
)]
pub async fn move_category(
    State(service): State<Arc<CategoryService>>,
    Path((store_id, id)): Path<(Uuid, Uuid)>,
    AppJson(dto): AppJson<MoveCategoryDto>,
) -> Result<Json<ApiResponse<MoveCategoryResponseDto>>> {
    tracing::debug!(
        "Move request for category {} onto {} in store {}",
        id,
        dto.target_id,
        store_id
    );
    let result = service.move_category(store_id, id, dto).await?;
    let message = if result.moved {
        "Category moved successfully"
    } else {
        "Category already in place"
    };
    Ok(Json(ApiResponse::success(
        Some(result),
        Some(message.to_string()),
        None,
    )))
}
