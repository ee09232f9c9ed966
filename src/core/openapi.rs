use utoipa::{Modify, OpenApi};

use crate::features::categories::{dtos as categories_dtos, handlers as categories_handlers};
use crate::features::categories::models::CategoryStatus;
use crate::features::categories::tree::DropIntent;
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Categories
        categories_handlers::list_categories,
        categories_handlers::get_category,
        categories_handlers::get_category_by_slug,
        categories_handlers::create_category,
        categories_handlers::update_category,
        categories_handlers::delete_category,
        categories_handlers::preview_drop,
        categories_handlers::move_category,
    ),
    components(
        schemas(
            Meta,
            CategoryStatus,
            DropIntent,
            // Categories DTOs
            categories_dtos::CategoryResponseDto,
            categories_dtos::CategoryTreeDto,
            categories_dtos::CreateCategoryDto,
            categories_dtos::UpdateCategoryDto,
            categories_dtos::DropPreviewDto,
            categories_dtos::DropPreviewResponseDto,
            categories_dtos::MoveCategoryDto,
            categories_dtos::MoveCategoryResponseDto,
            // Response wrappers
            ApiResponse<categories_dtos::CategoryResponseDto>,
            ApiResponse<Vec<categories_dtos::CategoryResponseDto>>,
            ApiResponse<Vec<categories_dtos::CategoryTreeDto>>,
            ApiResponse<categories_dtos::DropPreviewResponseDto>,
            ApiResponse<categories_dtos::MoveCategoryResponseDto>,
        )
    ),
    tags(
        (name = "categories", description = "Storefront category tree, editing and drag-and-drop reordering"),
    ),
    info(
        title = "Storefront Catalog API",
        version = "0.1.0",
        description = "API documentation for the storefront category organizer",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
