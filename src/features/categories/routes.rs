use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::categories::handlers;
use crate::features::categories::services::CategoryService;

/// Create routes for the categories feature
///
/// Note: authentication is handled by the storefront gateway in front of
/// this service; routes are scoped by store id only.
pub fn routes(service: Arc<CategoryService>) -> Router {
    Router::new()
        .route(
            "/api/stores/{store_id}/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/api/stores/{store_id}/categories/by-slug/{slug}",
            get(handlers::get_category_by_slug),
        )
        .route(
            "/api/stores/{store_id}/categories/{id}",
            get(handlers::get_category)
                .patch(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/api/stores/{store_id}/categories/{id}/drop-preview",
            post(handlers::preview_drop),
        )
        .route(
            "/api/stores/{store_id}/categories/{id}/move",
            post(handlers::move_category),
        )
        .with_state(service)
}
