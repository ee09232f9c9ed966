//! Hierarchical product categories for storefront catalogs.
//!
//! Merchants reshape the category tree by dragging rows: a drop either
//! reorders siblings (above/below a row) or nests a category inside another.
//! The pure tree logic lives in [`tree`]; persistence goes through the
//! [`store::CategoryStore`] contract.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/stores/{store_id}/categories` | Flat list, or nested with `?tree=true` |
//! | GET | `/api/stores/{store_id}/categories/by-slug/{slug}` | Get category by slug |
//! | GET | `/api/stores/{store_id}/categories/{id}` | Get category by id |
//! | POST | `/api/stores/{store_id}/categories` | Create category after its siblings |
//! | PATCH | `/api/stores/{store_id}/categories/{id}` | Update name, slug, description, image, status |
//! | DELETE | `/api/stores/{store_id}/categories/{id}` | Delete category (children move to root) |
//! | POST | `/api/stores/{store_id}/categories/{id}/drop-preview` | Classify a hover over a target row |
//! | POST | `/api/stores/{store_id}/categories/{id}/move` | Commit a drop onto a target row |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod tree;

pub use services::CategoryService;
