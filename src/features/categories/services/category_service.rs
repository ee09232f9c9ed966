use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::config::CatalogConfig;
use crate::core::error::{AppError, Result};
use crate::features::categories::dtos::{
    CategoryResponseDto, CategoryTreeDto, CreateCategoryDto, DropPreviewDto,
    DropPreviewResponseDto, MoveCategoryDto, MoveCategoryResponseDto, UpdateCategoryDto,
};
use crate::features::categories::models::{CategoryStatus, CategoryUpdate, NewCategory};
use crate::features::categories::store::CategoryStore;
use crate::features::categories::tree::{
    CategoryForest, DropZones, OrderKeyPolicy, ReorderController, ReorderOutcome,
};
use crate::shared::constants::MAX_CATEGORY_NAME_LENGTH;
use crate::shared::validation::slugify;

/// Service for category operations.
///
/// Keeps one [`ReorderController`] per store so that concurrent drops on the
/// same tree go through a single commit path.
pub struct CategoryService {
    store: Arc<dyn CategoryStore>,
    policy: OrderKeyPolicy,
    zones: DropZones,
    controllers: Mutex<HashMap<Uuid, Arc<ReorderController>>>,
}

impl CategoryService {
    pub fn new(
        store: Arc<dyn CategoryStore>,
        config: &CatalogConfig,
    ) -> std::result::Result<Self, String> {
        config.validate()?;
        Ok(Self {
            store,
            policy: OrderKeyPolicy {
                step: config.order_key_step,
                min_gap: config.order_key_min_gap,
            },
            zones: DropZones::symmetric(config.drop_edge_zone)?,
            controllers: Mutex::new(HashMap::new()),
        })
    }

    async fn controller(&self, store_id: Uuid) -> Result<Arc<ReorderController>> {
        let mut controllers = self.controllers.lock().await;
        if let Some(controller) = controllers.get(&store_id) {
            return Ok(controller.clone());
        }

        let controller = Arc::new(
            ReorderController::load(self.store.clone(), store_id, self.policy, self.zones).await?,
        );
        controllers.insert(store_id, controller.clone());
        Ok(controller)
    }

    /// Current tree for a store, re-read from the store
    async fn fresh_forest(&self, store_id: Uuid) -> Result<Arc<CategoryForest>> {
        let controller = self.controller(store_id).await?;
        Ok(controller.refresh().await?)
    }

    /// Bring a cached tree in line after a CRUD write; drop it if that fails
    async fn sync_controller(&self, store_id: Uuid) {
        let cached = self.controllers.lock().await.get(&store_id).cloned();
        if let Some(controller) = cached {
            if let Err(e) = controller.refresh().await {
                tracing::warn!(
                    "Dropping cached category tree for store {}: {}",
                    store_id,
                    e
                );
                self.controllers.lock().await.remove(&store_id);
            }
        }
    }

    /// All categories of a store, flattened in display order (depth-first)
    pub async fn list(&self, store_id: Uuid) -> Result<Vec<CategoryResponseDto>> {
        let forest = self.fresh_forest(store_id).await?;
        Ok(forest
            .walk()
            .into_iter()
            .map(|(category, _)| category.clone().into())
            .collect())
    }

    /// All categories of a store as tree structure
    pub async fn list_tree(&self, store_id: Uuid) -> Result<Vec<CategoryTreeDto>> {
        let forest = self.fresh_forest(store_id).await?;
        if !forest.detached().is_empty() {
            tracing::warn!(
                "Store {} has {} categories with unresolvable parents",
                store_id,
                forest.detached().len()
            );
        }
        Ok(CategoryTreeDto::from_forest(&forest))
    }

    pub async fn get_by_id(&self, store_id: Uuid, id: Uuid) -> Result<CategoryResponseDto> {
        self.store
            .find_by_id(store_id, id)
            .await?
            .map(|c| c.into())
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    pub async fn get_by_slug(&self, store_id: Uuid, slug: &str) -> Result<CategoryResponseDto> {
        self.store
            .find_by_slug(store_id, slug)
            .await?
            .map(|c| c.into())
            .ok_or_else(|| AppError::NotFound(format!("Category '{}' not found", slug)))
    }

    /// Create a category after all of its future siblings
    pub async fn create(
        &self,
        store_id: Uuid,
        dto: CreateCategoryDto,
    ) -> Result<CategoryResponseDto> {
        let slug = match dto.slug {
            Some(slug) => slug,
            None => slugify(&dto.name)
                .chars()
                .take(MAX_CATEGORY_NAME_LENGTH as usize)
                .collect::<String>()
                .trim_end_matches('-')
                .to_string(),
        };
        if slug.is_empty() {
            return Err(AppError::Validation(
                "A slug cannot be derived from this name, provide one explicitly".to_string(),
            ));
        }

        if let Some(parent_id) = dto.parent_id {
            if self.store.find_by_id(store_id, parent_id).await?.is_none() {
                return Err(AppError::NotFound(format!(
                    "Parent category {} not found",
                    parent_id
                )));
            }
        }

        let forest = self.fresh_forest(store_id).await?;
        let sibling_keys: Vec<f64> = forest
            .group_keys(dto.parent_id)
            .into_iter()
            .map(|(_, key)| key)
            .collect();

        let category = self
            .store
            .insert(NewCategory {
                store_id,
                parent_id: dto.parent_id,
                name: dto.name,
                slug,
                description: dto.description,
                image_url: dto.image_url,
                status: dto.status.unwrap_or(CategoryStatus::Active),
                order_key: self.policy.append_key(&sibling_keys),
            })
            .await?;

        tracing::info!(
            "Created category {} '{}' in store {}",
            category.id,
            category.slug,
            store_id
        );
        self.sync_controller(store_id).await;
        Ok(category.into())
    }

    pub async fn update(
        &self,
        store_id: Uuid,
        id: Uuid,
        dto: UpdateCategoryDto,
    ) -> Result<CategoryResponseDto> {
        let update = CategoryUpdate {
            name: dto.name,
            slug: dto.slug,
            description: dto.description,
            image_url: dto.image_url,
            status: dto.status,
        };
        let category = self.store.update_details(store_id, id, &update).await?;

        tracing::info!("Updated category {} in store {}", id, store_id);
        self.sync_controller(store_id).await;
        Ok(category.into())
    }

    /// Delete a category; its children move to root level
    pub async fn delete(&self, store_id: Uuid, id: Uuid) -> Result<()> {
        self.store.delete(store_id, id).await?;

        tracing::info!("Deleted category {} in store {}", id, store_id);
        self.sync_controller(store_id).await;
        Ok(())
    }

    /// Classify a hover over `dto.target_id` and say whether dropping there is allowed
    pub async fn drop_preview(
        &self,
        store_id: Uuid,
        moved_id: Uuid,
        dto: DropPreviewDto,
    ) -> Result<DropPreviewResponseDto> {
        let controller = self.loaded_controller(store_id, moved_id).await?;
        let mut gesture = controller.begin_drag(moved_id)?;
        let preview = gesture.hover(dto.target_id, dto.offset);
        gesture.cancel();

        Ok(DropPreviewResponseDto {
            intent: preview.intent,
            allowed: preview.allowed,
        })
    }

    /// Commit a drop of `moved_id` onto `dto.target_id`
    pub async fn move_category(
        &self,
        store_id: Uuid,
        moved_id: Uuid,
        dto: MoveCategoryDto,
    ) -> Result<MoveCategoryResponseDto> {
        let controller = self.loaded_controller(store_id, moved_id).await?;
        let outcome = match (dto.intent, dto.offset) {
            (Some(intent), _) => controller.commit(moved_id, dto.target_id, intent).await?,
            (None, Some(offset)) => {
                controller
                    .begin_drag(moved_id)?
                    .drop_on(dto.target_id, offset)
                    .await?
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "Either intent or offset is required".to_string(),
                ))
            }
        };

        match outcome {
            ReorderOutcome::Moved {
                moved_id,
                parent_id,
                order_key,
                rebalanced,
            } => Ok(MoveCategoryResponseDto {
                moved: true,
                category_id: moved_id,
                parent_id,
                order_key,
                rebalanced,
            }),
            ReorderOutcome::Unchanged => {
                let forest = controller.forest();
                let category = forest.get(moved_id).ok_or_else(|| {
                    AppError::NotFound(format!("Category {} not found", moved_id))
                })?;
                Ok(MoveCategoryResponseDto {
                    moved: false,
                    category_id: moved_id,
                    parent_id: forest.parent_of(moved_id),
                    order_key: category.order_key,
                    rebalanced: 0,
                })
            }
        }
    }

    /// Controller whose tree contains `id`, reloading once if the cached tree
    /// predates the category
    async fn loaded_controller(&self, store_id: Uuid, id: Uuid) -> Result<Arc<ReorderController>> {
        let controller = self.controller(store_id).await?;
        if !controller.forest().contains(id) && !controller.refresh().await?.contains(id) {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }
        Ok(controller)
    }
}
