#[cfg(test)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(test)]
use std::sync::{Mutex, PoisonError};

#[cfg(test)]
use async_trait::async_trait;
#[cfg(test)]
use chrono::Utc;
#[cfg(test)]
use fake::{faker::lorem::en::Word, Fake};
#[cfg(test)]
use uuid::Uuid;

#[cfg(test)]
use crate::features::categories::models::{
    Category, CategoryStatus, CategoryUpdate, KeyAssignment, NewCategory, OrderingPatch,
};
#[cfg(test)]
use crate::features::categories::store::{CategoryStore, PersistError};
#[cfg(test)]
use crate::shared::validation::slugify;

#[cfg(test)]
pub fn sample_category(store_id: Uuid, parent_id: Option<Uuid>, order_key: f64) -> Category {
    let id = Uuid::now_v7();
    let name: String = Word().fake();
    let now = Utc::now();
    Category {
        id,
        store_id,
        parent_id,
        slug: format!("{}-{}", slugify(&name), id.simple()),
        name,
        description: None,
        image_url: None,
        status: CategoryStatus::Active,
        order_key,
        created_at: now,
        updated_at: now,
    }
}

/// `CategoryStore` over a plain vector, with switchable write failures
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryCategoryStore {
    rows: Mutex<Vec<Category>>,
    fail_writes: AtomicBool,
    fail_patches: AtomicBool,
    writes: AtomicUsize,
}

#[cfg(test)]
impl InMemoryCategoryStore {
    pub fn with_categories(categories: Vec<Category>) -> Self {
        Self {
            rows: Mutex::new(categories),
            ..Default::default()
        }
    }

    /// Make every write fail with a backend error until switched back
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make only single-row `patch_category` calls fail; batches still succeed
    pub fn fail_patches(&self, fail: bool) {
        self.fail_patches.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn rows(&self) -> Vec<Category> {
        self.lock().clone()
    }

    /// Delete a row without going through the store API, as a concurrent
    /// editor would
    pub fn remove(&self, id: Uuid) {
        self.lock().retain(|c| c.id != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Category>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), PersistError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistError::Backend("simulated outage".to_string()));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
fn exists(rows: &[Category], store_id: Uuid, id: Uuid) -> bool {
    rows.iter().any(|c| c.id == id && c.store_id == store_id)
}

#[cfg(test)]
#[async_trait]
impl CategoryStore for InMemoryCategoryStore {
    async fn load_snapshot(&self, store_id: Uuid) -> Result<Vec<Category>, PersistError> {
        Ok(self
            .lock()
            .iter()
            .filter(|c| c.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn patch_category(
        &self,
        store_id: Uuid,
        id: Uuid,
        patch: OrderingPatch,
    ) -> Result<(), PersistError> {
        self.check_writable()?;
        if self.fail_patches.load(Ordering::SeqCst) {
            return Err(PersistError::Backend("simulated row lock timeout".to_string()));
        }
        let mut rows = self.lock();
        if let Some(Some(parent_id)) = patch.parent_id {
            if !exists(&rows, store_id, parent_id) {
                return Err(PersistError::NotFound(parent_id));
            }
        }
        let row = rows
            .iter_mut()
            .find(|c| c.id == id && c.store_id == store_id)
            .ok_or(PersistError::NotFound(id))?;
        if let Some(parent_id) = patch.parent_id {
            row.parent_id = parent_id;
        }
        if let Some(order_key) = patch.order_key {
            row.order_key = order_key;
        }
        row.updated_at = Utc::now();
        drop(rows);
        self.record_write();
        Ok(())
    }

    async fn batch_patch(
        &self,
        store_id: Uuid,
        assignments: &[KeyAssignment],
    ) -> Result<(), PersistError> {
        self.check_writable()?;
        let mut rows = self.lock();
        if let Some(missing) = assignments
            .iter()
            .find(|a| !exists(&rows, store_id, a.id))
        {
            return Err(PersistError::NotFound(missing.id));
        }
        for assignment in assignments {
            if let Some(row) = rows.iter_mut().find(|c| c.id == assignment.id) {
                row.order_key = assignment.order_key;
            }
        }
        drop(rows);
        self.record_write();
        Ok(())
    }

    async fn find_by_id(&self, store_id: Uuid, id: Uuid) -> Result<Option<Category>, PersistError> {
        Ok(self
            .lock()
            .iter()
            .find(|c| c.id == id && c.store_id == store_id)
            .cloned())
    }

    async fn find_by_slug(
        &self,
        store_id: Uuid,
        slug: &str,
    ) -> Result<Option<Category>, PersistError> {
        Ok(self
            .lock()
            .iter()
            .find(|c| c.slug == slug && c.store_id == store_id)
            .cloned())
    }

    async fn insert(&self, category: NewCategory) -> Result<Category, PersistError> {
        self.check_writable()?;
        let mut rows = self.lock();
        if rows
            .iter()
            .any(|c| c.store_id == category.store_id && c.slug == category.slug)
        {
            return Err(PersistError::DuplicateSlug(category.slug));
        }
        if let Some(parent_id) = category.parent_id {
            if !exists(&rows, category.store_id, parent_id) {
                return Err(PersistError::NotFound(parent_id));
            }
        }

        let now = Utc::now();
        let created = Category {
            id: Uuid::now_v7(),
            store_id: category.store_id,
            parent_id: category.parent_id,
            name: category.name,
            slug: category.slug,
            description: category.description,
            image_url: category.image_url,
            status: category.status,
            order_key: category.order_key,
            created_at: now,
            updated_at: now,
        };
        rows.push(created.clone());
        drop(rows);
        self.record_write();
        Ok(created)
    }

    async fn update_details(
        &self,
        store_id: Uuid,
        id: Uuid,
        update: &CategoryUpdate,
    ) -> Result<Category, PersistError> {
        self.check_writable()?;
        let mut rows = self.lock();
        if let Some(slug) = &update.slug {
            if rows
                .iter()
                .any(|c| c.store_id == store_id && c.id != id && &c.slug == slug)
            {
                return Err(PersistError::DuplicateSlug(slug.clone()));
            }
        }
        let row = rows
            .iter_mut()
            .find(|c| c.id == id && c.store_id == store_id)
            .ok_or(PersistError::NotFound(id))?;
        if let Some(name) = &update.name {
            row.name = name.clone();
        }
        if let Some(slug) = &update.slug {
            row.slug = slug.clone();
        }
        if let Some(description) = &update.description {
            row.description = Some(description.clone());
        }
        if let Some(image_url) = &update.image_url {
            row.image_url = Some(image_url.clone());
        }
        if let Some(status) = update.status {
            row.status = status;
        }
        row.updated_at = Utc::now();
        let updated = row.clone();
        drop(rows);
        self.record_write();
        Ok(updated)
    }

    async fn delete(&self, store_id: Uuid, id: Uuid) -> Result<(), PersistError> {
        self.check_writable()?;
        let mut rows = self.lock();
        if !exists(&rows, store_id, id) {
            return Err(PersistError::NotFound(id));
        }
        rows.retain(|c| c.id != id);
        for child in rows.iter_mut().filter(|c| c.parent_id == Some(id)) {
            child.parent_id = None;
        }
        drop(rows);
        self.record_write();
        Ok(())
    }
}
