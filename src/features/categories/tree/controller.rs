use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use thiserror::Error;
use uuid::Uuid;

use super::builder::CategoryForest;
use super::cycle_guard;
use super::drop_intent::{DropIntent, DropZones};
use super::order_key::{Allocation, AllocationError, OrderKeyPolicy, Placement};
use crate::features::categories::models::{KeyAssignment, OrderingPatch};
use crate::features::categories::store::{CategoryStore, PersistError};

/// Where a drag gesture currently stands.
///
/// `Idle -> Dragging -> Hovering* -> Committing -> Idle`; a cancelled drag
/// goes straight back to `Idle`. A [`DragGesture`] tracks the first two
/// phases, the controller tracks `Idle` and `Committing`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    Dragging {
        moved_id: Uuid,
    },
    Hovering {
        moved_id: Uuid,
        target_id: Uuid,
        intent: DropIntent,
        allowed: bool,
    },
    Committing {
        moved_id: Uuid,
    },
}

/// Feedback shown while hovering over a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverPreview {
    pub intent: DropIntent,
    /// False when the drop would be a cycle or targets the dragged row itself
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReorderError {
    #[error("Cannot move category {moved_id} into its own subtree at {target_id}")]
    CycleRejected { moved_id: Uuid, target_id: Uuid },

    #[error("Saving the new position failed, please retry: {0}")]
    PersistFailed(String),

    #[error("Category tree is out of date, reload and retry: {0}")]
    StaleSnapshot(String),

    #[error("Another move is still being saved")]
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReorderOutcome {
    /// Nothing to do: dropped onto itself or onto its current position
    Unchanged,
    Moved {
        moved_id: Uuid,
        parent_id: Option<Uuid>,
        order_key: f64,
        /// Siblings renumbered before the move
        rebalanced: usize,
    },
}

/// Single entry point for drops on one store's category tree.
///
/// Holds the last loaded forest. Local state only changes after the store
/// confirms a write and a fresh snapshot has been read back. At most one
/// commit runs at a time; drops arriving meanwhile get [`ReorderError::Busy`].
pub struct ReorderController {
    store: Arc<dyn CategoryStore>,
    store_id: Uuid,
    policy: OrderKeyPolicy,
    zones: DropZones,
    forest: RwLock<Arc<CategoryForest>>,
    state: Mutex<GestureState>,
}

/// Puts the controller back to `Idle` when a commit ends, however it ends
struct CommitGuard<'a> {
    state: &'a Mutex<GestureState>,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = GestureState::Idle;
    }
}

/// One operator drag, from pick-up to drop or cancel. Nothing is written
/// until [`DragGesture::drop_on`].
pub struct DragGesture<'a> {
    controller: &'a ReorderController,
    moved_id: Uuid,
    state: GestureState,
}

impl DragGesture<'_> {
    /// Pointer moved over `target_id`
    pub fn hover(&mut self, target_id: Uuid, offset_within_row: f64) -> HoverPreview {
        let preview = self
            .controller
            .preview(self.moved_id, target_id, offset_within_row);
        self.state = GestureState::Hovering {
            moved_id: self.moved_id,
            target_id,
            intent: preview.intent,
            allowed: preview.allowed,
        };
        preview
    }

    /// Abandon the drag; nothing is written
    pub fn cancel(self) {
        match self.state {
            GestureState::Hovering {
                moved_id,
                target_id,
                intent,
                allowed,
            } => tracing::debug!(
                "Drag of {} cancelled over {} ({}, allowed={})",
                moved_id,
                target_id,
                intent,
                allowed
            ),
            GestureState::Dragging { moved_id } => {
                tracing::debug!("Drag of {} cancelled", moved_id)
            }
            GestureState::Idle | GestureState::Committing { .. } => {}
        }
    }

    /// Release the dragged row over `target_id`
    pub async fn drop_on(
        self,
        target_id: Uuid,
        offset_within_row: f64,
    ) -> Result<ReorderOutcome, ReorderError> {
        let intent = self.controller.zones.classify(offset_within_row);
        self.controller
            .commit(self.moved_id, target_id, intent)
            .await
    }
}

impl ReorderController {
    pub async fn load(
        store: Arc<dyn CategoryStore>,
        store_id: Uuid,
        policy: OrderKeyPolicy,
        zones: DropZones,
    ) -> Result<Self, PersistError> {
        let snapshot = store.load_snapshot(store_id).await?;
        let forest = CategoryForest::build(snapshot);
        if forest.is_empty() {
            tracing::debug!("Store {} has no categories yet", store_id);
        } else {
            tracing::debug!(
                "Loaded category tree for store {} ({} categories)",
                store_id,
                forest.len()
            );
        }

        Ok(Self {
            store,
            store_id,
            policy,
            zones,
            forest: RwLock::new(Arc::new(forest)),
            state: Mutex::new(GestureState::Idle),
        })
    }

    pub fn forest(&self) -> Arc<CategoryForest> {
        self.forest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, GestureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_forest(&self, forest: CategoryForest) {
        *self.forest.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(forest);
    }

    /// Re-read the store and rebuild the tree
    pub async fn refresh(&self) -> Result<Arc<CategoryForest>, PersistError> {
        let snapshot = self.store.load_snapshot(self.store_id).await?;
        self.replace_forest(CategoryForest::build(snapshot));
        Ok(self.forest())
    }

    async fn refresh_quietly(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(
                "Failed to reload category tree for store {}: {}",
                self.store_id,
                e
            );
        }
    }

    /// Pick up `moved_id`. Drags may start while a commit runs; only the
    /// drop itself is refused then.
    pub fn begin_drag(&self, moved_id: Uuid) -> Result<DragGesture<'_>, ReorderError> {
        if !self.forest().contains(moved_id) {
            return Err(ReorderError::StaleSnapshot(format!(
                "category {} is not in the loaded tree",
                moved_id
            )));
        }
        Ok(DragGesture {
            controller: self,
            moved_id,
            state: GestureState::Dragging { moved_id },
        })
    }

    /// Classify a hover and run the cycle guard against the parent the drop
    /// would give `moved_id`
    fn preview(&self, moved_id: Uuid, target_id: Uuid, offset_within_row: f64) -> HoverPreview {
        let intent = self.zones.classify(offset_within_row);
        let forest = self.forest();
        let new_parent = match intent {
            DropIntent::Inside => Some(target_id),
            DropIntent::Above | DropIntent::Below => forest.parent_of(target_id),
        };
        let allowed = moved_id != target_id
            && forest.contains(moved_id)
            && forest.contains(target_id)
            && !cycle_guard::creates_cycle(&forest, moved_id, new_parent);
        HoverPreview { intent, allowed }
    }

    fn enter_commit(&self, moved_id: Uuid) -> Result<CommitGuard<'_>, ReorderError> {
        let mut state = self.lock_state();
        if let GestureState::Committing { moved_id: busy } = *state {
            tracing::debug!(
                "Ignoring drop of {} while {} is being committed",
                moved_id,
                busy
            );
            return Err(ReorderError::Busy);
        }
        *state = GestureState::Committing { moved_id };
        Ok(CommitGuard { state: &self.state })
    }

    /// Move `moved_id` relative to `target_id` and persist the result.
    ///
    /// Order: cycle guard, key allocation, a re-read of the store to confirm
    /// the neighbours the key was computed from, rebalance batch (if any), the
    /// move patch, then a fresh snapshot. A failed write leaves the store and
    /// the loaded tree as they were; a vanished or shifted category reloads
    /// the tree and reports [`ReorderError::StaleSnapshot`].
    pub async fn commit(
        &self,
        moved_id: Uuid,
        target_id: Uuid,
        intent: DropIntent,
    ) -> Result<ReorderOutcome, ReorderError> {
        let _guard = self.enter_commit(moved_id)?;

        if moved_id == target_id {
            return Ok(ReorderOutcome::Unchanged);
        }

        let forest = self.forest();
        if cycle_guard::is_descendant(&forest, moved_id, target_id) {
            tracing::info!(
                "Rejected move of category {} {} {}: target is inside its subtree",
                moved_id,
                intent,
                target_id
            );
            return Err(ReorderError::CycleRejected {
                moved_id,
                target_id,
            });
        }

        let placement = match self.policy.allocate(&forest, moved_id, target_id, intent) {
            Ok(Allocation::Unchanged) => return Ok(ReorderOutcome::Unchanged),
            Ok(Allocation::Move(placement)) => placement,
            Err(AllocationError::UnknownCategory(id)) => {
                self.refresh_quietly().await;
                return Err(ReorderError::StaleSnapshot(format!(
                    "category {} is not in the loaded tree",
                    id
                )));
            }
        };

        let current = self.check_placement(&forest, moved_id, &placement).await?;

        if !placement.rebalance.is_empty() {
            tracing::info!(
                "Rebalancing {} sibling keys under {:?} in store {}",
                placement.rebalance.len(),
                placement.parent_id,
                self.store_id
            );
            if let Err(e) = self
                .store
                .batch_patch(self.store_id, &placement.rebalance)
                .await
            {
                return Err(self.persist_failure(e).await);
            }
        }

        let patch = OrderingPatch {
            parent_id: Some(placement.parent_id),
            order_key: Some(placement.order_key),
        };
        if let Err(e) = self
            .store
            .patch_category(self.store_id, moved_id, patch)
            .await
        {
            if !placement.rebalance.is_empty() {
                self.undo_rebalance(&current, &placement.rebalance).await;
            }
            return Err(self.persist_failure(e).await);
        }

        tracing::info!(
            "Moved category {} {} {} (parent {:?}, position {}, key {})",
            moved_id,
            intent,
            target_id,
            placement.parent_id,
            placement.index,
            placement.order_key
        );

        self.refresh().await.map_err(|e| {
            ReorderError::StaleSnapshot(format!("move saved but reloading the tree failed: {}", e))
        })?;

        Ok(ReorderOutcome::Moved {
            moved_id,
            parent_id: placement.parent_id,
            order_key: placement.order_key,
            rebalanced: placement.rebalance.len(),
        })
    }

    /// Re-read the store and confirm that the moved category, its new parent
    /// and every sibling the key was computed from are still where `forest`
    /// had them. Returns the tree as read.
    async fn check_placement(
        &self,
        forest: &CategoryForest,
        moved_id: Uuid,
        placement: &Placement,
    ) -> Result<CategoryForest, ReorderError> {
        let snapshot = match self.store.load_snapshot(self.store_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.persist_failure(e).await),
        };
        let current = CategoryForest::build(snapshot);

        let anchors: Vec<Uuid> = placement
            .prev_id
            .into_iter()
            .chain(placement.next_id)
            .chain(placement.rebalance.iter().map(|a| a.id))
            .collect();
        let key_of = |forest: &CategoryForest, id: Uuid| forest.get(id).map(|c| c.order_key);

        let problem = if let Some(id) = std::iter::once(moved_id)
            .chain(placement.parent_id)
            .chain(anchors.iter().copied())
            .find(|id| !current.contains(*id))
        {
            Some(format!("category {} no longer exists", id))
        } else {
            anchors
                .iter()
                .find(|id| {
                    current.parent_of(**id) != placement.parent_id
                        || key_of(&current, **id) != key_of(forest, **id)
                })
                .map(|id| format!("category {} was moved or renumbered", id))
        };

        match problem {
            Some(reason) => {
                tracing::warn!(
                    "Category tree for store {} changed under a move of {}: {}",
                    self.store_id,
                    moved_id,
                    reason
                );
                self.replace_forest(current);
                Err(ReorderError::StaleSnapshot(reason))
            }
            None => Ok(current),
        }
    }

    /// Put back the keys a rebalance overwrote when the move that needed it
    /// could not be saved
    async fn undo_rebalance(&self, before: &CategoryForest, rebalance: &[KeyAssignment]) {
        let restore: Vec<KeyAssignment> = rebalance
            .iter()
            .filter_map(|a| {
                before.get(a.id).map(|c| KeyAssignment {
                    id: a.id,
                    order_key: c.order_key,
                })
            })
            .collect();

        match self.store.batch_patch(self.store_id, &restore).await {
            Ok(()) => tracing::warn!(
                "Restored {} sibling keys in store {} after a failed move",
                restore.len(),
                self.store_id
            ),
            Err(e) => {
                tracing::error!(
                    "Failed to restore sibling keys in store {}: {}",
                    self.store_id,
                    e
                );
                self.refresh_quietly().await;
            }
        }
    }

    async fn persist_failure(&self, e: PersistError) -> ReorderError {
        match e {
            PersistError::NotFound(id) => {
                tracing::warn!(
                    "Category {} vanished from store {} during a move",
                    id,
                    self.store_id
                );
                self.refresh_quietly().await;
                ReorderError::StaleSnapshot(format!("category {} no longer exists", id))
            }
            other => {
                tracing::error!(
                    "Failed to persist move in store {}: {}",
                    self.store_id,
                    other
                );
                ReorderError::PersistFailed(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::categories::models::{
        Category, CategoryUpdate, KeyAssignment, NewCategory,
    };
    use crate::shared::test_helpers::{sample_category, InMemoryCategoryStore};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tokio_test::{assert_err, assert_ok};

    struct Tree {
        store: Arc<InMemoryCategoryStore>,
        controller: Arc<ReorderController>,
        store_id: Uuid,
    }

    impl Tree {
        fn key_of(&self, id: Uuid) -> Option<f64> {
            self.store
                .rows()
                .into_iter()
                .find(|c| c.id == id)
                .map(|c| c.order_key)
        }
    }

    async fn tree_of(categories: Vec<Category>, store_id: Uuid) -> Tree {
        let store = Arc::new(InMemoryCategoryStore::with_categories(categories));
        let controller = ReorderController::load(
            store.clone(),
            store_id,
            OrderKeyPolicy::default(),
            DropZones::default(),
        )
        .await
        .unwrap();
        Tree {
            store,
            controller: Arc::new(controller),
            store_id,
        }
    }

    /// Roots a(10) b(20) c(30); b has child b1, b1 has child b2; d(40) has child m
    struct Sample {
        tree: Tree,
        a: Uuid,
        b: Uuid,
        b1: Uuid,
        b2: Uuid,
        c: Uuid,
        m: Uuid,
    }

    async fn sample() -> Sample {
        let store_id = Uuid::now_v7();
        let a = sample_category(store_id, None, 10.0);
        let b = sample_category(store_id, None, 20.0);
        let c = sample_category(store_id, None, 30.0);
        let d = sample_category(store_id, None, 40.0);
        let b1 = sample_category(store_id, Some(b.id), 10.0);
        let b2 = sample_category(store_id, Some(b1.id), 10.0);
        let m = sample_category(store_id, Some(d.id), 10.0);
        let ids = (a.id, b.id, b1.id, b2.id, c.id, m.id);
        let tree = tree_of(vec![a, b, c, d, b1, b2, m], store_id).await;
        Sample {
            tree,
            a: ids.0,
            b: ids.1,
            b1: ids.2,
            b2: ids.3,
            c: ids.4,
            m: ids.5,
        }
    }

    #[tokio::test]
    async fn test_drop_above_middle_sibling_persists_midpoint() {
        let s = sample().await;

        let outcome = assert_ok!(s.tree.controller.commit(s.m, s.b, DropIntent::Above).await);

        assert_eq!(
            outcome,
            ReorderOutcome::Moved {
                moved_id: s.m,
                parent_id: None,
                order_key: 15.0,
                rebalanced: 0,
            }
        );
        assert_eq!(s.tree.key_of(s.m), Some(15.0));
        let forest = s.tree.controller.forest();
        assert_eq!(forest.roots().get(1), Some(&s.m));
        assert_eq!(forest.parent_of(s.m), None);
        assert_eq!(*s.tree.controller.lock_state(), GestureState::Idle);
    }

    #[tokio::test]
    async fn test_drop_below_last_sibling_and_inside_empty_target() {
        let s = sample().await;

        assert_ok!(s.tree.controller.commit(s.m, s.c, DropIntent::Inside).await);
        assert_eq!(s.tree.key_of(s.m), Some(10.0));
        assert_eq!(s.tree.controller.forest().parent_of(s.m), Some(s.c));

        assert_ok!(s.tree.controller.commit(s.a, s.b1, DropIntent::Below).await);
        assert_eq!(s.tree.key_of(s.a), Some(20.0));
        assert_eq!(s.tree.controller.forest().children(s.b), &[s.b1, s.a]);
    }

    #[tokio::test]
    async fn test_moving_into_own_subtree_is_rejected() {
        let s = sample().await;
        let before = s.tree.store.rows();

        for target in [s.b1, s.b2] {
            for intent in [DropIntent::Above, DropIntent::Below, DropIntent::Inside] {
                let error = assert_err!(s.tree.controller.commit(s.b, target, intent).await);
                assert_eq!(
                    error,
                    ReorderError::CycleRejected {
                        moved_id: s.b,
                        target_id: target,
                    }
                );
            }
        }

        assert_eq!(s.tree.store.write_count(), 0);
        assert_eq!(s.tree.store.rows(), before);
        assert_eq!(s.tree.controller.forest().children(s.b), &[s.b1]);
        assert_eq!(*s.tree.controller.lock_state(), GestureState::Idle);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_tree_unchanged() {
        let s = sample().await;
        let forest_before = s.tree.controller.forest();
        s.tree.store.fail_writes(true);

        let error = assert_err!(s.tree.controller.commit(s.m, s.b, DropIntent::Above).await);

        assert!(matches!(error, ReorderError::PersistFailed(_)));
        assert!(Arc::ptr_eq(&forest_before, &s.tree.controller.forest()));
        assert_eq!(s.tree.key_of(s.m), Some(10.0));
        assert_eq!(*s.tree.controller.lock_state(), GestureState::Idle);

        // Retry once the store recovers
        s.tree.store.fail_writes(false);
        assert_ok!(s.tree.controller.commit(s.m, s.b, DropIntent::Above).await);
        assert_eq!(s.tree.key_of(s.m), Some(15.0));
    }

    #[tokio::test]
    async fn test_drop_on_itself_or_current_position_writes_nothing() {
        let s = sample().await;

        for (moved, target, intent) in [
            (s.a, s.a, DropIntent::Inside),
            (s.a, s.b, DropIntent::Above),
            (s.b, s.a, DropIntent::Below),
            (s.b1, s.b, DropIntent::Inside),
        ] {
            let outcome = assert_ok!(s.tree.controller.commit(moved, target, intent).await);
            assert_eq!(outcome, ReorderOutcome::Unchanged);
        }
        assert_eq!(s.tree.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_vanished_category_reports_stale_snapshot() {
        let s = sample().await;
        // Deleted behind the controller's back
        s.tree.store.remove(s.m);

        let error = assert_err!(s.tree.controller.commit(s.m, s.a, DropIntent::Below).await);

        assert!(matches!(error, ReorderError::StaleSnapshot(_)));
        assert!(!s.tree.controller.forest().contains(s.m));
    }

    #[tokio::test]
    async fn test_unknown_target_reports_stale_snapshot() {
        let s = sample().await;

        let error = assert_err!(
            s.tree
                .controller
                .commit(s.m, Uuid::now_v7(), DropIntent::Inside)
                .await
        );

        assert!(matches!(error, ReorderError::StaleSnapshot(_)));
        assert_eq!(s.tree.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_tight_keys_rebalance_before_move() {
        let store_id = Uuid::now_v7();
        let a = sample_category(store_id, None, 1.0);
        let b = sample_category(store_id, None, 1.0 + 1e-9);
        let moved = sample_category(store_id, None, 50.0);
        let (a_id, b_id, moved_id) = (a.id, b.id, moved.id);
        let tree = tree_of(vec![a, b, moved], store_id).await;

        let outcome = assert_ok!(tree.controller.commit(moved_id, b_id, DropIntent::Above).await);

        assert_eq!(
            outcome,
            ReorderOutcome::Moved {
                moved_id,
                parent_id: None,
                order_key: 5.0,
                rebalanced: 2,
            }
        );
        assert_eq!(tree.key_of(a_id), Some(0.0));
        assert_eq!(tree.key_of(b_id), Some(10.0));
        assert_eq!(tree.controller.forest().roots(), &[a_id, moved_id, b_id]);
    }

    #[tokio::test]
    async fn test_gesture_lifecycle() {
        let s = sample().await;
        let controller = &s.tree.controller;

        assert!(matches!(
            controller.begin_drag(Uuid::now_v7()),
            Err(ReorderError::StaleSnapshot(_))
        ));

        let mut gesture = assert_ok!(controller.begin_drag(s.b));
        assert_eq!(gesture.state, GestureState::Dragging { moved_id: s.b });

        assert_eq!(
            gesture.hover(s.b2, 0.5),
            HoverPreview {
                intent: DropIntent::Inside,
                allowed: false
            }
        );
        // Above b1 would make b its own parent
        assert_eq!(
            gesture.hover(s.b1, 0.1),
            HoverPreview {
                intent: DropIntent::Above,
                allowed: false
            }
        );
        assert_eq!(
            gesture.hover(s.c, 0.9),
            HoverPreview {
                intent: DropIntent::Below,
                allowed: true
            }
        );
        assert_eq!(
            gesture.state,
            GestureState::Hovering {
                moved_id: s.b,
                target_id: s.c,
                intent: DropIntent::Below,
                allowed: true
            }
        );

        gesture.cancel();
        assert_eq!(*controller.lock_state(), GestureState::Idle);
        assert_eq!(s.tree.store.write_count(), 0);

        let mut gesture = assert_ok!(controller.begin_drag(s.a));
        gesture.hover(s.c, 0.1);
        let outcome = assert_ok!(gesture.drop_on(s.c, 0.1).await);
        assert!(matches!(outcome, ReorderOutcome::Moved { order_key, .. } if order_key == 25.0));
        assert_eq!(*controller.lock_state(), GestureState::Idle);
    }

    #[tokio::test]
    async fn test_failed_move_after_rebalance_restores_sibling_keys() {
        let store_id = Uuid::now_v7();
        let a = sample_category(store_id, None, 0.0);
        let b = sample_category(store_id, None, 1e-9);
        let c = sample_category(store_id, None, 5.0);
        let holder = sample_category(store_id, None, 100.0);
        let m = sample_category(store_id, Some(holder.id), 10.0);
        let (a_id, b_id, c_id, holder_id, m_id) = (a.id, b.id, c.id, holder.id, m.id);
        let tree = tree_of(vec![a, b, c, holder, m], store_id).await;
        let before = tree.store.rows();

        tree.store.fail_patches(true);
        let error = assert_err!(tree.controller.commit(m_id, b_id, DropIntent::Above).await);

        assert!(matches!(error, ReorderError::PersistFailed(_)));
        assert_eq!(tree.key_of(a_id), Some(0.0));
        assert_eq!(tree.key_of(b_id), Some(1e-9));
        assert_eq!(tree.key_of(c_id), Some(5.0));
        assert_eq!(tree.key_of(holder_id), Some(100.0));
        let keys = |rows: Vec<Category>| -> Vec<(Uuid, Option<Uuid>, f64)> {
            rows.into_iter()
                .map(|c| (c.id, c.parent_id, c.order_key))
                .collect()
        };
        assert_eq!(keys(tree.store.rows()), keys(before));

        // The next drop lands exactly where it was aimed
        tree.store.fail_patches(false);
        assert_ok!(tree.controller.commit(m_id, c_id, DropIntent::Below).await);
        let forest = tree.controller.forest();
        assert_eq!(forest.roots(), &[a_id, b_id, c_id, m_id, holder_id]);
    }

    #[tokio::test]
    async fn test_missing_neighbour_reports_stale_snapshot() {
        let s = sample().await;
        // a sits directly above b and is deleted behind the controller's back
        s.tree.store.remove(s.a);

        let error = assert_err!(s.tree.controller.commit(s.m, s.b, DropIntent::Above).await);

        assert!(matches!(error, ReorderError::StaleSnapshot(_)));
        assert_eq!(s.tree.store.write_count(), 0);
        assert_eq!(s.tree.key_of(s.m), Some(10.0));
        assert!(!s.tree.controller.forest().contains(s.a));

        // After the reload the same drop computes from the current siblings
        let outcome = assert_ok!(s.tree.controller.commit(s.m, s.b, DropIntent::Above).await);
        assert!(matches!(outcome, ReorderOutcome::Moved { order_key, .. } if order_key == 10.0));
    }

    #[tokio::test]
    async fn test_renumbered_neighbour_reports_stale_snapshot() {
        let s = sample().await;
        // Another editor pushed c to the end of the root group
        assert_ok!(
            s.tree
                .store
                .batch_patch(
                    s.tree.store_id,
                    &[KeyAssignment {
                        id: s.c,
                        order_key: 500.0,
                    }],
                )
                .await
        );

        let error = assert_err!(s.tree.controller.commit(s.m, s.c, DropIntent::Above).await);

        assert!(matches!(error, ReorderError::StaleSnapshot(_)));
        assert_eq!(s.tree.store.write_count(), 1);
        assert_eq!(s.tree.key_of(s.m), Some(10.0));
        assert_eq!(s.tree.controller.forest().get(s.c).map(|c| c.order_key), Some(500.0));
    }

    /// Holds `patch_category` until a permit is released
    struct GatedStore {
        inner: Arc<InMemoryCategoryStore>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl CategoryStore for GatedStore {
        async fn load_snapshot(&self, store_id: Uuid) -> Result<Vec<Category>, PersistError> {
            self.inner.load_snapshot(store_id).await
        }

        async fn patch_category(
            &self,
            store_id: Uuid,
            id: Uuid,
            patch: OrderingPatch,
        ) -> Result<(), PersistError> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| PersistError::Backend(e.to_string()))?;
            self.inner.patch_category(store_id, id, patch).await
        }

        async fn batch_patch(
            &self,
            store_id: Uuid,
            assignments: &[KeyAssignment],
        ) -> Result<(), PersistError> {
            self.inner.batch_patch(store_id, assignments).await
        }

        async fn find_by_id(
            &self,
            store_id: Uuid,
            id: Uuid,
        ) -> Result<Option<Category>, PersistError> {
            self.inner.find_by_id(store_id, id).await
        }

        async fn find_by_slug(
            &self,
            store_id: Uuid,
            slug: &str,
        ) -> Result<Option<Category>, PersistError> {
            self.inner.find_by_slug(store_id, slug).await
        }

        async fn insert(&self, category: NewCategory) -> Result<Category, PersistError> {
            self.inner.insert(category).await
        }

        async fn update_details(
            &self,
            store_id: Uuid,
            id: Uuid,
            update: &CategoryUpdate,
        ) -> Result<Category, PersistError> {
            self.inner.update_details(store_id, id, update).await
        }

        async fn delete(&self, store_id: Uuid, id: Uuid) -> Result<(), PersistError> {
            self.inner.delete(store_id, id).await
        }
    }

    async fn gated_sample() -> (Sample, Arc<ReorderController>, Arc<Semaphore>) {
        let s = sample().await;
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(GatedStore {
            inner: s.tree.store.clone(),
            gate: gate.clone(),
        });
        let controller = ReorderController::load(
            store,
            s.tree.store_id,
            OrderKeyPolicy::default(),
            DropZones::default(),
        )
        .await
        .unwrap();
        (s, Arc::new(controller), gate)
    }

    #[tokio::test]
    async fn test_drop_while_committing_is_busy() {
        let (s, controller, gate) = gated_sample().await;

        let first = {
            let controller = controller.clone();
            let (m, b) = (s.m, s.b);
            tokio::spawn(async move { controller.commit(m, b, DropIntent::Above).await })
        };
        while !matches!(*controller.lock_state(), GestureState::Committing { .. }) {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            controller.commit(s.a, s.c, DropIntent::Below).await,
            Err(ReorderError::Busy)
        );
        let gesture = assert_ok!(controller.begin_drag(s.a));
        assert_eq!(
            gesture.drop_on(s.c, 0.9).await,
            Err(ReorderError::Busy)
        );

        gate.add_permits(1);
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, Ok(ReorderOutcome::Moved { .. })));
        assert_eq!(*controller.lock_state(), GestureState::Idle);
        assert_eq!(s.tree.key_of(s.m), Some(15.0));
    }

    #[tokio::test]
    async fn test_abandoned_commit_returns_to_idle() {
        let (s, controller, _gate) = gated_sample().await;

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            controller.commit(s.m, s.b, DropIntent::Above),
        )
        .await;

        assert!(result.is_err(), "commit should still be waiting on the store");
        assert_eq!(*controller.lock_state(), GestureState::Idle);
        assert_eq!(s.tree.key_of(s.m), Some(10.0));
    }
}
