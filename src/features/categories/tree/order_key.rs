use thiserror::Error;
use uuid::Uuid;

use super::builder::CategoryForest;
use super::drop_intent::DropIntent;
use crate::features::categories::models::KeyAssignment;
use crate::shared::constants::{DEFAULT_ORDER_KEY_MIN_GAP, DEFAULT_ORDER_KEY_STEP};

/// Spacing rules for sibling ordering keys
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderKeyPolicy {
    pub step: f64,
    pub min_gap: f64,
}

impl Default for OrderKeyPolicy {
    fn default() -> Self {
        Self {
            step: DEFAULT_ORDER_KEY_STEP,
            min_gap: DEFAULT_ORDER_KEY_MIN_GAP,
        }
    }
}

/// Where a moved category lands
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub parent_id: Option<Uuid>,
    pub order_key: f64,
    /// Position among the destination siblings, moved category excluded
    pub index: usize,
    /// Siblings directly before and after the new position; the key was
    /// computed from theirs
    pub prev_id: Option<Uuid>,
    pub next_id: Option<Uuid>,
    /// Renumbered keys for the destination group, empty unless a rebalance
    /// was needed. Must be persisted before the move itself.
    pub rebalance: Vec<KeyAssignment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    /// The drop resolves to the category's current position
    Unchanged,
    Move(Placement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("Category {0} is not in the current snapshot")]
    UnknownCategory(Uuid),
}

impl OrderKeyPolicy {
    /// Compute the new parent and ordering key for `moved_id` dropped onto
    /// `target_id` with the given intent.
    ///
    /// Does not check for cycles; callers run the cycle guard first.
    pub fn allocate(
        &self,
        forest: &CategoryForest,
        moved_id: Uuid,
        target_id: Uuid,
        intent: DropIntent,
    ) -> Result<Allocation, AllocationError> {
        if !forest.contains(moved_id) {
            return Err(AllocationError::UnknownCategory(moved_id));
        }
        if !forest.contains(target_id) {
            return Err(AllocationError::UnknownCategory(target_id));
        }
        if moved_id == target_id {
            return Ok(Allocation::Unchanged);
        }

        let parent_id = match intent {
            DropIntent::Inside => Some(target_id),
            DropIntent::Above | DropIntent::Below => forest.parent_of(target_id),
        };
        let siblings: Vec<(Uuid, f64)> = forest
            .group_keys(parent_id)
            .into_iter()
            .filter(|(id, _)| *id != moved_id)
            .collect();

        let index = match intent {
            DropIntent::Inside => siblings.len(),
            DropIntent::Above | DropIntent::Below => {
                let position = siblings
                    .iter()
                    .position(|(id, _)| *id == target_id)
                    .ok_or(AllocationError::UnknownCategory(target_id))?;
                if intent == DropIntent::Below {
                    position + 1
                } else {
                    position
                }
            }
        };

        if forest.parent_of(moved_id) == parent_id
            && forest.group(parent_id).iter().position(|id| *id == moved_id) == Some(index)
        {
            return Ok(Allocation::Unchanged);
        }

        let prev_id = index
            .checked_sub(1)
            .and_then(|i| siblings.get(i))
            .map(|(id, _)| *id);
        let next_id = siblings.get(index).map(|(id, _)| *id);

        let keys: Vec<f64> = siblings.iter().map(|(_, key)| *key).collect();
        let placement = match self.key_at(&keys, index) {
            Some(order_key) => Placement {
                parent_id,
                order_key,
                index,
                prev_id,
                next_id,
                rebalance: Vec::new(),
            },
            None => {
                tracing::debug!(
                    "Sibling keys under {:?} too tight at index {}, rebalancing {} categories",
                    parent_id,
                    index,
                    siblings.len()
                );
                Placement {
                    parent_id,
                    order_key: self.rebalanced_key(index, siblings.len()),
                    index,
                    prev_id,
                    next_id,
                    rebalance: self.rebalance(siblings.iter().map(|(id, _)| *id)),
                }
            }
        };

        Ok(Allocation::Move(placement))
    }

    /// Key for position `index` in a sorted key list, or `None` when the
    /// neighbours leave no safe room and the group needs a rebalance
    fn key_at(&self, keys: &[f64], index: usize) -> Option<f64> {
        let prev = index.checked_sub(1).and_then(|i| keys.get(i)).copied();
        let next = keys.get(index).copied();

        let candidate = match (prev, next) {
            (None, None) => self.step,
            (None, Some(next)) => next - self.step,
            (Some(prev), None) => prev + self.step,
            (Some(prev), Some(next)) => {
                let half_gap = (next - prev) / 2.0;
                if half_gap.is_nan() || half_gap < self.min_gap {
                    return None;
                }
                prev + half_gap
            }
        };

        let fits = candidate.is_finite()
            && prev.is_none_or(|prev| candidate > prev)
            && next.is_none_or(|next| candidate < next);
        fits.then_some(candidate)
    }

    /// Key at `index` once a group of `len` siblings reads `0, step, 2·step, …`
    fn rebalanced_key(&self, index: usize, len: usize) -> f64 {
        if len == 0 {
            self.step
        } else if index == 0 {
            -self.step
        } else if index >= len {
            len as f64 * self.step
        } else {
            (index as f64 - 0.5) * self.step
        }
    }

    /// Renumber a sibling group, given in display order, to `0, step, 2·step, …`
    pub fn rebalance(&self, ordered_ids: impl IntoIterator<Item = Uuid>) -> Vec<KeyAssignment> {
        ordered_ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| KeyAssignment {
                id,
                order_key: i as f64 * self.step,
            })
            .collect()
    }

    /// Key for a new category placed after all current siblings
    pub fn append_key(&self, sibling_keys: &[f64]) -> f64 {
        sibling_keys
            .iter()
            .copied()
            .filter(|key| key.is_finite())
            .reduce(f64::max)
            .map_or(self.step, |max| max + self.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::categories::models::Category;
    use crate::shared::test_helpers::sample_category;

    struct Fixture {
        categories: Vec<Category>,
        store_id: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                categories: Vec::new(),
                store_id: Uuid::now_v7(),
            }
        }

        fn add(&mut self, parent_id: Option<Uuid>, order_key: f64) -> Uuid {
            let category = sample_category(self.store_id, parent_id, order_key);
            let id = category.id;
            self.categories.push(category);
            id
        }

        fn forest(&self) -> CategoryForest {
            CategoryForest::build(self.categories.clone())
        }

        fn apply(&mut self, moved_id: Uuid, placement: &Placement) {
            for assignment in &placement.rebalance {
                if let Some(c) = self.categories.iter_mut().find(|c| c.id == assignment.id) {
                    c.order_key = assignment.order_key;
                }
            }
            if let Some(c) = self.categories.iter_mut().find(|c| c.id == moved_id) {
                c.parent_id = placement.parent_id;
                c.order_key = placement.order_key;
            }
        }
    }

    fn expect_move(allocation: Allocation) -> Placement {
        match allocation {
            Allocation::Move(placement) => placement,
            Allocation::Unchanged => panic!("expected a move, got Unchanged"),
        }
    }

    /// Root group keyed [10, 20, 30] plus a separate "moved" category nested
    /// under another root so it never belongs to the destination group
    fn ten_twenty_thirty() -> (Fixture, [Uuid; 3], Uuid) {
        let mut fx = Fixture::new();
        let a = fx.add(None, 10.0);
        let b = fx.add(None, 20.0);
        let c = fx.add(None, 30.0);
        let holder = fx.add(None, 40.0);
        let moved = fx.add(Some(holder), 10.0);
        (fx, [a, b, c], moved)
    }

    #[test]
    fn test_above_middle_sibling_takes_midpoint() {
        let (fx, [a, b, _], moved) = ten_twenty_thirty();
        let placement = expect_move(
            OrderKeyPolicy::default()
                .allocate(&fx.forest(), moved, b, DropIntent::Above)
                .unwrap(),
        );
        assert_eq!(placement.order_key, 15.0);
        assert_eq!(placement.parent_id, None);
        assert_eq!(placement.index, 1);
        assert_eq!(placement.prev_id, Some(a));
        assert_eq!(placement.next_id, Some(b));
        assert!(placement.rebalance.is_empty());
    }

    #[test]
    fn test_below_last_sibling_adds_step() {
        let mut fx = Fixture::new();
        let parent = fx.add(None, 10.0);
        fx.add(Some(parent), 10.0);
        fx.add(Some(parent), 20.0);
        let last = fx.add(Some(parent), 30.0);
        let moved = fx.add(None, 20.0);

        let placement = expect_move(
            OrderKeyPolicy::default()
                .allocate(&fx.forest(), moved, last, DropIntent::Below)
                .unwrap(),
        );
        assert_eq!(placement.order_key, 40.0);
        assert_eq!(placement.parent_id, Some(parent));
        assert_eq!(placement.prev_id, Some(last));
        assert_eq!(placement.next_id, None);
    }

    #[test]
    fn test_above_first_sibling_subtracts_step() {
        let (fx, [a, _, _], moved) = ten_twenty_thirty();
        let placement = expect_move(
            OrderKeyPolicy::default()
                .allocate(&fx.forest(), moved, a, DropIntent::Above)
                .unwrap(),
        );
        assert_eq!(placement.order_key, 0.0);
        assert_eq!(placement.index, 0);
    }

    #[test]
    fn test_inside_empty_target_uses_base_key() {
        let (fx, [_, b, _], moved) = ten_twenty_thirty();
        let placement = expect_move(
            OrderKeyPolicy::default()
                .allocate(&fx.forest(), moved, b, DropIntent::Inside)
                .unwrap(),
        );
        assert_eq!(placement.order_key, 10.0);
        assert_eq!(placement.parent_id, Some(b));
    }

    #[test]
    fn test_inside_target_with_children_appends() {
        let mut fx = Fixture::new();
        let target = fx.add(None, 10.0);
        fx.add(Some(target), 5.0);
        fx.add(Some(target), 42.0);
        let moved = fx.add(None, 20.0);

        let placement = expect_move(
            OrderKeyPolicy::default()
                .allocate(&fx.forest(), moved, target, DropIntent::Inside)
                .unwrap(),
        );
        assert_eq!(placement.order_key, 52.0);
        assert_eq!(placement.index, 2);
    }

    #[test]
    fn test_moved_category_excluded_from_siblings() {
        let mut fx = Fixture::new();
        let moved = fx.add(None, 10.0);
        fx.add(None, 20.0);
        let last = fx.add(None, 30.0);

        let placement = expect_move(
            OrderKeyPolicy::default()
                .allocate(&fx.forest(), moved, last, DropIntent::Above)
                .unwrap(),
        );
        assert_eq!(placement.order_key, 25.0);
        assert_eq!(placement.index, 1);
    }

    #[test]
    fn test_drop_at_current_position_is_unchanged() {
        let mut fx = Fixture::new();
        let parent = fx.add(None, 10.0);
        let first = fx.add(Some(parent), 10.0);
        let moved = fx.add(Some(parent), 20.0);
        let last = fx.add(Some(parent), 30.0);
        let forest = fx.forest();
        let policy = OrderKeyPolicy::default();

        for (target, intent) in [
            (first, DropIntent::Below),
            (last, DropIntent::Above),
            (moved, DropIntent::Inside),
        ] {
            assert_eq!(
                policy.allocate(&forest, moved, target, intent).unwrap(),
                Allocation::Unchanged,
                "{} {}",
                intent,
                target
            );
        }

        // Already the last child of its parent
        assert_eq!(
            policy
                .allocate(&forest, last, parent, DropIntent::Inside)
                .unwrap(),
            Allocation::Unchanged
        );
    }

    #[test]
    fn test_unknown_ids_are_reported() {
        let (fx, [a, _, _], _) = ten_twenty_thirty();
        let unknown = Uuid::now_v7();
        let policy = OrderKeyPolicy::default();
        assert_eq!(
            policy.allocate(&fx.forest(), unknown, a, DropIntent::Above),
            Err(AllocationError::UnknownCategory(unknown))
        );
        assert_eq!(
            policy.allocate(&fx.forest(), a, unknown, DropIntent::Inside),
            Err(AllocationError::UnknownCategory(unknown))
        );
    }

    #[test]
    fn test_insertion_lands_at_intended_index() {
        let mut fx = Fixture::new();
        let group: Vec<Uuid> = [3.0, 7.5, 8.0, 100.0, 250.0]
            .into_iter()
            .map(|key| fx.add(None, key))
            .collect();
        let holder = fx.add(None, 1000.0);
        let moved = fx.add(Some(holder), 1.0);
        let forest = fx.forest();
        let policy = OrderKeyPolicy::default();

        for (position, target) in group.iter().enumerate() {
            for intent in [DropIntent::Above, DropIntent::Below] {
                let placement =
                    expect_move(policy.allocate(&forest, moved, *target, intent).unwrap());
                let expected = if intent == DropIntent::Above {
                    position
                } else {
                    position + 1
                };

                let mut keys: Vec<(Uuid, f64)> = forest
                    .group_keys(None)
                    .into_iter()
                    .filter(|(id, _)| group.contains(id))
                    .collect();
                keys.push((moved, placement.order_key));
                keys.sort_by(|a, b| a.1.total_cmp(&b.1));
                let actual = keys.iter().position(|(id, _)| *id == moved).unwrap();

                assert_eq!(actual, expected, "{} target #{}", intent, position);
            }
        }
    }

    #[test]
    fn test_tight_gap_triggers_rebalance() {
        let mut fx = Fixture::new();
        let a = fx.add(None, 0.0);
        let b = fx.add(None, 1e-9);
        let c = fx.add(None, 5.0);
        let moved = fx.add(None, 50.0);

        let placement = expect_move(
            OrderKeyPolicy::default()
                .allocate(&fx.forest(), moved, b, DropIntent::Above)
                .unwrap(),
        );

        assert_eq!(
            placement.rebalance,
            vec![
                KeyAssignment { id: a, order_key: 0.0 },
                KeyAssignment { id: b, order_key: 10.0 },
                KeyAssignment { id: c, order_key: 20.0 },
            ]
        );
        assert_eq!(placement.order_key, 5.0);
    }

    #[test]
    fn test_duplicate_keys_trigger_rebalance() {
        let mut fx = Fixture::new();
        fx.add(None, 10.0);
        let twin = fx.add(None, 10.0);
        let moved = fx.add(None, 30.0);

        let placement = expect_move(
            OrderKeyPolicy::default()
                .allocate(&fx.forest(), moved, twin, DropIntent::Above)
                .unwrap(),
        );
        assert_eq!(placement.rebalance.len(), 2);
        assert_eq!(placement.order_key, 5.0);
    }

    #[test]
    fn test_key_beyond_float_precision_triggers_rebalance() {
        let mut fx = Fixture::new();
        fx.add(None, 1.0);
        let huge = fx.add(None, 1e20);
        let holder = fx.add(Some(huge), 1.0);
        let moved = fx.add(Some(holder), 1.0);

        let placement = expect_move(
            OrderKeyPolicy::default()
                .allocate(&fx.forest(), moved, huge, DropIntent::Below)
                .unwrap(),
        );
        assert_eq!(placement.rebalance.len(), 2);
        assert_eq!(placement.order_key, 20.0);
    }

    #[test]
    fn test_rebalance_renumbers_in_prior_order() {
        let policy = OrderKeyPolicy::default();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::now_v7()).collect();

        let assignments = policy.rebalance(ids.clone());

        let keys: Vec<f64> = assignments.iter().map(|a| a.order_key).collect();
        assert_eq!(keys, vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        let order: Vec<Uuid> = assignments.iter().map(|a| a.id).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn test_repeated_midpoint_insertions_stay_ordered() {
        let mut fx = Fixture::new();
        let first = fx.add(None, 10.0);
        let last = fx.add(None, 20.0);
        let policy = OrderKeyPolicy::default();
        let mut rebalanced = false;
        let mut inserted = Vec::new();

        for _ in 0..80 {
            let moved = fx.add(None, 1e6);
            let placement =
                expect_move(policy.allocate(&fx.forest(), moved, first, DropIntent::Below).unwrap());
            rebalanced |= !placement.rebalance.is_empty();
            fx.apply(moved, &placement);
            inserted.push(moved);

            let forest = fx.forest();
            let roots = forest.roots();
            assert_eq!(roots.first(), Some(&first));
            assert_eq!(roots.get(1), Some(&moved));
            assert_eq!(roots.last(), Some(&last));
        }

        assert!(rebalanced, "80 halvings of a gap of 10 must hit the minimum gap");
        let forest = fx.forest();
        let mut expected = vec![first];
        expected.extend(inserted.iter().rev());
        expected.push(last);
        assert_eq!(forest.roots(), expected.as_slice());
    }

    #[test]
    fn test_append_key() {
        let policy = OrderKeyPolicy::default();
        assert_eq!(policy.append_key(&[]), 10.0);
        assert_eq!(policy.append_key(&[10.0, 35.0, 20.0]), 45.0);
        assert_eq!(policy.append_key(&[f64::NAN, 5.0]), 15.0);
    }
}
