use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::features::categories::models::Category;

/// Flat category snapshot reassembled into an id-indexed forest.
///
/// Child lists and the root list hold ids in ascending `order_key` order.
/// Records whose parent cannot be resolved are placed at root level and
/// also listed in [`CategoryForest::detached`].
#[derive(Debug, Clone, Default)]
pub struct CategoryForest {
    nodes: HashMap<Uuid, Category>,
    parents: HashMap<Uuid, Uuid>,
    children: HashMap<Uuid, Vec<Uuid>>,
    roots: Vec<Uuid>,
    detached: Vec<Uuid>,
}

impl CategoryForest {
    /// Build the forest from a flat snapshot.
    ///
    /// Sorting once up front keeps every child list ordered without a second
    /// pass. Dangling and self references, and records caught in a stored
    /// parent cycle, are tolerated: they end up at root level.
    pub fn build(categories: Vec<Category>) -> Self {
        let mut sorted = categories;
        // sort_by is stable, equal keys keep snapshot order
        sorted.sort_by(|a, b| a.order_key.total_cmp(&b.order_key));

        let mut forest = CategoryForest::default();
        let mut links = Vec::with_capacity(sorted.len());
        for category in sorted {
            if forest.nodes.contains_key(&category.id) {
                tracing::warn!(
                    "Duplicate category {} in snapshot, keeping the first record",
                    category.id
                );
                continue;
            }
            links.push((category.id, category.parent_id));
            forest.nodes.insert(category.id, category);
        }

        for &(id, parent_id) in &links {
            match parent_id {
                Some(parent_id) if parent_id != id && forest.nodes.contains_key(&parent_id) => {
                    forest.parents.insert(id, parent_id);
                    forest.children.entry(parent_id).or_default().push(id);
                }
                Some(parent_id) => {
                    tracing::warn!(
                        "Category {} references unknown parent {}, placing it at root level",
                        id,
                        parent_id
                    );
                    forest.detached.push(id);
                    forest.roots.push(id);
                }
                None => forest.roots.push(id),
            }
        }

        let order: Vec<Uuid> = links.into_iter().map(|(id, _)| id).collect();
        forest.break_parent_cycles(&order);
        forest
    }

    /// Records on a stored parent cycle are unreachable from any root.
    /// For each such cycle the lowest-keyed member is cut loose and promoted.
    fn break_parent_cycles(&mut self, order: &[Uuid]) {
        let mut reached = HashSet::with_capacity(self.nodes.len());
        for root in self.roots.clone() {
            self.mark_subtree(root, &mut reached);
        }
        if reached.len() == self.nodes.len() {
            return;
        }

        let rank: HashMap<Uuid, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for id in order {
            if reached.contains(id) {
                continue;
            }

            // Walk up until a node repeats; that node sits on the cycle
            let mut seen = HashSet::new();
            let mut cursor = *id;
            while seen.insert(cursor) {
                match self.parents.get(&cursor) {
                    Some(parent) => cursor = *parent,
                    None => break,
                }
            }

            let mut member = cursor;
            let mut lowest = cursor;
            loop {
                match self.parents.get(&member) {
                    Some(parent) if *parent != cursor => {
                        member = *parent;
                        if rank.get(&member) < rank.get(&lowest) {
                            lowest = member;
                        }
                    }
                    _ => break,
                }
            }

            if let Some(parent) = self.parents.remove(&lowest) {
                if let Some(siblings) = self.children.get_mut(&parent) {
                    siblings.retain(|child| *child != lowest);
                }
            }
            tracing::warn!(
                "Category {} is part of a parent cycle, placing it at root level",
                lowest
            );
            self.detached.push(lowest);
            self.roots.push(lowest);
            self.mark_subtree(lowest, &mut reached);
        }

        self.roots
            .sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));
    }

    fn mark_subtree(&self, start: Uuid, reached: &mut HashSet<Uuid>) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if reached.insert(id) {
                stack.extend(self.children(id).iter().copied());
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Category> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[Uuid] {
        &self.roots
    }

    /// Children of `id` in display order (empty for leaves and unknown ids)
    pub fn children(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sibling group under `parent_id`; `None` is the root group
    pub fn group(&self, parent_id: Option<Uuid>) -> &[Uuid] {
        match parent_id {
            Some(parent_id) => self.children(parent_id),
            None => &self.roots,
        }
    }

    /// Parent as placed in the forest. Detached records report `None` even
    /// when their stored `parent_id` is set.
    pub fn parent_of(&self, id: Uuid) -> Option<Uuid> {
        self.parents.get(&id).copied()
    }

    /// Records placed at root level because their parent could not be resolved
    pub fn detached(&self) -> &[Uuid] {
        &self.detached
    }

    /// Ordering keys of a sibling group in display order
    pub fn group_keys(&self, parent_id: Option<Uuid>) -> Vec<(Uuid, f64)> {
        self.group(parent_id)
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|c| (c.id, c.order_key)))
            .collect()
    }

    /// Depth-first walk in display order, paired with each node's depth
    pub fn walk(&self) -> Vec<(&Category, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(Uuid, usize)> = self.roots.iter().rev().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            if let Some(category) = self.nodes.get(&id) {
                out.push((category, depth));
                stack.extend(self.children(id).iter().rev().map(|child| (*child, depth + 1)));
            }
        }
        out
    }
}
