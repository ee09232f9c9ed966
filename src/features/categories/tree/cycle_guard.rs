use std::collections::HashSet;

use uuid::Uuid;

use super::builder::CategoryForest;

/// True iff `node_id` is `ancestor_id` itself or sits somewhere below it.
///
/// Descends child lists from `ancestor_id`; ids missing from the forest have
/// no descendants.
pub fn is_descendant(forest: &CategoryForest, ancestor_id: Uuid, node_id: Uuid) -> bool {
    if ancestor_id == node_id {
        return true;
    }
    let mut visited = HashSet::new();
    descend(forest, ancestor_id, node_id, &mut visited)
}

fn descend(
    forest: &CategoryForest,
    current: Uuid,
    node_id: Uuid,
    visited: &mut HashSet<Uuid>,
) -> bool {
    if !visited.insert(current) {
        return false;
    }
    forest
        .children(current)
        .iter()
        .any(|child| *child == node_id || descend(forest, *child, node_id, visited))
}

/// Whether placing `moved_id` under `new_parent` would make it its own ancestor
pub fn creates_cycle(forest: &CategoryForest, moved_id: Uuid, new_parent: Option<Uuid>) -> bool {
    new_parent.is_some_and(|parent| is_descendant(forest, moved_id, parent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::sample_category;

    /// a -> b -> c, plus d at root
    fn chain() -> (CategoryForest, [Uuid; 4]) {
        let store_id = Uuid::now_v7();
        let a = sample_category(store_id, None, 10.0);
        let b = sample_category(store_id, Some(a.id), 10.0);
        let c = sample_category(store_id, Some(b.id), 10.0);
        let d = sample_category(store_id, None, 20.0);
        let ids = [a.id, b.id, c.id, d.id];
        (CategoryForest::build(vec![a, b, c, d]), ids)
    }

    #[test]
    fn test_node_is_its_own_descendant() {
        let (forest, [a, ..]) = chain();
        assert!(is_descendant(&forest, a, a));
    }

    #[test]
    fn test_descendants_found_at_any_depth() {
        let (forest, [a, b, c, d]) = chain();
        assert!(is_descendant(&forest, a, b));
        assert!(is_descendant(&forest, a, c));
        assert!(is_descendant(&forest, b, c));
        assert!(!is_descendant(&forest, c, a));
        assert!(!is_descendant(&forest, a, d));
        assert!(!is_descendant(&forest, d, a));
    }

    #[test]
    fn test_unknown_ids_have_no_descendants() {
        let (forest, [a, ..]) = chain();
        let unknown = Uuid::now_v7();
        assert!(!is_descendant(&forest, unknown, a));
        assert!(!is_descendant(&forest, a, unknown));
    }

    #[test]
    fn test_creates_cycle() {
        let (forest, [a, b, c, d]) = chain();
        assert!(creates_cycle(&forest, a, Some(c)));
        assert!(creates_cycle(&forest, b, Some(b)));
        assert!(!creates_cycle(&forest, c, Some(a)));
        assert!(!creates_cycle(&forest, a, Some(d)));
        assert!(!creates_cycle(&forest, a, None));
    }
}
