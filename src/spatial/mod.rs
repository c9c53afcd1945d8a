//! Spatial indices over zone contents.
//!
//! Each zone keeps three runtime indices tuned to what they hold: an AABB
//! tree for terrain regions (large, long-lived, heavily queried), bucketed
//! grid cells for items (small, churny), and a plain list for creatures
//! (few per zone, scanned constantly anyway). All three speak the same
//! trait so placement and query code does not care which it holds.
//!
//! Indices are runtime-only: they are rebuilt from zone contents on load
//! and never serialized.

mod aabb_tree;
mod grid_index;
mod list_index;

pub use aabb_tree::AabbTree;
pub use grid_index::GridIndex;
pub use list_index::ListIndex;

use crate::geom::Rect;

/// Lookup structure mapping element ids to bounds rectangles.
pub trait SpatialIndex {
    /// Insert an element. Re-inserting an existing id replaces its bounds.
    fn insert(&mut self, id: u64, bounds: Rect);

    /// Remove an element; `false` when the id was not present.
    fn remove(&mut self, id: u64) -> bool;

    /// Ids of all elements whose bounds overlap `area`, in no particular
    /// order.
    fn query(&self, area: &Rect) -> Vec<u64>;

    /// Bounds of one element.
    fn bounds_of(&self, id: u64) -> Option<Rect>;

    /// Every element with its bounds, sorted by id.
    fn elements(&self) -> Vec<(u64, Rect)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn exercise(index: &mut dyn SpatialIndex) {
        assert!(index.is_empty());

        index.insert(1, Rect::new(0, 0, 4, 4));
        index.insert(2, Rect::new(10, 10, 3, 3));
        index.insert(3, Rect::new(2, 2, 6, 6));
        assert_eq!(index.len(), 3);

        let mut hits = index.query(&Rect::new(1, 1, 3, 3));
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 3]);

        assert_eq!(index.bounds_of(2), Some(Rect::new(10, 10, 3, 3)));
        assert_eq!(index.bounds_of(99), None);

        // Replacement moves the element
        index.insert(2, Rect::new(0, 0, 1, 1));
        assert_eq!(index.len(), 3);
        let mut hits = index.query(&Rect::at(Point::new(0, 0)));
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);

        assert!(index.remove(1));
        assert!(!index.remove(1));
        assert_eq!(index.len(), 2);
        assert_eq!(index.bounds_of(1), None);

        let ids: Vec<u64> = index.elements().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn all_indices_share_behaviour() {
        exercise(&mut AabbTree::new());
        exercise(&mut GridIndex::new());
        exercise(&mut ListIndex::new());
    }

    /// Randomized cross-check: every index answers queries exactly like the
    /// brute-force list.
    #[test]
    fn indices_agree_under_random_churn() {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let mut tree = AabbTree::new();
        let mut grid = GridIndex::new();
        let mut list = ListIndex::new();

        for round in 0..400 {
            let id = rng.gen_range(0..60u64);
            if rng.gen_bool(0.3) {
                tree.remove(id);
                grid.remove(id);
                list.remove(id);
            } else {
                let r = Rect::new(
                    rng.gen_range(-20..40),
                    rng.gen_range(-20..40),
                    rng.gen_range(1..12),
                    rng.gen_range(1..12),
                );
                tree.insert(id, r);
                grid.insert(id, r);
                list.insert(id, r);
            }

            let probe = Rect::new(
                rng.gen_range(-20..40),
                rng.gen_range(-20..40),
                rng.gen_range(1..16),
                rng.gen_range(1..16),
            );
            let mut expected = list.query(&probe);
            expected.sort_unstable();
            let mut from_tree = tree.query(&probe);
            from_tree.sort_unstable();
            let mut from_grid = grid.query(&probe);
            from_grid.sort_unstable();

            assert_eq!(from_tree, expected, "tree diverged in round {round}");
            assert_eq!(from_grid, expected, "grid diverged in round {round}");
            assert_eq!(tree.len(), list.len());
            assert_eq!(grid.len(), list.len());
        }
    }
}
