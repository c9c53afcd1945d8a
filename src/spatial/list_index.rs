//! Linear-scan index for creature lookup.
//!
//! A zone rarely holds more than a few dozen creatures and the movement
//! code walks all of them every turn regardless, so a plain vector beats
//! any tree here. Doubles as the reference implementation the other
//! indices are tested against.

use crate::geom::Rect;

use super::SpatialIndex;

#[derive(Debug, Default)]
pub struct ListIndex {
    entries: Vec<(u64, Rect)>,
}

impl ListIndex {
    pub fn new() -> Self {
        ListIndex::default()
    }
}

impl SpatialIndex for ListIndex {
    fn insert(&mut self, id: u64, bounds: Rect) {
        if let Some(entry) = self.entries.iter_mut().find(|(other, _)| *other == id) {
            entry.1 = bounds;
        } else {
            self.entries.push((id, bounds));
        }
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(other, _)| *other != id);
        self.entries.len() < before
    }

    fn query(&self, area: &Rect) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|(_, bounds)| bounds.overlaps(area))
            .map(|(id, _)| *id)
            .collect()
    }

    fn bounds_of(&self, id: u64) -> Option<Rect> {
        self.entries
            .iter()
            .find(|(other, _)| *other == id)
            .map(|(_, bounds)| *bounds)
    }

    fn elements(&self) -> Vec<(u64, Rect)> {
        let mut out = self.entries.clone();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_preserved_in_queries() {
        let mut index = ListIndex::new();
        index.insert(5, Rect::new(0, 0, 2, 2));
        index.insert(1, Rect::new(1, 1, 2, 2));
        index.insert(9, Rect::new(0, 1, 2, 2));
        assert_eq!(index.query(&Rect::new(0, 0, 4, 4)), vec![5, 1, 9]);
    }

    #[test]
    fn reinsert_updates_in_place() {
        let mut index = ListIndex::new();
        index.insert(5, Rect::new(0, 0, 2, 2));
        index.insert(5, Rect::new(10, 10, 2, 2));
        assert_eq!(index.len(), 1);
        assert_eq!(index.bounds_of(5), Some(Rect::new(10, 10, 2, 2)));
    }
}
