//! Bucketed grid index for item lookup.
//!
//! Space is cut into fixed-size square buckets; each element is registered
//! in every bucket its bounds touch. Items are almost always a single cell,
//! so a query usually opens one or two buckets.

use std::collections::HashMap;

use crate::geom::Rect;

use super::SpatialIndex;

const BUCKET_SIZE: i32 = 8;

fn bucket_range(lo: i32, hi_exclusive: i32) -> std::ops::RangeInclusive<i32> {
    bucket_of(lo)..=bucket_of(hi_exclusive - 1)
}

fn bucket_of(v: i32) -> i32 {
    v.div_euclid(BUCKET_SIZE)
}

/// Grid bucket index.
#[derive(Debug, Default)]
pub struct GridIndex {
    buckets: HashMap<(i32, i32), Vec<u64>>,
    bounds: HashMap<u64, Rect>,
}

impl GridIndex {
    pub fn new() -> Self {
        GridIndex::default()
    }

    fn each_bucket(rect: &Rect) -> impl Iterator<Item = (i32, i32)> {
        let xs = bucket_range(rect.x, rect.right());
        let ys = bucket_range(rect.y, rect.bottom());
        ys.flat_map(move |by| xs.clone().map(move |bx| (bx, by)))
    }
}

impl SpatialIndex for GridIndex {
    fn insert(&mut self, id: u64, bounds: Rect) {
        self.remove(id);
        for key in Self::each_bucket(&bounds) {
            self.buckets.entry(key).or_default().push(id);
        }
        self.bounds.insert(id, bounds);
    }

    fn remove(&mut self, id: u64) -> bool {
        let Some(bounds) = self.bounds.remove(&id) else {
            return false;
        };
        for key in Self::each_bucket(&bounds) {
            if let Some(bucket) = self.buckets.get_mut(&key) {
                bucket.retain(|other| *other != id);
                if bucket.is_empty() {
                    self.buckets.remove(&key);
                }
            }
        }
        true
    }

    fn query(&self, area: &Rect) -> Vec<u64> {
        let mut out = Vec::new();
        for key in Self::each_bucket(area) {
            let Some(bucket) = self.buckets.get(&key) else {
                continue;
            };
            for id in bucket {
                if self.bounds[id].overlaps(area) {
                    out.push(*id);
                }
            }
        }
        // An element spanning several buckets shows up once per bucket
        out.sort_unstable();
        out.dedup();
        out
    }

    fn bounds_of(&self, id: u64) -> Option<Rect> {
        self.bounds.get(&id).copied()
    }

    fn elements(&self) -> Vec<(u64, Rect)> {
        let mut out: Vec<(u64, Rect)> = self.bounds.iter().map(|(id, r)| (*id, *r)).collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }

    fn len(&self) -> usize {
        self.bounds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spanning_element_reported_once() {
        let mut index = GridIndex::new();
        // Crosses several buckets in both axes
        index.insert(1, Rect::new(-3, -3, 30, 30));
        let hits = index.query(&Rect::new(-10, -10, 60, 60));
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn negative_coordinates_bucket_correctly() {
        let mut index = GridIndex::new();
        index.insert(1, Rect::new(-1, -1, 2, 2));
        index.insert(2, Rect::new(-20, -20, 2, 2));

        assert_eq!(index.query(&Rect::new(-2, -2, 3, 3)), vec![1]);
        assert_eq!(index.query(&Rect::new(-21, -21, 3, 3)), vec![2]);
    }

    #[test]
    fn empty_buckets_are_dropped() {
        let mut index = GridIndex::new();
        index.insert(1, Rect::new(0, 0, 40, 40));
        index.remove(1);
        assert!(index.buckets.is_empty());
        assert!(index.is_empty());
    }
}
