//! Maps: the unit the atlas caches.
//!
//! A map is either one big outdoor zone or a dungeon of several zones wired
//! together by doors. The connection table lives on the map, not the zones,
//! so a placeholder zone can already be a door destination before it has
//! any contents.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::geom::Point;
use crate::zone::Zone;

/// A travel point inside a zone leading to another zone of the same map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    /// Cell inside the source zone. Always lands on open terrain once the
    /// source zone has been generated.
    pub position: Point,
    /// Index of the destination zone.
    pub destination: usize,
}

/// What a map is made of.
#[derive(Debug)]
pub enum MapKind {
    /// A single outdoor zone.
    World,
    /// Several zones with a door graph.
    Dungeon {
        /// Outgoing doors per source zone index.
        connections: HashMap<usize, Vec<Door>>,
    },
}

/// A cached world or dungeon with its zones.
#[derive(Debug)]
pub struct Map {
    pub id: u32,
    kind: MapKind,
    zones: Vec<Zone>,
}

impl Map {
    pub fn world(id: u32, zone: Zone) -> Self {
        Map {
            id,
            kind: MapKind::World,
            zones: vec![zone],
        }
    }

    pub fn dungeon(id: u32, zones: Vec<Zone>, connections: HashMap<usize, Vec<Door>>) -> Self {
        Map {
            id,
            kind: MapKind::Dungeon { connections },
            zones,
        }
    }

    pub fn kind(&self) -> &MapKind {
        &self.kind
    }

    pub fn is_dungeon(&self) -> bool {
        matches!(self.kind, MapKind::Dungeon { .. })
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn zone(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    pub fn zone_mut(&mut self, index: usize) -> Option<&mut Zone> {
        self.zones.get_mut(index)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zones_mut(&mut self) -> &mut [Zone] {
        &mut self.zones
    }

    /// Doors leading out of a zone. A world map has none.
    pub fn doors_from(&self, index: usize) -> &[Door] {
        match &self.kind {
            MapKind::World => &[],
            MapKind::Dungeon { connections } => connections
                .get(&index)
                .map(|doors| doors.as_slice())
                .unwrap_or(&[]),
        }
    }

    /// Register a door out of `from`. No-op counterpart on the destination
    /// side; callers add the return door themselves.
    pub fn connect(&mut self, from: usize, door: Door) {
        if let MapKind::Dungeon { connections } = &mut self.kind {
            connections.entry(from).or_default().push(door);
        }
    }

    /// Rewrite the position of the door from `from` to `destination`. Used
    /// when the source zone is generated and real entry cells exist.
    pub fn place_door(&mut self, from: usize, destination: usize, position: Point) {
        if let MapKind::Dungeon { connections } = &mut self.kind {
            if let Some(doors) = connections.get_mut(&from) {
                if let Some(door) = doors.iter_mut().find(|d| d.destination == destination) {
                    door.position = position;
                }
            }
        }
    }

    /// Whether every zone can reach zone 0 through the door graph.
    pub fn all_zones_reach_entrance(&self) -> bool {
        let MapKind::Dungeon { connections } = &self.kind else {
            return true;
        };
        // Doors come in matched pairs, so reachability from zone 0 suffices
        let mut seen: HashSet<usize> = HashSet::new();
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            if !seen.insert(index) {
                continue;
            }
            if let Some(doors) = connections.get(&index) {
                stack.extend(doors.iter().map(|d| d.destination));
            }
        }
        (0..self.zones.len()).all(|i| seen.contains(&i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_dungeon(count: usize) -> Map {
        let zones = (0..count)
            .map(|i| Zone::placeholder(format!("level {i}"), "crypt"))
            .collect();
        let mut map = Map::dungeon(3, zones, HashMap::new());
        for i in 0..count - 1 {
            map.connect(
                i,
                Door {
                    position: Point::new(0, 0),
                    destination: i + 1,
                },
            );
            map.connect(
                i + 1,
                Door {
                    position: Point::new(0, 0),
                    destination: i,
                },
            );
        }
        map
    }

    #[test]
    fn world_maps_have_one_zone_and_no_doors() {
        let map = Map::world(1, Zone::new("overworld", 100, 100));
        assert!(!map.is_dungeon());
        assert_eq!(map.zone_count(), 1);
        assert!(map.doors_from(0).is_empty());
        assert!(map.all_zones_reach_entrance());
    }

    #[test]
    fn linear_dungeon_is_fully_reachable() {
        let map = linear_dungeon(4);
        assert!(map.all_zones_reach_entrance());
        assert_eq!(map.doors_from(1).len(), 2);
    }

    #[test]
    fn orphaned_zone_is_detected() {
        let zones = vec![
            Zone::placeholder("a", "crypt"),
            Zone::placeholder("b", "crypt"),
            Zone::placeholder("c", "crypt"),
        ];
        let mut map = Map::dungeon(9, zones, HashMap::new());
        map.connect(
            0,
            Door {
                position: Point::new(0, 0),
                destination: 1,
            },
        );
        assert!(!map.all_zones_reach_entrance());
    }

    #[test]
    fn place_door_rewrites_position() {
        let mut map = linear_dungeon(2);
        map.place_door(0, 1, Point::new(5, 7));
        assert_eq!(map.doors_from(0)[0].position, Point::new(5, 7));
    }
}
