//! Zones: one playable area of a map and everything placed in it.
//!
//! A zone owns its terrain regions outright and tracks creatures, items and
//! decorative tops by engine-assigned identifier only; resolving an id to an
//! actual entity is the engine's business. Each element class sits in the
//! spatial index suited to it. A freshly created dungeon zone is a random
//! placeholder carrying a theme name; entering it generates the contents and
//! `fix` pins them down for good.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Rect, Side};
use crate::spatial::{AabbTree, GridIndex, ListIndex, SpatialIndex};

/// A rectangle of uniform terrain, the unit of static zone content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Immutable once indexed; resizing means remove and re-add.
    pub bounds: Rect,
    /// Regions on higher layers shadow lower ones.
    pub layer: i32,
    pub terrain: String,
    /// Script hooks the engine runs when the region is touched.
    pub scripts: Vec<String>,
    /// Present while the region is still a random placeholder.
    pub theme: Option<String>,
}

impl Region {
    pub fn new(bounds: Rect, terrain: impl Into<String>) -> Self {
        Region {
            bounds,
            layer: 0,
            terrain: terrain.into(),
            scripts: Vec::new(),
            theme: None,
        }
    }

    pub fn on_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    /// Strip the random marker. One-way.
    pub fn fix(&mut self) {
        self.theme = None;
    }

    pub fn is_random(&self) -> bool {
        self.theme.is_some()
    }
}

/// Everything visible in one rectangle of a zone: the covering regions plus
/// the ids of creatures, items and tops. Gathered in one call so a renderer
/// does not make four queries per frame; z-ordering is the consumer's
/// business.
#[derive(Debug, Default)]
pub struct Renderables<'a> {
    pub regions: Vec<&'a Region>,
    pub creatures: Vec<u64>,
    pub items: Vec<u64>,
    pub tops: Vec<u64>,
}

/// One playable area.
#[derive(Debug, Default)]
pub struct Zone {
    pub name: String,
    width: u32,
    height: u32,
    theme: Option<String>,
    origin_theme: Option<String>,
    next_region_id: u64,
    regions: HashMap<u64, Region>,
    region_index: AabbTree,
    creatures: ListIndex,
    items: GridIndex,
    tops: GridIndex,
    lights: HashMap<Point, u32>,
    entries: Vec<Point>,
}

impl Zone {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Zone {
            name: name.into(),
            width,
            height,
            ..Zone::default()
        }
    }

    /// An ungenerated zone that materializes from `theme` on first entry.
    pub fn placeholder(name: impl Into<String>, theme: impl Into<String>) -> Self {
        let theme = theme.into();
        Zone {
            name: name.into(),
            theme: Some(theme.clone()),
            origin_theme: Some(theme),
            ..Zone::default()
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Whether the zone still awaits generation.
    pub fn is_random(&self) -> bool {
        self.theme.is_some()
    }

    /// Theme to generate from while the zone is a placeholder.
    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    /// Theme the zone was originally cut from. Survives `fix` so a lost or
    /// corrupted store entry can be regenerated.
    pub fn origin_theme(&self) -> Option<&str> {
        self.origin_theme.as_deref()
    }

    /// Pin the zone down: strips the random marker from the zone and every
    /// region. Idempotent; there is no way back.
    pub fn fix(&mut self) {
        self.theme = None;
        for region in self.regions.values_mut() {
            region.fix();
        }
    }

    // --- regions ---

    pub fn add_region(&mut self, region: Region) -> u64 {
        let id = self.next_region_id;
        self.next_region_id += 1;
        self.region_index.insert(id, region.bounds);
        self.regions.insert(id, region);
        id
    }

    pub fn remove_region(&mut self, id: u64) -> Option<Region> {
        self.region_index.remove(id);
        self.regions.remove(&id)
    }

    pub fn region(&self, id: u64) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Regions covering a point, topmost layer first.
    pub fn regions_at(&self, p: Point) -> Vec<&Region> {
        let mut ids = self.region_index.query(&Rect::at(p));
        // Higher layer wins; among equals the later addition wins
        ids.sort_unstable_by_key(|id| {
            let layer = self.regions[id].layer;
            (std::cmp::Reverse(layer), std::cmp::Reverse(*id))
        });
        ids.iter().map(|id| &self.regions[id]).collect()
    }

    /// Terrain visible at a point.
    pub fn terrain_at(&self, p: Point) -> Option<&str> {
        self.regions_at(p).first().map(|r| r.terrain.as_str())
    }

    pub fn regions_in(&self, area: &Rect) -> Vec<&Region> {
        self.region_index
            .query(area)
            .iter()
            .map(|id| &self.regions[id])
            .collect()
    }

    // --- creatures, items, tops ---

    pub fn add_creature(&mut self, id: u64, position: Point) {
        self.creatures.insert(id, Rect::at(position));
    }

    /// Creatures move by re-adding at the new position.
    pub fn move_creature(&mut self, id: u64, position: Point) {
        self.creatures.insert(id, Rect::at(position));
    }

    pub fn remove_creature(&mut self, id: u64) -> bool {
        self.creatures.remove(id)
    }

    pub fn creatures_in(&self, area: &Rect) -> Vec<u64> {
        self.creatures.query(area)
    }

    pub fn creature_position(&self, id: u64) -> Option<Point> {
        self.creatures.bounds_of(id).map(|r| Point::new(r.x, r.y))
    }

    pub fn creature_count(&self) -> usize {
        self.creatures.len()
    }

    pub fn add_item(&mut self, id: u64, position: Point) {
        self.items.insert(id, Rect::at(position));
    }

    pub fn remove_item(&mut self, id: u64) -> bool {
        self.items.remove(id)
    }

    pub fn items_in(&self, area: &Rect) -> Vec<u64> {
        self.items.query(area)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Decorative overlays (furniture, rubble); indexed like items.
    pub fn add_top(&mut self, id: u64, bounds: Rect) {
        self.tops.insert(id, bounds);
    }

    pub fn remove_top(&mut self, id: u64) -> bool {
        self.tops.remove(id)
    }

    pub fn tops_in(&self, area: &Rect) -> Vec<u64> {
        self.tops.query(area)
    }

    /// Union of every element class overlapping `area`.
    pub fn renderables_in(&self, area: &Rect) -> Renderables<'_> {
        Renderables {
            regions: self.regions_in(area),
            creatures: self.creatures_in(area),
            items: self.items_in(area),
            tops: self.tops_in(area),
        }
    }

    // --- lights ---

    /// Light sources are reference counted per cell; overlapping sources
    /// stack and removing one leaves the rest lit.
    pub fn add_light(&mut self, p: Point) {
        *self.lights.entry(p).or_insert(0) += 1;
    }

    pub fn remove_light(&mut self, p: Point) {
        if let Some(count) = self.lights.get_mut(&p) {
            *count -= 1;
            if *count == 0 {
                self.lights.remove(&p);
            }
        }
    }

    pub fn light_at(&self, p: Point) -> u32 {
        self.lights.get(&p).copied().unwrap_or(0)
    }

    pub fn lights(&self) -> impl Iterator<Item = (Point, u32)> + '_ {
        self.lights.iter().map(|(p, c)| (*p, *c))
    }

    // --- entries ---

    /// Cells suitable for arriving travellers and door placement. Always on
    /// open terrain; the generators guarantee it.
    pub fn add_entry(&mut self, p: Point) {
        self.entries.push(p);
    }

    pub fn entries(&self) -> &[Point] {
        &self.entries
    }

    /// Terrain along one edge, ordered by x (horizontal edges) or y
    /// (vertical edges). This is what a neighbouring zone blends its border
    /// against. Cells not covered by any region read as empty strings.
    pub fn edge_terrain(&self, side: Side) -> Vec<String> {
        let (len, fixed) = match side {
            Side::North => (self.width, 0),
            Side::South => (self.width, self.height as i32 - 1),
            Side::West => (self.height, 0),
            Side::East => (self.height, self.width as i32 - 1),
        };
        (0..len as i32)
            .map(|i| {
                let p = match side {
                    Side::North | Side::South => Point::new(i, fixed),
                    Side::East | Side::West => Point::new(fixed, i),
                };
                self.terrain_at(p).unwrap_or_default().to_string()
            })
            .collect()
    }

    // --- persistence ---

    pub(crate) fn to_record(&self) -> crate::store::ZoneRecord {
        crate::store::ZoneRecord {
            version: crate::store::RECORD_VERSION,
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            theme: self.theme.clone(),
            origin_theme: self.origin_theme.clone(),
            regions: {
                let mut rs: Vec<(u64, Region)> = self
                    .regions
                    .iter()
                    .map(|(id, r)| (*id, r.clone()))
                    .collect();
                rs.sort_unstable_by_key(|(id, _)| *id);
                rs
            },
            creatures: self.creatures.elements(),
            items: self.items.elements(),
            tops: self.tops.elements(),
            lights: {
                let mut ls: Vec<(Point, u32)> = self.lights().collect();
                ls.sort_unstable_by_key(|(p, _)| (p.y, p.x));
                ls
            },
            entries: self.entries.clone(),
        }
    }

    /// Rebuild a zone from its stored record. The spatial indices are not
    /// persisted; they are reconstructed here.
    pub(crate) fn from_record(record: crate::store::ZoneRecord) -> Zone {
        let mut zone = Zone::new(record.name, record.width, record.height);
        zone.theme = record.theme;
        zone.origin_theme = record.origin_theme;
        for (id, region) in record.regions {
            zone.region_index.insert(id, region.bounds);
            zone.regions.insert(id, region);
            zone.next_region_id = zone.next_region_id.max(id + 1);
        }
        for (id, bounds) in record.creatures {
            zone.creatures.insert(id, bounds);
        }
        for (id, bounds) in record.items {
            zone.items.insert(id, bounds);
        }
        for (id, bounds) in record.tops {
            zone.tops.insert(id, bounds);
        }
        zone.lights = record.lights.into_iter().collect();
        zone.entries = record.entries;
        zone
    }
}
