//! Generation parameter records.
//!
//! Themes arrive from external resource loading as immutable value objects
//! and are never mutated by the generators. A `ZoneTheme` selects the layout
//! algorithm and carries terrain identifiers, spawn tables, and feature
//! descriptors; a `DungeonTheme` describes a multi-zone dungeon; a
//! `RegionTheme` adds terrain variety for wilderness zones.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GenError, GenResult};

/// Which shape generator a zone theme selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutKind {
    /// Recursive-backtracker maze with wall cells.
    Maze,
    /// Maze variant at full resolution without wall cells.
    SquashedMaze,
    /// Stochastic cellular-automata cave.
    Cave,
    /// Recursive space partitioning with one room per leaf.
    Bsp,
    /// Scattered rooms joined by corridors.
    Sparse,
    /// Densely packed rooms joined at shared edges.
    Packed,
    /// Open terrain with border blending, features and vegetation.
    Wilderness,
}

impl LayoutKind {
    /// Parse the algorithm kind string carried by theme resources.
    pub fn parse(s: &str) -> Option<LayoutKind> {
        match s {
            "maze" => Some(LayoutKind::Maze),
            "squashed_maze" => Some(LayoutKind::SquashedMaze),
            "cave" => Some(LayoutKind::Cave),
            "bsp" => Some(LayoutKind::Bsp),
            "sparse" => Some(LayoutKind::Sparse),
            "packed" => Some(LayoutKind::Packed),
            "wilderness" => Some(LayoutKind::Wilderness),
            _ => None,
        }
    }
}

/// A weighted table of resource identifiers, sampled by cumulative weight.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpawnTable {
    entries: Vec<(String, u32)>,
}

impl SpawnTable {
    pub fn new(entries: Vec<(String, u32)>) -> Self {
        SpawnTable { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight() == 0
    }

    pub fn total_weight(&self) -> u64 {
        self.entries.iter().map(|(_, w)| *w as u64).sum()
    }

    pub fn entries(&self) -> &[(String, u32)] {
        &self.entries
    }

    /// Sample one identifier; `None` when the table is empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        let mut roll = rng.gen_range(0..total);
        for (id, weight) in &self.entries {
            if roll < *weight as u64 {
                return Some(id);
            }
            roll -= *weight as u64;
        }
        None
    }
}

/// Shape of a natural feature overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Irregular filled blob.
    Lake,
    /// Meandering strip across the zone.
    River,
    /// Small scattered patch.
    Patch,
}

/// One natural feature a theme wants overlaid on generated terrain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub kind: FeatureKind,
    /// Terrain identifier written inside the feature shape.
    pub terrain: String,
    /// Percent chance per placement attempt.
    pub frequency: u32,
    /// Nominal radius / half-width in cells.
    pub size: u32,
}

/// One vegetation layer, grown by a cellular-automata pass scaled to the
/// plant's own footprint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VegetationSpec {
    /// Terrain identifier written where the plant grows.
    pub terrain: String,
    /// Percent of candidate cells seeded before smoothing.
    pub abundance: u32,
    /// Spatial size of one plant in cells (scales the automaton grid).
    pub footprint: u32,
}

/// Generation parameters for a single zone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneTheme {
    pub name: String,
    /// Algorithm kind string; see [`LayoutKind::parse`].
    pub algorithm: String,
    /// Zone size bounds (cells per side).
    pub min_size: u32,
    pub max_size: u32,
    /// Terrain identifiers for the tile-kind translation.
    pub floor: String,
    pub walls: String,
    pub door: String,
    /// Maze tuning: direction re-roll percent, dead-end removal passes,
    /// loop-back percent.
    pub randomness: u32,
    pub sparse: u32,
    pub remove: u32,
    /// Cave tuning: initial open percent, update count per cell, and the
    /// 3x3 neighbour count a cell must exceed to open.
    pub cave_open: u32,
    pub cave_passes: u32,
    pub cave_threshold: u32,
    /// Weighted spawn tables, sampled per placement.
    pub creatures: SpawnTable,
    pub items: SpawnTable,
    /// Spawns per 100 open cells.
    pub creature_density: u32,
    pub item_density: u32,
    /// Natural feature overlays.
    pub features: Vec<FeatureSpec>,
    /// Vegetation layers.
    pub vegetation: Vec<VegetationSpec>,
    /// Terrain identifiers carrying the swim modifier; vegetation never
    /// grows on these.
    pub swim_terrain: Vec<String>,
}

impl ZoneTheme {
    /// Every terrain identifier this theme can produce.
    pub fn known_terrains(&self) -> Vec<&str> {
        let mut out = vec![self.floor.as_str(), self.walls.as_str(), self.door.as_str()];
        out.extend(self.features.iter().map(|f| f.terrain.as_str()));
        out.extend(self.vegetation.iter().map(|v| v.terrain.as_str()));
        out
    }

    pub fn layout(&self) -> GenResult<LayoutKind> {
        LayoutKind::parse(&self.algorithm).ok_or_else(|| {
            GenError::config(&self.name, format!("unknown algorithm kind `{}`", self.algorithm))
        })
    }

    /// Fail-fast consistency check, run at generation start.
    pub fn validate(&self) -> GenResult<()> {
        self.layout()?;

        if self.min_size == 0 || self.max_size < self.min_size {
            return Err(GenError::config(
                &self.name,
                format!("bad size bounds {}..{}", self.min_size, self.max_size),
            ));
        }
        for id in [&self.floor, &self.walls, &self.door] {
            if id.is_empty() {
                return Err(GenError::config(&self.name, "empty terrain identifier"));
            }
        }
        for f in &self.features {
            if f.terrain.is_empty() {
                return Err(GenError::config(&self.name, "feature without terrain id"));
            }
            if f.size == 0 {
                return Err(GenError::config(
                    &self.name,
                    format!("feature `{}` has zero size", f.terrain),
                ));
            }
        }
        for v in &self.vegetation {
            if v.terrain.is_empty() || v.footprint == 0 {
                return Err(GenError::config(&self.name, "malformed vegetation entry"));
            }
        }
        let known = self.known_terrains();
        for swim in &self.swim_terrain {
            if !known.contains(&swim.as_str()) {
                return Err(GenError::config(
                    &self.name,
                    format!("swim modifier references unknown terrain `{swim}`"),
                ));
            }
        }
        Ok(())
    }

    /// Pick a concrete zone size inside the theme's bounds.
    pub fn roll_size<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, usize) {
        use crate::random::Dice;
        let w = rng.roll(self.min_size as i32, self.max_size as i32) as usize;
        let h = rng.roll(self.min_size as i32, self.max_size as i32) as usize;
        (w, h)
    }
}

/// Terrain variety for wilderness zones: weighted alternative patch terrains
/// laid over the base floor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionTheme {
    pub name: String,
    pub patches: SpawnTable,
    /// Percent of the zone area covered by variety patches.
    pub patch_cover: u32,
}

/// A multi-zone dungeon definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DungeonTheme {
    pub name: String,
    pub min_zones: u32,
    pub max_zones: u32,
    /// How many recent zones a new zone may branch from.
    pub branching: u32,
    /// Candidate zone theme identifiers, one picked per zone.
    pub zone_themes: Vec<String>,
}

impl DungeonTheme {
    pub fn validate(&self) -> GenResult<()> {
        if self.min_zones == 0 || self.max_zones < self.min_zones {
            return Err(GenError::config(
                &self.name,
                format!("bad zone count bounds {}..{}", self.min_zones, self.max_zones),
            ));
        }
        if self.branching == 0 {
            return Err(GenError::config(&self.name, "branching factor must be >= 1"));
        }
        if self.zone_themes.is_empty() {
            return Err(GenError::config(&self.name, "no candidate zone themes"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    pub(crate) fn plain_theme(algorithm: &str) -> ZoneTheme {
        ZoneTheme {
            name: "test".into(),
            algorithm: algorithm.into(),
            min_size: 20,
            max_size: 30,
            floor: "stone_floor".into(),
            walls: "stone_wall".into(),
            door: "wood_door".into(),
            randomness: 50,
            sparse: 2,
            remove: 30,
            cave_open: 20,
            cave_passes: 6,
            cave_threshold: 4,
            creatures: SpawnTable::default(),
            items: SpawnTable::default(),
            creature_density: 2,
            item_density: 2,
            features: Vec::new(),
            vegetation: Vec::new(),
            swim_terrain: Vec::new(),
        }
    }

    #[test]
    fn unknown_algorithm_is_a_config_error() {
        let theme = plain_theme("voronoi");
        let err = theme.validate().unwrap_err();
        assert!(matches!(err, GenError::Config { .. }));
        assert!(err.to_string().contains("voronoi"));
    }

    #[test]
    fn bad_size_bounds_rejected() {
        let mut theme = plain_theme("maze");
        theme.min_size = 40;
        theme.max_size = 20;
        assert!(theme.validate().is_err());
    }

    #[test]
    fn swim_terrain_must_be_known() {
        let mut theme = plain_theme("wilderness");
        theme.swim_terrain.push("deep_water".into());
        assert!(theme.validate().is_err());

        theme.features.push(FeatureSpec {
            kind: FeatureKind::Lake,
            terrain: "deep_water".into(),
            frequency: 50,
            size: 4,
        });
        assert!(theme.validate().is_ok());
    }

    #[test]
    fn spawn_table_respects_weights() {
        let table = SpawnTable::new(vec![("rat".into(), 3), ("bat".into(), 1)]);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut rats = 0;
        for _ in 0..400 {
            if table.pick(&mut rng) == Some("rat") {
                rats += 1;
            }
        }
        // Expect roughly 300 of 400
        assert!(rats > 240 && rats < 360, "rats = {rats}");
    }

    #[test]
    fn empty_spawn_table_picks_nothing() {
        let table = SpawnTable::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(table.pick(&mut rng), None);
    }

    #[test]
    fn roll_size_stays_in_bounds() {
        let theme = plain_theme("bsp");
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let (w, h) = theme.roll_size(&mut rng);
            assert!((20..=30).contains(&w));
            assert!((20..=30).contains(&h));
        }
    }
}
