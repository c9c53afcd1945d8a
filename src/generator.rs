//! Zone and dungeon generation pipelines.
//!
//! Generation is split in two: `plan_zone` is a pure function of theme and
//! rng that computes everything a zone will contain, and `apply_plan` spends
//! the plan against a zone and the engine collaborators. Plans are plain
//! data, so a background worker can compute them off-thread while entity
//! creation stays on the caller's side.

use std::collections::{HashMap, HashSet};

use log::{info, warn};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::error::{GenError, GenResult};
use crate::gen::cave::{self, CaveParams};
use crate::gen::layout;
use crate::gen::maze::{self, MazeParams};
use crate::gen::rooms::Room;
use crate::geom::{Point, Side};
use crate::grid::{TileGrid, TileKind};
use crate::hooks::{GenContext, QuestPlacement, ThemeSource};
use crate::map::{Door, Map};
use crate::random::Dice;
use crate::terrain;
use crate::theme::{DungeonTheme, LayoutKind, RegionTheme, ZoneTheme};
use crate::zone::{Region, Zone};

/// Smallest zone each layout family can meaningfully fill.
const MIN_ROOM_LAYOUT: usize = 16;
const MIN_MAZE: usize = 9;
const MIN_CAVE: usize = 8;

/// How many entry cells a plan reserves for door placement.
const ENTRY_COUNT: usize = 6;

/// Open cells kept aside for quest placements without a fixed position.
const SPARE_CELLS: usize = 24;

/// Edge terrain of adjacent zones, indexed by [`Side::index`]. Border
/// blending runs only for the sides present.
#[derive(Clone, Debug, Default)]
pub struct Neighbours {
    pub edges: [Option<Vec<String>>; 4],
}

impl Neighbours {
    pub fn with_edge(mut self, side: Side, terrain: Vec<String>) -> Self {
        self.edges[side.index()] = Some(terrain);
        self
    }
}

/// Everything a generated zone will contain, computed without touching the
/// zone or the engine.
#[derive(Clone, Debug)]
pub struct ZonePlan {
    pub theme: String,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<Region>,
    /// Open cells suitable for doors and arrivals.
    pub entries: Vec<Point>,
    pub lights: Vec<Point>,
    pub creature_spawns: Vec<(String, Point)>,
    pub item_spawns: Vec<(String, Point)>,
    /// Extra open cells for placements decided at apply time.
    pub spare_cells: Vec<Point>,
}

/// Compute a zone's full contents from its theme.
pub fn plan_zone(
    theme: &ZoneTheme,
    region: Option<&RegionTheme>,
    neighbours: &Neighbours,
    rng: &mut ChaCha8Rng,
) -> GenResult<ZonePlan> {
    theme.validate()?;
    let layout = theme.layout()?;

    let (w, h) = theme.roll_size(rng);
    let (w, h) = clamp_size(layout, w, h, theme);
    let (grid, rooms) = build_tiles(layout, w, h, theme, rng);

    let mut tg = terrain::make_terrain(&grid, theme);
    for side in Side::ALL {
        if let Some(edge) = &neighbours.edges[side.index()] {
            terrain::make_border(&mut tg, side, edge, rng);
        }
    }
    if let Some(region_theme) = region {
        terrain::overlay_patches(&mut tg, region_theme, rng);
    }
    terrain::overlay_features(&mut tg, theme, rng);
    terrain::grow_vegetation(&mut tg, theme, rng);

    let regions: Vec<Region> = terrain::into_regions(&tg)
        .into_iter()
        .map(|(bounds, terrain_id)| {
            let mut r = Region::new(bounds, terrain_id);
            r.theme = Some(theme.name.clone());
            r
        })
        .collect();

    let mut open: Vec<Point> = Vec::new();
    for y in 0..grid.height() as i32 {
        for x in 0..grid.width() as i32 {
            if grid.get(x, y).is_passable() {
                open.push(Point::new(x, y));
            }
        }
    }

    let entries = pick_entries(&open, &rooms, rng);
    let lights = entries.clone();

    let creature_spawns = roll_spawns(
        theme.creatures.entries().is_empty(),
        |r| theme.creatures.pick(r).map(str::to_string),
        theme.creature_density,
        &open,
        rng,
    );
    let item_spawns = roll_spawns(
        theme.items.entries().is_empty(),
        |r| theme.items.pick(r).map(str::to_string),
        theme.item_density,
        &open,
        rng,
    );

    let spare_cells: Vec<Point> = open
        .choose_multiple(rng, SPARE_CELLS.min(open.len()))
        .copied()
        .collect();

    info!(
        "planned zone from theme `{}`: {}x{}, {} regions, {} creatures, {} items",
        theme.name,
        w,
        h,
        regions.len(),
        creature_spawns.len(),
        item_spawns.len()
    );

    Ok(ZonePlan {
        theme: theme.name.clone(),
        width: w as u32,
        height: h as u32,
        regions,
        entries,
        lights,
        creature_spawns,
        item_spawns,
        spare_cells,
    })
}

fn clamp_size(layout: LayoutKind, w: usize, h: usize, theme: &ZoneTheme) -> (usize, usize) {
    let min = match layout {
        LayoutKind::Bsp | LayoutKind::Sparse | LayoutKind::Packed => MIN_ROOM_LAYOUT,
        LayoutKind::Maze | LayoutKind::SquashedMaze => MIN_MAZE,
        LayoutKind::Cave | LayoutKind::Wilderness => MIN_CAVE,
    };
    if w < min || h < min {
        warn!(
            "theme `{}` rolled {w}x{h}, below the {min}-cell minimum for {layout:?}; clamping",
            theme.name
        );
    }
    (w.max(min), h.max(min))
}

fn build_tiles(
    layout: LayoutKind,
    w: usize,
    h: usize,
    theme: &ZoneTheme,
    rng: &mut ChaCha8Rng,
) -> (TileGrid, Vec<Room>) {
    match layout {
        LayoutKind::Maze | LayoutKind::SquashedMaze => {
            let params = MazeParams {
                width: w,
                height: h,
                randomness: theme.randomness,
                sparse: theme.sparse,
                remove: theme.remove,
                squashed: layout == LayoutKind::SquashedMaze,
            };
            (maze::generate(&params, rng), Vec::new())
        }
        LayoutKind::Cave => {
            let params = CaveParams {
                width: w,
                height: h,
                open_percent: theme.cave_open,
                passes: theme.cave_passes,
                threshold: theme.cave_threshold,
            };
            (cave::generate_connected(&params, rng), Vec::new())
        }
        LayoutKind::Bsp => layout::generate_bsp(w, h, rng),
        LayoutKind::Sparse => layout::generate_sparse(w, h, rng),
        LayoutKind::Packed => layout::generate_packed(w, h, rng),
        LayoutKind::Wilderness => (TileGrid::new(w, h, TileKind::Floor), Vec::new()),
    }
}

/// Entry cells prefer room centers; layouts without rooms fall back to
/// random open cells. Entries are always on passable tiles.
fn pick_entries(open: &[Point], rooms: &[Room], rng: &mut ChaCha8Rng) -> Vec<Point> {
    let mut entries: Vec<Point> = rooms
        .choose_multiple(rng, ENTRY_COUNT.min(rooms.len()))
        .map(|room| room.center())
        .collect();
    if entries.len() < ENTRY_COUNT {
        let missing = ENTRY_COUNT - entries.len();
        entries.extend(open.choose_multiple(rng, missing.min(open.len())).copied());
    }
    entries.dedup();
    entries
}

fn roll_spawns(
    table_empty: bool,
    mut pick: impl FnMut(&mut ChaCha8Rng) -> Option<String>,
    density: u32,
    open: &[Point],
    rng: &mut ChaCha8Rng,
) -> Vec<(String, Point)> {
    if table_empty || density == 0 {
        return Vec::new();
    }
    // Density is spawns per 100 open cells
    let count = (open.len() * density as usize / 100).min(open.len());
    let positions: Vec<Point> = open.choose_multiple(rng, count).copied().collect();
    positions
        .into_iter()
        .filter_map(|pos| pick(rng).map(|id| (id, pos)))
        .collect()
}

/// Spend a plan against a zone: create entities through the factory, honor
/// quest placements ahead of random population, install regions, entries
/// and lights. Does not fix the zone; the caller decides when.
pub fn apply_plan(
    zone: &mut Zone,
    plan: &ZonePlan,
    map_id: u32,
    zone_index: usize,
    ctx: &mut GenContext<'_>,
) {
    zone.set_size(plan.width, plan.height);
    for region in &plan.regions {
        zone.add_region(region.clone());
    }
    for entry in &plan.entries {
        zone.add_entry(*entry);
    }
    for light in &plan.lights {
        zone.add_light(*light);
    }

    let mut taken: HashSet<Point> = HashSet::new();
    let mut spare = plan.spare_cells.iter().copied();

    for placement in ctx.quests.placements_for(map_id, zone_index) {
        match placement {
            QuestPlacement::Creature {
                resource_id,
                position,
            } => {
                let Some(pos) = position.or_else(|| spare.next()) else {
                    warn!("no open cell left for quest creature `{resource_id}`");
                    continue;
                };
                let id = ctx.entities.create_creature(&resource_id);
                zone.add_creature(id, pos);
                taken.insert(pos);
            }
            QuestPlacement::Item {
                resource_id,
                position,
            } => {
                let Some(pos) = position.or_else(|| spare.next()) else {
                    warn!("no open cell left for quest item `{resource_id}`");
                    continue;
                };
                let id = ctx.entities.create_item(&resource_id);
                zone.add_item(id, pos);
                taken.insert(pos);
            }
        }
    }

    for (resource_id, pos) in &plan.creature_spawns {
        if taken.contains(pos) {
            continue;
        }
        let id = ctx.entities.create_creature(resource_id);
        zone.add_creature(id, *pos);
    }
    for (resource_id, pos) in &plan.item_spawns {
        if taken.contains(pos) {
            continue;
        }
        let id = ctx.entities.create_item(resource_id);
        zone.add_item(id, *pos);
    }
}

/// Lay out a new dungeon as placeholder zones plus a door graph. Zone
/// contents come later, on first entry; door positions are placeholders
/// until their source zone exists.
pub fn generate_dungeon(
    map_id: u32,
    theme: &DungeonTheme,
    themes: &dyn ThemeSource,
    rng: &mut ChaCha8Rng,
) -> GenResult<Map> {
    theme.validate()?;
    for name in &theme.zone_themes {
        let zone_theme = themes
            .zone_theme(name)
            .ok_or_else(|| GenError::config(&theme.name, format!("unknown zone theme `{name}`")))?;
        zone_theme.validate()?;
    }

    let count = rng.roll(theme.min_zones as i32, theme.max_zones as i32) as usize;
    let mut zones = Vec::with_capacity(count);
    let mut connections: HashMap<usize, Vec<Door>> = HashMap::new();

    for index in 0..count {
        let theme_pick = rng.roll(0, theme.zone_themes.len() as i32 - 1) as usize;
        let zone_theme = &theme.zone_themes[theme_pick];
        zones.push(Zone::placeholder(
            format!("{} {}", theme.name, index + 1),
            zone_theme,
        ));

        if index > 0 {
            // Branch off one of the last `branching` zones
            let lo = index.saturating_sub(theme.branching as usize);
            let parent = rng.roll(lo as i32, index as i32 - 1) as usize;
            let placeholder = Point::new(0, 0);
            connections.entry(parent).or_default().push(Door {
                position: placeholder,
                destination: index,
            });
            connections.entry(index).or_default().push(Door {
                position: placeholder,
                destination: parent,
            });
        }
    }

    info!("laid out dungeon `{}` as map {map_id} with {count} zones", theme.name);
    Ok(Map::dungeon(map_id, zones, connections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::doubles::{CountingFactory, FixedQuests, MemoryThemes, NoQuests};
    use crate::theme::SpawnTable;
    use rand::SeedableRng;

    fn theme(algorithm: &str) -> ZoneTheme {
        ZoneTheme {
            name: format!("test_{algorithm}"),
            algorithm: algorithm.into(),
            min_size: 30,
            max_size: 36,
            floor: "stone_floor".into(),
            walls: "stone_wall".into(),
            door: "wood_door".into(),
            randomness: 50,
            sparse: 1,
            remove: 20,
            cave_open: 20,
            cave_passes: 6,
            cave_threshold: 4,
            creatures: SpawnTable::new(vec![("rat".into(), 1)]),
            items: SpawnTable::new(vec![("bone".into(), 1)]),
            creature_density: 2,
            item_density: 1,
            features: Vec::new(),
            vegetation: Vec::new(),
            swim_terrain: Vec::new(),
        }
    }

    fn plan(algorithm: &str, seed: u64) -> ZonePlan {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        plan_zone(&theme(algorithm), None, &Neighbours::default(), &mut rng).unwrap()
    }

    #[test]
    fn plans_are_deterministic() {
        for algorithm in ["maze", "cave", "bsp", "sparse", "packed", "wilderness"] {
            let a = plan(algorithm, 99);
            let b = plan(algorithm, 99);
            assert_eq!(a.width, b.width);
            assert_eq!(a.regions, b.regions, "{algorithm} diverged");
            assert_eq!(a.entries, b.entries);
            assert_eq!(a.creature_spawns, b.creature_spawns);
        }
    }

    #[test]
    fn entries_land_on_open_terrain() {
        for algorithm in ["maze", "squashed_maze", "cave", "bsp", "sparse", "packed"] {
            let t = theme(algorithm);
            let p = plan(algorithm, 7);
            assert!(!p.entries.is_empty(), "{algorithm} planned no entries");

            // Rebuild a terrain lookup from the regions and check each entry
            // does not sit on wall terrain.
            for entry in &p.entries {
                let covering: Vec<&Region> = p
                    .regions
                    .iter()
                    .filter(|r| r.bounds.contains(*entry))
                    .collect();
                assert!(!covering.is_empty());
                for region in covering {
                    assert_ne!(
                        region.terrain, t.walls,
                        "{algorithm} entry {entry:?} sits on walls"
                    );
                }
            }
        }
    }

    #[test]
    fn undersized_theme_is_clamped_not_rejected() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut t = theme("bsp");
        t.min_size = 4;
        t.max_size = 5;
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let p = plan_zone(&t, None, &Neighbours::default(), &mut rng).unwrap();
        assert!(p.width as usize >= MIN_ROOM_LAYOUT);
        assert!(p.height as usize >= MIN_ROOM_LAYOUT);
    }

    #[test]
    fn bad_algorithm_fails_fast() {
        let t = theme("voronoi");
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = plan_zone(&t, None, &Neighbours::default(), &mut rng).unwrap_err();
        assert!(matches!(err, GenError::Config { .. }));
    }

    #[test]
    fn apply_populates_through_the_factory() {
        let p = plan("cave", 11);
        let mut factory = CountingFactory::default();
        let themes = MemoryThemes::default();
        let quests = NoQuests;
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };

        let mut zone = Zone::placeholder("den", "test_cave");
        apply_plan(&mut zone, &p, 1, 0, &mut ctx);

        assert_eq!(zone.creature_count(), p.creature_spawns.len());
        assert_eq!(zone.item_count(), p.item_spawns.len());
        assert_eq!(zone.width(), p.width);
        assert!(factory.creatures.iter().all(|r| r == "rat"));
        assert!(zone.is_random());
        zone.fix();
        assert!(!zone.is_random());
    }

    #[test]
    fn quest_placements_win_over_random_spawns() {
        let p = plan("bsp", 21);
        let fixed = p.creature_spawns.first().map(|(_, pos)| *pos);

        let quests = FixedQuests {
            map_id: 4,
            zone_index: 0,
            placements: vec![
                QuestPlacement::Creature {
                    resource_id: "quest_boss".into(),
                    position: fixed,
                },
                QuestPlacement::Item {
                    resource_id: "quest_key".into(),
                    position: None,
                },
            ],
        };
        let mut factory = CountingFactory::default();
        let themes = MemoryThemes::default();
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };

        let mut zone = Zone::new("hall", 1, 1);
        apply_plan(&mut zone, &p, 4, 0, &mut ctx);

        assert_eq!(factory.creatures[0], "quest_boss");
        assert!(factory.items.contains(&"quest_key".to_string()));
        if let Some(pos) = fixed {
            // The random spawn that wanted this cell was skipped
            let here = zone.creatures_in(&crate::geom::Rect::at(pos));
            assert_eq!(here.len(), 1);
        }
    }

    #[test]
    fn dungeon_layout_is_connected_and_themed() {
        let mut themes = MemoryThemes::default();
        themes.zones.insert("test_cave".into(), theme("cave"));
        themes.zones.insert("test_maze".into(), theme("maze"));
        let dungeon = DungeonTheme {
            name: "barrow".into(),
            min_zones: 4,
            max_zones: 7,
            branching: 2,
            zone_themes: vec!["test_cave".into(), "test_maze".into()],
        };

        for seed in [1u64, 5, 9] {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let map = generate_dungeon(7, &dungeon, &themes, &mut rng).unwrap();
            assert!(map.zone_count() >= 4 && map.zone_count() <= 7);
            assert!(map.all_zones_reach_entrance());
            for zone in map.zones() {
                assert!(zone.is_random());
                assert!(zone.theme().is_some());
            }
        }
    }

    #[test]
    fn dungeon_with_unknown_zone_theme_fails_fast() {
        let themes = MemoryThemes::default();
        let dungeon = DungeonTheme {
            name: "barrow".into(),
            min_zones: 2,
            max_zones: 2,
            branching: 1,
            zone_themes: vec!["missing".into()],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generate_dungeon(7, &dungeon, &themes, &mut rng).unwrap_err();
        assert!(matches!(err, GenError::Config { .. }));
    }

    #[test]
    fn border_blend_feeds_through_the_plan() {
        let mut t = theme("wilderness");
        t.floor = "grass".into();
        let neighbours =
            Neighbours::default().with_edge(Side::North, vec!["sand".into(); 64]);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let p = plan_zone(&t, None, &neighbours, &mut rng).unwrap();

        let sand = p
            .regions
            .iter()
            .filter(|r| r.terrain == "sand")
            .map(|r| r.bounds)
            .collect::<Vec<_>>();
        assert!(!sand.is_empty());
        let max_depth = (p.height as usize / 10).max(1) as i32;
        for rect in sand {
            assert!(rect.bottom() <= max_depth, "blend strip too deep: {rect:?}");
        }
    }
}
