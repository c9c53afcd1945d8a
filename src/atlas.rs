//! The atlas: a lazy persistent cache of maps.
//!
//! Maps come into being on demand: `get_map` first checks the in-memory
//! cache, then the store (once per id, ever), and finally generates from
//! the registered definition. Dungeon zones stay random placeholders until
//! someone walks through a door into them; `enter_zone` materializes the
//! destination and fixes it. A corrupted or missing store entry costs one
//! regenerated zone, never the whole atlas.
//!
//! Construction is two-phase: `new` is pure and infallible, `open` attaches
//! the persistent store.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{GenError, GenResult};
use crate::generator::{generate_dungeon, plan_zone, Neighbours, ZonePlan};
use crate::geom::Side;
use crate::hooks::{GenContext, ThemeSource};
use crate::map::{Door, Map, MapKind};
use crate::random::{derive_seed, zone_rng, zone_seed};
use crate::store::{MapRecord, Store, ZoneMeta, RECORD_VERSION};
use crate::theme::RegionTheme;
use crate::worker::GenWorker;
use crate::zone::Zone;

/// What to build when a map id misses both cache and store.
#[derive(Clone, Debug)]
pub enum MapDef {
    World {
        zone_theme: String,
        region_theme: Option<String>,
        /// Adjacent world maps by side. A materializing zone blends its
        /// borders against whichever of these already have terrain.
        neighbours: HashMap<Side, u32>,
    },
    Dungeon {
        theme: String,
    },
}

/// Lazy persistent map cache.
pub struct Atlas {
    seed: u64,
    definitions: HashMap<u32, MapDef>,
    maps: HashMap<u32, Map>,
    /// Ids whose store lookup already happened; the store is consulted at
    /// most once per id per atlas lifetime.
    load_attempted: HashSet<u32>,
    store: Option<Store>,
}

impl Atlas {
    pub fn new(seed: u64, definitions: HashMap<u32, MapDef>) -> Atlas {
        Atlas {
            seed,
            definitions,
            maps: HashMap::new(),
            load_attempted: HashSet::new(),
            store: None,
        }
    }

    /// Attach the persistent store. Without this the atlas works purely
    /// in memory and `save` fails with [`GenError::StoreNotOpen`].
    pub fn open(&mut self, dir: impl Into<PathBuf>) -> GenResult<()> {
        self.store = Some(Store::open(dir)?);
        Ok(())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Fetch a map: cached, else stored, else generated from its
    /// definition. Unknown ids fail with [`GenError::MapNotFound`].
    pub fn get_map(&mut self, map_id: u32, themes: &dyn ThemeSource) -> GenResult<&Map> {
        self.ensure_map(map_id, themes)?;
        Ok(&self.maps[&map_id])
    }

    pub fn cached_map(&self, map_id: u32) -> Option<&Map> {
        self.maps.get(&map_id)
    }

    /// Enter a map at its entrance (zone 0 for dungeons, the single zone of
    /// a world map), materializing it if needed. Returns the zone index.
    pub fn enter_map(&mut self, map_id: u32, ctx: &mut GenContext<'_>) -> GenResult<usize> {
        self.ensure_map(map_id, ctx.themes)?;
        self.materialize(map_id, 0, ctx)?;
        Ok(0)
    }

    /// Walk through a door: materialize and fix the destination zone.
    pub fn enter_zone(
        &mut self,
        map_id: u32,
        door: Door,
        ctx: &mut GenContext<'_>,
    ) -> GenResult<usize> {
        self.ensure_map(map_id, ctx.themes)?;
        self.materialize(map_id, door.destination, ctx)?;
        Ok(door.destination)
    }

    /// Queue background planning for a zone the player is likely to enter
    /// next. `absorb_plans` installs whatever the worker finished.
    pub fn prefetch_zone(
        &mut self,
        map_id: u32,
        index: usize,
        themes: &dyn ThemeSource,
        worker: &GenWorker,
    ) -> GenResult<()> {
        self.ensure_map(map_id, themes)?;
        let map = &self.maps[&map_id];
        let zone = map.zone(index).ok_or(GenError::ZoneNotFound {
            map: map_id,
            zone: index,
        })?;
        if !zone.is_random() || zone.region_count() > 0 {
            return Ok(());
        }
        let theme_name = zone.theme().expect("random zone carries a theme");
        let theme = themes
            .zone_theme(theme_name)
            .ok_or_else(|| GenError::config(theme_name, "unknown zone theme"))?
            .clone();
        let region = self.region_theme_for(map_id, themes).cloned();
        let neighbours = self.neighbours_for(map_id);

        worker.request(
            zone_token(map_id, index),
            theme,
            region,
            neighbours,
            zone_seed(self.seed, map_id, index),
        );
        Ok(())
    }

    /// Install every plan the worker has finished. Zones that were already
    /// materialized in the meantime are left alone. Does not fix the zones;
    /// the plans are kept latent until the player actually enters.
    pub fn absorb_plans(&mut self, worker: &GenWorker, ctx: &mut GenContext<'_>) {
        while let Some((token, result)) = worker.poll() {
            let (map_id, index) = split_token(token);
            match result {
                Ok(plan) => {
                    if let Err(e) = self.install_plan(map_id, index, &plan, ctx, false) {
                        warn!("dropping prefetched zone {map_id}:{index}: {e}");
                    }
                }
                Err(e) => warn!("background planning for {map_id}:{index} failed: {e}"),
            }
        }
    }

    /// Persist one map and all its zones.
    pub fn save(&self, map_id: u32) -> GenResult<()> {
        let store = self.store.as_ref().ok_or(GenError::StoreNotOpen)?;
        let map = self.maps.get(&map_id).ok_or(GenError::MapNotFound(map_id))?;

        let connections = match map.kind() {
            MapKind::Dungeon { connections } => connections.clone(),
            MapKind::World => HashMap::new(),
        };
        let zones = map
            .zones()
            .iter()
            .map(|zone| ZoneMeta {
                name: zone.name.clone(),
                origin_theme: zone.origin_theme().map(str::to_string),
            })
            .collect();
        store.save_map(&MapRecord {
            version: RECORD_VERSION,
            id: map_id,
            is_dungeon: map.is_dungeon(),
            connections,
            zones,
        })?;
        for (index, zone) in map.zones().iter().enumerate() {
            store.save_zone(map_id, index, &zone.to_record())?;
        }
        info!("saved map {map_id} ({} zones)", map.zone_count());
        Ok(())
    }

    pub fn save_all(&self) -> GenResult<()> {
        for map_id in self.maps.keys() {
            self.save(*map_id)?;
        }
        Ok(())
    }

    fn ensure_map(&mut self, map_id: u32, themes: &dyn ThemeSource) -> GenResult<()> {
        if self.maps.contains_key(&map_id) {
            return Ok(());
        }

        if self.load_attempted.insert(map_id) {
            if let Some(store) = &self.store {
                if let Some(map) = load_stored_map(store, map_id)? {
                    info!("loaded map {map_id} from store");
                    self.maps.insert(map_id, map);
                    return Ok(());
                }
            }
        }

        let def = self
            .definitions
            .get(&map_id)
            .ok_or(GenError::MapNotFound(map_id))?
            .clone();
        let map = match def {
            MapDef::World { zone_theme, .. } => {
                Map::world(map_id, Zone::placeholder(format!("world {map_id}"), zone_theme))
            }
            MapDef::Dungeon { theme } => {
                let dungeon = themes
                    .dungeon_theme(&theme)
                    .ok_or_else(|| GenError::config(&theme, "unknown dungeon theme"))?;
                let seed = derive_seed(self.seed, &format!("map:{map_id}"));
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                generate_dungeon(map_id, dungeon, themes, &mut rng)?
            }
        };
        self.maps.insert(map_id, map);
        Ok(())
    }

    /// Generate a zone's contents in place if it is still a placeholder,
    /// then fix it.
    fn materialize(&mut self, map_id: u32, index: usize, ctx: &mut GenContext<'_>) -> GenResult<()> {
        let map = self.maps.get(&map_id).ok_or(GenError::MapNotFound(map_id))?;
        let zone = map.zone(index).ok_or(GenError::ZoneNotFound {
            map: map_id,
            zone: index,
        })?;
        if !zone.is_random() {
            return Ok(());
        }

        if zone.region_count() > 0 {
            // A prefetched plan already filled it in; just pin it down
            self.maps
                .get_mut(&map_id)
                .expect("map checked above")
                .zone_mut(index)
                .expect("zone checked above")
                .fix();
            return Ok(());
        }

        let theme_name = zone.theme().expect("random zone carries a theme").to_string();
        let theme = ctx
            .themes
            .zone_theme(&theme_name)
            .ok_or_else(|| GenError::config(&theme_name, "unknown zone theme"))?;
        let region = self.region_theme_for(map_id, ctx.themes);
        let neighbours = self.neighbours_for(map_id);

        let mut rng = zone_rng(self.seed, map_id, index);
        let plan = plan_zone(theme, region, &neighbours, &mut rng)?;
        self.install_plan(map_id, index, &plan, ctx, true)?;
        info!("materialized zone {map_id}:{index} from theme `{theme_name}`");
        Ok(())
    }

    /// Apply a finished plan to a still-random zone and route its outgoing
    /// doors onto real entry cells. `fix` pins the zone immediately.
    fn install_plan(
        &mut self,
        map_id: u32,
        index: usize,
        plan: &ZonePlan,
        ctx: &mut GenContext<'_>,
        fix: bool,
    ) -> GenResult<()> {
        let map = self.maps.get_mut(&map_id).ok_or(GenError::MapNotFound(map_id))?;
        let zone = map.zone_mut(index).ok_or(GenError::ZoneNotFound {
            map: map_id,
            zone: index,
        })?;
        if !zone.is_random() || zone.region_count() > 0 {
            return Ok(());
        }

        crate::generator::apply_plan(zone, plan, map_id, index, ctx);
        let entries = zone.entries().to_vec();

        let destinations: Vec<usize> = map
            .doors_from(index)
            .iter()
            .map(|d| d.destination)
            .collect();
        if destinations.is_empty() {
            // Nothing to route
        } else if entries.is_empty() {
            warn!("zone {map_id}:{index} has doors but no entry cells");
        } else {
            for (i, dest) in destinations.iter().enumerate() {
                map.place_door(index, *dest, entries[i % entries.len()]);
            }
        }

        if fix {
            map.zone_mut(index)
                .expect("zone checked above")
                .fix();
        }
        Ok(())
    }

    /// Edge terrain of the materialized world maps adjacent to `map_id`.
    /// Dungeon zones have no spatial neighbours and blend against nothing;
    /// an adjacent map that is still a placeholder contributes no edge.
    fn neighbours_for(&self, map_id: u32) -> Neighbours {
        let mut neighbours = Neighbours::default();
        let Some(MapDef::World { neighbours: links, .. }) = self.definitions.get(&map_id)
        else {
            return neighbours;
        };
        for (side, other) in links {
            let Some(zone) = self.maps.get(other).and_then(|m| m.zone(0)) else {
                continue;
            };
            if zone.region_count() == 0 {
                continue;
            }
            neighbours = neighbours.with_edge(*side, zone.edge_terrain(side.opposite()));
        }
        neighbours
    }

    fn region_theme_for<'t>(
        &self,
        map_id: u32,
        themes: &'t dyn ThemeSource,
    ) -> Option<&'t RegionTheme> {
        match self.definitions.get(&map_id) {
            Some(MapDef::World {
                region_theme: Some(name),
                ..
            }) => themes.region_theme(name),
            _ => None,
        }
    }
}

fn zone_token(map_id: u32, index: usize) -> u64 {
    ((map_id as u64) << 32) | (index as u64 & 0xffff_ffff)
}

fn split_token(token: u64) -> (u32, usize) {
    ((token >> 32) as u32, (token & 0xffff_ffff) as usize)
}

/// Rebuild a map from the store. A corrupt map record reads as absent; a
/// corrupt or missing zone entry comes back as a placeholder that will be
/// regenerated from its origin theme on entry.
fn load_stored_map(store: &Store, map_id: u32) -> GenResult<Option<Map>> {
    let record = match store.load_map(map_id) {
        Ok(record) => record,
        Err(GenError::Corrupt { key, source }) => {
            warn!("corrupt map record `{key}` ({source}); regenerating");
            None
        }
        Err(e) => return Err(e),
    };
    let Some(record) = record else {
        return Ok(None);
    };
    if record.zones.is_empty() {
        warn!("map record {map_id} lists no zones; regenerating");
        return Ok(None);
    }

    let mut zones = Vec::with_capacity(record.zones.len());
    for (index, meta) in record.zones.iter().enumerate() {
        let zone = match store.load_zone(map_id, index) {
            Ok(Some(zone_record)) => Zone::from_record(zone_record),
            Ok(None) => {
                warn!("zone {map_id}:{index} missing from store; will regenerate");
                placeholder_from_meta(meta)
            }
            Err(GenError::Corrupt { key, source }) => {
                warn!("corrupt store entry `{key}` ({source}); will regenerate");
                placeholder_from_meta(meta)
            }
            Err(e) => return Err(e),
        };
        zones.push(zone);
    }

    let map = if record.is_dungeon {
        Map::dungeon(map_id, zones, record.connections)
    } else {
        let zone = zones.into_iter().next().expect("checked non-empty");
        Map::world(map_id, zone)
    };
    Ok(Some(map))
}

fn placeholder_from_meta(meta: &ZoneMeta) -> Zone {
    match &meta.origin_theme {
        Some(theme) => Zone::placeholder(meta.name.clone(), theme),
        None => {
            warn!("zone `{}` lost with no origin theme; restoring empty", meta.name);
            Zone::new(meta.name.clone(), 0, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Point, Rect};
    use crate::hooks::doubles::{CountingFactory, MemoryThemes, NoQuests};
    use crate::theme::{DungeonTheme, SpawnTable, ZoneTheme};
    use std::fs;

    fn zone_theme(name: &str, algorithm: &str) -> ZoneTheme {
        ZoneTheme {
            name: name.into(),
            algorithm: algorithm.into(),
            min_size: 24,
            max_size: 30,
            floor: "stone_floor".into(),
            walls: "stone_wall".into(),
            door: "wood_door".into(),
            randomness: 50,
            sparse: 1,
            remove: 20,
            cave_open: 20,
            cave_passes: 5,
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

    fn themes() -> MemoryThemes {
        let mut themes = MemoryThemes::default();
        themes.zones.insert("crypt".into(), zone_theme("crypt", "bsp"));
        themes.zones.insert("warren".into(), zone_theme("warren", "cave"));
        themes.dungeons.insert(
            "barrow".into(),
            DungeonTheme {
                name: "barrow".into(),
                min_zones: 3,
                max_zones: 3,
                branching: 2,
                zone_themes: vec!["crypt".into(), "warren".into()],
            },
        );
        themes
    }

    fn dungeon_defs() -> HashMap<u32, MapDef> {
        let mut defs = HashMap::new();
        defs.insert(
            7,
            MapDef::Dungeon {
                theme: "barrow".into(),
            },
        );
        defs
    }

    /// Materialize every zone of a dungeon by walking its door graph.
    fn walk_whole_dungeon(
        atlas: &mut Atlas,
        map_id: u32,
        ctx: &mut GenContext<'_>,
    ) -> Vec<usize> {
        let mut visited = vec![atlas.enter_map(map_id, ctx).unwrap()];
        let mut frontier = vec![0usize];
        while let Some(index) = frontier.pop() {
            let doors: Vec<Door> = atlas
                .cached_map(map_id)
                .unwrap()
                .doors_from(index)
                .to_vec();
            for door in doors {
                if visited.contains(&door.destination) {
                    continue;
                }
                let entered = atlas.enter_zone(map_id, door, ctx).unwrap();
                visited.push(entered);
                frontier.push(entered);
            }
        }
        visited
    }

    #[test]
    fn themed_dungeon_builds_three_connected_zones() {
        let themes = themes();
        let mut factory = CountingFactory::default();
        let quests = NoQuests;
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };

        let mut atlas = Atlas::new(1234, dungeon_defs());
        let visited = walk_whole_dungeon(&mut atlas, 7, &mut ctx);
        assert_eq!(visited.len(), 3);

        let map = atlas.cached_map(7).unwrap();
        assert!(map.all_zones_reach_entrance());
        for (index, zone) in map.zones().iter().enumerate() {
            assert!(!zone.is_random(), "zone {index} never materialized");
            assert!(zone.width() > 0);
            // Doors sit on open terrain
            for door in map.doors_from(index) {
                let terrain = zone.terrain_at(door.position).unwrap();
                assert_ne!(terrain, "stone_wall", "door on wall in zone {index}");
            }
        }
    }

    #[test]
    fn entering_twice_changes_nothing() {
        let themes = themes();
        let mut factory = CountingFactory::default();
        let quests = NoQuests;

        let mut atlas = Atlas::new(5, dungeon_defs());
        {
            let mut ctx = GenContext {
                themes: &themes,
                entities: &mut factory,
                quests: &quests,
            };
            atlas.enter_map(7, &mut ctx).unwrap();
        }
        let first = atlas.cached_map(7).unwrap().zone(0).unwrap().creature_count();
        let made = factory.creatures.len();

        {
            let mut ctx = GenContext {
                themes: &themes,
                entities: &mut factory,
                quests: &quests,
            };
            atlas.enter_map(7, &mut ctx).unwrap();
        }
        assert_eq!(
            atlas.cached_map(7).unwrap().zone(0).unwrap().creature_count(),
            first
        );
        assert_eq!(factory.creatures.len(), made);
    }

    #[test]
    fn same_seed_same_dungeon() {
        let themes = themes();
        let quests = NoQuests;

        let snapshot = |seed: u64| {
            let mut factory = CountingFactory::default();
            let mut ctx = GenContext {
                themes: &themes,
                entities: &mut factory,
                quests: &quests,
            };
            let mut atlas = Atlas::new(seed, dungeon_defs());
            walk_whole_dungeon(&mut atlas, 7, &mut ctx);
            let map = atlas.cached_map(7).unwrap();
            map.zones()
                .iter()
                .map(|z| (z.width(), z.height(), z.region_count(), z.creature_count()))
                .collect::<Vec<_>>()
        };

        assert_eq!(snapshot(42), snapshot(42));
        assert_ne!(snapshot(42), snapshot(43));
    }

    #[test]
    fn unknown_map_id_is_an_error() {
        let themes = themes();
        let mut atlas = Atlas::new(1, HashMap::new());
        let err = atlas.get_map(99, &themes).unwrap_err();
        assert!(matches!(err, GenError::MapNotFound(99)));
    }

    #[test]
    fn save_without_store_is_rejected() {
        let themes = themes();
        let mut factory = CountingFactory::default();
        let quests = NoQuests;
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };
        let mut atlas = Atlas::new(1, dungeon_defs());
        atlas.enter_map(7, &mut ctx).unwrap();
        assert!(matches!(atlas.save(7), Err(GenError::StoreNotOpen)));
    }

    #[test]
    fn store_round_trip_preserves_zones() {
        let dir = tempfile::tempdir().unwrap();
        let themes = themes();
        let quests = NoQuests;

        let mut factory = CountingFactory::default();
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };
        let mut atlas = Atlas::new(77, dungeon_defs());
        atlas.open(dir.path()).unwrap();
        walk_whole_dungeon(&mut atlas, 7, &mut ctx);
        atlas.save_all().unwrap();
        let original: Vec<_> = atlas
            .cached_map(7)
            .unwrap()
            .zones()
            .iter()
            .map(|z| (z.name.clone(), z.width(), z.region_count()))
            .collect();

        // A fresh atlas with no definitions loads it all back
        let mut reloaded = Atlas::new(77, HashMap::new());
        reloaded.open(dir.path()).unwrap();
        let map = reloaded.get_map(7, &themes).unwrap();
        let restored: Vec<_> = map
            .zones()
            .iter()
            .map(|z| (z.name.clone(), z.width(), z.region_count()))
            .collect();
        assert_eq!(original, restored);
        assert!(map.zones().iter().all(|z| !z.is_random()));
    }

    #[test]
    fn corrupted_zone_entry_regenerates_instead_of_failing() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let themes = themes();
        let quests = NoQuests;

        let mut factory = CountingFactory::default();
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };
        let mut atlas = Atlas::new(9, dungeon_defs());
        atlas.open(dir.path()).unwrap();
        walk_whole_dungeon(&mut atlas, 7, &mut ctx);
        atlas.save_all().unwrap();

        fs::write(dir.path().join("7:1.zone.json"), "garbage").unwrap();

        let mut reloaded = Atlas::new(9, HashMap::new());
        reloaded.open(dir.path()).unwrap();
        reloaded.get_map(7, &themes).unwrap();
        assert!(reloaded.cached_map(7).unwrap().zone(1).unwrap().is_random());

        // Entering the lost zone regenerates it from its origin theme
        let mut factory = CountingFactory::default();
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };
        let door = Door {
            position: Point::new(0, 0),
            destination: 1,
        };
        reloaded.enter_zone(7, door, &mut ctx).unwrap();
        let zone = reloaded.cached_map(7).unwrap().zone(1).unwrap();
        assert!(!zone.is_random());
        assert!(zone.width() > 0);
    }

    #[test]
    fn world_map_gets_region_patches() {
        let mut themes = themes();
        let mut grass = zone_theme("plains", "wilderness");
        grass.floor = "grass".into();
        grass.min_size = 40;
        grass.max_size = 40;
        themes.zones.insert("plains".into(), grass);
        themes.regions.insert(
            "moor".into(),
            RegionTheme {
                name: "moor".into(),
                patches: SpawnTable::new(vec![("heather".into(), 1)]),
                patch_cover: 20,
            },
        );

        let mut defs = HashMap::new();
        defs.insert(
            1,
            MapDef::World {
                zone_theme: "plains".into(),
                region_theme: Some("moor".into()),
                neighbours: HashMap::new(),
            },
        );

        let mut factory = CountingFactory::default();
        let quests = NoQuests;
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };
        let mut atlas = Atlas::new(3, defs);
        atlas.enter_map(1, &mut ctx).unwrap();

        let map = atlas.cached_map(1).unwrap();
        assert!(!map.is_dungeon());
        let zone = map.zone(0).unwrap();
        assert!(!zone.is_random());
        let heather = zone
            .regions_in(&Rect::new(0, 0, 40, 40))
            .iter()
            .filter(|r| r.terrain == "heather")
            .count();
        assert!(heather > 0, "no variety patches landed");
    }

    #[test]
    fn world_borders_blend_against_materialized_neighbour() {
        let mut themes = themes();
        let mut plains = zone_theme("plains", "wilderness");
        plains.floor = "grass".into();
        plains.min_size = 40;
        plains.max_size = 40;
        let mut dunes = zone_theme("dunes", "wilderness");
        dunes.floor = "sand".into();
        dunes.min_size = 40;
        dunes.max_size = 40;
        themes.zones.insert("plains".into(), plains);
        themes.zones.insert("dunes".into(), dunes);

        let mut defs = HashMap::new();
        defs.insert(
            1,
            MapDef::World {
                zone_theme: "plains".into(),
                region_theme: None,
                neighbours: HashMap::from([(Side::East, 2)]),
            },
        );
        defs.insert(
            2,
            MapDef::World {
                zone_theme: "dunes".into(),
                region_theme: None,
                neighbours: HashMap::from([(Side::West, 1)]),
            },
        );

        let mut factory = CountingFactory::default();
        let quests = NoQuests;
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };
        let mut atlas = Atlas::new(8, defs);

        // The dunes materialize first, with nothing yet to blend against
        atlas.enter_map(2, &mut ctx).unwrap();
        {
            let dunes_zone = atlas.cached_map(2).unwrap().zone(0).unwrap();
            let foreign = dunes_zone
                .regions_in(&dunes_zone.bounds())
                .iter()
                .filter(|r| r.terrain == "grass")
                .count();
            assert_eq!(foreign, 0);
        }

        // The plains see the dunes to their east and blend a sand strip in
        atlas.enter_map(1, &mut ctx).unwrap();
        let zone = atlas.cached_map(1).unwrap().zone(0).unwrap();
        let sand: Vec<Rect> = zone
            .regions_in(&zone.bounds())
            .iter()
            .filter(|r| r.terrain == "sand")
            .map(|r| r.bounds)
            .collect();
        assert!(!sand.is_empty(), "no border strip blended in");
        let limit = zone.width() as i32 - zone.width() as i32 / 10;
        for rect in sand {
            assert!(rect.x >= limit, "blend strip too deep: {rect:?}");
        }
    }

    #[test]
    fn prefetched_zone_matches_inline_generation() {
        let themes = themes();
        let quests = NoQuests;

        // Inline path
        let mut factory = CountingFactory::default();
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };
        let mut inline = Atlas::new(55, dungeon_defs());
        inline.enter_map(7, &mut ctx).unwrap();
        let door = inline.cached_map(7).unwrap().doors_from(0)[0];
        inline.enter_zone(7, door, &mut ctx).unwrap();
        let want = {
            let z = inline.cached_map(7).unwrap().zone(door.destination).unwrap();
            (z.width(), z.height(), z.region_count())
        };

        // Worker path
        let mut factory = CountingFactory::default();
        let mut ctx = GenContext {
            themes: &themes,
            entities: &mut factory,
            quests: &quests,
        };
        let mut atlas = Atlas::new(55, dungeon_defs());
        atlas.enter_map(7, &mut ctx).unwrap();
        let worker = GenWorker::spawn();
        atlas
            .prefetch_zone(7, door.destination, &themes, &worker)
            .unwrap();
        let (token, plan) = worker.wait().expect("worker delivered");
        let (map_id, index) = split_token(token);
        atlas
            .install_plan(map_id, index, &plan.unwrap(), &mut ctx, false)
            .unwrap();

        // Entering afterwards uses the installed contents and just fixes
        atlas.enter_zone(7, door, &mut ctx).unwrap();
        let zone = atlas.cached_map(7).unwrap().zone(door.destination).unwrap();
        assert!(!zone.is_random());
        assert_eq!((zone.width(), zone.height(), zone.region_count()), want);
    }
}
