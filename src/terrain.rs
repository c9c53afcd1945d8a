//! Terrain conversion and natural feature passes.
//!
//! `make_terrain` translates a tile grid into terrain identifiers from the
//! theme. `make_border` blends each zone edge against the neighbouring
//! zone's edge terrain so transitions are not a hard seam. Feature overlay
//! and vegetation run afterwards, writing lakes, rivers and plant patches
//! over the base terrain. `into_regions` finally merges cells into
//! rectangular runs for the zone's spatial index.

use log::warn;
use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::gen::cave::{self, CaveParams};
use crate::geom::{Rect, Side};
use crate::grid::{TileGrid, TileKind};
use crate::random::Dice;
use crate::theme::{FeatureKind, FeatureSpec, RegionTheme, ZoneTheme};

/// Blend strips never exceed this fraction of the zone extent.
pub const MAX_BORDER_PERCENT: u32 = 10;

/// Generation-scoped buffer of terrain identifiers, interned per grid.
#[derive(Clone)]
pub struct TerrainGrid {
    width: usize,
    height: usize,
    cells: Vec<u16>,
    names: Vec<String>,
}

impl TerrainGrid {
    pub fn new(width: usize, height: usize, base: &str) -> Self {
        TerrainGrid {
            width,
            height,
            cells: vec![0; width * height],
            names: vec![base.to_string()],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn intern(&mut self, name: &str) -> u16 {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            return idx as u16;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u16
    }

    pub fn get(&self, x: usize, y: usize) -> &str {
        &self.names[self.cells[y * self.width + x] as usize]
    }

    pub fn set(&mut self, x: usize, y: usize, terrain: &str) {
        let id = self.intern(terrain);
        self.cells[y * self.width + x] = id;
    }
}

/// Map each tile kind to a terrain identifier from the theme.
pub fn make_terrain(grid: &TileGrid, theme: &ZoneTheme) -> TerrainGrid {
    let mut tg = TerrainGrid::new(grid.width(), grid.height(), &theme.walls);
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let kind = grid.get(x as i32, y as i32);
            let terrain = if kind.is_door() {
                &theme.door
            } else if kind.is_open() {
                &theme.floor
            } else {
                &theme.walls
            };
            tg.set(x, y, terrain);
        }
    }
    tg
}

/// Blend one zone edge against the neighbouring zone's edge terrain.
///
/// Where the neighbour's terrain differs from this zone's, a strip of the
/// neighbour terrain grows inward. The strip depth follows a biased walk
/// along the edge (grow 0.3, shrink 0.3, hold otherwise) and is clamped to
/// a tenth of the zone's perpendicular extent.
pub fn make_border(tg: &mut TerrainGrid, side: Side, neighbour_edge: &[String], rng: &mut ChaCha8Rng) {
    if neighbour_edge.is_empty() {
        return;
    }

    let (len, perpendicular) = match side {
        Side::North | Side::South => (tg.width(), tg.height()),
        Side::East | Side::West => (tg.height(), tg.width()),
    };
    let max_depth = ((perpendicular * MAX_BORDER_PERCENT as usize) / 100).max(1);
    let mut depth = rng.roll(1, max_depth as i32) as usize;

    for i in 0..len {
        // Biased walk on the strip depth
        let roll = rng.fraction();
        if roll < 0.3 {
            depth += 1;
        } else if roll < 0.6 {
            depth = depth.saturating_sub(1);
        }
        depth = depth.clamp(1, max_depth);

        let neighbour = &neighbour_edge[i.min(neighbour_edge.len() - 1)];
        let (ex, ey) = edge_cell(tg, side, i, 0);
        if tg.get(ex, ey) == neighbour.as_str() {
            continue;
        }
        let terrain = neighbour.clone();
        for d in 0..depth {
            let (x, y) = edge_cell(tg, side, i, d);
            tg.set(x, y, &terrain);
        }
    }
}

/// Cell at position `i` along `side`, `d` cells inward from the edge.
fn edge_cell(tg: &TerrainGrid, side: Side, i: usize, d: usize) -> (usize, usize) {
    match side {
        Side::North => (i, d),
        Side::South => (i, tg.height() - 1 - d),
        Side::West => (d, i),
        Side::East => (tg.width() - 1 - d, i),
    }
}

/// Overlay the theme's natural features onto the terrain.
pub fn overlay_features(tg: &mut TerrainGrid, theme: &ZoneTheme, rng: &mut ChaCha8Rng) {
    for spec in &theme.features {
        let attempts = match spec.kind {
            FeatureKind::River => 1,
            FeatureKind::Lake => 2,
            FeatureKind::Patch => 2 + (tg.width() * tg.height()) / 1200,
        };
        for _ in 0..attempts {
            if !rng.chance(spec.frequency) {
                continue;
            }
            match spec.kind {
                FeatureKind::Lake => {
                    place_blob(tg, spec, spec.size, rng);
                }
                FeatureKind::Patch => {
                    place_blob(tg, spec, (spec.size / 2).max(1), rng);
                }
                FeatureKind::River => place_river(tg, spec, rng),
            }
        }
    }
}

/// Irregular filled blob; the radius is jittered by angle with Perlin noise
/// so lake shores come out organic rather than circular. Returns the number
/// of cells written.
fn place_blob(tg: &mut TerrainGrid, spec: &FeatureSpec, radius: u32, rng: &mut ChaCha8Rng) -> usize {
    let w = tg.width() as i32;
    let h = tg.height() as i32;
    let r = radius as i32;

    let cx = rng.roll(r.min(w - 1), (w - 1 - r).max(0));
    let cy = rng.roll(r.min(h - 1), (h - 1 - r).max(0));
    let jitter = Perlin::new(rng.gen::<u32>());
    let mut written = 0;

    for dy in -r..=r {
        for dx in -r..=r {
            let x = cx + dx;
            let y = cy + dy;
            if x < 0 || y < 0 || x >= w || y >= h {
                continue;
            }
            let dist = ((dx * dx + dy * dy) as f64).sqrt();
            if dist > r as f64 {
                continue;
            }
            let angle = (dy as f64).atan2(dx as f64);
            let n = jitter.get([angle.cos(), angle.sin()]);
            let limit = r as f64 * (0.7 + 0.3 * n);
            if dist <= limit {
                tg.set(x as usize, y as usize, &spec.terrain);
                written += 1;
            }
        }
    }
    written
}

/// Scatter variety patches from a region theme until roughly `patch_cover`
/// percent of the zone is covered.
pub fn overlay_patches(tg: &mut TerrainGrid, theme: &RegionTheme, rng: &mut ChaCha8Rng) {
    let area = tg.width() * tg.height();
    let target = area * theme.patch_cover.min(100) as usize / 100;
    let cap = target + 64;

    let mut covered = 0usize;
    let mut attempts = 0usize;
    while covered < target {
        attempts += 1;
        if attempts > cap {
            warn!("patch overlay stalled at {covered}/{target} cells; giving up");
            break;
        }
        let Some(terrain) = theme.patches.pick(rng) else {
            break;
        };
        let spec = FeatureSpec {
            kind: FeatureKind::Patch,
            terrain: terrain.to_string(),
            frequency: 100,
            size: 0,
        };
        let radius = rng.roll(2, 5) as u32;
        covered += place_blob(tg, &spec, radius, rng);
    }
}

/// Meandering strip crossing the whole zone, after the teacher's streams.
fn place_river(tg: &mut TerrainGrid, spec: &FeatureSpec, rng: &mut ChaCha8Rng) {
    let w = tg.width() as i32;
    let h = tg.height() as i32;
    let half_width = (spec.size as i32 / 2).max(0);

    let horizontal = rng.chance(50);
    let (start, end, steps) = if horizontal {
        (rng.roll(h / 4, 3 * h / 4), rng.roll(h / 4, 3 * h / 4), w)
    } else {
        (rng.roll(w / 4, 3 * w / 4), rng.roll(w / 4, 3 * w / 4), h)
    };

    let mut cross = start as f64;
    let drift = (end - start) as f64 / steps.max(1) as f64;

    for i in 0..steps {
        cross += drift + (rng.fraction() - 0.5) * 1.2;
        let c = cross.round() as i32;
        for d in -half_width..=half_width {
            let (x, y) = if horizontal { (i, c + d) } else { (c + d, i) };
            if x >= 0 && y >= 0 && x < w && y < h {
                tg.set(x as usize, y as usize, &spec.terrain);
            }
        }
    }
}

/// Grow the theme's vegetation layers.
///
/// Each layer runs its own cellular-automata pass on a grid scaled down by
/// the plant's footprint, then stamps the open cells back onto any terrain
/// that does not carry the swim modifier.
pub fn grow_vegetation(tg: &mut TerrainGrid, theme: &ZoneTheme, rng: &mut ChaCha8Rng) {
    for spec in &theme.vegetation {
        let step = spec.footprint as usize;
        let sw = (tg.width() / step).max(1);
        let sh = (tg.height() / step).max(1);

        let params = CaveParams {
            width: sw,
            height: sh,
            open_percent: spec.abundance,
            passes: 2,
            threshold: 4,
        };
        let pattern = cave::generate(&params, rng);

        for sy in 0..sh {
            for sx in 0..sw {
                if !pattern.get(sx as i32, sy as i32).is_passable() {
                    continue;
                }
                for dy in 0..step {
                    for dx in 0..step {
                        let x = sx * step + dx;
                        let y = sy * step + dy;
                        if x >= tg.width() || y >= tg.height() {
                            continue;
                        }
                        let here = tg.get(x, y).to_string();
                        if theme.swim_terrain.iter().any(|s| *s == here) {
                            continue;
                        }
                        tg.set(x, y, &spec.terrain);
                    }
                }
            }
        }
    }
}

/// Merge the terrain buffer into rectangular runs: horizontal runs per row,
/// then identical runs stacked vertically. The unit of static terrain
/// storage in a zone.
pub fn into_regions(tg: &TerrainGrid) -> Vec<(Rect, String)> {
    use std::collections::HashMap;

    let mut finished: Vec<(Rect, String)> = Vec::new();
    // Active runs from the previous row, keyed by (x, width, terrain)
    let mut active: HashMap<(usize, usize, String), Rect> = HashMap::new();

    for y in 0..tg.height() {
        let mut row_runs: Vec<(usize, usize, String)> = Vec::new();
        let mut x = 0;
        while x < tg.width() {
            let terrain = tg.get(x, y).to_string();
            let start = x;
            while x < tg.width() && tg.get(x, y) == terrain {
                x += 1;
            }
            row_runs.push((start, x - start, terrain));
        }

        let mut next: HashMap<(usize, usize, String), Rect> = HashMap::new();
        for (start, width, terrain) in row_runs {
            let key = (start, width, terrain);
            if let Some(mut rect) = active.remove(&key) {
                rect.height += 1;
                next.insert(key, rect);
            } else {
                next.insert(
                    key.clone(),
                    Rect::new(key.0 as i32, y as i32, key.1 as u32, 1),
                );
            }
        }

        // Runs that did not continue are finished
        for ((_, _, terrain), rect) in active.drain() {
            finished.push((rect, terrain));
        }
        active = next;
    }

    for ((_, _, terrain), rect) in active.drain() {
        finished.push((rect, terrain));
    }

    finished
}
