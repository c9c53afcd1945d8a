//! Room stamping.
//!
//! Three room shapes share one contract: given the tile grid and a bounding
//! rectangle, stamp floor, wall and corner tile kinds into the grid and
//! return an abstract [`Room`] used later for corridor connection. Corner
//! cells are the attachment exclusion zone: corridors may open a door
//! through a `RoomWall` but never through a `Corner`.

use log::warn;
use rand_chacha::ChaCha8Rng;

use crate::geom::{Point, Rect};
use crate::grid::{TileGrid, TileKind};
use crate::random::Dice;

/// A placed room: one or more constituent rectangles.
#[derive(Clone, Debug)]
pub struct Room {
    pub rects: Vec<Rect>,
}

impl Room {
    pub fn new(rect: Rect) -> Self {
        Room { rects: vec![rect] }
    }

    /// Bounding box over all constituent rectangles.
    pub fn bounds(&self) -> Rect {
        let mut iter = self.rects.iter();
        let first = *iter.next().expect("room has at least one rect");
        iter.fold(first, |acc, r| acc.union(r))
    }

    /// A point guaranteed to lie on the room's floor (the centre of the
    /// first constituent rectangle). The bounding-box centre of an L-shaped
    /// union can land outside the floor, so corridor attachment uses this.
    pub fn center(&self) -> Point {
        self.rects[0].center()
    }

    pub fn contains(&self, p: Point) -> bool {
        self.rects.iter().any(|r| r.contains(p))
    }
}

/// Which stamping routine to use for a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomShape {
    Rectangular,
    Polygonal,
    Cavelike,
}

/// Weighted shape choice used by the layout generators.
pub fn choose_shape(width: u32, height: u32, rng: &mut ChaCha8Rng) -> RoomShape {
    let min_dim = width.min(height);
    let roll = rng.roll(0, 99);
    match roll {
        0..=54 => RoomShape::Rectangular,
        55..=79 if min_dim >= 6 => RoomShape::Polygonal,
        80..=99 if min_dim >= 6 => RoomShape::Cavelike,
        _ => RoomShape::Rectangular,
    }
}

/// Stamp a room of the given shape into `rect`.
pub fn stamp(grid: &mut TileGrid, rect: Rect, shape: RoomShape, rng: &mut ChaCha8Rng) -> Room {
    let rect = clamp_to_grid(grid, rect);

    // Too small for walls: floor what we have and call it a room
    if rect.width < 3 || rect.height < 3 {
        grid.fill(rect, TileKind::Floor);
        return Room::new(rect);
    }

    match shape {
        RoomShape::Rectangular => stamp_rectangular(grid, rect),
        RoomShape::Polygonal => stamp_polygonal(grid, rect, rng),
        RoomShape::Cavelike => stamp_cavelike(grid, rect, rng),
    }
}

/// Recover locally from degenerate geometry by clamping to the grid.
fn clamp_to_grid(grid: &TileGrid, rect: Rect) -> Rect {
    match rect.clipped_to(&grid.bounds()) {
        Some(clipped) => {
            if clipped != rect {
                warn!(
                    "room rect {:?} exceeds grid {}x{}; clamped to {:?}",
                    rect,
                    grid.width(),
                    grid.height(),
                    clipped
                );
            }
            clipped
        }
        None => {
            warn!(
                "room rect {:?} entirely outside grid {}x{}; using 1x1 at origin",
                rect,
                grid.width(),
                grid.height()
            );
            Rect::new(0, 0, 1, 1)
        }
    }
}

/// Classic rectangular room: floored interior, `RoomWall` perimeter that
/// corridors may attach to, and four unattachable `Corner` cells.
fn stamp_rectangular(grid: &mut TileGrid, rect: Rect) -> Room {
    for p in rect.points() {
        let on_edge =
            p.x == rect.x || p.x == rect.right() - 1 || p.y == rect.y || p.y == rect.bottom() - 1;
        if !on_edge {
            grid.set(p.x, p.y, TileKind::Floor);
            continue;
        }
        let on_corner = (p.x == rect.x || p.x == rect.right() - 1)
            && (p.y == rect.y || p.y == rect.bottom() - 1);
        grid.set(
            p.x,
            p.y,
            if on_corner {
                TileKind::Corner
            } else {
                TileKind::RoomWall
            },
        );
    }

    Room::new(Rect::new(rect.x + 1, rect.y + 1, rect.width - 2, rect.height - 2))
}

/// Two randomly placed sub-rectangles, unioned. Wall and corner cells are
/// derived from 8-neighbourhood floor adjacency: a wall touching floor is a
/// room wall, and it is a corner iff exactly one of its 8 neighbours is
/// floor.
fn stamp_polygonal(grid: &mut TileGrid, rect: Rect, rng: &mut ChaCha8Rng) -> Room {
    let first = random_subrect(rect, rng);
    let mut second = random_subrect(rect, rng);
    for _ in 0..8 {
        if second.overlaps(&first) {
            break;
        }
        second = random_subrect(rect, rng);
    }
    if !second.overlaps(&first) {
        second = first;
    }

    // Floor the union of both rectangles; the walls grow around it from
    // adjacency classification below.
    grid.fill(first, TileKind::Floor);
    grid.fill(second, TileKind::Floor);

    classify_walls(grid, rect);

    Room { rects: vec![first, second] }
}

/// Random sub-rectangle of at least 3x3 inside `rect`.
fn random_subrect(rect: Rect, rng: &mut ChaCha8Rng) -> Rect {
    let w = rng.roll(3, rect.width as i32) as u32;
    let h = rng.roll(3, rect.height as i32) as u32;
    let x = rect.x + rng.roll(0, rect.width as i32 - w as i32);
    let y = rect.y + rng.roll(0, rect.height as i32 - h as i32);
    Rect::new(x, y, w, h)
}

/// Irregular, roughly room-shaped blob: for every boundary point of the
/// rectangle, cast a line from the room centre and floor the cells along it
/// while they stay inside a rounded-rectangle mask, stopping a randomized
/// inset short of the boundary.
fn stamp_cavelike(grid: &mut TileGrid, rect: Rect, rng: &mut ChaCha8Rng) -> Room {
    let center = rect.center();
    let max_inset = (rect.width.min(rect.height) as i32 / 4).max(1);

    let mut min = center;
    let mut max = center;

    let boundary = perimeter_points(rect);
    for b in boundary {
        let inset = rng.roll(0, max_inset);
        let dx = (b.x - center.x) as f64;
        let dy = (b.y - center.y) as f64;
        let len = (dx * dx + dy * dy).sqrt();
        if len == 0.0 {
            continue;
        }
        let reach = (len - inset as f64).max(1.0);

        // Half-cell steps keep every crossed cell within tolerance of the line
        let steps = (reach * 2.0).ceil() as i32;
        let mut prev = center;
        for s in 0..=steps {
            let t = s as f64 / (steps.max(1) as f64) * reach / len;
            let x = (center.x as f64 + dx * t).round() as i32;
            let y = (center.y as f64 + dy * t).round() as i32;
            if !in_rounded_mask(rect, x, y) || !grid.in_bounds(x, y) {
                break;
            }
            // Bridge diagonal steps so the blob stays 4-connected
            if x != prev.x && y != prev.y {
                let bridge = if in_rounded_mask(rect, x, prev.y) {
                    Point::new(x, prev.y)
                } else {
                    Point::new(prev.x, y)
                };
                if grid.in_bounds(bridge.x, bridge.y) {
                    grid.set(bridge.x, bridge.y, TileKind::Floor);
                    min.x = min.x.min(bridge.x);
                    min.y = min.y.min(bridge.y);
                    max.x = max.x.max(bridge.x);
                    max.y = max.y.max(bridge.y);
                }
            }
            grid.set(x, y, TileKind::Floor);
            prev = Point::new(x, y);
            min.x = min.x.min(x);
            min.y = min.y.min(y);
            max.x = max.x.max(x);
            max.y = max.y.max(y);
        }
    }

    // The rays always floor the cells nearest the centre
    grid.set_clamped(center.x, center.y, TileKind::Floor);

    classify_walls(grid, rect);

    // First rect pins center() to the explicitly floored stamping centre
    Room {
        rects: vec![
            Rect::at(center),
            Rect::new(
                min.x,
                min.y,
                (max.x - min.x + 1) as u32,
                (max.y - min.y + 1) as u32,
            ),
        ],
    }
}

/// Rounded-rectangle membership test with radius a quarter of the short side.
fn in_rounded_mask(rect: Rect, x: i32, y: i32) -> bool {
    if !rect.contains(Point::new(x, y)) {
        return false;
    }
    let r = (rect.width.min(rect.height) as i32 / 4).max(1);
    let left = rect.x + r;
    let right = rect.right() - 1 - r;
    let top = rect.y + r;
    let bottom = rect.bottom() - 1 - r;

    let cx = x.clamp(left, right);
    let cy = y.clamp(top, bottom);
    let dx = x - cx;
    let dy = y - cy;
    dx * dx + dy * dy <= r * r
}

fn perimeter_points(rect: Rect) -> Vec<Point> {
    let mut out = Vec::new();
    for x in rect.x..rect.right() {
        out.push(Point::new(x, rect.y));
        out.push(Point::new(x, rect.bottom() - 1));
    }
    for y in rect.y + 1..rect.bottom() - 1 {
        out.push(Point::new(rect.x, y));
        out.push(Point::new(rect.right() - 1, y));
    }
    out
}

/// Derive `RoomWall`/`Corner` classification from floor adjacency for the
/// irregular shapes. Scans one cell beyond `rect` so walls hug the blob.
fn classify_walls(grid: &mut TileGrid, rect: Rect) {
    let scan = Rect::new(rect.x - 1, rect.y - 1, rect.width + 2, rect.height + 2);
    let scan = match scan.clipped_to(&grid.bounds()) {
        Some(s) => s,
        None => return,
    };

    let mut walls = Vec::new();
    let mut corners = Vec::new();
    for p in scan.points() {
        if grid.get(p.x, p.y) != TileKind::Wall {
            continue;
        }
        let floors = grid.count_ring8(p.x, p.y, TileKind::Floor);
        if floors == 1 {
            corners.push(p);
        } else if floors > 1 {
            walls.push(p);
        }
    }
    for p in walls {
        grid.set(p.x, p.y, TileKind::RoomWall);
    }
    for p in corners {
        grid.set(p.x, p.y, TileKind::Corner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn rectangular_room_layout() {
        let mut grid = TileGrid::new(10, 10, TileKind::Wall);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let room = stamp(&mut grid, Rect::new(1, 1, 6, 5), RoomShape::Rectangular, &mut rng);

        assert_eq!(room.rects[0], Rect::new(2, 2, 4, 3));
        assert_eq!(grid.get(1, 1), TileKind::Corner);
        assert_eq!(grid.get(6, 1), TileKind::Corner);
        assert_eq!(grid.get(1, 5), TileKind::Corner);
        assert_eq!(grid.get(6, 5), TileKind::Corner);
        assert_eq!(grid.get(3, 1), TileKind::RoomWall);
        assert_eq!(grid.get(3, 3), TileKind::Floor);
    }

    #[test]
    fn oversized_room_is_clamped() {
        let mut grid = TileGrid::new(8, 8, TileKind::Wall);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let room = stamp(&mut grid, Rect::new(2, 2, 50, 50), RoomShape::Rectangular, &mut rng);
        // Clamped to the grid, interior inside it
        assert!(grid.bounds().contains_rect(&room.bounds()));
    }

    #[test]
    fn polygonal_room_floor_is_connected() {
        for seed in [3u64, 4, 5, 6] {
            let mut grid = TileGrid::new(14, 14, TileKind::Wall);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let room = stamp(&mut grid, Rect::new(1, 1, 12, 12), RoomShape::Polygonal, &mut rng);
            assert!(grid.is_connected(), "seed {seed}");
            assert!(!room.rects.is_empty());
            assert!(grid.count_where(|k| k == TileKind::Floor) > 0);
        }
    }

    #[test]
    fn polygonal_corner_rule() {
        // A wall cell flagged Corner has exactly one floor among its 8
        // neighbours; RoomWall has more than one.
        let mut grid = TileGrid::new(14, 14, TileKind::Wall);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        stamp(&mut grid, Rect::new(1, 1, 12, 12), RoomShape::Polygonal, &mut rng);

        for y in 0..14 {
            for x in 0..14 {
                match grid.get(x, y) {
                    TileKind::Corner => {
                        assert_eq!(grid.count_ring8(x, y, TileKind::Floor), 1)
                    }
                    TileKind::RoomWall => {
                        assert!(grid.count_ring8(x, y, TileKind::Floor) > 1)
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn cavelike_room_is_connected_blob() {
        for seed in [7u64, 8, 9] {
            let mut grid = TileGrid::new(16, 16, TileKind::Wall);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let room = stamp(&mut grid, Rect::new(2, 2, 12, 12), RoomShape::Cavelike, &mut rng);
            assert!(grid.is_connected(), "seed {seed}");
            assert!(room.contains(room.center()) || grid.get(room.center().x, room.center().y).is_passable());
        }
    }

    #[test]
    fn tiny_rect_floors_without_walls() {
        let mut grid = TileGrid::new(6, 6, TileKind::Wall);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let room = stamp(&mut grid, Rect::new(2, 2, 2, 1), RoomShape::Rectangular, &mut rng);
        assert_eq!(room.rects[0], Rect::new(2, 2, 2, 1));
        assert_eq!(grid.get(2, 2), TileKind::Floor);
        assert_eq!(grid.get(3, 2), TileKind::Floor);
    }
}
