//! Dungeon layout generation: BSP, sparse, and packed variants.
//!
//! All variants place rooms via the shape stampers in [`rooms`](super::rooms)
//! and guarantee full reachability by construction: every room is connected
//! to the rest of the layout by a corridor or a shared-wall door the moment
//! it is placed.

use log::warn;
use rand_chacha::ChaCha8Rng;

use crate::geom::{Point, Rect, Side};
use crate::grid::{TileGrid, TileKind};
use crate::random::Dice;

use super::rooms::{self, Room, RoomShape};

/// Leaves smaller than this are never split further.
const MIN_LEAF: u32 = 8;

/// BSP split ratio bounds.
const SPLIT_MIN: f64 = 0.35;
const SPLIT_MAX: f64 = 0.65;

/// Recursive space partitioning: split alternately along width and height at
/// a randomized ratio, one room per leaf, siblings connected at every level
/// of the split tree.
pub fn generate_bsp(width: usize, height: usize, rng: &mut ChaCha8Rng) -> (TileGrid, Vec<Room>) {
    let mut grid = TileGrid::new(width, height, TileKind::Wall);

    let mut root = BspNode::new(Rect::new(0, 0, width as u32, height as u32));
    split_node(&mut root, 0, rng);
    place_rooms(&mut root, &mut grid, rng);
    connect_siblings(&root, &mut grid, rng);

    let mut out = Vec::new();
    collect_rooms(&root, &mut out);
    (grid, out)
}

/// Randomly scattered rooms joined by corridors; each new room is wired to
/// its nearest predecessor.
pub fn generate_sparse(width: usize, height: usize, rng: &mut ChaCha8Rng) -> (TileGrid, Vec<Room>) {
    let mut grid = TileGrid::new(width, height, TileKind::Wall);
    let area = width * height;
    let target = (area / 150).max(3);

    let mut placed: Vec<Rect> = Vec::new();
    let mut out: Vec<Room> = Vec::new();

    let mut attempts = target * 15;
    while out.len() < target && attempts > 0 {
        attempts -= 1;

        let w = rng.roll(5, 9) as u32;
        let h = rng.roll(5, 9) as u32;
        if width as u32 <= w + 2 || height as u32 <= h + 2 {
            continue;
        }
        let x = rng.roll(1, (width as u32 - w - 1) as i32);
        let y = rng.roll(1, (height as u32 - h - 1) as i32);
        let rect = Rect::new(x, y, w, h);

        // Keep a one-cell gap between rooms
        let inflated = Rect::new(rect.x - 1, rect.y - 1, rect.width + 2, rect.height + 2);
        if placed.iter().any(|r| r.overlaps(&inflated)) {
            continue;
        }

        let shape = rooms::choose_shape(w, h, rng);
        let room = rooms::stamp(&mut grid, rect, shape, rng);

        if let Some(prev) = nearest_room(&out, room.center()) {
            carve_corridor(&mut grid, room.center(), prev, rng);
        }

        placed.push(rect);
        out.push(room);
    }

    if out.len() < target {
        warn!(
            "sparse layout placed {}/{} rooms before exhausting attempts",
            out.len(),
            target
        );
    }

    (grid, out)
}

/// Densely packed rectangular rooms joined at shared edges; every new room
/// is attached flush against an existing wall with a door punched through.
pub fn generate_packed(width: usize, height: usize, rng: &mut ChaCha8Rng) -> (TileGrid, Vec<Room>) {
    let mut grid = TileGrid::new(width, height, TileKind::Wall);
    let area = width * height;
    let target = (area / 50).max(4);

    let mut outers: Vec<Rect> = Vec::new();
    let mut out: Vec<Room> = Vec::new();

    // Seed room near the centre
    let w = rng.roll(6, 9) as u32;
    let h = rng.roll(6, 9) as u32;
    let seed_rect = Rect::new(
        (width as i32 / 2 - w as i32 / 2).max(1),
        (height as i32 / 2 - h as i32 / 2).max(1),
        w,
        h,
    );
    out.push(rooms::stamp(&mut grid, seed_rect, RoomShape::Rectangular, rng));
    outers.push(seed_rect);

    let mut attempts = area;
    while out.len() < target && attempts > 0 {
        attempts -= 1;

        let host = outers[rng.roll(0, outers.len() as i32 - 1) as usize];
        let side = Side::ALL[rng.roll(0, 3) as usize];
        let w = rng.roll(5, 9) as u32;
        let h = rng.roll(5, 9) as u32;

        let Some(rect) = attach_rect(host, side, w, h, rng) else {
            continue;
        };
        if !fits_inside(&grid, rect) {
            continue;
        }
        if !interior_is_free(&grid, rect, side) {
            continue;
        }

        let room = rooms::stamp(&mut grid, rect, RoomShape::Rectangular, rng);
        punch_shared_door(&mut grid, host, rect, side, rng);

        outers.push(rect);
        out.push(room);
    }

    if out.len() < target {
        warn!(
            "packed layout placed {}/{} rooms before exhausting attempts",
            out.len(),
            target
        );
    }

    (grid, out)
}

// ---------------------------------------------------------------------------
// BSP internals

struct BspNode {
    rect: Rect,
    left: Option<Box<BspNode>>,
    right: Option<Box<BspNode>>,
    room: Option<Room>,
}

impl BspNode {
    fn new(rect: Rect) -> Self {
        BspNode {
            rect,
            left: None,
            right: None,
            room: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// First room found in this subtree.
    fn any_room(&self) -> Option<&Room> {
        if let Some(ref room) = self.room {
            return Some(room);
        }
        self.left
            .as_deref()
            .and_then(BspNode::any_room)
            .or_else(|| self.right.as_deref().and_then(BspNode::any_room))
    }
}

fn split_node(node: &mut BspNode, depth: usize, rng: &mut ChaCha8Rng) {
    // Alternate split axis by depth, falling back to the other axis when the
    // preferred one is too small to split
    let horizontal = depth % 2 == 0;
    let can_split_h = node.rect.height >= MIN_LEAF * 2;
    let can_split_v = node.rect.width >= MIN_LEAF * 2;

    let split_h = match (horizontal, can_split_h, can_split_v) {
        (true, true, _) => true,
        (true, false, true) => false,
        (false, _, true) => false,
        (false, true, false) => true,
        _ => return, // leaf
    };

    let ratio = SPLIT_MIN + rng.fraction() * (SPLIT_MAX - SPLIT_MIN);

    let (mut a, mut b) = if split_h {
        let split = (node.rect.height as f64 * ratio) as u32;
        let split = split.clamp(MIN_LEAF, node.rect.height - MIN_LEAF);
        (
            BspNode::new(Rect::new(node.rect.x, node.rect.y, node.rect.width, split)),
            BspNode::new(Rect::new(
                node.rect.x,
                node.rect.y + split as i32,
                node.rect.width,
                node.rect.height - split,
            )),
        )
    } else {
        let split = (node.rect.width as f64 * ratio) as u32;
        let split = split.clamp(MIN_LEAF, node.rect.width - MIN_LEAF);
        (
            BspNode::new(Rect::new(node.rect.x, node.rect.y, split, node.rect.height)),
            BspNode::new(Rect::new(
                node.rect.x + split as i32,
                node.rect.y,
                node.rect.width - split,
                node.rect.height,
            )),
        )
    };

    split_node(&mut a, depth + 1, rng);
    split_node(&mut b, depth + 1, rng);
    node.left = Some(Box::new(a));
    node.right = Some(Box::new(b));
}

fn place_rooms(node: &mut BspNode, grid: &mut TileGrid, rng: &mut ChaCha8Rng) {
    if node.is_leaf() {
        let leaf = node.rect;
        let max_w = leaf.width.saturating_sub(2).max(4);
        let max_h = leaf.height.saturating_sub(2).max(4);
        let w = rng.roll((max_w as i32 / 2).max(4), max_w as i32) as u32;
        let h = rng.roll((max_h as i32 / 2).max(4), max_h as i32) as u32;
        let x = leaf.x + rng.roll(1, (leaf.width - w).max(2) as i32 - 1);
        let y = leaf.y + rng.roll(1, (leaf.height - h).max(2) as i32 - 1);

        let shape = rooms::choose_shape(w, h, rng);
        node.room = Some(rooms::stamp(grid, Rect::new(x, y, w, h), shape, rng));
        return;
    }

    if let Some(ref mut left) = node.left {
        place_rooms(left, grid, rng);
    }
    if let Some(ref mut right) = node.right {
        place_rooms(right, grid, rng);
    }
}

fn connect_siblings(node: &BspNode, grid: &mut TileGrid, rng: &mut ChaCha8Rng) {
    if let (Some(left), Some(right)) = (node.left.as_deref(), node.right.as_deref()) {
        if let (Some(a), Some(b)) = (left.any_room(), right.any_room()) {
            carve_corridor(grid, a.center(), b.center(), rng);
        }
        connect_siblings(left, grid, rng);
        connect_siblings(right, grid, rng);
    }
}

fn collect_rooms(node: &BspNode, out: &mut Vec<Room>) {
    if let Some(ref room) = node.room {
        out.push(room.clone());
    }
    if let Some(ref left) = node.left {
        collect_rooms(left, out);
    }
    if let Some(ref right) = node.right {
        collect_rooms(right, out);
    }
}

// ---------------------------------------------------------------------------
// Packed internals

/// Rectangle for a new room sharing a wall line with `host` on `side`.
/// The interiors must overlap by at least one row/column so a door can be
/// punched between them.
fn attach_rect(host: Rect, side: Side, w: u32, h: u32, rng: &mut ChaCha8Rng) -> Option<Rect> {
    match side {
        Side::East | Side::West => {
            let x = if side == Side::East {
                host.right() - 1
            } else {
                host.x - w as i32 + 1
            };
            let min_y = host.y + 3 - h as i32;
            let max_y = host.bottom() - 3;
            if min_y > max_y {
                return None;
            }
            Some(Rect::new(x, rng.roll(min_y, max_y), w, h))
        }
        Side::North | Side::South => {
            let y = if side == Side::South {
                host.bottom() - 1
            } else {
                host.y - h as i32 + 1
            };
            let min_x = host.x + 3 - w as i32;
            let max_x = host.right() - 3;
            if min_x > max_x {
                return None;
            }
            Some(Rect::new(rng.roll(min_x, max_x), y, w, h))
        }
    }
}

fn fits_inside(grid: &TileGrid, rect: Rect) -> bool {
    rect.x >= 0
        && rect.y >= 0
        && rect.right() <= grid.width() as i32
        && rect.bottom() <= grid.height() as i32
}

/// The new room's cells must be unexcavated rock except along the shared
/// wall line.
fn interior_is_free(grid: &TileGrid, rect: Rect, side: Side) -> bool {
    let shared_line = match side {
        Side::East => rect.x,
        Side::West => rect.right() - 1,
        Side::South => rect.y,
        Side::North => rect.bottom() - 1,
    };
    for p in rect.points() {
        let on_shared = match side {
            Side::East | Side::West => p.x == shared_line,
            Side::North | Side::South => p.y == shared_line,
        };
        if !on_shared && grid.get(p.x, p.y) != TileKind::Wall {
            return false;
        }
    }
    true
}

/// Open a door in the wall the two rooms share, on a cell interior to both.
fn punch_shared_door(grid: &mut TileGrid, host: Rect, new: Rect, side: Side, rng: &mut ChaCha8Rng) {
    match side {
        Side::East | Side::West => {
            let x = if side == Side::East { new.x } else { new.right() - 1 };
            let lo = (host.y + 1).max(new.y + 1);
            let hi = (host.bottom() - 2).min(new.bottom() - 2);
            if lo <= hi {
                let y = rng.roll(lo, hi);
                grid.set(x, y, door_kind(rng));
            }
        }
        Side::North | Side::South => {
            let y = if side == Side::South { new.y } else { new.bottom() - 1 };
            let lo = (host.x + 1).max(new.x + 1);
            let hi = (host.right() - 2).min(new.right() - 2);
            if lo <= hi {
                let x = rng.roll(lo, hi);
                grid.set(x, y, door_kind(rng));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Corridors

/// Most doors are plain; some are concealed or locked.
fn door_kind(rng: &mut ChaCha8Rng) -> TileKind {
    match rng.roll(0, 99) {
        0..=9 => TileKind::HiddenDoor,
        10..=19 => TileKind::LockedDoor,
        _ => TileKind::Door,
    }
}

fn nearest_room(rooms: &[Room], from: Point) -> Option<Point> {
    rooms
        .iter()
        .map(|r| r.center())
        .min_by_key(|c| c.distance(&from))
}

/// Carve an L-shaped corridor between two points, opening a door (rolled
/// plain, hidden, or locked) wherever the path crosses a room wall and
/// sidestepping corner cells (corridors never attach at corners).
pub fn carve_corridor(grid: &mut TileGrid, from: Point, to: Point, rng: &mut ChaCha8Rng) {
    let cap = (from.distance(&to) as usize) * 6 + 32;
    let mut cur = from;
    open_corridor_cell(grid, cur, rng);

    let mut steps = 0usize;
    while cur != to {
        steps += 1;
        if steps > cap {
            warn!("corridor walk from {from:?} to {to:?} hit step cap");
            break;
        }

        let dx = to.x - cur.x;
        let dy = to.y - cur.y;
        // Horizontal leg first, then vertical
        let step = if dx != 0 {
            (dx.signum(), 0)
        } else {
            (0, dy.signum())
        };

        let mut next = Point::new(cur.x + step.0, cur.y + step.1);
        if grid.in_bounds(next.x, next.y) && grid.get(next.x, next.y) == TileKind::Corner {
            next = sidestep(grid, cur, step, dx, dy).unwrap_or(next);
        }

        if !grid.in_bounds(next.x, next.y) {
            break;
        }
        open_corridor_cell(grid, next, rng);
        cur = next;
    }
}

/// Detour one cell perpendicular to the travel direction to pass a corner.
fn sidestep(grid: &TileGrid, cur: Point, step: (i32, i32), dx: i32, dy: i32) -> Option<Point> {
    let perp = if step.0 != 0 {
        (0, if dy != 0 { dy.signum() } else { 1 })
    } else {
        (if dx != 0 { dx.signum() } else { 1 }, 0)
    };

    for cand in [
        Point::new(cur.x + perp.0, cur.y + perp.1),
        Point::new(cur.x - perp.0, cur.y - perp.1),
    ] {
        if grid.in_bounds(cand.x, cand.y) && grid.get(cand.x, cand.y) != TileKind::Corner {
            return Some(cand);
        }
    }
    None
}

fn open_corridor_cell(grid: &mut TileGrid, p: Point, rng: &mut ChaCha8Rng) {
    if !grid.in_bounds(p.x, p.y) {
        return;
    }
    match grid.get(p.x, p.y) {
        TileKind::Wall => grid.set(p.x, p.y, TileKind::Corridor),
        TileKind::RoomWall => {
            let kind = door_kind(rng);
            grid.set(p.x, p.y, kind);
        }
        // Forced through a corner by the sidestep fallback; open it rather
        // than leave the corridor severed
        TileKind::Corner => {
            warn!("corridor forced through corner at {p:?}");
            grid.set(p.x, p.y, TileKind::Corridor);
        }
        _ => {}
    }
}
