//! Tile grid scratch buffer used by the shape generators.
//!
//! A `TileGrid` is the working representation during generation: a dense
//! 2-D array of small enumerated tile kinds, carrying one extra ring of
//! border cells on each side so edge blending and neighbourhood counting
//! never need special cases at the rim. The grid is discarded after the
//! terrain pass converts it to regions.

use crate::geom::{Point, Rect};

/// Low-level cell classification used only during generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileKind {
    /// Solid rock / unexcavated.
    Wall,
    /// Open room interior.
    Floor,
    /// Plain door.
    Door,
    /// Concealed door.
    HiddenDoor,
    /// Locked door.
    LockedDoor,
    /// Carved passage between rooms.
    Corridor,
    /// Room perimeter a corridor may attach to.
    RoomWall,
    /// Room corner; corridors must not attach here.
    Corner,
}

impl TileKind {
    /// Whether a creature could stand here once translated to terrain.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            TileKind::Floor
                | TileKind::Door
                | TileKind::HiddenDoor
                | TileKind::LockedDoor
                | TileKind::Corridor
        )
    }

    pub fn is_door(&self) -> bool {
        matches!(
            self,
            TileKind::Door | TileKind::HiddenDoor | TileKind::LockedDoor
        )
    }

    /// Floor-like for connectivity purposes (doors connect, walls do not).
    pub fn is_passable(&self) -> bool {
        self.is_open()
    }
}

/// Dense tile buffer with a one-cell border ring on every side.
///
/// Logical coordinates run `0..width` / `0..height`; the ring is addressable
/// at `-1` and `width`/`height`, which keeps 3x3 neighbourhood scans and
/// border blending free of bounds arithmetic.
#[derive(Clone)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<TileKind>,
}

impl TileGrid {
    /// Create a grid filled with `fill`, ring included.
    pub fn new(width: usize, height: usize, fill: TileKind) -> Self {
        TileGrid {
            width,
            height,
            tiles: vec![fill; (width + 2) * (height + 2)],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Logical bounds as a rectangle at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as u32, self.height as u32)
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        debug_assert!(x >= -1 && x <= self.width as i32);
        debug_assert!(y >= -1 && y <= self.height as i32);
        (y + 1) as usize * (self.width + 2) + (x + 1) as usize
    }

    /// Whether logical (not ring) coordinates are in bounds.
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Read a cell; the border ring is addressable at -1 and width/height.
    pub fn get(&self, x: i32, y: i32) -> TileKind {
        self.tiles[self.offset(x, y)]
    }

    /// Write a cell; the border ring is writable scratch.
    pub fn set(&mut self, x: i32, y: i32, kind: TileKind) {
        let off = self.offset(x, y);
        self.tiles[off] = kind;
    }

    /// Write a cell only when logical coordinates are in bounds.
    pub fn set_clamped(&mut self, x: i32, y: i32, kind: TileKind) {
        if self.in_bounds(x, y) {
            self.set(x, y, kind);
        }
    }

    /// Fill a rectangle (clipped to logical bounds).
    pub fn fill(&mut self, rect: Rect, kind: TileKind) {
        if let Some(clipped) = rect.clipped_to(&self.bounds()) {
            for p in clipped.points() {
                self.set(p.x, p.y, kind);
            }
        }
    }

    /// Count cells of one kind in the 3x3 neighbourhood centred on (x, y),
    /// including the centre. Ring cells participate.
    pub fn count_neighbourhood(&self, x: i32, y: i32, kind: TileKind) -> u32 {
        let mut count = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let nx = x + dx;
                let ny = y + dy;
                if nx >= -1
                    && nx <= self.width as i32
                    && ny >= -1
                    && ny <= self.height as i32
                    && self.get(nx, ny) == kind
                {
                    count += 1;
                }
            }
        }
        count
    }

    /// Count cells of one kind among the 8 surrounding cells (centre excluded).
    pub fn count_ring8(&self, x: i32, y: i32, kind: TileKind) -> u32 {
        let centre = if self.get(x, y) == kind { 1 } else { 0 };
        self.count_neighbourhood(x, y, kind) - centre
    }

    /// Number of logical cells for which `pred` holds.
    pub fn count_where(&self, pred: impl Fn(TileKind) -> bool) -> usize {
        let mut count = 0;
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                if pred(self.get(x, y)) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Flood fill over passable cells starting at `start`, 4-connected.
    /// Returns the visited set as a boolean buffer in row-major logical order.
    pub fn flood_fill(&self, start: Point) -> Vec<bool> {
        let mut visited = vec![false; self.width * self.height];
        if !self.in_bounds(start.x, start.y) || !self.get(start.x, start.y).is_passable() {
            return visited;
        }

        let mut stack = vec![start];
        visited[start.y as usize * self.width + start.x as usize] = true;

        while let Some(p) = stack.pop() {
            for (dx, dy) in [(0, -1), (1, 0), (0, 1), (-1, 0)] {
                let nx = p.x + dx;
                let ny = p.y + dy;
                if !self.in_bounds(nx, ny) {
                    continue;
                }
                let idx = ny as usize * self.width + nx as usize;
                if !visited[idx] && self.get(nx, ny).is_passable() {
                    visited[idx] = true;
                    stack.push(Point::new(nx, ny));
                }
            }
        }

        visited
    }

    /// Whether every passable cell is reachable from every other one.
    pub fn is_connected(&self) -> bool {
        let open: Vec<Point> = {
            let mut v = Vec::new();
            for y in 0..self.height as i32 {
                for x in 0..self.width as i32 {
                    if self.get(x, y).is_passable() {
                        v.push(Point::new(x, y));
                    }
                }
            }
            v
        };

        let Some(first) = open.first() else {
            return true;
        };
        let visited = self.flood_fill(*first);
        open.iter()
            .all(|p| visited[p.y as usize * self.width + p.x as usize])
    }

    /// Partition passable cells into 4-connected components, largest first.
    pub fn components(&self) -> Vec<Vec<Point>> {
        let mut seen = vec![false; self.width * self.height];
        let mut components = Vec::new();

        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let idx = y as usize * self.width + x as usize;
                if seen[idx] || !self.get(x, y).is_passable() {
                    continue;
                }
                let visited = self.flood_fill(Point::new(x, y));
                let mut component = Vec::new();
                for (i, v) in visited.iter().enumerate() {
                    if *v {
                        seen[i] = true;
                        component.push(Point::new(
                            (i % self.width) as i32,
                            (i / self.width) as i32,
                        ));
                    }
                }
                components.push(component);
            }
        }

        components.sort_by_key(|c| std::cmp::Reverse(c.len()));
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_ring_is_addressable() {
        let mut grid = TileGrid::new(4, 4, TileKind::Wall);
        grid.set(-1, -1, TileKind::Corner);
        grid.set(4, 4, TileKind::Corner);
        assert_eq!(grid.get(-1, -1), TileKind::Corner);
        assert_eq!(grid.get(4, 4), TileKind::Corner);
        // Ring writes never count as logical cells
        assert_eq!(grid.count_where(|k| k == TileKind::Corner), 0);
    }

    #[test]
    fn neighbourhood_count_includes_centre() {
        let mut grid = TileGrid::new(3, 3, TileKind::Wall);
        grid.set(1, 1, TileKind::Floor);
        grid.set(0, 1, TileKind::Floor);
        assert_eq!(grid.count_neighbourhood(1, 1, TileKind::Floor), 2);
        assert_eq!(grid.count_ring8(1, 1, TileKind::Floor), 1);
    }

    #[test]
    fn flood_fill_respects_walls() {
        let mut grid = TileGrid::new(5, 1, TileKind::Floor);
        grid.set(2, 0, TileKind::Wall);

        let visited = grid.flood_fill(Point::new(0, 0));
        assert!(visited[0] && visited[1]);
        assert!(!visited[3] && !visited[4]);
        assert!(!grid.is_connected());

        let comps = grid.components();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].len(), 2);
    }

    #[test]
    fn doors_connect_floors() {
        let mut grid = TileGrid::new(3, 1, TileKind::Floor);
        grid.set(1, 0, TileKind::Door);
        assert!(grid.is_connected());
    }
}
