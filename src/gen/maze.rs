//! Recursive-backtracker maze generation.
//!
//! Carving runs over a half-resolution grid of blocks, each block standing
//! for a 2x2 patch of output cells so walls get grid cells of their own.
//! Two post-passes shape the result: "sparsen" trims dead ends back toward
//! their origin, and "loop" reconnects surviving dead ends into cycles so
//! the maze is not a pure tree. The squashed variant runs the same block
//! algorithm at full resolution and skips wall cells, which yields a denser,
//! cave-like pattern.

use log::warn;
use rand_chacha::ChaCha8Rng;

use crate::geom::Side;
use crate::grid::{TileGrid, TileKind};
use crate::random::Dice;

/// Tuning for one maze run.
#[derive(Clone, Debug)]
pub struct MazeParams {
    /// Output grid size in cells.
    pub width: usize,
    pub height: usize,
    /// Percent chance to re-roll the carving direction each step.
    pub randomness: u32,
    /// Number of dead-end removal passes.
    pub sparse: u32,
    /// Percent chance to loop each surviving dead end back into the maze.
    pub remove: u32,
    /// Run at full resolution without wall cells.
    pub squashed: bool,
}

/// Carving grid at block resolution: per-block visited flag plus one
/// passage flag per side (kept symmetric with the neighbouring block).
struct BlockGrid {
    width: usize,
    height: usize,
    open: Vec<bool>,
    passages: Vec<[bool; 4]>,
}

impl BlockGrid {
    fn new(width: usize, height: usize) -> Self {
        BlockGrid {
            width,
            height,
            open: vec![false; width * height],
            passages: vec![[false; 4]; width * height],
        }
    }

    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    fn neighbour(&self, x: usize, y: usize, side: Side) -> Option<(usize, usize)> {
        let (dx, dy) = side.delta();
        let nx = x as i32 + dx;
        let ny = y as i32 + dy;
        if nx < 0 || ny < 0 || nx as usize >= self.width || ny as usize >= self.height {
            return None;
        }
        Some((nx as usize, ny as usize))
    }

    fn carve(&mut self, x: usize, y: usize, side: Side) {
        let (nx, ny) = self.neighbour(x, y, side).expect("carve into bounds");
        let a = self.idx(x, y);
        let b = self.idx(nx, ny);
        self.passages[a][side.index()] = true;
        self.passages[b][side.opposite().index()] = true;
        self.open[b] = true;
    }

    fn close(&mut self, x: usize, y: usize, side: Side) {
        if let Some((nx, ny)) = self.neighbour(x, y, side) {
            let a = self.idx(x, y);
            let b = self.idx(nx, ny);
            self.passages[a][side.index()] = false;
            self.passages[b][side.opposite().index()] = false;
        }
    }

    fn passage_count(&self, x: usize, y: usize) -> usize {
        self.passages[self.idx(x, y)].iter().filter(|p| **p).count()
    }

    fn has_unvisited_neighbour(&self, x: usize, y: usize) -> bool {
        Side::ALL.iter().any(|s| {
            self.neighbour(x, y, *s)
                .map_or(false, |(nx, ny)| !self.open[self.idx(nx, ny)])
        })
    }

    /// Open blocks with exactly one open side.
    fn dead_ends(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.open[self.idx(x, y)] && self.passage_count(x, y) == 1 {
                    out.push((x, y));
                }
            }
        }
        out
    }

    fn only_open_side(&self, x: usize, y: usize) -> Option<Side> {
        let flags = self.passages[self.idx(x, y)];
        let mut found = None;
        for side in Side::ALL {
            if flags[side.index()] {
                if found.is_some() {
                    return None;
                }
                found = Some(side);
            }
        }
        found
    }
}

fn random_side(rng: &mut ChaCha8Rng) -> Side {
    Side::ALL[rng.roll(0, 3) as usize]
}

/// Generate a maze and return it as a tile grid of floors and walls.
pub fn generate(params: &MazeParams, rng: &mut ChaCha8Rng) -> TileGrid {
    let (bw, bh) = if params.squashed {
        (params.width.max(1), params.height.max(1))
    } else {
        ((params.width / 2).max(1), (params.height / 2).max(1))
    };

    let mut blocks = BlockGrid::new(bw, bh);
    carve_spanning_tree(&mut blocks, params.randomness, rng);

    for _ in 0..params.sparse {
        sparsen(&mut blocks);
    }

    loop_dead_ends(&mut blocks, params, rng);

    render(&blocks, params)
}

/// Carve until `width*height - 1` passages exist (a spanning tree).
///
/// Direction persists between steps and is re-rolled with probability
/// `randomness/100`; a dead end teleports the cursor to any already-visited
/// block and carving resumes from there.
fn carve_spanning_tree(blocks: &mut BlockGrid, randomness: u32, rng: &mut ChaCha8Rng) {
    let total = blocks.width * blocks.height;
    let target = total - 1;
    let cap = total * 100;

    let mut visited: Vec<(usize, usize)> = vec![(0, 0)];
    blocks.open[0] = true;

    let mut current = (0, 0);
    let mut dir = random_side(rng);
    let mut carved = 0usize;
    let mut steps = 0usize;

    while carved < target {
        steps += 1;
        if steps > cap {
            warn!(
                "maze carving hit step cap after {carved}/{target} passages; \
                 returning partial maze"
            );
            break;
        }

        if rng.chance(randomness) {
            dir = random_side(rng);
        }

        let target_block = blocks.neighbour(current.0, current.1, dir);
        match target_block {
            Some((nx, ny)) if !blocks.open[blocks.idx(nx, ny)] => {
                blocks.carve(current.0, current.1, dir);
                carved += 1;
                current = (nx, ny);
                visited.push(current);
            }
            _ => {
                if blocks.has_unvisited_neighbour(current.0, current.1) {
                    dir = random_side(rng);
                } else {
                    // Dead end: resume from any visited block
                    current = visited[rng.roll(0, visited.len() as i32 - 1) as usize];
                    dir = random_side(rng);
                }
            }
        }
    }
}

/// Remove every current dead end once, closing the passage back toward its
/// origin. One call is one sparsen pass.
fn sparsen(blocks: &mut BlockGrid) {
    for (x, y) in blocks.dead_ends() {
        if let Some(side) = blocks.only_open_side(x, y) {
            blocks.close(x, y, side);
            let idx = blocks.idx(x, y);
            blocks.open[idx] = false;
        }
    }
}

/// For each remaining dead end, with probability `remove/100`, carve a
/// randomized walk until it reconnects to any open block, creating a cycle.
fn loop_dead_ends(blocks: &mut BlockGrid, params: &MazeParams, rng: &mut ChaCha8Rng) {
    let cap = blocks.width * blocks.height * 4;

    for (x, y) in blocks.dead_ends() {
        if !rng.chance(params.remove) {
            continue;
        }

        let back = match blocks.only_open_side(x, y) {
            Some(side) => side,
            None => continue, // no longer a dead end
        };

        let mut current = (x, y);
        let mut dir = random_side(rng);
        let mut steps = 0usize;

        loop {
            steps += 1;
            if steps > cap {
                warn!("loop pass hit step cap at dead end ({x}, {y})");
                break;
            }

            if rng.chance(params.randomness) {
                dir = random_side(rng);
            }
            // Never immediately retreat through the existing passage
            if current == (x, y) && dir == back {
                dir = random_side(rng);
                continue;
            }

            let Some((nx, ny)) = blocks.neighbour(current.0, current.1, dir) else {
                dir = random_side(rng);
                continue;
            };

            let reconnected = blocks.open[blocks.idx(nx, ny)];
            blocks.carve(current.0, current.1, dir);
            if reconnected {
                break;
            }
            current = (nx, ny);
        }
    }
}

/// Translate the block grid to output cells.
fn render(blocks: &BlockGrid, params: &MazeParams) -> TileGrid {
    let mut grid = TileGrid::new(params.width, params.height, TileKind::Wall);

    for y in 0..blocks.height {
        for x in 0..blocks.width {
            if !blocks.open[blocks.idx(x, y)] {
                continue;
            }
            if params.squashed {
                grid.set_clamped(x as i32, y as i32, TileKind::Floor);
            } else {
                // Block cell, then the wall cells its passages open
                let cx = 2 * x as i32 + 1;
                let cy = 2 * y as i32 + 1;
                grid.set_clamped(cx, cy, TileKind::Floor);
                let flags = blocks.passages[blocks.idx(x, y)];
                for side in Side::ALL {
                    if flags[side.index()] {
                        let (dx, dy) = side.delta();
                        grid.set_clamped(cx + dx, cy + dy, TileKind::Floor);
                    }
                }
            }
        }
    }

    grid
}
