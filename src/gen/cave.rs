//! Stochastic cellular-automata cave generation.
//!
//! Cells start open with a configured probability, then single random cells
//! are re-evaluated one at a time against their 3x3 neighbourhood. This is
//! deliberately not a synchronous full-grid automaton; the asynchronous
//! updates give the ragged, organic texture the themes ask for.

use log::warn;
use rand_chacha::ChaCha8Rng;

use crate::geom::Point;
use crate::grid::{TileGrid, TileKind};
use crate::random::Dice;

/// Tuning for one cave run.
#[derive(Clone, Debug)]
pub struct CaveParams {
    pub width: usize,
    pub height: usize,
    /// Percent chance a cell starts open.
    pub open_percent: u32,
    /// Update rounds; each round touches `width * height` random cells.
    pub passes: u32,
    /// A cell opens iff its 3x3 open count (itself included) exceeds this.
    pub threshold: u32,
}

/// Run the raw automaton.
///
/// Makes no reachability promise: disconnected pockets are a normal
/// outcome. Callers that need every open cell reachable use
/// [`generate_connected`].
pub fn generate(params: &CaveParams, rng: &mut ChaCha8Rng) -> TileGrid {
    let mut grid = TileGrid::new(params.width, params.height, TileKind::Wall);

    for y in 0..params.height as i32 {
        for x in 0..params.width as i32 {
            if rng.chance(params.open_percent) {
                grid.set(x, y, TileKind::Floor);
            }
        }
    }

    let updates = params.width * params.height * params.passes as usize;
    for _ in 0..updates {
        let x = rng.roll(0, params.width as i32 - 1);
        let y = rng.roll(0, params.height as i32 - 1);
        let open = grid.count_neighbourhood(x, y, TileKind::Floor);
        let kind = if open > params.threshold {
            TileKind::Floor
        } else {
            TileKind::Wall
        };
        grid.set(x, y, kind);
    }

    grid
}

/// Run the automaton, then carve every orphaned pocket back to the largest
/// component so the whole cave is one 4-connected area.
pub fn generate_connected(params: &CaveParams, rng: &mut ChaCha8Rng) -> TileGrid {
    let mut grid = generate(params, rng);
    connect(&mut grid, rng);
    grid
}

/// Join all open components into one by carving L-shaped passages from each
/// smaller component to the largest. Opens a small chamber in the centre
/// when the automaton produced no open cells at all.
pub fn connect(grid: &mut TileGrid, rng: &mut ChaCha8Rng) {
    let components = grid.components();

    if components.is_empty() {
        warn!("cave automaton closed every cell; opening a fallback chamber");
        let cx = grid.width() as i32 / 2;
        let cy = grid.height() as i32 / 2;
        for dy in -1..=1 {
            for dx in -1..=1 {
                grid.set_clamped(cx + dx, cy + dy, TileKind::Floor);
            }
        }
        return;
    }

    let main = &components[0];
    for orphan in &components[1..] {
        let from = orphan[rng.roll(0, orphan.len() as i32 - 1) as usize];
        // Nearest cell of the main component
        let to = main
            .iter()
            .min_by_key(|p| p.distance(&from))
            .copied()
            .expect("main component is non-empty");
        carve_passage(grid, from, to);
    }
}

/// Straight-then-straight passage between two open cells.
fn carve_passage(grid: &mut TileGrid, from: Point, to: Point) {
    let mut x = from.x;
    let mut y = from.y;
    while x != to.x {
        x += (to.x - x).signum();
        open_cell(grid, x, y);
    }
    while y != to.y {
        y += (to.y - y).signum();
        open_cell(grid, x, y);
    }
}

fn open_cell(grid: &mut TileGrid, x: i32, y: i32) {
    if grid.in_bounds(x, y) && !grid.get(x, y).is_passable() {
        grid.set(x, y, TileKind::Floor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params() -> CaveParams {
        CaveParams {
            width: 40,
            height: 40,
            open_percent: 20,
            passes: 6,
            threshold: 4,
        }
    }

    #[test]
    fn cave_is_deterministic() {
        let a = generate(&params(), &mut ChaCha8Rng::seed_from_u64(5));
        let b = generate(&params(), &mut ChaCha8Rng::seed_from_u64(5));
        for y in 0..40 {
            for x in 0..40 {
                assert_eq!(a.get(x, y), b.get(x, y));
            }
        }
    }

    #[test]
    fn connected_variant_has_one_component() {
        for seed in [1u64, 8, 42, 1337] {
            let grid = generate_connected(&params(), &mut ChaCha8Rng::seed_from_u64(seed));
            assert!(grid.is_connected(), "seed {seed} left orphaned pockets");
            assert!(grid.count_where(|k| k.is_passable()) > 0);
        }
    }

    #[test]
    fn degenerate_parameters_still_yield_open_space() {
        // Threshold 9 can never be exceeded, so every update closes its cell.
        let p = CaveParams {
            open_percent: 1,
            passes: 10,
            threshold: 9,
            ..params()
        };
        let grid = generate_connected(&p, &mut ChaCha8Rng::seed_from_u64(2));
        assert!(grid.count_where(|k| k.is_passable()) > 0);
        assert!(grid.is_connected());
    }

    #[test]
    fn raw_automaton_keeps_stochastic_texture() {
        // The raw form may be disconnected; just confirm it produces a mix
        // of open and closed cells for sane parameters.
        let grid = generate(&params(), &mut ChaCha8Rng::seed_from_u64(77));
        let open = grid.count_where(|k| k.is_passable());
        assert!(open > 0);
        assert!(open < 40 * 40);
    }
}
