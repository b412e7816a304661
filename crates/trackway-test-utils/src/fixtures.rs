//! Reusable track layouts.
//!
//! - [`straight_track`]: a flat line running east from the origin.
//! - [`curved_track`]: east, a quarter curve, then south.
//! - [`slope_ramp`]: east, one slope up, east again one level higher.
//! - [`vertical_shaft`]: east into a slope and up a vertical column.

use trackway_core::{BlockPos, Face, RailNetwork, RailShape, Vec3};
use trackway_rails::{walk, RailGrid};

fn insert(grid: &mut RailGrid, pos: BlockPos, shape: RailShape) {
    grid.insert(pos, shape)
        .unwrap_or_else(|e| panic!("fixture overlaps at {pos}: {e}"));
}

fn lay(grid: &mut RailGrid, start: BlockPos, direction: Face, count: usize) {
    grid.lay_straight(start, direction, count)
        .unwrap_or_else(|e| panic!("fixture overlaps near {start}: {e}"));
}

/// `length` straight rails from `(0, 0, 0)` toward east.
pub fn straight_track(length: usize) -> RailGrid {
    let mut grid = RailGrid::new();
    lay(&mut grid, BlockPos::new(0, 0, 0), Face::East, length);
    grid
}

/// Rails `x = 0..8` at `z = 0`, a curve at `(8, 0, 0)` joining west and
/// south, then rails `z = 1..9` at `x = 8`.
pub fn curved_track() -> RailGrid {
    let mut grid = RailGrid::new();
    lay(&mut grid, BlockPos::new(0, 0, 0), Face::East, 8);
    insert(
        &mut grid,
        BlockPos::new(8, 0, 0),
        RailShape::curved(Face::West, Face::South),
    );
    lay(&mut grid, BlockPos::new(8, 0, 1), Face::South, 8);
    grid
}

/// Rails `x = 0..6` at `y = 0`, a slope at `(6, 0, 0)` rising east, then
/// rails `x = 7..15` at `y = 1`.
pub fn slope_ramp() -> RailGrid {
    let mut grid = RailGrid::new();
    lay(&mut grid, BlockPos::new(0, 0, 0), Face::East, 6);
    insert(&mut grid, BlockPos::new(6, 0, 0), RailShape::sloped(Face::East));
    lay(&mut grid, BlockPos::new(7, 1, 0), Face::East, 8);
    grid
}

/// Rails `x = 0..4`, a slope at `(4, 0, 0)` rising east, and a vertical
/// column of `height` cells at `x = 5`.
pub fn vertical_shaft(height: i32) -> RailGrid {
    let mut grid = RailGrid::new();
    lay(&mut grid, BlockPos::new(0, 0, 0), Face::East, 4);
    insert(&mut grid, BlockPos::new(4, 0, 0), RailShape::sloped(Face::East));
    for y in 0..height {
        insert(&mut grid, BlockPos::new(5, y, 0), RailShape::vertical(Face::West));
    }
    grid
}

/// Positions for a train of `count` members, head first, spaced `spacing`
/// apart with the tail on the rail at `start` and the head toward
/// `direction`.
///
/// # Panics
///
/// Panics if `start` holds no rail or the track is too short.
pub fn place_train(
    grid: &RailGrid,
    start: BlockPos,
    direction: Face,
    count: usize,
    spacing: f64,
) -> Vec<(Vec3, Face)> {
    let rail = grid
        .cell_at(start)
        .unwrap_or_else(|| panic!("no rail at {start}"));
    let mut positions = walk(grid, rail, direction, count, spacing);
    assert_eq!(positions.len(), count, "track too short for {count} members");
    positions.reverse();
    positions
}
