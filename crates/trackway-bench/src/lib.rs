//! Benchmark profiles for the Trackway train simulation.
//!
//! - [`loop_track`]: a closed rectangular loop with four curves
//! - [`reference_track`]: several stacked loops, one per train
//! - [`spawn_reference_trains`]: one moving train per loop

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use trackway_core::{
    BlockPos, Command, CommandPayload, Face, GroupId, RailNetwork, RailShape, TrackEvent,
};
use trackway_engine::{TrainEngine, VehicleType};
use trackway_rails::{GridError, RailGrid};

/// Loop width along x, in cells.
pub const LOOP_WIDTH: i32 = 48;

/// Loop depth along z, in cells.
pub const LOOP_DEPTH: i32 = 24;

/// Vertical distance between stacked loops.
const LOOP_SPACING: i32 = 4;

/// Lay a clockwise loop of `width` by `depth` cells with its north-west
/// corner at `origin`.
pub fn loop_track(
    grid: &mut RailGrid,
    origin: BlockPos,
    width: i32,
    depth: i32,
) -> Result<(), GridError> {
    let (w, d) = (width - 1, depth - 1);
    let straight_x = (width - 2) as usize;
    let straight_z = (depth - 2) as usize;

    grid.insert(origin, RailShape::curved(Face::South, Face::East))?;
    grid.lay_straight(origin.add(1, 0, 0), Face::East, straight_x)?;
    grid.insert(origin.add(w, 0, 0), RailShape::curved(Face::West, Face::South))?;
    grid.lay_straight(origin.add(w, 0, 1), Face::South, straight_z)?;
    grid.insert(origin.add(w, 0, d), RailShape::curved(Face::North, Face::West))?;
    grid.lay_straight(origin.add(w - 1, 0, d), Face::West, straight_x)?;
    grid.insert(origin.add(0, 0, d), RailShape::curved(Face::East, Face::North))?;
    grid.lay_straight(origin.add(0, 0, d - 1), Face::North, straight_z)?;
    Ok(())
}

/// `loops` stacked loops, one level apart.
pub fn reference_track(loops: usize) -> Result<RailGrid, GridError> {
    let mut grid = RailGrid::new();
    for i in 0..loops {
        let y = i as i32 * LOOP_SPACING;
        loop_track(&mut grid, BlockPos::new(0, y, 0), LOOP_WIDTH, LOOP_DEPTH)?;
    }
    Ok(grid)
}

/// Spawn a train of `cars` members on every loop of a
/// [`reference_track`] and queue a push for each.
pub fn spawn_reference_trains(
    engine: &mut TrainEngine,
    grid: &RailGrid,
    loops: usize,
    cars: usize,
    force: f64,
) -> Vec<GroupId> {
    let mut vehicles = vec![VehicleType::Storage; cars];
    if let Some(head) = vehicles.first_mut() {
        *head = VehicleType::Powered;
    }
    let mut events: Vec<TrackEvent> = Vec::new();
    let mut groups = Vec::with_capacity(loops);
    for i in 0..loops {
        let start = BlockPos::new(2, i as i32 * LOOP_SPACING, 0);
        let Some(cell) = grid.cell_at(start) else {
            continue;
        };
        if let Ok(id) = engine.spawn_train(grid, cell, Face::East, &vehicles, &mut events) {
            groups.push(id);
        }
    }
    engine.submit(
        groups
            .iter()
            .map(|&group| Command::new(CommandPayload::SetForwardForce { group, force }))
            .collect(),
    );
    groups
}
