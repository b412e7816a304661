//! Walking along the track without physics.
//!
//! Used to lay out a train on the rails and to teleport one: the walker
//! follows the same projection and heading rules as a moving member but
//! with no gravity and no speed limit.

use trackway_core::{BlockPos, Face, RailCell, RailNetwork, Vec3};

use crate::logic::{Kinematics, RailLogic, RailPhysics};
use crate::resolver::{clamp_into_cell, find_rail_for_member, RailType};

/// Default step length in blocks.
pub const WALK_STEP: f64 = 0.1;

/// A cursor moving along the track.
#[derive(Debug)]
pub struct TrackWalker<'a, N: RailNetwork + ?Sized> {
    network: &'a N,
    kin: Kinematics,
    rail: RailCell,
    logic: RailLogic,
    step: f64,
    moved: f64,
}

impl<'a, N: RailNetwork + ?Sized> TrackWalker<'a, N> {
    /// Start on `rail` heading as close to `direction` as the rail allows.
    ///
    /// `None` if the rail has no logic.
    pub fn new(network: &'a N, rail: RailCell, direction: Face) -> Option<Self> {
        let logic = RailLogic::for_shape(&rail.shape)?;
        let position = RailType::spawn_position(&rail)?;
        let mut kin = Kinematics::new(position, direction);
        let heading = logic.resolve_direction(&kin, rail.pos, direction.vector(), None);
        kin.set_direction(heading);
        Some(Self {
            network,
            kin,
            rail,
            logic,
            step: WALK_STEP,
            moved: 0.0,
        })
    }

    /// Use a different step length.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Current position.
    pub fn position(&self) -> Vec3 {
        self.kin.position
    }

    /// Current heading.
    pub fn direction(&self) -> Face {
        self.kin.direction
    }

    /// Rail currently walked on.
    pub fn rail(&self) -> RailCell {
        self.rail
    }

    /// Total distance covered so far.
    pub fn moved(&self) -> f64 {
        self.moved
    }

    /// Move `distance` blocks along the track.
    ///
    /// Returns `false` if the track ran out first; the walker then stays
    /// at the last position that was still on a rail.
    pub fn advance(&mut self, distance: f64) -> bool {
        let mut remaining = distance;
        while remaining > 1e-9 {
            let step = remaining.min(self.step);
            if !self.step_once(step) {
                return false;
            }
            remaining -= step;
        }
        true
    }

    fn step_once(&mut self, step: f64) -> bool {
        let saved = self.kin;
        self.kin.velocity = self.kin.direction.vector() * step;
        self.logic.pre_move(&mut self.kin, self.rail.pos, &RailPhysics::FRICTIONLESS);
        let movement = self.kin.velocity;
        self.kin.position += movement;

        let cell = BlockPos::containing(self.kin.position);
        if cell == self.rail.pos {
            self.logic.post_move(&mut self.kin, self.rail.pos);
            self.moved += movement.length();
            return true;
        }

        let next = find_rail_for_member(self.network, cell, Some(&self.rail)).or_else(|| {
            RailType::next_cell(self.network, &self.rail, self.kin.direction).map(|next| {
                self.kin.position = clamp_into_cell(self.kin.position, next.pos);
                next
            })
        });
        let Some(next) = next else {
            self.kin = saved;
            return false;
        };
        let Some(logic) = RailLogic::for_shape(&next.shape) else {
            self.kin = saved;
            return false;
        };

        if next.pos != self.rail.pos {
            let previous = self.logic;
            logic.on_enter(&mut self.kin, next.pos, Some(&previous));
            let heading = logic.resolve_direction(&self.kin, next.pos, movement, Some(&previous));
            self.kin.set_direction(heading);
            self.rail = next;
            self.logic = logic;
        }
        self.logic.post_move(&mut self.kin, self.rail.pos);
        self.moved += movement.length();
        true
    }
}

/// Positions spaced `spacing` apart, starting on `start` and walking
/// toward `direction`.
///
/// Returns fewer than `count` entries if the track ends first. Each entry
/// carries the heading at that point.
pub fn walk<N: RailNetwork + ?Sized>(
    network: &N,
    start: RailCell,
    direction: Face,
    count: usize,
    spacing: f64,
) -> Vec<(Vec3, Face)> {
    let mut out = Vec::with_capacity(count);
    let Some(mut walker) = TrackWalker::new(network, start, direction) else {
        return out;
    };
    if count == 0 {
        return out;
    }
    out.push((walker.position(), walker.direction()));
    while out.len() < count && walker.advance(spacing) {
        out.push((walker.position(), walker.direction()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RailGrid;
    use trackway_core::RailShape;

    #[test]
    fn walks_a_straight_line() {
        let mut g = RailGrid::new();
        g.lay_straight(BlockPos::new(0, 0, 0), Face::East, 6).unwrap();
        let start = g.cell_at(BlockPos::new(0, 0, 0)).unwrap();
        let points = walk(&g, start, Face::East, 3, 1.5);
        assert_eq!(points.len(), 3);
        for (i, (pos, dir)) in points.iter().enumerate() {
            assert_eq!(*dir, Face::East);
            assert!((pos.x - (0.5 + 1.5 * i as f64)).abs() < 1e-6, "{pos}");
            assert!((pos.z - 0.5).abs() < 1e-9);
            assert!((pos.y - 0.0625).abs() < 1e-9);
        }
    }

    #[test]
    fn stops_at_track_end() {
        let mut g = RailGrid::new();
        g.lay_straight(BlockPos::new(0, 0, 0), Face::South, 2).unwrap();
        let start = g.cell_at(BlockPos::new(0, 0, 0)).unwrap();
        let mut walker = TrackWalker::new(&g, start, Face::South).unwrap();
        assert!(!walker.advance(5.0));
        assert_eq!(walker.rail().pos, BlockPos::new(0, 0, 1));
        assert!(walker.moved() < 2.0);
        assert!(walker.position().z < 2.0);
    }

    #[test]
    fn follows_a_curve() {
        let mut g = RailGrid::new();
        g.lay_straight(BlockPos::new(-2, 0, 0), Face::East, 2).unwrap();
        g.insert(BlockPos::new(0, 0, 0), RailShape::curved(Face::West, Face::South))
            .unwrap();
        g.lay_straight(BlockPos::new(0, 0, 1), Face::South, 3).unwrap();
        let start = g.cell_at(BlockPos::new(-2, 0, 0)).unwrap();
        let mut walker = TrackWalker::new(&g, start, Face::East).unwrap();
        assert!(walker.advance(4.0));
        assert_eq!(walker.direction(), Face::South);
        assert!((walker.position().x - 0.5).abs() < 1e-6);
        assert!(walker.position().z > 1.0);
    }

    #[test]
    fn climbs_a_slope() {
        let mut g = RailGrid::new();
        g.insert(BlockPos::new(0, 0, 0), RailShape::straight(Face::East)).unwrap();
        g.insert(BlockPos::new(1, 0, 0), RailShape::sloped(Face::East)).unwrap();
        g.lay_straight(BlockPos::new(2, 1, 0), Face::East, 2).unwrap();
        let start = g.cell_at(BlockPos::new(0, 0, 0)).unwrap();
        let mut walker = TrackWalker::new(&g, start, Face::East).unwrap();
        assert!(walker.advance(2.7));
        assert_eq!(walker.rail().pos, BlockPos::new(3, 1, 0));
        assert!((walker.position().y - 1.0625).abs() < 1e-6);
    }
}
