//! In-memory rail network.

use indexmap::IndexMap;
use trackway_core::{BlockPos, Face, RailCell, RailNetwork, RailShape};

use crate::error::GridError;
use crate::logic::RailLogic;

/// A rail network held in a map from cell to shape.
///
/// Iteration follows insertion order, so layouts built by the same
/// sequence of calls walk identically.
#[derive(Clone, Debug, Default)]
pub struct RailGrid {
    cells: IndexMap<BlockPos, RailShape>,
}

impl RailGrid {
    /// An empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a rail in an empty cell.
    pub fn insert(&mut self, pos: BlockPos, shape: RailShape) -> Result<(), GridError> {
        if RailLogic::for_shape(&shape).is_none() {
            return Err(GridError::UnsupportedShape { pos, shape });
        }
        if self.cells.contains_key(&pos) {
            return Err(GridError::Overlap { pos });
        }
        self.cells.insert(pos, shape);
        Ok(())
    }

    /// Place or replace a rail. Returns the previous shape.
    pub fn set(&mut self, pos: BlockPos, shape: RailShape) -> Result<Option<RailShape>, GridError> {
        if RailLogic::for_shape(&shape).is_none() {
            return Err(GridError::UnsupportedShape { pos, shape });
        }
        Ok(self.cells.insert(pos, shape))
    }

    /// Remove the rail at `pos`.
    pub fn remove(&mut self, pos: BlockPos) -> Option<RailShape> {
        self.cells.shift_remove(&pos)
    }

    /// Number of rail cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid holds no rails.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Every rail, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = RailCell> + '_ {
        self.cells.iter().map(|(&pos, &shape)| RailCell::new(pos, shape))
    }

    /// Lay `count` straight rails starting at `start` and running toward
    /// `direction`.
    pub fn lay_straight(
        &mut self,
        start: BlockPos,
        direction: Face,
        count: usize,
    ) -> Result<(), GridError> {
        let mut pos = start;
        for _ in 0..count {
            self.insert(pos, RailShape::straight(direction))?;
            pos = pos.offset(direction);
        }
        Ok(())
    }
}

impl RailNetwork for RailGrid {
    fn cell_at(&self, pos: BlockPos) -> Option<RailCell> {
        self.cells.get(&pos).map(|&shape| RailCell::new(pos, shape))
    }
}
