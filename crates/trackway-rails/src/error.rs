//! Error types for rail grid construction.

use std::error::Error;
use std::fmt;

use trackway_core::{BlockPos, RailShape};

/// Errors arising from building a rail grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridError {
    /// No rail logic exists for the shape (a curve with parallel ends,
    /// a diagonal slope, and so on).
    UnsupportedShape {
        /// Cell the rail was placed at.
        pos: BlockPos,
        /// The rejected shape.
        shape: RailShape,
    },
    /// The cell already holds a rail.
    Overlap {
        /// The occupied cell.
        pos: BlockPos,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedShape { pos, shape } => {
                write!(f, "unsupported rail shape at {pos}: {shape:?}")
            }
            Self::Overlap { pos } => write!(f, "cell {pos} already holds a rail"),
        }
    }
}

impl Error for GridError {}
