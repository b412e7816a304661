//! Rail cell shapes as supplied by the rail network.

use crate::geom::{BlockPos, Face};

/// Geometry tag of a rail cell.
///
/// Shapes are looked up, never written. Constructors normalize the
/// redundant spellings (a North straight is the same rail as a South one).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RailShape {
    /// Flat straight rail; `direction` is `South` (z axis) or `East` (x axis).
    Straight {
        /// Axis of the rail.
        direction: Face,
    },
    /// Straight rail rising one cell toward `ascending`.
    Sloped {
        /// Cardinal face the slope rises toward.
        ascending: Face,
    },
    /// Quarter curve joining two perpendicular cardinal ends.
    Curved {
        /// The two connected edges.
        ends: [Face; 2],
    },
    /// Vertical rail column.
    Vertical {
        /// Face a sloped rail continues toward above the column.
        facing: Face,
    },
}

impl RailShape {
    /// Straight rail along the axis of `direction`.
    pub fn straight(direction: Face) -> Self {
        let direction = match direction {
            Face::North | Face::South => Face::South,
            Face::East | Face::West => Face::East,
            other => other,
        };
        RailShape::Straight { direction }
    }

    /// Slope rising toward `ascending`.
    pub fn sloped(ascending: Face) -> Self {
        RailShape::Sloped { ascending }
    }

    /// Curve connecting the `a` and `b` edges.
    pub fn curved(a: Face, b: Face) -> Self {
        RailShape::Curved { ends: [a, b] }
    }

    /// Vertical column with a slope continuing toward `facing`.
    pub fn vertical(facing: Face) -> Self {
        RailShape::Vertical { facing }
    }

    /// Whether this is a vertical column.
    pub fn is_vertical(&self) -> bool {
        matches!(self, RailShape::Vertical { .. })
    }

    /// Whether this is a slope.
    pub fn is_sloped(&self) -> bool {
        matches!(self, RailShape::Sloped { .. })
    }

    /// Whether this is a slope rising toward `face`.
    pub fn is_sloped_toward(&self, face: Face) -> bool {
        matches!(self, RailShape::Sloped { ascending } if *ascending == face)
    }
}

/// A rail at a grid position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RailCell {
    /// Grid position of the rail block.
    pub pos: BlockPos,
    /// Rail geometry.
    pub shape: RailShape,
}

impl RailCell {
    /// Construct a rail cell.
    pub fn new(pos: BlockPos, shape: RailShape) -> Self {
        Self { pos, shape }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_normalizes_north_and_west() {
        assert_eq!(
            RailShape::straight(Face::North),
            RailShape::Straight {
                direction: Face::South
            }
        );
        assert_eq!(
            RailShape::straight(Face::West),
            RailShape::Straight {
                direction: Face::East
            }
        );
    }

    #[test]
    fn slope_direction_query() {
        let shape = RailShape::sloped(Face::East);
        assert!(shape.is_sloped_toward(Face::East));
        assert!(!shape.is_sloped_toward(Face::West));
        assert!(!shape.is_vertical());
    }
}
