//! Rail type resolution: which cell a vehicle is on and which comes next.

use trackway_core::{BlockPos, Face, RailCell, RailNetwork, RailShape, Vec3};

use crate::logic::RailLogic;

/// Broad rail family, deciding how cells chain together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RailType {
    /// Straight, sloped and curved rails.
    Regular,
    /// Vertical columns.
    Vertical,
}

impl RailType {
    /// Family of a rail shape.
    pub fn of(shape: &RailShape) -> Self {
        if shape.is_vertical() {
            RailType::Vertical
        } else {
            RailType::Regular
        }
    }

    /// Headings a vehicle may take on `rail`.
    pub fn possible_directions(rail: &RailCell) -> Option<[Face; 2]> {
        RailLogic::for_shape(&rail.shape).map(|l| l.possible_directions())
    }

    /// Where a vehicle placed on `rail` starts out.
    pub fn spawn_position(rail: &RailCell) -> Option<Vec3> {
        let logic = RailLogic::for_shape(&rail.shape)?;
        let mid = rail.pos.mid();
        Some(match Self::of(&rail.shape) {
            RailType::Vertical => mid,
            RailType::Regular => logic.project(mid, rail.pos),
        })
    }

    /// The rail a vehicle leaving `rail` heading `direction` arrives on.
    pub fn next_cell<N: RailNetwork + ?Sized>(
        network: &N,
        rail: &RailCell,
        direction: Face,
    ) -> Option<RailCell> {
        match Self::of(&rail.shape) {
            RailType::Regular => next_regular(network, rail, direction),
            RailType::Vertical => next_vertical(network, rail, direction),
        }
    }
}

fn exit_face(shape: &RailShape, direction: Face) -> Face {
    if !direction.is_diagonal() {
        return direction;
    }
    let [a, b] = direction.components();
    match shape {
        RailShape::Curved { ends } if ends.contains(&b) && !ends.contains(&a) => b,
        _ => a,
    }
}

fn next_regular<N: RailNetwork + ?Sized>(
    network: &N,
    rail: &RailCell,
    direction: Face,
) -> Option<RailCell> {
    if direction == Face::Up {
        return network.cell_at(rail.pos.offset(Face::Up));
    }
    if direction == Face::Down {
        return network.cell_at(rail.pos.offset(Face::Down));
    }
    let exit = exit_face(&rail.shape, direction);
    let ahead = rail.pos.offset(exit);
    if rail.shape.is_sloped_toward(exit) {
        let up = ahead.offset(Face::Up);
        return network
            .cell_at(up)
            .or_else(|| network.cell_at(ahead).filter(|c| c.shape.is_vertical()));
    }
    network
        .cell_at(ahead)
        .or_else(|| network.cell_at(ahead.offset(Face::Down)))
}

fn next_vertical<N: RailNetwork + ?Sized>(
    network: &N,
    rail: &RailCell,
    direction: Face,
) -> Option<RailCell> {
    let RailShape::Vertical { facing } = rail.shape else {
        return None;
    };
    match direction {
        Face::Up => {
            let above = rail.pos.offset(Face::Up);
            network.cell_at(above).or_else(|| {
                network
                    .cell_at(above.offset(facing))
                    .filter(|c| c.shape.is_sloped_toward(facing))
            })
        }
        Face::Down => network.cell_at(rail.pos.offset(Face::Down)),
        _ => None,
    }
}

/// Pull a position just inside `cell`.
pub fn clamp_into_cell(pos: Vec3, cell: BlockPos) -> Vec3 {
    const INSET: f64 = 1e-3;
    let clamp = |v: f64, lo: i32| {
        let lo = f64::from(lo);
        v.clamp(lo + INSET, lo + 1.0 - INSET)
    };
    Vec3::new(clamp(pos.x, cell.x), clamp(pos.y, cell.y), clamp(pos.z, cell.z))
}

/// The rail occupied by a point at `pos`: the cell itself, or the cell
/// below when the point sits on top of a slope.
pub fn find_rail<N: RailNetwork + ?Sized>(network: &N, pos: BlockPos) -> Option<RailCell> {
    network
        .cell_at(pos)
        .or_else(|| network.cell_at(pos.offset(Face::Down)))
}

/// Like [`find_rail`], but a member coming off a vertical column never
/// drops into the column cell below it.
pub fn find_rail_for_member<N: RailNetwork + ?Sized>(
    network: &N,
    pos: BlockPos,
    last: Option<&RailCell>,
) -> Option<RailCell> {
    if let Some(cell) = network.cell_at(pos) {
        return Some(cell);
    }
    let below = network.cell_at(pos.offset(Face::Down))?;
    let last_vertical = last.is_some_and(|c| c.shape.is_vertical());
    if last_vertical && below.shape.is_vertical() {
        None
    } else {
        Some(below)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RailGrid;

    fn grid(cells: &[(BlockPos, RailShape)]) -> RailGrid {
        let mut g = RailGrid::new();
        for &(pos, shape) in cells {
            g.insert(pos, shape).unwrap();
        }
        g
    }

    #[test]
    fn straight_chains_along_axis() {
        let g = grid(&[
            (BlockPos::new(0, 5, 0), RailShape::straight(Face::East)),
            (BlockPos::new(1, 5, 0), RailShape::straight(Face::East)),
        ]);
        let start = g.cell_at(BlockPos::new(0, 5, 0)).unwrap();
        let next = RailType::next_cell(&g, &start, Face::East).unwrap();
        assert_eq!(next.pos, BlockPos::new(1, 5, 0));
        assert!(RailType::next_cell(&g, &start, Face::West).is_none());
    }

    #[test]
    fn curve_exits_through_its_end() {
        let g = grid(&[
            (BlockPos::new(0, 0, 0), RailShape::curved(Face::North, Face::East)),
            (BlockPos::new(1, 0, 0), RailShape::straight(Face::East)),
            (BlockPos::new(0, 0, -1), RailShape::straight(Face::South)),
        ]);
        let curve = g.cell_at(BlockPos::new(0, 0, 0)).unwrap();
        let east = RailType::next_cell(&g, &curve, Face::SouthEast).unwrap();
        assert_eq!(east.pos, BlockPos::new(1, 0, 0));
        let north = RailType::next_cell(&g, &curve, Face::NorthWest).unwrap();
        assert_eq!(north.pos, BlockPos::new(0, 0, -1));
    }

    #[test]
    fn slope_climbs_and_descends() {
        let g = grid(&[
            (BlockPos::new(0, 0, 0), RailShape::straight(Face::East)),
            (BlockPos::new(1, 0, 0), RailShape::sloped(Face::East)),
            (BlockPos::new(2, 1, 0), RailShape::straight(Face::East)),
        ]);
        let slope = g.cell_at(BlockPos::new(1, 0, 0)).unwrap();
        let top = RailType::next_cell(&g, &slope, Face::East).unwrap();
        assert_eq!(top.pos, BlockPos::new(2, 1, 0));
        let bottom = RailType::next_cell(&g, &slope, Face::West).unwrap();
        assert_eq!(bottom.pos, BlockPos::new(0, 0, 0));

        let upper = g.cell_at(BlockPos::new(2, 1, 0)).unwrap();
        let back = RailType::next_cell(&g, &upper, Face::West).unwrap();
        assert_eq!(back.pos, BlockPos::new(1, 0, 0));
    }

    #[test]
    fn vertical_column_exits_onto_slope() {
        let g = grid(&[
            (BlockPos::new(0, 0, 0), RailShape::vertical(Face::East)),
            (BlockPos::new(0, 1, 0), RailShape::vertical(Face::East)),
            (BlockPos::new(1, 2, 0), RailShape::sloped(Face::East)),
        ]);
        let bottom = g.cell_at(BlockPos::new(0, 0, 0)).unwrap();
        let mid = RailType::next_cell(&g, &bottom, Face::Up).unwrap();
        assert_eq!(mid.pos, BlockPos::new(0, 1, 0));
        let exit = RailType::next_cell(&g, &mid, Face::Up).unwrap();
        assert_eq!(exit.pos, BlockPos::new(1, 2, 0));
        assert!(RailType::next_cell(&g, &bottom, Face::Down).is_none());
        assert!(RailType::next_cell(&g, &bottom, Face::East).is_none());
    }

    #[test]
    fn find_rail_prefers_own_cell() {
        let g = grid(&[
            (BlockPos::new(0, 0, 0), RailShape::sloped(Face::East)),
            (BlockPos::new(0, 1, 0), RailShape::straight(Face::East)),
        ]);
        assert_eq!(find_rail(&g, BlockPos::new(0, 1, 0)).unwrap().pos, BlockPos::new(0, 1, 0));
        assert_eq!(find_rail(&g, BlockPos::new(1, 1, 0)), None);
        assert_eq!(find_rail(&g, BlockPos::new(0, 2, 0)).unwrap().pos, BlockPos::new(0, 1, 0));
    }

    #[test]
    fn member_leaving_column_skips_column_below() {
        let g = grid(&[(BlockPos::new(0, 0, 0), RailShape::vertical(Face::East))]);
        let column = g.cell_at(BlockPos::new(0, 0, 0)).unwrap();
        assert!(find_rail_for_member(&g, BlockPos::new(0, 1, 0), Some(&column)).is_none());
        assert!(find_rail_for_member(&g, BlockPos::new(0, 1, 0), None).is_some());
    }

    #[test]
    fn spawn_position_by_family() {
        let vertical = RailCell::new(BlockPos::new(3, 3, 3), RailShape::vertical(Face::North));
        assert_eq!(RailType::spawn_position(&vertical), Some(Vec3::new(3.5, 3.5, 3.5)));
        let flat = RailCell::new(BlockPos::new(3, 3, 3), RailShape::straight(Face::North));
        assert_eq!(RailType::spawn_position(&flat), Some(Vec3::new(3.5, 3.0625, 3.5)));
        assert_eq!(
            RailType::possible_directions(&flat),
            Some([Face::South, Face::North])
        );
    }
}
