//! Grid positions, continuous vectors, faces and yaw arithmetic.
//!
//! Axis conventions: `+x` is east, `+z` is south, `+y` is up. Yaw is
//! measured in degrees with South = 0, West = 90, North = 180 and
//! East = 270.

use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Below this magnitude a movement component counts as zero.
pub const MOVEMENT_EPSILON: f64 = 1e-4;

// ── BlockPos ───────────────────────────────────────────────────────

/// Integer position of a grid cell.
///
/// A cell occupies `[x, x+1) × [y, y+1) × [z, z+1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos {
    /// East-west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North-south coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Construct a position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The cell containing a continuous point.
    pub fn containing(v: Vec3) -> Self {
        Self::new(v.x.floor() as i32, v.y.floor() as i32, v.z.floor() as i32)
    }

    /// The neighbouring cell across `face`.
    ///
    /// Diagonal faces step on both horizontal axes.
    pub fn offset(self, face: Face) -> Self {
        self.add(face.mod_x(), face.mod_y(), face.mod_z())
    }

    /// Translate by a raw delta.
    pub fn add(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Centre of the cell.
    pub fn mid(self) -> Vec3 {
        Vec3::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 0.5,
            f64::from(self.z) + 0.5,
        )
    }

    /// The 16×16 column this cell belongs to.
    pub fn chunk(self) -> ChunkPos {
        ChunkPos {
            x: self.x >> 4,
            z: self.z >> 4,
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.x, self.y, self.z)
    }
}

/// Horizontal column of 16×16 cells, the unit of world loading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    /// Column x (`block.x >> 4`).
    pub x: i32,
    /// Column z (`block.z >> 4`).
    pub z: i32,
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.x, self.z)
    }
}

// ── Vec3 ───────────────────────────────────────────────────────────

/// Continuous 3D vector used for positions and velocities.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    /// East-west component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
    /// North-south component.
    pub z: f64,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    /// Construct a vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Squared length.
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Length of the `(x, z)` projection.
    pub fn horizontal_length(self) -> f64 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    /// Distance between two points.
    pub fn distance(self, other: Vec3) -> f64 {
        (self - other).length()
    }

    /// Squared distance between two points.
    pub fn distance_squared(self, other: Vec3) -> f64 {
        (self - other).length_squared()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len > 0.0 {
            self / len
        } else {
            Vec3::ZERO
        }
    }

    /// Whether every component is finite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Whether the horizontal part is large enough to carry a heading.
    pub fn has_horizontal_movement(self) -> bool {
        self.x.abs() >= MOVEMENT_EPSILON || self.z.abs() >= MOVEMENT_EPSILON
    }

    /// Yaw of the horizontal part, see [`look_at_yaw`].
    pub fn yaw(self) -> f64 {
        look_at_yaw(self.x, self.z)
    }

    /// Pitch in degrees; negative looks up.
    pub fn pitch(self) -> f64 {
        let horizontal = self.horizontal_length();
        if horizontal == 0.0 && self.y == 0.0 {
            return 0.0;
        }
        -self.y.atan2(horizontal).to_degrees()
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Vec3) {
        *self = *self - rhs;
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl MulAssign<f64> for Vec3 {
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl DivAssign<f64> for Vec3 {
    fn div_assign(&mut self, rhs: f64) {
        *self = *self / rhs;
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

// ── Face ───────────────────────────────────────────────────────────

/// One of the eight horizontal headings plus up and down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Face {
    /// `-z`.
    North,
    /// `+x, -z`.
    NorthEast,
    /// `+x`.
    East,
    /// `+x, +z`.
    SouthEast,
    /// `+z`.
    South,
    /// `-x, +z`.
    SouthWest,
    /// `-x`.
    West,
    /// `-x, -z`.
    NorthWest,
    /// `+y`.
    Up,
    /// `-y`.
    Down,
}

/// Horizontal faces in notch order (North = 0, clockwise).
pub const HORIZONTAL: [Face; 8] = [
    Face::North,
    Face::NorthEast,
    Face::East,
    Face::SouthEast,
    Face::South,
    Face::SouthWest,
    Face::West,
    Face::NorthWest,
];

/// The four cardinal faces.
pub const CARDINAL: [Face; 4] = [Face::North, Face::East, Face::South, Face::West];

/// Horizontal faces ordered by increasing yaw (South = 0°).
const BY_YAW: [Face; 8] = [
    Face::South,
    Face::SouthWest,
    Face::West,
    Face::NorthWest,
    Face::North,
    Face::NorthEast,
    Face::East,
    Face::SouthEast,
];

impl Face {
    /// X step of this face.
    pub fn mod_x(self) -> i32 {
        match self {
            Face::NorthEast | Face::East | Face::SouthEast => 1,
            Face::SouthWest | Face::West | Face::NorthWest => -1,
            _ => 0,
        }
    }

    /// Y step of this face.
    pub fn mod_y(self) -> i32 {
        match self {
            Face::Up => 1,
            Face::Down => -1,
            _ => 0,
        }
    }

    /// Z step of this face.
    pub fn mod_z(self) -> i32 {
        match self {
            Face::SouthEast | Face::South | Face::SouthWest => 1,
            Face::NorthEast | Face::North | Face::NorthWest => -1,
            _ => 0,
        }
    }

    /// The face pointing the other way.
    pub fn opposite(self) -> Face {
        match self {
            Face::North => Face::South,
            Face::NorthEast => Face::SouthWest,
            Face::East => Face::West,
            Face::SouthEast => Face::NorthWest,
            Face::South => Face::North,
            Face::SouthWest => Face::NorthEast,
            Face::West => Face::East,
            Face::NorthWest => Face::SouthEast,
            Face::Up => Face::Down,
            Face::Down => Face::Up,
        }
    }

    /// Whether this is one of the eight horizontal faces.
    pub fn is_horizontal(self) -> bool {
        !self.is_vertical()
    }

    /// Whether this is `Up` or `Down`.
    pub fn is_vertical(self) -> bool {
        matches!(self, Face::Up | Face::Down)
    }

    /// Whether this is North, East, South or West.
    pub fn is_cardinal(self) -> bool {
        matches!(self, Face::North | Face::East | Face::South | Face::West)
    }

    /// Whether this is one of the four diagonal faces.
    pub fn is_diagonal(self) -> bool {
        self.is_horizontal() && !self.is_cardinal()
    }

    /// Notch index, North = 0 clockwise. `None` for vertical faces.
    pub fn notch(self) -> Option<usize> {
        HORIZONTAL.iter().position(|&f| f == self)
    }

    /// Horizontal face for a notch index (taken modulo 8).
    pub fn from_notch(notch: usize) -> Face {
        HORIZONTAL[notch % 8]
    }

    /// Face matching a unit step, if any.
    pub fn from_mods(dx: i32, dy: i32, dz: i32) -> Option<Face> {
        match (dx.signum(), dy.signum(), dz.signum()) {
            (0, 1, 0) => Some(Face::Up),
            (0, -1, 0) => Some(Face::Down),
            (_, 0, _) => HORIZONTAL
                .iter()
                .copied()
                .find(|f| f.mod_x() == dx.signum() && f.mod_z() == dz.signum()),
            _ => None,
        }
    }

    /// Split a diagonal into its north/south and east/west parts.
    ///
    /// Cardinal and vertical faces return themselves twice.
    pub fn components(self) -> [Face; 2] {
        match self {
            Face::NorthEast => [Face::North, Face::East],
            Face::SouthEast => [Face::South, Face::East],
            Face::SouthWest => [Face::South, Face::West],
            Face::NorthWest => [Face::North, Face::West],
            other => [other, other],
        }
    }

    /// Combine two faces by adding their steps.
    pub fn combine(a: Face, b: Face) -> Option<Face> {
        Face::from_mods(
            a.mod_x() + b.mod_x(),
            a.mod_y() + b.mod_y(),
            a.mod_z() + b.mod_z(),
        )
    }

    /// Yaw in degrees. Vertical faces have no yaw and report 0.
    pub fn yaw(self) -> f64 {
        match BY_YAW.iter().position(|&f| f == self) {
            Some(i) => 45.0 * i as f64,
            None => 0.0,
        }
    }

    /// Nearest of the eight horizontal faces for a yaw.
    pub fn from_yaw(yaw: f64) -> Face {
        let index = (yaw.rem_euclid(360.0) / 45.0).round() as usize;
        BY_YAW[index % 8]
    }

    /// Nearest cardinal face for a yaw.
    pub fn cardinal_from_yaw(yaw: f64) -> Face {
        let index = (yaw.rem_euclid(360.0) / 90.0).round() as usize;
        BY_YAW[(index % 4) * 2]
    }

    /// Cardinal face of the dominant axis of a horizontal offset.
    ///
    /// Ties go to the z axis.
    pub fn dominant_cardinal(dx: f64, dz: f64) -> Face {
        if dx.abs() > dz.abs() {
            if dx > 0.0 {
                Face::East
            } else {
                Face::West
            }
        } else if dz >= 0.0 {
            Face::South
        } else {
            Face::North
        }
    }

    /// Face of a movement vector.
    ///
    /// Horizontal movement maps to one of eight faces; otherwise the sign
    /// of vertical movement picks `Up` or `Down`. `None` when the vector
    /// is negligible.
    pub fn from_movement(v: Vec3) -> Option<Face> {
        if v.has_horizontal_movement() {
            Some(Face::from_yaw(v.yaw()))
        } else if v.y.abs() >= MOVEMENT_EPSILON {
            Some(if v.y > 0.0 { Face::Up } else { Face::Down })
        } else {
            None
        }
    }

    /// Unit vector pointing along this face.
    pub fn vector(self) -> Vec3 {
        Vec3::new(
            f64::from(self.mod_x()),
            f64::from(self.mod_y()),
            f64::from(self.mod_z()),
        )
        .normalized()
    }

    /// Yaw difference to another face, in `[0, 180]`.
    pub fn yaw_difference(self, other: Face) -> f64 {
        angle_difference(self.yaw(), other.yaw())
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Face::North => "north",
            Face::NorthEast => "north_east",
            Face::East => "east",
            Face::SouthEast => "south_east",
            Face::South => "south",
            Face::SouthWest => "south_west",
            Face::West => "west",
            Face::NorthWest => "north_west",
            Face::Up => "up",
            Face::Down => "down",
        };
        f.write_str(name)
    }
}

// ── Angles ─────────────────────────────────────────────────────────

/// Yaw in `[0, 360)` of a horizontal direction `(dx, dz)`.
pub fn look_at_yaw(dx: f64, dz: f64) -> f64 {
    (-dx).atan2(dz).to_degrees().rem_euclid(360.0)
}

/// Minimal absolute difference between two angles, in `[0, 180]`.
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaw_convention_matches_faces() {
        assert_eq!(look_at_yaw(0.0, 1.0), 0.0);
        assert!((look_at_yaw(-1.0, 0.0) - 90.0).abs() < 1e-9);
        assert!((look_at_yaw(0.0, -1.0) - 180.0).abs() < 1e-9);
        assert!((look_at_yaw(1.0, 0.0) - 270.0).abs() < 1e-9);
        for face in HORIZONTAL {
            let v = face.vector();
            assert_eq!(Face::from_yaw(look_at_yaw(v.x, v.z)), face);
        }
    }

    #[test]
    fn opposite_is_involution() {
        for face in HORIZONTAL.iter().chain(&[Face::Up, Face::Down]) {
            assert_eq!(face.opposite().opposite(), *face);
            assert_ne!(face.opposite(), *face);
        }
    }

    #[test]
    fn components_recombine_to_diagonal() {
        for face in HORIZONTAL.iter().filter(|f| f.is_diagonal()) {
            let [a, b] = face.components();
            assert!(a.is_cardinal() && b.is_cardinal());
            assert_eq!(Face::combine(a, b), Some(*face));
        }
        assert_eq!(Face::combine(Face::North, Face::South), None);
    }

    #[test]
    fn angle_difference_wraps() {
        assert_eq!(angle_difference(10.0, 350.0), 20.0);
        assert_eq!(angle_difference(0.0, 180.0), 180.0);
        assert_eq!(Face::North.yaw_difference(Face::East), 90.0);
        assert_eq!(Face::NorthEast.yaw_difference(Face::SouthWest), 180.0);
    }

    #[test]
    fn dominant_cardinal_picks_larger_axis() {
        assert_eq!(Face::dominant_cardinal(-0.3, 0.1), Face::West);
        assert_eq!(Face::dominant_cardinal(0.1, -0.3), Face::North);
        assert_eq!(Face::dominant_cardinal(0.2, 0.2), Face::South);
    }

    #[test]
    fn movement_face_falls_back_to_vertical() {
        assert_eq!(Face::from_movement(Vec3::new(1.0, 0.0, 0.0)), Some(Face::East));
        assert_eq!(Face::from_movement(Vec3::new(0.0, -0.5, 0.0)), Some(Face::Down));
        assert_eq!(Face::from_movement(Vec3::ZERO), None);
    }

    #[test]
    fn block_containing_floors_negatives() {
        let pos = BlockPos::containing(Vec3::new(-0.2, 3.99, 5.0));
        assert_eq!(pos, BlockPos::new(-1, 3, 5));
        assert_eq!(BlockPos::new(-1, 0, 17).chunk(), ChunkPos { x: -1, z: 1 });
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn angle_difference_bounded_and_symmetric(a in -720.0f64..720.0, b in -720.0f64..720.0) {
                let d = angle_difference(a, b);
                prop_assert!((0.0..=180.0).contains(&d));
                prop_assert!((d - angle_difference(b, a)).abs() < 1e-9);
            }

            #[test]
            fn from_notch_round_trips(n in 0usize..8) {
                prop_assert_eq!(Face::from_notch(n).notch(), Some(n));
            }
        }
    }
}
