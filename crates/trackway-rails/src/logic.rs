//! Rail logic: projecting positions onto a rail and resolving headings.
//!
//! Every rail cell maps to one [`RailLogic`] value. Horizontal and sloped
//! logic borrow from a table of eight precomputed [`HorizontalLogic`]
//! entries, one per horizontal orientation; cardinal entries describe
//! straight rails and diagonal entries describe curves.

use std::sync::LazyLock;

use trackway_core::geom::MOVEMENT_EPSILON;
use trackway_core::{angle_difference, BlockPos, Face, RailShape, Vec3};

/// Height of the rail centreline above the cell floor.
pub const RAIL_HEIGHT: f64 = 0.0625;

/// Height a member is placed at when it drops from a slope into a
/// vertical column.
pub const VERTICAL_ENTRY_HEIGHT: f64 = 0.95;

// ── Kinematics ─────────────────────────────────────────────────────

/// The part of a vehicle's state rail logic reads and writes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematics {
    /// Continuous position.
    pub position: Vec3,
    /// Velocity in blocks per tick.
    pub velocity: Vec3,
    /// Face the vehicle is travelling toward.
    pub direction: Face,
    /// Heading before the last change.
    pub direction_from: Face,
}

impl Kinematics {
    /// A vehicle at rest at `position`, heading `direction`.
    pub fn new(position: Vec3, direction: Face) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            direction,
            direction_from: direction,
        }
    }

    /// Change heading, remembering the previous one.
    pub fn set_direction(&mut self, direction: Face) {
        if direction != self.direction {
            self.direction_from = self.direction;
            self.direction = direction;
        }
    }
}

/// Tunables rail logic needs from the physics configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RailPhysics {
    /// Speed lost per step while climbing (gained while descending).
    pub slope_gravity: f64,
}

impl RailPhysics {
    /// No gravity; used to walk the track geometry.
    pub const FRICTIONLESS: RailPhysics = RailPhysics { slope_gravity: 0.0 };
}

impl Default for RailPhysics {
    fn default() -> Self {
        Self {
            slope_gravity: 0.0078125,
        }
    }
}

// ── HorizontalLogic ────────────────────────────────────────────────

/// Precomputed constants for one horizontal orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HorizontalLogic {
    direction: Face,
    curved: bool,
    along_x: bool,
    along_z: bool,
    dx: f64,
    dz: f64,
    start_x: f64,
    start_z: f64,
    ends: [Face; 2],
    cart_direction: Face,
    cart_faces: [Face; 2],
}

static HORIZONTAL_LOGIC: LazyLock<[HorizontalLogic; 8]> =
    LazyLock::new(|| std::array::from_fn(|notch| HorizontalLogic::new(Face::from_notch(notch))));

impl HorizontalLogic {
    fn new(direction: Face) -> Self {
        let curved = direction.is_diagonal();
        let ends = direction.opposite().components();
        let cart_direction = if curved {
            Face::combine(ends[1], ends[0].opposite()).unwrap_or(direction)
        } else {
            direction
        };
        let cart_faces = cart_direction.components();

        // Straight rails only come in south and east flavours.
        let rails = match direction {
            Face::North => Face::South,
            Face::West => Face::East,
            other => other,
        };
        let (dx, dz, start) = if curved {
            // The curve tangent runs along the chord between the two ends;
            // the z sign flip makes (dx, dz) parallel to it.
            let dx = 0.5 * f64::from(rails.mod_x());
            let dz = -0.5 * f64::from(rails.mod_z());
            let start = rails.opposite().components()[0];
            (dx, dz, (0.5 * f64::from(start.mod_x()), 0.5 * f64::from(start.mod_z())))
        } else {
            let dx = f64::from(rails.mod_x());
            let dz = f64::from(rails.mod_z());
            (dx, dz, (-0.5 * dx, -0.5 * dz))
        };

        Self {
            direction,
            curved,
            along_x: !curved && rails == Face::East,
            along_z: !curved && rails == Face::South,
            dx,
            dz,
            start_x: start.0,
            start_z: start.1,
            ends,
            cart_direction,
            cart_faces,
        }
    }

    fn table() -> &'static [HorizontalLogic; 8] {
        &HORIZONTAL_LOGIC
    }

    fn get(face: Face) -> Option<&'static HorizontalLogic> {
        face.notch().map(|n| &Self::table()[n])
    }

    /// Orientation this entry was built for.
    pub fn direction(&self) -> Face {
        self.direction
    }

    /// Whether this entry is a curve.
    pub fn is_curved(&self) -> bool {
        self.curved
    }

    /// The two connected edges of a curve.
    pub fn ends(&self) -> [Face; 2] {
        self.ends
    }

    /// Heading along the rail used as the reference for curves.
    pub fn cart_direction(&self) -> Face {
        self.cart_direction
    }

    fn tangent(&self) -> Vec3 {
        Vec3::new(self.dx, 0.0, self.dz)
    }

    fn project_horizontal(&self, pos: Vec3, rail: BlockPos) -> (f64, f64) {
        let mid = rail.mid();
        let mut x = mid.x + self.start_x;
        let mut z = mid.z + self.start_z;
        if self.along_z {
            z += self.dz * (pos.z - f64::from(rail.z));
        } else if self.along_x {
            x += self.dx * (pos.x - f64::from(rail.x));
        } else {
            let factor = 2.0 * (self.dx * (pos.x - x) + self.dz * (pos.z - z));
            x += factor * self.dx;
            z += factor * self.dz;
        }
        (x, z)
    }

    /// Classify movement through a curve.
    fn classify(&self, offset: Vec3, movement: Face) -> CurveMotion {
        let quadrant = Face::dominant_cardinal(offset.x, offset.z);
        let diff = movement.yaw_difference(quadrant);
        if quadrant == self.ends[0] || quadrant == self.ends[1] {
            if diff <= 45.0 {
                CurveMotion::Leaving(quadrant)
            } else if diff >= 135.0 {
                CurveMotion::Entering(quadrant)
            } else {
                let other = if quadrant == self.ends[0] {
                    self.ends[1]
                } else {
                    self.ends[0]
                };
                if movement == other {
                    CurveMotion::Leaving(other)
                } else {
                    CurveMotion::Leaving(quadrant)
                }
            }
        } else if diff >= 135.0 || diff <= 45.0 {
            // Heading for a rail end from the open side of the curve.
            CurveMotion::Entering(quadrant)
        } else {
            CurveMotion::Entering(movement)
        }
    }

    fn curve_heading(&self, motion: CurveMotion) -> Face {
        let (leave, target) = match motion {
            CurveMotion::Leaving(face) => (true, face),
            CurveMotion::Entering(face) => (false, face),
        };
        if leave != self.cart_faces.contains(&target) {
            self.cart_direction.opposite()
        } else {
            self.cart_direction
        }
    }
}

/// How a vehicle moves relative to a curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveMotion {
    /// Coming in from the given side.
    Entering(Face),
    /// Heading out through the given end.
    Leaving(Face),
}

// ── RailLogic ──────────────────────────────────────────────────────

/// Projection and heading rules for one rail cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RailLogic {
    /// Flat straight rail or curve.
    Horizontal(&'static HorizontalLogic),
    /// Straight rail rising toward its direction.
    Sloped(&'static HorizontalLogic),
    /// Vertical column; `facing` is where a slope continues above it.
    Vertical {
        /// Face of the slope continuing the column.
        facing: Face,
    },
}

impl RailLogic {
    /// Logic for a rail shape, or `None` when no logic matches it.
    pub fn for_shape(shape: &RailShape) -> Option<RailLogic> {
        match *shape {
            RailShape::Straight { direction } if direction.is_cardinal() => {
                HorizontalLogic::get(direction).map(RailLogic::Horizontal)
            }
            RailShape::Sloped { ascending } if ascending.is_cardinal() => {
                HorizontalLogic::get(ascending).map(RailLogic::Sloped)
            }
            RailShape::Curved { ends: [a, b] } if a.is_cardinal() && b.is_cardinal() => {
                let diagonal = Face::combine(a, b).filter(|f| f.is_diagonal())?;
                HorizontalLogic::get(diagonal.opposite()).map(RailLogic::Horizontal)
            }
            RailShape::Vertical { facing } if facing.is_cardinal() => {
                Some(RailLogic::Vertical { facing })
            }
            _ => None,
        }
    }

    /// Reference direction: rail axis, ascending face, or `Up`.
    pub fn direction(&self) -> Face {
        match self {
            RailLogic::Horizontal(h) | RailLogic::Sloped(h) => h.direction,
            RailLogic::Vertical { .. } => Face::Up,
        }
    }

    /// Whether this is a slope.
    pub fn is_sloped(&self) -> bool {
        matches!(self, RailLogic::Sloped(_))
    }

    /// Whether this is a vertical column.
    pub fn is_vertical(&self) -> bool {
        matches!(self, RailLogic::Vertical { .. })
    }

    /// Whether this is a curve.
    pub fn is_curved(&self) -> bool {
        matches!(self, RailLogic::Horizontal(h) if h.curved)
    }

    /// The two headings a vehicle can have on this rail.
    pub fn possible_directions(&self) -> [Face; 2] {
        match self {
            RailLogic::Horizontal(h) => [h.cart_direction, h.cart_direction.opposite()],
            RailLogic::Sloped(h) => [h.direction, h.direction.opposite()],
            RailLogic::Vertical { .. } => [Face::Up, Face::Down],
        }
    }

    /// Pitch of a vehicle on this rail heading `direction`; negative looks up.
    pub fn pitch(&self, direction: Face) -> f64 {
        match self {
            RailLogic::Horizontal(_) => 0.0,
            RailLogic::Sloped(h) if direction == h.direction => -45.0,
            RailLogic::Sloped(_) => 45.0,
            RailLogic::Vertical { .. } => -90.0,
        }
    }

    /// Snap a position onto the rail centreline of the cell at `rail`.
    ///
    /// Idempotent: projecting a projected position returns it unchanged.
    pub fn project(&self, pos: Vec3, rail: BlockPos) -> Vec3 {
        let floor = f64::from(rail.y) + RAIL_HEIGHT;
        match self {
            RailLogic::Horizontal(h) => {
                let (x, z) = h.project_horizontal(pos, rail);
                Vec3::new(x, floor, z)
            }
            RailLogic::Sloped(h) => {
                let (x, z) = h.project_horizontal(pos, rail);
                let up = h.direction.vector();
                let progress = (Vec3::new(x, 0.0, z) - rail.mid()).dot(up) + 0.5;
                Vec3::new(x, floor + progress.clamp(0.0, 1.0), z)
            }
            RailLogic::Vertical { .. } => {
                let mid = rail.mid();
                Vec3::new(mid.x, pos.y, mid.z)
            }
        }
    }

    /// Classify how a vehicle moves through a curve.
    ///
    /// `None` for anything that is not a curve.
    pub fn curve_motion(&self, kin: &Kinematics, rail: BlockPos, movement: Vec3) -> Option<CurveMotion> {
        match self {
            RailLogic::Horizontal(h) if h.curved => {
                let movement = horizontal_or_heading(movement, kin.direction, h.cart_direction);
                let offset = kin.position - rail.mid();
                Some(h.classify(offset, Face::from_yaw(movement.yaw())))
            }
            _ => None,
        }
    }

    /// Resolve the heading of a vehicle moving by `movement`.
    ///
    /// `previous` is the logic of the rail the vehicle was on before this
    /// one, if it changed cells.
    pub fn resolve_direction(
        &self,
        kin: &Kinematics,
        rail: BlockPos,
        movement: Vec3,
        previous: Option<&RailLogic>,
    ) -> Face {
        match self {
            RailLogic::Horizontal(h) if h.curved => {
                match self.curve_motion(kin, rail, movement) {
                    Some(motion) => h.curve_heading(motion),
                    None => h.cart_direction,
                }
            }
            RailLogic::Horizontal(h) => {
                let movement = horizontal_or_heading(movement, kin.direction, h.direction);
                let yaw = movement.yaw();
                let side1 = angle_difference(h.direction.yaw(), yaw);
                let side2 = angle_difference(h.direction.opposite().yaw(), yaw);
                if side1 < side2 {
                    h.direction
                } else {
                    h.direction.opposite()
                }
            }
            RailLogic::Sloped(h) => {
                let up = h.direction;
                let down = up.opposite();
                if movement.has_horizontal_movement() {
                    let yaw = movement.yaw();
                    let mut diff_up = angle_difference(yaw, up.yaw());
                    let mut diff_down = angle_difference(yaw, down.yaw());
                    if diff_up == diff_down {
                        diff_up = kin.direction_from.yaw_difference(up);
                        diff_down = kin.direction_from.yaw_difference(down);
                    }
                    if diff_up > diff_down {
                        down
                    } else {
                        up
                    }
                } else if movement.y.abs() > MOVEMENT_EPSILON {
                    if movement.y > 0.0 {
                        up
                    } else {
                        down
                    }
                } else {
                    down
                }
            }
            RailLogic::Vertical { .. } => {
                if movement.y.abs() > MOVEMENT_EPSILON {
                    if movement.y > 0.0 {
                        Face::Up
                    } else {
                        Face::Down
                    }
                } else {
                    match previous {
                        Some(RailLogic::Sloped(h)) if kin.direction == h.direction => Face::Up,
                        Some(RailLogic::Vertical { .. }) if kin.direction == Face::Up => Face::Up,
                        _ => Face::Down,
                    }
                }
            }
        }
    }

    /// Adjust a vehicle that just moved onto this rail from `previous`.
    pub fn on_enter(&self, kin: &mut Kinematics, rail: BlockPos, previous: Option<&RailLogic>) {
        if let (RailLogic::Vertical { .. }, Some(RailLogic::Sloped(h))) = (self, previous) {
            if h.direction == kin.direction.opposite() {
                kin.position.y = f64::from(rail.y) + VERTICAL_ENTRY_HEIGHT;
            }
        }
    }

    /// Align velocity with the rail and snap the position onto it.
    pub fn pre_move(&self, kin: &mut Kinematics, rail: BlockPos, physics: &RailPhysics) {
        let speed = kin.velocity.length();
        match self {
            RailLogic::Horizontal(h) => {
                let tangent = h.tangent();
                let invert = if h.curved {
                    kin.direction.vector().dot(tangent) < 0.0
                } else {
                    kin.velocity.dot(tangent) < 0.0
                };
                let factor = speed / tangent.length();
                kin.velocity = tangent * if invert { -factor } else { factor };
            }
            RailLogic::Sloped(h) => {
                let up = h.direction.vector();
                let along = kin.velocity.dot(up);
                let climbing = if along.abs() > f64::EPSILON {
                    along > 0.0
                } else if kin.velocity.y.abs() > f64::EPSILON {
                    kin.velocity.y > 0.0
                } else {
                    kin.direction == h.direction
                };
                let signed = if climbing { speed } else { -speed };
                kin.velocity = up * (signed - physics.slope_gravity);
            }
            RailLogic::Vertical { .. } => {
                let signed = if kin.direction == Face::Up { speed } else { -speed };
                kin.velocity = Vec3::new(0.0, signed - physics.slope_gravity, 0.0);
            }
        }
        kin.position = self.project(kin.position, rail);
    }

    /// Correct drift after the vehicle moved.
    pub fn post_move(&self, kin: &mut Kinematics, rail: BlockPos) {
        let fixed = self.project(kin.position, rail);
        match self {
            RailLogic::Horizontal(h) if !h.curved => kin.position.y = fixed.y,
            RailLogic::Sloped(_) => kin.position.y = fixed.y,
            _ => kin.position = fixed,
        }
    }
}

fn horizontal_or_heading(movement: Vec3, heading: Face, fallback: Face) -> Vec3 {
    if movement.has_horizontal_movement() {
        movement
    } else if heading.is_horizontal() {
        heading.vector()
    } else {
        fallback.vector()
    }
}
