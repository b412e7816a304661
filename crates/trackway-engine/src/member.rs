//! One vehicle of a train: position, velocity, heading and rail state.
//!
//! A [`Member`] owns its continuous state and the rail cell it was last
//! resolved onto. The group controller drives it through the physics
//! hooks in a fixed order each sub-step:
//! [`physics_start`](Member::physics_start),
//! [`pre_move`](Member::pre_move), [`post_move`](Member::post_move).

use indexmap::IndexMap;
use tracing::trace;
use trackway_core::geom::MOVEMENT_EPSILON;
use trackway_core::{BlockPos, Face, GroupId, MemberId, RailCell, RailNetwork, Vec3};
use trackway_rails::{
    clamp_into_cell, find_rail_for_member, Kinematics, RailLogic, RailPhysics, RailType,
};

use crate::config::PhysicsConfig;

/// Below this speed a member counts as standing still.
pub const MOVING_THRESHOLD: f64 = 0.001;

// ── VehicleType ────────────────────────────────────────────────────

/// Kind of vehicle a member represents.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VehicleType {
    /// Carries a passenger.
    Rideable,
    /// Burns fuel; satisfies "requires powered vehicle".
    Powered,
    /// Carries items.
    Storage,
    /// Collects items from the track.
    Hopper,
    /// Carries an explosive.
    Explosive,
    /// Spawns creatures.
    Spawner,
    /// Runs a command block.
    Command,
    /// Any vehicle without rail physics.
    Other(String),
}

impl VehicleType {
    /// Whether members of this type have rail physics.
    pub fn is_supported(&self) -> bool {
        !matches!(self, VehicleType::Other(_))
    }
}

/// Build a member for a vehicle, or `None` for vehicle types without rail
/// physics.
pub fn create_controller(
    id: MemberId,
    vehicle: VehicleType,
    position: Vec3,
    yaw: f64,
) -> Option<Member> {
    if !vehicle.is_supported() {
        return None;
    }
    Some(Member::new(id, vehicle, position, Face::from_yaw(yaw)))
}

// ── Member ─────────────────────────────────────────────────────────

/// One vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    id: MemberId,
    vehicle: VehicleType,
    group: Option<GroupId>,
    kin: Kinematics,
    yaw: f64,
    pitch: f64,
    rail: Option<RailCell>,
    last_rail: Option<RailCell>,
    logic: Option<RailLogic>,
    last_logic: Option<RailLogic>,
    block: BlockPos,
    last_block: BlockPos,
    block_changed: bool,
    max_speed: f64,
    moved_distance: f64,
    ignore_collisions: IndexMap<MemberId, u32>,
    fuel: u32,
    /// Hold the world around this member loaded.
    pub keep_chunks_loaded: bool,
    /// A player rides this member.
    pub has_player_passenger: bool,
    /// Removed from the world; the group drops it at the next step.
    pub dead: bool,
    /// Handed back to the world loader.
    pub unloaded: bool,
}

impl Member {
    /// A member at rest at `position`, heading `direction`.
    pub fn new(id: MemberId, vehicle: VehicleType, position: Vec3, direction: Face) -> Self {
        let block = BlockPos::containing(position);
        Self {
            id,
            vehicle,
            group: None,
            kin: Kinematics::new(position, direction),
            yaw: direction.yaw(),
            pitch: 0.0,
            rail: None,
            last_rail: None,
            logic: None,
            last_logic: None,
            block,
            last_block: block,
            block_changed: false,
            max_speed: 0.4,
            moved_distance: 0.0,
            ignore_collisions: IndexMap::new(),
            fuel: 0,
            keep_chunks_loaded: false,
            has_player_passenger: false,
            dead: false,
            unloaded: false,
        }
    }

    // ── accessors ──────────────────────────────────────────────

    /// Member id.
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Vehicle type.
    pub fn vehicle(&self) -> &VehicleType {
        &self.vehicle
    }

    /// Group the member belongs to; `None` while being relocated.
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub(crate) fn set_group(&mut self, group: Option<GroupId>) {
        self.group = group;
    }

    /// Whether this is a powered vehicle.
    pub fn is_powered(&self) -> bool {
        self.vehicle == VehicleType::Powered
    }

    /// Continuous position.
    pub fn position(&self) -> Vec3 {
        self.kin.position
    }

    /// Velocity in blocks per tick.
    pub fn velocity(&self) -> Vec3 {
        self.kin.velocity
    }

    /// Replace the velocity.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.kin.velocity = velocity;
    }

    /// Scale the velocity.
    pub fn scale_velocity(&mut self, factor: f64) {
        self.kin.velocity *= factor;
    }

    /// Heading.
    pub fn direction(&self) -> Face {
        self.kin.direction
    }

    /// Heading before the last change.
    pub fn direction_from(&self) -> Face {
        self.kin.direction_from
    }

    /// Unit vector along the heading.
    pub fn heading_vector(&self) -> Vec3 {
        self.kin.direction.vector()
    }

    /// Yaw of the last horizontal heading.
    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// Pitch; negative looks up.
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Rail cell the member is on.
    pub fn rail(&self) -> Option<&RailCell> {
        self.rail.as_ref()
    }

    /// Logic of the rail the member is on.
    pub fn logic(&self) -> Option<&RailLogic> {
        self.logic.as_ref()
    }

    /// Whether the member is off the rails.
    pub fn is_derailed(&self) -> bool {
        self.rail.is_none()
    }

    /// Grid cell the member occupies: its rail cell, or the cell it is
    /// in when derailed.
    pub fn block(&self) -> BlockPos {
        self.block
    }

    /// Cell occupied before the last change.
    pub fn last_block(&self) -> BlockPos {
        self.last_block
    }

    /// Whether a cell change found by [`physics_start`](Member::physics_start)
    /// is still waiting for [`physics_block_change`](Member::physics_block_change).
    pub fn block_changed(&self) -> bool {
        self.block_changed
    }

    /// Speed cap for the current step.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Set the speed cap.
    pub fn set_max_speed(&mut self, max_speed: f64) {
        self.max_speed = max_speed;
    }

    /// Distance covered in the last move.
    pub fn moved_distance(&self) -> f64 {
        self.moved_distance
    }

    /// Remaining fuel, in ticks.
    pub fn fuel(&self) -> u32 {
        self.fuel
    }

    /// Whether every component of position and velocity is finite.
    pub fn is_finite(&self) -> bool {
        self.kin.position.is_finite() && self.kin.velocity.is_finite()
    }

    // ── forces ─────────────────────────────────────────────────

    /// Speed regardless of direction.
    pub fn force(&self) -> f64 {
        self.kin.velocity.length()
    }

    /// Speed along the heading; negative when rolling backwards.
    pub fn forward_force(&self) -> f64 {
        self.kin.velocity.dot(self.heading_vector())
    }

    /// Set the speed along the heading.
    pub fn set_forward_force(&mut self, force: f64) {
        self.kin.velocity = self.heading_vector() * force;
    }

    /// Whether the member is moving.
    pub fn is_moving(&self) -> bool {
        self.force() > MOVING_THRESHOLD
    }

    /// Whether the member moves up or down and nothing else.
    pub fn is_moving_vertical_only(&self) -> bool {
        !self.kin.velocity.has_horizontal_movement() && self.kin.velocity.y.abs() > MOVEMENT_EPSILON
    }

    /// Halt.
    pub fn stop(&mut self) {
        self.kin.velocity = Vec3::ZERO;
    }

    /// Turn around, keeping speed.
    pub fn reverse(&mut self) {
        self.kin.velocity = -self.kin.velocity;
        self.set_direction(self.kin.direction.opposite());
    }

    // ── headings ───────────────────────────────────────────────

    fn resolve(&self, movement: Vec3) -> Option<Face> {
        match (&self.logic, &self.rail) {
            (Some(logic), Some(rail)) => Some(logic.resolve_direction(
                &self.kin,
                rail.pos,
                movement,
                self.last_logic.as_ref(),
            )),
            _ => Face::from_movement(movement),
        }
    }

    fn apply_direction(&mut self, direction: Option<Face>) {
        if let Some(direction) = direction {
            self.kin.set_direction(direction);
        }
        self.update_orientation();
    }

    /// Resolve the heading from the member's own velocity.
    pub fn update_direction(&mut self) {
        let direction = self.resolve(self.kin.velocity);
        self.apply_direction(direction);
    }

    /// Resolve the heading as travelling toward `leader`.
    pub fn update_direction_to(&mut self, leader: &Member) {
        let direction = self.resolve(leader.position() - self.position());
        self.apply_direction(direction);
    }

    /// Resolve the heading as travelling away from `follower`.
    pub fn update_direction_from(&mut self, follower: &Member) {
        let direction = self.resolve(self.position() - follower.position());
        self.apply_direction(direction);
    }

    /// Force a heading, then resolve it against the rail.
    pub fn set_direction(&mut self, direction: Face) {
        self.kin.set_direction(direction);
        let resolved = self.resolve(direction.vector());
        self.apply_direction(resolved);
    }

    fn update_orientation(&mut self) {
        let direction = self.kin.direction;
        if direction.is_horizontal() {
            self.yaw = direction.yaw();
        }
        self.pitch = match &self.logic {
            Some(logic) => logic.pitch(direction),
            None => self.kin.velocity.pitch(),
        };
    }

    // ── coupling ───────────────────────────────────────────────

    /// Whether this member trails `leader` closely enough to stay coupled.
    pub fn is_following(&self, leader: &Member, config: &PhysicsConfig) -> bool {
        let to_leader = leader.position() - self.position();
        let distance = to_leader.length();
        if distance < 1e-3 {
            return true;
        }
        if distance > config.max_cart_distance {
            return false;
        }
        let cos = self.heading_vector().dot(to_leader) / distance;
        let angle = cos.clamp(-1.0, 1.0).acos().to_degrees();
        angle < config.max_following_angle
    }

    /// Ignore collisions with `other` for `ticks` ticks.
    pub fn ignore_collision(&mut self, other: MemberId, ticks: u32) {
        let entry = self.ignore_collisions.entry(other).or_insert(0);
        *entry = (*entry).max(ticks);
    }

    /// Whether collisions with `other` are currently ignored.
    pub fn is_collision_ignored(&self, other: MemberId) -> bool {
        self.ignore_collisions.contains_key(&other)
    }

    /// Count collision-ignore timers down by one tick, dropping expired ones.
    pub fn tick_collision_timers(&mut self) {
        self.ignore_collisions.retain(|_, ticks| {
            *ticks = ticks.saturating_sub(1);
            *ticks > 0
        });
    }

    // ── fuel ───────────────────────────────────────────────────

    /// Refuel a powered member to `max_fuel`.
    pub fn refill(&mut self, max_fuel: u32) {
        if self.is_powered() {
            self.fuel = max_fuel;
        }
    }

    /// Burn one tick of fuel if powered and moving.
    pub fn burn_fuel(&mut self) {
        if self.is_powered() && self.is_moving() {
            self.fuel = self.fuel.saturating_sub(1);
        }
    }

    // ── physics ────────────────────────────────────────────────

    /// Re-resolve the rail under the member.
    ///
    /// Returns whether the occupied cell changed.
    pub fn physics_start<N: RailNetwork + ?Sized>(&mut self, network: &N) -> bool {
        let cell = BlockPos::containing(self.kin.position);
        let mut found = find_rail_for_member(network, cell, self.rail.as_ref());
        let mut adopted = false;
        if found.is_none() {
            if let Some(current) = &self.rail {
                found = RailType::next_cell(network, current, self.kin.direction)
                    .filter(|next| is_adjacent(next.pos, cell));
                adopted = found.is_some();
            }
        }

        let previous_logic = self.logic;
        let logic = found.and_then(|rail| RailLogic::for_shape(&rail.shape));
        let found = found.filter(|_| logic.is_some());

        let new_block = found.map(|r| r.pos).unwrap_or(cell);
        self.block_changed = new_block != self.block;
        if self.block_changed {
            self.last_block = self.block;
            self.block = new_block;
        }

        if found != self.rail {
            self.last_rail = self.rail;
            self.last_logic = previous_logic;
            self.rail = found;
            self.logic = logic;
            if let (Some(rail), Some(logic)) = (&self.rail, &self.logic) {
                if adopted {
                    self.kin.position = clamp_into_cell(self.kin.position, rail.pos);
                }
                logic.on_enter(&mut self.kin, rail.pos, previous_logic.as_ref());
                self.kin.position = logic.project(self.kin.position, rail.pos);
            }
        }
        self.block_changed
    }

    /// Settle a cell change found by [`physics_start`](Member::physics_start).
    ///
    /// Returns `true` once per change.
    pub fn physics_block_change(&mut self) -> bool {
        if !self.block_changed {
            return false;
        }
        self.block_changed = false;
        trace!(member = %self.id, from = %self.last_block, to = %self.block, "cell changed");
        true
    }

    /// Align velocity with the rail, or fall when derailed.
    pub fn pre_move(&mut self, config: &PhysicsConfig) {
        match (&self.logic, &self.rail) {
            (Some(logic), Some(rail)) => {
                let physics = RailPhysics {
                    slope_gravity: config.slope_gravity,
                };
                logic.pre_move(&mut self.kin, rail.pos, &physics);
            }
            _ => self.kin.velocity.y -= config.derailed_gravity,
        }
    }

    /// Integrate position, scaling the movement by `factor`.
    ///
    /// The factor is clamped to `[0.1, 10]`; NaN counts as 1.
    pub fn post_move(&mut self, factor: f64) {
        let factor = if factor.is_nan() { 1.0 } else { factor }.clamp(0.1, 10.0);
        let speed = self.force();
        if speed > self.max_speed && speed > 0.0 {
            self.kin.velocity *= self.max_speed / speed;
        }
        let movement = self.kin.velocity * factor;
        self.kin.position += movement;
        self.moved_distance = movement.length();
        if let (Some(logic), Some(rail)) = (&self.logic, &self.rail) {
            logic.post_move(&mut self.kin, rail.pos);
        }
        self.update_orientation();
    }

    /// Place the member at `position` heading `direction`, at rest.
    pub fn teleport(&mut self, position: Vec3, direction: Face) {
        self.kin = Kinematics::new(position, direction);
        self.rail = None;
        self.logic = None;
        self.last_rail = None;
        self.last_logic = None;
        self.last_block = self.block;
        self.block = BlockPos::containing(position);
        self.block_changed = self.block != self.last_block;
        self.update_orientation();
    }
}

fn is_adjacent(a: BlockPos, b: BlockPos) -> bool {
    (a.x - b.x).abs() <= 1 && (a.y - b.y).abs() <= 1 && (a.z - b.z).abs() <= 1
}
