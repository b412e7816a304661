//! Train groups: ordered members moved together.
//!
//! [`Group::step`] advances a train by one tick. Fast trains are split into
//! several sub-steps so no member moves more than `substep_threshold` in
//! one go. Each sub-step runs the member physics hooks in a fixed order,
//! corrects coupling distances, and checks that every member still follows
//! the one ahead. A broken coupling is reported as
//! [`SubstepOutcome::Split`]; the registry performs the split.

use std::collections::VecDeque;

use tracing::trace;
use trackway_core::{
    BlockPos, DetectorService, Face, GroupId, MemberId, RailCell, RailNetwork, RegistryError,
    SignalLayout, TickId, TrackEvent, Vec3,
};
use trackway_rails::walk;

use crate::action::Action;
use crate::config::{PhysicsConfig, TrainProperties};
use crate::member::Member;
use crate::tracker::OccupancyTracker;

/// Yaw difference, in degrees, at which a pair counts as turned.
const TURNED_YAW: f64 = 45.0;

/// Pitch difference, in degrees, at which a pair counts as turned.
const TURNED_PITCH: f64 = 10.0;

/// Speeds below this are treated as standing still when sharing force.
const FORCE_EPSILON: f64 = 0.01;

/// Collision-ignore bounds, in ticks, after a forced split.
const SPLIT_IGNORE_TICKS: (u32, u32) = (20, 40);

/// World access for one group step.
pub struct StepContext<'a> {
    /// Rail geometry.
    pub network: &'a dyn RailNetwork,
    /// Signal placement.
    pub signals: &'a dyn SignalLayout,
    /// Detector regions.
    pub detectors: &'a mut dyn DetectorService,
    /// Physics tunables.
    pub config: &'a PhysicsConfig,
    /// Tick being executed.
    pub tick: TickId,
    /// Events produced during the step.
    pub outbox: &'a mut Vec<TrackEvent>,
}

/// How a step ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubstepOutcome {
    /// Every sub-step ran.
    Completed,
    /// The group has no members.
    Empty,
    /// A member died; the registry removes it.
    MemberMissing,
    /// Physics were broken off by a structural change.
    Broken,
    /// The coupling in front of member `at` broke.
    Split {
        /// Index of the first member of the new group.
        at: usize,
        /// Ticks the two halves ignore collisions with each other.
        ignore_ticks: u32,
    },
}

/// An ordered train of members, head first.
#[derive(Debug)]
pub struct Group {
    id: GroupId,
    members: Vec<Member>,
    actions: VecDeque<Action>,
    properties: Option<TrainProperties>,
    tracker: OccupancyTracker,
    break_physics: bool,
    substeps: u32,
}

impl Group {
    /// A group owning `members`, head first.
    pub fn new(id: GroupId, mut members: Vec<Member>) -> Self {
        for m in &mut members {
            m.set_group(Some(id));
        }
        Self {
            id,
            members,
            actions: VecDeque::new(),
            properties: None,
            tracker: OccupancyTracker::new(),
            break_physics: false,
            substeps: 1,
        }
    }

    // ── members ────────────────────────────────────────────────

    /// Group id.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Members, head first.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Mutable members, head first.
    pub fn members_mut(&mut self) -> &mut [Member] {
        &mut self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// First member.
    pub fn head(&self) -> Option<&Member> {
        self.members.first()
    }

    /// Last member.
    pub fn tail(&self) -> Option<&Member> {
        self.members.last()
    }

    /// Member in the middle of the train.
    pub fn middle(&self) -> Option<&Member> {
        self.members.get(self.members.len() / 2)
    }

    /// Member at `index`.
    pub fn get(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    /// Member by id.
    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id() == id)
    }

    /// Mutable member by id.
    pub fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id() == id)
    }

    /// Position of a member in the train.
    pub fn index_of(&self, id: MemberId) -> Option<usize> {
        self.members.iter().position(|m| m.id() == id)
    }

    /// Whether the group contains `id`.
    pub fn contains(&self, id: MemberId) -> bool {
        self.index_of(id).is_some()
    }

    /// Append a member at the tail.
    pub fn add_member(&mut self, mut member: Member) {
        member.set_group(Some(self.id));
        self.members.push(member);
        self.tracker.mark_position_dirty();
    }

    /// Append members at the tail, keeping their order.
    pub fn append_members(&mut self, members: Vec<Member>) {
        for m in members {
            self.add_member(m);
        }
    }

    /// Remove the member at `index`, dropping actions bound to it.
    pub fn take_member(&mut self, index: usize) -> Option<Member> {
        if index >= self.members.len() {
            return None;
        }
        let mut member = self.members.remove(index);
        member.set_group(None);
        self.actions.retain(|a| a.member() != Some(member.id()));
        self.tracker.mark_position_dirty();
        self.break_physics = true;
        Some(member)
    }

    /// Insert members in front of the head, keeping their order.
    pub fn prepend_members(&mut self, mut members: Vec<Member>) {
        for m in &mut members {
            m.set_group(Some(self.id));
        }
        self.members.splice(0..0, members);
        self.tracker.mark_position_dirty();
    }

    /// Attach a lone member at whichever end it is near.
    ///
    /// Hands the member back if neither end is within `max_cart_distance`.
    pub fn connect(&mut self, mut member: Member, config: &PhysicsConfig) -> Result<(), Member> {
        let reach = |end: Option<&Member>| {
            end.map(|m| m.position().distance(member.position()))
                .filter(|d| *d <= config.max_cart_distance)
        };
        let at_head = reach(self.head());
        let at_tail = reach(self.tail());
        let front = match (at_head, at_tail) {
            (Some(h), Some(t)) => h < t,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return Err(member),
        };
        member.set_group(Some(self.id));
        if front {
            self.members.insert(0, member);
        } else {
            self.members.push(member);
        }
        self.tracker.mark_position_dirty();
        Ok(())
    }

    /// Detach members `at..`, dropping actions bound to them.
    pub fn split_off(&mut self, at: usize) -> Vec<Member> {
        let at = at.min(self.members.len());
        let mut detached = self.members.split_off(at);
        for m in &mut detached {
            m.set_group(None);
        }
        self.actions
            .retain(|a| a.member().is_none_or(|id| !detached.iter().any(|m| m.id() == id)));
        self.tracker.mark_position_dirty();
        self.break_physics = true;
        detached
    }

    /// Take every member out, leaving the group empty.
    pub fn drain_members(&mut self) -> Vec<Member> {
        self.split_off(0)
    }

    // ── properties ─────────────────────────────────────────────

    /// Per-train settings, if any were set.
    pub fn properties(&self) -> Option<&TrainProperties> {
        self.properties.as_ref()
    }

    /// Per-train settings, created with defaults on first use.
    pub fn properties_mut(&mut self, config: &PhysicsConfig) -> &mut TrainProperties {
        let id = self.id;
        self.properties
            .get_or_insert_with(|| TrainProperties::new(id, config))
    }

    /// Display name.
    pub fn name(&self) -> String {
        self.properties
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("train{}", self.id.0))
    }

    /// Speed limit in blocks per tick.
    pub fn speed_limit(&self, config: &PhysicsConfig) -> f64 {
        self.properties
            .as_ref()
            .map_or(config.default_speed_limit, |p| p.speed_limit)
    }

    /// Target spacing between coupled members on straight track.
    pub fn coupling_distance(&self, config: &PhysicsConfig) -> f64 {
        self.properties
            .as_ref()
            .and_then(|p| p.coupling_distance)
            .unwrap_or(config.cart_distance)
    }

    /// Nominal train length.
    pub fn length(&self, config: &PhysicsConfig) -> f64 {
        self.coupling_distance(config) * self.members.len().saturating_sub(1) as f64
    }

    // ── state ──────────────────────────────────────────────────

    /// Whether the group may exist as configured.
    pub fn is_valid(&self) -> bool {
        match self.members.len() {
            0 => false,
            1 => true,
            _ => {
                !self
                    .properties
                    .as_ref()
                    .is_some_and(|p| p.requires_powered_vehicle)
                    || self.members.iter().any(Member::is_powered)
            }
        }
    }

    /// Whether the world around the train may be unloaded.
    pub fn can_unload(&self, config: &PhysicsConfig) -> bool {
        let keep = self
            .properties
            .as_ref()
            .is_some_and(|p| p.keep_chunks_loaded);
        if keep && (!config.keep_chunks_loaded_only_when_moving || self.is_moving()) {
            return false;
        }
        !self.members.iter().any(|m| m.has_player_passenger)
    }

    /// Whether any member is moving.
    pub fn is_moving(&self) -> bool {
        self.members.iter().any(Member::is_moving)
    }

    /// Sub-steps used by the current or last step.
    pub fn substeps(&self) -> u32 {
        self.substeps
    }

    /// Whether physics were broken off during the current sub-step.
    pub fn is_physics_broken(&self) -> bool {
        self.break_physics
    }

    /// Abort the current sub-step after the next check.
    pub fn break_physics(&mut self) {
        self.break_physics = true;
    }

    /// Occupancy tracker.
    pub fn tracker(&self) -> &OccupancyTracker {
        &self.tracker
    }

    /// Mutable occupancy tracker.
    pub fn tracker_mut(&mut self) -> &mut OccupancyTracker {
        &mut self.tracker
    }

    /// Fire "still active" events for everything at the next refresh.
    pub fn request_update(&mut self) {
        self.tracker.request_update(&self.members);
    }

    /// Fire leave events for everything the group occupies.
    pub fn release_tracker(&mut self, outbox: &mut Vec<TrackEvent>) {
        self.tracker.release(self.id, outbox);
    }

    /// Cell the head occupies.
    pub fn head_location(&self) -> Option<BlockPos> {
        self.head().map(Member::block)
    }

    /// Count down timers and burn fuel; called once per tick.
    pub fn tick_housekeeping(&mut self) {
        for m in &mut self.members {
            m.tick_collision_timers();
            m.burn_fuel();
        }
    }

    // ── actions ────────────────────────────────────────────────

    /// Queued actions, front first.
    pub fn actions(&self) -> &VecDeque<Action> {
        &self.actions
    }

    /// Queue an action behind the others.
    pub fn push_action(&mut self, action: Action) {
        self.actions.push_back(action);
    }

    /// Drop all queued actions.
    pub fn clear_actions(&mut self) {
        self.actions.clear();
    }

    fn update_action(&mut self, ctx: &mut StepContext<'_>) {
        if let Some(mut action) = self.actions.pop_front() {
            if !action.update(self, ctx) {
                self.actions.push_front(action);
            }
        }
    }

    // ── forces ─────────────────────────────────────────────────

    /// Mean signed speed of the train.
    ///
    /// If the train as a whole rolls backwards the member order is
    /// reversed, so the returned force is never negative because of
    /// direction alone.
    pub fn average_force(&mut self) -> f64 {
        match self.members.as_slice() {
            [] => 0.0,
            [only] => only.forward_force(),
            members => {
                let mut forward = 0.0;
                let mut force = 0.0;
                for m in members {
                    let f = m.forward_force();
                    forward += f;
                    force += if f >= 0.0 { m.force() } else { -m.force() };
                }
                force /= members.len() as f64;
                if forward < 0.0 {
                    self.members.reverse();
                    self.tracker.mark_position_dirty();
                    force = -force;
                }
                force
            }
        }
    }

    /// Set the train's speed along its heading.
    ///
    /// A moving train keeps its per-member velocity ratios; a train at rest
    /// (or a near-zero target) sets every member directly.
    pub fn set_forward_force(&mut self, force: f64) {
        let current = self.head().map_or(0.0, Member::force);
        if current <= FORCE_EPSILON || force.abs() < FORCE_EPSILON {
            for m in &mut self.members {
                m.set_forward_force(force);
            }
        } else {
            let ratio = force / current;
            for m in &mut self.members {
                m.scale_velocity(ratio);
            }
        }
    }

    /// Give every member the average force.
    pub fn share_force(&mut self) {
        let force = self.average_force();
        for m in &mut self.members {
            m.set_forward_force(force);
        }
    }

    /// Halt every member.
    pub fn stop(&mut self) {
        for m in &mut self.members {
            m.stop();
        }
    }

    /// Halt the train and put members with a non-finite state back at the
    /// centre of their last cell.
    pub fn reset_non_finite(&mut self) {
        for m in &mut self.members {
            if !m.is_finite() {
                let direction = m.direction();
                m.teleport(m.block().mid(), direction);
            }
            m.stop();
        }
        self.tracker.mark_position_dirty();
    }

    /// Turn the train around.
    pub fn reverse(&mut self) {
        for m in &mut self.members {
            m.reverse();
        }
        self.members.reverse();
        self.tracker.mark_position_dirty();
    }

    /// Re-resolve every heading so members point along the train.
    pub fn update_direction(&mut self) {
        let len = self.members.len();
        match len {
            0 => {}
            1 => self.members[0].update_direction(),
            _ => {
                let (front, tail) = self.members.split_at_mut(len - 1);
                tail[0].update_direction_to(&front[len - 2]);
                for i in (0..len - 1).rev() {
                    let (front, back) = self.members.split_at_mut(i + 1);
                    front[i].update_direction_from(&back[0]);
                }
            }
        }
    }

    // ── placement ──────────────────────────────────────────────

    /// Place members onto `positions`; with `reversed` the head takes the
    /// last position.
    pub fn teleport(
        &mut self,
        positions: &[(Vec3, Face)],
        reversed: bool,
    ) -> Result<(), RegistryError> {
        let len = self.members.len();
        if positions.len() < len {
            return Err(RegistryError::TrackTooShort {
                group: self.id,
                needed: len,
                found: positions.len(),
            });
        }
        for (i, m) in self.members.iter_mut().enumerate() {
            let (position, direction) = if reversed {
                positions[len - 1 - i]
            } else {
                positions[i]
            };
            m.teleport(position, direction);
        }
        self.tracker.mark_position_dirty();
        self.break_physics = true;
        Ok(())
    }

    /// Move the train onto the track at `start`, heading `direction`, and
    /// relaunch it at its previous speed.
    pub fn teleport_and_go(
        &mut self,
        network: &dyn RailNetwork,
        start: RailCell,
        direction: Face,
        config: &PhysicsConfig,
    ) -> Result<(), RegistryError> {
        let force = self.average_force();
        let spacing = self.coupling_distance(config);
        let positions = walk(network, start, direction, self.members.len(), spacing);
        self.teleport(&positions, true)?;
        self.stop();
        self.actions.clear();
        for m in &mut self.members {
            m.physics_start(network);
        }
        if force.abs() > FORCE_EPSILON {
            if let Some(tail) = self.tail().map(Member::id) {
                self.actions.push_back(Action::launch(tail, 1.0, force));
            }
        }
        Ok(())
    }

    // ── stepping ───────────────────────────────────────────────

    /// Advance the train by one tick.
    pub fn step(&mut self, ctx: &mut StepContext<'_>) -> SubstepOutcome {
        if self.members.is_empty() {
            return SubstepOutcome::Empty;
        }
        if self.members.iter().any(|m| m.dead) {
            return SubstepOutcome::MemberMissing;
        }

        let limit = self.speed_limit(ctx.config);
        let threshold = ctx.config.substep_threshold;
        let count = if limit > threshold {
            (limit / threshold).ceil().max(1.0) as u32
        } else {
            1
        };
        self.substeps = count;
        let scale = 1.0 / f64::from(count);
        for m in &mut self.members {
            m.scale_velocity(scale);
        }

        let mut outcome = SubstepOutcome::Completed;
        for substep in 0..count {
            outcome = self.substep(ctx, limit * scale);
            trace!(group = %self.id, substep, ?outcome, "sub-step");
            if outcome != SubstepOutcome::Completed {
                break;
            }
        }

        for m in &mut self.members {
            m.scale_velocity(f64::from(count));
            m.set_max_speed(limit);
        }
        if outcome == SubstepOutcome::Completed {
            let keep = !self.can_unload(ctx.config);
            for m in &mut self.members {
                m.keep_chunks_loaded = keep;
            }
        }
        outcome
    }

    fn substep(&mut self, ctx: &mut StepContext<'_>, max_speed: f64) -> SubstepOutcome {
        self.break_physics = false;
        for m in &mut self.members {
            if m.dead {
                return SubstepOutcome::MemberMissing;
            }
            m.set_max_speed(max_speed);
        }
        if self.members.is_empty() {
            return SubstepOutcome::Empty;
        }

        // 1. Headings and the front action.
        self.update_direction();
        self.update_action(ctx);

        // 2. Rail lookup and occupancy.
        let mut moved = false;
        for m in &mut self.members {
            moved |= m.physics_start(ctx.network);
        }
        if moved {
            self.tracker.mark_position_dirty();
        }
        self.tracker.refresh(self.id, &self.members, ctx);
        for m in &mut self.members {
            if m.physics_block_change() {
                self.tracker.request_member_update(m.id());
            }
        }
        self.tracker.refresh(self.id, &self.members, ctx);
        if self.break_physics {
            return SubstepOutcome::Broken;
        }

        // 3. Align velocities with the rails.
        self.update_direction();
        for m in &mut self.members {
            m.pre_move(ctx.config);
        }

        // 4. Move.
        if self.members.len() == 1 {
            self.members[0].post_move(1.0);
            return SubstepOutcome::Completed;
        }

        let force = self.average_force();
        trace!(group = %self.id, force, "aggregate force");
        self.update_direction();
        let suppressed = self
            .actions
            .front()
            .is_some_and(Action::is_movement_suppressed);
        if !suppressed && self.all_following(ctx.config) {
            for m in &mut self.members {
                m.set_forward_force(force);
            }
        }

        let config = ctx.config;
        let coupling = self.coupling_distance(config);
        let len = self.members.len();
        for i in 0..len - 1 {
            let (leader, follower) = (&self.members[i], &self.members[i + 1]);
            let turned = leader.direction().yaw_difference(follower.direction()) >= TURNED_YAW
                || (leader.pitch() - follower.pitch()).abs() > TURNED_PITCH;
            let (threshold, mut forcer) = if turned {
                (config.turned_cart_distance, config.turned_cart_distance_forcer)
            } else {
                (coupling, config.cart_distance_forcer)
            };
            let distance = leader.position().distance(follower.position());
            if distance < threshold {
                forcer *= config.near_cart_distance_factor;
            }
            self.members[i].post_move(1.0 + forcer * (threshold - distance));
            if self.break_physics {
                return SubstepOutcome::Broken;
            }
        }
        self.members[len - 1].post_move(1.0);

        // 5. Check couplings.
        self.average_force();
        self.update_direction();
        for i in 0..len - 1 {
            if !self.members[i + 1].is_following(&self.members[i], config) {
                let ticks = 2.0 / self.members[i + 1].force();
                let (low, high) = SPLIT_IGNORE_TICKS;
                let ignore_ticks = if ticks.is_finite() {
                    ticks.clamp(f64::from(low), f64::from(high)) as u32
                } else {
                    high
                };
                return SubstepOutcome::Split {
                    at: i + 1,
                    ignore_ticks,
                };
            }
        }
        SubstepOutcome::Completed
    }

    fn all_following(&self, config: &PhysicsConfig) -> bool {
        self.members
            .windows(2)
            .all(|pair| pair[1].is_following(&pair[0], config))
    }
}
