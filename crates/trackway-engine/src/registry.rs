//! The set of live trains and the member store.
//!
//! [`GroupRegistry`] owns every [`Group`] and allocates group and member
//! ids. Structural changes (spawn, split, link, unload, disband) go
//! through it so lifecycle events are emitted in one place. Events are
//! pushed into a caller-supplied outbox.

use indexmap::IndexMap;
use tracing::{debug, warn};
use trackway_core::{
    BlockPos, CommandError, CommandPayload, EffectKind, Face, GroupId, MemberId, RailCell,
    RailNetwork, RegistryError, TrackEvent, Vec3,
};
use trackway_rails::walk;

use crate::action::Action;
use crate::config::PhysicsConfig;
use crate::group::Group;
use crate::member::{create_controller, Member, VehicleType};

/// Default search radius of [`GroupRegistry::member_near`].
pub const MEMBER_SEARCH_RADIUS: f64 = 0.999;

/// A world vehicle offered for conversion.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleSpawn {
    /// Vehicle type.
    pub vehicle: VehicleType,
    /// Position.
    pub position: Vec3,
    /// Yaw in degrees.
    pub yaw: f64,
}

/// Every live train, keyed by id.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: IndexMap<GroupId, Group>,
    next_group: u64,
    next_member: u64,
}

impl GroupRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_group(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        id
    }

    fn alloc_member(&mut self) -> MemberId {
        let id = MemberId(self.next_member);
        self.next_member += 1;
        id
    }

    // ── queries ────────────────────────────────────────────────

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group by id.
    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Mutable group by id.
    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.get_mut(&id)
    }

    /// Group by id, or `UnknownGroup`.
    pub fn require(&mut self, id: GroupId) -> Result<&mut Group, RegistryError> {
        self.groups
            .get_mut(&id)
            .ok_or(RegistryError::UnknownGroup(id))
    }

    /// Every group, in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Every group, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Group> {
        self.groups.values_mut()
    }

    /// Snapshot of every group id.
    pub fn ids(&self) -> Vec<GroupId> {
        self.groups.keys().copied().collect()
    }

    /// Group containing `member`.
    pub fn group_of(&self, member: MemberId) -> Option<GroupId> {
        self.groups
            .values()
            .find(|g| g.contains(member))
            .map(Group::id)
    }

    /// Member by id.
    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.groups.values().find_map(|g| g.member(id))
    }

    /// Mutable member by id.
    pub fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.groups.values_mut().find_map(|g| g.member_mut(id))
    }

    /// Member on the rail at `cell`, preferring one heading into the cell.
    ///
    /// Cells a train spans between two members count for the member owning
    /// them in the group's occupancy map.
    pub fn member_at(&self, cell: BlockPos) -> Option<&Member> {
        let mid = cell.mid();
        let on_cell = self
            .groups
            .values()
            .flat_map(|g| g.members())
            .filter(|m| m.block() == cell);
        let spanning = self
            .groups
            .values()
            .filter_map(|g| g.tracker().owner_of(cell).and_then(|id| g.member(id)))
            .filter(|m| m.block() != cell);
        let mut fallback = None;
        for m in on_cell.chain(spanning) {
            if m.heading_vector().dot(mid - m.position()) > 0.0 {
                return Some(m);
            }
            fallback.get_or_insert(m);
        }
        fallback
    }

    /// Member within `radius` of `position`, optionally only from `group`.
    ///
    /// Members heading toward the point win over nearer ones heading away.
    pub fn member_near(
        &self,
        position: Vec3,
        group: Option<GroupId>,
        radius: f64,
    ) -> Option<&Member> {
        let mut toward: Option<(f64, &Member)> = None;
        let mut nearest: Option<(f64, &Member)> = None;
        let candidates = self
            .groups
            .values()
            .filter(|g| group.is_none_or(|id| g.id() == id))
            .flat_map(|g| g.members());
        for m in candidates {
            let d = m.position().distance(position);
            if d > radius {
                continue;
            }
            if m.heading_vector().dot(position - m.position()) > 0.0
                && toward.is_none_or(|(best, _)| d < best)
            {
                toward = Some((d, m));
            }
            if nearest.is_none_or(|(best, _)| d < best) {
                nearest = Some((d, m));
            }
        }
        toward.or(nearest).map(|(_, m)| m)
    }

    // ── creation ───────────────────────────────────────────────

    /// A new member with a fresh id, or `None` for vehicles without rail
    /// physics.
    pub fn spawn_member(&mut self, vehicle: VehicleType, position: Vec3, yaw: f64) -> Option<Member> {
        if !vehicle.is_supported() {
            return None;
        }
        let id = self.alloc_member();
        create_controller(id, vehicle, position, yaw)
    }

    /// Register a group of `members`, head first.
    pub fn create_group(&mut self, members: Vec<Member>, outbox: &mut Vec<TrackEvent>) -> GroupId {
        let id = self.alloc_group();
        let group = Group::new(id, members);
        outbox.push(TrackEvent::GroupCreated { group: id });
        for m in group.members() {
            outbox.push(TrackEvent::MemberAdded {
                group: id,
                member: m.id(),
            });
        }
        self.groups.insert(id, group);
        id
    }

    /// Turn world vehicles into single-member groups.
    ///
    /// Vehicles without rail physics yield `None`.
    pub fn convert_all(
        &mut self,
        vehicles: Vec<VehicleSpawn>,
        outbox: &mut Vec<TrackEvent>,
    ) -> Vec<Option<GroupId>> {
        vehicles
            .into_iter()
            .map(|v| {
                let member = self.spawn_member(v.vehicle, v.position, v.yaw)?;
                Some(self.create_group(vec![member], outbox))
            })
            .collect()
    }

    /// Place a new train on the track, tail on `start` and head toward
    /// `direction`.
    ///
    /// Vehicles without rail physics are left out.
    pub fn spawn_train(
        &mut self,
        network: &dyn RailNetwork,
        start: RailCell,
        direction: Face,
        vehicles: &[VehicleType],
        config: &PhysicsConfig,
        outbox: &mut Vec<TrackEvent>,
    ) -> Result<GroupId, RegistryError> {
        let supported: Vec<&VehicleType> = vehicles.iter().filter(|v| v.is_supported()).collect();
        let positions = walk(network, start, direction, supported.len(), config.cart_distance);
        if positions.len() < supported.len() {
            return Err(RegistryError::TrackTooShort {
                group: GroupId(self.next_group),
                needed: supported.len(),
                found: positions.len(),
            });
        }
        let mut members = Vec::with_capacity(supported.len());
        for (vehicle, (position, heading)) in supported.into_iter().zip(positions.into_iter().rev())
        {
            let id = self.alloc_member();
            let mut member = Member::new(id, vehicle.clone(), position, heading);
            member.physics_start(network);
            members.push(member);
        }
        Ok(self.create_group(members, outbox))
    }

    // ── structural changes ─────────────────────────────────────

    /// Remove a group, firing leave events for everything it occupied.
    pub fn remove_group(&mut self, id: GroupId, outbox: &mut Vec<TrackEvent>) -> Option<Group> {
        let mut group = self.groups.shift_remove(&id)?;
        group.release_tracker(outbox);
        outbox.push(TrackEvent::GroupRemoved { group: id });
        debug!(group = %id, members = group.len(), "group removed");
        Some(group)
    }

    /// Remove a group and give each of its members a group of its own.
    fn dissolve(&mut self, id: GroupId, outbox: &mut Vec<TrackEvent>) {
        if let Some(mut group) = self.remove_group(id, outbox) {
            for m in group.drain_members() {
                self.create_group(vec![m], outbox);
            }
        }
    }

    /// Move members `at..` of `group` into a new group.
    ///
    /// `at == 0` or `at >= len` is a no-op. Returns the new group, or
    /// `None` when nothing was split off or the new group was invalid and
    /// its members were released.
    pub fn split(
        &mut self,
        id: GroupId,
        at: usize,
        config: &PhysicsConfig,
        outbox: &mut Vec<TrackEvent>,
    ) -> Result<Option<GroupId>, RegistryError> {
        let origin = self.require(id)?;
        if at == 0 || at >= origin.len() {
            return Ok(None);
        }
        let detached = origin.split_off(at);
        let properties = origin.properties().cloned();
        let origin_valid = origin.is_valid();
        for m in &detached {
            outbox.push(TrackEvent::MemberRemoved {
                group: id,
                member: m.id(),
            });
        }

        let new_id = self.alloc_group();
        let mut acceptor = Group::new(new_id, detached);
        if let Some(properties) = properties {
            properties.copy_settings_to(acceptor.properties_mut(config));
        }

        if !origin_valid {
            warn!(group = %id, "group invalid after split");
            self.dissolve(id, outbox);
        }
        if !acceptor.is_valid() {
            for m in acceptor.drain_members() {
                self.create_group(vec![m], outbox);
            }
            return Ok(None);
        }

        outbox.push(TrackEvent::GroupCreated { group: new_id });
        for m in acceptor.members() {
            outbox.push(TrackEvent::MemberAdded {
                group: new_id,
                member: m.id(),
            });
        }
        debug!(origin = %id, group = %new_id, at, members = acceptor.len(), "group split");
        self.groups.insert(new_id, acceptor);
        Ok(Some(new_id))
    }

    /// Split after a broken coupling and keep the halves from colliding
    /// for `ignore_ticks`.
    pub fn split_apart(
        &mut self,
        id: GroupId,
        at: usize,
        ignore_ticks: u32,
        config: &PhysicsConfig,
        outbox: &mut Vec<TrackEvent>,
    ) -> Result<Option<GroupId>, RegistryError> {
        let Some(new_id) = self.split(id, at, config, outbox)? else {
            return Ok(None);
        };
        let ids_of = |g: Option<&Group>| -> Vec<MemberId> {
            g.map(|g| g.members().iter().map(Member::id).collect())
                .unwrap_or_default()
        };
        let origin_ids = ids_of(self.groups.get(&id));
        let new_ids = ids_of(self.groups.get(&new_id));
        if let Some(g) = self.groups.get_mut(&new_id) {
            for m in g.members_mut() {
                for &other in &origin_ids {
                    m.ignore_collision(other, ignore_ticks);
                }
            }
        }
        if let Some(g) = self.groups.get_mut(&id) {
            for m in g.members_mut() {
                for &other in &new_ids {
                    m.ignore_collision(other, ignore_ticks);
                }
            }
        }
        Ok(Some(new_id))
    }

    /// Couple `back` onto `front`, joining whichever ends are closest.
    ///
    /// `front` keeps its id; `back` is removed.
    pub fn link(
        &mut self,
        front: GroupId,
        back: GroupId,
        config: &PhysicsConfig,
        outbox: &mut Vec<TrackEvent>,
    ) -> Result<(), RegistryError> {
        if front == back {
            return Err(RegistryError::SameGroup(front));
        }
        let f = self.groups.get(&front).ok_or(RegistryError::UnknownGroup(front))?;
        let b = self.groups.get(&back).ok_or(RegistryError::UnknownGroup(back))?;
        let not_adjacent = RegistryError::NotAdjacent { front, back };
        let (Some(fh), Some(ft), Some(bh), Some(bt)) = (f.head(), f.tail(), b.head(), b.tail())
        else {
            return Err(not_adjacent);
        };

        // (distance, append behind front, reverse back)
        let options = [
            (ft.position().distance(bh.position()), true, false),
            (ft.position().distance(bt.position()), true, true),
            (fh.position().distance(bt.position()), false, false),
            (fh.position().distance(bh.position()), false, true),
        ];
        let Some(&(_, append, reverse)) = options
            .iter()
            .filter(|(d, ..)| *d <= config.max_cart_distance)
            .min_by(|a, b| a.0.total_cmp(&b.0))
        else {
            return Err(not_adjacent);
        };

        let Some(mut back_group) = self.groups.shift_remove(&back) else {
            return Err(RegistryError::UnknownGroup(back));
        };
        back_group.release_tracker(outbox);
        let mut members = back_group.drain_members();
        if reverse {
            members.reverse();
        }
        for m in &members {
            outbox.push(TrackEvent::MemberRemoved {
                group: back,
                member: m.id(),
            });
            outbox.push(TrackEvent::MemberAdded {
                group: front,
                member: m.id(),
            });
        }
        let joined = if append {
            members.first().map(Member::id)
        } else {
            members.last().map(Member::id)
        };

        let group = self.require(front)?;
        if append {
            group.append_members(members);
        } else {
            group.prepend_members(members);
        }
        if let Some(member) = joined {
            outbox.push(TrackEvent::Effect {
                group: front,
                member,
                effect: EffectKind::Link,
            });
        }
        outbox.push(TrackEvent::GroupRemoved { group: back });
        debug!(%front, %back, members = group.len(), "groups linked");
        Ok(())
    }

    /// Attach a lone member to `group` at whichever end it is near.
    pub fn connect(
        &mut self,
        group: GroupId,
        member: MemberId,
        config: &PhysicsConfig,
        outbox: &mut Vec<TrackEvent>,
    ) -> Result<(), RegistryError> {
        let from = self
            .group_of(member)
            .ok_or(RegistryError::UnknownMember(member))?;
        if from == group {
            return Err(RegistryError::SameGroup(group));
        }
        if self.groups.get(&from).map_or(0, Group::len) != 1 {
            return Err(RegistryError::NotAdjacent {
                front: group,
                back: from,
            });
        }
        self.require(group)?;
        let Some(mut lone) = self.groups.shift_remove(&from) else {
            return Err(RegistryError::UnknownGroup(from));
        };
        let Some(taken) = lone.take_member(0) else {
            return Err(RegistryError::UnknownMember(member));
        };
        let target = self.require(group)?;
        match target.connect(taken, config) {
            Ok(()) => {
                lone.release_tracker(outbox);
                outbox.push(TrackEvent::MemberRemoved { group: from, member });
                outbox.push(TrackEvent::GroupRemoved { group: from });
                outbox.push(TrackEvent::MemberAdded { group, member });
                Ok(())
            }
            Err(taken) => {
                lone.add_member(taken);
                self.groups.insert(from, lone);
                Err(RegistryError::NotAdjacent {
                    front: group,
                    back: from,
                })
            }
        }
    }

    /// Remove a member; the rest of its train splits at the gap.
    pub fn remove_member(
        &mut self,
        id: MemberId,
        config: &PhysicsConfig,
        outbox: &mut Vec<TrackEvent>,
    ) -> Result<Member, RegistryError> {
        let group_id = self.group_of(id).ok_or(RegistryError::UnknownMember(id))?;
        let group = self.require(group_id)?;
        let index = group.index_of(id).ok_or(RegistryError::UnknownMember(id))?;
        let member = group
            .take_member(index)
            .ok_or(RegistryError::UnknownMember(id))?;
        let empty = group.is_empty();
        outbox.push(TrackEvent::MemberRemoved {
            group: group_id,
            member: id,
        });
        if empty {
            self.remove_group(group_id, outbox);
        } else {
            self.split(group_id, index, config, outbox)?;
        }
        Ok(member)
    }

    /// Take a member out of its train without splitting the rest.
    ///
    /// A train left empty is removed at once.
    pub fn remove_member_silent(
        &mut self,
        id: MemberId,
        outbox: &mut Vec<TrackEvent>,
    ) -> Option<Member> {
        let group = self.groups.values_mut().find(|g| g.contains(id))?;
        let group_id = group.id();
        let index = group.index_of(id)?;
        let member = group.take_member(index)?;
        let empty = group.is_empty();
        outbox.push(TrackEvent::MemberRemoved {
            group: group_id,
            member: id,
        });
        if empty {
            self.remove_group(group_id, outbox);
        }
        Some(member)
    }

    /// Hand a train back to the world loader.
    ///
    /// The group is stopped and removed; its members are flagged unloaded.
    pub fn unload(
        &mut self,
        id: GroupId,
        outbox: &mut Vec<TrackEvent>,
    ) -> Result<Group, RegistryError> {
        let mut group = self
            .groups
            .shift_remove(&id)
            .ok_or(RegistryError::UnknownGroup(id))?;
        outbox.push(TrackEvent::GroupUnloaded { group: id });
        group.release_tracker(outbox);
        group.stop();
        for m in group.members_mut() {
            m.unloaded = true;
            m.set_group(None);
        }
        debug!(group = %id, members = group.len(), "group unloaded");
        Ok(group)
    }

    /// Destroy a train and its members.
    pub fn disband(
        &mut self,
        id: GroupId,
        outbox: &mut Vec<TrackEvent>,
    ) -> Result<Vec<Member>, RegistryError> {
        let mut group = self
            .groups
            .shift_remove(&id)
            .ok_or(RegistryError::UnknownGroup(id))?;
        group.release_tracker(outbox);
        let mut members = group.drain_members();
        for m in &mut members {
            m.dead = true;
            outbox.push(TrackEvent::MemberRemoved {
                group: id,
                member: m.id(),
            });
        }
        outbox.push(TrackEvent::GroupRemoved { group: id });
        debug!(group = %id, members = members.len(), "group disbanded");
        Ok(members)
    }

    /// Remove every dead member, splitting trains at the gaps.
    pub fn remove_dead_members(
        &mut self,
        id: GroupId,
        config: &PhysicsConfig,
        outbox: &mut Vec<TrackEvent>,
    ) -> Vec<Member> {
        let dead: Vec<MemberId> = self
            .groups
            .get(&id)
            .map(|g| g.members().iter().filter(|m| m.dead).map(Member::id).collect())
            .unwrap_or_default();
        dead.into_iter()
            .filter_map(|m| self.remove_member(m, config, outbox).ok())
            .collect()
    }

    /// Remove groups that are no longer valid; members of a dissolved
    /// train each get a group of their own.
    pub fn remove_invalid(&mut self, outbox: &mut Vec<TrackEvent>) -> usize {
        let invalid: Vec<GroupId> = self
            .groups
            .values()
            .filter(|g| !g.is_valid())
            .map(Group::id)
            .collect();
        for &id in &invalid {
            warn!(group = %id, "removing invalid group");
            self.dissolve(id, outbox);
        }
        invalid.len()
    }

    /// Re-place a train on the track and relaunch it.
    pub fn teleport_and_go(
        &mut self,
        id: GroupId,
        network: &dyn RailNetwork,
        start: RailCell,
        direction: Face,
        config: &PhysicsConfig,
    ) -> Result<(), RegistryError> {
        self.require(id)?
            .teleport_and_go(network, start, direction, config)
    }

    // ── commands ───────────────────────────────────────────────

    /// Apply one queued command.
    pub fn apply_command(
        &mut self,
        payload: &CommandPayload,
        config: &PhysicsConfig,
        outbox: &mut Vec<TrackEvent>,
    ) -> Result<(), CommandError> {
        match *payload {
            CommandPayload::SetForwardForce { group, force } => {
                if !force.is_finite() {
                    return Err(CommandError::InvalidArgument { field: "force" });
                }
                self.require(group)?.set_forward_force(force);
            }
            CommandPayload::Stop { group } => self.require(group)?.stop(),
            CommandPayload::Launch {
                group,
                distance,
                velocity,
            } => {
                if !distance.is_finite() || distance <= 0.0 {
                    return Err(CommandError::InvalidArgument { field: "distance" });
                }
                if !velocity.is_finite() {
                    return Err(CommandError::InvalidArgument { field: "velocity" });
                }
                let g = self.require(group)?;
                let head = g.head().map(Member::id).ok_or(RegistryError::UnknownGroup(group))?;
                g.push_action(Action::launch(head, distance, velocity));
            }
            CommandPayload::Wait { group, ticks } => {
                self.require(group)?
                    .push_action(Action::wait_ticks(u64::from(ticks)));
            }
            CommandPayload::SetSpeedLimit { group, limit } => {
                if !limit.is_finite() || limit < 0.0 {
                    return Err(CommandError::InvalidArgument { field: "limit" });
                }
                self.require(group)?.properties_mut(config).speed_limit = limit;
            }
            CommandPayload::Refill { group } => self.require(group)?.push_action(Action::Refill),
            CommandPayload::Split { group, at } => {
                let len = self.require(group)?.len();
                if at == 0 || at >= len {
                    return Err(RegistryError::InvalidSplit { group, at, len }.into());
                }
                self.split(group, at, config, outbox)?;
            }
            CommandPayload::Link { front, back } => self.link(front, back, config, outbox)?,
            CommandPayload::Disband { group } => {
                self.disband(group, outbox)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::StepContext;
    use trackway_core::TickId;
    use trackway_test_utils::{straight_track, NoDetectors, StaticSignals};

    fn rideable(reg: &mut GroupRegistry, x: f64) -> Member {
        reg.spawn_member(VehicleType::Rideable, Vec3::new(x, 0.0625, 0.5), 270.0)
            .unwrap()
    }

    fn train(reg: &mut GroupRegistry, xs: &[f64], out: &mut Vec<TrackEvent>) -> GroupId {
        let members = xs.iter().map(|&x| rideable(reg, x)).collect();
        reg.create_group(members, out)
    }

    fn ids(reg: &GroupRegistry, g: GroupId) -> Vec<MemberId> {
        reg.get(g).unwrap().members().iter().map(Member::id).collect()
    }

    #[test]
    fn create_group_emits_lifecycle_events() {
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[4.0, 2.5], &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], TrackEvent::GroupCreated { group: g });
        assert_eq!(reg.group_of(MemberId(1)), Some(g));
        assert_eq!(reg.member(MemberId(0)).unwrap().group(), Some(g));
    }

    #[test]
    fn unsupported_vehicles_have_no_controller() {
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let converted = reg.convert_all(
            vec![
                VehicleSpawn {
                    vehicle: VehicleType::Other("boat".into()),
                    position: Vec3::ZERO,
                    yaw: 0.0,
                },
                VehicleSpawn {
                    vehicle: VehicleType::Hopper,
                    position: Vec3::ZERO,
                    yaw: 0.0,
                },
            ],
            &mut out,
        );
        assert!(converted[0].is_none());
        assert!(converted[1].is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn spawn_train_places_head_forward() {
        let grid = straight_track(16);
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let start = grid.cell_at(BlockPos::new(2, 0, 0)).unwrap();
        let vehicles = [VehicleType::Powered, VehicleType::Storage, VehicleType::Storage];
        let g = reg
            .spawn_train(&grid, start, Face::East, &vehicles, &PhysicsConfig::default(), &mut out)
            .unwrap();
        let group = reg.get(g).unwrap();
        assert_eq!(group.len(), 3);
        assert!(group.head().unwrap().is_powered());
        assert!((group.tail().unwrap().position().x - 2.5).abs() < 1e-6);
        assert!((group.head().unwrap().position().x - 5.5).abs() < 1e-6);
        assert!(group.members().iter().all(|m| !m.is_derailed()));
    }

    #[test]
    fn spawn_train_reports_short_track() {
        let grid = straight_track(2);
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let start = grid.cell_at(BlockPos::new(0, 0, 0)).unwrap();
        let err = reg
            .spawn_train(
                &grid,
                start,
                Face::East,
                &vec![VehicleType::Rideable; 3],
                &PhysicsConfig::default(),
                &mut out,
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::TrackTooShort { needed: 3, .. }));
        assert!(reg.is_empty());
    }

    #[test]
    fn split_preserves_order_and_copies_settings() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[7.0, 5.5, 4.0, 2.5], &mut out);
        {
            let p = reg.get_mut(g).unwrap().properties_mut(&cfg);
            p.speed_limit = 0.8;
            p.name = "express".into();
        }
        out.clear();
        let new = reg.split(g, 2, &cfg, &mut out).unwrap().unwrap();
        assert_eq!(ids(&reg, g), vec![MemberId(0), MemberId(1)]);
        assert_eq!(ids(&reg, new), vec![MemberId(2), MemberId(3)]);
        let props = reg.get(new).unwrap().properties().unwrap();
        assert_eq!(props.speed_limit, 0.8);
        assert_ne!(props.name, "express");
        assert!(out.contains(&TrackEvent::GroupCreated { group: new }));
    }

    #[test]
    fn split_out_of_range_is_noop() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[4.0, 2.5], &mut out);
        assert_eq!(reg.split(g, 0, &cfg, &mut out), Ok(None));
        assert_eq!(reg.split(g, 2, &cfg, &mut out), Ok(None));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.split(GroupId(99), 1, &cfg, &mut out),
            Err(RegistryError::UnknownGroup(GroupId(99)))
        );
    }

    #[test]
    fn split_without_power_releases_members() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let head = reg
            .spawn_member(VehicleType::Powered, Vec3::new(7.0, 0.0625, 0.5), 270.0)
            .unwrap();
        let rest = vec![rideable(&mut reg, 5.5), rideable(&mut reg, 4.0)];
        let mut members = vec![head];
        members.extend(rest);
        let g = reg.create_group(members, &mut out);
        reg.get_mut(g).unwrap().properties_mut(&cfg).requires_powered_vehicle = true;
        assert_eq!(reg.split(g, 1, &cfg, &mut out), Ok(None));
        assert_eq!(reg.len(), 3);
        assert!(reg.iter().all(|g| g.is_valid()));
    }

    #[test]
    fn split_apart_sets_collision_timers() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[4.0, 2.5], &mut out);
        let new = reg.split_apart(g, 1, 30, &cfg, &mut out).unwrap().unwrap();
        assert!(reg.member(MemberId(1)).unwrap().is_collision_ignored(MemberId(0)));
        assert!(reg.member(MemberId(0)).unwrap().is_collision_ignored(MemberId(1)));
        assert_eq!(reg.group_of(MemberId(1)), Some(new));
    }

    #[test]
    fn link_appends_nearest_ends() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let front = train(&mut reg, &[10.0, 8.5], &mut out);
        let back = train(&mut reg, &[7.0, 5.5], &mut out);
        out.clear();
        reg.link(front, back, &cfg, &mut out).unwrap();
        assert_eq!(
            ids(&reg, front),
            vec![MemberId(0), MemberId(1), MemberId(2), MemberId(3)]
        );
        assert!(reg.get(back).is_none());
        assert!(out.contains(&TrackEvent::GroupRemoved { group: back }));
        assert!(out.contains(&TrackEvent::Effect {
            group: front,
            member: MemberId(2),
            effect: EffectKind::Link
        }));
    }

    #[test]
    fn link_reverses_and_prepends() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let front = train(&mut reg, &[10.0, 8.5], &mut out);
        // back's head touches front's head
        let back = train(&mut reg, &[11.5, 13.0], &mut out);
        reg.link(front, back, &cfg, &mut out).unwrap();
        assert_eq!(
            ids(&reg, front),
            vec![MemberId(3), MemberId(2), MemberId(0), MemberId(1)]
        );
    }

    #[test]
    fn link_rejects_far_and_same() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let a = train(&mut reg, &[2.5], &mut out);
        let b = train(&mut reg, &[20.5], &mut out);
        assert_eq!(
            reg.link(a, b, &cfg, &mut out),
            Err(RegistryError::NotAdjacent { front: a, back: b })
        );
        assert_eq!(reg.link(a, a, &cfg, &mut out), Err(RegistryError::SameGroup(a)));
    }

    #[test]
    fn connect_moves_lone_member() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[5.5, 4.0], &mut out);
        let lone = train(&mut reg, &[2.5], &mut out);
        reg.connect(g, MemberId(2), &cfg, &mut out).unwrap();
        assert!(reg.get(lone).is_none());
        assert_eq!(ids(&reg, g), vec![MemberId(0), MemberId(1), MemberId(2)]);

        let far = train(&mut reg, &[30.5], &mut out);
        assert!(reg.connect(g, MemberId(3), &cfg, &mut out).is_err());
        assert_eq!(ids(&reg, far), vec![MemberId(3)]);
    }

    #[test]
    fn remove_member_splits_at_gap() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[7.0, 5.5, 4.0], &mut out);
        let removed = reg.remove_member(MemberId(1), &cfg, &mut out).unwrap();
        assert_eq!(removed.group(), None);
        assert_eq!(ids(&reg, g), vec![MemberId(0)]);
        let other = reg.group_of(MemberId(2)).unwrap();
        assert_ne!(other, g);

        reg.remove_member(MemberId(0), &cfg, &mut out).unwrap();
        assert!(reg.get(g).is_none());
        assert!(out.contains(&TrackEvent::GroupRemoved { group: g }));
    }

    #[test]
    fn remove_member_silent_keeps_train() {
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[7.0, 5.5, 4.0], &mut out);
        out.clear();
        assert!(reg.remove_member_silent(MemberId(1), &mut out).is_some());
        assert_eq!(ids(&reg, g), vec![MemberId(0), MemberId(2)]);
        assert_eq!(
            out,
            vec![TrackEvent::MemberRemoved {
                group: g,
                member: MemberId(1)
            }]
        );
        assert!(reg.remove_member_silent(MemberId(1), &mut out).is_none());
    }

    #[test]
    fn remove_member_silent_drops_emptied_train() {
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[4.0], &mut out);
        out.clear();
        let member = reg.remove_member_silent(MemberId(0), &mut out).unwrap();
        assert_eq!(member.group(), None);
        assert!(reg.get(g).is_none());
        assert_eq!(
            out,
            vec![
                TrackEvent::MemberRemoved {
                    group: g,
                    member: MemberId(0)
                },
                TrackEvent::GroupRemoved { group: g },
            ]
        );
    }

    #[test]
    fn member_lookup_covers_spanned_cells() {
        let grid = straight_track(8);
        let signals = StaticSignals::new();
        let mut detectors = NoDetectors;
        let config = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[3.5, 0.5], &mut out);
        let mut ctx = StepContext {
            network: &grid,
            signals: &signals,
            detectors: &mut detectors,
            config: &config,
            tick: TickId(1),
            outbox: &mut out,
        };
        reg.get_mut(g).unwrap().step(&mut ctx);

        let cell = BlockPos::new(1, 0, 0);
        let owner = reg.get(g).unwrap().tracker().owner_of(cell);
        assert!(owner.is_some());
        assert_eq!(reg.member_at(cell).map(Member::id), owner);
        assert!(reg.member_at(BlockPos::new(6, 0, 0)).is_none());
    }

    #[test]
    fn unload_hands_group_back() {
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[4.0, 2.5], &mut out);
        reg.get_mut(g).unwrap().set_forward_force(0.2);
        out.clear();
        let group = reg.unload(g, &mut out).unwrap();
        assert!(reg.is_empty());
        assert!(!group.is_moving());
        assert!(group.members().iter().all(|m| m.unloaded && m.group().is_none()));
        assert_eq!(out[0], TrackEvent::GroupUnloaded { group: g });
    }

    #[test]
    fn disband_kills_members() {
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[4.0, 2.5], &mut out);
        let members = reg.disband(g, &mut out).unwrap();
        assert!(members.iter().all(|m| m.dead));
        assert_eq!(
            reg.disband(g, &mut out),
            Err(RegistryError::UnknownGroup(g))
        );
    }

    #[test]
    fn member_lookup_prefers_heading_into_cell() {
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        // both in cell (2, 0, 0) heading east; the one west of centre heads in
        let a = rideable(&mut reg, 2.8);
        let b = rideable(&mut reg, 2.2);
        reg.create_group(vec![a], &mut out);
        reg.create_group(vec![b], &mut out);
        assert_eq!(reg.member_at(BlockPos::new(2, 0, 0)).unwrap().id(), MemberId(1));
        assert!(reg.member_at(BlockPos::new(9, 0, 0)).is_none());

        let near = reg
            .member_near(Vec3::new(2.5, 0.0625, 0.5), None, MEMBER_SEARCH_RADIUS)
            .unwrap();
        assert_eq!(near.id(), MemberId(1));
        let filtered = reg.member_near(
            Vec3::new(2.5, 0.0625, 0.5),
            reg.group_of(MemberId(0)),
            MEMBER_SEARCH_RADIUS,
        );
        assert_eq!(filtered.unwrap().id(), MemberId(0));
    }

    #[test]
    fn remove_invalid_dissolves_unpowered_trains() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[4.0, 2.5], &mut out);
        reg.get_mut(g).unwrap().properties_mut(&cfg).requires_powered_vehicle = true;
        assert_eq!(reg.remove_invalid(&mut out), 1);
        assert_eq!(reg.len(), 2);
        assert!(reg.get(g).is_none());
    }

    #[test]
    fn commands_validate_arguments() {
        let cfg = PhysicsConfig::default();
        let mut reg = GroupRegistry::new();
        let mut out = Vec::new();
        let g = train(&mut reg, &[4.0, 2.5], &mut out);
        assert_eq!(
            reg.apply_command(
                &CommandPayload::SetSpeedLimit {
                    group: g,
                    limit: f64::NAN
                },
                &cfg,
                &mut out
            ),
            Err(CommandError::InvalidArgument { field: "limit" })
        );
        assert_eq!(
            reg.apply_command(&CommandPayload::Split { group: g, at: 5 }, &cfg, &mut out),
            Err(CommandError::Rejected(RegistryError::InvalidSplit {
                group: g,
                at: 5,
                len: 2
            }))
        );
        reg.apply_command(
            &CommandPayload::SetSpeedLimit { group: g, limit: 0.9 },
            &cfg,
            &mut out,
        )
        .unwrap();
        assert_eq!(reg.get(g).unwrap().speed_limit(&cfg), 0.9);
        reg.apply_command(
            &CommandPayload::Launch {
                group: g,
                distance: 10.0,
                velocity: 0.3,
            },
            &cfg,
            &mut out,
        )
        .unwrap();
        assert!(matches!(
            reg.get(g).unwrap().actions().front(),
            Some(Action::Launch(l)) if l.member() == MemberId(0)
        ));
        assert_eq!(
            reg.apply_command(&CommandPayload::Stop { group: GroupId(42) }, &cfg, &mut out),
            Err(CommandError::Rejected(RegistryError::UnknownGroup(GroupId(42))))
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn split_is_order_preserving(len in 2usize..8, cut in 1usize..8) {
                prop_assume!(cut < len);
                let cfg = PhysicsConfig::default();
                let mut reg = GroupRegistry::new();
                let mut out = Vec::new();
                let xs: Vec<f64> = (0..len).rev().map(|i| 2.5 + 1.5 * i as f64).collect();
                let g = train(&mut reg, &xs, &mut out);
                let before = ids(&reg, g);
                let new = reg.split(g, cut, &cfg, &mut out).unwrap().unwrap();
                let mut after = ids(&reg, g);
                after.extend(ids(&reg, new));
                prop_assert_eq!(after, before);
            }
        }
    }
}
