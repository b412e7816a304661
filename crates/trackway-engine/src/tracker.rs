//! Occupancy and signal tracking for one group.
//!
//! The tracker maps every rail cell a train spans to exactly one member,
//! collects the signal devices next to those cells, and diffs them against
//! the previous refresh to fire enter and leave events once per
//! transition. Detector regions are collected per member and unioned for
//! the group.
//!
//! Two flags gate the work: `needs_position_update` rebuilds the occupancy
//! map, and `needs_update` fires the periodic "still active" events.

use indexmap::{IndexMap, IndexSet};
use trackway_core::{
    BlockPos, DetectorAction, GroupId, MemberId, RegionId, SignalAction, TrackEvent,
};

use crate::group::StepContext;
use crate::member::Member;

/// Occupancy map, active signals and active detector regions of a group.
#[derive(Clone, Debug)]
pub struct OccupancyTracker {
    block_space: IndexMap<BlockPos, MemberId>,
    member_signals: IndexMap<MemberId, IndexSet<BlockPos>>,
    active_signals: IndexSet<BlockPos>,
    member_regions: IndexMap<MemberId, IndexSet<RegionId>>,
    active_regions: IndexSet<RegionId>,
    pending_member_updates: IndexSet<MemberId>,
    needs_position_update: bool,
    needs_update: bool,
}

impl Default for OccupancyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OccupancyTracker {
    /// An empty tracker that rebuilds on first refresh.
    pub fn new() -> Self {
        Self {
            block_space: IndexMap::new(),
            member_signals: IndexMap::new(),
            active_signals: IndexSet::new(),
            member_regions: IndexMap::new(),
            active_regions: IndexSet::new(),
            pending_member_updates: IndexSet::new(),
            needs_position_update: true,
            needs_update: false,
        }
    }

    // ── flags ──────────────────────────────────────────────────

    /// Rebuild the occupancy map at the next refresh.
    pub fn mark_position_dirty(&mut self) {
        self.needs_position_update = true;
    }

    /// Whether the occupancy map is stale.
    pub fn needs_position_update(&self) -> bool {
        self.needs_position_update
    }

    /// Fire "still active" events for the group and every member at the
    /// next refresh.
    pub fn request_update(&mut self, members: &[Member]) {
        self.needs_update = true;
        self.pending_member_updates
            .extend(members.iter().map(Member::id));
    }

    /// Fire "still active" events for one member at the next group update.
    pub fn request_member_update(&mut self, member: MemberId) {
        self.pending_member_updates.insert(member);
    }

    // ── queries ────────────────────────────────────────────────

    /// Cell to owning member.
    pub fn block_space(&self) -> &IndexMap<BlockPos, MemberId> {
        &self.block_space
    }

    /// Member owning `cell`, if the train spans it.
    pub fn owner_of(&self, cell: BlockPos) -> Option<MemberId> {
        self.block_space.get(&cell).copied()
    }

    /// Signals currently under the train.
    pub fn active_signals(&self) -> &IndexSet<BlockPos> {
        &self.active_signals
    }

    /// Signals currently under one member.
    pub fn member_signals(&self, member: MemberId) -> Option<&IndexSet<BlockPos>> {
        self.member_signals.get(&member)
    }

    /// Whether `signal` is under the train.
    pub fn is_active(&self, signal: BlockPos) -> bool {
        self.active_signals.contains(&signal)
    }

    /// Detector regions the train is in.
    pub fn active_regions(&self) -> &IndexSet<RegionId> {
        &self.active_regions
    }

    /// Detector regions one member is in.
    pub fn member_regions(&self, member: MemberId) -> Option<&IndexSet<RegionId>> {
        self.member_regions.get(&member)
    }

    // ── mutation ───────────────────────────────────────────────

    /// Drop all tracking state without firing events.
    pub fn clear(&mut self) {
        self.block_space.clear();
        self.member_signals.clear();
        self.active_signals.clear();
        self.member_regions.clear();
        self.active_regions.clear();
        self.pending_member_updates.clear();
        self.needs_position_update = true;
        self.needs_update = false;
    }

    /// Fire leave events for everything active, then clear.
    pub fn release(&mut self, group: GroupId, outbox: &mut Vec<TrackEvent>) {
        for (&member, signals) in &self.member_signals {
            for &signal in signals {
                outbox.push(TrackEvent::member_signal(
                    signal,
                    SignalAction::MemberLeave,
                    member,
                    group,
                ));
            }
        }
        for &signal in &self.active_signals {
            outbox.push(TrackEvent::group_signal(signal, SignalAction::GroupLeave, group));
        }
        for &region in &self.active_regions {
            outbox.push(TrackEvent::group_detector(region, DetectorAction::Leave, group));
        }
        self.clear();
    }

    /// Forget a signal device that was removed from the world.
    ///
    /// No leave events are fired for it.
    pub fn remove_signal(&mut self, signal: BlockPos) {
        self.active_signals.shift_remove(&signal);
        for signals in self.member_signals.values_mut() {
            signals.shift_remove(&signal);
        }
    }

    /// Recompute occupancy, signals and detector regions, pushing events
    /// into `ctx.outbox`.
    ///
    /// Everything but the periodic update events is skipped unless the
    /// position was marked dirty since the last refresh.
    pub fn refresh(&mut self, group: GroupId, members: &[Member], ctx: &mut StepContext<'_>) {
        if members.is_empty() {
            self.clear();
            return;
        }
        if self.needs_position_update {
            self.needs_position_update = false;
            self.rebuild(members);
            self.refresh_signals(group, members, ctx);
            self.refresh_regions(group, members, ctx);
        }
        if self.needs_update {
            self.needs_update = false;
            self.fire_updates(group, members, ctx);
        }
    }

    fn refresh_signals(&mut self, group: GroupId, members: &[Member], ctx: &mut StepContext<'_>) {
        let mut live: IndexMap<MemberId, IndexSet<BlockPos>> =
            members.iter().map(|m| (m.id(), IndexSet::new())).collect();
        for (&cell, owner) in &self.block_space {
            if !ctx.network.is_rail_cell(cell) {
                continue;
            }
            if let Some(signals) = live.get_mut(owner) {
                signals.extend(ctx.signals.signals_for_rail(cell));
            }
        }

        // Members that left the group.
        let departed: Vec<MemberId> = self
            .member_signals
            .keys()
            .filter(|id| !live.contains_key(*id))
            .copied()
            .collect();
        for member in departed {
            if let Some(old) = self.member_signals.shift_remove(&member) {
                for signal in old {
                    ctx.outbox.push(TrackEvent::member_signal(
                        signal,
                        SignalAction::MemberLeave,
                        member,
                        group,
                    ));
                }
            }
            self.member_regions.shift_remove(&member);
            self.pending_member_updates.shift_remove(&member);
        }

        for (&member, now) in &live {
            let before = self.member_signals.entry(member).or_default();
            for &signal in before.iter().filter(|s| !now.contains(*s)) {
                ctx.outbox.push(TrackEvent::member_signal(
                    signal,
                    SignalAction::MemberLeave,
                    member,
                    group,
                ));
            }
            for &signal in now.iter().filter(|s| !before.contains(*s)) {
                ctx.outbox.push(TrackEvent::member_signal(
                    signal,
                    SignalAction::MemberEnter,
                    member,
                    group,
                ));
            }
            before.clone_from(now);
        }

        let union: IndexSet<BlockPos> = live.values().flatten().copied().collect();
        for &signal in self.active_signals.iter().filter(|s| !union.contains(*s)) {
            ctx.outbox
                .push(TrackEvent::group_signal(signal, SignalAction::GroupLeave, group));
        }
        for &signal in union.iter().filter(|s| !self.active_signals.contains(*s)) {
            ctx.outbox
                .push(TrackEvent::group_signal(signal, SignalAction::GroupEnter, group));
        }
        self.active_signals = union;
    }

    // Member-level enter and leave are the detector service's business;
    // the tracker only diffs the union for group events.
    fn refresh_regions(&mut self, group: GroupId, members: &[Member], ctx: &mut StepContext<'_>) {
        let mut union = IndexSet::new();
        for m in members {
            let regions: IndexSet<RegionId> = ctx
                .detectors
                .handle_move(m.id(), m.last_block(), m.block())
                .into_iter()
                .collect();
            union.extend(regions.iter().copied());
            self.member_regions.insert(m.id(), regions);
        }
        for &region in self.active_regions.iter().filter(|r| !union.contains(*r)) {
            ctx.outbox
                .push(TrackEvent::group_detector(region, DetectorAction::Leave, group));
        }
        for &region in union.iter().filter(|r| !self.active_regions.contains(*r)) {
            ctx.outbox
                .push(TrackEvent::group_detector(region, DetectorAction::Enter, group));
        }
        self.active_regions = union;
    }

    fn fire_updates(&mut self, group: GroupId, members: &[Member], ctx: &mut StepContext<'_>) {
        for &signal in &self.active_signals {
            ctx.outbox
                .push(TrackEvent::group_signal(signal, SignalAction::GroupUpdate, group));
        }
        for &region in &self.active_regions {
            ctx.outbox
                .push(TrackEvent::group_detector(region, DetectorAction::Update, group));
        }
        for m in members {
            if !self.pending_member_updates.shift_remove(&m.id()) {
                continue;
            }
            if let Some(signals) = self.member_signals.get(&m.id()) {
                for &signal in signals {
                    ctx.outbox.push(TrackEvent::member_signal(
                        signal,
                        SignalAction::MemberUpdate,
                        m.id(),
                        group,
                    ));
                }
            }
            if let Some(regions) = self.member_regions.get(&m.id()) {
                for &region in regions {
                    ctx.outbox.push(TrackEvent::member_detector(
                        region,
                        DetectorAction::Update,
                        m.id(),
                        group,
                    ));
                }
            }
        }
    }

    fn rebuild(&mut self, members: &[Member]) {
        self.block_space.clear();
        for pair in members.windows(2) {
            let (lead, next) = (&pair[0], &pair[1]);
            self.block_space.insert(lead.block(), lead.id());
            for cell in cells_between(lead.block(), next.block()) {
                self.block_space.insert(cell, lead.id());
            }
        }
        if let Some(tail) = members.last() {
            self.block_space.insert(tail.block(), tail.id());
        }
    }
}

/// Cells on the line from `a` to `b`, excluding both ends.
fn cells_between(a: BlockPos, b: BlockPos) -> Vec<BlockPos> {
    let (dx, dy, dz) = (b.x - a.x, b.y - a.y, b.z - a.z);
    let steps = dx.abs().max(dy.abs()).max(dz.abs());
    if steps <= 1 {
        return Vec::new();
    }
    let lerp = |d: i32, k: i32| (f64::from(d) * f64::from(k) / f64::from(steps)).round() as i32;
    (1..steps)
        .map(|k| a.add(lerp(dx, k), lerp(dy, k), lerp(dz, k)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::member::VehicleType;
    use trackway_core::{Face, TickId, Vec3};
    use trackway_rails::RailGrid;
    use trackway_test_utils::{ScriptedDetectors, StaticSignals};

    fn member(id: u64, block: BlockPos) -> Member {
        Member::new(
            MemberId(id),
            VehicleType::Rideable,
            Vec3::new(
                f64::from(block.x) + 0.5,
                f64::from(block.y) + 0.0625,
                f64::from(block.z) + 0.5,
            ),
            Face::South,
        )
    }

    fn track() -> RailGrid {
        let mut g = RailGrid::new();
        g.lay_straight(BlockPos::new(0, 0, 0), Face::South, 10).unwrap();
        g
    }

    struct World {
        grid: RailGrid,
        signals: StaticSignals,
        detectors: ScriptedDetectors,
        config: PhysicsConfig,
        outbox: Vec<TrackEvent>,
    }

    impl World {
        fn new(signals: StaticSignals) -> Self {
            Self {
                grid: track(),
                signals,
                detectors: ScriptedDetectors::new(),
                config: PhysicsConfig::default(),
                outbox: Vec::new(),
            }
        }

        fn refresh(&mut self, tracker: &mut OccupancyTracker, members: &[Member]) {
            let mut ctx = StepContext {
                network: &self.grid,
                signals: &self.signals,
                detectors: &mut self.detectors,
                config: &self.config,
                tick: TickId(1),
                outbox: &mut self.outbox,
            };
            tracker.refresh(GroupId(1), members, &mut ctx);
        }

        fn actions(&mut self) -> Vec<SignalAction> {
            self.outbox
                .drain(..)
                .filter_map(|e| e.signal_action())
                .collect()
        }
    }

    #[test]
    fn spanned_cells_have_one_owner_each() {
        let members = vec![member(1, BlockPos::new(0, 0, 3)), member(2, BlockPos::new(0, 0, 0))];
        let mut tracker = OccupancyTracker::new();
        let mut world = World::new(StaticSignals::new());
        world.refresh(&mut tracker, &members);
        let space = tracker.block_space();
        assert_eq!(space.len(), 4);
        for z in 0..=3 {
            assert!(tracker.owner_of(BlockPos::new(0, 0, z)).is_some(), "z={z}");
        }
        assert_eq!(tracker.owner_of(BlockPos::new(0, 0, 1)), Some(MemberId(1)));
        assert_eq!(tracker.owner_of(BlockPos::new(0, 0, 0)), Some(MemberId(2)));
    }

    #[test]
    fn enter_fires_once_then_leave_on_departure() {
        let sign = BlockPos::new(1, 0, 2);
        let mut signals = StaticSignals::new();
        signals.add(BlockPos::new(0, 0, 2), sign);
        let mut world = World::new(signals);
        let mut tracker = OccupancyTracker::new();

        let members = vec![member(1, BlockPos::new(0, 0, 2))];
        world.refresh(&mut tracker, &members);
        assert_eq!(
            world.actions(),
            vec![SignalAction::MemberEnter, SignalAction::GroupEnter]
        );
        world.refresh(&mut tracker, &members);
        assert!(world.actions().is_empty());

        let moved = vec![member(1, BlockPos::new(0, 0, 5))];
        tracker.mark_position_dirty();
        world.refresh(&mut tracker, &moved);
        assert_eq!(
            world.actions(),
            vec![SignalAction::MemberLeave, SignalAction::GroupLeave]
        );
        assert!(tracker.active_signals().is_empty());
    }

    #[test]
    fn group_stays_active_while_any_member_covers_signal() {
        let sign = BlockPos::new(1, 0, 1);
        let mut signals = StaticSignals::new();
        signals.add(BlockPos::new(0, 0, 1), sign);
        let mut world = World::new(signals);
        let mut tracker = OccupancyTracker::new();

        let before = vec![member(1, BlockPos::new(0, 0, 1)), member(2, BlockPos::new(0, 0, 0))];
        world.refresh(&mut tracker, &before);
        world.actions();

        // head moves on, second member takes over the cell
        let after = vec![member(1, BlockPos::new(0, 0, 2)), member(2, BlockPos::new(0, 0, 1))];
        tracker.mark_position_dirty();
        world.refresh(&mut tracker, &after);
        let events: Vec<_> = world.outbox.drain(..).collect();
        assert!(events.contains(&TrackEvent::member_signal(
            sign,
            SignalAction::MemberLeave,
            MemberId(1),
            GroupId(1)
        )));
        assert!(events.contains(&TrackEvent::member_signal(
            sign,
            SignalAction::MemberEnter,
            MemberId(2),
            GroupId(1)
        )));
        assert!(!events
            .iter()
            .any(|e| matches!(e.signal_action(), Some(SignalAction::GroupLeave | SignalAction::GroupEnter))));
    }

    #[test]
    fn updates_fire_only_when_requested() {
        let sign = BlockPos::new(1, 0, 0);
        let mut signals = StaticSignals::new();
        signals.add(BlockPos::new(0, 0, 0), sign);
        let mut world = World::new(signals);
        let mut tracker = OccupancyTracker::new();
        let members = vec![member(1, BlockPos::new(0, 0, 0))];
        world.refresh(&mut tracker, &members);
        world.actions();

        tracker.request_update(&members);
        world.refresh(&mut tracker, &members);
        assert_eq!(
            world.actions(),
            vec![SignalAction::GroupUpdate, SignalAction::MemberUpdate]
        );
        world.refresh(&mut tracker, &members);
        assert!(world.actions().is_empty());
    }

    #[test]
    fn removed_signal_disappears_silently() {
        let sign = BlockPos::new(1, 0, 0);
        let mut signals = StaticSignals::new();
        signals.add(BlockPos::new(0, 0, 0), sign);
        let mut world = World::new(signals);
        let mut tracker = OccupancyTracker::new();
        let members = vec![member(1, BlockPos::new(0, 0, 0))];
        world.refresh(&mut tracker, &members);
        world.actions();
        tracker.remove_signal(sign);
        assert!(!tracker.is_active(sign));
        assert!(tracker.member_signals(MemberId(1)).unwrap().is_empty());
    }

    #[test]
    fn release_fires_leaves_and_clears() {
        let sign = BlockPos::new(1, 0, 0);
        let mut signals = StaticSignals::new();
        signals.add(BlockPos::new(0, 0, 0), sign);
        let mut world = World::new(signals);
        let mut tracker = OccupancyTracker::new();
        let members = vec![member(1, BlockPos::new(0, 0, 0))];
        world.refresh(&mut tracker, &members);
        world.actions();
        let mut out = Vec::new();
        tracker.release(GroupId(1), &mut out);
        assert_eq!(out.len(), 2);
        assert!(tracker.block_space().is_empty());
        assert!(tracker.needs_position_update());
    }

    #[test]
    fn detector_regions_enter_and_leave() {
        let mut world = World::new(StaticSignals::new());
        world
            .detectors
            .add_region(RegionId(4), BlockPos::new(0, 0, 0), BlockPos::new(0, 0, 1));
        let mut tracker = OccupancyTracker::new();
        world.refresh(&mut tracker, &[member(1, BlockPos::new(0, 0, 1))]);
        assert_eq!(
            world.outbox.drain(..).collect::<Vec<_>>(),
            vec![TrackEvent::group_detector(
                RegionId(4),
                DetectorAction::Enter,
                GroupId(1)
            )]
        );
        tracker.mark_position_dirty();
        world.refresh(&mut tracker, &[member(1, BlockPos::new(0, 0, 6))]);
        assert!(matches!(
            world.outbox.as_slice(),
            [TrackEvent::Detector {
                action: DetectorAction::Leave,
                ..
            }]
        ));
    }

    #[test]
    fn clean_refresh_skips_signals_and_detectors() {
        let sign = BlockPos::new(1, 0, 0);
        let mut signals = StaticSignals::new();
        signals.add(BlockPos::new(0, 0, 0), sign);
        let mut world = World::new(signals);
        world
            .detectors
            .add_region(RegionId(2), BlockPos::new(0, 0, 0), BlockPos::new(0, 0, 0));
        let mut tracker = OccupancyTracker::new();
        let members = vec![member(1, BlockPos::new(0, 0, 0))];
        for _ in 0..3 {
            world.refresh(&mut tracker, &members);
        }
        assert_eq!(world.detectors.moves().len(), 1);
        assert_eq!(world.outbox.len(), 3);

        tracker.mark_position_dirty();
        world.refresh(&mut tracker, &members);
        assert_eq!(world.detectors.moves().len(), 2);
        assert_eq!(world.outbox.len(), 3);
    }

    #[test]
    fn member_updates_cover_member_regions() {
        let mut world = World::new(StaticSignals::new());
        world
            .detectors
            .add_region(RegionId(7), BlockPos::new(0, 0, 2), BlockPos::new(0, 0, 2));
        let mut tracker = OccupancyTracker::new();
        let members = vec![member(1, BlockPos::new(0, 0, 2)), member(2, BlockPos::new(0, 0, 0))];
        world.refresh(&mut tracker, &members);
        world.outbox.clear();
        assert_eq!(
            tracker.member_regions(MemberId(1)).map(|r| r.len()),
            Some(1)
        );
        assert!(tracker.member_regions(MemberId(2)).unwrap().is_empty());
        assert!(tracker.active_regions().contains(&RegionId(7)));

        tracker.request_update(&members);
        world.refresh(&mut tracker, &members);
        assert_eq!(
            world.outbox,
            vec![
                TrackEvent::group_detector(RegionId(7), DetectorAction::Update, GroupId(1)),
                TrackEvent::member_detector(
                    RegionId(7),
                    DetectorAction::Update,
                    MemberId(1),
                    GroupId(1)
                ),
            ]
        );
    }

    #[test]
    fn empty_group_clears_state() {
        let mut tracker = OccupancyTracker::new();
        let mut world = World::new(StaticSignals::new());
        world.refresh(&mut tracker, &[member(1, BlockPos::new(0, 0, 0))]);
        world.refresh(&mut tracker, &[]);
        assert!(tracker.block_space().is_empty());
        assert!(world.outbox.is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_spanned_cell_is_owned(gaps in prop::collection::vec(1i32..4, 1..6)) {
                let mut z = 0;
                let mut blocks = vec![BlockPos::new(0, 0, 0)];
                for gap in &gaps {
                    z += gap;
                    blocks.push(BlockPos::new(0, 0, z));
                }
                blocks.reverse();
                let members: Vec<_> = blocks
                    .iter()
                    .enumerate()
                    .map(|(i, &b)| member(i as u64, b))
                    .collect();
                let mut tracker = OccupancyTracker::new();
                tracker.rebuild(&members);
                for cell_z in 0..=z {
                    prop_assert!(tracker.owner_of(BlockPos::new(0, 0, cell_z)).is_some());
                }
                prop_assert_eq!(tracker.block_space().len() as i32, z + 1);
            }
        }
    }
}
