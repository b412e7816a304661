//! Integration test: signal and detector events from moving trains.
//!
//! A train rolls past a signal device and through a detector region on a
//! straight track; every enter is matched by exactly one leave, member
//! events come before group events, and removing a train releases what it
//! occupied.

use trackway_core::{
    BlockPos, Command, CommandPayload, DetectorAction, Face, GroupId, RailNetwork, RegionId,
    SignalAction, TrackEvent,
};
use trackway_engine::{Environment, PhysicsConfig, TrainEngine, VehicleType};
use trackway_rails::RailGrid;
use trackway_test_utils::{
    straight_track, MockPowerGrid, RecordingSink, ScriptedDetectors, StaticSignals,
};

const SIGNAL: BlockPos = BlockPos::new(6, 0, 1);
const SIGNAL_RAIL: BlockPos = BlockPos::new(6, 0, 0);

struct World {
    grid: RailGrid,
    signals: StaticSignals,
    detectors: ScriptedDetectors,
    power: MockPowerGrid,
    sink: RecordingSink,
    engine: TrainEngine,
}

impl World {
    fn new() -> Self {
        let mut signals = StaticSignals::new();
        signals.add(SIGNAL_RAIL, SIGNAL);
        Self {
            grid: straight_track(32),
            signals,
            detectors: ScriptedDetectors::new(),
            power: MockPowerGrid::new(),
            sink: RecordingSink::new(),
            engine: TrainEngine::new(PhysicsConfig::default()).unwrap(),
        }
    }

    fn spawn(&mut self, x: i32, vehicles: &[VehicleType]) -> GroupId {
        let cell = self.grid.cell_at(BlockPos::new(x, 0, 0)).unwrap();
        self.engine
            .spawn_train(&self.grid, cell, Face::East, vehicles, &mut self.sink)
            .unwrap()
    }

    fn submit(&mut self, payload: CommandPayload) {
        self.engine.submit(vec![Command::new(payload)]);
    }

    fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            let mut env = Environment {
                network: &self.grid,
                signals: &self.signals,
                detectors: &mut self.detectors,
                power: &self.power,
                sink: &mut self.sink,
            };
            self.engine.execute_tick(&mut env);
        }
    }

    fn position_of(&self, pred: impl Fn(&TrackEvent) -> bool) -> Option<usize> {
        self.sink.events().iter().position(pred)
    }
}

#[test]
fn passing_train_enters_and_leaves_signal_once() {
    let mut world = World::new();
    let g = world.spawn(2, &[VehicleType::Rideable]);
    world.submit(CommandPayload::SetForwardForce { group: g, force: 0.3 });
    world.run(30);

    let sink = &world.sink;
    assert_eq!(sink.count_signal(SIGNAL, SignalAction::MemberEnter), 1);
    assert_eq!(sink.count_signal(SIGNAL, SignalAction::MemberLeave), 1);
    assert_eq!(sink.count_signal(SIGNAL, SignalAction::GroupEnter), 1);
    assert_eq!(sink.count_signal(SIGNAL, SignalAction::GroupLeave), 1);

    let member_enter = world
        .position_of(|e| e.signal_action() == Some(SignalAction::MemberEnter))
        .unwrap();
    let group_enter = world
        .position_of(|e| e.signal_action() == Some(SignalAction::GroupEnter))
        .unwrap();
    let member_leave = world
        .position_of(|e| e.signal_action() == Some(SignalAction::MemberLeave))
        .unwrap();
    assert!(member_enter < group_enter);
    assert!(group_enter < member_leave);
}

#[test]
fn standing_train_gets_update_events() {
    let mut world = World::new();
    world.spawn(6, &[VehicleType::Rideable]);
    world.run(3);
    assert_eq!(world.sink.count_signal(SIGNAL, SignalAction::MemberEnter), 1);
    assert_eq!(world.sink.count_signal(SIGNAL, SignalAction::GroupEnter), 1);
    assert!(world.sink.count_signal(SIGNAL, SignalAction::GroupUpdate) >= 2);
    assert_eq!(world.sink.count_signal(SIGNAL, SignalAction::MemberLeave), 0);
}

#[test]
fn disbanded_train_releases_signal() {
    let mut world = World::new();
    let g = world.spawn(6, &[VehicleType::Rideable]);
    world.run(1);
    world.submit(CommandPayload::Disband { group: g });
    world.run(1);
    assert_eq!(world.sink.count_signal(SIGNAL, SignalAction::MemberLeave), 1);
    assert_eq!(world.sink.count_signal(SIGNAL, SignalAction::GroupLeave), 1);
    assert!(world.engine.registry().is_empty());
}

#[test]
fn long_train_occupies_every_spanned_cell() {
    let mut world = World::new();
    let g = world.spawn(
        1,
        &[VehicleType::Rideable, VehicleType::Rideable, VehicleType::Rideable],
    );
    world.run(1);
    // members at x = 4.5, 3.0 and 1.5
    let tracker = world.engine.registry().get(g).unwrap().tracker();
    for x in 1..=4 {
        assert!(
            tracker.owner_of(BlockPos::new(x, 0, 0)).is_some(),
            "cell {x} unowned"
        );
    }
    assert_eq!(tracker.block_space().len(), 4);
}

#[test]
fn detector_region_enter_and_leave() {
    let mut world = World::new();
    world
        .detectors
        .add_region(RegionId(9), BlockPos::new(10, 0, 0), BlockPos::new(12, 0, 0));
    let g = world.spawn(2, &[VehicleType::Rideable]);
    world.submit(CommandPayload::SetForwardForce { group: g, force: 0.4 });
    world.run(40);

    let count = |action: DetectorAction| {
        world
            .sink
            .events()
            .iter()
            .filter(|e| {
                matches!(e, TrackEvent::Detector { region, action: a, .. }
                    if *region == RegionId(9) && *a == action)
            })
            .count()
    };
    assert_eq!(count(DetectorAction::Enter), 1);
    assert_eq!(count(DetectorAction::Leave), 1);
    assert!(!world.detectors.moves().is_empty());
}
