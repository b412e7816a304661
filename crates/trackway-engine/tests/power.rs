//! Integration test: power tracking through the engine.
//!
//! Seeds the cache, streams events over a channel sink, and follows
//! chunks as they load and unload.

use trackway_core::{BlockPos, ChunkPos, SignalAction, TrackEvent};
use trackway_engine::{ChannelSink, Environment, PhysicsConfig, TrainEngine};
use trackway_test_utils::{straight_track, MockPowerGrid, NoDetectors, StaticSignals};

const LAMP: BlockPos = BlockPos::new(3, 64, 3);
const FAR_LAMP: BlockPos = BlockPos::new(40, 64, 40);

fn engine() -> TrainEngine {
    TrainEngine::new(PhysicsConfig::default()).unwrap()
}

#[test]
fn seeded_cache_follows_chunk_lifecycle() {
    let mut grid = MockPowerGrid::new();
    grid.add_signal(LAMP);
    grid.set_powered(LAMP, true);
    grid.add_signal(FAR_LAMP);
    grid.set_powered(FAR_LAMP, true);

    let mut engine = engine();
    assert_eq!(engine.seed_power(&grid), 2);
    assert_eq!(engine.power().powered_count(), 2);

    let far_chunk = FAR_LAMP.chunk();
    engine.on_chunk_unload(far_chunk);
    assert!(!engine.power().is_powered(FAR_LAMP));
    assert!(engine.power().is_powered(LAMP));

    assert_eq!(engine.on_chunk_load(&grid, far_chunk), Ok(1));
    assert!(engine.power().is_powered(FAR_LAMP));

    let broken = ChunkPos { x: -7, z: 2 };
    grid.fail_chunk(broken);
    let err = engine.on_chunk_load(&grid, broken).unwrap_err();
    assert_eq!(err.chunk, broken);
}

#[test]
fn tick_delivers_power_events_over_channel() {
    let track = straight_track(4);
    let signals = StaticSignals::new();
    let mut detectors = NoDetectors;
    let mut grid = MockPowerGrid::new();
    grid.add_signal(LAMP);

    let mut engine = engine();
    engine.seed_power(&grid);
    let (mut sink, rx) = ChannelSink::unbounded();

    grid.set_powered(LAMP, true);
    engine.notify_block_physics(LAMP);
    let result = {
        let mut env = Environment {
            network: &track,
            signals: &signals,
            detectors: &mut detectors,
            power: &grid,
            sink: &mut sink,
        };
        engine.execute_tick(&mut env)
    };

    let events: Vec<TrackEvent> = rx.try_iter().collect();
    assert_eq!(
        events,
        vec![
            TrackEvent::redstone(LAMP, SignalAction::RedstoneOn),
            TrackEvent::redstone(LAMP, SignalAction::RedstoneChange),
        ]
    );
    assert_eq!(result.metrics.events_dispatched, 2);
    assert_eq!(sink.dropped(), 0);
}

#[test]
fn removed_signal_is_forgotten() {
    let mut grid = MockPowerGrid::new();
    grid.add_signal(LAMP);
    grid.set_powered(LAMP, true);
    let mut engine = engine();
    engine.seed_power(&grid);
    engine.remove_signal(LAMP);
    assert!(!engine.power().is_powered(LAMP));
    assert_eq!(engine.power().powered_count(), 0);
}
