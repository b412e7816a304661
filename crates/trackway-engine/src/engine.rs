//! The tick driver.
//!
//! [`TrainEngine`] owns every piece of process-wide state: the group
//! registry, the power tracker, the command queue and the physics
//! configuration. The world is lent to it for the duration of a tick
//! through an [`Environment`].
//!
//! # Tick order
//!
//! 1. Power notifications queued since the last tick are processed.
//! 2. Queued commands are drained and applied in arrival order.
//! 3. Per-tick housekeeping runs and invalid groups are dissolved.
//! 4. Every group is stepped, in registry order. Each step is isolated:
//!    a panic or a non-finite member is logged, the group stays registered
//!    for the next tick, and the others still step. A group left with a
//!    non-finite member is halted and its broken members re-seated.
//!
//! Events produced while a group steps are dispatched to the sink once
//! that step is over.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{error, info, warn};
use trackway_core::{
    BlockPos, ChunkPos, Command, DetectorService, EventSink, Face, GroupId, PowerGrid,
    RailCell, RailNetwork, Receipt, RegistryError, ScanError, SignalLayout, StepError, TickId,
    TrackEvent,
};

use crate::commands::CommandQueue;
use crate::config::{ConfigError, PhysicsConfig};
use crate::group::{StepContext, SubstepOutcome};
use crate::member::VehicleType;
use crate::metrics::TickMetrics;
use crate::power::PowerTracker;
use crate::registry::GroupRegistry;

/// The world, borrowed for one tick.
pub struct Environment<'a> {
    /// Rail geometry.
    pub network: &'a dyn RailNetwork,
    /// Signal placement.
    pub signals: &'a dyn SignalLayout,
    /// Detector regions.
    pub detectors: &'a mut dyn DetectorService,
    /// Redstone state.
    pub power: &'a dyn PowerGrid,
    /// Where events go.
    pub sink: &'a mut dyn EventSink,
}

/// Output of [`TrainEngine::execute_tick`].
#[derive(Debug)]
pub struct TickResult {
    /// One receipt per drained command, expired ones first.
    pub receipts: Vec<Receipt>,
    /// Timing and counters for the tick.
    pub metrics: TickMetrics,
}

/// Owns the trains and drives them one tick at a time.
pub struct TrainEngine {
    config: PhysicsConfig,
    registry: GroupRegistry,
    power: PowerTracker,
    commands: CommandQueue,
    current_tick: TickId,
    outbox: Vec<TrackEvent>,
    last_metrics: TickMetrics,
}

impl TrainEngine {
    /// Create an engine with validated configuration.
    pub fn new(config: PhysicsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            cart_distance = config.cart_distance,
            substep_threshold = config.substep_threshold,
            max_command_queue = config.max_command_queue,
            "train engine created"
        );
        Ok(Self {
            commands: CommandQueue::new(config.max_command_queue),
            config,
            registry: GroupRegistry::new(),
            power: PowerTracker::new(),
            current_tick: TickId(0),
            outbox: Vec::new(),
            last_metrics: TickMetrics::default(),
        })
    }

    /// Physics configuration.
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// The live trains.
    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// The live trains, mutably.
    ///
    /// Events from structural changes made here are the caller's to
    /// deliver; prefer [`submit`](Self::submit) while a tick loop runs.
    pub fn registry_mut(&mut self) -> &mut GroupRegistry {
        &mut self.registry
    }

    /// Cached signal power.
    pub fn power(&self) -> &PowerTracker {
        &self.power
    }

    /// Last completed tick.
    pub fn current_tick(&self) -> TickId {
        self.current_tick
    }

    /// Metrics from the last tick.
    pub fn last_metrics(&self) -> &TickMetrics {
        &self.last_metrics
    }

    /// Commands waiting for the next tick.
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    // ── world setup ────────────────────────────────────────────

    /// Scan every loaded chunk for signals. Slow; call once at startup.
    pub fn seed_power(&mut self, grid: &dyn PowerGrid) -> usize {
        self.power.seed(grid)
    }

    /// Scan a chunk that just loaded.
    pub fn on_chunk_load(
        &mut self,
        grid: &dyn PowerGrid,
        chunk: ChunkPos,
    ) -> Result<usize, ScanError> {
        self.power.on_chunk_load(grid, chunk)
    }

    /// Forget signals in a chunk that unloaded.
    pub fn on_chunk_unload(&mut self, chunk: ChunkPos) {
        self.power.on_chunk_unload(chunk);
    }

    /// Place a new train and announce it.
    pub fn spawn_train(
        &mut self,
        network: &dyn RailNetwork,
        start: RailCell,
        direction: Face,
        vehicles: &[VehicleType],
        sink: &mut dyn EventSink,
    ) -> Result<GroupId, RegistryError> {
        let id = self.registry.spawn_train(
            network,
            start,
            direction,
            vehicles,
            &self.config,
            &mut self.outbox,
        )?;
        self.flush(sink);
        Ok(id)
    }

    // ── notifications ──────────────────────────────────────────

    /// Queue commands for the next tick.
    pub fn submit(&mut self, commands: Vec<Command>) -> Vec<Receipt> {
        self.commands.submit(commands)
    }

    /// A block changed; re-examine it next tick.
    pub fn notify_block_physics(&mut self, pos: BlockPos) {
        self.power.notify_physics(pos);
    }

    /// The world reports a power change at `pos`.
    pub fn notify_power_change(
        &mut self,
        grid: &dyn PowerGrid,
        pos: BlockPos,
        powered: bool,
        sink: &mut dyn EventSink,
    ) {
        self.power
            .notify_power_change(grid, pos, powered, &mut self.outbox);
        self.flush(sink);
    }

    /// A signal was broken; forget it everywhere.
    pub fn remove_signal(&mut self, signal: BlockPos) {
        self.power.remove_signal(signal);
        for group in self.registry.iter_mut() {
            group.tracker_mut().remove_signal(signal);
        }
    }

    fn flush(&mut self, sink: &mut dyn EventSink) -> u32 {
        let count = self.outbox.len() as u32;
        for event in self.outbox.drain(..) {
            sink.dispatch(event);
        }
        count
    }

    // ── tick ───────────────────────────────────────────────────

    /// Run one tick.
    pub fn execute_tick(&mut self, env: &mut Environment<'_>) -> TickResult {
        let tick_start = Instant::now();
        let tick = self.current_tick.next();
        let mut metrics = TickMetrics::default();

        // 1. Power.
        let power_start = Instant::now();
        self.power.process_tick(env.power, &mut self.outbox);
        metrics.events_dispatched += self.flush(&mut *env.sink);
        metrics.power_us = power_start.elapsed().as_micros() as u64;

        // 2. Commands.
        let cmd_start = Instant::now();
        let drain = self.commands.drain(tick);
        let mut receipts = drain.expired_receipts;
        metrics.commands_rejected += receipts.len() as u32;
        for dc in drain.commands {
            let payload = &dc.command.payload;
            match self
                .registry
                .apply_command(payload, &self.config, &mut self.outbox)
            {
                Ok(()) => {
                    metrics.commands_applied += 1;
                    receipts.push(Receipt {
                        accepted: true,
                        applied_tick_id: Some(tick),
                        reason_code: None,
                        command_index: dc.command_index,
                    });
                }
                Err(e) => {
                    warn!(
                        group = %payload.group(),
                        seq = dc.command.arrival_seq,
                        error = %e,
                        "command rejected"
                    );
                    metrics.commands_rejected += 1;
                    receipts.push(Receipt::rejected(dc.command_index, e));
                }
            }
        }
        metrics.events_dispatched += self.flush(&mut *env.sink);
        metrics.command_processing_us = cmd_start.elapsed().as_micros() as u64;

        // 3. Housekeeping.
        let groups_start = Instant::now();
        self.registry.remove_invalid(&mut self.outbox);
        for group in self.registry.iter_mut() {
            group.tick_housekeeping();
            group.request_update();
        }

        // 4. Step every group that still exists.
        for id in self.registry.ids() {
            let Some(group) = self.registry.get_mut(id) else {
                continue;
            };
            let mut ctx = StepContext {
                network: env.network,
                signals: env.signals,
                detectors: &mut *env.detectors,
                config: &self.config,
                tick,
                outbox: &mut self.outbox,
            };
            let result = panic::catch_unwind(AssertUnwindSafe(|| group.step(&mut ctx)));
            metrics.groups_stepped += 1;
            metrics.substeps += group.substeps();

            let fault = match &result {
                Err(payload) => Some(StepError::Panicked {
                    reason: panic_reason(payload.as_ref()),
                }),
                Ok(_) => group
                    .members()
                    .iter()
                    .find(|m| !m.is_finite())
                    .map(|m| StepError::NonFiniteState { member: m.id() }),
            };
            // A faulted group stays registered and is stepped again next tick.
            if let Some(e) = fault {
                error!(
                    group = %id,
                    name = %group.name(),
                    location = ?group.head_location(),
                    error = %e,
                    "group step faulted"
                );
                metrics.faults += 1;
                if group.members().iter().any(|m| !m.is_finite()) {
                    warn!(group = %id, "non-finite member state, train halted and re-seated");
                    group.reset_non_finite();
                }
            } else if let Ok(outcome) = result {
                self.finish_step(id, outcome, &mut metrics);
            }
            metrics.events_dispatched += self.flush(&mut *env.sink);
        }
        metrics.groups_us = groups_start.elapsed().as_micros() as u64;

        self.current_tick = tick;
        metrics.total_us = tick_start.elapsed().as_micros() as u64;
        self.last_metrics = metrics.clone();
        TickResult { receipts, metrics }
    }

    fn finish_step(&mut self, id: GroupId, outcome: SubstepOutcome, metrics: &mut TickMetrics) {
        match outcome {
            SubstepOutcome::Completed | SubstepOutcome::Broken => {}
            SubstepOutcome::Empty => {
                self.registry.remove_group(id, &mut self.outbox);
            }
            SubstepOutcome::MemberMissing => {
                self.registry
                    .remove_dead_members(id, &self.config, &mut self.outbox);
            }
            SubstepOutcome::Split { at, ignore_ticks } => {
                match self.registry.split_apart(
                    id,
                    at,
                    ignore_ticks,
                    &self.config,
                    &mut self.outbox,
                ) {
                    Ok(_) => metrics.splits += 1,
                    Err(e) => warn!(group = %id, at, error = %e, "split failed"),
                }
            }
        }
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
