//! Queued train behaviors.
//!
//! A group runs the action at the front of its queue once per sub-step;
//! [`Action::update`] returns `true` when the action is finished and
//! should be dropped. Waits are measured in ticks, so running several
//! sub-steps in one tick never shortens them.

use std::fmt;
use std::time::Duration;

use trackway_core::{EffectKind, MemberId, TickId, TrackEvent};

use crate::group::{Group, StepContext};

/// Below this speed a launch counts as stalled.
const STALL_FORCE: f64 = 0.004;

/// Slowest speed a launch ever commands.
const MIN_LAUNCH_VELOCITY: f64 = 0.02;

/// Distance before the target at which a launch snaps to its final speed.
const LAUNCH_FINISH_MARGIN: f64 = 0.2;

/// Distance before the target from which a braking launch starts to slow.
const BRAKE_DISTANCE: f64 = 5.0;

/// Predicate polled by [`Action::WaitState`].
pub type StateCheck = Box<dyn FnMut(&Group) -> bool + Send>;

// ── Launch ─────────────────────────────────────────────────────────

/// Accelerate (or brake) a train so it reaches `target_velocity` after
/// covering `target_distance`, measured at one member.
#[derive(Clone, Debug, PartialEq)]
pub struct Launch {
    member: MemberId,
    distance: f64,
    target_distance: f64,
    target_velocity: f64,
    start_velocity: Option<f64>,
}

impl Launch {
    /// A launch measured at `member`.
    pub fn new(member: MemberId, target_distance: f64, target_velocity: f64) -> Self {
        Self {
            member,
            distance: 0.0,
            target_distance,
            target_velocity,
            start_velocity: None,
        }
    }

    /// Member the distance is measured at.
    pub fn member(&self) -> MemberId {
        self.member
    }

    /// Distance covered so far.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    fn update(&mut self, group: &mut Group) -> bool {
        let Some(member) = group.member(self.member) else {
            return true;
        };
        if member.is_derailed() && !member.is_moving_vertical_only() {
            return true;
        }
        let max_speed = member.max_speed();
        let moved = member.moved_distance();
        let start = *self
            .start_velocity
            .get_or_insert_with(|| member.force().min(max_speed).max(MIN_LAUNCH_VELOCITY));

        if self.distance != 0.0
            && group
                .members()
                .iter()
                .any(|m| m.force() * m.force() < STALL_FORCE * STALL_FORCE)
        {
            return true;
        }

        // Velocities inside a sub-step are scaled down by the sub-step count.
        let scale = 1.0 / f64::from(group.substeps().max(1));
        self.distance += moved;
        if self.distance > self.target_distance - LAUNCH_FINISH_MARGIN {
            group.set_forward_force(self.target_velocity * scale);
            return true;
        }

        let target = (self.target_velocity * scale).clamp(-max_speed, max_speed);
        let remaining = self.target_distance - self.distance;
        let velocity = if target > 0.0 || remaining < BRAKE_DISTANCE {
            let t = (self.distance / self.target_distance).clamp(0.0, 1.0);
            start + (target - start) * t
        } else {
            start
        };
        group.set_forward_force(velocity.max(MIN_LAUNCH_VELOCITY * scale));
        false
    }
}

// ── Action ─────────────────────────────────────────────────────────

/// One queued behavior.
pub enum Action {
    /// Wait a number of ticks, counted from the first update.
    WaitTicks {
        /// Ticks to wait.
        ticks: u64,
        /// Deadline, fixed at the first update.
        until: Option<TickId>,
    },
    /// Wait until a tick is reached.
    WaitUntilTick(TickId),
    /// Never finishes; holds the queue until cleared.
    WaitForever,
    /// Wait until the predicate holds for the group.
    WaitState(StateCheck),
    /// Drive the train toward a speed over a distance.
    Launch(Launch),
    /// Play a sizzle effect on powered members at a fixed interval.
    Sizzle {
        /// Ticks between effects.
        interval: u32,
        /// Ticks left to run.
        remaining: u32,
        /// Ticks since the last effect.
        counter: u32,
        /// Last tick the action was counted in.
        last_tick: Option<TickId>,
    },
    /// Refuel every powered member.
    Refill,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitTicks { ticks, until } => f
                .debug_struct("WaitTicks")
                .field("ticks", ticks)
                .field("until", until)
                .finish(),
            Self::WaitUntilTick(tick) => f.debug_tuple("WaitUntilTick").field(tick).finish(),
            Self::WaitForever => f.write_str("WaitForever"),
            Self::WaitState(_) => f.write_str("WaitState(..)"),
            Self::Launch(launch) => f.debug_tuple("Launch").field(launch).finish(),
            Self::Sizzle {
                interval,
                remaining,
                ..
            } => f
                .debug_struct("Sizzle")
                .field("interval", interval)
                .field("remaining", remaining)
                .finish_non_exhaustive(),
            Self::Refill => f.write_str("Refill"),
        }
    }
}

impl Action {
    /// Wait `ticks` ticks.
    pub fn wait_ticks(ticks: u64) -> Self {
        Self::WaitTicks { ticks, until: None }
    }

    /// Wait a wall-clock duration, rounded up to whole ticks.
    pub fn wait_duration(duration: Duration, tick_interval: Duration) -> Self {
        let ticks = duration.as_nanos().div_ceil(tick_interval.as_nanos().max(1));
        Self::wait_ticks(u64::try_from(ticks).unwrap_or(u64::MAX))
    }

    /// Wait until `check` returns `true`.
    pub fn wait_state<F>(check: F) -> Self
    where
        F: FnMut(&Group) -> bool + Send + 'static,
    {
        Self::WaitState(Box::new(check))
    }

    /// Launch measured at `member`.
    pub fn launch(member: MemberId, distance: f64, velocity: f64) -> Self {
        Self::Launch(Launch::new(member, distance, velocity))
    }

    /// Sizzle every `interval` ticks for `duration` ticks.
    pub fn sizzle(interval: u32, duration: u32) -> Self {
        Self::Sizzle {
            interval: interval.max(1),
            remaining: duration,
            counter: 0,
            last_tick: None,
        }
    }

    /// Whether this action drives the train itself, so the group must not
    /// share force between members while it runs.
    pub fn is_movement_suppressed(&self) -> bool {
        matches!(self, Self::Launch(_))
    }

    /// Member this action is bound to, if any.
    pub fn member(&self) -> Option<MemberId> {
        match self {
            Self::Launch(launch) => Some(launch.member),
            _ => None,
        }
    }

    /// Advance the action by one sub-step. Returns `true` when finished.
    pub fn update(&mut self, group: &mut Group, ctx: &mut StepContext<'_>) -> bool {
        match self {
            Self::WaitTicks { ticks, until } => {
                let deadline = *until.get_or_insert(TickId(ctx.tick.0.saturating_add(*ticks)));
                ctx.tick >= deadline
            }
            Self::WaitUntilTick(tick) => ctx.tick >= *tick,
            Self::WaitForever => false,
            Self::WaitState(check) => check(group),
            Self::Launch(launch) => launch.update(group),
            Self::Sizzle {
                interval,
                remaining,
                counter,
                last_tick,
            } => {
                if *last_tick != Some(ctx.tick) {
                    *last_tick = Some(ctx.tick);
                    *remaining = remaining.saturating_sub(1);
                    *counter += 1;
                    if *counter >= *interval {
                        *counter = 0;
                        for m in group.members().iter().filter(|m| m.is_powered()) {
                            ctx.outbox.push(TrackEvent::Effect {
                                group: group.id(),
                                member: m.id(),
                                effect: EffectKind::Sizzle,
                            });
                        }
                    }
                }
                *remaining == 0
            }
            Self::Refill => {
                let max_fuel = ctx.config.max_fuel;
                for m in group.members_mut() {
                    m.refill(max_fuel);
                }
                true
            }
        }
    }
}
