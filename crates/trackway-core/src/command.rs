//! Train commands and their receipts.

use crate::error::CommandError;
use crate::id::{GroupId, TickId};

/// A request to change a train, queued and applied at the next tick start.
///
/// # Examples
///
/// ```
/// use trackway_core::{Command, CommandPayload, GroupId, TickId};
///
/// let cmd = Command::new(CommandPayload::Launch {
///     group: GroupId(1),
///     distance: 8.0,
///     velocity: 0.4,
/// })
/// .expires_after(TickId(40));
///
/// assert_eq!(cmd.expires_after_tick, TickId(40));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    /// The operation to perform.
    pub payload: CommandPayload,
    /// The command is dropped if not applied by this tick.
    pub expires_after_tick: TickId,
    /// Monotonic arrival sequence number, set by the queue. Drained
    /// commands are applied in this order.
    pub arrival_seq: u64,
}

impl Command {
    /// A command that never expires.
    pub fn new(payload: CommandPayload) -> Self {
        Self {
            payload,
            expires_after_tick: TickId(u64::MAX),
            arrival_seq: 0,
        }
    }

    /// Set the expiry tick.
    pub fn expires_after(mut self, tick: TickId) -> Self {
        self.expires_after_tick = tick;
        self
    }
}

/// All command payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandPayload {
    /// Set the train's forward speed.
    SetForwardForce {
        /// Target group.
        group: GroupId,
        /// Signed speed in blocks per tick.
        force: f64,
    },
    /// Halt every member.
    Stop {
        /// Target group.
        group: GroupId,
    },
    /// Accelerate the head member over a distance.
    Launch {
        /// Target group.
        group: GroupId,
        /// Distance to cover, in blocks.
        distance: f64,
        /// Speed at the end of the launch.
        velocity: f64,
    },
    /// Queue a wait of a number of ticks.
    Wait {
        /// Target group.
        group: GroupId,
        /// Ticks to wait.
        ticks: u32,
    },
    /// Change the per-train speed limit.
    SetSpeedLimit {
        /// Target group.
        group: GroupId,
        /// New limit in blocks per tick.
        limit: f64,
    },
    /// Refuel every powered member.
    Refill {
        /// Target group.
        group: GroupId,
    },
    /// Split the train before member `at`.
    Split {
        /// Target group.
        group: GroupId,
        /// Index of the first member of the new train.
        at: usize,
    },
    /// Couple `back` behind `front`.
    Link {
        /// Train that keeps its id.
        front: GroupId,
        /// Train merged into `front`.
        back: GroupId,
    },
    /// Destroy the train and all its members.
    Disband {
        /// Target group.
        group: GroupId,
    },
}

impl CommandPayload {
    /// The group this command addresses first.
    pub fn group(&self) -> GroupId {
        match self {
            Self::SetForwardForce { group, .. }
            | Self::Stop { group }
            | Self::Launch { group, .. }
            | Self::Wait { group, .. }
            | Self::SetSpeedLimit { group, .. }
            | Self::Refill { group }
            | Self::Split { group, .. }
            | Self::Disband { group } => *group,
            Self::Link { front, .. } => *front,
        }
    }
}

/// Outcome of one submitted command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// Whether the command was accepted (queued or applied).
    pub accepted: bool,
    /// The tick the command was applied in, once applied.
    pub applied_tick_id: Option<TickId>,
    /// Why the command was rejected or dropped.
    pub reason_code: Option<CommandError>,
    /// Index of the command within its submitted batch.
    pub command_index: usize,
}

impl Receipt {
    /// An accepted receipt.
    pub fn accepted(command_index: usize) -> Self {
        Self {
            accepted: true,
            applied_tick_id: None,
            reason_code: None,
            command_index,
        }
    }

    /// A rejected receipt.
    pub fn rejected(command_index: usize, reason: CommandError) -> Self {
        Self {
            accepted: false,
            applied_tick_id: None,
            reason_code: Some(reason),
            command_index,
        }
    }
}
