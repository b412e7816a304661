//! Error types for the Trackway simulation.
//!
//! Organized by subsystem: group step faults, registry operations,
//! command submission, and world scans. Transient structural conditions
//! during a step (a group vanishing, physics being broken off) are not
//! errors; the engine reports them as step outcomes.

use std::error::Error;
use std::fmt;

use crate::geom::ChunkPos;
use crate::id::{GroupId, MemberId};

/// Unexpected faults inside one group's physics step.
///
/// The tick driver logs these and keeps stepping the other groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepError {
    /// A member's position or velocity became NaN or infinite.
    NonFiniteState {
        /// The offending member.
        member: MemberId,
    },
    /// The step panicked and was caught at the group boundary.
    Panicked {
        /// Panic payload, if it was a string.
        reason: String,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteState { member } => {
                write!(f, "member {member} has a non-finite position or velocity")
            }
            Self::Panicked { reason } => write!(f, "group step panicked: {reason}"),
        }
    }
}

impl Error for StepError {}

/// Errors from group registry operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// No group with this id is registered.
    UnknownGroup(GroupId),
    /// No registered group contains this member.
    UnknownMember(MemberId),
    /// Split index outside `1..len`.
    InvalidSplit {
        /// Group that was asked to split.
        group: GroupId,
        /// Requested index.
        at: usize,
        /// Group length at the time.
        len: usize,
    },
    /// Both sides of a link are the same group.
    SameGroup(GroupId),
    /// The facing ends of two groups are too far apart to couple.
    NotAdjacent {
        /// Group whose tail was offered.
        front: GroupId,
        /// Group whose head was offered.
        back: GroupId,
    },
    /// The track ran out before every member could be placed.
    TrackTooShort {
        /// Group being placed.
        group: GroupId,
        /// Positions needed.
        needed: usize,
        /// Positions the walk produced.
        found: usize,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGroup(id) => write!(f, "unknown group {id}"),
            Self::UnknownMember(id) => write!(f, "unknown member {id}"),
            Self::InvalidSplit { group, at, len } => {
                write!(f, "cannot split group {group} of {len} members at {at}")
            }
            Self::SameGroup(id) => write!(f, "cannot link group {id} to itself"),
            Self::NotAdjacent { front, back } => {
                write!(f, "groups {front} and {back} are not adjacent")
            }
            Self::TrackTooShort {
                group,
                needed,
                found,
            } => write!(
                f,
                "track too short for group {group}: needed {needed} positions, found {found}"
            ),
        }
    }
}

impl Error for RegistryError {}

/// Reasons a submitted command did not take effect.
///
/// Carried in [`Receipt::reason_code`](crate::command::Receipt).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// The command queue is at capacity.
    QueueFull,
    /// The command expired before it could be applied.
    Stale,
    /// A numeric argument was NaN, infinite or out of range.
    InvalidArgument {
        /// Name of the offending argument.
        field: &'static str,
    },
    /// The registry refused the operation.
    Rejected(RegistryError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "command queue full"),
            Self::Stale => write!(f, "command expired before it was applied"),
            Self::InvalidArgument { field } => write!(f, "invalid argument: {field}"),
            Self::Rejected(e) => write!(f, "rejected: {e}"),
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for CommandError {
    fn from(e: RegistryError) -> Self {
        Self::Rejected(e)
    }
}

/// A world region could not be scanned for signal devices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanError {
    /// The region that failed.
    pub chunk: ChunkPos,
    /// Human-readable cause.
    pub reason: String,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to scan chunk {}: {}", self.chunk, self.reason)
    }
}

impl Error for ScanError {}
