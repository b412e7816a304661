//! Events produced for external consumers.
//!
//! Signal device behavior lives outside this crate; the engine only
//! reports *when* a device is activated, refreshed, or deactivated.

use crate::geom::BlockPos;
use crate::id::{GroupId, MemberId, RegionId};

/// What happened at a signal device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalAction {
    /// A member moved over the device.
    MemberEnter,
    /// A member left the device.
    MemberLeave,
    /// A member is still over the device this tick.
    MemberUpdate,
    /// The first member of a train moved over the device.
    GroupEnter,
    /// The last member of a train left the device.
    GroupLeave,
    /// A train is still over the device this tick.
    GroupUpdate,
    /// The device became powered.
    RedstoneOn,
    /// The device lost power.
    RedstoneOff,
    /// The device received a power notification.
    RedstoneChange,
}

impl SignalAction {
    /// Whether this action is scoped to a single member.
    pub fn is_member_scoped(self) -> bool {
        matches!(
            self,
            Self::MemberEnter | Self::MemberLeave | Self::MemberUpdate
        )
    }

    /// Whether this action comes from the power tracker.
    pub fn is_redstone(self) -> bool {
        matches!(self, Self::RedstoneOn | Self::RedstoneOff | Self::RedstoneChange)
    }
}

/// What happened in a detector region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectorAction {
    /// A train entered the region.
    Enter,
    /// A train left the region.
    Leave,
    /// A train is still inside the region this tick.
    Update,
}

/// Cosmetic effects requested by actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Steam sizzle on a member.
    Sizzle,
    /// Coupling sound when two trains link.
    Link,
}

/// Everything the engine reports to the outside world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackEvent {
    /// Signal device activity.
    Signal {
        /// Device position.
        signal: BlockPos,
        /// Kind of activity.
        action: SignalAction,
        /// Member involved, for member-scoped actions.
        member: Option<MemberId>,
        /// Group involved; `None` for power transitions.
        group: Option<GroupId>,
    },
    /// Detector region activity.
    Detector {
        /// Region id.
        region: RegionId,
        /// Kind of activity.
        action: DetectorAction,
        /// Member involved, for member-scoped updates.
        member: Option<MemberId>,
        /// Group involved.
        group: GroupId,
    },
    /// A group was registered (spawn or split).
    GroupCreated {
        /// The new group.
        group: GroupId,
    },
    /// A group was removed from the registry.
    GroupRemoved {
        /// The removed group.
        group: GroupId,
    },
    /// A group was handed back to the world loader.
    GroupUnloaded {
        /// The unloaded group.
        group: GroupId,
    },
    /// A member joined a group.
    MemberAdded {
        /// The group joined.
        group: GroupId,
        /// The member.
        member: MemberId,
    },
    /// A member left a group.
    MemberRemoved {
        /// The group left.
        group: GroupId,
        /// The member.
        member: MemberId,
    },
    /// A cosmetic effect.
    Effect {
        /// Group the effect belongs to.
        group: GroupId,
        /// Member the effect plays on.
        member: MemberId,
        /// Effect kind.
        effect: EffectKind,
    },
}

impl TrackEvent {
    /// Member-scoped signal event.
    pub fn member_signal(
        signal: BlockPos,
        action: SignalAction,
        member: MemberId,
        group: GroupId,
    ) -> Self {
        Self::Signal {
            signal,
            action,
            member: Some(member),
            group: Some(group),
        }
    }

    /// Group-scoped signal event.
    pub fn group_signal(signal: BlockPos, action: SignalAction, group: GroupId) -> Self {
        Self::Signal {
            signal,
            action,
            member: None,
            group: Some(group),
        }
    }

    /// Power transition event.
    pub fn redstone(signal: BlockPos, action: SignalAction) -> Self {
        Self::Signal {
            signal,
            action,
            member: None,
            group: None,
        }
    }

    /// Group-scoped detector event.
    pub fn group_detector(region: RegionId, action: DetectorAction, group: GroupId) -> Self {
        Self::Detector {
            region,
            action,
            member: None,
            group,
        }
    }

    /// Member-scoped detector event.
    pub fn member_detector(
        region: RegionId,
        action: DetectorAction,
        member: MemberId,
        group: GroupId,
    ) -> Self {
        Self::Detector {
            region,
            action,
            member: Some(member),
            group,
        }
    }

    /// The signal action carried, if this is a signal event.
    pub fn signal_action(&self) -> Option<SignalAction> {
        match self {
            Self::Signal { action, .. } => Some(*action),
            _ => None,
        }
    }
}
