//! Per-tick metrics for the train engine.
//!
//! [`TickMetrics`] captures timing and counters for a single tick.

/// Timing and counters collected during a single tick.
///
/// All durations are in microseconds. The engine fills these in at the
/// end of each [`execute_tick`](crate::engine::TrainEngine::execute_tick).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Wall-clock time for the entire tick, in microseconds.
    pub total_us: u64,
    /// Time spent in the power tracker, in microseconds.
    pub power_us: u64,
    /// Time spent draining and applying commands, in microseconds.
    pub command_processing_us: u64,
    /// Time spent stepping groups, in microseconds.
    pub groups_us: u64,
    /// Number of groups stepped this tick.
    pub groups_stepped: u32,
    /// Number of physics sub-steps run across all groups.
    pub substeps: u32,
    /// Number of splits forced by broken couplings.
    pub splits: u32,
    /// Number of group steps that faulted.
    pub faults: u32,
    /// Number of events handed to the sink.
    pub events_dispatched: u32,
    /// Number of commands applied.
    pub commands_applied: u32,
    /// Number of commands rejected or expired.
    pub commands_rejected: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = TickMetrics::default();
        assert_eq!(m.total_us, 0);
        assert_eq!(m.power_us, 0);
        assert_eq!(m.command_processing_us, 0);
        assert_eq!(m.groups_us, 0);
        assert_eq!(m.groups_stepped, 0);
        assert_eq!(m.substeps, 0);
        assert_eq!(m.splits, 0);
        assert_eq!(m.faults, 0);
        assert_eq!(m.events_dispatched, 0);
        assert_eq!(m.commands_applied, 0);
        assert_eq!(m.commands_rejected, 0);
    }
}
