//! Bounded command queue with arrival ordering and expiry.
//!
//! [`CommandQueue`] buffers train commands between submission and the
//! start of the next tick. It enforces a capacity limit, stamps each
//! command with a monotonic arrival sequence number, and drops commands
//! whose expiry tick has passed. Commands are applied in arrival order.

use std::collections::VecDeque;

use tracing::debug;
use trackway_core::{Command, CommandError, Receipt, TickId};

/// A command paired with its index in the `submit()` batch.
#[derive(Debug)]
pub struct DrainedCommand {
    /// The command to apply.
    pub command: Command,
    /// The batch-local index from the `submit()` call.
    pub command_index: usize,
}

/// Result of draining the queue at the start of a tick.
#[derive(Debug)]
pub struct DrainResult {
    /// Live commands, in arrival order.
    pub commands: Vec<DrainedCommand>,
    /// Receipts for commands that expired before this tick.
    pub expired_receipts: Vec<Receipt>,
}

struct QueueEntry {
    command: Command,
    command_index: usize,
}

/// Bounded FIFO of pending commands.
pub struct CommandQueue {
    queue: VecDeque<QueueEntry>,
    capacity: usize,
    next_arrival_seq: u64,
}

impl CommandQueue {
    /// Create a new queue with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CommandQueue capacity must be at least 1");
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            next_arrival_seq: 0,
        }
    }

    /// Submit a batch of commands.
    ///
    /// Returns one [`Receipt`] per input command. Commands are accepted in
    /// order until the queue is full; the rest receive `QueueFull`.
    /// Arrival sequence numbers persist across calls and overwrite any
    /// value the caller set.
    pub fn submit(&mut self, commands: Vec<Command>) -> Vec<Receipt> {
        let mut receipts = Vec::with_capacity(commands.len());
        for (i, mut cmd) in commands.into_iter().enumerate() {
            if self.queue.len() >= self.capacity {
                receipts.push(Receipt::rejected(i, CommandError::QueueFull));
                continue;
            }
            cmd.arrival_seq = self.next_arrival_seq;
            self.next_arrival_seq += 1;
            self.queue.push_back(QueueEntry {
                command: cmd,
                command_index: i,
            });
            receipts.push(Receipt::accepted(i));
        }
        receipts
    }

    /// Take every pending command, separating out the expired ones.
    ///
    /// A command is expired if `expires_after_tick < current_tick`; one
    /// expiring at `current_tick` is still applied.
    pub fn drain(&mut self, current_tick: TickId) -> DrainResult {
        let mut commands = Vec::with_capacity(self.queue.len());
        let mut expired_receipts = Vec::new();
        for entry in self.queue.drain(..) {
            if entry.command.expires_after_tick < current_tick {
                debug!(
                    seq = entry.command.arrival_seq,
                    expired = %entry.command.expires_after_tick,
                    tick = %current_tick,
                    "command expired"
                );
                expired_receipts.push(Receipt {
                    accepted: true,
                    applied_tick_id: None,
                    reason_code: Some(CommandError::Stale),
                    command_index: entry.command_index,
                });
            } else {
                commands.push(DrainedCommand {
                    command: entry.command,
                    command_index: entry.command_index,
                });
            }
        }
        commands.sort_by_key(|dc| dc.command.arrival_seq);
        DrainResult {
            commands,
            expired_receipts,
        }
    }

    /// Number of commands currently buffered.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Maximum number of commands this queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard all pending commands.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackway_core::{CommandPayload, GroupId};

    fn stop(group: u64) -> Command {
        Command::new(CommandPayload::Stop {
            group: GroupId(group),
        })
    }

    // ── submit tests ─────────────────────────────────────────

    #[test]
    fn submit_assigns_monotonic_arrival_seq() {
        let mut q = CommandQueue::new(8);
        q.submit(vec![stop(1), stop(2)]);
        q.submit(vec![stop(3)]);
        let drained = q.drain(TickId(0));
        let seqs: Vec<u64> = drained
            .commands
            .iter()
            .map(|d| d.command.arrival_seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn caller_arrival_seq_is_overwritten() {
        let mut q = CommandQueue::new(8);
        let mut early = stop(1);
        early.arrival_seq = 99;
        q.submit(vec![early, stop(2)]);
        let drained = q.drain(TickId(0));
        assert_eq!(drained.commands[0].command.arrival_seq, 0);
        assert_eq!(drained.commands[0].command.payload.group(), GroupId(1));
        assert_eq!(drained.commands[1].command.arrival_seq, 1);
    }

    #[test]
    fn submit_rejects_when_full() {
        let mut q = CommandQueue::new(2);
        let receipts = q.submit(vec![stop(1), stop(2), stop(3)]);
        assert!(receipts[0].accepted);
        assert!(receipts[1].accepted);
        assert!(!receipts[2].accepted);
        assert_eq!(receipts[2].reason_code, Some(CommandError::QueueFull));
        assert_eq!(receipts[2].command_index, 2);
        assert_eq!(q.len(), 2);
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn zero_capacity_panics() {
        let _ = CommandQueue::new(0);
    }

    // ── drain tests ──────────────────────────────────────────

    #[test]
    fn drain_keeps_arrival_order() {
        let mut q = CommandQueue::new(8);
        q.submit(vec![stop(3), stop(1), stop(2)]);
        let groups: Vec<GroupId> = q
            .drain(TickId(1))
            .commands
            .iter()
            .map(|d| d.command.payload.group())
            .collect();
        assert_eq!(groups, vec![GroupId(3), GroupId(1), GroupId(2)]);
        assert!(q.is_empty());
    }

    #[test]
    fn drain_expires_stale_commands() {
        let mut q = CommandQueue::new(8);
        q.submit(vec![
            stop(1).expires_after(TickId(4)),
            stop(2).expires_after(TickId(5)),
        ]);
        let result = q.drain(TickId(5));
        assert_eq!(result.commands.len(), 1);
        assert_eq!(result.commands[0].command_index, 1);
        assert_eq!(result.expired_receipts.len(), 1);
        assert_eq!(result.expired_receipts[0].command_index, 0);
        assert_eq!(
            result.expired_receipts[0].reason_code,
            Some(CommandError::Stale)
        );
    }

    #[test]
    fn clear_discards_pending() {
        let mut q = CommandQueue::new(4);
        q.submit(vec![stop(1)]);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.capacity(), 4);
    }
}
