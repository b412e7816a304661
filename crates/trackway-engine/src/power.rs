//! Power state of signal devices.
//!
//! [`PowerTracker`] caches which signal devices are powered and turns
//! block power notifications into [`SignalAction::RedstoneOn`],
//! [`SignalAction::RedstoneOff`] and [`SignalAction::RedstoneChange`]
//! events. Block physics notifications are deferred to the next tick
//! through a [`NextTickQueue`], so a burst of updates to one block is
//! handled once.

use indexmap::IndexSet;
use tracing::{debug, error, info};
use trackway_core::{
    BlockPos, ChunkPos, Face, PowerGrid, ScanError, SignalAction, TrackEvent, HORIZONTAL,
};

/// Faces checked for signal devices mounted next to a lever.
const LEVER_NEIGHBOURS: [Face; 5] = [Face::North, Face::East, Face::South, Face::West, Face::Up];

// ── NextTickQueue ──────────────────────────────────────────────────

/// Deduplicating queue drained once per tick.
#[derive(Clone, Debug)]
pub struct NextTickQueue<T> {
    items: IndexSet<T>,
}

impl<T> Default for NextTickQueue<T> {
    fn default() -> Self {
        Self {
            items: IndexSet::new(),
        }
    }
}

impl<T: std::hash::Hash + Eq> NextTickQueue<T> {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `item`. Returns `false` if it was already scheduled.
    pub fn push(&mut self, item: T) -> bool {
        self.items.insert(item)
    }

    /// Take everything scheduled, in first-scheduled order.
    pub fn take(&mut self) -> IndexSet<T> {
        std::mem::take(&mut self.items)
    }

    /// Number of scheduled items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ── PowerTracker ───────────────────────────────────────────────────

/// Cached power state of every known signal device.
#[derive(Clone, Debug, Default)]
pub struct PowerTracker {
    powered: IndexSet<BlockPos>,
    pending: NextTickQueue<BlockPos>,
    ignored: IndexSet<BlockPos>,
}

impl PowerTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached power state of `signal`.
    pub fn is_powered(&self, signal: BlockPos) -> bool {
        self.powered.contains(&signal)
    }

    /// Number of signal devices cached as powered.
    pub fn powered_count(&self) -> usize {
        self.powered.len()
    }

    /// Number of block notifications waiting for the next tick.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the next power change at `signal` will be swallowed.
    pub fn is_ignored(&self, signal: BlockPos) -> bool {
        self.ignored.contains(&signal)
    }

    /// Scan every loaded column and cache its powered signal devices.
    ///
    /// Columns that fail to scan are logged and skipped.
    pub fn seed(&mut self, grid: &dyn PowerGrid) -> usize {
        let mut scanned = 0;
        for chunk in grid.loaded_chunks() {
            match self.on_chunk_load(grid, chunk) {
                Ok(n) => scanned += n,
                Err(e) => error!(chunk = %e.chunk, reason = %e.reason, "signal scan failed"),
            }
        }
        info!(
            scanned,
            powered = self.powered.len(),
            "power state seeded"
        );
        scanned
    }

    /// Cache the power state of every signal device in a newly loaded column.
    ///
    /// Returns the number of devices found.
    pub fn on_chunk_load(
        &mut self,
        grid: &dyn PowerGrid,
        chunk: ChunkPos,
    ) -> Result<usize, ScanError> {
        let signals = grid.signals_in_chunk(chunk)?;
        for &signal in &signals {
            if grid.is_powered(signal) {
                self.powered.insert(signal);
            } else {
                self.powered.shift_remove(&signal);
            }
        }
        Ok(signals.len())
    }

    /// Forget every signal device in an unloaded column.
    pub fn on_chunk_unload(&mut self, chunk: ChunkPos) {
        self.powered.retain(|s| s.chunk() != chunk);
        self.ignored.retain(|s| s.chunk() != chunk);
    }

    /// A block at `pos` changed; re-check it next tick.
    pub fn notify_physics(&mut self, pos: BlockPos) {
        self.pending.push(pos);
    }

    /// Forget a signal device that was removed from the world.
    pub fn remove_signal(&mut self, signal: BlockPos) {
        self.powered.shift_remove(&signal);
        self.ignored.shift_remove(&signal);
    }

    /// The world reports that the power at `pos` changed to `powered`.
    pub fn notify_power_change(
        &mut self,
        grid: &dyn PowerGrid,
        pos: BlockPos,
        powered: bool,
        out: &mut Vec<TrackEvent>,
    ) {
        if grid.is_lever(pos) {
            self.verify_power(grid, pos.offset(Face::Up), powered, out);
            self.verify_power(grid, pos.offset(Face::Down), powered, out);
            // The lever's own power event reaches devices on its support
            // block a second time; swallow that one.
            if let Some(support) = grid.attached_block(pos) {
                for face in LEVER_NEIGHBOURS {
                    let signal = support.offset(face);
                    if grid.is_signal(signal) && grid.attached_face(signal) == Some(face.opposite())
                    {
                        self.ignored.insert(signal);
                    }
                }
            }
        } else {
            self.verify_power(grid, pos, powered, out);
        }
    }

    /// Handle the block notifications queued since the last tick, then
    /// clear the ignore marks.
    pub fn process_tick(&mut self, grid: &dyn PowerGrid, out: &mut Vec<TrackEvent>) {
        for pos in self.pending.take() {
            if grid.is_signal(pos) {
                if grid.is_supported(pos) {
                    self.update_power(grid, pos, out);
                } else {
                    self.remove_signal(pos);
                }
            } else {
                self.powered.shift_remove(&pos);
                if grid.is_power_source(pos) {
                    for face in HORIZONTAL {
                        self.update_power(grid, pos.offset(face), out);
                    }
                }
            }
        }
        self.ignored.clear();
    }

    /// Apply `powered` to the signal at `pos` only if the world still agrees.
    fn verify_power(
        &mut self,
        grid: &dyn PowerGrid,
        pos: BlockPos,
        powered: bool,
        out: &mut Vec<TrackEvent>,
    ) {
        if !grid.is_signal(pos) {
            return;
        }
        if grid.is_powered(pos) != powered {
            debug!(%pos, powered, "stale power notification dropped");
            return;
        }
        self.set_power(grid, pos, powered, out);
    }

    fn update_power(&mut self, grid: &dyn PowerGrid, pos: BlockPos, out: &mut Vec<TrackEvent>) {
        if grid.is_signal(pos) {
            self.set_power(grid, pos, grid.is_powered(pos), out);
        }
    }

    fn set_power(
        &mut self,
        grid: &dyn PowerGrid,
        signal: BlockPos,
        powered: bool,
        out: &mut Vec<TrackEvent>,
    ) {
        if self.ignored.shift_remove(&signal) {
            return;
        }
        let changed = if powered {
            self.powered.insert(signal)
        } else {
            self.powered.shift_remove(&signal)
        };
        if !grid.accepts_power_events(signal, powered) {
            return;
        }
        if changed {
            let action = if powered {
                SignalAction::RedstoneOn
            } else {
                SignalAction::RedstoneOff
            };
            out.push(TrackEvent::redstone(signal, action));
        }
        out.push(TrackEvent::redstone(signal, SignalAction::RedstoneChange));
    }
}
