//! Test utilities and mock world types for Trackway development.
//!
//! Provides in-memory implementations of the world traits
//! ([`SignalLayout`], [`DetectorService`], [`PowerGrid`], [`EventSink`])
//! and the track layouts in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{curved_track, place_train, slope_ramp, straight_track, vertical_shaft};

use indexmap::{IndexMap, IndexSet};
use trackway_core::{
    BlockPos, ChunkPos, DetectorService, EventSink, Face, MemberId, PowerGrid, RegionId,
    RegionList, ScanError, SignalAction, SignalLayout, SignalList, TrackEvent,
};

/// Event sink that keeps everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<TrackEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }

    /// Drain the recorded events.
    pub fn take(&mut self) -> Vec<TrackEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of signal events with `action` at `signal`.
    pub fn count_signal(&self, signal: BlockPos, action: SignalAction) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TrackEvent::Signal { signal: s, action: a, .. } if *s == signal && *a == action))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn dispatch(&mut self, event: TrackEvent) {
        self.events.push(event);
    }
}

/// Signal devices keyed by the rail they sit next to.
#[derive(Debug, Default)]
pub struct StaticSignals {
    by_rail: IndexMap<BlockPos, Vec<BlockPos>>,
}

impl StaticSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `signal` to the rail at `rail`.
    pub fn add(&mut self, rail: BlockPos, signal: BlockPos) {
        self.by_rail.entry(rail).or_default().push(signal);
    }
}

impl SignalLayout for StaticSignals {
    fn signals_for_rail(&self, rail: BlockPos) -> SignalList {
        self.by_rail
            .get(&rail)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// A world without detector regions.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDetectors;

impl DetectorService for NoDetectors {
    fn handle_move(&mut self, _member: MemberId, _from: BlockPos, _to: BlockPos) -> RegionList {
        RegionList::new()
    }
}

/// Box-shaped detector regions that record every move they see.
#[derive(Debug, Default)]
pub struct ScriptedDetectors {
    regions: Vec<(RegionId, BlockPos, BlockPos)>,
    moves: Vec<(MemberId, BlockPos, BlockPos)>,
}

impl ScriptedDetectors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region spanning `min..=max` on every axis.
    pub fn add_region(&mut self, id: RegionId, min: BlockPos, max: BlockPos) {
        self.regions.push((id, min, max));
    }

    /// Every `(member, from, to)` seen so far.
    pub fn moves(&self) -> &[(MemberId, BlockPos, BlockPos)] {
        &self.moves
    }
}

impl DetectorService for ScriptedDetectors {
    fn handle_move(&mut self, member: MemberId, from: BlockPos, to: BlockPos) -> RegionList {
        self.moves.push((member, from, to));
        self.regions
            .iter()
            .filter(|(_, min, max)| {
                (min.x..=max.x).contains(&to.x)
                    && (min.y..=max.y).contains(&to.y)
                    && (min.z..=max.z).contains(&to.z)
            })
            .map(|(id, _, _)| *id)
            .collect()
    }
}

#[derive(Clone, Copy, Debug)]
struct MockSignal {
    powered: bool,
    supported: bool,
    accepts: bool,
    attached: Option<(BlockPos, Face)>,
}

/// Block power state held in memory.
///
/// Loaded chunks are the chunks of every signal device plus every chunk
/// marked as failing.
#[derive(Debug, Default)]
pub struct MockPowerGrid {
    signals: IndexMap<BlockPos, MockSignal>,
    levers: IndexMap<BlockPos, BlockPos>,
    sources: IndexSet<BlockPos>,
    failing: IndexSet<ChunkPos>,
}

impl MockPowerGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unpowered, supported signal device that reacts to power.
    pub fn add_signal(&mut self, pos: BlockPos) {
        self.signals.insert(
            pos,
            MockSignal {
                powered: false,
                supported: true,
                accepts: true,
                attached: None,
            },
        );
    }

    pub fn remove_signal(&mut self, pos: BlockPos) {
        self.signals.shift_remove(&pos);
    }

    pub fn set_powered(&mut self, pos: BlockPos, powered: bool) {
        if let Some(s) = self.signals.get_mut(&pos) {
            s.powered = powered;
        }
    }

    pub fn set_supported(&mut self, pos: BlockPos, supported: bool) {
        if let Some(s) = self.signals.get_mut(&pos) {
            s.supported = supported;
        }
    }

    pub fn set_accepts(&mut self, pos: BlockPos, accepts: bool) {
        if let Some(s) = self.signals.get_mut(&pos) {
            s.accepts = accepts;
        }
    }

    /// Mount the signal at `pos` on `block`, touching it with `face`.
    pub fn attach(&mut self, pos: BlockPos, block: BlockPos, face: Face) {
        if let Some(s) = self.signals.get_mut(&pos) {
            s.attached = Some((block, face));
        }
    }

    /// Add a lever mounted on `support`.
    pub fn add_lever(&mut self, pos: BlockPos, support: BlockPos) {
        self.levers.insert(pos, support);
    }

    pub fn add_source(&mut self, pos: BlockPos) {
        self.sources.insert(pos);
    }

    /// Make scans of `chunk` fail.
    pub fn fail_chunk(&mut self, chunk: ChunkPos) {
        self.failing.insert(chunk);
    }
}

impl PowerGrid for MockPowerGrid {
    fn is_signal(&self, pos: BlockPos) -> bool {
        self.signals.contains_key(&pos)
    }

    fn is_supported(&self, pos: BlockPos) -> bool {
        self.signals.get(&pos).is_some_and(|s| s.supported)
    }

    fn is_power_source(&self, pos: BlockPos) -> bool {
        self.sources.contains(&pos)
    }

    fn is_lever(&self, pos: BlockPos) -> bool {
        self.levers.contains_key(&pos)
    }

    fn is_powered(&self, pos: BlockPos) -> bool {
        self.signals.get(&pos).is_some_and(|s| s.powered)
    }

    fn attached_block(&self, pos: BlockPos) -> Option<BlockPos> {
        self.levers
            .get(&pos)
            .copied()
            .or_else(|| self.signals.get(&pos)?.attached.map(|(b, _)| b))
    }

    fn attached_face(&self, pos: BlockPos) -> Option<Face> {
        self.signals.get(&pos)?.attached.map(|(_, f)| f)
    }

    fn accepts_power_events(&self, pos: BlockPos, _powered: bool) -> bool {
        self.signals.get(&pos).is_some_and(|s| s.accepts)
    }

    fn loaded_chunks(&self) -> Vec<ChunkPos> {
        let mut chunks: IndexSet<ChunkPos> = self.signals.keys().map(|p| p.chunk()).collect();
        chunks.extend(self.failing.iter().copied());
        chunks.into_iter().collect()
    }

    fn signals_in_chunk(&self, chunk: ChunkPos) -> Result<Vec<BlockPos>, ScanError> {
        if self.failing.contains(&chunk) {
            return Err(ScanError {
                chunk,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(self
            .signals
            .keys()
            .filter(|p| p.chunk() == chunk)
            .copied()
            .collect())
    }
}
