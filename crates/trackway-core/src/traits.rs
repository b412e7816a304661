//! Interfaces to the world the engine runs in.
//!
//! The engine never owns rail geometry, signal placement, detector
//! regions, or block power. It reads them through these traits, which
//! callers implement over their own world storage.

use smallvec::SmallVec;

use crate::error::ScanError;
use crate::event::TrackEvent;
use crate::geom::{BlockPos, ChunkPos, Face};
use crate::id::{MemberId, RegionId};
use crate::rail::RailCell;

/// Signal devices next to one rail cell.
pub type SignalList = SmallVec<[BlockPos; 4]>;

/// Detector regions containing one member.
pub type RegionList = SmallVec<[RegionId; 2]>;

/// Read-only rail geometry.
pub trait RailNetwork {
    /// The rail at `pos`, if the cell holds one.
    fn cell_at(&self, pos: BlockPos) -> Option<RailCell>;

    /// Whether `pos` holds a rail.
    fn is_rail_cell(&self, pos: BlockPos) -> bool {
        self.cell_at(pos).is_some()
    }
}

/// Placement of signal devices along the track.
pub trait SignalLayout {
    /// Signal devices attached to the rail at `rail`.
    fn signals_for_rail(&self, rail: BlockPos) -> SignalList;
}

/// Externally defined detector regions.
pub trait DetectorService {
    /// A member moved from `from` to `to`; return every region it is in now.
    fn handle_move(&mut self, member: MemberId, from: BlockPos, to: BlockPos) -> RegionList;
}

/// Block-level power state of the world.
pub trait PowerGrid {
    /// Whether `pos` holds a signal device.
    fn is_signal(&self, pos: BlockPos) -> bool;

    /// Whether the signal device at `pos` is still attached to something.
    fn is_supported(&self, pos: BlockPos) -> bool;

    /// Whether `pos` holds a self-powered source (a torch, for example).
    fn is_power_source(&self, pos: BlockPos) -> bool;

    /// Whether `pos` holds a lever-like switch.
    fn is_lever(&self, pos: BlockPos) -> bool;

    /// Freshly computed power state of the signal device at `pos`.
    fn is_powered(&self, pos: BlockPos) -> bool;

    /// The block `pos` is mounted on.
    fn attached_block(&self, pos: BlockPos) -> Option<BlockPos>;

    /// The face of `pos` that touches the block it is mounted on.
    fn attached_face(&self, pos: BlockPos) -> Option<Face>;

    /// Whether the device at `pos` reacts to becoming powered (or unpowered).
    ///
    /// Devices that do not still have their cached state tracked.
    fn accepts_power_events(&self, pos: BlockPos, powered: bool) -> bool;

    /// Every currently loaded world column.
    fn loaded_chunks(&self) -> Vec<ChunkPos>;

    /// Signal devices inside one loaded column.
    fn signals_in_chunk(&self, chunk: ChunkPos) -> Result<Vec<BlockPos>, ScanError>;
}

/// Receiver of engine events.
pub trait EventSink {
    /// Deliver one event.
    fn dispatch(&mut self, event: TrackEvent);
}

impl EventSink for Vec<TrackEvent> {
    fn dispatch(&mut self, event: TrackEvent) {
        self.push(event);
    }
}
