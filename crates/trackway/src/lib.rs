//! Trackway: rail vehicle simulation on a block grid.
//!
//! This is the facade crate that re-exports the public API of the
//! Trackway sub-crates. For most users, adding `trackway` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use trackway::prelude::*;
//!
//! let mut grid = RailGrid::new();
//! grid.lay_straight(BlockPos::new(0, 0, 0), Face::East, 16).unwrap();
//!
//! let mut engine = TrainEngine::new(PhysicsConfig::default()).unwrap();
//! let mut events: Vec<TrackEvent> = Vec::new();
//! let start = grid.cell_at(BlockPos::new(0, 0, 0)).unwrap();
//! let train = engine
//!     .spawn_train(&grid, start, Face::East, &[VehicleType::Powered], &mut events)
//!     .unwrap();
//! engine.submit(vec![Command::new(CommandPayload::SetForwardForce {
//!     group: train,
//!     force: 0.2,
//! })]);
//!
//! struct NoSignals;
//! impl SignalLayout for NoSignals {
//!     fn signals_for_rail(&self, _rail: BlockPos) -> SignalList {
//!         SignalList::new()
//!     }
//! }
//! struct NoDetectors;
//! impl DetectorService for NoDetectors {
//!     fn handle_move(&mut self, _: MemberId, _: BlockPos, _: BlockPos) -> RegionList {
//!         RegionList::new()
//!     }
//! }
//! struct Unpowered;
//! impl PowerGrid for Unpowered {
//!     fn is_signal(&self, _: BlockPos) -> bool { false }
//!     fn is_supported(&self, _: BlockPos) -> bool { false }
//!     fn is_power_source(&self, _: BlockPos) -> bool { false }
//!     fn is_lever(&self, _: BlockPos) -> bool { false }
//!     fn is_powered(&self, _: BlockPos) -> bool { false }
//!     fn attached_block(&self, _: BlockPos) -> Option<BlockPos> { None }
//!     fn attached_face(&self, _: BlockPos) -> Option<Face> { None }
//!     fn accepts_power_events(&self, _: BlockPos, _: bool) -> bool { false }
//!     fn loaded_chunks(&self) -> Vec<ChunkPos> { Vec::new() }
//!     fn signals_in_chunk(&self, _: ChunkPos) -> Result<Vec<BlockPos>, ScanError> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let mut detectors = NoDetectors;
//! let mut env = Environment {
//!     network: &grid,
//!     signals: &NoSignals,
//!     detectors: &mut detectors,
//!     power: &Unpowered,
//!     sink: &mut events,
//! };
//! let result = engine.execute_tick(&mut env);
//! assert!(result.receipts[0].accepted);
//! assert_eq!(engine.current_tick(), TickId(1));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `trackway-core` | IDs, geometry, events, commands, world traits |
//! | [`rails`] | `trackway-rails` | Rail logic, rail type resolution, track walking |
//! | [`engine`] | `trackway-engine` | Members, groups, trackers and the tick engine |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`trackway-core`).
///
/// The world is reached through [`types::RailNetwork`],
/// [`types::SignalLayout`], [`types::DetectorService`],
/// [`types::PowerGrid`] and [`types::EventSink`].
pub use trackway_core as types;

/// Rail logic and track walking (`trackway-rails`).
///
/// [`rails::RailLogic`] snaps positions onto a rail and resolves
/// headings; [`rails::RailGrid`] is an in-memory rail network.
pub use trackway_rails as rails;

/// The train engine (`trackway-engine`).
///
/// [`engine::TrainEngine`] owns every train and steps them once per tick.
pub use trackway_engine as engine;

/// Common imports for typical Trackway usage.
///
/// ```rust
/// use trackway::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use trackway_core::{
        BlockPos, ChunkPos, Command, CommandPayload, DetectorService, EventSink, Face, GroupId,
        MemberId, PowerGrid, RailCell, RailNetwork, RailShape, Receipt, RegionId, RegionList,
        SignalAction, SignalLayout, SignalList, TickId, TrackEvent, Vec3,
    };

    // Errors
    pub use trackway_core::{CommandError, RegistryError, ScanError, StepError};

    // Rails
    pub use trackway_rails::{RailGrid, RailLogic, TrackWalker};

    // Engine
    pub use trackway_engine::{
        Action, ChannelSink, Environment, Group, Member, PhysicsConfig, TickMetrics,
        TickResult, TrainEngine, VehicleType,
    };
}
