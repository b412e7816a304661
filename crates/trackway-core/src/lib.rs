//! Core types and traits for the Trackway train simulation.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rail and engine crates: identifiers,
//! grid geometry, rail shapes, events, commands, error types, and the
//! traits through which the engine reads the surrounding world.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod command;
pub mod error;
pub mod event;
pub mod geom;
pub mod id;
pub mod rail;
pub mod traits;

pub use command::{Command, CommandPayload, Receipt};
pub use error::{CommandError, RegistryError, ScanError, StepError};
pub use event::{DetectorAction, EffectKind, SignalAction, TrackEvent};
pub use geom::{angle_difference, look_at_yaw, BlockPos, ChunkPos, Face, Vec3, CARDINAL, HORIZONTAL};
pub use id::{GroupId, MemberId, RegionId, TickId};
pub use rail::{RailCell, RailShape};
pub use traits::{DetectorService, EventSink, PowerGrid, RailNetwork, RegionList, SignalLayout, SignalList};
