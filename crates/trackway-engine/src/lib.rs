//! Train simulation engine for Trackway.
//!
//! Members are single rail vehicles; a [`Group`] is a train of members
//! moved together. [`TrainEngine`] steps every train once per tick, keeps
//! the occupancy and signal state of each train current, and caches the
//! power state of signal devices. World access goes through the traits
//! in `trackway-core`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod commands;
pub mod config;
pub mod engine;
pub mod group;
pub mod member;
pub mod metrics;
pub mod power;
pub mod registry;
pub mod sink;
pub mod tracker;

pub use action::{Action, Launch};
pub use commands::CommandQueue;
pub use config::{ConfigError, PhysicsConfig, TrainProperties};
pub use engine::{Environment, TickResult, TrainEngine};
pub use group::{Group, StepContext, SubstepOutcome};
pub use member::{create_controller, Member, VehicleType};
pub use metrics::TickMetrics;
pub use power::{NextTickQueue, PowerTracker};
pub use registry::{GroupRegistry, VehicleSpawn, MEMBER_SEARCH_RADIUS};
pub use sink::ChannelSink;
pub use tracker::OccupancyTracker;
