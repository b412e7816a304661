//! Rail logic for the Trackway train simulation.
//!
//! Each rail cell maps to a [`RailLogic`] that snaps positions onto the
//! rail and decides which way a moving vehicle is heading. The
//! [`resolver`] module chains cells into a track, [`RailGrid`] provides
//! an in-memory [`RailNetwork`](trackway_core::RailNetwork), and
//! [`TrackWalker`] follows the track without physics.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod grid;
pub mod logic;
pub mod resolver;
pub mod walker;

pub use error::GridError;
pub use grid::RailGrid;
pub use logic::{CurveMotion, HorizontalLogic, Kinematics, RailLogic, RailPhysics, RAIL_HEIGHT};
pub use resolver::{clamp_into_cell, find_rail, find_rail_for_member, RailType};
pub use walker::{walk, TrackWalker, WALK_STEP};
