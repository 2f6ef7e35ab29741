//! Alert derivation for incoming readings.
//!
//! This module turns a [`Readings`](crate::reading::Readings) update into an
//! overall status and a set of timestamped notifications, and merges the
//! persisted notification sources into a display list.

pub mod render;
pub mod status;
pub mod synthesize;

pub use render::{render, DisplayZone};
pub use status::evaluate_status;
pub use synthesize::synthesize;
