//! # Sample-return library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the sample-return crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Global data store for the executable
pub mod data_store;

/// Map module - the persistent world occupancy map and reporting on it
pub mod map;

/// Navigation module - the state machine deciding throttle, brake and steering
pub mod nav;

/// Executable parameters
pub mod params;

/// Perception module - turns camera frames into steering signals and map updates
pub mod per;

/// Telemetry summary of each cycle
pub mod tm;
