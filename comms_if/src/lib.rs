//! # Communications interface crate.
//!
//! Provides the interfaces between the rover's control core and the simulator: the telemetry
//! record received once per cycle and the actuation command sent back in reply.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuation commands sent to the rover
pub mod actuation;

/// Telemetry records received from the rover
pub mod telemetry;
