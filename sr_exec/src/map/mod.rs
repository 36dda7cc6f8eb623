//! # Map
//!
//! This module implements the [`WorldMap`], the persistent three-channel occupancy grid built up
//! over the whole mission, and read-only reporting on it.
//!
//! The map is indexed by world cell, with `x` increasing along the columns and `y` along the rows
//! of each layer. Each layer holds a confidence counter per cell.

// ------------------------------------------------------------------------------------------------
// MODS
// ------------------------------------------------------------------------------------------------

/// Implements the [`WorldMap`] and [`SharedWorldMap`] types
mod world_map;

/// Ground truth comparison and mission reporting
pub mod report;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use report::{GroundTruth, MapReport};
pub use world_map::{MapLayer, SharedWorldMap, WorldMap, WorldMapParams};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Cell ({x}, {y}) is outside of the {size}x{size} map")]
    CellOutOfBounds { x: usize, y: usize, size: usize },

    #[error("The world map lock was poisoned by a panicking writer")]
    LockPoisoned,

    #[error("Could not load the ground truth image: {0}")]
    GroundTruthLoadError(image::ImageError),

    #[error("Expected a {expected}x{expected} ground truth but got {found:?}")]
    SizeMismatch {
        expected: usize,
        found: (usize, usize),
    },
}
