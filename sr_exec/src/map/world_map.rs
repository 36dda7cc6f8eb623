//! # World Map

// ------------------------------------------------------------------------------------------------
// INCLUDES
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, RwLock};

use image::{Rgb, RgbImage};
use log::trace;
use ndarray::{Array2, Array3, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use super::{report, GroundTruth, MapError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Half the side length of the square drawn over located samples in the map image.
const SAMPLE_MARKER_HALF_SIZE: i64 = 2;

/// Weight of the ground truth when overlaid on the map image.
const GROUND_TRUTH_WEIGHT: f64 = 0.5;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the world map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldMapParams {
    /// Number of cells along each side of the square map.
    pub world_size: usize,

    /// Upper bound of every cell's confidence.
    pub confidence_max: i32,

    /// Increase of the navigable channel of a cell observed as navigable.
    pub navigable_step: i32,

    /// Decrease of the obstacle channel of a cell observed as navigable.
    pub navigable_obstacle_decay: i32,

    /// Increase of the obstacle channel of a cell observed as an obstacle.
    pub obstacle_step: i32,

    /// Decrease of the navigable channel of a cell observed as an obstacle.
    pub obstacle_navigable_decay: i32,

    /// Increase of the rock channel of a cell where a rock was seen.
    pub rock_step: i32,
}

/// The persistent occupancy grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldMap {
    params: WorldMapParams,

    /// Raw map data, a 3D array with dimension order layer, y cell, x cell
    data: Array3<i32>,
}

/// A [`WorldMap`] shared between a single writer and any number of readers.
///
/// Each call to [`SharedWorldMap::integrate`] holds the write lock for the whole update, so readers
/// only ever see whole cycles.
#[derive(Debug, Clone)]
pub struct SharedWorldMap(Arc<RwLock<WorldMap>>);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Layers of the [`WorldMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapLayer {
    Navigable,
    Obstacle,
    Rock,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for WorldMapParams {
    fn default() -> Self {
        Self {
            world_size: 200,
            confidence_max: 255,
            navigable_step: 255,
            navigable_obstacle_decay: 90,
            obstacle_step: 255,
            obstacle_navigable_decay: 40,
            rock_step: 255,
        }
    }
}

impl MapLayer {
    fn index(&self) -> usize {
        match self {
            MapLayer::Navigable => 0,
            MapLayer::Obstacle => 1,
            MapLayer::Rock => 2,
        }
    }
}

impl WorldMap {
    /// Create a new empty map.
    pub fn new(params: WorldMapParams) -> Self {
        let size = params.world_size;

        Self {
            params,
            data: Array3::zeros((3, size, size)),
        }
    }

    /// Number of cells along each side of the map.
    pub fn size(&self) -> usize {
        self.params.world_size
    }

    /// Get the confidence of a cell, or `None` if the cell is outside the map.
    pub fn get(&self, layer: MapLayer, x: usize, y: usize) -> Option<i32> {
        self.data.get((layer.index(), y, x)).copied()
    }

    /// View of a whole layer, indexed `[y, x]`.
    pub fn layer(&self, layer: MapLayer) -> ArrayView2<i32> {
        self.data.index_axis(ndarray::Axis(0), layer.index())
    }

    /// Mask of the cells with a non-zero confidence in the given layer, indexed `[y, x]`.
    pub fn occupied(&self, layer: MapLayer) -> Array2<bool> {
        self.layer(layer).mapv(|v| v > 0)
    }

    /// Integrate a single cycle of observations into the map.
    ///
    /// Cells are given as `(x, y)` pairs. A cell listed more than once in the same category is
    /// only updated once. The navigable observations are applied first, then the obstacles, then
    /// the rocks, and finally every channel is clamped into `[0, confidence_max]`.
    ///
    /// If any cell is outside the map nothing is changed and an error is returned.
    pub fn integrate(
        &mut self,
        navigable: &[(usize, usize)],
        obstacle: &[(usize, usize)],
        rock: &[(usize, usize)],
    ) -> Result<(), MapError> {
        let size = self.size();

        if let Some(&(x, y)) = navigable
            .iter()
            .chain(obstacle.iter())
            .chain(rock.iter())
            .find(|(x, y)| *x >= size || *y >= size)
        {
            return Err(MapError::CellOutOfBounds { x, y, size });
        }

        let p = self.params;
        let (nav, obs, rck) = (
            MapLayer::Navigable.index(),
            MapLayer::Obstacle.index(),
            MapLayer::Rock.index(),
        );

        for (x, y) in unique(navigable) {
            self.data[[nav, y, x]] += p.navigable_step;
            self.data[[obs, y, x]] -= p.navigable_obstacle_decay;
        }

        for (x, y) in unique(obstacle) {
            self.data[[obs, y, x]] += p.obstacle_step;
            self.data[[nav, y, x]] -= p.obstacle_navigable_decay;
        }

        for (x, y) in unique(rock) {
            self.data[[rck, y, x]] += p.rock_step;
        }

        let max = p.confidence_max;
        self.data.mapv_inplace(|v| v.max(0).min(max));

        trace!(
            "Integrated {} navigable, {} obstacle and {} rock cells",
            navigable.len(),
            obstacle.len(),
            rock.len()
        );

        Ok(())
    }

    /// Render the map for display.
    ///
    /// Obstacles are drawn in red and navigable terrain in blue, each channel scaled so that the
    /// mean of its observed cells is full brightness. Cells which are at least as navigable as they
    /// are obstructed are not drawn red. If given, the ground truth is overlaid at half brightness
    /// in green, and every sample of `samples` which has been located is marked by a white square.
    ///
    /// The image is flipped vertically so that +y points up.
    pub fn to_image(
        &self,
        truth: Option<&GroundTruth>,
        samples: &[(f64, f64)],
    ) -> Result<RgbImage, MapError> {
        let size = self.size();

        if let Some(t) = truth {
            t.check_size(size)?;
        }

        let navigable = normalise(self.layer(MapLayer::Navigable));
        let mut obstacle = normalise(self.layer(MapLayer::Obstacle));
        Zip::from(&mut obstacle)
            .and(&navigable)
            .for_each(|o, &n| {
                if n >= *o {
                    *o = 0.0
                }
            });

        let mut img = RgbImage::new(size as u32, size as u32);

        for ((y, x), &nav) in navigable.indexed_iter() {
            let truth_val = match truth {
                Some(t) if t.is_navigable(x, y) => 255.0 * GROUND_TRUTH_WEIGHT,
                _ => 0.0,
            };

            img.put_pixel(
                x as u32,
                flip(y, size) as u32,
                Rgb([
                    to_channel(obstacle[[y, x]]),
                    to_channel(truth_val),
                    to_channel(nav),
                ]),
            );
        }

        for &(sx, sy) in report::located_samples(self, samples).iter() {
            let (sx, sy) = (sx as i64, sy as i64);

            for y in (sy - SAMPLE_MARKER_HALF_SIZE)..(sy + SAMPLE_MARKER_HALF_SIZE) {
                for x in (sx - SAMPLE_MARKER_HALF_SIZE)..(sx + SAMPLE_MARKER_HALF_SIZE) {
                    if x >= 0 && y >= 0 && (x as usize) < size && (y as usize) < size {
                        img.put_pixel(
                            x as u32,
                            flip(y as usize, size) as u32,
                            Rgb([255, 255, 255]),
                        );
                    }
                }
            }
        }

        Ok(img)
    }
}

impl SharedWorldMap {
    pub fn new(map: WorldMap) -> Self {
        Self(Arc::new(RwLock::new(map)))
    }

    /// Integrate a cycle of observations under a single write lock.
    ///
    /// See [`WorldMap::integrate`].
    pub fn integrate(
        &self,
        navigable: &[(usize, usize)],
        obstacle: &[(usize, usize)],
        rock: &[(usize, usize)],
    ) -> Result<(), MapError> {
        let mut map = self.0.write().map_err(|_| MapError::LockPoisoned)?;
        map.integrate(navigable, obstacle, rock)
    }

    /// Run a function on the map while holding the read lock.
    pub fn read<R, F>(&self, f: F) -> Result<R, MapError>
    where
        F: FnOnce(&WorldMap) -> R,
    {
        let map = self.0.read().map_err(|_| MapError::LockPoisoned)?;
        Ok(f(&map))
    }

    /// Take a consistent copy of the map.
    pub fn snapshot(&self) -> Result<WorldMap, MapError> {
        self.read(WorldMap::clone)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn unique(cells: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut cells = cells.to_vec();
    cells.sort_unstable();
    cells.dedup();
    cells
}

/// Scale the layer so the mean of its non-zero cells becomes 255.
fn normalise(layer: ArrayView2<i32>) -> Array2<f64> {
    let nonzero: Vec<f64> = layer.iter().filter(|&&v| v > 0).map(|&v| v as f64).collect();

    match util::maths::mean(&nonzero) {
        Some(m) => layer.mapv(|v| v as f64 * 255.0 / m),
        None => layer.mapv(|v| v as f64),
    }
}

fn flip(y: usize, size: usize) -> usize {
    size - 1 - y
}

fn to_channel(value: f64) -> u8 {
    value.round().max(0.0).min(255.0) as u8
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
