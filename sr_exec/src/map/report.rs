//! # Map reporting
//!
//! Read-only comparison of the [`WorldMap`] against ground truth and known sample positions. None
//! of this feeds back into control.

// ------------------------------------------------------------------------------------------------
// INCLUDES
// ------------------------------------------------------------------------------------------------

use std::path::Path;

use ndarray::{Array2, Zip};
use serde::Serialize;

use super::{MapError, MapLayer, WorldMap};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// A sample is located if a rock has been mapped closer than this to it.
///
/// Units: world cells
pub const SAMPLE_LOCATED_RADIUS: f64 = 3.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Map of the cells which are truly navigable, indexed `[y, x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    cells: Array2<bool>,
}

/// Summary of mapping progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MapReport {
    /// Percentage of the truly navigable cells which have been mapped as navigable.
    pub percent_mapped: f64,

    /// Percentage of the cells mapped as navigable which are truly navigable.
    pub fidelity: f64,

    /// Number of known samples with a mapped rock nearby.
    pub samples_located: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GroundTruth {
    /// Load a ground truth image. Pixels with a non-zero green channel are navigable.
    ///
    /// Image row `y`, column `x` describes world cell `(x, y)`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let img = image::open(path)
            .map_err(MapError::GroundTruthLoadError)?
            .to_rgb8();
        let (width, height) = img.dimensions();

        let cells = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            img.get_pixel(x as u32, y as u32)[1] > 0
        });

        Ok(Self { cells })
    }

    pub fn from_mask(cells: Array2<bool>) -> Self {
        Self { cells }
    }

    pub fn is_navigable(&self, x: usize, y: usize) -> bool {
        self.cells.get((y, x)).copied().unwrap_or(false)
    }

    pub(super) fn check_size(&self, size: usize) -> Result<(), MapError> {
        if self.cells.dim() == (size, size) {
            Ok(())
        } else {
            Err(MapError::SizeMismatch {
                expected: size,
                found: self.cells.dim(),
            })
        }
    }
}

impl MapReport {
    /// Compare the map with the ground truth and known sample positions.
    ///
    /// Percentages are rounded to one decimal place. An empty map has a fidelity of zero.
    pub fn new(
        map: &WorldMap,
        truth: &GroundTruth,
        samples: &[(f64, f64)],
    ) -> Result<Self, MapError> {
        truth.check_size(map.size())?;

        let mapped = map.occupied(MapLayer::Navigable);

        let num_mapped = mapped.iter().filter(|&&m| m).count();
        let num_truth = truth.cells.iter().filter(|&&t| t).count();
        let num_good = Zip::from(&mapped)
            .and(&truth.cells)
            .fold(0usize, |acc, &m, &t| if m && t { acc + 1 } else { acc });

        Ok(Self {
            percent_mapped: percentage(num_good, num_truth),
            fidelity: percentage(num_good, num_mapped),
            samples_located: samples_located(map, samples),
        })
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The known samples which have a mapped rock within [`SAMPLE_LOCATED_RADIUS`] cells.
pub fn located_samples(map: &WorldMap, samples: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let rocks: Vec<(f64, f64)> = map
        .layer(MapLayer::Rock)
        .indexed_iter()
        .filter(|(_, &v)| v > 0)
        .map(|((y, x), _)| (x as f64, y as f64))
        .collect();

    samples
        .iter()
        .filter(|&&(sx, sy)| {
            rocks
                .iter()
                .any(|&(rx, ry)| ((sx - rx).powi(2) + (sy - ry).powi(2)).sqrt() < SAMPLE_LOCATED_RADIUS)
        })
        .copied()
        .collect()
}

/// Number of known samples which have been located.
pub fn samples_located(map: &WorldMap, samples: &[(f64, f64)]) -> usize {
    located_samples(map, samples).len()
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn percentage(num: usize, den: usize) -> f64 {
    if den == 0 {
        return 0.0;
    }

    util::maths::round_to(100.0 * num as f64 / den as f64, 1)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::WorldMapParams;

    fn map(size: usize) -> WorldMap {
        WorldMap::new(WorldMapParams {
            world_size: size,
            ..Default::default()
        })
    }

    #[test]
    fn test_report() {
        let mut m = map(10);
        let mut truth = Array2::from_elem((10, 10), false);
        for x in 0..6 {
            truth[[0, x]] = true;
        }

        // Four good cells, one bad
        m.integrate(&[(0, 0), (1, 0), (2, 0), (3, 0), (0, 9)], &[], &[])
            .unwrap();

        let report = MapReport::new(&m, &GroundTruth::from_mask(truth), &[]).unwrap();

        assert_eq!(report.percent_mapped, 66.7);
        assert_eq!(report.fidelity, 80.0);
        assert_eq!(report.samples_located, 0);
    }

    #[test]
    fn test_report_empty_map() {
        let truth = GroundTruth::from_mask(Array2::from_elem((10, 10), true));

        let report = MapReport::new(&map(10), &truth, &[]).unwrap();

        assert_eq!(report, MapReport::default());
    }

    #[test]
    fn test_report_size_mismatch() {
        let truth = GroundTruth::from_mask(Array2::from_elem((5, 10), true));

        assert!(matches!(
            MapReport::new(&map(10), &truth, &[]),
            Err(MapError::SizeMismatch {
                expected: 10,
                found: (5, 10)
            })
        ));
    }

    #[test]
    fn test_samples_located() {
        let mut m = map(20);
        m.integrate(&[], &[], &[(10, 10)]).unwrap();

        let samples = [(12.9, 10.0), (13.0, 10.0), (7.5, 10.0), (10.5, 12.5), (1.0, 1.0)];

        // Distances use the exact sample position, 7.5 is 2.5 cells away while 12.9 is 2.9.
        // 13 is exactly three cells away which isn't close enough.
        assert_eq!(
            located_samples(&m, &samples),
            vec![(12.9, 10.0), (7.5, 10.0), (10.5, 12.5)]
        );
        assert_eq!(samples_located(&map(20), &samples), 0);
    }
}
