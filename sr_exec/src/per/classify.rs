//! # Terrain Classifier
//!
//! Per-pixel colour thresholding of the warped ground-plane image into navigable, obstacle and rock
//! masks.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{Rgb, RgbImage};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

pub use super::geom::Mask;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Colour thresholds used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// A pixel is navigable if all channels are strictly greater than these values.
    pub navigable_low: [u8; 3],

    /// A pixel is rock if red and green are strictly above the first two values and blue is
    /// strictly below the third.
    pub rock: [u8; 3],
}

/// Masks of a single warped frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedFrame {
    pub navigable: Mask,
    pub obstacle: Mask,
    pub rock: Mask,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            navigable_low: [160, 160, 160],
            rock: [110, 110, 50],
        }
    }
}

impl ClassifiedFrame {
    /// Render the masks as an image: red for obstacle, green for rock and blue for navigable.
    pub fn to_vision_image(&self) -> RgbImage {
        let (height, width) = self.navigable.dim();

        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let idx = [y as usize, x as usize];
            let on = |m: &Mask| if m[idx] { 255 } else { 0 };

            Rgb([on(&self.obstacle), on(&self.rock), on(&self.navigable)])
        })
    }

    pub fn num_navigable(&self) -> usize {
        self.navigable.iter().filter(|&&v| v).count()
    }

    pub fn num_obstacle(&self) -> usize {
        self.obstacle.iter().filter(|&&v| v).count()
    }

    pub fn num_rock(&self) -> usize {
        self.rock.iter().filter(|&&v| v).count()
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Mark pixels whose channels are all strictly greater than `low`.
pub fn classify_navigable(rgb: &RgbImage, low: [u8; 3]) -> Mask {
    mask_from_fn(rgb, |px| px[0] > low[0] && px[1] > low[1] && px[2] > low[2])
}

/// Mark rock coloured pixels, `r > thresh[0]`, `g > thresh[1]` and `b < thresh[2]`.
pub fn classify_rock(rgb: &RgbImage, thresh: [u8; 3]) -> Mask {
    mask_from_fn(rgb, |px| px[0] > thresh[0] && px[1] > thresh[1] && px[2] < thresh[2])
}

/// Everything valid which is not navigable is an obstacle.
pub fn classify_obstacle(navigable: &Mask, valid: &Mask) -> Mask {
    Zip::from(navigable)
        .and(valid)
        .map_collect(|&nav, &valid| !nav && valid)
}

/// Classify a warped frame.
///
/// The navigable mask is limited to the valid region of the warp. The rock mask is not, since rock
/// colours do not occur in the black fill outside the warp.
pub fn classify(warped: &RgbImage, valid: &Mask, thresholds: &ClassifierThresholds) -> ClassifiedFrame {
    let raw_navigable = classify_navigable(warped, thresholds.navigable_low);
    let navigable = Zip::from(&raw_navigable)
        .and(valid)
        .map_collect(|&nav, &valid| nav && valid);
    let obstacle = classify_obstacle(&navigable, valid);
    let rock = classify_rock(warped, thresholds.rock);

    ClassifiedFrame {
        navigable,
        obstacle,
        rock,
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn mask_from_fn<F>(rgb: &RgbImage, f: F) -> Mask
where
    F: Fn(&[u8; 3]) -> bool,
{
    let (width, height) = rgb.dimensions();

    Mask::from_shape_fn((height as usize, width as usize), |(row, col)| {
        f(&rgb.get_pixel(col as u32, row as u32).0)
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
