//! # Geometry Kernel
//!
//! Pure coordinate transforms used by perception. There are three frames involved:
//!
//! - **Image**: pixel `(row, col)` of the camera frame or of its warped ground-plane view.
//! - **Rover**: ground-plane pixels relative to the rover, +x forward with the origin at the
//!   bottom centre of the warped image and +y to the left.
//! - **World**: the global map frame. One world unit is `scale` rover pixels.
//!
//! None of these functions hold any state.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{Rgb, RgbImage};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Rotation2, Vector2, Vector3};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::Pose;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Four `[x, y]` image points describing a quadrilateral.
pub type Quad = [[f64; 2]; 4];

/// A boolean image mask indexed `[row, col]`.
pub type Mask = Array2<bool>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A projective transform between two image planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    forward: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

/// Sub-rectangle of the warped image which is trusted to contain valid ground-plane data.
///
/// Rows and columns are half open ranges, `[row_min, row_max)` and `[col_min, col_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FovCrop {
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

/// A set of 2D points stored as parallel coordinate vectors.
///
/// The frame of the points depends on where they came from, see the module documentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Points {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Polar form of a set of rover frame points.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectionSample {
    /// Distance of each point from the rover in rover pixels.
    pub distances: Vec<f64>,

    /// Bearing of each point from the rover's forward axis, counterclockwise positive.
    ///
    /// Units: radians
    pub bearings: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum GeomError {
    #[error("The perspective quads are degenerate, no unique transform maps one onto the other")]
    DegenerateQuad,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Homography {
    /// Compute the transform which maps each of the `src` points onto the matching `dst` point.
    ///
    /// With the bottom-right element fixed to one the remaining eight unknowns are the solution of
    /// an 8x8 linear system, two equations per point pair.
    pub fn from_quads(src: &Quad, dst: &Quad) -> Result<Self, GeomError> {
        let mut rows = Vec::with_capacity(64);
        let mut rhs = Vec::with_capacity(8);

        for (&[x, y], &[u, v]) in src.iter().zip(dst.iter()) {
            rows.extend_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -x * u, -y * u]);
            rhs.push(u);
            rows.extend_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -x * v, -y * v]);
            rhs.push(v);
        }

        let a = DMatrix::from_row_slice(8, 8, &rows);
        let b = DVector::from_row_slice(&rhs);

        let h = a.lu().solve(&b).ok_or(GeomError::DegenerateQuad)?;

        if h.iter().any(|v| !v.is_finite()) {
            return Err(GeomError::DegenerateQuad);
        }

        let forward = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        let inverse = forward.try_inverse().ok_or(GeomError::DegenerateQuad)?;

        Ok(Self { forward, inverse })
    }

    /// Map a source plane point into the destination plane.
    pub fn apply(&self, point: Point2<f64>) -> Point2<f64> {
        project(&self.forward, point)
    }

    /// Map a destination plane point back into the source plane.
    pub fn apply_inverse(&self, point: Point2<f64>) -> Point2<f64> {
        project(&self.inverse, point)
    }
}

impl FovCrop {
    /// Returns true if the pixel lies inside the crop.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.row_min && row < self.row_max && col >= self.col_min && col < self.col_max
    }
}

impl Points {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }
}

impl DirectionSample {
    pub fn len(&self) -> usize {
        self.bearings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bearings.is_empty()
    }

    /// Mean bearing of the sample in degrees, or `None` if the sample is empty.
    pub fn mean_bearing_deg(&self) -> Option<f64> {
        util::maths::mean(&self.bearings).map(f64::to_degrees)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Warp a camera frame onto the ground plane.
///
/// The transform maps the `src` quad in the camera image onto the `dst` quad in the warped
/// image. See [`warp_with`] for details of the output.
pub fn warp_to_ground_plane(
    frame: &RgbImage,
    src: &Quad,
    dst: &Quad,
    fov: &FovCrop,
) -> Result<(RgbImage, Mask), GeomError> {
    let homography = Homography::from_quads(src, dst)?;
    Ok(warp_with(frame, &homography, fov))
}

/// Warp a camera frame onto the ground plane using a precomputed transform.
///
/// Returns the warped image, which has the same size as the frame, and its validity mask. The
/// frame is sampled bilinearly and anything outside it is black. A warped pixel is valid when at
/// least half of its interpolation weight falls inside the frame, i.e. when warping an all-ones
/// image gives one after rounding. The mask is then narrowed to the `fov` crop, which removes the
/// stretched artifacts at the far edges of the warp.
pub fn warp_with(frame: &RgbImage, homography: &Homography, fov: &FovCrop) -> (RgbImage, Mask) {
    let (width, height) = frame.dimensions();
    let mut warped = RgbImage::new(width, height);
    let mut valid = Mask::from_elem((height as usize, width as usize), false);

    for row in 0..height {
        for col in 0..width {
            let src = homography.apply_inverse(Point2::new(col as f64, row as f64));

            let taps = match bilinear_taps(src, width, height) {
                Some(t) => t,
                None => continue,
            };

            let mut acc = [0f64; 3];
            let mut coverage = 0f64;

            for &(x, y, weight) in taps.iter() {
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    continue;
                }

                let px = frame.get_pixel(x as u32, y as u32);
                for (a, &c) in acc.iter_mut().zip(px.0.iter()) {
                    *a += weight * c as f64;
                }
                coverage += weight;
            }

            warped.put_pixel(
                col,
                row,
                Rgb([
                    to_channel(acc[0]),
                    to_channel(acc[1]),
                    to_channel(acc[2]),
                ]),
            );

            valid[[row as usize, col as usize]] =
                coverage.round() >= 1.0 && fov.contains(row as usize, col as usize);
        }
    }

    (warped, valid)
}

/// Convert every set pixel of the mask into rover frame coordinates.
///
/// Pixels are visited in row-major order. A pixel at `(row, col)` of a `height` x `width` image
/// becomes `x = height - row`, `y = width / 2 - col`.
pub fn image_to_rover_frame(mask: &Mask) -> Points {
    let (height, width) = mask.dim();
    let half_width = width as f64 / 2.0;

    let mut points = Points::default();

    for ((row, col), _) in mask.indexed_iter().filter(|(_, &set)| set) {
        points.x.push(height as f64 - row as f64);
        points.y.push(half_width - col as f64);
    }

    points
}

/// Convert rover frame points into polar form.
///
/// `distance = sqrt(x^2 + y^2)` and `bearing = atan2(y, x)`, so the origin has a distance and
/// bearing of zero.
pub fn to_polar(points: &Points) -> DirectionSample {
    let (distances, bearings) = points
        .iter()
        .map(|(x, y)| ((x * x + y * y).sqrt(), y.atan2(x)))
        .unzip();

    DirectionSample {
        distances,
        bearings,
    }
}

/// Rotate rover frame points by the given yaw angle in degrees.
pub fn rotate(points: &Points, yaw_deg: f64) -> Points {
    let rot = Rotation2::new(yaw_deg.to_radians());

    points
        .iter()
        .map(|(x, y)| {
            let r = rot * Vector2::new(x, y);
            (r.x, r.y)
        })
        .unzip_points()
}

/// Scale rotated points from rover pixels into world units and offset them by the position.
pub fn translate(points: &Points, position: &Point2<f64>, scale: f64) -> Points {
    points
        .iter()
        .map(|(x, y)| (x / scale + position.x, y / scale + position.y))
        .unzip_points()
}

/// Transform rover frame points into continuous world coordinates.
pub fn rover_to_world(points: &Points, pose: &Pose, scale: f64) -> Points {
    translate(&rotate(points, pose.yaw_deg), &pose.position, scale)
}

/// Transform rover frame points into world grid cells `(x, y)`.
///
/// Coordinates are truncated toward zero and then clamped into `[0, world_size - 1]`, so every
/// returned cell can index a `world_size` grid whatever the pose or input.
pub fn rotate_and_translate(
    points: &Points,
    pose: &Pose,
    world_size: usize,
    scale: f64,
) -> Vec<(usize, usize)> {
    rover_to_world(points, pose, scale)
        .iter()
        .map(|(x, y)| (to_grid_index(x, world_size), to_grid_index(y, world_size)))
        .collect()
}

/// Inverse of [`rover_to_world`], mapping continuous world coordinates back into the rover frame.
pub fn world_to_rover(points: &Points, pose: &Pose, scale: f64) -> Points {
    let rot = Rotation2::new(-pose.yaw_deg.to_radians());

    points
        .iter()
        .map(|(x, y)| {
            let r = rot * Vector2::new((x - pose.position.x) * scale, (y - pose.position.y) * scale);
            (r.x, r.y)
        })
        .unzip_points()
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

trait UnzipPoints {
    fn unzip_points(self) -> Points;
}

impl<I: Iterator<Item = (f64, f64)>> UnzipPoints for I {
    fn unzip_points(self) -> Points {
        let (x, y) = self.unzip();
        Points { x, y }
    }
}

fn project(m: &Matrix3<f64>, point: Point2<f64>) -> Point2<f64> {
    let p = m * Vector3::new(point.x, point.y, 1.0);
    Point2::new(p.x / p.z, p.y / p.z)
}

/// The four neighbouring pixels of a sub-pixel position with their bilinear weights.
///
/// Returns `None` for positions too far outside the image to touch it.
fn bilinear_taps(src: Point2<f64>, width: u32, height: u32) -> Option<[(i64, i64, f64); 4]> {
    if !(src.x > -1.0 && src.y > -1.0 && src.x < width as f64 && src.y < height as f64) {
        return None;
    }

    let x0 = src.x.floor();
    let y0 = src.y.floor();
    let fx = src.x - x0;
    let fy = src.y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    Some([
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ])
}

fn to_channel(value: f64) -> u8 {
    value.round().max(0.0).min(255.0) as u8
}

fn to_grid_index(value: f64, world_size: usize) -> usize {
    let max = world_size.saturating_sub(1) as i64;

    // Casting truncates toward zero and saturates, with NaN becoming zero
    (value as i64).max(0).min(max) as usize
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
