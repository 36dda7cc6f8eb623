//! # Perception module
//!
//! Converts each camera frame into a ground-plane classification, integrates it into the
//! [`SharedWorldMap`], and derives the steering signals used by navigation.
//!
//! General procedure, once per cycle:
//!  - Warp the frame onto the ground plane and classify it into navigable, obstacle and rock masks
//!  - Project the masks into the world and integrate them into the map
//!  - Convert the navigable and rock pixels into polar [`DirectionSample`]s
//!  - Request rock pursuit if a rock is visible, unless the rover is reversing

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Terrain classification by colour thresholds
pub mod classify;

/// Pure coordinate transforms between the image, rover and world frames
pub mod geom;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::telemetry::Telemetry;
use image::RgbImage;
use log::{debug, trace};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use util::module::State;

use crate::{
    map::{MapError, SharedWorldMap},
    nav::NavMode,
};
use classify::{ClassifiedFrame, ClassifierThresholds};
use geom::{FovCrop, GeomError, Homography, Quad};

pub use geom::DirectionSample;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Position and attitude of the rover in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in world units
    pub position: Point2<f64>,

    /// Units: degrees
    pub yaw_deg: f64,

    /// Units: degrees
    pub pitch_deg: f64,

    /// Units: degrees
    pub roll_deg: f64,
}

/// Manages the perception pipeline.
#[derive(Debug, Clone)]
pub struct PerMgr {
    pub params: PerMgrParams,

    homography: Homography,

    world_map: SharedWorldMap,

    world_size: usize,

    last_classified: Option<ClassifiedFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerMgrParams {
    /// Expected size of camera frames in pixels, `[width, height]`.
    pub frame_size: [u32; 2],

    /// Four points on the camera image which outline a one world unit square on the ground,
    /// in `[x, y]` pixels.
    pub src_quad: Quad,

    /// Half the side length of the square `src_quad` is warped onto.
    ///
    /// Units: warped pixels
    pub dst_half_size: f64,

    /// Distance between the bottom of the warped image and the square `src_quad` is warped onto,
    /// since the bottom of the camera image isn't at the rover's position.
    ///
    /// Units: warped pixels
    pub bottom_offset: f64,

    /// Region of the warped image which is trusted.
    pub fov: FovCrop,

    pub thresholds: ClassifierThresholds,
}

/// Input to a single perception cycle.
#[derive(Debug, Clone)]
pub struct PerInput {
    pub frame: RgbImage,

    pub pose: Pose,

    /// Mode of the navigation state machine when the frame was captured.
    pub mode: NavMode,
}

/// Output of a single perception cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerceptionSnapshot {
    /// Direction of the navigable terrain in view.
    pub nav: DirectionSample,

    /// Direction of the visible rock, only present when rock pursuit is requested.
    pub rock: Option<DirectionSample>,

    /// Number of rock pixels seen this cycle, whether or not pursuit was requested.
    pub rock_pixels: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerStatusReport {
    pub num_navigable: usize,
    pub num_obstacle: usize,
    pub num_rock: usize,
    pub rock_requested: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PerError {
    #[error("Invalid perspective transform: {0}")]
    GeomError(GeomError),

    #[error("Expected a {expected:?} frame but got {found:?}")]
    FrameSizeMismatch { expected: [u32; 2], found: [u32; 2] },

    #[error("Could not update the world map: {0}")]
    MapError(MapError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pose {
    pub fn new(position: Point2<f64>, yaw_deg: f64, pitch_deg: f64, roll_deg: f64) -> Self {
        Self {
            position,
            yaw_deg,
            pitch_deg,
            roll_deg,
        }
    }
}

impl From<&Telemetry> for Pose {
    fn from(tm: &Telemetry) -> Self {
        Self::new(
            Point2::new(tm.position.0, tm.position.1),
            tm.yaw,
            tm.pitch,
            tm.roll,
        )
    }
}

impl Default for PerMgrParams {
    fn default() -> Self {
        Self {
            frame_size: [320, 160],
            src_quad: [[14.0, 140.0], [301.0, 140.0], [200.0, 96.0], [118.0, 96.0]],
            dst_half_size: 5.0,
            bottom_offset: 6.0,
            fov: FovCrop {
                row_min: 35,
                row_max: 160,
                col_min: 80,
                col_max: 240,
            },
            thresholds: ClassifierThresholds::default(),
        }
    }
}

impl PerMgrParams {
    /// The square on the warped image that `src_quad` is mapped onto, centred horizontally and
    /// `bottom_offset` above the bottom edge.
    pub fn dst_quad(&self) -> Quad {
        let cx = self.frame_size[0] as f64 / 2.0;
        let bottom = self.frame_size[1] as f64 - self.bottom_offset;
        let top = bottom - 2.0 * self.dst_half_size;

        [
            [cx - self.dst_half_size, bottom],
            [cx + self.dst_half_size, bottom],
            [cx + self.dst_half_size, top],
            [cx - self.dst_half_size, top],
        ]
    }

    /// Number of warped pixels per world unit.
    pub fn scale(&self) -> f64 {
        2.0 * self.dst_half_size
    }
}

impl PerceptionSnapshot {
    /// The samples navigation should steer towards, the rock if pursuit was requested or the
    /// navigable terrain otherwise.
    pub fn target(&self) -> &DirectionSample {
        match self.rock {
            Some(ref r) => r,
            None => &self.nav,
        }
    }
}

impl PerMgr {
    /// Classification of the most recently processed frame.
    pub fn last_classified(&self) -> Option<&ClassifiedFrame> {
        self.last_classified.as_ref()
    }
}

impl State for PerMgr {
    type InitData = (PerMgrParams, SharedWorldMap);
    type InitError = PerError;

    type InputData = PerInput;
    type OutputData = PerceptionSnapshot;
    type StatusReport = PerStatusReport;
    type ProcError = PerError;

    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let (params, world_map) = init_data;

        let homography =
            Homography::from_quads(&params.src_quad, &params.dst_quad()).map_err(PerError::GeomError)?;

        let world_size = world_map.read(|m| m.size()).map_err(PerError::MapError)?;

        Ok(Self {
            params,
            homography,
            world_map,
            world_size,
            last_classified: None,
        })
    }

    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let (width, height) = input_data.frame.dimensions();
        if [width, height] != self.params.frame_size {
            return Err(PerError::FrameSizeMismatch {
                expected: self.params.frame_size,
                found: [width, height],
            });
        }

        // Warp and classify
        let (warped, valid) = geom::warp_with(&input_data.frame, &self.homography, &self.params.fov);
        let classified = classify::classify(&warped, &valid, &self.params.thresholds);

        // Project into the rover frame, then the world
        let nav_pts = geom::image_to_rover_frame(&classified.navigable);
        let obs_pts = geom::image_to_rover_frame(&classified.obstacle);
        let rock_pts = geom::image_to_rover_frame(&classified.rock);

        let pose = &input_data.pose;
        let scale = self.params.scale();
        let nav_cells = geom::rotate_and_translate(&nav_pts, pose, self.world_size, scale);
        let obs_cells = geom::rotate_and_translate(&obs_pts, pose, self.world_size, scale);
        let rock_cells = if rock_pts.is_empty() {
            Vec::new()
        } else {
            geom::rotate_and_translate(&rock_pts, pose, self.world_size, scale)
        };

        self.world_map
            .integrate(&nav_cells, &obs_cells, &rock_cells)
            .map_err(PerError::MapError)?;

        // Arbitrate between exploring and rock pursuit
        let rock_requested = !rock_pts.is_empty() && input_data.mode != NavMode::Reverse;

        let snapshot = PerceptionSnapshot {
            nav: geom::to_polar(&nav_pts),
            rock: if rock_requested {
                Some(geom::to_polar(&rock_pts))
            } else {
                None
            },
            rock_pixels: rock_pts.len(),
        };

        let status = PerStatusReport {
            num_navigable: classified.num_navigable(),
            num_obstacle: classified.num_obstacle(),
            num_rock: classified.num_rock(),
            rock_requested,
        };

        if rock_requested {
            debug!("{} rock pixels in view, requesting pursuit", rock_pts.len());
        }
        trace!("Perception status: {:?}", status);

        self.last_classified = Some(classified);

        Ok((snapshot, status))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::{MapLayer, WorldMap, WorldMapParams};
    use image::Rgb;

    const GROUND: Rgb<u8> = Rgb([200, 200, 200]);
    const ROCK: Rgb<u8> = Rgb([180, 160, 20]);

    fn per_mgr() -> (PerMgr, SharedWorldMap) {
        let map = SharedWorldMap::new(WorldMap::new(WorldMapParams::default()));
        let per = PerMgr::init((PerMgrParams::default(), map.clone())).unwrap();
        (per, map)
    }

    fn input(frame: RgbImage, mode: NavMode) -> PerInput {
        PerInput {
            frame,
            pose: Pose::new(Point2::new(100.0, 100.0), 0.0, 0.0, 0.0),
            mode,
        }
    }

    /// Bright ground below the horizon with a rock in front of the rover
    fn frame_with_rock() -> RgbImage {
        RgbImage::from_fn(320, 160, |x, y| {
            if (130..190).contains(&x) && (97..109).contains(&y) {
                ROCK
            } else if y > 90 {
                GROUND
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_default_dst_quad() {
        let params = PerMgrParams::default();

        assert_eq!(
            params.dst_quad(),
            [[155.0, 154.0], [165.0, 154.0], [165.0, 144.0], [155.0, 144.0]]
        );
        assert_eq!(params.scale(), 10.0);
    }

    #[test]
    fn test_bad_quad_fails_init() {
        let map = SharedWorldMap::new(WorldMap::new(WorldMapParams::default()));
        let params = PerMgrParams {
            src_quad: [[0.0, 0.0]; 4],
            ..Default::default()
        };

        assert!(matches!(
            PerMgr::init((params, map)),
            Err(PerError::GeomError(GeomError::DegenerateQuad))
        ));
    }

    #[test]
    fn test_frame_size_mismatch() {
        let (mut per, _) = per_mgr();

        let r = per.proc(&input(RgbImage::new(10, 10), NavMode::Forward));

        assert!(matches!(r, Err(PerError::FrameSizeMismatch { .. })));
    }

    #[test]
    fn test_empty_frame_is_no_signal() {
        let (mut per, map) = per_mgr();

        let (snapshot, status) = per
            .proc(&input(RgbImage::new(320, 160), NavMode::Forward))
            .unwrap();

        assert!(snapshot.nav.is_empty());
        assert_eq!(snapshot.nav.mean_bearing_deg(), None);
        assert_eq!(snapshot.rock, None);
        assert!(snapshot.target().is_empty());
        assert!(!status.rock_requested);

        // Everything in view is an obstacle
        assert!(status.num_obstacle > 0);
        let obstacles = map
            .read(|m| m.occupied(MapLayer::Obstacle).iter().filter(|&&v| v).count())
            .unwrap();
        assert!(obstacles > 0);
    }

    #[test]
    fn test_rock_requests_pursuit() {
        let (mut per, map) = per_mgr();

        let (snapshot, status) = per
            .proc(&input(frame_with_rock(), NavMode::Forward))
            .unwrap();

        assert!(status.rock_requested);
        assert!(status.num_navigable > 0);
        assert!(snapshot.rock_pixels > 0);

        let rock = snapshot.rock.as_ref().unwrap();
        assert_eq!(rock.len(), snapshot.rock_pixels);
        assert_eq!(snapshot.target(), rock);

        // The rock is ahead of the rover so it's mapped ahead of it
        let rocks: Vec<(usize, usize)> = map
            .read(|m| {
                m.layer(MapLayer::Rock)
                    .indexed_iter()
                    .filter(|(_, &v)| v > 0)
                    .map(|((y, x), _)| (x, y))
                    .collect()
            })
            .unwrap();
        assert!(!rocks.is_empty());
        assert!(rocks.iter().all(|&(x, _)| x > 100));

        assert!(per.last_classified().is_some());
    }

    #[test]
    fn test_reverse_suppresses_pursuit() {
        let (mut per, _) = per_mgr();

        let (snapshot, status) = per
            .proc(&input(frame_with_rock(), NavMode::Reverse))
            .unwrap();

        assert!(!status.rock_requested);
        assert!(snapshot.rock_pixels > 0);
        assert_eq!(snapshot.rock, None);
        assert_eq!(snapshot.target(), &snapshot.nav);
    }

    #[test]
    fn test_pose_from_telemetry_yaw_moves_cells() {
        let (mut per, map) = per_mgr();
        let mut inp = input(frame_with_rock(), NavMode::Forward);
        inp.pose.yaw_deg = 90.0;

        per.proc(&inp).unwrap();

        // Facing +y, so the rock is mapped above the rover
        let rocks: Vec<(usize, usize)> = map
            .read(|m| {
                m.layer(MapLayer::Rock)
                    .indexed_iter()
                    .filter(|(_, &v)| v > 0)
                    .map(|((y, x), _)| (x, y))
                    .collect()
            })
            .unwrap();
        assert!(!rocks.is_empty());
        assert!(rocks.iter().all(|&(_, y)| y > 100));
    }
}
