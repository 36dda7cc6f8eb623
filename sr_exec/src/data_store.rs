//! # Data Store

use chrono::{DateTime, Utc};
use comms_if::{actuation::NavCmd, telemetry::Telemetry};
use log::info;

use crate::{
    map::MapReport,
    nav::{NavStatusReport, NavTelem},
    per::{PerStatusReport, PerceptionSnapshot, Pose},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Debug, Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// Number of cycles dropped due to bad telemetry or perception errors
    pub num_dropped_cycles: u64,

    /// True if the status should be logged this cycle
    pub is_status_cycle: bool,

    // Inputs
    pub pose: Option<Pose>,
    pub nav_telem: NavTelem,

    // Perception
    pub per_snapshot: Option<PerceptionSnapshot>,
    pub per_status_rpt: PerStatusReport,

    // Navigation
    pub nav_cmd: NavCmd,
    pub nav_status_rpt: Option<NavStatusReport>,

    // Reporting
    pub map_report: Option<MapReport>,
    pub mission: Mission,
}

/// Progress of the sample-return mission.
#[derive(Debug, Default, Clone)]
pub struct Mission {
    /// Time the first telemetry was received
    pub start_time: Option<DateTime<Utc>>,

    /// Time since the first telemetry
    pub total_time_s: f64,

    /// Number of samples in the world at the start of the mission
    pub samples_to_find: u32,

    pub samples_collected: u32,

    /// Number of samples with a mapped rock nearby
    pub samples_located: usize,

    /// Known sample positions in world units
    pub samples_pos: Vec<(f64, f64)>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Prepare the store for a new cycle.
    pub fn cycle_start(&mut self, status_log_period: u64) {
        self.num_cycles += 1;
        self.is_status_cycle = status_log_period > 0 && self.num_cycles % status_log_period == 0;
    }

    /// Record a cycle which couldn't be processed.
    pub fn drop_cycle(&mut self) {
        self.num_dropped_cycles += 1;
    }
}

impl Mission {
    /// Update the mission from a telemetry packet received at `now`.
    ///
    /// The first packet fixes the start time, the number of samples to find, and the sample
    /// positions.
    pub fn update(&mut self, tm: &Telemetry, now: DateTime<Utc>) {
        match self.start_time {
            None => {
                self.start_time = Some(now);
                self.total_time_s = 0.0;
                self.samples_to_find = tm.sample_count;
                self.samples_pos = tm.samples_pos.clone().unwrap_or_default();

                info!(
                    "Mission started, {} samples to find at {:?}",
                    self.samples_to_find, self.samples_pos
                );
            }
            Some(start) => {
                if let Some(s) = util::time::duration_to_seconds(now - start) {
                    self.total_time_s = s;
                }
            }
        }

        self.samples_collected = self.samples_to_find.saturating_sub(tm.sample_count);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;
    use image::RgbImage;

    fn telemetry(sample_count: u32, samples_pos: Option<Vec<(f64, f64)>>) -> Telemetry {
        Telemetry {
            speed: 0.0,
            position: (0.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            throttle: 0.0,
            steer: 0.0,
            near_sample: false,
            picking_up: false,
            sample_count,
            samples_pos,
            image: RgbImage::new(1, 1),
        }
    }

    #[test]
    fn test_mission_update() {
        let mut mission = Mission::default();
        let start = Utc::now();

        mission.update(&telemetry(6, Some(vec![(1.0, 2.0), (3.0, 4.0)])), start);
        assert_eq!(mission.samples_to_find, 6);
        assert_eq!(mission.samples_collected, 0);
        assert_eq!(mission.samples_pos.len(), 2);

        // Later packets don't change the samples to find
        mission.update(&telemetry(4, None), start + Duration::milliseconds(2500));
        assert_eq!(mission.samples_to_find, 6);
        assert_eq!(mission.samples_collected, 2);
        assert_eq!(mission.samples_pos.len(), 2);
        assert!((mission.total_time_s - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_status_cycles() {
        let mut ds = DataStore::default();
        let mut status = Vec::new();

        for _ in 0..25 {
            ds.cycle_start(10);
            status.push(ds.is_status_cycle);
        }

        assert_eq!(status.iter().filter(|&&s| s).count(), 2);
        assert!(status[9]);
        assert!(status[19]);
    }
}
