//! # Navigation Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{
    CutOutParams, ForwardParams, PickupRockParams, PursueRockParams, ReverseParams, StopParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavParams {
    /// Name of the mode the state machine starts in.
    pub initial_mode: String,

    /// Cruise throttle.
    pub throttle_set: f64,

    /// Brake applied when stopping.
    pub brake_set: f64,

    /// Normal steering limit in degrees.
    pub steer_limit_deg: f64,

    /// Minimum number of navigable pixels to keep driving forward.
    pub stop_forward: usize,

    /// Minimum number of navigable pixels to start driving forward again.
    pub go_forward: usize,

    /// Amount the stuck counters decay by each cycle the rover is making progress.
    pub stuck_decay: f64,

    pub forward: ForwardParams,

    pub stop: StopParams,

    pub reverse: ReverseParams,

    pub cut_out: CutOutParams,

    pub pursue_rock: PursueRockParams,

    pub pickup_rock: PickupRockParams,
}

/// A range of speeds, open at the low end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBand {
    pub low: f64,

    pub high: f64,

    /// If true the band includes `high` itself.
    #[serde(default)]
    pub high_inclusive: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for NavParams {
    fn default() -> Self {
        Self {
            initial_mode: String::from("forward"),
            throttle_set: 0.2,
            brake_set: 10.0,
            steer_limit_deg: 15.0,
            stop_forward: 50,
            go_forward: 500,
            stuck_decay: 0.5,
            forward: ForwardParams::default(),
            stop: StopParams::default(),
            reverse: ReverseParams::default(),
            cut_out: CutOutParams::default(),
            pursue_rock: PursueRockParams::default(),
            pickup_rock: PickupRockParams::default(),
        }
    }
}

impl NavParams {
    /// The widest steering angle any mode may command.
    pub fn steer_envelope_deg(&self) -> f64 {
        self.steer_limit_deg
            .max(self.stop.handoff_steer_limit_deg)
            .max(self.reverse.settled_steer_deg.abs())
            .max(self.stop.search_steer_deg.abs())
    }
}

impl SpeedBand {
    /// A band excluding both ends.
    pub fn open(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            high_inclusive: false,
        }
    }

    pub fn contains(&self, speed: f64) -> bool {
        speed > self.low && (speed < self.high || (self.high_inclusive && speed == self.high))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_params_file() {
        let params: NavParams = util::params::from_toml_str(
            r#"
            initial_mode = "stop"
            go_forward = 400

            [forward]
            max_vel = 1.5

            [cut_out]
            steer_cuts = [-10.0, 10.0]
            "#,
        )
        .unwrap();

        assert_eq!(params.initial_mode, "stop");
        assert_eq!(params.go_forward, 400);
        assert_eq!(params.stop_forward, 50);
        assert_eq!(params.forward.max_vel, 1.5);
        assert_eq!(params.forward.stuck_cap, 55.0);
        assert_eq!(params.cut_out.steer_cuts, vec![-10.0, 10.0]);
        assert_eq!(params.steer_envelope_deg(), 17.0);
    }

    #[test]
    fn test_speed_band() {
        let open = SpeedBand::open(-0.2, 0.06);
        assert!(open.contains(0.0));
        assert!(!open.contains(-0.2));
        assert!(!open.contains(0.06));

        let closed_high = SpeedBand {
            high_inclusive: true,
            ..open
        };
        assert!(closed_high.contains(0.06));
        assert!(!closed_high.contains(-0.2));
    }
}
