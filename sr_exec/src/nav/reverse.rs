//! # Reverse mode

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{NavCycle, NavMode, SpeedBand};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseParams {
    /// Throttle applied while reversing.
    pub throttle: f64,

    /// Speeds at which the rover is considered settled, i.e. stuck even while reversing.
    pub settled_band: SpeedBand,

    /// Settled count at which the rover stops reversing and turns instead.
    pub settled_cap: f64,

    /// Steering angle used to turn out of a settled reverse.
    pub settled_steer_deg: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ReverseParams {
    fn default() -> Self {
        Self {
            throttle: -0.6,
            settled_band: SpeedBand {
                low: -0.02,
                high: 0.02,
                high_inclusive: true,
            },
            settled_cap: 25.0,
            settled_steer_deg: 15.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn step(cycle: &mut NavCycle) {
    let params = cycle.params;
    let p = &params.reverse;

    cycle.cmd.brake = 0.0;
    cycle.cmd.throttle = p.throttle;

    if p.settled_band.contains(cycle.telem.speed) {
        cycle.state.stuck_in_stuck_count += 1.0;
    } else if cycle.state.stuck_in_stuck_count >= params.stuck_decay {
        cycle.state.stuck_in_stuck_count -= params.stuck_decay;
    }

    if cycle.num_nav() < params.go_forward {
        cycle.cmd.steer = 0.0;
    } else if cycle.state.stuck_in_stuck_count >= p.settled_cap {
        cycle.cmd.steer = p.settled_steer_deg;
        cycle.cmd.throttle = 0.0;
    } else {
        // Steer away from the direction that got us stuck
        cycle.cmd.steer = -cycle.nav_steer(params.steer_limit_deg);
    }

    if cycle.state.stuck_count >= params.stuck_decay {
        cycle.state.stuck_count -= params.stuck_decay;
    } else {
        cycle.cmd.throttle = params.throttle_set;
        cycle.state.stuck_count = 0.0;
        cycle.state.stuck_in_stuck_count = 0.0;
        cycle.state.mode = NavMode::Forward;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::super::{test_utils::*, NavState};
    use super::*;

    fn reversing(stuck_count: f64, stuck_in_stuck_count: f64) -> NavState {
        let mut state = NavState::with_mode(NavMode::Reverse);
        state.stuck_count = stuck_count;
        state.stuck_in_stuck_count = stuck_in_stuck_count;
        state
    }

    #[test]
    fn test_reverse_steers_away() {
        let (next, cmd) = run(
            reversing(10.0, 0.0),
            &nav_snapshot(600, 10.0),
            &telem(-0.4, -0.6, 0.0),
            step,
        );

        assert_eq!(next.mode, NavMode::Reverse);
        assert_eq!(next.stuck_count, 9.5);
        assert_eq!(cmd.throttle, -0.6);
        assert!((cmd.steer + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_settled_band_includes_upper_bound() {
        let (next, _) = run(
            reversing(10.0, 0.0),
            &nav_snapshot(100, 0.0),
            &telem(0.02, -0.6, 0.0),
            step,
        );
        assert_eq!(next.stuck_in_stuck_count, 1.0);

        let (next, _) = run(
            reversing(10.0, 3.0),
            &nav_snapshot(100, 0.0),
            &telem(-0.02, -0.6, 0.0),
            step,
        );
        assert_eq!(next.stuck_in_stuck_count, 2.5);
    }

    #[test]
    fn test_settled_turns() {
        let (_, cmd) = run(
            reversing(10.0, 24.0),
            &nav_snapshot(600, 10.0),
            &telem(0.0, -0.6, 0.0),
            step,
        );

        assert_eq!(cmd.steer, 15.0);
        assert_eq!(cmd.throttle, 0.0);
    }

    #[test]
    fn test_reverse_exits_to_forward() {
        let (next, cmd) = run(
            reversing(0.4, 12.0),
            &nav_snapshot(600, 10.0),
            &telem(-0.4, -0.6, 0.0),
            step,
        );

        assert_eq!(next.mode, NavMode::Forward);
        assert_eq!(next.stuck_count, 0.0);
        assert_eq!(next.stuck_in_stuck_count, 0.0);
        assert_eq!(cmd.throttle, 0.2);
    }
}
