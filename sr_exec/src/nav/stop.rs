//! # Stop mode

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{NavCycle, NavMode};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopParams {
    /// Stuck count at which Stop gives up and reverses.
    pub stuck_cap: f64,

    /// Speed above which the rover is braked rather than turned.
    pub moving_speed: f64,

    /// Steering angle used to turn on the spot while searching for terrain.
    pub search_steer_deg: f64,

    /// Steering limit when leaving Stop, wider than the normal limit to turn out of a dead end.
    pub handoff_steer_limit_deg: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for StopParams {
    fn default() -> Self {
        Self {
            stuck_cap: 50.0,
            moving_speed: 0.2,
            search_steer_deg: -15.0,
            handoff_steer_limit_deg: 17.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn step(cycle: &mut NavCycle) {
    let params = cycle.params;

    if cycle.state.stuck_count >= params.stop.stuck_cap {
        cycle.state.mode = NavMode::Reverse;
        return;
    }

    if cycle.telem.speed > params.stop.moving_speed {
        cycle.cmd.throttle = 0.0;
        cycle.cmd.brake = params.brake_set;
        cycle.cmd.steer = 0.0;
    } else if cycle.num_nav() < params.go_forward {
        cycle.cmd.throttle = 0.0;
        cycle.cmd.brake = 0.0;
        cycle.cmd.steer = params.stop.search_steer_deg;
    } else {
        cycle.cmd.throttle = params.throttle_set;
        cycle.cmd.brake = 0.0;
        cycle.cmd.steer = cycle.nav_steer(params.stop.handoff_steer_limit_deg);
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

    #[test]
    fn test_stuck_stop_reverses() {
        let mut state = NavState::with_mode(NavMode::Stop);
        state.stuck_count = 50.0;
        state.last_cmd.brake = 3.0;

        let (next, cmd) = run(state, &nav_snapshot(1000, 0.0), &telem(0.0, 0.1, 4.0), step);

        // The handler ends before issuing anything
        assert_eq!(next.mode, NavMode::Reverse);
        assert_eq!(cmd.throttle, 0.1);
        assert_eq!(cmd.steer, 4.0);
        assert_eq!(cmd.brake, 3.0);
    }

    #[test]
    fn test_moving_brakes_even_with_terrain() {
        let (next, cmd) = run(
            NavState::with_mode(NavMode::Stop),
            &nav_snapshot(1000, 0.0),
            &telem(0.21, 0.0, 0.0),
            step,
        );

        assert_eq!(next.mode, NavMode::Stop);
        assert_eq!(cmd.brake, 10.0);
    }

    #[test]
    fn test_leaving_stop_uses_wider_steer() {
        let (next, cmd) = run(
            NavState::with_mode(NavMode::Stop),
            &nav_snapshot(500, -16.0),
            &telem(0.2, 0.0, 0.0),
            step,
        );

        assert_eq!(next.mode, NavMode::Forward);
        assert!((cmd.steer + 16.0).abs() < 1e-9);
    }
}
