//! # PursueRock mode

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{steer_towards, NavCycle, NavMode, SpeedBand};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PursueRockParams {
    /// Throttle used to approach a rock.
    pub throttle: f64,

    /// Speed above which the rover coasts, kept low to avoid hard stops next to the rock.
    pub max_vel: f64,

    /// Speed above which the rover brakes.
    pub brake_speed: f64,

    /// Speed below which the rover brakes to stop rolling backwards.
    pub reverse_speed: f64,

    /// Brake applied when outside the speed limits.
    pub brake: f64,

    /// Brake applied on arriving next to a sample.
    pub pickup_brake: f64,

    /// Number of stuck cycles before reversing.
    pub stuck_cap: f64,

    /// Speeds which count as not making progress.
    pub stuck_band: SpeedBand,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PursueRockParams {
    fn default() -> Self {
        Self {
            throttle: 0.2,
            max_vel: 0.8,
            brake_speed: 1.0,
            reverse_speed: -0.03,
            brake: 1.0,
            pickup_brake: 10.0,
            stuck_cap: 60.0,
            stuck_band: SpeedBand::open(-0.2, 0.05),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn step(cycle: &mut NavCycle) {
    let params = cycle.params;
    let p = &params.pursue_rock;
    let telem = cycle.telem;

    if telem.throttle == p.throttle && !telem.near_sample {
        if cycle.state.stuck_count >= p.stuck_cap {
            cycle.state.mode = NavMode::Reverse;
            return;
        } else if p.stuck_band.contains(telem.speed) {
            cycle.state.stuck_count += 1.0;
        } else if cycle.state.stuck_count >= params.stuck_decay {
            cycle.state.stuck_count -= params.stuck_decay;
        }
    }

    cycle.cmd.steer = steer_towards(cycle.snapshot.target(), params.steer_limit_deg);

    cycle.cmd.brake = if telem.speed > p.brake_speed || telem.speed < p.reverse_speed {
        p.brake
    } else {
        0.0
    };

    cycle.cmd.throttle = if telem.speed < p.max_vel {
        p.throttle
    } else {
        0.0
    };

    if telem.near_sample {
        cycle.cmd.brake = p.pickup_brake;
        cycle.state.mode = NavMode::PickupRock;
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
    fn test_speed_limits() {
        let state = NavState::with_mode(NavMode::PursueRock);
        let snapshot = rock_snapshot(100, -40.0);

        let (_, cmd) = run(state.clone(), &snapshot, &telem(1.1, 0.0, 0.0), step);
        assert_eq!(cmd.brake, 1.0);
        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.steer, -15.0);

        let (_, cmd) = run(state.clone(), &snapshot, &telem(-0.05, 0.0, 0.0), step);
        assert_eq!(cmd.brake, 1.0);
        assert_eq!(cmd.throttle, 0.2);

        let (_, cmd) = run(state, &snapshot, &telem(0.5, 0.0, 0.0), step);
        assert_eq!(cmd.brake, 0.0);
        assert_eq!(cmd.throttle, 0.2);
    }

    #[test]
    fn test_stuck_pursuit_reverses() {
        let mut state = NavState::with_mode(NavMode::PursueRock);
        state.stuck_count = 59.0;
        let snapshot = rock_snapshot(100, 0.0);

        let (next, _) = run(state, &snapshot, &telem(0.0, 0.2, 0.0), step);
        assert_eq!(next.stuck_count, 60.0);
        assert_eq!(next.mode, NavMode::PursueRock);

        let (next, _) = run(next, &snapshot, &telem(0.0, 0.2, 0.0), step);
        assert_eq!(next.mode, NavMode::Reverse);
    }

    #[test]
    fn test_lost_rock_follows_terrain() {
        let state = NavState::with_mode(NavMode::PursueRock);

        let (next, cmd) = run(state, &nav_snapshot(100, 7.0), &telem(0.5, 0.2, 0.0), step);

        assert_eq!(next.mode, NavMode::PursueRock);
        assert!((cmd.steer - 7.0).abs() < 1e-9);
    }
}
