//! # Forward mode

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
pub struct ForwardParams {
    /// Speed above which the rover coasts.
    pub max_vel: f64,

    /// Speed at or above which pinned steering counts towards a cut-out.
    pub cut_out_speed: f64,

    /// Number of pinned steering cycles before cutting out of the turn.
    pub cut_out_cap: u32,

    /// Number of stuck cycles before reversing.
    pub stuck_cap: f64,

    /// Speeds which count as not making progress.
    pub stuck_band: SpeedBand,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ForwardParams {
    fn default() -> Self {
        Self {
            max_vel: 2.0,
            cut_out_speed: 1.3,
            cut_out_cap: 50,
            stuck_cap: 55.0,
            stuck_band: SpeedBand::open(-0.2, 0.06),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn step(cycle: &mut NavCycle) {
    let params = cycle.params;
    let telem = cycle.telem;
    let state = &mut cycle.state;

    cycle.cmd.brake = 0.0;

    // Fast with the steering pinned means the rover is probably orbiting
    if telem.speed >= params.forward.cut_out_speed {
        if state.cut_out_count >= params.forward.cut_out_cap {
            state.mode = NavMode::CutOut;
            return;
        } else if telem.steer.abs() == params.steer_limit_deg {
            state.cut_out_count += 1;
        } else if state.cut_out_count >= 1 {
            state.cut_out_count -= 1;
        }
    }

    // Stuck guard, only valid while the rover is applying the cruise throttle
    if telem.throttle == params.throttle_set {
        if state.stuck_count >= params.forward.stuck_cap {
            state.mode = NavMode::Reverse;
            return;
        } else if params.forward.stuck_band.contains(telem.speed) {
            state.stuck_count += 1.0;
        } else if state.stuck_count >= params.stuck_decay {
            state.stuck_count -= params.stuck_decay;
        }
    }

    if cycle.num_nav() >= params.stop_forward {
        cycle.cmd.brake = 0.0;
        cycle.cmd.throttle = if telem.speed < params.forward.max_vel {
            params.throttle_set
        } else {
            0.0
        };
        cycle.cmd.steer = cycle.nav_steer(params.steer_limit_deg);
    } else {
        cycle.cmd.throttle = 0.0;
        cycle.cmd.steer = 0.0;
        cycle.state.mode = NavMode::Stop;
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
    fn test_cruise() {
        let (state, cmd) = run(
            NavState::with_mode(NavMode::Forward),
            &nav_snapshot(100, -30.0),
            &telem(1.0, 0.0, 0.0),
            step,
        );

        assert_eq!(state.mode, NavMode::Forward);
        assert_eq!(cmd.throttle, 0.2);
        assert_eq!(cmd.steer, -15.0);
        assert_eq!(cmd.brake, 0.0);

        // Coast at max speed
        let (_, cmd) = run(state, &nav_snapshot(100, 0.0), &telem(2.0, 0.2, 0.0), step);
        assert_eq!(cmd.throttle, 0.0);
    }

    #[test]
    fn test_stuck_guard() {
        let mut state = NavState::with_mode(NavMode::Forward);
        state.stuck_count = 54.0;
        let snapshot = nav_snapshot(100, 0.0);

        // Not stuck while moving, the count decays
        let (next, _) = run(state.clone(), &snapshot, &telem(0.5, 0.2, 0.0), step);
        assert_eq!(next.stuck_count, 53.5);

        // Only counts while applying the cruise throttle
        let (next, _) = run(state.clone(), &snapshot, &telem(0.0, 0.1, 0.0), step);
        assert_eq!(next.stuck_count, 54.0);

        let (next, _) = run(state, &snapshot, &telem(0.0, 0.2, 0.0), step);
        assert_eq!(next.stuck_count, 55.0);
        assert_eq!(next.mode, NavMode::Forward);

        let (next, _) = run(next, &snapshot, &telem(0.0, 0.2, 0.0), step);
        assert_eq!(next.mode, NavMode::Reverse);
    }

    #[test]
    fn test_stuck_band_is_open() {
        let snapshot = nav_snapshot(100, 0.0);

        for &speed in [-0.2, 0.06].iter() {
            let (next, _) = run(
                NavState::with_mode(NavMode::Forward),
                &snapshot,
                &telem(speed, 0.2, 0.0),
                step,
            );
            assert_eq!(next.stuck_count, 0.0);
        }
    }

    #[test]
    fn test_cut_out_count_decays() {
        let mut state = NavState::with_mode(NavMode::Forward);
        state.cut_out_count = 3;

        let (next, _) = run(state, &nav_snapshot(100, 0.0), &telem(1.5, 0.2, 5.0), step);

        assert_eq!(next.cut_out_count, 2);
    }
}
