//! # PickupRock mode

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
pub struct PickupRockParams {
    /// Stuck count set once the sample is collected, giving a short reverse away from it.
    pub post_pickup_reverse: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PickupRockParams {
    fn default() -> Self {
        Self {
            post_pickup_reverse: 30.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn step(cycle: &mut NavCycle) {
    cycle.cmd.steer = 0.0;
    cycle.cmd.send_pickup = !cycle.telem.picking_up;

    if !cycle.telem.near_sample {
        cycle.state.stuck_count = cycle.params.pickup_rock.post_pickup_reverse;
        cycle.state.mode = NavMode::Reverse;
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
    fn test_pickup_waits_beside_sample() {
        let mut t = telem(0.0, 0.0, 5.0);
        t.near_sample = true;

        let (next, cmd) = run(
            NavState::with_mode(NavMode::PickupRock),
            &nav_snapshot(10, 0.0),
            &t,
            step,
        );

        assert_eq!(next.mode, NavMode::PickupRock);
        assert_eq!(cmd.steer, 0.0);
        assert!(cmd.send_pickup);
    }
}
