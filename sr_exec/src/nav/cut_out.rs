//! # CutOut mode
//!
//! Holds a fixed steering angle for as many cycles as the rover spent circling, breaking out of
//! the orbit. The angles are taken in turn from an uneven list so that successive cut-outs send
//! the rover in different directions.

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
pub struct CutOutParams {
    /// Steering angles used by successive cut-outs, in degrees.
    pub steer_cuts: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for CutOutParams {
    fn default() -> Self {
        Self {
            steer_cuts: vec![-15.0, 10.0, -5.0, 15.0, -10.0, 5.0, -15.0, 15.0, -8.0, 12.0],
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn step(cycle: &mut NavCycle) {
    let params = cycle.params;
    let state = &mut cycle.state;

    // Don't turn into an obstacle on the way out of the circle
    if cycle.snapshot.nav.len() < params.stop_forward {
        state.mode = NavMode::Stop;
        return;
    }

    let cuts = &params.cut_out.steer_cuts;
    if state.steer_cut_index >= cuts.len() {
        state.steer_cut_index = 0;
    }
    cycle.cmd.steer = cuts.get(state.steer_cut_index).copied().unwrap_or(0.0);

    if state.cut_out_count >= 1 {
        state.cut_out_count -= 1;
    } else {
        state.cut_out_count = 0;
        state.steer_cut_index += 1;
        state.mode = NavMode::Forward;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
