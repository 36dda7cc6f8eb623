//! # Navigation module
//!
//! This module implements the navigation state machine, which turns each cycle's perception and
//! telemetry into a [`NavCmd`]. The state machine is broken down into a number of modes:
//!
//! - `Forward` - Drive along the mean direction of the navigable terrain. Switches to `CutOut` if
//!   the rover has been circling at speed, to `Reverse` if it's stuck, and to `Stop` if the
//!   navigable terrain runs out.
//! - `Stop` - Brake to a halt, then turn on the spot until enough navigable terrain is in view.
//! - `Reverse` - Back away from an obstacle, or from a rock which has just been picked up.
//! - `CutOut` - Steer with a fixed angle for a while to break out of a circular orbit.
//! - `PursueRock` - Drive slowly towards a visible rock. Entered whenever perception sees a rock
//!   and the rover isn't reversing.
//! - `PickupRock` - Hold still beside a rock until it has been picked up.
//!
//! All transitions happen inside [`step`], a pure function of the previous state and the cycle's
//! inputs. [`NavCtrl`] wraps it for use in the executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod cut_out;
mod forward;
mod params;
mod pickup_rock;
mod pursue_rock;
mod reverse;
mod state;
mod stop;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{actuation::NavCmd, telemetry::Telemetry};
use log::{debug, error, info};
use serde::Serialize;
use util::{maths, module::State};

use crate::per::{DirectionSample, PerceptionSnapshot};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use self::{
    cut_out::CutOutParams,
    forward::ForwardParams,
    params::{NavParams, SpeedBand},
    pickup_rock::PickupRockParams,
    pursue_rock::PursueRockParams,
    reverse::ReverseParams,
    state::{NavMode, NavState},
    stop::StopParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Navigation controller, owns the state machine's state between cycles.
#[derive(Debug, Clone)]
pub struct NavCtrl {
    pub params: NavParams,

    state: NavState,
}

/// The scalar telemetry used by navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NavTelem {
    pub speed: f64,

    /// Throttle the rover reports it is applying.
    pub throttle: f64,

    /// Steering angle the rover reports it is applying, in degrees.
    pub steer: f64,

    pub near_sample: bool,

    pub picking_up: bool,
}

/// Input to a single navigation cycle.
#[derive(Debug, Clone)]
pub struct NavInput {
    /// This cycle's perception, `None` before the first frame has been processed.
    pub snapshot: Option<PerceptionSnapshot>,

    pub telem: NavTelem,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavStatusReport {
    pub mode: NavMode,
    pub mode_changed: bool,
    pub stuck_count: f64,
    pub stuck_in_stuck_count: f64,
    pub cut_out_count: u32,
    pub steer_cut_index: usize,
    pub faulted: bool,
}

/// Working data of a single cycle, passed to each mode's handler.
pub(super) struct NavCycle<'a> {
    pub state: NavState,

    /// Command being built, any field a handler doesn't set keeps its starting value.
    pub cmd: NavCmd,

    pub snapshot: &'a PerceptionSnapshot,

    pub telem: &'a NavTelem,

    pub params: &'a NavParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavError {
    #[error("Unknown navigation mode \"{0}\"")]
    UnknownMode(String),

    #[error("No CutOut steering angles are configured")]
    NoSteerCuts,

    #[error("Navigation produced a command outside the actuation envelope: {0:?}")]
    CommandOutOfEnvelope(NavCmd),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl From<&Telemetry> for NavTelem {
    fn from(tm: &Telemetry) -> Self {
        Self {
            speed: tm.speed,
            throttle: tm.throttle,
            steer: tm.steer,
            near_sample: tm.near_sample,
            picking_up: tm.picking_up,
        }
    }
}

impl NavCycle<'_> {
    /// Number of navigable pixels in view.
    pub fn num_nav(&self) -> usize {
        self.snapshot.nav.len()
    }

    /// Steering angle towards the navigable terrain, clipped to `limit_deg`.
    pub fn nav_steer(&self, limit_deg: f64) -> f64 {
        steer_towards(&self.snapshot.nav, limit_deg)
    }
}

impl NavCtrl {
    pub fn state(&self) -> &NavState {
        &self.state
    }
}

impl State for NavCtrl {
    type InitData = NavParams;
    type InitError = NavError;

    type InputData = NavInput;
    type OutputData = NavCmd;
    type StatusReport = NavStatusReport;
    type ProcError = NavError;

    /// Initialise the controller.
    ///
    /// An unknown initial mode is not an error here, it's logged and the controller issues only the
    /// safe command from then on.
    fn init(params: Self::InitData) -> Result<Self, Self::InitError> {
        if params.cut_out.steer_cuts.is_empty() {
            return Err(NavError::NoSteerCuts);
        }

        let state = NavState::new(&params.initial_mode);

        match state.fault {
            Some(ref e) => error!(
                "NavCtrl configuration fault, only the safe command will be issued: {}",
                e
            ),
            None => info!("NavCtrl initialised in {}", state.mode),
        }

        Ok(Self { params, state })
    }

    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let (state, cmd) = step(
            &self.state,
            input_data.snapshot.as_ref(),
            &input_data.telem,
            &self.params,
        );

        let steer_limit =
            command_steer_limit(&self.state, &state, &cmd, &input_data.telem, &self.params);
        if !cmd.is_valid(steer_limit) {
            // The safe command is issued instead, so the cycle's transition is discarded
            self.state.last_cmd = NavCmd::safe(self.params.brake_set);
            return Err(NavError::CommandOutOfEnvelope(cmd));
        }

        let mode_changed = state.mode != self.state.mode;
        if mode_changed {
            info!("NavCtrl mode change: {} -> {}", self.state.mode, state.mode);
        }
        if cmd.send_pickup {
            info!("Requesting sample pickup");
        }
        debug!("NavCmd: {:?}", cmd);

        self.state = state;

        let status = NavStatusReport {
            mode: self.state.mode,
            mode_changed,
            stuck_count: self.state.stuck_count,
            stuck_in_stuck_count: self.state.stuck_in_stuck_count,
            cut_out_count: self.state.cut_out_count,
            steer_cut_index: self.state.steer_cut_index,
            faulted: self.state.fault.is_some(),
        };

        Ok((cmd, status))
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Advance the navigation state machine by one cycle.
///
/// Returns the new state and the command to issue. The command starts from the rover's reported
/// throttle and steering and the previous cycle's brake, and each mode only changes the fields it
/// needs to.
pub fn step(
    state: &NavState,
    snapshot: Option<&PerceptionSnapshot>,
    telem: &NavTelem,
    params: &NavParams,
) -> (NavState, NavCmd) {
    if state.fault.is_some() {
        let cmd = NavCmd::safe(params.brake_set);
        let mut state = state.clone();
        state.last_cmd = cmd;
        return (state, cmd);
    }

    let start_cmd = NavCmd {
        throttle: telem.throttle,
        brake: state.last_cmd.brake,
        steer: telem.steer,
        send_pickup: false,
    };

    let (mut state, mut cmd) = match snapshot {
        Some(snapshot) => {
            let mut cycle = NavCycle {
                state: state.clone(),
                cmd: start_cmd,
                snapshot,
                telem,
                params,
            };

            // Perception's request for rock pursuit
            if snapshot.rock.is_some() && cycle.state.mode != NavMode::Reverse {
                cycle.state.mode = NavMode::PursueRock;
            }

            match cycle.state.mode {
                NavMode::Forward => forward::step(&mut cycle),
                NavMode::Stop => stop::step(&mut cycle),
                NavMode::Reverse => reverse::step(&mut cycle),
                NavMode::CutOut => cut_out::step(&mut cycle),
                NavMode::PursueRock => pursue_rock::step(&mut cycle),
                NavMode::PickupRock => pickup_rock::step(&mut cycle),
            }

            (cycle.state, cycle.cmd)
        }
        // No perception yet, just drive forward
        None => (
            state.clone(),
            NavCmd {
                throttle: params.throttle_set,
                steer: 0.0,
                brake: 0.0,
                ..start_cmd
            },
        ),
    };

    // Pickup trigger, overrides whatever the mode decided
    if telem.near_sample && telem.speed == 0.0 && !telem.picking_up {
        state.stuck_count = 0.0;
        cmd.send_pickup = true;
    } else {
        cmd.send_pickup = false;
    }

    state.last_cmd = cmd;

    (state, cmd)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The widest steering angle `cmd` may carry.
///
/// Only the Stop to Forward handoff may exceed the normal limit. A steering angle passed through
/// unchanged from the rover's echo is already applied, so it's held to the widest envelope.
fn command_steer_limit(
    prev: &NavState,
    next: &NavState,
    cmd: &NavCmd,
    telem: &NavTelem,
    params: &NavParams,
) -> f64 {
    let handoff = prev.mode == NavMode::Stop && next.mode == NavMode::Forward;

    if handoff || cmd.steer == telem.steer {
        params.steer_envelope_deg()
    } else {
        params.steer_limit_deg
    }
}

/// Mean bearing of the sample in degrees clipped to `limit_deg`, or zero for an empty sample.
fn steer_towards(sample: &DirectionSample, limit_deg: f64) -> f64 {
    maths::clip_symmetric(sample.mean_bearing_deg().unwrap_or(0.0), limit_deg)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
pub(super) mod test_utils {
    use super::*;

    /// A snapshot with `n` navigable pixels all at the given bearing in degrees.
    pub fn nav_snapshot(n: usize, bearing_deg: f64) -> PerceptionSnapshot {
        PerceptionSnapshot {
            nav: sample(n, bearing_deg),
            rock: None,
            rock_pixels: 0,
        }
    }

    /// A snapshot with a requested rock at the given bearing and `n` navigable pixels straight
    /// ahead.
    pub fn rock_snapshot(n: usize, bearing_deg: f64) -> PerceptionSnapshot {
        PerceptionSnapshot {
            nav: sample(n, 0.0),
            rock: Some(sample(10, bearing_deg)),
            rock_pixels: 10,
        }
    }

    pub fn sample(n: usize, bearing_deg: f64) -> DirectionSample {
        DirectionSample {
            distances: vec![10.0; n],
            bearings: vec![bearing_deg.to_radians(); n],
        }
    }

    pub fn telem(speed: f64, throttle: f64, steer: f64) -> NavTelem {
        NavTelem {
            speed,
            throttle,
            steer,
            near_sample: false,
            picking_up: false,
        }
    }

    pub fn run(
        state: NavState,
        snapshot: &PerceptionSnapshot,
        telem: &NavTelem,
        f: fn(&mut NavCycle),
    ) -> (NavState, NavCmd) {
        let params = NavParams::default();
        let mut cycle = NavCycle {
            cmd: NavCmd {
                throttle: telem.throttle,
                brake: state.last_cmd.brake,
                steer: telem.steer,
                send_pickup: false,
            },
            state,
            snapshot,
            telem,
            params: &params,
        };

        f(&mut cycle);

        (cycle.state, cycle.cmd)
    }
}

#[cfg(test)]
mod test {
    use super::test_utils::*;
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_no_perception_drives_forward() {
        let params = NavParams::default();
        let mut state = NavState::with_mode(NavMode::Stop);
        state.last_cmd.brake = 10.0;

        let (next, cmd) = step(&state, None, &telem(0.0, 0.0, 12.0), &params);

        assert_eq!(next.mode, NavMode::Stop);
        assert_eq!(cmd.throttle, params.throttle_set);
        assert_eq!(cmd.steer, 0.0);
        assert_eq!(cmd.brake, 0.0);
        assert!(!cmd.send_pickup);
    }

    #[test]
    fn test_forward_sparse_nav_stops() {
        let params = NavParams::default();
        let state = NavState::with_mode(NavMode::Forward);

        let (next, cmd) = step(
            &state,
            Some(&nav_snapshot(10, 5.0)),
            &telem(1.0, 0.2, 3.0),
            &params,
        );

        assert_eq!(next.mode, NavMode::Stop);
        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.steer, 0.0);
    }

    #[test]
    fn test_stop_dense_nav_goes_forward() {
        let params = NavParams::default();
        let state = NavState::with_mode(NavMode::Stop);

        let (next, cmd) = step(
            &state,
            Some(&nav_snapshot(600, 20.0)),
            &telem(0.0, 0.0, -15.0),
            &params,
        );

        assert_eq!(next.mode, NavMode::Forward);
        assert_eq!(cmd.brake, 0.0);
        assert_eq!(cmd.throttle, params.throttle_set);
        assert_eq!(cmd.steer, 17.0);
    }

    #[test]
    fn test_stop_search_turns_on_the_spot() {
        let params = NavParams::default();
        let mut state = NavState::with_mode(NavMode::Forward);

        // Forward runs out of terrain and stops, braking while still moving
        let snapshot = nav_snapshot(20, 0.0);
        let (next, _) = step(&state, Some(&snapshot), &telem(1.0, 0.2, 0.0), &params);
        assert_eq!(next.mode, NavMode::Stop);
        state = next;

        let (next, cmd) = step(&state, Some(&snapshot), &telem(0.8, 0.0, 0.0), &params);
        assert_eq!(next.mode, NavMode::Stop);
        assert_eq!(cmd.brake, params.brake_set);
        assert_eq!(cmd.throttle, 0.0);
        state = next;

        // Stationary, release the brake and turn
        let (next, cmd) = step(&state, Some(&snapshot), &telem(0.1, 0.0, 0.0), &params);
        assert_eq!(next.mode, NavMode::Stop);
        assert_eq!(cmd.brake, 0.0);
        assert_eq!(cmd.steer, params.stop.search_steer_deg);
    }

    #[test]
    fn test_brake_is_held_between_cycles() {
        let params = NavParams::default();
        let mut state = NavState::with_mode(NavMode::PursueRock);
        state.last_cmd.brake = 10.0;

        // PickupRock doesn't touch the brake
        state.mode = NavMode::PickupRock;
        let mut t = telem(0.0, 0.0, 0.0);
        t.near_sample = true;
        t.picking_up = true;

        let (_, cmd) = step(&state, Some(&nav_snapshot(100, 0.0)), &t, &params);

        assert_eq!(cmd.brake, 10.0);
    }

    #[test]
    fn test_rock_scenario() {
        let params = NavParams::default();
        let mut state = NavState::with_mode(NavMode::Forward);
        let rock = rock_snapshot(300, 10.0);
        let mut pickups = 0;

        // Rock seen, pursue it
        let (next, cmd) = step(&state, Some(&rock), &telem(0.5, 0.2, 0.0), &params);
        assert_eq!(next.mode, NavMode::PursueRock);
        assert_abs_diff_eq!(cmd.steer, 10.0, epsilon = 1e-9);
        assert_eq!(cmd.throttle, 0.2);
        assert!(!cmd.send_pickup);
        state = next;

        // Arrive next to the rock while still moving
        let mut t = telem(0.3, 0.2, 10.0);
        t.near_sample = true;
        let (next, cmd) = step(&state, Some(&rock), &t, &params);
        assert_eq!(next.mode, NavMode::PickupRock);
        assert_eq!(cmd.brake, params.pursue_rock.pickup_brake);
        assert!(!cmd.send_pickup);
        state = next;

        // Stationary beside the rock, still in view
        for picking_up in [false, true, true].iter() {
            let mut t = telem(0.0, 0.0, 0.0);
            t.near_sample = true;
            t.picking_up = *picking_up;

            let (next, cmd) = step(&state, Some(&rock), &t, &params);
            assert_eq!(next.mode, NavMode::PickupRock);
            assert_eq!(cmd.send_pickup, !picking_up);
            if cmd.send_pickup {
                pickups += 1;
                assert_eq!(next.stuck_count, 0.0);
            }
            state = next;
        }

        // Rock collected, back away from where it was
        let (next, cmd) = step(
            &state,
            Some(&nav_snapshot(300, 0.0)),
            &telem(0.0, 0.0, 0.0),
            &params,
        );
        assert_eq!(next.mode, NavMode::Reverse);
        assert_eq!(next.stuck_count, params.pickup_rock.post_pickup_reverse);
        assert!(!cmd.send_pickup);

        assert_eq!(pickups, 1);
    }

    #[test]
    fn test_reverse_ignores_rocks() {
        let params = NavParams::default();
        let mut state = NavState::with_mode(NavMode::Reverse);
        state.stuck_count = 10.0;

        let (next, cmd) = step(
            &state,
            Some(&rock_snapshot(100, 10.0)),
            &telem(-0.5, -0.6, 0.0),
            &params,
        );

        assert_eq!(next.mode, NavMode::Reverse);
        assert_eq!(cmd.throttle, params.reverse.throttle);
    }

    #[test]
    fn test_cut_out_sparse_nav_stops() {
        let params = NavParams::default();
        let mut state = NavState::with_mode(NavMode::CutOut);
        state.cut_out_count = 40;
        state.steer_cut_index = 3;

        let (next, _) = step(
            &state,
            Some(&nav_snapshot(10, 0.0)),
            &telem(1.5, 0.2, 15.0),
            &params,
        );

        assert_eq!(next.mode, NavMode::Stop);
        assert_eq!(next.cut_out_count, 40);
        assert_eq!(next.steer_cut_index, 3);
    }

    #[test]
    fn test_circling_triggers_cut_out() {
        let params = NavParams::default();
        let mut state = NavState::with_mode(NavMode::Forward);
        let snapshot = nav_snapshot(1000, 40.0);
        let t = telem(1.5, 0.0, 15.0);

        for _ in 0..params.forward.cut_out_cap {
            let (next, cmd) = step(&state, Some(&snapshot), &t, &params);
            assert_eq!(next.mode, NavMode::Forward);
            assert_eq!(cmd.steer, 15.0);
            state = next;
        }
        assert_eq!(state.cut_out_count, params.forward.cut_out_cap);

        let (next, _) = step(&state, Some(&snapshot), &t, &params);
        assert_eq!(next.mode, NavMode::CutOut);

        // Steer with the first cut until the count runs out
        let (next, cmd) = step(&next, Some(&snapshot), &t, &params);
        assert_eq!(next.mode, NavMode::CutOut);
        assert_eq!(cmd.steer, params.cut_out.steer_cuts[0]);
    }

    #[test]
    fn test_faulted_state_issues_safe_command() {
        let params = NavParams::default();
        let state = NavState::new("sideways");

        for snapshot in [None, Some(nav_snapshot(1000, 0.0))].iter() {
            let (next, cmd) = step(&state, snapshot.as_ref(), &telem(1.0, 0.2, 5.0), &params);

            assert_eq!(cmd, NavCmd::safe(params.brake_set));
            assert!(next.fault.is_some());
        }
    }

    #[test]
    fn test_nav_ctrl() {
        let mut ctrl = NavCtrl::init(NavParams::default()).unwrap();

        let (cmd, status) = ctrl
            .proc(&NavInput {
                snapshot: Some(nav_snapshot(10, 0.0)),
                telem: telem(0.5, 0.2, 0.0),
            })
            .unwrap();

        assert!(status.mode_changed);
        assert_eq!(status.mode, NavMode::Stop);
        assert_eq!(ctrl.state().mode, NavMode::Stop);
        assert_eq!(cmd.throttle, 0.0);
    }

    #[test]
    fn test_nav_ctrl_unknown_mode() {
        let params = NavParams {
            initial_mode: "spin".into(),
            ..Default::default()
        };

        let mut ctrl = NavCtrl::init(params).unwrap();
        let (cmd, status) = ctrl
            .proc(&NavInput {
                snapshot: None,
                telem: telem(0.0, 0.0, 0.0),
            })
            .unwrap();

        assert!(status.faulted);
        assert_eq!(cmd, NavCmd::safe(ctrl.params.brake_set));
    }

    #[test]
    fn test_nav_ctrl_rejects_bad_params() {
        let mut params = NavParams::default();
        params.cut_out.steer_cuts.clear();

        assert!(matches!(NavCtrl::init(params), Err(NavError::NoSteerCuts)));

        // Cuts outside the steering envelope are caught when issued
        let mut params = NavParams::default();
        params.cut_out.steer_cuts = vec![40.0];
        let mut ctrl = NavCtrl::init(params).unwrap();
        ctrl.state.mode = NavMode::CutOut;
        ctrl.state.cut_out_count = 5;

        let r = ctrl.proc(&NavInput {
            snapshot: Some(nav_snapshot(100, 0.0)),
            telem: telem(1.0, 0.2, 0.0),
        });

        assert!(matches!(r, Err(NavError::CommandOutOfEnvelope(_))));
    }

    #[test]
    fn test_wide_cut_is_rejected_and_discarded() {
        let mut params = NavParams::default();
        params.cut_out.steer_cuts = vec![16.0];
        let brake_set = params.brake_set;

        let mut ctrl = NavCtrl::init(params).unwrap();
        ctrl.state.mode = NavMode::CutOut;
        ctrl.state.cut_out_count = 5;
        ctrl.state.last_cmd.brake = 0.0;

        let r = ctrl.proc(&NavInput {
            snapshot: Some(nav_snapshot(100, 0.0)),
            telem: telem(1.0, 0.2, 0.0),
        });

        match r {
            Err(NavError::CommandOutOfEnvelope(cmd)) => assert_eq!(cmd.steer, 16.0),
            other => panic!("Expected the cut to be rejected, got {:?}", other),
        }

        // The safe command was sent in its place and the transition didn't happen
        assert_eq!(ctrl.state().last_cmd, NavCmd::safe(brake_set));
        assert_eq!(ctrl.state().mode, NavMode::CutOut);
        assert_eq!(ctrl.state().cut_out_count, 5);
        assert_eq!(ctrl.state().steer_cut_index, 0);

        // The next cycle starts from the safe command's brake
        let (next, _) = step(
            ctrl.state(),
            Some(&nav_snapshot(10, 0.0)),
            &telem(1.0, 0.2, 0.0),
            &ctrl.params,
        );
        assert_eq!(next.mode, NavMode::Stop);
        assert_eq!(next.last_cmd.brake, brake_set);
    }

    #[test]
    fn test_handoff_may_use_wider_steer() {
        let mut ctrl = NavCtrl::init(NavParams::default()).unwrap();
        ctrl.state.mode = NavMode::Stop;

        let (cmd, status) = ctrl
            .proc(&NavInput {
                snapshot: Some(nav_snapshot(500, -16.0)),
                telem: telem(0.0, 0.0, 0.0),
            })
            .unwrap();

        assert_eq!(status.mode, NavMode::Forward);
        assert_abs_diff_eq!(cmd.steer, -16.0, epsilon = 1e-9);
    }
}
