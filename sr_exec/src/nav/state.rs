//! # Navigation state

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fmt::Display, str::FromStr};

use comms_if::actuation::NavCmd;
use serde::{Deserialize, Serialize};

use super::NavError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// All state carried by the navigation state machine from one cycle to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct NavState {
    pub mode: NavMode,

    /// Rolling count of cycles spent without making progress under throttle.
    pub stuck_count: f64,

    /// Rolling count of cycles spent stationary while reversing.
    pub stuck_in_stuck_count: f64,

    /// Rolling count of fast cycles spent with the steering pinned.
    pub cut_out_count: u32,

    /// Index of the next steering angle to use in CutOut.
    pub steer_cut_index: usize,

    /// The command issued in the previous cycle.
    pub last_cmd: NavCmd,

    /// A configuration fault found when the state was created. While set only the safe command
    /// is issued.
    pub fault: Option<NavError>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Modes of the navigation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavMode {
    /// Drive along the mean navigable direction.
    Forward,

    /// Brake, then turn on the spot until enough terrain is navigable.
    Stop,

    /// Back away from whatever the rover is stuck on.
    Reverse,

    /// Break out of a circular orbit by steering with a fixed angle for a while.
    CutOut,

    /// Drive towards a visible rock.
    PursueRock,

    /// Wait next to a rock while it is picked up.
    PickupRock,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavState {
    /// Create the initial state from the name of the starting mode.
    ///
    /// An unrecognised name doesn't fail, instead the fault is latched into the state.
    pub fn new(initial_mode: &str) -> Self {
        let (mode, fault) = match initial_mode.parse() {
            Ok(m) => (m, None),
            Err(e) => (NavMode::Stop, Some(e)),
        };

        Self {
            mode,
            stuck_count: 0.0,
            stuck_in_stuck_count: 0.0,
            cut_out_count: 0,
            steer_cut_index: 0,
            last_cmd: NavCmd::default(),
            fault,
        }
    }

    pub fn with_mode(mode: NavMode) -> Self {
        Self {
            mode,
            ..Self::new("forward")
        }
    }
}

impl NavMode {
    pub fn name(&self) -> &'static str {
        match self {
            NavMode::Forward => "forward",
            NavMode::Stop => "stop",
            NavMode::Reverse => "reverse",
            NavMode::CutOut => "cut_out",
            NavMode::PursueRock => "pursue_rock",
            NavMode::PickupRock => "pickup_rock",
        }
    }
}

impl FromStr for NavMode {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(NavMode::Forward),
            "stop" => Ok(NavMode::Stop),
            "reverse" => Ok(NavMode::Reverse),
            "cut_out" => Ok(NavMode::CutOut),
            "pursue_rock" => Ok(NavMode::PursueRock),
            "pickup_rock" => Ok(NavMode::PickupRock),
            _ => Err(NavError::UnknownMode(s.to_string())),
        }
    }
}

impl Display for NavMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
