//! # Actuation Commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command sent to the rover at the end of every control cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavCmd {
    /// Normalised throttle demand, negative values drive the rover backwards.
    ///
    /// Range: [-1, 1]
    pub throttle: f64,

    /// Brake demand, zero releases the brake.
    pub brake: f64,

    /// Steering angle demand, positive steers left.
    ///
    /// Units: degrees,
    /// Range: [-15, 15], widened to [-17, 17] when leaving Stop.
    pub steer: f64,

    /// Request the rover to pick up the sample it is next to.
    pub send_pickup: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavCmd {
    /// The safe neutral command: no throttle, no steer, brake engaged with the given value.
    pub fn safe(brake: f64) -> Self {
        Self {
            throttle: 0.0,
            brake,
            steer: 0.0,
            send_pickup: false,
        }
    }

    /// Returns true if the command is within the actuation envelope.
    ///
    /// `steer_limit_deg` is the widest steering angle permitted for this command.
    pub fn is_valid(&self, steer_limit_deg: f64) -> bool {
        self.throttle.is_finite()
            && self.throttle.abs() <= 1.0
            && self.brake.is_finite()
            && self.brake >= 0.0
            && self.steer.is_finite()
            && self.steer.abs() <= steer_limit_deg
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_safe_cmd() {
        let cmd = NavCmd::safe(10.0);
        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.steer, 0.0);
        assert_eq!(cmd.brake, 10.0);
        assert!(!cmd.send_pickup);
        assert!(cmd.is_valid(15.0));
    }

    #[test]
    fn test_envelope() {
        let mut cmd = NavCmd {
            throttle: 0.2,
            brake: 0.0,
            steer: 17.0,
            send_pickup: false,
        };
        assert!(!cmd.is_valid(15.0));
        assert!(cmd.is_valid(17.0));

        cmd.throttle = -1.2;
        assert!(!cmd.is_valid(17.0));
    }
}
