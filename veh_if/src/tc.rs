//! # Telecommand module
//!
//! Telecommands are instructions issued to the vehicle, either from a script or from an operator.
//! Each one maps directly onto an operation of the vehicle.
//!
//! Telecommands are JSON objects whose `type` field names the command, for example:
//!
//! ```json
//! {"type": "VELOCITY", "speed": 40, "angle": -10}
//! {"type": "TURN", "swing": 90}
//! {"type": "POINT_TO", "angle": 180}
//! {"type": "DISTANCE_IN_FRONT"}
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A telecommand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tc {
    /// Drive at the given speed with the front wheel at the given angle.
    Velocity { speed: i32, angle: i32 },

    /// Rotate the vehicle by a relative angle in degrees.
    Turn { swing: i32 },

    /// Rotate the vehicle to an absolute compass heading in degrees.
    PointTo { angle: i32 },

    /// Report the distance to the nearest obstacle in front.
    DistanceInFront,

    /// Report the current compass heading.
    Heading,

    /// Report the size of the latest camera image.
    Snapshot,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC is empty")]
    Empty,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        if json_str.trim().is_empty() {
            return Err(TcParseError::Empty);
        }

        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }
}
