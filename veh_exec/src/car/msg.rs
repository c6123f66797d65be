//! Messages accepted by the car's control loop

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::mpsc::Sender;

use super::CarError;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Completion channel on which the control loop replies to a single request.
pub(crate) type Reply = Sender<Result<(), CarError>>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A request to drive at a speed with the front wheel at an angle.
#[derive(Debug)]
pub(crate) struct VelocityRequest {
    pub speed: i32,
    pub angle: i32,
    pub reply: Reply,
}

/// A proposed change of the safety state, raised by the obstacle monitor.
#[derive(Debug)]
pub(crate) struct DisableSignal {
    /// Whether manual control should be disabled
    pub disable: bool,

    /// The distance which triggered the signal.
    ///
    /// Units: centimeters
    pub distance_cm: f64,

    pub reply: Reply,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Everything that can arrive in the control loop's mailbox.
#[derive(Debug)]
pub(crate) enum CarMsg {
    /// Shut the loop down, acknowledging on the given channel once finished
    Close(Sender<()>),

    Velocity(VelocityRequest),

    Disable(DisableSignal),

    /// The outstanding range finder sample has been processed
    RangingDone,
}
