//! Velocity actuator
//!
//! Applies speed and angle demands to the engine and front wheel, skipping any write which would
//! not change the actuator's output.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use std::thread;

use veh_if::eqpt::{Engine, EqptError, FrontWheel, MIN_SPEED, STRAIGHT};

use super::CarParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The last values successfully written to the actuators.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorState {
    pub current_speed: i32,
    pub current_angle: i32,
}

/// The drive motor and steering servo together with their last written state.
pub(crate) struct Actuators {
    engine: Box<dyn Engine>,
    front_wheel: Box<dyn FrontWheel>,
    state: ActuatorState,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Actuators {
    /// The actuators are assumed to start stopped and centred.
    pub fn new(engine: Box<dyn Engine>, front_wheel: Box<dyn FrontWheel>) -> Self {
        Self {
            engine,
            front_wheel,
            state: ActuatorState::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ActuatorState {
        self.state
    }

    /// Apply a speed and angle.
    ///
    /// A failed speed write aborts before the angle is touched. The state only records writes
    /// which succeeded.
    pub fn apply(&mut self, speed: i32, angle: i32) -> Result<(), EqptError> {
        if speed != self.state.current_speed {
            debug!("Setting speed to {}", speed);
            self.engine.run_at(speed)?;
            self.state.current_speed = speed;
        }

        if angle != self.state.current_angle {
            debug!("Setting angle to {}", angle);
            self.front_wheel.turn(angle)?;
            self.state.current_angle = angle;
        }

        Ok(())
    }

    /// Brake by swinging the front wheel either side of centre at zero speed, then centre it.
    pub fn stop_sequence(&mut self, params: &CarParams) -> Result<(), EqptError> {
        let (first_hold, second_hold) = params.stop_holds();

        self.apply(MIN_SPEED, params.stop_angle)?;
        thread::sleep(first_hold);
        self.apply(MIN_SPEED, -params.stop_angle)?;
        thread::sleep(second_hold);
        self.apply(MIN_SPEED, STRAIGHT)
    }

    /// Unconditionally stop the engine and centre the front wheel, used at shutdown.
    pub fn park(&mut self) {
        match self.engine.stop() {
            Ok(_) => self.state.current_speed = MIN_SPEED,
            Err(e) => warn!("Could not stop the engine: {}", e),
        }

        match self.front_wheel.turn(STRAIGHT) {
            Ok(_) => self.state.current_angle = STRAIGHT,
            Err(e) => warn!("Could not centre the front wheel: {}", e),
        }
    }
}
