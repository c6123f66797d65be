//! # Equipment Interface
//!
//! This module defines the contracts that every piece of vehicle equipment must satisfy. Each
//! contract may be backed by real hardware or by one of the stand-ins in [`null`], the choice being
//! made once when the vehicle is constructed.
//!
//! Actuators (`Engine`, `FrontWheel`) are owned by a single controller and so take `&mut self`.
//! Sensors are shared between several execution contexts and so take `&self`, any internal
//! synchronisation being the implementation's responsibility.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// No-op stand-ins for every equipment contract.
pub mod null;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::sync::mpsc::Receiver;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Engine speed at which the vehicle is stationary.
pub const MIN_SPEED: i32 = 0;

/// A quarter of the full engine speed.
pub const QUARTER_SPEED: i32 = 25;

/// Half of the full engine speed.
pub const HALF_SPEED: i32 = 50;

/// Full engine speed.
pub const MAX_SPEED: i32 = 100;

/// Front wheel angle for driving straight ahead.
pub const STRAIGHT: i32 = 0;

/// Front wheel angle for a full left lock.
pub const FULL_LEFT: i32 = -90;

/// Front wheel angle for a full right lock.
pub const FULL_RIGHT: i32 = 90;

/// Distance reported by a range finder which can't see anything.
///
/// Units: centimeters
pub const MAX_DISTANCE_CM: f64 = 999.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single orientation sample produced by a streaming gyroscope.
///
/// Units: degrees
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can be raised by any piece of equipment.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EqptError {
    #[error("Could not write to the actuator: {0}")]
    Transport(String),

    #[error("Could not read the sensor: {0}")]
    SensorRead(String),

    #[error("The gyroscope sample stream has closed")]
    StreamClosed,

    #[error("The gyroscope is not streaming")]
    NotStreaming,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The drive motor.
pub trait Engine: Send {
    /// Run the engine at the given speed, between [`MIN_SPEED`] and [`MAX_SPEED`].
    fn run_at(&mut self, speed: i32) -> Result<(), EqptError>;

    /// Stop the engine.
    fn stop(&mut self) -> Result<(), EqptError> {
        self.run_at(MIN_SPEED)
    }
}

/// The steerable front wheel.
pub trait FrontWheel: Send {
    /// Turn the wheel to the given angle in degrees.
    ///
    /// Negative angles are to the left, positive to the right, [`STRAIGHT`] is centred.
    fn turn(&mut self, angle: i32) -> Result<(), EqptError>;
}

/// The forward facing obstacle sensor.
pub trait RangeFinder: Send + Sync {
    /// Distance to the nearest obstacle in front of the vehicle.
    ///
    /// Units: centimeters
    fn distance(&self) -> Result<f64, EqptError>;

    /// Release the sensor.
    fn close(&self);
}

/// The heading sensor.
pub trait Compass: Send + Sync {
    /// Current absolute heading of the vehicle.
    ///
    /// Units: degrees
    fn heading(&self) -> Result<f64, EqptError>;

    /// Begin continuous sampling of the heading.
    fn run(&self) -> Result<(), EqptError>;

    /// Release the sensor.
    fn close(&self) -> Result<(), EqptError>;
}

/// The rotation rate sensor.
pub trait Gyroscope: Send + Sync {
    /// Start streaming orientation samples.
    fn start(&self) -> Result<(), EqptError>;

    /// Stop streaming orientation samples.
    fn stop(&self) -> Result<(), EqptError>;

    /// Get the live sequence of orientation samples.
    ///
    /// Samples are accumulated from the moment streaming was started. The sequence ends when the
    /// gyroscope is stopped.
    fn orientations(&self) -> Result<Receiver<Orientation>, EqptError>;

    /// Release the sensor.
    fn close(&self) -> Result<(), EqptError>;
}

/// The still camera.
pub trait Camera: Send + Sync {
    /// The most recently captured image, encoded as a JPEG.
    fn current_image(&self) -> Vec<u8>;
}
