//! # Vehicle Executable Parameters
//!
//! This module provides parameters for the vehicle executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::path::PathBuf;

use crate::car::CarParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehExecParams {
    /// Parameters for the car's control loop
    pub car: CarParams,

    /// Which equipment is fitted and how it is connected
    pub eqpt: EqptParams,
}

/// Equipment selection and wiring.
///
/// Any simulated equipment is replaced by its null stand-in.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EqptParams {
    /// Replace the whole car with one which accepts and ignores every command
    pub simulate_car: bool,

    pub simulate_engine: bool,
    pub simulate_front_wheel: bool,
    pub simulate_range_finder: bool,
    pub simulate_compass: bool,
    pub simulate_gyroscope: bool,
    pub simulate_camera: bool,

    /// I2C bus the servo driver board is connected to
    pub i2c_bus: u8,

    /// I2C address of the servo driver board
    pub pwm_address: u8,

    /// Servo driver channel of the drive motor
    pub engine_channel: u8,

    /// Servo driver channel of the steering servo
    pub steering_channel: u8,

    /// Added to every steering angle so that `STRAIGHT` centres the wheel.
    ///
    /// Units: degrees
    pub steering_correction: i32,

    /// Duty cycles of the steering servo at either end of its travel
    pub steering_duty_range: (f64, f64),

    /// Image served by a simulated camera
    pub sample_image_path: Option<PathBuf>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for EqptParams {
    fn default() -> Self {
        Self {
            simulate_car: false,
            simulate_engine: true,
            simulate_front_wheel: true,
            simulate_range_finder: true,
            simulate_compass: true,
            simulate_gyroscope: true,
            simulate_camera: true,
            i2c_bus: 1,
            pwm_address: 0x40,
            engine_channel: 0,
            steering_channel: 1,
            steering_correction: 0,
            steering_duty_range: (0.025, 0.125),
            sample_image_path: None,
        }
    }
}
