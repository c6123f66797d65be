//! # Mechanisms Module
//!
//! PWM backed implementations of the [`Engine`] and [`FrontWheel`] contracts. Both sit on top of a
//! [`ServoDriver`], which abstracts over the servo driver board actually fitted. The engine and
//! the steering servo usually share a single board, so the driver is held behind a mutex.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`ServoDriver`] implementation for the PCA9685 16 channel servo driver board.
pub mod pca9685;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use std::sync::{Arc, Mutex};

use util::maths::{clamp, lin_map};
use veh_if::eqpt::{Engine, EqptError, FrontWheel, FULL_LEFT, FULL_RIGHT, MAX_SPEED, MIN_SPEED};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Full travel of the steering servo.
///
/// Units: degrees
const SERVO_TRAVEL: f64 = 180.0;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for accessing servo driver boards.
pub trait ServoDriver {
    /// The type that the underlying driver uses for channel identification
    type Channel;

    /// Set the duty cycle of a channel.
    ///
    /// ## Arguments
    /// - `channel` - The channel to set the duty cycle for
    /// - `duty_cycle` - The duty cycle to set. Must be a value between 0.0 and 1.0. Values outside
    ///   this range will be rejected.
    fn set_duty_cycle(&mut self, channel: Self::Channel, duty_cycle: f64)
        -> Result<(), ServoError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Drive motor controlled by the duty cycle of a PWM channel.
pub struct PwmEngine<D: ServoDriver> {
    driver: Arc<Mutex<D>>,
    channel: D::Channel,
}

/// Steering servo on a PWM channel.
pub struct ServoFrontWheel<D: ServoDriver> {
    driver: Arc<Mutex<D>>,
    channel: D::Channel,

    /// Added to every commanded angle to centre the wheel.
    ///
    /// Units: degrees
    correction: i32,

    /// Duty cycles at either end of the servo's travel
    duty_range: (f64, f64),
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ServoError {
    #[error("An I2C error occured")]
    I2c,

    #[error("Duty cycle must be between 0.0 and 1.0")]
    InvalidDutyCycle,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl From<ServoError> for EqptError {
    fn from(e: ServoError) -> Self {
        EqptError::Transport(e.to_string())
    }
}

impl<D: ServoDriver> PwmEngine<D> {
    pub fn new(driver: Arc<Mutex<D>>, channel: D::Channel) -> Self {
        Self { driver, channel }
    }
}

impl<D> Engine for PwmEngine<D>
where
    D: ServoDriver + Send,
    D::Channel: Copy + Send,
{
    fn run_at(&mut self, speed: i32) -> Result<(), EqptError> {
        let speed = clamp(speed, MIN_SPEED, MAX_SPEED);
        let duty_cycle = lin_map(
            (MIN_SPEED as f64, MAX_SPEED as f64),
            (0.0, 1.0),
            speed as f64,
        );

        trace!("Engine duty cycle {:.3}", duty_cycle);
        set_duty_cycle(&self.driver, self.channel, duty_cycle)
    }
}

impl<D: ServoDriver> ServoFrontWheel<D> {
    pub fn new(
        driver: Arc<Mutex<D>>,
        channel: D::Channel,
        correction: i32,
        duty_range: (f64, f64),
    ) -> Self {
        Self {
            driver,
            channel,
            correction,
            duty_range,
        }
    }

    /// Duty cycle which puts the wheel at `angle`.
    ///
    /// Angles beyond full lock are limited to full lock before the correction is applied.
    fn duty_cycle(&self, angle: i32) -> f64 {
        let angle = clamp(angle, FULL_LEFT, FULL_RIGHT) as i64;
        let servo_angle = clamp(
            (angle + self.correction as i64 - FULL_LEFT as i64) as f64,
            0.0,
            SERVO_TRAVEL,
        );

        lin_map((0.0, SERVO_TRAVEL), self.duty_range, servo_angle)
    }
}

impl<D> FrontWheel for ServoFrontWheel<D>
where
    D: ServoDriver + Send,
    D::Channel: Copy + Send,
{
    fn turn(&mut self, angle: i32) -> Result<(), EqptError> {
        let duty_cycle = self.duty_cycle(angle);

        trace!("Steering duty cycle {:.4}", duty_cycle);
        set_duty_cycle(&self.driver, self.channel, duty_cycle)
    }
}

fn set_duty_cycle<D: ServoDriver>(
    driver: &Mutex<D>,
    channel: D::Channel,
    duty_cycle: f64,
) -> Result<(), EqptError> {
    driver
        .lock()
        .map_err(|_| EqptError::Transport("servo driver lock poisoned".into()))?
        .set_duty_cycle(channel, duty_cycle)
        .map_err(EqptError::from)
}
