//! Turn controller
//!
//! Rotates the car by a relative angle using live gyroscope feedback. Steering is mapped linearly
//! from the progress of the turn: the wheel swings out to full lock over the first part of the
//! turn and tapers back to the minimum angle as the target is approached.
//!
//! All actuator commands issued during a turn go through the car's mailbox like any other
//! velocity request.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, trace, warn};
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Instant;

use util::maths::{clamp, lin_map};
use veh_if::eqpt::{EqptError, Orientation, MIN_SPEED, STRAIGHT};

use super::{Car, CarError, CarParams};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Fraction of the swing at which the steering reaches full lock.
const MIDPOINT_FRACTION: f64 = 0.4;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of a single turn, derived from the requested swing.
///
/// The midpoint is kept fractional, so for swings which aren't a multiple of 5 the steering
/// profile peaks slightly off an integer yaw.
///
/// Units: degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swing {
    pub target: i32,
    pub clamp_min: i32,
    pub clamp_max: i32,
    pub midpoint: f64,

    /// -1 for a left turn, 1 otherwise
    pub direction: i32,

    min_turn: i32,
    max_turning_angle: i32,
}

/// Returns the car to rest and stops the gyroscope when a turn ends, however it ends.
struct TurnGuard<'a> {
    car: &'a Car,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Swing {
    pub fn new(swing: i32, params: &CarParams) -> Self {
        Self {
            target: swing,
            clamp_min: swing.min(0),
            clamp_max: swing.max(0),
            midpoint: swing as f64 * MIDPOINT_FRACTION,
            direction: if swing < 0 { -1 } else { 1 },
            min_turn: params.min_turn,
            max_turning_angle: params.max_turning_angle,
        }
    }

    /// Bound a noisy yaw reading to the range of the swing.
    pub fn clamp(&self, yaw: i32) -> i32 {
        clamp(yaw, self.clamp_min, self.clamp_max)
    }

    pub fn has_converged(&self, clamped: i32) -> bool {
        (clamped as i64 - self.target as i64).abs() < self.min_turn as i64
    }

    /// Steering angle to command for a clamped yaw.
    pub fn steering_angle(&self, clamped: i32) -> i32 {
        let current = clamped as f64;
        let min_turn = self.min_turn as f64;
        let full_lock = (self.max_turning_angle * self.direction) as f64;

        let angle = if current.abs() < self.midpoint.abs() {
            lin_map((0.0, self.midpoint), (min_turn, full_lock), current)
        } else {
            lin_map(
                (self.midpoint, self.target as f64),
                (full_lock, min_turn),
                current,
            )
        };

        angle as i32
    }
}

/// Yaw of the car from a gyroscope sample, positive to the right.
///
/// The sensor is mounted so that its Z axis is reversed relative to the car.
pub fn vehicle_yaw(sample: &Orientation) -> i32 {
    (-sample.z) as i32
}

impl Car {
    /// Rotate the car by `swing` degrees, negative to the left.
    ///
    /// Blocks until the gyroscope reports the turn is within `min_turn` of the target, an
    /// equipment error occurs, or the optional turn limit is exceeded. The car is always left
    /// stopped and centred with the gyroscope stopped.
    pub fn turn(&self, swing: i32) -> Result<(), CarError> {
        let params = &self.shared.params;
        let gyro = &self.shared.gyroscope;

        self.velocity(MIN_SPEED, STRAIGHT)?;
        thread::sleep(params.turn_settle());

        let swing = Swing::new(swing, params);
        info!("Starting turn of {} degrees", swing.target);

        gyro.start()?;
        let _guard = TurnGuard { car: self };

        thread::sleep(params.gyro_warmup());
        self.velocity(params.boost_speed, STRAIGHT)?;

        let samples = gyro.orientations()?;
        let limit = params.max_turn_duration();
        let deadline = limit.map(|l| Instant::now() + l);
        let timeout = || CarError::TurnTimeout(limit.map(|l| l.as_secs_f64()).unwrap_or(0.0));

        loop {
            thread::sleep(params.turn_poll_period());

            let sample = match deadline {
                Some(d) => samples
                    .recv_timeout(d.saturating_duration_since(Instant::now()))
                    .map_err(|e| match e {
                        RecvTimeoutError::Timeout => timeout(),
                        RecvTimeoutError::Disconnected => EqptError::StreamClosed.into(),
                    })?,
                None => samples.recv().map_err(|_| EqptError::StreamClosed)?,
            };

            let clamped = swing.clamp(vehicle_yaw(&sample));
            trace!("Turn yaw {} of {}", clamped, swing.target);

            if swing.has_converged(clamped) {
                break;
            }

            if matches!(deadline, Some(d) if Instant::now() >= d) {
                return Err(timeout());
            }

            self.velocity(params.turn_speed, swing.steering_angle(clamped))?;
        }

        Ok(())
    }

    /// Rotate the car to an absolute compass heading in degrees.
    pub fn point_to(&self, angle: i32) -> Result<(), CarError> {
        self.velocity(MIN_SPEED, STRAIGHT)?;
        thread::sleep(self.shared.params.point_to_settle());

        let heading = self.shared.compass.heading()?;
        let swing = clamp(
            angle as i64 - heading as i64,
            i32::MIN as i64,
            i32::MAX as i64,
        ) as i32;

        info!(
            "Pointing to {} degrees from heading {:.1}, swing of {}",
            angle, heading, swing
        );

        self.turn(swing)
    }
}

impl<'a> Drop for TurnGuard<'a> {
    fn drop(&mut self) {
        if let Err(e) = self.car.velocity(MIN_SPEED, STRAIGHT) {
            warn!("Could not stop the car after the turn: {}", e);
        }

        if let Err(e) = self.car.shared.gyroscope.stop() {
            warn!("Could not stop the gyroscope: {}", e);
        }

        info!("Stopped turning");
    }
}
