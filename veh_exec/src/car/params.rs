//! Parameters structure for the car

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::time::Duration;
use veh_if::eqpt::{HALF_SPEED, QUARTER_SPEED};

use super::CarError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the car.
///
/// Any parameter missing from the file takes its default value.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CarParams {
    // ---- OBSTACLE MONITOR ----
    /// Obstacles closer than this disable manual control of the car.
    ///
    /// Units: centimeters
    pub safe_distance_cm: f64,

    /// Period between range finder samples.
    ///
    /// Units: seconds
    pub range_check_period_s: f64,

    // ---- STOP SEQUENCE ----
    /// Front wheel deflection used when braking.
    ///
    /// Units: degrees
    pub stop_angle: i32,

    /// Hold after the first braking deflection.
    ///
    /// Units: seconds
    pub stop_first_hold_s: f64,

    /// Hold after the mirrored braking deflection.
    ///
    /// Units: seconds
    pub stop_second_hold_s: f64,

    // ---- TURNING ----
    /// Period between gyroscope samples during a turn.
    ///
    /// Units: seconds
    pub turn_poll_period_s: f64,

    /// Pause after stopping the car before a turn starts.
    ///
    /// Units: seconds
    pub turn_settle_s: f64,

    /// Pause between starting the gyroscope and the inertial boost.
    ///
    /// Units: seconds
    pub gyro_warmup_s: f64,

    /// Pause after stopping the car before the compass is read for a point-to.
    ///
    /// Units: seconds
    pub point_to_settle_s: f64,

    /// Speed used to overcome static friction at the start of a turn.
    pub boost_speed: i32,

    /// Speed held while turning.
    pub turn_speed: i32,

    /// A turn is complete once within this many degrees of the target. This is also the steering
    /// angle at the start and end of the turn.
    ///
    /// Units: degrees
    pub min_turn: i32,

    /// Largest steering angle used while turning.
    ///
    /// Units: degrees
    pub max_turning_angle: i32,

    /// Optional limit on the duration of a turn. No limit if `None`.
    ///
    /// Units: seconds
    pub max_turn_duration_s: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for CarParams {
    fn default() -> Self {
        Self {
            safe_distance_cm: 50.0,
            range_check_period_s: 0.1,
            stop_angle: 15,
            stop_first_hold_s: 0.2,
            stop_second_hold_s: 0.5,
            turn_poll_period_s: 0.05,
            turn_settle_s: 0.5,
            gyro_warmup_s: 0.5,
            point_to_settle_s: 1.0,
            boost_speed: HALF_SPEED,
            turn_speed: QUARTER_SPEED,
            min_turn: 3,
            max_turning_angle: 30,
            max_turn_duration_s: None,
        }
    }
}

impl CarParams {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), CarError> {
        let non_negative = [
            ("safe_distance_cm", self.safe_distance_cm),
            ("stop_first_hold_s", self.stop_first_hold_s),
            ("stop_second_hold_s", self.stop_second_hold_s),
            ("turn_poll_period_s", self.turn_poll_period_s),
            ("turn_settle_s", self.turn_settle_s),
            ("gyro_warmup_s", self.gyro_warmup_s),
            ("point_to_settle_s", self.point_to_settle_s),
        ];

        for &(name, value) in non_negative.iter() {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(CarError::InvalidParam(
                    name,
                    format!("expected a finite non-negative value, found {}", value),
                ));
            }
        }

        if !(self.range_check_period_s > 0.0) || !self.range_check_period_s.is_finite() {
            return Err(CarError::InvalidParam(
                "range_check_period_s",
                format!("expected a positive period, found {}", self.range_check_period_s),
            ));
        }

        if self.min_turn <= 0 {
            return Err(CarError::InvalidParam(
                "min_turn",
                format!("expected a positive angle, found {}", self.min_turn),
            ));
        }

        if self.max_turning_angle <= 0 {
            return Err(CarError::InvalidParam(
                "max_turning_angle",
                format!("expected a positive angle, found {}", self.max_turning_angle),
            ));
        }

        if let Some(limit) = self.max_turn_duration_s {
            if !(limit > 0.0) || !limit.is_finite() {
                return Err(CarError::InvalidParam(
                    "max_turn_duration_s",
                    format!("expected a positive duration, found {}", limit),
                ));
            }
        }

        Ok(())
    }

    pub(crate) fn range_check_period(&self) -> Duration {
        secs(self.range_check_period_s)
    }

    pub(crate) fn stop_holds(&self) -> (Duration, Duration) {
        (secs(self.stop_first_hold_s), secs(self.stop_second_hold_s))
    }

    pub(crate) fn turn_poll_period(&self) -> Duration {
        secs(self.turn_poll_period_s)
    }

    pub(crate) fn turn_settle(&self) -> Duration {
        secs(self.turn_settle_s)
    }

    pub(crate) fn gyro_warmup(&self) -> Duration {
        secs(self.gyro_warmup_s)
    }

    pub(crate) fn point_to_settle(&self) -> Duration {
        secs(self.point_to_settle_s)
    }

    pub(crate) fn max_turn_duration(&self) -> Option<Duration> {
        self.max_turn_duration_s.map(secs)
    }
}

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s.max(0.0))
}
