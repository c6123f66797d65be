//! # Null equipment
//!
//! Stand-ins which satisfy the equipment contracts without touching any hardware. These are used
//! when a piece of equipment is simulated, or when the software is run away from the vehicle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver},
        Arc,
    },
    thread,
    time::Duration,
};

use super::*;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Period between zero samples produced by the [`NullGyroscope`].
const NULL_GYRO_SAMPLE_PERIOD_MS: u64 = 20;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An engine which accepts every speed.
#[derive(Debug, Default)]
pub struct NullEngine;

/// A front wheel which accepts every angle.
#[derive(Debug, Default)]
pub struct NullFrontWheel;

/// A range finder which never sees an obstacle.
#[derive(Debug, Default)]
pub struct NullRangeFinder;

/// A compass which always points north.
#[derive(Debug, Default)]
pub struct NullCompass;

/// A gyroscope which never rotates.
///
/// While streaming it produces zero samples at a fixed rate.
#[derive(Debug, Default)]
pub struct NullGyroscope {
    streaming: Arc<AtomicBool>,
}

/// A camera which always returns the same image.
#[derive(Debug, Default)]
pub struct NullCamera {
    image: Vec<u8>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Engine for NullEngine {
    fn run_at(&mut self, _speed: i32) -> Result<(), EqptError> {
        Ok(())
    }
}

impl FrontWheel for NullFrontWheel {
    fn turn(&mut self, _angle: i32) -> Result<(), EqptError> {
        Ok(())
    }
}

impl RangeFinder for NullRangeFinder {
    fn distance(&self) -> Result<f64, EqptError> {
        Ok(MAX_DISTANCE_CM)
    }

    fn close(&self) {}
}

impl Compass for NullCompass {
    fn heading(&self) -> Result<f64, EqptError> {
        Ok(0.0)
    }

    fn run(&self) -> Result<(), EqptError> {
        Ok(())
    }

    fn close(&self) -> Result<(), EqptError> {
        Ok(())
    }
}

impl Gyroscope for NullGyroscope {
    fn start(&self) -> Result<(), EqptError> {
        self.streaming.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) -> Result<(), EqptError> {
        self.streaming.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn orientations(&self) -> Result<Receiver<Orientation>, EqptError> {
        if !self.streaming.load(Ordering::Relaxed) {
            return Err(EqptError::NotStreaming);
        }

        let (tx, rx) = channel();
        let streaming = self.streaming.clone();

        // The stream ends when the gyro is stopped or the receiver is dropped
        thread::Builder::new()
            .name("null_gyro::stream".into())
            .spawn(move || {
                while streaming.load(Ordering::Relaxed) {
                    if tx.send(Orientation::default()).is_err() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(NULL_GYRO_SAMPLE_PERIOD_MS));
                }
                debug!("Null gyroscope stream ended");
            })
            .map_err(|e| EqptError::SensorRead(e.to_string()))?;

        Ok(rx)
    }

    fn close(&self) -> Result<(), EqptError> {
        self.stop()
    }
}

impl NullCamera {
    /// Create a camera which serves the image at the given path.
    ///
    /// If the image can't be read the camera serves an empty image.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let image = match std::fs::read(path.as_ref()) {
            Ok(b) => b,
            Err(e) => {
                warn!("Could not read sample image {:?}: {}", path.as_ref(), e);
                Vec::new()
            }
        };

        Self { image }
    }
}

impl Camera for NullCamera {
    fn current_image(&self) -> Vec<u8> {
        self.image.clone()
    }
}
