//! # Car module
//!
//! The car owns the drive motor and the steering servo. A single control loop, running on its own
//! thread, applies every velocity request in the order it arrives, while the obstacle monitor
//! samples the range finder and can disable manual control when something gets too close.
//!
//! [`Car`] is a cheap, cloneable handle to the loop. Every operation which touches the actuators
//! is posted to the loop's mailbox and blocks until the loop has replied. Sensor queries are
//! passed straight through to the equipment.
//!
//! Callers must not close the car while a turn is in progress on another thread.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod actor;
mod msg;
mod obstacle;
mod params;
mod turn;
mod velocity;

#[cfg(test)]
mod test_eqpt;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use params::CarParams;
pub use turn::{vehicle_yaw, Swing};
pub use velocity::ActuatorState;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{error, info};
use std::sync::{
    mpsc::{channel, Sender},
    Arc, Mutex,
};
use std::thread::JoinHandle;
use thiserror::Error;

use veh_if::eqpt::{Camera, Compass, Engine, EqptError, FrontWheel, Gyroscope, RangeFinder};

use msg::{CarMsg, Reply, VelocityRequest};
use velocity::Actuators;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Everything a vehicle can be asked to do.
pub trait Vehicle: Send {
    /// Drive at `speed` with the front wheel at `angle` degrees.
    ///
    /// Succeeds without effect while an obstacle is in front of the vehicle.
    fn velocity(&self, speed: i32, angle: i32) -> Result<(), CarError>;

    /// Rotate by `swing` degrees relative to the current heading.
    fn turn(&self, swing: i32) -> Result<(), CarError>;

    /// Rotate to an absolute compass heading.
    fn point_to(&self, angle: i32) -> Result<(), CarError>;

    /// Units: centimeters
    fn distance_in_front(&self) -> Result<f64, CarError>;

    /// Units: degrees
    fn heading(&self) -> Result<f64, CarError>;

    fn current_image(&self) -> Vec<u8>;

    /// Shut the vehicle down, blocking until it has come to rest.
    fn close(&self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The equipment fitted to the car.
pub struct CarEqpt {
    pub engine: Box<dyn Engine>,
    pub front_wheel: Box<dyn FrontWheel>,
    pub range_finder: Arc<dyn RangeFinder>,
    pub compass: Arc<dyn Compass>,
    pub gyroscope: Arc<dyn Gyroscope>,
    pub camera: Arc<dyn Camera>,
}

/// Handle to the car's control loop.
#[derive(Clone)]
pub struct Car {
    mailbox: Sender<CarMsg>,
    shared: Arc<Shared>,
}

/// A vehicle which accepts every command and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCar;

/// State shared between all handles to the same car.
struct Shared {
    params: CarParams,
    range_finder: Arc<dyn RangeFinder>,
    compass: Arc<dyn Compass>,
    gyroscope: Arc<dyn Gyroscope>,
    camera: Arc<dyn Camera>,

    /// Used to stop the loop once the last handle is dropped
    closer: Mutex<Sender<CarMsg>>,

    actor_jh: Mutex<Option<JoinHandle<()>>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CarError {
    #[error("Equipment error: {0}")]
    Eqpt(#[from] EqptError),

    #[error("The car has been closed")]
    Closed,

    #[error("The turn did not complete within {0} s")]
    TurnTimeout(f64),

    #[error("Invalid car parameter {0}: {1}")]
    InvalidParam(&'static str, String),

    #[error("Could not spawn the {0} thread: {1}")]
    SpawnError(&'static str, std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Car {
    /// Start the car's control loop and obstacle monitor.
    ///
    /// The engine and front wheel are assumed to be stopped and centred.
    pub fn new(params: CarParams, eqpt: CarEqpt) -> Result<Self, CarError> {
        params.validate()?;

        let actuators = Actuators::new(eqpt.engine, eqpt.front_wheel);
        let (mailbox, actor_jh) =
            actor::spawn(params.clone(), actuators, eqpt.range_finder.clone())?;

        info!(
            "Car started, safe distance {} cm",
            params.safe_distance_cm
        );

        Ok(Self {
            mailbox: mailbox.clone(),
            shared: Arc::new(Shared {
                params,
                range_finder: eqpt.range_finder,
                compass: eqpt.compass,
                gyroscope: eqpt.gyroscope,
                camera: eqpt.camera,
                closer: Mutex::new(mailbox),
                actor_jh: Mutex::new(Some(actor_jh)),
            }),
        })
    }

    /// Drive at `speed` with the front wheel at `angle` degrees.
    pub fn velocity(&self, speed: i32, angle: i32) -> Result<(), CarError> {
        self.request(|reply| CarMsg::Velocity(VelocityRequest { speed, angle, reply }))
    }

    pub fn distance_in_front(&self) -> Result<f64, CarError> {
        Ok(self.shared.range_finder.distance()?)
    }

    pub fn heading(&self) -> Result<f64, CarError> {
        Ok(self.shared.compass.heading()?)
    }

    pub fn current_image(&self) -> Vec<u8> {
        self.shared.camera.current_image()
    }

    /// Stop the control loop and wait for it to finish.
    ///
    /// Any range sample in progress is completed first and the actuators are parked. Requests
    /// made after closing fail with [`CarError::Closed`].
    pub fn close(&self) {
        let (ack_tx, ack_rx) = channel();

        if self.mailbox.send(CarMsg::Close(ack_tx)).is_ok() {
            // The ack is dropped unsent if the loop had already stopped
            ack_rx.recv().ok();
        }

        let jh = match self.shared.actor_jh.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some(jh) = jh {
            if jh.join().is_err() {
                error!("Car control loop panicked");
            }
        }
    }

    /// Post a message to the loop and wait for its reply.
    fn request<F>(&self, build: F) -> Result<(), CarError>
    where
        F: FnOnce(Reply) -> CarMsg,
    {
        let (reply_tx, reply_rx) = channel();

        self.mailbox
            .send(build(reply_tx))
            .map_err(|_| CarError::Closed)?;

        reply_rx.recv().map_err(|_| CarError::Closed)?
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let (ack_tx, _) = channel();

        if let Ok(closer) = self.closer.lock() {
            closer.send(CarMsg::Close(ack_tx)).ok();
        }
    }
}

impl Vehicle for Car {
    fn velocity(&self, speed: i32, angle: i32) -> Result<(), CarError> {
        Car::velocity(self, speed, angle)
    }

    fn turn(&self, swing: i32) -> Result<(), CarError> {
        Car::turn(self, swing)
    }

    fn point_to(&self, angle: i32) -> Result<(), CarError> {
        Car::point_to(self, angle)
    }

    fn distance_in_front(&self) -> Result<f64, CarError> {
        Car::distance_in_front(self)
    }

    fn heading(&self) -> Result<f64, CarError> {
        Car::heading(self)
    }

    fn current_image(&self) -> Vec<u8> {
        Car::current_image(self)
    }

    fn close(&self) {
        Car::close(self)
    }
}

impl Vehicle for NullCar {
    fn velocity(&self, _speed: i32, _angle: i32) -> Result<(), CarError> {
        Ok(())
    }

    fn turn(&self, _swing: i32) -> Result<(), CarError> {
        Ok(())
    }

    fn point_to(&self, _angle: i32) -> Result<(), CarError> {
        Ok(())
    }

    fn distance_in_front(&self) -> Result<f64, CarError> {
        Ok(veh_if::eqpt::MAX_DISTANCE_CM)
    }

    fn heading(&self) -> Result<f64, CarError> {
        Ok(0.0)
    }

    fn current_image(&self) -> Vec<u8> {
        Vec::new()
    }

    fn close(&self) {}
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use super::msg::DisableSignal;
    use super::test_eqpt::*;
    use veh_if::eqpt::STRAIGHT;

    /// Send a safety signal to the loop as the obstacle monitor would.
    fn disable(car: &Car, disable: bool, distance_cm: f64) -> Result<(), CarError> {
        car.request(|reply| {
            CarMsg::Disable(DisableSignal {
                disable,
                distance_cm,
                reply,
            })
        })
    }

    /// Params for tests which drive the safety state by hand, so the range finder never fires.
    fn quiet_params() -> CarParams {
        CarParams {
            range_check_period_s: 3600.0,
            ..fast_params()
        }
    }

    #[test]
    fn test_velocity_is_idempotent() {
        let rig = Rig::new(quiet_params());

        rig.car.velocity(30, 10).unwrap();
        rig.car.velocity(30, 10).unwrap();

        assert_eq!(rig.engine.writes(), vec![30]);
        assert_eq!(rig.front_wheel.writes(), vec![10]);

        rig.car.close();
    }

    #[test]
    fn test_velocity_error_is_returned() {
        let rig = Rig::new(quiet_params());

        rig.engine.set_failing(true);
        assert!(matches!(
            rig.car.velocity(30, 10),
            Err(CarError::Eqpt(EqptError::Transport(_)))
        ));
        assert!(rig.front_wheel.writes().is_empty());

        rig.car.close();
    }

    #[test]
    fn test_disable_overrides_velocity() {
        let params = quiet_params();
        let rig = Rig::new(params.clone());

        disable(&rig.car, true, 40.0).unwrap();
        assert_eq!(
            rig.front_wheel.writes(),
            vec![params.stop_angle, -params.stop_angle, STRAIGHT]
        );

        // Accepted but not applied
        rig.car.velocity(80, 10).unwrap();
        assert!(rig.engine.writes().is_empty());

        disable(&rig.car, false, 60.0).unwrap();
        rig.car.velocity(80, 10).unwrap();
        assert_eq!(rig.engine.writes(), vec![80]);

        rig.car.close();
    }

    #[test]
    fn test_disable_is_idempotent() {
        let rig = Rig::new(quiet_params());

        disable(&rig.car, true, 40.0).unwrap();
        disable(&rig.car, true, 30.0).unwrap();

        // One stop sequence only
        assert_eq!(rig.front_wheel.writes().len(), 3);

        // Enabling an enabled car does nothing either
        disable(&rig.car, false, 60.0).unwrap();
        disable(&rig.car, false, 70.0).unwrap();
        assert_eq!(rig.front_wheel.writes().len(), 3);

        rig.car.close();
    }

    #[test]
    fn test_stop_sequence_error_is_returned() {
        let rig = Rig::new(quiet_params());

        rig.front_wheel.set_failing(true);
        assert!(matches!(
            disable(&rig.car, true, 40.0),
            Err(CarError::Eqpt(_))
        ));

        rig.car.close();
    }

    #[test]
    fn test_obstacle_stops_the_car() {
        let params = fast_params();
        let rig = Rig::new(params.clone());

        rig.range_finder.set_distance(40.0);

        // Wait for the monitor to run the stop sequence
        assert!(wait_for(Duration::from_secs(2), || {
            rig.front_wheel.writes().len() == 3
        }));
        assert_eq!(
            rig.front_wheel.writes(),
            vec![params.stop_angle, -params.stop_angle, STRAIGHT]
        );

        rig.car.velocity(80, 10).unwrap();
        assert!(rig.engine.writes().is_empty());

        // Clear the obstruction and keep asking until manual control is back
        rig.range_finder.set_distance(60.0);
        assert!(wait_for(Duration::from_secs(2), || {
            rig.car.velocity(80, 10).unwrap();
            rig.engine.writes() == vec![80]
        }));

        rig.car.close();
    }

    #[test]
    fn test_sensor_failure_is_skipped() {
        let rig = Rig::new(fast_params());

        rig.range_finder.set_failing(true);
        assert!(wait_for(Duration::from_secs(2), || {
            rig.range_finder.num_reads() >= 3
        }));

        rig.car.velocity(30, 0).unwrap();
        assert_eq!(rig.engine.writes(), vec![30]);

        rig.car.close();
    }

    #[test]
    fn test_single_outstanding_sample() {
        let range_finder = SlowRangeFinder::new(Duration::from_millis(20));
        let rig = Rig::with_range_finder(fast_params(), Arc::new(range_finder.clone()));

        assert!(wait_for(Duration::from_secs(2), || {
            range_finder.num_reads() >= 5
        }));
        rig.car.close();

        assert_eq!(range_finder.max_in_flight(), 1);
    }

    #[test]
    fn test_close_drains_outstanding_sample() {
        let range_finder = GatedRangeFinder::new();
        let rig = Rig::with_range_finder(fast_params(), Arc::new(range_finder.clone()));

        // A sample is now blocked inside the sensor
        range_finder.wait_entered();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let car = rig.car.clone();
        let jh = thread::spawn(move || {
            car.close();
            done_tx.send(()).unwrap();
        });

        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

        range_finder.open();
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
        jh.join().unwrap();

        // Parked on shutdown
        assert_eq!(rig.engine.writes(), vec![0]);
        assert_eq!(rig.front_wheel.writes(), vec![STRAIGHT]);

        assert!(matches!(rig.car.velocity(10, 0), Err(CarError::Closed)));
    }

    #[test]
    fn test_close_twice() {
        let rig = Rig::new(quiet_params());

        rig.car.close();
        rig.car.close();

        assert!(matches!(rig.car.velocity(10, 0), Err(CarError::Closed)));
    }

    #[test]
    fn test_turn_right_converges() {
        let rig = Rig::new(quiet_params());
        rig.gyro.set_z(vec![0.0, -10.0, -20.0, -29.0, -30.5]);

        rig.car.turn(30).unwrap();

        assert_eq!(rig.engine.writes(), vec![50, 25, 0]);
        assert_eq!(rig.front_wheel.writes(), vec![3, 25, 18, 0]);
        assert_eq!(rig.gyro.num_starts(), 1);
        assert_eq!(rig.gyro.num_stops(), 1);

        rig.car.close();
    }

    #[test]
    fn test_turn_left_converges() {
        let rig = Rig::new(quiet_params());
        rig.gyro.set_z(vec![0.0, 10.0, 20.0, 29.0]);

        rig.car.turn(-30).unwrap();

        assert_eq!(rig.engine.writes(), vec![50, 25, 0]);
        assert_eq!(rig.front_wheel.writes(), vec![3, -24, -15, 0]);

        rig.car.close();
    }

    #[test]
    fn test_turn_cleans_up_on_error() {
        let rig = Rig::new(quiet_params());
        rig.gyro.set_failing(true);

        assert!(matches!(
            rig.car.turn(30),
            Err(CarError::Eqpt(EqptError::NotStreaming))
        ));

        // Boosted, then brought back to rest
        assert_eq!(rig.engine.writes(), vec![50, 0]);
        assert_eq!(rig.gyro.num_stops(), 1);

        rig.car.close();
    }

    #[test]
    fn test_turn_stream_closed() {
        let rig = Rig::new(quiet_params());
        rig.gyro.set_z(vec![0.0, -5.0]);

        assert!(matches!(
            rig.car.turn(30),
            Err(CarError::Eqpt(EqptError::StreamClosed))
        ));
        assert_eq!(rig.engine.writes().last(), Some(&0));
        assert_eq!(rig.gyro.num_stops(), 1);

        rig.car.close();
    }

    #[test]
    fn test_turn_aborts_on_steering_failure() {
        let rig = Rig::new(quiet_params());
        rig.front_wheel.set_failing(true);
        rig.gyro.set_z(vec![0.0, -10.0]);

        assert!(matches!(
            rig.car.turn(30),
            Err(CarError::Eqpt(EqptError::Transport(_)))
        ));

        // The speed of the failed demand was applied, then the car was brought to rest
        assert_eq!(rig.engine.writes(), vec![50, 25, 0]);
        assert!(rig.front_wheel.writes().is_empty());
        assert_eq!(rig.gyro.num_stops(), 1);

        rig.car.close();
    }

    #[test]
    fn test_extreme_swings() {
        let rig = Rig::new(quiet_params());

        rig.gyro.set_z(vec![0.0]);
        assert!(matches!(
            rig.car.turn(i32::MIN),
            Err(CarError::Eqpt(EqptError::StreamClosed))
        ));
        assert_eq!(rig.gyro.num_stops(), 1);

        rig.compass.set_heading(100.0);
        rig.gyro.set_z(vec![0.0]);
        assert!(matches!(
            rig.car.point_to(i32::MIN),
            Err(CarError::Eqpt(EqptError::StreamClosed))
        ));
        assert_eq!(rig.gyro.num_stops(), 2);
        assert_eq!(rig.engine.writes().last(), Some(&0));

        rig.car.close();
    }

    #[test]
    fn test_turn_timeout() {
        let rig = Rig::new(CarParams {
            max_turn_duration_s: Some(0.1),
            ..quiet_params()
        });
        rig.gyro.set_endless(true);

        assert!(matches!(rig.car.turn(30), Err(CarError::TurnTimeout(_))));
        assert_eq!(rig.engine.writes().last(), Some(&0));
        assert_eq!(rig.gyro.num_stops(), 1);

        rig.car.close();
    }

    #[test]
    fn test_point_to() {
        let rig = Rig::new(quiet_params());
        rig.compass.set_heading(100.0);
        rig.gyro.set_z(vec![0.0, -10.0, -20.0, -29.0]);

        rig.car.point_to(130).unwrap();

        assert_eq!(rig.engine.writes(), vec![50, 25, 0]);
        assert_eq!(rig.front_wheel.writes(), vec![3, 25, 18, 0]);

        rig.car.close();
    }

    #[test]
    fn test_point_to_compass_error() {
        let rig = Rig::new(quiet_params());
        rig.compass.set_failing(true);

        assert!(matches!(
            rig.car.point_to(130),
            Err(CarError::Eqpt(EqptError::SensorRead(_)))
        ));
        assert!(rig.engine.writes().is_empty());
        assert!(rig.front_wheel.writes().is_empty());
        assert_eq!(rig.gyro.num_starts(), 0);

        rig.car.close();
    }

    #[test]
    fn test_pass_through_queries() {
        let rig = Rig::new(quiet_params());
        rig.range_finder.set_distance(123.0);
        rig.compass.set_heading(45.0);

        assert_eq!(rig.car.distance_in_front().unwrap(), 123.0);
        assert_eq!(rig.car.heading().unwrap(), 45.0);
        assert!(rig.car.current_image().is_empty());

        rig.car.close();
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = CarParams {
            min_turn: 0,
            ..fast_params()
        };

        assert!(matches!(
            Car::new(params, null_eqpt()),
            Err(CarError::InvalidParam("min_turn", _))
        ));
    }

    #[test]
    fn test_null_car() {
        let car: Box<dyn Vehicle> = Box::new(NullCar);

        assert!(car.velocity(50, 10).is_ok());
        assert!(car.turn(90).is_ok());
        assert!(car.point_to(180).is_ok());
        assert_eq!(car.distance_in_front().unwrap(), 999.0);
        assert_eq!(car.heading().unwrap(), 0.0);
        assert!(car.current_image().is_empty());
        car.close();
    }
}
