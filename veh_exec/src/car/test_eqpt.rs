//! Recording and scripted equipment used by the car tests

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc::{channel, Receiver},
    Arc, Condvar, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};

use veh_if::eqpt::{
    null::{NullCamera, NullCompass, NullEngine, NullFrontWheel, NullGyroscope, NullRangeFinder},
    Compass, Engine, EqptError, FrontWheel, Gyroscope, Orientation, RangeFinder, MAX_DISTANCE_CM,
};

use super::{Car, CarEqpt, CarParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Values written to an actuator, shared between clones.
#[derive(Clone, Default)]
pub struct Recorder {
    writes: Arc<Mutex<Vec<i32>>>,
    failing: Arc<AtomicBool>,
}

#[derive(Clone, Default)]
pub struct RecordingEngine(Recorder);

#[derive(Clone, Default)]
pub struct RecordingFrontWheel(Recorder);

/// Reports a settable distance.
#[derive(Clone)]
pub struct FixedRangeFinder {
    distance: Arc<Mutex<f64>>,
    failing: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

/// Takes a while to report and tracks how many reads overlap.
#[derive(Clone)]
pub struct SlowRangeFinder {
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

/// Blocks every read until the gate is opened.
#[derive(Clone, Default)]
pub struct GatedRangeFinder {
    gate: Arc<(Mutex<GateState>, Condvar)>,
}

#[derive(Default)]
struct GateState {
    entered: bool,
    open: bool,
}

#[derive(Clone, Default)]
pub struct FixedCompass {
    heading: Arc<Mutex<f64>>,
    failing: Arc<AtomicBool>,
}

/// Streams a scripted sequence of Z samples, then ends the stream.
#[derive(Clone, Default)]
pub struct ScriptedGyro {
    z: Arc<Mutex<Vec<f64>>>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,

    /// Stream zero samples until the receiver is dropped
    endless: Arc<AtomicBool>,
}

/// A car fitted with test equipment.
pub struct Rig {
    pub car: Car,
    pub engine: RecordingEngine,
    pub front_wheel: RecordingFrontWheel,
    pub range_finder: FixedRangeFinder,
    pub compass: FixedCompass,
    pub gyro: ScriptedGyro,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Params with all the delays shortened.
pub fn fast_params() -> CarParams {
    CarParams {
        range_check_period_s: 0.01,
        stop_first_hold_s: 0.001,
        stop_second_hold_s: 0.001,
        turn_poll_period_s: 0.001,
        turn_settle_s: 0.0,
        gyro_warmup_s: 0.0,
        point_to_settle_s: 0.0,
        ..Default::default()
    }
}

/// Poll `cond` until it holds or the timeout expires, returning the last result.
pub fn wait_for<F: FnMut() -> bool>(timeout: Duration, mut cond: F) -> bool {
    let deadline = Instant::now() + timeout;

    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

pub fn null_eqpt() -> CarEqpt {
    CarEqpt {
        engine: Box::new(NullEngine),
        front_wheel: Box::new(NullFrontWheel),
        range_finder: Arc::new(NullRangeFinder),
        compass: Arc::new(NullCompass),
        gyroscope: Arc::new(NullGyroscope::default()),
        camera: Arc::new(NullCamera::default()),
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Recorder {
    pub fn writes(&self) -> Vec<i32> {
        self.writes.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, value: i32) -> Result<(), EqptError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EqptError::Transport("bus fault".into()));
        }
        self.writes.lock().unwrap().push(value);
        Ok(())
    }
}

impl std::ops::Deref for RecordingEngine {
    type Target = Recorder;

    fn deref(&self) -> &Recorder {
        &self.0
    }
}

impl std::ops::Deref for RecordingFrontWheel {
    type Target = Recorder;

    fn deref(&self) -> &Recorder {
        &self.0
    }
}

impl Engine for RecordingEngine {
    fn run_at(&mut self, speed: i32) -> Result<(), EqptError> {
        self.0.record(speed)
    }
}

impl FrontWheel for RecordingFrontWheel {
    fn turn(&mut self, angle: i32) -> Result<(), EqptError> {
        self.0.record(angle)
    }
}

impl FixedRangeFinder {
    pub fn new(distance_cm: f64) -> Self {
        Self {
            distance: Arc::new(Mutex::new(distance_cm)),
            failing: Arc::new(AtomicBool::new(false)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_distance(&self, distance_cm: f64) {
        *self.distance.lock().unwrap() = distance_cm;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn num_reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl RangeFinder for FixedRangeFinder {
    fn distance(&self) -> Result<f64, EqptError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(EqptError::SensorRead("no echo".into()));
        }
        Ok(*self.distance.lock().unwrap())
    }

    fn close(&self) {}
}

impl SlowRangeFinder {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn num_reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl RangeFinder for SlowRangeFinder {
    fn distance(&self) -> Result<f64, EqptError> {
        let n = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(n, Ordering::SeqCst);

        thread::sleep(self.delay);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(MAX_DISTANCE_CM)
    }

    fn close(&self) {}
}

impl GatedRangeFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until a read is waiting at the gate.
    pub fn wait_entered(&self) {
        let (lock, cvar) = &*self.gate;
        let mut state = lock.lock().unwrap();
        while !state.entered {
            state = cvar.wait(state).unwrap();
        }
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.gate;
        lock.lock().unwrap().open = true;
        cvar.notify_all();
    }
}

impl RangeFinder for GatedRangeFinder {
    fn distance(&self) -> Result<f64, EqptError> {
        let (lock, cvar) = &*self.gate;
        let mut state = lock.lock().unwrap();

        state.entered = true;
        cvar.notify_all();

        while !state.open {
            state = cvar.wait(state).unwrap();
        }
        Ok(MAX_DISTANCE_CM)
    }

    fn close(&self) {}
}

impl FixedCompass {
    pub fn set_heading(&self, heading: f64) {
        *self.heading.lock().unwrap() = heading;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Compass for FixedCompass {
    fn heading(&self) -> Result<f64, EqptError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EqptError::SensorRead("no field".into()));
        }
        Ok(*self.heading.lock().unwrap())
    }

    fn run(&self) -> Result<(), EqptError> {
        Ok(())
    }

    fn close(&self) -> Result<(), EqptError> {
        Ok(())
    }
}

impl ScriptedGyro {
    pub fn set_z(&self, z: Vec<f64>) {
        *self.z.lock().unwrap() = z;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_endless(&self, endless: bool) {
        self.endless.store(endless, Ordering::SeqCst);
    }

    pub fn num_starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn num_stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Gyroscope for ScriptedGyro {
    fn start(&self) -> Result<(), EqptError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), EqptError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn orientations(&self) -> Result<Receiver<Orientation>, EqptError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EqptError::NotStreaming);
        }

        let (tx, rx) = channel();

        if self.endless.load(Ordering::SeqCst) {
            thread::spawn(move || {
                while tx.send(Orientation::default()).is_ok() {
                    thread::sleep(Duration::from_millis(1));
                }
            });
        } else {
            for &z in self.z.lock().unwrap().iter() {
                tx.send(Orientation { x: 0.0, y: 0.0, z }).unwrap();
            }
        }

        Ok(rx)
    }

    fn close(&self) -> Result<(), EqptError> {
        Ok(())
    }
}

impl Rig {
    pub fn new(params: CarParams) -> Self {
        let range_finder = FixedRangeFinder::new(MAX_DISTANCE_CM);
        Self::build(params, range_finder.clone(), Arc::new(range_finder))
    }

    /// Fit a custom range finder. The rig's own range finder is then not connected to the car.
    pub fn with_range_finder(params: CarParams, range_finder: Arc<dyn RangeFinder>) -> Self {
        Self::build(params, FixedRangeFinder::new(MAX_DISTANCE_CM), range_finder)
    }

    fn build(
        params: CarParams,
        fixed_range_finder: FixedRangeFinder,
        range_finder: Arc<dyn RangeFinder>,
    ) -> Self {
        let engine = RecordingEngine::default();
        let front_wheel = RecordingFrontWheel::default();
        let compass = FixedCompass::default();
        let gyro = ScriptedGyro::default();

        let car = Car::new(
            params,
            CarEqpt {
                engine: Box::new(engine.clone()),
                front_wheel: Box::new(front_wheel.clone()),
                range_finder,
                compass: Arc::new(compass.clone()),
                gyroscope: Arc::new(gyro.clone()),
                camera: Arc::new(NullCamera::default()),
            },
        )
        .unwrap();

        Self {
            car,
            engine,
            front_wheel,
            range_finder: fixed_range_finder,
            compass,
            gyro,
        }
    }
}
