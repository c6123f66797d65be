//! Main vehicle-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the equipment, hardware or null depending on the parameters
//!     - Start the car
//!     - Main loop:
//!         - Acquire telecommands from the script or from stdin
//!         - Execute them on the car
//!     - Close the car and release the sensors
//!
//! # Usage
//!
//! `veh_exec [script_path]`
//!
//! With a script the TCs in it are executed at their scripted times, otherwise one JSON TC is read
//! from each line of stdin until stdin is closed.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod tc_processor;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::env;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::Session,
    veh_if::{
        eqpt::{
            null::{
                NullCamera, NullCompass, NullEngine, NullFrontWheel, NullGyroscope,
                NullRangeFinder,
            },
            Camera, Compass, Engine, FrontWheel, Gyroscope, RangeFinder,
        },
        tc::{Tc, TcParseError},
    },
};
use veh_lib::{
    car::{Car, CarEqpt, NullCar, Vehicle},
    params::{EqptParams, VehExecParams},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Target period of one script cycle.
const CYCLE_PERIOD_S: f64 = 0.10;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Where telecommands come from.
enum TcSource {
    Script(ScriptInterpreter),
    Stdin,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("veh_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Vehicle Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: VehExecParams =
        util::params::load("veh_exec.toml").wrap_err("Could not load vehicle exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE TC SOURCE ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let tc_source = match args.len() {
        2 => {
            info!("Loading script from \"{}\"", &args[1]);

            let si = ScriptInterpreter::new(&args[1]).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            TcSource::Script(si)
        }
        1 => {
            info!("No script provided, TCs will be read from stdin\n");
            TcSource::Stdin
        }
        n => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                n - 1
            ))
        }
    };

    // ---- INITIALISE EQUIPMENT ----

    info!("Initialising equipment...");

    let eqpt = build_eqpt(&params.eqpt).wrap_err("Failed to initialise the equipment")?;

    // Sensors are released after the car has stopped
    let range_finder = eqpt.range_finder.clone();
    let compass = eqpt.compass.clone();
    let gyroscope = eqpt.gyroscope.clone();

    compass.run().wrap_err("Failed to start the compass")?;

    info!("Equipment initialisation complete\n");

    // ---- INITIALISE CAR ----

    let vehicle: Box<dyn Vehicle> = if params.eqpt.simulate_car {
        info!("Simulating the car, commands will be accepted and ignored");
        Box::new(NullCar)
    } else {
        Box::new(Car::new(params.car.clone(), eqpt).wrap_err("Failed to start the car")?)
    };

    info!("Car initialised");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let result = match tc_source {
        TcSource::Script(si) => run_script(vehicle.as_ref(), si),
        TcSource::Stdin => run_stdin(vehicle.as_ref()),
    };

    // ---- SHUTDOWN ----

    info!("Shutting down");

    vehicle.close();
    info!("Car closed");

    if let Err(e) = gyroscope.close() {
        warn!("Could not close the gyroscope: {}", e);
    }
    if let Err(e) = compass.close() {
        warn!("Could not close the compass: {}", e);
    }
    range_finder.close();

    info!("End of execution");

    result
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute the script's TCs as they fall due, until the end of the script.
fn run_script(vehicle: &dyn Vehicle, mut si: ScriptInterpreter) -> Result<(), Report> {
    loop {
        let cycle_start_instant = Instant::now();

        match si
            .get_pending_tcs()
            .wrap_err("Failed to get the pending TCs")?
        {
            PendingTcs::None => (),
            PendingTcs::Some(tc_vec) => {
                for tc in tc_vec.iter() {
                    tc_processor::exec(vehicle, tc);
                }
            }
            PendingTcs::EndOfScript => {
                info!("End of TC script reached, stopping");
                break;
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => debug!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
            ),
        }
    }

    Ok(())
}

/// Execute one JSON TC from each line of stdin until stdin is closed.
fn run_stdin(vehicle: &dyn Vehicle) -> Result<(), Report> {
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line.wrap_err("Failed to read a TC from stdin")?;

        match Tc::from_json(&line) {
            Ok(tc) => tc_processor::exec(vehicle, &tc),
            Err(TcParseError::Empty) => (),
            Err(e) => warn!("Could not parse TC: {}", e),
        }
    }

    info!("Stdin closed, stopping");

    Ok(())
}

/// Build the equipment, using the null stand-in for anything simulated.
fn build_eqpt(params: &EqptParams) -> Result<CarEqpt, Report> {
    let (engine, front_wheel) = build_actuators(params)?;

    let range_finder: Arc<dyn RangeFinder> = if params.simulate_range_finder {
        Arc::new(NullRangeFinder)
    } else {
        return Err(eyre!("No range finder driver is available, it must be simulated"));
    };

    let compass: Arc<dyn Compass> = if params.simulate_compass {
        Arc::new(NullCompass)
    } else {
        return Err(eyre!("No compass driver is available, it must be simulated"));
    };

    let gyroscope: Arc<dyn Gyroscope> = if params.simulate_gyroscope {
        Arc::new(NullGyroscope::default())
    } else {
        return Err(eyre!("No gyroscope driver is available, it must be simulated"));
    };

    let camera: Arc<dyn Camera> = match (params.simulate_camera, &params.sample_image_path) {
        (true, Some(path)) => Arc::new(NullCamera::from_file(path)),
        (true, None) => Arc::new(NullCamera::default()),
        (false, _) => {
            return Err(eyre!("No camera driver is available, it must be simulated"));
        }
    };

    Ok(CarEqpt {
        engine,
        front_wheel,
        range_finder,
        compass,
        gyroscope,
        camera,
    })
}

fn build_actuators(
    params: &EqptParams,
) -> Result<(Box<dyn Engine>, Box<dyn FrontWheel>), Report> {
    if params.simulate_engine && params.simulate_front_wheel {
        info!("Simulating the engine and front wheel");
        return Ok((Box::new(NullEngine), Box::new(NullFrontWheel)));
    }

    let (pwm_engine, pwm_front_wheel) = pwm_actuators(params)?;

    let engine: Box<dyn Engine> = if params.simulate_engine {
        Box::new(NullEngine)
    } else {
        pwm_engine
    };

    let front_wheel: Box<dyn FrontWheel> = if params.simulate_front_wheel {
        Box::new(NullFrontWheel)
    } else {
        pwm_front_wheel
    };

    Ok((engine, front_wheel))
}

/// Open the PCA9685 servo driver board and put the engine and steering servo on it.
#[cfg(target_arch = "arm")]
fn pwm_actuators(
    params: &EqptParams,
) -> Result<(Box<dyn Engine>, Box<dyn FrontWheel>), Report> {
    use pwm_pca9685::{Address, Pca9685};
    use rppal::i2c::I2c;
    use std::sync::Mutex;
    use veh_lib::mech::{
        pca9685::{self, PRESCALE_50_HZ},
        PwmEngine, ServoFrontWheel,
    };

    let i2c = I2c::with_bus(params.i2c_bus).wrap_err("Could not open the I2C bus")?;

    let mut pwm = Pca9685::new(i2c, Address::from(params.pwm_address))
        .map_err(|e| eyre!("Could not initialise the PCA9685: {:?}", e))?;
    pwm.set_prescale(PRESCALE_50_HZ)
        .map_err(|e| eyre!("Could not set the PWM frequency: {:?}", e))?;
    pwm.enable()
        .map_err(|e| eyre!("Could not enable the PCA9685: {:?}", e))?;

    let engine_channel = pca9685::channel(params.engine_channel)
        .ok_or_else(|| eyre!("Invalid engine channel {}", params.engine_channel))?;
    let steering_channel = pca9685::channel(params.steering_channel)
        .ok_or_else(|| eyre!("Invalid steering channel {}", params.steering_channel))?;

    info!(
        "PCA9685 initialised on bus {} at {:#x}",
        params.i2c_bus, params.pwm_address
    );

    let driver = Arc::new(Mutex::new(pwm));

    Ok((
        Box::new(PwmEngine::new(driver.clone(), engine_channel)),
        Box::new(ServoFrontWheel::new(
            driver,
            steering_channel,
            params.steering_correction,
            params.steering_duty_range,
        )),
    ))
}

#[cfg(not(target_arch = "arm"))]
fn pwm_actuators(
    _params: &EqptParams,
) -> Result<(Box<dyn Engine>, Box<dyn FrontWheel>), Report> {
    Err(eyre!(
        "PWM actuators are only available on the vehicle, simulate the engine and front wheel"
    ))
}
