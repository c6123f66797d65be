//! Control loop of the car
//!
//! The loop is the only place the actuator and safety state are mutated. It waits on its mailbox
//! and on the ranging timer, handling exactly one event at a time.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, warn};
use std::sync::{
    mpsc::{channel, Receiver, RecvTimeoutError, Sender},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use veh_if::eqpt::RangeFinder;

use super::{
    msg::{CarMsg, DisableSignal, VelocityRequest},
    obstacle::{ranging_worker, RangingSignal},
    velocity::Actuators,
    CarError, CarParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub(crate) struct CarActor {
    params: CarParams,
    actuators: Actuators,

    /// Manual velocity requests are ignored while set
    disabled: bool,

    /// A range sample has been requested and not yet reported as done
    ranging: bool,

    /// When the next range sample is due, `None` while a sample is outstanding
    range_deadline: Option<Instant>,

    mailbox: Receiver<CarMsg>,
    ranging_tx: Sender<RangingSignal>,
    ranging_jh: Option<JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Spawn the ranging worker and the control loop.
///
/// Returns the sender for the loop's mailbox and the handle to the loop thread.
pub(crate) fn spawn(
    params: CarParams,
    actuators: Actuators,
    range_finder: Arc<dyn RangeFinder>,
) -> Result<(Sender<CarMsg>, JoinHandle<()>), CarError> {
    let (mailbox_tx, mailbox_rx) = channel();
    let (ranging_tx, ranging_rx) = channel();

    let worker_mailbox = mailbox_tx.clone();
    let safe_distance_cm = params.safe_distance_cm;
    let ranging_jh = thread::Builder::new()
        .name("car::ranging".into())
        .spawn(move || ranging_worker(range_finder, safe_distance_cm, worker_mailbox, ranging_rx))
        .map_err(|e| CarError::SpawnError("ranging", e))?;

    let actor = CarActor {
        params,
        actuators,
        disabled: false,
        ranging: false,
        range_deadline: None,
        mailbox: mailbox_rx,
        ranging_tx,
        ranging_jh: Some(ranging_jh),
    };

    // If this fails the actor is dropped with the ranging sender, which stops the worker
    let actor_jh = thread::Builder::new()
        .name("car::control".into())
        .spawn(move || actor.run())
        .map_err(|e| CarError::SpawnError("control", e))?;

    Ok((mailbox_tx, actor_jh))
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CarActor {
    fn run(mut self) {
        info!("Car control loop started");
        self.arm_ranging_timer();

        while let Some(msg) = self.next_msg() {
            match msg {
                CarMsg::Close(ack) => {
                    info!("Close requested, shutting down the car");
                    self.shutdown(vec![ack]);
                    return;
                }
                CarMsg::Velocity(req) => self.handle_velocity(req),
                CarMsg::Disable(signal) => self.handle_disable(signal),
                CarMsg::RangingDone => {
                    self.ranging = false;
                    self.arm_ranging_timer();
                }
            }
        }

        warn!("Car mailbox disconnected, shutting down the car");
        self.shutdown(vec![]);
    }

    /// Wait for the next message, starting a range sample whenever the timer expires.
    ///
    /// A due sample is started before any waiting message is taken so a busy mailbox can't starve
    /// the obstacle monitor.
    fn next_msg(&mut self) -> Option<CarMsg> {
        loop {
            let deadline = match self.range_deadline {
                Some(d) => d,
                None => return self.mailbox.recv().ok(),
            };

            let now = Instant::now();
            if now >= deadline {
                self.start_ranging();
                continue;
            }

            match self.mailbox.recv_timeout(deadline - now) {
                Ok(msg) => return Some(msg),
                Err(RecvTimeoutError::Timeout) => self.start_ranging(),
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn arm_ranging_timer(&mut self) {
        self.range_deadline = Some(Instant::now() + self.params.range_check_period());
    }

    fn start_ranging(&mut self) {
        self.range_deadline = None;

        match self.ranging_tx.send(RangingSignal::Sample) {
            Ok(_) => self.ranging = true,
            Err(_) => error!("Ranging worker has stopped, obstacles will no longer be detected"),
        }
    }

    fn handle_velocity(&mut self, req: VelocityRequest) {
        let result = if self.disabled {
            debug!(
                "Ignoring velocity ({}, {}) while disabled",
                req.speed, req.angle
            );
            Ok(())
        } else {
            self.actuators
                .apply(req.speed, req.angle)
                .map_err(CarError::from)
        };

        req.reply.send(result).ok();
    }

    fn handle_disable(&mut self, signal: DisableSignal) {
        if signal.disable == self.disabled {
            signal.reply.send(Ok(())).ok();
            return;
        }

        self.disabled = signal.disable;

        let result = if self.disabled {
            warn!("Collision detected at {:.1} cm, stopping", signal.distance_cm);
            self.actuators
                .stop_sequence(&self.params)
                .map_err(CarError::from)
        } else {
            info!("Obstruction cleared at {:.1} cm", signal.distance_cm);
            Ok(())
        };

        signal.reply.send(result).ok();
    }

    /// Drain any outstanding range sample, stop the worker, park the actuators, then acknowledge
    /// every close request received.
    fn shutdown(mut self, mut waiters: Vec<Sender<()>>) {
        self.range_deadline = None;

        if self.ranging {
            debug!("Waiting for the outstanding range sample");
        }

        while self.ranging {
            match self.mailbox.recv() {
                Ok(CarMsg::RangingDone) => self.ranging = false,
                Ok(CarMsg::Disable(signal)) => self.handle_disable(signal),
                Ok(CarMsg::Velocity(req)) => {
                    req.reply.send(Err(CarError::Closed)).ok();
                }
                Ok(CarMsg::Close(ack)) => waiters.push(ack),
                Err(_) => break,
            }
        }

        self.ranging_tx.send(RangingSignal::Stop).ok();
        if let Some(jh) = self.ranging_jh.take() {
            if jh.join().is_err() {
                error!("Ranging worker panicked");
            }
        }

        self.actuators.park();
        info!("Car control loop stopped");

        for ack in waiters {
            ack.send(()).ok();
        }
    }
}
