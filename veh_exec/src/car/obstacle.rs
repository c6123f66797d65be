//! Obstacle monitor
//!
//! The control loop asks for a range sample each time its ranging timer fires. The sample is taken
//! on a dedicated worker so the loop keeps serving requests while the sensor is read, and the
//! result is posted back to the loop as a [`DisableSignal`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace, warn};
use std::sync::{
    mpsc::{channel, Receiver, Sender},
    Arc,
};

use veh_if::eqpt::RangeFinder;

use super::msg::{CarMsg, DisableSignal};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Requests sent from the control loop to the ranging worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RangingSignal {
    /// Take one sample and report it
    Sample,

    /// Stop the worker
    Stop,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Returns true if an obstacle at `distance_cm` is too close to keep driving.
pub(crate) fn is_unsafe(distance_cm: f64, safe_distance_cm: f64) -> bool {
    distance_cm < safe_distance_cm
}

/// Ranging worker thread function.
///
/// Only ever one sample is processed at a time. `RangingDone` is always posted after a `Sample`
/// request, including when the sensor read failed and no signal was raised.
pub(crate) fn ranging_worker(
    range_finder: Arc<dyn RangeFinder>,
    safe_distance_cm: f64,
    mailbox: Sender<CarMsg>,
    requests: Receiver<RangingSignal>,
) {
    while let Ok(RangingSignal::Sample) = requests.recv() {
        sample(range_finder.as_ref(), safe_distance_cm, &mailbox);

        if mailbox.send(CarMsg::RangingDone).is_err() {
            break;
        }
    }

    trace!("Ranging worker stopped");
}

fn sample(range_finder: &dyn RangeFinder, safe_distance_cm: f64, mailbox: &Sender<CarMsg>) {
    let distance_cm = match range_finder.distance() {
        Ok(d) if d.is_nan() => {
            debug!("Range finder returned NaN, skipping this cycle");
            return;
        }
        Ok(d) => d,
        Err(e) => {
            debug!("Range finder read failed, skipping this cycle: {}", e);
            return;
        }
    };

    let (reply_tx, reply_rx) = channel();
    let signal = DisableSignal {
        disable: is_unsafe(distance_cm, safe_distance_cm),
        distance_cm,
        reply: reply_tx,
    };

    if mailbox.send(CarMsg::Disable(signal)).is_err() {
        return;
    }

    match reply_rx.recv() {
        Ok(Ok(())) => (),
        Ok(Err(e)) => warn!("Could not apply the safety state: {}", e),
        Err(_) => debug!("Control loop dropped the safety signal"),
    }
}
