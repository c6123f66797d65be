//! # Telecommand processor module
//!
//! The telecommand processor handles TCs coming from any source.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use util::veh_if::tc::Tc;
use veh_lib::car::Vehicle;

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute a telecommand on the vehicle.
///
/// Failures are logged rather than returned, a failed TC does not stop the executable.
pub(crate) fn exec(vehicle: &dyn Vehicle, tc: &Tc) {
    debug!("Executing {:?}", tc);

    let result = match *tc {
        Tc::Velocity { speed, angle } => vehicle.velocity(speed, angle),
        Tc::Turn { swing } => vehicle.turn(swing),
        Tc::PointTo { angle } => vehicle.point_to(angle),
        Tc::DistanceInFront => vehicle
            .distance_in_front()
            .map(|d| info!("Distance in front: {:.1} cm", d)),
        Tc::Heading => vehicle
            .heading()
            .map(|h| info!("Heading: {:.1} degrees", h)),
        Tc::Snapshot => {
            info!("Current image is {} bytes", vehicle.current_image().len());
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("Could not execute {:?}: {}", tc, e);
    }
}
